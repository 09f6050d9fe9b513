use core::{
    fmt::{self, Display, Formatter},
    future::Future,
    net::SocketAddr,
    time::Duration,
};
use std::{io::ErrorKind, time::Instant};

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpSocket, TcpStream},
    time,
};

use super::{Failure, Protocol, Status, Step};

pub const DEFAULT_PAYLOAD: &str = "Hello from tcpblaster!";

/// Echo TCP client settings.
#[derive(Debug, Clone)]
pub struct EchoConfig {
    /// Target endpoint.
    pub addr: SocketAddr,
    /// Bytes to send, expected to be echoed back.
    pub payload: Vec<u8>,
    /// Set linger TCP option with specified value.
    pub tcp_linger: Option<u64>,
    /// Enable SOCK_NODELAY socket option.
    pub tcp_no_delay: bool,
}

impl EchoConfig {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            payload: DEFAULT_PAYLOAD.as_bytes().to_vec(),
            tcp_linger: None,
            tcp_no_delay: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EchoStatus {
    Success,
    ConnectionError,
    WriteError,
    Timeout,
    ReadError,
}

impl Display for EchoStatus {
    fn fmt(&self, f: &mut Formatter) -> Result<(), fmt::Error> {
        let v = match self {
            Self::Success => "ok",
            Self::ConnectionError => "connection errors",
            Self::WriteError => "errors while sending",
            Self::Timeout => "timeouts",
            Self::ReadError => "errors while receiving",
        };

        f.write_str(v)
    }
}

impl Status for EchoStatus {
    #[inline]
    fn success() -> Self {
        Self::Success
    }
}

/// Connection with an optional I/O deadline.
#[derive(Debug)]
pub struct EchoConn {
    stream: TcpStream,
    deadline: Option<Instant>,
}

/// Writes a payload and reads it back.
#[derive(Debug)]
pub struct EchoTcp {
    cfg: EchoConfig,
}

impl EchoTcp {
    pub fn new(cfg: EchoConfig) -> Self {
        Self { cfg }
    }

    async fn connect(&self) -> Result<TcpStream, std::io::Error> {
        let sock = match self.cfg.addr {
            SocketAddr::V4(..) => TcpSocket::new_v4()?,
            SocketAddr::V6(..) => TcpSocket::new_v6()?,
        };
        let stream = sock.connect(self.cfg.addr).await?;

        if self.cfg.tcp_no_delay {
            stream.set_nodelay(true)?;
        }
        if let Some(linger) = self.cfg.tcp_linger {
            stream.set_linger(Some(Duration::from_secs(linger)))?;
        }

        Ok(stream)
    }

    /// Reads until the buffer is full or the peer closes the connection.
    async fn read_reply(stream: &mut TcpStream, buf: &mut [u8]) -> Result<usize, std::io::Error> {
        let mut n = 0;
        while n < buf.len() {
            match stream.read(&mut buf[n..]).await? {
                0 => break,
                v => n += v,
            }
        }

        Ok(n)
    }
}

/// Whether a failed connect attempt means the target is unusable.
#[inline]
fn is_fatal(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::ConnectionRefused
            | ErrorKind::PermissionDenied
            | ErrorKind::AddrNotAvailable
            | ErrorKind::InvalidInput
            | ErrorKind::Unsupported
    )
}

impl Protocol for EchoTcp {
    type Conn = EchoConn;
    type Status = EchoStatus;

    async fn dial(&self, debug: bool) -> Step<EchoConn, EchoStatus> {
        match self.connect().await {
            Ok(stream) => Ok(EchoConn { stream, deadline: None }),
            Err(err) if is_fatal(err.kind()) => {
                let err = anyhow::Error::new(err).context(format!("failed to connect to {}", self.cfg.addr));
                Err(Failure::Fatal(err))
            }
            Err(err) => {
                if debug {
                    log::debug!("failed to connect to {}: {err}", self.cfg.addr);
                }
                Err(Failure::Status(EchoStatus::ConnectionError))
            }
        }
    }

    fn set_deadline(&self, conn: &mut EchoConn, deadline: Instant) -> Result<(), anyhow::Error> {
        conn.deadline = Some(deadline);
        Ok(())
    }

    async fn handle_request(&self, conn: &mut EchoConn, debug: bool) -> Step<usize, EchoStatus> {
        let deadline = conn.deadline;
        let stream = &mut conn.stream;
        let peer = self.cfg.addr;

        let data = &self.cfg.payload;
        let rc = with_deadline(deadline, stream.write_all(data)).await;
        match rc {
            Some(Ok(())) => {
                if debug {
                    log::debug!("sent {} byte to {peer}", data.len());
                }
            }
            Some(Err(err)) => {
                if debug {
                    log::debug!("failed to send to {peer}: {err}");
                }
                return Err(Failure::Status(EchoStatus::WriteError));
            }
            None => return Err(Failure::Status(EchoStatus::Timeout)),
        }

        let mut buf = vec![0; data.len()];
        let rc = with_deadline(deadline, Self::read_reply(stream, &mut buf)).await;
        match rc {
            Some(Ok(n)) => {
                if debug {
                    log::debug!("read {n} byte from {peer}");
                }
                Ok(n)
            }
            Some(Err(err)) => {
                if debug {
                    log::debug!("failed to read from {peer}: {err}");
                }
                Err(Failure::Status(EchoStatus::ReadError))
            }
            None => {
                if debug {
                    log::debug!("timed out reading from {peer}");
                }
                Err(Failure::Status(EchoStatus::Timeout))
            }
        }
    }
}

/// Awaits the future, bounded by the optional deadline.
///
/// Returns `None` if the deadline expired first.
async fn with_deadline<F: Future>(deadline: Option<Instant>, f: F) -> Option<F::Output> {
    match deadline {
        Some(deadline) => time::timeout_at(deadline.into(), f).await.ok(),
        None => Some(f.await),
    }
}

#[cfg(test)]
mod test {
    use tokio::net::TcpListener;

    use super::*;

    async fn echo_server() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            loop {
                let (mut sock, _) = listener.accept().await.unwrap();
                tokio::spawn(async move {
                    let (mut rd, mut wr) = sock.split();
                    let _ = tokio::io::copy(&mut rd, &mut wr).await;
                });
            }
        });

        addr
    }

    #[tokio::test]
    async fn test_echo_roundtrip() {
        let addr = echo_server().await;
        let echo = EchoTcp::new(EchoConfig::new(addr));

        let mut conn = echo.dial(true).await.unwrap();
        let n = echo.handle_request(&mut conn, true).await.unwrap();

        assert_eq!(DEFAULT_PAYLOAD.len(), n);
    }

    #[tokio::test]
    async fn test_silent_peer_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_sock, _) = listener.accept().await.unwrap();
            time::sleep(Duration::from_secs(10)).await;
        });

        let echo = EchoTcp::new(EchoConfig::new(addr));
        let mut conn = echo.dial(false).await.unwrap();
        echo.set_deadline(&mut conn, Instant::now() + Duration::from_millis(50))
            .unwrap();

        match echo.handle_request(&mut conn, false).await {
            Err(Failure::Status(EchoStatus::Timeout)) => {}
            rc => panic!("unexpected result: {rc:?}"),
        }
    }

    #[tokio::test]
    async fn test_peer_closing_early_is_not_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = [0; DEFAULT_PAYLOAD.len()];
            sock.read_exact(&mut buf).await.unwrap();
            sock.write_all(&buf[..4]).await.unwrap();
        });

        let echo = EchoTcp::new(EchoConfig::new(addr));
        let mut conn = echo.dial(false).await.unwrap();

        assert_eq!(4, echo.handle_request(&mut conn, false).await.unwrap());
    }

    #[tokio::test]
    async fn test_refused_connection_is_fatal() {
        // Bind and drop to get a port nobody listens on.
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };

        let echo = EchoTcp::new(EchoConfig::new(addr));
        assert!(matches!(echo.dial(false).await, Err(Failure::Fatal(..))));
    }

    #[test]
    fn test_labels() {
        assert_eq!("timeouts", EchoStatus::Timeout.to_string());
        assert_eq!("connection errors", EchoStatus::ConnectionError.to_string());
        assert!(EchoStatus::Success.is_success());
        assert!(!EchoStatus::ReadError.is_success());
    }
}
