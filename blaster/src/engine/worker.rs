use core::time::Duration;
use std::{sync::Arc, time::Instant};

use async_channel::Receiver;

use crate::{
    aggregator::{Outbox, Outcome},
    error::Error,
    limiter::Ticket,
    protocol::{Failure, Protocol, Status},
    stop::StopSignal,
};

/// Per-task worker.
///
/// Consumes tickets until the ticket queue is closed and drained, or the
/// blast is stopped, executing one request per ticket.
#[derive(Debug)]
pub struct Worker<P: Protocol> {
    idx: usize,
    proto: Arc<P>,
    tickets: Receiver<Ticket>,
    outbox: Outbox<P::Status>,
    /// Deadline applied to each connection after a successful dial.
    timeout: Option<Duration>,
    debug: bool,
    stop: StopSignal,
}

impl<P: Protocol> Worker<P> {
    pub fn new(
        idx: usize,
        proto: Arc<P>,
        tickets: Receiver<Ticket>,
        outbox: Outbox<P::Status>,
        timeout: Option<Duration>,
        debug: bool,
        stop: StopSignal,
    ) -> Self {
        Self {
            idx,
            proto,
            tickets,
            outbox,
            timeout,
            debug,
            stop,
        }
    }

    pub async fn run(self) -> Result<(), Error> {
        let mut num_done = 0u64;

        loop {
            let ticket = tokio::select! {
                biased;
                _ = self.stop.stopped() => break,
                rc = self.tickets.recv() => match rc {
                    Ok(ticket) => ticket,
                    Err(..) => break,
                },
            };

            match self.execute(ticket).await {
                Ok(true) => num_done += 1,
                Ok(false) => break,
                Err(err) => {
                    log::error!("worker #{} failed: {err}", self.idx);
                    self.stop.stop();
                    return Err(err);
                }
            }
        }

        log::trace!("worker #{} exited after {num_done} requests", self.idx);
        Ok(())
    }

    /// Executes a single request.
    ///
    /// Returns `false` if the results can no longer be delivered.
    async fn execute(&self, ticket: Ticket) -> Result<bool, Error> {
        let t0 = ticket.sampled.then(Instant::now);

        let mut conn = match self.proto.dial(self.debug).await {
            Ok(conn) => conn,
            Err(Failure::Status(status)) => return Ok(self.complete(status, 0).await),
            Err(Failure::Fatal(err)) => return Err(Error::Fatal(err)),
        };
        let t1 = Instant::now();

        if let Some(deadline) = self.timeout.and_then(|v| t1.checked_add(v)) {
            self.proto
                .set_deadline(&mut conn, deadline)
                .map_err(Error::Fatal)?;
        }

        let rc = self.proto.handle_request(&mut conn, self.debug).await;
        let t2 = Instant::now();
        // Close the connection before reporting, on every path.
        drop(conn);

        if let Some(t0) = t0 {
            if !self.outbox.timing(t1 - t0, t2 - t0).await {
                return Ok(false);
            }
        }

        match rc {
            Ok(bytes) => Ok(self.complete(P::Status::success(), bytes).await),
            Err(Failure::Status(status)) => Ok(self.complete(status, 0).await),
            Err(Failure::Fatal(err)) => Err(Error::Fatal(err)),
        }
    }

    #[inline]
    async fn complete(&self, status: P::Status, bytes: usize) -> bool {
        self.outbox.outcome(Outcome { status, bytes }).await
    }
}
