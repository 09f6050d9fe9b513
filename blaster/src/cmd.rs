use core::net::SocketAddr;
use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::cfg::{Format, DEFAULT_ADDR};

/// Blasts an echo TCP server with requests and measures how it copes.
///
/// Unset numeric options fall back to the profile, if any, then to the
/// built-in defaults.
#[derive(Debug, Clone, Parser)]
#[command(version, about)]
pub struct Cmd {
    /// Target endpoint.
    #[clap(default_value = DEFAULT_ADDR)]
    pub addr: SocketAddr,
    /// Total number of requests [default: 1000].
    #[clap(short = 'n', long)]
    pub requests: Option<u64>,
    /// Concurrency level, i.e. the maximum number of requests in flight
    /// [default: 10].
    #[clap(short, long)]
    pub concurrency: Option<usize>,
    /// Target admission rate in requests per second [default: 1000].
    ///
    /// This is independent from the concurrency: the achieved throughput is
    /// bounded by both.
    #[clap(short, long)]
    pub rate: Option<f64>,
    /// Per-request timeout in seconds, counted from a successful connection.
    /// Zero disables it [default: 5].
    #[clap(short, long)]
    pub timeout: Option<f64>,
    /// At most one request per period has its timings measured; also the
    /// reporting interval, in seconds [default: 5].
    #[clap(long)]
    pub sampling_period: Option<f64>,
    /// Data sent with each request [default: "Hello from tcpblaster!"].
    #[clap(long)]
    pub payload: Option<String>,
    /// Set linger TCP option with specified value.
    #[clap(long)]
    pub tcp_linger: Option<u64>,
    /// Enable SOCK_NODELAY socket option.
    #[clap(long)]
    pub tcp_no_delay: bool,
    /// Report format.
    #[clap(long, value_enum, default_value_t)]
    pub format: Format,
    /// Path to a YAML run profile.
    #[clap(long, value_name = "PATH")]
    pub profile: Option<PathBuf>,
    /// Output per-request debug information.
    #[clap(short, long)]
    pub debug: bool,
    /// Be verbose in terms of logging.
    #[clap(short, action = ArgAction::Count)]
    pub verbose: u8,
}
