use core::{net::SocketAddr, num::NonZero, time::Duration};
use std::{fs, path::Path};

use clap::ValueEnum;
use serde::Deserialize;

use crate::{
    cmd::Cmd,
    error::Error,
    protocol::echo::{EchoConfig, DEFAULT_PAYLOAD},
};

pub const DEFAULT_ADDR: &str = "127.0.0.1:3640";
pub const DEFAULT_REQUESTS: u64 = 1000;
pub const DEFAULT_CONCURRENCY: usize = 10;
/// Requests per second.
pub const DEFAULT_RATE: f64 = 1000.0;
/// Seconds.
pub const DEFAULT_TIMEOUT: f64 = 5.0;
/// Seconds.
pub const DEFAULT_SAMPLING_PERIOD: f64 = 5.0;
/// Upper bound for the timeout, the sampling period and the interval between
/// two requests.
pub const MAX_DURATION: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Engine settings.
///
/// Admission rate and concurrency are independent knobs: the rate paces how
/// fast tickets are issued, the concurrency bounds requests in flight. The
/// achieved throughput is therefore roughly
/// `min(rate, concurrency / mean round-trip time)`.
#[derive(Debug, Clone)]
pub struct BlastConfig {
    /// Total number of requests to issue.
    pub request_total: NonZero<u64>,
    /// Number of workers, i.e. maximum number of requests in flight.
    pub concurrency: NonZero<usize>,
    /// Target admission rate, in requests per second.
    pub rate: f64,
    /// Deadline for the exchange, counted from a successful dial.
    pub timeout: Option<Duration>,
    /// At most one request per period gets its timings sampled. Also the
    /// reporting interval.
    pub sampling_period: Duration,
    /// Let the protocol log per-request diagnostics.
    pub debug: bool,
}

impl BlastConfig {
    pub fn new(request_total: NonZero<u64>, concurrency: NonZero<usize>, rate: f64) -> Self {
        Self {
            request_total,
            concurrency,
            rate,
            timeout: Some(Duration::from_secs_f64(DEFAULT_TIMEOUT)),
            sampling_period: Duration::from_secs_f64(DEFAULT_SAMPLING_PERIOD),
            debug: false,
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if !(self.rate.is_finite() && self.rate > 0.0) {
            return Err(Error::config(format!("rate must be positive, got {}", self.rate)));
        }
        if self.rate < 1.0 / MAX_DURATION.as_secs_f64() {
            return Err(Error::config(format!(
                "rate must be at least one request per {}s, got {}",
                MAX_DURATION.as_secs(),
                self.rate
            )));
        }
        if self.sampling_period.is_zero() {
            return Err(Error::config("sampling period must be positive"));
        }
        if self.sampling_period > MAX_DURATION {
            return Err(Error::config(format!(
                "sampling period must not exceed {}s",
                MAX_DURATION.as_secs()
            )));
        }
        match self.timeout {
            Some(v) if v.is_zero() => {
                return Err(Error::config("timeout must be positive, omit it to disable"));
            }
            Some(v) if v > MAX_DURATION => {
                return Err(Error::config(format!("timeout must not exceed {}s", MAX_DURATION.as_secs())));
            }
            _ => {}
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Format {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Run settings loaded from a YAML file.
///
/// Every field is optional; command-line flags take precedence.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Profile {
    pub requests: Option<u64>,
    pub concurrency: Option<usize>,
    pub rate: Option<f64>,
    /// Seconds, zero disables.
    pub timeout: Option<f64>,
    /// Seconds.
    pub sampling_period: Option<f64>,
    pub payload: Option<String>,
}

impl Profile {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let data = fs::read(path)
            .map_err(|err| Error::config(format!("failed to read {}: {err}", path.display())))?;

        Self::from_slice(&data).map_err(|err| Error::config(format!("{}: {err}", path.display())))
    }

    pub fn from_slice(data: &[u8]) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_slice(data)
    }
}

/// Complete application config.
#[derive(Debug, Clone)]
pub struct Config {
    pub blast: BlastConfig,
    pub echo: EchoConfig,
    pub format: Format,
}

impl TryFrom<Cmd> for Config {
    type Error = Error;

    fn try_from(cmd: Cmd) -> Result<Self, Self::Error> {
        let profile = match &cmd.profile {
            Some(path) => Profile::load(path)?,
            None => Profile::default(),
        };

        Self::merge(cmd, profile)
    }
}

impl Config {
    /// Builds the config, preferring command-line values over the profile
    /// and the profile over defaults.
    pub fn merge(cmd: Cmd, profile: Profile) -> Result<Self, Error> {
        let requests = cmd.requests.or(profile.requests).unwrap_or(DEFAULT_REQUESTS);
        let request_total =
            NonZero::new(requests).ok_or_else(|| Error::config("number of requests must be positive"))?;

        let concurrency = cmd.concurrency.or(profile.concurrency).unwrap_or(DEFAULT_CONCURRENCY);
        let concurrency =
            NonZero::new(concurrency).ok_or_else(|| Error::config("concurrency must be positive"))?;

        let rate = cmd.rate.or(profile.rate).unwrap_or(DEFAULT_RATE);

        let timeout = cmd.timeout.or(profile.timeout).unwrap_or(DEFAULT_TIMEOUT);
        let timeout = match secs(timeout, "timeout")? {
            d if d.is_zero() => None,
            d => Some(d),
        };

        let sampling_period = cmd
            .sampling_period
            .or(profile.sampling_period)
            .unwrap_or(DEFAULT_SAMPLING_PERIOD);
        let sampling_period = secs(sampling_period, "sampling period")?;

        let blast = BlastConfig {
            request_total,
            concurrency,
            rate,
            timeout,
            sampling_period,
            debug: cmd.debug,
        };
        blast.validate()?;

        let addr: SocketAddr = cmd.addr;
        let payload = cmd
            .payload
            .or(profile.payload)
            .unwrap_or_else(|| DEFAULT_PAYLOAD.to_string());
        if payload.is_empty() {
            return Err(Error::config("payload must not be empty"));
        }

        let echo = EchoConfig {
            addr,
            payload: payload.into_bytes(),
            tcp_linger: cmd.tcp_linger,
            tcp_no_delay: cmd.tcp_no_delay,
        };

        let m = Self { blast, echo, format: cmd.format };

        Ok(m)
    }
}

/// Converts seconds into a duration, rejecting negative and non-finite
/// values.
fn secs(v: f64, name: &str) -> Result<Duration, Error> {
    Duration::try_from_secs_f64(v)
        .map_err(|_| Error::config(format!("{name} must be a non-negative number of seconds, got {v}")))
}
