//! Protocol adapter seam.
//!
//! The engine knows nothing about the wire: it dials, optionally sets a
//! deadline on the obtained connection, performs one exchange and closes the
//! connection by dropping it.

use core::{
    fmt::{Debug, Display},
    future::Future,
    hash::Hash,
};
use std::time::Instant;

pub mod echo;

/// Terminal status of one request attempt.
///
/// Each adapter defines its own closed set of statuses. [`Display`] yields
/// the label printed in the errors breakdown.
pub trait Status: Debug + Display + Copy + Eq + Hash + Send + Sync + 'static {
    /// Returns the status meaning "no failure".
    fn success() -> Self;

    #[inline]
    fn is_success(&self) -> bool {
        *self == Self::success()
    }
}

/// Why a protocol step did not succeed.
#[derive(Debug)]
pub enum Failure<S> {
    /// An ordinary per-request failure, counted and classified.
    Status(S),
    /// The run cannot proceed meaningfully.
    Fatal(anyhow::Error),
}

/// Result of a single protocol step.
pub type Step<T, S> = Result<T, Failure<S>>;

/// A pluggable request/response driver.
///
/// One instance is shared by all workers, so implementations must be safe to
/// call concurrently.
pub trait Protocol: Send + Sync + 'static {
    /// An established connection or channel to the target.
    ///
    /// Dropping it releases the underlying resources.
    type Conn: Send;
    type Status: Status;

    /// Establishes one connection to the target.
    fn dial(&self, debug: bool) -> impl Future<Output = Step<Self::Conn, Self::Status>> + Send;

    /// Bounds all further I/O on the connection by the given instant.
    ///
    /// Failing to do so is fatal.
    fn set_deadline(&self, conn: &mut Self::Conn, deadline: Instant) -> Result<(), anyhow::Error>;

    /// Performs one full request/response exchange.
    ///
    /// Returns the number of bytes received.
    fn handle_request(
        &self,
        conn: &mut Self::Conn,
        debug: bool,
    ) -> impl Future<Output = Step<usize, Self::Status>> + Send;
}
