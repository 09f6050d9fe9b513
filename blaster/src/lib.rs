//! Protocol-agnostic network load generator.
//!
//! A [`Blast`] paces request admission at a target rate, executes requests
//! with a fixed number of workers through a pluggable [`Protocol`] and
//! aggregates outcomes and sampled latencies into periodic and final
//! reports.

pub mod aggregator;
pub mod cfg;
pub mod cmd;
pub mod engine;
pub mod error;
pub mod histogram;
pub mod limiter;
pub mod logging;
pub mod protocol;
pub mod report;
mod shaper;
pub mod stats;
pub mod stop;

pub use self::{
    cfg::BlastConfig,
    engine::{Blast, StopHandle},
    error::Error,
    protocol::{Failure, Protocol, Status, Step},
    report::{JsonSink, RunReport, Sink, TextSink},
};
