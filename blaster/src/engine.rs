use std::{sync::Arc, time::Instant};

use self::{runtime::TaskPool, worker::Worker};
use crate::{
    aggregator::{self, Aggregator},
    cfg::BlastConfig,
    error::Error,
    limiter::Limiter,
    protocol::Protocol,
    report::{RunReport, Sink},
    stop::StopSignal,
};

mod runtime;
mod worker;

/// Capacity of each of the worker to aggregator queues.
const QUEUE_CAPACITY: usize = 64;

/// Stops a running blast.
///
/// The limiter stops issuing tickets at once, idle workers exit at once and
/// busy workers exit once their current request is done. The blast then
/// completes with a partial report.
#[derive(Debug, Clone)]
pub struct StopHandle {
    stop: StopSignal,
}

impl StopHandle {
    #[inline]
    pub fn stop(&self) {
        self.stop.stop();
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        !self.stop.is_running()
    }
}

/// The load generation engine.
///
/// Wires one limiter, a fixed pool of workers and one aggregator together
/// via bounded queues.
#[derive(Debug)]
pub struct Blast<P> {
    cfg: BlastConfig,
    proto: Arc<P>,
    stop: StopSignal,
}

impl<P> Blast<P>
where
    P: Protocol,
{
    pub fn new(cfg: BlastConfig, proto: P) -> Result<Self, Error> {
        cfg.validate()?;

        let m = Self {
            cfg,
            proto: Arc::new(proto),
            stop: StopSignal::new(),
        };

        Ok(m)
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle { stop: self.stop.clone() }
    }

    /// Runs the blast to completion.
    ///
    /// Interval reports go to the sink while running, followed by the final
    /// summary, which is also returned. A fatal protocol error aborts the run
    /// and no summary is written.
    pub async fn run<K>(self, sink: &mut K) -> Result<RunReport, Error>
    where
        K: Sink + ?Sized,
    {
        let request_total = self.cfg.request_total.get();
        let concurrency = self.cfg.concurrency;
        let sampling_period = self.cfg.sampling_period;

        log::info!(
            "blasting {request_total} requests at {} request/s with {concurrency} workers",
            self.cfg.rate
        );

        let (ticket_tx, ticket_rx) = async_channel::bounded(concurrency.get());
        let (outbox, inbox) = aggregator::channel(QUEUE_CAPACITY);

        let start = Instant::now();

        let limiter = Limiter::new(
            request_total,
            self.cfg.rate,
            sampling_period,
            ticket_tx,
            self.stop.clone(),
        );
        let limiter = tokio::spawn(limiter.run());

        let workers = TaskPool::new(concurrency, |idx: usize| {
            let worker = Worker::new(
                idx,
                self.proto.clone(),
                ticket_rx.clone(),
                outbox.clone(),
                self.cfg.timeout,
                self.cfg.debug,
                self.stop.clone(),
            );

            worker.run()
        })
        .spawn();

        // Only workers must hold these, so that queue closing is observable.
        drop(ticket_rx);
        drop(outbox);

        let aggregator = Aggregator::new(request_total, sampling_period, inbox);
        let report = aggregator.run(start, sink).await;
        if report.is_err() {
            self.stop.stop();
        }

        let issued = limiter.await?;
        log::debug!("limiter issued {issued} tickets");

        for rc in workers.join().await? {
            rc?;
        }

        let report = report?;
        log::info!("blast done in {:.3}s", report.elapsed_secs);
        sink.summary(&report)?;

        Ok(report)
    }
}
