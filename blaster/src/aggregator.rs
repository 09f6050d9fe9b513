use core::{cmp::Reverse, time::Duration};
use std::time::Instant;

use tokio::{
    sync::mpsc::{self, Receiver, Sender},
    time::{self, MissedTickBehavior},
};

use crate::{
    error::Error,
    histogram::OutcomeHistogram,
    protocol::Status,
    report::{ErrorCount, IntervalReport, RunReport, Sink},
    stats::RunningStats,
};

/// Terminal result of one request attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome<S> {
    pub status: S,
    /// Bytes received during the exchange.
    pub bytes: usize,
}

/// Producer side of the aggregator queues, cloned into every worker.
#[derive(Debug)]
pub struct Outbox<S> {
    outcomes: Sender<Outcome<S>>,
    dial: Sender<Duration>,
    round_trip: Sender<Duration>,
}

impl<S> Clone for Outbox<S> {
    fn clone(&self) -> Self {
        Self {
            outcomes: self.outcomes.clone(),
            dial: self.dial.clone(),
            round_trip: self.round_trip.clone(),
        }
    }
}

impl<S> Outbox<S> {
    /// Returns `false` if the aggregator is gone.
    #[inline]
    pub async fn outcome(&self, outcome: Outcome<S>) -> bool {
        self.outcomes.send(outcome).await.is_ok()
    }

    /// Ships a timing sample: connection time and full round-trip time, both
    /// measured from the dial start.
    #[inline]
    pub async fn timing(&self, dial: Duration, round_trip: Duration) -> bool {
        self.dial.send(dial).await.is_ok() && self.round_trip.send(round_trip).await.is_ok()
    }
}

/// Consumer side of the aggregator queues.
#[derive(Debug)]
pub struct Inbox<S> {
    outcomes: Receiver<Outcome<S>>,
    dial: Receiver<Duration>,
    round_trip: Receiver<Duration>,
}

/// Creates bounded aggregator queues of the given capacity each.
pub fn channel<S>(capacity: usize) -> (Outbox<S>, Inbox<S>) {
    let (outcomes_tx, outcomes_rx) = mpsc::channel(capacity);
    let (dial_tx, dial_rx) = mpsc::channel(capacity);
    let (round_trip_tx, round_trip_rx) = mpsc::channel(capacity);

    let outbox = Outbox {
        outcomes: outcomes_tx,
        dial: dial_tx,
        round_trip: round_trip_tx,
    };
    let inbox = Inbox {
        outcomes: outcomes_rx,
        dial: dial_rx,
        round_trip: round_trip_rx,
    };

    (outbox, inbox)
}

/// Single consumer of all worker output.
///
/// Exclusively owns the running statistics and the outcome histogram, and is
/// the only one deciding when the blast is complete.
#[derive(Debug)]
pub struct Aggregator<S> {
    request_total: u64,
    sampling_period: Duration,
    inbox: Inbox<S>,
    complete_total: u64,
    reply_total: u64,
    bytes_total: u64,
    /// Replies within the current reporting interval.
    interval_replies: u64,
    dial: RunningStats,
    round_trip: RunningStats,
    errors: OutcomeHistogram<S>,
}

impl<S> Aggregator<S>
where
    S: Status,
{
    pub fn new(request_total: u64, sampling_period: Duration, inbox: Inbox<S>) -> Self {
        Self {
            request_total,
            sampling_period,
            inbox,
            complete_total: 0,
            reply_total: 0,
            bytes_total: 0,
            interval_replies: 0,
            dial: RunningStats::new(),
            round_trip: RunningStats::new(),
            errors: OutcomeHistogram::default(),
        }
    }

    /// Runs until every request completes or every worker is gone.
    ///
    /// Interval reports are written to the sink as they happen; the final
    /// report is returned, not written.
    pub async fn run<K>(mut self, start: Instant, sink: &mut K) -> Result<RunReport, Error>
    where
        K: Sink + ?Sized,
    {
        let mut timer = time::interval_at((start + self.sampling_period).into(), self.sampling_period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut stopped = false;
        while self.complete_total < self.request_total {
            tokio::select! {
                v = self.inbox.outcomes.recv() => {
                    match v {
                        Some(outcome) => self.on_outcome(outcome),
                        None => {
                            stopped = true;
                            break;
                        }
                    }
                }
                Some(d) = self.inbox.dial.recv() => self.dial.update_duration(d),
                Some(d) = self.inbox.round_trip.recv() => self.round_trip.update_duration(d),
                _ = timer.tick() => {
                    let report = IntervalReport::new(start.elapsed(), self.interval_replies, self.sampling_period);
                    self.interval_replies = 0;
                    sink.interval(&report)?;
                }
            }
        }

        let elapsed = start.elapsed();

        // Workers ship timings before the outcome, so anything belonging to
        // completed requests is already queued.
        self.drain_timings();

        if stopped {
            log::info!("blast stopped after {} of {} requests", self.complete_total, self.request_total);
        }

        Ok(self.into_report(elapsed, stopped))
    }

    #[inline]
    fn on_outcome(&mut self, outcome: Outcome<S>) {
        self.complete_total += 1;

        if outcome.status.is_success() {
            self.reply_total += 1;
            self.interval_replies += 1;
            self.bytes_total += outcome.bytes as u64;
        } else {
            self.errors.increment(outcome.status);
        }
    }

    fn drain_timings(&mut self) {
        while let Ok(d) = self.inbox.dial.try_recv() {
            self.dial.update_duration(d);
        }
        while let Ok(d) = self.inbox.round_trip.try_recv() {
            self.round_trip.update_duration(d);
        }
    }

    fn into_report(self, elapsed: Duration, stopped: bool) -> RunReport {
        let secs = elapsed.as_secs_f64();
        let rate = |n: u64| if secs > 0.0 { n as f64 / secs } else { 0.0 };

        let mut errors: Vec<ErrorCount> = self
            .errors
            .iter()
            .map(|(status, count)| ErrorCount { status: status.to_string(), count })
            .collect();
        errors.sort_by(|a, b| (Reverse(a.count), &a.status).cmp(&(Reverse(b.count), &b.status)));

        RunReport {
            elapsed_secs: secs,
            request_total: self.request_total,
            complete_total: self.complete_total,
            reply_total: self.reply_total,
            bytes_total: self.bytes_total,
            request_rate: rate(self.complete_total),
            reply_rate: rate(self.reply_total),
            dial: self.dial.snapshot(),
            round_trip: self.round_trip.snapshot(),
            errors,
            stopped,
        }
    }
}
