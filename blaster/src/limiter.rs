use core::time::Duration;
use std::time::Instant;

use async_channel::Sender;

use crate::{shaper::Shaper, stop::StopSignal};

/// Permission for one worker to perform one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    /// Whether fine-grained timings must be collected for this request.
    pub sampled: bool,
}

/// Decides which tickets get sampled.
///
/// Sampling instants lie on a fixed grid of `period` starting at activation.
/// The first ticket issued at or after a grid point is sampled; grid points
/// passed while no ticket was issued are skipped, never accumulated. Hence at
/// most one ticket per period is sampled, no matter the load rate.
#[derive(Debug)]
pub struct Sampler {
    period: Duration,
    next: Instant,
}

impl Sampler {
    pub fn new(period: Duration) -> Self {
        Self::new_at(period, Instant::now())
    }

    pub fn new_at(period: Duration, now: Instant) -> Self {
        Self { period, next: now }
    }

    #[inline]
    pub fn sample(&mut self) -> bool {
        self.sample_at(Instant::now())
    }

    pub fn sample_at(&mut self, now: Instant) -> bool {
        if now < self.next {
            return false;
        }

        while self.next <= now {
            self.next += self.period;
        }

        true
    }
}

/// Paces ticket admission at the target rate.
///
/// Issues exactly `request_total` tickets unless stopped, then closes the
/// ticket queue so that workers observe exhaustion.
#[derive(Debug)]
pub struct Limiter {
    request_total: u64,
    shaper: Shaper,
    sampler: Sampler,
    tx: Sender<Ticket>,
    stop: StopSignal,
}

impl Limiter {
    pub fn new(
        request_total: u64,
        rate: f64,
        sampling_period: Duration,
        tx: Sender<Ticket>,
        stop: StopSignal,
    ) -> Self {
        Self {
            request_total,
            shaper: Shaper::new(rate),
            sampler: Sampler::new(sampling_period),
            tx,
            stop,
        }
    }

    /// Runs this limiter to exhaustion, returning the number of tickets
    /// issued.
    pub async fn run(mut self) -> u64 {
        let mut issued = 0;

        'outer: while issued < self.request_total {
            if !self.stop.is_running() {
                break;
            }

            match self.shaper.tick() {
                0 => {
                    tokio::select! {
                        _ = tokio::time::sleep(self.shaper.delay()) => {}
                        _ = self.stop.stopped() => break,
                    }
                }
                n => {
                    let n = n.min(self.request_total - issued);

                    for _ in 0..n {
                        let ticket = Ticket { sampled: self.sampler.sample() };
                        tokio::select! {
                            rc = self.tx.send(ticket) => {
                                if rc.is_err() {
                                    log::debug!("all workers are gone, {issued} tickets issued");
                                    break 'outer;
                                }
                            }
                            _ = self.stop.stopped() => break 'outer,
                        }
                        issued += 1;
                    }

                    self.shaper.consume(n);
                }
            }
        }

        if issued < self.request_total && !self.stop.is_running() {
            log::debug!("limiter stopped after {issued} tickets");
        }

        self.tx.close();
        issued
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_first_ticket_is_sampled() {
        let t0 = Instant::now();
        let mut s = Sampler::new_at(Duration::from_secs(5), t0);

        assert!(s.sample_at(t0));
        assert!(!s.sample_at(t0));
        assert!(!s.sample_at(t0 + Duration::from_millis(4999)));
        assert!(s.sample_at(t0 + Duration::from_secs(5)));
    }

    #[test]
    fn test_missed_periods_are_skipped() {
        let t0 = Instant::now();
        let mut s = Sampler::new_at(Duration::from_secs(1), t0);

        assert!(s.sample_at(t0));
        // Nothing issued for several periods: one sample, not a backlog.
        assert!(s.sample_at(t0 + Duration::from_millis(3500)));
        assert!(!s.sample_at(t0 + Duration::from_millis(3900)));
        assert!(s.sample_at(t0 + Duration::from_secs(4)));
    }

    #[test]
    fn test_sample_count_is_bounded() {
        let t0 = Instant::now();
        let period = Duration::from_millis(100);
        let mut s = Sampler::new_at(period, t0);

        // 1 ticket per ms during 1 second.
        let num = (0..=1000)
            .filter(|ms| s.sample_at(t0 + Duration::from_millis(*ms)))
            .count();

        assert!(num <= 1000 / 100 + 1);
        assert_eq!(11, num);
    }

    #[tokio::test]
    async fn test_limiter_issues_exact_total() {
        let (tx, rx) = async_channel::bounded(4);
        let limiter = Limiter::new(25, 10_000.0, Duration::from_secs(5), tx, StopSignal::new());

        let handle = tokio::spawn(limiter.run());

        let mut tickets = Vec::new();
        while let Ok(ticket) = rx.recv().await {
            tickets.push(ticket);
        }

        assert_eq!(25, handle.await.unwrap());
        assert_eq!(25, tickets.len());
        assert_eq!(1, tickets.iter().filter(|t| t.sampled).count());
    }

    #[tokio::test]
    async fn test_limiter_stops() {
        let (tx, rx) = async_channel::bounded(1);
        let stop = StopSignal::new();
        stop.stop();
        let limiter = Limiter::new(25, 10_000.0, Duration::from_secs(5), tx, stop);

        assert_eq!(0, limiter.run().await);
        assert!(rx.recv().await.is_err());
    }

    #[tokio::test]
    async fn test_stop_interrupts_slow_rate() {
        let (tx, rx) = async_channel::bounded(1);
        let stop = StopSignal::new();
        // The first token is 100s away.
        let limiter = Limiter::new(25, 0.01, Duration::from_secs(5), tx, stop.clone());

        let handle = tokio::spawn(limiter.run());
        tokio::time::sleep(Duration::from_millis(50)).await;
        stop.stop();

        let issued = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(0, issued);
        assert!(rx.recv().await.is_err());
    }

    #[tokio::test]
    async fn test_stop_interrupts_full_queue() {
        let (tx, rx) = async_channel::bounded(1);
        let stop = StopSignal::new();
        let limiter = Limiter::new(25, 10_000.0, Duration::from_secs(5), tx, stop.clone());

        let handle = tokio::spawn(limiter.run());
        // Nobody consumes: the limiter blocks on the second ticket.
        tokio::time::sleep(Duration::from_millis(50)).await;
        stop.stop();

        let issued = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(1, issued);
        assert!(rx.recv().await.is_ok());
        assert!(rx.recv().await.is_err());
    }
}
