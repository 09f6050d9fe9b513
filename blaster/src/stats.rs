use core::time::Duration;

use serde::Serialize;

/// Online mean and variance accumulator.
///
/// Uses Welford's algorithm, so no individual samples are kept and each
/// update is O(1) in both time and memory.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    /// Sum of squared deviations from the running mean.
    m2: f64,
}

impl RunningStats {
    #[inline]
    pub const fn new() -> Self {
        Self { count: 0, mean: 0.0, m2: 0.0 }
    }

    #[inline]
    pub fn update(&mut self, x: f64) {
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = x - self.mean;
        self.m2 += delta * delta2;
    }

    /// Records a latency, in milliseconds.
    #[inline]
    pub fn update_duration(&mut self, d: Duration) {
        self.update(d.as_secs_f64() * 1e3);
    }

    #[inline]
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Returns the mean, or zero when nothing was recorded yet.
    #[inline]
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Sample variance, zero when there is not enough data.
    #[inline]
    pub fn sample_variance(&self) -> f64 {
        if self.count > 1 {
            self.m2 / (self.count - 1) as f64
        } else {
            0.0
        }
    }

    #[inline]
    pub fn sample_stddev(&self) -> f64 {
        self.sample_variance().sqrt()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            count: self.count,
            mean: self.mean(),
            stddev: self.sample_stddev(),
        }
    }
}

/// Immutable view of a [`RunningStats`], as shipped in reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub count: u64,
    pub mean: f64,
    pub stddev: f64,
}

#[cfg(test)]
mod test {
    use proptest::{collection::vec, prelude::*};

    use super::*;

    fn two_pass(xs: &[f64]) -> (f64, f64) {
        let n = xs.len() as f64;
        let mean = xs.iter().sum::<f64>() / n;
        let var = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);

        (mean, var.sqrt())
    }

    #[test]
    fn test_three_samples() {
        let mut s = RunningStats::new();
        for x in [10.0, 20.0, 30.0] {
            s.update(x);
        }

        assert_eq!(3, s.count());
        assert!((s.mean() - 20.0).abs() < 1e-12);
        assert!((s.sample_stddev() - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_insufficient_data() {
        let mut s = RunningStats::new();
        assert_eq!(0, s.count());
        assert_eq!(0.0, s.sample_stddev());

        s.update(42.0);
        assert_eq!(42.0, s.mean());
        assert_eq!(0.0, s.sample_variance());
    }

    #[test]
    fn test_duration_in_ms() {
        let mut s = RunningStats::new();
        s.update_duration(Duration::from_micros(1500));
        s.update_duration(Duration::from_micros(2500));

        assert!((s.mean() - 2.0).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn prop_matches_two_pass(xs in vec(0.0f64..1e9, 2..500)) {
            let mut s = RunningStats::new();
            for &x in &xs {
                s.update(x);
            }

            let (mean, stddev) = two_pass(&xs);
            let tol = |v: f64| 1e-9 * v.abs().max(1.0);

            prop_assert_eq!(xs.len() as u64, s.count());
            prop_assert!((s.mean() - mean).abs() <= tol(mean));
            prop_assert!((s.sample_stddev() - stddev).abs() <= tol(stddev) + 1e-6);
        }
    }
}
