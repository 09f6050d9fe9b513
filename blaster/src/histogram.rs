use core::hash::Hash;
use std::collections::HashMap;

/// Tally of outcomes by status.
///
/// One entry per distinct status observed, no eviction.
#[derive(Debug, Clone)]
pub struct OutcomeHistogram<S> {
    counts: HashMap<S, u64>,
}

impl<S> Default for OutcomeHistogram<S> {
    fn default() -> Self {
        Self { counts: HashMap::new() }
    }
}

impl<S> OutcomeHistogram<S>
where
    S: Eq + Hash,
{
    #[inline]
    pub fn increment(&mut self, status: S) {
        *self.counts.entry(status).or_insert(0) += 1;
    }

    #[inline]
    pub fn get(&self, status: &S) -> u64 {
        self.counts.get(status).copied().unwrap_or(0)
    }

    /// Sum of all counts.
    #[inline]
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&S, u64)> {
        self.counts.iter().map(|(s, &n)| (s, n))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_increment() {
        let mut h = OutcomeHistogram::default();
        for s in ["", "timeout", "timeout", ""] {
            h.increment(s);
        }

        assert_eq!(2, h.get(&""));
        assert_eq!(2, h.get(&"timeout"));
        assert_eq!(0, h.get(&"read error"));
        assert_eq!(4, h.total());
        assert_eq!(2, h.iter().count());
    }

    #[test]
    fn test_empty() {
        let h: OutcomeHistogram<u8> = OutcomeHistogram::default();
        assert!(h.is_empty());
        assert_eq!(0, h.total());
    }
}
