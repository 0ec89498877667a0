//! Bounded-memory latency sampling.
//!
//! Classic reservoir sampling: the i-th observation is stored directly while
//! the reservoir has room; afterwards it replaces a uniformly-chosen slot
//! with probability `K/i`, so every observation seen so far has an equal
//! `K/i` chance of surviving in the sample.
//!
//! Percentiles estimated from the sample are an approximation. For small or
//! highly skewed populations they can be noticeably off; that is acceptable
//! here because the collector feeds trend reporting, not audit-grade numbers.

use rand::Rng;

/// Fixed-capacity uniform sample of a value stream.
#[derive(Debug, Clone)]
pub struct Reservoir {
    values: Vec<u64>,
    capacity: usize,
    seen: u64,
}

impl Reservoir {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "reservoir capacity must be positive");
        Self {
            values: Vec::with_capacity(capacity),
            capacity,
            seen: 0,
        }
    }

    pub fn record(&mut self, value: u64, rng: &mut impl Rng) {
        self.seen += 1;
        if self.values.len() < self.capacity {
            self.values.push(value);
        } else {
            // gen_range(0..seen) < capacity happens with probability K/i.
            let slot = rng.gen_range(0..self.seen);
            if (slot as usize) < self.capacity {
                self.values[slot as usize] = value;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Total observations offered, including those not retained.
    pub fn seen(&self) -> u64 {
        self.seen
    }

    /// The live sample. Callers wanting percentiles must copy; see
    /// [`percentile`].
    pub fn sample(&self) -> &[u64] {
        &self.values
    }
}

/// The `ceil(p/100 * n)`-th order statistic (1-indexed, clamped to the sample)
/// of `values`. Returns 0 for an empty sample. Sorts a defensive copy; the
/// input is never reordered.
pub fn percentile(values: &[u64], p: f64) -> u64 {
    if values.is_empty() {
        return 0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();

    let rank = ((p / 100.0) * sorted.len() as f64).ceil() as isize - 1;
    let index = rank.clamp(0, sorted.len() as isize - 1) as usize;
    sorted[index]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn holds_everything_below_capacity() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut reservoir = Reservoir::new(1000);
        for v in 0..600u64 {
            reservoir.record(v, &mut rng);
        }
        assert_eq!(reservoir.len(), 600);
        let mut sample = reservoir.sample().to_vec();
        sample.sort_unstable();
        assert_eq!(sample, (0..600).collect::<Vec<_>>());
    }

    #[test]
    fn never_exceeds_capacity() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut reservoir = Reservoir::new(1000);
        for v in 0..50_000u64 {
            reservoir.record(v, &mut rng);
        }
        assert_eq!(reservoir.len(), 1000);
        assert_eq!(reservoir.seen(), 50_000);
    }

    #[test]
    fn late_observations_do_enter_the_sample() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut reservoir = Reservoir::new(100);
        for _ in 0..1_000 {
            reservoir.record(0, &mut rng);
        }
        for _ in 0..9_000 {
            reservoir.record(1, &mut rng);
        }
        assert!(reservoir.sample().contains(&1));
    }

    #[test]
    fn median_of_small_sample() {
        // {3,1,5,2,4}: ceil(0.5 * 5) = 3rd order statistic = 3.
        for order in [[3, 1, 5, 2, 4], [5, 4, 3, 2, 1], [1, 2, 3, 4, 5]] {
            assert_eq!(percentile(&order, 50.0), 3);
        }
    }

    #[test]
    fn empty_sample_yields_zero() {
        assert_eq!(percentile(&[], 50.0), 0);
        assert_eq!(percentile(&[], 99.0), 0);
    }

    #[test]
    fn extreme_percentiles_clamp_to_the_sample() {
        let values = [10, 20, 30];
        assert_eq!(percentile(&values, 0.0), 10);
        assert_eq!(percentile(&values, 100.0), 30);
        assert_eq!(percentile(&values, 99.0), 30);
    }

    #[test]
    fn percentile_does_not_reorder_input() {
        let values = [3, 1, 2];
        percentile(&values, 50.0);
        assert_eq!(values, [3, 1, 2]);
    }
}
