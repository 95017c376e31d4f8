//! Fixed-size uniform reservoir sampling (Algorithm R), one reservoir per
//! operation kind, seeded so percentile reads are reproducible across runs
//! of the same workload.

use rand::Rng;
use rand_pcg::Pcg64;

type Rng64 = Pcg64;

/// A fixed-capacity uniform sample of observed latencies.
#[derive(Debug, Clone)]
pub struct Reservoir {
    capacity: usize,
    samples: Vec<f64>,
    seen: u64,
    rng: Rng64,
}

impl Reservoir {
    /// Build a reservoir holding at most `capacity` samples, seeded from
    /// `seed`.
    pub fn new(seed: u64, capacity: usize) -> Self {
        Reservoir {
            capacity: capacity.max(1),
            samples: Vec::with_capacity(capacity.max(1)),
            seen: 0,
            rng: Rng64::new(seed as u128, 0xa02b_dbf7_bb3c_0a7a),
        }
    }

    /// Record one observation.
    pub fn observe(&mut self, value: f64) {
        self.seen += 1;
        if self.samples.len() < self.capacity {
            self.samples.push(value);
        } else {
            let j = self.rng.gen_range(0..self.seen);
            if (j as usize) < self.capacity {
                self.samples[j as usize] = value;
            }
        }
    }

    /// Total observations seen, including ones evicted from the sample.
    pub fn observed_count(&self) -> u64 {
        self.seen
    }

    /// Number of samples currently held.
    pub fn sample_len(&self) -> usize {
        self.samples.len()
    }

    /// `p` in `[0.0, 1.0]`, linear interpolation between order statistics.
    /// `None` when no samples have been recorded.
    pub fn percentile(&self, p: f64) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let mut sorted = self.samples.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        Some(interpolate(&sorted, p))
    }

    /// Convenience accessor for p50/p90/p99, the triple rendered in tick
    /// records and Prometheus output.
    pub fn summary(&self) -> Option<(f64, f64, f64)> {
        if self.samples.is_empty() {
            return None;
        }
        Some((
            self.percentile(0.50).unwrap(),
            self.percentile(0.90).unwrap(),
            self.percentile(0.99).unwrap(),
        ))
    }
}

fn interpolate(sorted: &[f64], p: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0];
    }
    let p = p.clamp(0.0, 1.0);
    let rank = p * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = rank - lo as f64;
        sorted[lo] + (sorted[hi] - sorted[lo]) * frac
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_reservoir_has_no_percentile() {
        let r = Reservoir::new(1, 10);
        assert_eq!(r.percentile(0.5), None);
    }

    #[test]
    fn reservoir_within_capacity_keeps_all_samples() {
        let mut r = Reservoir::new(1, 100);
        for i in 0..50 {
            r.observe(i as f64);
        }
        assert_eq!(r.sample_len(), 50);
        assert_eq!(r.observed_count(), 50);
    }

    #[test]
    fn reservoir_beyond_capacity_caps_sample_size() {
        let mut r = Reservoir::new(7, 20);
        for i in 0..1000 {
            r.observe(i as f64);
        }
        assert_eq!(r.sample_len(), 20);
        assert_eq!(r.observed_count(), 1000);
    }

    #[test]
    fn percentile_of_uniform_run_is_monotonic() {
        let mut r = Reservoir::new(3, 200);
        for i in 0..200 {
            r.observe(i as f64);
        }
        let (p50, p90, p99) = r.summary().unwrap();
        assert!(p50 < p90);
        assert!(p90 < p99);
    }

    #[test]
    fn same_seed_same_observations_are_deterministic() {
        let mut a = Reservoir::new(42, 5);
        let mut b = Reservoir::new(42, 5);
        for i in 0..100 {
            a.observe(i as f64);
            b.observe(i as f64);
        }
        assert_eq!(a.summary(), b.summary());
    }
}
