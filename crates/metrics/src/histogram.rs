//! Cumulative bucketed histograms, rendered into Prometheus exposition text:
//! a finite bound formats to six decimal places, the last bucket is always
//! labelled `+Inf`.

/// A cumulative histogram over a fixed, ascending set of bucket bounds.
#[derive(Debug, Clone)]
pub struct Histogram {
    bounds: Vec<f64>,
    counts: Vec<u64>,
    sum: f64,
    total: u64,
}

impl Histogram {
    /// Build a histogram with explicit ascending bucket bounds. The `+Inf`
    /// bucket is implicit and always equals `total`.
    pub fn with_bounds(bounds: Vec<f64>) -> Self {
        let n = bounds.len();
        Histogram {
            bounds,
            counts: vec![0; n],
            sum: 0.0,
            total: 0,
        }
    }

    /// Bucket bounds matching the general-purpose latency preset
    /// (milliseconds).
    pub fn default_bounds() -> Vec<f64> {
        vec![
            0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0,
        ]
    }

    /// Bucket bounds for sub-millisecond-dominated workloads.
    pub fn micro_bounds() -> Vec<f64> {
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 25.0]
    }

    /// Record one observation, incrementing every bucket whose bound is
    /// `>= value` (cumulative semantics).
    pub fn observe(&mut self, value: f64) {
        self.sum += value;
        self.total += 1;
        for (bound, count) in self.bounds.iter().zip(self.counts.iter_mut()) {
            if value <= *bound {
                *count += 1;
            }
        }
    }

    /// Whether any observation has been recorded.
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Total observation count.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Sum of all observed values.
    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// Bucket bounds paired with their cumulative counts, finite buckets
    /// only (the `+Inf` bucket is appended separately by the renderer).
    pub fn buckets(&self) -> impl Iterator<Item = (f64, u64)> + '_ {
        self.bounds.iter().copied().zip(self.counts.iter().copied())
    }

    /// Render a bucket bound the way the exposition format expects:
    /// `+Inf` for an infinite bound, six decimal places otherwise.
    pub fn bucket_label(bound: f64) -> String {
        if bound.is_infinite() {
            "+Inf".to_string()
        } else {
            format!("{bound:.6}")
        }
    }
}
