//! Single-pass streaming workload fingerprint (C6).
//!
//! `analyze_stream` consumes a validated `OperationRecord` iterator — CSV
//! parsing, file sizing, and any other external-collaborator concerns stay
//! out of this crate entirely and are treated as out of scope here.

#![warn(missing_docs)]

use std::collections::HashMap;

use hashmap_core::{hash_key, Key, Op, OperationRecord};
use serde::Serialize;

const HASH_BUCKET_BITS: u32 = 12;
const BUCKET_COUNT: usize = 1 << HASH_BUCKET_BITS;
const COVERAGE_TARGETS: [f64; 3] = [0.5, 0.8, 0.95];

/// Welford's online algorithm for count/mean/variance, used for both key
/// length and value size distributions.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// Fold in one observation.
    pub fn add(&mut self, x: f64) {
        if self.count == 0 {
            self.min = x;
            self.max = x;
        } else {
            self.min = self.min.min(x);
            self.max = self.max.max(x);
        }
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = x - self.mean;
        self.m2 += delta * delta2;
    }

    /// Sample standard deviation; 0.0 for fewer than two observations.
    pub fn stdev(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            (self.m2 / (self.count - 1) as f64).sqrt()
        }
    }

    /// Render as the summary shape used in `WorkloadDna`.
    pub fn summary(&self) -> StatsSummary {
        StatsSummary {
            count: self.count,
            min: if self.count == 0 { 0.0 } else { self.min },
            max: if self.count == 0 { 0.0 } else { self.max },
            mean: self.mean,
            stdev: self.stdev(),
        }
    }
}

/// JSON-serializable view of a [`RunningStats`].
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub stdev: f64,
}

/// A Misra-Gries-style frequency counter bounded to `max_tracked_keys`
/// distinct keys. When the tracked set would grow past the bound, every
/// counter is decremented and zeroed entries are dropped, guaranteeing
/// any key appearing more than `total_ops / max_tracked_keys` times
/// survives.
struct DecayCounter {
    max_tracked_keys: usize,
    counts: HashMap<Vec<u8>, u64>,
}

impl DecayCounter {
    fn new(max_tracked_keys: usize) -> Self {
        DecayCounter {
            max_tracked_keys: max_tracked_keys.max(1),
            counts: HashMap::new(),
        }
    }

    fn observe(&mut self, key: &[u8]) {
        *self.counts.entry(key.to_vec()).or_insert(0) += 1;
        if self.counts.len() > self.max_tracked_keys {
            self.decay();
        }
    }

    fn decay(&mut self) {
        self.counts.retain(|_, c| {
            *c -= 1;
            *c > 0
        });
    }
}

/// Extract the numeric token a key ends with: a fully numeric key parses
/// directly, otherwise the trailing run of ASCII digits is used. `None`
/// if the key has no trailing digits at all.
fn extract_numeric_token(key: &[u8]) -> Option<u64> {
    let s = std::str::from_utf8(key).ok()?;
    if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
        return s.parse().ok();
    }
    let digit_start = s
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)?;
    s[digit_start..].parse().ok()
}

fn shannon_entropy_bits(counts: &HashMap<Vec<u8>, u64>) -> f64 {
    let total: u64 = counts.values().sum();
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    -counts
        .values()
        .map(|&c| {
            let p = c as f64 / total;
            p * p.log2()
        })
        .sum::<f64>()
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = p.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
    }
}

/// Options controlling the analysis pass.
#[derive(Debug, Clone)]
pub struct WorkloadDnaConfig {
    /// Seed for the bucket-collision hash; should match the backend's
    /// `hash_seed` to make the collision histogram meaningful.
    pub hash_seed: u64,
    /// Bound on the number of distinct keys tracked by the decay counter
    /// and hot-key list.
    pub max_tracked_keys: usize,
    /// Number of hot keys to report, ranked by decayed frequency.
    pub hot_key_limit: usize,
}

impl Default for WorkloadDnaConfig {
    fn default() -> Self {
        WorkloadDnaConfig {
            hash_seed: 0x9E3779B97F4A7C15,
            max_tracked_keys: 10_000,
            hot_key_limit: 20,
        }
    }
}

/// A single-pass fingerprint of an operation stream, schema
/// `workload_dna.v1`.
#[derive(Debug, Clone, Serialize)]
pub struct WorkloadDna {
    pub schema: &'static str,
    pub total_rows: u64,
    pub op_counts: HashMap<&'static str, u64>,
    pub op_mix: HashMap<&'static str, f64>,
    pub mutation_fraction: f64,
    pub unique_keys_tracked: usize,
    pub key_length_stats: StatsSummary,
    pub value_size_stats: StatsSummary,
    pub key_entropy_bits: f64,
    pub key_entropy_normalised: f64,
    pub hot_keys: Vec<(String, u64)>,
    pub coverage_targets: HashMap<String, usize>,
    pub numeric_key_fraction: f64,
    pub sequential_numeric_step_fraction: f64,
    pub adjacent_duplicate_fraction: f64,
    pub bucket_counts: Vec<u32>,
    pub bucket_percentiles: HashMap<String, f64>,
    pub collision_depth_histogram: HashMap<u32, u32>,
    pub non_empty_buckets: usize,
    pub max_bucket_depth: u32,
}

/// Analyze a stream of operations in a single pass.
pub fn analyze_stream<I: Iterator<Item = OperationRecord>>(
    iter: I,
    config: &WorkloadDnaConfig,
) -> WorkloadDna {
    let mut total_rows: u64 = 0;
    let mut op_counts: HashMap<&'static str, u64> = HashMap::new();
    let mut key_stats = RunningStats::default();
    let mut value_stats = RunningStats::default();
    let mut decay = DecayCounter::new(config.max_tracked_keys);
    let mut numeric_keys: u64 = 0;
    let mut sequential_pairs: u64 = 0;
    let mut numeric_pairs: u64 = 0;
    let mut adjacent_duplicates: u64 = 0;
    let mut bucket_counts = vec![0u32; BUCKET_COUNT];

    let mut prev_key: Option<Key> = None;
    let mut prev_numeric: Option<u64> = None;

    for record in iter {
        total_rows += 1;
        *op_counts.entry(record.op.label()).or_insert(0) += 1;
        key_stats.add(record.key.as_bytes().len() as f64);
        if record.op == Op::Put {
            value_stats.add(record.value.as_bytes().len() as f64);
        }
        decay.observe(record.key.as_bytes());

        let bucket = (hash_key(config.hash_seed, record.key.as_bytes()) as usize)
            & (BUCKET_COUNT - 1);
        bucket_counts[bucket] += 1;

        let token = extract_numeric_token(record.key.as_bytes());
        if token.is_some() {
            numeric_keys += 1;
        }
        if let (Some(prev), Some(cur)) = (prev_numeric, token) {
            numeric_pairs += 1;
            if cur == prev + 1 {
                sequential_pairs += 1;
            }
        }
        if let Some(prev) = &prev_key {
            if prev.as_bytes() == record.key.as_bytes() {
                adjacent_duplicates += 1;
            }
        }

        prev_numeric = token;
        prev_key = Some(record.key.clone());
    }

    let total = total_rows.max(1) as f64;
    let op_mix: HashMap<&'static str, f64> = op_counts
        .iter()
        .map(|(k, v)| (*k, *v as f64 / total))
        .collect();
    let mutation_fraction = (*op_counts.get("put").unwrap_or(&0) as f64
        + *op_counts.get("del").unwrap_or(&0) as f64)
        / total;

    let entropy_bits = shannon_entropy_bits(&decay.counts);
    let unique_tracked = decay.counts.len();
    let entropy_normalised = if unique_tracked > 1 {
        entropy_bits / (unique_tracked as f64).log2()
    } else {
        0.0
    };

    let mut ranked: Vec<(&Vec<u8>, &u64)> = decay.counts.iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    let hot_keys: Vec<(String, u64)> = ranked
        .iter()
        .take(config.hot_key_limit)
        .map(|(k, c)| (String::from_utf8_lossy(k).into_owned(), **c))
        .collect();

    let mut coverage_targets = HashMap::new();
    let mut cumulative: u64 = 0;
    let mut target_idx = 0;
    for (i, (_, count)) in ranked.iter().enumerate() {
        cumulative += **count;
        while target_idx < COVERAGE_TARGETS.len()
            && cumulative as f64 / total >= COVERAGE_TARGETS[target_idx]
        {
            coverage_targets.insert(format!("p{}", (COVERAGE_TARGETS[target_idx] * 100.0) as u32), i + 1);
            target_idx += 1;
        }
    }
    while target_idx < COVERAGE_TARGETS.len() {
        coverage_targets.insert(
            format!("p{}", (COVERAGE_TARGETS[target_idx] * 100.0) as u32),
            ranked.len(),
        );
        target_idx += 1;
    }

    let non_empty_buckets = bucket_counts.iter().filter(|&&c| c > 0).count();
    let max_bucket_depth = bucket_counts.iter().copied().max().unwrap_or(0);

    let mut collision_depth_histogram: HashMap<u32, u32> = HashMap::new();
    for &c in &bucket_counts {
        if c > 0 {
            *collision_depth_histogram.entry(c).or_insert(0) += 1;
        }
    }

    let mut depths: Vec<f64> = bucket_counts.iter().map(|&c| c as f64).collect();
    depths.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mut bucket_percentiles = HashMap::new();
    for (label, p) in [("p50", 0.50), ("p75", 0.75), ("p90", 0.90), ("p95", 0.95), ("p99", 0.99)] {
        bucket_percentiles.insert(label.to_string(), percentile(&depths, p));
    }

    WorkloadDna {
        schema: "workload_dna.v1",
        total_rows,
        op_counts,
        op_mix,
        mutation_fraction,
        unique_keys_tracked: unique_tracked,
        key_length_stats: key_stats.summary(),
        value_size_stats: value_stats.summary(),
        key_entropy_bits: entropy_bits,
        key_entropy_normalised: entropy_normalised,
        hot_keys,
        coverage_targets,
        numeric_key_fraction: numeric_keys as f64 / total,
        sequential_numeric_step_fraction: if numeric_pairs > 0 {
            sequential_pairs as f64 / numeric_pairs as f64
        } else {
            0.0
        },
        adjacent_duplicate_fraction: adjacent_duplicates as f64 / total,
        bucket_counts,
        bucket_percentiles,
        collision_depth_histogram,
        non_empty_buckets,
        max_bucket_depth,
    }
}
