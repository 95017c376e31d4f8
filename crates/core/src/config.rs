//! Construction-time configuration for the backends and the supervisor.
//!
//! There is deliberately no environment-variable or file loading here —
//! thresholds are passed in by the embedding application. A TOML loader
//! belongs to the excluded CLI collaborator.

use crate::error::Error;

/// Which backend the supervisor starts in, absent a workload DNA
/// recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Two-level chaining (C1): insert-optimized.
    Chaining,
    /// Robin-Hood open addressing (C2): lookup-optimized.
    RobinHood,
}

impl BackendKind {
    /// Stable label used in tick records and log output.
    pub fn label(self) -> &'static str {
        match self {
            BackendKind::Chaining => "chaining",
            BackendKind::RobinHood => "robinhood",
        }
    }
}

/// Thresholds and sizing knobs for the adaptive supervisor and the two
/// backends it owns.
#[derive(Debug, Clone)]
pub struct AdaptiveConfig {
    /// Backend the supervisor boots into when no workload DNA is supplied.
    pub start_backend: BackendKind,
    /// Initial chaining outer-array length. Must be a power of two, >= 4.
    pub initial_buckets: usize,
    /// Maximum entries per chaining group before a new group is appended
    /// to the bucket; semantically a per-group capacity, not a count of
    /// groups.
    pub groups_per_bucket: usize,
    /// Initial Robin-Hood capacity. Must be a power of two, >= 8.
    pub initial_capacity_rh: usize,
    /// Chaining load factor (`n / outer_len`) that triggers migration.
    pub max_lf_chaining: f64,
    /// Chaining max group length that triggers migration even under the
    /// load-factor threshold.
    pub max_group_len_threshold: usize,
    /// Robin-Hood load factor (`n / cap`) that triggers growth.
    pub max_lf_open: f64,
    /// Robin-Hood average probe distance that triggers growth or
    /// compaction.
    pub max_avg_probe: f64,
    /// Robin-Hood tombstone ratio that triggers compaction.
    pub max_tombstone_ratio: f64,
    /// Number of source entries migrated per foreground operation.
    pub incremental_batch: usize,
    /// Seed for the process-wide key hash.
    pub hash_seed: u64,
    /// Migrate chaining -> robinhood on chronic collision pressure alone,
    /// even without tripping the load-factor guardrail. Off by default;
    /// see DESIGN.md.
    pub migrate_on_chronic_collisions: bool,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        AdaptiveConfig {
            start_backend: BackendKind::Chaining,
            initial_buckets: 8,
            groups_per_bucket: 8,
            initial_capacity_rh: 8,
            max_lf_chaining: 0.8,
            max_group_len_threshold: 8,
            max_lf_open: 0.85,
            max_avg_probe: 6.0,
            max_tombstone_ratio: 0.25,
            incremental_batch: 64,
            hash_seed: 0x9E3779B97F4A7C15,
            migrate_on_chronic_collisions: false,
        }
    }
}

impl AdaptiveConfig {
    /// Validate the configuration, returning the first violated constraint
    /// as a [`Error::BadInput`].
    pub fn validate(&self) -> Result<(), Error> {
        if self.initial_buckets < 4 || !self.initial_buckets.is_power_of_two() {
            return Err(Error::bad_input(
                "initial_buckets",
                "must be a power of two >= 4",
            ));
        }
        if self.groups_per_bucket == 0 {
            return Err(Error::bad_input("groups_per_bucket", "must be >= 1"));
        }
        if self.initial_capacity_rh < 8 || !self.initial_capacity_rh.is_power_of_two() {
            return Err(Error::bad_input(
                "initial_capacity_rh",
                "must be a power of two >= 8",
            ));
        }
        if !(self.max_lf_chaining > 0.0 && self.max_lf_chaining <= 4.0) {
            return Err(Error::bad_input("max_lf_chaining", "must be in (0, 4]"));
        }
        if self.max_group_len_threshold == 0 {
            return Err(Error::bad_input(
                "max_group_len_threshold",
                "must be >= 1",
            ));
        }
        if !(self.max_lf_open > 0.0 && self.max_lf_open < 1.0) {
            return Err(Error::bad_input("max_lf_open", "must be in (0, 1)"));
        }
        if self.max_avg_probe <= 0.0 {
            return Err(Error::bad_input("max_avg_probe", "must be > 0"));
        }
        if !(0.0..=1.0).contains(&self.max_tombstone_ratio) {
            return Err(Error::bad_input(
                "max_tombstone_ratio",
                "must be in [0, 1]",
            ));
        }
        if self.incremental_batch == 0 {
            return Err(Error::bad_input("incremental_batch", "must be >= 1"));
        }
        Ok(())
    }

    /// Smallest power of two that is `>= max(floor, ceil(1.3 * n))`.
    pub fn grown_capacity(floor: usize, n: usize) -> usize {
        let target = ((n as f64) * 1.3).ceil() as usize;
        target.max(floor).next_power_of_two()
    }
}
