//! Adaptive in-memory associative map.
//!
//! A thin facade over the workspace's per-concern crates: [`hashmap_core`]
//! for shared types and configuration, [`hashmap_chaining`] and
//! [`hashmap_robinhood`] for the two backends, [`hashmap_metrics`] for
//! latency/throughput/alerting, [`hashmap_workload`] for the streaming
//! workload fingerprint, and [`hashmap_supervisor`] for the hybrid map
//! that ties a backend pair together under a migration policy.
//!
//! Most callers only need [`AdaptiveHashMap`], which bundles a
//! [`HybridAdaptiveHashMap`] with its [`Metrics`] and [`ThresholdWatchdog`]
//! so a single `tick()` call both advances throughput smoothing and
//! re-evaluates alert thresholds.

#![warn(missing_docs)]

pub use hashmap_core::{AdaptiveConfig, BackendKind, Error, Key, Occupancy, Op, OperationRecord, Result, Value};
pub use hashmap_metrics::{Metrics, SummaryRecord, ThresholdWatchdog, TickRecord};
pub use hashmap_supervisor::{persistence, snapshot, Completion, HybridAdaptiveHashMap};
pub use hashmap_workload::{analyze_stream, WorkloadDna, WorkloadDnaConfig};

/// A hybrid map bundled with its metrics aggregator and watchdog, so a
/// caller drives all three from one `put`/`get`/`delete`/`tick` surface
/// instead of threading them through separately.
pub struct AdaptiveHashMap {
    map: HybridAdaptiveHashMap,
    metrics: Metrics,
    watchdog: ThresholdWatchdog,
}

impl AdaptiveHashMap {
    /// Build a new map from `config`, wiring the watchdog's thresholds to
    /// the same config values the supervisor uses for migration triggers.
    pub fn new(config: AdaptiveConfig) -> Self {
        let start_backend = config.start_backend;
        let ema_alpha = 0.25;
        let metrics = Metrics::new(ema_alpha, config.hash_seed, start_backend);
        let watchdog = ThresholdWatchdog::new(
            Some(config.max_lf_chaining.min(config.max_lf_open)),
            Some(config.max_avg_probe),
            Some(config.max_tombstone_ratio),
        );
        AdaptiveHashMap {
            map: HybridAdaptiveHashMap::new(config),
            metrics,
            watchdog,
        }
    }

    /// Insert or overwrite `key`, timing the operation into the metrics
    /// aggregator and mirroring any migration/compaction that completed
    /// as a side effect.
    pub fn put(&mut self, key: Key, value: Value, latency_ms: f64) {
        self.map.put(key, value);
        self.metrics.record_latency("put", latency_ms);
        self.record_completions();
    }

    /// Look up `key`, timing the operation into the metrics aggregator.
    pub fn get(&mut self, key: &Key, latency_ms: f64) -> Option<Value> {
        let result = self.map.get(key).cloned();
        self.metrics.record_latency("get", latency_ms);
        result
    }

    /// Remove `key` if present, timing the operation into the metrics
    /// aggregator and mirroring any migration/compaction that completed
    /// as a side effect.
    pub fn delete(&mut self, key: &Key, latency_ms: f64) -> bool {
        let removed = self.map.delete(key);
        self.metrics.record_latency("del", latency_ms);
        self.record_completions();
        removed
    }

    fn record_completions(&mut self) {
        for completion in self.map.drain_completions() {
            match completion {
                Completion::Migration => self.metrics.record_migration(),
                Completion::Compaction => self.metrics.record_compaction(),
            }
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the map holds no entries.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// All live entries.
    pub fn items(&self) -> Vec<(Key, Value)> {
        self.map.items()
    }

    /// Refresh occupancy gauges, re-evaluate the watchdog, advance EMA
    /// throughput, and return the resulting tick record. The watchdog runs
    /// against the fresh gauges before the tick record is built, so
    /// `alert_flags`/`alerts` on the returned record reflect this
    /// evaluation rather than the previous one.
    pub fn tick(&mut self, timestamp: f64, ops_per_second_hint: Option<f64>) -> TickRecord {
        let occ = self.map.occupancy();
        self.metrics.set_occupancy(occ, self.map.backend_label());
        let gauges = self.metrics.gauge_readout();
        for (name, active) in self.watchdog.evaluate(&gauges) {
            self.metrics.set_alert_flag(name, active);
        }
        self.metrics.tick(timestamp, ops_per_second_hint)
    }

    /// Roll the run up into a summary record.
    pub fn summary(&self) -> SummaryRecord {
        self.metrics.summary()
    }

    /// Render current state as Prometheus exposition text.
    pub fn render_prometheus(&self) -> String {
        self.metrics.render_prometheus()
    }

    /// Whether a migration is currently in flight.
    pub fn is_migrating(&self) -> bool {
        self.map.is_migrating()
    }

    /// Force a migration to `target`, bypassing the usual trigger rules.
    pub fn begin_migration_now(&mut self, target: BackendKind) -> Result<()> {
        self.map.begin_migration_now(target)
    }

    /// Write a framed snapshot of the current entries to `path`.
    pub fn save_snapshot(&self, path: impl AsRef<std::path::Path>, compress: bool) -> Result<()> {
        persistence::save(&self.map, path, compress)
    }

    /// Replace this map's contents with a framed snapshot loaded from
    /// `path`, rebuilt under `config`.
    pub fn load_snapshot(config: AdaptiveConfig, path: impl AsRef<std::path::Path>) -> Result<HybridAdaptiveHashMap> {
        persistence::load(config, path)
    }
}
