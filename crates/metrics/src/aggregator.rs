//! Counters, gauges, latency tracking, and Prometheus exposition.
//!
//! The tick/summary records carry a `schema` tag so downstream consumers
//! can version-check the payload, plus a flat set of fields mirroring the
//! Prometheus metric names one-for-one.

use std::collections::HashMap;

use hashmap_core::BackendKind;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::histogram::Histogram;
use crate::reservoir::Reservoir;

const RESERVOIR_CAPACITY: usize = 1024;
const OP_KINDS: [&str; 4] = ["put", "get", "del", "overall"];

/// Per-operation-type counts, keyed the way the tick schema requires.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct OpCounts {
    pub put: u64,
    pub get: u64,
    pub del: u64,
}

/// Reservoir-sampled latency percentiles for one op kind.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct LatencyPercentiles {
    pub p50: f64,
    pub p90: f64,
    pub p99: f64,
}

/// One cumulative histogram bucket. `le` is a finite bound or the JSON
/// string `"+Inf"`.
#[derive(Debug, Clone, Serialize)]
pub struct HistBucket {
    pub le: JsonValue,
    pub count: u64,
}

/// A snapshot of the gauges a [`crate::watchdog::ThresholdWatchdog`] reads,
/// taken independently of tick construction so alert state can be folded
/// into the same tick it was evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct GaugeReadout {
    pub load_factor: f64,
    pub avg_probe_estimate: Option<f64>,
    pub tombstone_ratio: Option<f64>,
}

/// One JSON-serializable tick snapshot, schema `metrics.v1`.
#[derive(Debug, Clone, Serialize)]
pub struct TickRecord {
    /// Always `"metrics.v1"`.
    pub schema: &'static str,
    /// Monotonic-ish wall-clock seconds.
    pub t: f64,
    /// `"chaining"`, `"robinhood"`, or an `"adaptive:..."` string while a
    /// migration is in flight.
    pub backend: String,
    /// Cumulative operation count at this tick, used to derive throughput.
    pub ops: u64,
    /// Cumulative per-op-kind counts.
    pub ops_by_type: OpCounts,
    /// Current backend load factor.
    pub load_factor: f64,
    /// Current backend tombstone ratio. `0.0` for a backend that doesn't
    /// track tombstones.
    pub tombstone_ratio: f64,
    /// Reservoir-sampled percentiles per op kind, including `"overall"`.
    pub latency_ms: HashMap<&'static str, LatencyPercentiles>,
    /// Cumulative histogram buckets per op kind, including `"overall"`.
    pub latency_hist_ms: HashMap<&'static str, Vec<HistBucket>>,
    /// Cumulative completed migrations.
    pub migrations: u64,
    /// Cumulative completed compactions.
    pub compactions: u64,
    /// Longest chaining group, when the active backend is chaining.
    pub max_group_len: Option<usize>,
    /// Mean Robin-Hood probe distance, when the active backend is
    /// Robin-Hood.
    pub avg_probe_estimate: Option<f64>,
    /// Names of alerts currently active.
    pub alerts: Vec<String>,
    /// Every watched alert's current state, including cleared ones.
    pub alert_flags: HashMap<String, bool>,
    /// Domain events (`migration_completed`, `compaction_completed`, ...)
    /// that occurred since the previous tick.
    pub events: Vec<String>,
    /// Instantaneous ops/sec derived from this tick's ops delta, before EMA
    /// smoothing.
    pub ops_per_second_instant: Option<f64>,
    /// EMA-smoothed operations per second. `None` until the first tick
    /// after construction establishes a time baseline.
    pub ops_per_second_ema: Option<f64>,
}

/// A rollup record emitted at the end of a run, schema
/// `metrics.summary.v1`.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryRecord {
    /// Always `"metrics.summary.v1"`.
    pub schema: &'static str,
    /// Total ticks folded into this summary.
    pub ticks: u64,
    /// Final cumulative counters.
    pub ops_total: u64,
    pub puts_total: u64,
    pub gets_total: u64,
    pub dels_total: u64,
    pub migrations_total: u64,
    pub compactions_total: u64,
    /// Final EMA throughput, if ever established.
    pub ops_per_second: Option<f64>,
}

/// EMA smoothing factor, clamped into `[0, 1]`, defaulting to `0.25` for
/// non-finite input. The core never reads environment variables to pick
/// this — the embedder passes it in explicitly.
pub fn clamp_ema_alpha(alpha: f64) -> f64 {
    if !alpha.is_finite() {
        return 0.25;
    }
    alpha.clamp(0.0, 1.0)
}

/// Counters, gauges, latency reservoirs/histograms, and EMA throughput
/// state for one running backend.
pub struct Metrics {
    ema_alpha: f64,

    ops_total: u64,
    puts_total: u64,
    gets_total: u64,
    dels_total: u64,
    migrations_total: u64,
    compactions_total: u64,

    backend_name: String,
    load_factor: f64,
    max_group_len: Option<usize>,
    avg_probe_estimate: Option<f64>,
    tombstone_ratio: Option<f64>,

    last_timestamp: Option<f64>,
    last_ops_total: u64,
    ops_per_second: Option<f64>,

    reservoirs: HashMap<&'static str, Reservoir>,
    histograms: HashMap<&'static str, Histogram>,

    alert_flags: HashMap<String, bool>,
    pending_events: Vec<String>,

    tick_count: u64,
}

impl Metrics {
    /// Build a fresh aggregator. `hash_seed` only seeds the latency
    /// reservoirs, not the backend's key hash.
    pub fn new(ema_alpha: f64, hash_seed: u64, start_backend: BackendKind) -> Self {
        let mut reservoirs = HashMap::new();
        let mut histograms = HashMap::new();
        for op in OP_KINDS {
            reservoirs.insert(op, Reservoir::new(hash_seed, RESERVOIR_CAPACITY));
            histograms.insert(op, Histogram::with_bounds(Histogram::default_bounds()));
        }
        Metrics {
            ema_alpha: clamp_ema_alpha(ema_alpha),
            ops_total: 0,
            puts_total: 0,
            gets_total: 0,
            dels_total: 0,
            migrations_total: 0,
            compactions_total: 0,
            backend_name: start_backend.label().to_string(),
            load_factor: 0.0,
            max_group_len: None,
            avg_probe_estimate: None,
            tombstone_ratio: None,
            last_timestamp: None,
            last_ops_total: 0,
            ops_per_second: None,
            reservoirs,
            histograms,
            alert_flags: HashMap::new(),
            pending_events: Vec::new(),
            tick_count: 0,
        }
    }

    /// Record a completed operation's latency, in milliseconds. `op` must
    /// be one of `"put"`, `"get"`, `"del"`; every observation also feeds
    /// the `"overall"` reservoir and histogram.
    pub fn record_latency(&mut self, op: &'static str, latency_ms: f64) {
        match op {
            "put" => self.puts_total += 1,
            "get" => self.gets_total += 1,
            "del" => self.dels_total += 1,
            _ => {}
        }
        self.ops_total += 1;
        for kind in [op, "overall"] {
            if let Some(r) = self.reservoirs.get_mut(kind) {
                r.observe(latency_ms);
            }
            if let Some(h) = self.histograms.get_mut(kind) {
                h.observe(latency_ms);
            }
        }
    }

    /// Record a completed migration finishing (the whole migration, not a
    /// single incrementally-moved entry), queuing a `migration_completed`
    /// event for the next tick.
    pub fn record_migration(&mut self) {
        self.migrations_total += 1;
        self.pending_events.push("migration_completed".to_string());
    }

    /// Record a completed compaction, queuing a `compaction_completed`
    /// event for the next tick.
    pub fn record_compaction(&mut self) {
        self.compactions_total += 1;
        self.pending_events.push("compaction_completed".to_string());
    }

    /// Update the backend occupancy gauges for the next tick.
    pub fn set_occupancy(&mut self, occ: hashmap_core::Occupancy, backend_name: impl Into<String>) {
        self.backend_name = backend_name.into();
        self.load_factor = occ.load_factor;
        self.max_group_len = occ.max_group_len;
        self.avg_probe_estimate = occ.avg_probe_estimate;
        self.tombstone_ratio = occ.tombstone_ratio;
    }

    /// Current gauge values, for feeding a [`crate::watchdog::ThresholdWatchdog`]
    /// ahead of [`Metrics::tick`] so the resulting tick record already
    /// reflects this evaluation's alert transitions.
    pub fn gauge_readout(&self) -> GaugeReadout {
        GaugeReadout {
            load_factor: self.load_factor,
            avg_probe_estimate: self.avg_probe_estimate,
            tombstone_ratio: self.tombstone_ratio,
        }
    }

    /// Set or clear an alert flag, as reported by the watchdog.
    pub fn set_alert_flag(&mut self, name: impl Into<String>, active: bool) {
        self.alert_flags.insert(name.into(), active);
    }

    /// Currently active alert flags.
    pub fn alert_flags(&self) -> &HashMap<String, bool> {
        &self.alert_flags
    }

    /// Advance the EMA throughput estimate and emit a tick record.
    ///
    /// Fallback chain: if a previous tick established a time baseline,
    /// derive the instantaneous rate from the ops delta over the clamped
    /// time delta; otherwise fall back to `ops_per_second_hint` if the
    /// caller supplied one, else leave the EMA unestablished.
    pub fn tick(&mut self, timestamp: f64, ops_per_second_hint: Option<f64>) -> TickRecord {
        self.tick_count += 1;

        let instantaneous = match self.last_timestamp {
            Some(last) => {
                let dt = (timestamp - last).clamp(0.001, 10.0);
                let delta_ops = self.ops_total.saturating_sub(self.last_ops_total);
                Some(delta_ops as f64 / dt)
            }
            None => ops_per_second_hint,
        };

        if let Some(instantaneous) = instantaneous {
            self.ops_per_second = Some(match self.ops_per_second {
                Some(prev) => self.ema_alpha * instantaneous + (1.0 - self.ema_alpha) * prev,
                None => instantaneous,
            });
        }

        self.last_timestamp = Some(timestamp);
        self.last_ops_total = self.ops_total;

        let mut latency_ms = HashMap::new();
        let mut latency_hist_ms = HashMap::new();
        for op in OP_KINDS {
            let reservoir = self.reservoirs.get(op).expect("every op kind has a reservoir");
            if let Some((p50, p90, p99)) = reservoir.summary() {
                latency_ms.insert(op, LatencyPercentiles { p50, p90, p99 });
            }
            let hist = self.histograms.get(op).expect("every op kind has a histogram");
            if !hist.is_empty() {
                let mut buckets: Vec<HistBucket> = hist
                    .buckets()
                    .map(|(bound, count)| HistBucket {
                        le: JsonValue::from(bound),
                        count,
                    })
                    .collect();
                buckets.push(HistBucket {
                    le: JsonValue::from("+Inf"),
                    count: hist.total(),
                });
                latency_hist_ms.insert(op, buckets);
            }
        }

        let alerts: Vec<String> = {
            let mut names: Vec<&String> = self
                .alert_flags
                .iter()
                .filter(|(_, active)| **active)
                .map(|(name, _)| name)
                .collect();
            names.sort();
            names.into_iter().cloned().collect()
        };

        TickRecord {
            schema: "metrics.v1",
            t: timestamp,
            backend: self.backend_name.clone(),
            ops: self.ops_total,
            ops_by_type: OpCounts {
                put: self.puts_total,
                get: self.gets_total,
                del: self.dels_total,
            },
            load_factor: self.load_factor,
            tombstone_ratio: self.tombstone_ratio.unwrap_or(0.0),
            latency_ms,
            latency_hist_ms,
            migrations: self.migrations_total,
            compactions: self.compactions_total,
            max_group_len: self.max_group_len,
            avg_probe_estimate: self.avg_probe_estimate,
            alerts,
            alert_flags: self.alert_flags.clone(),
            events: self.pending_events.drain(..).collect(),
            ops_per_second_instant: instantaneous,
            ops_per_second_ema: self.ops_per_second,
        }
    }

    /// Roll the whole run up into a summary record.
    pub fn summary(&self) -> SummaryRecord {
        SummaryRecord {
            schema: "metrics.summary.v1",
            ticks: self.tick_count,
            ops_total: self.ops_total,
            puts_total: self.puts_total,
            gets_total: self.gets_total,
            dels_total: self.dels_total,
            migrations_total: self.migrations_total,
            compactions_total: self.compactions_total,
            ops_per_second: self.ops_per_second,
        }
    }

    /// Render the current state as Prometheus exposition text. Metric
    /// order is fixed so repeated scrapes diff cleanly; zero-observation
    /// histograms are suppressed entirely rather than emitted empty.
    pub fn render_prometheus(&self) -> String {
        let mut out = String::new();

        push_counter(&mut out, "hashmap_ops_total", "Total operations processed.", self.ops_total);
        push_counter(&mut out, "hashmap_puts_total", "Total put operations.", self.puts_total);
        push_counter(&mut out, "hashmap_gets_total", "Total get operations.", self.gets_total);
        push_counter(&mut out, "hashmap_dels_total", "Total delete operations.", self.dels_total);
        push_counter(
            &mut out,
            "hashmap_migrations_total",
            "Total completed backend migrations.",
            self.migrations_total,
        );
        push_counter(
            &mut out,
            "hashmap_compactions_total",
            "Total completed Robin-Hood compactions.",
            self.compactions_total,
        );

        push_gauge(&mut out, "hashmap_load_factor", "Current backend load factor.", self.load_factor);
        if let Some(v) = self.max_group_len {
            push_gauge(
                &mut out,
                "hashmap_max_group_len",
                "Longest chaining group currently present.",
                v as f64,
            );
        }
        if let Some(v) = self.avg_probe_estimate {
            push_gauge(
                &mut out,
                "hashmap_avg_probe_estimate",
                "Mean Robin-Hood probe distance over occupied slots.",
                v,
            );
        }
        if let Some(v) = self.tombstone_ratio {
            push_gauge(
                &mut out,
                "hashmap_tombstone_ratio",
                "Fraction of Robin-Hood slots holding a tombstone.",
                v,
            );
        }

        out.push_str("# HELP hashmap_backend_info Active backend identity.\n");
        out.push_str("# TYPE hashmap_backend_info gauge\n");
        out.push_str(&format!(
            "hashmap_backend_info{{name=\"{}\"}} 1\n",
            self.backend_name
        ));

        if let Some(ops) = self.ops_per_second {
            push_gauge(
                &mut out,
                "hashmap_ops_per_second",
                "EMA-smoothed operation throughput.",
                ops,
            );
        }

        let mut op_names: Vec<&&'static str> = self.reservoirs.keys().collect();
        op_names.sort();

        let mut percentiles_emitted = false;
        for op in &op_names {
            if let Some((p50, p90, p99)) = self.reservoirs[*op].summary() {
                if !percentiles_emitted {
                    out.push_str("# HELP hashmap_latency_ms Reservoir-sampled latency percentiles.\n");
                    out.push_str("# TYPE hashmap_latency_ms gauge\n");
                    percentiles_emitted = true;
                }
                out.push_str(&format!("hashmap_latency_ms{{op=\"{op}\",quantile=\"p50\"}} {p50:.6}\n"));
                out.push_str(&format!("hashmap_latency_ms{{op=\"{op}\",quantile=\"p90\"}} {p90:.6}\n"));
                out.push_str(&format!("hashmap_latency_ms{{op=\"{op}\",quantile=\"p99\"}} {p99:.6}\n"));
            }
        }

        let mut histogram_emitted = false;
        for op in &op_names {
            let hist = &self.histograms[*op];
            if hist.is_empty() {
                continue;
            }
            if !histogram_emitted {
                out.push_str("# HELP hashmap_latency_ms_hist Operation latency in milliseconds.\n");
                out.push_str("# TYPE hashmap_latency_ms_hist histogram\n");
                histogram_emitted = true;
            }
            for (bound, count) in hist.buckets() {
                out.push_str(&format!(
                    "hashmap_latency_ms_hist_bucket{{op=\"{op}\",le=\"{}\"}} {count}\n",
                    Histogram::bucket_label(bound)
                ));
            }
            out.push_str(&format!(
                "hashmap_latency_ms_hist_bucket{{op=\"{op}\",le=\"+Inf\"}} {}\n",
                hist.total()
            ));
            out.push_str(&format!("hashmap_latency_ms_hist_sum{{op=\"{op}\"}} {:.6}\n", hist.sum()));
            out.push_str(&format!("hashmap_latency_ms_hist_count{{op=\"{op}\"}} {}\n", hist.total()));
        }

        if !self.alert_flags.is_empty() {
            out.push_str("# HELP hashmap_alert_flags Active watchdog alerts (1=active, 0=cleared).\n");
            out.push_str("# TYPE hashmap_alert_flags gauge\n");
            let mut names: Vec<&String> = self.alert_flags.keys().collect();
            names.sort();
            for name in names {
                let v = if self.alert_flags[name] { 1 } else { 0 };
                out.push_str(&format!("hashmap_alert_flags{{metric=\"{name}\"}} {v}\n"));
            }
        }

        out
    }
}

fn push_counter(out: &mut String, name: &str, help: &str, value: u64) {
    out.push_str(&format!("# HELP {name} {help}\n"));
    out.push_str(&format!("# TYPE {name} counter\n"));
    out.push_str(&format!("{name} {value}\n"));
}

fn push_gauge(out: &mut String, name: &str, help: &str, value: f64) {
    out.push_str(&format!("# HELP {name} {help}\n"));
    out.push_str(&format!("# TYPE {name} gauge\n"));
    out.push_str(&format!("{name} {value:.6}\n"));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ema_alpha_clamps_out_of_range_values() {
        assert_eq!(clamp_ema_alpha(-1.0), 0.0);
        assert_eq!(clamp_ema_alpha(2.0), 1.0);
        assert_eq!(clamp_ema_alpha(f64::NAN), 0.25);
    }

    #[test]
    fn first_tick_with_no_hint_leaves_throughput_unestablished() {
        let mut m = Metrics::new(0.25, 1, BackendKind::Chaining);
        let tick = m.tick(1.0, None);
        assert_eq!(tick.ops_per_second_ema, None);
    }

    #[test]
    fn first_tick_with_hint_seeds_throughput() {
        let mut m = Metrics::new(0.25, 1, BackendKind::Chaining);
        let tick = m.tick(1.0, Some(100.0));
        assert_eq!(tick.ops_per_second_ema, Some(100.0));
    }

    #[test]
    fn subsequent_ticks_derive_rate_from_ops_delta() {
        let mut m = Metrics::new(1.0, 1, BackendKind::Chaining);
        m.record_latency("put", 1.0);
        m.tick(0.0, None);
        for _ in 0..10 {
            m.record_latency("put", 1.0);
        }
        let tick = m.tick(1.0, None);
        assert_eq!(tick.ops_per_second_ema, Some(10.0));
    }

    #[test]
    fn overall_reservoir_is_fed_by_every_op_kind() {
        let mut m = Metrics::new(0.25, 1, BackendKind::Chaining);
        m.record_latency("put", 1.0);
        m.record_latency("get", 2.0);
        m.record_latency("del", 3.0);
        let tick = m.tick(0.0, None);
        assert_eq!(tick.latency_ms["overall"].p50, 2.0);
        assert_eq!(tick.latency_hist_ms["overall"].last().unwrap().count, 3);
    }

    #[test]
    fn tick_schema_carries_required_fields() {
        let mut m = Metrics::new(0.25, 1, BackendKind::Chaining);
        m.record_latency("put", 1.0);
        let tick = m.tick(0.0, None);
        assert_eq!(tick.schema, "metrics.v1");
        assert_eq!(tick.ops, 1);
        assert_eq!(tick.ops_by_type.put, 1);
        assert_eq!(tick.ops_by_type.get, 0);
        assert_eq!(tick.backend, "chaining");
    }

    #[test]
    fn migration_completion_is_counted_and_emitted_as_an_event() {
        let mut m = Metrics::new(0.25, 1, BackendKind::Chaining);
        m.record_migration();
        let tick = m.tick(0.0, None);
        assert_eq!(tick.migrations, 1);
        assert_eq!(tick.events, vec!["migration_completed".to_string()]);
        // Events are drained, not repeated on the next tick.
        let tick2 = m.tick(1.0, None);
        assert!(tick2.events.is_empty());
    }

    #[test]
    fn render_prometheus_suppresses_histograms_with_no_observations() {
        let m = Metrics::new(0.25, 1, BackendKind::Chaining);
        let text = m.render_prometheus();
        assert!(!text.contains("hashmap_latency_ms_hist_bucket"));
        assert!(text.contains("hashmap_ops_total 0"));
    }

    #[test]
    fn render_prometheus_includes_backend_info_and_counts() {
        let mut m = Metrics::new(0.25, 1, BackendKind::RobinHood);
        m.record_latency("get", 2.5);
        let text = m.render_prometheus();
        assert!(text.contains("hashmap_backend_info{name=\"robinhood\"} 1"));
        assert!(text.contains("hashmap_gets_total 1"));
        assert!(text.contains("hashmap_latency_ms_hist_bucket{op=\"get\",le=\"+Inf\"} 1"));
        assert!(text.contains("hashmap_latency_ms_hist_bucket{op=\"overall\",le=\"+Inf\"} 1"));
    }

    #[test]
    fn render_prometheus_uses_pnn_quantile_labels() {
        let mut m = Metrics::new(0.25, 1, BackendKind::Chaining);
        m.record_latency("put", 1.0);
        let text = m.render_prometheus();
        assert!(text.contains("hashmap_latency_ms{op=\"put\",quantile=\"p50\"}"));
        assert!(text.contains("hashmap_latency_ms{op=\"put\",quantile=\"p90\"}"));
        assert!(text.contains("hashmap_latency_ms{op=\"put\",quantile=\"p99\"}"));
        assert!(!text.contains("quantile=\"0.5\""));
    }

    #[test]
    fn alert_flags_render_sorted_and_only_when_present() {
        let mut m = Metrics::new(0.25, 1, BackendKind::Chaining);
        assert!(!m.render_prometheus().contains("hashmap_alert_flags"));
        m.set_alert_flag("load_factor", true);
        let text = m.render_prometheus();
        assert!(text.contains("hashmap_alert_flags{metric=\"load_factor\"} 1"));
    }
}
