//! Latency tracking, counters/gauges, Prometheus exposition, and threshold
//! alerting for one running backend (C3-C5).

#![warn(missing_docs)]

pub mod aggregator;
pub mod histogram;
pub mod reservoir;
pub mod watchdog;

pub use aggregator::{
    clamp_ema_alpha, GaugeReadout, HistBucket, LatencyPercentiles, Metrics, OpCounts, SummaryRecord, TickRecord,
};
pub use histogram::Histogram;
pub use reservoir::Reservoir;
pub use watchdog::ThresholdWatchdog;
