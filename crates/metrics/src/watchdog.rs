//! Threshold-based alerting over backend gauges: each watched metric toggles
//! an alert flag on a rising edge (crossing at or above its threshold) and
//! clears it on a falling edge, logging both transitions. Non-finite
//! readings (NaN, +-inf) are treated as "no signal" rather than tripping
//! an alert.

use tracing::{info, warn};

use crate::aggregator::GaugeReadout;

/// One watched gauge and the threshold that trips it.
#[derive(Debug, Clone)]
struct Watch {
    name: &'static str,
    threshold: f64,
    reader: fn(&GaugeReadout) -> Option<f64>,
}

/// Evaluates gauge readouts against a fixed set of thresholds and tracks
/// rising/falling alert edges.
pub struct ThresholdWatchdog {
    watches: Vec<Watch>,
    active: std::collections::HashMap<&'static str, bool>,
}

impl ThresholdWatchdog {
    /// Build a watchdog over the standard three gauges: load factor,
    /// average probe distance, and tombstone ratio. A threshold of
    /// `None` disables that watch entirely.
    pub fn new(max_load_factor: Option<f64>, max_avg_probe: Option<f64>, max_tombstone_ratio: Option<f64>) -> Self {
        let mut watches = Vec::new();
        if let Some(t) = max_load_factor {
            watches.push(Watch {
                name: "load_factor",
                threshold: t,
                reader: |gauges| Some(gauges.load_factor),
            });
        }
        if let Some(t) = max_avg_probe {
            watches.push(Watch {
                name: "avg_probe_estimate",
                threshold: t,
                reader: |gauges| gauges.avg_probe_estimate,
            });
        }
        if let Some(t) = max_tombstone_ratio {
            watches.push(Watch {
                name: "tombstone_ratio",
                threshold: t,
                reader: |gauges| gauges.tombstone_ratio,
            });
        }
        ThresholdWatchdog {
            watches,
            active: std::collections::HashMap::new(),
        }
    }

    /// Evaluate one gauge readout, returning the set of metric names whose
    /// alert state changed (either edge). The caller is expected to mirror
    /// the new state into `Metrics::set_alert_flag` before building the
    /// tick record, so the record reflects this evaluation.
    pub fn evaluate(&mut self, gauges: &GaugeReadout) -> Vec<(&'static str, bool)> {
        let mut transitions = Vec::new();
        for watch in &self.watches {
            let value = match (watch.reader)(gauges) {
                Some(v) if v.is_finite() => v,
                _ => continue,
            };
            let now_active = value >= watch.threshold;
            let was_active = *self.active.get(watch.name).unwrap_or(&false);
            if now_active != was_active {
                self.active.insert(watch.name, now_active);
                transitions.push((watch.name, now_active));
                if now_active {
                    warn!(metric = watch.name, value, threshold = watch.threshold, "alert raised");
                } else {
                    info!(metric = watch.name, value, threshold = watch.threshold, "alert cleared");
                }
            }
        }
        transitions
    }

    /// Currently active alert names.
    pub fn active_alerts(&self) -> Vec<&'static str> {
        self.active
            .iter()
            .filter(|(_, active)| **active)
            .map(|(name, _)| *name)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gauges_with(load_factor: f64) -> GaugeReadout {
        GaugeReadout {
            load_factor,
            avg_probe_estimate: None,
            tombstone_ratio: None,
        }
    }

    #[test]
    fn rising_edge_fires_once() {
        let mut w = ThresholdWatchdog::new(Some(0.8), None, None);
        assert!(w.evaluate(&gauges_with(0.5)).is_empty());
        let t = w.evaluate(&gauges_with(0.9));
        assert_eq!(t, vec![("load_factor", true)]);
        assert!(w.evaluate(&gauges_with(0.95)).is_empty());
    }

    #[test]
    fn falling_edge_clears() {
        let mut w = ThresholdWatchdog::new(Some(0.8), None, None);
        w.evaluate(&gauges_with(0.9));
        let t = w.evaluate(&gauges_with(0.2));
        assert_eq!(t, vec![("load_factor", false)]);
        assert!(w.active_alerts().is_empty());
    }

    #[test]
    fn non_finite_readings_are_ignored() {
        let mut w = ThresholdWatchdog::new(Some(0.8), None, None);
        let t = w.evaluate(&gauges_with(f64::NAN));
        assert!(t.is_empty());
    }

    #[test]
    fn disabled_watch_never_fires() {
        let mut w = ThresholdWatchdog::new(None, None, None);
        assert!(w.evaluate(&gauges_with(99.0)).is_empty());
    }
}
