//! The capability set both backends implement. The supervisor only ever
//! talks to a backend through this trait — there is no plugin system,
//! just the two concrete variants in `hashmap-chaining` and
//! `hashmap-robinhood`.

use crate::types::{Key, Value};

/// Health metrics a backend can report about itself, independent of which
/// concrete structure it is. Fields that don't apply to a given backend are
/// `None` (e.g. a chaining map has no tombstone ratio).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Occupancy {
    /// Number of live entries.
    pub len: usize,
    /// Physical capacity (outer bucket count for chaining, slot count for
    /// Robin-Hood).
    pub capacity: usize,
    /// `len / capacity`. Chaining can exceed 1.0.
    pub load_factor: f64,
    /// Longest group within any bucket (chaining only).
    pub max_group_len: Option<usize>,
    /// Mean stored displacement over occupied slots (Robin-Hood only).
    pub avg_probe_estimate: Option<f64>,
    /// `tombstones / capacity` (Robin-Hood only).
    pub tombstone_ratio: Option<f64>,
}

/// Shared capability set for the two concrete backends.
///
/// `items()` must return entries in a deterministic order for a given
/// sequence of operations, so property tests can compare against an
/// oracle `HashMap` by sorting both sides, and so snapshot round-trips
/// are reproducible.
pub trait MapBackend {
    /// Insert or overwrite `key` with `value`.
    fn put(&mut self, key: Key, value: Value);

    /// Look up `key`.
    fn get(&self, key: &Key) -> Option<&Value>;

    /// Remove `key` if present; returns whether it was present.
    fn delete(&mut self, key: &Key) -> bool;

    /// Number of live entries.
    fn len(&self) -> usize;

    /// Whether the backend holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All live entries, in deterministic bucket/slot order.
    fn items(&self) -> Vec<(Key, Value)>;

    /// Current health metrics, used to feed the watchdog and the tick
    /// aggregator.
    fn occupancy(&self) -> Occupancy;
}
