//! The two concrete backends, unified behind one enum so the supervisor
//! can hold either without dynamic dispatch. Resolved concretely rather
//! than via `Box<dyn MapBackend>`, since there are exactly two variants
//! and the supervisor needs to match on which one it's holding anyway to
//! decide migration targets.

use hashmap_chaining::ChainingMap;
use hashmap_core::{AdaptiveConfig, BackendKind, Key, MapBackend, Occupancy, Value};
use hashmap_robinhood::RobinHoodMap;

/// Either concrete backend.
#[derive(Debug, Clone)]
pub enum Backend {
    /// Two-level chaining (C1).
    Chaining(ChainingMap),
    /// Robin-Hood open addressing (C2).
    RobinHood(RobinHoodMap),
}

impl Backend {
    /// Construct the configured starting backend, sized per `cfg`.
    pub fn new_start(cfg: &AdaptiveConfig) -> Self {
        match cfg.start_backend {
            BackendKind::Chaining => Backend::Chaining(ChainingMap::new(
                cfg.hash_seed,
                cfg.initial_buckets,
                cfg.groups_per_bucket,
            )),
            BackendKind::RobinHood => {
                Backend::RobinHood(RobinHoodMap::new(cfg.hash_seed, cfg.initial_capacity_rh))
            }
        }
    }

    /// Build an empty backend of `kind`, sized to comfortably hold
    /// `hint_len` entries.
    pub fn new_sized(cfg: &AdaptiveConfig, kind: BackendKind, hint_len: usize) -> Self {
        match kind {
            BackendKind::Chaining => {
                let outer_len = AdaptiveConfig::grown_capacity(cfg.initial_buckets, hint_len);
                Backend::Chaining(ChainingMap::new(cfg.hash_seed, outer_len, cfg.groups_per_bucket))
            }
            BackendKind::RobinHood => {
                let cap = AdaptiveConfig::grown_capacity(cfg.initial_capacity_rh, hint_len);
                Backend::RobinHood(RobinHoodMap::new(cfg.hash_seed, cap))
            }
        }
    }

    /// The kind of backend this is.
    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::Chaining(_) => BackendKind::Chaining,
            Backend::RobinHood(_) => BackendKind::RobinHood,
        }
    }
}

impl MapBackend for Backend {
    fn put(&mut self, key: Key, value: Value) {
        match self {
            Backend::Chaining(m) => m.put(key, value),
            Backend::RobinHood(m) => m.put(key, value),
        }
    }

    fn get(&self, key: &Key) -> Option<&Value> {
        match self {
            Backend::Chaining(m) => m.get(key),
            Backend::RobinHood(m) => m.get(key),
        }
    }

    fn delete(&mut self, key: &Key) -> bool {
        match self {
            Backend::Chaining(m) => m.delete(key),
            Backend::RobinHood(m) => m.delete(key),
        }
    }

    fn len(&self) -> usize {
        match self {
            Backend::Chaining(m) => m.len(),
            Backend::RobinHood(m) => m.len(),
        }
    }

    fn items(&self) -> Vec<(Key, Value)> {
        match self {
            Backend::Chaining(m) => m.items(),
            Backend::RobinHood(m) => m.items(),
        }
    }

    fn occupancy(&self) -> Occupancy {
        match self {
            Backend::Chaining(m) => m.occupancy(),
            Backend::RobinHood(m) => m.occupancy(),
        }
    }
}
