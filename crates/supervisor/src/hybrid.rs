//! The hybrid adaptive map itself (C7): a state machine alternating
//! between `Steady` operation on one backend and an incremental
//! `Migrating` transition to another, with at most one migration in
//! flight at a time. Growth is modeled the same way as a backend-kind
//! switch: a migration to a freshly-sized backend of the same kind.

use hashmap_core::{AdaptiveConfig, BackendKind, Key, MapBackend, Occupancy, Value};
use tracing::{debug, info};

use crate::backend::Backend;

/// In-flight migration bookkeeping.
#[derive(Debug, Clone)]
struct Migration {
    target: Backend,
    keys_to_move: Vec<Key>,
    cursor: usize,
    reason: MigrationReason,
}

/// Why a migration was started, purely for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MigrationReason {
    BackendSwitch,
    Grow,
    Compact,
}

impl MigrationReason {
    fn label(self) -> &'static str {
        match self {
            MigrationReason::BackendSwitch => "backend_switch",
            MigrationReason::Grow => "grow",
            MigrationReason::Compact => "compact",
        }
    }
}

enum State {
    Steady(Backend),
    Migrating { source: Backend, migration: Migration },
}

/// A migration's terminal outcome, surfaced so callers can feed telemetry
/// counters without polling state on every operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// A backend-switch or growth migration finished.
    Migration,
    /// A Robin-Hood tombstone compaction finished.
    Compaction,
}

/// The adaptive hybrid hash map: owns exactly one live backend in
/// `Steady` state, or a source/target pair mid-migration.
pub struct HybridAdaptiveHashMap {
    config: AdaptiveConfig,
    state: State,
    completions: Vec<Completion>,
}

impl HybridAdaptiveHashMap {
    /// Build a fresh map per `config`. Panics if `config` fails
    /// validation — construction-time misconfiguration is a programmer
    /// error, not a runtime condition to recover from.
    pub fn new(config: AdaptiveConfig) -> Self {
        config.validate().expect("invalid AdaptiveConfig");
        let backend = Backend::new_start(&config);
        HybridAdaptiveHashMap {
            config,
            state: State::Steady(backend),
            completions: Vec::new(),
        }
    }

    /// Name of the currently active (foreground-visible) backend. During
    /// a migration this is the target, since that's what future reads
    /// will increasingly be served from.
    pub fn active_backend_name(&self) -> &'static str {
        match &self.state {
            State::Steady(b) => b.kind().label(),
            State::Migrating { migration, .. } => migration.target.kind().label(),
        }
    }

    /// Backend identity for telemetry: the plain kind label in steady
    /// state, or `"adaptive:<source>-><target>"` while a migration is in
    /// flight.
    pub fn backend_label(&self) -> String {
        match &self.state {
            State::Steady(b) => b.kind().label().to_string(),
            State::Migrating { source, migration } => {
                format!("adaptive:{}->{}", source.kind().label(), migration.target.kind().label())
            }
        }
    }

    /// Drain migration/compaction completions accumulated since the last
    /// call, for the caller to mirror into its telemetry counters.
    pub fn drain_completions(&mut self) -> Vec<Completion> {
        std::mem::take(&mut self.completions)
    }

    /// Whether a migration is currently in flight.
    pub fn is_migrating(&self) -> bool {
        matches!(self.state, State::Migrating { .. })
    }

    /// Occupancy of the backend that would answer a read right now: the
    /// target while migrating (it's where the map is heading), the sole
    /// backend otherwise.
    pub fn occupancy(&self) -> Occupancy {
        match &self.state {
            State::Steady(b) => b.occupancy(),
            State::Migrating { migration, .. } => migration.target.occupancy(),
        }
    }

    /// Total live entries, aggregated across source and target while
    /// migrating (an entry is live in exactly one of the two at any time).
    pub fn len(&self) -> usize {
        match &self.state {
            State::Steady(b) => b.len(),
            State::Migrating { source, migration } => source.len() + migration.target.len(),
        }
    }

    /// Whether the map holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert or overwrite `key`.
    pub fn put(&mut self, key: Key, value: Value) {
        match &mut self.state {
            State::Steady(backend) => backend.put(key, value),
            State::Migrating { source, migration } => {
                migration.target.put(key.clone(), value);
                source.delete(&key);
            }
        }
        self.advance_migration();
        self.maybe_trigger();
    }

    /// Look up `key`: target first, then source, while migrating.
    pub fn get(&self, key: &Key) -> Option<&Value> {
        match &self.state {
            State::Steady(backend) => backend.get(key),
            State::Migrating { source, migration } => {
                migration.target.get(key).or_else(|| source.get(key))
            }
        }
    }

    /// Remove `key` if present in either half during a migration.
    pub fn delete(&mut self, key: &Key) -> bool {
        let removed = match &mut self.state {
            State::Steady(backend) => backend.delete(key),
            State::Migrating { source, migration } => {
                let from_target = migration.target.delete(key);
                let from_source = source.delete(key);
                from_target || from_source
            }
        };
        self.advance_migration();
        removed
    }

    /// All live entries. While migrating this walks both halves; a key
    /// present in the target always wins over a stale reading from the
    /// source (it can't appear in both, since `put`/`delete` keep them
    /// disjoint, but this keeps the contract honest under construction).
    pub fn items(&self) -> Vec<(Key, Value)> {
        match &self.state {
            State::Steady(backend) => backend.items(),
            State::Migrating { source, migration } => {
                let mut out = migration.target.items();
                out.extend(source.items());
                out
            }
        }
    }

    /// Move up to `incremental_batch` entries from source to target. A
    /// no-op outside `Migrating`. Completes and collapses the migration
    /// when the captured key list is exhausted.
    fn advance_migration(&mut self) {
        let batch = self.config.incremental_batch;
        let State::Migrating { source, migration } = &mut self.state else {
            return;
        };

        let end = (migration.cursor + batch).min(migration.keys_to_move.len());
        for key in &migration.keys_to_move[migration.cursor..end] {
            if let Some(value) = source.get(key) {
                let value = value.clone();
                migration.target.put(key.clone(), value);
                source.delete(key);
            }
        }
        migration.cursor = end;

        if migration.cursor >= migration.keys_to_move.len() {
            let State::Migrating { migration, .. } =
                std::mem::replace(&mut self.state, State::Steady(Backend::new_start(&self.config)))
            else {
                unreachable!()
            };
            info!(
                reason = migration.reason.label(),
                target = migration.target.kind().label(),
                "migration complete"
            );
            self.completions.push(if migration.reason == MigrationReason::Compact {
                Completion::Compaction
            } else {
                Completion::Migration
            });
            self.state = State::Steady(migration.target);
        }
    }

    /// Evaluate trigger rules for the active backend and start a
    /// migration if warranted. No-op if one is already in flight (at
    /// most one migration at a time).
    fn maybe_trigger(&mut self) {
        if self.is_migrating() {
            return;
        }
        let decision = match &self.state {
            State::Steady(Backend::Chaining(c)) => {
                if c.should_migrate(self.config.max_lf_chaining, self.config.max_group_len_threshold) {
                    Some((BackendKind::RobinHood, MigrationReason::BackendSwitch))
                } else {
                    None
                }
            }
            State::Steady(Backend::RobinHood(r)) => {
                if r.should_grow(self.config.max_lf_open, self.config.max_avg_probe) {
                    Some((BackendKind::RobinHood, MigrationReason::Grow))
                } else if r.should_compact(self.config.max_tombstone_ratio) {
                    Some((BackendKind::RobinHood, MigrationReason::Compact))
                } else {
                    None
                }
            }
            State::Migrating { .. } => None,
        };

        if let Some((target_kind, reason)) = decision {
            self.begin_migration(target_kind, reason);
        }
    }

    fn begin_migration(&mut self, target_kind: BackendKind, reason: MigrationReason) {
        let State::Steady(backend) = std::mem::replace(
            &mut self.state,
            State::Steady(Backend::new_start(&self.config)),
        ) else {
            unreachable!("begin_migration called while already migrating");
        };

        let len = backend.len();
        let target = Backend::new_sized(&self.config, target_kind, len);
        let keys_to_move: Vec<Key> = backend.items().into_iter().map(|(k, _)| k).collect();

        debug!(
            reason = reason.label(),
            from = backend.kind().label(),
            to = target_kind.label(),
            entries = len,
            "migration started"
        );

        self.state = State::Migrating {
            source: backend,
            migration: Migration {
                target,
                keys_to_move,
                cursor: 0,
                reason,
            },
        };
    }

    /// Force-start a migration to `target_kind` regardless of trigger
    /// thresholds. Exposed for tests and for an embedder that wants to
    /// drive a migration explicitly (e.g. from a workload DNA
    /// recommendation at startup).
    pub fn begin_migration_now(&mut self, target_kind: BackendKind) -> Result<(), hashmap_core::Error> {
        if self.is_migrating() {
            return Err(hashmap_core::Error::Policy(
                "a migration is already in flight".into(),
            ));
        }
        self.begin_migration(target_kind, MigrationReason::BackendSwitch);
        Ok(())
    }

    /// Drive an in-flight migration to completion synchronously, without
    /// waiting for foreground operations to advance it. Mostly useful in
    /// tests and snapshot preparation.
    pub fn drain_migration(&mut self) {
        while self.is_migrating() {
            self.advance_migration();
        }
    }

    /// Shared configuration, for callers building metrics/watchdog
    /// components that need the same thresholds.
    pub fn config(&self) -> &AdaptiveConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> AdaptiveConfig {
        AdaptiveConfig {
            start_backend: BackendKind::Chaining,
            initial_buckets: 4,
            groups_per_bucket: 2,
            initial_capacity_rh: 8,
            max_lf_chaining: 0.5,
            max_group_len_threshold: 2,
            max_lf_open: 0.7,
            max_avg_probe: 3.0,
            max_tombstone_ratio: 0.3,
            incremental_batch: 2,
            hash_seed: 11,
            migrate_on_chronic_collisions: false,
        }
    }

    #[test]
    fn put_get_delete_round_trip_in_steady_state() {
        let mut m = HybridAdaptiveHashMap::new(small_config());
        m.put(Key::from("a"), Value::from("1"));
        assert_eq!(m.get(&Key::from("a")).unwrap().as_bytes(), b"1");
        assert!(m.delete(&Key::from("a")));
        assert!(m.get(&Key::from("a")).is_none());
    }

    #[test]
    fn growth_under_load_triggers_a_migration_that_preserves_all_entries() {
        let mut m = HybridAdaptiveHashMap::new(small_config());
        for i in 0..40u32 {
            m.put(Key::new(i.to_le_bytes().to_vec()), Value::new(i.to_le_bytes().to_vec()));
        }
        m.drain_migration();
        assert_eq!(m.len(), 40);
        for i in 0..40u32 {
            let k = Key::new(i.to_le_bytes().to_vec());
            assert_eq!(m.get(&k).unwrap().as_bytes(), &i.to_le_bytes());
        }
    }

    #[test]
    fn a_trigger_while_already_migrating_does_not_start_a_second_one() {
        let mut m = HybridAdaptiveHashMap::new(small_config());
        for i in 0..40u32 {
            m.put(Key::new(i.to_le_bytes().to_vec()), Value::new(i.to_le_bytes().to_vec()));
        }
        assert!(m.is_migrating());
        // The state enum itself only ever holds one migration; pushing
        // more load while one is in flight must route through the
        // existing source/target pair rather than replacing it.
        for i in 40..80u32 {
            m.put(Key::new(i.to_le_bytes().to_vec()), Value::new(i.to_le_bytes().to_vec()));
        }
        m.drain_migration();
        assert_eq!(m.len(), 80);
    }

    #[test]
    fn explicit_migration_to_robinhood_preserves_entries_and_completes() {
        let mut m = HybridAdaptiveHashMap::new(small_config());
        for i in 0..10u32 {
            m.put(Key::new(i.to_le_bytes().to_vec()), Value::new(i.to_le_bytes().to_vec()));
        }
        m.drain_migration();
        m.begin_migration_now(BackendKind::RobinHood).unwrap();
        assert!(m.is_migrating());
        m.drain_migration();
        assert!(!m.is_migrating());
        assert_eq!(m.active_backend_name(), "robinhood");
        assert_eq!(m.len(), 10);
        for i in 0..10u32 {
            let k = Key::new(i.to_le_bytes().to_vec());
            assert_eq!(m.get(&k).unwrap().as_bytes(), &i.to_le_bytes());
        }
    }

    #[test]
    fn reads_during_migration_fall_back_to_source() {
        let mut m = HybridAdaptiveHashMap::new(small_config());
        for i in 0..10u32 {
            m.put(Key::new(i.to_le_bytes().to_vec()), Value::new(i.to_le_bytes().to_vec()));
        }
        m.drain_migration();
        m.begin_migration_now(BackendKind::RobinHood).unwrap();
        // Advance by a couple of steps only, so some entries are still
        // only in the source.
        m.put(Key::from("trigger-step"), Value::from("x"));
        for i in 0..10u32 {
            let k = Key::new(i.to_le_bytes().to_vec());
            assert_eq!(m.get(&k).unwrap().as_bytes(), &i.to_le_bytes());
        }
    }
}
