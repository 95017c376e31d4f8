//! Robin-Hood open-addressing backend (C2): lookup-optimized.
//!
//! Struct-of-arrays layout (`state`/`keys`/`values`/`dist`) with the
//! richer-than-thou displacement rule: an incoming probe bumps the
//! resident entry only once its own probe distance exceeds the resident's.
//! Deleted slots become tombstones rather than triggering a backward
//! shift — they keep probe chains intact for keys that were inserted past
//! them, but are reused by the next `put` that probes through them and
//! doesn't find the key still live.

#![warn(missing_docs)]

use hashmap_core::{hash_key, Key, MapBackend, Occupancy, Value};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Empty,
    Occupied,
    Tombstone,
}

/// Robin-Hood open-addressing hash map.
#[derive(Debug, Clone)]
pub struct RobinHoodMap {
    seed: u64,
    cap: usize,
    state: Vec<Slot>,
    keys: Vec<Option<Key>>,
    values: Vec<Option<Value>>,
    dist: Vec<u32>,
    n: usize,
    tombstones: usize,
}

impl RobinHoodMap {
    /// Construct a new map with `cap` rounded up to a power of two, minimum
    /// 8.
    pub fn new(seed: u64, cap: usize) -> Self {
        let cap = cap.max(8).next_power_of_two();
        RobinHoodMap {
            seed,
            cap,
            state: vec![Slot::Empty; cap],
            keys: vec![None; cap],
            values: vec![None; cap],
            dist: vec![0; cap],
            n: 0,
            tombstones: 0,
        }
    }

    fn home(&self, key: &[u8]) -> usize {
        (hash_key(self.seed, key) as usize) & (self.cap - 1)
    }

    fn next(&self, idx: usize) -> usize {
        (idx + 1) & (self.cap - 1)
    }

    fn offset(&self, home: usize, idx: usize) -> usize {
        (idx + self.cap - home) & (self.cap - 1)
    }

    fn find_index(&self, key: &Key) -> Option<usize> {
        let home = self.home(key.as_bytes());
        let mut idx = home;
        let mut d: u32 = 0;
        loop {
            match self.state[idx] {
                Slot::Empty => return None,
                Slot::Occupied => {
                    if self.keys[idx].as_ref() == Some(key) {
                        return Some(idx);
                    }
                    if (d as usize) > self.dist[idx] as usize {
                        return None;
                    }
                }
                Slot::Tombstone => {}
            }
            idx = self.next(idx);
            d += 1;
            if d as usize > self.cap {
                return None;
            }
        }
    }

    fn place(&mut self, idx: usize, key: Key, value: Value, dist: u32) {
        if self.state[idx] == Slot::Tombstone {
            self.tombstones -= 1;
        }
        self.state[idx] = Slot::Occupied;
        self.keys[idx] = Some(key);
        self.values[idx] = Some(value);
        self.dist[idx] = dist;
    }

    /// Current capacity (number of slots).
    pub fn capacity(&self) -> usize {
        self.cap
    }

    /// `n / cap`.
    pub fn load_factor(&self) -> f64 {
        self.n as f64 / self.cap as f64
    }

    /// `tombstones / cap`.
    pub fn tombstone_ratio(&self) -> f64 {
        self.tombstones as f64 / self.cap as f64
    }

    /// Number of tombstones currently occupying slots.
    pub fn tombstone_count(&self) -> usize {
        self.tombstones
    }

    /// Mean stored displacement over occupied slots, 0.0 if empty.
    pub fn avg_probe_estimate(&self) -> f64 {
        if self.n == 0 {
            return 0.0;
        }
        let total: u64 = self
            .state
            .iter()
            .zip(self.dist.iter())
            .filter(|(s, _)| **s == Slot::Occupied)
            .map(|(_, d)| *d as u64)
            .sum();
        total as f64 / self.n as f64
    }

    /// Whether the current state should trigger growth or compaction under
    /// `cfg`'s thresholds.
    pub fn should_grow(&self, max_lf_open: f64, max_avg_probe: f64) -> bool {
        self.load_factor() >= max_lf_open || self.avg_probe_estimate() >= max_avg_probe
    }

    /// Whether tombstone buildup alone warrants a compaction.
    pub fn should_compact(&self, max_tombstone_ratio: f64) -> bool {
        self.tombstone_ratio() >= max_tombstone_ratio
    }

    /// Rebuild into a fresh map at `new_cap` (rounded to a power of two),
    /// re-inserting every live entry. Used both for growth and, when
    /// `new_cap == self.cap`, as a tombstone-clearing compaction.
    pub fn rebuilt(&self, new_cap: usize) -> RobinHoodMap {
        debug!(from = self.cap, to = new_cap, entries = self.n, tombstones = self.tombstones, "rebuilding robinhood table");
        let mut fresh = RobinHoodMap::new(self.seed, new_cap);
        for (k, v) in self.items() {
            fresh.put(k, v);
        }
        fresh
    }

    /// Check internal invariants: every occupied slot's stored distance
    /// matches its actual offset from its key's home, and no key appears
    /// more than once. Intended for tests and debug assertions, not the
    /// steady-state hot path.
    pub fn check_invariants(&self) -> Result<(), String> {
        let mut seen = std::collections::HashSet::new();
        let mut live = 0usize;
        for idx in 0..self.cap {
            if self.state[idx] != Slot::Occupied {
                continue;
            }
            live += 1;
            let key = self.keys[idx].as_ref().ok_or("occupied slot missing key")?;
            if !seen.insert(key.clone()) {
                return Err(format!("duplicate key at slot {idx}"));
            }
            let home = self.home(key.as_bytes());
            let expected = self.offset(home, idx);
            if expected as u32 != self.dist[idx] {
                return Err(format!(
                    "slot {idx} dist mismatch: stored {} expected {}",
                    self.dist[idx], expected
                ));
            }
        }
        if live != self.n {
            return Err(format!("live count {live} != tracked n {}", self.n));
        }
        Ok(())
    }
}

impl MapBackend for RobinHoodMap {
    fn put(&mut self, key: Key, value: Value) {
        if let Some(idx) = self.find_index(&key) {
            self.values[idx] = Some(value);
            return;
        }

        let mut carry_key = key;
        let mut carry_val = value;
        let mut carry_home = self.home(carry_key.as_bytes());
        let mut carry_dist: u32 = 0;
        let mut idx = carry_home;
        let mut insert_idx: Option<usize> = None;

        loop {
            match self.state[idx] {
                Slot::Empty => {
                    let target = insert_idx.unwrap_or(idx);
                    let target_dist = self.offset(carry_home, target) as u32;
                    self.place(target, carry_key, carry_val, target_dist);
                    self.n += 1;
                    return;
                }
                Slot::Tombstone => {
                    if insert_idx.is_none() {
                        insert_idx = Some(idx);
                    }
                    idx = self.next(idx);
                    carry_dist += 1;
                }
                Slot::Occupied => {
                    let occ_dist = self.dist[idx];
                    if carry_dist > occ_dist {
                        std::mem::swap(&mut carry_key, self.keys[idx].as_mut().unwrap());
                        std::mem::swap(&mut carry_val, self.values[idx].as_mut().unwrap());
                        self.dist[idx] = carry_dist;
                        carry_home = self.home(carry_key.as_bytes());
                        carry_dist = occ_dist;
                    }
                    idx = self.next(idx);
                    carry_dist += 1;
                }
            }
        }
    }

    fn get(&self, key: &Key) -> Option<&Value> {
        self.find_index(key).and_then(|idx| self.values[idx].as_ref())
    }

    fn delete(&mut self, key: &Key) -> bool {
        match self.find_index(key) {
            Some(idx) => {
                self.state[idx] = Slot::Tombstone;
                self.keys[idx] = None;
                self.values[idx] = None;
                self.n -= 1;
                self.tombstones += 1;
                true
            }
            None => false,
        }
    }

    fn len(&self) -> usize {
        self.n
    }

    fn items(&self) -> Vec<(Key, Value)> {
        let mut out = Vec::with_capacity(self.n);
        for idx in 0..self.cap {
            if self.state[idx] == Slot::Occupied {
                out.push((
                    self.keys[idx].clone().unwrap(),
                    self.values[idx].clone().unwrap(),
                ));
            }
        }
        out
    }

    fn occupancy(&self) -> Occupancy {
        Occupancy {
            len: self.n,
            capacity: self.cap,
            load_factor: self.load_factor(),
            max_group_len: None,
            avg_probe_estimate: Some(self.avg_probe_estimate()),
            tombstone_ratio: Some(self.tombstone_ratio()),
        }
    }
}


#[cfg(test)]
mod oracle {
    //! Oracle-model test mirroring `test_robinhood_properties.py`: a
    //! colliding-key strategy (every key forced into the low bits of the
    //! same bucket) plus small distinct keys, checked against a
    //! `BTreeMap` after every operation.

    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    #[derive(Debug, Clone)]
    enum Op {
        Put(u8, u32),
        Get(u8),
        Delete(u8),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..5, any::<u32>()).prop_map(|(k, v)| Op::Put(k, v)),
            (0u8..5).prop_map(Op::Get),
            (0u8..5).prop_map(Op::Delete),
        ]
    }

    proptest! {
        #[test]
        fn robinhood_map_behaves_like_a_btreemap(ops in prop::collection::vec(op_strategy(), 1..200)) {
            let mut map = RobinHoodMap::new(5, 8);
            let mut oracle: BTreeMap<u8, u32> = BTreeMap::new();

            for op in ops {
                match op {
                    Op::Put(k, v) => {
                        map.put(Key::new(vec![k]), Value::new(v.to_le_bytes().to_vec()));
                        oracle.insert(k, v);
                    }
                    Op::Get(k) => {
                        let got = map.get(&Key::new(vec![k])).map(|v| {
                            let mut buf = [0u8; 4];
                            buf.copy_from_slice(v.as_bytes());
                            u32::from_le_bytes(buf)
                        });
                        prop_assert_eq!(got, oracle.get(&k).copied());
                    }
                    Op::Delete(k) => {
                        let was_present = map.delete(&Key::new(vec![k]));
                        prop_assert_eq!(was_present, oracle.remove(&k).is_some());
                    }
                }
                map.check_invariants().map_err(|e| TestCaseError::fail(e))?;
            }

            prop_assert_eq!(map.len(), oracle.len());
        }
    }
}
