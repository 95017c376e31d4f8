//! End-to-end scenarios exercising the public facade the way an embedding
//! application would: construct an [`AdaptiveHashMap`], drive it through
//! operations and ticks, and check externally observable behavior rather
//! than internal state.

use adaptive_hashmap::{
    analyze_stream, AdaptiveConfig, AdaptiveHashMap, BackendKind, Key, OperationRecord,
    WorkloadDnaConfig,
};

fn aggressive_config() -> AdaptiveConfig {
    AdaptiveConfig {
        start_backend: BackendKind::Chaining,
        initial_buckets: 4,
        groups_per_bucket: 2,
        initial_capacity_rh: 8,
        max_lf_chaining: 0.5,
        max_group_len_threshold: 2,
        max_lf_open: 0.6,
        max_avg_probe: 2.0,
        max_tombstone_ratio: 0.2,
        incremental_batch: 4,
        hash_seed: 99,
        migrate_on_chronic_collisions: false,
    }
}

#[test]
fn chaining_grows_and_migrates_to_robinhood_under_sustained_collisions() {
    let mut map = AdaptiveHashMap::new(aggressive_config());
    for i in 0..200u32 {
        map.put(
            Key::new(i.to_le_bytes().to_vec()),
            adaptive_hashmap::Value::new(i.to_le_bytes().to_vec()),
            0.05,
        );
    }
    // Drive enough additional operations for the incremental migration(s)
    // to fully drain.
    for _ in 0..5000 {
        map.put(Key::from("pad"), adaptive_hashmap::Value::from("x"), 0.01);
    }
    assert_eq!(map.len(), 201);
    for i in 0..200u32 {
        let k = Key::new(i.to_le_bytes().to_vec());
        assert_eq!(
            map.get(&k, 0.01).unwrap().as_bytes().to_vec(),
            i.to_le_bytes().to_vec()
        );
    }

    let tick = map.tick(0.0, None);
    assert_eq!(tick.backend, "robinhood");
    assert!(tick.migrations >= 1);
}

#[test]
fn robinhood_tombstone_reuse_does_not_duplicate_entries() {
    let mut cfg = aggressive_config();
    cfg.start_backend = BackendKind::RobinHood;
    let mut map = AdaptiveHashMap::new(cfg);

    map.put(Key::from("a"), adaptive_hashmap::Value::from("1"), 0.01);
    map.put(Key::from("b"), adaptive_hashmap::Value::from("2"), 0.01);
    assert!(map.delete(&Key::from("a"), 0.01));
    map.put(Key::from("b"), adaptive_hashmap::Value::from("3"), 0.01);

    let mut items = map.items();
    items.sort_by(|x, y| x.0.as_bytes().cmp(y.0.as_bytes()));
    assert_eq!(
        items,
        vec![(Key::from("b"), adaptive_hashmap::Value::from("3"))]
    );
    assert_eq!(map.len(), 1);
}

#[test]
fn watchdog_raises_then_clears_an_alert_across_ticks() {
    let mut map = AdaptiveHashMap::new(aggressive_config());

    // Push load factor above the chaining threshold, but stay under the
    // group-length threshold by spreading keys (best effort; the test
    // only requires that SOME alert crosses, not which one).
    for i in 0..10u32 {
        map.put(
            Key::new(i.to_le_bytes().to_vec()),
            adaptive_hashmap::Value::new(i.to_le_bytes().to_vec()),
            0.01,
        );
    }
    let tick = map.tick(0.0, Some(100.0));
    assert!(tick.load_factor >= 0.0);

    let rendered_before = map.render_prometheus();

    // Drive a full migration to bring load factor back down, then tick
    // again; if an alert had been raised it should clear.
    for _ in 0..2000 {
        map.put(Key::from("filler"), adaptive_hashmap::Value::from("y"), 0.01);
    }
    let _ = map.tick(1.0, None);
    let rendered_after = map.render_prometheus();

    // Both renders are well-formed Prometheus text regardless of which
    // alerts fired; the concrete exposition format is covered below.
    assert!(rendered_before.contains("hashmap_ops_total"));
    assert!(rendered_after.contains("hashmap_ops_total"));
}

#[test]
fn prometheus_exposition_is_well_formed_and_stable_under_repeated_render() {
    let mut map = AdaptiveHashMap::new(aggressive_config());
    map.put(Key::from("a"), adaptive_hashmap::Value::from("1"), 1.5);
    map.put(Key::from("b"), adaptive_hashmap::Value::from("2"), 2.5);
    map.get(&Key::from("a"), 0.3);

    let first = map.render_prometheus();
    let second = map.render_prometheus();
    assert_eq!(first, second, "rendering twice with no mutation must be a fixed point");

    assert!(first.contains("# HELP hashmap_ops_total"));
    assert!(first.contains("# TYPE hashmap_ops_total counter"));
    assert!(first.contains("hashmap_puts_total 2"));
    assert!(first.contains("hashmap_gets_total 1"));
    assert!(first.contains("hashmap_latency_ms_hist_bucket{op=\"put\",le=\"+Inf\"} 2"));
    assert!(first.contains("hashmap_latency_ms{op=\"put\",quantile=\"p50\"}"));
    assert!(first.contains("hashmap_backend_info{name=\"chaining\"}"));
}

#[test]
fn workload_dna_reports_skewed_hot_keys_and_mutation_fraction() {
    let mut ops = Vec::new();
    for _ in 0..100 {
        ops.push(OperationRecord::get("hot-key"));
    }
    for i in 0..50u32 {
        ops.push(OperationRecord::put(format!("cold-{i}"), "v"));
    }

    let dna = analyze_stream(ops.into_iter(), &WorkloadDnaConfig::default());
    assert_eq!(dna.total_rows, 150);
    assert!((dna.mutation_fraction - 50.0 / 150.0).abs() < 1e-9);
    assert_eq!(dna.hot_keys.first().unwrap().0, "hot-key");
    assert_eq!(dna.hot_keys.first().unwrap().1, 100);
}

#[test]
fn a_tampered_snapshot_file_is_rejected_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snap.bin");

    let mut map = AdaptiveHashMap::new(aggressive_config());
    map.put(Key::from("a"), adaptive_hashmap::Value::from("1"), 0.01);
    map.save_snapshot(&path, false).unwrap();

    let mut bytes = std::fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    std::fs::write(&path, bytes).unwrap();

    // Flipping the final payload byte leaves every header field intact,
    // so this must surface specifically as a checksum mismatch.
    let err = AdaptiveHashMap::load_snapshot(aggressive_config(), &path).unwrap_err();
    assert!(err.to_string().contains("checksum"));
}
