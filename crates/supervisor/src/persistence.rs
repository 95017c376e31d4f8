//! Ties the binary snapshot envelope to the hybrid map's entry set.
//!
//! Snapshots are best-effort: a full live-item dump encoded as JSON, then
//! framed per [`crate::snapshot`]. There is no incremental/WAL-style
//! durability here — that tier of persistence is explicitly out of scope.

use std::fs;
use std::path::Path;

use hashmap_core::{Error, Key, Value};
use serde::{Deserialize, Serialize};

use crate::hybrid::HybridAdaptiveHashMap;
use crate::snapshot;

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotPayload {
    schema: &'static str,
    entries: Vec<(Key, Value)>,
}

const PAYLOAD_SCHEMA: &str = "hybrid_snapshot.v1";

/// Serialize the map's current entries and write a framed snapshot to
/// `path`. `compress` selects gzip framing of the payload.
pub fn save(map: &HybridAdaptiveHashMap, path: impl AsRef<Path>, compress: bool) -> Result<(), Error> {
    let payload = SnapshotPayload {
        schema: PAYLOAD_SCHEMA,
        entries: map.items(),
    };
    let json = serde_json::to_vec(&payload)
        .map_err(|e| Error::bad_input("entries", format!("failed to serialize snapshot: {e}")))?;
    let framed = snapshot::encode(&json, compress)?;
    let path = path.as_ref();
    fs::write(path, framed).map_err(|e| Error::io(path.display().to_string(), e.to_string()))
}

/// Read and validate a framed snapshot, replaying every entry into a
/// freshly constructed map built from `config`.
pub fn load(
    config: hashmap_core::AdaptiveConfig,
    path: impl AsRef<Path>,
) -> Result<HybridAdaptiveHashMap, Error> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|e| Error::io(path.display().to_string(), e.to_string()))?;
    let json = snapshot::decode(&bytes)?;
    let payload: SnapshotPayload = serde_json::from_slice(&json)
        .map_err(|e| Error::bad_input("entries", format!("failed to parse snapshot payload: {e}")))?;
    if payload.schema != PAYLOAD_SCHEMA {
        return Err(Error::bad_input(
            "schema",
            format!("unexpected snapshot payload schema `{}`", payload.schema),
        ));
    }

    let mut map = HybridAdaptiveHashMap::new(config);
    for (key, value) in payload.entries {
        map.put(key, value);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hashmap_core::AdaptiveConfig;

    #[test]
    fn save_then_load_round_trips_all_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snap.bin");

        let mut map = HybridAdaptiveHashMap::new(AdaptiveConfig::default());
        for i in 0..25u32 {
            map.put(Key::new(i.to_le_bytes().to_vec()), Value::new(i.to_le_bytes().to_vec()));
        }
        save(&map, &path, true).unwrap();

        let loaded = load(AdaptiveConfig::default(), &path).unwrap();
        assert_eq!(loaded.len(), 25);
        for i in 0..25u32 {
            let k = Key::new(i.to_le_bytes().to_vec());
            assert_eq!(loaded.get(&k).unwrap().as_bytes(), &i.to_le_bytes());
        }
    }

    #[test]
    fn load_rejects_a_tampered_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snap.bin");

        let map = HybridAdaptiveHashMap::new(AdaptiveConfig::default());
        save(&map, &path, false).unwrap();

        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        fs::write(&path, bytes).unwrap();

        let err = load(AdaptiveConfig::default(), &path).unwrap_err();
        assert!(err.to_string().contains("checksum"));
    }
}
