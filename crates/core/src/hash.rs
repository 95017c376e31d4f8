//! The seeded 64-bit key hash shared by both backends.
//!
//! Not collision-resistant and not meant to be: this is an FxHash-style
//! multiply/rotate hash, chosen for speed over adversarial resistance so
//! the watchdog's collision-pressure signal reflects genuine workload skew
//! rather than hashing overhead. The seed is plumbed in at construction
//! time so a fixed seed gives a fixed bucket/slot layout, which is what
//! lets property tests and documented scenarios pin exact capacities and
//! migration points.

const ROTATE: u32 = 5;
const SEED_MULTIPLIER: u64 = 0x51_7c_c1_b7_27_22_0a_95;

/// Hashes `key` under `seed`. Two calls with the same seed and key always
/// produce the same value, in this process or any other.
pub fn hash_key(seed: u64, key: &[u8]) -> u64 {
    let mut state = seed ^ SEED_MULTIPLIER;
    let mut chunks = key.chunks_exact(8);
    for chunk in &mut chunks {
        let word = u64::from_le_bytes(chunk.try_into().unwrap());
        state = mix(state, word);
    }
    let remainder = chunks.remainder();
    if !remainder.is_empty() {
        let mut buf = [0u8; 8];
        buf[..remainder.len()].copy_from_slice(remainder);
        state = mix(state, u64::from_le_bytes(buf));
    }
    // Fold in the length so "" vs single zero byte don't collide trivially.
    mix(state, key.len() as u64)
}

#[inline]
fn mix(state: u64, word: u64) -> u64 {
    (state.rotate_left(ROTATE) ^ word).wrapping_mul(SEED_MULTIPLIER)
}
