//! SHA-256 based hashing of coordinates and location strings.
//!
//! The canonical input for a cell is the text `seed:x:y:z` with signed decimal
//! integers. Neighbouring coordinates have uncorrelated digests.

use sha2::{Digest, Sha256};

/// `2^64` as an `f64` (exact).
const TWO_POW_64: f64 = 18_446_744_073_709_551_616.0;

/// Largest `f64` strictly below one.
const ONE_BELOW: f64 = 1.0 - f64::EPSILON / 2.0;

/// Compute the SHA-256 digest of the canonical text `seed:x:y:z`.
#[must_use]
pub fn coordinate_digest(seed: &[u8], x: i64, y: i64, z: i64) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(seed);
    hasher.update(format!(":{x}:{y}:{z}").as_bytes());
    hasher.finalize().into()
}

/// Map a coordinate to a uniform value in `[0, 1)`.
///
/// Takes the last 8 digest bytes as a big-endian `u64` and divides by `2^64`.
/// Values within half an ulp of `2^64` round to `1.0` in `f64`; those are clamped to
/// the largest value below one.
#[must_use]
pub fn coordinate_hash(seed: &[u8], x: i64, y: i64, z: i64) -> f64 {
    let digest = coordinate_digest(seed, x, y, z);
    let mut tail = [0u8; 8];
    tail.copy_from_slice(&digest[24..]);
    unit_interval(u64::from_be_bytes(tail))
}

/// Compute the SHA-256 digest of a location string.
///
/// Consumers must stay off bytes `24..32`, which [`coordinate_hash`] uses for terrain.
#[must_use]
pub fn location_digest(location: &str) -> [u8; 32] {
    Sha256::digest(location.as_bytes()).into()
}

#[inline]
fn unit_interval(value: u64) -> f64 {
    (value as f64 / TWO_POW_64).min(ONE_BELOW)
}
