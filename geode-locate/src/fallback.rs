//! Hash-derived location values.
//!
//! Uses the SHA-256 digest of the location string. Offsets come from bytes `0..12` and
//! the crust type from byte 12. Bytes `24..32` are the range terrain hashing reads, so
//! they are never used here.

use geode_core::{Category, ProbabilityOffsets};
use geode_utils::location_digest;

use crate::{CrustType, ResolvedLocation};

/// Offsets are reduced modulo `2^30`.
const OFFSET_MODULUS: u32 = 1 << 30;

fn offset_from(bytes: &[u8; 32], start: usize) -> i64 {
    let word = u32::from_be_bytes([
        bytes[start],
        bytes[start + 1],
        bytes[start + 2],
        bytes[start + 3],
    ]);
    i64::from(word % OFFSET_MODULUS)
}

fn crust_offsets(crust_type: CrustType) -> ProbabilityOffsets {
    match crust_type {
        CrustType::Continental => ProbabilityOffsets::from([
            (Category::Granite, 0.05),
            (Category::Quartz, 0.03),
            (Category::Feldspar, 0.02),
        ]),
        CrustType::Oceanic => {
            ProbabilityOffsets::from([(Category::Basalt, 0.08), (Category::Iron, 0.03)])
        }
    }
}

/// Derive location values from the location string alone.
#[must_use]
pub fn fallback_location(location: &str) -> ResolvedLocation {
    let digest = location_digest(location);
    let crust_type = if digest[12] & 1 == 1 {
        CrustType::Oceanic
    } else {
        CrustType::Continental
    };

    ResolvedLocation {
        x_offset: offset_from(&digest, 0),
        y_offset: offset_from(&digest, 4),
        z_offset: offset_from(&digest, 8),
        crust_type,
        offsets: crust_offsets(crust_type),
    }
}
