//! Shared primitives for the geode workspace.
//!
//! - [`Category`] - the closed set of mineral categories and their wire names
//! - [`hash`] - SHA-256 based coordinate and location digests

pub mod category;
pub mod hash;

pub use category::{BACKGROUND_COLOR, Category, UnknownCategory};
pub use hash::{coordinate_digest, coordinate_hash, location_digest};
