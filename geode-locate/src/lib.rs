//! Location to probability-offset resolution.
//!
//! Turns a free-form place name into a starting offset in the volume, a crust type and
//! a set of probability offsets. The lookup path geocodes the place and counts known
//! mineral occurrences around it; when any part of that fails the resolver falls back
//! to values derived from a hash of the location string.

mod fallback;
mod lookup;

use geode_core::ProbabilityOffsets;
use serde::{Deserialize, Serialize};

pub use fallback::fallback_location;
pub use lookup::{
    LocateConfig, LocateError, LocationResolver, commodity_category, crust_from_occurrences,
    occurrence_offsets, offsets_from_coordinates,
};

/// Broad crust classification of a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrustType {
    /// Felsic, granite-dominated crust.
    Continental,
    /// Mafic, basalt-dominated crust.
    Oceanic,
}

/// Offsets and adjustments resolved for a location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedLocation {
    /// World x where exploration of this location starts.
    pub x_offset: i64,
    /// World y where exploration of this location starts.
    pub y_offset: i64,
    /// World z where exploration of this location starts.
    pub z_offset: i64,
    /// Crust classification.
    pub crust_type: CrustType,
    /// Probability offsets to pass to generation requests.
    #[serde(rename = "prob_offsets")]
    pub offsets: ProbabilityOffsets,
}

/// How a location was resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "source")]
pub enum LocationResolution {
    /// Geocoding and occurrence lookups succeeded.
    #[serde(rename = "lookup")]
    ResolvedViaLookup(ResolvedLocation),
    /// Derived from a hash of the location string.
    #[serde(rename = "fallback")]
    ResolvedViaFallback(ResolvedLocation),
}

impl LocationResolution {
    /// The resolved values, whichever path produced them.
    #[must_use]
    pub const fn location(&self) -> &ResolvedLocation {
        match self {
            Self::ResolvedViaLookup(location) | Self::ResolvedViaFallback(location) => location,
        }
    }

    /// Whether the values came from the hashed fallback.
    #[must_use]
    pub const fn is_fallback(&self) -> bool {
        matches!(self, Self::ResolvedViaFallback(_))
    }
}
