//! Mineral categories.
//!
//! The set is closed at build time. Variants are declared in lexicographic order of
//! their wire names, so the derived [`Ord`] is the string order. Cumulative sampling
//! walks categories in this order, which makes the declaration order part of the
//! reproducibility contract: reordering variants changes every generated world.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// RGB value used for padding cells that no resolver call produced.
pub const BACKGROUND_COLOR: [u8; 3] = [0, 0, 0];

/// A mineral category assigned to a single cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Basalt.
    Basalt,
    /// Copper.
    Copper,
    /// Diamond.
    Diamond,
    /// Emerald.
    Emerald,
    /// Feldspar.
    Feldspar,
    /// Gold.
    Gold,
    /// Granite.
    Granite,
    /// Iron.
    Iron,
    /// Mica.
    Mica,
    /// Quartz.
    Quartz,
    /// Empty pore space.
    Void,
}

impl Category {
    /// Number of categories.
    pub const COUNT: usize = 11;

    /// Every category, in sort order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Basalt,
        Self::Copper,
        Self::Diamond,
        Self::Emerald,
        Self::Feldspar,
        Self::Gold,
        Self::Granite,
        Self::Iron,
        Self::Mica,
        Self::Quartz,
        Self::Void,
    ];

    /// The wire name of this category.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Basalt => "basalt",
            Self::Copper => "copper",
            Self::Diamond => "diamond",
            Self::Emerald => "emerald",
            Self::Feldspar => "feldspar",
            Self::Gold => "gold",
            Self::Granite => "granite",
            Self::Iron => "iron",
            Self::Mica => "mica",
            Self::Quartz => "quartz",
            Self::Void => "void",
        }
    }

    /// Display color used by visual slices.
    #[must_use]
    pub const fn color(self) -> [u8; 3] {
        match self {
            Self::Basalt => [54, 54, 62],
            Self::Copper => [184, 115, 51],
            Self::Diamond => [185, 242, 255],
            Self::Emerald => [80, 200, 120],
            Self::Feldspar => [255, 192, 203],
            Self::Gold => [255, 215, 0],
            Self::Granite => [168, 120, 110],
            Self::Iron => [161, 157, 148],
            Self::Mica => [0, 0, 0],
            Self::Quartz => [128, 128, 128],
            Self::Void => [255, 255, 255],
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when a wire name does not match any category.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown mineral category: {0}")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|category| category.name() == s)
            .ok_or_else(|| UnknownCategory(s.to_owned()))
    }
}
