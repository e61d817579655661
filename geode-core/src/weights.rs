//! Category weights, probability offsets and renormalization.

use std::collections::BTreeMap;

use geode_utils::Category;
use rustc_hash::FxHashMap;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use smallvec::SmallVec;

/// Base weights of a depth layer, keyed by category.
///
/// Backed by a `BTreeMap`, so iteration always follows category order no matter how
/// the map was built.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct WeightMap(BTreeMap<Category, f64>);

impl WeightMap {
    /// Create an empty weight map.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Set the weight of a category, replacing any previous value.
    pub fn insert(&mut self, category: Category, weight: f64) {
        self.0.insert(category, weight);
    }

    /// The weight of a category, if the map contains it.
    #[must_use]
    pub fn get(&self, category: Category) -> Option<f64> {
        self.0.get(&category).copied()
    }

    /// Whether the map contains a category.
    #[must_use]
    pub fn contains(&self, category: Category) -> bool {
        self.0.contains_key(&category)
    }

    /// Number of categories in the map.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the map has no categories.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over `(category, weight)` pairs in category order.
    pub fn iter(&self) -> impl Iterator<Item = (Category, f64)> + '_ {
        self.0.iter().map(|(category, weight)| (*category, *weight))
    }
}

impl FromIterator<(Category, f64)> for WeightMap {
    fn from_iter<I: IntoIterator<Item = (Category, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[(Category, f64); N]> for WeightMap {
    fn from(pairs: [(Category, f64); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl<'de> Deserialize<'de> for WeightMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = FxHashMap::<String, f64>::deserialize(deserializer)?;
        raw.into_iter()
            .map(|(name, weight)| {
                name.parse::<Category>()
                    .map(|category| (category, weight))
                    .map_err(D::Error::custom)
            })
            .collect()
    }
}

/// Per-request adjustments added to layer weights before renormalization.
///
/// On the wire this is a JSON object of category names to numbers. Keys that do not
/// name a known category are dropped while deserializing.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ProbabilityOffsets(BTreeMap<Category, f64>);

impl ProbabilityOffsets {
    /// No offsets.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Set the offset of a category.
    pub fn insert(&mut self, category: Category, offset: f64) {
        self.0.insert(category, offset);
    }

    /// Add to the offset of a category.
    pub fn add(&mut self, category: Category, delta: f64) {
        *self.0.entry(category).or_insert(0.0) += delta;
    }

    /// The offset of a category; absent categories have offset zero.
    #[must_use]
    pub fn get(&self, category: Category) -> f64 {
        self.0.get(&category).copied().unwrap_or(0.0)
    }

    /// Whether no category has an offset.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over `(category, offset)` pairs in category order.
    pub fn iter(&self) -> impl Iterator<Item = (Category, f64)> + '_ {
        self.0.iter().map(|(category, offset)| (*category, *offset))
    }

    /// Build offsets from wire names, ignoring names that are not categories.
    pub fn from_named<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let mut offsets = Self::new();
        for (name, offset) in pairs {
            match name.parse::<Category>() {
                Ok(category) => offsets.insert(category, offset),
                Err(_) => log::debug!("Ignoring offset for unknown category {name:?}"),
            }
        }
        offsets
    }
}

impl FromIterator<(Category, f64)> for ProbabilityOffsets {
    fn from_iter<I: IntoIterator<Item = (Category, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[(Category, f64); N]> for ProbabilityOffsets {
    fn from(pairs: [(Category, f64); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl<'de> Deserialize<'de> for ProbabilityOffsets {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = FxHashMap::<String, f64>::deserialize(deserializer)?;
        Ok(Self::from_named(
            raw.iter().map(|(name, offset)| (name.as_str(), *offset)),
        ))
    }
}

/// How negative per-category weights are treated after offsets are added.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NegativeWeightPolicy {
    /// Keep negative weights in the sum and in the cumulative walk.
    ///
    /// A negative weight lowers the cumulative thresholds of every later category, so
    /// the result is not a probability distribution.
    #[default]
    Preserve,
    /// Floor every weight at zero before summing.
    Clamp,
}

/// A layer's weights after offsets and renormalization.
#[derive(Debug, Clone, PartialEq)]
pub enum Distribution {
    /// Weights divided by their positive total, in category order.
    Normalized(SmallVec<[(Category, f64); Category::COUNT]>),
    /// The adjusted weights summed to zero or less; every sample is void.
    Degenerate,
}

impl Distribution {
    /// A distribution that only ever yields void.
    #[must_use]
    pub fn void_only() -> Self {
        let mut weights = SmallVec::new();
        weights.push((Category::Void, 1.0));
        Self::Normalized(weights)
    }

    /// The normalized weight of a category, or `None` if it is absent or degenerate.
    #[must_use]
    pub fn weight(&self, category: Category) -> Option<f64> {
        match self {
            Self::Normalized(weights) => weights
                .iter()
                .find(|(c, _)| *c == category)
                .map(|(_, w)| *w),
            Self::Degenerate => None,
        }
    }
}

/// Add offsets to a layer's base weights and renormalize.
///
/// Only categories already present in `base` are adjusted; offsets for other
/// categories are ignored, so a request can boost a mineral but never introduce one
/// into a layer that lacks it. A total that is not strictly positive (or not finite)
/// yields [`Distribution::Degenerate`].
#[must_use]
pub fn apply_offsets(
    base: &WeightMap,
    offsets: &ProbabilityOffsets,
    policy: NegativeWeightPolicy,
) -> Distribution {
    let mut adjusted: SmallVec<[(Category, f64); Category::COUNT]> = base
        .iter()
        .map(|(category, weight)| {
            let weight = weight + offsets.get(category);
            match policy {
                NegativeWeightPolicy::Preserve => (category, weight),
                NegativeWeightPolicy::Clamp => (category, weight.max(0.0)),
            }
        })
        .collect();

    let total: f64 = adjusted.iter().map(|(_, w)| w).sum();
    if !(total > 0.0 && total.is_finite()) {
        return Distribution::Degenerate;
    }

    for (_, weight) in &mut adjusted {
        *weight /= total;
    }
    Distribution::Normalized(adjusted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface() -> WeightMap {
        WeightMap::from([
            (Category::Void, 0.5),
            (Category::Quartz, 0.3),
            (Category::Feldspar, 0.1),
            (Category::Mica, 0.05),
            (Category::Gold, 0.05),
        ])
    }

    fn total(distribution: &Distribution) -> f64 {
        match distribution {
            Distribution::Normalized(weights) => weights.iter().map(|(_, w)| w).sum(),
            Distribution::Degenerate => panic!("expected a normalized distribution"),
        }
    }

    #[test]
    fn test_no_offsets_normalizes_to_one() {
        let distribution = apply_offsets(
            &surface(),
            &ProbabilityOffsets::new(),
            NegativeWeightPolicy::Preserve,
        );
        assert!((total(&distribution) - 1.0).abs() < 1e-9);
        assert!((distribution.weight(Category::Void).unwrap() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_offsets_renormalize() {
        let offsets = ProbabilityOffsets::from([(Category::Gold, 0.95)]);
        let distribution = apply_offsets(&surface(), &offsets, NegativeWeightPolicy::Preserve);
        assert!((total(&distribution) - 1.0).abs() < 1e-9);
        assert!((distribution.weight(Category::Gold).unwrap() - 1.0 / 1.95).abs() < 1e-9);
        assert!((distribution.weight(Category::Void).unwrap() - 0.5 / 1.95).abs() < 1e-9);
    }

    #[test]
    fn test_offsets_cannot_introduce_categories() {
        let offsets = ProbabilityOffsets::from([(Category::Diamond, 10.0)]);
        let distribution = apply_offsets(&surface(), &offsets, NegativeWeightPolicy::Preserve);
        assert_eq!(distribution.weight(Category::Diamond), None);
        assert!((total(&distribution) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_non_positive_total_is_degenerate() {
        let offsets = ProbabilityOffsets::from([
            (Category::Void, -0.5),
            (Category::Quartz, -0.3),
            (Category::Feldspar, -0.1),
            (Category::Mica, -0.05),
            (Category::Gold, -0.05),
        ]);
        for policy in [NegativeWeightPolicy::Preserve, NegativeWeightPolicy::Clamp] {
            assert_eq!(
                apply_offsets(&surface(), &offsets, policy),
                Distribution::Degenerate
            );
        }

        let negative = ProbabilityOffsets::from([(Category::Void, -5.0)]);
        assert_eq!(
            apply_offsets(&surface(), &negative, NegativeWeightPolicy::Preserve),
            Distribution::Degenerate
        );
    }

    #[test]
    fn test_preserve_keeps_negative_weights() {
        let offsets = ProbabilityOffsets::from([(Category::Feldspar, -0.2)]);
        let distribution = apply_offsets(&surface(), &offsets, NegativeWeightPolicy::Preserve);
        let feldspar = distribution.weight(Category::Feldspar).unwrap();
        assert!((feldspar - (-0.1 / 0.9)).abs() < 1e-9);
        assert!((total(&distribution) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_clamp_floors_negative_weights() {
        let offsets = ProbabilityOffsets::from([(Category::Feldspar, -0.2)]);
        let distribution = apply_offsets(&surface(), &offsets, NegativeWeightPolicy::Clamp);
        assert_eq!(distribution.weight(Category::Feldspar), Some(0.0));
        assert!((distribution.weight(Category::Void).unwrap() - 0.5 / 0.9).abs() < 1e-9);
        assert!((total(&distribution) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_insertion_order_does_not_matter() {
        let forward: WeightMap = [
            (Category::Gold, 0.2),
            (Category::Void, 0.5),
            (Category::Quartz, 0.3),
        ]
        .into_iter()
        .collect();
        let backward: WeightMap = [
            (Category::Quartz, 0.3),
            (Category::Void, 0.5),
            (Category::Gold, 0.2),
        ]
        .into_iter()
        .collect();
        let offsets = ProbabilityOffsets::new();
        assert_eq!(
            apply_offsets(&forward, &offsets, NegativeWeightPolicy::Preserve),
            apply_offsets(&backward, &offsets, NegativeWeightPolicy::Preserve)
        );
    }

    #[test]
    fn test_offsets_ignore_unknown_wire_names() {
        let offsets: ProbabilityOffsets =
            serde_json::from_str(r#"{"gold": 0.5, "unobtainium": 3.0, "void": -0.1}"#).unwrap();
        assert_eq!(offsets.get(Category::Gold), 0.5);
        assert_eq!(offsets.get(Category::Void), -0.1);
        assert_eq!(offsets.get(Category::Quartz), 0.0);
        assert_eq!(offsets.iter().count(), 2);
    }

    #[test]
    fn test_weight_map_rejects_unknown_categories() {
        assert!(serde_json::from_str::<WeightMap>(r#"{"gold": 1.0}"#).is_ok());
        assert!(serde_json::from_str::<WeightMap>(r#"{"mithril": 1.0}"#).is_err());
    }
}
