//! Cumulative-distribution sampling.

use geode_utils::Category;

use crate::weights::Distribution;

/// Convert a uniform value in `[0, 1)` into a category.
///
/// Walks the categories in sort order and returns the first whose running total
/// exceeds `u`. If rounding leaves the final total at or below `u`, the last category
/// in sort order is returned. A degenerate distribution is void regardless of `u`.
#[must_use]
pub fn sample(u: f64, distribution: &Distribution) -> Category {
    let Distribution::Normalized(weights) = distribution else {
        return Category::Void;
    };

    let mut cumulative = 0.0;
    for &(category, weight) in weights {
        cumulative += weight;
        if cumulative > u {
            return category;
        }
    }

    weights.last().map_or(Category::Void, |&(category, _)| category)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weights::{NegativeWeightPolicy, ProbabilityOffsets, WeightMap, apply_offsets};

    fn distribution(pairs: &[(Category, f64)]) -> Distribution {
        apply_offsets(
            &pairs.iter().copied().collect::<WeightMap>(),
            &ProbabilityOffsets::new(),
            NegativeWeightPolicy::Preserve,
        )
    }

    #[test]
    fn test_walks_in_category_order() {
        // feldspar 0.1, gold 0.15, mica 0.2, quartz 0.5, void 1.0
        let d = distribution(&[
            (Category::Void, 0.5),
            (Category::Quartz, 0.3),
            (Category::Feldspar, 0.1),
            (Category::Mica, 0.05),
            (Category::Gold, 0.05),
        ]);
        assert_eq!(sample(0.0, &d), Category::Feldspar);
        assert_eq!(sample(0.099, &d), Category::Feldspar);
        assert_eq!(sample(0.12, &d), Category::Gold);
        assert_eq!(sample(0.17, &d), Category::Mica);
        assert_eq!(sample(0.480_243_875_601_780_45, &d), Category::Quartz);
        assert_eq!(sample(0.8, &d), Category::Void);
    }

    #[test]
    fn test_boundary_goes_to_next_category() {
        let d = distribution(&[(Category::Gold, 0.5), (Category::Iron, 0.5)]);
        assert_eq!(sample(0.5, &d), Category::Iron);
        assert_eq!(sample(0.499_999, &d), Category::Gold);
    }

    #[test]
    fn test_rounding_falls_back_to_last_category() {
        let mut weights = smallvec::SmallVec::new();
        weights.push((Category::Basalt, 0.3));
        weights.push((Category::Quartz, 0.3));
        let short = Distribution::Normalized(weights);
        assert_eq!(sample(0.99, &short), Category::Quartz);
    }

    #[test]
    fn test_degenerate_is_void() {
        for u in [0.0, 0.25, 0.5, 0.999_999] {
            assert_eq!(sample(u, &Distribution::Degenerate), Category::Void);
        }
    }

    #[test]
    fn test_insertion_order_gives_identical_samples() {
        let a = distribution(&[
            (Category::Iron, 0.2),
            (Category::Basalt, 0.5),
            (Category::Gold, 0.3),
        ]);
        let b = distribution(&[
            (Category::Gold, 0.3),
            (Category::Iron, 0.2),
            (Category::Basalt, 0.5),
        ]);
        for step in 0..1000 {
            let u = f64::from(step) / 1000.0;
            assert_eq!(sample(u, &a), sample(u, &b));
        }
    }
}
