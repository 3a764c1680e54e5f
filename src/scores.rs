//! Sub-score calculation and muscle aggregation
//!
//! This module computes the three per-muscle sub-scores and combines them
//! into one muscle total:
//! - Completion: contractions performed vs expected
//! - Intensity: contractions meeting the MVC amplitude threshold
//! - Duration: contractions meeting the duration threshold
//!
//! "No data" is `None`, never 0; a muscle with no recorded contractions is
//! not penalized on sub-scores it cannot yet measure.

use crate::types::ComponentScore;
use crate::weights::ScoringWeights;

/// Completion score: performed vs expected contractions.
///
/// With no expected count (absent or zero) nothing was required, so
/// completion is vacuously 100. Capped at 100.
pub fn completion_score(performed: u32, expected: Option<u32>) -> f64 {
    match expected {
        None | Some(0) => 100.0,
        Some(e) => ((performed as f64 / e as f64) * 100.0).round().min(100.0),
    }
}

/// Intensity score: share of contractions meeting the MVC threshold.
///
/// Returns `None` when no contractions were recorded, so callers can
/// distinguish "no data" from "0% quality".
pub fn intensity_score(good_count: u32, total: u32) -> Option<f64> {
    if total == 0 {
        None
    } else {
        Some(((good_count as f64 / total as f64) * 100.0).round())
    }
}

/// Duration score: share of contractions meeting the duration threshold.
/// Same null-when-empty rule as [`intensity_score`].
pub fn duration_score(long_count: u32, total: u32) -> Option<f64> {
    if total == 0 {
        None
    } else {
        Some(((long_count as f64 / total as f64) * 100.0).round())
    }
}

/// Combine the three sub-scores into one muscle total.
///
/// `None` components are dropped and the surviving sub-weights renormalized
/// to sum to 1.0, so missing data is excluded from the denominator instead
/// of counting as zero. All three missing yields 0.
pub fn muscle_total(
    completion: Option<f64>,
    intensity: Option<f64>,
    duration: Option<f64>,
    weights: &ScoringWeights,
) -> f64 {
    let parts = [
        (completion, weights.compliance_completion),
        (intensity, weights.compliance_intensity),
        (duration, weights.compliance_duration),
    ];

    let mut weighted_sum = 0.0;
    let mut weight_sum = 0.0;
    for (score, weight) in parts {
        if let Some(value) = score {
            weighted_sum += value * weight;
            weight_sum += weight;
        }
    }

    if weight_sum <= 0.0 {
        0.0
    } else {
        (weighted_sum / weight_sum).round().clamp(0.0, 100.0)
    }
}

/// Build a [`ComponentScore`] with its dashboard formula string
pub fn component_score(value: f64, count: u32, total: u32) -> ComponentScore {
    ComponentScore {
        value: value.clamp(0.0, 100.0),
        count,
        total,
        formula: format!("{count}/{total} * 100"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_completion_full_and_zero() {
        assert_eq!(completion_score(12, Some(12)), 100.0);
        assert_eq!(completion_score(0, Some(12)), 0.0);
    }

    #[test]
    fn test_completion_vacuous_without_target() {
        assert_eq!(completion_score(7, None), 100.0);
        assert_eq!(completion_score(0, None), 100.0);
        assert_eq!(completion_score(42, Some(0)), 100.0);
    }

    #[test]
    fn test_completion_capped_at_100() {
        assert_eq!(completion_score(15, Some(12)), 100.0);
    }

    #[test]
    fn test_completion_rounding() {
        // 8/12 = 66.67% -> 67
        assert_eq!(completion_score(8, Some(12)), 67.0);
    }

    #[test]
    fn test_intensity_none_when_empty() {
        assert_eq!(intensity_score(0, 0), None);
        assert_eq!(intensity_score(5, 0), None);
    }

    #[test]
    fn test_intensity_full() {
        assert_eq!(intensity_score(10, 10), Some(100.0));
        assert_eq!(intensity_score(0, 10), Some(0.0));
    }

    #[test]
    fn test_duration_none_when_empty() {
        assert_eq!(duration_score(3, 0), None);
        assert_eq!(duration_score(2, 4), Some(50.0));
    }

    #[test]
    fn test_muscle_total_all_components() {
        let weights = ScoringWeights::default();
        let total = muscle_total(Some(100.0), Some(100.0), Some(100.0), &weights);
        assert_eq!(total, 100.0);
    }

    #[test]
    fn test_muscle_total_renormalizes_missing_components() {
        let weights = ScoringWeights::default();
        // No contractions recorded: only completion is measurable. A vacuous
        // 100 must stay 100, not be dragged down by the missing components.
        let total = muscle_total(Some(100.0), None, None, &weights);
        assert_eq!(total, 100.0);
    }

    #[test]
    fn test_muscle_total_weighted_mean_over_survivors() {
        let weights = ScoringWeights {
            compliance_completion: 0.5,
            compliance_intensity: 0.25,
            compliance_duration: 0.25,
            ..ScoringWeights::default()
        };
        // completion 80 (w 0.5) + duration 40 (w 0.25), renormalized over 0.75
        let total = muscle_total(Some(80.0), None, Some(40.0), &weights);
        assert_eq!(total, 67.0);
    }

    #[test]
    fn test_muscle_total_all_missing_is_zero() {
        let weights = ScoringWeights::default();
        assert_eq!(muscle_total(None, None, None, &weights), 0.0);
    }

    #[test]
    fn test_component_score_formula() {
        let score = component_score(67.0, 8, 12);
        assert_eq!(score.value, 67.0);
        assert_eq!(score.formula, "8/12 * 100");
    }
}
