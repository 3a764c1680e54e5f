//! Scoring weight configuration
//!
//! This module defines the immutable [`ScoringWeights`] value object: the
//! top-level component weights (compliance, symmetry, effort, game score) and
//! the compliance sub-weights (completion, intensity, duration). Both groups
//! must sum to 1.0 within a small tolerance.

use crate::error::ScoreError;
use serde::{Deserialize, Serialize};

/// Allowed deviation of each weight group sum from 1.0
pub const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

/// Weight configuration for combining score components.
///
/// Created by the configuration resolver, consumed by the aggregators.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    /// Weight of the compliance component in the overall score
    pub compliance: f64,
    /// Weight of the symmetry component in the overall score
    pub symmetry: f64,
    /// Weight of the effort component in the overall score
    pub effort: f64,
    /// Weight of the game telemetry component in the overall score
    pub game_score: f64,
    /// Sub-weight of completion inside the compliance component
    pub compliance_completion: f64,
    /// Sub-weight of intensity inside the compliance component
    pub compliance_intensity: f64,
    /// Sub-weight of duration inside the compliance component
    pub compliance_duration: f64,
}

impl Default for ScoringWeights {
    /// Hard-coded clinical fallback weights
    fn default() -> Self {
        Self {
            compliance: 0.40,
            symmetry: 0.25,
            effort: 0.20,
            game_score: 0.15,
            compliance_completion: 0.334,
            compliance_intensity: 0.333,
            compliance_duration: 0.333,
        }
    }
}

impl ScoringWeights {
    /// Sum of the top-level component weights
    pub fn component_sum(&self) -> f64 {
        self.compliance + self.symmetry + self.effort + self.game_score
    }

    /// Sum of the compliance sub-weights
    pub fn compliance_sum(&self) -> f64 {
        self.compliance_completion + self.compliance_intensity + self.compliance_duration
    }

    /// Check both weight group sums against the tolerance
    pub fn is_valid(&self) -> bool {
        (self.component_sum() - 1.0).abs() <= WEIGHT_SUM_TOLERANCE
            && (self.compliance_sum() - 1.0).abs() <= WEIGHT_SUM_TOLERANCE
    }

    /// Validate both weight group sums, reporting the offending sums on failure
    pub fn validate(&self) -> Result<(), ScoreError> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(ScoreError::InvalidWeights(format!(
                "component sum {:.3}, compliance sub-weight sum {:.3} (expected 1.0 \u{00b1} {})",
                self.component_sum(),
                self.compliance_sum(),
                WEIGHT_SUM_TOLERANCE
            )))
        }
    }
}
