//! Core types for the Myoscore scoring pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: session parameters, per-channel contraction analytics, resolved
//! thresholds, and score outputs.

use crate::weights::ScoringWeights;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single detected contraction from the signal-processing backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contraction {
    /// Contraction onset relative to session start (ms)
    pub start_time_ms: f64,
    /// Contraction offset relative to session start (ms)
    pub end_time_ms: f64,
    /// Contraction duration (ms)
    pub duration_ms: f64,
    /// Peak amplitude in session-MVC units
    pub amplitude: f64,
    /// Whether the amplitude reached the MVC threshold
    pub meets_mvc: bool,
    /// Whether the duration reached the duration threshold
    pub meets_duration: bool,
}

/// Backend-computed analytics for one EMG channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelAnalyticsData {
    /// Already-scaled absolute MVC threshold computed by the backend, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mvc_threshold_actual_value: Option<f64>,
    /// Number of contractions detected on this channel
    pub contraction_count: u32,
    /// Detected contraction records
    #[serde(default)]
    pub contractions: Vec<Contraction>,
    /// When the backend computed these analytics
    #[serde(skip_serializing_if = "Option::is_none")]
    pub computed_at: Option<DateTime<Utc>>,
}

impl Default for ChannelAnalyticsData {
    fn default() -> Self {
        Self {
            mvc_threshold_actual_value: None,
            contraction_count: 0,
            contractions: Vec::new(),
            computed_at: None,
        }
    }
}

impl ChannelAnalyticsData {
    /// Count of contractions meeting the MVC amplitude threshold
    pub fn good_contraction_count(&self) -> u32 {
        self.contractions.iter().filter(|c| c.meets_mvc).count() as u32
    }

    /// Count of contractions meeting the duration threshold
    pub fn long_contraction_count(&self) -> u32 {
        self.contractions.iter().filter(|c| c.meets_duration).count() as u32
    }
}

/// BFR parameters reported for one body side
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BfrSideParameters {
    /// Measured arterial occlusion pressure (mmHg)
    pub aop_measured: Option<f64>,
    /// Pressure actually applied by the cuff (mmHg)
    pub applied_pressure: Option<f64>,
    /// Applied pressure as a percentage of AOP
    pub percentage_aop: Option<f64>,
    /// Compliance flag reported by the device/therapist
    pub is_compliant: bool,
    /// Lower bound of the therapeutic %AOP range
    pub therapeutic_range_min: f64,
    /// Upper bound of the therapeutic %AOP range
    pub therapeutic_range_max: f64,
}

impl BfrSideParameters {
    /// Whether the reported %AOP falls inside the therapeutic range.
    /// Returns `None` when no %AOP was reported.
    pub fn pressure_in_range(&self) -> Option<bool> {
        self.percentage_aop.filter(|p| p.is_finite()).map(|p| {
            p >= self.therapeutic_range_min && p <= self.therapeutic_range_max
        })
    }
}

/// Per-session configuration owned by the session UI.
///
/// The scoring engine reads this on every recompute and never mutates it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameSessionParameters {
    /// Channel name → muscle display name (e.g. "CH1" → "Left Quadriceps")
    #[serde(default)]
    pub channel_muscle_mapping: HashMap<String, String>,
    /// Muscle display name → dashboard color
    #[serde(default)]
    pub muscle_color_mapping: HashMap<String, String>,
    /// Global session MVC calibration value
    pub session_mvc_value: Option<f64>,
    /// Per-muscle MVC calibration values, keyed by base channel
    #[serde(default)]
    pub session_mvc_values: HashMap<String, f64>,
    /// Global MVC threshold percentage (0-100)
    pub session_mvc_threshold_percentage: Option<f64>,
    /// Per-muscle MVC threshold percentages, keyed by base channel
    #[serde(default)]
    pub session_mvc_threshold_percentages: HashMap<String, f64>,
    /// Minimum contraction duration to count as "long" (ms)
    pub contraction_duration_threshold_ms: Option<f64>,
    /// Expected contraction count applied to every channel
    pub session_expected_contractions: Option<u32>,
    /// Per-channel expected contraction counts, keyed by base channel
    #[serde(default)]
    pub session_expected_contractions_per_channel: HashMap<String, u32>,
    /// Post-session rating of perceived exertion (Borg CR10, 0-10)
    pub post_session_rpe: Option<f64>,
    /// BFR parameters for the left side, if BFR was prescribed
    pub bfr_left: Option<BfrSideParameters>,
    /// BFR parameters for the right side, if BFR was prescribed
    pub bfr_right: Option<BfrSideParameters>,
}

impl GameSessionParameters {
    /// Expected contraction count for a base channel: per-channel value first,
    /// then the session-wide value.
    pub fn expected_contractions_for(&self, channel: &str) -> Option<u32> {
        self.session_expected_contractions_per_channel
            .get(channel)
            .copied()
            .or(self.session_expected_contractions)
    }
}

/// Which source a unified threshold was resolved from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdSource {
    SessionPerMuscle,
    Analytics,
    SessionGlobal,
    GlobalFallback,
}

impl ThresholdSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThresholdSource::SessionPerMuscle => "session_per_muscle",
            ThresholdSource::Analytics => "analytics",
            ThresholdSource::SessionGlobal => "session_global",
            ThresholdSource::GlobalFallback => "global_fallback",
        }
    }

    /// Clinical confidence attached to thresholds from this source
    pub fn confidence(&self) -> f64 {
        match self {
            ThresholdSource::SessionPerMuscle => 0.9,
            ThresholdSource::Analytics => 0.7,
            ThresholdSource::SessionGlobal => 0.4,
            ThresholdSource::GlobalFallback => 0.2,
        }
    }
}

/// Consolidated threshold record for one base muscle channel.
///
/// Derived on every input change, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedThreshold {
    /// Base channel name (signal-type suffixes stripped)
    pub channel: String,
    /// MVC baseline the threshold was derived from, when reconstructable
    pub mvc_base_value: Option<f64>,
    /// Absolute MVC amplitude threshold
    pub mvc_threshold: f64,
    /// Minimum contraction duration threshold (ms)
    pub duration_threshold_ms: f64,
    /// Which source won the precedence cascade
    pub source: ThresholdSource,
    /// Confidence in the resolved threshold (0-1)
    pub confidence: f64,
}

/// One scored component of a muscle's performance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentScore {
    /// Score value (0-100)
    pub value: f64,
    /// Numerator count that produced the value
    pub count: u32,
    /// Denominator count that produced the value
    pub total: u32,
    /// Human-readable formula for the dashboard tooltip
    pub formula: String,
}

/// Aggregated performance for one muscle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MusclePerformanceData {
    /// Muscle display name
    pub muscle_name: String,
    /// Weighted muscle total (0-100)
    pub total_score: f64,
    /// Completion sub-score (always defined; vacuously 100 with no target)
    pub completion: ComponentScore,
    /// Intensity sub-score; `None` until contractions are recorded
    pub mvc_quality: Option<ComponentScore>,
    /// Duration sub-score; `None` until contractions are recorded
    pub quality_threshold: Option<ComponentScore>,
}

/// Top-level scoring result published to the dashboard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhancedPerformanceData {
    /// Overall weighted score (0-100)
    pub overall_score: f64,
    /// Left-side muscle performance, if a left channel was resolvable
    pub left_muscle: Option<MusclePerformanceData>,
    /// Right-side muscle performance, if a right channel was resolvable
    pub right_muscle: Option<MusclePerformanceData>,
    /// Left/right symmetry score (0-100)
    pub symmetry_score: f64,
    /// RPE-derived effort score (0-100)
    pub effort_score: f64,
    /// BFR-gated compliance score (0-100)
    pub compliance_score: f64,
    /// Normalized game telemetry score, when supplied
    pub game_score_normalized: Option<f64>,
    /// Weights used to combine the components
    pub weights: ScoringWeights,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn make_contraction(amplitude: f64, duration_ms: f64, meets_mvc: bool, meets_duration: bool) -> Contraction {
        Contraction {
            start_time_ms: 0.0,
            end_time_ms: duration_ms,
            duration_ms,
            amplitude,
            meets_mvc,
            meets_duration,
        }
    }

    #[test]
    fn test_contraction_quality_counts() {
        let analytics = ChannelAnalyticsData {
            contraction_count: 3,
            contractions: vec![
                make_contraction(0.09, 2500.0, true, true),
                make_contraction(0.05, 1200.0, false, false),
                make_contraction(0.08, 2100.0, true, true),
            ],
            ..Default::default()
        };

        assert_eq!(analytics.good_contraction_count(), 2);
        assert_eq!(analytics.long_contraction_count(), 2);
    }

    #[test]
    fn test_expected_contractions_precedence() {
        let mut params = GameSessionParameters {
            session_expected_contractions: Some(12),
            ..Default::default()
        };
        params
            .session_expected_contractions_per_channel
            .insert("CH1".to_string(), 15);

        assert_eq!(params.expected_contractions_for("CH1"), Some(15));
        assert_eq!(params.expected_contractions_for("CH2"), Some(12));
    }

    #[test]
    fn test_bfr_pressure_in_range() {
        let bfr = BfrSideParameters {
            aop_measured: Some(180.0),
            applied_pressure: Some(90.0),
            percentage_aop: Some(50.0),
            is_compliant: true,
            therapeutic_range_min: 40.0,
            therapeutic_range_max: 60.0,
        };
        assert_eq!(bfr.pressure_in_range(), Some(true));

        let out_of_range = BfrSideParameters {
            percentage_aop: Some(75.0),
            ..bfr.clone()
        };
        assert_eq!(out_of_range.pressure_in_range(), Some(false));

        let missing = BfrSideParameters {
            percentage_aop: None,
            ..bfr
        };
        assert_eq!(missing.pressure_in_range(), None);
    }

    #[test]
    fn test_threshold_source_confidence() {
        assert_eq!(ThresholdSource::SessionPerMuscle.confidence(), 0.9);
        assert_eq!(ThresholdSource::Analytics.confidence(), 0.7);
        assert_eq!(ThresholdSource::SessionGlobal.confidence(), 0.4);
        assert_eq!(ThresholdSource::GlobalFallback.confidence(), 0.2);
    }

    #[test]
    fn test_analytics_json_round_trip() {
        let analytics = ChannelAnalyticsData {
            mvc_threshold_actual_value: Some(0.075),
            contraction_count: 1,
            contractions: vec![make_contraction(0.09, 2500.0, true, true)],
            computed_at: None,
        };

        let json = serde_json::to_string(&analytics).unwrap();
        let back: ChannelAnalyticsData = serde_json::from_str(&json).unwrap();
        assert_eq!(back.contraction_count, 1);
        assert_eq!(back.mvc_threshold_actual_value, Some(0.075));
    }
}
