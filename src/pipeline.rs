//! Scoring pipeline orchestration
//!
//! This module provides the public scoring API: one pure pass from session
//! parameters and per-channel analytics to an [`EnhancedPerformanceData`]
//! payload.
//!
//! Pipeline stages:
//! 1. ThresholdResolver - consolidate MVC/duration thresholds per base channel
//! 2. Sub-scores - completion/intensity/duration per muscle
//! 3. Muscle aggregation - weighted muscle totals
//! 4. Clinical components - symmetry, effort, BFR compliance gate
//! 5. Overall aggregation - weighted combination into the final score

use crate::clinical::{bfr_compliance_gate, effort_score_from_rpe, symmetry_score};
use crate::scores::{
    completion_score, component_score, duration_score, intensity_score, muscle_total,
};
use crate::thresholds::{base_channel, ThresholdResolver};
use crate::types::{
    ChannelAnalyticsData, ComponentScore, EnhancedPerformanceData, GameSessionParameters,
    MusclePerformanceData,
};
use crate::weights::ScoringWeights;
use std::collections::HashMap;

/// Score a session: pure function of its latest inputs.
///
/// `analytics` is keyed by signal key (base channel or suffixed variant);
/// channel discovery uses its keys in sorted order so results are
/// deterministic. Channels without a resolvable MVC threshold yield no
/// muscle entry.
pub fn score_session(
    session: &GameSessionParameters,
    analytics: &HashMap<String, ChannelAnalyticsData>,
    global_mvc_threshold: Option<f64>,
    game_score_normalized: Option<f64>,
    weights: &ScoringWeights,
) -> EnhancedPerformanceData {
    let mut signal_keys: Vec<String> = analytics.keys().cloned().collect();
    signal_keys.sort();

    let resolver =
        ThresholdResolver::resolve(session, Some(analytics), &signal_keys, global_mvc_threshold);

    let muscles: Vec<MusclePerformanceData> = resolver
        .thresholds()
        .iter()
        .map(|t| {
            score_muscle(
                &t.channel,
                &resolver,
                analytics_for(analytics, &t.channel),
                session,
                weights,
            )
        })
        .collect();

    let (left_muscle, right_muscle) = assign_sides(muscles);

    let left_total = left_muscle.as_ref().map(|m| m.total_score);
    let right_total = right_muscle.as_ref().map(|m| m.total_score);

    let symmetry = symmetry_score(left_total.unwrap_or(0.0), right_total.unwrap_or(0.0));
    let effort = effort_score_from_rpe(session.post_session_rpe);
    let gate = bfr_compliance_gate(session.bfr_left.as_ref(), session.bfr_right.as_ref());

    let muscle_average = match (left_total, right_total) {
        (Some(l), Some(r)) => (l + r) / 2.0,
        (Some(v), None) | (None, Some(v)) => v,
        (None, None) => 0.0,
    };
    let compliance = ((gate / 100.0) * muscle_average).round().clamp(0.0, 100.0);

    let overall = overall_score(compliance, symmetry, effort, game_score_normalized, weights);

    EnhancedPerformanceData {
        overall_score: overall,
        left_muscle,
        right_muscle,
        symmetry_score: symmetry,
        effort_score: effort,
        compliance_score: compliance,
        game_score_normalized,
        weights: *weights,
    }
}

/// Combine the top-level components into the overall score.
///
/// An absent game score drops its term and renormalizes the remaining
/// weights, mirroring the sub-score treatment of missing data.
fn overall_score(
    compliance: f64,
    symmetry: f64,
    effort: f64,
    game_score_normalized: Option<f64>,
    weights: &ScoringWeights,
) -> f64 {
    let parts = [
        (Some(compliance), weights.compliance),
        (Some(symmetry), weights.symmetry),
        (Some(effort), weights.effort),
        (game_score_normalized, weights.game_score),
    ];

    let mut weighted_sum = 0.0;
    let mut weight_sum = 0.0;
    for (value, weight) in parts {
        if let Some(v) = value {
            weighted_sum += v * weight;
            weight_sum += weight;
        }
    }

    if weight_sum <= 0.0 {
        0.0
    } else {
        (weighted_sum / weight_sum).round().clamp(0.0, 100.0)
    }
}

/// Find analytics for a base channel whether the map is keyed by base
/// channel or by a suffixed signal key
fn analytics_for<'a>(
    analytics: &'a HashMap<String, ChannelAnalyticsData>,
    channel: &str,
) -> Option<&'a ChannelAnalyticsData> {
    if let Some(data) = analytics.get(channel) {
        return Some(data);
    }
    let mut keys: Vec<&String> = analytics.keys().collect();
    keys.sort();
    keys.into_iter()
        .find(|key| base_channel(key) == channel)
        .and_then(|key| analytics.get(key))
}

/// Score one muscle from its contraction analytics
fn score_muscle(
    channel: &str,
    resolver: &ThresholdResolver,
    data: Option<&ChannelAnalyticsData>,
    session: &GameSessionParameters,
    weights: &ScoringWeights,
) -> MusclePerformanceData {
    let recorded = data.map(|d| d.contractions.len() as u32).unwrap_or(0);
    let performed = data
        .map(|d| d.contraction_count.max(d.contractions.len() as u32))
        .unwrap_or(0);
    let good = data.map(ChannelAnalyticsData::good_contraction_count).unwrap_or(0);
    let long = data.map(ChannelAnalyticsData::long_contraction_count).unwrap_or(0);

    let expected = session.expected_contractions_for(channel);
    let completion = match expected {
        Some(e) if e > 0 => component_score(completion_score(performed, expected), performed, e),
        _ => ComponentScore {
            value: 100.0,
            count: performed,
            total: 0,
            formula: "no expected contractions".to_string(),
        },
    };

    let mvc_quality = intensity_score(good, recorded).map(|v| component_score(v, good, recorded));
    let quality_threshold =
        duration_score(long, recorded).map(|v| component_score(v, long, recorded));

    let total_score = muscle_total(
        Some(completion.value),
        mvc_quality.as_ref().map(|c| c.value),
        quality_threshold.as_ref().map(|c| c.value),
        weights,
    );

    MusclePerformanceData {
        muscle_name: resolver.muscle_name_for(channel),
        total_score,
        completion,
        mvc_quality,
        quality_threshold,
    }
}

/// Assign muscles to body sides.
///
/// Muscle names prefixed "Left"/"Right" are assigned explicitly; remaining
/// muscles fill open sides in channel order (acquisition convention:
/// first channel left, second right).
fn assign_sides(
    muscles: Vec<MusclePerformanceData>,
) -> (Option<MusclePerformanceData>, Option<MusclePerformanceData>) {
    let mut left = None;
    let mut right = None;
    let mut unassigned = Vec::new();

    for muscle in muscles {
        let name = muscle.muscle_name.to_lowercase();
        if left.is_none() && name.starts_with("left") {
            left = Some(muscle);
        } else if right.is_none() && name.starts_with("right") {
            right = Some(muscle);
        } else {
            unassigned.push(muscle);
        }
    }

    let mut rest = unassigned.into_iter();
    if left.is_none() {
        left = rest.next();
    }
    if right.is_none() {
        right = rest.next();
    }
    (left, right)
}

/// Stateful scorer holding the resolved weights.
///
/// Use this when the same weight configuration applies across many scoring
/// passes (the live controller, the CLI).
#[derive(Debug, Clone)]
pub struct SessionScorer {
    weights: ScoringWeights,
}

impl Default for SessionScorer {
    fn default() -> Self {
        Self::new(ScoringWeights::default())
    }
}

impl SessionScorer {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Replace the weights, rejecting invalid configurations
    pub fn set_weights(&mut self, weights: ScoringWeights) -> Result<(), crate::ScoreError> {
        weights.validate()?;
        self.weights = weights;
        Ok(())
    }

    /// Run one scoring pass with the held weights
    pub fn score(
        &self,
        session: &GameSessionParameters,
        analytics: &HashMap<String, ChannelAnalyticsData>,
        global_mvc_threshold: Option<f64>,
        game_score_normalized: Option<f64>,
    ) -> EnhancedPerformanceData {
        score_session(
            session,
            analytics,
            global_mvc_threshold,
            game_score_normalized,
            &self.weights,
        )
    }
}
