//! Threshold resolution
//!
//! This module consolidates the competing MVC threshold sources into one
//! [`UnifiedThreshold`] per base muscle channel. Signal-type variants of the
//! same muscle ("CH1 Raw", "CH1 Activated", ...) collapse to a single record.
//!
//! Sources are attempted in strict precedence order, stopping at the first
//! success: per-muscle session MVC → backend analytics → global session MVC →
//! externally supplied global fallback. Channels failing every tier are
//! omitted from the result rather than defaulted to zero.

use crate::types::{
    ChannelAnalyticsData, GameSessionParameters, ThresholdSource, UnifiedThreshold,
};
use std::collections::HashMap;

/// Minimum MVC baseline (session-MVC units) considered clinically meaningful
pub const CLINICAL_MIN_MVC: f64 = 0.01;

/// Conservative default contraction duration threshold (ms)
pub const DEFAULT_DURATION_THRESHOLD_MS: f64 = 2000.0;

/// Default MVC threshold percentage when the session specifies none
pub const DEFAULT_MVC_THRESHOLD_PERCENTAGE: f64 = 75.0;

/// Known signal-type suffixes, longest first so "Raw (C3D)" wins over "Raw"
const SIGNAL_TYPE_SUFFIXES: &[&str] = &[" Raw (C3D)", " Activated", " Processed", " RMS", " Raw"];

/// Strip known signal-type suffixes from a signal key to get the base channel
pub fn base_channel(signal_key: &str) -> String {
    let trimmed = signal_key.trim();
    for suffix in SIGNAL_TYPE_SUFFIXES {
        if let Some(stripped) = trimmed.strip_suffix(suffix) {
            return stripped.trim_end().to_string();
        }
    }
    trimmed.to_string()
}

/// Treat NaN, negative, and zero numeric inputs as absent
fn sanitize(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v > 0.0)
}

/// MVC threshold percentage for a base channel: per-muscle value first, then
/// the session-wide value, then the clinical default.
fn threshold_percentage(session: &GameSessionParameters, channel: &str) -> f64 {
    sanitize(session.session_mvc_threshold_percentages.get(channel).copied())
        .or_else(|| sanitize(session.session_mvc_threshold_percentage))
        .unwrap_or(DEFAULT_MVC_THRESHOLD_PERCENTAGE)
}

/// Resolved thresholds for one session, with base-channel lookups.
///
/// Pure function of its inputs; recomputed on every input change.
#[derive(Debug, Clone)]
pub struct ThresholdResolver {
    thresholds: Vec<UnifiedThreshold>,
    index: HashMap<String, usize>,
    muscle_names: HashMap<String, String>,
}

impl ThresholdResolver {
    /// Resolve one consolidated threshold per base channel.
    ///
    /// `available_signal_keys` drives channel discovery; result ordering is
    /// the insertion order of discovered base channels.
    pub fn resolve(
        session: &GameSessionParameters,
        analytics: Option<&HashMap<String, ChannelAnalyticsData>>,
        available_signal_keys: &[String],
        global_mvc_threshold: Option<f64>,
    ) -> Self {
        let mut thresholds = Vec::new();
        let mut index = HashMap::new();

        for key in available_signal_keys {
            let channel = base_channel(key);
            if channel.is_empty() || index.contains_key(&channel) {
                continue;
            }

            let channel_analytics =
                analytics.and_then(|map| lookup_by_base(map, &channel));

            let resolved = try_session_per_muscle(session, &channel)
                .or_else(|| try_analytics(session, &channel, channel_analytics))
                .or_else(|| try_session_global(session))
                .or_else(|| try_global_fallback(global_mvc_threshold));

            let Some((mvc_base_value, mvc_threshold, source)) = resolved else {
                tracing::debug!(channel = %channel, "no usable MVC source, omitting channel");
                continue;
            };

            index.insert(channel.clone(), thresholds.len());
            thresholds.push(UnifiedThreshold {
                channel,
                mvc_base_value,
                mvc_threshold,
                duration_threshold_ms: sanitize(session.contraction_duration_threshold_ms)
                    .unwrap_or(DEFAULT_DURATION_THRESHOLD_MS),
                source,
                confidence: source.confidence(),
            });
        }

        let muscle_names = session
            .channel_muscle_mapping
            .iter()
            .map(|(key, name)| (base_channel(key), name.clone()))
            .collect();

        Self {
            thresholds,
            index,
            muscle_names,
        }
    }

    /// All resolved thresholds, one per base channel
    pub fn thresholds(&self) -> &[UnifiedThreshold] {
        &self.thresholds
    }

    /// Threshold record for any signal key (variant suffixes accepted)
    pub fn threshold_for(&self, signal_key: &str) -> Option<&UnifiedThreshold> {
        let channel = base_channel(signal_key);
        self.index.get(&channel).map(|&i| &self.thresholds[i])
    }

    /// Absolute MVC threshold for any signal key
    pub fn mvc_threshold_for(&self, signal_key: &str) -> Option<f64> {
        self.threshold_for(signal_key).map(|t| t.mvc_threshold)
    }

    /// Duration threshold for any signal key, defaulting for unknown channels
    pub fn duration_threshold_for(&self, signal_key: &str) -> f64 {
        self.threshold_for(signal_key)
            .map(|t| t.duration_threshold_ms)
            .unwrap_or(DEFAULT_DURATION_THRESHOLD_MS)
    }

    /// Muscle display name for any signal key, falling back to the base channel
    pub fn muscle_name_for(&self, signal_key: &str) -> String {
        let channel = base_channel(signal_key);
        self.muscle_names
            .get(&channel)
            .cloned()
            .unwrap_or(channel)
    }
}

/// Find analytics for a base channel whether the map is keyed by base
/// channel or by a full signal key.
fn lookup_by_base<'a>(
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

type Attempt = Option<(Option<f64>, f64, ThresholdSource)>;

/// Tier a: per-muscle session MVC, scaled by the threshold percentage
fn try_session_per_muscle(session: &GameSessionParameters, channel: &str) -> Attempt {
    let base = sanitize(session.session_mvc_values.get(channel).copied())
        .filter(|v| *v >= CLINICAL_MIN_MVC)?;
    let pct = threshold_percentage(session, channel);
    Some((
        Some(base),
        base * pct / 100.0,
        ThresholdSource::SessionPerMuscle,
    ))
}

/// Tier b: backend analytics carry an already-absolute threshold; the base is
/// reverse-derived for display only.
fn try_analytics(
    session: &GameSessionParameters,
    channel: &str,
    analytics: Option<&ChannelAnalyticsData>,
) -> Attempt {
    let threshold = sanitize(analytics?.mvc_threshold_actual_value)?;
    let pct = threshold_percentage(session, channel);
    Some((
        Some(threshold / (pct / 100.0)),
        threshold,
        ThresholdSource::Analytics,
    ))
}

/// Tier c: global session MVC, scaled by the session-wide threshold percentage
fn try_session_global(session: &GameSessionParameters) -> Attempt {
    let base = sanitize(session.session_mvc_value).filter(|v| *v >= CLINICAL_MIN_MVC)?;
    let pct = sanitize(session.session_mvc_threshold_percentage)
        .unwrap_or(DEFAULT_MVC_THRESHOLD_PERCENTAGE);
    Some((
        Some(base),
        base * pct / 100.0,
        ThresholdSource::SessionGlobal,
    ))
}

/// Tier d: externally supplied global threshold, used verbatim (no base)
fn try_global_fallback(global_mvc_threshold: Option<f64>) -> Attempt {
    let threshold = sanitize(global_mvc_threshold)?;
    Some((None, threshold, ThresholdSource::GlobalFallback))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_base_channel_stripping() {
        assert_eq!(base_channel("CH1 Raw"), "CH1");
        assert_eq!(base_channel("CH1 Activated"), "CH1");
        assert_eq!(base_channel("CH1 Processed"), "CH1");
        assert_eq!(base_channel("CH1 RMS"), "CH1");
        assert_eq!(base_channel("CH1"), "CH1");
    }

    #[test]
    fn test_base_channel_longest_suffix_wins() {
        assert_eq!(base_channel("CH1 Raw (C3D)"), "CH1");
    }

    #[test]
    fn test_signal_variants_collapse_to_one_threshold() {
        let mut session = GameSessionParameters::default();
        session.session_mvc_values.insert("CH1".to_string(), 0.08);

        let resolver = ThresholdResolver::resolve(
            &session,
            None,
            &keys(&["CH1 Raw", "CH1 Activated", "CH1 Processed"]),
            None,
        );

        assert_eq!(resolver.thresholds().len(), 1);
        assert_eq!(resolver.thresholds()[0].channel, "CH1");
    }

    #[test]
    fn test_per_muscle_wins_over_global() {
        let mut session = GameSessionParameters {
            session_mvc_value: Some(0.0002),
            session_mvc_threshold_percentage: Some(75.0),
            ..Default::default()
        };
        session.session_mvc_values.insert("CH1".to_string(), 0.08);

        let resolver = ThresholdResolver::resolve(&session, None, &keys(&["CH1 Raw"]), None);

        let t = &resolver.thresholds()[0];
        assert_eq!(t.source, ThresholdSource::SessionPerMuscle);
        assert_eq!(t.confidence, 0.9);
        assert_eq!(t.mvc_base_value, Some(0.08));
        assert!((t.mvc_threshold - 0.06).abs() < 1e-9);
    }

    #[test]
    fn test_below_minimum_channel_is_omitted() {
        let mut session = GameSessionParameters::default();
        session.session_mvc_values.insert("CH1".to_string(), 0.001);

        let resolver = ThresholdResolver::resolve(&session, None, &keys(&["CH1 Raw"]), None);

        assert!(resolver.thresholds().is_empty());
        assert!(resolver.threshold_for("CH1 Raw").is_none());
    }

    #[test]
    fn test_analytics_tier_reverse_derives_base() {
        let session = GameSessionParameters {
            session_mvc_threshold_percentage: Some(75.0),
            ..Default::default()
        };
        let mut analytics = HashMap::new();
        analytics.insert(
            "CH2".to_string(),
            ChannelAnalyticsData {
                mvc_threshold_actual_value: Some(0.045),
                ..Default::default()
            },
        );

        let resolver =
            ThresholdResolver::resolve(&session, Some(&analytics), &keys(&["CH2 Raw"]), None);

        let t = &resolver.thresholds()[0];
        assert_eq!(t.source, ThresholdSource::Analytics);
        assert_eq!(t.confidence, 0.7);
        assert!((t.mvc_threshold - 0.045).abs() < 1e-9);
        assert!((t.mvc_base_value.unwrap() - 0.06).abs() < 1e-9);
    }

    #[test]
    fn test_global_session_tier() {
        let session = GameSessionParameters {
            session_mvc_value: Some(0.10),
            session_mvc_threshold_percentage: Some(80.0),
            ..Default::default()
        };

        let resolver = ThresholdResolver::resolve(&session, None, &keys(&["CH1 Raw"]), None);

        let t = &resolver.thresholds()[0];
        assert_eq!(t.source, ThresholdSource::SessionGlobal);
        assert!((t.mvc_threshold - 0.08).abs() < 1e-9);
    }

    #[test]
    fn test_global_fallback_used_verbatim() {
        let session = GameSessionParameters::default();

        let resolver =
            ThresholdResolver::resolve(&session, None, &keys(&["CH1 Raw"]), Some(0.05));

        let t = &resolver.thresholds()[0];
        assert_eq!(t.source, ThresholdSource::GlobalFallback);
        assert_eq!(t.confidence, 0.2);
        assert_eq!(t.mvc_base_value, None);
        assert_eq!(t.mvc_threshold, 0.05);
    }

    #[test]
    fn test_malformed_numerics_treated_as_absent() {
        let mut session = GameSessionParameters {
            session_mvc_value: Some(f64::NAN),
            ..Default::default()
        };
        session.session_mvc_values.insert("CH1".to_string(), -0.08);

        let resolver =
            ThresholdResolver::resolve(&session, None, &keys(&["CH1 Raw"]), Some(0.05));

        // Both session tiers neutralized, fallback wins
        assert_eq!(
            resolver.thresholds()[0].source,
            ThresholdSource::GlobalFallback
        );
    }

    #[test]
    fn test_duration_threshold_default_and_override() {
        let mut session = GameSessionParameters::default();
        session.session_mvc_values.insert("CH1".to_string(), 0.08);

        let resolver = ThresholdResolver::resolve(&session, None, &keys(&["CH1 Raw"]), None);
        assert_eq!(resolver.duration_threshold_for("CH1 Raw"), 2000.0);
        assert_eq!(resolver.duration_threshold_for("CH9 Raw"), 2000.0);

        session.contraction_duration_threshold_ms = Some(2500.0);
        let resolver = ThresholdResolver::resolve(&session, None, &keys(&["CH1 Raw"]), None);
        assert_eq!(resolver.duration_threshold_for("CH1 Activated"), 2500.0);
    }

    #[test]
    fn test_lookups_resolve_variant_keys() {
        let mut session = GameSessionParameters::default();
        session.session_mvc_values.insert("CH1".to_string(), 0.08);
        session
            .channel_muscle_mapping
            .insert("CH1".to_string(), "Left Quadriceps".to_string());

        let resolver = ThresholdResolver::resolve(&session, None, &keys(&["CH1 Raw"]), None);

        assert!(resolver.mvc_threshold_for("CH1 Activated").is_some());
        assert_eq!(resolver.muscle_name_for("CH1 Processed"), "Left Quadriceps");
        assert_eq!(resolver.muscle_name_for("CH3 Raw"), "CH3");
    }

    #[test]
    fn test_analytics_keyed_by_variant_signal_key() {
        let session = GameSessionParameters::default();
        let mut analytics = HashMap::new();
        analytics.insert(
            "CH1 Raw".to_string(),
            ChannelAnalyticsData {
                mvc_threshold_actual_value: Some(0.05),
                ..Default::default()
            },
        );

        let resolver =
            ThresholdResolver::resolve(&session, Some(&analytics), &keys(&["CH1 Activated"]), None);

        assert_eq!(resolver.thresholds()[0].source, ThresholdSource::Analytics);
    }
}
