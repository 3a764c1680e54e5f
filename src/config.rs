//! Scoring configuration resolution
//!
//! Resolves which [`ScoringWeights`] apply from a layered source hierarchy:
//! therapist+patient specific → therapist specific → global active →
//! hard-coded clinical fallback. Fetched weights are accepted only if both
//! weight group sums validate; invalid configurations are discarded with a
//! logged warning and the cascade continues.
//!
//! Network failures degrade to the fallback weights rather than propagating,
//! so callers always receive a usable weight set.

use crate::error::ScoreError;
use crate::weights::ScoringWeights;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Wire format for scoring configurations (flat `weight_*` fields)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfigurationDto {
    pub weight_compliance: f64,
    pub weight_symmetry: f64,
    pub weight_effort: f64,
    pub weight_game_score: f64,
    pub weight_compliance_completion: f64,
    pub weight_compliance_intensity: f64,
    pub weight_compliance_duration: f64,
}

impl From<ScoringConfigurationDto> for ScoringWeights {
    fn from(dto: ScoringConfigurationDto) -> Self {
        Self {
            compliance: dto.weight_compliance,
            symmetry: dto.weight_symmetry,
            effort: dto.weight_effort,
            game_score: dto.weight_game_score,
            compliance_completion: dto.weight_compliance_completion,
            compliance_intensity: dto.weight_compliance_intensity,
            compliance_duration: dto.weight_compliance_duration,
        }
    }
}

impl From<ScoringWeights> for ScoringConfigurationDto {
    fn from(weights: ScoringWeights) -> Self {
        Self {
            weight_compliance: weights.compliance,
            weight_symmetry: weights.symmetry,
            weight_effort: weights.effort,
            weight_game_score: weights.game_score,
            weight_compliance_completion: weights.compliance_completion,
            weight_compliance_intensity: weights.compliance_intensity,
            weight_compliance_duration: weights.compliance_duration,
        }
    }
}

/// Which tier of the hierarchy a weight set was resolved from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightsSource {
    TherapistPatient,
    Therapist,
    GlobalActive,
    Fallback,
}

impl WeightsSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeightsSource::TherapistPatient => "therapist_patient",
            WeightsSource::Therapist => "therapist",
            WeightsSource::GlobalActive => "global_active",
            WeightsSource::Fallback => "fallback",
        }
    }
}

/// Outcome of a weight resolution pass
#[derive(Debug, Clone, PartialEq)]
pub struct WeightsResolution {
    pub weights: ScoringWeights,
    pub source: WeightsSource,
    /// Last transport error encountered while descending the hierarchy, kept
    /// for observability; never blocks resolution
    pub error: Option<String>,
}

/// Resolver state machine: `loading → resolved`; `refetch()` re-enters loading
#[derive(Debug, Clone, PartialEq)]
pub enum ResolverState {
    Loading,
    Resolved(WeightsResolution),
}

/// Backend seam for fetching and persisting scoring configurations.
///
/// `Ok(None)` means the tier has no configuration (HTTP 404); `Err` is a
/// transport failure.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    async fn fetch_custom(
        &self,
        therapist_id: Uuid,
        patient_id: Option<Uuid>,
    ) -> Result<Option<ScoringConfigurationDto>, ScoreError>;

    async fn fetch_active(&self) -> Result<Option<ScoringConfigurationDto>, ScoreError>;

    async fn save_custom(
        &self,
        therapist_id: Uuid,
        patient_id: Option<Uuid>,
        configuration: &ScoringConfigurationDto,
    ) -> Result<(), ScoreError>;
}

/// HTTP implementation of [`ConfigSource`] against the configuration backend
pub struct HttpConfigSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpConfigSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    async fn get_configuration(
        &self,
        url: &str,
    ) -> Result<Option<ScoringConfigurationDto>, ScoreError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ScoreError::NetworkError(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(ScoreError::ConfigError(format!(
                "HTTP {} from {url}",
                response.status()
            )));
        }

        let dto = response
            .json::<ScoringConfigurationDto>()
            .await
            .map_err(|e| ScoreError::ConfigError(e.to_string()))?;
        Ok(Some(dto))
    }
}

#[derive(Serialize)]
struct SaveCustomRequest<'a> {
    therapist_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    patient_id: Option<Uuid>,
    #[serde(flatten)]
    configuration: &'a ScoringConfigurationDto,
}

#[async_trait]
impl ConfigSource for HttpConfigSource {
    async fn fetch_custom(
        &self,
        therapist_id: Uuid,
        patient_id: Option<Uuid>,
    ) -> Result<Option<ScoringConfigurationDto>, ScoreError> {
        let mut url = format!(
            "{}/scoring/configurations/custom?therapist_id={therapist_id}",
            self.base_url
        );
        if let Some(patient_id) = patient_id {
            url.push_str(&format!("&patient_id={patient_id}"));
        }
        self.get_configuration(&url).await
    }

    async fn fetch_active(&self) -> Result<Option<ScoringConfigurationDto>, ScoreError> {
        let url = format!("{}/scoring/configurations/active", self.base_url);
        self.get_configuration(&url).await
    }

    async fn save_custom(
        &self,
        therapist_id: Uuid,
        patient_id: Option<Uuid>,
        configuration: &ScoringConfigurationDto,
    ) -> Result<(), ScoreError> {
        let url = format!("{}/scoring/configurations/custom", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&SaveCustomRequest {
                therapist_id,
                patient_id,
                configuration,
            })
            .send()
            .await
            .map_err(|e| ScoreError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ScoreError::ConfigError(format!(
                "HTTP {} from {url}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Validate a fetched configuration; invalid weight sums are discarded with a
/// logged warning so the cascade can continue.
fn accept(dto: ScoringConfigurationDto, tier: &str) -> Option<ScoringWeights> {
    let weights = ScoringWeights::from(dto);
    match weights.validate() {
        Ok(()) => Some(weights),
        Err(e) => {
            tracing::warn!(
                tier,
                component_sum = weights.component_sum(),
                compliance_sum = weights.compliance_sum(),
                "discarding scoring configuration with invalid weight sums: {e}"
            );
            None
        }
    }
}

/// Descend the source hierarchy and return the first valid weight set.
///
/// Each tier is attempted only when the prior one was unavailable, invalid,
/// or failed; transport errors are recorded but never propagated.
pub async fn resolve_weights<S: ConfigSource>(
    source: &S,
    therapist_id: Option<Uuid>,
    patient_id: Option<Uuid>,
) -> WeightsResolution {
    let mut last_error = None;

    if let (Some(therapist), Some(patient)) = (therapist_id, patient_id) {
        match source.fetch_custom(therapist, Some(patient)).await {
            Ok(Some(dto)) => {
                if let Some(weights) = accept(dto, "therapist_patient") {
                    return WeightsResolution {
                        weights,
                        source: WeightsSource::TherapistPatient,
                        error: None,
                    };
                }
            }
            Ok(None) => {
                tracing::debug!(%therapist, %patient, "no therapist+patient configuration")
            }
            Err(e) => {
                tracing::warn!(error = %e, "therapist+patient configuration fetch failed");
                last_error = Some(e.to_string());
            }
        }
    }

    if let Some(therapist) = therapist_id {
        match source.fetch_custom(therapist, None).await {
            Ok(Some(dto)) => {
                if let Some(weights) = accept(dto, "therapist") {
                    return WeightsResolution {
                        weights,
                        source: WeightsSource::Therapist,
                        error: None,
                    };
                }
            }
            Ok(None) => tracing::debug!(%therapist, "no therapist configuration"),
            Err(e) => {
                tracing::warn!(error = %e, "therapist configuration fetch failed");
                last_error = Some(e.to_string());
            }
        }
    }

    match source.fetch_active().await {
        Ok(Some(dto)) => {
            if let Some(weights) = accept(dto, "global_active") {
                return WeightsResolution {
                    weights,
                    source: WeightsSource::GlobalActive,
                    error: None,
                };
            }
        }
        Ok(None) => tracing::debug!("no global active configuration"),
        Err(e) => {
            tracing::warn!(error = %e, "global configuration fetch failed");
            last_error = Some(e.to_string());
        }
    }

    tracing::debug!("falling back to clinical default weights");
    WeightsResolution {
        weights: ScoringWeights::default(),
        source: WeightsSource::Fallback,
        error: last_error,
    }
}

/// Stateful resolver owning a [`ConfigSource`] and the current resolution
pub struct ScoringConfigResolver<S: ConfigSource> {
    source: S,
    state: ResolverState,
}

impl<S: ConfigSource> ScoringConfigResolver<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            state: ResolverState::Loading,
        }
    }

    /// Current state of the resolver
    pub fn state(&self) -> &ResolverState {
        &self.state
    }

    /// Weights from the last completed resolution, if any
    pub fn current(&self) -> Option<&WeightsResolution> {
        match &self.state {
            ResolverState::Resolved(resolution) => Some(resolution),
            ResolverState::Loading => None,
        }
    }

    /// Run the resolution cascade and store the outcome
    pub async fn resolve(
        &mut self,
        therapist_id: Option<Uuid>,
        patient_id: Option<Uuid>,
    ) -> WeightsResolution {
        self.state = ResolverState::Loading;
        let resolution = resolve_weights(&self.source, therapist_id, patient_id).await;
        self.state = ResolverState::Resolved(resolution.clone());
        resolution
    }

    /// Re-enter loading and resolve again
    pub async fn refetch(
        &mut self,
        therapist_id: Option<Uuid>,
        patient_id: Option<Uuid>,
    ) -> WeightsResolution {
        self.resolve(therapist_id, patient_id).await
    }

    /// Persist a custom weight configuration, validating it first
    pub async fn save_custom(
        &self,
        therapist_id: Uuid,
        patient_id: Option<Uuid>,
        weights: &ScoringWeights,
    ) -> Result<(), ScoreError> {
        weights.validate()?;
        self.source
            .save_custom(therapist_id, patient_id, &ScoringConfigurationDto::from(*weights))
            .await
    }
}
