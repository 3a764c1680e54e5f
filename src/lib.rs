//! Myoscore - On-device scoring engine for EMG rehabilitation therapy sessions
//!
//! Myoscore turns processed per-channel EMG contraction analytics and session
//! configuration into clinician-facing performance scores through a
//! deterministic pipeline: threshold resolution → per-muscle sub-scores →
//! muscle aggregation → symmetry/effort/compliance components → overall score.
//!
//! ## Modules
//!
//! - **Scoring Pipeline**: Pure scoring pass from session parameters + channel
//!   analytics to an [`types::EnhancedPerformanceData`] payload
//! - **Configuration Resolver**: Layered resolution of the active
//!   [`weights::ScoringWeights`] (therapist/patient → therapist → global → fallback)
//! - **Live Controller**: Debounced, cancellation-safe recomputation driven by
//!   rapid session-parameter edits

pub mod clinical;
pub mod config;
pub mod error;
pub mod live;
pub mod pipeline;
pub mod scores;
pub mod thresholds;
pub mod types;
pub mod weights;

pub use error::ScoreError;
pub use pipeline::{score_session, SessionScorer};
pub use thresholds::ThresholdResolver;
pub use types::{ChannelAnalyticsData, EnhancedPerformanceData, GameSessionParameters};
pub use weights::ScoringWeights;

// Configuration exports
pub use config::{ScoringConfigResolver, WeightsResolution, WeightsSource};

// Live recalculation exports
pub use live::{RecalcController, RecalcSnapshot, RecomputeRequest};

/// Myoscore version embedded in all score payloads
pub const MYOSCORE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for score payloads
pub const PRODUCER_NAME: &str = "myoscore";
