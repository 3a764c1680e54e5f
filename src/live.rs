//! Live recalculation control
//!
//! Watches session-parameter edits, debounces them, and recomputes scores
//! through a [`RecomputeBackend`]. Rapid edits restart the debounce window so
//! only the last edit of a batch triggers a recompute; an edit arriving while
//! a recompute is in flight supersedes it, and the superseded request's
//! result is discarded rather than materialized.
//!
//! Each triggered recompute carries a monotonically increasing generation;
//! published snapshots are tagged with it, so consumers can observe that
//! results arrive in trigger order. Backend failures keep the last
//! known-good result and surface an error flag instead of blocking.

use crate::error::ScoreError;
use crate::pipeline::SessionScorer;
use crate::types::{ChannelAnalyticsData, EnhancedPerformanceData, GameSessionParameters};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Default debounce window for parameter edits
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(350);

/// One parameter edit: the full session state to recompute from
#[derive(Debug, Clone, Default)]
pub struct RecomputeRequest {
    pub params: GameSessionParameters,
    pub global_mvc_threshold: Option<f64>,
    pub game_score_normalized: Option<f64>,
}

/// Backend seam for the recompute call: accepts session parameters, returns
/// refreshed per-channel analytics
#[async_trait]
pub trait RecomputeBackend: Send + Sync {
    async fn recompute(
        &self,
        params: &GameSessionParameters,
    ) -> Result<HashMap<String, ChannelAnalyticsData>, ScoreError>;
}

/// HTTP implementation of [`RecomputeBackend`]
pub struct HttpRecomputeBackend {
    client: reqwest::Client,
    url: String,
}

impl HttpRecomputeBackend {
    pub fn new(url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl RecomputeBackend for HttpRecomputeBackend {
    async fn recompute(
        &self,
        params: &GameSessionParameters,
    ) -> Result<HashMap<String, ChannelAnalyticsData>, ScoreError> {
        let response = self
            .client
            .post(&self.url)
            .json(params)
            .send()
            .await
            .map_err(|e| ScoreError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ScoreError::RecomputeError(format!(
                "HTTP {} from {}",
                response.status(),
                self.url
            )));
        }

        response
            .json::<HashMap<String, ChannelAnalyticsData>>()
            .await
            .map_err(|e| ScoreError::RecomputeError(e.to_string()))
    }
}

/// Published result of a recompute batch
#[derive(Debug, Clone, Default)]
pub struct RecalcSnapshot {
    /// Generation of the batch that produced this snapshot (0 = none yet)
    pub generation: u64,
    /// Latest materialized score; stays at the last known-good value when a
    /// recompute fails
    pub data: Option<EnhancedPerformanceData>,
    /// Error from the most recent batch, for observability
    pub error: Option<String>,
}

/// Debouncing controller owning the recompute loop.
///
/// Single writer of the published snapshot; any number of readers subscribe
/// via [`RecalcController::results`].
pub struct RecalcController {
    edits: mpsc::UnboundedSender<RecomputeRequest>,
    results: watch::Receiver<RecalcSnapshot>,
    task: JoinHandle<()>,
}

impl RecalcController {
    /// Spawn the controller with the default debounce window
    pub fn spawn<B>(backend: B, scorer: SessionScorer) -> Self
    where
        B: RecomputeBackend + 'static,
    {
        Self::spawn_with_debounce(backend, scorer, DEFAULT_DEBOUNCE)
    }

    /// Spawn the controller with an explicit debounce window
    pub fn spawn_with_debounce<B>(backend: B, scorer: SessionScorer, debounce: Duration) -> Self
    where
        B: RecomputeBackend + 'static,
    {
        let (edit_tx, edit_rx) = mpsc::unbounded_channel();
        let (result_tx, result_rx) = watch::channel(RecalcSnapshot::default());
        let task = tokio::spawn(run_loop(backend, scorer, debounce, edit_rx, result_tx));
        Self {
            edits: edit_tx,
            results: result_rx,
            task,
        }
    }

    /// Submit a parameter edit; returns false after shutdown
    pub fn submit(&self, request: RecomputeRequest) -> bool {
        self.edits.send(request).is_ok()
    }

    /// Subscribe to published snapshots
    pub fn results(&self) -> watch::Receiver<RecalcSnapshot> {
        self.results.clone()
    }

    /// Latest published snapshot
    pub fn latest(&self) -> RecalcSnapshot {
        self.results.borrow().clone()
    }

    /// Flush the edit stream and stop the controller
    pub async fn shutdown(self) {
        drop(self.edits);
        let _ = self.task.await;
    }
}

async fn run_loop<B: RecomputeBackend>(
    backend: B,
    scorer: SessionScorer,
    debounce: Duration,
    mut edits: mpsc::UnboundedReceiver<RecomputeRequest>,
    results: watch::Sender<RecalcSnapshot>,
) {
    let mut generation: u64 = 0;
    let mut pending: Option<RecomputeRequest> = None;
    let mut closed = false;

    loop {
        let mut request = match pending.take() {
            Some(request) => request,
            None => {
                if closed {
                    break;
                }
                match edits.recv().await {
                    Some(request) => request,
                    None => break,
                }
            }
        };

        // Every further edit restarts the quiet window; only the last edit
        // of the batch triggers a recompute.
        while !closed {
            tokio::select! {
                _ = tokio::time::sleep(debounce) => break,
                next = edits.recv() => match next {
                    Some(newer) => request = newer,
                    None => closed = true,
                },
            }
        }

        generation += 1;
        let gen = generation;
        tracing::debug!(generation = gen, "debounce window settled, recomputing");

        let compute = backend.recompute(&request.params);
        tokio::pin!(compute);

        loop {
            tokio::select! {
                outcome = &mut compute => {
                    publish(&results, &scorer, &request, gen, outcome);
                    break;
                }
                next = edits.recv(), if !closed => match next {
                    Some(newer) => {
                        // The in-flight request is superseded; dropping its
                        // future guarantees the stale result is never applied.
                        tracing::debug!(
                            generation = gen,
                            "recompute superseded by newer edit, discarding in-flight request"
                        );
                        pending = Some(newer);
                        break;
                    }
                    None => closed = true,
                },
            }
        }
    }
}

fn publish(
    results: &watch::Sender<RecalcSnapshot>,
    scorer: &SessionScorer,
    request: &RecomputeRequest,
    generation: u64,
    outcome: Result<HashMap<String, ChannelAnalyticsData>, ScoreError>,
) {
    let snapshot = match outcome {
        Ok(analytics) => RecalcSnapshot {
            generation,
            data: Some(scorer.score(
                &request.params,
                &analytics,
                request.global_mvc_threshold,
                request.game_score_normalized,
            )),
            error: None,
        },
        Err(e) => {
            tracing::warn!(generation, error = %e, "recompute failed, keeping last known-good result");
            let last_good = results.borrow().data.clone();
            RecalcSnapshot {
                generation,
                data: last_good,
                error: Some(e.to_string()),
            }
        }
    };
    let _ = results.send(snapshot);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Backend that tags each response with its call number via
    /// `contraction_count`, with a configurable per-call delay
    struct MockBackend {
        calls: Arc<AtomicU32>,
        delays: Vec<Duration>,
        fail_on_call: Option<u32>,
    }

    impl MockBackend {
        fn new(delays: Vec<Duration>) -> Self {
            Self {
                calls: Arc::new(AtomicU32::new(0)),
                delays,
                fail_on_call: None,
            }
        }
    }

    #[async_trait]
    impl RecomputeBackend for MockBackend {
        async fn recompute(
            &self,
            _params: &GameSessionParameters,
        ) -> Result<HashMap<String, ChannelAnalyticsData>, ScoreError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let delay = self
                .delays
                .get(call as usize - 1)
                .copied()
                .unwrap_or(Duration::from_millis(10));
            tokio::time::sleep(delay).await;

            if self.fail_on_call == Some(call) {
                return Err(ScoreError::RecomputeError("backend unavailable".to_string()));
            }

            let mut analytics = HashMap::new();
            analytics.insert(
                "CH1 Raw".to_string(),
                ChannelAnalyticsData {
                    contraction_count: call,
                    ..Default::default()
                },
            );
            Ok(analytics)
        }
    }

    fn make_request() -> RecomputeRequest {
        let mut params = GameSessionParameters {
            session_expected_contractions: Some(10),
            ..Default::default()
        };
        params.session_mvc_values.insert("CH1".to_string(), 0.08);
        RecomputeRequest {
            params,
            global_mvc_threshold: None,
            game_score_normalized: None,
        }
    }

    /// Which backend call produced the published score
    fn call_of(snapshot: &RecalcSnapshot) -> u32 {
        snapshot
            .data
            .as_ref()
            .and_then(|d| d.left_muscle.as_ref())
            .map(|m| m.completion.count)
            .unwrap_or(0)
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_edits_coalesce_to_one_recompute() {
        let backend = MockBackend::new(vec![Duration::from_millis(10)]);
        let calls = backend.calls.clone();
        let controller = RecalcController::spawn_with_debounce(
            backend,
            SessionScorer::default(),
            Duration::from_millis(350),
        );

        // Three rapid edits inside the debounce window
        controller.submit(make_request());
        tokio::time::sleep(Duration::from_millis(100)).await;
        controller.submit(make_request());
        tokio::time::sleep(Duration::from_millis(100)).await;
        controller.submit(make_request());

        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let snapshot = controller.latest();
        assert_eq!(snapshot.generation, 1);
        assert!(snapshot.data.is_some());
        assert!(snapshot.error.is_none());

        controller.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_request_is_discarded() {
        // First call is slow, second is fast
        let backend =
            MockBackend::new(vec![Duration::from_secs(10), Duration::from_millis(10)]);
        let calls = backend.calls.clone();
        let controller = RecalcController::spawn_with_debounce(
            backend,
            SessionScorer::default(),
            Duration::from_millis(350),
        );

        controller.submit(make_request());
        // Let the first batch settle and go in flight
        tokio::time::sleep(Duration::from_millis(500)).await;
        // Edit while the slow request is in flight: it must be superseded
        controller.submit(make_request());
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        let snapshot = controller.latest();
        assert_eq!(snapshot.generation, 2);
        assert_eq!(call_of(&snapshot), 2);

        // Even long after the slow request would have resolved, the
        // superseded result never overwrites the newer one
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(call_of(&controller.latest()), 2);

        controller.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_backend_failure_keeps_last_known_good() {
        let mut backend = MockBackend::new(vec![]);
        backend.fail_on_call = Some(2);
        let controller = RecalcController::spawn_with_debounce(
            backend,
            SessionScorer::default(),
            Duration::from_millis(350),
        );

        controller.submit(make_request());
        tokio::time::sleep(Duration::from_secs(1)).await;
        let first = controller.latest();
        assert_eq!(first.generation, 1);
        assert_eq!(call_of(&first), 1);

        controller.submit(make_request());
        tokio::time::sleep(Duration::from_secs(1)).await;

        let second = controller.latest();
        assert_eq!(second.generation, 2);
        // Last known-good data survives, with the error surfaced
        assert_eq!(call_of(&second), 1);
        assert!(second.error.unwrap().contains("backend unavailable"));

        controller.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_spaced_edits_each_trigger_a_recompute() {
        let backend = MockBackend::new(vec![]);
        let calls = backend.calls.clone();
        let controller = RecalcController::spawn_with_debounce(
            backend,
            SessionScorer::default(),
            Duration::from_millis(350),
        );

        controller.submit(make_request());
        tokio::time::sleep(Duration::from_secs(1)).await;
        controller.submit(make_request());
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(controller.latest().generation, 2);

        controller.shutdown().await;
    }
}
