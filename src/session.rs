//! Analysis session: the single owner of the request lifecycle.
//!
//! `Idle → Analyzing → {Succeeded | Failed} → Analyzing → …`
//!
//! Each submission is tagged with a generation number. A client outcome is
//! applied only while its generation is still current, so a slow request
//! that was superseded can never overwrite a newer result. Starting a new
//! submission (or landing a new result) also aborts the choreography run of
//! the previous cycle.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::{AbortHandle, JoinHandle};

use crate::analysis::{normalize, AnalysisBackend, AnalysisError, AnalysisResult, RawServiceResponse};
use crate::choreography::{FocusTarget, ViewportChoreographer};
use crate::intake::ImageFile;
use crate::notify::{Notification, Notifier};

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// Why an analysis failed, for diagnostics. Users see one generic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Network,
    Service,
    MalformedResponse,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network => write!(f, "network"),
            Self::Service => write!(f, "service"),
            Self::MalformedResponse => write!(f, "malformed response"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl From<&AnalysisError> for Failure {
    fn from(error: &AnalysisError) -> Self {
        let kind = match error {
            AnalysisError::Network { .. } => FailureKind::Network,
            AnalysisError::Service { .. } => FailureKind::Service,
            AnalysisError::MalformedResponse(_) => FailureKind::MalformedResponse,
        };
        Self {
            kind,
            message: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Analyzing,
    Succeeded {
        result: AnalysisResult,
        raw: RawServiceResponse,
    },
    Failed {
        failure: Failure,
    },
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Analyzing => "analyzing",
            Self::Succeeded { .. } => "succeeded",
            Self::Failed { .. } => "failed",
        }
    }
}

/// What became of one `submit` call.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Succeeded(AnalysisResult),
    Failed(Failure),
    /// A newer submission started first; this outcome was dropped.
    Superseded,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub generation: u64,
    pub updated_at: String,
    #[serde(flatten)]
    pub state: SessionState,
}

// ═══════════════════════════════════════════════════════════
// AnalysisSession
// ═══════════════════════════════════════════════════════════

struct Tracked {
    generation: u64,
    state: SessionState,
    updated_at: DateTime<Utc>,
    choreography: Option<ChoreographyRun>,
}

/// The scheduled focus run of the current cycle. The join handle may be
/// lent to a waiter; the abort handle always stays with the session.
struct ChoreographyRun {
    abort: AbortHandle,
    handle: Option<JoinHandle<FocusTarget>>,
}

impl ChoreographyRun {
    fn start(choreographer: &ViewportChoreographer) -> Self {
        let handle = choreographer.schedule();
        Self {
            abort: handle.abort_handle(),
            handle: Some(handle),
        }
    }
}

impl Tracked {
    fn transition(&mut self, state: SessionState) {
        self.state = state;
        self.updated_at = Utc::now();
    }

    fn cancel_choreography(&mut self) {
        if let Some(previous) = self.choreography.take() {
            previous.abort.abort();
        }
    }
}

struct SessionInner<B> {
    backend: B,
    notifier: Arc<dyn Notifier>,
    choreographer: Option<ViewportChoreographer>,
    tracked: Mutex<Tracked>,
}

/// Orchestrates one analysis at a time. Cheap to clone; clones share state.
pub struct AnalysisSession<B> {
    inner: Arc<SessionInner<B>>,
}

impl<B> Clone for AnalysisSession<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: AnalysisBackend + 'static> AnalysisSession<B> {
    pub fn new(backend: B, notifier: Arc<dyn Notifier>) -> Self {
        Self::build(backend, notifier, None)
    }

    pub fn with_choreographer(
        backend: B,
        notifier: Arc<dyn Notifier>,
        choreographer: ViewportChoreographer,
    ) -> Self {
        Self::build(backend, notifier, Some(choreographer))
    }

    fn build(
        backend: B,
        notifier: Arc<dyn Notifier>,
        choreographer: Option<ViewportChoreographer>,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                backend,
                notifier,
                choreographer,
                tracked: Mutex::new(Tracked {
                    generation: 0,
                    state: SessionState::Idle,
                    updated_at: Utc::now(),
                    choreography: None,
                }),
            }),
        }
    }

    /// Analyze an image, superseding whatever came before.
    ///
    /// Never queues: a submission made while another is in flight takes over
    /// the session, and the older outcome resolves as
    /// [`Completion::Superseded`].
    pub async fn submit(&self, image: ImageFile) -> Completion {
        let generation = self.begin();
        tracing::info!(generation, file = %image.name(), bytes = image.len(), "Analysis started");

        let outcome = self.inner.backend.analyze(&image).await;
        self.complete(generation, outcome)
    }

    fn begin(&self) -> u64 {
        let mut tracked = self.lock();
        tracked.generation += 1;
        tracked.cancel_choreography();
        tracked.transition(SessionState::Analyzing);
        tracked.generation
    }

    fn complete(
        &self,
        generation: u64,
        outcome: Result<RawServiceResponse, AnalysisError>,
    ) -> Completion {
        let mut tracked = self.lock();
        if tracked.generation != generation {
            tracing::debug!(
                generation,
                current = tracked.generation,
                "Discarding outcome of superseded analysis"
            );
            return Completion::Superseded;
        }

        let (completion, notification) = match outcome {
            Ok(raw) => {
                let result = normalize(&raw);
                tracing::info!(
                    generation,
                    shape = raw.shape().name(),
                    exam_type = %result.exam_type(),
                    confidence = result.confidence(),
                    "Analysis succeeded"
                );
                tracked.transition(SessionState::Succeeded {
                    result: result.clone(),
                    raw,
                });
                tracked.cancel_choreography();
                tracked.choreography = self
                    .inner
                    .choreographer
                    .as_ref()
                    .map(ChoreographyRun::start);

                let notification = Notification::AnalysisSucceeded {
                    exam_type: result.exam_type().to_string(),
                };
                (Completion::Succeeded(result), notification)
            }
            Err(error) => {
                let failure = Failure::from(&error);
                tracing::warn!(generation, kind = %failure.kind, error = %error, "Analysis failed");
                tracked.transition(SessionState::Failed {
                    failure: failure.clone(),
                });

                let notification = Notification::AnalysisFailed {
                    failure: failure.kind,
                };
                (Completion::Failed(failure), notification)
            }
        };

        // Notify before releasing the lock so a newer submission cannot
        // begin between the transition and its notice.
        self.inner.notifier.notify(notification);
        drop(tracked);
        completion
    }

    // ── Read accessors ──────────────────────────────────────

    pub fn state(&self) -> SessionState {
        self.lock().state.clone()
    }

    pub fn result(&self) -> Option<AnalysisResult> {
        match &self.lock().state {
            SessionState::Succeeded { result, .. } => Some(result.clone()),
            _ => None,
        }
    }

    pub fn raw_response(&self) -> Option<RawServiceResponse> {
        match &self.lock().state {
            SessionState::Succeeded { raw, .. } => Some(raw.clone()),
            _ => None,
        }
    }

    pub fn is_analyzing(&self) -> bool {
        matches!(self.lock().state, SessionState::Analyzing)
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let tracked = self.lock();
        SessionSnapshot {
            generation: tracked.generation,
            updated_at: tracked.updated_at.to_rfc3339(),
            state: tracked.state.clone(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.inner.backend
    }

    /// Wait for the current choreography run, if any. `None` when there was
    /// none or it was cancelled.
    pub async fn wait_for_choreography(&self) -> Option<FocusTarget> {
        let handle = self.lock().choreography.as_mut()?.handle.take()?;
        handle.await.ok()
    }

    fn lock(&self) -> MutexGuard<'_, Tracked> {
        self.inner
            .tracked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
