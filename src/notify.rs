//! User-facing notifications raised by intake and analysis.
//!
//! The pipeline only decides *when* to notify and *what kind* of notice it
//! is; rendering belongs to whoever implements [`Notifier`].

use std::sync::{Mutex, PoisonError};

use serde::Serialize;

use crate::session::FailureKind;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    /// A normalized result is available.
    AnalysisSucceeded { exam_type: String },
    /// The client failed. The kind is for diagnostics only; users see one
    /// generic message for every kind.
    AnalysisFailed { failure: FailureKind },
    /// The selected file is not an image.
    ImageRejected { mime_type: String },
}

impl Notification {
    /// Text shown to the user.
    pub fn message(&self) -> &'static str {
        match self {
            Self::AnalysisSucceeded { .. } => "Análise concluída com sucesso!",
            Self::AnalysisFailed { .. } => "Erro ao analisar a imagem. Tente novamente.",
            Self::ImageRejected { .. } => "Por favor, envie apenas arquivos de imagem",
        }
    }

    pub fn is_error(&self) -> bool {
        !matches!(self, Self::AnalysisSucceeded { .. })
    }
}

/// Sink for user-facing notices. The session calls it while holding its
/// state lock, so implementations must not call back into the session.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Notifier that writes notices to the log.
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        match &notification {
            Notification::AnalysisSucceeded { exam_type } => {
                tracing::info!(exam_type = %exam_type, "{}", notification.message());
            }
            Notification::AnalysisFailed { failure } => {
                tracing::warn!(failure = %failure, "{}", notification.message());
            }
            Notification::ImageRejected { mime_type } => {
                tracing::warn!(mime_type = %mime_type, "{}", notification.message());
            }
        }
    }
}

/// Notifier that keeps every notice, for assertions.
#[derive(Default)]
pub struct RecordingNotifier {
    received: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.received
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.received
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_message_is_generic_for_every_kind() {
        let kinds = [
            FailureKind::Network,
            FailureKind::Service,
            FailureKind::MalformedResponse,
        ];
        let messages: Vec<_> = kinds
            .into_iter()
            .map(|failure| Notification::AnalysisFailed { failure }.message())
            .collect();
        assert!(messages.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn only_success_is_not_an_error() {
        let ok = Notification::AnalysisSucceeded {
            exam_type: "Raio-X".into(),
        };
        let rejected = Notification::ImageRejected {
            mime_type: "text/plain".into(),
        };
        assert!(!ok.is_error());
        assert!(rejected.is_error());
    }

    #[test]
    fn recording_notifier_keeps_order() {
        let notifier = RecordingNotifier::new();
        notifier.notify(Notification::ImageRejected {
            mime_type: "a".into(),
        });
        notifier.notify(Notification::AnalysisFailed {
            failure: FailureKind::Network,
        });
        let received = notifier.notifications();
        assert_eq!(received.len(), 2);
        assert!(matches!(received[0], Notification::ImageRejected { .. }));
    }

    #[test]
    fn notification_serializes_with_kind_tag() {
        let json = serde_json::to_value(Notification::AnalysisFailed {
            failure: FailureKind::MalformedResponse,
        })
        .unwrap();
        assert_eq!(json["kind"], "analysis_failed");
        assert_eq!(json["failure"], "malformed_response");
    }
}
