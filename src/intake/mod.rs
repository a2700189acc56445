//! Image intake: validation, local preview, hand-off to the upload callback.

pub mod file;
pub mod preview;

pub use file::*;
pub use preview::*;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::task::JoinHandle;

use crate::notify::{Notification, Notifier};

#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("Not an image (type '{mime_type}')")]
    NotAnImage { mime_type: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

type UploadCallback = dyn Fn(ImageFile) + Send + Sync;

/// Preview slot owned by the newest selection.
#[derive(Default)]
struct IntakeState {
    /// Bumped on every accepted selection and every clear.
    selection: u64,
    file_name: Option<String>,
    preview: Option<Preview>,
}

/// Accepts user selections and forwards images to the analysis pipeline.
///
/// Preview generation and the upload callback are started together and
/// never wait on each other. Must be used inside a tokio runtime.
pub struct ImageIntake {
    state: Arc<Mutex<IntakeState>>,
    on_upload: Box<UploadCallback>,
    notifier: Arc<dyn Notifier>,
}

impl ImageIntake {
    pub fn new<F>(notifier: Arc<dyn Notifier>, on_upload: F) -> Self
    where
        F: Fn(ImageFile) + Send + Sync + 'static,
    {
        Self {
            state: Arc::new(Mutex::new(IntakeState::default())),
            on_upload: Box::new(on_upload),
            notifier,
        }
    }

    /// Validate and accept a selection.
    ///
    /// Non-images are reported through the notifier and returned as
    /// [`IntakeError::NotAnImage`]; nothing else changes. On acceptance the
    /// returned handle resolves once the preview has been produced (or
    /// discarded because a newer selection arrived first).
    pub fn submit(&self, file: ImageFile) -> Result<JoinHandle<()>, IntakeError> {
        if !file.is_image() {
            let mime_type = file.mime_type().to_string();
            tracing::warn!(file = %file.name(), mime_type = %mime_type, "Rejected non-image selection");
            self.notifier.notify(Notification::ImageRejected {
                mime_type: mime_type.clone(),
            });
            return Err(IntakeError::NotAnImage { mime_type });
        }

        let selection = {
            let mut state = lock(&self.state);
            state.selection += 1;
            state.file_name = Some(file.name().to_string());
            state.preview = None;
            state.selection
        };

        let preview_task = spawn_preview(Arc::clone(&self.state), selection, file.clone());

        tracing::debug!(file = %file.name(), bytes = file.len(), "Image accepted");
        (self.on_upload)(file);

        Ok(preview_task)
    }

    /// Drop the current preview and file name. Idempotent.
    pub fn clear(&self) {
        let mut state = lock(&self.state);
        state.selection += 1;
        state.file_name = None;
        state.preview = None;
    }

    pub fn preview(&self) -> Option<Preview> {
        lock(&self.state).preview.clone()
    }

    pub fn file_name(&self) -> Option<String> {
        lock(&self.state).file_name.clone()
    }
}

fn spawn_preview(state: Arc<Mutex<IntakeState>>, selection: u64, file: ImageFile) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        let data_url = preview::data_url(file.mime_type(), file.bytes());
        let mut state = lock(&state);
        if state.selection != selection {
            tracing::debug!(file = %file.name(), "Discarding preview of superseded selection");
            return;
        }
        state.preview = Some(Preview {
            file_name: file.name().to_string(),
            data_url,
        });
    })
}

fn lock(state: &Mutex<IntakeState>) -> MutexGuard<'_, IntakeState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
