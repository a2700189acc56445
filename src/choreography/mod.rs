//! Viewport choreography: bring a freshly rendered result into view.
//!
//! After a result lands, the result region may not be attached yet and its
//! images may still be decoding. The choreographer polls for the region
//! (bounded by an attempt budget), waits for its images, then runs an eased
//! scroll that centers it. When the region never shows up it scrolls to the
//! end of the document instead.

pub mod easing;
pub mod headless;

pub use easing::*;
pub use headless::*;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::ChoreographyConfig;

// ═══════════════════════════════════════════════════════════
// Document boundary
// ═══════════════════════════════════════════════════════════

/// Load state of one `<img>` inside the result region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageState {
    pub complete: bool,
    pub natural_height: u32,
}

impl ImageState {
    pub fn pending() -> Self {
        Self {
            complete: false,
            natural_height: 0,
        }
    }

    pub fn loaded(natural_height: u32) -> Self {
        Self {
            complete: true,
            natural_height,
        }
    }

    /// A broken image reports `complete` with zero height; it counts as not
    /// loaded.
    pub fn is_loaded(&self) -> bool {
        self.complete && self.natural_height != 0
    }
}

/// Geometry of an element plus its descendant images.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementBox {
    /// Offset of the element's top edge from the start of the document.
    pub document_top: f64,
    pub height: f64,
    pub images: Vec<ImageState>,
}

impl ElementBox {
    pub fn new(document_top: f64, height: f64) -> Self {
        Self {
            document_top,
            height,
            images: Vec::new(),
        }
    }

    pub fn with_images(mut self, images: Vec<ImageState>) -> Self {
        self.images = images;
        self
    }

    pub fn pending_images(&self) -> usize {
        self.images.iter().filter(|image| !image.is_loaded()).count()
    }

    pub fn images_loaded(&self) -> bool {
        self.pending_images() == 0
    }
}

/// What the choreographer may read from and write to the page.
pub trait Viewport: Send + Sync {
    fn find_element(&self, id: &str) -> Option<ElementBox>;
    fn scroll_y(&self) -> f64;
    fn viewport_height(&self) -> f64;
    fn document_height(&self) -> f64;
    fn scroll_to(&self, y: f64);
}

// ═══════════════════════════════════════════════════════════
// Target resolution
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum FocusTarget {
    /// The result region was found; `pending_images` is non-zero only when
    /// the budget ran out before every image loaded.
    Element {
        id: String,
        offset: f64,
        pending_images: usize,
        attempts: u32,
    },
    /// No candidate id resolved within the budget.
    DocumentEnd { offset: f64, attempts: u32 },
}

impl FocusTarget {
    pub fn offset(&self) -> f64 {
        match self {
            Self::Element { offset, .. } | Self::DocumentEnd { offset, .. } => *offset,
        }
    }
}

/// Scroll offset that vertically centers `element`, never above the top.
pub fn centered_offset(element: &ElementBox, viewport_height: f64) -> f64 {
    (element.document_top - viewport_height / 2.0 + element.height / 2.0)
        .round()
        .max(0.0)
}

fn first_candidate(viewport: &dyn Viewport, ids: &[String]) -> Option<(String, ElementBox)> {
    ids.iter()
        .find_map(|id| viewport.find_element(id).map(|element| (id.clone(), element)))
}

/// Poll once per interval until a candidate element with loaded images is
/// found or the attempt budget is spent.
pub async fn locate(viewport: &dyn Viewport, config: &ChoreographyConfig) -> FocusTarget {
    let max_attempts = config.max_attempts.max(1);
    let mut attempts = 0;

    loop {
        tokio::time::sleep(config.poll_interval).await;
        attempts += 1;
        let exhausted = attempts >= max_attempts;

        match first_candidate(viewport, &config.candidate_ids) {
            Some((id, element)) => {
                let pending_images = element.pending_images();
                if pending_images > 0 && !exhausted {
                    tracing::trace!(id = %id, pending_images, attempts, "Waiting for result images");
                    continue;
                }
                let offset = centered_offset(&element, viewport.viewport_height());
                return FocusTarget::Element {
                    id,
                    offset,
                    pending_images,
                    attempts,
                };
            }
            None if exhausted => {
                let offset = viewport.document_height();
                tracing::debug!(attempts, offset, "Result region not found, scrolling to document end");
                return FocusTarget::DocumentEnd { offset, attempts };
            }
            None => {}
        }
    }
}

/// Animate the scroll offset to `to`, one write per frame.
pub async fn animate_scroll(
    viewport: &dyn Viewport,
    to: f64,
    duration: Duration,
    frame_interval: Duration,
) {
    let start = viewport.scroll_y();
    let started = Instant::now();

    loop {
        tokio::time::sleep(frame_interval).await;
        let t = progress(started.elapsed(), duration);
        viewport.scroll_to(interpolate(start, to, t));
        if t >= 1.0 {
            break;
        }
    }
}

/// Locate the result region, then scroll it into the middle of the viewport.
pub async fn focus(viewport: &dyn Viewport, config: &ChoreographyConfig) -> FocusTarget {
    let target = locate(viewport, config).await;
    animate_scroll(
        viewport,
        target.offset(),
        config.scroll_duration,
        config.frame_interval,
    )
    .await;
    tracing::debug!(?target, "Viewport focused on result");
    target
}

// ═══════════════════════════════════════════════════════════
// ViewportChoreographer
// ═══════════════════════════════════════════════════════════

/// Owns the page handle and timing policy; spawns one focus run per result.
#[derive(Clone)]
pub struct ViewportChoreographer {
    viewport: Arc<dyn Viewport>,
    config: ChoreographyConfig,
}

impl ViewportChoreographer {
    pub fn new(viewport: Arc<dyn Viewport>, config: ChoreographyConfig) -> Self {
        Self { viewport, config }
    }

    pub fn config(&self) -> &ChoreographyConfig {
        &self.config
    }

    pub async fn focus(&self) -> FocusTarget {
        focus(&*self.viewport, &self.config).await
    }

    /// Run [`Self::focus`] after the start delay, giving the presentation
    /// layer time to attach the result region. Abort the handle to cancel.
    pub fn schedule(&self) -> JoinHandle<FocusTarget> {
        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(this.config.start_delay).await;
            this.focus().await
        })
    }
}
