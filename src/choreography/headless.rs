//! In-memory page model implementing [`Viewport`].

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{ElementBox, ImageState, Viewport};

#[derive(Debug, Default)]
struct PageState {
    scroll_y: f64,
    viewport_height: f64,
    document_height: f64,
    elements: HashMap<String, ElementBox>,
    scroll_writes: Vec<f64>,
}

/// A page without a renderer: elements are placed explicitly and image
/// loads are completed by hand.
#[derive(Debug)]
pub struct HeadlessPage {
    state: Mutex<PageState>,
}

impl HeadlessPage {
    pub fn new(viewport_height: f64, document_height: f64) -> Self {
        Self {
            state: Mutex::new(PageState {
                viewport_height,
                document_height,
                ..PageState::default()
            }),
        }
    }

    pub fn insert_element(&self, id: &str, element: ElementBox) {
        let mut state = self.lock();
        let bottom = element.document_top + element.height;
        if bottom > state.document_height {
            state.document_height = bottom;
        }
        state.elements.insert(id.to_string(), element);
    }

    pub fn remove_element(&self, id: &str) {
        self.lock().elements.remove(id);
    }

    /// Mark every image inside `id` as decoded with the given height.
    pub fn complete_images(&self, id: &str, natural_height: u32) {
        if let Some(element) = self.lock().elements.get_mut(id) {
            for image in &mut element.images {
                *image = ImageState {
                    complete: true,
                    natural_height,
                };
            }
        }
    }

    pub fn set_scroll(&self, y: f64) {
        self.lock().scroll_y = y;
    }

    /// Every offset written through [`Viewport::scroll_to`], in order.
    pub fn scroll_writes(&self) -> Vec<f64> {
        self.lock().scroll_writes.clone()
    }

    fn lock(&self) -> MutexGuard<'_, PageState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Viewport for HeadlessPage {
    fn find_element(&self, id: &str) -> Option<ElementBox> {
        self.lock().elements.get(id).cloned()
    }

    fn scroll_y(&self) -> f64 {
        self.lock().scroll_y
    }

    fn viewport_height(&self) -> f64 {
        self.lock().viewport_height
    }

    fn document_height(&self) -> f64 {
        self.lock().document_height
    }

    fn scroll_to(&self, y: f64) {
        let mut state = self.lock();
        state.scroll_y = y;
        state.scroll_writes.push(y);
    }
}
