use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Reports whether the page is currently hidden, as `document.hidden` does.
pub trait PageVisibility: Send + Sync {
    /// Returns `true` while the page is hidden.
    fn is_hidden(&self) -> bool;
}

/// A [`PageVisibility`] updated by the host's `visibilitychange` handler.
///
/// Clones share the same state.
#[derive(Clone, Debug, Default)]
pub struct VisibilityState(Arc<AtomicBool>);

impl VisibilityState {
    /// Creates a state for a visible page.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the new visibility.
    pub fn set_hidden(&self, hidden: bool) {
        self.0.store(hidden, Ordering::Relaxed);
    }
}

impl PageVisibility for VisibilityState {
    fn is_hidden(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
