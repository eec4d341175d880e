use crate::error::{DispatchError, Result};
use crate::ops::ViewTag;
use crate::surface::SurfaceId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use tracing::trace;

/// Single source of truth mapping a live view tag to the surface that owns
/// its native counterpart.
///
/// One lock covers the whole map: bulk removal and iteration-heavy debug
/// paths need a consistent snapshot, and directory traffic is bounded by
/// operations per batch, not by live views.
#[derive(Default)]
pub struct TagDirectory {
    entries: Mutex<HashMap<ViewTag, SurfaceId>>,
}

impl TagDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails when the tag is still live; tags are never reused for the
    /// lifetime of a view.
    pub fn register(&self, tag: ViewTag, surface: SurfaceId) -> Result<()> {
        let mut entries = self.entries.lock();
        match entries.entry(tag) {
            Entry::Occupied(slot) => Err(DispatchError::DuplicateView(tag, *slot.get())),
            Entry::Vacant(slot) => {
                slot.insert(surface);
                Ok(())
            }
        }
    }

    /// `None` when the tag was already removed, an expected outcome for
    /// queries racing with an asynchronous removal.
    pub fn resolve(&self, tag: ViewTag) -> Option<SurfaceId> {
        self.entries.lock().get(&tag).copied()
    }

    /// Remove a batch of tags in one locked step, so concurrent resolvers
    /// observe the removal atomically. Returns how many were present.
    pub fn bulk_remove(&self, tags: &[ViewTag]) -> usize {
        let mut entries = self.entries.lock();
        let removed = tags
            .iter()
            .filter(|tag| entries.remove(tag).is_some())
            .count();
        trace!(requested = tags.len(), removed, "bulk remove");
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
