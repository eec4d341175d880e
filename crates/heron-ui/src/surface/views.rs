use crate::ops::{NativeHandle, ViewTag};
use smallvec::SmallVec;
use smartstring::{LazyCompact, SmartString};
use std::collections::HashMap;

/// Dropped-tag set reported to the drop-notification callback.
pub type DroppedViews = SmallVec<[(ViewTag, NativeHandle); 8]>;

/// One native view owned by a surface processor.
#[derive(Debug, Clone)]
pub struct ViewRecord {
    pub handle: NativeHandle,
    pub kind: SmartString<LazyCompact>,
    pub children: Vec<ViewTag>,
}

/// Per-surface map from view tag to native handle and recorded children.
///
/// Owned exclusively by one surface processor and only ever touched from
/// that processor's thread.
#[derive(Debug, Default)]
pub struct NativeViewRegistry {
    records: HashMap<ViewTag, ViewRecord>,
}

impl NativeViewRegistry {
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
        }
    }

    pub fn insert(&mut self, tag: ViewTag, handle: NativeHandle, kind: SmartString<LazyCompact>) {
        self.records.insert(
            tag,
            ViewRecord {
                handle,
                kind,
                children: Vec::new(),
            },
        );
    }

    pub fn contains(&self, tag: ViewTag) -> bool {
        self.records.contains_key(&tag)
    }

    pub fn get(&self, tag: ViewTag) -> Option<&ViewRecord> {
        self.records.get(&tag)
    }

    pub fn get_mut(&mut self, tag: ViewTag) -> Option<&mut ViewRecord> {
        self.records.get_mut(&tag)
    }

    pub fn handle(&self, tag: ViewTag) -> Option<NativeHandle> {
        self.records.get(&tag).map(|record| record.handle)
    }

    /// Remove `tag` and every transitive child, returning the dropped views
    /// parents-first.
    pub fn remove_subtree(&mut self, tag: ViewTag) -> DroppedViews {
        let mut dropped = DroppedViews::new();
        let mut stack = vec![tag];
        while let Some(next) = stack.pop() {
            if let Some(record) = self.records.remove(&next) {
                stack.extend(record.children.iter().copied());
                dropped.push((next, record.handle));
            }
        }
        dropped
    }

    /// Drain every record (teardown path), returning the dropped views.
    pub fn drain_all(&mut self) -> DroppedViews {
        self.records
            .drain()
            .map(|(tag, record)| (tag, record.handle))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
