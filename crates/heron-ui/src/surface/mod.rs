mod processor;
mod thread;
mod views;

pub use processor::{DropNotifier, SurfaceProcessor};
pub use thread::{SurfaceThread, WorkerClosed};
pub use views::{NativeViewRegistry, ViewRecord};

/// Identifies one rendering surface (one top-level window) and, with it,
/// the dispatcher thread that owns the surface's native views. Two
/// surfaces never share a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub u64);

/// Lifecycle of one surface processor, and of the registry aggregate.
///
/// Processors start `Suspended` and move between `Suspended` and `Active`
/// until the terminal `Destroyed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Suspended,
    Active,
    Destroyed,
}

impl LifecycleState {
    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleState::Suspended => "suspended",
            LifecycleState::Active => "active",
            LifecycleState::Destroyed => "destroyed",
        }
    }
}
