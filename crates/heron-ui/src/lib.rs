//! Multi-surface view-operation dispatch for a scripted native UI runtime.
//!
//! One producer thread (the scripting engine's output thread) enqueues
//! view operations through the [`ViewDispatcher`]; each rendering surface
//! (one per top-level window) drains its own queue on its own thread at
//! every batch flush.

pub mod dispatch;
pub mod error;
pub mod ops;
pub mod registry;
pub mod renderer;
pub mod surface;

pub use dispatch::{DispatchConfig, ViewDispatcher};
pub use error::{DispatchError, Result};
pub use ops::{
    BatchId, GlobalOperation, LayoutDirection, LayoutRect, Measurement, NativeHandle, Point,
    Props, Responder, ViewOperation, ViewTag,
};
pub use registry::{SurfaceRegistry, TagDirectory, Teardown};
pub use renderer::{ViewManager, ViewManagerFactory};
pub use surface::{LifecycleState, SurfaceId, SurfaceProcessor, SurfaceThread};
