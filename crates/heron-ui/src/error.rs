use crate::ops::ViewTag;
use crate::surface::SurfaceId;
use thiserror::Error;

/// Faults surfaced by the dispatch layer.
///
/// Tolerated producer/consumer races (queries against just-removed views)
/// are absorbed at their call sites and never reach this enum; everything
/// here is a structural fault or a teardown condition the caller must
/// decide about.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("no surface processor registered for {0:?}")]
    UnknownSurface(SurfaceId),

    #[error("{0:?} is not registered")]
    UnknownView(ViewTag),

    #[error("{0:?} is already owned by {1:?}")]
    DuplicateView(ViewTag, SurfaceId),

    #[error("worker for {0:?} is already torn down")]
    SurfaceGone(SurfaceId),

    #[error("dispatcher has been destroyed")]
    Destroyed,

    #[error("failed to spawn surface worker: {0}")]
    WorkerSpawn(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DispatchError>;
