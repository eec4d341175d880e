mod surfaces;
mod tags;

pub use surfaces::{SurfaceRegistry, Teardown};
pub use tags::TagDirectory;
