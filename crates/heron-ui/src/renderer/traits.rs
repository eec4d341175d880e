use crate::ops::{
    GlobalOperation, LayoutRect, Measurement, NativeHandle, Point, Props, Responder, ViewTag,
};
use crate::surface::SurfaceId;
use std::sync::Arc;

/// Toolkit-side contract for one surface: given a native handle and an
/// operation payload, mutate the native tree.
///
/// One boxed manager exists per surface. It is built by the factory on the
/// surface's own thread and only ever called from that thread; `Send` is
/// required only because the box lives inside the shared processor.
pub trait ViewManager: Send {
    /// Create the native view for `tag` and return the handle the manager
    /// minted for it.
    fn create_view(&mut self, tag: ViewTag, kind: &str, props: &Props) -> NativeHandle;

    fn update_props(&mut self, view: NativeHandle, props: &Props);

    fn update_layout(&mut self, view: NativeHandle, frame: LayoutRect);

    fn insert_child(&mut self, parent: NativeHandle, child: NativeHandle, index: usize);

    /// Detach `child` from `parent` without releasing it.
    fn remove_child(&mut self, parent: NativeHandle, child: NativeHandle);

    /// Release a native view whose registry record is gone.
    fn drop_view(&mut self, view: NativeHandle);

    fn dispatch_command(&mut self, view: NativeHandle, command: &str, args: &Props);

    fn measure(&self, view: NativeHandle) -> Measurement;

    fn find_touch_target(&self, view: NativeHandle, point: Point) -> Option<ViewTag>;

    /// Present a popup anchored at `view`; the selection (or dismissal)
    /// answers through the responder.
    fn show_popup(&mut self, view: NativeHandle, items: &[String], reply: Responder<Option<usize>>);

    /// Surface-wide refresh: layout direction, locale, layout animation.
    fn apply_global(&mut self, op: &GlobalOperation);
}

/// Builds the view manager for a newly created surface. Invoked on that
/// surface's own thread, so thread-affine toolkit state can be constructed
/// where it lives.
pub type ViewManagerFactory = Arc<dyn Fn(SurfaceId) -> Box<dyn ViewManager> + Send + Sync>;
