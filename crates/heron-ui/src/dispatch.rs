use crate::error::{DispatchError, Result};
use crate::ops::{BatchId, GlobalOperation, NativeHandle, Props, ViewOperation, ViewTag};
use crate::registry::{SurfaceRegistry, TagDirectory, Teardown};
use crate::renderer::ViewManagerFactory;
use crate::surface::{DropNotifier, LifecycleState, SurfaceId};
use std::sync::Arc;
use tracing::{error, trace, warn};

/// Knobs for the dispatch layer.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Surface created eagerly at startup and never torn down while the
    /// process runs.
    pub main_surface: SurfaceId,
    /// Name prefix for surface worker threads.
    pub worker_name_prefix: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            main_surface: SurfaceId(1),
            worker_name_prefix: "heron-surface".to_string(),
        }
    }
}

/// Single call surface for the scripting-engine-facing layer.
///
/// The producer enqueues operations here without knowing which surface
/// owns the target view; the dispatcher resolves ownership through the tag
/// directory, forwards to the owning surface processor, and marks batch
/// boundaries with `flush_all`.
pub struct ViewDispatcher {
    tags: Arc<TagDirectory>,
    surfaces: SurfaceRegistry,
}

impl ViewDispatcher {
    /// Builds the dispatcher and eagerly spawns the main surface.
    ///
    /// Surface processors report natively dropped views back here, which
    /// keeps the tag directory free of entries whose native counterpart no
    /// longer exists.
    pub fn new(config: DispatchConfig, factory: ViewManagerFactory) -> Result<Self> {
        let tags = Arc::new(TagDirectory::new());
        let directory = tags.clone();
        let on_drop: DropNotifier = Arc::new(move |dropped: &[ViewTag]| {
            let removed = directory.bulk_remove(dropped);
            trace!(dropped = dropped.len(), removed, "drop notification");
        });
        let surfaces = SurfaceRegistry::new(config, factory, tags.clone(), on_drop)?;
        Ok(Self { tags, surfaces })
    }

    pub fn main_surface(&self) -> SurfaceId {
        self.surfaces.main_surface()
    }

    /// Attach a root view's native handle to its owning surface, creating
    /// the surface's processor on first sight.
    pub fn attach_root_view(
        &self,
        surface: SurfaceId,
        root: ViewTag,
        handle: NativeHandle,
    ) -> Result<()> {
        self.surfaces.attach_root_view(surface, root, handle)
    }

    /// Detach a previously attached root view by its tag. The returned
    /// handle completes when any resulting surface teardown has finished.
    pub fn detach_root_view(&self, root: ViewTag) -> Result<Teardown> {
        let surface = self
            .tags
            .resolve(root)
            .ok_or(DispatchError::UnknownView(root))?;
        // The processor may outlive this root; queue removal of the root's
        // native record so its subtree is dropped either way. A full
        // teardown discards the queue and drops everything itself.
        if let Some(processor) = self.surfaces.processor(surface) {
            processor.enqueue(ViewOperation::RemoveRoot { tag: root });
        }
        self.surfaces.detach_root_view(surface)
    }

    /// Create a view under `parent`, on whichever surface owns it.
    ///
    /// The new tag is registered in the ownership directory at enqueue
    /// time, so follow-up operations for it within the same batch resolve.
    pub fn create_view(&self, parent: ViewTag, tag: ViewTag, kind: &str, props: Props) -> Result<()> {
        let surface = self
            .tags
            .resolve(parent)
            .ok_or(DispatchError::UnknownView(parent))?;
        let processor = self
            .surfaces
            .processor(surface)
            .ok_or(DispatchError::UnknownSurface(surface))?;
        self.tags.register(tag, surface)?;
        processor.enqueue(ViewOperation::CreateView {
            tag,
            kind: kind.into(),
            props,
        });
        Ok(())
    }

    /// Route one operation to the surface owning its target view.
    ///
    /// An unresolved target is tolerated for query operations, since the
    /// producer may have issued them for a view whose removal is still in
    /// flight: their responder answers with its default. For mutations it
    /// is a logic fault.
    pub fn enqueue_by_tag(&self, op: ViewOperation) -> Result<()> {
        let tag = op.target();
        let Some(surface) = self.tags.resolve(tag) else {
            return self.absorb_unroutable(op, DispatchError::UnknownView(tag));
        };
        match self.surfaces.processor(surface) {
            Some(processor) => {
                processor.enqueue(op);
                Ok(())
            }
            None => self.absorb_unroutable(op, DispatchError::UnknownSurface(surface)),
        }
    }

    /// Route one operation to an explicit surface. Unknown surfaces are a
    /// fatal fault here; there is no lazy creation outside root attach.
    pub fn enqueue_for_surface(&self, surface: SurfaceId, op: ViewOperation) -> Result<()> {
        let processor = self
            .surfaces
            .processor(surface)
            .ok_or(DispatchError::UnknownSurface(surface))?;
        if let ViewOperation::CreateView { tag, .. } = &op {
            self.tags.register(*tag, surface)?;
        }
        processor.enqueue(op);
        Ok(())
    }

    /// Apply a surface-wide operation to every surface.
    pub fn broadcast_global(&self, op: GlobalOperation) {
        self.surfaces.broadcast_global(&op);
    }

    /// Host lifecycle: resume every surface processor.
    pub fn resume(&self) {
        self.surfaces.resume_all();
    }

    /// Host lifecycle: suspend every surface processor.
    pub fn suspend(&self) {
        self.surfaces.suspend_all();
    }

    /// Host lifecycle: destroy every surface processor. Terminal.
    pub fn destroy(&self) {
        self.surfaces.destroy_all();
    }

    /// Batch boundary. Snapshots every surface's pending queue at the call
    /// and marshals the drains onto the surface threads; operations
    /// enqueued after this call wait for the next flush.
    pub fn flush_all(&self, batch: BatchId) {
        trace!(batch = batch.0, "flush");
        for (processor, worker) in self.surfaces.flush_targets() {
            let ops = processor.take_pending();
            if ops.is_empty() {
                continue;
            }
            let posted = worker.post(move || {
                if let Err(fault) = processor.apply_batch(batch, ops) {
                    error!(batch = batch.0, %fault, "batch terminated by a structural fault");
                }
            });
            if posted.is_err() {
                // The surface tore down between snapshot and post; its
                // responders answer with defaults as the snapshot drops.
                warn!(batch = batch.0, "flush raced with surface teardown");
            }
        }
    }

    /// Best-effort: true when no surface has pending operations.
    pub fn is_idle(&self) -> bool {
        self.surfaces.is_idle()
    }

    pub fn lifecycle_state(&self) -> LifecycleState {
        self.surfaces.lifecycle_state()
    }

    /// Lifecycle state of one surface's processor, if it is registered.
    pub fn surface_state(&self, surface: SurfaceId) -> Option<LifecycleState> {
        self.surfaces
            .processor(surface)
            .map(|processor| processor.lifecycle_state())
    }

    /// Directory lookup, exposed for observers and tests.
    pub fn resolve_owner(&self, tag: ViewTag) -> Option<SurfaceId> {
        self.tags.resolve(tag)
    }

    pub fn root_view_count(&self, surface: SurfaceId) -> Option<u32> {
        self.surfaces.root_view_count(surface)
    }

    pub fn surface_count(&self) -> usize {
        self.surfaces.surface_count()
    }

    fn absorb_unroutable(&self, op: ViewOperation, fault: DispatchError) -> Result<()> {
        if op.is_query() {
            warn!(
                tag = op.target().0,
                op = op.name(),
                "query for a removed view answered with a default"
            );
            drop(op);
            return Ok(());
        }
        Err(fault)
    }
}
