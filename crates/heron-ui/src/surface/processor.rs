use crate::error::{DispatchError, Result};
use crate::ops::{BatchId, GlobalOperation, NativeHandle, ViewOperation, ViewTag};
use crate::renderer::ViewManager;
use crate::surface::views::{DroppedViews, NativeViewRegistry};
use crate::surface::{LifecycleState, SurfaceId};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, ThreadId};
use tracing::{debug, error, trace, warn};

/// Callback fired on the surface thread after native views are dropped,
/// carrying the tags whose native counterparts no longer exist.
pub type DropNotifier = Arc<dyn Fn(&[ViewTag]) + Send + Sync>;

/// Everything a processor may only touch from its own thread: the boxed
/// view manager and the native view registry it feeds. Released on destroy.
struct ViewHost {
    manager: Box<dyn ViewManager>,
    views: NativeViewRegistry,
}

/// Buffers UI operations for one rendering surface and applies them, in
/// producer order, on the surface's own thread.
///
/// `enqueue` and `take_pending` are the only cross-thread-safe entry
/// points; everything else assumes it already runs on the owning thread
/// and must be marshaled there by the caller.
pub struct SurfaceProcessor {
    surface_id: SurfaceId,
    owner: ThreadId,
    queue: Mutex<VecDeque<ViewOperation>>,
    /// Advisory queue depth for the lock-light idle check.
    queued: AtomicUsize,
    host: Mutex<Option<ViewHost>>,
    state: Mutex<LifecycleState>,
    on_drop: DropNotifier,
}

impl SurfaceProcessor {
    pub(crate) fn new(surface_id: SurfaceId, owner: ThreadId, on_drop: DropNotifier) -> Self {
        Self {
            surface_id,
            owner,
            queue: Mutex::new(VecDeque::new()),
            queued: AtomicUsize::new(0),
            host: Mutex::new(None),
            state: Mutex::new(LifecycleState::Suspended),
            on_drop,
        }
    }

    pub fn surface_id(&self) -> SurfaceId {
        self.surface_id
    }

    pub fn lifecycle_state(&self) -> LifecycleState {
        *self.state.lock()
    }

    /// Queue one operation. Callable from any thread; the cost is one O(1)
    /// push under the queue lock.
    pub fn enqueue(&self, op: ViewOperation) {
        trace!(surface = self.surface_id.0, op = op.name(), "enqueue");
        let mut queue = self.queue.lock();
        queue.push_back(op);
        // Kept in step under the queue lock so the advisory counter never
        // drifts below the real depth.
        self.queued.store(queue.len(), Ordering::Relaxed);
    }

    /// Best-effort check that nothing is pending. Not authoritative for
    /// scheduling decisions.
    pub fn is_empty(&self) -> bool {
        self.queued.load(Ordering::Relaxed) == 0
    }

    /// Snapshot and clear the pending queue. Callable from any thread; the
    /// flush path snapshots on the producer so a batch boundary cuts
    /// exactly at the flush call.
    pub(crate) fn take_pending(&self) -> VecDeque<ViewOperation> {
        let mut queue = self.queue.lock();
        let ops = std::mem::take(&mut *queue);
        self.queued.store(0, Ordering::Relaxed);
        ops
    }

    /// Drain the operations queued before this call and apply them. Must
    /// run on the owning thread.
    pub fn dispatch_batch(&self, batch: BatchId) -> Result<()> {
        self.assert_owner("dispatch_batch");
        let ops = self.take_pending();
        self.apply_batch(batch, ops)
    }

    /// Apply one batch snapshot against the native view registry. Must run
    /// on the owning thread.
    ///
    /// The view host lock is held for the whole batch, so observers of the
    /// native tree never see a partially applied batch. A structural fault
    /// terminates the batch; the remaining operations are dropped and any
    /// responders they carry answer with defaults.
    pub(crate) fn apply_batch(&self, batch: BatchId, ops: VecDeque<ViewOperation>) -> Result<()> {
        self.assert_owner("apply_batch");
        if ops.is_empty() {
            return Ok(());
        }
        debug!(
            surface = self.surface_id.0,
            batch = batch.0,
            ops = ops.len(),
            "applying batch"
        );

        let mut dropped = DroppedViews::new();
        let result = {
            let mut host = self.host.lock();
            match host.as_mut() {
                Some(host) => {
                    let mut result = Ok(());
                    for op in ops {
                        if let Err(fault) = self.apply(host, op, &mut dropped) {
                            result = Err(fault);
                            break;
                        }
                    }
                    result
                }
                None => {
                    warn!(
                        surface = self.surface_id.0,
                        "batch for a destroyed surface discarded"
                    );
                    Ok(())
                }
            }
        };

        self.notify_dropped(&dropped);
        result
    }

    fn apply(
        &self,
        host: &mut ViewHost,
        op: ViewOperation,
        dropped: &mut DroppedViews,
    ) -> Result<()> {
        match op {
            ViewOperation::CreateView { tag, kind, props } => {
                if host.views.contains(tag) {
                    error!(
                        surface = self.surface_id.0,
                        tag = tag.0,
                        "create for a tag that already has a native view"
                    );
                    return Err(DispatchError::DuplicateView(tag, self.surface_id));
                }
                let handle = host.manager.create_view(tag, &kind, &props);
                host.views.insert(tag, handle, kind);
                Ok(())
            }
            ViewOperation::UpdateProps { tag, props } => {
                let handle = self.mutable_handle(host, tag, "update_props")?;
                host.manager.update_props(handle, &props);
                Ok(())
            }
            ViewOperation::UpdateLayout { tag, frame } => {
                let handle = self.mutable_handle(host, tag, "update_layout")?;
                host.manager.update_layout(handle, frame);
                Ok(())
            }
            ViewOperation::ManageChildren {
                parent,
                removals,
                insertions,
            } => self.manage_children(host, parent, removals, insertions, dropped),
            ViewOperation::DispatchCommand { tag, command, args } => {
                let handle = self.mutable_handle(host, tag, "dispatch_command")?;
                host.manager.dispatch_command(handle, &command, &args);
                Ok(())
            }
            ViewOperation::Measure { tag, reply } => {
                match host.views.handle(tag) {
                    Some(handle) => reply.respond(host.manager.measure(handle)),
                    // Raced with an asynchronous removal; the responder
                    // answers with its default as it drops.
                    None => warn!(
                        surface = self.surface_id.0,
                        tag = tag.0,
                        "measure raced with removal"
                    ),
                }
                Ok(())
            }
            ViewOperation::FindTouchTarget { tag, point, reply } => {
                match host.views.handle(tag) {
                    Some(handle) => reply.respond(host.manager.find_touch_target(handle, point)),
                    None => warn!(
                        surface = self.surface_id.0,
                        tag = tag.0,
                        "touch-target lookup raced with removal"
                    ),
                }
                Ok(())
            }
            ViewOperation::ShowPopup { tag, items, reply } => {
                match host.views.handle(tag) {
                    Some(handle) => host.manager.show_popup(handle, &items, reply),
                    None => warn!(
                        surface = self.surface_id.0,
                        tag = tag.0,
                        "popup anchor raced with removal"
                    ),
                }
                Ok(())
            }
            ViewOperation::RemoveRoot { tag } => {
                let subtree = host.views.remove_subtree(tag);
                if subtree.is_empty() {
                    // The root was already torn down with its surface.
                    warn!(
                        surface = self.surface_id.0,
                        tag = tag.0,
                        "remove for an unknown root view"
                    );
                    return Ok(());
                }
                for (_, handle) in &subtree {
                    host.manager.drop_view(*handle);
                }
                dropped.extend(subtree);
                Ok(())
            }
        }
    }

    fn manage_children(
        &self,
        host: &mut ViewHost,
        parent: ViewTag,
        removals: Vec<ViewTag>,
        insertions: Vec<(ViewTag, usize)>,
        dropped: &mut DroppedViews,
    ) -> Result<()> {
        let parent_handle = self.mutable_handle(host, parent, "manage_children")?;

        for child in removals {
            let record = host
                .views
                .get_mut(parent)
                .ok_or(DispatchError::UnknownView(parent))?;
            record.children.retain(|tag| *tag != child);

            let subtree = host.views.remove_subtree(child);
            let Some((_, child_handle)) = subtree.first().copied() else {
                error!(
                    surface = self.surface_id.0,
                    parent = parent.0,
                    child = child.0,
                    "removal of an unknown child"
                );
                return Err(DispatchError::UnknownView(child));
            };
            host.manager.remove_child(parent_handle, child_handle);
            for (_, handle) in &subtree {
                host.manager.drop_view(*handle);
            }
            dropped.extend(subtree);
        }

        for (child, index) in insertions {
            let child_handle = host
                .views
                .handle(child)
                .ok_or(DispatchError::UnknownView(child))?;
            let record = host
                .views
                .get_mut(parent)
                .ok_or(DispatchError::UnknownView(parent))?;
            let index = index.min(record.children.len());
            record.children.insert(index, child);
            host.manager.insert_child(parent_handle, child_handle, index);
        }

        Ok(())
    }

    fn mutable_handle(&self, host: &ViewHost, tag: ViewTag, what: &str) -> Result<NativeHandle> {
        host.views.handle(tag).ok_or_else(|| {
            error!(
                surface = self.surface_id.0,
                tag = tag.0,
                what,
                "mutation against an unknown view"
            );
            DispatchError::UnknownView(tag)
        })
    }

    /// Must run on the owning thread.
    pub fn on_suspend(&self) {
        self.assert_owner("on_suspend");
        let mut state = self.state.lock();
        if *state == LifecycleState::Active {
            *state = LifecycleState::Suspended;
            debug!(surface = self.surface_id.0, "surface suspended");
        }
    }

    /// Must run on the owning thread.
    pub fn on_resume(&self) {
        self.assert_owner("on_resume");
        let mut state = self.state.lock();
        if *state == LifecycleState::Suspended {
            *state = LifecycleState::Active;
            debug!(surface = self.surface_id.0, "surface resumed");
        }
    }

    /// Must run on the owning thread. Terminal: releases the view host,
    /// discards still-queued operations without applying them (their
    /// responders answer with defaults), and reports every owned view
    /// through the drop notification.
    pub fn on_destroy(&self) {
        self.assert_owner("on_destroy");
        {
            let mut state = self.state.lock();
            if *state == LifecycleState::Destroyed {
                return;
            }
            *state = LifecycleState::Destroyed;
        }

        let discarded = self.take_pending();
        if !discarded.is_empty() {
            debug!(
                surface = self.surface_id.0,
                discarded = discarded.len(),
                "queued operations discarded on destroy"
            );
        }
        drop(discarded);

        let host = self.host.lock().take();
        if let Some(mut host) = host {
            let dropped = host.views.drain_all();
            for (_, handle) in &dropped {
                host.manager.drop_view(*handle);
            }
            self.notify_dropped(&dropped);
        }
        debug!(surface = self.surface_id.0, "surface processor destroyed");
    }

    /// Apply a surface-wide operation. Must run on the owning thread.
    pub fn apply_global(&self, op: &GlobalOperation) {
        self.assert_owner("apply_global");
        if let Some(host) = self.host.lock().as_mut() {
            host.manager.apply_global(op);
        }
    }

    /// Run an observer against the native view registry. Must run on the
    /// owning thread; returns `None` once the processor is destroyed.
    pub fn with_views<R>(&self, f: impl FnOnce(&NativeViewRegistry) -> R) -> Option<R> {
        self.assert_owner("with_views");
        self.host.lock().as_ref().map(|host| f(&host.views))
    }

    /// Install the view manager built on this surface's thread. Called once
    /// right after the worker starts.
    pub(crate) fn install_host(&self, manager: Box<dyn ViewManager>) {
        self.assert_owner("install_host");
        let mut host = self.host.lock();
        debug_assert!(host.is_none(), "view host installed twice");
        *host = Some(ViewHost {
            manager,
            views: NativeViewRegistry::new(),
        });
    }

    /// Record a root view supplied by the embedder. The handle was minted
    /// by the window toolkit, not by this surface's view manager.
    pub(crate) fn seed_root(&self, tag: ViewTag, handle: NativeHandle) {
        self.assert_owner("seed_root");
        if let Some(host) = self.host.lock().as_mut() {
            host.views.insert(tag, handle, "root".into());
        }
    }

    fn notify_dropped(&self, dropped: &DroppedViews) {
        if dropped.is_empty() {
            return;
        }
        let tags: Vec<ViewTag> = dropped.iter().map(|(tag, _)| *tag).collect();
        (self.on_drop)(&tags);
    }

    fn assert_owner(&self, what: &str) {
        debug_assert_eq!(
            thread::current().id(),
            self.owner,
            "{what} must run on the thread owning surface {}",
            self.surface_id.0
        );
        let _ = what;
    }
}
