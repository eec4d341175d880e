use crate::dispatch::DispatchConfig;
use crate::error::{DispatchError, Result};
use crate::ops::{GlobalOperation, NativeHandle, ViewTag};
use crate::registry::TagDirectory;
use crate::renderer::ViewManagerFactory;
use crate::surface::{
    DropNotifier, LifecycleState, SurfaceId, SurfaceProcessor, SurfaceThread, WorkerClosed,
};
use crossbeam_channel::{Receiver, bounded};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use tracing::{debug, warn};

/// Completion handle for a scheduled surface destruction. Waitable by the
/// caller before, e.g., reusing the surface identifier.
#[derive(Debug)]
pub struct Teardown {
    done: Option<Receiver<()>>,
}

impl Teardown {
    fn ready() -> Self {
        Self { done: None }
    }

    fn pending(done: Receiver<()>) -> Self {
        Self { done: Some(done) }
    }

    /// True once destruction has finished (immediately when no teardown
    /// was scheduled).
    pub fn is_complete(&self) -> bool {
        self.done.as_ref().is_none_or(|done| !done.is_empty())
    }

    /// Block until destruction finishes.
    pub fn wait(self) {
        if let Some(done) = self.done {
            let _ = done.recv();
        }
    }
}

struct SurfaceEntry {
    processor: Arc<SurfaceProcessor>,
    worker: Arc<SurfaceThread>,
    root_views: u32,
}

struct RegistryInner {
    surfaces: HashMap<SurfaceId, SurfaceEntry>,
    state: LifecycleState,
}

/// Owns the mapping from surface identifier to surface processor and
/// drives processor creation/destruction in step with root-view
/// attach/detach.
///
/// One registry-wide lock protects the map and the root-view counts; it is
/// never held across a marshal onto a surface worker.
pub struct SurfaceRegistry {
    inner: Mutex<RegistryInner>,
    config: DispatchConfig,
    factory: ViewManagerFactory,
    tags: Arc<TagDirectory>,
    on_drop: DropNotifier,
}

impl SurfaceRegistry {
    /// Creates the registry with its designated main surface eagerly
    /// attached (zero root views), in the Suspended state.
    pub fn new(
        config: DispatchConfig,
        factory: ViewManagerFactory,
        tags: Arc<TagDirectory>,
        on_drop: DropNotifier,
    ) -> Result<Self> {
        let registry = Self {
            inner: Mutex::new(RegistryInner {
                surfaces: HashMap::new(),
                state: LifecycleState::Suspended,
            }),
            config,
            factory,
            tags,
            on_drop,
        };
        let main = registry.spawn_surface(registry.config.main_surface)?;
        registry
            .inner
            .lock()
            .surfaces
            .insert(registry.config.main_surface, main);
        Ok(registry)
    }

    pub fn main_surface(&self) -> SurfaceId {
        self.config.main_surface
    }

    pub fn lifecycle_state(&self) -> LifecycleState {
        self.inner.lock().state
    }

    pub fn processor(&self, surface: SurfaceId) -> Option<Arc<SurfaceProcessor>> {
        self.inner
            .lock()
            .surfaces
            .get(&surface)
            .map(|entry| entry.processor.clone())
    }

    pub fn root_view_count(&self, surface: SurfaceId) -> Option<u32> {
        self.inner
            .lock()
            .surfaces
            .get(&surface)
            .map(|entry| entry.root_views)
    }

    pub fn surface_count(&self) -> usize {
        self.inner.lock().surfaces.len()
    }

    /// Best-effort: true when no registered processor has pending work.
    pub fn is_idle(&self) -> bool {
        self.inner
            .lock()
            .surfaces
            .values()
            .all(|entry| entry.processor.is_empty())
    }

    pub(crate) fn flush_targets(&self) -> Vec<(Arc<SurfaceProcessor>, Arc<SurfaceThread>)> {
        self.inner
            .lock()
            .surfaces
            .values()
            .map(|entry| (entry.processor.clone(), entry.worker.clone()))
            .collect()
    }

    /// Attach a root view. Creates the surface's processor and worker on
    /// first sight of the surface id; when the aggregate state is Active
    /// the new processor receives `on_resume` on its own thread before this
    /// returns.
    pub fn attach_root_view(
        &self,
        surface: SurfaceId,
        root: ViewTag,
        handle: NativeHandle,
    ) -> Result<()> {
        self.tags.register(root, surface)?;
        let attached = self.attach_inner(surface, root, handle);
        if attached.is_err() {
            self.tags.bulk_remove(&[root]);
        }
        attached
    }

    fn attach_inner(&self, surface: SurfaceId, root: ViewTag, handle: NativeHandle) -> Result<()> {
        // Double-checked under the single registry lock: concurrent
        // attaches for the same new surface must create exactly one
        // processor. The host install is a non-blocking post (no blocking
        // marshal happens under the lock); worker FIFO keeps it ahead of
        // everything that follows.
        let (processor, worker, resume) = {
            let mut inner = self.inner.lock();
            if inner.state == LifecycleState::Destroyed {
                return Err(DispatchError::Destroyed);
            }
            let active = inner.state == LifecycleState::Active;
            match inner.surfaces.entry(surface) {
                Entry::Occupied(mut slot) => {
                    let entry = slot.get_mut();
                    entry.root_views += 1;
                    (entry.processor.clone(), entry.worker.clone(), false)
                }
                Entry::Vacant(slot) => {
                    let resume = active;
                    let mut entry = self.spawn_surface(surface)?;
                    entry.root_views = 1;
                    let processor = entry.processor.clone();
                    let worker = entry.worker.clone();
                    slot.insert(entry);
                    (processor, worker, resume)
                }
            }
        };
        seed_root_view(&processor, &worker, surface, root, handle, resume)
    }

    /// Spawn a surface's worker and processor and queue the view-manager
    /// install as the worker's first task, so thread-affine toolkit state
    /// is constructed on the thread it lives on.
    fn spawn_surface(&self, surface: SurfaceId) -> Result<SurfaceEntry> {
        let worker = Arc::new(SurfaceThread::spawn(format!(
            "{}-{}",
            self.config.worker_name_prefix, surface.0
        ))?);
        let processor = Arc::new(SurfaceProcessor::new(
            surface,
            worker.thread_id(),
            self.on_drop.clone(),
        ));

        let factory = self.factory.clone();
        let installed = processor.clone();
        worker
            .post(move || installed.install_host(factory(surface)))
            .map_err(|_| DispatchError::SurfaceGone(surface))?;

        debug!(surface = surface.0, "surface processor created");
        Ok(SurfaceEntry {
            processor,
            worker,
            root_views: 0,
        })
    }

    /// Detach one root view. When the count reaches zero on a non-main
    /// surface, the entry is removed and `on_destroy` is scheduled on the
    /// processor's own thread; the returned handle completes when
    /// destruction finishes.
    pub fn detach_root_view(&self, surface: SurfaceId) -> Result<Teardown> {
        let removed = {
            let mut inner = self.inner.lock();
            let Some(entry) = inner.surfaces.get_mut(&surface) else {
                return Err(DispatchError::UnknownSurface(surface));
            };
            debug_assert!(entry.root_views > 0, "detach without a matching attach");
            entry.root_views = entry.root_views.saturating_sub(1);
            if entry.root_views == 0 && surface != self.config.main_surface {
                inner.surfaces.remove(&surface)
            } else {
                None
            }
        };
        Ok(match removed {
            Some(entry) => self.schedule_destroy(entry),
            None => Teardown::ready(),
        })
    }

    fn schedule_destroy(&self, entry: SurfaceEntry) -> Teardown {
        let surface = entry.processor.surface_id();
        debug!(surface = surface.0, "scheduling surface destruction");

        if entry.worker.is_current() {
            entry.processor.on_destroy();
            entry.worker.shutdown();
            return Teardown::ready();
        }

        let (done_tx, done_rx) = bounded(1);
        let processor = entry.processor.clone();
        let posted = entry.worker.post(move || {
            processor.on_destroy();
            let _ = done_tx.send(());
        });
        entry.worker.shutdown();
        match posted {
            Ok(()) => Teardown::pending(done_rx),
            // The worker already wound down; treat as torn down.
            Err(WorkerClosed) => Teardown::ready(),
        }
    }

    /// Aggregate resume: every registered processor receives `on_resume`
    /// on its own thread (inline when called from that thread).
    pub fn resume_all(&self) {
        let targets = {
            let mut inner = self.inner.lock();
            match inner.state {
                LifecycleState::Active => return,
                LifecycleState::Destroyed => {
                    warn!("resume after destruction ignored");
                    return;
                }
                LifecycleState::Suspended => {}
            }
            inner.state = LifecycleState::Active;
            snapshot(&inner)
        };
        for (processor, worker) in targets {
            // A worker that already wound down was torn down with its
            // surface; nothing left to resume.
            let _ = worker.run_sync(move || processor.on_resume());
        }
    }

    /// Aggregate suspend, the mirror of `resume_all`.
    pub fn suspend_all(&self) {
        let targets = {
            let mut inner = self.inner.lock();
            match inner.state {
                LifecycleState::Suspended => return,
                LifecycleState::Destroyed => {
                    warn!("suspend after destruction ignored");
                    return;
                }
                LifecycleState::Active => {}
            }
            inner.state = LifecycleState::Suspended;
            snapshot(&inner)
        };
        for (processor, worker) in targets {
            let _ = worker.run_sync(move || processor.on_suspend());
        }
    }

    /// Full teardown, terminal. Every processor, main included, receives
    /// `on_destroy` on its own thread; this blocks until all of them
    /// finished.
    pub fn destroy_all(&self) {
        let entries: Vec<SurfaceEntry> = {
            let mut inner = self.inner.lock();
            if inner.state == LifecycleState::Destroyed {
                return;
            }
            inner.state = LifecycleState::Destroyed;
            inner.surfaces.drain().map(|(_, entry)| entry).collect()
        };
        let pending: Vec<Teardown> = entries
            .into_iter()
            .map(|entry| self.schedule_destroy(entry))
            .collect();
        for teardown in pending {
            teardown.wait();
        }
        debug!("surface registry destroyed");
    }

    /// Apply a surface-wide operation to every live processor on its own
    /// thread. Closed workers are skipped.
    pub fn broadcast_global(&self, op: &GlobalOperation) {
        let targets = {
            let inner = self.inner.lock();
            if inner.state == LifecycleState::Destroyed {
                return;
            }
            snapshot(&inner)
        };
        for (processor, worker) in targets {
            let op = op.clone();
            let _ = worker.post(move || processor.apply_global(&op));
        }
    }
}

fn snapshot(inner: &RegistryInner) -> Vec<(Arc<SurfaceProcessor>, Arc<SurfaceThread>)> {
    inner
        .surfaces
        .values()
        .map(|entry| (entry.processor.clone(), entry.worker.clone()))
        .collect()
}

fn seed_root_view(
    processor: &Arc<SurfaceProcessor>,
    worker: &Arc<SurfaceThread>,
    surface: SurfaceId,
    root: ViewTag,
    handle: NativeHandle,
    resume: bool,
) -> Result<()> {
    let seeded = processor.clone();
    let task = move || {
        seeded.seed_root(root, handle);
        if resume {
            seeded.on_resume();
        }
    };
    // The simulated resume for a processor born into an Active system runs
    // synchronously, as it would have at startup.
    let posted = if resume {
        worker.run_sync(task)
    } else {
        worker.post(task)
    };
    posted.map_err(|_| DispatchError::SurfaceGone(surface))?;
    debug!(surface = surface.0, root = root.0, "root view attached");
    Ok(())
}
