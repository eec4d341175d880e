use super::traits::{ViewManager, ViewManagerFactory};
use crate::ops::{
    GlobalOperation, LayoutRect, Measurement, NativeHandle, Point, Props, Responder, ViewTag,
};
use crate::surface::SurfaceId;
use parking_lot::Mutex;
use std::sync::Arc;

/// Captured `ViewManager` call, in application order.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    Create {
        surface: SurfaceId,
        tag: ViewTag,
        kind: String,
    },
    UpdateProps {
        surface: SurfaceId,
        tag: ViewTag,
        props: Props,
    },
    UpdateLayout {
        surface: SurfaceId,
        tag: ViewTag,
        frame: LayoutRect,
    },
    InsertChild {
        surface: SurfaceId,
        parent: ViewTag,
        child: ViewTag,
        index: usize,
    },
    RemoveChild {
        surface: SurfaceId,
        parent: ViewTag,
        child: ViewTag,
    },
    DropView {
        surface: SurfaceId,
        tag: ViewTag,
    },
    Command {
        surface: SurfaceId,
        tag: ViewTag,
        command: String,
    },
    Measure {
        surface: SurfaceId,
        tag: ViewTag,
    },
    Global {
        surface: SurfaceId,
        op: &'static str,
    },
}

/// Journal of `ViewManager` calls, shared across surfaces and readable from
/// the test thread while workers append to it.
#[derive(Clone, Default)]
pub struct CallJournal {
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl CallJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, call: RecordedCall) {
        self.calls.lock().push(call);
    }

    pub fn snapshot(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.lock().is_empty()
    }
}

/// Test view manager that journals every call instead of touching a real
/// toolkit.
///
/// Handles are minted with the same numeric value as the view's tag, and
/// embedder-supplied root handles are expected to follow the convention,
/// so journal entries can always name the tag.
pub struct RecordingViewManager {
    surface: SurfaceId,
    journal: CallJournal,
}

impl RecordingViewManager {
    pub fn new(surface: SurfaceId, journal: CallJournal) -> Self {
        Self { surface, journal }
    }

    /// Factory wiring every surface's manager to one shared journal.
    pub fn factory(journal: CallJournal) -> ViewManagerFactory {
        Arc::new(move |surface| Box::new(Self::new(surface, journal.clone())))
    }

    fn tag_of(handle: NativeHandle) -> ViewTag {
        ViewTag(handle.0)
    }
}

impl ViewManager for RecordingViewManager {
    fn create_view(&mut self, tag: ViewTag, kind: &str, _props: &Props) -> NativeHandle {
        self.journal.push(RecordedCall::Create {
            surface: self.surface,
            tag,
            kind: kind.to_string(),
        });
        NativeHandle(tag.0)
    }

    fn update_props(&mut self, view: NativeHandle, props: &Props) {
        self.journal.push(RecordedCall::UpdateProps {
            surface: self.surface,
            tag: Self::tag_of(view),
            props: props.clone(),
        });
    }

    fn update_layout(&mut self, view: NativeHandle, frame: LayoutRect) {
        self.journal.push(RecordedCall::UpdateLayout {
            surface: self.surface,
            tag: Self::tag_of(view),
            frame,
        });
    }

    fn insert_child(&mut self, parent: NativeHandle, child: NativeHandle, index: usize) {
        self.journal.push(RecordedCall::InsertChild {
            surface: self.surface,
            parent: Self::tag_of(parent),
            child: Self::tag_of(child),
            index,
        });
    }

    fn remove_child(&mut self, parent: NativeHandle, child: NativeHandle) {
        self.journal.push(RecordedCall::RemoveChild {
            surface: self.surface,
            parent: Self::tag_of(parent),
            child: Self::tag_of(child),
        });
    }

    fn drop_view(&mut self, view: NativeHandle) {
        self.journal.push(RecordedCall::DropView {
            surface: self.surface,
            tag: Self::tag_of(view),
        });
    }

    fn dispatch_command(&mut self, view: NativeHandle, command: &str, _args: &Props) {
        self.journal.push(RecordedCall::Command {
            surface: self.surface,
            tag: Self::tag_of(view),
            command: command.to_string(),
        });
    }

    fn measure(&self, view: NativeHandle) -> Measurement {
        self.journal.push(RecordedCall::Measure {
            surface: self.surface,
            tag: Self::tag_of(view),
        });
        // Distinctive values so callers can tell a real answer from the
        // default a dropped responder produces.
        Measurement {
            frame: LayoutRect {
                x: 0.0,
                y: 0.0,
                width: view.0 as f32,
                height: 1.0,
            },
            surface_offset: Point {
                x: self.surface.0 as f32,
                y: 0.0,
            },
        }
    }

    fn find_touch_target(&self, view: NativeHandle, _point: Point) -> Option<ViewTag> {
        Some(Self::tag_of(view))
    }

    fn show_popup(
        &mut self,
        _view: NativeHandle,
        _items: &[String],
        reply: Responder<Option<usize>>,
    ) {
        reply.respond(Some(0));
    }

    fn apply_global(&mut self, op: &GlobalOperation) {
        self.journal.push(RecordedCall::Global {
            surface: self.surface,
            op: op.name(),
        });
    }
}
