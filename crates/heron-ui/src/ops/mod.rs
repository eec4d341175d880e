use serde::{Deserialize, Serialize};
use smartstring::{LazyCompact, SmartString};
use std::fmt;

/// Opaque identifier for one view instance, unique across all surfaces for
/// the lifetime of the view. Assigned by the producer and never reused
/// while a view with this tag is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ViewTag(pub u64);

/// Opaque handle to a native view, minted by the surface's view manager
/// (or by the window toolkit, for root views).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeHandle(pub u64);

/// Producer-side batch number, stamped on every flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BatchId(pub u64);

/// Property bag for create/update/command payloads.
pub type Props = serde_json::Value;

/// Frame assigned to a view by the layout pass, relative to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LayoutRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

/// Answer to a measure query: the view's frame plus its absolute offset
/// within the surface. Zeroed when the view no longer exists.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Measurement {
    pub frame: LayoutRect,
    pub surface_offset: Point,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutDirection {
    Ltr,
    Rtl,
}

impl LayoutDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            LayoutDirection::Ltr => "ltr",
            LayoutDirection::Rtl => "rtl",
        }
    }
}

/// One-shot reply handle for query operations.
///
/// Dropping an unfired responder completes it with `T::default()`, so a
/// query discarded by teardown or targeting a just-removed view still
/// answers its caller.
pub struct Responder<T: Default> {
    reply: Option<Box<dyn FnOnce(T) + Send>>,
}

impl<T: Default> Responder<T> {
    pub fn new(reply: impl FnOnce(T) + Send + 'static) -> Self {
        Self {
            reply: Some(Box::new(reply)),
        }
    }

    /// Responder paired with a receiver, for callers that block on the
    /// answer.
    pub fn channel() -> (Self, crossbeam_channel::Receiver<T>)
    where
        T: Send + 'static,
    {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let responder = Self::new(move |value| {
            let _ = tx.send(value);
        });
        (responder, rx)
    }

    pub fn respond(mut self, value: T) {
        if let Some(reply) = self.reply.take() {
            reply(value);
        }
    }
}

impl<T: Default> Drop for Responder<T> {
    fn drop(&mut self) {
        if let Some(reply) = self.reply.take() {
            reply(T::default());
        }
    }
}

impl<T: Default> fmt::Debug for Responder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.reply.is_some() {
            "Responder(pending)"
        } else {
            "Responder(fired)"
        })
    }
}

/// One buffered UI operation, routed to the surface that owns its target
/// view and applied during a batch flush on that surface's thread.
#[derive(Debug)]
pub enum ViewOperation {
    CreateView {
        tag: ViewTag,
        kind: SmartString<LazyCompact>,
        props: Props,
    },
    UpdateProps {
        tag: ViewTag,
        props: Props,
    },
    UpdateLayout {
        tag: ViewTag,
        frame: LayoutRect,
    },
    /// Detach and drop the `removals` subtrees, then insert already-created
    /// views at the given indices, in that order.
    ManageChildren {
        parent: ViewTag,
        removals: Vec<ViewTag>,
        insertions: Vec<(ViewTag, usize)>,
    },
    DispatchCommand {
        tag: ViewTag,
        command: SmartString<LazyCompact>,
        args: Props,
    },
    Measure {
        tag: ViewTag,
        reply: Responder<Measurement>,
    },
    FindTouchTarget {
        tag: ViewTag,
        point: Point,
        reply: Responder<Option<ViewTag>>,
    },
    ShowPopup {
        tag: ViewTag,
        items: Vec<String>,
        reply: Responder<Option<usize>>,
    },
    /// Drop a detached root view's native record and subtree.
    RemoveRoot {
        tag: ViewTag,
    },
}

impl ViewOperation {
    /// Tag the operation targets (the parent, for child management).
    pub fn target(&self) -> ViewTag {
        match self {
            ViewOperation::CreateView { tag, .. }
            | ViewOperation::UpdateProps { tag, .. }
            | ViewOperation::UpdateLayout { tag, .. }
            | ViewOperation::DispatchCommand { tag, .. }
            | ViewOperation::Measure { tag, .. }
            | ViewOperation::FindTouchTarget { tag, .. }
            | ViewOperation::ShowPopup { tag, .. }
            | ViewOperation::RemoveRoot { tag } => *tag,
            ViewOperation::ManageChildren { parent, .. } => *parent,
        }
    }

    /// Queries tolerate a missing target by answering with a default;
    /// mutations treat it as a logic fault.
    pub fn is_query(&self) -> bool {
        matches!(
            self,
            ViewOperation::Measure { .. }
                | ViewOperation::FindTouchTarget { .. }
                | ViewOperation::ShowPopup { .. }
        )
    }

    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            ViewOperation::CreateView { .. } => "create_view",
            ViewOperation::UpdateProps { .. } => "update_props",
            ViewOperation::UpdateLayout { .. } => "update_layout",
            ViewOperation::ManageChildren { .. } => "manage_children",
            ViewOperation::DispatchCommand { .. } => "dispatch_command",
            ViewOperation::Measure { .. } => "measure",
            ViewOperation::FindTouchTarget { .. } => "find_touch_target",
            ViewOperation::ShowPopup { .. } => "show_popup",
            ViewOperation::RemoveRoot { .. } => "remove_root",
        }
    }
}

/// Surface-wide operation broadcast to every processor.
#[derive(Debug, Clone)]
pub enum GlobalOperation {
    SetLayoutDirection(LayoutDirection),
    SetLocale(String),
    ConfigureLayoutAnimation(Props),
}

impl GlobalOperation {
    pub fn name(&self) -> &'static str {
        match self {
            GlobalOperation::SetLayoutDirection(_) => "set_layout_direction",
            GlobalOperation::SetLocale(_) => "set_locale",
            GlobalOperation::ConfigureLayoutAnimation(_) => "configure_layout_animation",
        }
    }
}
