//! Integration tests driving the dispatch facade end to end with a
//! recording view manager: routing, ordering, batch boundaries, and the
//! tolerated query races.

use heron_ui::renderer::test_utils::{CallJournal, RecordedCall, RecordingViewManager};
use heron_ui::{
    BatchId, DispatchConfig, DispatchError, GlobalOperation, LayoutDirection, Measurement,
    NativeHandle, Point, Responder, SurfaceId, ViewDispatcher, ViewOperation, ViewTag,
};
use std::time::Duration;

const MAIN: SurfaceId = SurfaceId(1);
const TIMEOUT: Duration = Duration::from_secs(5);

fn dispatcher() -> (ViewDispatcher, CallJournal) {
    let journal = CallJournal::new();
    let dispatcher = ViewDispatcher::new(
        DispatchConfig::default(),
        RecordingViewManager::factory(journal.clone()),
    )
    .unwrap();
    dispatcher.resume();
    (dispatcher, journal)
}

fn step(n: i64) -> serde_json::Value {
    serde_json::json!({ "step": n })
}

/// Flush and block until the batch is applied on the surface owning
/// `barrier_view`, using a measure query as the barrier.
fn flush_and_wait(dispatcher: &ViewDispatcher, barrier_view: ViewTag, batch: u64) -> Measurement {
    let (reply, rx) = Responder::channel();
    dispatcher
        .enqueue_by_tag(ViewOperation::Measure {
            tag: barrier_view,
            reply,
        })
        .unwrap();
    dispatcher.flush_all(BatchId(batch));
    rx.recv_timeout(TIMEOUT).unwrap()
}

fn recorded_steps(journal: &CallJournal, surface: SurfaceId) -> Vec<i64> {
    journal
        .snapshot()
        .into_iter()
        .filter_map(|call| match call {
            RecordedCall::UpdateProps {
                surface: s, props, ..
            } if s == surface => props.get("step").and_then(|value| value.as_i64()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_operations_apply_in_producer_order() {
    let (dispatcher, journal) = dispatcher();
    dispatcher
        .attach_root_view(MAIN, ViewTag(100), NativeHandle(100))
        .unwrap();

    dispatcher
        .create_view(ViewTag(100), ViewTag(10), "label", step(0))
        .unwrap();
    for n in 1..=3 {
        dispatcher
            .enqueue_by_tag(ViewOperation::UpdateProps {
                tag: ViewTag(10),
                props: step(n),
            })
            .unwrap();
    }
    flush_and_wait(&dispatcher, ViewTag(10), 1);

    assert_eq!(recorded_steps(&journal, MAIN), vec![1, 2, 3]);
    let calls = journal.snapshot();
    assert!(matches!(
        calls[0],
        RecordedCall::Create {
            tag: ViewTag(10),
            ..
        }
    ));
}

#[test]
fn test_operations_route_to_the_owning_surface() {
    let (dispatcher, journal) = dispatcher();
    dispatcher
        .attach_root_view(MAIN, ViewTag(100), NativeHandle(100))
        .unwrap();
    dispatcher
        .attach_root_view(SurfaceId(2), ViewTag(200), NativeHandle(200))
        .unwrap();

    dispatcher
        .create_view(ViewTag(100), ViewTag(10), "label", step(0))
        .unwrap();
    dispatcher
        .create_view(ViewTag(200), ViewTag(20), "label", step(0))
        .unwrap();
    flush_and_wait(&dispatcher, ViewTag(10), 1);
    flush_and_wait(&dispatcher, ViewTag(20), 2);

    // A processor never sees a tag owned by another surface.
    for call in journal.snapshot() {
        match call {
            RecordedCall::Create { surface, tag, .. } => match tag {
                ViewTag(10) => assert_eq!(surface, MAIN),
                ViewTag(20) => assert_eq!(surface, SurfaceId(2)),
                other => panic!("unexpected create for {other:?}"),
            },
            RecordedCall::Measure { surface, tag } => match tag {
                ViewTag(10) => assert_eq!(surface, MAIN),
                ViewTag(20) => assert_eq!(surface, SurfaceId(2)),
                _ => {}
            },
            _ => {}
        }
    }
}

#[test]
fn test_flush_boundary_leaves_later_operations_for_the_next_flush() {
    let (dispatcher, journal) = dispatcher();
    dispatcher
        .attach_root_view(MAIN, ViewTag(100), NativeHandle(100))
        .unwrap();
    dispatcher
        .create_view(ViewTag(100), ViewTag(10), "label", step(0))
        .unwrap();
    flush_and_wait(&dispatcher, ViewTag(10), 1);

    dispatcher
        .enqueue_by_tag(ViewOperation::UpdateProps {
            tag: ViewTag(10),
            props: step(1),
        })
        .unwrap();
    let (reply, rx) = Responder::channel();
    dispatcher
        .enqueue_by_tag(ViewOperation::Measure {
            tag: ViewTag(10),
            reply,
        })
        .unwrap();
    dispatcher.flush_all(BatchId(2));

    // Enqueued strictly after the flush call: must not be applied by it.
    dispatcher
        .enqueue_by_tag(ViewOperation::UpdateProps {
            tag: ViewTag(10),
            props: step(2),
        })
        .unwrap();

    let _: Measurement = rx.recv_timeout(TIMEOUT).unwrap();
    assert_eq!(recorded_steps(&journal, MAIN), vec![1]);
    assert!(!dispatcher.is_idle());

    flush_and_wait(&dispatcher, ViewTag(10), 3);
    assert_eq!(recorded_steps(&journal, MAIN), vec![1, 2]);
    assert!(dispatcher.is_idle());
}

#[test]
fn test_measure_answers_with_the_managers_values() {
    let (dispatcher, _journal) = dispatcher();
    dispatcher
        .attach_root_view(MAIN, ViewTag(100), NativeHandle(100))
        .unwrap();
    dispatcher
        .create_view(ViewTag(100), ViewTag(10), "label", step(0))
        .unwrap();

    let measured = flush_and_wait(&dispatcher, ViewTag(10), 1);
    assert_eq!(measured.frame.width, 10.0);
    assert_eq!(measured.surface_offset.x, MAIN.0 as f32);
}

#[test]
fn test_queries_for_removed_views_answer_with_defaults() {
    let (dispatcher, _journal) = dispatcher();

    let (reply, rx) = Responder::channel();
    dispatcher
        .enqueue_by_tag(ViewOperation::Measure {
            tag: ViewTag(999),
            reply,
        })
        .unwrap();
    assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), Measurement::default());

    let (reply, rx) = Responder::channel();
    dispatcher
        .enqueue_by_tag(ViewOperation::FindTouchTarget {
            tag: ViewTag(999),
            point: Point { x: 1.0, y: 2.0 },
            reply,
        })
        .unwrap();
    assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), None);
}

#[test]
fn test_mutations_for_unknown_views_are_fatal() {
    let (dispatcher, _journal) = dispatcher();

    let fault = dispatcher
        .enqueue_by_tag(ViewOperation::UpdateProps {
            tag: ViewTag(999),
            props: step(0),
        })
        .unwrap_err();
    assert!(matches!(fault, DispatchError::UnknownView(ViewTag(999))));

    let fault = dispatcher
        .create_view(ViewTag(999), ViewTag(10), "label", step(0))
        .unwrap_err();
    assert!(matches!(fault, DispatchError::UnknownView(ViewTag(999))));
}

#[test]
fn test_duplicate_tag_registration_is_fatal() {
    let (dispatcher, _journal) = dispatcher();
    dispatcher
        .attach_root_view(MAIN, ViewTag(100), NativeHandle(100))
        .unwrap();

    dispatcher
        .create_view(ViewTag(100), ViewTag(10), "label", step(0))
        .unwrap();
    let fault = dispatcher
        .create_view(ViewTag(100), ViewTag(10), "label", step(0))
        .unwrap_err();
    assert!(matches!(
        fault,
        DispatchError::DuplicateView(ViewTag(10), MAIN)
    ));
}

#[test]
fn test_enqueue_for_unknown_surface_is_fatal() {
    let (dispatcher, _journal) = dispatcher();

    let fault = dispatcher
        .enqueue_for_surface(
            SurfaceId(9),
            ViewOperation::UpdateProps {
                tag: ViewTag(10),
                props: step(0),
            },
        )
        .unwrap_err();
    assert!(matches!(fault, DispatchError::UnknownSurface(SurfaceId(9))));
}

#[test]
fn test_broadcast_global_reaches_every_surface() {
    let (dispatcher, journal) = dispatcher();
    dispatcher
        .attach_root_view(MAIN, ViewTag(100), NativeHandle(100))
        .unwrap();
    dispatcher
        .attach_root_view(SurfaceId(2), ViewTag(200), NativeHandle(200))
        .unwrap();

    dispatcher.broadcast_global(GlobalOperation::SetLayoutDirection(LayoutDirection::Rtl));
    // The barrier flush is posted behind the broadcast on each worker.
    flush_and_wait(&dispatcher, ViewTag(100), 1);
    flush_and_wait(&dispatcher, ViewTag(200), 2);

    let globals: Vec<SurfaceId> = journal
        .snapshot()
        .into_iter()
        .filter_map(|call| match call {
            RecordedCall::Global { surface, op } if op == "set_layout_direction" => Some(surface),
            _ => None,
        })
        .collect();
    assert!(globals.contains(&MAIN));
    assert!(globals.contains(&SurfaceId(2)));
}

#[test]
fn test_manage_children_inserts_and_removes_on_the_surface() {
    let (dispatcher, journal) = dispatcher();
    dispatcher
        .attach_root_view(MAIN, ViewTag(100), NativeHandle(100))
        .unwrap();

    dispatcher
        .create_view(ViewTag(100), ViewTag(10), "panel", step(0))
        .unwrap();
    dispatcher
        .create_view(ViewTag(100), ViewTag(11), "label", step(0))
        .unwrap();
    dispatcher
        .enqueue_by_tag(ViewOperation::ManageChildren {
            parent: ViewTag(100),
            removals: Vec::new(),
            insertions: vec![(ViewTag(10), 0)],
        })
        .unwrap();
    dispatcher
        .enqueue_by_tag(ViewOperation::ManageChildren {
            parent: ViewTag(10),
            removals: Vec::new(),
            insertions: vec![(ViewTag(11), 0)],
        })
        .unwrap();
    flush_and_wait(&dispatcher, ViewTag(10), 1);

    // Dropping the panel takes its subtree with it and clears the
    // directory entries once the drop notification lands.
    dispatcher
        .enqueue_by_tag(ViewOperation::ManageChildren {
            parent: ViewTag(100),
            removals: vec![ViewTag(10)],
            insertions: Vec::new(),
        })
        .unwrap();
    flush_and_wait(&dispatcher, ViewTag(100), 2);

    let calls = journal.snapshot();
    assert!(calls.contains(&RecordedCall::RemoveChild {
        surface: MAIN,
        parent: ViewTag(100),
        child: ViewTag(10),
    }));
    assert!(calls.contains(&RecordedCall::DropView {
        surface: MAIN,
        tag: ViewTag(11),
    }));
    assert_eq!(dispatcher.resolve_owner(ViewTag(10)), None);
    assert_eq!(dispatcher.resolve_owner(ViewTag(11)), None);
    assert_eq!(dispatcher.resolve_owner(ViewTag(100)), Some(MAIN));
}
