//! End-to-end mirror scenarios: wire update -> session -> property tree -> scene.
//!
//! Everything runs without a network: the session is driven straight into
//! `Connected` and fed JSON frames the way the transport would deliver them.

use fgcanvas::canvas::session::{MirrorSession, ProtocolWarning, UpdateOp};
use fgcanvas::scene::{CanvasScene, CommandRecorder, DrawCommand, ElementKind, ElementTag, SceneEvent};
use fgcanvas::tree::PropValue;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A connected session mirroring `/canvas` with a scene attached.
fn connected() -> (MirrorSession, CanvasScene) {
    let mut session = MirrorSession::new("/canvas");
    let mut scene = CanvasScene::new(None);
    assert!(session.begin_connecting());
    assert!(session.enter_connected(&mut scene));
    scene.rebuild(session.tree());
    scene.take_events();
    (session, scene)
}

fn apply(session: &mut MirrorSession, scene: &mut CanvasScene, text: &str) -> Vec<ProtocolWarning> {
    session.apply_message(text, scene).unwrap().warnings
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn group_with_path_built_in_one_message() {
    let (mut session, mut scene) = connected();
    let warnings = apply(
        &mut session,
        &mut scene,
        r#"{"created":[{"path":"/canvas/group[0]","id":1,"value":null},
                       {"path":"/canvas/group[0]/path[0]","id":2,"value":null}],
            "changed":[[2,"M0 0 L10 10"]]}"#,
    );
    assert!(warnings.is_empty());

    let tree = session.tree();
    let group = tree.find_path(tree.root(), "group").unwrap();
    let path = tree.find_path(tree.root(), "group[0]/path[0]").unwrap();
    assert_eq!(session.node_for_id(1), Some(group));
    assert_eq!(session.node_for_id(2), Some(path));
    assert_eq!(tree.value(path), Some(&PropValue::String("M0 0 L10 10".into())));

    let root = scene.root().unwrap();
    assert_eq!(scene.children(root), &[group]);
    assert_eq!(scene.children(group), &[path]);
    assert_eq!(scene.element(path).unwrap().tag(), ElementTag::Path);

    let mut ctx = CommandRecorder::new();
    scene.paint(session.tree(), &mut ctx);
    let ElementKind::Path(state) = scene.element(path).unwrap().kind() else {
        panic!("not a path element");
    };
    assert_eq!(state.source(), Some("M0 0 L10 10"));
    assert_eq!(
        ctx.primitives()
            .filter(|c| matches!(c, DrawCommand::Path { .. }))
            .count(),
        1
    );
}

#[test]
fn removing_unknown_id_is_a_warning_only() {
    let (mut session, mut scene) = connected();
    apply(
        &mut session,
        &mut scene,
        r#"{"created":[{"path":"/canvas/text[0]","id":1,"value":null}]}"#,
    );
    let nodes = session.tree().len();

    let warnings = apply(&mut session, &mut scene, r#"{"removed":[99]}"#);
    assert_eq!(
        warnings,
        vec![ProtocolWarning::UnknownId {
            id: 99,
            op: UpdateOp::Remove
        }]
    );
    assert_eq!(session.tree().len(), nodes);
    assert_eq!(session.warning_count(), 1);
}

#[test]
fn duplicate_create_repoints_id_and_keeps_old_node() {
    let (mut session, mut scene) = connected();
    apply(
        &mut session,
        &mut scene,
        r#"{"created":[{"path":"/canvas/group[0]","id":1,"value":null}]}"#,
    );
    let old = session.node_for_id(1).unwrap();

    let warnings = apply(
        &mut session,
        &mut scene,
        r#"{"created":[{"path":"/canvas/group[1]","id":1,"value":null}]}"#,
    );
    assert!(matches!(warnings.as_slice(), [ProtocolWarning::DuplicateId { id: 1, .. }]));

    let new = session.node_for_id(1).unwrap();
    assert_ne!(old, new);
    assert!(session.tree().contains(old));
    assert_eq!(session.tree().path(old), "group");
    let root = scene.root().unwrap();
    assert_eq!(scene.children(root), &[old, new]);
}

#[test]
fn remove_cascades_and_invalidates_descendant_ids() {
    let (mut session, mut scene) = connected();
    apply(
        &mut session,
        &mut scene,
        r#"{"created":[{"path":"/canvas/group[0]","id":1,"value":null},
                       {"path":"/canvas/group[0]/text[0]","id":2,"value":null},
                       {"path":"/canvas/group[0]/text[0]/text","id":3,"value":"hi"}]}"#,
    );
    scene.take_events();
    let root = scene.root().unwrap();

    let warnings = apply(
        &mut session,
        &mut scene,
        r#"{"removed":[1],"changed":[[3,"bye"]]}"#,
    );
    assert_eq!(
        warnings,
        vec![ProtocolWarning::UnknownId {
            id: 3,
            op: UpdateOp::Change
        }]
    );
    assert_eq!(session.id_count(), 0);
    assert!(scene.children(root).is_empty());
    assert_eq!(
        scene.take_events(),
        vec![SceneEvent::ChildRemoved { group: root, index: 0 }]
    );
}

#[test]
fn create_then_remove_in_same_message() {
    let (mut session, mut scene) = connected();
    let warnings = apply(
        &mut session,
        &mut scene,
        r#"{"created":[{"path":"/canvas/path[0]","id":5,"value":"M1 1"}],"remvoed":[5]}"#,
    );
    assert!(warnings.is_empty());
    assert!(session.node_for_id(5).is_none());
    assert!(scene.children(scene.root().unwrap()).is_empty());
}

#[test]
fn entries_outside_root_are_skipped() {
    let (mut session, mut scene) = connected();
    let warnings = apply(
        &mut session,
        &mut scene,
        r#"{"created":[{"path":"/canvasX/group","id":1,"value":null},
                       {"path":"/canvas/group","id":2,"value":null}]}"#,
    );
    assert!(matches!(warnings.as_slice(), [ProtocolWarning::OutsideRoot { .. }]));
    assert!(session.node_for_id(1).is_none());
    assert!(session.node_for_id(2).is_some());
}

#[test]
fn paint_requests_coalesce_across_changes() {
    let (mut session, mut scene) = connected();
    apply(
        &mut session,
        &mut scene,
        r#"{"created":[{"path":"/canvas/text[0]/text","id":1,"value":"a"}]}"#,
    );
    let mut ctx = CommandRecorder::new();
    scene.paint(session.tree(), &mut ctx);
    assert!(!scene.paint_requested());

    apply(&mut session, &mut scene, r#"{"changed":[[1,"b"],[1,"c"]]}"#);
    assert!(scene.take_paint_request());
    assert!(!scene.take_paint_request());

    let mut ctx = CommandRecorder::new();
    scene.paint(session.tree(), &mut ctx);
    assert_eq!(ctx.texts(), vec!["c"]);
}

#[test]
fn reconnect_discards_previous_tree() {
    let (mut session, mut scene) = connected();
    apply(
        &mut session,
        &mut scene,
        r#"{"created":[{"path":"/canvas/group[0]","id":1,"value":null}]}"#,
    );
    session.mark_disconnected(Some("socket closed".into()));
    assert_eq!(session.id_count(), 1);
    assert_eq!(session.last_error(), Some("socket closed"));

    assert!(session.begin_connecting());
    assert!(session.enter_connected(&mut scene));
    scene.rebuild(session.tree());
    assert_eq!(session.id_count(), 0);
    assert!(scene.children(scene.root().unwrap()).is_empty());
}
