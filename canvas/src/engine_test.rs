#![allow(clippy::float_cmp)]

use uuid::Uuid;

use super::*;
use crate::doc::ZoneAction;
use crate::geometry::ZoneShape;

// =============================================================
// Helpers
// =============================================================

fn make_zone(x: f64, y: f64, radius: f64) -> Zone {
    Zone {
        id: Uuid::new_v4(),
        map_id: Uuid::nil(),
        node_id: Some(Uuid::new_v4()),
        target_node_id: None,
        shape: ZoneShape::Circle(Geometry { x, y, radius, ..Geometry::default() }),
        is_visible: false,
        action: ZoneAction::OpenNode,
        sort_index: 0,
    }
}

fn make_link(from: NodeId, to: NodeId) -> Link {
    Link {
        id: Uuid::new_v4(),
        campaign_id: Uuid::nil(),
        from_node_id: from,
        to_node_id: to,
        kind: "reference".into(),
        label: None,
        sort_index: 0,
    }
}

fn pt(x: f64, y: f64) -> Point {
    Point::new(x, y)
}

fn core_with(zones: Vec<Zone>) -> EngineCore {
    let mut core = EngineCore::new();
    core.load_zones(zones);
    core
}

fn center_of(core: &EngineCore, id: ZoneId) -> Point {
    core.zone(&id).and_then(Zone::geometry).map(Geometry::center).unwrap()
}

// =============================================================
// Construction
// =============================================================

#[test]
fn core_new_is_idle_and_empty() {
    let core = EngineCore::new();
    assert!(core.selection().is_none());
    assert_eq!(core.input, InputState::Idle);
    assert_eq!(core.viewport(), Viewport::default());
    assert!(core.connections().is_empty());
    assert!(core.pending_connection().is_none());
}

// =============================================================
// Panning
// =============================================================

#[test]
fn secondary_down_on_empty_canvas_starts_pan() {
    let mut core = core_with(vec![]);
    core.on_pointer_down(pt(100.0, 100.0), Button::Secondary);
    assert!(matches!(core.input, InputState::Panning { .. }));

    let actions = core.on_pointer_move(pt(150.0, 80.0));
    assert_eq!(actions, vec![Action::RenderNeeded]);
    assert_eq!(core.viewport().x, 50.0);
    assert_eq!(core.viewport().y, -20.0);

    core.on_pointer_move(pt(90.0, 100.0));
    assert_eq!(core.viewport().x, -10.0);
    assert_eq!(core.viewport().y, 0.0);
}

#[test]
fn pan_ends_on_any_button_release() {
    let mut core = core_with(vec![]);
    core.on_pointer_down(pt(0.0, 0.0), Button::Secondary);
    core.on_pointer_move(pt(5000.0, 5000.0));
    assert!(core.on_pointer_up(pt(5000.0, 5000.0), Button::Primary).is_empty());
    assert_eq!(core.input, InputState::Idle);
    assert!(core.on_pointer_move(pt(0.0, 0.0)).is_empty());
}

#[test]
fn primary_down_on_empty_canvas_does_not_pan() {
    let mut core = core_with(vec![]);
    core.on_pointer_down(pt(10.0, 10.0), Button::Primary);
    assert_eq!(core.input, InputState::Idle);
}

// =============================================================
// Zoom
// =============================================================

#[test]
fn wheel_zooms_about_cursor() {
    let mut core = core_with(vec![]);
    core.set_origin(pt(20.0, 30.0));
    let cursor = pt(420.0, 330.0);
    let before = core.viewport().client_to_stage(cursor, core.origin);
    let actions = core.on_wheel(cursor, WheelDelta { dx: 0.0, dy: -100.0 });
    assert_eq!(actions, vec![Action::RenderNeeded]);
    let after = core.viewport().client_to_stage(cursor, core.origin);
    assert!((before.x - after.x).abs() < 1e-6);
    assert!((before.y - after.y).abs() < 1e-6);
    assert!((core.viewport().scale - 1.08).abs() < 1e-12);
}

#[test]
fn wheel_at_limit_is_noop() {
    let mut core = core_with(vec![]);
    core.viewport.scale = 0.25;
    assert!(core.on_wheel(pt(0.0, 0.0), WheelDelta { dx: 0.0, dy: 10.0 }).is_empty());
    assert!(core.on_wheel(pt(0.0, 0.0), WheelDelta { dx: 4.0, dy: 0.0 }).is_empty());
}

// =============================================================
// Dragging
// =============================================================

#[test]
fn drag_keeps_pointer_offset() {
    let z = make_zone(500.0, 500.0, 50.0);
    let id = z.id;
    let mut core = core_with(vec![z]);

    let actions = core.on_pointer_down(pt(520.0, 510.0), Button::Primary);
    assert!(actions.contains(&Action::ZoneSelected(Some(id))));
    assert_eq!(core.input.dragging_zone(), Some(id));

    core.on_pointer_move(pt(620.0, 610.0));
    assert_eq!(center_of(&core, id), pt(600.0, 600.0));

    let actions = core.on_pointer_up(pt(620.0, 610.0), Button::Primary);
    assert_eq!(core.input, InputState::Idle);
    let [Action::ZoneMoved { id: moved, geometry }] = actions.as_slice() else {
        panic!("expected ZoneMoved, got {actions:?}");
    };
    assert_eq!(*moved, id);
    assert_eq!(geometry.center(), pt(600.0, 600.0));
}

#[test]
fn drag_respects_viewport_transform() {
    let z = make_zone(100.0, 100.0, 40.0);
    let id = z.id;
    let mut core = core_with(vec![z]);
    core.set_origin(pt(10.0, 10.0));
    core.viewport = Viewport { x: 50.0, y: 0.0, scale: 2.0 };

    // stage (100, 100) -> client (100*2 + 50 + 10, 100*2 + 0 + 10)
    core.on_pointer_down(pt(260.0, 210.0), Button::Primary);
    core.on_pointer_move(pt(280.0, 230.0));
    assert_eq!(center_of(&core, id), pt(110.0, 110.0));
}

#[test]
fn drag_clamps_to_stage() {
    let z = make_zone(50.0, 50.0, 30.0);
    let id = z.id;
    let mut core = core_with(vec![z]);
    core.on_pointer_down(pt(50.0, 50.0), Button::Primary);
    core.on_pointer_move(pt(-400.0, 9000.0));
    assert_eq!(center_of(&core, id), pt(0.0, 2200.0));
}

#[test]
fn click_without_move_commits_nothing() {
    let z = make_zone(50.0, 50.0, 30.0);
    let mut core = core_with(vec![z]);
    core.on_pointer_down(pt(50.0, 50.0), Button::Primary);
    assert!(core.on_pointer_up(pt(50.0, 50.0), Button::Primary).is_empty());
}

#[test]
fn drag_updates_connections_live() {
    let a = make_zone(100.0, 100.0, 30.0);
    let b = make_zone(400.0, 100.0, 30.0);
    let (a_id, a_node, b_node) = (a.id, a.node_id.unwrap(), b.node_id.unwrap());
    let mut core = core_with(vec![a, b]);
    core.load_links(vec![make_link(a_node, b_node)]);
    core.on_pointer_down(pt(100.0, 100.0), Button::Primary);
    core.on_pointer_move(pt(100.0, 300.0));
    let line = &core.connections()[0];
    let a_end = if line.from_zone == a_id { line.from } else { line.to };
    assert_eq!(a_end, pt(100.0, 300.0));
}

#[test]
fn primary_down_on_empty_clears_selection() {
    let z = make_zone(50.0, 50.0, 30.0);
    let id = z.id;
    let mut core = core_with(vec![z]);
    core.select(Some(id));
    let actions = core.on_pointer_down(pt(1000.0, 1000.0), Button::Primary);
    assert!(actions.contains(&Action::ZoneSelected(None)));
    assert!(core.selection().is_none());
}

// =============================================================
// Connections
// =============================================================

#[test]
fn context_on_zone_starts_connection() {
    let a = make_zone(100.0, 100.0, 30.0);
    let a_id = a.id;
    let mut core = core_with(vec![a]);
    let actions = core.on_context_menu(pt(100.0, 100.0));
    assert!(actions.contains(&Action::ConnectionStarted { source: a_id }));
    assert_eq!(core.input, InputState::PendingConnection { source: a_id });
}

#[test]
fn context_on_second_zone_requests_link() {
    let a = make_zone(100.0, 100.0, 30.0);
    let b = make_zone(400.0, 100.0, 30.0);
    let (a_id, b_id, a_node, b_node) = (a.id, b.id, a.node_id.unwrap(), b.node_id.unwrap());
    let mut core = core_with(vec![a, b]);
    core.on_context_menu(pt(100.0, 100.0));
    let actions = core.on_context_menu(pt(400.0, 100.0));
    assert!(actions.contains(&Action::LinkRequested { from_zone: a_id, to_zone: b_id, from_node: a_node, to_node: b_node }));
    assert_eq!(core.input, InputState::Idle);
}

#[test]
fn context_on_already_linked_pair_notifies() {
    let a = make_zone(100.0, 100.0, 30.0);
    let b = make_zone(400.0, 100.0, 30.0);
    let (a_node, b_node) = (a.node_id.unwrap(), b.node_id.unwrap());
    let mut core = core_with(vec![a, b]);
    // Existing link in the opposite direction still counts.
    core.load_links(vec![make_link(b_node, a_node)]);
    core.on_context_menu(pt(100.0, 100.0));
    let actions = core.on_context_menu(pt(400.0, 100.0));
    assert!(actions.contains(&Action::Notice(Notice::AlreadyConnected)));
    assert!(!actions.iter().any(|a| matches!(a, Action::LinkRequested { .. })));
    assert_eq!(core.input, InputState::Idle);
}

#[test]
fn context_on_same_zone_cancels() {
    let a = make_zone(100.0, 100.0, 30.0);
    let mut core = core_with(vec![a]);
    core.on_context_menu(pt(100.0, 100.0));
    let actions = core.on_context_menu(pt(105.0, 100.0));
    assert!(actions.contains(&Action::ConnectionCancelled));
    assert_eq!(core.input, InputState::Idle);
}

#[test]
fn context_on_empty_canvas_cancels() {
    let a = make_zone(100.0, 100.0, 30.0);
    let mut core = core_with(vec![a]);
    core.on_context_menu(pt(100.0, 100.0));
    let actions = core.on_context_menu(pt(900.0, 900.0));
    assert!(actions.contains(&Action::ConnectionCancelled));
    assert!(core.pending_connection().is_none());
}

#[test]
fn context_on_empty_canvas_without_pending_is_noop() {
    let mut core = core_with(vec![]);
    assert!(core.on_context_menu(pt(900.0, 900.0)).is_empty());
}

#[test]
fn context_on_zone_without_node_reports_and_keeps_pending() {
    let a = make_zone(100.0, 100.0, 30.0);
    let mut b = make_zone(400.0, 100.0, 30.0);
    b.node_id = None;
    let a_id = a.id;
    let mut core = core_with(vec![a, b]);
    core.on_context_menu(pt(100.0, 100.0));
    let actions = core.on_context_menu(pt(400.0, 100.0));
    assert_eq!(actions, vec![Action::Notice(Notice::NoLinkTarget)]);
    assert_eq!(core.input, InputState::PendingConnection { source: a_id });
}

#[test]
fn drag_does_not_cancel_pending_connection() {
    let a = make_zone(100.0, 100.0, 30.0);
    let b = make_zone(400.0, 100.0, 30.0);
    let (a_id, b_id) = (a.id, b.id);
    let mut core = core_with(vec![a, b]);
    core.on_context_menu(pt(100.0, 100.0));

    core.on_pointer_down(pt(400.0, 100.0), Button::Primary);
    assert_eq!(core.input.dragging_zone(), Some(b_id));
    assert_eq!(core.pending_connection(), Some(a_id));
    core.on_pointer_move(pt(400.0, 300.0));
    core.on_pointer_up(pt(400.0, 300.0), Button::Primary);
    assert_eq!(core.input, InputState::PendingConnection { source: a_id });

    let actions = core.on_context_menu(pt(400.0, 300.0));
    assert!(actions.iter().any(|a| matches!(a, Action::LinkRequested { .. })));
}

#[test]
fn pan_does_not_cancel_pending_connection() {
    let a = make_zone(100.0, 100.0, 30.0);
    let a_id = a.id;
    let mut core = core_with(vec![a]);
    core.on_context_menu(pt(100.0, 100.0));
    core.on_pointer_down(pt(900.0, 900.0), Button::Secondary);
    core.on_pointer_move(pt(950.0, 900.0));
    core.on_pointer_up(pt(950.0, 900.0), Button::Secondary);
    assert_eq!(core.input, InputState::PendingConnection { source: a_id });
}

// =============================================================
// Double-click
// =============================================================

#[test]
fn double_click_on_empty_canvas_spawns_at_stage_point() {
    let mut core = core_with(vec![]);
    let actions = core.on_double_click(pt(800.0, 600.0));
    assert_eq!(actions, vec![Action::SpawnZone { at: pt(800.0, 600.0) }]);
}

#[test]
fn double_click_spawn_point_uses_viewport() {
    let mut core = core_with(vec![]);
    core.viewport = Viewport { x: -100.0, y: 50.0, scale: 0.5 };
    let actions = core.on_double_click(pt(300.0, 350.0));
    assert_eq!(actions, vec![Action::SpawnZone { at: pt(800.0, 600.0) }]);
}

#[test]
fn double_click_on_zone_enters_node() {
    let z = make_zone(100.0, 100.0, 30.0);
    let (id, node) = (z.id, z.node_id.unwrap());
    let mut core = core_with(vec![z]);
    assert_eq!(core.on_double_click(pt(100.0, 100.0)), vec![Action::EnterNode { zone_id: id, node_id: node }]);
}

#[test]
fn double_click_on_nodeless_zone_notifies() {
    let mut z = make_zone(100.0, 100.0, 30.0);
    z.node_id = None;
    let mut core = core_with(vec![z]);
    assert_eq!(core.on_double_click(pt(100.0, 100.0)), vec![Action::Notice(Notice::NoNodeToEnter)]);
}

// =============================================================
// Refresh
// =============================================================

#[test]
fn reload_preserves_active_drag_position() {
    let z = make_zone(100.0, 100.0, 30.0);
    let id = z.id;
    let stale = z.clone();
    let mut core = core_with(vec![z]);
    core.on_pointer_down(pt(100.0, 100.0), Button::Primary);
    core.on_pointer_move(pt(300.0, 300.0));

    core.load_zones(vec![stale.clone()]);
    assert_eq!(center_of(&core, id), pt(300.0, 300.0));

    core.apply_zone(stale);
    assert_eq!(center_of(&core, id), pt(300.0, 300.0));
}

#[test]
fn reload_drops_references_to_removed_zones() {
    let a = make_zone(100.0, 100.0, 30.0);
    let b = make_zone(400.0, 100.0, 30.0);
    let a_id = a.id;
    let keep = b.clone();
    let mut core = core_with(vec![a, b]);
    core.select(Some(a_id));
    core.on_context_menu(pt(100.0, 100.0));

    core.load_zones(vec![keep]);
    assert!(core.selection().is_none());
    assert!(core.pending_connection().is_none());
    assert_eq!(core.input, InputState::Idle);
}

#[test]
fn removing_dragged_zone_ends_drag() {
    let z = make_zone(100.0, 100.0, 30.0);
    let id = z.id;
    let mut core = core_with(vec![z]);
    core.on_pointer_down(pt(100.0, 100.0), Button::Primary);
    core.remove_zone(&id);
    assert_eq!(core.input, InputState::Idle);
    assert!(core.on_pointer_up(pt(0.0, 0.0), Button::Primary).is_empty());
}

#[test]
fn apply_and_remove_link_recompute_connections() {
    let a = make_zone(100.0, 100.0, 30.0);
    let b = make_zone(400.0, 100.0, 30.0);
    let link = make_link(a.node_id.unwrap(), b.node_id.unwrap());
    let link_id = link.id;
    let mut core = core_with(vec![a, b]);
    core.apply_link(link);
    assert_eq!(core.connections().len(), 1);
    assert_eq!(core.links().len(), 1);
    core.remove_link(&link_id);
    assert!(core.connections().is_empty());
}

#[test]
fn select_unknown_zone_is_ignored() {
    let mut core = core_with(vec![]);
    assert!(core.select(Some(Uuid::new_v4())).is_empty());
    assert!(core.selection().is_none());
}

#[test]
fn notice_messages() {
    assert_eq!(Notice::AlreadyConnected.message(), "already connected");
    assert_eq!(Notice::NoLinkTarget.message(), "no target node to link");
}
