use serde_json::json;
use uuid::Uuid;

use super::*;
use crate::doc::ZoneAction;
use crate::geometry::Geometry;

fn zone_at(shape: fn(Geometry) -> ZoneShape, x: f64, y: f64, radius: f64, sort_index: i64) -> Zone {
    Zone {
        id: Uuid::new_v4(),
        map_id: Uuid::new_v4(),
        node_id: Some(Uuid::new_v4()),
        target_node_id: None,
        shape: shape(Geometry { x, y, radius, ..Geometry::default() }),
        is_visible: true,
        action: ZoneAction::OpenNode,
        sort_index,
    }
}

#[test]
fn circle_contains_points_within_radius() {
    let z = zone_at(ZoneShape::Circle, 100.0, 100.0, 20.0, 0);
    assert!(zone_contains(&z, Point::new(100.0, 100.0)));
    assert!(zone_contains(&z, Point::new(120.0, 100.0)));
    assert!(!zone_contains(&z, Point::new(115.0, 115.0)));
}

#[test]
fn rect_contains_corners() {
    let z = zone_at(ZoneShape::Rect, 100.0, 100.0, 20.0, 0);
    assert!(zone_contains(&z, Point::new(115.0, 115.0)));
    assert!(zone_contains(&z, Point::new(80.0, 120.0)));
    assert!(!zone_contains(&z, Point::new(121.0, 100.0)));
}

#[test]
fn other_shapes_are_never_hit() {
    let mut z = zone_at(ZoneShape::Circle, 100.0, 100.0, 20.0, 0);
    z.shape = ZoneShape::Other { kind: "polygon".into(), raw: json!({ "x": 100, "y": 100 }) };
    assert!(!zone_contains(&z, Point::new(100.0, 100.0)));
}

#[test]
fn hit_test_empty_store_is_none() {
    assert!(hit_test(Point::new(0.0, 0.0), &ZoneStore::new()).is_none());
}

#[test]
fn hit_test_prefers_topmost() {
    let mut store = ZoneStore::new();
    let below = zone_at(ZoneShape::Circle, 100.0, 100.0, 40.0, 0);
    let above = zone_at(ZoneShape::Circle, 110.0, 100.0, 40.0, 5);
    let above_id = above.id;
    let below_id = below.id;
    store.insert(below);
    store.insert(above);
    assert_eq!(hit_test(Point::new(105.0, 100.0), &store), Some(above_id));
    assert_eq!(hit_test(Point::new(65.0, 100.0), &store), Some(below_id));
    assert_eq!(hit_test(Point::new(500.0, 500.0), &store), None);
}
