#![allow(clippy::float_cmp)]

use super::*;

const EPSILON: f64 = 1e-9;

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}

fn point_approx_eq(a: Point, b: Point) -> bool {
    approx_eq(a.x, b.x) && approx_eq(a.y, b.y)
}

fn origin() -> Point {
    Point::new(40.0, 64.0)
}

// --- Viewport defaults ---

#[test]
fn viewport_default_is_identity() {
    let view = Viewport::default();
    assert_eq!(view.x, 0.0);
    assert_eq!(view.y, 0.0);
    assert_eq!(view.scale, 1.0);
}

// --- client_to_stage ---

#[test]
fn client_to_stage_subtracts_origin() {
    let view = Viewport::default();
    let stage = view.client_to_stage(Point::new(140.0, 164.0), origin());
    assert!(point_approx_eq(stage, Point::new(100.0, 100.0)));
}

#[test]
fn client_to_stage_with_pan_and_scale() {
    let view = Viewport { x: 20.0, y: 10.0, scale: 2.0 };
    // local (60, 74) - (20, 10) = (40, 64), / 2 = (20, 32)
    let stage = view.client_to_stage(Point::new(100.0, 138.0), origin());
    assert!(point_approx_eq(stage, Point::new(30.0, 37.0)));
}

#[test]
fn round_trip_stage_client_stage() {
    let views = [
        Viewport::default(),
        Viewport { x: -350.5, y: 812.25, scale: 0.25 },
        Viewport { x: 13.0, y: -7.0, scale: 2.5 },
        Viewport { x: 1e4, y: -1e4, scale: 1.33 },
    ];
    let points = [Point::new(0.0, 0.0), Point::new(3200.0, 2200.0), Point::new(812.3, 17.9), Point::new(-40.0, 5000.0)];
    for view in views {
        for p in points {
            let back = view.client_to_stage(view.stage_to_client(p, origin()), origin());
            assert!(point_approx_eq(back, p), "{view:?} {p:?} -> {back:?}");
        }
    }
}

// --- pan ---

#[test]
fn pan_adds_pointer_delta_to_start_translate() {
    let start = Viewport { x: 10.0, y: 20.0, scale: 1.5 };
    let view = start.panned(Point::new(100.0, 100.0), Point::new(130.0, 80.0));
    assert_eq!(view.x, 40.0);
    assert_eq!(view.y, 0.0);
    assert_eq!(view.scale, 1.5);
}

// --- zoom ---

#[test]
fn zoom_direction_from_wheel() {
    assert_eq!(ZoomDirection::from_wheel_dy(-3.0), Some(ZoomDirection::In));
    assert_eq!(ZoomDirection::from_wheel_dy(5.0), Some(ZoomDirection::Out));
    assert_eq!(ZoomDirection::from_wheel_dy(0.0), None);
}

#[test]
fn zoom_in_steps_scale() {
    let view = Viewport::default().zoomed_at(Point::new(0.0, 0.0), ZoomDirection::In);
    assert!(approx_eq(view.scale, 1.08));
}

#[test]
fn zoom_keeps_world_point_under_cursor() {
    let cursors = [Point::new(0.0, 0.0), Point::new(512.0, 384.0), Point::new(-20.0, 999.0)];
    let mut view = Viewport { x: -120.0, y: 45.0, scale: 1.0 };
    for direction in [ZoomDirection::In, ZoomDirection::In, ZoomDirection::Out, ZoomDirection::In] {
        for cursor in cursors {
            let before_x = (cursor.x - view.x) / view.scale;
            let before_y = (cursor.y - view.y) / view.scale;
            let next = view.zoomed_at(cursor, direction);
            let after_x = (cursor.x - next.x) / next.scale;
            let after_y = (cursor.y - next.y) / next.scale;
            assert!((before_x - after_x).abs() < 1e-6);
            assert!((before_y - after_y).abs() < 1e-6);
        }
        view = view.zoomed_at(Point::new(300.0, 200.0), direction);
    }
}

#[test]
fn zoom_clamps_to_max() {
    let mut view = Viewport::default();
    for _ in 0..40 {
        view = view.zoomed_at(Point::new(10.0, 10.0), ZoomDirection::In);
    }
    assert!(approx_eq(view.scale, 2.5));
}

#[test]
fn zoom_clamps_to_min() {
    let mut view = Viewport::default();
    for _ in 0..40 {
        view = view.zoomed_at(Point::new(10.0, 10.0), ZoomDirection::Out);
    }
    assert!(approx_eq(view.scale, 0.25));
}

#[test]
fn zoom_at_limit_returns_previous_state() {
    let view = Viewport { x: 7.0, y: 9.0, scale: 2.5 };
    let next = view.zoomed_at(Point::new(100.0, 100.0), ZoomDirection::In);
    assert_eq!(next, view);
}

