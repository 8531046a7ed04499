use serde_json::json;

use super::*;

#[test]
fn non_database_errors_are_remote() {
    let err = StoreError::from(sqlx::Error::PoolTimedOut);
    assert!(matches!(err, StoreError::Remote(_)));
}

#[test]
fn zone_row_decodes_shape_and_action() {
    let id = Uuid::new_v4();
    let map_id = Uuid::new_v4();
    let zone = zone_from_row((
        id,
        map_id,
        None,
        None,
        "circle".into(),
        json!({ "x": 10_000.0, "y": "bad", "radius": 40.0 }),
        true,
        "open_map".into(),
        3,
    ));
    assert_eq!(zone.id, id);
    assert_eq!(zone.action, ZoneAction::OpenMap);
    let g = zone.geometry().unwrap();
    assert!((g.x - 3200.0).abs() < f64::EPSILON);
    assert!((g.y - 1100.0).abs() < f64::EPSILON);
    assert!((g.radius - 40.0).abs() < f64::EPSILON);
}

#[test]
fn unknown_shape_kinds_are_kept_verbatim() {
    let raw = json!({ "points": [[0, 0], [1, 1]] });
    let zone = zone_from_row((Uuid::nil(), Uuid::nil(), None, None, "polygon".into(), raw.clone(), false, "bogus".into(), 0));
    assert!(!zone.shape.is_rendered());
    assert_eq!(zone.shape.to_value(), raw);
    assert_eq!(zone.action, ZoneAction::None);
}

#[test]
fn trashed_row_carries_tombstone() {
    let actor = Uuid::new_v4();
    let at = OffsetDateTime::UNIX_EPOCH;
    let trashed = trashed_from_row((
        Uuid::nil(),
        Uuid::nil(),
        Some(actor),
        None,
        "rect".into(),
        json!({}),
        false,
        "open_node".into(),
        0,
        at,
        Some(actor),
    ));
    assert_eq!(trashed.tombstone, Tombstone { at, by: Some(actor) });
    assert_eq!(trashed.zone.identity_node(), Some(actor));
}
