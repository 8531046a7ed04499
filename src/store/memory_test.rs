use std::sync::Arc;

use canvas::camera::Point;
use canvas::doc::ZoneAction;
use canvas::geometry::{Geometry, ZoneShape};

use super::*;

async fn seeded() -> (MemoryStore, CampaignId, MapRow) {
    let store = MemoryStore::new();
    let campaign = Uuid::new_v4();
    let node = store.create_node(campaign, None, "Root").await.unwrap();
    let map = store.create_map(campaign, node.id, "World").await.unwrap();
    (store, campaign, map)
}

fn new_zone(campaign: CampaignId, map: &MapRow, sort_index: i64) -> NewZone {
    NewZone {
        campaign_id: campaign,
        map_id: map.id,
        node_id: None,
        target_node_id: None,
        shape: ZoneShape::Circle(Geometry::default()),
        is_visible: false,
        action: ZoneAction::OpenNode,
        sort_index,
    }
}

#[tokio::test]
async fn create_map_is_unique_per_node() {
    let (store, campaign, map) = seeded().await;
    let node = map.node_id.unwrap();
    let err = store.create_map(campaign, node, "Again").await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
    assert_eq!(store.find_map_for_node(node).await.unwrap(), Some(map));
}

#[tokio::test]
async fn insert_zone_clamps_geometry() {
    let (store, campaign, map) = seeded().await;
    let mut zone = new_zone(campaign, &map, 0);
    zone.shape = ZoneShape::Circle(Geometry { x: 99_999.0, radius: 1.0, ..Geometry::default() });
    let row = store.insert_zone(zone).await.unwrap();
    let g = row.geometry().unwrap();
    assert!((g.x - 3200.0).abs() < f64::EPSILON);
    assert!((g.radius - 16.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn list_zones_is_sorted_and_excludes_tombstoned() {
    let (store, campaign, map) = seeded().await;
    let late = store.insert_zone(new_zone(campaign, &map, 5)).await.unwrap();
    let early = store.insert_zone(new_zone(campaign, &map, 1)).await.unwrap();
    let trashed = store.insert_zone(new_zone(campaign, &map, 3)).await.unwrap();
    store.soft_delete_zone(trashed.id, None).await.unwrap();

    let ids: Vec<ZoneId> = store.list_zones(map.id).await.unwrap().iter().map(|z| z.id).collect();
    assert_eq!(ids, vec![early.id, late.id]);

    let bin = store.list_trashed_zones(map.id).await.unwrap();
    assert_eq!(bin.len(), 1);
    assert_eq!(bin[0].zone.id, trashed.id);
}

#[tokio::test]
async fn restore_clears_tombstone() {
    let (store, campaign, map) = seeded().await;
    let zone = store.insert_zone(new_zone(campaign, &map, 0)).await.unwrap();
    let actor = Uuid::new_v4();
    store.soft_delete_zone(zone.id, Some(actor)).await.unwrap();
    assert_eq!(store.list_trashed_zones(map.id).await.unwrap()[0].tombstone.by, Some(actor));

    store.restore_zone(zone.id).await.unwrap();
    assert_eq!(store.list_zones(map.id).await.unwrap().len(), 1);
    assert!(store.list_trashed_zones(map.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn center_patch_moves_only_the_position() {
    let (store, campaign, map) = seeded().await;
    let mut styled = new_zone(campaign, &map, 0);
    styled.shape = ZoneShape::Rect(Geometry { radius: 90.0, color: "#10b981".into(), icon: "A".into(), ..Geometry::default() });
    let zone = store.insert_zone(styled).await.unwrap();

    let patch = ZonePatch { center: Some(Point::new(-40.0, 700.0)), ..ZonePatch::default() };
    let row = store.update_zone(zone.id, &patch).await.unwrap();

    assert_eq!(row.shape.kind(), "rect");
    let g = row.geometry().unwrap();
    assert_eq!(g.center(), Point::new(0.0, 700.0));
    assert!((g.radius - 90.0).abs() < f64::EPSILON);
    assert_eq!((g.color.as_str(), g.icon.as_str()), ("#10b981", "A"));
}

#[tokio::test]
async fn update_zone_rejects_tombstoned_rows() {
    let (store, campaign, map) = seeded().await;
    let zone = store.insert_zone(new_zone(campaign, &map, 0)).await.unwrap();
    store.soft_delete_zone(zone.id, None).await.unwrap();
    let patch = ZonePatch { is_visible: Some(true), ..ZonePatch::default() };
    let err = store.update_zone(zone.id, &patch).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { entity: "zone", .. }));
}

#[tokio::test]
async fn missing_tombstone_columns_fail_soft_delete_only() {
    let (store, campaign, map) = seeded().await;
    let zone = store.insert_zone(new_zone(campaign, &map, 0)).await.unwrap();
    store.drop_tombstone_columns().await;

    let err = store.soft_delete_zone(zone.id, None).await.unwrap_err();
    assert!(err.is_missing_tombstone());
    assert!(store.list_trashed_zones(map.id).await.unwrap_err().is_missing_tombstone());

    store.hard_delete_zone(zone.id).await.unwrap();
    assert!(store.list_zones(map.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn fail_next_applies_once() {
    let (store, _, map) = seeded().await;
    store.fail_next(Op::UpdateMap, StoreError::Remote("boom".into())).await;
    assert_eq!(store.update_map(map.id, "A").await.unwrap_err(), StoreError::Remote("boom".into()));
    assert_eq!(store.update_map(map.id, " B ").await.unwrap().name, "B");
    assert_eq!(store.calls(Op::UpdateMap).await, 2);
}

#[tokio::test]
async fn mutations_count_writes_only() {
    let (store, _, map) = seeded().await;
    let before = store.mutations().await;
    store.list_zones(map.id).await.unwrap();
    store.get_map(map.id).await.unwrap();
    assert_eq!(store.mutations().await, before);
    store.update_map(map.id, "Renamed").await.unwrap();
    assert_eq!(store.mutations().await, before + 1);
}

#[tokio::test]
async fn paused_writes_hold_until_resumed() {
    let (store, _, map) = seeded().await;
    let store = Arc::new(store);
    store.pause_writes();

    let handle = tokio::spawn({
        let store = Arc::clone(&store);
        async move { store.update_map(map.id, "Held").await }
    });
    tokio::task::yield_now().await;
    assert!(!handle.is_finished());
    assert_eq!(store.calls(Op::UpdateMap).await, 1);

    // Reads are never held.
    store.get_map(map.id).await.unwrap();

    store.resume_writes();
    assert_eq!(handle.await.unwrap().unwrap().name, "Held");
}

#[tokio::test]
async fn delete_node_cascades() {
    let (store, campaign, map) = seeded().await;
    let parent = map.node_id.unwrap();
    let child = store.create_node(campaign, Some(parent), "Child").await.unwrap();
    assert_eq!(child.sort_index, 0);
    store
        .create_link(NewLink {
            campaign_id: campaign,
            from_node_id: parent,
            to_node_id: child.id,
            kind: "reference".into(),
            label: None,
        })
        .await
        .unwrap();
    let mut zone = new_zone(campaign, &map, 0);
    zone.node_id = Some(child.id);
    let zone = store.insert_zone(zone).await.unwrap();

    store.delete_node(child.id).await.unwrap();
    assert!(store.list_links(campaign).await.unwrap().is_empty());
    let zones = store.list_zones(map.id).await.unwrap();
    assert_eq!(zones[0].id, zone.id);
    assert_eq!(zones[0].node_id, None);
}

#[tokio::test]
async fn create_link_appends_sort_index_per_source() {
    let (store, campaign, map) = seeded().await;
    let from = map.node_id.unwrap();
    let a = store.create_node(campaign, None, "A").await.unwrap();
    let b = store.create_node(campaign, None, "B").await.unwrap();
    let link = |to| NewLink { campaign_id: campaign, from_node_id: from, to_node_id: to, kind: "reference".into(), label: None };
    let first = store.create_link(link(a.id)).await.unwrap();
    let second = store.create_link(link(b.id)).await.unwrap();
    assert_eq!((first.sort_index, second.sort_index), (0, 1));

    store.delete_link(first.id).await.unwrap();
    assert!(matches!(store.delete_link(first.id).await, Err(StoreError::NotFound { .. })));
}

#[tokio::test]
async fn save_document_upserts_by_node() {
    let (store, campaign, map) = seeded().await;
    let node = map.node_id.unwrap();
    assert!(store.load_document(node).await.unwrap().is_none());

    let draft = DocumentDraft { title: " Notes ".into(), body: "<p>x</p>".into() };
    let first = store.save_document(campaign, node, &draft).await.unwrap();
    assert_eq!(first.title, "Notes");
    let second = store.save_document(campaign, node, &DocumentDraft::default()).await.unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(store.load_document(node).await.unwrap(), Some(second));
}
