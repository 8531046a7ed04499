use canvas::camera::Point;

use super::*;
use crate::bus::Topic;
use crate::config::SoftDeleteMode;
use crate::test_helpers::fixture;

#[tokio::test]
async fn trash_and_zones_share_the_bus() {
    let fx = fixture().await;
    let state = AppState::new(fx.dyn_store(), Config::default());
    let mut sub = state.bus.subscribe(fx.campaign_id);

    let (_, zone) = fx.seed_zone("Harbor", Point::new(10.0, 10.0)).await;
    state.trash.delete_zone(fx.campaign_id, zone.id, None).await.unwrap();
    assert_eq!(sub.try_recv().map(|s| s.topic), Some(Topic::Zones));

    state.zones().link_nodes(fx.campaign_id, fx.root.id, zone.node_id.unwrap(), None).await.unwrap();
    assert_eq!(sub.try_recv().map(|s| s.topic), Some(Topic::Links));
}

#[tokio::test]
async fn soft_delete_latch_is_shared_between_clones() {
    let fx = fixture().await;
    fx.store.drop_tombstone_columns().await;
    let state = AppState::new(fx.dyn_store(), Config { soft_delete: SoftDeleteMode::Auto, ..Config::default() });
    let other = state.clone();

    let (_, zone) = fx.seed_zone("Harbor", Point::new(10.0, 10.0)).await;
    state.trash.delete_zone(fx.campaign_id, zone.id, None).await.unwrap();
    assert!(!other.trash.soft_delete_enabled());
}
