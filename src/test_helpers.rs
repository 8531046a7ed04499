//! Shared fixtures for service and session tests.

use std::sync::Arc;

use canvas::camera::Point;
use canvas::doc::{CampaignId, Link, NodeId, Zone, ZoneAction};
use canvas::geometry::{Geometry, ZoneShape};
use uuid::Uuid;

use crate::store::memory::MemoryStore;
use crate::store::{MapRow, NewLink, NewZone, NodeRow, Store};

/// A campaign with one root node and its map, backed by a [`MemoryStore`].
pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub campaign_id: CampaignId,
    pub root: NodeRow,
    pub map: MapRow,
}

pub async fn fixture() -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let campaign_id = Uuid::new_v4();
    let root = store.create_node(campaign_id, None, "Campaign").await.unwrap();
    let map = store.create_map(campaign_id, root.id, "World").await.unwrap();
    Fixture { store, campaign_id, root, map }
}

impl Fixture {
    pub fn dyn_store(&self) -> Arc<dyn Store> {
        Arc::clone(&self.store) as Arc<dyn Store>
    }

    /// Create a child node and a circle zone for it at `at`.
    pub async fn seed_zone(&self, title: &str, at: Point) -> (NodeRow, Zone) {
        let node = self.store.create_node(self.campaign_id, Some(self.root.id), title).await.unwrap();
        let zone = self.seed_zone_for(Some(node.id), at).await;
        (node, zone)
    }

    pub async fn seed_zone_for(&self, node_id: Option<NodeId>, at: Point) -> Zone {
        let sort_index = i64::try_from(self.store.list_zones(self.map.id).await.unwrap().len()).unwrap();
        self.store
            .insert_zone(NewZone {
                campaign_id: self.campaign_id,
                map_id: self.map.id,
                node_id,
                target_node_id: None,
                shape: ZoneShape::Circle(Geometry::at(at, "#4f46e5")),
                is_visible: false,
                action: ZoneAction::OpenNode,
                sort_index,
            })
            .await
            .unwrap()
    }

    pub async fn link(&self, from: NodeId, to: NodeId) -> Link {
        self.store
            .create_link(NewLink {
                campaign_id: self.campaign_id,
                from_node_id: from,
                to_node_id: to,
                kind: "reference".into(),
                label: None,
            })
            .await
            .unwrap()
    }
}
