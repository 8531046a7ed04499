//! Zone lifecycle: spawning, entering nodes, and linking.
//!
//! DESIGN
//! ======
//! Spawning a zone is three store calls: create the identity node under the
//! map's node, ensure that node has a map, insert the zone row. There is no
//! cross-call transaction, so a failure at any step deletes whatever the
//! earlier steps created before the error is returned.

#[cfg(test)]
#[path = "zones_test.rs"]
mod zones_test;

use std::sync::Arc;

use canvas::camera::Point;
use canvas::consts::PALETTE;
use canvas::doc::{CampaignId, Link, LinkId, NodeId, Zone, ZoneAction};
use canvas::geometry::{Geometry, ZoneShape};
use canvas::graph;
use rand::Rng;
use tracing::{error, info};

use crate::bus::{SyncBus, Topic};
use crate::error::SyncError;
use crate::store::{MapRow, NewLink, NewZone, NodeRow, Store, StoreError};

/// Title given to nodes created by spawning a zone.
pub const NEW_ZONE_TITLE: &str = "New location";
/// Link type used for references and connector lines.
pub const REFERENCE_KIND: &str = "reference";

/// A random palette color for a new zone.
#[must_use]
pub fn pick_palette_color() -> &'static str {
    PALETTE[rand::rng().random_range(0..PALETTE.len())]
}

/// Everything a successful spawn created.
#[derive(Debug, Clone, PartialEq)]
pub struct Spawned {
    pub node: NodeRow,
    /// The new node's own map.
    pub map: MapRow,
    pub zone: Zone,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LinkOutcome {
    Created(Link),
    /// The nodes were already linked in some direction; nothing was written.
    AlreadyLinked,
}

pub struct Zones {
    store: Arc<dyn Store>,
    bus: SyncBus,
}

impl Zones {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, bus: SyncBus) -> Self {
        Self { store, bus }
    }

    /// The map bound to `node`, created on first use.
    ///
    /// # Errors
    ///
    /// Returns the store error.
    pub async fn ensure_map(&self, node: &NodeRow) -> Result<MapRow, SyncError> {
        if let Some(map) = self.store.find_map_for_node(node.id).await? {
            return Ok(map);
        }
        match self.store.create_map(node.campaign_id, node.id, &node.title).await {
            Ok(map) => {
                info!(node_id = %node.id, map_id = %map.id, "map created for node");
                Ok(map)
            }
            // Lost a race with another surface creating the same map.
            Err(StoreError::Conflict(_)) => self
                .store
                .find_map_for_node(node.id)
                .await?
                .ok_or(SyncError::Store(StoreError::NotFound { entity: "map", id: node.id })),
            Err(e) => Err(e.into()),
        }
    }

    /// Resolve a node to open and its map.
    ///
    /// # Errors
    ///
    /// Returns the store error.
    pub async fn enter_node(&self, node_id: NodeId) -> Result<(NodeRow, MapRow), SyncError> {
        let node = self.store.get_node(node_id).await?;
        let map = self.ensure_map(&node).await?;
        Ok((node, map))
    }

    /// Create a zone, its identity node, and the node's map, centered at `at`.
    ///
    /// # Errors
    ///
    /// Returns the first store error after removing anything already created.
    pub async fn spawn_zone(
        &self,
        host: &MapRow,
        at: Point,
        color: &str,
        sort_index: i64,
    ) -> Result<Spawned, SyncError> {
        let node = self.store.create_node(host.campaign_id, host.node_id, NEW_ZONE_TITLE).await?;

        let map = match self.ensure_map(&node).await {
            Ok(map) => map,
            Err(e) => {
                self.discard_node(&node).await;
                return Err(e);
            }
        };

        let new_zone = NewZone {
            campaign_id: host.campaign_id,
            map_id: host.id,
            node_id: Some(node.id),
            target_node_id: None,
            shape: ZoneShape::Circle(Geometry::at(at, color)),
            is_visible: false,
            action: ZoneAction::OpenNode,
            sort_index,
        };
        let zone = match self.store.insert_zone(new_zone).await {
            Ok(zone) => zone,
            Err(e) => {
                if let Err(cleanup) = self.store.delete_map(map.id).await {
                    error!(map_id = %map.id, error = %cleanup, "failed to remove map after aborted spawn");
                }
                self.discard_node(&node).await;
                return Err(e.into());
            }
        };

        info!(zone_id = %zone.id, node_id = %node.id, map_id = %host.id, "zone spawned");
        self.bus.publish(host.campaign_id, Topic::Zones);
        Ok(Spawned { node, map, zone })
    }

    async fn discard_node(&self, node: &NodeRow) {
        if let Err(e) = self.store.delete_node(node.id).await {
            error!(node_id = %node.id, error = %e, "failed to remove node after aborted spawn");
        }
    }

    /// Link `from` to `to` unless they are already linked either way.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Validation`] for a self-link, otherwise the store error.
    pub async fn link_nodes(
        &self,
        campaign_id: CampaignId,
        from: NodeId,
        to: NodeId,
        label: Option<String>,
    ) -> Result<LinkOutcome, SyncError> {
        if from == to {
            return Err(SyncError::Validation("a node cannot reference itself".into()));
        }
        let links = self.store.list_links(campaign_id).await?;
        if graph::are_linked(&links, from, to) {
            return Ok(LinkOutcome::AlreadyLinked);
        }

        let link = self
            .store
            .create_link(NewLink {
                campaign_id,
                from_node_id: from,
                to_node_id: to,
                kind: REFERENCE_KIND.to_owned(),
                label: label.map(|l| l.trim().to_owned()).filter(|l| !l.is_empty()),
            })
            .await?;
        info!(link_id = %link.id, %from, %to, "link created");
        self.bus.publish(campaign_id, Topic::Links);
        Ok(LinkOutcome::Created(link))
    }

    /// Delete a link.
    ///
    /// # Errors
    ///
    /// Returns the store error.
    pub async fn remove_link(&self, campaign_id: CampaignId, link_id: LinkId) -> Result<(), SyncError> {
        self.store.delete_link(link_id).await?;
        info!(%link_id, "link removed");
        self.bus.publish(campaign_id, Topic::Links);
        Ok(())
    }

    /// Outgoing references of `node`, in list order.
    ///
    /// # Errors
    ///
    /// Returns the store error.
    pub async fn references(&self, campaign_id: CampaignId, node: NodeId) -> Result<Vec<Link>, SyncError> {
        let links = self.store.list_links(campaign_id).await?;
        Ok(graph::references(&links, node).into_iter().cloned().collect())
    }
}
