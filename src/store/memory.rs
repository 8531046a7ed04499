//! In-process [`Store`] used by tests and local demos.
//!
//! Besides the plain tables it carries fault injection: fail the next call of
//! an operation, pretend the tombstone columns were never migrated, hold
//! writes in flight, and count how many mutations reached the store.

#[cfg(test)]
#[path = "memory_test.rs"]
mod memory_test;

use std::collections::HashMap;

use async_trait::async_trait;
use canvas::doc::{CampaignId, Link, LinkId, MapId, NodeId, Zone, ZoneId};
use canvas::draft::DocumentDraft;
use time::OffsetDateTime;
use tokio::sync::{Mutex, watch};
use uuid::Uuid;

use super::{
    DocumentRow, MapRow, NewLink, NewZone, NodeRow, Store, StoreError, Tombstone, TrashedZone, UserId, ZonePatch,
};

/// Store operations, used to target fault injection and read counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    GetNode,
    CreateNode,
    RenameNode,
    DeleteNode,
    FindMap,
    CreateMap,
    GetMap,
    UpdateMap,
    DeleteMap,
    ListZones,
    ListTrashedZones,
    InsertZone,
    UpdateZone,
    SoftDeleteZone,
    HardDeleteZone,
    RestoreZone,
    ListLinks,
    CreateLink,
    DeleteLink,
    LoadDocument,
    SaveDocument,
}

impl Op {
    /// Whether this operation writes.
    #[must_use]
    pub fn is_mutation(self) -> bool {
        !matches!(
            self,
            Self::GetNode
                | Self::FindMap
                | Self::GetMap
                | Self::ListZones
                | Self::ListTrashedZones
                | Self::ListLinks
                | Self::LoadDocument
        )
    }
}

#[derive(Default)]
struct Tables {
    nodes: HashMap<NodeId, NodeRow>,
    maps: HashMap<MapId, MapRow>,
    zones: HashMap<ZoneId, (Zone, Option<Tombstone>)>,
    links: Vec<Link>,
    documents: HashMap<NodeId, DocumentRow>,
}

#[derive(Default)]
struct Faults {
    fail_next: HashMap<Op, StoreError>,
    calls: HashMap<Op, usize>,
    tombstones_missing: bool,
}

pub struct MemoryStore {
    tables: Mutex<Tables>,
    faults: Mutex<Faults>,
    writes_paused: watch::Sender<bool>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        let (writes_paused, _) = watch::channel(false);
        Self { tables: Mutex::new(Tables::default()), faults: Mutex::new(Faults::default()), writes_paused }
    }

    /// Make the next call of `op` fail with `error`.
    pub async fn fail_next(&self, op: Op, error: StoreError) {
        self.faults.lock().await.fail_next.insert(op, error);
    }

    /// Simulate a schema without the `deleted_at`/`deleted_by` columns.
    pub async fn drop_tombstone_columns(&self) {
        self.faults.lock().await.tombstones_missing = true;
    }

    /// Hold every write at its suspension point until [`Self::resume_writes`].
    pub fn pause_writes(&self) {
        self.writes_paused.send_replace(true);
    }

    pub fn resume_writes(&self) {
        self.writes_paused.send_replace(false);
    }

    /// How many times `op` reached the store.
    pub async fn calls(&self, op: Op) -> usize {
        self.faults.lock().await.calls.get(&op).copied().unwrap_or(0)
    }

    /// Total writes that reached the store.
    pub async fn mutations(&self) -> usize {
        let faults = self.faults.lock().await;
        faults.calls.iter().filter(|(op, _)| op.is_mutation()).map(|(_, n)| n).sum()
    }

    /// Record the call, apply any injected failure, and hold paused writes.
    async fn begin(&self, op: Op) -> Result<(), StoreError> {
        let injected = {
            let mut faults = self.faults.lock().await;
            *faults.calls.entry(op).or_insert(0) += 1;
            faults.fail_next.remove(&op)
        };

        if op.is_mutation() {
            let mut paused = self.writes_paused.subscribe();
            if paused.wait_for(|p| !*p).await.is_err() {
                return Err(StoreError::Remote("store closed".into()));
            }
        }

        match injected {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn tombstones_missing(&self) -> bool {
        self.faults.lock().await.tombstones_missing
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn missing_tombstone() -> StoreError {
    StoreError::from_message(r#"column "deleted_at" of relation "map_zones" does not exist"#)
}

fn sorted(mut zones: Vec<Zone>) -> Vec<Zone> {
    zones.sort_by(|a, b| a.sort_index.cmp(&b.sort_index).then_with(|| a.id.cmp(&b.id)));
    zones
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_node(&self, id: NodeId) -> Result<NodeRow, StoreError> {
        self.begin(Op::GetNode).await?;
        let tables = self.tables.lock().await;
        tables.nodes.get(&id).cloned().ok_or(StoreError::NotFound { entity: "node", id })
    }

    async fn create_node(
        &self,
        campaign_id: CampaignId,
        parent_id: Option<NodeId>,
        title: &str,
    ) -> Result<NodeRow, StoreError> {
        self.begin(Op::CreateNode).await?;
        let mut tables = self.tables.lock().await;
        if let Some(parent) = parent_id {
            if !tables.nodes.contains_key(&parent) {
                return Err(StoreError::NotFound { entity: "node", id: parent });
            }
        }
        let siblings = tables.nodes.values().filter(|n| n.parent_id == parent_id).count();
        let node = NodeRow {
            id: Uuid::new_v4(),
            campaign_id,
            parent_id,
            title: title.trim().to_owned(),
            sort_index: i64::try_from(siblings).unwrap_or(i64::MAX),
        };
        tables.nodes.insert(node.id, node.clone());
        Ok(node)
    }

    async fn rename_node(&self, id: NodeId, title: &str) -> Result<NodeRow, StoreError> {
        self.begin(Op::RenameNode).await?;
        let mut tables = self.tables.lock().await;
        let node = tables.nodes.get_mut(&id).ok_or(StoreError::NotFound { entity: "node", id })?;
        node.title = title.trim().to_owned();
        Ok(node.clone())
    }

    async fn delete_node(&self, id: NodeId) -> Result<(), StoreError> {
        self.begin(Op::DeleteNode).await?;
        let mut tables = self.tables.lock().await;
        if tables.nodes.remove(&id).is_none() {
            return Err(StoreError::NotFound { entity: "node", id });
        }
        tables.maps.retain(|_, m| m.node_id != Some(id));
        tables.links.retain(|l| l.from_node_id != id && l.to_node_id != id);
        tables.documents.remove(&id);
        for (zone, _) in tables.zones.values_mut() {
            if zone.node_id == Some(id) {
                zone.node_id = None;
            }
            if zone.target_node_id == Some(id) {
                zone.target_node_id = None;
            }
        }
        Ok(())
    }

    async fn find_map_for_node(&self, node_id: NodeId) -> Result<Option<MapRow>, StoreError> {
        self.begin(Op::FindMap).await?;
        let tables = self.tables.lock().await;
        Ok(tables.maps.values().find(|m| m.node_id == Some(node_id)).cloned())
    }

    async fn create_map(&self, campaign_id: CampaignId, node_id: NodeId, name: &str) -> Result<MapRow, StoreError> {
        self.begin(Op::CreateMap).await?;
        let mut tables = self.tables.lock().await;
        if tables.maps.values().any(|m| m.node_id == Some(node_id)) {
            return Err(StoreError::Conflict(format!("map already exists for node {node_id}")));
        }
        let map = MapRow {
            id: Uuid::new_v4(),
            campaign_id,
            node_id: Some(node_id),
            name: name.trim().to_owned(),
            image_ref: None,
            sort_index: i64::try_from(tables.maps.len()).unwrap_or(i64::MAX),
        };
        tables.maps.insert(map.id, map.clone());
        Ok(map)
    }

    async fn get_map(&self, id: MapId) -> Result<MapRow, StoreError> {
        self.begin(Op::GetMap).await?;
        let tables = self.tables.lock().await;
        tables.maps.get(&id).cloned().ok_or(StoreError::NotFound { entity: "map", id })
    }

    async fn update_map(&self, id: MapId, name: &str) -> Result<MapRow, StoreError> {
        self.begin(Op::UpdateMap).await?;
        let mut tables = self.tables.lock().await;
        let map = tables.maps.get_mut(&id).ok_or(StoreError::NotFound { entity: "map", id })?;
        map.name = name.trim().to_owned();
        Ok(map.clone())
    }

    async fn delete_map(&self, id: MapId) -> Result<(), StoreError> {
        self.begin(Op::DeleteMap).await?;
        let mut tables = self.tables.lock().await;
        if tables.maps.remove(&id).is_none() {
            return Err(StoreError::NotFound { entity: "map", id });
        }
        tables.zones.retain(|_, (z, _)| z.map_id != id);
        Ok(())
    }

    async fn list_zones(&self, map_id: MapId) -> Result<Vec<Zone>, StoreError> {
        self.begin(Op::ListZones).await?;
        let tables = self.tables.lock().await;
        let zones = tables
            .zones
            .values()
            .filter(|(z, tomb)| z.map_id == map_id && tomb.is_none())
            .map(|(z, _)| z.clone())
            .collect();
        Ok(sorted(zones))
    }

    async fn list_trashed_zones(&self, map_id: MapId) -> Result<Vec<TrashedZone>, StoreError> {
        self.begin(Op::ListTrashedZones).await?;
        if self.tombstones_missing().await {
            return Err(missing_tombstone());
        }
        let tables = self.tables.lock().await;
        let mut trashed: Vec<TrashedZone> = tables
            .zones
            .values()
            .filter(|(z, _)| z.map_id == map_id)
            .filter_map(|(z, tomb)| tomb.clone().map(|tombstone| TrashedZone { zone: z.clone(), tombstone }))
            .collect();
        trashed.sort_by(|a, b| b.tombstone.at.cmp(&a.tombstone.at).then_with(|| a.zone.id.cmp(&b.zone.id)));
        Ok(trashed)
    }

    async fn insert_zone(&self, zone: NewZone) -> Result<Zone, StoreError> {
        self.begin(Op::InsertZone).await?;
        let mut tables = self.tables.lock().await;
        if !tables.maps.contains_key(&zone.map_id) {
            return Err(StoreError::NotFound { entity: "map", id: zone.map_id });
        }
        let row = Zone {
            id: Uuid::new_v4(),
            map_id: zone.map_id,
            node_id: zone.node_id,
            target_node_id: zone.target_node_id,
            shape: zone.shape.clone().clamped(),
            is_visible: zone.is_visible,
            action: zone.action,
            sort_index: zone.sort_index,
        };
        tables.zones.insert(row.id, (row.clone(), None));
        Ok(row)
    }

    async fn update_zone(&self, id: ZoneId, patch: &ZonePatch) -> Result<Zone, StoreError> {
        self.begin(Op::UpdateZone).await?;
        let mut tables = self.tables.lock().await;
        let (zone, _) = tables
            .zones
            .get_mut(&id)
            .filter(|(_, tomb)| tomb.is_none())
            .ok_or(StoreError::NotFound { entity: "zone", id })?;
        if let Some(shape) = &patch.shape {
            zone.shape = shape.clone().clamped();
        }
        if let Some(center) = patch.center {
            if let Some(geometry) = zone.shape.geometry() {
                zone.shape = zone.shape.with_geometry(geometry.with_center(center));
            }
        }
        if let Some(visible) = patch.is_visible {
            zone.is_visible = visible;
        }
        Ok(zone.clone())
    }

    async fn soft_delete_zone(&self, id: ZoneId, actor: Option<UserId>) -> Result<(), StoreError> {
        self.begin(Op::SoftDeleteZone).await?;
        if self.tombstones_missing().await {
            return Err(missing_tombstone());
        }
        let mut tables = self.tables.lock().await;
        let (_, tomb) = tables.zones.get_mut(&id).ok_or(StoreError::NotFound { entity: "zone", id })?;
        *tomb = Some(Tombstone { at: OffsetDateTime::now_utc(), by: actor });
        Ok(())
    }

    async fn hard_delete_zone(&self, id: ZoneId) -> Result<(), StoreError> {
        self.begin(Op::HardDeleteZone).await?;
        let mut tables = self.tables.lock().await;
        match tables.zones.remove(&id) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound { entity: "zone", id }),
        }
    }

    async fn restore_zone(&self, id: ZoneId) -> Result<Zone, StoreError> {
        self.begin(Op::RestoreZone).await?;
        if self.tombstones_missing().await {
            return Err(missing_tombstone());
        }
        let mut tables = self.tables.lock().await;
        let (zone, tomb) = tables.zones.get_mut(&id).ok_or(StoreError::NotFound { entity: "zone", id })?;
        *tomb = None;
        Ok(zone.clone())
    }

    async fn list_links(&self, campaign_id: CampaignId) -> Result<Vec<Link>, StoreError> {
        self.begin(Op::ListLinks).await?;
        let tables = self.tables.lock().await;
        let mut links: Vec<Link> = tables.links.iter().filter(|l| l.campaign_id == campaign_id).cloned().collect();
        links.sort_by(|a, b| a.sort_index.cmp(&b.sort_index).then_with(|| a.id.cmp(&b.id)));
        Ok(links)
    }

    async fn create_link(&self, link: NewLink) -> Result<Link, StoreError> {
        self.begin(Op::CreateLink).await?;
        let mut tables = self.tables.lock().await;
        let sort_index = tables
            .links
            .iter()
            .filter(|l| l.from_node_id == link.from_node_id)
            .map(|l| l.sort_index + 1)
            .max()
            .unwrap_or(0);
        let row = Link {
            id: Uuid::new_v4(),
            campaign_id: link.campaign_id,
            from_node_id: link.from_node_id,
            to_node_id: link.to_node_id,
            kind: link.kind,
            label: link.label,
            sort_index,
        };
        tables.links.push(row.clone());
        Ok(row)
    }

    async fn delete_link(&self, id: LinkId) -> Result<(), StoreError> {
        self.begin(Op::DeleteLink).await?;
        let mut tables = self.tables.lock().await;
        let before = tables.links.len();
        tables.links.retain(|l| l.id != id);
        if tables.links.len() == before {
            return Err(StoreError::NotFound { entity: "link", id });
        }
        Ok(())
    }

    async fn load_document(&self, node_id: NodeId) -> Result<Option<DocumentRow>, StoreError> {
        self.begin(Op::LoadDocument).await?;
        let tables = self.tables.lock().await;
        Ok(tables.documents.get(&node_id).cloned())
    }

    async fn save_document(
        &self,
        campaign_id: CampaignId,
        node_id: NodeId,
        draft: &DocumentDraft,
    ) -> Result<DocumentRow, StoreError> {
        self.begin(Op::SaveDocument).await?;
        let mut tables = self.tables.lock().await;
        let id = tables.documents.get(&node_id).map_or_else(Uuid::new_v4, |d| d.id);
        let row = DocumentRow {
            id,
            campaign_id,
            node_id,
            title: draft.title.trim().to_owned(),
            body: draft.body.clone(),
            updated_at: OffsetDateTime::now_utc(),
        };
        tables.documents.insert(node_id, row.clone());
        Ok(row)
    }
}
