//! Persistence collaborator: the remote relational store behind the canvas.
//!
//! DESIGN
//! ======
//! Every table is partitioned by campaign id. Zone geometry is stored as an
//! opaque JSON blob and validated into a typed [`ZoneShape`] exactly once, when
//! a row crosses this boundary. Soft-delete uses nullable tombstone columns
//! (`deleted_at`, `deleted_by`) that older schemas lack; a store reports that
//! as [`StoreError::MissingColumn`] so callers can fall back without inspecting
//! message text themselves.
//!
//! ERROR HANDLING
//! ==============
//! Backends classify their native errors into [`StoreError`]. Structured codes
//! (SQLSTATE) are preferred; [`StoreError::from_message`] covers backends that
//! only hand back text.

pub mod memory;
pub mod pg;

#[cfg(test)]
#[path = "mod_test.rs"]
mod mod_test;

use async_trait::async_trait;
use canvas::camera::Point;
use canvas::doc::{CampaignId, Link, LinkId, MapId, NodeId, Zone, ZoneAction, ZoneId};
use canvas::draft::DocumentDraft;
use canvas::geometry::ZoneShape;
use time::OffsetDateTime;
use uuid::Uuid;

/// Identifier of the acting user, recorded on tombstones.
pub type UserId = Uuid;

/// Tombstone column names; absent on un-migrated schemas.
pub const TOMBSTONE_COLUMNS: [&str; 2] = ["deleted_at", "deleted_by"];

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },
    #[error("column {table}.{column} does not exist")]
    MissingColumn { table: String, column: String },
    #[error("schema out of date: {0}")]
    SchemaOutdated(String),
    #[error("not authorized: {0}")]
    Unauthorized(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("{0}")]
    Remote(String),
}

impl StoreError {
    /// Classify a free-text backend error message.
    #[must_use]
    pub fn from_message(message: &str) -> Self {
        if let Some((table, column)) = missing_column(message) {
            return Self::MissingColumn { table, column };
        }
        let lower = message.to_ascii_lowercase();
        if lower.contains("relation") && lower.contains("does not exist") {
            return Self::SchemaOutdated(message.to_owned());
        }
        if ["permission denied", "not authorized", "jwt", "row-level security"]
            .iter()
            .any(|needle| lower.contains(needle))
        {
            return Self::Unauthorized(message.to_owned());
        }
        if lower.contains("duplicate key") {
            return Self::Conflict(message.to_owned());
        }
        Self::Remote(message.to_owned())
    }

    /// Whether this error means the tombstone columns are absent.
    #[must_use]
    pub fn is_missing_tombstone(&self) -> bool {
        match self {
            Self::MissingColumn { column, .. } => TOMBSTONE_COLUMNS.contains(&column.as_str()),
            _ => false,
        }
    }
}

/// Extract `(table, column)` from a "column does not exist" style message.
///
/// Handles `column "c" of relation "t" does not exist`, `column t.c does not
/// exist`, and `Could not find the 'c' column of 't' in the schema cache`.
fn missing_column(message: &str) -> Option<(String, String)> {
    let lower = message.to_ascii_lowercase();
    if !lower.contains("column") || !(lower.contains("does not exist") || lower.contains("schema cache")) {
        return None;
    }

    let quoted: Vec<&str> = message.split(['"', '\'']).skip(1).step_by(2).collect();
    match quoted.as_slice() {
        [column, table, ..] => return Some(((*table).to_owned(), (*column).to_owned())),
        [column] => return Some((String::new(), (*column).to_owned())),
        [] => {}
    }

    let ident = lower.split("column ").nth(1)?.split_whitespace().next()?;
    Some(match ident.rsplit_once('.') {
        Some((table, column)) => (table.to_owned(), column.to_owned()),
        None => (String::new(), ident.to_owned()),
    })
}

// =============================================================================
// ROWS
// =============================================================================

/// A story node. Zones represent nodes; maps hang off nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRow {
    pub id: NodeId,
    pub campaign_id: CampaignId,
    pub parent_id: Option<NodeId>,
    pub title: String,
    pub sort_index: i64,
}

/// A map: one per story node, created lazily on first entry.
#[derive(Debug, Clone, PartialEq)]
pub struct MapRow {
    pub id: MapId,
    pub campaign_id: CampaignId,
    pub node_id: Option<NodeId>,
    pub name: String,
    /// Public reference to the background image, managed by the upload endpoints.
    pub image_ref: Option<String>,
    pub sort_index: i64,
}

/// The rich-text document bound to a node.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRow {
    pub id: Uuid,
    pub campaign_id: CampaignId,
    pub node_id: NodeId,
    pub title: String,
    pub body: String,
    pub updated_at: OffsetDateTime,
}

/// Soft-delete marker.
#[derive(Debug, Clone, PartialEq)]
pub struct Tombstone {
    pub at: OffsetDateTime,
    pub by: Option<UserId>,
}

/// A soft-deleted zone that can still be restored.
#[derive(Debug, Clone, PartialEq)]
pub struct TrashedZone {
    pub zone: Zone,
    pub tombstone: Tombstone,
}

/// Insert payload for a zone.
#[derive(Debug, Clone, PartialEq)]
pub struct NewZone {
    pub campaign_id: CampaignId,
    pub map_id: MapId,
    pub node_id: Option<NodeId>,
    pub target_node_id: Option<NodeId>,
    pub shape: ZoneShape,
    pub is_visible: bool,
    pub action: ZoneAction,
    pub sort_index: i64,
}

/// Sparse update for a zone. Only present fields are written.
///
/// `center` moves the stored geometry and leaves its other fields alone; it
/// is applied after `shape`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ZonePatch {
    pub shape: Option<ZoneShape>,
    pub center: Option<Point>,
    pub is_visible: Option<bool>,
}

/// Insert payload for a link.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLink {
    pub campaign_id: CampaignId,
    pub from_node_id: NodeId,
    pub to_node_id: NodeId,
    pub kind: String,
    pub label: Option<String>,
}

// =============================================================================
// STORE
// =============================================================================

/// The persistence collaborator. Every call is a suspension point.
#[async_trait]
pub trait Store: Send + Sync {
    // --- story nodes ---
    async fn get_node(&self, id: NodeId) -> Result<NodeRow, StoreError>;
    async fn create_node(
        &self,
        campaign_id: CampaignId,
        parent_id: Option<NodeId>,
        title: &str,
    ) -> Result<NodeRow, StoreError>;
    async fn rename_node(&self, id: NodeId, title: &str) -> Result<NodeRow, StoreError>;
    async fn delete_node(&self, id: NodeId) -> Result<(), StoreError>;

    // --- maps ---
    async fn find_map_for_node(&self, node_id: NodeId) -> Result<Option<MapRow>, StoreError>;
    async fn create_map(&self, campaign_id: CampaignId, node_id: NodeId, name: &str) -> Result<MapRow, StoreError>;
    async fn get_map(&self, id: MapId) -> Result<MapRow, StoreError>;
    async fn update_map(&self, id: MapId, name: &str) -> Result<MapRow, StoreError>;
    async fn delete_map(&self, id: MapId) -> Result<(), StoreError>;

    // --- zones ---
    /// Active (non-tombstoned) zones of a map, in `(sort_index, id)` order.
    async fn list_zones(&self, map_id: MapId) -> Result<Vec<Zone>, StoreError>;
    async fn list_trashed_zones(&self, map_id: MapId) -> Result<Vec<TrashedZone>, StoreError>;
    async fn insert_zone(&self, zone: NewZone) -> Result<Zone, StoreError>;
    async fn update_zone(&self, id: ZoneId, patch: &ZonePatch) -> Result<Zone, StoreError>;
    async fn soft_delete_zone(&self, id: ZoneId, actor: Option<UserId>) -> Result<(), StoreError>;
    async fn hard_delete_zone(&self, id: ZoneId) -> Result<(), StoreError>;
    async fn restore_zone(&self, id: ZoneId) -> Result<Zone, StoreError>;

    // --- links ---
    async fn list_links(&self, campaign_id: CampaignId) -> Result<Vec<Link>, StoreError>;
    async fn create_link(&self, link: NewLink) -> Result<Link, StoreError>;
    async fn delete_link(&self, id: LinkId) -> Result<(), StoreError>;

    // --- documents ---
    async fn load_document(&self, node_id: NodeId) -> Result<Option<DocumentRow>, StoreError>;
    async fn save_document(
        &self,
        campaign_id: CampaignId,
        node_id: NodeId,
        draft: &DocumentDraft,
    ) -> Result<DocumentRow, StoreError>;
}
