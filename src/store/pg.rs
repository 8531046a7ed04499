//! Postgres-backed [`Store`].
//!
//! Geometry is stored as `jsonb` next to a `shape` kind column and decoded
//! into [`ZoneShape`] here, once. Errors are classified by SQLSTATE.

#[cfg(test)]
#[path = "pg_test.rs"]
mod pg_test;

use async_trait::async_trait;
use canvas::doc::{CampaignId, Link, LinkId, MapId, NodeId, Zone, ZoneAction, ZoneId};
use canvas::draft::DocumentDraft;
use canvas::geometry::{ZoneShape, clamp_to_stage};
use serde_json::Value;
use sqlx::PgPool;
use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;

use super::{
    DocumentRow, MapRow, NewLink, NewZone, NodeRow, Store, StoreError, Tombstone, TrashedZone, UserId, ZonePatch,
};

// =============================================================================
// ERROR CLASSIFICATION
// =============================================================================

const UNDEFINED_COLUMN: &str = "42703";
const UNDEFINED_TABLE: &str = "42P01";
const INSUFFICIENT_PRIVILEGE: &str = "42501";
const INVALID_AUTHORIZATION: &str = "28000";
const INVALID_PASSWORD: &str = "28P01";
const UNIQUE_VIOLATION: &str = "23505";

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        let sqlx::Error::Database(db) = &err else {
            return Self::Remote(err.to_string());
        };
        let message = db.message().to_owned();
        match db.code().as_deref() {
            Some(UNDEFINED_COLUMN) => match Self::from_message(&message) {
                missing @ Self::MissingColumn { .. } => missing,
                _ => Self::MissingColumn { table: db.table().unwrap_or_default().to_owned(), column: String::new() },
            },
            Some(UNDEFINED_TABLE) => Self::SchemaOutdated(message),
            Some(INSUFFICIENT_PRIVILEGE | INVALID_AUTHORIZATION | INVALID_PASSWORD) => Self::Unauthorized(message),
            Some(UNIQUE_VIOLATION) => Self::Conflict(message),
            _ => Self::Remote(message),
        }
    }
}

// =============================================================================
// ROW DECODING
// =============================================================================

type NodeTuple = (Uuid, Uuid, Option<Uuid>, String, i64);
type MapTuple = (Uuid, Uuid, Option<Uuid>, String, Option<String>, i64);
type ZoneTuple = (Uuid, Uuid, Option<Uuid>, Option<Uuid>, String, Value, bool, String, i64);
type TrashedTuple = (
    Uuid,
    Uuid,
    Option<Uuid>,
    Option<Uuid>,
    String,
    Value,
    bool,
    String,
    i64,
    OffsetDateTime,
    Option<Uuid>,
);
type LinkTuple = (Uuid, Uuid, Uuid, Uuid, String, Option<String>, i64);
type DocumentTuple = (Uuid, Uuid, Uuid, String, String, OffsetDateTime);

const NODE_COLUMNS: &str = "id, campaign_id, parent_id, title, sort_index";
const MAP_COLUMNS: &str = "id, campaign_id, node_id, name, image_ref, sort_index";
const ZONE_COLUMNS: &str = "id, map_id, node_id, target_node_id, shape, geometry, is_visible, action, sort_index";
const LINK_COLUMNS: &str = "id, campaign_id, from_node_id, to_node_id, kind, label, sort_index";
const DOCUMENT_COLUMNS: &str = "id, campaign_id, node_id, title, body, updated_at";

fn node_from_row((id, campaign_id, parent_id, title, sort_index): NodeTuple) -> NodeRow {
    NodeRow { id, campaign_id, parent_id, title, sort_index }
}

fn map_from_row((id, campaign_id, node_id, name, image_ref, sort_index): MapTuple) -> MapRow {
    MapRow { id, campaign_id, node_id, name, image_ref, sort_index }
}

fn zone_from_row(
    (id, map_id, node_id, target_node_id, shape, geometry, is_visible, action, sort_index): ZoneTuple,
) -> Zone {
    Zone {
        id,
        map_id,
        node_id,
        target_node_id,
        shape: ZoneShape::from_parts(&shape, &geometry),
        is_visible,
        action: ZoneAction::parse(&action),
        sort_index,
    }
}

fn trashed_from_row(row: TrashedTuple) -> TrashedZone {
    let (id, map_id, node_id, target_node_id, shape, geometry, is_visible, action, sort_index, at, by) = row;
    TrashedZone {
        zone: zone_from_row((id, map_id, node_id, target_node_id, shape, geometry, is_visible, action, sort_index)),
        tombstone: Tombstone { at, by },
    }
}

fn link_from_row((id, campaign_id, from_node_id, to_node_id, kind, label, sort_index): LinkTuple) -> Link {
    Link { id, campaign_id, from_node_id, to_node_id, kind, label, sort_index }
}

fn document_from_row((id, campaign_id, node_id, title, body, updated_at): DocumentTuple) -> DocumentRow {
    DocumentRow { id, campaign_id, node_id, title, body, updated_at }
}

fn not_found(entity: &'static str, id: Uuid) -> StoreError {
    StoreError::NotFound { entity, id }
}

// =============================================================================
// STORE
// =============================================================================

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn get_node(&self, id: NodeId) -> Result<NodeRow, StoreError> {
        let row = sqlx::query_as::<_, NodeTuple>(&format!("SELECT {NODE_COLUMNS} FROM story_nodes WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(node_from_row).ok_or_else(|| not_found("node", id))
    }

    async fn create_node(
        &self,
        campaign_id: CampaignId,
        parent_id: Option<NodeId>,
        title: &str,
    ) -> Result<NodeRow, StoreError> {
        let row = sqlx::query_as::<_, NodeTuple>(&format!(
            "INSERT INTO story_nodes (id, campaign_id, parent_id, title, sort_index) \
             VALUES ($1, $2, $3, $4, \
                 (SELECT COALESCE(MAX(sort_index) + 1, 0) FROM story_nodes \
                  WHERE campaign_id = $2 AND parent_id IS NOT DISTINCT FROM $3)) \
             RETURNING {NODE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(campaign_id)
        .bind(parent_id)
        .bind(title.trim())
        .fetch_one(&self.pool)
        .await?;
        Ok(node_from_row(row))
    }

    async fn rename_node(&self, id: NodeId, title: &str) -> Result<NodeRow, StoreError> {
        let row = sqlx::query_as::<_, NodeTuple>(&format!(
            "UPDATE story_nodes SET title = $2 WHERE id = $1 RETURNING {NODE_COLUMNS}"
        ))
        .bind(id)
        .bind(title.trim())
        .fetch_optional(&self.pool)
        .await?;
        row.map(node_from_row).ok_or_else(|| not_found("node", id))
    }

    async fn delete_node(&self, id: NodeId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM story_nodes WHERE id = $1").bind(id).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(not_found("node", id));
        }
        Ok(())
    }

    async fn find_map_for_node(&self, node_id: NodeId) -> Result<Option<MapRow>, StoreError> {
        let row = sqlx::query_as::<_, MapTuple>(&format!("SELECT {MAP_COLUMNS} FROM maps WHERE node_id = $1"))
            .bind(node_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(map_from_row))
    }

    async fn create_map(&self, campaign_id: CampaignId, node_id: NodeId, name: &str) -> Result<MapRow, StoreError> {
        let row = sqlx::query_as::<_, MapTuple>(&format!(
            "INSERT INTO maps (id, campaign_id, node_id, name, sort_index) \
             VALUES ($1, $2, $3, $4, \
                 (SELECT COALESCE(MAX(sort_index) + 1, 0) FROM maps WHERE campaign_id = $2)) \
             RETURNING {MAP_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(campaign_id)
        .bind(node_id)
        .bind(name.trim())
        .fetch_one(&self.pool)
        .await?;
        Ok(map_from_row(row))
    }

    async fn get_map(&self, id: MapId) -> Result<MapRow, StoreError> {
        let row = sqlx::query_as::<_, MapTuple>(&format!("SELECT {MAP_COLUMNS} FROM maps WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(map_from_row).ok_or_else(|| not_found("map", id))
    }

    async fn update_map(&self, id: MapId, name: &str) -> Result<MapRow, StoreError> {
        let row =
            sqlx::query_as::<_, MapTuple>(&format!("UPDATE maps SET name = $2 WHERE id = $1 RETURNING {MAP_COLUMNS}"))
                .bind(id)
                .bind(name.trim())
                .fetch_optional(&self.pool)
                .await?;
        row.map(map_from_row).ok_or_else(|| not_found("map", id))
    }

    async fn delete_map(&self, id: MapId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM maps WHERE id = $1").bind(id).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(not_found("map", id));
        }
        Ok(())
    }

    async fn list_zones(&self, map_id: MapId) -> Result<Vec<Zone>, StoreError> {
        let active = sqlx::query_as::<_, ZoneTuple>(&format!(
            "SELECT {ZONE_COLUMNS} FROM map_zones \
             WHERE map_id = $1 AND deleted_at IS NULL \
             ORDER BY sort_index, id"
        ))
        .bind(map_id)
        .fetch_all(&self.pool)
        .await;

        let rows = match active.map_err(StoreError::from) {
            Ok(rows) => rows,
            Err(e) if e.is_missing_tombstone() => {
                // Un-migrated schema: nothing can be tombstoned, so every row is active.
                warn!(%map_id, "map_zones has no tombstone columns; listing all zones");
                sqlx::query_as::<_, ZoneTuple>(&format!(
                    "SELECT {ZONE_COLUMNS} FROM map_zones WHERE map_id = $1 ORDER BY sort_index, id"
                ))
                .bind(map_id)
                .fetch_all(&self.pool)
                .await?
            }
            Err(e) => return Err(e),
        };
        Ok(rows.into_iter().map(zone_from_row).collect())
    }

    async fn list_trashed_zones(&self, map_id: MapId) -> Result<Vec<TrashedZone>, StoreError> {
        let rows = sqlx::query_as::<_, TrashedTuple>(&format!(
            "SELECT {ZONE_COLUMNS}, deleted_at, deleted_by FROM map_zones \
             WHERE map_id = $1 AND deleted_at IS NOT NULL \
             ORDER BY deleted_at DESC, id"
        ))
        .bind(map_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(trashed_from_row).collect())
    }

    async fn insert_zone(&self, zone: NewZone) -> Result<Zone, StoreError> {
        let shape = zone.shape.clamped();
        let row = sqlx::query_as::<_, ZoneTuple>(&format!(
            "INSERT INTO map_zones \
                 (id, campaign_id, map_id, node_id, target_node_id, shape, geometry, is_visible, action, sort_index) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {ZONE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(zone.campaign_id)
        .bind(zone.map_id)
        .bind(zone.node_id)
        .bind(zone.target_node_id)
        .bind(shape.kind())
        .bind(shape.to_value())
        .bind(zone.is_visible)
        .bind(zone.action.as_str())
        .bind(zone.sort_index)
        .fetch_one(&self.pool)
        .await?;
        Ok(zone_from_row(row))
    }

    async fn update_zone(&self, id: ZoneId, patch: &ZonePatch) -> Result<Zone, StoreError> {
        let shape = patch.shape.clone().map(ZoneShape::clamped);
        let center = patch.center.map(clamp_to_stage);
        let row = sqlx::query_as::<_, ZoneTuple>(&format!(
            "UPDATE map_zones SET \
                 shape = COALESCE($2, shape), \
                 geometry = CASE \
                     WHEN $5::float8 IS NOT NULL AND jsonb_typeof(COALESCE($3, geometry)) = 'object' \
                         THEN COALESCE($3, geometry) || jsonb_build_object('x', $5::float8, 'y', $6::float8) \
                     ELSE COALESCE($3, geometry) \
                 END, \
                 is_visible = COALESCE($4, is_visible) \
             WHERE id = $1 \
             RETURNING {ZONE_COLUMNS}"
        ))
        .bind(id)
        .bind(shape.as_ref().map(|s| s.kind().to_owned()))
        .bind(shape.as_ref().map(ZoneShape::to_value))
        .bind(patch.is_visible)
        .bind(center.map(|c| c.x))
        .bind(center.map(|c| c.y))
        .fetch_optional(&self.pool)
        .await?;
        row.map(zone_from_row).ok_or_else(|| not_found("zone", id))
    }

    async fn soft_delete_zone(&self, id: ZoneId, actor: Option<UserId>) -> Result<(), StoreError> {
        let result =
            sqlx::query("UPDATE map_zones SET deleted_at = now(), deleted_by = $2 WHERE id = $1 AND deleted_at IS NULL")
                .bind(id)
                .bind(actor)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(not_found("zone", id));
        }
        Ok(())
    }

    async fn hard_delete_zone(&self, id: ZoneId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM map_zones WHERE id = $1").bind(id).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(not_found("zone", id));
        }
        Ok(())
    }

    async fn restore_zone(&self, id: ZoneId) -> Result<Zone, StoreError> {
        let row = sqlx::query_as::<_, ZoneTuple>(&format!(
            "UPDATE map_zones SET deleted_at = NULL, deleted_by = NULL WHERE id = $1 RETURNING {ZONE_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(zone_from_row).ok_or_else(|| not_found("zone", id))
    }

    async fn list_links(&self, campaign_id: CampaignId) -> Result<Vec<Link>, StoreError> {
        let rows = sqlx::query_as::<_, LinkTuple>(&format!(
            "SELECT {LINK_COLUMNS} FROM story_links WHERE campaign_id = $1 ORDER BY sort_index, id"
        ))
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(link_from_row).collect())
    }

    async fn create_link(&self, link: NewLink) -> Result<Link, StoreError> {
        let row = sqlx::query_as::<_, LinkTuple>(&format!(
            "INSERT INTO story_links (id, campaign_id, from_node_id, to_node_id, kind, label, sort_index) \
             VALUES ($1, $2, $3, $4, $5, $6, \
                 (SELECT COALESCE(MAX(sort_index) + 1, 0) FROM story_links WHERE from_node_id = $3)) \
             RETURNING {LINK_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(link.campaign_id)
        .bind(link.from_node_id)
        .bind(link.to_node_id)
        .bind(&link.kind)
        .bind(&link.label)
        .fetch_one(&self.pool)
        .await?;
        Ok(link_from_row(row))
    }

    async fn delete_link(&self, id: LinkId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM story_links WHERE id = $1").bind(id).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(not_found("link", id));
        }
        Ok(())
    }

    async fn load_document(&self, node_id: NodeId) -> Result<Option<DocumentRow>, StoreError> {
        let row = sqlx::query_as::<_, DocumentTuple>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE node_id = $1"
        ))
        .bind(node_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(document_from_row))
    }

    async fn save_document(
        &self,
        campaign_id: CampaignId,
        node_id: NodeId,
        draft: &DocumentDraft,
    ) -> Result<DocumentRow, StoreError> {
        let row = sqlx::query_as::<_, DocumentTuple>(&format!(
            "INSERT INTO documents (id, campaign_id, node_id, title, body, updated_at) \
             VALUES ($1, $2, $3, $4, $5, now()) \
             ON CONFLICT (node_id) DO UPDATE SET \
                 title = EXCLUDED.title, body = EXCLUDED.body, updated_at = now() \
             RETURNING {DOCUMENT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(campaign_id)
        .bind(node_id)
        .bind(draft.title.trim())
        .bind(&draft.body)
        .fetch_one(&self.pool)
        .await?;
        Ok(document_from_row(row))
    }
}
