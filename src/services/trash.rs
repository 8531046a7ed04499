//! Zone trash: soft-delete with a hard-delete fallback, restore, and the
//! cross-surface refresh signal.
//!
//! DESIGN
//! ======
//! Soft-delete writes a tombstone (`deleted_at`, `deleted_by`). Schemas that
//! predate the tombstone migration lack those columns; the store reports that
//! as a typed missing-column error. In [`SoftDeleteMode::Auto`] the first such
//! error switches this service to hard-delete for the rest of its life, so
//! later deletes go straight to the fallback.

#[cfg(test)]
#[path = "trash_test.rs"]
mod trash_test;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use canvas::doc::{CampaignId, MapId, Zone, ZoneId};
use tracing::{info, warn};

use crate::bus::{SyncBus, Topic};
use crate::config::SoftDeleteMode;
use crate::error::SyncError;
use crate::store::{Store, TrashedZone, UserId};

/// How a zone left the active set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// Tombstoned; restorable.
    SoftDeleted,
    /// Row removed.
    HardDeleted,
}

pub struct Trash {
    store: Arc<dyn Store>,
    bus: SyncBus,
    mode: SoftDeleteMode,
    tombstones_missing: AtomicBool,
}

impl Trash {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, bus: SyncBus, mode: SoftDeleteMode) -> Self {
        Self { store, bus, mode, tombstones_missing: AtomicBool::new(false) }
    }

    /// Whether deletes currently write tombstones.
    #[must_use]
    pub fn soft_delete_enabled(&self) -> bool {
        match self.mode {
            SoftDeleteMode::On => true,
            SoftDeleteMode::Off => false,
            SoftDeleteMode::Auto => !self.tombstones_missing.load(Ordering::Relaxed),
        }
    }

    /// Remove a zone from the active set and tell every open surface.
    ///
    /// # Errors
    ///
    /// Returns the store error if neither delete path succeeds. No signal is
    /// published on failure.
    pub async fn delete_zone(
        &self,
        campaign_id: CampaignId,
        zone_id: ZoneId,
        actor: Option<UserId>,
    ) -> Result<Removal, SyncError> {
        let removal = if self.soft_delete_enabled() {
            match self.store.soft_delete_zone(zone_id, actor).await {
                Ok(()) => Removal::SoftDeleted,
                Err(e) if e.is_missing_tombstone() && self.mode == SoftDeleteMode::Auto => {
                    warn!(%zone_id, error = %e, "tombstone columns missing; falling back to hard delete");
                    self.tombstones_missing.store(true, Ordering::Relaxed);
                    self.store.hard_delete_zone(zone_id).await?;
                    Removal::HardDeleted
                }
                Err(e) => return Err(e.into()),
            }
        } else {
            self.store.hard_delete_zone(zone_id).await?;
            Removal::HardDeleted
        };

        info!(%campaign_id, %zone_id, ?removal, "zone removed");
        self.bus.publish(campaign_id, Topic::Zones);
        Ok(removal)
    }

    /// Clear a zone's tombstone and tell every open surface.
    ///
    /// # Errors
    ///
    /// Returns the store error, including a missing-column error on schemas
    /// without tombstones.
    pub async fn restore_zone(&self, campaign_id: CampaignId, zone_id: ZoneId) -> Result<Zone, SyncError> {
        let zone = self.store.restore_zone(zone_id).await?;
        info!(%campaign_id, %zone_id, "zone restored");
        self.bus.publish(campaign_id, Topic::Zones);
        Ok(zone)
    }

    /// Tombstoned zones of a map, newest first. Empty when the schema has no
    /// tombstones and the mode allows the fallback.
    ///
    /// # Errors
    ///
    /// Returns the store error.
    pub async fn list_trashed(&self, map_id: MapId) -> Result<Vec<TrashedZone>, SyncError> {
        if !self.soft_delete_enabled() && self.mode == SoftDeleteMode::Auto {
            return Ok(Vec::new());
        }
        match self.store.list_trashed_zones(map_id).await {
            Ok(zones) => Ok(zones),
            Err(e) if e.is_missing_tombstone() && self.mode != SoftDeleteMode::On => {
                self.tombstones_missing.store(true, Ordering::Relaxed);
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }
}
