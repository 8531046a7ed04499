//! Autosave engine: dirty tracking and the single mutation path.
//!
//! DESIGN
//! ======
//! Each editable entity class (map, zone, document) keeps a draft next to
//! its last persisted snapshot. Every save, whether manual, live, swept, or a
//! drag commit, runs through [`Autosave::mutate`], which holds the saving
//! indicator for exactly the duration of the store calls and reports the
//! outcome as a [`SyncEvent`].
//!
//! Each class has its own lock. Manual saves and drag commits wait for it;
//! live saves and sweeps try it and drop the attempt when a save of that class
//! is already in flight. The sweep itself has one more lock so two sweeps
//! never overlap.
//!
//! ERROR HANDLING
//! ==============
//! Errors always produce a notice, success notices only for manual saves. A
//! failed drag commit asks the session to reload zones, unless the error is an
//! authorization failure, which aborts without further calls.

#[cfg(test)]
#[path = "autosave_test.rs"]
mod autosave_test;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use canvas::doc::{CampaignId, MapId, NodeId, Zone, ZoneId};
use canvas::draft::{DocumentDraft, MapDraft, Tracked, ZoneDraft};
use canvas::geometry::Geometry;
use tokio::sync::{Mutex, MutexGuard, mpsc, watch};
use tracing::{debug, info, warn};

use super::{SyncEvent, UserNotice};
use crate::error::SyncError;
use crate::store::{DocumentRow, MapRow, Store, ZonePatch};

// =============================================================================
// TYPES
// =============================================================================

/// What started a save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Explicit user save. Waits for the class lock and always notifies.
    Manual,
    /// Pointer-up after a drag. Waits for the class lock; silent.
    Drag,
    /// Debounced zone edit. Dropped when busy; silent.
    Live,
    /// Periodic sweep. Dropped when busy; silent.
    Sweep,
}

impl Trigger {
    fn waits(self) -> bool {
        matches!(self, Self::Manual | Self::Drag)
    }

    fn silent(self) -> bool {
        !matches!(self, Self::Manual)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// Nothing to write.
    Clean,
    /// A save of the same class was in flight; this attempt was dropped.
    Busy,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SweepOutcome {
    /// Another sweep was still running.
    Skipped,
    Completed { saved: usize },
    /// An authorization failure stopped the sweep.
    Aborted(SyncError),
}

struct MapEdit {
    id: MapId,
    tracked: Tracked<MapDraft>,
}

#[derive(Clone)]
struct ZoneEdit {
    /// Canonical row the draft's style is applied onto.
    zone: Zone,
    tracked: Tracked<ZoneDraft>,
}

struct DocumentEdit {
    node_id: NodeId,
    tracked: Tracked<DocumentDraft>,
}

#[derive(Default)]
struct Drafts {
    map: Option<MapEdit>,
    zones: HashMap<ZoneId, ZoneEdit>,
    document: Option<DocumentEdit>,
}

#[derive(Default)]
struct ClassLocks {
    map: Mutex<()>,
    zone: Mutex<()>,
    document: Mutex<()>,
    sweep: Mutex<()>,
}

/// Holds the saving indicator up while alive.
struct Saving<'a>(&'a watch::Sender<usize>);

impl<'a> Saving<'a> {
    fn enter(tx: &'a watch::Sender<usize>) -> Self {
        tx.send_modify(|n| *n += 1);
        Self(tx)
    }
}

impl Drop for Saving<'_> {
    fn drop(&mut self) {
        self.0.send_modify(|n| *n = n.saturating_sub(1));
    }
}

async fn acquire(lock: &Mutex<()>, trigger: Trigger) -> Option<MutexGuard<'_, ()>> {
    if trigger.waits() {
        Some(lock.lock().await)
    } else {
        lock.try_lock().ok()
    }
}

// =============================================================================
// ENGINE
// =============================================================================

pub struct Autosave {
    store: Arc<dyn Store>,
    campaign_id: CampaignId,
    drafts: Mutex<Drafts>,
    locks: ClassLocks,
    saving: watch::Sender<usize>,
    events: mpsc::UnboundedSender<SyncEvent>,
}

impl Autosave {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, campaign_id: CampaignId, events: mpsc::UnboundedSender<SyncEvent>) -> Self {
        let (saving, _) = watch::channel(0);
        Self {
            store,
            campaign_id,
            drafts: Mutex::new(Drafts::default()),
            locks: ClassLocks::default(),
            saving,
            events,
        }
    }

    /// Number of saves currently in flight; non-zero means "saving".
    #[must_use]
    pub fn saving(&self) -> watch::Receiver<usize> {
        self.saving.subscribe()
    }

    #[must_use]
    pub fn is_saving(&self) -> bool {
        *self.saving.borrow() > 0
    }

    fn emit(&self, event: SyncEvent) {
        if self.events.send(event).is_err() {
            debug!("sync event dropped; session is gone");
        }
    }

    /// Run one store mutation: hold the saving indicator and report the outcome.
    async fn mutate<T, F>(&self, what: &str, trigger: Trigger, op: F) -> Result<T, SyncError>
    where
        F: Future<Output = Result<T, SyncError>>,
    {
        let _saving = Saving::enter(&self.saving);
        match op.await {
            Ok(value) => {
                debug!(what, ?trigger, "save succeeded");
                if !trigger.silent() {
                    self.emit(SyncEvent::Notice(UserNotice::info(format!("{what} saved"))));
                }
                Ok(value)
            }
            Err(e) => {
                warn!(what, ?trigger, error = %e, "save failed");
                self.emit(SyncEvent::Notice(UserNotice::error(e.user_message())));
                Err(e)
            }
        }
    }

    // =========================================================================
    // TRACKING
    // =========================================================================

    pub async fn track_map(&self, map: &MapRow) {
        let tracked = Tracked::new(MapDraft { name: map.name.clone() });
        self.drafts.lock().await.map = Some(MapEdit { id: map.id, tracked });
    }

    pub async fn set_map_draft(&self, draft: MapDraft) -> Result<bool, SyncError> {
        let mut drafts = self.drafts.lock().await;
        let map = drafts.map.as_mut().ok_or_else(|| SyncError::Validation("no map is open".into()))?;
        map.tracked.draft = draft;
        Ok(map.tracked.is_dirty())
    }

    pub async fn map_draft(&self) -> Option<MapDraft> {
        self.drafts.lock().await.map.as_ref().map(|m| m.tracked.draft.clone())
    }

    pub async fn is_map_dirty(&self) -> bool {
        self.drafts.lock().await.map.as_ref().is_some_and(|m| m.tracked.is_dirty())
    }

    /// Open `zone` in the property editor. `name` is its identity node's title.
    pub async fn track_zone(&self, zone: Zone, name: &str) {
        let tracked = Tracked::new(ZoneDraft::from_zone(&zone, name));
        self.drafts.lock().await.zones.insert(zone.id, ZoneEdit { zone, tracked });
    }

    /// Replace a zone's draft. Returns whether it is now dirty.
    pub async fn set_zone_draft(&self, id: ZoneId, draft: ZoneDraft) -> Result<bool, SyncError> {
        let mut drafts = self.drafts.lock().await;
        let edit = drafts
            .zones
            .get_mut(&id)
            .ok_or_else(|| SyncError::Validation("zone is not open for editing".into()))?;
        edit.tracked.draft = draft;
        Ok(edit.tracked.is_dirty())
    }

    pub async fn zone_draft(&self, id: ZoneId) -> Option<ZoneDraft> {
        self.drafts.lock().await.zones.get(&id).map(|e| e.tracked.draft.clone())
    }

    pub async fn is_zone_dirty(&self, id: ZoneId) -> bool {
        self.drafts.lock().await.zones.get(&id).is_some_and(|e| e.tracked.is_dirty())
    }

    /// Stop tracking a zone. Unsaved edits are discarded.
    pub async fn untrack_zone(&self, id: ZoneId) {
        self.drafts.lock().await.zones.remove(&id);
    }

    /// Replace the canonical base row of a tracked zone (after a reload),
    /// keeping the user's draft.
    pub async fn rebase_zone(&self, zone: &Zone) {
        if let Some(edit) = self.drafts.lock().await.zones.get_mut(&zone.id) {
            edit.zone = zone.clone();
        }
    }

    pub async fn tracked_zone_ids(&self) -> Vec<ZoneId> {
        let mut ids: Vec<ZoneId> = self.drafts.lock().await.zones.keys().copied().collect();
        ids.sort();
        ids
    }

    pub async fn track_document(&self, node_id: NodeId, row: Option<&DocumentRow>) {
        let saved = row.map_or_else(DocumentDraft::default, |r| DocumentDraft {
            title: r.title.clone(),
            body: r.body.clone(),
        });
        self.drafts.lock().await.document = Some(DocumentEdit { node_id, tracked: Tracked::new(saved) });
    }

    pub async fn set_document_draft(&self, draft: DocumentDraft) -> Result<bool, SyncError> {
        let mut drafts = self.drafts.lock().await;
        let doc = drafts.document.as_mut().ok_or_else(|| SyncError::Validation("no document is open".into()))?;
        doc.tracked.draft = draft;
        Ok(doc.tracked.is_dirty())
    }

    pub async fn is_document_dirty(&self) -> bool {
        self.drafts.lock().await.document.as_ref().is_some_and(|d| d.tracked.is_dirty())
    }

    pub async fn untrack_document(&self) {
        self.drafts.lock().await.document = None;
    }

    // =========================================================================
    // SAVES
    // =========================================================================

    /// Save the open map's name if dirty.
    ///
    /// # Errors
    ///
    /// Returns the store error after it has been reported as a notice.
    pub async fn save_map(&self, trigger: Trigger) -> Result<SaveOutcome, SyncError> {
        let Some(_class) = acquire(&self.locks.map, trigger).await else {
            debug!(?trigger, "map save in flight; attempt dropped");
            return Ok(SaveOutcome::Busy);
        };
        let pending = {
            let drafts = self.drafts.lock().await;
            drafts.map.as_ref().filter(|m| m.tracked.is_dirty()).map(|m| (m.id, m.tracked.draft.clone()))
        };
        let Some((map_id, draft)) = pending else {
            return Ok(SaveOutcome::Clean);
        };

        let row = self
            .mutate("map", trigger, async { self.store.update_map(map_id, &draft.name).await.map_err(SyncError::from) })
            .await?;

        if let Some(map) = self.drafts.lock().await.map.as_mut().filter(|m| m.id == map_id) {
            map.tracked.settle(MapDraft { name: row.name.clone() });
        }
        self.emit(SyncEvent::MapSaved(row));
        Ok(SaveOutcome::Saved)
    }

    /// Save one tracked zone's property edits if dirty.
    ///
    /// The identity node is renamed when the name changed; style and
    /// visibility go out as one zone patch positioned at the canonical row.
    ///
    /// # Errors
    ///
    /// Returns the store error after it has been reported as a notice.
    pub async fn save_zone(&self, id: ZoneId, trigger: Trigger) -> Result<SaveOutcome, SyncError> {
        let Some(_class) = acquire(&self.locks.zone, trigger).await else {
            debug!(zone_id = %id, ?trigger, "zone save in flight; attempt dropped");
            return Ok(SaveOutcome::Busy);
        };
        let Some(edit) = self.drafts.lock().await.zones.get(&id).cloned() else {
            return Ok(SaveOutcome::Clean);
        };

        let draft = &edit.tracked.draft;
        let saved = &edit.tracked.saved;
        let rename_to = edit.zone.identity_node().filter(|_| draft.name_differs(saved));
        let patch = (draft.style_differs(saved) || draft.is_visible != saved.is_visible).then(|| ZonePatch {
            shape: edit.zone.geometry().map(|g| edit.zone.shape.with_geometry(draft.apply_to(g))),
            center: None,
            is_visible: Some(draft.is_visible),
        });
        if rename_to.is_none() && patch.is_none() {
            return Ok(SaveOutcome::Clean);
        }

        self.mutate("zone", trigger, async {
            if let Some(node_id) = rename_to {
                let node = self.store.rename_node(node_id, &draft.name).await?;
                self.settle_zone_name(id, &node.title).await;
                self.emit(SyncEvent::NodeRenamed(node));
            }
            if let Some(patch) = &patch {
                let zone = self.store.update_zone(id, patch).await?;
                self.settle_zone_row(&zone).await;
                self.emit(SyncEvent::ZoneSaved(zone));
            }
            Ok::<(), SyncError>(())
        })
        .await?;
        self.emit(SyncEvent::ZoneSettled(id));
        Ok(SaveOutcome::Saved)
    }

    /// Debounced save of one zone. Dropped when a zone save is in flight.
    ///
    /// # Errors
    ///
    /// Returns the store error after it has been reported as a notice.
    pub async fn live_save_zone(&self, id: ZoneId) -> Result<SaveOutcome, SyncError> {
        self.save_zone(id, Trigger::Live).await
    }

    /// Persist a zone's position after a drag. `zone` carries the optimistic
    /// geometry; only its center is written, so style saved elsewhere survives.
    ///
    /// # Errors
    ///
    /// Returns the store error after it has been reported as a notice. Unless
    /// the error is fatal, a [`SyncEvent::ReloadZones`] is emitted first.
    pub async fn commit_position(&self, zone: &Zone) -> Result<Zone, SyncError> {
        let _class = acquire(&self.locks.zone, Trigger::Drag).await;
        let patch = ZonePatch { center: zone.geometry().map(Geometry::center), ..ZonePatch::default() };
        let result = self
            .mutate("zone position", Trigger::Drag, async {
                self.store.update_zone(zone.id, &patch).await.map_err(SyncError::from)
            })
            .await;

        match result {
            Ok(canonical) => {
                self.settle_zone_row(&canonical).await;
                self.emit(SyncEvent::ZoneSaved(canonical.clone()));
                Ok(canonical)
            }
            Err(e) => {
                if !e.is_fatal() {
                    info!(zone_id = %zone.id, "position commit failed; reloading zones");
                    self.emit(SyncEvent::ReloadZones);
                }
                Err(e)
            }
        }
    }

    /// Save the open document if dirty.
    ///
    /// # Errors
    ///
    /// Returns the store error after it has been reported as a notice.
    pub async fn save_document(&self, trigger: Trigger) -> Result<SaveOutcome, SyncError> {
        let Some(_class) = acquire(&self.locks.document, trigger).await else {
            debug!(?trigger, "document save in flight; attempt dropped");
            return Ok(SaveOutcome::Busy);
        };
        let pending = {
            let drafts = self.drafts.lock().await;
            drafts
                .document
                .as_ref()
                .filter(|d| d.tracked.is_dirty())
                .map(|d| (d.node_id, d.tracked.draft.clone()))
        };
        let Some((node_id, draft)) = pending else {
            return Ok(SaveOutcome::Clean);
        };

        let row = self
            .mutate("document", trigger, async {
                self.store.save_document(self.campaign_id, node_id, &draft).await.map_err(SyncError::from)
            })
            .await?;

        if let Some(doc) = self.drafts.lock().await.document.as_mut().filter(|d| d.node_id == node_id) {
            doc.tracked.settle(DocumentDraft { title: row.title.clone(), body: row.body.clone() });
        }
        self.emit(SyncEvent::DocumentSaved(row));
        Ok(SaveOutcome::Saved)
    }

    /// Check map, then zones, then the document, and save whatever is dirty.
    pub async fn sweep(&self) -> SweepOutcome {
        let Ok(_sweep) = self.locks.sweep.try_lock() else {
            debug!("sweep still running; tick skipped");
            return SweepOutcome::Skipped;
        };
        let mut saved = 0;

        if let Err(e) = tally(self.save_map(Trigger::Sweep).await, &mut saved) {
            return SweepOutcome::Aborted(e);
        }
        for id in self.tracked_zone_ids().await {
            if !self.is_zone_dirty(id).await {
                continue;
            }
            if let Err(e) = tally(self.save_zone(id, Trigger::Sweep).await, &mut saved) {
                return SweepOutcome::Aborted(e);
            }
        }
        if let Err(e) = tally(self.save_document(Trigger::Sweep).await, &mut saved) {
            return SweepOutcome::Aborted(e);
        }

        if saved > 0 {
            debug!(saved, "sweep saved dirty entities");
        }
        SweepOutcome::Completed { saved }
    }

    async fn settle_zone_name(&self, id: ZoneId, title: &str) {
        if let Some(edit) = self.drafts.lock().await.zones.get_mut(&id) {
            let mut saved = edit.tracked.saved.clone();
            saved.name = title.to_owned();
            edit.tracked.settle(saved);
        }
    }

    async fn settle_zone_row(&self, zone: &Zone) {
        if let Some(edit) = self.drafts.lock().await.zones.get_mut(&zone.id) {
            let name = edit.tracked.saved.name.clone();
            edit.zone = zone.clone();
            edit.tracked.settle(ZoneDraft::from_zone(zone, &name));
        }
    }
}

/// Count a sweep step. Non-fatal errors were already reported and don't stop
/// the sweep.
fn tally(result: Result<SaveOutcome, SyncError>, saved: &mut usize) -> Result<(), SyncError> {
    match result {
        Ok(SaveOutcome::Saved) => *saved += 1,
        Ok(SaveOutcome::Clean | SaveOutcome::Busy) => {}
        Err(e) if e.is_fatal() => return Err(e),
        Err(_) => {}
    }
    Ok(())
}
