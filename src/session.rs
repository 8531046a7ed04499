//! Map session: one mounted canvas bound to one map.
//!
//! DESIGN
//! ======
//! The session owns the pure [`EngineCore`] and turns the actions it returns
//! into service calls: drag commits and property edits go to the autosave
//! engine, spawns and links to the zone service, deletes to the trash. Only
//! two things are applied before the store answers: the dragged position
//! (inside the engine) and a placeholder for a zone being spawned. Both are
//! replaced by canonical rows or rolled back.
//!
//! Refresh is signal-driven. Other surfaces publish on the [`SyncBus`]; this
//! session reloads on [`MapSession::sync`] or [`MapSession::wait`], and the
//! engine keeps a dragged zone's local position across the reload.
//!
//! [`SyncBus`]: crate::bus::SyncBus

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::sync::Arc;

use canvas::camera::Point;
use canvas::doc::{CampaignId, Link, LinkId, MapId, NodeId, Zone, ZoneAction, ZoneId};
use canvas::draft::{DocumentDraft, MapDraft, ZoneDraft};
use canvas::engine::{Action, EngineCore, Notice};
use canvas::geometry::{Geometry, ZoneShape};
use canvas::graph;
use canvas::input::{Button, WheelDelta};
use canvas::render::{self, DrawItem};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::bus::{Subscription, Topic};
use crate::error::SyncError;
use crate::services::autosave::{Autosave, SaveOutcome, Trigger};
use crate::services::scheduler::Scheduler;
use crate::services::trash::Removal;
use crate::services::zones::{LinkOutcome, pick_palette_color};
use crate::services::{SyncEvent, UserNotice};
use crate::state::AppState;
use crate::store::{MapRow, NodeRow, TrashedZone, UserId};

/// Requests the session cannot fulfil itself.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    /// Navigate into a node and its map.
    EnterNode { node: NodeRow, map: MapRow },
}

pub struct MapSession {
    state: AppState,
    map: MapRow,
    actor: Option<UserId>,
    core: EngineCore,
    autosave: Arc<Autosave>,
    scheduler: Scheduler,
    subscription: Subscription,
    events: mpsc::UnboundedReceiver<SyncEvent>,
    /// Zone open in the property editor; follows the selection.
    editing: Option<ZoneId>,
    notices: Vec<UserNotice>,
    host_events: Vec<HostEvent>,
    render_needed: bool,
}

impl MapSession {
    /// Mount a canvas on `map_id`: load zones and links, start autosave, and
    /// subscribe to refresh signals.
    ///
    /// # Errors
    ///
    /// Returns the store error if the map, zones, or links cannot be loaded.
    pub async fn open(state: &AppState, map_id: MapId, actor: Option<UserId>) -> Result<Self, SyncError> {
        let map = state.store.get_map(map_id).await?;
        let subscription = state.bus.subscribe(map.campaign_id);

        let (tx, events) = mpsc::unbounded_channel();
        let autosave = Arc::new(Autosave::new(Arc::clone(&state.store), map.campaign_id, tx));
        autosave.track_map(&map).await;
        let scheduler =
            Scheduler::spawn(Arc::clone(&autosave), state.config.live_save_debounce, state.config.sweep_interval);

        let mut session = Self {
            state: state.clone(),
            map,
            actor,
            core: EngineCore::new(),
            autosave,
            scheduler,
            subscription,
            events,
            editing: None,
            notices: Vec::new(),
            host_events: Vec::new(),
            render_needed: true,
        };
        session.reload_zones().await?;
        session.reload_links().await?;
        info!(map_id = %session.map.id, zones = session.core.zones.len(), "map session opened");
        Ok(session)
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    #[must_use]
    pub fn engine(&self) -> &EngineCore {
        &self.core
    }

    #[must_use]
    pub fn map(&self) -> &MapRow {
        &self.map
    }

    #[must_use]
    pub fn campaign_id(&self) -> CampaignId {
        self.map.campaign_id
    }

    #[must_use]
    pub fn scene(&self) -> Vec<DrawItem> {
        render::scene(&self.core)
    }

    #[must_use]
    pub fn is_saving(&self) -> bool {
        self.autosave.is_saving()
    }

    /// Notices raised since the last call.
    pub fn take_notices(&mut self) -> Vec<UserNotice> {
        std::mem::take(&mut self.notices)
    }

    pub fn take_host_events(&mut self) -> Vec<HostEvent> {
        std::mem::take(&mut self.host_events)
    }

    /// Whether the scene changed since the last call.
    pub fn take_render_needed(&mut self) -> bool {
        std::mem::replace(&mut self.render_needed, false)
    }

    // =========================================================================
    // INPUT
    // =========================================================================

    pub fn set_origin(&mut self, origin: Point) {
        self.core.set_origin(origin);
        self.render_needed = true;
    }

    pub async fn pointer_down(&mut self, client: Point, button: Button) {
        let actions = self.core.on_pointer_down(client, button);
        self.dispatch(actions).await;
    }

    pub async fn pointer_move(&mut self, client: Point) {
        let actions = self.core.on_pointer_move(client);
        self.dispatch(actions).await;
    }

    pub async fn pointer_up(&mut self, client: Point, button: Button) {
        let actions = self.core.on_pointer_up(client, button);
        self.dispatch(actions).await;
    }

    pub async fn wheel(&mut self, client: Point, delta: WheelDelta) {
        let actions = self.core.on_wheel(client, delta);
        self.dispatch(actions).await;
    }

    pub async fn context_menu(&mut self, client: Point) {
        let actions = self.core.on_context_menu(client);
        self.dispatch(actions).await;
    }

    pub async fn double_click(&mut self, client: Point) {
        let actions = self.core.on_double_click(client);
        self.dispatch(actions).await;
    }

    /// Select a zone from outside the canvas (e.g. a zone list).
    pub async fn select(&mut self, id: Option<ZoneId>) {
        let actions = self.core.select(id);
        self.dispatch(actions).await;
    }

    pub async fn cancel_connection(&mut self) {
        let actions = self.core.cancel_connection();
        self.dispatch(actions).await;
    }

    async fn dispatch(&mut self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::RenderNeeded => self.render_needed = true,
                Action::ZoneSelected(id) => self.open_editor(id).await,
                Action::ZoneMoved { id, geometry } => self.commit_move(id, geometry).await,
                Action::SpawnZone { at } => self.spawn_at(at).await,
                Action::ConnectionStarted { source } => debug!(zone_id = %source, "connection pending"),
                Action::ConnectionCancelled => debug!("connection cancelled"),
                Action::LinkRequested { from_node, to_node, .. } => self.link_nodes(from_node, to_node).await,
                Action::EnterNode { node_id, .. } => self.enter(node_id).await,
                Action::Notice(notice) => self.notices.push(notice_for(notice)),
            }
        }
        self.drain_events().await;
    }

    // =========================================================================
    // ACTION HANDLERS
    // =========================================================================

    async fn open_editor(&mut self, selected: Option<ZoneId>) {
        if let Some(previous) = self.editing.take() {
            self.release_zone(previous).await;
        }
        let Some(zone) = selected.and_then(|id| self.core.zone(&id).cloned()) else {
            return;
        };
        self.editing = Some(zone.id);
        if self.autosave.zone_draft(zone.id).await.is_some() {
            // Still tracked with unsaved edits from an earlier selection.
            return;
        }
        let name = match zone.identity_node() {
            Some(node_id) => {
                let result = self.state.store.get_node(node_id).await;
                match result {
                    Ok(node) => node.title,
                    Err(e) => {
                        self.report(&SyncError::from(e));
                        String::new()
                    }
                }
            }
            None => String::new(),
        };
        self.autosave.track_zone(zone, &name).await;
    }

    /// Stop editing a zone. Dirty zones stay tracked until a save lands.
    async fn release_zone(&mut self, id: ZoneId) {
        if self.autosave.is_zone_dirty(id).await {
            return;
        }
        self.scheduler.forget_zone(id);
        self.autosave.untrack_zone(id).await;
    }

    async fn commit_move(&mut self, id: ZoneId, geometry: Geometry) {
        let Some(mut zone) = self.core.zone(&id).cloned() else {
            return;
        };
        zone.shape = zone.shape.with_geometry(geometry);
        if self.autosave.commit_position(&zone).await.is_ok() {
            debug!(zone_id = %id, "zone position committed");
        }
    }

    async fn spawn_at(&mut self, at: Point) {
        let color = pick_palette_color();
        let sort_index = self.core.zones.max_sort_index().map_or(0, |max| max + 1);
        let placeholder = Zone {
            id: Uuid::new_v4(),
            map_id: self.map.id,
            node_id: None,
            target_node_id: None,
            shape: ZoneShape::Circle(Geometry::at(at, color)),
            is_visible: false,
            action: ZoneAction::OpenNode,
            sort_index,
        };
        let placeholder_id = placeholder.id;
        self.core.apply_zone(placeholder);
        self.render_needed = true;

        let result = self.state.zones().spawn_zone(&self.map, at, color, sort_index).await;
        self.core.remove_zone(&placeholder_id);
        match result {
            Ok(spawned) => {
                let id = spawned.zone.id;
                self.core.apply_zone(spawned.zone);
                self.core.select(Some(id));
                self.open_editor(Some(id)).await;
            }
            Err(e) => self.report(&e),
        }
    }

    async fn link_nodes(&mut self, from: NodeId, to: NodeId) {
        match self.state.zones().link_nodes(self.campaign_id(), from, to, None).await {
            Ok(LinkOutcome::Created(link)) => {
                self.core.apply_link(link);
                self.render_needed = true;
            }
            Ok(LinkOutcome::AlreadyLinked) => self.notices.push(notice_for(Notice::AlreadyConnected)),
            Err(e) => self.report(&e),
        }
    }

    async fn enter(&mut self, node_id: NodeId) {
        match self.state.zones().enter_node(node_id).await {
            Ok((node, map)) => self.host_events.push(HostEvent::EnterNode { node, map }),
            Err(e) => self.report(&e),
        }
    }

    fn report(&mut self, e: &SyncError) {
        warn!(map_id = %self.map.id, error = %e, "map session operation failed");
        self.notices.push(UserNotice::error(e.user_message()));
    }

    // =========================================================================
    // EDITING
    // =========================================================================

    /// Draft of the zone open in the property editor.
    pub async fn zone_draft(&self) -> Option<ZoneDraft> {
        let id = self.editing?;
        self.autosave.zone_draft(id).await
    }

    /// Update the selected zone's draft and re-arm its live save.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Validation`] when no zone is selected.
    pub async fn edit_zone(&mut self, draft: ZoneDraft) -> Result<bool, SyncError> {
        let id = self.editing.ok_or_else(|| SyncError::Validation("no zone selected".into()))?;
        let dirty = self.autosave.set_zone_draft(id, draft).await?;
        if dirty {
            self.scheduler.zone_edited(id);
        } else {
            self.scheduler.forget_zone(id);
        }
        Ok(dirty)
    }

    /// # Errors
    ///
    /// Returns [`SyncError::Validation`] if the map is not tracked.
    pub async fn edit_map(&mut self, draft: MapDraft) -> Result<bool, SyncError> {
        self.autosave.set_map_draft(draft).await
    }

    /// Bind the document editor to `node_id`.
    ///
    /// # Errors
    ///
    /// Returns the store error if the document cannot be loaded.
    pub async fn open_document(&mut self, node_id: NodeId) -> Result<DocumentDraft, SyncError> {
        let row = self.state.store.load_document(node_id).await?;
        self.autosave.track_document(node_id, row.as_ref()).await;
        Ok(row.map_or_else(DocumentDraft::default, |r| DocumentDraft { title: r.title, body: r.body }))
    }

    /// # Errors
    ///
    /// Returns [`SyncError::Validation`] if no document is open.
    pub async fn edit_document(&mut self, draft: DocumentDraft) -> Result<bool, SyncError> {
        self.autosave.set_document_draft(draft).await
    }

    pub async fn close_document(&mut self) {
        self.autosave.untrack_document().await;
    }

    /// Explicit save of everything open: map, selected zone, document.
    ///
    /// # Errors
    ///
    /// Returns the first failure; later classes are still attempted.
    pub async fn save_now(&mut self) -> Result<(), SyncError> {
        let map = self.autosave.save_map(Trigger::Manual).await;
        let zone = match self.editing {
            Some(id) => self.autosave.save_zone(id, Trigger::Manual).await,
            None => Ok(SaveOutcome::Clean),
        };
        let document = self.autosave.save_document(Trigger::Manual).await;
        self.drain_events().await;
        map.and(zone).and(document).map(|_| ())
    }

    // =========================================================================
    // TRASH & REFERENCES
    // =========================================================================

    /// Delete a zone; every open surface drops it on its next sync.
    ///
    /// # Errors
    ///
    /// Returns the store error if neither delete path succeeds.
    pub async fn delete_zone(&mut self, id: ZoneId) -> Result<Removal, SyncError> {
        let result = self.state.trash.delete_zone(self.campaign_id(), id, self.actor).await;
        match &result {
            Ok(_) => self.sync().await,
            Err(e) => self.report(e),
        }
        result
    }

    /// # Errors
    ///
    /// Returns the store error.
    pub async fn restore_zone(&mut self, id: ZoneId) -> Result<Zone, SyncError> {
        let result = self.state.trash.restore_zone(self.campaign_id(), id).await;
        match &result {
            Ok(_) => self.sync().await,
            Err(e) => self.report(e),
        }
        result
    }

    /// # Errors
    ///
    /// Returns the store error.
    pub async fn trashed(&self) -> Result<Vec<TrashedZone>, SyncError> {
        self.state.trash.list_trashed(self.map.id).await
    }

    fn editing_node(&self) -> Result<NodeId, SyncError> {
        self.editing
            .and_then(|id| self.core.zone(&id))
            .and_then(Zone::identity_node)
            .ok_or_else(|| SyncError::Validation(Notice::NoLinkTarget.message().to_owned()))
    }

    /// Outgoing references of the selected zone's identity node.
    #[must_use]
    pub fn references(&self) -> Vec<Link> {
        self.editing_node()
            .map(|node| graph::references(self.core.links(), node).into_iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Reference `to` from the selected zone's identity node.
    ///
    /// # Errors
    ///
    /// Returns a validation error without a selected identity node or for a
    /// self-reference, otherwise the store error.
    pub async fn add_reference(&mut self, to: NodeId, label: Option<String>) -> Result<LinkOutcome, SyncError> {
        let from = self.editing_node()?;
        let outcome = self.state.zones().link_nodes(self.campaign_id(), from, to, label).await?;
        match &outcome {
            LinkOutcome::Created(link) => {
                self.core.apply_link(link.clone());
                self.render_needed = true;
            }
            LinkOutcome::AlreadyLinked => self.notices.push(notice_for(Notice::AlreadyConnected)),
        }
        Ok(outcome)
    }

    /// # Errors
    ///
    /// Returns the store error.
    pub async fn remove_reference(&mut self, link_id: LinkId) -> Result<(), SyncError> {
        self.state.zones().remove_link(self.campaign_id(), link_id).await?;
        self.core.remove_link(&link_id);
        self.render_needed = true;
        Ok(())
    }

    // =========================================================================
    // SYNC
    // =========================================================================

    /// Apply pending refresh signals and autosave outcomes without waiting.
    pub async fn sync(&mut self) {
        let mut zones = false;
        let mut links = false;
        while let Some(signal) = self.subscription.try_recv() {
            match signal.topic {
                Topic::Zones => zones = true,
                Topic::Links => links = true,
            }
        }
        self.apply_refresh(zones, links).await;
        self.drain_events().await;
    }

    /// Wait for the next refresh signal or autosave outcome and apply it.
    /// Returns `false` once the bus is gone.
    pub async fn wait(&mut self) -> bool {
        enum Next {
            Signal(Option<Topic>),
            Event(Option<SyncEvent>),
        }

        let next = tokio::select! {
            signal = self.subscription.recv() => Next::Signal(signal.map(|s| s.topic)),
            event = self.events.recv() => Next::Event(event),
        };
        match next {
            Next::Signal(None) => false,
            Next::Signal(Some(topic)) => {
                self.apply_refresh(topic == Topic::Zones, topic == Topic::Links).await;
                self.sync().await;
                true
            }
            Next::Event(event) => {
                if let Some(event) = event {
                    self.handle_event(event).await;
                }
                self.drain_events().await;
                true
            }
        }
    }

    async fn apply_refresh(&mut self, zones: bool, links: bool) {
        if zones {
            if let Err(e) = self.reload_zones().await {
                self.report(&e);
            }
        }
        if links {
            if let Err(e) = self.reload_links().await {
                self.report(&e);
            }
        }
    }

    /// Replace the active zone set with the store's.
    ///
    /// # Errors
    ///
    /// Returns the store error; local state is left untouched.
    pub async fn reload_zones(&mut self) -> Result<(), SyncError> {
        let zones = self.state.store.list_zones(self.map.id).await?;
        self.core.load_zones(zones);

        for id in self.autosave.tracked_zone_ids().await {
            match self.core.zone(&id) {
                Some(zone) => self.autosave.rebase_zone(zone).await,
                None => {
                    self.scheduler.forget_zone(id);
                    self.autosave.untrack_zone(id).await;
                }
            }
        }
        if self.editing.is_some_and(|id| self.core.zone(&id).is_none()) {
            self.editing = None;
        }
        self.render_needed = true;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns the store error; local state is left untouched.
    pub async fn reload_links(&mut self) -> Result<(), SyncError> {
        let links = self.state.store.list_links(self.campaign_id()).await?;
        self.core.load_links(links);
        self.render_needed = true;
        Ok(())
    }

    async fn drain_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.handle_event(event).await;
        }
    }

    async fn handle_event(&mut self, event: SyncEvent) {
        match event {
            SyncEvent::Notice(notice) => self.notices.push(notice),
            SyncEvent::ZoneSaved(zone) => {
                let id = zone.id;
                if self.core.zone(&id).is_none() {
                    return;
                }
                self.core.apply_zone(zone);
                self.render_needed = true;
                if self.editing != Some(id) {
                    self.release_zone(id).await;
                }
            }
            SyncEvent::MapSaved(map) => self.map = map,
            SyncEvent::NodeRenamed(node) => debug!(node_id = %node.id, title = %node.title, "node renamed"),
            SyncEvent::ZoneSettled(id) => {
                if self.editing != Some(id) {
                    self.release_zone(id).await;
                }
            }
            SyncEvent::DocumentSaved(doc) => debug!(node_id = %doc.node_id, "document saved"),
            SyncEvent::ReloadZones => {
                if let Err(e) = self.reload_zones().await {
                    self.report(&e);
                }
            }
        }
    }
}

fn notice_for(notice: Notice) -> UserNotice {
    match notice {
        Notice::AlreadyConnected => UserNotice::info(notice.message()),
        Notice::NoLinkTarget | Notice::NoNodeToEnter => UserNotice::error(notice.message()),
    }
}
