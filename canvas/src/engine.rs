use crate::camera::{Point, Viewport, ZoomDirection};
use crate::doc::{Link, LinkId, NodeId, Zone, ZoneId, ZoneStore};
use crate::geometry::{Geometry, clamp_to_stage};
use crate::graph::{self, Connection};
use crate::hit::hit_test;
use crate::input::{Button, InputState, UiState, WheelDelta};

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

/// User-facing notices raised by gestures that perform no mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    /// The two zones' nodes are already linked in some direction.
    AlreadyConnected,
    /// The clicked zone has no identity node to link to or from.
    NoLinkTarget,
    /// The double-clicked zone has no node to open.
    NoNodeToEnter,
}

impl Notice {
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::AlreadyConnected => "already connected",
            Self::NoLinkTarget => "no target node to link",
            Self::NoNodeToEnter => "zone has no node to open",
        }
    }
}

/// Actions returned from input handlers for the host to process.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// The scene changed and should be redrawn.
    RenderNeeded,
    /// Selection changed.
    ZoneSelected(Option<ZoneId>),
    /// A drag finished; persist the final geometry.
    ZoneMoved { id: ZoneId, geometry: Geometry },
    /// Create a zone centered at this stage point.
    SpawnZone { at: Point },
    /// A connection is waiting for its second zone.
    ConnectionStarted { source: ZoneId },
    /// The pending connection was dropped without a link.
    ConnectionCancelled,
    /// Create a link between the two zones' identity nodes.
    LinkRequested { from_zone: ZoneId, to_zone: ZoneId, from_node: NodeId, to_node: NodeId },
    /// Open the zone's identity node.
    EnterNode { zone_id: ZoneId, node_id: NodeId },
    /// Report something to the user without mutating anything.
    Notice(Notice),
}

/// Core engine state: zones, links, viewport, and the gesture machine.
pub struct EngineCore {
    pub zones: ZoneStore,
    pub viewport: Viewport,
    pub ui: UiState,
    pub input: InputState,
    /// Client position of the viewport's top-left corner.
    pub origin: Point,
    links: Vec<Link>,
    connections: Vec<Connection>,
}

impl Default for EngineCore {
    fn default() -> Self {
        Self {
            zones: ZoneStore::new(),
            viewport: Viewport::default(),
            ui: UiState::default(),
            input: InputState::default(),
            origin: Point::new(0.0, 0.0),
            links: Vec::new(),
            connections: Vec::new(),
        }
    }
}

impl EngineCore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // --- Data inputs ---

    /// Replace the active zone set.
    ///
    /// A zone under an active drag keeps its local position. Selection and
    /// pending-connection references to zones that vanished are dropped.
    pub fn load_zones(&mut self, zones: Vec<Zone>) {
        let dragged = self
            .input
            .dragging_zone()
            .and_then(|id| self.zones.get(&id).and_then(Zone::geometry).map(|g| (id, g.center())));

        self.zones.load_snapshot(zones);

        if let Some((id, center)) = dragged {
            let local = self.zones.get(&id).and_then(Zone::geometry).map(|g| g.with_center(center));
            if let Some(geometry) = local {
                self.zones.set_geometry(&id, geometry);
            }
        }
        self.drop_missing_references();
        self.refresh_connections();
    }

    /// Replace the link set.
    pub fn load_links(&mut self, links: Vec<Link>) {
        self.links = links;
        self.refresh_connections();
    }

    /// Insert or replace a single zone with a canonical row.
    ///
    /// If that zone is mid-drag, the local position wins.
    pub fn apply_zone(&mut self, mut zone: Zone) {
        if self.input.dragging_zone() == Some(zone.id) {
            let center = self.zones.get(&zone.id).and_then(Zone::geometry).map(Geometry::center);
            if let (Some(center), Some(geometry)) = (center, zone.shape.geometry()) {
                zone.shape = zone.shape.with_geometry(geometry.with_center(center));
            }
        }
        self.zones.insert(zone);
        self.refresh_connections();
    }

    /// Remove a zone and any references to it.
    pub fn remove_zone(&mut self, id: &ZoneId) {
        self.zones.remove(id);
        self.drop_missing_references();
        self.refresh_connections();
    }

    /// Add a link record.
    pub fn apply_link(&mut self, link: Link) {
        self.links.retain(|l| l.id != link.id);
        self.links.push(link);
        self.refresh_connections();
    }

    /// Remove a link record.
    pub fn remove_link(&mut self, id: &LinkId) {
        self.links.retain(|l| l.id != *id);
        self.refresh_connections();
    }

    /// Update the viewport origin (the canvas element's client offset).
    pub fn set_origin(&mut self, origin: Point) {
        self.origin = origin;
    }

    /// Select a zone directly (e.g. from a list outside the canvas).
    pub fn select(&mut self, id: Option<ZoneId>) -> Vec<Action> {
        let id = id.filter(|id| self.zones.contains(id));
        if self.ui.selected_id == id {
            return Vec::new();
        }
        self.ui.selected_id = id;
        vec![Action::ZoneSelected(id), Action::RenderNeeded]
    }

    /// Drop any pending connection request.
    pub fn cancel_connection(&mut self) -> Vec<Action> {
        if self.input.pending_source().is_none() {
            return Vec::new();
        }
        self.input.set_pending(None);
        vec![Action::ConnectionCancelled, Action::RenderNeeded]
    }

    // --- Input events ---

    pub fn on_pointer_down(&mut self, client: Point, button: Button) -> Vec<Action> {
        if self.input.is_gesture_active() {
            return Vec::new();
        }
        let stage = self.viewport.client_to_stage(client, self.origin);
        let hit = hit_test(stage, &self.zones);
        let pending = self.input.pending_source();

        match (button, hit) {
            (Button::Secondary, None) => {
                self.input = InputState::Panning { start_pointer: client, start_view: self.viewport, pending };
                Vec::new()
            }
            (Button::Primary, Some(id)) => {
                let Some(center) = self.zones.get(&id).and_then(Zone::geometry).map(Geometry::center) else {
                    return Vec::new();
                };
                self.input = InputState::DraggingZone { id, offset: stage.sub(center), moved: false, pending };
                self.select(Some(id))
            }
            (Button::Primary, None) => self.select(None),
            _ => Vec::new(),
        }
    }

    pub fn on_pointer_move(&mut self, client: Point) -> Vec<Action> {
        match self.input.clone() {
            InputState::Panning { start_pointer, start_view, .. } => {
                self.viewport = start_view.panned(start_pointer, client);
                vec![Action::RenderNeeded]
            }
            InputState::DraggingZone { id, offset, pending, .. } => {
                let stage = self.viewport.client_to_stage(client, self.origin);
                let target = clamp_to_stage(stage.sub(offset));
                let Some(geometry) = self.zones.get(&id).and_then(Zone::geometry).map(|g| g.with_center(target)) else {
                    return Vec::new();
                };
                self.zones.set_geometry(&id, geometry);
                self.input = InputState::DraggingZone { id, offset, moved: true, pending };
                self.refresh_connections();
                vec![Action::RenderNeeded]
            }
            InputState::Idle | InputState::PendingConnection { .. } => Vec::new(),
        }
    }

    /// Any button released anywhere ends the active pan or drag.
    pub fn on_pointer_up(&mut self, _client: Point, _button: Button) -> Vec<Action> {
        match self.input.clone() {
            InputState::Panning { pending, .. } => {
                self.input = InputState::settled(pending);
                Vec::new()
            }
            InputState::DraggingZone { id, moved, pending, .. } => {
                self.input = InputState::settled(pending);
                if !moved {
                    return Vec::new();
                }
                match self.zones.get(&id).and_then(Zone::geometry) {
                    Some(geometry) => vec![Action::ZoneMoved { id, geometry: geometry.clone() }],
                    None => Vec::new(),
                }
            }
            InputState::Idle | InputState::PendingConnection { .. } => Vec::new(),
        }
    }

    /// Zoom one step about the cursor.
    pub fn on_wheel(&mut self, client: Point, delta: WheelDelta) -> Vec<Action> {
        let Some(direction) = ZoomDirection::from_wheel_dy(delta.dy) else {
            return Vec::new();
        };
        let next = self.viewport.zoomed_at(client.sub(self.origin), direction);
        if next == self.viewport {
            return Vec::new();
        }
        self.viewport = next;
        vec![Action::RenderNeeded]
    }

    /// Secondary-button context gesture: start, complete, or cancel a connection.
    pub fn on_context_menu(&mut self, client: Point) -> Vec<Action> {
        let stage = self.viewport.client_to_stage(client, self.origin);
        let Some(target) = hit_test(stage, &self.zones) else {
            return self.cancel_connection();
        };

        let Some(source) = self.input.pending_source() else {
            self.input.set_pending(Some(target));
            return vec![Action::ConnectionStarted { source: target }, Action::RenderNeeded];
        };
        if source == target {
            return self.cancel_connection();
        }

        let from_node = self.zones.get(&source).and_then(Zone::identity_node);
        let to_node = self.zones.get(&target).and_then(Zone::identity_node);
        let (Some(from_node), Some(to_node)) = (from_node, to_node) else {
            return vec![Action::Notice(Notice::NoLinkTarget)];
        };

        self.input.set_pending(None);
        if graph::are_linked(&self.links, from_node, to_node) {
            return vec![Action::Notice(Notice::AlreadyConnected), Action::RenderNeeded];
        }
        vec![
            Action::LinkRequested { from_zone: source, to_zone: target, from_node, to_node },
            Action::RenderNeeded,
        ]
    }

    /// Double-click: enter a zone's node, or spawn a zone on empty canvas.
    pub fn on_double_click(&mut self, client: Point) -> Vec<Action> {
        let stage = self.viewport.client_to_stage(client, self.origin);
        match hit_test(stage, &self.zones) {
            Some(zone_id) => match self.zones.get(&zone_id).and_then(Zone::identity_node) {
                Some(node_id) => vec![Action::EnterNode { zone_id, node_id }],
                None => vec![Action::Notice(Notice::NoNodeToEnter)],
            },
            None => vec![Action::SpawnZone { at: clamp_to_stage(stage) }],
        }
    }

    // --- Queries ---

    /// The currently selected zone, if any.
    #[must_use]
    pub fn selection(&self) -> Option<ZoneId> {
        self.ui.selected_id
    }

    /// The current viewport.
    #[must_use]
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Look up a zone by id.
    #[must_use]
    pub fn zone(&self, id: &ZoneId) -> Option<&Zone> {
        self.zones.get(id)
    }

    /// All links currently known.
    #[must_use]
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Connector lines for the current zones and links.
    #[must_use]
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Source zone of the pending connection, if any.
    #[must_use]
    pub fn pending_connection(&self) -> Option<ZoneId> {
        self.input.pending_source()
    }

    // --- Internals ---

    fn refresh_connections(&mut self) {
        let zones = self.zones.sorted_zones();
        self.connections = graph::connections(&zones, &self.links);
    }

    fn drop_missing_references(&mut self) {
        if let Some(id) = self.ui.selected_id {
            if !self.zones.contains(&id) {
                self.ui.selected_id = None;
            }
        }
        if let Some(id) = self.input.dragging_zone() {
            if !self.zones.contains(&id) {
                self.input = InputState::settled(self.input.pending_source());
            }
        }
        if let Some(source) = self.input.pending_source() {
            if !self.zones.contains(&source) {
                self.input.set_pending(None);
            }
        }
    }
}
