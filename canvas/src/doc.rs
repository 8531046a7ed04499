//! Document model: zones, links, and the in-memory zone store.
//!
//! Data flows into this layer from the session (canonical rows loaded from the
//! store) and from the input engine (optimistic drag positions). The renderer
//! and the connection graph read from [`ZoneStore::sorted_zones`], whose order
//! is the deterministic iteration order everything else relies on.

#[cfg(test)]
#[path = "doc_test.rs"]
mod doc_test;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geometry::{Geometry, ZoneShape};

/// Unique identifier for a zone.
pub type ZoneId = Uuid;
/// Unique identifier for a story node.
pub type NodeId = Uuid;
/// Unique identifier for a map.
pub type MapId = Uuid;
/// Unique identifier for a link.
pub type LinkId = Uuid;
/// Unique identifier for a campaign.
pub type CampaignId = Uuid;

/// What activating a zone does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneAction {
    /// Open the zone's target node.
    #[default]
    OpenNode,
    /// Open another map.
    OpenMap,
    /// Open an external URL.
    OpenUrl,
    /// Marker only.
    None,
}

impl ZoneAction {
    /// The stored string form.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenNode => "open_node",
            Self::OpenMap => "open_map",
            Self::OpenUrl => "open_url",
            Self::None => "none",
        }
    }

    /// Parse the stored string form. Unknown values map to [`ZoneAction::None`].
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "open_node" => Self::OpenNode,
            "open_map" => Self::OpenMap,
            "open_url" => Self::OpenUrl,
            _ => Self::None,
        }
    }
}

/// An active zone on a map.
#[derive(Debug, Clone, PartialEq)]
pub struct Zone {
    /// Unique identifier for this zone.
    pub id: ZoneId,
    /// The map this zone is placed on.
    pub map_id: MapId,
    /// Story node that owns this zone.
    pub node_id: Option<NodeId>,
    /// Distinct node the zone points at, if any.
    pub target_node_id: Option<NodeId>,
    /// Shape kind and validated geometry.
    pub shape: ZoneShape,
    /// Whether non-organizers can see the zone.
    pub is_visible: bool,
    /// Activation behavior.
    pub action: ZoneAction,
    /// Stacking/ordering index; lower values come first.
    pub sort_index: i64,
}

impl Zone {
    /// The node this zone represents for linking: owning node, else target node.
    #[must_use]
    pub fn identity_node(&self) -> Option<NodeId> {
        self.node_id.or(self.target_node_id)
    }

    /// Geometry for rendered shapes.
    #[must_use]
    pub fn geometry(&self) -> Option<&Geometry> {
        self.shape.geometry()
    }
}

/// A directed link between two story nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub id: LinkId,
    pub campaign_id: CampaignId,
    pub from_node_id: NodeId,
    pub to_node_id: NodeId,
    /// Link type, e.g. `"reference"`.
    pub kind: String,
    pub label: Option<String>,
    pub sort_index: i64,
}

impl Link {
    /// Whether this link joins `a` and `b` in either direction.
    #[must_use]
    pub fn joins(&self, a: NodeId, b: NodeId) -> bool {
        (self.from_node_id == a && self.to_node_id == b) || (self.from_node_id == b && self.to_node_id == a)
    }
}

/// In-memory store of active zones.
pub struct ZoneStore {
    zones: HashMap<ZoneId, Zone>,
}

impl ZoneStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self { zones: HashMap::new() }
    }

    /// Insert or replace a zone.
    pub fn insert(&mut self, zone: Zone) {
        self.zones.insert(zone.id, zone);
    }

    /// Remove a zone by id, returning it if it was present.
    pub fn remove(&mut self, id: &ZoneId) -> Option<Zone> {
        self.zones.remove(id)
    }

    /// Return a reference to a zone by id.
    #[must_use]
    pub fn get(&self, id: &ZoneId) -> Option<&Zone> {
        self.zones.get(id)
    }

    /// Whether a zone with this id is present.
    #[must_use]
    pub fn contains(&self, id: &ZoneId) -> bool {
        self.zones.contains_key(id)
    }

    /// Replace a rendered zone's geometry. Returns false if the zone doesn't
    /// exist or isn't a rendered shape.
    pub fn set_geometry(&mut self, id: &ZoneId, geometry: Geometry) -> bool {
        let Some(zone) = self.zones.get_mut(id) else {
            return false;
        };
        if !zone.shape.is_rendered() {
            return false;
        }
        zone.shape = zone.shape.with_geometry(geometry);
        true
    }

    /// Replace all zones with a full snapshot.
    pub fn load_snapshot(&mut self, zones: Vec<Zone>) {
        self.zones.clear();
        for zone in zones {
            self.zones.insert(zone.id, zone);
        }
    }

    /// All zones sorted by `(sort_index, id)`.
    #[must_use]
    pub fn sorted_zones(&self) -> Vec<&Zone> {
        let mut zones: Vec<&Zone> = self.zones.values().collect();
        zones.sort_by(|a, b| a.sort_index.cmp(&b.sort_index).then_with(|| a.id.cmp(&b.id)));
        zones
    }

    /// Largest `sort_index` in the store, if any.
    #[must_use]
    pub fn max_sort_index(&self) -> Option<i64> {
        self.zones.values().map(|z| z.sort_index).max()
    }

    /// Number of zones currently in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.zones.len()
    }

    /// Returns `true` if the store contains no zones.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}

impl Default for ZoneStore {
    fn default() -> Self {
        Self::new()
    }
}
