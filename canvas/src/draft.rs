//! Editable drafts and their dirty predicates.
//!
//! A draft is dirty when it differs from the last persisted snapshot after
//! both sides go through the same normalization: strings are trimmed, radius
//! and icon are clamped, and zone colors compare by hex plus an alpha
//! tolerance rather than by string.

#[cfg(test)]
#[path = "draft_test.rs"]
mod draft_test;

use crate::doc::Zone;
use crate::geometry::{
    Geometry, clamp_radius, color_from_hex_and_opacity, colors_equivalent, decode_color, normalize_icon,
};

/// Pure comparison of a draft against its last saved snapshot.
pub trait Dirty {
    /// Whether `self` (the draft) differs from `saved` under normalization.
    fn is_dirty(&self, saved: &Self) -> bool;
}

/// Map properties edited in the side panel.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MapDraft {
    pub name: String,
}

impl Dirty for MapDraft {
    fn is_dirty(&self, saved: &Self) -> bool {
        self.name.trim() != saved.name.trim()
    }
}

/// Zone properties edited in the property panel.
///
/// `color` is the base hex; `opacity` is 0–100 and composes with it into the
/// stored color.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneDraft {
    /// Title of the zone's identity node.
    pub name: String,
    pub icon: String,
    pub color: String,
    pub opacity: f64,
    pub radius: f64,
    pub is_visible: bool,
}

impl ZoneDraft {
    /// Draft for an existing zone. `name` comes from its identity node.
    #[must_use]
    pub fn from_zone(zone: &Zone, name: &str) -> Self {
        let geometry = zone.geometry().cloned().unwrap_or_default();
        let decoded = decode_color(&geometry.color);
        Self {
            name: name.to_owned(),
            icon: geometry.icon,
            color: decoded.as_ref().map_or_else(|| geometry.color.clone(), |d| d.hex.clone()),
            opacity: decoded.map_or(100.0, |d| d.opacity),
            radius: geometry.radius,
            is_visible: zone.is_visible,
        }
    }

    /// The color string that would be persisted.
    #[must_use]
    pub fn stored_color(&self) -> String {
        color_from_hex_and_opacity(&self.color, self.opacity)
    }

    /// Apply the draft's style fields onto `base`, keeping its position.
    #[must_use]
    pub fn apply_to(&self, base: &Geometry) -> Geometry {
        Geometry {
            radius: clamp_radius(self.radius),
            color: self.stored_color(),
            icon: normalize_icon(&self.icon),
            ..base.clone()
        }
        .clamped()
    }

    /// Whether the geometry-affecting fields differ (as opposed to name/visibility).
    #[must_use]
    pub fn style_differs(&self, saved: &Self) -> bool {
        normalize_icon(&self.icon) != normalize_icon(&saved.icon)
            || (clamp_radius(self.radius) - clamp_radius(saved.radius)).abs() > f64::EPSILON
            || !colors_equivalent(&self.stored_color(), &saved.stored_color())
    }

    /// Whether the node title differs.
    #[must_use]
    pub fn name_differs(&self, saved: &Self) -> bool {
        self.name.trim() != saved.name.trim()
    }
}

impl Dirty for ZoneDraft {
    fn is_dirty(&self, saved: &Self) -> bool {
        self.name_differs(saved) || self.is_visible != saved.is_visible || self.style_differs(saved)
    }
}

/// The rich-text document bound to a node. The body is an opaque HTML string.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DocumentDraft {
    pub title: String,
    pub body: String,
}

impl Dirty for DocumentDraft {
    fn is_dirty(&self, saved: &Self) -> bool {
        self.title.trim() != saved.title.trim() || self.body.trim() != saved.body.trim()
    }
}

/// A draft paired with the last persisted snapshot it is compared against.
#[derive(Debug, Clone, PartialEq)]
pub struct Tracked<T> {
    pub draft: T,
    pub saved: T,
}

impl<T: Dirty + Clone> Tracked<T> {
    /// Start clean: the draft equals the persisted snapshot.
    #[must_use]
    pub fn new(saved: T) -> Self {
        Self { draft: saved.clone(), saved }
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.draft.is_dirty(&self.saved)
    }

    /// Replace the snapshot with what the store returned. The draft is kept,
    /// so edits made while a save was in flight stay dirty.
    pub fn settle(&mut self, saved: T) {
        self.saved = saved;
    }
}
