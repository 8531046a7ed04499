//! Display list for the map canvas.
//!
//! The host draws whatever [`scene`] returns, in order: connector lines first
//! so they sit beneath the zone markers, then one marker per rendered zone in
//! stacking order. Styling beyond geometry and color is left to the host.

#[cfg(test)]
#[path = "render_test.rs"]
mod render_test;

use crate::camera::Point;
use crate::doc::ZoneId;
use crate::engine::EngineCore;
use crate::geometry::{ZoneShape, label_font_size};

/// Marker outline kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Circle,
    Rect,
}

/// One item of the display list, in stage coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawItem {
    /// Connector line between two markers.
    Line { key: String, from: Point, to: Point },
    /// A zone marker with its centered label.
    Marker {
        zone_id: ZoneId,
        kind: MarkerKind,
        center: Point,
        radius: f64,
        color: String,
        label: String,
        font_size: f64,
        selected: bool,
        /// This zone is the source of a pending connection.
        connecting: bool,
    },
}

/// Build the display list for the current engine state.
#[must_use]
pub fn scene(core: &EngineCore) -> Vec<DrawItem> {
    let mut items: Vec<DrawItem> = core
        .connections()
        .iter()
        .map(|c| DrawItem::Line { key: c.key.clone(), from: c.from, to: c.to })
        .collect();

    let selected = core.selection();
    let pending = core.pending_connection();
    for zone in core.zones.sorted_zones() {
        let kind = match &zone.shape {
            ZoneShape::Circle(_) => MarkerKind::Circle,
            ZoneShape::Rect(_) => MarkerKind::Rect,
            ZoneShape::Other { .. } => continue,
        };
        let Some(g) = zone.geometry() else {
            continue;
        };
        items.push(DrawItem::Marker {
            zone_id: zone.id,
            kind,
            center: g.center(),
            radius: g.radius,
            color: g.color.clone(),
            label: g.icon.clone(),
            font_size: label_font_size(g.radius, &g.icon),
            selected: selected == Some(zone.id),
            connecting: pending == Some(zone.id),
        });
    }
    items
}
