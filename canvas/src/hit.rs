#[cfg(test)]
#[path = "hit_test.rs"]
mod hit_test;

use crate::camera::Point;
use crate::doc::{Zone, ZoneId, ZoneStore};
use crate::geometry::ZoneShape;

/// Whether `stage_pt` falls inside a zone's marker.
#[must_use]
pub fn zone_contains(zone: &Zone, stage_pt: Point) -> bool {
    match &zone.shape {
        ZoneShape::Circle(g) => {
            let dx = stage_pt.x - g.x;
            let dy = stage_pt.y - g.y;
            dx * dx + dy * dy <= g.radius * g.radius
        }
        ZoneShape::Rect(g) => (stage_pt.x - g.x).abs() <= g.radius && (stage_pt.y - g.y).abs() <= g.radius,
        ZoneShape::Other { .. } => false,
    }
}

/// The topmost zone marker under `stage_pt`, if any.
///
/// Markers are drawn in [`ZoneStore::sorted_zones`] order, so the last match wins.
#[must_use]
pub fn hit_test(stage_pt: Point, zones: &ZoneStore) -> Option<ZoneId> {
    zones
        .sorted_zones()
        .into_iter()
        .rev()
        .find(|z| zone_contains(z, stage_pt))
        .map(|z| z.id)
}
