//! Zone connection graph.
//!
//! Links join story nodes; the canvas draws them between the zones that
//! represent those nodes. Each identity node maps to exactly one
//! representative zone (the first rendered zone encountered in sorted order),
//! and a link and its mirror collapse into a single connector line keyed by
//! the two zone ids sorted and joined.

#[cfg(test)]
#[path = "graph_test.rs"]
mod graph_test;

use std::collections::{HashMap, HashSet};

use crate::camera::Point;
use crate::doc::{Link, LinkId, NodeId, Zone, ZoneId};

/// A connector line between two zone markers.
#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    /// Sorted `"<zone>:<zone>"` key; unique per unordered zone pair.
    pub key: String,
    /// The link that produced this line (the first one seen for the pair).
    pub link_id: LinkId,
    pub from_zone: ZoneId,
    pub to_zone: ZoneId,
    pub from: Point,
    pub to: Point,
}

/// Key for an unordered pair of zones.
#[must_use]
pub fn connection_key(a: ZoneId, b: ZoneId) -> String {
    if a <= b { format!("{a}:{b}") } else { format!("{b}:{a}") }
}

/// Map each identity node to its representative rendered zone.
///
/// `zones` must be in deterministic order; the first zone per node wins.
#[must_use]
pub fn representatives<'a>(zones: &[&'a Zone]) -> HashMap<NodeId, &'a Zone> {
    let mut by_node: HashMap<NodeId, &'a Zone> = HashMap::new();
    for &zone in zones {
        if !zone.shape.is_rendered() {
            continue;
        }
        if let Some(node) = zone.identity_node() {
            by_node.entry(node).or_insert(zone);
        }
    }
    by_node
}

/// Derive connector lines for `links` between the given zones.
#[must_use]
pub fn connections(zones: &[&Zone], links: &[Link]) -> Vec<Connection> {
    let by_node = representatives(zones);
    let mut seen: HashSet<String> = HashSet::new();
    let mut lines = Vec::new();

    for link in links {
        let (Some(from), Some(to)) = (by_node.get(&link.from_node_id), by_node.get(&link.to_node_id)) else {
            continue;
        };
        if from.id == to.id {
            continue;
        }
        let (Some(from_geo), Some(to_geo)) = (from.geometry(), to.geometry()) else {
            continue;
        };
        let key = connection_key(from.id, to.id);
        if !seen.insert(key.clone()) {
            continue;
        }
        lines.push(Connection {
            key,
            link_id: link.id,
            from_zone: from.id,
            to_zone: to.id,
            from: from_geo.center(),
            to: to_geo.center(),
        });
    }
    lines
}

/// Whether any link joins `a` and `b`, in either direction.
#[must_use]
pub fn are_linked(links: &[Link], a: NodeId, b: NodeId) -> bool {
    links.iter().any(|l| l.joins(a, b))
}

/// Outgoing links of `node`, in `sort_index` order.
#[must_use]
pub fn references(links: &[Link], node: NodeId) -> Vec<&Link> {
    let mut out: Vec<&Link> = links.iter().filter(|l| l.from_node_id == node).collect();
    out.sort_by_key(|l| l.sort_index);
    out
}
