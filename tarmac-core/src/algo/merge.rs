//! Deduplication of near-coincident same-type nodes

use std::collections::BTreeMap;

use fixedbitset::FixedBitSet;
use log::debug;

use crate::algo::cluster::circular_mean;
use crate::model::{Node, NodeId, NodeStats};
use crate::spatial::haversine_m;

/// Merged nodes plus the id of the survivor each absorbed node went into.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeOutcome {
    pub nodes: Vec<Node>,
    /// Only absorbed ids appear as keys; surviving ids map to themselves
    /// implicitly.
    pub remap: BTreeMap<NodeId, NodeId>,
}

impl MergeOutcome {
    /// The surviving id for `id`.
    pub fn resolve<'a>(&'a self, id: &'a str) -> &'a str {
        self.remap.get(id).map_or(id, String::as_str)
    }
}

/// Greedy same-type grouping within a proximity tolerance.
#[derive(Debug, Clone, Copy)]
pub struct NodeMerger {
    tolerance_m: f64,
}

impl NodeMerger {
    pub fn new(tolerance_m: f64) -> Self {
        Self {
            tolerance_m: tolerance_m.max(0.0),
        }
    }

    /// Walks `nodes` in order; each node not yet absorbed absorbs every later
    /// unabsorbed node of the same type within the tolerance of its original
    /// centroid. Total support is preserved. O(n²).
    pub fn merge(&self, nodes: Vec<Node>) -> MergeOutcome {
        let mut absorbed = FixedBitSet::with_capacity(nodes.len());
        let mut groups: Vec<Vec<usize>> = Vec::new();

        for i in 0..nodes.len() {
            if absorbed.contains(i) {
                continue;
            }
            let mut group = vec![i];
            for j in (i + 1)..nodes.len() {
                if absorbed.contains(j) || nodes[j].node_type != nodes[i].node_type {
                    continue;
                }
                let d = haversine_m(nodes[i].lat, nodes[i].lon, nodes[j].lat, nodes[j].lon);
                if d <= self.tolerance_m {
                    absorbed.insert(j);
                    group.push(j);
                }
            }
            groups.push(group);
        }

        let mut remap = BTreeMap::new();
        let merged: Vec<Node> = groups
            .iter()
            .map(|group| {
                let survivor = &nodes[group[0]];
                for &k in &group[1..] {
                    remap.insert(nodes[k].id.clone(), survivor.id.clone());
                }
                combine(group.iter().map(|&k| &nodes[k]).collect())
            })
            .collect();

        if !remap.is_empty() {
            debug!(
                "Merged {} nodes into {} (tolerance {} m)",
                nodes.len(),
                merged.len(),
                self.tolerance_m
            );
        }
        MergeOutcome {
            nodes: merged,
            remap,
        }
    }
}

/// Free-function form of [`NodeMerger::merge`].
pub fn merge(nodes: Vec<Node>, tolerance_m: f64) -> MergeOutcome {
    NodeMerger::new(tolerance_m).merge(nodes)
}

/// Folds a group into its first member.
#[allow(clippy::cast_precision_loss)]
fn combine(group: Vec<&Node>) -> Node {
    let mut survivor = group[0].clone();
    if group.len() == 1 {
        return survivor;
    }

    let support: usize = group.iter().map(|n| n.support_count).sum();
    // Support of zero only arises from hand-built nodes; weigh them equally.
    let weight = |n: &Node| {
        if support > 0 {
            n.support_count as f64 / support as f64
        } else {
            1.0 / group.len() as f64
        }
    };

    survivor.lat = group.iter().map(|&n| n.lat * weight(n)).sum();
    survivor.lon = group.iter().map(|&n| n.lon * weight(n)).sum();
    survivor.support_count = support;
    survivor.stats = match &survivor.stats {
        NodeStats::Stand { .. } => NodeStats::Stand {
            avg_dwell_seconds: group
                .iter()
                .map(|&n| match n.stats {
                    NodeStats::Stand { avg_dwell_seconds } => avg_dwell_seconds * weight(n),
                    _ => 0.0,
                })
                .sum(),
        },
        NodeStats::Taxiway { .. } => NodeStats::Taxiway {
            point_count: group
                .iter()
                .map(|n| match n.stats {
                    NodeStats::Taxiway { point_count } => point_count,
                    _ => 0,
                })
                .sum(),
        },
        NodeStats::Runway { .. } => {
            let avg_speed = group
                .iter()
                .map(|&n| match n.stats {
                    NodeStats::Runway { avg_speed, .. } => avg_speed * weight(n),
                    _ => 0.0,
                })
                .sum();
            let avg_heading = circular_mean(group.iter().filter_map(|&n| match n.stats {
                NodeStats::Runway {
                    avg_heading: Some(h),
                    ..
                } => Some((h, weight(n))),
                _ => None,
            }));
            NodeStats::Runway {
                avg_speed,
                avg_heading,
            }
        }
    };
    survivor
}
