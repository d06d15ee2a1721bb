//! Density-based clustering of candidates into typed nodes
//!
//! A DBSCAN over candidates projected onto a local metric plane. Candidates
//! within `radius_m` of a core candidate join its cluster; a core candidate
//! has at least `min_support` candidates (itself included) within the
//! radius. Candidates reached by no core are noise.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use fixedbitset::FixedBitSet;
use itertools::Itertools;
use log::debug;
use rstar::RTree;
use rstar::primitives::GeomWithData;

use crate::algo::stability::StabilityWindow;
use crate::config::ClusterParams;
use crate::model::{DetectionStrategy, DwellSegment, Node, NodeStats, NodeType, SurfacePoint};
use crate::spatial::LocalProjection;

/// One clustering input, derived from a segment, a stability window or a
/// single sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub vehicle_id: Arc<str>,
    pub start_time: Option<DateTime<Utc>>,
    /// Position of the source within its vehicle track.
    pub seq: usize,
    pub lat: f64,
    pub lon: f64,
    /// Centroid weight.
    pub weight: f64,
    pub dwell_seconds: f64,
    pub speed: f64,
    pub heading: Option<f64>,
}

impl Candidate {
    /// Weighted by dwell duration, one second at least.
    pub fn from_segment(segment: &DwellSegment) -> Self {
        Self {
            vehicle_id: segment.vehicle_id.clone(),
            start_time: segment.start_time,
            seq: segment.range.start,
            lat: segment.lat,
            lon: segment.lon,
            weight: segment.duration_seconds.max(1.0),
            dwell_seconds: segment.duration_seconds,
            speed: segment.avg_speed,
            heading: None,
        }
    }

    /// Weighted by stability score.
    pub fn from_window(window: &StabilityWindow, start_time: Option<DateTime<Utc>>) -> Self {
        Self {
            vehicle_id: window.vehicle_id.clone(),
            start_time,
            seq: window.start_index,
            lat: window.lat,
            lon: window.lon,
            weight: window.score,
            dwell_seconds: window.duration_seconds,
            speed: window.avg_speed,
            heading: None,
        }
    }

    pub fn from_point(point: &SurfacePoint, seq: usize) -> Self {
        Self {
            vehicle_id: point.vehicle_id.clone(),
            start_time: point.timestamp,
            seq,
            lat: point.lat,
            lon: point.lon,
            weight: 1.0,
            dwell_seconds: 0.0,
            speed: crate::algo::segment::sanitized_speed(point),
            heading: point.heading.filter(|h| h.is_finite()),
        }
    }

    fn order_key(&self) -> (&str, bool, Option<DateTime<Utc>>, usize) {
        (
            &self.vehicle_id,
            self.start_time.is_none(),
            self.start_time,
            self.seq,
        )
    }
}

type Indexed = GeomWithData<[f64; 2], usize>;

/// Clusters candidates of one node type with one detection strategy.
#[derive(Debug, Clone)]
pub struct NodeClusterer {
    node_type: NodeType,
    params: ClusterParams,
    strategy: DetectionStrategy,
    projection: LocalProjection,
}

impl NodeClusterer {
    pub fn new(
        node_type: NodeType,
        params: ClusterParams,
        strategy: DetectionStrategy,
        projection: LocalProjection,
    ) -> Self {
        Self {
            node_type,
            params,
            strategy,
            projection,
        }
    }

    /// Clusters `candidates` into nodes.
    ///
    /// The result does not depend on the order of `candidates`: they are
    /// sorted by vehicle and start time first, and nodes are numbered by
    /// centroid position. Empty input yields no nodes.
    pub fn cluster(&self, candidates: &[Candidate]) -> Vec<Node> {
        if candidates.is_empty() {
            return Vec::new();
        }
        let sorted: Vec<&Candidate> = candidates
            .iter()
            .sorted_by(|a, b| a.order_key().cmp(&b.order_key()))
            .collect();

        let memberships = self.dbscan(&sorted);
        let mut nodes: Vec<Node> = memberships
            .into_iter()
            .filter(|members| members.len() >= self.params.min_support)
            .map(|members| {
                let group: Vec<&Candidate> = members.iter().map(|&i| sorted[i]).collect();
                self.summarize(&group)
            })
            .collect();

        nodes.sort_by(|a, b| a.lat.total_cmp(&b.lat).then(a.lon.total_cmp(&b.lon)));
        for (n, node) in nodes.iter_mut().enumerate() {
            node.id = node_id(self.node_type, self.strategy, n + 1);
        }

        debug!(
            "Clustered {} {} candidates ({:?}) into {} nodes",
            candidates.len(),
            self.node_type,
            self.strategy,
            nodes.len()
        );
        nodes
    }

    /// Member positions of each cluster, in discovery order.
    fn dbscan(&self, sorted: &[&Candidate]) -> Vec<Vec<usize>> {
        let coords: Vec<[f64; 2]> = sorted
            .iter()
            .map(|c| self.projection.project(c.lat, c.lon))
            .collect();
        let tree = RTree::bulk_load(
            coords
                .iter()
                .enumerate()
                .map(|(i, &xy)| Indexed::new(xy, i))
                .collect(),
        );
        let radius_sq = self.params.radius_m * self.params.radius_m;
        let region = |i: usize| -> Vec<usize> {
            let mut found: Vec<usize> = tree
                .locate_within_distance(coords[i], radius_sq)
                .map(|entry| entry.data)
                .collect();
            found.sort_unstable();
            found
        };

        let mut visited = FixedBitSet::with_capacity(sorted.len());
        let mut labels: Vec<Option<usize>> = vec![None; sorted.len()];
        let mut clusters: Vec<Vec<usize>> = Vec::new();

        for i in 0..sorted.len() {
            if visited.put(i) {
                continue;
            }
            let neighbours = region(i);
            if neighbours.len() < self.params.min_support {
                continue;
            }

            let cluster_id = clusters.len();
            clusters.push(Vec::new());
            let mut queue: VecDeque<usize> = neighbours.into();
            labels[i] = Some(cluster_id);
            clusters[cluster_id].push(i);

            while let Some(j) = queue.pop_front() {
                if labels[j].is_none() {
                    labels[j] = Some(cluster_id);
                    clusters[cluster_id].push(j);
                }
                if visited.put(j) {
                    continue;
                }
                let reach = region(j);
                if reach.len() >= self.params.min_support {
                    queue.extend(reach);
                }
            }
        }
        clusters
    }

    #[allow(clippy::cast_precision_loss)]
    fn summarize(&self, members: &[&Candidate]) -> Node {
        let n = members.len() as f64;
        let total_weight: f64 = members
            .iter()
            .map(|c| c.weight)
            .filter(|w| w.is_finite() && *w > 0.0)
            .sum();
        let (lat, lon) = if total_weight > 0.0 {
            members.iter().fold((0.0, 0.0), |(lat, lon), c| {
                let w = if c.weight.is_finite() && c.weight > 0.0 {
                    c.weight
                } else {
                    0.0
                };
                (lat + c.lat * w / total_weight, lon + c.lon * w / total_weight)
            })
        } else {
            let lat = members.iter().map(|c| c.lat).sum::<f64>() / n;
            let lon = members.iter().map(|c| c.lon).sum::<f64>() / n;
            (lat, lon)
        };

        let stats = match self.node_type {
            NodeType::Stand => NodeStats::Stand {
                avg_dwell_seconds: members.iter().map(|c| c.dwell_seconds).sum::<f64>() / n,
            },
            NodeType::Taxiway => NodeStats::Taxiway {
                point_count: members.len(),
            },
            NodeType::Runway => NodeStats::Runway {
                avg_speed: members.iter().map(|c| c.speed).sum::<f64>() / n,
                avg_heading: circular_mean(members.iter().filter_map(|c| c.heading.map(|h| (h, 1.0)))),
            },
        };

        Node {
            id: String::new(),
            node_type: self.node_type,
            lat,
            lon,
            support_count: members.len(),
            stats,
            strategy: self.strategy,
        }
    }
}

fn node_id(node_type: NodeType, strategy: DetectionStrategy, n: usize) -> String {
    match (node_type, strategy) {
        (NodeType::Stand, DetectionStrategy::DwellBased) => format!("stand-d-{n:04}"),
        (NodeType::Stand, DetectionStrategy::StabilityBased) => format!("stand-s-{n:04}"),
        (other, _) => format!("{}-{n:04}", other.id_prefix()),
    }
}

/// Weighted circular mean of headings in degrees, normalized to [0, 360).
///
/// `None` when there are no headings or they cancel out.
pub(crate) fn circular_mean(headings: impl IntoIterator<Item = (f64, f64)>) -> Option<f64> {
    let (mut sin, mut cos, mut any) = (0.0, 0.0, false);
    for (heading, weight) in headings {
        let rad = heading.to_radians();
        sin += rad.sin() * weight;
        cos += rad.cos() * weight;
        any = true;
    }
    if !any || (sin.abs() < 1e-12 && cos.abs() < 1e-12) {
        return None;
    }
    Some(sin.atan2(cos).to_degrees().rem_euclid(360.0))
}
