//! Edge inference from node visit sequences
//!
//! Every surface point of a track is snapped to its nearest node within the
//! link distance. Consecutive snaps to the same node collapse into one
//! visit, and each pair of consecutive visits counts as one transition.
//! Points without a timestamp have no place in that sequence and are
//! skipped.

use std::collections::BTreeSet;
use std::ops::AddAssign;

use hashbrown::HashMap;
use log::debug;
use rayon::prelude::*;

use crate::model::{Edge, EdgeKey, KinematicClass, Node, SurfacePoint, VehicleTrack};
use crate::spatial::{NearestNode, haversine_m};

#[derive(Debug, Clone, Default, PartialEq)]
struct Tally {
    usage: u64,
    classes: BTreeSet<KinematicClass>,
}

/// Usage counters keyed by canonical node pair.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeUsage {
    counts: HashMap<EdgeKey, Tally>,
}

impl EdgeUsage {
    /// Counts one transition between `a` and `b`, observed while moving in
    /// `class`. Returns `false`, counting nothing, for a self-transition.
    pub fn record(&mut self, a: &str, b: &str, class: KinematicClass) -> bool {
        let Some(key) = EdgeKey::new(a, b) else {
            return false;
        };
        let tally = self.counts.entry(key).or_default();
        tally.usage += 1;
        tally.classes.insert(class);
        true
    }

    /// Adds `other`'s counts into `self`.
    pub fn absorb(&mut self, other: EdgeUsage) {
        for (key, tally) in other.counts {
            let entry = self.counts.entry(key).or_default();
            entry.usage += tally.usage;
            entry.classes.extend(tally.classes);
        }
    }

    pub fn usage(&self, a: &str, b: &str) -> u64 {
        EdgeKey::new(a, b)
            .and_then(|key| self.counts.get(&key))
            .map_or(0, |t| t.usage)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.counts.values().map(|t| t.usage).sum()
    }
}

/// Surface points left out of visit sequences.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Skipped {
    /// No node within the link distance.
    pub unlinked: usize,
    /// No timestamp, so no defined position in the track.
    pub unordered: usize,
}

impl AddAssign for Skipped {
    fn add_assign(&mut self, other: Skipped) {
        self.unlinked += other.unlinked;
        self.unordered += other.unordered;
    }
}

/// Result of assembling all tracks.
#[derive(Debug, Clone, Default)]
pub struct Assembly {
    /// Sorted by canonical key.
    pub edges: Vec<Edge>,
    pub skipped: Skipped,
}

/// Links a frozen node set through vehicle tracks.
pub struct GraphAssembler<'a> {
    nodes: &'a [Node],
    index: &'a dyn NearestNode,
    positions: HashMap<&'a str, usize>,
}

impl<'a> GraphAssembler<'a> {
    /// `index` must have been built over `nodes`.
    pub fn new(nodes: &'a [Node], index: &'a dyn NearestNode) -> Self {
        let positions = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.as_str(), i))
            .collect();
        Self {
            nodes,
            index,
            positions,
        }
    }

    /// Distinct consecutive node visits of a sorted track, with the class of
    /// the point that opened each visit, and the surface points skipped.
    /// Airborne points are ignored.
    pub fn visits(&self, points: &[SurfacePoint]) -> (Vec<(usize, KinematicClass)>, Skipped) {
        let mut visits: Vec<(usize, KinematicClass)> = Vec::new();
        let mut skipped = Skipped::default();
        for point in points.iter().filter(|p| p.class.is_surface()) {
            if point.timestamp.is_none() {
                skipped.unordered += 1;
                continue;
            }
            match self.index.nearest(point.lat, point.lon) {
                Some((idx, _)) => {
                    if visits.last().is_none_or(|&(last, _)| last != idx) {
                        visits.push((idx, point.class));
                    }
                }
                None => skipped.unlinked += 1,
            }
        }
        (visits, skipped)
    }

    /// Adds the transitions of one track to `usage`.
    pub fn tally_track(&self, points: &[SurfacePoint], usage: &mut EdgeUsage) -> Skipped {
        let (visits, skipped) = self.visits(points);
        for pair in visits.windows(2) {
            let (from, _) = pair[0];
            let (to, class) = pair[1];
            usage.record(&self.nodes[from].id, &self.nodes[to].id, class);
        }
        skipped
    }

    /// Edge usage over all tracks, aggregated per worker and reduced once.
    /// Tracks with fewer than two points are skipped.
    pub fn usage(&self, tracks: &[VehicleTrack]) -> (EdgeUsage, Skipped) {
        tracks
            .par_iter()
            .filter(|track| !track.is_degenerate())
            .fold(
                || (EdgeUsage::default(), Skipped::default()),
                |(mut usage, mut skipped), track| {
                    skipped += self.tally_track(&track.points, &mut usage);
                    (usage, skipped)
                },
            )
            .reduce(
                || (EdgeUsage::default(), Skipped::default()),
                |(mut left, mut a), (right, b)| {
                    left.absorb(right);
                    a += b;
                    (left, a)
                },
            )
    }

    pub fn assemble(&self, tracks: &[VehicleTrack]) -> Assembly {
        let (usage, skipped) = self.usage(tracks);
        let edges = self.materialize(usage);
        debug!(
            "Assembled {} edges from {} tracks ({} unlinked, {} unordered points)",
            edges.len(),
            tracks.len(),
            skipped.unlinked,
            skipped.unordered
        );
        Assembly { edges, skipped }
    }

    /// Turns counters into edges with centroid distances, sorted by key.
    pub fn materialize(&self, usage: EdgeUsage) -> Vec<Edge> {
        let mut edges: Vec<Edge> = usage
            .counts
            .into_iter()
            .filter_map(|(key, tally)| {
                let a = &self.nodes[*self.positions.get(key.node_a())?];
                let b = &self.nodes[*self.positions.get(key.node_b())?];
                let distance_m = haversine_m(a.lat, a.lon, b.lat, b.lon);
                let (node_a, node_b) = key.into_parts();
                Some(Edge {
                    node_a,
                    node_b,
                    distance_m,
                    usage_count: tally.usage,
                    edge_types: tally.classes,
                })
            })
            .collect();
        edges.sort_by(|x, y| (&x.node_a, &x.node_b).cmp(&(&y.node_a, &y.node_b)));
        edges
    }
}
