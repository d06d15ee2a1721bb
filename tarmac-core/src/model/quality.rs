//! Data-quality accounting for one pipeline run

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::node::{DetectionStrategy, NodeId, NodeType};
use super::point::KinematicClass;

/// Why an input record was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    MissingVehicleId,
    MissingPosition,
    InvalidPosition,
    Unreadable,
}

/// Counters of dropped and ambiguous inputs, produced alongside every graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub records_seen: usize,
    pub records_accepted: usize,
    pub dropped: BTreeMap<DropReason, usize>,
    pub unparsable_timestamps: usize,
    /// Vehicles with at least one unparsable timestamp.
    pub vehicles_with_untimed_points: BTreeSet<String>,
    pub points_by_class: BTreeMap<KinematicClass, usize>,
    /// Samples whose speed fell between the taxi and runway thresholds.
    pub ambiguous_speed_points: usize,
    pub vehicles: usize,
    /// Vehicles with fewer than two points.
    pub degenerate_vehicles: usize,
    pub segments_by_class: BTreeMap<KinematicClass, usize>,
    /// Segments whose duration fell back to zero.
    pub segments_without_timing: usize,
    pub candidates_by_type: BTreeMap<NodeType, usize>,
    pub stand_strategies_run: Vec<DetectionStrategy>,
    /// Whether stand detection fell back to stability windows.
    pub stand_fallback_used: bool,
    /// Absorbed node id to surviving id.
    pub merged_node_ids: BTreeMap<NodeId, NodeId>,
    /// Points linked to no node within the link distance.
    pub unlinked_points: usize,
    /// Surface points without a timestamp, left out of edge inference.
    pub points_without_order: usize,
}

impl QualityReport {
    pub fn record_drop(&mut self, reason: DropReason) {
        *self.dropped.entry(reason).or_default() += 1;
    }

    pub fn dropped_total(&self) -> usize {
        self.dropped.values().sum()
    }
}
