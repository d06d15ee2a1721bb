//! End-to-end graph inference: ingest, segment, cluster, merge, assemble.

use std::collections::BTreeMap;

use log::{debug, info, warn};
use rayon::prelude::*;

use crate::Error;
use crate::algo::assemble::GraphAssembler;
use crate::algo::cluster::{Candidate, NodeClusterer};
use crate::algo::merge::NodeMerger;
use crate::algo::segment::segment_class;
use crate::algo::stability::stable_windows;
use crate::config::{PipelineConfig, SegmentConfig, StabilityConfig, StandDetection};
use crate::loading::{Batch, RawRecord, ingest};
use crate::model::{
    DetectionStrategy, KinematicClass, Node, NodeType, QualityReport, TopologyGraph, VehicleTrack,
};
use crate::spatial::{LocalProjection, build_index};

/// The inferred graph and the data-quality counters of the run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub graph: TopologyGraph,
    pub quality: QualityReport,
}

/// Runs the whole pipeline over raw records.
///
/// Malformed records, bad timestamps and empty node classes never fail the
/// run; they are counted in the quality report and the graph may be empty.
///
/// # Errors
///
/// Returns [`Error::InvalidConfig`] before any work if `config` does not
/// validate.
pub fn build_topology(
    records: impl IntoIterator<Item = RawRecord>,
    config: &PipelineConfig,
) -> Result<PipelineOutput, Error> {
    config.validate()?;
    let batch = ingest(records, &config.classifier);
    build_from_batch(batch, config)
}

/// Same as [`build_topology`] for records that were already ingested.
///
/// # Errors
///
/// Returns [`Error::InvalidConfig`] if `config` does not validate.
pub fn build_from_batch(batch: Batch, config: &PipelineConfig) -> Result<PipelineOutput, Error> {
    config.validate()?;
    let Batch { tracks, mut report } = batch;

    let surface = tracks
        .iter()
        .flat_map(|t| t.points.iter())
        .filter(|p| p.class.is_surface())
        .map(|p| (p.lat, p.lon));
    let Some(projection) = LocalProjection::around(surface) else {
        warn!("No surface points to infer a graph from");
        return Ok(PipelineOutput {
            graph: TopologyGraph::empty(),
            quality: report,
        });
    };

    let extracted = extract_candidates(&tracks, &config.segments);
    report.segments_by_class = extracted.segments_by_class;
    report.segments_without_timing = extracted.untimed_segments;
    debug!(
        "Extracted {} stand, {} taxiway and {} runway candidates",
        extracted.stand.len(),
        extracted.taxiway.len(),
        extracted.runway.len()
    );

    let clusterer = |node_type: NodeType, strategy: DetectionStrategy| {
        let params = match node_type {
            NodeType::Stand => config.clusters.stand,
            NodeType::Taxiway => config.clusters.taxiway,
            NodeType::Runway => config.clusters.runway,
        };
        NodeClusterer::new(node_type, params, strategy, projection)
    };

    let mut nodes = detect_stands(
        &tracks,
        &extracted.stand,
        config,
        |strategy| clusterer(NodeType::Stand, strategy),
        &mut report,
    );
    report
        .candidates_by_type
        .insert(NodeType::Taxiway, extracted.taxiway.len());
    report
        .candidates_by_type
        .insert(NodeType::Runway, extracted.runway.len());
    nodes.extend(clusterer(NodeType::Taxiway, DetectionStrategy::DwellBased).cluster(&extracted.taxiway));
    nodes.extend(clusterer(NodeType::Runway, DetectionStrategy::DwellBased).cluster(&extracted.runway));

    let outcome = NodeMerger::new(config.merge_tolerance_m).merge(nodes);
    report.merged_node_ids = outcome.remap;
    let nodes = outcome.nodes;

    let index = build_index(config.spatial_index, &nodes, config.max_link_distance_m);
    let assembly = GraphAssembler::new(&nodes, index.as_ref()).assemble(&tracks);
    report.unlinked_points = assembly.skipped.unlinked;
    report.points_without_order = assembly.skipped.unordered;

    let graph = TopologyGraph::new(nodes, assembly.edges)?;
    info!(
        "Inferred {} nodes and {} edges from {} vehicles",
        graph.node_count(),
        graph.edge_count(),
        report.vehicles
    );
    let isolated = graph.isolated_nodes().len();
    if isolated > 0 {
        debug!("{isolated} nodes have no incident edges");
    }
    Ok(PipelineOutput {
        graph,
        quality: report,
    })
}

#[derive(Debug, Default)]
struct Extracted {
    stand: Vec<Candidate>,
    taxiway: Vec<Candidate>,
    runway: Vec<Candidate>,
    segments_by_class: BTreeMap<KinematicClass, usize>,
    untimed_segments: usize,
}

impl Extracted {
    fn absorb(&mut self, other: Extracted) {
        self.stand.extend(other.stand);
        self.taxiway.extend(other.taxiway);
        self.runway.extend(other.runway);
        for (class, count) in other.segments_by_class {
            *self.segments_by_class.entry(class).or_default() += count;
        }
        self.untimed_segments += other.untimed_segments;
    }
}

/// Per-vehicle fan-out, collected in vehicle order.
fn extract_candidates(tracks: &[VehicleTrack], config: &SegmentConfig) -> Extracted {
    let per_vehicle: Vec<Extracted> = tracks
        .par_iter()
        .filter(|track| !track.is_degenerate())
        .map(|track| extract_vehicle(track, config))
        .collect();
    per_vehicle
        .into_iter()
        .fold(Extracted::default(), |mut acc, next| {
            acc.absorb(next);
            acc
        })
}

fn extract_vehicle(track: &VehicleTrack, config: &SegmentConfig) -> Extracted {
    let points = &track.points;
    let mut out = Extracted::default();

    let count = |class: KinematicClass, timed: bool, out: &mut Extracted| {
        *out.segments_by_class.entry(class).or_default() += 1;
        if !timed {
            out.untimed_segments += 1;
        }
    };

    for segment in segment_class(points, KinematicClass::Stationary, config.stand) {
        count(KinematicClass::Stationary, segment.timing_valid, &mut out);
        out.stand.push(Candidate::from_segment(&segment));
    }
    for (class, params) in [
        (KinematicClass::Taxi, config.taxi),
        (KinematicClass::Runway, config.runway),
    ] {
        for segment in segment_class(points, class, params) {
            count(class, segment.timing_valid, &mut out);
            let members = points[segment.range.clone()]
                .iter()
                .zip(segment.range.clone())
                .map(|(point, seq)| Candidate::from_point(point, seq));
            match class {
                KinematicClass::Runway => out.runway.extend(members),
                _ => out.taxiway.extend(members),
            }
        }
    }
    out
}

fn stability_candidates(tracks: &[VehicleTrack], config: &StabilityConfig) -> Vec<Candidate> {
    let per_vehicle: Vec<Vec<Candidate>> = tracks
        .par_iter()
        .filter(|track| !track.is_degenerate())
        .map(|track| {
            stable_windows(&track.points, config)
                .iter()
                .map(|window| {
                    let start = track.points.get(window.start_index).and_then(|p| p.timestamp);
                    Candidate::from_window(window, start)
                })
                .collect()
        })
        .collect();
    per_vehicle.concat()
}

/// Runs the configured stand tiers and returns their nodes.
fn detect_stands(
    tracks: &[VehicleTrack],
    dwell_candidates: &[Candidate],
    config: &PipelineConfig,
    clusterer: impl Fn(DetectionStrategy) -> NodeClusterer,
    report: &mut QualityReport,
) -> Vec<Node> {
    let mut candidates = 0;
    let mut run = |strategy: DetectionStrategy, report: &mut QualityReport| -> Vec<Node> {
        report.stand_strategies_run.push(strategy);
        match strategy {
            DetectionStrategy::DwellBased => {
                candidates += dwell_candidates.len();
                clusterer(strategy).cluster(dwell_candidates)
            }
            DetectionStrategy::StabilityBased => {
                let windows = stability_candidates(tracks, &config.stability);
                candidates += windows.len();
                clusterer(strategy).cluster(&windows)
            }
        }
    };

    let nodes = match config.stand_detection {
        StandDetection::DwellOnly => run(DetectionStrategy::DwellBased, &mut *report),
        StandDetection::StabilityOnly => run(DetectionStrategy::StabilityBased, &mut *report),
        StandDetection::Ensemble => {
            let mut nodes = run(DetectionStrategy::DwellBased, &mut *report);
            nodes.extend(run(DetectionStrategy::StabilityBased, &mut *report));
            nodes
        }
        StandDetection::Fallback => {
            let nodes = run(DetectionStrategy::DwellBased, &mut *report);
            if nodes.is_empty() {
                warn!("No stands found from dwell segments, falling back to stability windows");
                report.stand_fallback_used = true;
                run(DetectionStrategy::StabilityBased, &mut *report)
            } else {
                nodes
            }
        }
    };
    report.candidates_by_type.insert(NodeType::Stand, candidates);
    nodes
}
