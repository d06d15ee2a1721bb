//! Data model of the surface-movement graph
//!
//! Samples and tracks, dwell segments, nodes, edges, the assembled graph
//! and the quality report of a run.

pub mod edge;
pub mod graph;
pub mod node;
pub mod point;
pub mod quality;
pub mod segment;

pub use edge::{Edge, EdgeKey};
pub use graph::{GraphStats, TopologyGraph};
pub use node::{DetectionStrategy, Node, NodeId, NodeStats, NodeType};
pub use point::{KinematicClass, SurfacePoint, VehicleTrack};
pub use quality::{DropReason, QualityReport};
pub use segment::DwellSegment;
