pub use crate::Error;
pub use crate::NodeId;

// Re-export key components
pub use crate::config::{PipelineConfig, SpatialIndexKind, SpeedGapPolicy, StandDetection};
pub use crate::export::{to_feature_collection, to_geojson_string};
pub use crate::loading::{RawRecord, ingest, read_records};
pub use crate::pipeline::{PipelineOutput, build_topology};

// Graph model
pub use crate::model::{
    DetectionStrategy, Edge, GraphStats, KinematicClass, Node, NodeStats, NodeType,
    QualityReport, SurfacePoint, TopologyGraph, VehicleTrack,
};

// Nearest-node lookup
pub use crate::spatial::{BruteForceIndex, NearestNode, RTreeIndex};
