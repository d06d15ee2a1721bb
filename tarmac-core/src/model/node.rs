//! Inferred surface locations

use serde::{Deserialize, Serialize};

/// Identifier of a node, stable within one run.
pub type NodeId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeType {
    Stand,
    Taxiway,
    Runway,
}

impl NodeType {
    pub const ALL: [NodeType; 3] = [NodeType::Stand, NodeType::Taxiway, NodeType::Runway];

    pub fn as_str(self) -> &'static str {
        match self {
            NodeType::Stand => "STAND",
            NodeType::Taxiway => "TAXIWAY",
            NodeType::Runway => "RUNWAY",
        }
    }

    pub(crate) fn id_prefix(self) -> &'static str {
        match self {
            NodeType::Stand => "stand",
            NodeType::Taxiway => "taxiway",
            NodeType::Runway => "runway",
        }
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detector that produced a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionStrategy {
    /// Clusters of same-class dwell segments.
    DwellBased,
    /// Clusters of positionally stable sliding windows.
    StabilityBased,
}

/// Type-specific statistics of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeStats {
    Stand {
        avg_dwell_seconds: f64,
    },
    Taxiway {
        point_count: usize,
    },
    Runway {
        avg_speed: f64,
        /// Circular mean, `None` when no member carried a heading.
        avg_heading: Option<f64>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub node_type: NodeType,
    pub lat: f64,
    pub lon: f64,
    pub support_count: usize,
    #[serde(flatten)]
    pub stats: NodeStats,
    /// Provenance only; consumers must not rely on it across runs.
    pub strategy: DetectionStrategy,
}

impl Node {
    pub fn geometry(&self) -> geo::Point<f64> {
        geo::Point::new(self.lon, self.lat)
    }
}
