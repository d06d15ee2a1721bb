pub mod algo;
pub mod config;
pub mod error;
pub mod export;
pub mod loading;
pub mod model;
pub mod pipeline;
pub mod prelude;
pub mod spatial;

pub use error::Error;

// Identifier of a node, e.g. `stand-d-0001`
pub use model::NodeId;

pub use config::PipelineConfig;
pub use model::{QualityReport, TopologyGraph};
pub use pipeline::{PipelineOutput, build_topology};
