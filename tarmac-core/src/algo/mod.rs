pub mod assemble;
pub mod classify;
pub mod cluster;
pub mod merge;
pub mod segment;
pub mod stability;

pub use assemble::{Assembly, EdgeUsage, GraphAssembler, Skipped};
pub use classify::classify;
pub use cluster::{Candidate, NodeClusterer};
pub use merge::{MergeOutcome, NodeMerger};
pub use segment::{DwellSegmenter, segment, segment_class};
pub use stability::{StabilityWindow, stable_windows};
