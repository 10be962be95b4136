pub mod deflate;
pub mod graph;
pub mod hierarchy;
pub mod reinflate;

pub use deflate::{deflate, CoreSet, Deflation, DeflationMap};
pub use graph::build_similarity_graph;
pub use hierarchy::{cluster_hierarchy, PartitionTree};
pub use reinflate::{reinflate_all, ThresholdClusters};
