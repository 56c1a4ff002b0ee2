//! Query engine: filter composition, ordering and pagination

pub mod cypher;
pub mod options;

pub use cypher::CypherFilter;
pub use options::{apply, PerformanceOptions};
