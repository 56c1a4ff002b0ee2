//! Neo4j persistence for performance results

pub mod client;
mod impl_result_store;

pub use client::Neo4jClient;
