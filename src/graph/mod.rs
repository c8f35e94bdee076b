//! Schema dependency graph
//!
//! - Snapshot model (objects and their dependency edges)
//! - Graph source contract
//! - Single-slot snapshot cache with coalesced regeneration
//! - Cycle-safe dependency flattening

pub mod cache;
pub mod flatten;
pub mod model;
pub mod source;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::SnapshotCache;
pub use flatten::{DependencyFlattener, FlatDependencyMap};
pub use model::{CallTreeDirection, GraphSnapshot, ObjectType, SchemaObject};
pub use source::{GraphSource, SourceError};
