//! Graph source contract
//!
//! Anything that can produce a fresh [`GraphSnapshot`]. The production source
//! introspects PostgreSQL (see `crate::introspection`).

use super::model::GraphSnapshot;
use async_trait::async_trait;
use thiserror::Error;

/// Failure to produce a snapshot.
///
/// Cloneable so one failure can be handed to every caller waiting on the
/// same regeneration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("Schema introspection failed: {0}")]
    IntrospectionFailed(String),

    #[error("Schema source unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait GraphSource: Send + Sync {
    /// Capture every schema object and its dependencies
    async fn generate(&self) -> Result<GraphSnapshot, SourceError>;

    /// Source text of a single object, `None` if it does not exist
    async fn definition(&self, name: &str) -> Result<Option<String>, SourceError>;
}
