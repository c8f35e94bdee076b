//! Application state management
//!
//! Contains shared state accessible across all handlers.

use crate::config::DatabaseConfig;
use crate::service::SchemaService;
use std::sync::Arc;

/// Application state shared across all handlers
pub struct AppState {
    /// Schema graph operations (owns the snapshot cache)
    pub schema: SchemaService,

    /// Names of the configured database environments
    pub environments: Vec<String>,

    /// Environment the schema graph is read from
    pub active_environment: String,
}

impl AppState {
    pub fn new(schema: SchemaService, database: &DatabaseConfig) -> Self {
        Self {
            schema,
            environments: database.environment_names(),
            active_environment: database.active.clone(),
        }
    }
}

/// Type alias for shared state
pub type SharedState = Arc<AppState>;
