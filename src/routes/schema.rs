//! Schema graph route handlers
//!
//! Thin wrappers over `SchemaService`: validate the query, call the
//! service, shape the response for the browser UI.

use crate::error::{validation_error, ApiResult};
use crate::graph::ObjectType;
use crate::models::{
    AutocompleteQuery, AutocompleteResult, CallTreeData, DefinitionQuery, DependencyTreeQuery,
    EnvironmentList, GraphSummary, ObjectDefinition,
};
use crate::state::SharedState;
use axum::{
    extract::{Query, State},
    Json,
};
use tracing::{debug, info};
use validator::Validate;

/// Summary of the current schema graph
pub async fn get_graph(State(state): State<SharedState>) -> ApiResult<Json<GraphSummary>> {
    let graph = state.schema.get_graph().await?;
    Ok(Json(GraphSummary::new(&graph, state.schema.cache().ttl())))
}

/// Object list for the search box
pub async fn autocomplete(
    State(state): State<SharedState>,
    Query(query): Query<AutocompleteQuery>,
) -> ApiResult<Json<Vec<AutocompleteResult>>> {
    query.validate().map_err(|e| validation_error(e.to_string()))?;

    let filter = match query.filter.as_deref().map(str::trim).filter(|f| !f.is_empty()) {
        Some(raw) => Some(ObjectType::parse(raw).ok_or_else(|| {
            validation_error(format!("Unknown object type filter '{}'", raw))
        })?),
        None => None,
    };

    let results = state.schema.autocomplete(filter, query.q.as_deref()).await?;
    Ok(Json(results))
}

/// Flattened dependency tree of one object
pub async fn dependency_tree(
    State(state): State<SharedState>,
    Query(query): Query<DependencyTreeQuery>,
) -> ApiResult<Json<CallTreeData>> {
    query.validate().map_err(|e| validation_error(e.to_string()))?;

    let name = query.obj_name.as_deref().unwrap_or_default();
    debug!("Dependency tree for '{}' ({:?})", name, query.direction);

    let tree = state
        .schema
        .get_dependency_tree(name, query.direction)
        .await?;

    Ok(Json(CallTreeData::from(&tree)))
}

/// Source text of one object
pub async fn definition(
    State(state): State<SharedState>,
    Query(query): Query<DefinitionQuery>,
) -> ApiResult<Json<ObjectDefinition>> {
    query.validate().map_err(|e| validation_error(e.to_string()))?;

    let name = query.obj_name.as_deref().unwrap_or_default();
    let definition_text = state.schema.definition(name).await?;

    Ok(Json(ObjectDefinition { definition_text }))
}

/// Configured database environments
pub async fn environments(State(state): State<SharedState>) -> Json<EnvironmentList> {
    Json(EnvironmentList {
        environments: state.environments.clone(),
        active: state.active_environment.clone(),
    })
}

/// Drop the cached graph and load a fresh one
pub async fn refresh(State(state): State<SharedState>) -> ApiResult<Json<GraphSummary>> {
    let graph = state.schema.refresh().await?;
    info!("Schema graph refreshed on request ({} objects)", graph.len());
    Ok(Json(GraphSummary::new(&graph, state.schema.cache().ttl())))
}
