//! Schema graph models and DTOs
//!
//! Field names follow what the browser UI already reads
//! (`Name`/`Type`/`TypeName`, `DefinitionText`, `objects`/`metadata`).

use crate::graph::{CallTreeDirection, FlatDependencyMap, GraphSnapshot, ObjectType, SchemaObject};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;
use validator::Validate;

/// Query for the autocomplete list
#[derive(Debug, Default, Deserialize, Validate)]
pub struct AutocompleteQuery {
    /// Object type key (1-4) or type name
    pub filter: Option<String>,
    #[validate(length(max = 256, message = "Search text must be at most 256 characters"))]
    pub q: Option<String>,
}

/// One entry of the autocomplete list
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AutocompleteResult {
    pub name: String,
    #[serde(rename = "Type")]
    pub object_type: u8,
    pub type_name: String,
}

impl From<&SchemaObject> for AutocompleteResult {
    fn from(object: &SchemaObject) -> Self {
        Self {
            name: object.name.clone(),
            object_type: object.object_type.key(),
            type_name: object.object_type.to_string(),
        }
    }
}

/// Query for a dependency tree
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DependencyTreeQuery {
    #[validate(length(max = 256, message = "Object name must be at most 256 characters"))]
    pub obj_name: Option<String>,
    #[serde(default)]
    pub direction: CallTreeDirection,
}

/// Per-object metadata used to style graph nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectData {
    #[serde(rename = "type")]
    pub object_type: u8,
}

/// Flattened dependency tree as the UI renders it
#[derive(Debug, Default, Serialize)]
pub struct CallTreeData {
    pub objects: BTreeMap<String, Vec<String>>,
    pub metadata: BTreeMap<String, ObjectData>,
}

impl From<&FlatDependencyMap> for CallTreeData {
    fn from(map: &FlatDependencyMap) -> Self {
        let mut tree = CallTreeData::default();
        for node in map {
            tree.objects
                .insert(node.name.clone(), node.dependencies.clone());
            tree.metadata.insert(
                node.name.clone(),
                ObjectData {
                    object_type: node.object_type.key(),
                },
            );
        }
        tree
    }
}

/// Query for an object definition
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionQuery {
    #[validate(length(max = 256, message = "Object name must be at most 256 characters"))]
    pub obj_name: Option<String>,
}

/// Source text of an object
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ObjectDefinition {
    pub definition_text: Option<String>,
}

/// Lightweight description of the cached graph
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphSummary {
    pub id: Uuid,
    pub captured_at: DateTime<Utc>,
    pub checksum: String,
    /// When the cached graph stops being served; `None` if it never expires
    pub expires_at: Option<DateTime<Utc>>,
    pub object_count: usize,
    pub tables: usize,
    pub views: usize,
    pub procedures: usize,
    pub functions: usize,
}

impl GraphSummary {
    pub fn new(snapshot: &GraphSnapshot, lifetime: Option<TimeDelta>) -> Self {
        let counts = snapshot.counts();
        let count = |t: ObjectType| counts.get(&t).copied().unwrap_or(0);

        Self {
            id: snapshot.id,
            captured_at: snapshot.captured_at,
            checksum: snapshot.checksum.clone(),
            expires_at: lifetime.and_then(|ttl| snapshot.captured_at.checked_add_signed(ttl)),
            object_count: snapshot.len(),
            tables: count(ObjectType::Table),
            views: count(ObjectType::View),
            procedures: count(ObjectType::Procedure),
            functions: count(ObjectType::Function),
        }
    }
}

/// Configured database environments
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentList {
    pub environments: Vec<String>,
    pub active: String,
}
