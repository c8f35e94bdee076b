//! Schema Introspection Module
//!
//! Builds the schema dependency graph from a live PostgreSQL database.
//! Edges come from two places: dependencies recorded in the catalog
//! (views, SQL-standard routine bodies) and references found by scanning
//! the source text of SQL and PL/pgSQL routines.

use crate::db::queries::{
    quote_ident, GET_ROUTINE_DEFINITION, GET_TABLE_COLUMNS, GET_VIEW_DEFINITION,
    LIST_ROUTINE_BODIES, LIST_ROUTINE_DEPENDENCIES, LIST_SCHEMA_OBJECTS, LIST_VIEW_DEPENDENCIES,
};
use crate::graph::{GraphSnapshot, GraphSource, ObjectType, SchemaObject, SourceError};
use async_trait::async_trait;
use chrono::Utc;
use deadpool_postgres::{Client, Pool};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Schema that unqualified names in routine bodies resolve against
const DEFAULT_SCHEMA: &str = "public";

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z_][A-Za-z0-9_$]*(?:\s*\.\s*[A-Za-z_][A-Za-z0-9_$]*)?")
        .expect("identifier pattern is valid")
});

/// Split `schema.name`; bare names live in the default schema
pub fn split_qualified(name: &str) -> (&str, &str) {
    match name.split_once('.') {
        Some((schema, object)) => (schema, object),
        None => (DEFAULT_SCHEMA, name),
    }
}

fn introspection_error(e: tokio_postgres::Error) -> SourceError {
    SourceError::IntrospectionFailed(e.to_string())
}

/// Graph source backed by a PostgreSQL connection pool
pub struct PostgresGraphSource {
    pool: Pool,
    environment: String,
}

impl PostgresGraphSource {
    pub fn new(pool: Pool, environment: impl Into<String>) -> Self {
        Self {
            pool,
            environment: environment.into(),
        }
    }

    async fn client(&self) -> Result<Client, SourceError> {
        self.pool.get().await.map_err(|e| {
            SourceError::Unavailable(format!("{} database: {}", self.environment, e))
        })
    }

    /// Every schema object with its graph kind
    async fn get_objects(client: &Client) -> Result<Vec<(String, ObjectType)>, SourceError> {
        let rows = client
            .query(LIST_SCHEMA_OBJECTS, &[])
            .await
            .map_err(introspection_error)?;

        let objects = rows
            .iter()
            .filter_map(|row| {
                let schema: String = row.get("schema_name");
                let name: String = row.get("object_name");
                let kind: String = row.get("kind");
                ObjectType::parse(&kind).map(|t| (format!("{}.{}", schema, name), t))
            })
            .collect();

        Ok(objects)
    }

    /// Catalog-recorded `(dependent, dependency)` pairs
    async fn get_catalog_dependencies(
        client: &Client,
    ) -> Result<Vec<(String, String)>, SourceError> {
        let mut edges = Vec::new();

        for query in [LIST_VIEW_DEPENDENCIES, LIST_ROUTINE_DEPENDENCIES] {
            let rows = client.query(query, &[]).await.map_err(introspection_error)?;
            edges.extend(rows.iter().filter_map(|row| {
                let dependent: String = row.get("dependent");
                let dependency: Option<String> = row.get("dependency");
                dependency.map(|d| (dependent, d))
            }));
        }

        Ok(edges)
    }

    /// `(routine, source text)` for SQL and PL/pgSQL routines
    async fn get_routine_bodies(client: &Client) -> Result<Vec<(String, String)>, SourceError> {
        let rows = client
            .query(LIST_ROUTINE_BODIES, &[])
            .await
            .map_err(introspection_error)?;

        Ok(rows
            .iter()
            .filter_map(|row| {
                let name: String = row.get("routine_name");
                let body: Option<String> = row.get("body");
                body.map(|b| (name, b))
            })
            .collect())
    }

    async fn view_definition(
        client: &Client,
        schema: &str,
        name: &str,
    ) -> Result<Option<String>, SourceError> {
        let row = client
            .query_opt(GET_VIEW_DEFINITION, &[&schema, &name])
            .await
            .map_err(introspection_error)?;

        Ok(row.map(|row| {
            let kind: String = row.get("kind");
            let definition: String = row.get("definition");
            format!(
                "CREATE {} {}.{} AS\n{}",
                kind,
                quote_ident(schema),
                quote_ident(name),
                definition.trim_end()
            )
        }))
    }

    async fn routine_definition(
        client: &Client,
        schema: &str,
        name: &str,
    ) -> Result<Option<String>, SourceError> {
        let row = client
            .query_opt(GET_ROUTINE_DEFINITION, &[&schema, &name])
            .await
            .map_err(introspection_error)?;

        Ok(row.map(|row| row.get("definition")))
    }

    async fn table_definition(
        client: &Client,
        schema: &str,
        name: &str,
    ) -> Result<Option<String>, SourceError> {
        let rows = client
            .query(GET_TABLE_COLUMNS, &[&schema, &name])
            .await
            .map_err(introspection_error)?;

        if rows.is_empty() {
            return Ok(None);
        }

        let columns: Vec<String> = rows
            .iter()
            .map(|row| {
                let column: String = row.get("column_name");
                let data_type: String = row.get("data_type");
                let nullable: String = row.get("is_nullable");
                let default: Option<String> = row.get("column_default");

                let mut line = format!("    {} {}", quote_ident(&column), data_type);
                if nullable != "YES" {
                    line.push_str(" NOT NULL");
                }
                if let Some(default) = default {
                    line.push_str(" DEFAULT ");
                    line.push_str(&default);
                }
                line
            })
            .collect();

        Ok(Some(format!(
            "CREATE TABLE {}.{} (\n{}\n);",
            quote_ident(schema),
            quote_ident(name),
            columns.join(",\n")
        )))
    }
}

#[async_trait]
impl GraphSource for PostgresGraphSource {
    async fn generate(&self) -> Result<GraphSnapshot, SourceError> {
        let started = Instant::now();
        let client = self.client().await?;

        let objects = Self::get_objects(&client).await?;
        let catalog_edges = Self::get_catalog_dependencies(&client).await?;
        let bodies = Self::get_routine_bodies(&client).await?;

        debug!(
            "Introspected {} objects, {} catalog edges, {} routine bodies",
            objects.len(),
            catalog_edges.len(),
            bodies.len()
        );

        let snapshot = GraphSnapshot::new(Utc::now(), assemble(objects, catalog_edges, bodies));
        if snapshot.is_empty() {
            warn!(
                environment = %self.environment,
                "No tables, views or routines visible to this connection"
            );
        }

        info!(
            environment = %self.environment,
            objects = snapshot.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Schema graph introspected"
        );

        Ok(snapshot)
    }

    async fn definition(&self, name: &str) -> Result<Option<String>, SourceError> {
        let (schema, object) = split_qualified(name);
        let client = self.client().await?;

        if let Some(text) = Self::view_definition(&client, schema, object).await? {
            return Ok(Some(text));
        }
        if let Some(text) = Self::routine_definition(&client, schema, object).await? {
            return Ok(Some(text));
        }
        Self::table_definition(&client, schema, object).await
    }
}

/// Join objects, catalog edges and body references into graph objects.
///
/// Self references and repeated edges are dropped; catalog edges come
/// before body references.
pub fn assemble(
    objects: Vec<(String, ObjectType)>,
    catalog_edges: Vec<(String, String)>,
    bodies: Vec<(String, String)>,
) -> Vec<SchemaObject> {
    let mut graph: Vec<SchemaObject> = objects
        .into_iter()
        .map(|(name, object_type)| SchemaObject::new(name, object_type))
        .collect();

    let positions: HashMap<String, usize> = graph
        .iter()
        .enumerate()
        .map(|(i, o)| (o.name.clone(), i))
        .collect();
    let lookup = reference_lookup(graph.iter().map(|o| o.name.as_str()));

    let mut seen: Vec<HashSet<String>> = vec![HashSet::new(); graph.len()];
    let mut link = |graph: &mut Vec<SchemaObject>, from: &str, to: String| {
        if let Some(&i) = positions.get(from) {
            if from != to && positions.contains_key(&to) && seen[i].insert(to.clone()) {
                graph[i].depends_on.push(to);
            }
        }
    };

    for (dependent, dependency) in catalog_edges {
        link(&mut graph, &dependent, dependency);
    }

    for (routine, body) in bodies {
        for reference in scan_references(&body, &lookup) {
            link(&mut graph, &routine, reference);
        }
    }

    graph
}

/// Map of spellings a body may use -> qualified object name
fn reference_lookup<'a>(names: impl Iterator<Item = &'a str>) -> HashMap<String, String> {
    let mut lookup = HashMap::new();

    for name in names {
        let (schema, object) = split_qualified(name);
        let mut spellings = vec![name.to_string(), name.to_lowercase()];
        if schema == DEFAULT_SCHEMA {
            spellings.push(object.to_string());
            spellings.push(object.to_lowercase());
        }
        for spelling in spellings {
            lookup.entry(spelling).or_insert_with(|| name.to_string());
        }
    }

    lookup
}

/// Qualified names of known objects referenced in a routine body, in order
fn scan_references(body: &str, lookup: &HashMap<String, String>) -> Vec<String> {
    let unquoted = body.replace('"', "");
    let mut found = Vec::new();
    let mut seen = HashSet::new();

    for token in IDENTIFIER.find_iter(&unquoted) {
        let token: String = token.as_str().split_whitespace().collect();
        let resolved = lookup
            .get(&token)
            .or_else(|| lookup.get(&token.to_lowercase()));

        if let Some(name) = resolved {
            if seen.insert(name.clone()) {
                found.push(name.clone());
            }
        }
    }

    found
}
