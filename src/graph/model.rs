//! Graph data model
//!
//! A snapshot is an arena: objects live in a flat vector, edges are stored as
//! indices into that vector. Nothing points back into the snapshot, so cyclic
//! schemas never turn into cyclic ownership.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::{debug, warn};
use uuid::Uuid;

/// Kind of schema object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    Table,
    View,
    Procedure,
    Function,
}

impl ObjectType {
    pub const ALL: [ObjectType; 4] = [
        ObjectType::Procedure,
        ObjectType::Table,
        ObjectType::View,
        ObjectType::Function,
    ];

    /// Numeric key used by the browser UI
    pub fn key(self) -> u8 {
        match self {
            ObjectType::Procedure => 1,
            ObjectType::Table => 2,
            ObjectType::View => 3,
            ObjectType::Function => 4,
        }
    }

    pub fn from_key(key: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.key() == key)
    }

    pub fn name(self) -> &'static str {
        match self {
            ObjectType::Table => "Table",
            ObjectType::View => "View",
            ObjectType::Procedure => "Procedure",
            ObjectType::Function => "Function",
        }
    }

    /// Parse either the numeric key or the (case-insensitive) type name
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if let Ok(key) = value.parse::<u8>() {
            return Self::from_key(key);
        }
        Self::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(value))
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Direction of a dependency walk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CallTreeDirection {
    /// What this object depends on
    #[default]
    Downstream,
    /// What depends on this object
    Upstream,
}

impl CallTreeDirection {
    /// Accepts `0`/`1` (legacy UI) as well as the direction names
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "0" | "downstream" | "down" => Some(CallTreeDirection::Downstream),
            "1" | "upstream" | "up" => Some(CallTreeDirection::Upstream),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for CallTreeDirection {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        CallTreeDirection::parse(&raw).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "invalid direction '{}', expected downstream (0) or upstream (1)",
                raw
            ))
        })
    }
}

/// A table, view, procedure or function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaObject {
    pub name: String,
    pub object_type: ObjectType,
    /// Names of the objects this definition references, in reference order
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl SchemaObject {
    pub fn new(name: impl Into<String>, object_type: ObjectType) -> Self {
        Self {
            name: name.into(),
            object_type,
            depends_on: Vec::new(),
        }
    }

    #[cfg(test)]
    pub fn depending_on<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on.extend(names.into_iter().map(Into::into));
        self
    }
}

/// Immutable capture of every schema object and its dependency edges
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphSnapshot {
    pub id: Uuid,
    pub captured_at: DateTime<Utc>,
    pub checksum: String,
    objects: Vec<SchemaObject>,
    #[serde(skip)]
    index: HashMap<String, usize>,
    #[serde(skip)]
    dependencies: Vec<Vec<usize>>,
    #[serde(skip)]
    dependents: Vec<Vec<usize>>,
}

impl GraphSnapshot {
    /// Build a snapshot, resolving every edge inside the object set.
    ///
    /// Duplicate names keep their first occurrence. Edges to names that are
    /// not part of the snapshot are dropped.
    pub fn new(captured_at: DateTime<Utc>, objects: Vec<SchemaObject>) -> Self {
        let mut index = HashMap::with_capacity(objects.len());
        let mut unique = Vec::with_capacity(objects.len());

        for object in objects {
            if index.contains_key(&object.name) {
                warn!("Duplicate schema object '{}' ignored", object.name);
                continue;
            }
            index.insert(object.name.clone(), unique.len());
            unique.push(object);
        }

        let mut dropped = 0usize;
        for object in &mut unique {
            let before = object.depends_on.len();
            object.depends_on.retain(|name| index.contains_key(name));
            dropped += before - object.depends_on.len();
        }
        if dropped > 0 {
            debug!("Dropped {} edges to objects outside the snapshot", dropped);
        }

        let dependencies: Vec<Vec<usize>> = unique
            .iter()
            .map(|o| o.depends_on.iter().map(|name| index[name]).collect())
            .collect();

        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); unique.len()];
        for (source, targets) in dependencies.iter().enumerate() {
            let mut seen = HashSet::new();
            for &target in targets {
                if seen.insert(target) {
                    dependents[target].push(source);
                }
            }
        }

        let checksum = Self::compute_checksum(&unique);

        Self {
            id: Uuid::new_v4(),
            captured_at,
            checksum,
            objects: unique,
            index,
            dependencies,
            dependents,
        }
    }

    /// Compute checksum from object names, types and edges
    pub fn compute_checksum(objects: &[SchemaObject]) -> String {
        let mut lines: Vec<String> = objects
            .iter()
            .map(|o| format!("{}:{}->{}", o.object_type.key(), o.name, o.depends_on.join(",")))
            .collect();
        lines.sort();

        let mut hasher = Sha256::new();
        for line in &lines {
            hasher.update(line.as_bytes());
            hasher.update(b"\n");
        }
        format!("{:x}", hasher.finalize())
    }

    pub fn objects(&self) -> &[SchemaObject] {
        &self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub(crate) fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub(crate) fn object_at(&self, index: usize) -> &SchemaObject {
        &self.objects[index]
    }

    /// Direct neighbours of an object in the requested direction
    pub(crate) fn edges(&self, index: usize, direction: CallTreeDirection) -> &[usize] {
        match direction {
            CallTreeDirection::Downstream => &self.dependencies[index],
            CallTreeDirection::Upstream => &self.dependents[index],
        }
    }

    /// Number of objects of each type
    pub fn counts(&self) -> HashMap<ObjectType, usize> {
        let mut counts = HashMap::new();
        for object in &self.objects {
            *counts.entry(object.object_type).or_insert(0) += 1;
        }
        counts
    }
}

#[cfg(test)]
impl GraphSnapshot {
    pub fn get(&self, name: &str) -> Option<&SchemaObject> {
        self.index_of(name).map(|i| &self.objects[i])
    }

    pub fn object_type(&self, name: &str) -> Option<ObjectType> {
        self.get(name).map(|o| o.object_type)
    }

    /// Objects that reference `name`, in snapshot order
    pub fn dependents_of(&self, name: &str) -> Vec<&str> {
        self.index_of(name)
            .map(|i| {
                self.dependents[i]
                    .iter()
                    .map(|&d| self.objects[d].name.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }
}
