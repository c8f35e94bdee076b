//! Dependency flattening
//!
//! Walks a snapshot from one root and records every reachable object once,
//! together with its direct neighbours in the walk direction. Cycles and
//! shared dependencies (diamonds) stop at the first already-recorded node.

use super::model::{CallTreeDirection, GraphSnapshot, ObjectType};
#[cfg(test)]
use std::collections::HashMap;
use tracing::debug;

/// One recorded object of a flattened walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatNode {
    pub name: String,
    pub object_type: ObjectType,
    pub dependencies: Vec<String>,
}

/// Name -> direct dependency names, for every object reachable from a root.
///
/// Nodes are kept in visit order. Callers should not rely on that order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlatDependencyMap {
    nodes: Vec<FlatNode>,
}

impl FlatDependencyMap {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    fn push(&mut self, node: FlatNode) {
        self.nodes.push(node);
    }
}

#[cfg(test)]
impl FlatDependencyMap {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&FlatNode> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn dependencies(&self, name: &str) -> Option<&[String]> {
        self.get(name).map(|n| n.dependencies.as_slice())
    }

    pub fn object_type(&self, name: &str) -> Option<ObjectType> {
        self.get(name).map(|n| n.object_type)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FlatNode> {
        self.nodes.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|n| n.name.as_str())
    }

    /// Plain adjacency map view
    pub fn to_map(&self) -> HashMap<String, Vec<String>> {
        self.nodes
            .iter()
            .map(|n| (n.name.clone(), n.dependencies.clone()))
            .collect()
    }
}

impl<'a> IntoIterator for &'a FlatDependencyMap {
    type Item = &'a FlatNode;
    type IntoIter = std::slice::Iter<'a, FlatNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

/// Flattens snapshot dependency graphs
pub struct DependencyFlattener;

impl DependencyFlattener {
    /// Flatten everything reachable from `root_name` in `direction`.
    ///
    /// An empty or unknown root yields an empty map.
    pub fn flatten(
        snapshot: &GraphSnapshot,
        root_name: &str,
        direction: CallTreeDirection,
    ) -> FlatDependencyMap {
        let mut output = FlatDependencyMap::default();

        let Some(root) = snapshot.index_of(root_name) else {
            debug!("Root '{}' not in snapshot, returning empty tree", root_name);
            return output;
        };

        let mut visited = vec![false; snapshot.len()];
        let mut stack = vec![root];

        while let Some(current) = stack.pop() {
            if visited[current] {
                continue;
            }
            visited[current] = true;

            let edges = snapshot.edges(current, direction);
            let object = snapshot.object_at(current);
            output.push(FlatNode {
                name: object.name.clone(),
                object_type: object.object_type,
                dependencies: edges
                    .iter()
                    .map(|&e| snapshot.object_at(e).name.clone())
                    .collect(),
            });

            // Reversed so the first edge is expanded first, matching a recursive walk
            stack.extend(edges.iter().rev().copied().filter(|&e| !visited[e]));
        }

        debug!(
            "Flattened {} objects from '{}' ({:?})",
            output.len(),
            root_name,
            direction
        );
        output
    }
}
