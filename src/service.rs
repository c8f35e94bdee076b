//! Schema graph service
//!
//! The operations the HTTP layer needs, on top of the snapshot cache and
//! the dependency flattener.

use crate::graph::{
    CallTreeDirection, DependencyFlattener, FlatDependencyMap, GraphSnapshot, GraphSource,
    ObjectType, SnapshotCache, SourceError,
};
use crate::models::AutocompleteResult;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub struct SchemaService {
    cache: SnapshotCache,
    source: Arc<dyn GraphSource>,
}

impl SchemaService {
    pub fn new(source: Arc<dyn GraphSource>, cache_lifetime: Duration) -> Self {
        let cache = SnapshotCache::new(cache_lifetime, source.clone());
        Self::with_cache(cache, source)
    }

    pub fn with_cache(cache: SnapshotCache, source: Arc<dyn GraphSource>) -> Self {
        Self { cache, source }
    }

    /// Current schema graph, from cache when fresh
    pub async fn get_graph(&self) -> Result<Arc<GraphSnapshot>, SourceError> {
        self.cache.get().await
    }

    /// Everything reachable from `object_name` in `direction`.
    ///
    /// An empty name returns an empty tree without loading the graph.
    pub async fn get_dependency_tree(
        &self,
        object_name: &str,
        direction: CallTreeDirection,
    ) -> Result<FlatDependencyMap, SourceError> {
        if object_name.is_empty() {
            return Ok(FlatDependencyMap::default());
        }

        let graph = self.get_graph().await?;
        Ok(DependencyFlattener::flatten(&graph, object_name, direction))
    }

    /// Objects for the search box, optionally narrowed by type and by a
    /// case-insensitive substring of the name
    pub async fn autocomplete(
        &self,
        filter: Option<ObjectType>,
        query: Option<&str>,
    ) -> Result<Vec<AutocompleteResult>, SourceError> {
        let graph = self.get_graph().await?;

        let needle = query
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase);

        let results: Vec<AutocompleteResult> = graph
            .objects()
            .iter()
            .filter(|o| filter.map_or(true, |t| o.object_type == t))
            .filter(|o| {
                needle
                    .as_deref()
                    .map_or(true, |n| o.name.to_lowercase().contains(n))
            })
            .map(AutocompleteResult::from)
            .collect();

        debug!("Autocomplete matched {} of {} objects", results.len(), graph.len());
        Ok(results)
    }

    /// Source text of an object; `None` for empty or unknown names
    pub async fn definition(&self, object_name: &str) -> Result<Option<String>, SourceError> {
        if object_name.is_empty() {
            return Ok(None);
        }
        self.source.definition(object_name).await
    }

    /// Drop the cached graph and load a new one
    pub async fn refresh(&self) -> Result<Arc<GraphSnapshot>, SourceError> {
        self.cache.invalidate().await;
        self.cache.get().await
    }

    pub fn cache(&self) -> &SnapshotCache {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::testing::{ManualClock, StaticSource};
    use crate::graph::SchemaObject;
    use tokio_test::{assert_err, assert_ok};

    fn service(source: &Arc<StaticSource>, clock: &Arc<ManualClock>) -> SchemaService {
        let cache = SnapshotCache::with_clock(Duration::from_secs(600), source.clone(), clock.clone());
        SchemaService::with_cache(cache, source.clone())
    }

    #[tokio::test]
    async fn test_dependency_tree_uses_cached_graph() {
        let clock = Arc::new(ManualClock::default());
        let source = Arc::new(StaticSource::new(clock.clone()));
        let service = service(&source, &clock);

        let down = assert_ok!(
            service
                .get_dependency_tree("sp_ReportOrders", CallTreeDirection::Downstream)
                .await
        );
        let up = assert_ok!(
            service
                .get_dependency_tree("Orders", CallTreeDirection::Upstream)
                .await
        );

        assert_eq!(down.len(), 3);
        assert_eq!(
            up.dependencies("Orders").unwrap(),
            ["vw_Orders", "sp_ReportOrders", "fn_OrderTotal"]
        );
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_name_skips_graph_load() {
        let clock = Arc::new(ManualClock::default());
        let source = Arc::new(StaticSource::new(clock.clone()));
        let service = service(&source, &clock);

        let tree = assert_ok!(
            service
                .get_dependency_tree("", CallTreeDirection::Downstream)
                .await
        );

        assert!(tree.is_empty());
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_unknown_name_is_empty_not_error() {
        let clock = Arc::new(ManualClock::default());
        let source = Arc::new(StaticSource::new(clock.clone()));
        let service = service(&source, &clock);

        let tree = assert_ok!(
            service
                .get_dependency_tree("DoesNotExist", CallTreeDirection::Upstream)
                .await
        );

        assert!(tree.is_empty());
    }

    #[tokio::test]
    async fn test_source_failure_propagates_unchanged() {
        let clock = Arc::new(ManualClock::default());
        let source = Arc::new(StaticSource::new(clock.clone()));
        source.fail_with("permission denied for schema sales");
        let service = service(&source, &clock);

        let err = assert_err!(
            service
                .get_dependency_tree("Orders", CallTreeDirection::Downstream)
                .await
        );

        assert_eq!(
            err,
            SourceError::IntrospectionFailed("permission denied for schema sales".to_string())
        );
    }

    #[tokio::test]
    async fn test_autocomplete_filters_by_type_and_text() {
        let clock = Arc::new(ManualClock::default());
        let source = Arc::new(StaticSource::new(clock.clone()));
        let service = service(&source, &clock);

        let all = assert_ok!(service.autocomplete(None, None).await);
        assert_eq!(all.len(), 5);

        let tables = assert_ok!(service.autocomplete(Some(ObjectType::Table), None).await);
        let names: Vec<&str> = tables.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Orders", "Customers"]);

        let matches = assert_ok!(service.autocomplete(None, Some("ORDERS")).await);
        let names: Vec<&str> = matches.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Orders", "vw_Orders", "sp_ReportOrders"]);

        let literal = assert_ok!(service.autocomplete(None, Some("vw_.*")).await);
        assert!(literal.is_empty());
    }

    #[tokio::test]
    async fn test_autocomplete_treats_query_as_plain_text() {
        let clock = Arc::new(ManualClock::default());
        let source = Arc::new(StaticSource::with_objects(
            clock.clone(),
            vec![
                SchemaObject::new("public.report(v2)", ObjectType::View),
                SchemaObject::new("public.report_v2", ObjectType::View),
                SchemaObject::new("public.[legacy]", ObjectType::Table),
            ],
        ));
        let service = service(&source, &clock);

        let parens = assert_ok!(service.autocomplete(None, Some("REPORT(")).await);
        let names: Vec<&str> = parens.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["public.report(v2)"]);

        let brackets = assert_ok!(service.autocomplete(None, Some("[leg")).await);
        assert_eq!(brackets.len(), 1);
        assert_eq!(brackets[0].name, "public.[legacy]");
    }

    #[tokio::test]
    async fn test_definition_lookup() {
        let clock = Arc::new(ManualClock::default());
        let source = Arc::new(
            StaticSource::new(clock.clone())
                .with_definition("vw_Orders", "CREATE VIEW vw_Orders AS SELECT * FROM Orders"),
        );
        let service = service(&source, &clock);

        assert_eq!(
            assert_ok!(service.definition("vw_Orders").await).as_deref(),
            Some("CREATE VIEW vw_Orders AS SELECT * FROM Orders")
        );
        assert_eq!(assert_ok!(service.definition("missing").await), None);
        assert_eq!(assert_ok!(service.definition("").await), None);
    }

    #[tokio::test]
    async fn test_refresh_replaces_snapshot() {
        let clock = Arc::new(ManualClock::default());
        let source = Arc::new(StaticSource::new(clock.clone()));
        let service = service(&source, &clock);

        let before = assert_ok!(service.get_graph().await);
        let after = assert_ok!(service.refresh().await);

        assert!(!Arc::ptr_eq(&before, &after));
        assert!(Arc::ptr_eq(&after, &assert_ok!(service.get_graph().await)));
        assert_eq!(source.calls(), 2);
    }
}
