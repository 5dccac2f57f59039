//! Collection service abstraction and registry.
//!
//! [`CollectionService`] is the remote collection endpoint the loader talks
//! to. Implementations decide transport and storage; the loader only relies
//! on the find / create / patch / remove contract.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use panelgen_core::{EditorConfig, FindQuery, FindResponse};
use serde_json::Value;

use crate::config::LoaderConfig;
use crate::loader::IncrementalLoader;

/// A remote collection addressed by its service path.
///
/// Used as `Arc<dyn CollectionService>`.
#[async_trait]
pub trait CollectionService: Send + Sync {
    /// Service path this collection is registered under.
    fn path(&self) -> &str;

    /// Returns one page of records matching the query.
    async fn find(&self, query: &FindQuery) -> anyhow::Result<FindResponse>;

    /// Creates one record, or several when `payload` is an array.
    ///
    /// Returns the stored record(s) in the same shape.
    async fn create(&self, payload: Value) -> anyhow::Result<Value>;

    /// Applies a partial update and returns the full stored record.
    async fn patch(&self, id: &Value, payload: Value) -> anyhow::Result<Value>;

    /// Deletes a record and returns it.
    async fn remove(&self, id: &Value) -> anyhow::Result<Value>;
}

/// Collection services keyed by service path.
pub struct CollectionRegistry {
    services: DashMap<String, Arc<dyn CollectionService>>,
}

impl CollectionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            services: DashMap::new(),
        }
    }

    /// Registers a service under its own path, replacing any previous one.
    pub fn register(&self, service: Arc<dyn CollectionService>) {
        self.services.insert(service.path().to_string(), service);
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<Arc<dyn CollectionService>> {
        self.services.get(path).map(|entry| Arc::clone(entry.value()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// A fresh loader over the editor's service, seeded with its base filter
    /// and default sort. `None` when no service is registered for it.
    #[must_use]
    pub fn loader_for(&self, editor: &EditorConfig, config: LoaderConfig) -> Option<IncrementalLoader> {
        let service = self.get(&editor.service)?;
        let loader = IncrementalLoader::new(service, config, editor.filter.clone());
        loader.set_sort(editor.default_sort.iter().cloned());
        Some(loader)
    }
}

impl Default for CollectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryCollection;
    use panelgen_core::SchemaCatalog;
    use serde_json::json;

    #[test]
    fn register_and_lookup_by_path() {
        let registry = CollectionRegistry::new();
        assert!(registry.is_empty());
        registry.register(Arc::new(MemoryCollection::new("posts")));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("posts").unwrap().path(), "posts");
        assert!(registry.get("tags").is_none());
    }

    #[tokio::test]
    async fn loader_for_applies_editor_filter_and_sort() {
        let catalog = SchemaCatalog::from_value(json!({
            "posts": {
                "fields": [ { "name": "title", "type": "string" }, { "name": "draft", "type": "boolean" } ],
                "editor": {
                    "filter": { "draft": false },
                    "defaultSort": [ { "path": "title", "direction": "desc" } ]
                }
            }
        }))
        .unwrap();
        let editors = catalog.compile_all();
        let editor = &editors["/posts"];

        let registry = CollectionRegistry::new();
        registry.register(Arc::new(MemoryCollection::with_records(
            "posts",
            vec![
                json!({ "_id": "1", "title": "a", "draft": false }),
                json!({ "_id": "2", "title": "b", "draft": true }),
                json!({ "_id": "3", "title": "c", "draft": false }),
            ],
        )));

        let loader = registry
            .loader_for(editor, LoaderConfig::for_editor(editor))
            .unwrap();
        loader.fetch_more().await.unwrap();
        let titles: Vec<Value> = loader.items().iter().map(|r| r["title"].clone()).collect();
        assert_eq!(titles, vec![json!("c"), json!("a")]);
    }
}
