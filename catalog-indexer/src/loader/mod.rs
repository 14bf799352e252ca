//! Loader module for the catalog indexer.
//!
//! Writes one work at a time into the search index.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::errors::IngestError;
use crate::processor::GraphFlattener;
use catalog_indexer_repository::{SearchIndexError, SearchIndexProvider, WorkStore};
use catalog_indexer_shared::{document_id_for, WorkDocument};

/// Whether a write created a new document or replaced a stored one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Insert,
    Update,
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteMode::Insert => write!(f, "insert"),
            WriteMode::Update => write!(f, "update"),
        }
    }
}

/// Result of a successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    /// The document id written.
    pub id: String,
    pub mode: WriteMode,
}

/// Writer that indexes works into the search engine.
///
/// For each work the writer:
/// - Fetches the stored document, selecting insert or update mode
/// - Loads the work graph from the source store
/// - Flattens the graph over the stored document (or a fresh shell)
/// - Upserts the complete document
pub struct IndexWriter {
    store: Arc<dyn WorkStore>,
    provider: Arc<dyn SearchIndexProvider>,
    flattener: GraphFlattener,
}

impl IndexWriter {
    /// Create a new index writer over the given stores.
    pub fn new(store: Arc<dyn WorkStore>, provider: Arc<dyn SearchIndexProvider>) -> Self {
        Self {
            store,
            provider,
            flattener: GraphFlattener::new(),
        }
    }

    /// Index one work.
    ///
    /// A missing stored document is the normal insert path. A stored
    /// document that cannot be read is replaced wholesale. Any store or
    /// conversion error is returned before the upsert, leaving the stored
    /// document unmodified.
    #[instrument(skip(self), fields(work = %uuid))]
    pub async fn write(&self, uuid: &Uuid) -> Result<WriteOutcome, IngestError> {
        let document_id = document_id_for(uuid);

        let existing = match self.provider.get_document(&document_id).await {
            Ok(existing) => existing,
            Err(SearchIndexError::ParseError(reason)) => {
                warn!(doc_id = %document_id, reason = %reason, "Stored document unreadable, replacing it");
                Some(WorkDocument::new(uuid))
            }
            Err(e) => return Err(e.into()),
        };
        let graph = self.store.fetch_graph(uuid).await?;

        let (document, mode) = match existing {
            Some(mut document) => {
                self.flattener.flatten_into(&mut document, &graph)?;
                (document, WriteMode::Update)
            }
            None => (self.flattener.flatten(&graph)?, WriteMode::Insert),
        };

        self.provider
            .upsert_document(&document_id, &document)
            .await?;

        debug!(doc_id = %document_id, mode = %mode, "Indexed work");

        Ok(WriteOutcome {
            id: document_id,
            mode,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use catalog_indexer_repository::WorkStoreError;
    use catalog_indexer_shared::{ChangedWork, InstanceDocument, InstanceRecord, WorkGraph};
    use chrono::{DateTime, Utc};
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct MockWorkStore {
        graphs: HashMap<Uuid, WorkGraph>,
    }

    #[async_trait]
    impl WorkStore for MockWorkStore {
        async fn fetch_modified_since(
            &self,
            _since: DateTime<Utc>,
            _after_id: i64,
            _limit: i64,
        ) -> Result<Vec<ChangedWork>, WorkStoreError> {
            Ok(Vec::new())
        }

        async fn fetch_graph(&self, uuid: &Uuid) -> Result<WorkGraph, WorkStoreError> {
            self.graphs
                .get(uuid)
                .cloned()
                .ok_or(WorkStoreError::WorkNotFound(*uuid))
        }
    }

    struct MockSearchProvider {
        documents: Mutex<HashMap<String, WorkDocument>>,
        upserts: Mutex<Vec<String>>,
        fail_get: bool,
        unreadable: bool,
        fail_upsert: bool,
    }

    impl MockSearchProvider {
        fn new() -> Self {
            Self {
                documents: Mutex::new(HashMap::new()),
                upserts: Mutex::new(Vec::new()),
                fail_get: false,
                unreadable: false,
                fail_upsert: false,
            }
        }

        fn with_document(self, document: WorkDocument) -> Self {
            self.documents
                .lock()
                .unwrap()
                .insert(document.uuid.clone(), document);
            self
        }

        fn stored(&self, id: &str) -> Option<WorkDocument> {
            self.documents.lock().unwrap().get(id).cloned()
        }
    }

    #[async_trait]
    impl SearchIndexProvider for MockSearchProvider {
        async fn ensure_index_exists(&self) -> Result<(), SearchIndexError> {
            Ok(())
        }

        async fn get_document(
            &self,
            document_id: &str,
        ) -> Result<Option<WorkDocument>, SearchIndexError> {
            if self.fail_get {
                return Err(SearchIndexError::get("connection reset"));
            }
            if self.unreadable {
                return Err(SearchIndexError::parse(
                    "Invalid stored document: invalid partial date: circa 1900",
                ));
            }
            Ok(self.documents.lock().unwrap().get(document_id).cloned())
        }

        async fn upsert_document(
            &self,
            document_id: &str,
            document: &WorkDocument,
        ) -> Result<(), SearchIndexError> {
            if self.fail_upsert {
                return Err(SearchIndexError::upsert("mapping conflict"));
            }
            self.upserts.lock().unwrap().push(document_id.to_string());
            self.documents
                .lock()
                .unwrap()
                .insert(document_id.to_string(), document.clone());
            Ok(())
        }
    }

    fn graph_with_instances(uuid: Uuid, count: usize) -> WorkGraph {
        let mut graph = WorkGraph::empty(1, uuid);
        graph.title = Some("Middlemarch".to_string());
        graph.instances = (0..count)
            .map(|i| InstanceRecord {
                title: Some(format!("Middlemarch, edition {}", i + 1)),
                ..Default::default()
            })
            .collect();
        graph
    }

    fn writer(store: MockWorkStore, provider: Arc<MockSearchProvider>) -> IndexWriter {
        IndexWriter::new(Arc::new(store), provider)
    }

    #[tokio::test]
    async fn test_insert_when_not_found() {
        let uuid = Uuid::new_v4();
        let store = MockWorkStore {
            graphs: HashMap::from([(uuid, graph_with_instances(uuid, 1))]),
        };
        let provider = Arc::new(MockSearchProvider::new());

        let outcome = writer(store, provider.clone()).write(&uuid).await.unwrap();

        assert_eq!(outcome.mode, WriteMode::Insert);
        assert_eq!(outcome.id, uuid.simple().to_string());
        let stored = provider.stored(&outcome.id).unwrap();
        assert_eq!(stored.title.as_deref(), Some("Middlemarch"));
    }

    #[tokio::test]
    async fn test_update_replaces_instances() {
        let uuid = Uuid::new_v4();
        let mut existing = WorkDocument::new(&uuid);
        existing.title = Some("Old title".to_string());
        existing.instances = vec![InstanceDocument::default(), InstanceDocument::default()];

        let store = MockWorkStore {
            graphs: HashMap::from([(uuid, graph_with_instances(uuid, 1))]),
        };
        let provider = Arc::new(MockSearchProvider::new().with_document(existing));

        let outcome = writer(store, provider.clone()).write(&uuid).await.unwrap();

        assert_eq!(outcome.mode, WriteMode::Update);
        let stored = provider.stored(&outcome.id).unwrap();
        assert_eq!(stored.instances.len(), 1);
        assert_eq!(stored.title.as_deref(), Some("Middlemarch"));
    }

    #[tokio::test]
    async fn test_reindex_is_idempotent() {
        let uuid = Uuid::new_v4();
        let store = MockWorkStore {
            graphs: HashMap::from([(uuid, graph_with_instances(uuid, 2))]),
        };
        let provider = Arc::new(MockSearchProvider::new());
        let writer = writer(store, provider.clone());

        let first = writer.write(&uuid).await.unwrap();
        let after_first = serde_json::to_string(&provider.stored(&first.id).unwrap()).unwrap();
        let second = writer.write(&uuid).await.unwrap();
        let after_second = serde_json::to_string(&provider.stored(&second.id).unwrap()).unwrap();

        assert_eq!(first.mode, WriteMode::Insert);
        assert_eq!(second.mode, WriteMode::Update);
        assert_eq!(after_first, after_second);
    }

    #[tokio::test]
    async fn test_missing_work_is_source_store_error() {
        let store = MockWorkStore {
            graphs: HashMap::new(),
        };
        let provider = Arc::new(MockSearchProvider::new());

        let result = writer(store, provider.clone()).write(&Uuid::new_v4()).await;

        assert!(matches!(result, Err(IngestError::SourceStoreError(_))));
        assert!(provider.upserts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_is_index_store_error() {
        let uuid = Uuid::new_v4();
        let store = MockWorkStore {
            graphs: HashMap::from([(uuid, graph_with_instances(uuid, 1))]),
        };
        let mut provider = MockSearchProvider::new();
        provider.fail_get = true;
        let provider = Arc::new(provider);

        let result = writer(store, provider.clone()).write(&uuid).await;

        assert!(matches!(result, Err(IngestError::IndexStoreError(_))));
        assert!(provider.upserts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_failure_leaves_document_unmodified() {
        let uuid = Uuid::new_v4();
        let mut existing = WorkDocument::new(&uuid);
        existing.title = Some("Stored".to_string());

        let store = MockWorkStore {
            graphs: HashMap::from([(uuid, graph_with_instances(uuid, 1))]),
        };
        let mut provider = MockSearchProvider::new().with_document(existing.clone());
        provider.fail_upsert = true;
        let provider = Arc::new(provider);

        let result = writer(store, provider.clone()).write(&uuid).await;

        assert!(matches!(result, Err(IngestError::IndexStoreError(_))));
        assert_eq!(provider.stored(&existing.uuid).unwrap(), existing);
    }

    #[tokio::test]
    async fn test_unreadable_stored_document_is_replaced() {
        let uuid = Uuid::new_v4();
        let store = MockWorkStore {
            graphs: HashMap::from([(uuid, graph_with_instances(uuid, 2))]),
        };
        let mut provider = MockSearchProvider::new();
        provider.unreadable = true;
        let provider = Arc::new(provider);

        let outcome = writer(store, provider.clone()).write(&uuid).await.unwrap();

        assert_eq!(outcome.mode, WriteMode::Update);
        let stored = provider.stored(&outcome.id).unwrap();
        assert_eq!(stored.uuid, outcome.id);
        assert_eq!(stored.instances.len(), 2);
        assert_eq!(stored.title.as_deref(), Some("Middlemarch"));
    }
}
