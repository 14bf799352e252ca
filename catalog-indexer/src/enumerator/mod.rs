//! Lazy enumeration of works modified since a point in time.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use tracing::debug;

use crate::errors::IngestError;
use catalog_indexer_repository::WorkStore;
use catalog_indexer_shared::ChangedWork;

/// Number of works fetched from the store per page.
pub const DEFAULT_PAGE_SIZE: i64 = 100;

/// Enumerates changed works in pages, ordered by internal id.
///
/// Paging is keyed on the last id seen, so rows modified while the stream is
/// being consumed neither shift nor repeat earlier pages.
pub struct ChangeEnumerator {
    store: Arc<dyn WorkStore>,
    page_size: i64,
}

impl ChangeEnumerator {
    /// Create a new enumerator with the default page size.
    pub fn new(store: Arc<dyn WorkStore>) -> Self {
        Self::with_page_size(store, DEFAULT_PAGE_SIZE)
    }

    /// Create a new enumerator fetching `page_size` works per page.
    pub fn with_page_size(store: Arc<dyn WorkStore>, page_size: i64) -> Self {
        Self {
            store,
            page_size: page_size.max(1),
        }
    }

    /// Stream every work whose modification time is at or after `since`.
    ///
    /// Pages are fetched on demand. A store failure ends the stream with one
    /// `SourceStoreError` item.
    pub fn enumerate(&self, since: DateTime<Utc>) -> BoxStream<'static, Result<ChangedWork, IngestError>> {
        let store = Arc::clone(&self.store);
        let page_size = self.page_size;

        stream::try_unfold(Some(0_i64), move |cursor| {
            let store = Arc::clone(&store);
            async move { fetch_page(store, since, cursor, page_size).await }
        })
        .map_ok(|page| stream::iter(page.into_iter().map(Ok::<ChangedWork, IngestError>)))
        .try_flatten()
        .boxed()
    }
}

/// Fetch the page after `cursor`. The next cursor is `None` once a short page
/// shows the store is exhausted.
async fn fetch_page(
    store: Arc<dyn WorkStore>,
    since: DateTime<Utc>,
    cursor: Option<i64>,
    page_size: i64,
) -> Result<Option<(Vec<ChangedWork>, Option<i64>)>, IngestError> {
    let Some(after_id) = cursor else {
        return Ok(None);
    };

    let page = store
        .fetch_modified_since(since, after_id, page_size)
        .await?;

    debug!(after_id, fetched = page.len(), "Fetched page of changed works");

    if page.is_empty() {
        return Ok(None);
    }

    let next = if (page.len() as i64) < page_size {
        None
    } else {
        page.last().map(|work| work.id)
    };

    Ok(Some((page, next)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use catalog_indexer_repository::WorkStoreError;
    use catalog_indexer_shared::WorkGraph;
    use chrono::Duration;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    struct PagedStore {
        works: Vec<(ChangedWork, DateTime<Utc>)>,
        calls: AtomicUsize,
        fail_on_call: Option<usize>,
    }

    impl PagedStore {
        fn with_works(count: i64, modified: DateTime<Utc>) -> Self {
            Self {
                works: (1..=count)
                    .map(|id| {
                        let work = ChangedWork {
                            id,
                            uuid: Uuid::new_v4(),
                        };
                        (work, modified)
                    })
                    .collect(),
                calls: AtomicUsize::new(0),
                fail_on_call: None,
            }
        }
    }

    #[async_trait]
    impl WorkStore for PagedStore {
        async fn fetch_modified_since(
            &self,
            since: DateTime<Utc>,
            after_id: i64,
            limit: i64,
        ) -> Result<Vec<ChangedWork>, WorkStoreError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on_call == Some(call) {
                return Err(WorkStoreError::unexpected_shape("connection reset"));
            }
            Ok(self
                .works
                .iter()
                .filter(|(work, modified)| *modified >= since && work.id > after_id)
                .take(limit as usize)
                .map(|(work, _)| *work)
                .collect())
        }

        async fn fetch_graph(&self, uuid: &Uuid) -> Result<WorkGraph, WorkStoreError> {
            Err(WorkStoreError::WorkNotFound(*uuid))
        }
    }

    #[tokio::test]
    async fn test_enumerates_all_pages_in_order() {
        let now = Utc::now();
        let store = Arc::new(PagedStore::with_works(23, now));
        let enumerator = ChangeEnumerator::with_page_size(store.clone(), 10);

        let works: Vec<ChangedWork> = enumerator
            .enumerate(now - Duration::hours(1))
            .try_collect()
            .await
            .unwrap();

        let ids: Vec<i64> = works.iter().map(|w| w.id).collect();
        assert_eq!(ids, (1..=23).collect::<Vec<_>>());
        // Two full pages and one short page
        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exact_page_multiple_ends_on_empty_page() {
        let now = Utc::now();
        let store = Arc::new(PagedStore::with_works(20, now));
        let enumerator = ChangeEnumerator::with_page_size(store.clone(), 10);

        let count = enumerator
            .enumerate(now - Duration::hours(1))
            .try_collect::<Vec<_>>()
            .await
            .unwrap()
            .len();

        assert_eq!(count, 20);
        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_nothing_changed() {
        let now = Utc::now();
        let store = Arc::new(PagedStore::with_works(5, now - Duration::days(2)));
        let enumerator = ChangeEnumerator::new(store);

        let works: Vec<ChangedWork> = enumerator
            .enumerate(now - Duration::hours(1))
            .try_collect()
            .await
            .unwrap();
        assert!(works.is_empty());
    }

    #[tokio::test]
    async fn test_stream_is_lazy() {
        let now = Utc::now();
        let store = Arc::new(PagedStore::with_works(30, now));
        let enumerator = ChangeEnumerator::with_page_size(store.clone(), 10);

        let mut stream = enumerator.enumerate(now - Duration::hours(1));
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);

        stream.next().await.unwrap().unwrap();
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_store_failure_ends_stream_with_error() {
        let now = Utc::now();
        let mut store = PagedStore::with_works(25, now);
        store.fail_on_call = Some(1);
        let enumerator = ChangeEnumerator::with_page_size(Arc::new(store), 10);

        let items: Vec<Result<ChangedWork, IngestError>> =
            enumerator.enumerate(now - Duration::hours(1)).collect().await;

        assert_eq!(items.len(), 11);
        assert!(items[..10].iter().all(Result::is_ok));
        assert!(matches!(items[10], Err(IngestError::SourceStoreError(_))));
    }
}
