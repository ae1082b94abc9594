//! Catalog queries: popular lists and incremental search.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tracing::{debug, instrument, warn};

use popflix_core::{ContentItem, ContentType, SearchView};

use crate::api::RemoteService;
use crate::error::Result;

/// Maximum number of search matches shown.
pub const SEARCH_RESULT_LIMIT: usize = 5;

// =============================================================================
// Popular lists
// =============================================================================

/// Both popular lists for the landing screen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HomeFeed {
    pub movies: Vec<ContentItem>,
    pub shows: Vec<ContentItem>,
}

/// Fetches popular lists. Caching is the remote service's concern.
#[derive(Clone)]
pub struct CatalogService {
    api: Arc<dyn RemoteService>,
}

impl CatalogService {
    #[must_use]
    pub fn new(api: Arc<dyn RemoteService>) -> Self {
        Self { api }
    }

    /// Popular titles of one type, in display order.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Remote`](crate::ClientError::Remote) if the
    /// list cannot be fetched.
    #[instrument(skip(self))]
    pub async fn fetch_popular(&self, content_type: ContentType) -> Result<Vec<ContentItem>> {
        Ok(self.api.popular(content_type).await?)
    }

    /// Popular titles, or an empty list if they cannot be fetched.
    pub async fn fetch_popular_or_empty(&self, content_type: ContentType) -> Vec<ContentItem> {
        self.fetch_popular(content_type).await.unwrap_or_else(|e| {
            warn!(error = %e, %content_type, "Popular list unavailable, showing none");
            Vec::new()
        })
    }

    /// Fetch both popular lists concurrently. Each falls back to empty
    /// independently.
    pub async fn fetch_home(&self) -> HomeFeed {
        let (movies, shows) = tokio::join!(
            self.fetch_popular_or_empty(ContentType::Movie),
            self.fetch_popular_or_empty(ContentType::Tv),
        );
        HomeFeed { movies, shows }
    }
}

// =============================================================================
// Search
// =============================================================================

/// What happened to a search.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// The results were applied to the view.
    Applied(SearchView),
    /// The query was blank; the view was cleared and hidden.
    Hidden,
    /// A newer query was issued first; these results were discarded.
    Superseded,
}

/// Drives the search box.
///
/// Only the most recently issued query may update the view. A query is
/// issued when [`search`](Self::search) is called, not when its future is
/// first polled.
#[derive(Clone)]
pub struct SearchController {
    inner: Arc<SearchInner>,
}

struct SearchInner {
    api: Arc<dyn RemoteService>,
    generation: AtomicU64,
    commit: Mutex<()>,
    view: watch::Sender<SearchView>,
}

impl SearchInner {
    fn advance(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Replace the view if `generation` is still current.
    fn apply(&self, generation: u64, view: SearchView) -> bool {
        let _guard = self.commit.lock().unwrap_or_else(PoisonError::into_inner);
        if self.generation.load(Ordering::SeqCst) != generation {
            return false;
        }
        self.view.send_replace(view);
        true
    }
}

impl SearchController {
    #[must_use]
    pub fn new(api: Arc<dyn RemoteService>) -> Self {
        let (view, _) = watch::channel(SearchView::hidden());
        Self {
            inner: Arc::new(SearchInner {
                api,
                generation: AtomicU64::new(0),
                commit: Mutex::new(()),
                view,
            }),
        }
    }

    /// Snapshot of the current view.
    #[must_use]
    pub fn view(&self) -> SearchView {
        self.inner.view.borrow().clone()
    }

    /// Receiver notified on every view change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SearchView> {
        self.inner.view.subscribe()
    }

    /// Search the catalog.
    ///
    /// A blank query hides the view immediately and supersedes every
    /// in-flight search. Otherwise the first [`SEARCH_RESULT_LIMIT`] matches
    /// replace the view, unless a newer query was issued in the meantime.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Remote`](crate::ClientError::Remote) if the
    /// current query fails; the view is left as it was.
    pub fn search(
        &self,
        query: &str,
    ) -> impl Future<Output = Result<SearchOutcome>> + Send + use<> {
        let inner = Arc::clone(&self.inner);
        let query = query.trim().to_string();
        let generation = inner.advance();

        if query.is_empty() {
            inner.apply(generation, SearchView::hidden());
        }

        async move {
            if query.is_empty() {
                return Ok(SearchOutcome::Hidden);
            }

            let result = inner.api.search(&query).await;

            let mut results = match result {
                Ok(results) => results,
                Err(e) => {
                    if inner.generation.load(Ordering::SeqCst) != generation {
                        debug!(%query, "Ignoring failure of superseded search");
                        return Ok(SearchOutcome::Superseded);
                    }
                    warn!(error = %e, %query, "Search failed");
                    return Err(e.into());
                }
            };
            results.truncate(SEARCH_RESULT_LIMIT);

            let view = SearchView {
                results,
                visible: true,
            };
            if inner.apply(generation, view.clone()) {
                Ok(SearchOutcome::Applied(view))
            } else {
                debug!(%query, "Discarding superseded search results");
                Ok(SearchOutcome::Superseded)
            }
        }
    }

    /// Hide and clear the results, e.g. after one was selected. Supersedes
    /// in-flight searches.
    pub fn dismiss(&self) {
        let generation = self.inner.advance();
        self.inner.apply(generation, SearchView::hidden());
    }
}
