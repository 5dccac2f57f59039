//! Paged, session-guarded loading of a collection.
//!
//! An [`IncrementalLoader`] owns the visible item list of one editor and pulls
//! pages from a [`CollectionService`] on demand.
//!
//! - **Sessions.** Every reset bumps a session counter. A fetch captures the
//!   session it was started in and its result is discarded if the session has
//!   moved on by the time it resolves.
//! - **Coalescing.** While a fetch is in flight for the current session,
//!   [`fetch_more`](IncrementalLoader::fetch_more) hands out the same shared
//!   handle instead of issuing another `find`. The in-flight slot is cleared by
//!   an RAII guard whether the fetch succeeds, fails, or is dropped.
//! - **Exhaustion.** Once the service has nothing more to give (or a fetch
//!   failed) further calls resolve immediately without touching the service.
//!
//! The fetch future is lazy: `find` is issued when the handle is first polled.

use std::sync::{Arc, Weak};

use futures_util::future::{self, BoxFuture, FutureExt, Shared};
use panelgen_core::{build_search_filter, FindQuery, FindResponse, SearchField, SortDirection, SortKey};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::LoaderConfig;
use crate::error::LoaderError;
use crate::mutator::OptimisticMutator;
use crate::service::CollectionService;

/// How a fetch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// A page was appended.
    Loaded { count: usize },
    /// Nothing left to load; no request was made.
    Exhausted,
    /// The loader was reset while the request was running; its result was dropped.
    Stale,
}

pub type FetchResult = Result<FetchOutcome, LoaderError>;

/// Shared handle to a fetch. Every clone resolves to the same result.
pub type FetchHandle = Shared<BoxFuture<'static, FetchResult>>;

struct InFlight {
    session: u64,
    fetch_id: u64,
    handle: FetchHandle,
}

#[derive(Default)]
#[allow(clippy::struct_excessive_bools)]
struct LoaderState {
    items: Vec<Value>,
    total: u64,
    /// Items fetched in the current session.
    cursor: u64,
    session: u64,
    loading: bool,
    loaded: bool,
    exhausted: bool,
    /// Offset of the first loaded item, for page jumps.
    page_start: u64,
    /// Replace instead of append on the next successful page.
    clear_on_next_page: bool,
    search_filter: Map<String, Value>,
    sort: Vec<SortKey>,
    in_flight: Option<InFlight>,
    next_fetch_id: u64,
}

impl LoaderState {
    fn reset(&mut self, preserve_items: bool) {
        self.session += 1;
        self.cursor = 0;
        self.total = 0;
        self.loading = false;
        self.loaded = false;
        self.exhausted = false;
        if preserve_items {
            self.clear_on_next_page = true;
        } else {
            self.items.clear();
            self.clear_on_next_page = false;
        }
    }
}

struct LoaderInner {
    service: Arc<dyn CollectionService>,
    config: LoaderConfig,
    base_filter: Map<String, Value>,
    mutator: OptimisticMutator,
    state: Mutex<LoaderState>,
}

impl LoaderInner {
    /// Applies a finished `find` to the state, unless the session moved on.
    fn commit(
        &self,
        session: u64,
        limit: Option<u64>,
        result: anyhow::Result<FindResponse>,
    ) -> FetchResult {
        let mut state = self.state.lock();
        if state.session != session {
            debug!(path = %self.service.path(), session, current = state.session, "discarding stale page");
            return Ok(FetchOutcome::Stale);
        }
        state.loading = false;

        let response = match result {
            Ok(response) => response,
            Err(err) => {
                state.exhausted = true;
                if state.clear_on_next_page {
                    state.items.clear();
                    state.clear_on_next_page = false;
                }
                warn!(path = %self.service.path(), error = %err, "fetch failed, pagination stopped");
                return Err(LoaderError::fetch(err));
            }
        };

        let (total, data) = response.into_page();
        let count = data.len();
        let returned = count as u64;
        if state.clear_on_next_page {
            state.items.clear();
            state.clear_on_next_page = false;
        }
        state.items.extend(data);
        state.cursor += returned;
        state.total = total;
        state.loaded = true;
        state.exhausted = returned == 0
            || limit.is_some_and(|limit| returned < limit)
            || state.page_start + state.cursor >= total
            || !self.config.paginate;
        debug!(
            path = %self.service.path(),
            count,
            cursor = state.cursor,
            total,
            exhausted = state.exhausted,
            "page loaded"
        );
        Ok(FetchOutcome::Loaded { count })
    }
}

/// RAII guard clearing the in-flight slot when its fetch ends or is dropped.
struct InFlightGuard {
    inner: Weak<LoaderInner>,
    fetch_id: u64,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        let mut state = inner.state.lock();
        if state
            .in_flight
            .as_ref()
            .is_some_and(|f| f.fetch_id == self.fetch_id)
        {
            let in_flight = state.in_flight.take();
            if in_flight.is_some_and(|f| f.session == state.session) {
                state.loading = false;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// IncrementalLoader
// ---------------------------------------------------------------------------

/// Incrementally loads one collection. Cloning yields another handle to the
/// same loader.
#[derive(Clone)]
pub struct IncrementalLoader {
    inner: Arc<LoaderInner>,
}

impl IncrementalLoader {
    /// Creates a loader. `base_filter` is applied to every query; search
    /// constraints on the same path replace its entry.
    #[must_use]
    pub fn new(
        service: Arc<dyn CollectionService>,
        config: LoaderConfig,
        base_filter: Map<String, Value>,
    ) -> Self {
        let mutator = OptimisticMutator::new(&config.id_path);
        Self {
            inner: Arc::new(LoaderInner {
                service,
                config,
                base_filter,
                mutator,
                state: Mutex::new(LoaderState::default()),
            }),
        }
    }

    /// Requests the next page.
    ///
    /// Returns the pending handle when a fetch is already in flight for the
    /// current session, and an immediately ready [`FetchOutcome::Exhausted`]
    /// when there is nothing more to load.
    #[must_use]
    pub fn fetch_more(&self) -> FetchHandle {
        let mut state = self.inner.state.lock();
        if let Some(in_flight) = &state.in_flight {
            if in_flight.session == state.session {
                return in_flight.handle.clone();
            }
        }
        if state.exhausted {
            return future::ready(Ok(FetchOutcome::Exhausted)).boxed().shared();
        }

        let config = &self.inner.config;
        let mut filter = self.inner.base_filter.clone();
        filter.extend(
            state
                .search_filter
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        let limit = config.paginate.then_some(config.page_size);
        let query = FindQuery {
            filter,
            sort: state.sort.clone(),
            skip: state.page_start + state.cursor,
            limit,
        };

        let session = state.session;
        let fetch_id = state.next_fetch_id;
        state.next_fetch_id += 1;
        state.loading = true;

        let service = Arc::clone(&self.inner.service);
        let weak = Arc::downgrade(&self.inner);
        let handle = async move {
            let _guard = InFlightGuard {
                inner: weak.clone(),
                fetch_id,
            };
            let result = service.find(&query).await;
            match weak.upgrade() {
                Some(inner) => inner.commit(session, limit, result),
                None => Ok(FetchOutcome::Stale),
            }
        }
        .boxed()
        .shared();

        debug!(path = %self.inner.service.path(), session, fetch_id, "fetch started");
        let replaced = state.in_flight.replace(InFlight {
            session,
            fetch_id,
            handle: handle.clone(),
        });
        // The replaced fetch may hold the last handle; its guard locks the state.
        drop(state);
        drop(replaced);
        handle
    }

    /// Starts a new session. With `preserve_items` the visible list stays until
    /// the next page arrives and replaces it.
    pub fn reset(&self, preserve_items: bool) {
        let mut state = self.inner.state.lock();
        state.reset(preserve_items);
        debug!(path = %self.inner.service.path(), session = state.session, preserve_items, "loader reset");
    }

    /// Resets and starts loading at `offset` instead of the first record.
    pub fn set_page_start(&self, offset: u64) {
        let mut state = self.inner.state.lock();
        state.page_start = offset;
        state.reset(false);
    }

    /// Reloads the current window, keeping items visible until the first page.
    #[must_use]
    pub fn refresh(&self) -> FetchHandle {
        self.reset(true);
        self.fetch_more()
    }

    /// Invalidates an in-flight fetch without touching the loaded items.
    pub fn cancel(&self) {
        let mut state = self.inner.state.lock();
        state.session += 1;
        state.loading = false;
    }

    /// Replaces the search constraints and starts over from the first record.
    pub fn set_query(&self, filter: Map<String, Value>) {
        let mut state = self.inner.state.lock();
        state.search_filter = filter;
        state.page_start = 0;
        state.reset(true);
    }

    /// [`set_query`](Self::set_query) with the constraints of the active fields.
    pub fn set_search(&self, fields: &[SearchField]) {
        self.set_query(build_search_filter(fields));
    }

    /// Replaces the sort keys and starts over from the first record.
    pub fn set_sort(&self, keys: impl IntoIterator<Item = SortKey>) {
        let mut state = self.inner.state.lock();
        state.sort = keys.into_iter().collect();
        state.page_start = 0;
        state.reset(true);
    }

    /// Cycles `path` through ascending, descending, and unsorted.
    ///
    /// Without `append` every other sort key is dropped.
    pub fn toggle_sort(&self, path: &str, append: bool) {
        let mut state = self.inner.state.lock();
        let current = state
            .sort
            .iter()
            .find(|k| k.path == path)
            .map(|k| k.direction);
        if !append {
            state.sort.retain(|k| k.path == path);
        }
        match current {
            None => state.sort.push(SortKey::asc(path)),
            Some(SortDirection::Asc) => {
                if let Some(key) = state.sort.iter_mut().find(|k| k.path == path) {
                    key.direction = SortDirection::Desc;
                }
            }
            Some(SortDirection::Desc) => state.sort.retain(|k| k.path != path),
        }
        state.page_start = 0;
        state.reset(true);
    }

    // -----------------------------------------------------------------------
    // Optimistic mutation
    // -----------------------------------------------------------------------

    pub fn mutate_after_create(&self, created: Value) {
        let mut state = self.inner.state.lock();
        self.inner.mutator.on_created(&mut state.items, created);
    }

    /// Returns `false` when the record is not among the loaded items.
    pub fn mutate_after_save(&self, record: Value) -> bool {
        let mut state = self.inner.state.lock();
        self.inner.mutator.on_patched(&mut state.items, record)
    }

    /// Returns `false` when the record is not among the loaded items.
    pub fn mutate_after_delete(&self, id: &Value) -> bool {
        let mut state = self.inner.state.lock();
        self.inner.mutator.on_removed(&mut state.items, id)
    }

    /// Creates through the service and surfaces the result at the top of the list.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::Mutation`] if the service rejects the write; the
    /// item list is left untouched.
    pub async fn create(&self, payload: Value) -> Result<Value, LoaderError> {
        let created = self.inner.service.create(payload).await.map_err(|err| {
            warn!(path = %self.inner.service.path(), error = %err, "create failed");
            LoaderError::mutation(err)
        })?;
        self.mutate_after_create(created.clone());
        Ok(created)
    }

    /// Patches through the service and replaces the loaded copy in place.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::Mutation`] if the service rejects the write.
    pub async fn patch(&self, id: &Value, payload: Value) -> Result<Value, LoaderError> {
        let updated = self.inner.service.patch(id, payload).await.map_err(|err| {
            warn!(path = %self.inner.service.path(), id = %id, error = %err, "patch failed");
            LoaderError::mutation(err)
        })?;
        self.mutate_after_save(updated.clone());
        Ok(updated)
    }

    /// Removes through the service and drops the loaded copy.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::Mutation`] if the service rejects the write.
    pub async fn remove(&self, id: &Value) -> Result<Value, LoaderError> {
        let removed = self.inner.service.remove(id).await.map_err(|err| {
            warn!(path = %self.inner.service.path(), id = %id, error = %err, "remove failed");
            LoaderError::mutation(err)
        })?;
        self.mutate_after_delete(id);
        Ok(removed)
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Snapshot of the loaded items in display order.
    #[must_use]
    pub fn items(&self) -> Vec<Value> {
        self.inner.state.lock().items.clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.state.lock().items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.state.lock().items.is_empty()
    }

    /// Server-reported total. Approximate after optimistic mutations.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.inner.state.lock().total
    }

    #[must_use]
    pub fn cursor(&self) -> u64 {
        self.inner.state.lock().cursor
    }

    #[must_use]
    pub fn session(&self) -> u64 {
        self.inner.state.lock().session
    }

    #[must_use]
    pub fn page_start(&self) -> u64 {
        self.inner.state.lock().page_start
    }

    #[must_use]
    pub fn sort(&self) -> Vec<SortKey> {
        self.inner.state.lock().sort.clone()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.inner.state.lock().loading
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.inner.state.lock().loaded
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.inner.state.lock().exhausted
    }
}
