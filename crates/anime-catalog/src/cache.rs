//! Query cache for catalog reads.
//!
//! Every remote read is keyed by its semantic parameters and cached with a
//! freshness window. Past the window an entry is still served, flagged
//! stale, while a background refetch replaces it. Identical requests that
//! overlap share one in-flight fetch; the fetch is aborted only when every
//! caller waiting on it has cancelled. Failed and cancelled fetches never
//! touch stored entries.
//!
//! Lists come in two retrieval modes behind one interface: `Paged` keeps
//! one entry per page, `Infinite` accumulates pages into one stack keyed by
//! the query without its page number.

use crate::api::{
    Anime, AnimePage, CatalogSource, CancelToken, CharacterRole, Picture, Relation, Statistics,
    SubResource, SubResourceKind, Videos,
};
use crate::error::{ApiError, QueryError, QueryErrorKind};
use crate::query::{ListMode, ListQuery};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Freshness window for list queries
pub const LIST_STALE_TIME: Duration = Duration::from_secs(5 * 60);
/// Freshness window for detail and sub-resource queries
pub const DETAIL_STALE_TIME: Duration = Duration::from_secs(10 * 60);
/// Entries unused for this long are dropped by `collect_garbage`
pub const GC_TIME: Duration = Duration::from_secs(30 * 60);
/// Stored entries between opportunistic garbage sweeps
pub const GC_SWEEP_INTERVAL: usize = 64;

/// Cache timing settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    pub list_stale_time: Duration,
    pub detail_stale_time: Duration,
    pub gc_time: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            list_stale_time: LIST_STALE_TIME,
            detail_stale_time: DETAIL_STALE_TIME,
            gc_time: GC_TIME,
        }
    }
}

impl From<&shared::config::CacheConfig> for CacheSettings {
    fn from(config: &shared::config::CacheConfig) -> Self {
        Self {
            list_stale_time: config.list_stale_time(),
            detail_stale_time: config.detail_stale_time(),
            gc_time: config.gc_time(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CacheKey {
    /// One page of a paged list
    List(ListQuery),
    /// An accumulated page stack, keyed without the page number
    Infinite(ListQuery),
    /// The next page of an accumulated stack; only ever in flight
    Cursor(ListQuery, u32),
    Detail(u32),
    Sub(u32, SubResourceKind),
}

impl CacheKey {
    fn stale_time(&self, settings: &CacheSettings) -> Duration {
        match self {
            CacheKey::List(_) | CacheKey::Infinite(_) | CacheKey::Cursor(..) => {
                settings.list_stale_time
            }
            CacheKey::Detail(_) | CacheKey::Sub(..) => settings.detail_stale_time,
        }
    }

    fn is_list(&self) -> bool {
        matches!(self, CacheKey::List(_) | CacheKey::Infinite(_))
    }
}

#[derive(Debug, Clone)]
enum Payload {
    Page(Arc<AnimePage>),
    Pages(Vec<Arc<AnimePage>>),
    Anime(Arc<Anime>),
    Sub(SubResource),
}

struct Entry {
    payload: Payload,
    fetched_at: Instant,
    last_used: Instant,
}

type FetchResult = Result<Payload, ApiError>;
type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;
type Fetcher = Box<dyn FnOnce(Arc<dyn CatalogSource>) -> BoxFuture<'static, FetchResult> + Send>;

struct InFlight {
    id: u64,
    fetch: SharedFetch,
    waiters: usize,
    abort: AbortHandle,
    /// Stale-while-revalidate refreshes outlive their (zero) waiters
    background: bool,
}

#[derive(Default)]
struct State {
    entries: HashMap<CacheKey, Entry>,
    in_flight: HashMap<CacheKey, InFlight>,
    next_id: u64,
    /// Entries stored since the last garbage sweep
    stored_since_sweep: usize,
}

struct Inner {
    source: Arc<dyn CatalogSource>,
    settings: CacheSettings,
    state: Mutex<State>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a finished fetch. Only successes are stored.
    fn settle(&self, key: &CacheKey, id: u64, result: &FetchResult) {
        let mut state = self.lock();
        if state.in_flight.get(key).is_some_and(|f| f.id == id) {
            state.in_flight.remove(key);
        }

        match result {
            Ok(payload) => store(&mut state, key, payload.clone(), self.settings.gc_time),
            Err(ApiError::Cancelled) => debug!(key = ?key, "Fetch cancelled"),
            Err(e) => warn!(key = ?key, error = %e, "Query failed"),
        }
    }

    /// A waiter stopped waiting; abort the fetch once nobody is left
    fn release(&self, key: &CacheKey, id: u64) {
        let mut state = self.lock();
        let Some(flight) = state.in_flight.get_mut(key) else {
            return;
        };
        if flight.id != id {
            return;
        }

        flight.waiters = flight.waiters.saturating_sub(1);
        if flight.waiters == 0 && !flight.background {
            flight.abort.abort();
            state.in_flight.remove(key);
            debug!(key = ?key, "Aborted fetch with no remaining waiters");
        }
    }
}

fn store(state: &mut State, key: &CacheKey, mut payload: Payload, gc_time: Duration) {
    let now = Instant::now();

    if let (CacheKey::Cursor(base, page), Payload::Page(next)) = (key, &payload) {
        match state.entries.get_mut(&CacheKey::Infinite(base.clone())) {
            Some(Entry {
                payload: Payload::Pages(pages),
                last_used,
                ..
            }) => {
                let expected = pages
                    .last()
                    .map(|p| p.pagination.current_page + 1)
                    .unwrap_or(1);
                if *page == expected {
                    pages.push(Arc::clone(next));
                    *last_used = now;
                    debug!(page = page, pages = pages.len(), "Appended page to infinite list");
                } else {
                    debug!(page = page, expected = expected, "Discarding out-of-sequence page");
                }
            }
            _ => debug!(page = page, "Infinite list was invalidated, discarding page"),
        }
        return;
    }

    // A revalidated stack keeps pages appended while it was being refetched
    if let (CacheKey::Infinite(_), Payload::Pages(fresh)) = (key, &mut payload) {
        if let Some(Entry {
            payload: Payload::Pages(old),
            ..
        }) = state.entries.get(key)
        {
            if fresh.len() < old.len() && fresh.last().is_some_and(|p| p.pagination.has_next_page) {
                fresh.extend(old[fresh.len()..].iter().cloned());
            }
        }
    }

    state.entries.insert(
        key.clone(),
        Entry {
            payload,
            fetched_at: now,
            last_used: now,
        },
    );
    debug!(key = ?key, "Cache stored");

    state.stored_since_sweep += 1;
    if state.stored_since_sweep >= GC_SWEEP_INTERVAL {
        let removed = sweep(state, gc_time, now);
        if removed > 0 {
            debug!(removed = removed, "Swept unused cache entries");
        }
    }
}

fn sweep(state: &mut State, gc_time: Duration, now: Instant) -> usize {
    state.stored_since_sweep = 0;
    let before = state.entries.len();
    state
        .entries
        .retain(|_, entry| now.duration_since(entry.last_used) < gc_time);
    before - state.entries.len()
}

/// Releases a waiter's claim on an in-flight fetch when dropped, whether
/// the wait finished, was cancelled, or the caller's future was dropped.
struct WaiterGuard {
    inner: Arc<Inner>,
    key: CacheKey,
    id: u64,
}

impl Drop for WaiterGuard {
    fn drop(&mut self) {
        self.inner.release(&self.key, self.id);
    }
}

/// A cached value and whether it is past its freshness window
#[derive(Debug, Clone, PartialEq)]
pub struct Cached<T> {
    pub value: T,
    pub is_stale: bool,
}

/// What a list view renders, for either retrieval mode
#[derive(Debug, Clone)]
pub struct ListSnapshot {
    pages: Vec<Arc<AnimePage>>,
    pub mode: ListMode,
    pub is_stale: bool,
}

impl ListSnapshot {
    /// Items across every loaded page, in fetch order
    pub fn items(&self) -> impl Iterator<Item = &Anime> {
        self.pages.iter().flat_map(|p| p.data.iter())
    }

    pub fn len(&self) -> usize {
        self.pages.iter().map(|p| p.data.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pages_loaded(&self) -> usize {
        self.pages.len()
    }

    pub fn current_page(&self) -> u32 {
        self.pages
            .last()
            .map(|p| p.pagination.current_page)
            .unwrap_or(1)
    }

    pub fn last_visible_page(&self) -> u32 {
        self.pages
            .last()
            .map(|p| p.pagination.last_visible_page)
            .unwrap_or(1)
    }

    pub fn has_next_page(&self) -> bool {
        self.pages
            .last()
            .is_some_and(|p| p.pagination.has_next_page)
    }

    /// Total matches reported by the server, when it reports them
    pub fn total_items(&self) -> Option<u32> {
        self.pages
            .last()
            .and_then(|p| p.pagination.items.as_ref())
            .map(|i| i.total)
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub in_flight: usize,
}

/// Outcome of the synchronous half of a next-page request
enum NextStep {
    Load,
    Done(ListSnapshot),
    Wait(CacheKey, u64, SharedFetch),
}

/// Query cache over a `CatalogSource`.
///
/// Cheap to clone; clones share entries and in-flight fetches. Needs a
/// Tokio runtime: fetches run as spawned tasks.
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<Inner>,
}

impl QueryCache {
    pub fn new(source: Arc<dyn CatalogSource>, settings: CacheSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                settings,
                state: Mutex::new(State::default()),
            }),
        }
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.inner.settings
    }

    // ========== Lists ==========

    /// Load a list in the given mode.
    ///
    /// Infinite mode returns every page accumulated so far, loading the
    /// first one if nothing is cached. `Ok(None)` means cancelled.
    pub async fn list(
        &self,
        query: &ListQuery,
        mode: ListMode,
        token: &CancelToken,
    ) -> Result<Option<ListSnapshot>, QueryError> {
        match mode {
            ListMode::Paged => {
                let page_query = query.clone();
                let cached = self
                    .query(CacheKey::List(query.clone()), token, list_fetcher(page_query, false))
                    .await?;
                Ok(cached.map(|c| snapshot_from(c, ListMode::Paged)))
            }
            ListMode::Infinite => {
                let base = query.without_page();
                let cached = self
                    .query(CacheKey::Infinite(base.clone()), token, list_fetcher(base, true))
                    .await?;
                Ok(cached.map(|c| snapshot_from(c, ListMode::Infinite)))
            }
        }
    }

    /// Advance a list by one page.
    ///
    /// Paged mode loads the page after `query`'s page. Infinite mode
    /// fetches exactly the page after the last accumulated one and appends
    /// it; overlapping calls share that one fetch. Once the server reports
    /// no next page this returns the current list without a request.
    pub async fn fetch_next_page(
        &self,
        query: &ListQuery,
        mode: ListMode,
        token: &CancelToken,
    ) -> Result<Option<ListSnapshot>, QueryError> {
        match mode {
            ListMode::Paged => {
                if let Some(current) = self.peek_list(query, ListMode::Paged) {
                    if !current.has_next_page() {
                        return Ok(Some(current));
                    }
                }
                let next = query.clone().with_page(query.page() + 1);
                self.list(&next, ListMode::Paged, token).await
            }
            ListMode::Infinite => self.fetch_next_infinite(query, token).await,
        }
    }

    async fn fetch_next_infinite(
        &self,
        query: &ListQuery,
        token: &CancelToken,
    ) -> Result<Option<ListSnapshot>, QueryError> {
        let base = query.without_page();

        let step = {
            let mut state = self.inner.lock();
            match self.snapshot_locked(&state, &CacheKey::Infinite(base.clone())) {
                None => NextStep::Load,
                Some(current) if !current.has_next_page() => NextStep::Done(current),
                Some(_) if token.is_cancelled() => return Ok(None),
                Some(current) => {
                    let next = current.current_page() + 1;
                    let cursor = CacheKey::Cursor(base.clone(), next);
                    let page_query = base.clone().with_page(next);
                    let (id, fetch) =
                        self.join_or_spawn(&mut state, cursor.clone(), list_fetcher(page_query, false));
                    NextStep::Wait(cursor, id, fetch)
                }
            }
        };

        match step {
            NextStep::Load => self.list(&base, ListMode::Infinite, token).await,
            NextStep::Done(current) => {
                debug!(page = current.current_page(), "No further pages");
                Ok(Some(current))
            }
            NextStep::Wait(cursor, id, fetch) => {
                match self.wait(cursor, id, fetch, token).await? {
                    None => Ok(None),
                    Some(_) => Ok(self.peek_list(&base, ListMode::Infinite)),
                }
            }
        }
    }

    /// Whatever is cached for a list, without fetching
    pub fn peek_list(&self, query: &ListQuery, mode: ListMode) -> Option<ListSnapshot> {
        let key = match mode {
            ListMode::Paged => CacheKey::List(query.clone()),
            ListMode::Infinite => CacheKey::Infinite(query.without_page()),
        };
        let state = self.inner.lock();
        self.snapshot_locked(&state, &key)
    }

    /// Whether a next-page fetch is running for this infinite list
    pub fn is_fetching_next_page(&self, query: &ListQuery) -> bool {
        let base = query.without_page();
        self.inner
            .lock()
            .in_flight
            .keys()
            .any(|k| matches!(k, CacheKey::Cursor(b, _) if *b == base))
    }

    /// Drop a cached list and load it again ("Try Again")
    pub async fn refetch_list(
        &self,
        query: &ListQuery,
        mode: ListMode,
        token: &CancelToken,
    ) -> Result<Option<ListSnapshot>, QueryError> {
        self.invalidate_list(query, mode);
        self.list(query, mode, token).await
    }

    // ========== Details ==========

    /// Load one anime by id
    pub async fn anime(
        &self,
        mal_id: u32,
        token: &CancelToken,
    ) -> Result<Option<Cached<Arc<Anime>>>, QueryError> {
        let fetcher: Fetcher = Box::new(move |source| {
            async move {
                let token = CancelToken::new();
                source
                    .fetch_anime(mal_id, &token)
                    .await
                    .map(|anime| Payload::Anime(Arc::new(anime)))
            }
            .boxed()
        });

        let cached = self.query(CacheKey::Detail(mal_id), token, fetcher).await?;
        extract(cached, |payload| match payload {
            Payload::Anime(anime) => Some(anime),
            _ => None,
        })
    }

    /// Load one detail sub-resource. Each kind is its own entry.
    pub async fn sub_resource(
        &self,
        mal_id: u32,
        kind: SubResourceKind,
        token: &CancelToken,
    ) -> Result<Option<Cached<SubResource>>, QueryError> {
        let fetcher: Fetcher = Box::new(move |source| {
            async move {
                let token = CancelToken::new();
                source
                    .fetch_sub_resource(mal_id, kind, &token)
                    .await
                    .map(Payload::Sub)
            }
            .boxed()
        });

        let cached = self.query(CacheKey::Sub(mal_id, kind), token, fetcher).await?;
        extract(cached, |payload| match payload {
            Payload::Sub(sub) if sub.kind() == kind => Some(sub),
            _ => None,
        })
    }

    pub async fn pictures(
        &self,
        mal_id: u32,
        token: &CancelToken,
    ) -> Result<Option<Cached<Arc<Vec<Picture>>>>, QueryError> {
        let cached = self.sub_resource(mal_id, SubResourceKind::Pictures, token).await?;
        extract(cached, |sub| match sub {
            SubResource::Pictures(p) => Some(p),
            _ => None,
        })
    }

    pub async fn videos(
        &self,
        mal_id: u32,
        token: &CancelToken,
    ) -> Result<Option<Cached<Arc<Videos>>>, QueryError> {
        let cached = self.sub_resource(mal_id, SubResourceKind::Videos, token).await?;
        extract(cached, |sub| match sub {
            SubResource::Videos(v) => Some(v),
            _ => None,
        })
    }

    pub async fn statistics(
        &self,
        mal_id: u32,
        token: &CancelToken,
    ) -> Result<Option<Cached<Arc<Statistics>>>, QueryError> {
        let cached = self.sub_resource(mal_id, SubResourceKind::Statistics, token).await?;
        extract(cached, |sub| match sub {
            SubResource::Statistics(s) => Some(s),
            _ => None,
        })
    }

    pub async fn relations(
        &self,
        mal_id: u32,
        token: &CancelToken,
    ) -> Result<Option<Cached<Arc<Vec<Relation>>>>, QueryError> {
        let cached = self.sub_resource(mal_id, SubResourceKind::Relations, token).await?;
        extract(cached, |sub| match sub {
            SubResource::Relations(r) => Some(r),
            _ => None,
        })
    }

    pub async fn characters(
        &self,
        mal_id: u32,
        token: &CancelToken,
    ) -> Result<Option<Cached<Arc<Vec<CharacterRole>>>>, QueryError> {
        let cached = self.sub_resource(mal_id, SubResourceKind::Characters, token).await?;
        extract(cached, |sub| match sub {
            SubResource::Characters(c) => Some(c),
            _ => None,
        })
    }

    // ========== Invalidation ==========

    pub fn invalidate_list(&self, query: &ListQuery, mode: ListMode) {
        let key = match mode {
            ListMode::Paged => CacheKey::List(query.clone()),
            ListMode::Infinite => CacheKey::Infinite(query.without_page()),
        };
        if self.inner.lock().entries.remove(&key).is_some() {
            debug!(key = ?key, "Invalidated list");
        }
    }

    /// Drop every cached list in both modes
    pub fn invalidate_lists(&self) {
        let mut state = self.inner.lock();
        state.entries.retain(|key, _| !key.is_list());
    }

    /// Drop an anime's details and all of its sub-resources
    pub fn invalidate_anime(&self, mal_id: u32) {
        let mut state = self.inner.lock();
        state.entries.retain(|key, _| match key {
            CacheKey::Detail(id) | CacheKey::Sub(id, _) => *id != mal_id,
            _ => true,
        });
    }

    pub fn invalidate_all(&self) {
        self.inner.lock().entries.clear();
    }

    /// Drop entries nobody has read within the gc window.
    ///
    /// The same sweep also runs every `GC_SWEEP_INTERVAL` stores. Returns
    /// the number of entries removed.
    pub fn collect_garbage(&self) -> usize {
        let mut state = self.inner.lock();
        let removed = sweep(&mut state, self.inner.settings.gc_time, Instant::now());
        if removed > 0 {
            debug!(removed = removed, "Collected unused cache entries");
        }
        removed
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.inner.lock();
        CacheStats {
            entries: state.entries.len(),
            in_flight: state.in_flight.len(),
        }
    }

    // ========== Core ==========

    /// Serve `key` from cache or fetch it. `Ok(None)` means cancelled.
    async fn query(
        &self,
        key: CacheKey,
        token: &CancelToken,
        fetcher: Fetcher,
    ) -> Result<Option<Cached<Payload>>, QueryError> {
        let (id, fetch) = {
            let mut state = self.inner.lock();
            let now = Instant::now();
            let stale_time = key.stale_time(&self.inner.settings);

            let hit = state.entries.get_mut(&key).map(|entry| {
                entry.last_used = now;
                (
                    entry.payload.clone(),
                    now.duration_since(entry.fetched_at) >= stale_time,
                )
            });

            if let Some((payload, is_stale)) = hit {
                if is_stale && !state.in_flight.contains_key(&key) {
                    debug!(key = ?key, "Serving stale entry while revalidating");
                    let fetcher = revalidation_fetcher(&key, &payload, fetcher);
                    self.spawn_revalidation(&mut state, key, fetcher);
                } else {
                    debug!(key = ?key, stale = is_stale, "Cache hit");
                }
                return Ok(Some(Cached {
                    value: payload,
                    is_stale,
                }));
            }

            if token.is_cancelled() {
                return Ok(None);
            }

            debug!(key = ?key, "Cache miss");
            self.join_or_spawn(&mut state, key.clone(), fetcher)
        };

        Ok(self.wait(key, id, fetch, token).await?.map(|payload| Cached {
            value: payload,
            is_stale: false,
        }))
    }

    fn join_or_spawn(&self, state: &mut State, key: CacheKey, fetcher: Fetcher) -> (u64, SharedFetch) {
        if let Some(flight) = state.in_flight.get_mut(&key) {
            flight.waiters += 1;
            debug!(key = ?key, waiters = flight.waiters, "Joining in-flight fetch");
            return (flight.id, flight.fetch.clone());
        }
        self.spawn_fetch(state, key, fetcher, false)
    }

    /// Refresh an entry in the background; nobody waits on the result
    fn spawn_revalidation(&self, state: &mut State, key: CacheKey, fetcher: Fetcher) {
        let (id, _) = self.spawn_fetch(state, key.clone(), fetcher, true);
        debug!(key = ?key, id = id, "Started background revalidation");
    }

    fn spawn_fetch(
        &self,
        state: &mut State,
        key: CacheKey,
        fetcher: Fetcher,
        background: bool,
    ) -> (u64, SharedFetch) {
        let id = state.next_id;
        state.next_id += 1;

        let inner = Arc::clone(&self.inner);
        let source = Arc::clone(&self.inner.source);
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            let result = fetcher(source).await;
            inner.settle(&task_key, id, &result);
            result
        });

        let abort = handle.abort_handle();
        let fetch = async move {
            match handle.await {
                Ok(result) => result,
                Err(e) if e.is_cancelled() => Err(ApiError::Cancelled),
                Err(e) => Err(ApiError::Network(format!("Fetch task failed: {}", e))),
            }
        }
        .boxed()
        .shared();

        state.in_flight.insert(
            key,
            InFlight {
                id,
                fetch: fetch.clone(),
                waiters: usize::from(!background),
                abort,
                background,
            },
        );

        (id, fetch)
    }

    async fn wait(
        &self,
        key: CacheKey,
        id: u64,
        fetch: SharedFetch,
        token: &CancelToken,
    ) -> Result<Option<Payload>, QueryError> {
        let _guard = WaiterGuard {
            inner: Arc::clone(&self.inner),
            key,
            id,
        };

        let result = tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!(id = id, "Query cancelled by caller");
                return Ok(None);
            }
            result = fetch => result,
        };

        match result {
            Ok(payload) => Ok(Some(payload)),
            Err(e) => match QueryError::from_api(e) {
                None => Ok(None),
                Some(error) => Err(error),
            },
        }
    }

    fn snapshot_locked(&self, state: &State, key: &CacheKey) -> Option<ListSnapshot> {
        let stale_time = key.stale_time(&self.inner.settings);
        let now = Instant::now();
        let mode = match key {
            CacheKey::Infinite(_) => ListMode::Infinite,
            _ => ListMode::Paged,
        };
        let entry = state.entries.get(key)?;
        let cached = Cached {
            value: entry.payload.clone(),
            is_stale: now.duration_since(entry.fetched_at) >= stale_time,
        };
        Some(snapshot_from(cached, mode))
    }
}

fn list_fetcher(query: ListQuery, as_stack: bool) -> Fetcher {
    Box::new(move |source| {
        async move {
            let token = CancelToken::new();
            let page = Arc::new(source.fetch_list(&query, &token).await?);
            Ok(if as_stack {
                Payload::Pages(vec![page])
            } else {
                Payload::Page(page)
            })
        }
        .boxed()
    })
}

/// Refetches an accumulated stack page by page, as deep as it was loaded.
/// Stops early if the list has shrunk.
fn stack_fetcher(base: ListQuery, depth: u32) -> Fetcher {
    Box::new(move |source| {
        async move {
            let token = CancelToken::new();
            let mut pages = Vec::with_capacity(depth as usize);
            for page in 1..=depth {
                let next = Arc::new(source.fetch_list(&base.clone().with_page(page), &token).await?);
                let more = next.pagination.has_next_page;
                pages.push(next);
                if !more {
                    break;
                }
            }
            Ok(Payload::Pages(pages))
        }
        .boxed()
    })
}

/// Stale stacks refetch every loaded page in order; other keys reuse
/// their own fetcher
fn revalidation_fetcher(key: &CacheKey, payload: &Payload, fetcher: Fetcher) -> Fetcher {
    match (key, payload) {
        (CacheKey::Infinite(base), Payload::Pages(pages)) if pages.len() > 1 => {
            stack_fetcher(base.clone(), pages.len() as u32)
        }
        _ => fetcher,
    }
}

fn snapshot_from(cached: Cached<Payload>, mode: ListMode) -> ListSnapshot {
    let pages = match cached.value {
        Payload::Page(page) => vec![page],
        Payload::Pages(pages) => pages,
        Payload::Anime(_) | Payload::Sub(_) => Vec::new(),
    };
    ListSnapshot {
        pages,
        mode,
        is_stale: cached.is_stale,
    }
}

fn mismatch() -> QueryError {
    QueryError {
        kind: QueryErrorKind::Decode,
        message: "Cached payload has an unexpected shape".to_string(),
        status: None,
    }
}

fn extract<P, T>(
    cached: Option<Cached<P>>,
    f: impl FnOnce(P) -> Option<T>,
) -> Result<Option<Cached<T>>, QueryError> {
    match cached {
        None => Ok(None),
        Some(Cached { value, is_stale }) => {
            let value = f(value).ok_or_else(mismatch)?;
            Ok(Some(Cached { value, is_stale }))
        }
    }
}
