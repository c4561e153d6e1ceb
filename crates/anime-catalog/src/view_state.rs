//! Browse view state, persisted to local storage and mirrored to the URL.
//!
//! Each field is resolved once on load: a URL parameter wins, then the
//! stored value, then the default. The five filter parameters travel as one
//! bundle: if the URL carries any of them, the stored bundle is ignored as a
//! whole and absent fields fall back to "no filter". Search text is resolved
//! on its own.
//!
//! Every setter writes through to storage before returning. Changing
//! anything that narrows the result set sends the view back to page 1.

use crate::query::{ListMode, ListQuery};
use shared::storage::{self, LocalStorage};
use shared::{AiringStatus, AnimeType, FilterSet, OrderBy, Rating, SortDirection, ViewMode};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

pub const SEARCH_QUERY_KEY: &str = "browse.search_query";
pub const FILTERS_KEY: &str = "browse.filters";
pub const VIEW_MODE_KEY: &str = "browse.view_mode";
pub const SAFE_MODE_KEY: &str = "browse.safe_mode";
pub const GENRES_KEY: &str = "browse.genres";
pub const INFINITE_SCROLL_KEY: &str = "browse.infinite_scroll";
pub const CURRENT_PAGE_KEY: &str = "browse.current_page";

/// Search input settles for this long before it reaches a query
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(250);

const URL_FILTER_PARAMS: [&str; 5] = ["type", "status", "rating", "order_by", "sort"];

/// Holds back a value until input has been quiet for `delay`
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Self { delay, pending: None }
    }

    /// Replace the pending value and restart the quiet period
    pub fn push(&mut self, value: T) {
        self.pending = Some((value, Instant::now() + self.delay));
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, at)| *at)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Take the pending value if its quiet period has elapsed
    pub fn poll(&mut self) -> Option<T> {
        match &self.pending {
            Some((_, at)) if Instant::now() >= *at => self.pending.take().map(|(value, _)| value),
            _ => None,
        }
    }

    /// Drop any pending value
    pub fn cancel(&mut self) {
        self.pending = None;
    }
}

/// Browse page state over a `LocalStorage`
pub struct ViewState<S: LocalStorage> {
    storage: S,
    /// Text as typed
    search_input: String,
    /// Text after the debounce; what queries are built from
    search_query: String,
    debouncer: Debouncer<String>,
    filters: FilterSet,
    view_mode: ViewMode,
    safe_mode: bool,
    /// Selection order, no duplicates
    genres: Vec<u32>,
    infinite_scroll: bool,
    current_page: u32,
}

impl<S: LocalStorage> ViewState<S> {
    /// Resolve initial state from an optional URL query string and storage
    pub fn load(storage: S, url_query: Option<&str>, debounce: Duration) -> Self {
        let params = url_query.map(parse_url_query).unwrap_or_default();

        let search_query = params
            .get("query")
            .cloned()
            .or_else(|| storage::read_string(&storage, SEARCH_QUERY_KEY))
            .unwrap_or_default();

        let url_has_filters = URL_FILTER_PARAMS.iter().any(|p| params.contains_key(*p));
        let filters = if url_has_filters {
            debug!("Filters taken from URL");
            FilterSet {
                anime_type: url_param(&params, "type"),
                status: url_param(&params, "status"),
                rating: url_param(&params, "rating"),
                order_by: url_param(&params, "order_by"),
                sort: url_param(&params, "sort"),
            }
        } else {
            storage::read_json(&storage, FILTERS_KEY).unwrap_or_default()
        };

        let view_mode = storage::read_string(&storage, VIEW_MODE_KEY)
            .and_then(|raw| raw.parse::<ViewMode>().ok())
            .unwrap_or_default();
        let safe_mode = storage::read_string(&storage, SAFE_MODE_KEY)
            .map(|raw| raw == "true")
            .unwrap_or(true);
        let infinite_scroll = storage::read_string(&storage, INFINITE_SCROLL_KEY)
            .map(|raw| raw == "true")
            .unwrap_or(false);

        let mut genres = Vec::new();
        for id in storage::read_json::<Vec<u32>>(&storage, GENRES_KEY).unwrap_or_default() {
            if !genres.contains(&id) {
                genres.push(id);
            }
        }

        // A stored page only means something for the stored filters
        let current_page = if !params.is_empty() {
            1
        } else {
            storage::read_string(&storage, CURRENT_PAGE_KEY)
                .and_then(|raw| raw.parse::<u32>().ok())
                .unwrap_or(1)
                .max(1)
        };

        debug!(
            query = %search_query,
            filters = ?filters,
            view_mode = %view_mode,
            safe_mode = safe_mode,
            infinite_scroll = infinite_scroll,
            page = current_page,
            "Loaded view state"
        );

        Self {
            storage,
            search_input: search_query.clone(),
            search_query,
            debouncer: Debouncer::new(debounce),
            filters,
            view_mode,
            safe_mode,
            genres,
            infinite_scroll,
            current_page,
        }
    }

    // ========== Accessors ==========

    /// Text as typed, ahead of the debounce
    pub fn search_input(&self) -> &str {
        &self.search_input
    }

    /// Debounced search text
    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    pub fn view_mode(&self) -> ViewMode {
        self.view_mode
    }

    pub fn safe_mode(&self) -> bool {
        self.safe_mode
    }

    pub fn selected_genres(&self) -> &[u32] {
        &self.genres
    }

    pub fn infinite_scroll(&self) -> bool {
        self.infinite_scroll
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn list_mode(&self) -> ListMode {
        ListMode::from_infinite_flag(self.infinite_scroll)
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// The list query for the current state
    pub fn descriptor(&self) -> ListQuery {
        ListQuery::new()
            .with_query(&self.search_query)
            .with_filters(&self.filters)
            .with_sfw(self.safe_mode)
            .with_genres(self.genres.iter().copied())
            .with_page(self.current_page)
    }

    /// The shareable part of the state as a URL query string
    pub fn to_url_query(&self) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        if !self.search_query.is_empty() {
            serializer.append_pair("query", &self.search_query);
        }
        let fields = [
            ("type", self.filters.anime_type.map(|v| v.as_str())),
            ("status", self.filters.status.map(|v| v.as_str())),
            ("rating", self.filters.rating.map(|v| v.as_str())),
            ("order_by", self.filters.order_by.map(|v| v.as_str())),
            ("sort", self.filters.sort.map(|v| v.as_str())),
        ];
        for (name, value) in fields {
            if let Some(value) = value {
                serializer.append_pair(name, value);
            }
        }
        serializer.finish()
    }

    // ========== Search ==========

    /// Record typed text; it reaches queries once the debounce settles
    pub fn set_search(&mut self, text: impl Into<String>) {
        self.search_input = text.into();
        storage::write_string(&mut self.storage, SEARCH_QUERY_KEY, &self.search_input);
        self.debouncer.push(self.search_input.clone());
    }

    /// When pending search text becomes due
    pub fn search_deadline(&self) -> Option<Instant> {
        self.debouncer.deadline()
    }

    /// Apply settled search text. Returns true if the query changed.
    pub fn apply_debounced_search(&mut self) -> bool {
        let Some(text) = self.debouncer.poll() else {
            return false;
        };
        if text == self.search_query {
            return false;
        }
        debug!(query = %text, "Search text settled");
        self.search_query = text;
        self.reset_page();
        true
    }

    /// Wait out the debounce, then apply the pending search text
    pub async fn settle_search(&mut self) -> bool {
        if let Some(deadline) = self.debouncer.deadline() {
            tokio::time::sleep_until(deadline).await;
        }
        self.apply_debounced_search()
    }

    // ========== Filters ==========

    pub fn set_filters(&mut self, filters: FilterSet) {
        let changed = filters != self.filters;
        self.filters = filters;
        storage::write_json(&mut self.storage, FILTERS_KEY, &self.filters);
        if changed {
            self.reset_page();
        }
    }

    pub fn set_type(&mut self, anime_type: Option<AnimeType>) {
        let filters = FilterSet {
            anime_type,
            ..self.filters.clone()
        };
        self.set_filters(filters);
    }

    pub fn set_status(&mut self, status: Option<AiringStatus>) {
        let filters = FilterSet {
            status,
            ..self.filters.clone()
        };
        self.set_filters(filters);
    }

    pub fn set_rating(&mut self, rating: Option<Rating>) {
        let filters = FilterSet {
            rating,
            ..self.filters.clone()
        };
        self.set_filters(filters);
    }

    pub fn set_order_by(&mut self, order_by: Option<OrderBy>) {
        let filters = FilterSet {
            order_by,
            ..self.filters.clone()
        };
        self.set_filters(filters);
    }

    pub fn set_sort(&mut self, sort: Option<SortDirection>) {
        let filters = FilterSet {
            sort,
            ..self.filters.clone()
        };
        self.set_filters(filters);
    }

    pub fn set_safe_mode(&mut self, safe_mode: bool) {
        let changed = safe_mode != self.safe_mode;
        self.safe_mode = safe_mode;
        storage::write_string(&mut self.storage, SAFE_MODE_KEY, &safe_mode.to_string());
        if changed {
            self.reset_page();
        }
    }

    /// Add a genre to the selection; no-op if already selected
    pub fn select_genre(&mut self, genre_id: u32) {
        if self.genres.contains(&genre_id) {
            return;
        }
        self.genres.push(genre_id);
        storage::write_json(&mut self.storage, GENRES_KEY, &self.genres);
        self.reset_page();
    }

    /// Remove a genre from the selection; no-op if not selected
    pub fn remove_genre(&mut self, genre_id: u32) {
        let before = self.genres.len();
        self.genres.retain(|id| *id != genre_id);
        if self.genres.len() == before {
            return;
        }
        storage::write_json(&mut self.storage, GENRES_KEY, &self.genres);
        self.reset_page();
    }

    /// Reset search, filters and genres and forget them in storage.
    ///
    /// View mode, safe mode and scroll mode are kept.
    pub fn clear_filters(&mut self) {
        self.search_input.clear();
        self.search_query.clear();
        self.debouncer.cancel();
        self.filters = FilterSet::default();
        self.genres.clear();

        storage::remove(&mut self.storage, SEARCH_QUERY_KEY);
        storage::remove(&mut self.storage, FILTERS_KEY);
        storage::remove(&mut self.storage, GENRES_KEY);

        debug!("Cleared filters");
        self.reset_page();
    }

    // ========== Presentation ==========

    pub fn set_view_mode(&mut self, view_mode: ViewMode) {
        self.view_mode = view_mode;
        storage::write_string(&mut self.storage, VIEW_MODE_KEY, view_mode.as_str());
    }

    pub fn set_infinite_scroll(&mut self, infinite_scroll: bool) {
        self.infinite_scroll = infinite_scroll;
        storage::write_string(&mut self.storage, INFINITE_SCROLL_KEY, &infinite_scroll.to_string());
    }

    // ========== Paging ==========

    /// Jump to a page; pages start at 1
    pub fn set_page(&mut self, page: u32) {
        self.current_page = page.max(1);
        storage::write_string(&mut self.storage, CURRENT_PAGE_KEY, &self.current_page.to_string());
    }

    pub fn next_page(&mut self) {
        self.set_page(self.current_page.saturating_add(1));
    }

    pub fn previous_page(&mut self) {
        self.set_page(self.current_page.saturating_sub(1));
    }

    fn reset_page(&mut self) {
        if self.current_page != 1 {
            debug!(from = self.current_page, "Resetting to page 1");
        }
        self.set_page(1);
    }
}

/// Non-empty parameters of a URL query string (a leading `?` is allowed)
fn parse_url_query(raw: &str) -> HashMap<String, String> {
    let raw = raw.trim().trim_start_matches('?');
    url::form_urlencoded::parse(raw.as_bytes())
        .filter(|(_, value)| !value.trim().is_empty())
        .map(|(key, value)| (key.into_owned(), value.trim().to_string()))
        .collect()
}

fn url_param<T: FromStr>(params: &HashMap<String, String>, name: &str) -> Option<T> {
    let raw = params.get(name)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(param = name, value = %raw, "Ignoring unrecognised URL filter value");
            None
        }
    }
}
