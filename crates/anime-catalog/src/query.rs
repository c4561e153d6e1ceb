//! List query descriptors.
//!
//! A `ListQuery` is the canonical parameter set of one `/anime` search. It
//! is normalised on construction (blank text is no text, genres are a set)
//! so equal field values always hash to the same cache key, whatever path
//! built them.

use shared::{AiringStatus, AnimeType, FilterSet, OrderBy, Rating, SortDirection};
use std::collections::BTreeSet;

/// Items requested per page unless configured otherwise
pub const DEFAULT_PAGE_LIMIT: u32 = 25;

/// How a list is retrieved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ListMode {
    /// One cache entry per page, explicit previous/next
    #[default]
    Paged,
    /// Pages accumulate into one sequence keyed without the page number
    Infinite,
}

impl ListMode {
    pub fn from_infinite_flag(infinite: bool) -> Self {
        if infinite {
            ListMode::Infinite
        } else {
            ListMode::Paged
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ListQuery {
    query: Option<String>,
    anime_type: Option<AnimeType>,
    status: Option<AiringStatus>,
    rating: Option<Rating>,
    order_by: Option<OrderBy>,
    sort: Option<SortDirection>,
    sfw: Option<bool>,
    genres: BTreeSet<u32>,
    page: Option<u32>,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Free-text search; blank text clears it
    pub fn with_query(mut self, text: impl AsRef<str>) -> Self {
        let text = text.as_ref().trim();
        self.query = (!text.is_empty()).then(|| text.to_string());
        self
    }

    pub fn with_type(mut self, anime_type: Option<AnimeType>) -> Self {
        self.anime_type = anime_type;
        self
    }

    pub fn with_status(mut self, status: Option<AiringStatus>) -> Self {
        self.status = status;
        self
    }

    pub fn with_rating(mut self, rating: Option<Rating>) -> Self {
        self.rating = rating;
        self
    }

    pub fn with_order(mut self, order_by: Option<OrderBy>, sort: Option<SortDirection>) -> Self {
        self.order_by = order_by;
        self.sort = sort;
        self
    }

    /// Apply every field of a persisted filter bundle
    pub fn with_filters(self, filters: &FilterSet) -> Self {
        self.with_type(filters.anime_type)
            .with_status(filters.status)
            .with_rating(filters.rating)
            .with_order(filters.order_by, filters.sort)
    }

    pub fn with_sfw(mut self, sfw: bool) -> Self {
        self.sfw = Some(sfw);
        self
    }

    pub fn with_genres(mut self, genres: impl IntoIterator<Item = u32>) -> Self {
        self.genres = genres.into_iter().collect();
        self
    }

    /// Page 1 is the implicit default and normalises away
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = (page > 1).then_some(page);
        self
    }

    /// The identity of this query's accumulated (infinite) list
    pub fn without_page(&self) -> Self {
        Self {
            page: None,
            ..self.clone()
        }
    }

    pub fn text(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn genres(&self) -> &BTreeSet<u32> {
        &self.genres
    }

    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1)
    }

    /// Query string parameters for `GET /anime`
    pub fn to_params(&self, limit: u32) -> Vec<(&'static str, String)> {
        let mut params = vec![("page", self.page().to_string()), ("limit", limit.to_string())];

        if let Some(q) = &self.query {
            params.push(("q", q.clone()));
        }
        if let Some(t) = self.anime_type {
            params.push(("type", t.to_string()));
        }
        if let Some(s) = self.status {
            params.push(("status", s.to_string()));
        }
        if let Some(r) = self.rating {
            params.push(("rating", r.to_string()));
        }
        if let Some(o) = self.order_by {
            params.push(("order_by", o.to_string()));
        }
        if let Some(s) = self.sort {
            params.push(("sort", s.to_string()));
        }
        if let Some(sfw) = self.sfw {
            params.push(("sfw", sfw.to_string()));
        }
        if !self.genres.is_empty() {
            let genres = self
                .genres
                .iter()
                .map(|g| g.to_string())
                .collect::<Vec<_>>()
                .join(",");
            params.push(("genres", genres));
        }

        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    fn hash_of(query: &ListQuery) -> u64 {
        let mut hasher = DefaultHasher::new();
        query.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_equivalent_queries_share_identity() {
        // Built field by field, in a different order, with explicit "nothing"s
        let a = ListQuery::new()
            .with_type(Some(AnimeType::Tv))
            .with_status(None)
            .with_query("")
            .with_genres([4, 1]);
        let b = ListQuery::new()
            .with_genres([1, 4, 1])
            .with_type(Some(AnimeType::Tv))
            .with_page(1);

        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn test_filters_bundle_matches_field_setters() {
        let filters = FilterSet {
            anime_type: Some(AnimeType::Movie),
            order_by: Some(OrderBy::Score),
            sort: Some(SortDirection::Desc),
            ..Default::default()
        };
        let from_bundle = ListQuery::new().with_filters(&filters);
        let by_hand = ListQuery::new()
            .with_order(Some(OrderBy::Score), Some(SortDirection::Desc))
            .with_type(Some(AnimeType::Movie));

        assert_eq!(from_bundle, by_hand);
    }

    #[test]
    fn test_without_page() {
        let paged = ListQuery::new().with_query("bebop").with_page(3);
        assert_eq!(paged.page(), 3);

        let base = paged.without_page();
        assert_eq!(base.page(), 1);
        assert_eq!(base, ListQuery::new().with_query("bebop"));
        assert_ne!(paged, base);
    }

    #[test]
    fn test_params() {
        let query = ListQuery::new()
            .with_query("  cowboy bebop ")
            .with_rating(Some(Rating::Pg13))
            .with_sfw(true)
            .with_genres([10, 2])
            .with_page(2);

        let params = query.to_params(DEFAULT_PAGE_LIMIT);
        assert!(params.contains(&("page", "2".to_string())));
        assert!(params.contains(&("limit", "25".to_string())));
        assert!(params.contains(&("q", "cowboy bebop".to_string())));
        assert!(params.contains(&("rating", "pg13".to_string())));
        assert!(params.contains(&("sfw", "true".to_string())));
        assert!(params.contains(&("genres", "2,10".to_string())));
        assert!(!params.iter().any(|(k, _)| *k == "type"));
    }

    #[test]
    fn test_list_mode_from_flag() {
        assert_eq!(ListMode::from_infinite_flag(true), ListMode::Infinite);
        assert_eq!(ListMode::from_infinite_flag(false), ListMode::Paged);
    }
}
