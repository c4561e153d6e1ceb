//! Anime catalog data layer over the Jikan API v4.
//!
//! This library provides:
//! - A rate-limited, cancellable API client (`api`)
//! - A stale-while-revalidate query cache with paged and infinite lists (`cache`)
//! - Detail pages whose sections load lazily (`detail`)
//! - Browse state persisted to local storage and mirrored to the URL (`view_state`)
//! - A persisted favorites store (`favorites`)

pub mod api;
pub mod cache;
pub mod detail;
pub mod error;
pub mod favorites;
pub mod query;
pub mod view_state;

pub use api::{CancelToken, CatalogSource, ContextScope, JikanClient, RateLimiter, SubResource, SubResourceKind};
pub use cache::{CacheSettings, CacheStats, Cached, ListSnapshot, QueryCache};
pub use detail::{DetailPage, DetailSection, SectionData, SectionView};
pub use error::{ApiError, QueryError, QueryErrorKind};
pub use favorites::FavoritesStore;
pub use query::{ListMode, ListQuery};
pub use view_state::{Debouncer, ViewState};
