//! Jikan API v4 client implementation.
//!
//! This module provides a rate-limited, cancellable client for the Jikan
//! API (MyAnimeList unofficial API) and the `CatalogSource` seam the query
//! cache is written against.

pub mod cancel;
pub mod client;
pub mod rate_limiter;
pub mod source;
pub mod types;

pub use cancel::{CancelToken, ContextScope};
pub use client::JikanClient;
pub use rate_limiter::RateLimiter;
pub use source::{CatalogSource, SubResource, SubResourceKind};
pub use types::*;
