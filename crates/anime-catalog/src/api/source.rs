//! The seam between the query cache and whatever serves catalog data.

use super::cancel::CancelToken;
use super::types::*;
use crate::error::ApiError;
use crate::query::ListQuery;
use async_trait::async_trait;
use std::sync::Arc;

/// Detail sub-resources, each cached separately per anime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SubResourceKind {
    Pictures,
    Videos,
    Statistics,
    Relations,
    Characters,
}

impl SubResourceKind {
    pub const ALL: [SubResourceKind; 5] = [
        SubResourceKind::Pictures,
        SubResourceKind::Videos,
        SubResourceKind::Statistics,
        SubResourceKind::Relations,
        SubResourceKind::Characters,
    ];

    /// Path segment under `/anime/{id}/`
    pub fn as_str(&self) -> &'static str {
        match self {
            SubResourceKind::Pictures => "pictures",
            SubResourceKind::Videos => "videos",
            SubResourceKind::Statistics => "statistics",
            SubResourceKind::Relations => "relations",
            SubResourceKind::Characters => "characters",
        }
    }
}

impl std::fmt::Display for SubResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fetched sub-resource, tagged by kind
#[derive(Debug, Clone, PartialEq)]
pub enum SubResource {
    Pictures(Arc<Vec<Picture>>),
    Videos(Arc<Videos>),
    Statistics(Arc<Statistics>),
    Relations(Arc<Vec<Relation>>),
    Characters(Arc<Vec<CharacterRole>>),
}

impl SubResource {
    pub fn kind(&self) -> SubResourceKind {
        match self {
            SubResource::Pictures(_) => SubResourceKind::Pictures,
            SubResource::Videos(_) => SubResourceKind::Videos,
            SubResource::Statistics(_) => SubResourceKind::Statistics,
            SubResource::Relations(_) => SubResourceKind::Relations,
            SubResource::Characters(_) => SubResourceKind::Characters,
        }
    }
}

/// Remote catalog operations.
///
/// Every call observes `token`; a cancelled call resolves to
/// `ApiError::Cancelled`.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_list(&self, query: &ListQuery, token: &CancelToken) -> Result<AnimePage, ApiError>;

    async fn fetch_anime(&self, mal_id: u32, token: &CancelToken) -> Result<Anime, ApiError>;

    async fn fetch_pictures(&self, mal_id: u32, token: &CancelToken) -> Result<Vec<Picture>, ApiError>;

    async fn fetch_videos(&self, mal_id: u32, token: &CancelToken) -> Result<Videos, ApiError>;

    async fn fetch_statistics(&self, mal_id: u32, token: &CancelToken) -> Result<Statistics, ApiError>;

    async fn fetch_relations(&self, mal_id: u32, token: &CancelToken) -> Result<Vec<Relation>, ApiError>;

    async fn fetch_characters(
        &self,
        mal_id: u32,
        token: &CancelToken,
    ) -> Result<Vec<CharacterRole>, ApiError>;

    /// Fetch one sub-resource by kind
    async fn fetch_sub_resource(
        &self,
        mal_id: u32,
        kind: SubResourceKind,
        token: &CancelToken,
    ) -> Result<SubResource, ApiError> {
        Ok(match kind {
            SubResourceKind::Pictures => {
                SubResource::Pictures(Arc::new(self.fetch_pictures(mal_id, token).await?))
            }
            SubResourceKind::Videos => {
                SubResource::Videos(Arc::new(self.fetch_videos(mal_id, token).await?))
            }
            SubResourceKind::Statistics => {
                SubResource::Statistics(Arc::new(self.fetch_statistics(mal_id, token).await?))
            }
            SubResourceKind::Relations => {
                SubResource::Relations(Arc::new(self.fetch_relations(mal_id, token).await?))
            }
            SubResourceKind::Characters => {
                SubResource::Characters(Arc::new(self.fetch_characters(mal_id, token).await?))
            }
        })
    }
}
