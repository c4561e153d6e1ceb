//! Jikan API client with global request spacing and cancellation.

use super::cancel::CancelToken;
use super::rate_limiter::RateLimiter;
use super::source::CatalogSource;
use super::types::*;
use crate::error::ApiError;
use crate::query::{ListQuery, DEFAULT_PAGE_LIMIT};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use shared::config::ApiConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Jikan API v4 client
///
/// Cheap to clone; clones share the HTTP connection pool and the rate
/// limiter.
#[derive(Clone)]
pub struct JikanClient {
    /// HTTP client
    client: Client,
    /// Base URL for Jikan API
    base_url: String,
    /// Rate limiter shared by every request type
    rate_limiter: Arc<RateLimiter>,
    /// Items per list page
    page_limit: u32,
}

impl JikanClient {
    /// Create a new Jikan client
    pub fn new(
        base_url: String,
        min_request_interval: Duration,
        requests_per_minute: Option<u32>,
        timeout: Duration,
        user_agent: &str,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            rate_limiter: Arc::new(RateLimiter::new(min_request_interval, requests_per_minute)),
            page_limit: DEFAULT_PAGE_LIMIT,
        })
    }

    /// Create a client from the `[api]` config section
    pub fn from_config(config: &ApiConfig) -> Result<Self> {
        let mut client = Self::new(
            config.base_url.clone(),
            config.min_request_interval(),
            config.requests_per_minute,
            config.timeout(),
            &config.user_agent,
        )?;
        client.page_limit = config.page_limit.max(1);
        Ok(client)
    }

    /// Make a GET request, waiting for the rate limiter first.
    ///
    /// Cancellation is honoured both while queued and while in flight.
    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
        token: &CancelToken,
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, endpoint);

        tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!(url = %url, "Request cancelled");
                Err(ApiError::Cancelled)
            }
            result = self.dispatch(&url, params) => result,
        }
    }

    async fn dispatch<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<T, ApiError> {
        self.rate_limiter.acquire().await;

        debug!(url = %url, params = ?params, "Making API request");

        let response = self
            .client
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(|e| {
                warn!(url = %url, error = %e, "Request error");
                ApiError::from(e)
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            warn!(url = %url, error = %e, "Failed to read response body");
            ApiError::from(e)
        })?;

        if !status.is_success() {
            let message = serde_json::from_str::<JikanError>(&body)
                .map(|e| e.message)
                .unwrap_or_else(|_| {
                    status
                        .canonical_reason()
                        .unwrap_or("Unknown error")
                        .to_string()
                });

            warn!(url = %url, status = %status, error = %message, "Request failed");
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            warn!(url = %url, error = %e, "Failed to parse response");
            ApiError::Decode(e.to_string())
        })
    }

    /// Search by free text, the rest of the query left open
    pub async fn search(&self, text: &str, page: u32, token: &CancelToken) -> Result<AnimePage, ApiError> {
        let query = ListQuery::new().with_query(text).with_page(page);
        self.fetch_list(&query, token).await
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }
}

#[async_trait]
impl CatalogSource for JikanClient {
    async fn fetch_list(&self, query: &ListQuery, token: &CancelToken) -> Result<AnimePage, ApiError> {
        info!(query = ?query.text(), page = query.page(), "Fetching anime list");
        self.get("/anime", &query.to_params(self.page_limit), token).await
    }

    async fn fetch_anime(&self, mal_id: u32, token: &CancelToken) -> Result<Anime, ApiError> {
        debug!(mal_id = mal_id, "Fetching anime details");
        let response: DataResponse<Anime> = self.get(&format!("/anime/{}", mal_id), &[], token).await?;
        Ok(response.data)
    }

    async fn fetch_pictures(&self, mal_id: u32, token: &CancelToken) -> Result<Vec<Picture>, ApiError> {
        debug!(mal_id = mal_id, "Fetching anime pictures");
        let response: DataResponse<Vec<Picture>> =
            self.get(&format!("/anime/{}/pictures", mal_id), &[], token).await?;
        Ok(response.data)
    }

    async fn fetch_videos(&self, mal_id: u32, token: &CancelToken) -> Result<Videos, ApiError> {
        debug!(mal_id = mal_id, "Fetching anime videos");
        let response: DataResponse<Videos> =
            self.get(&format!("/anime/{}/videos", mal_id), &[], token).await?;
        Ok(response.data)
    }

    async fn fetch_statistics(&self, mal_id: u32, token: &CancelToken) -> Result<Statistics, ApiError> {
        debug!(mal_id = mal_id, "Fetching anime statistics");
        let response: DataResponse<Statistics> =
            self.get(&format!("/anime/{}/statistics", mal_id), &[], token).await?;
        Ok(response.data)
    }

    async fn fetch_relations(&self, mal_id: u32, token: &CancelToken) -> Result<Vec<Relation>, ApiError> {
        debug!(mal_id = mal_id, "Fetching anime relations");
        let response: DataResponse<Vec<Relation>> =
            self.get(&format!("/anime/{}/relations", mal_id), &[], token).await?;
        Ok(response.data)
    }

    async fn fetch_characters(
        &self,
        mal_id: u32,
        token: &CancelToken,
    ) -> Result<Vec<CharacterRole>, ApiError> {
        debug!(mal_id = mal_id, "Fetching anime characters");
        let response: DataResponse<Vec<CharacterRole>> =
            self.get(&format!("/anime/{}/characters", mal_id), &[], token).await?;
        Ok(response.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{QueryError, QueryErrorKind};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response on a local port, returning its base URL
    async fn serve_once(status_line: &'static str, content_type: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 4096];
            let _ = socket.read(&mut request).await;

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                content_type,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });

        format!("http://{}", addr)
    }

    fn local_client(base_url: String) -> JikanClient {
        JikanClient::new(
            base_url,
            Duration::from_millis(1),
            None,
            Duration::from_secs(5),
            "anime-explorer-test",
        )
        .unwrap()
    }

    fn client() -> JikanClient {
        JikanClient::new(
            "https://api.jikan.moe/v4/".to_string(),
            Duration::from_millis(1000),
            None,
            Duration::from_secs(30),
            "anime-explorer-test",
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_client_creation() {
        let client = client();
        assert_eq!(client.base_url, "https://api.jikan.moe/v4");
        assert_eq!(client.rate_limiter().min_interval(), Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_from_config() {
        let mut config = shared::Config::default().api;
        config.page_limit = 10;
        let client = JikanClient::from_config(&config).unwrap();
        assert_eq!(client.page_limit, 10);
    }

    #[tokio::test]
    async fn test_cancelled_token_short_circuits() {
        let client = client();
        let token = CancelToken::new();
        token.cancel();

        // Never reaches the network: the cancelled branch is polled first
        let result = client.fetch_anime(1, &token).await;
        assert_eq!(result, Err(ApiError::Cancelled));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_a_network_error() {
        let client = JikanClient::new(
            "http://127.0.0.1:9".to_string(),
            Duration::from_millis(1),
            None,
            Duration::from_secs(2),
            "anime-explorer-test",
        )
        .unwrap();

        let result = client.fetch_anime(1, &CancelToken::new()).await;
        assert!(matches!(result, Err(ApiError::Network(_))));
    }

    #[tokio::test]
    async fn test_not_found_carries_jikan_message() {
        let base = serve_once(
            "404 Not Found",
            "application/json",
            r#"{"status":404,"type":"BadResponseException","message":"Resource does not exist","error":"404 on https://myanimelist.net/anime/0/"}"#,
        )
        .await;

        let error = local_client(base).fetch_anime(0, &CancelToken::new()).await.unwrap_err();
        assert_eq!(
            error,
            ApiError::Status {
                status: 404,
                message: "Resource does not exist".to_string(),
            }
        );
        assert!(error.is_not_found());

        let query_error = QueryError::from_api(error).unwrap();
        assert_eq!(query_error.kind, QueryErrorKind::Http);
        assert_eq!(query_error.status, Some(404));
        assert!(query_error.is_not_found());
    }

    #[tokio::test]
    async fn test_non_json_error_body_falls_back_to_reason() {
        let base = serve_once(
            "500 Internal Server Error",
            "text/html",
            "<html><body>upstream exploded</body></html>",
        )
        .await;

        let error = local_client(base).fetch_anime(1, &CancelToken::new()).await.unwrap_err();
        assert_eq!(
            error,
            ApiError::Status {
                status: 500,
                message: "Internal Server Error".to_string(),
            }
        );

        let query_error = QueryError::from_api(error).unwrap();
        assert_eq!(query_error.kind, QueryErrorKind::Http);
        assert!(!query_error.is_not_found());
        assert!(!query_error.is_network());
    }

    #[tokio::test]
    async fn test_malformed_body_is_a_decode_error() {
        let base = serve_once("200 OK", "application/json", r#"{"data": {"mal_id": "#).await;

        let error = local_client(base).fetch_anime(1, &CancelToken::new()).await.unwrap_err();
        assert!(matches!(error, ApiError::Decode(_)));
        assert_eq!(QueryError::from_api(error).unwrap().kind, QueryErrorKind::Decode);
    }
}
