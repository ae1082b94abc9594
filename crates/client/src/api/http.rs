//! `reqwest` implementation of [`RemoteService`].

use std::sync::Arc;

use async_trait::async_trait;
use moka::future::Cache;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use popflix_core::{
    CheckoutRedirect, CheckoutRequest, CheckoutSessionId, Comment, ContentItem, ContentType,
    Episode, ExternalId, Favorite, InteractionEntry, PaymentStatus, SearchResult, SessionToken,
    StreamLinks, UserProfile, WatchHistoryRecord,
};

use super::cache::{CacheKey, CacheValue};
use super::conversions::{
    convert_checkout, convert_comment, convert_comments, convert_content_items, convert_favorites,
    convert_login, convert_payment_status, convert_profile, convert_search_results,
    convert_stream_links, convert_watch_history, error_message, is_already_favorite,
};
use super::wire::{
    CheckoutBody, CommentBody, InteractionBody, LoginBody, RawCheckout, RawComment,
    RawContentItem, RawInteractionRecord, RawLoginResponse, RawPaymentStatus, RawProfile,
    RawSearchResult, RawStreamLinks, ResultsEnvelope,
};
use super::{ApiError, FavoriteAck, LoginGrant, NewComment, RemoteService};
use crate::config::ApiConfig;

const USER_AGENT: &str = concat!("popflix-client/", env!("CARGO_PKG_VERSION"));

// =============================================================================
// HttpRemoteService
// =============================================================================

/// Client for the PopFlix JSON API.
///
/// Popular lists are cached for the configured TTL. Everything else goes to
/// the network on every call.
#[derive(Clone)]
pub struct HttpRemoteService {
    inner: Arc<HttpRemoteServiceInner>,
}

struct HttpRemoteServiceInner {
    client: reqwest::Client,
    /// `{base}/api/`, always with a trailing slash so `join` appends.
    api_root: Url,
    cache: Cache<CacheKey, CacheValue>,
}

impl HttpRemoteService {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build or the base URL
    /// cannot carry a path.
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let cache = Cache::builder()
            .max_capacity(16)
            .time_to_live(config.catalog_cache_ttl)
            .build();

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.request_timeout)
            .build()?;

        let mut base = config.base_url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let api_root = base.join("api/")?;

        Ok(Self {
            inner: Arc::new(HttpRemoteServiceInner {
                client,
                api_root,
                cache,
            }),
        })
    }

    /// Drop every cached catalog list.
    pub async fn invalidate_cache(&self) {
        self.inner.cache.invalidate_all();
        self.inner.cache.run_pending_tasks().await;
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.inner.api_root.join(path)?)
    }

    /// Send a request and return the body of a successful response.
    ///
    /// Non-success statuses are mapped onto [`ApiError`] variants.
    async fn send(&self, request: RequestBuilder) -> Result<String, ApiError> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ApiError::RateLimited(retry_after));
        }

        // Get response body as text first for better error diagnostics
        let body = response.text().await?;

        if status.is_success() {
            return Ok(body);
        }

        let message = error_message(&body);
        match status {
            StatusCode::UNAUTHORIZED => Err(ApiError::Unauthorized(message)),
            StatusCode::FORBIDDEN => Err(ApiError::Forbidden(message)),
            StatusCode::NOT_FOUND => Err(ApiError::NotFound(message)),
            StatusCode::CONFLICT => Err(ApiError::Conflict(message)),
            _ => {
                tracing::error!(
                    status = %status,
                    body = %body.chars().take(500).collect::<String>(),
                    "PopFlix API returned non-success status"
                );
                Err(ApiError::Status {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }

    fn decode<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
        serde_json::from_str(body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to parse PopFlix API response"
            );
            ApiError::Parse(e)
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        let body = self.send(self.inner.client.get(url)).await?;
        Self::decode(&body)
    }

    async fn get_json_authed<T: DeserializeOwned>(
        &self,
        url: Url,
        token: &SessionToken,
    ) -> Result<T, ApiError> {
        let request = self.inner.client.get(url).bearer_auth(token.expose());
        let body = self.send(request).await?;
        Self::decode(&body)
    }
}

fn interaction_body(entry: &InteractionEntry, episode: Option<Episode>) -> InteractionBody<'_> {
    InteractionBody {
        content_type: entry.content_type.as_str(),
        tmdb_id: entry.external_id.as_i64(),
        title: &entry.title,
        poster_path: entry.poster_path.as_deref(),
        season: episode.map(|e| e.season),
        episode: episode.map(|e| e.episode),
    }
}

// =============================================================================
// RemoteService
// =============================================================================

#[async_trait]
impl RemoteService for HttpRemoteService {
    #[instrument(skip(self, token))]
    async fn fetch_profile(&self, token: &SessionToken) -> Result<UserProfile, ApiError> {
        let raw: RawProfile = self
            .get_json_authed(self.endpoint("profile")?, token)
            .await?;
        convert_profile(raw)
    }

    #[instrument(skip(self, credential))]
    async fn exchange_credential(&self, credential: &str) -> Result<LoginGrant, ApiError> {
        let request = self
            .inner
            .client
            .post(self.endpoint("auth/google")?)
            .json(&LoginBody { token: credential });
        let body = self.send(request).await?;
        let raw: RawLoginResponse = Self::decode(&body)?;
        convert_login(raw)
    }

    #[instrument(skip(self))]
    async fn popular(&self, content_type: ContentType) -> Result<Vec<ContentItem>, ApiError> {
        let cache_key = CacheKey::Popular(content_type);

        if let Some(CacheValue::Popular(items)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for popular list");
            return Ok(items);
        }

        let path = match content_type {
            ContentType::Movie => "movies/popular",
            ContentType::Tv => "tv/popular",
        };
        let envelope: ResultsEnvelope<RawContentItem> = self.get_json(self.endpoint(path)?).await?;
        let items = convert_content_items(envelope.results);

        self.inner
            .cache
            .insert(cache_key, CacheValue::Popular(items.clone()))
            .await;

        Ok(items)
    }

    #[instrument(skip(self))]
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, ApiError> {
        let mut url = self.endpoint("search")?;
        url.query_pairs_mut().append_pair("q", query);

        let envelope: ResultsEnvelope<RawSearchResult> = self.get_json(url).await?;
        Ok(convert_search_results(envelope.results))
    }

    #[instrument(skip(self))]
    async fn resolve_stream(
        &self,
        content_type: ContentType,
        external_id: ExternalId,
        episode: Option<Episode>,
    ) -> Result<StreamLinks, ApiError> {
        let mut url = self.endpoint(&format!("stream/{content_type}/{external_id}"))?;
        if let Some(episode) = episode {
            url.query_pairs_mut()
                .append_pair("season", &episode.season.to_string())
                .append_pair("episode", &episode.episode.to_string());
        }

        let raw: RawStreamLinks = self.get_json(url).await?;
        convert_stream_links(raw)
    }

    #[instrument(skip(self, token, entry), fields(external_id = %entry.external_id))]
    async fn record_watch_history(
        &self,
        token: &SessionToken,
        entry: &InteractionEntry,
        episode: Option<Episode>,
    ) -> Result<(), ApiError> {
        let request = self
            .inner
            .client
            .post(self.endpoint("watchhistory")?)
            .bearer_auth(token.expose())
            .json(&interaction_body(entry, episode));
        self.send(request).await?;
        Ok(())
    }

    #[instrument(skip(self, token))]
    async fn watch_history(
        &self,
        token: &SessionToken,
    ) -> Result<Vec<WatchHistoryRecord>, ApiError> {
        let raw: Vec<RawInteractionRecord> = self
            .get_json_authed(self.endpoint("watchhistory")?, token)
            .await?;
        Ok(convert_watch_history(raw))
    }

    #[instrument(skip(self, token, entry), fields(external_id = %entry.external_id))]
    async fn add_favorite(
        &self,
        token: &SessionToken,
        entry: &InteractionEntry,
    ) -> Result<FavoriteAck, ApiError> {
        let request = self
            .inner
            .client
            .post(self.endpoint("favorites")?)
            .bearer_auth(token.expose())
            .json(&interaction_body(entry, None));

        match self.send(request).await {
            Ok(body) if is_already_favorite(&body) => Ok(FavoriteAck::AlreadyExists),
            Ok(_) => Ok(FavoriteAck::Added),
            Err(ApiError::Conflict(_)) => Ok(FavoriteAck::AlreadyExists),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self, token))]
    async fn favorites(&self, token: &SessionToken) -> Result<Vec<Favorite>, ApiError> {
        let raw: Vec<RawInteractionRecord> = self
            .get_json_authed(self.endpoint("favorites")?, token)
            .await?;
        Ok(convert_favorites(raw))
    }

    #[instrument(skip(self, token))]
    async fn remove_favorite(
        &self,
        token: &SessionToken,
        content_type: ContentType,
        external_id: ExternalId,
    ) -> Result<(), ApiError> {
        let request = self
            .inner
            .client
            .delete(self.endpoint(&format!("favorites/{content_type}/{external_id}"))?)
            .bearer_auth(token.expose());
        self.send(request).await?;
        Ok(())
    }

    #[instrument(skip(self, token))]
    async fn create_checkout(
        &self,
        token: &SessionToken,
        request: &CheckoutRequest,
    ) -> Result<CheckoutRedirect, ApiError> {
        let http_request = self
            .inner
            .client
            .post(self.endpoint("payments/create-checkout")?)
            .bearer_auth(token.expose())
            .json(&CheckoutBody {
                package_id: &request.package_id,
                origin_url: &request.origin_url,
            });
        let body = self.send(http_request).await?;
        let raw: RawCheckout = Self::decode(&body)?;
        convert_checkout(raw)
    }

    #[instrument(skip(self))]
    async fn payment_status(
        &self,
        session_id: &CheckoutSessionId,
    ) -> Result<PaymentStatus, ApiError> {
        let path = format!(
            "payments/status/{}",
            urlencoding::encode(session_id.as_str())
        );
        let raw: RawPaymentStatus = self.get_json(self.endpoint(&path)?).await?;
        Ok(convert_payment_status(raw))
    }

    #[instrument(skip(self, token, comment), fields(external_id = %comment.external_id))]
    async fn post_comment(
        &self,
        token: &SessionToken,
        comment: &NewComment,
    ) -> Result<Comment, ApiError> {
        let request = self
            .inner
            .client
            .post(self.endpoint("comments")?)
            .bearer_auth(token.expose())
            .json(&CommentBody {
                content_type: comment.content_type.as_str(),
                tmdb_id: comment.external_id.as_i64(),
                text: &comment.text,
                parent_id: comment.parent_id.as_ref().map(popflix_core::CommentId::as_str),
            });
        let body = self.send(request).await?;
        let raw: RawComment = Self::decode(&body)?;
        convert_comment(raw)
            .ok_or_else(|| ApiError::InvalidResponse("posted comment is incomplete".to_string()))
    }

    #[instrument(skip(self))]
    async fn comments(
        &self,
        content_type: ContentType,
        external_id: ExternalId,
    ) -> Result<Vec<Comment>, ApiError> {
        let raw: Vec<RawComment> = self
            .get_json(self.endpoint(&format!("comments/{content_type}/{external_id}"))?)
            .await?;
        Ok(convert_comments(raw))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn config(base: &str) -> ApiConfig {
        ApiConfig {
            base_url: Url::parse(base).unwrap(),
            request_timeout: Duration::from_secs(5),
            catalog_cache_ttl: Duration::from_secs(60),
        }
    }

    #[test]
    fn test_endpoints_live_under_api() {
        let service = HttpRemoteService::new(&config("https://popflix.example")).unwrap();
        assert_eq!(
            service.endpoint("movies/popular").unwrap().as_str(),
            "https://popflix.example/api/movies/popular"
        );
    }

    #[test]
    fn test_base_path_is_preserved() {
        let service = HttpRemoteService::new(&config("https://host.example/popflix")).unwrap();
        assert_eq!(
            service.endpoint("profile").unwrap().as_str(),
            "https://host.example/popflix/api/profile"
        );
    }

    #[tokio::test]
    async fn test_invalidate_cache_drops_popular_lists() {
        let service = HttpRemoteService::new(&config("https://popflix.example")).unwrap();
        let key = CacheKey::Popular(ContentType::Tv);
        service
            .inner
            .cache
            .insert(key, CacheValue::Popular(Vec::new()))
            .await;
        assert!(service.inner.cache.get(&key).await.is_some());

        service.invalidate_cache().await;
        assert!(service.inner.cache.get(&key).await.is_none());
    }

    /// Answer the next request on a local port with a canned response.
    async fn respond_once(status: &'static str, body: &'static str) -> ApiConfig {
        use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();

            // Drain the request so closing the socket does not reset it.
            let mut request = Vec::new();
            let mut chunk = [0u8; 1024];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(chunk.get(..n).unwrap());
                let text = String::from_utf8_lossy(&request);
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text
                        .lines()
                        .find_map(|l| {
                            let (name, value) = l.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())?
                        })
                        .unwrap_or(0);
                    if request.len() >= end + 4 + length {
                        break;
                    }
                }
            }

            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });

        config(&format!("http://{addr}"))
    }

    fn matrix_entry() -> InteractionEntry {
        InteractionEntry {
            content_type: ContentType::Movie,
            external_id: ExternalId::new(603),
            title: "The Matrix".to_string(),
            poster_path: None,
        }
    }

    async fn add_favorite_with(
        status: &'static str,
        body: &'static str,
    ) -> Result<FavoriteAck, ApiError> {
        let service = HttpRemoteService::new(&respond_once(status, body).await).unwrap();
        service
            .add_favorite(&SessionToken::new("tok"), &matrix_entry())
            .await
    }

    #[tokio::test]
    async fn test_favorite_conflict_status_is_already_exists() {
        let ack = add_favorite_with("409 Conflict", r#"{"detail":"Duplicate favorite"}"#)
            .await
            .unwrap();
        assert_eq!(ack, FavoriteAck::AlreadyExists);
    }

    #[tokio::test]
    async fn test_favorite_message_body_is_already_exists() {
        let ack = add_favorite_with("200 OK", r#"{"message":"Already in favorites"}"#)
            .await
            .unwrap();
        assert_eq!(ack, FavoriteAck::AlreadyExists);
    }

    #[tokio::test]
    async fn test_favorite_created_is_added() {
        let ack = add_favorite_with(
            "200 OK",
            r#"{"id":"fav-1","content_type":"movie","tmdb_id":603,"title":"The Matrix"}"#,
        )
        .await
        .unwrap();
        assert_eq!(ack, FavoriteAck::Added);
    }

    #[tokio::test]
    async fn test_favorite_server_error_is_not_a_conflict() {
        let err = add_favorite_with("503 Service Unavailable", r#"{"detail":"db down"}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Status { status: 503, .. }));
    }

    #[test]
    fn test_results_envelope_defaults_to_empty() {
        let items: ResultsEnvelope<RawContentItem> = HttpRemoteService::decode("{}").unwrap();
        assert!(items.results.is_empty());

        let matches: ResultsEnvelope<RawSearchResult> =
            HttpRemoteService::decode(r#"{"page":1}"#).unwrap();
        assert!(matches.results.is_empty());
    }

    #[test]
    fn test_interaction_body_omits_missing_episode() {
        let entry = InteractionEntry {
            content_type: ContentType::Movie,
            external_id: ExternalId::new(603),
            title: "The Matrix".to_string(),
            poster_path: None,
        };
        let json = serde_json::to_value(interaction_body(&entry, None)).unwrap();
        assert_eq!(json["content_type"], "movie");
        assert_eq!(json["tmdb_id"], 603);
        assert!(json.get("season").is_none());

        let json = serde_json::to_value(interaction_body(&entry, Some(Episode::new(2, 5)))).unwrap();
        assert_eq!(json["season"], 2);
        assert_eq!(json["episode"], 5);
    }
}
