//! Remote catalog service contract and clients.
//!
//! # Architecture
//!
//! - [`RemoteService`] is the fixed contract the rest of the client talks to
//! - [`HttpRemoteService`] implements it over `reqwest` against the JSON API
//! - The remote service is the source of truth - NO local sync, direct API calls
//! - Popular lists are cached in memory via `moka` (configurable TTL)
//!
//! Wire payloads are decoded into loosely-typed transfer structs
//! (`wire`) and converted into `popflix_core` domain types
//! (`conversions`) before anything else sees them.
//!
//! # Example
//!
//! ```rust,ignore
//! use popflix_client::api::{HttpRemoteService, RemoteService};
//! use popflix_core::ContentType;
//!
//! let api = HttpRemoteService::new(&config.api)?;
//!
//! let movies = api.popular(ContentType::Movie).await?;
//! let matches = api.search("matrix").await?;
//! ```

mod cache;
mod conversions;
mod http;
#[cfg(any(test, feature = "test-support"))]
pub mod mock;
mod wire;

pub use http::HttpRemoteService;

use async_trait::async_trait;
use thiserror::Error;

use popflix_core::{
    CheckoutRedirect, CheckoutRequest, CheckoutSessionId, Comment, CommentId, ContentItem,
    ContentType, Episode, ExternalId, Favorite, InteractionEntry, PaymentStatus, SearchResult,
    SessionToken, StreamLinks, UserProfile, WatchHistoryRecord,
};

/// Errors that can occur when talking to the remote service.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed (connection, TLS, timeout).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// An endpoint URL could not be built from the configured base.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// The bearer token was missing, expired or rejected.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The account is not allowed to perform the operation.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The resource already exists.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Rate limited by the service.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Any other non-success status.
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// The response decoded but is missing required data.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    /// Whether the failure means the session token is no longer valid.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }
}

/// Token and profile returned by a successful credential exchange.
#[derive(Debug, Clone)]
pub struct LoginGrant {
    pub token: SessionToken,
    pub user: UserProfile,
}

/// Result of submitting a favorite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FavoriteAck {
    /// The favorite was stored.
    Added,
    /// The title was already in the user's favorites; nothing was stored.
    AlreadyExists,
}

/// A comment to be posted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComment {
    pub content_type: ContentType,
    pub external_id: ExternalId,
    pub text: String,
    pub parent_id: Option<CommentId>,
}

/// The remote catalog, streaming, library and payment service.
///
/// Operations taking a [`SessionToken`] send it as a bearer credential.
#[async_trait]
pub trait RemoteService: Send + Sync {
    /// Fetch the profile the token belongs to.
    async fn fetch_profile(&self, token: &SessionToken) -> Result<UserProfile, ApiError>;

    /// Exchange an identity-provider credential for a session token.
    async fn exchange_credential(&self, credential: &str) -> Result<LoginGrant, ApiError>;

    /// Popular titles of one content type, in display order.
    async fn popular(&self, content_type: ContentType) -> Result<Vec<ContentItem>, ApiError>;

    /// Multi-search across movies and shows.
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, ApiError>;

    /// Resolve stream locations for a title.
    async fn resolve_stream(
        &self,
        content_type: ContentType,
        external_id: ExternalId,
        episode: Option<Episode>,
    ) -> Result<StreamLinks, ApiError>;

    /// Record that the user started watching a title.
    async fn record_watch_history(
        &self,
        token: &SessionToken,
        entry: &InteractionEntry,
        episode: Option<Episode>,
    ) -> Result<(), ApiError>;

    /// The user's watch history, most recent first.
    async fn watch_history(&self, token: &SessionToken)
    -> Result<Vec<WatchHistoryRecord>, ApiError>;

    /// Add a title to the user's favorites.
    async fn add_favorite(
        &self,
        token: &SessionToken,
        entry: &InteractionEntry,
    ) -> Result<FavoriteAck, ApiError>;

    /// The user's favorites, most recent first.
    async fn favorites(&self, token: &SessionToken) -> Result<Vec<Favorite>, ApiError>;

    /// Remove a title from the user's favorites.
    async fn remove_favorite(
        &self,
        token: &SessionToken,
        content_type: ContentType,
        external_id: ExternalId,
    ) -> Result<(), ApiError>;

    /// Open a payment checkout.
    async fn create_checkout(
        &self,
        token: &SessionToken,
        request: &CheckoutRequest,
    ) -> Result<CheckoutRedirect, ApiError>;

    /// Status of a checkout session.
    async fn payment_status(&self, session_id: &CheckoutSessionId)
    -> Result<PaymentStatus, ApiError>;

    /// Post a comment on a title (premium accounts only).
    async fn post_comment(
        &self,
        token: &SessionToken,
        comment: &NewComment,
    ) -> Result<Comment, ApiError>;

    /// Comments on a title, newest first.
    async fn comments(
        &self,
        content_type: ContentType,
        external_id: ExternalId,
    ) -> Result<Vec<Comment>, ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let err = ApiError::NotFound("favorite movie/603".to_string());
        assert_eq!(err.to_string(), "Not found: favorite movie/603");

        let err = ApiError::Status {
            status: 502,
            message: "bad gateway".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 502: bad gateway");
    }

    #[test]
    fn test_rate_limited_error() {
        let err = ApiError::RateLimited(60);
        assert_eq!(err.to_string(), "Rate limited, retry after 60 seconds");
    }

    #[test]
    fn test_only_unauthorized_invalidates_token() {
        assert!(ApiError::Unauthorized("Token expired".to_string()).is_unauthorized());
        assert!(!ApiError::Forbidden("premium".to_string()).is_unauthorized());
        assert!(!ApiError::RateLimited(1).is_unauthorized());
    }
}
