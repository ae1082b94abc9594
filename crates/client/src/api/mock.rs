//! In-memory [`RemoteService`] for tests.
//!
//! Behaves like the real service for the happy paths (accounts, catalog,
//! favorites, history, comments, checkouts) and lets tests:
//!
//! - inject failures per endpoint with [`MockRemoteService::fail`]
//! - count calls with [`MockRemoteService::calls`]
//! - hold requests in flight with [`MockRemoteService::hold`] to script
//!   completion order
//!
//! ```rust,ignore
//! let mock = MockRemoteService::new().with_account("google-cred", "tok-1", profile);
//! let gate = mock.hold(GateKey::Search("ma".into()));
//! // ... issue search "ma", then "mat" ...
//! gate.open();
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::Semaphore;

use popflix_core::{
    CheckoutRedirect, CheckoutRequest, CheckoutSessionId, Comment, CommentId, ContentItem,
    ContentType, CurrencyCode, Episode, ExternalId, Favorite, InteractionEntry, PaymentState,
    PaymentStatus, Price, RecordId, SearchResult, SessionToken, StreamLinks, UserId, UserProfile,
    WatchHistoryRecord,
};

use super::{ApiError, FavoriteAck, LoginGrant, NewComment, RemoteService};

/// Upper bound on scheduler yields in [`MockRemoteService::wait_for_calls`].
const WAIT_YIELDS: usize = 10_000;

/// Remote operations, for failure injection and call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    FetchProfile,
    ExchangeCredential,
    Popular,
    Search,
    ResolveStream,
    RecordWatchHistory,
    WatchHistory,
    AddFavorite,
    Favorites,
    RemoveFavorite,
    CreateCheckout,
    PaymentStatus,
    PostComment,
    Comments,
}

/// What a [`Gate`] holds back.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GateKey {
    /// Every call to the endpoint.
    Endpoint(Endpoint),
    /// Searches for exactly this query.
    Search(String),
}

/// Holds matching requests in flight until opened.
///
/// Dropping a gate without opening it keeps requests held.
#[derive(Debug, Clone)]
pub struct Gate {
    semaphore: Arc<Semaphore>,
}

impl Gate {
    /// Release every request waiting on this gate, now and later.
    pub fn open(&self) {
        self.semaphore.close();
    }
}

#[derive(Debug, Clone)]
struct CheckoutRecord {
    user_id: UserId,
    paid: bool,
}

#[derive(Default)]
struct MockState {
    credentials: HashMap<String, String>,
    tokens: HashMap<String, UserProfile>,
    popular: HashMap<ContentType, Vec<ContentItem>>,
    search: HashMap<String, Vec<SearchResult>>,
    favorites: HashMap<UserId, Vec<Favorite>>,
    history: HashMap<UserId, Vec<WatchHistoryRecord>>,
    comments: Vec<Comment>,
    checkouts: HashMap<String, CheckoutRecord>,
    last_checkout: Option<CheckoutRequest>,
    failures: HashMap<Endpoint, (u16, String)>,
    calls: HashMap<Endpoint, usize>,
    gates: HashMap<GateKey, Arc<Semaphore>>,
}

impl MockState {
    fn set_premium(&mut self, user_id: &UserId, is_premium: bool) {
        for profile in self.tokens.values_mut() {
            if &profile.id == user_id {
                profile.is_premium = is_premium;
            }
        }
    }
}

/// Scriptable in-memory remote service.
#[derive(Clone, Default)]
pub struct MockRemoteService {
    state: Arc<Mutex<MockState>>,
}

fn new_id(prefix: &str) -> String {
    format!("{prefix}_{}", uuid::Uuid::new_v4().simple())
}

fn status_error(status: u16, message: &str) -> ApiError {
    let message = message.to_string();
    match status {
        401 => ApiError::Unauthorized(message),
        403 => ApiError::Forbidden(message),
        404 => ApiError::NotFound(message),
        409 => ApiError::Conflict(message),
        429 => ApiError::RateLimited(1),
        _ => ApiError::Status { status, message },
    }
}

impl MockRemoteService {
    /// Empty service: no accounts, empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register an account reachable both by `credential` (login) and by
    /// `token` (restore).
    #[must_use]
    pub fn with_account(
        self,
        credential: impl Into<String>,
        token: impl Into<String>,
        profile: UserProfile,
    ) -> Self {
        {
            let mut state = self.lock();
            let token = token.into();
            state.credentials.insert(credential.into(), token.clone());
            state.tokens.insert(token, profile);
        }
        self
    }

    /// Set the popular list for a content type.
    pub fn set_popular(&self, content_type: ContentType, items: Vec<ContentItem>) {
        self.lock().popular.insert(content_type, items);
    }

    /// Set the results returned for an exact query.
    pub fn set_search(&self, query: impl Into<String>, results: Vec<SearchResult>) {
        self.lock().search.insert(query.into(), results);
    }

    /// Invalidate a token, as if it expired server-side.
    pub fn expire_token(&self, token: &str) {
        self.lock().tokens.remove(token);
    }

    /// Change an account's premium flag.
    pub fn set_premium(&self, user_id: &UserId, is_premium: bool) {
        self.lock().set_premium(user_id, is_premium);
    }

    /// Complete payment for a checkout session and grant premium to its
    /// owner, as the payment webhook would.
    pub fn mark_paid(&self, session_id: &CheckoutSessionId) {
        let mut state = self.lock();
        let owner = state.checkouts.get_mut(session_id.as_str()).map(|record| {
            record.paid = true;
            record.user_id.clone()
        });
        if let Some(user_id) = owner {
            state.set_premium(&user_id, true);
        }
    }

    /// Make every call to `endpoint` fail with an HTTP `status`.
    pub fn fail(&self, endpoint: Endpoint, status: u16, message: impl Into<String>) {
        self.lock()
            .failures
            .insert(endpoint, (status, message.into()));
    }

    /// Stop failing calls to `endpoint`.
    pub fn clear_failure(&self, endpoint: Endpoint) {
        self.lock().failures.remove(&endpoint);
    }

    /// Number of calls made to `endpoint` so far, including held ones.
    #[must_use]
    pub fn calls(&self, endpoint: Endpoint) -> usize {
        self.lock().calls.get(&endpoint).copied().unwrap_or(0)
    }

    /// The most recent checkout request received.
    #[must_use]
    pub fn last_checkout(&self) -> Option<CheckoutRequest> {
        self.lock().last_checkout.clone()
    }

    /// Favorites stored for a user.
    #[must_use]
    pub fn stored_favorites(&self, user_id: &UserId) -> Vec<Favorite> {
        self.lock()
            .favorites
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Watch history stored for a user.
    #[must_use]
    pub fn stored_history(&self, user_id: &UserId) -> Vec<WatchHistoryRecord> {
        self.lock().history.get(user_id).cloned().unwrap_or_default()
    }

    /// Hold matching requests until the returned gate is opened.
    #[must_use]
    pub fn hold(&self, key: GateKey) -> Gate {
        let semaphore = Arc::new(Semaphore::new(0));
        self.lock().gates.insert(key, Arc::clone(&semaphore));
        Gate { semaphore }
    }

    /// Yield until `endpoint` has seen at least `count` calls.
    ///
    /// Returns `false` if that never happens.
    pub async fn wait_for_calls(&self, endpoint: Endpoint, count: usize) -> bool {
        for _ in 0..WAIT_YIELDS {
            if self.calls(endpoint) >= count {
                return true;
            }
            tokio::task::yield_now().await;
        }
        false
    }

    /// Count the call, wait on any gate, then apply injected failures.
    async fn enter(&self, endpoint: Endpoint, query: Option<&str>) -> Result<(), ApiError> {
        let gate = {
            let mut state = self.lock();
            *state.calls.entry(endpoint).or_default() += 1;
            query
                .and_then(|q| state.gates.get(&GateKey::Search(q.to_string())))
                .or_else(|| state.gates.get(&GateKey::Endpoint(endpoint)))
                .cloned()
        };

        if let Some(gate) = gate {
            // Closed means open; the error is the release signal.
            let _ = gate.acquire().await;
        }

        match self.lock().failures.get(&endpoint) {
            Some((status, message)) => Err(status_error(*status, message)),
            None => Ok(()),
        }
    }

    fn authorize(&self, token: &SessionToken) -> Result<UserProfile, ApiError> {
        self.lock()
            .tokens
            .get(token.expose())
            .cloned()
            .ok_or_else(|| ApiError::Unauthorized("Invalid token".to_string()))
    }
}

#[async_trait]
impl RemoteService for MockRemoteService {
    async fn fetch_profile(&self, token: &SessionToken) -> Result<UserProfile, ApiError> {
        self.enter(Endpoint::FetchProfile, None).await?;
        self.authorize(token)
    }

    async fn exchange_credential(&self, credential: &str) -> Result<LoginGrant, ApiError> {
        self.enter(Endpoint::ExchangeCredential, None).await?;
        let state = self.lock();
        let grant = state.credentials.get(credential).and_then(|token| {
            state.tokens.get(token).map(|user| LoginGrant {
                token: SessionToken::new(token.clone()),
                user: user.clone(),
            })
        });
        grant.ok_or_else(|| ApiError::Unauthorized("Invalid Google token".to_string()))
    }

    async fn popular(&self, content_type: ContentType) -> Result<Vec<ContentItem>, ApiError> {
        self.enter(Endpoint::Popular, None).await?;
        Ok(self
            .lock()
            .popular
            .get(&content_type)
            .cloned()
            .unwrap_or_default())
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, ApiError> {
        self.enter(Endpoint::Search, Some(query)).await?;
        Ok(self.lock().search.get(query).cloned().unwrap_or_default())
    }

    async fn resolve_stream(
        &self,
        content_type: ContentType,
        external_id: ExternalId,
        episode: Option<Episode>,
    ) -> Result<StreamLinks, ApiError> {
        self.enter(Endpoint::ResolveStream, None).await?;
        let embed_url = match (content_type, episode) {
            (ContentType::Movie, _) => format!("https://player.example/embed/movie/{external_id}"),
            (ContentType::Tv, Some(e)) => format!(
                "https://player.example/embed/tv/{external_id}/{}/{}",
                e.season, e.episode
            ),
            (ContentType::Tv, None) => {
                return Err(status_error(
                    400,
                    "Season and episode required for TV shows",
                ));
            }
        };
        Ok(StreamLinks {
            embed_url,
            torrent_url: None,
            aggregator_url: None,
            download_url: Some(format!("https://dl.example/{content_type}/{external_id}")),
        })
    }

    async fn record_watch_history(
        &self,
        token: &SessionToken,
        entry: &InteractionEntry,
        episode: Option<Episode>,
    ) -> Result<(), ApiError> {
        self.enter(Endpoint::RecordWatchHistory, None).await?;
        let user = self.authorize(token)?;
        self.lock()
            .history
            .entry(user.id)
            .or_default()
            .insert(
                0,
                WatchHistoryRecord {
                    id: RecordId::new(new_id("wh")),
                    entry: entry.clone(),
                    episode,
                    progress: 0.0,
                    last_watched: Some(Utc::now()),
                },
            );
        Ok(())
    }

    async fn watch_history(
        &self,
        token: &SessionToken,
    ) -> Result<Vec<WatchHistoryRecord>, ApiError> {
        self.enter(Endpoint::WatchHistory, None).await?;
        let user = self.authorize(token)?;
        Ok(self.stored_history(&user.id))
    }

    async fn add_favorite(
        &self,
        token: &SessionToken,
        entry: &InteractionEntry,
    ) -> Result<FavoriteAck, ApiError> {
        self.enter(Endpoint::AddFavorite, None).await?;
        let user = self.authorize(token)?;
        let mut state = self.lock();
        let favorites = state.favorites.entry(user.id).or_default();

        if favorites.iter().any(|f| {
            f.entry.content_type == entry.content_type && f.entry.external_id == entry.external_id
        }) {
            return Ok(FavoriteAck::AlreadyExists);
        }

        favorites.insert(
            0,
            Favorite {
                id: RecordId::new(new_id("fav")),
                entry: entry.clone(),
                added_at: Some(Utc::now()),
            },
        );
        Ok(FavoriteAck::Added)
    }

    async fn favorites(&self, token: &SessionToken) -> Result<Vec<Favorite>, ApiError> {
        self.enter(Endpoint::Favorites, None).await?;
        let user = self.authorize(token)?;
        Ok(self.stored_favorites(&user.id))
    }

    async fn remove_favorite(
        &self,
        token: &SessionToken,
        content_type: ContentType,
        external_id: ExternalId,
    ) -> Result<(), ApiError> {
        self.enter(Endpoint::RemoveFavorite, None).await?;
        let user = self.authorize(token)?;
        let mut state = self.lock();
        let favorites = state.favorites.entry(user.id).or_default();
        let before = favorites.len();
        favorites.retain(|f| {
            !(f.entry.content_type == content_type && f.entry.external_id == external_id)
        });

        if favorites.len() == before {
            return Err(ApiError::NotFound("Favorite not found".to_string()));
        }
        Ok(())
    }

    async fn create_checkout(
        &self,
        token: &SessionToken,
        request: &CheckoutRequest,
    ) -> Result<CheckoutRedirect, ApiError> {
        self.enter(Endpoint::CreateCheckout, None).await?;
        let user = self.authorize(token)?;
        let session_id = new_id("cs_test");

        let mut state = self.lock();
        state.last_checkout = Some(request.clone());
        state.checkouts.insert(
            session_id.clone(),
            CheckoutRecord {
                user_id: user.id,
                paid: false,
            },
        );

        Ok(CheckoutRedirect {
            checkout_url: format!("https://checkout.example/pay/{session_id}"),
            session_id: CheckoutSessionId::new(session_id),
        })
    }

    async fn payment_status(
        &self,
        session_id: &CheckoutSessionId,
    ) -> Result<PaymentStatus, ApiError> {
        self.enter(Endpoint::PaymentStatus, None).await?;
        let record = self
            .lock()
            .checkouts
            .get(session_id.as_str())
            .cloned()
            .ok_or_else(|| ApiError::NotFound("Payment session not found".to_string()))?;

        let (status, payment_state) = if record.paid {
            ("complete", PaymentState::Paid)
        } else {
            ("open", PaymentState::Pending)
        };
        Ok(PaymentStatus {
            status: status.to_string(),
            payment_state,
            amount: Some(Price::new(Decimal::new(200, 0), CurrencyCode::INR)),
        })
    }

    async fn post_comment(
        &self,
        token: &SessionToken,
        comment: &NewComment,
    ) -> Result<Comment, ApiError> {
        self.enter(Endpoint::PostComment, None).await?;
        let user = self.authorize(token)?;
        if !user.is_premium {
            return Err(ApiError::Forbidden(
                "Premium subscription required".to_string(),
            ));
        }

        let stored = Comment {
            id: CommentId::new(new_id("cm")),
            user_name: user.name,
            content_type: comment.content_type,
            external_id: comment.external_id,
            text: comment.text.clone(),
            parent_id: comment.parent_id.clone(),
            created_at: Some(Utc::now()),
        };
        self.lock().comments.insert(0, stored.clone());
        Ok(stored)
    }

    async fn comments(
        &self,
        content_type: ContentType,
        external_id: ExternalId,
    ) -> Result<Vec<Comment>, ApiError> {
        self.enter(Endpoint::Comments, None).await?;
        Ok(self
            .lock()
            .comments
            .iter()
            .filter(|c| c.content_type == content_type && c.external_id == external_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn profile(premium: bool) -> UserProfile {
        UserProfile {
            id: UserId::new("u-1"),
            name: "Ada".to_string(),
            picture: None,
            email: Some("ada@example.com".to_string()),
            is_premium: premium,
        }
    }

    #[tokio::test]
    async fn test_credential_exchange_and_expiry() {
        let mock = MockRemoteService::new().with_account("cred", "tok", profile(false));

        let grant = mock.exchange_credential("cred").await.unwrap();
        assert_eq!(grant.token.expose(), "tok");

        mock.expire_token("tok");
        let err = mock.fetch_profile(&grant.token).await.unwrap_err();
        assert!(err.is_unauthorized());
    }

    #[tokio::test]
    async fn test_duplicate_favorite_is_acknowledged() {
        let mock = MockRemoteService::new().with_account("cred", "tok", profile(false));
        let token = SessionToken::new("tok");
        let entry = InteractionEntry {
            content_type: ContentType::Movie,
            external_id: ExternalId::new(603),
            title: "The Matrix".to_string(),
            poster_path: None,
        };

        assert_eq!(
            mock.add_favorite(&token, &entry).await.unwrap(),
            FavoriteAck::Added
        );
        assert_eq!(
            mock.add_favorite(&token, &entry).await.unwrap(),
            FavoriteAck::AlreadyExists
        );
        assert_eq!(mock.stored_favorites(&UserId::new("u-1")).len(), 1);
    }

    #[tokio::test]
    async fn test_gate_holds_until_opened() {
        let mock = MockRemoteService::new();
        let gate = mock.hold(GateKey::Endpoint(Endpoint::Popular));

        let task = tokio::spawn({
            let mock = mock.clone();
            async move { mock.popular(ContentType::Movie).await }
        });

        assert!(mock.wait_for_calls(Endpoint::Popular, 1).await);
        assert!(!task.is_finished());

        gate.open();
        assert!(task.await.unwrap().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_injected_failure_maps_status() {
        let mock = MockRemoteService::new();
        mock.fail(Endpoint::Search, 503, "down");
        assert!(matches!(
            mock.search("x").await,
            Err(ApiError::Status { status: 503, .. })
        ));
        mock.clear_failure(Endpoint::Search);
        assert!(mock.search("x").await.unwrap().is_empty());
    }
}
