//! Playback, favorites, watch history and comments.
//!
//! Every gated action consults the entitlement gate against the current
//! session snapshot before any request is made.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use popflix_core::{
    Comment, CommentId, ContentItem, ContentType, Episode, ExternalId, Favorite,
    InteractionEntry, SessionToken, StreamLinks, WatchHistoryRecord,
};

use super::session::SessionManager;
use crate::api::{ApiError, FavoriteAck, NewComment, RemoteService};
use crate::entitlement::{can_comment, can_play};
use crate::error::{ClientError, DenialReason, Result, add_breadcrumb};

/// A started playback.
#[derive(Debug)]
pub struct Playback {
    /// Where to stream from.
    pub stream: StreamLinks,
    /// Detached watch-history submission, when signed in. Awaiting it is
    /// optional; its failure is logged, never returned.
    pub history_task: Option<JoinHandle<()>>,
}

/// Result of adding a favorite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FavoriteOutcome {
    Added,
    /// The title was already a favorite; nothing changed.
    AlreadyFavorite,
}

/// Submits user interactions on behalf of the current session.
#[derive(Clone)]
pub struct InteractionRecorder {
    api: Arc<dyn RemoteService>,
    session: SessionManager,
}

impl InteractionRecorder {
    #[must_use]
    pub fn new(api: Arc<dyn RemoteService>, session: SessionManager) -> Self {
        Self { api, session }
    }

    fn require_token(&self) -> Result<SessionToken> {
        self.session
            .token()
            .ok_or(ClientError::AuthenticationRequired)
    }

    /// Start playing `item`. Shows start at season 1, episode 1.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Authorization`] for adult titles without premium
    /// - [`ClientError::Remote`] if the stream cannot be resolved
    pub async fn play(&self, item: &ContentItem, content_type: ContentType) -> Result<Playback> {
        self.play_episode(item, content_type, Episode::default())
            .await
    }

    /// Start playing `item` at `episode` (ignored for movies).
    ///
    /// # Errors
    ///
    /// - [`ClientError::InvalidInput`] for a zero season or episode number
    /// - [`ClientError::Authorization`] for adult titles without premium
    /// - [`ClientError::Remote`] if the stream cannot be resolved
    #[instrument(skip(self, item), fields(external_id = %item.external_id))]
    pub async fn play_episode(
        &self,
        item: &ContentItem,
        content_type: ContentType,
        episode: Episode,
    ) -> Result<Playback> {
        let session = self.session.session();
        can_play(&session, item).into_result()?;

        let episode = match content_type {
            ContentType::Movie => None,
            ContentType::Tv if episode.season == 0 || episode.episode == 0 => {
                return Err(ClientError::InvalidInput(
                    "season and episode numbers start at 1".to_string(),
                ));
            }
            ContentType::Tv => Some(episode),
        };

        let stream = self
            .api
            .resolve_stream(content_type, item.external_id, episode)
            .await?;

        let external_id = item.external_id.to_string();
        add_breadcrumb(
            "playback",
            "Started playback",
            Some(&[("content_type", content_type.as_str()), ("external_id", external_id.as_str())]),
        );

        let history_task = session.token().cloned().map(|token| {
            let api = Arc::clone(&self.api);
            let entry = InteractionEntry::for_item(item, content_type);
            tokio::spawn(async move {
                match api.record_watch_history(&token, &entry, episode).await {
                    Ok(()) => debug!(external_id = %entry.external_id, "Recorded watch history"),
                    Err(e) => warn!(
                        error = %e,
                        external_id = %entry.external_id,
                        "Failed to record watch history"
                    ),
                }
            })
        });

        Ok(Playback {
            stream,
            history_task,
        })
    }

    /// Add `item` to the user's favorites.
    ///
    /// # Errors
    ///
    /// - [`ClientError::AuthenticationRequired`] when signed out (no request is made)
    /// - [`ClientError::Remote`] for any other failure
    #[instrument(skip(self, item), fields(external_id = %item.external_id))]
    pub async fn add_favorite(
        &self,
        item: &ContentItem,
        content_type: ContentType,
    ) -> Result<FavoriteOutcome> {
        let token = self.require_token()?;
        let entry = InteractionEntry::for_item(item, content_type);

        let outcome = match self.api.add_favorite(&token, &entry).await? {
            FavoriteAck::Added => FavoriteOutcome::Added,
            FavoriteAck::AlreadyExists => FavoriteOutcome::AlreadyFavorite,
        };

        let external_id = item.external_id.to_string();
        add_breadcrumb(
            "library",
            "Added favorite",
            Some(&[("external_id", external_id.as_str())]),
        );
        Ok(outcome)
    }

    /// The user's favorites.
    ///
    /// # Errors
    ///
    /// - [`ClientError::AuthenticationRequired`] when signed out
    /// - [`ClientError::Remote`] if the list cannot be fetched
    pub async fn favorites(&self) -> Result<Vec<Favorite>> {
        let token = self.require_token()?;
        Ok(self.api.favorites(&token).await?)
    }

    /// Remove a title from the user's favorites.
    ///
    /// # Errors
    ///
    /// - [`ClientError::AuthenticationRequired`] when signed out
    /// - [`ClientError::NotFound`] if it was not a favorite
    /// - [`ClientError::Remote`] for any other failure
    #[instrument(skip(self))]
    pub async fn remove_favorite(
        &self,
        content_type: ContentType,
        external_id: ExternalId,
    ) -> Result<()> {
        let token = self.require_token()?;
        match self
            .api
            .remove_favorite(&token, content_type, external_id)
            .await
        {
            Ok(()) => Ok(()),
            Err(ApiError::NotFound(message)) => Err(ClientError::NotFound(message)),
            Err(e) => Err(e.into()),
        }
    }

    /// The user's watch history.
    ///
    /// # Errors
    ///
    /// - [`ClientError::AuthenticationRequired`] when signed out
    /// - [`ClientError::Remote`] if the list cannot be fetched
    pub async fn watch_history(&self) -> Result<Vec<WatchHistoryRecord>> {
        let token = self.require_token()?;
        Ok(self.api.watch_history(&token).await?)
    }

    /// Public comments on a title.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Remote`] if the list cannot be fetched.
    pub async fn comments(
        &self,
        content_type: ContentType,
        external_id: ExternalId,
    ) -> Result<Vec<Comment>> {
        Ok(self.api.comments(content_type, external_id).await?)
    }

    /// Post a comment, optionally as a reply.
    ///
    /// # Errors
    ///
    /// - [`ClientError::AuthenticationRequired`] when signed out
    /// - [`ClientError::InvalidInput`] for blank text
    /// - [`ClientError::Authorization`] without premium (checked locally,
    ///   and again if the service refuses)
    /// - [`ClientError::Remote`] for any other failure
    #[instrument(skip(self, text))]
    pub async fn post_comment(
        &self,
        content_type: ContentType,
        external_id: ExternalId,
        text: &str,
        parent_id: Option<CommentId>,
    ) -> Result<Comment> {
        let session = self.session.session();
        let token = session
            .token()
            .cloned()
            .ok_or(ClientError::AuthenticationRequired)?;

        let text = text.trim();
        if text.is_empty() {
            return Err(ClientError::InvalidInput("comment text is empty".to_string()));
        }
        can_comment(&session).into_result()?;

        let comment = NewComment {
            content_type,
            external_id,
            text: text.to_string(),
            parent_id,
        };
        match self.api.post_comment(&token, &comment).await {
            Ok(posted) => Ok(posted),
            Err(ApiError::Forbidden(_)) => {
                Err(ClientError::Authorization(DenialReason::PremiumRequired))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use popflix_core::{UserId, UserProfile};

    use super::*;
    use crate::api::mock::{Endpoint, MockRemoteService};
    use crate::store::MemoryCredentialStore;

    fn profile(is_premium: bool) -> UserProfile {
        UserProfile {
            id: UserId::new("u-1"),
            name: "Ada".to_string(),
            picture: None,
            email: None,
            is_premium,
        }
    }

    async fn recorder(signed_in: bool, premium: bool) -> (MockRemoteService, InteractionRecorder) {
        let mock = MockRemoteService::new().with_account("cred", "tok", profile(premium));
        let api: Arc<dyn RemoteService> = Arc::new(mock.clone());
        let session = SessionManager::new(Arc::clone(&api), Arc::new(MemoryCredentialStore::new()));
        if signed_in {
            session.login("cred").await.unwrap();
        }
        (mock, InteractionRecorder::new(api, session))
    }

    fn movie(is_adult: bool) -> ContentItem {
        ContentItem {
            is_adult,
            ..ContentItem::new(ExternalId::new(603), "The Matrix")
        }
    }

    #[tokio::test]
    async fn test_adult_play_denied_without_request() {
        let (mock, recorder) = recorder(true, false).await;
        let err = recorder.play(&movie(true), ContentType::Movie).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Authorization(DenialReason::PremiumRequired)
        ));
        assert_eq!(mock.calls(Endpoint::ResolveStream), 0);
        assert_eq!(mock.calls(Endpoint::RecordWatchHistory), 0);
    }

    #[tokio::test]
    async fn test_anonymous_play_records_nothing() {
        let (mock, recorder) = recorder(false, false).await;
        let playback = recorder.play(&movie(false), ContentType::Movie).await.unwrap();
        assert!(playback.history_task.is_none());
        assert!(playback.stream.embed_url.contains("/movie/603"));
        assert_eq!(mock.calls(Endpoint::RecordWatchHistory), 0);
    }

    #[tokio::test]
    async fn test_history_failure_does_not_fail_playback() {
        let (mock, recorder) = recorder(true, false).await;
        mock.fail(Endpoint::RecordWatchHistory, 500, "boom");

        let playback = recorder.play(&movie(false), ContentType::Movie).await.unwrap();
        playback.history_task.unwrap().await.unwrap();
        assert_eq!(mock.calls(Endpoint::RecordWatchHistory), 1);
    }

    #[tokio::test]
    async fn test_show_defaults_to_first_episode() {
        let (mock, recorder) = recorder(true, false).await;
        let show = ContentItem::new(ExternalId::new(1399), "Game of Thrones");

        let playback = recorder.play(&show, ContentType::Tv).await.unwrap();
        assert!(playback.stream.embed_url.ends_with("/1399/1/1"));
        playback.history_task.unwrap().await.unwrap();

        let history = mock.stored_history(&UserId::new("u-1"));
        assert_eq!(history.first().unwrap().episode, Some(Episode::new(1, 1)));
    }

    #[tokio::test]
    async fn test_zero_episode_is_rejected() {
        let (mock, recorder) = recorder(true, false).await;
        let show = ContentItem::new(ExternalId::new(1399), "Game of Thrones");
        let err = recorder
            .play_episode(&show, ContentType::Tv, Episode::new(0, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidInput(_)));
        assert_eq!(mock.calls(Endpoint::ResolveStream), 0);
    }

    #[tokio::test]
    async fn test_favorite_requires_session() {
        let (mock, recorder) = recorder(false, false).await;
        let err = recorder
            .add_favorite(&movie(false), ContentType::Movie)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::AuthenticationRequired));
        assert_eq!(mock.calls(Endpoint::AddFavorite), 0);
    }

    #[tokio::test]
    async fn test_duplicate_favorite_is_distinct_outcome() {
        let (_, recorder) = recorder(true, false).await;
        let item = movie(false);
        assert_eq!(
            recorder.add_favorite(&item, ContentType::Movie).await.unwrap(),
            FavoriteOutcome::Added
        );
        assert_eq!(
            recorder.add_favorite(&item, ContentType::Movie).await.unwrap(),
            FavoriteOutcome::AlreadyFavorite
        );
        assert_eq!(recorder.favorites().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_transient_favorite_failure_is_not_a_duplicate() {
        let (mock, recorder) = recorder(true, false).await;
        mock.fail(Endpoint::AddFavorite, 503, "database unavailable");

        let err = recorder
            .add_favorite(&movie(false), ContentType::Movie)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Remote(_)));
        assert!(err.is_retryable());
        assert!(mock.stored_favorites(&UserId::new("u-1")).is_empty());
    }

    #[tokio::test]
    async fn test_remove_missing_favorite_is_not_found() {
        let (_, recorder) = recorder(true, false).await;
        let err = recorder
            .remove_favorite(ContentType::Movie, ExternalId::new(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_comment_requires_premium_before_request() {
        let (mock, recorder) = recorder(true, false).await;
        let err = recorder
            .post_comment(ContentType::Movie, ExternalId::new(603), "Great film", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Authorization(_)));
        assert_eq!(mock.calls(Endpoint::PostComment), 0);
    }

    #[tokio::test]
    async fn test_premium_comment_round_trip() {
        let (_, recorder) = recorder(true, true).await;
        let posted = recorder
            .post_comment(ContentType::Movie, ExternalId::new(603), "  Great film  ", None)
            .await
            .unwrap();
        assert_eq!(posted.text, "Great film");

        let reply = recorder
            .post_comment(
                ContentType::Movie,
                ExternalId::new(603),
                "Agreed",
                Some(posted.id.clone()),
            )
            .await
            .unwrap();
        assert_eq!(reply.parent_id, Some(posted.id));

        let thread = recorder
            .comments(ContentType::Movie, ExternalId::new(603))
            .await
            .unwrap();
        assert_eq!(thread.len(), 2);
    }

    #[tokio::test]
    async fn test_blank_comment_is_rejected() {
        let (mock, recorder) = recorder(true, true).await;
        let err = recorder
            .post_comment(ContentType::Tv, ExternalId::new(1), "   ", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidInput(_)));
        assert_eq!(mock.calls(Endpoint::PostComment), 0);
    }
}
