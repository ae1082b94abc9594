//! Interaction records exchanged with the remote service.
//!
//! The remote service is the source of truth for favorites, watch history
//! and comments. The client sends [`InteractionEntry`] payloads and reads
//! records back on demand; it keeps no durable local copy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::content::{ContentItem, ContentType, Episode};
use super::id::{CommentId, ExternalId, RecordId};

/// Payload describing one title for a favorite or watch-history submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionEntry {
    pub content_type: ContentType,
    pub external_id: ExternalId,
    pub title: String,
    pub poster_path: Option<String>,
}

impl InteractionEntry {
    /// Build the entry for `item` played or favorited as `content_type`.
    #[must_use]
    pub fn for_item(item: &ContentItem, content_type: ContentType) -> Self {
        Self {
            content_type,
            external_id: item.external_id,
            title: item.title.clone(),
            poster_path: item.poster_path.clone(),
        }
    }
}

/// A favorite as stored by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Favorite {
    pub id: RecordId,
    pub entry: InteractionEntry,
    pub added_at: Option<DateTime<Utc>>,
}

/// A watch-history record as stored by the remote service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchHistoryRecord {
    pub id: RecordId,
    pub entry: InteractionEntry,
    /// Episode watched, for shows.
    pub episode: Option<Episode>,
    /// Playback progress between 0.0 and 1.0.
    pub progress: f64,
    pub last_watched: Option<DateTime<Utc>>,
}

/// A user comment on a title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub user_name: String,
    pub content_type: ContentType,
    pub external_id: ExternalId,
    pub text: String,
    /// Comment this one replies to.
    pub parent_id: Option<CommentId>,
    pub created_at: Option<DateTime<Utc>>,
}
