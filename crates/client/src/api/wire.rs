//! Wire-format transfer types for the remote JSON API.
//!
//! Response types are deliberately permissive (`Option` everywhere, ids as
//! raw JSON values) so that one malformed record never fails a whole list.
//! Validation happens in `conversions`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use popflix_core::MediaKind;

// =============================================================================
// Responses
// =============================================================================

/// `{ "results": [...] }` envelope used by list endpoints.
#[derive(Debug, Deserialize)]
pub(super) struct ResultsEnvelope<T> {
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

/// Error body. The service uses `detail` for errors and `message` for
/// informational outcomes such as an existing favorite.
#[derive(Debug, Default, Deserialize)]
pub(super) struct MessageBody {
    pub detail: Option<Value>,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawProfile {
    pub id: Option<Value>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub picture: Option<String>,
    #[serde(default)]
    pub is_premium: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawLoginResponse {
    pub token: Option<String>,
    pub user: Option<RawProfile>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawContentItem {
    pub tmdb_id: Option<Value>,
    pub title: Option<String>,
    pub name: Option<String>,
    pub poster_path: Option<String>,
    pub adult: Option<bool>,
    pub vote_average: Option<f64>,
    pub overview: Option<String>,
    pub release_date: Option<String>,
    pub first_air_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawSearchResult {
    #[serde(rename = "type", default)]
    pub kind: MediaKind,
    pub data: Option<RawContentItem>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawStreamLinks {
    pub embed_url: Option<String>,
    pub torrent_url: Option<String>,
    pub agg_url: Option<String>,
    pub download_url: Option<String>,
}

/// Favorite or watch-history record.
#[derive(Debug, Deserialize)]
pub(super) struct RawInteractionRecord {
    pub id: Option<Value>,
    pub content_type: Option<String>,
    pub tmdb_id: Option<Value>,
    pub title: Option<String>,
    pub poster_path: Option<String>,
    pub added_at: Option<String>,
    pub last_watched: Option<String>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub progress: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawComment {
    pub id: Option<Value>,
    pub user_name: Option<String>,
    pub content_type: Option<String>,
    pub tmdb_id: Option<Value>,
    pub text: Option<String>,
    pub parent_id: Option<String>,
    pub created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawCheckout {
    pub checkout_url: Option<String>,
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawPaymentStatus {
    pub status: Option<String>,
    pub payment_status: Option<String>,
    pub amount: Option<f64>,
    pub currency: Option<String>,
}

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Serialize)]
pub(super) struct LoginBody<'a> {
    pub token: &'a str,
}

#[derive(Debug, Serialize)]
pub(super) struct InteractionBody<'a> {
    pub content_type: &'a str,
    pub tmdb_id: i64,
    pub title: &'a str,
    pub poster_path: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub season: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode: Option<u32>,
}

#[derive(Debug, Serialize)]
pub(super) struct CheckoutBody<'a> {
    pub package_id: &'a str,
    pub origin_url: &'a str,
}

#[derive(Debug, Serialize)]
pub(super) struct CommentBody<'a> {
    pub content_type: &'a str,
    pub tmdb_id: i64,
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<&'a str>,
}
