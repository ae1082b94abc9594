//! Conversions from wire transfer types to domain types.
//!
//! Malformed list entries are dropped (and logged) rather than failing the
//! whole response. Single-object responses missing required data are
//! reported as [`ApiError::InvalidResponse`].

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;

use popflix_core::{
    CheckoutRedirect, CheckoutSessionId, Comment, CommentId, ContentItem, ContentType,
    CurrencyCode, Episode, ExternalId, Favorite, InteractionEntry, PaymentState, PaymentStatus,
    Price, RecordId, SearchResult, SessionToken, StreamLinks, UserId, UserProfile,
    WatchHistoryRecord,
};

use super::wire::{
    MessageBody, RawCheckout, RawComment, RawContentItem, RawInteractionRecord, RawLoginResponse,
    RawPaymentStatus, RawProfile, RawSearchResult, RawStreamLinks,
};
use super::{ApiError, LoginGrant};

/// Title used when the catalog sends neither `title` nor `name`.
const UNTITLED: &str = "Untitled";

// =============================================================================
// Scalars
// =============================================================================

/// Accept catalog ids sent as integers, integral floats or numeric strings.
fn coerce_external_id(value: &Value) -> Option<ExternalId> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && f.is_finite())
                    .map(|f| {
                        #[allow(clippy::cast_possible_truncation)] // integral, checked above
                        let id = f as i64;
                        id
                    })
            })
            .map(ExternalId::new),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Accept opaque ids sent as strings or numbers.
fn coerce_string_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse RFC 3339 timestamps, or naive ISO timestamps which the service
/// emits in UTC without an offset.
pub(super) fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Human-readable message from an error body, falling back to the raw text.
pub(super) fn error_message(body: &str) -> String {
    let parsed: MessageBody = serde_json::from_str(body).unwrap_or_default();
    match (parsed.detail, parsed.message) {
        (Some(Value::String(detail)), _) => detail,
        (Some(other), _) => other.to_string(),
        (None, Some(message)) => message,
        (None, None) => body.chars().take(200).collect(),
    }
}

/// Whether a favorites response body reports an existing favorite.
pub(super) fn is_already_favorite(body: &str) -> bool {
    serde_json::from_str::<MessageBody>(body)
        .ok()
        .and_then(|b| b.message)
        .is_some_and(|m| m.trim().eq_ignore_ascii_case("already in favorites"))
}

// =============================================================================
// Catalog
// =============================================================================

pub(super) fn convert_content_item(raw: RawContentItem) -> Option<ContentItem> {
    let Some(external_id) = raw.tmdb_id.as_ref().and_then(coerce_external_id) else {
        tracing::debug!(title = ?raw.title.or(raw.name), "Dropping catalog item without a valid id");
        return None;
    };

    let title = non_empty(raw.title)
        .or_else(|| non_empty(raw.name))
        .unwrap_or_else(|| UNTITLED.to_string());

    Some(ContentItem {
        external_id,
        title,
        poster_path: non_empty(raw.poster_path),
        is_adult: raw.adult.unwrap_or(false),
        rating: raw.vote_average.filter(|r| r.is_finite()),
        overview: non_empty(raw.overview),
        release_date: non_empty(raw.release_date).or_else(|| non_empty(raw.first_air_date)),
    })
}

pub(super) fn convert_content_items(raw: Vec<RawContentItem>) -> Vec<ContentItem> {
    let total = raw.len();
    let items: Vec<_> = raw.into_iter().filter_map(convert_content_item).collect();
    if items.len() < total {
        tracing::warn!(
            dropped = total - items.len(),
            total,
            "Dropped malformed catalog items"
        );
    }
    items
}

pub(super) fn convert_search_results(raw: Vec<RawSearchResult>) -> Vec<SearchResult> {
    raw.into_iter()
        .filter_map(|r| {
            let item = convert_content_item(r.data?)?;
            Some(SearchResult { kind: r.kind, item })
        })
        .collect()
}

pub(super) fn convert_stream_links(raw: RawStreamLinks) -> Result<StreamLinks, ApiError> {
    let embed_url = non_empty(raw.embed_url)
        .ok_or_else(|| ApiError::InvalidResponse("stream response has no embed_url".to_string()))?;

    Ok(StreamLinks {
        embed_url,
        torrent_url: non_empty(raw.torrent_url),
        aggregator_url: non_empty(raw.agg_url),
        download_url: non_empty(raw.download_url),
    })
}

// =============================================================================
// Accounts
// =============================================================================

pub(super) fn convert_profile(raw: RawProfile) -> Result<UserProfile, ApiError> {
    let id = raw
        .id
        .as_ref()
        .and_then(coerce_string_id)
        .ok_or_else(|| ApiError::InvalidResponse("profile has no id".to_string()))?;

    let email = non_empty(raw.email);
    let name = non_empty(raw.name)
        .or_else(|| email.clone())
        .unwrap_or_default();

    Ok(UserProfile {
        id: UserId::new(id),
        name,
        picture: non_empty(raw.picture),
        email,
        is_premium: raw.is_premium.unwrap_or(false),
    })
}

pub(super) fn convert_login(raw: RawLoginResponse) -> Result<LoginGrant, ApiError> {
    let token = non_empty(raw.token)
        .ok_or_else(|| ApiError::InvalidResponse("login response has no token".to_string()))?;
    let user = raw
        .user
        .ok_or_else(|| ApiError::InvalidResponse("login response has no user".to_string()))
        .and_then(convert_profile)?;

    Ok(LoginGrant {
        token: SessionToken::new(token),
        user,
    })
}

// =============================================================================
// Library
// =============================================================================

fn convert_entry(raw: &RawInteractionRecord) -> Option<(RecordId, InteractionEntry)> {
    let id = raw.id.as_ref().and_then(coerce_string_id)?;
    let content_type = raw.content_type.as_deref()?.parse::<ContentType>().ok()?;
    let external_id = raw.tmdb_id.as_ref().and_then(coerce_external_id)?;

    Some((
        RecordId::new(id),
        InteractionEntry {
            content_type,
            external_id,
            title: non_empty(raw.title.clone()).unwrap_or_else(|| UNTITLED.to_string()),
            poster_path: non_empty(raw.poster_path.clone()),
        },
    ))
}

pub(super) fn convert_favorites(raw: Vec<RawInteractionRecord>) -> Vec<Favorite> {
    raw.into_iter()
        .filter_map(|r| {
            let (id, entry) = convert_entry(&r)?;
            Some(Favorite {
                id,
                entry,
                added_at: parse_timestamp(r.added_at.as_deref()),
            })
        })
        .collect()
}

pub(super) fn convert_watch_history(raw: Vec<RawInteractionRecord>) -> Vec<WatchHistoryRecord> {
    raw.into_iter()
        .filter_map(|r| {
            let (id, entry) = convert_entry(&r)?;
            let episode = match (r.season, r.episode) {
                (Some(season), Some(episode)) => Some(Episode::new(season, episode)),
                _ => None,
            };
            Some(WatchHistoryRecord {
                id,
                entry,
                episode,
                progress: r
                    .progress
                    .filter(|p| p.is_finite())
                    .map_or(0.0, |p| p.clamp(0.0, 1.0)),
                last_watched: parse_timestamp(r.last_watched.as_deref()),
            })
        })
        .collect()
}

pub(super) fn convert_comment(raw: RawComment) -> Option<Comment> {
    Some(Comment {
        id: CommentId::new(raw.id.as_ref().and_then(coerce_string_id)?),
        user_name: non_empty(raw.user_name).unwrap_or_default(),
        content_type: raw.content_type.as_deref()?.parse().ok()?,
        external_id: raw.tmdb_id.as_ref().and_then(coerce_external_id)?,
        text: raw.text.unwrap_or_default(),
        parent_id: non_empty(raw.parent_id).map(CommentId::new),
        created_at: parse_timestamp(raw.created_at.as_deref()),
    })
}

pub(super) fn convert_comments(raw: Vec<RawComment>) -> Vec<Comment> {
    raw.into_iter().filter_map(convert_comment).collect()
}

// =============================================================================
// Payments
// =============================================================================

pub(super) fn convert_checkout(raw: RawCheckout) -> Result<CheckoutRedirect, ApiError> {
    let checkout_url = non_empty(raw.checkout_url)
        .ok_or_else(|| ApiError::InvalidResponse("checkout has no checkout_url".to_string()))?;
    let session_id = non_empty(raw.session_id)
        .ok_or_else(|| ApiError::InvalidResponse("checkout has no session_id".to_string()))?;

    Ok(CheckoutRedirect {
        checkout_url,
        session_id: CheckoutSessionId::new(session_id),
    })
}

pub(super) fn convert_payment_status(raw: RawPaymentStatus) -> PaymentStatus {
    let payment_state = match raw.payment_status.as_deref().map(str::trim) {
        Some("paid") => PaymentState::Paid,
        Some("pending") | None => PaymentState::Pending,
        Some("failed") => PaymentState::Failed,
        Some(_) => PaymentState::Other,
    };

    let amount = match (raw.amount, raw.currency.as_deref()) {
        (Some(amount), Some(currency)) => Decimal::try_from(amount)
            .ok()
            .zip(currency.parse::<CurrencyCode>().ok())
            .map(|(amount, code)| Price::new(amount, code)),
        _ => None,
    };

    PaymentStatus {
        status: raw.status.unwrap_or_default(),
        payment_state,
        amount,
    }
}
