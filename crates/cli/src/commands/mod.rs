//! CLI command implementations.

pub mod catalog;
pub mod comments;
pub mod library;
pub mod session;
pub mod upgrade;

use popflix_client::services::SearchOutcome;
use popflix_client::{ClientError, PopflixClient};
use popflix_core::{ContentItem, ContentType, ExternalId};

/// Find the catalog metadata for a title so the entitlement gate sees its
/// real adult flag.
///
/// Looks in the popular list first, then searches for `title` when given.
/// A title that cannot be found is refused rather than assumed safe.
async fn resolve_item(
    client: &PopflixClient,
    content_type: ContentType,
    id: ExternalId,
    title: Option<&str>,
) -> Result<ContentItem, ClientError> {
    let popular = client.catalog().fetch_popular_or_empty(content_type).await;
    if let Some(item) = popular.into_iter().find(|item| item.external_id == id) {
        return Ok(item);
    }

    if let Some(query) = title.map(str::trim).filter(|q| !q.is_empty()) {
        if let SearchOutcome::Applied(view) = client.search().search(query).await? {
            let found = view.results.into_iter().find(|r| {
                r.kind.content_type() == Some(content_type) && r.item.external_id == id
            });
            if let Some(result) = found {
                return Ok(result.item);
            }
        }
        tracing::debug!(%id, %content_type, query, "Title not among search matches");
    }

    Err(ClientError::NotFound(format!(
        "{content_type} {id} is not in the popular list; pass --title to search for it"
    )))
}

/// One-line listing of a title.
fn describe(item: &ContentItem) -> String {
    let year = item
        .release_date
        .as_deref()
        .and_then(|d| d.get(..4))
        .map(|y| format!(" ({y})"))
        .unwrap_or_default();
    let rating = item
        .rating
        .map(|r| format!("  ★ {r:.1}"))
        .unwrap_or_default();
    let adult = if item.is_adult { "  [18+]" } else { "" };
    format!(
        "{:>8}  {}{year}{rating}{adult}",
        item.external_id.as_i64(),
        item.title
    )
}
