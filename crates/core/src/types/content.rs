//! Catalog content types.
//!
//! Everything here is read-only data sourced from the remote catalog. The
//! client never mutates a [`ContentItem`] after decoding it.

use serde::{Deserialize, Serialize};

use super::id::ExternalId;

/// Kind of playable content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Movie,
    Tv,
}

impl ContentType {
    /// Lowercase name used in paths and request bodies.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Tv => "tv",
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "movie" => Ok(Self::Movie),
            "tv" => Ok(Self::Tv),
            _ => Err(format!("invalid content type: {s}")),
        }
    }
}

/// Kind reported for a search match.
///
/// The catalog's multi-search can also return people and other entities;
/// anything that is not a movie or a show decodes as [`MediaKind::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    Tv,
    #[default]
    #[serde(other)]
    Other,
}

impl MediaKind {
    /// The playable content type for this match, if it has one.
    #[must_use]
    pub const fn content_type(&self) -> Option<ContentType> {
        match self {
            Self::Movie => Some(ContentType::Movie),
            Self::Tv => Some(ContentType::Tv),
            Self::Other => None,
        }
    }
}

impl From<ContentType> for MediaKind {
    fn from(content_type: ContentType) -> Self {
        match content_type {
            ContentType::Movie => Self::Movie,
            ContentType::Tv => Self::Tv,
        }
    }
}

/// A movie or show from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    /// Catalog id.
    pub external_id: ExternalId,
    /// Display title (movie title or show name).
    pub title: String,
    /// Poster image path relative to the image CDN.
    pub poster_path: Option<String>,
    /// Whether the item is 18+ content.
    pub is_adult: bool,
    /// Average audience rating, if the catalog has one.
    pub rating: Option<f64>,
    /// Short synopsis.
    pub overview: Option<String>,
    /// Release date (movies) or first air date (shows).
    pub release_date: Option<String>,
}

impl ContentItem {
    /// Create an item with only the required fields set.
    #[must_use]
    pub fn new(external_id: ExternalId, title: impl Into<String>) -> Self {
        Self {
            external_id,
            title: title.into(),
            poster_path: None,
            is_adult: false,
            rating: None,
            overview: None,
            release_date: None,
        }
    }
}

/// One match from a catalog search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// What kind of entity matched.
    pub kind: MediaKind,
    /// The matched item.
    pub item: ContentItem,
}

/// The displayable state of the search box.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchView {
    /// Results to show, already truncated for display.
    pub results: Vec<SearchResult>,
    /// Whether the results dropdown is shown.
    pub visible: bool,
}

impl SearchView {
    /// The empty, hidden view shown when there is no query.
    #[must_use]
    pub fn hidden() -> Self {
        Self::default()
    }
}

/// Season/episode selector for TV playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Episode {
    pub season: u32,
    pub episode: u32,
}

impl Episode {
    /// Create a selector. Both numbers are 1-based.
    #[must_use]
    pub const fn new(season: u32, episode: u32) -> Self {
        Self { season, episode }
    }
}

impl Default for Episode {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

/// Stream locations resolved for one title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamLinks {
    /// Player page to open for playback.
    pub embed_url: String,
    /// Alternate torrent-backed player.
    pub torrent_url: Option<String>,
    /// Alternate aggregator player.
    pub aggregator_url: Option<String>,
    /// Direct download page.
    pub download_url: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_round_trips_through_str() {
        assert_eq!("movie".parse::<ContentType>().unwrap(), ContentType::Movie);
        assert_eq!(" TV ".parse::<ContentType>().unwrap(), ContentType::Tv);
        assert!("person".parse::<ContentType>().is_err());
        assert_eq!(ContentType::Tv.to_string(), "tv");
    }

    #[test]
    fn test_unknown_media_kind_decodes_as_other() {
        let kind: MediaKind = serde_json::from_str("\"person\"").unwrap();
        assert_eq!(kind, MediaKind::Other);
        assert_eq!(kind.content_type(), None);

        let kind: MediaKind = serde_json::from_str("\"tv\"").unwrap();
        assert_eq!(kind.content_type(), Some(ContentType::Tv));
    }

    #[test]
    fn test_hidden_view_is_empty() {
        let view = SearchView::hidden();
        assert!(view.results.is_empty());
        assert!(!view.visible);
    }
}
