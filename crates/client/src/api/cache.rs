//! Cache types for catalog responses.

use popflix_core::{ContentItem, ContentType};

/// Cache key for catalog lists.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Popular(ContentType),
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Popular(Vec<ContentItem>),
}
