//! Core types for PopFlix.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod content;
pub mod id;
pub mod payment;
pub mod price;
pub mod records;
pub mod session;
pub mod token;

pub use content::{ContentItem, ContentType, Episode, MediaKind, SearchResult, SearchView, StreamLinks};
pub use id::*;
pub use payment::{
    CheckoutRedirect, CheckoutRequest, PREMIUM_PACKAGE_ID, PaymentState, PaymentStatus,
};
pub use price::{CurrencyCode, Price};
pub use records::{Comment, Favorite, InteractionEntry, WatchHistoryRecord};
pub use session::{Session, UserProfile};
pub use token::SessionToken;
