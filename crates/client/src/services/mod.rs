//! Client services.
//!
//! # Services
//!
//! - `session` - Session manager (restore, login, logout, refresh)
//! - `catalog` - Popular lists and incremental search
//! - `interactions` - Playback, favorites, watch history, comments
//! - `checkout` - Premium upgrade checkout
//!
//! Every service shares the same [`RemoteService`](crate::api::RemoteService)
//! and, where it acts on behalf of the user, the same [`SessionManager`].

pub mod catalog;
pub mod checkout;
pub mod interactions;
pub mod session;

pub use catalog::{CatalogService, HomeFeed, SEARCH_RESULT_LIMIT, SearchController, SearchOutcome};
pub use checkout::CheckoutInitiator;
pub use interactions::{FavoriteOutcome, InteractionRecorder, Playback};
pub use session::SessionManager;
