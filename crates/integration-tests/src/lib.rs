//! End-to-end tests for the PopFlix client.
//!
//! Every test drives a full [`PopflixClient`] wired to the in-memory
//! [`MockRemoteService`], so no network or running service is needed.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p popflix-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `session_lifecycle` - Restore, login, logout and their ordering
//! - `entitlement_gating` - Adult playback and premium comments
//! - `search_ordering` - Incremental search with out-of-order replies
//! - `library` - Favorites and watch history
//! - `checkout` - Premium upgrade from checkout to entitlement

#![allow(clippy::missing_panics_doc)]

use std::path::Path;
use std::sync::Arc;

use popflix_client::PopflixClient;
use popflix_client::api::mock::MockRemoteService;
use popflix_client::store::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
use popflix_core::{ContentItem, ExternalId, UserId, UserProfile};

/// Credential accepted by the mock for the default account.
pub const CREDENTIAL: &str = "google-id-token";
/// Session token the mock issues for the default account.
pub const TOKEN: &str = "tok-ada";
/// Origin used for checkout redirects.
pub const ORIGIN: &str = "https://popflix.example";

/// A free-tier profile.
#[must_use]
pub fn free_profile() -> UserProfile {
    UserProfile {
        id: UserId::new("user-ada"),
        name: "Ada Lovelace".to_string(),
        picture: None,
        email: Some("ada@example.com".to_string()),
        is_premium: false,
    }
}

/// The same profile with premium.
#[must_use]
pub fn premium_profile() -> UserProfile {
    UserProfile {
        is_premium: true,
        ..free_profile()
    }
}

/// A catalog title.
#[must_use]
pub fn title(id: i64, name: &str) -> ContentItem {
    ContentItem::new(ExternalId::new(id), name)
}

/// A catalog title flagged adult.
#[must_use]
pub fn adult_title(id: i64, name: &str) -> ContentItem {
    ContentItem {
        is_adult: true,
        ..title(id, name)
    }
}

/// A client wired to a mock service with one registered account.
pub struct TestContext {
    pub mock: MockRemoteService,
    pub store: Arc<dyn CredentialStore>,
    pub client: PopflixClient,
}

impl TestContext {
    /// Free-tier account, empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::with_profile(free_profile())
    }

    /// Account with `profile`, empty in-memory store.
    #[must_use]
    pub fn with_profile(profile: UserProfile) -> Self {
        let mock = MockRemoteService::new().with_account(CREDENTIAL, TOKEN, profile);
        Self::build(mock, Arc::new(MemoryCredentialStore::new()))
    }

    /// Free-tier account whose token is persisted at `path`.
    #[must_use]
    pub fn with_file_store(path: &Path) -> Self {
        let mock = MockRemoteService::new().with_account(CREDENTIAL, TOKEN, free_profile());
        Self::build(mock, Arc::new(FileCredentialStore::new(path)))
    }

    fn build(mock: MockRemoteService, store: Arc<dyn CredentialStore>) -> Self {
        let client = PopflixClient::with_parts(Arc::new(mock.clone()), Arc::clone(&store));
        Self {
            mock,
            store,
            client,
        }
    }

    /// A second client sharing this context's service and store, as after
    /// an application restart.
    #[must_use]
    pub fn restart(&self) -> PopflixClient {
        PopflixClient::with_parts(Arc::new(self.mock.clone()), Arc::clone(&self.store))
    }

    /// Sign in with the default credential.
    pub async fn sign_in(&self) {
        self.client
            .session()
            .login(CREDENTIAL)
            .await
            .expect("login with registered credential");
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
