//! Client facade wiring the services together.

use std::sync::Arc;

use url::Url;

use crate::api::{HttpRemoteService, RemoteService};
use crate::config::ClientConfig;
use crate::error::Result;
use crate::services::{
    CatalogService, CheckoutInitiator, InteractionRecorder, SearchController, SessionManager,
};
use crate::store::{CredentialStore, FileCredentialStore};

/// Entry point for front ends.
///
/// Cheaply cloneable via `Arc`. All services share one remote service and
/// one session manager.
#[derive(Clone)]
pub struct PopflixClient {
    inner: Arc<PopflixClientInner>,
}

struct PopflixClientInner {
    origin_url: Option<Url>,
    session: SessionManager,
    catalog: CatalogService,
    search: SearchController,
    interactions: InteractionRecorder,
    checkout: CheckoutInitiator,
}

impl PopflixClient {
    /// Build a client talking HTTP to the configured service, with the
    /// token stored at the configured path.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let api = HttpRemoteService::new(&config.api)?;
        let store = FileCredentialStore::new(&config.credentials_path);
        Ok(Self::build(
            Arc::new(api),
            Arc::new(store),
            Some(config.origin_url.clone()),
        ))
    }

    /// Build a client from explicit parts, e.g. a mock remote service.
    #[must_use]
    pub fn with_parts(api: Arc<dyn RemoteService>, store: Arc<dyn CredentialStore>) -> Self {
        Self::build(api, store, None)
    }

    fn build(
        api: Arc<dyn RemoteService>,
        store: Arc<dyn CredentialStore>,
        origin_url: Option<Url>,
    ) -> Self {
        let session = SessionManager::new(Arc::clone(&api), store);
        Self {
            inner: Arc::new(PopflixClientInner {
                origin_url,
                catalog: CatalogService::new(Arc::clone(&api)),
                search: SearchController::new(Arc::clone(&api)),
                interactions: InteractionRecorder::new(Arc::clone(&api), session.clone()),
                checkout: CheckoutInitiator::new(api, session.clone()),
                session,
            }),
        }
    }

    /// Default checkout origin from configuration.
    #[must_use]
    pub fn origin_url(&self) -> Option<&Url> {
        self.inner.origin_url.as_ref()
    }

    #[must_use]
    pub fn session(&self) -> &SessionManager {
        &self.inner.session
    }

    #[must_use]
    pub fn catalog(&self) -> &CatalogService {
        &self.inner.catalog
    }

    #[must_use]
    pub fn search(&self) -> &SearchController {
        &self.inner.search
    }

    #[must_use]
    pub fn interactions(&self) -> &InteractionRecorder {
        &self.inner.interactions
    }

    #[must_use]
    pub fn checkout(&self) -> &CheckoutInitiator {
        &self.inner.checkout
    }
}
