//! Premium upgrade checkout.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, instrument};
use url::Url;

use popflix_core::{CheckoutRedirect, CheckoutRequest, CheckoutSessionId, PaymentStatus};

use super::session::SessionManager;
use crate::api::RemoteService;
use crate::error::{ClientError, Result, add_breadcrumb};

/// Starts and confirms premium upgrades.
///
/// At most one checkout request is outstanding at a time.
#[derive(Clone)]
pub struct CheckoutInitiator {
    api: Arc<dyn RemoteService>,
    session: SessionManager,
    pending: Arc<AtomicBool>,
}

/// Clears the pending flag on every exit path.
struct PendingGuard(Arc<AtomicBool>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl CheckoutInitiator {
    #[must_use]
    pub fn new(api: Arc<dyn RemoteService>, session: SessionManager) -> Self {
        Self {
            api,
            session,
            pending: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether an upgrade request is outstanding.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst)
    }

    fn begin(&self) -> Result<PendingGuard> {
        self.pending
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| PendingGuard(Arc::clone(&self.pending)))
            .map_err(|_| ClientError::UpgradeInProgress)
    }

    /// Open a premium checkout returning to `origin_url`.
    ///
    /// The redirect is handed back for a single navigation and not kept.
    ///
    /// # Errors
    ///
    /// - [`ClientError::AuthenticationRequired`] without a verified session
    /// - [`ClientError::InvalidInput`] if `origin_url` is not an absolute http(s) URL
    /// - [`ClientError::UpgradeInProgress`] if another upgrade is outstanding
    /// - [`ClientError::Remote`] if the checkout cannot be created
    #[instrument(skip(self))]
    pub async fn start_upgrade(&self, origin_url: &str) -> Result<CheckoutRedirect> {
        let session = self.session.session();
        let (Some(token), Some(user)) = (session.token(), session.user()) else {
            return Err(ClientError::AuthenticationRequired);
        };

        let origin = Url::parse(origin_url.trim())
            .ok()
            .filter(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
            .ok_or_else(|| {
                ClientError::InvalidInput(format!("not an absolute http(s) URL: {origin_url}"))
            })?;

        let _pending = self.begin()?;
        add_breadcrumb("checkout", "Upgrade started", None);

        let request = CheckoutRequest::premium(origin.as_str().trim_end_matches('/'));
        let redirect = self.api.create_checkout(token, &request).await?;

        info!(
            user_id = %user.id,
            session_id = %redirect.session_id,
            "Checkout created"
        );
        Ok(redirect)
    }

    /// Status of a checkout session.
    ///
    /// # Errors
    ///
    /// - [`ClientError::InvalidInput`] for a blank session id
    /// - [`ClientError::Remote`] if the status cannot be fetched
    #[instrument(skip(self))]
    pub async fn payment_status(&self, session_id: &CheckoutSessionId) -> Result<PaymentStatus> {
        if session_id.as_str().trim().is_empty() {
            return Err(ClientError::InvalidInput("checkout session id is empty".to_string()));
        }
        Ok(self.api.payment_status(session_id).await?)
    }

    /// Check a checkout and, once paid, refresh the profile so the premium
    /// entitlement takes effect.
    ///
    /// # Errors
    ///
    /// As [`payment_status`](Self::payment_status), plus any error from
    /// [`SessionManager::refresh`] after a successful payment.
    pub async fn confirm_upgrade(&self, session_id: &CheckoutSessionId) -> Result<PaymentStatus> {
        let status = self.payment_status(session_id).await?;
        if status.is_paid() {
            add_breadcrumb("checkout", "Payment confirmed", None);
            self.session.refresh().await?;
        }
        Ok(status)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use popflix_core::{PaymentState, UserId, UserProfile};

    use super::*;
    use crate::api::mock::{Endpoint, GateKey, MockRemoteService};
    use crate::entitlement::is_premium_customer;
    use crate::store::MemoryCredentialStore;

    async fn initiator(signed_in: bool) -> (MockRemoteService, SessionManager, CheckoutInitiator) {
        let mock = MockRemoteService::new().with_account(
            "cred",
            "tok",
            UserProfile {
                id: UserId::new("u-1"),
                name: "Ada".to_string(),
                picture: None,
                email: None,
                is_premium: false,
            },
        );
        let api: Arc<dyn RemoteService> = Arc::new(mock.clone());
        let session = SessionManager::new(Arc::clone(&api), Arc::new(MemoryCredentialStore::new()));
        if signed_in {
            session.login("cred").await.unwrap();
        }
        let checkout = CheckoutInitiator::new(api, session.clone());
        (mock, session, checkout)
    }

    #[tokio::test]
    async fn test_upgrade_requires_session() {
        let (mock, _, checkout) = initiator(false).await;
        let err = checkout.start_upgrade("https://popflix.example").await.unwrap_err();
        assert!(matches!(err, ClientError::AuthenticationRequired));
        assert_eq!(mock.calls(Endpoint::CreateCheckout), 0);
    }

    #[tokio::test]
    async fn test_upgrade_requests_premium_package() {
        let (mock, _, checkout) = initiator(true).await;
        let redirect = checkout.start_upgrade("https://popflix.example/").await.unwrap();

        assert!(redirect.checkout_url.contains(redirect.session_id.as_str()));
        let request = mock.last_checkout().unwrap();
        assert_eq!(request.package_id, "premium_monthly");
        assert_eq!(request.origin_url, "https://popflix.example");
        assert!(!checkout.is_pending());
    }

    #[tokio::test]
    async fn test_relative_origin_is_rejected() {
        let (mock, _, checkout) = initiator(true).await;
        let err = checkout.start_upgrade("/pricing").await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidInput(_)));
        assert_eq!(mock.calls(Endpoint::CreateCheckout), 0);
    }

    #[tokio::test]
    async fn test_second_upgrade_while_pending_is_rejected() {
        let (mock, _, checkout) = initiator(true).await;
        let gate = mock.hold(GateKey::Endpoint(Endpoint::CreateCheckout));

        let first = tokio::spawn({
            let checkout = checkout.clone();
            async move { checkout.start_upgrade("https://popflix.example").await }
        });
        assert!(mock.wait_for_calls(Endpoint::CreateCheckout, 1).await);
        assert!(checkout.is_pending());

        let err = checkout.start_upgrade("https://popflix.example").await.unwrap_err();
        assert!(matches!(err, ClientError::UpgradeInProgress));

        gate.open();
        first.await.unwrap().unwrap();
        assert!(!checkout.is_pending());
        assert_eq!(mock.calls(Endpoint::CreateCheckout), 1);
    }

    #[tokio::test]
    async fn test_pending_flag_cleared_after_failure() {
        let (mock, _, checkout) = initiator(true).await;
        mock.fail(Endpoint::CreateCheckout, 500, "stripe down");

        assert!(checkout.start_upgrade("https://popflix.example").await.is_err());
        assert!(!checkout.is_pending());

        mock.clear_failure(Endpoint::CreateCheckout);
        assert!(checkout.start_upgrade("https://popflix.example").await.is_ok());
    }

    #[tokio::test]
    async fn test_confirm_upgrade_grants_premium() {
        let (mock, session, checkout) = initiator(true).await;
        let redirect = checkout.start_upgrade("https://popflix.example").await.unwrap();

        let status = checkout.confirm_upgrade(&redirect.session_id).await.unwrap();
        assert_eq!(status.payment_state, PaymentState::Pending);
        assert!(!is_premium_customer(&session.session()));

        mock.mark_paid(&redirect.session_id);
        let status = checkout.confirm_upgrade(&redirect.session_id).await.unwrap();
        assert!(status.is_paid());
        assert_eq!(status.amount.unwrap().display(), "₹200.00");
        assert!(is_premium_customer(&session.session()));
    }
}
