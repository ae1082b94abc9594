//! Premium checkout types.

use serde::{Deserialize, Serialize};

use super::id::CheckoutSessionId;
use super::price::Price;

/// Package id of the premium subscription offered by the client.
pub const PREMIUM_PACKAGE_ID: &str = "premium_monthly";

/// Request to open a checkout for a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub package_id: String,
    /// Origin the payment provider redirects back to.
    pub origin_url: String,
}

impl CheckoutRequest {
    /// Checkout for the premium package returning to `origin_url`.
    #[must_use]
    pub fn premium(origin_url: impl Into<String>) -> Self {
        Self {
            package_id: PREMIUM_PACKAGE_ID.to_string(),
            origin_url: origin_url.into(),
        }
    }
}

/// Where to send the user to complete payment.
///
/// Used for a single navigation and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRedirect {
    pub checkout_url: String,
    pub session_id: CheckoutSessionId,
}

/// Payment state of a checkout session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    #[default]
    Pending,
    Paid,
    Failed,
    #[serde(other)]
    Other,
}

impl std::fmt::Display for PaymentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Paid => write!(f, "paid"),
            Self::Failed => write!(f, "failed"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Status of a checkout session as reported by the payment backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentStatus {
    /// Provider-level session status (e.g. "open", "complete").
    pub status: String,
    pub payment_state: PaymentState,
    /// Amount charged, when the provider reports one.
    pub amount: Option<Price>,
}

impl PaymentStatus {
    /// Whether the payment has been captured.
    #[must_use]
    pub fn is_paid(&self) -> bool {
        self.payment_state == PaymentState::Paid
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_premium_checkout_uses_fixed_package() {
        let request = CheckoutRequest::premium("https://popflix.example");
        assert_eq!(request.package_id, "premium_monthly");
        assert_eq!(request.origin_url, "https://popflix.example");
    }

    #[test]
    fn test_unknown_payment_state_decodes_as_other() {
        let state: PaymentState = serde_json::from_str("\"unpaid\"").unwrap();
        assert_eq!(state, PaymentState::Other);
        let state: PaymentState = serde_json::from_str("\"paid\"").unwrap();
        assert_eq!(state, PaymentState::Paid);
    }
}
