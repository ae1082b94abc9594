//! Entitlement gate.
//!
//! Pure decisions over a [`Session`] snapshot. Nothing here touches the
//! network; callers refuse gated actions before issuing any request.

use popflix_core::{ContentItem, Session};

use crate::error::{ClientError, DenialReason};

/// Outcome of an entitlement check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied(DenialReason),
}

impl Decision {
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    /// Convert a denial into [`ClientError::Authorization`].
    ///
    /// # Errors
    ///
    /// Returns the denial reason as an authorization error.
    pub fn into_result(self) -> Result<(), ClientError> {
        match self {
            Self::Allowed => Ok(()),
            Self::Denied(reason) => Err(ClientError::Authorization(reason)),
        }
    }
}

/// Whether the session belongs to a premium subscriber.
#[must_use]
pub fn is_premium_customer(session: &Session) -> bool {
    session.user().is_some_and(|user| user.is_premium)
}

/// Adult titles need premium; everything else plays for everyone,
/// signed in or not.
#[must_use]
pub fn can_play(session: &Session, item: &ContentItem) -> Decision {
    if item.is_adult && !is_premium_customer(session) {
        Decision::Denied(DenialReason::PremiumRequired)
    } else {
        Decision::Allowed
    }
}

/// Posting comments is a premium feature.
#[must_use]
pub fn can_comment(session: &Session) -> Decision {
    if is_premium_customer(session) {
        Decision::Allowed
    } else {
        Decision::Denied(DenialReason::PremiumRequired)
    }
}
