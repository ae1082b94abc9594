//! User profile and session state.

use serde::{Deserialize, Serialize};

use super::id::UserId;
use super::token::SessionToken;

/// The signed-in user's profile as reported by the remote service.
///
/// Profiles are only ever replaced as a unit; there is no way to patch a
/// single field client-side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Remote user id.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Avatar URL.
    pub picture: Option<String>,
    /// Account email, when the service shares it.
    pub email: Option<String>,
    /// Whether the account holds the premium entitlement.
    pub is_premium: bool,
}

/// The client's current authentication state.
///
/// Fields are private: a `Session` value can be read by anyone, but the only
/// way to produce one is through the constructors below, each of which
/// upholds the invariant that a user is present only alongside a token.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Session {
    token: Option<SessionToken>,
    user: Option<UserProfile>,
    is_loading: bool,
}

impl Session {
    /// Unauthenticated, not loading.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// A stored token is being verified.
    #[must_use]
    pub const fn verifying(token: SessionToken) -> Self {
        Self {
            token: Some(token),
            user: None,
            is_loading: true,
        }
    }

    /// A token accepted by the remote service together with its profile.
    #[must_use]
    pub const fn authenticated(token: SessionToken, user: UserProfile) -> Self {
        Self {
            token: Some(token),
            user: Some(user),
            is_loading: false,
        }
    }

    /// The same session with the loading flag set to `is_loading`.
    #[must_use]
    pub fn with_loading(self, is_loading: bool) -> Self {
        Self { is_loading, ..self }
    }

    /// The session token, if any.
    #[must_use]
    pub const fn token(&self) -> Option<&SessionToken> {
        self.token.as_ref()
    }

    /// The signed-in user, if the token has been accepted.
    #[must_use]
    pub const fn user(&self) -> Option<&UserProfile> {
        self.user.as_ref()
    }

    /// Whether a session-establishing request is in flight.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// Whether the session has a verified user.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.token.is_some() && self.user.is_some()
    }
}
