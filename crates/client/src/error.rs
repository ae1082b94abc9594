//! Caller-facing error taxonomy with Sentry integration.
//!
//! Every public client operation returns `Result<T, ClientError>`. Front ends
//! show [`ClientError::user_message`] and call [`ClientError::report`] once at
//! the boundary so server-side failures reach Sentry.

use thiserror::Error;

use crate::api::ApiError;
use crate::store::StoreError;

/// Why the entitlement gate refused an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DenialReason {
    /// The action needs an active premium subscription.
    PremiumRequired,
}

impl std::fmt::Display for DenialReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PremiumRequired => write!(f, "premium subscription required"),
        }
    }
}

/// Client-level error type.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The operation needs a signed-in session and there is none.
    #[error("Authentication required")]
    AuthenticationRequired,

    /// The session is not entitled to the operation.
    #[error("Not allowed: {0}")]
    Authorization(DenialReason),

    /// The remote service reported a conflicting resource.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A premium upgrade request is already outstanding.
    #[error("Upgrade already in progress")]
    UpgradeInProgress,

    /// A newer request made this one obsolete; its result was discarded.
    #[error("Superseded by a newer request")]
    Superseded,

    /// Input rejected before any network call.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The remote resource does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Credential store failure.
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    /// Remote service failure.
    #[error("Remote error: {0}")]
    Remote(#[from] ApiError),
}

impl ClientError {
    /// Message safe to show to an end user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::AuthenticationRequired => "Please sign in first".to_string(),
            Self::Authorization(DenialReason::PremiumRequired) => {
                "This requires a Premium subscription".to_string()
            }
            Self::Conflict(_) => "That change conflicts with existing data".to_string(),
            Self::UpgradeInProgress => "An upgrade is already in progress".to_string(),
            Self::Superseded => "Request was replaced by a newer one".to_string(),
            Self::InvalidInput(msg) => msg.clone(),
            Self::NotFound(_) => "Not found".to_string(),
            // Don't expose internal error details to users
            Self::Storage(_) => "Could not save your sign-in on this device".to_string(),
            Self::Remote(err) => match err {
                ApiError::Unauthorized(_) => "Your session has expired, please sign in again".to_string(),
                ApiError::Forbidden(_) => "You are not allowed to do that".to_string(),
                ApiError::NotFound(_) => "Not found".to_string(),
                ApiError::Conflict(_) => "That change conflicts with existing data".to_string(),
                ApiError::RateLimited(secs) => {
                    format!("Too many requests, try again in {secs} seconds")
                }
                _ => "The service is unavailable, please try again".to_string(),
            },
        }
    }

    /// Whether retrying the same operation may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Remote(err) => match err {
                ApiError::Http(_) | ApiError::RateLimited(_) => true,
                ApiError::Status { status, .. } => *status >= 500,
                _ => false,
            },
            _ => false,
        }
    }

    /// Whether this failure points at the service or the local machine
    /// rather than at the user's request.
    #[must_use]
    pub const fn is_server_side(&self) -> bool {
        match self {
            Self::Storage(_) => true,
            Self::Remote(err) => match err {
                ApiError::Status { status, .. } => *status >= 500,
                ApiError::Http(_)
                | ApiError::Parse(_)
                | ApiError::Url(_)
                | ApiError::InvalidResponse(_) => true,
                _ => false,
            },
            _ => false,
        }
    }

    /// Capture server-side failures to Sentry and log them.
    pub fn report(&self) {
        if self.is_server_side() {
            let event_id = sentry::capture_error(self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Client operation failed"
            );
        } else {
            tracing::debug!(error = %self, "Client operation rejected");
        }
    }
}

/// Result type alias for `ClientError`.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Set the Sentry user context.
///
/// Called after a session is established to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Called on logout and when a stored session is rejected.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("playback", "Started playback", Some(&[("external_id", "603")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
