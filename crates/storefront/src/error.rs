//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type for the shell. Each service keeps its
//! own error enum; `AppError` wraps them, decides what is worth reporting to
//! Sentry, and renders the message shown to the user.

use amicale_core::remote::StoreError;
use thiserror::Error;

use crate::config::ConfigError;
use crate::services::auth::AuthError;
use crate::services::cart::CartError;
use crate::storage::StorageError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Remote store operation failed.
    #[error("Remote store error: {0}")]
    Store(#[from] StoreError),

    /// Cart operation failed.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Local storage failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Bad input from the user.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    /// Whether this error points at a failure outside the user's control.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        match self {
            Self::Store(_) | Self::Storage(_) | Self::Config(_) => true,
            Self::Cart(err) => matches!(err, CartError::Store(_) | CartError::PartialOrder { .. }),
            Self::Auth(_) | Self::BadRequest(_) => false,
        }
    }

    /// Report server-side failures to Sentry and log them.
    pub fn capture(&self) {
        if self.is_server_error() {
            let event_id = sentry::capture_error(self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Operation failed"
            );
        }
    }

    /// Message shown to the user.
    ///
    /// Remote store messages are surfaced verbatim; validation messages are
    /// the validator's own text.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Store(err) => err.to_string(),
            Self::Cart(err) => err.to_string(),
            Self::Auth(err) => match err {
                AuthError::InvalidEmail(_) => "Invalid email address".to_string(),
                other => other.to_string(),
            },
            Self::Storage(_) => "Local storage is unavailable".to_string(),
            Self::Config(err) => err.to_string(),
            Self::BadRequest(msg) => msg.clone(),
        }
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
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
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added to cart", Some(&[("product_id", "123")]));
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
