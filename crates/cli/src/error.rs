//! Command errors.

use amicale_admin::AdminError;
use amicale_core::remote::StoreError;
use amicale_storefront::error::AppError;
use amicale_storefront::services::auth::AuthError;
use amicale_storefront::services::cart::CartError;
use amicale_storefront::storage::StorageError;
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    /// Storefront or account operation failed.
    #[error(transparent)]
    App(#[from] AppError),

    /// Back-office operation failed.
    #[error(transparent)]
    Admin(#[from] AdminError),

    /// A `--json` argument did not parse.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A file could not be read.
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// Wrong or missing arguments.
    #[error("{0}")]
    Usage(String),
}

impl From<StoreError> for CliError {
    fn from(e: StoreError) -> Self {
        Self::App(e.into())
    }
}

impl From<CartError> for CliError {
    fn from(e: CartError) -> Self {
        Self::App(e.into())
    }
}

impl From<AuthError> for CliError {
    fn from(e: AuthError) -> Self {
        Self::App(e.into())
    }
}

impl From<StorageError> for CliError {
    fn from(e: StorageError) -> Self {
        Self::App(e.into())
    }
}

impl CliError {
    /// Message shown to the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::App(e) => e.user_message(),
            other => other.to_string(),
        }
    }

    /// Report server-side failures to Sentry.
    pub fn capture(&self) {
        match self {
            Self::App(e) => e.capture(),
            Self::Admin(e) => e.capture(),
            Self::Json(_) | Self::Io(_) | Self::Usage(_) => {}
        }
    }
}
