//! Unified error handling for the admin console.

use amicale_core::remote::StoreError;
use amicale_core::schema::ValidationErrors;
use thiserror::Error;

use crate::console::Tab;

/// Error type for back-office operations.
#[derive(Debug, Error)]
pub enum AdminError {
    /// The current role may not open this tab.
    #[error("access to {0} is not allowed for the current role")]
    Forbidden(Tab),

    /// The form failed validation; nothing was sent.
    #[error("invalid form: {0}")]
    Validation(ValidationErrors),

    /// More files than the form has image slots.
    #[error("this form accepts at most {max} image(s), got {got}")]
    TooManyImages { max: usize, got: usize },

    /// An image upload failed and the save was aborted.
    #[error("upload of {file_name} failed: {source}")]
    Upload {
        file_name: String,
        #[source]
        source: StoreError,
    },

    /// The record is not in the loaded list.
    #[error("unknown record {0}")]
    UnknownRecord(String),

    /// The operator declined the confirmation prompt.
    #[error("cancelled")]
    Cancelled,

    /// Remote store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ValidationErrors> for AdminError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

impl AdminError {
    /// Whether the error came from the remote store (and is worth reporting).
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Upload { .. })
    }

    /// Report remote failures to Sentry.
    pub fn capture(&self) {
        if self.is_remote() {
            let event_id = sentry::capture_error(self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Admin operation failed"
            );
        }
    }
}

/// Result type alias for back-office operations.
pub type Result<T> = std::result::Result<T, AdminError>;
