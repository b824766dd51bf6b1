//! Authentication error types.

use amicale_core::remote::StoreError;
use thiserror::Error;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] amicale_core::EmailError),

    /// Password too short.
    #[error("password must be at least {min} characters")]
    WeakPassword {
        /// Minimum accepted length.
        min: usize,
    },

    /// The remote store rejected the operation; its message is kept verbatim.
    #[error(transparent)]
    Store(#[from] StoreError),
}
