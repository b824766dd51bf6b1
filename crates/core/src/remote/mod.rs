//! The remote store contract.
//!
//! All persistence, authentication and file storage live in an external
//! backend-as-a-service. The core only consumes its contract, split into four
//! object-safe async traits:
//!
//! - [`AuthBackend`] - sessions, sign in/up/out, password updates
//! - [`RowStore`] - generic CRUD over JSON rows
//! - [`ObjectStorage`] - file uploads and public URLs
//! - [`Procedures`] - privileged procedures and side-channel notifications
//!
//! [`RemoteStore`] is implemented for every type that provides all four, so
//! services hold an `Arc<dyn RemoteStore>` and stay independent of the
//! backend. [`MemoryStore`] is the in-process implementation.
//!
//! Every failure is a [`StoreError`] whose `Display` is the backend's own
//! human-readable message, so callers can surface it verbatim.

mod memory;
mod query;
mod table;

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;

pub use memory::MemoryStore;
pub use query::{Filter, Query, Sort};
pub use table::Table;

use crate::{Email, OrderId, Price, UserId};

/// Errors returned by the remote store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The request never produced a response (network, timeout, TLS).
    #[error("{0}")]
    Transport(String),

    /// The backend answered with an error.
    #[error("{message}")]
    Api {
        /// HTTP-like status code.
        status: u16,
        /// Backend message, shown verbatim.
        message: String,
    },

    /// Credentials were rejected.
    #[error("{0}")]
    Auth(String),

    /// The operation needs a signed-in principal.
    #[error("not authenticated")]
    NotAuthenticated,

    /// The targeted row does not exist.
    #[error("no row {id} in {collection}")]
    NotFound {
        /// Collection name.
        collection: String,
        /// Row ID.
        id: String,
    },

    /// The response could not be decoded into the expected shape.
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// An authenticated identity issued by the remote store.
#[derive(Debug, Clone)]
pub struct Principal {
    /// Identity ID (also the profile ID).
    pub id: UserId,
    /// Sign-in email.
    pub email: Email,
    /// Raw session token. Redacted in `Debug`.
    pub access_token: SecretString,
}

/// Push notification of a session change.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A principal signed in.
    SignedIn(Principal),
    /// The current principal's token was refreshed.
    TokenRefreshed(Principal),
    /// The session ended (sign-out or expiry).
    SignedOut,
}

/// Profile metadata attached to a new identity at sign-up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignUpMetadata {
    pub first_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// Events sent to the administrators' notification side channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AdminNotification {
    /// A member registered.
    NewMember {
        email: Email,
        first_name: String,
        last_name: String,
    },
    /// A merchandise order was placed.
    OrderPlaced {
        order_id: OrderId,
        user_id: UserId,
        total_amount: Price,
    },
}

/// Authentication and session tracking.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// The current session, if any.
    async fn current_session(&self) -> StoreResult<Option<Principal>>;

    /// Subscribe to session changes.
    fn subscribe(&self) -> broadcast::Receiver<SessionEvent>;

    /// Verify credentials and open a session.
    async fn sign_in_with_password(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> StoreResult<Principal>;

    /// Register a new identity with profile metadata.
    async fn sign_up(
        &self,
        email: &Email,
        password: &SecretString,
        metadata: &SignUpMetadata,
    ) -> StoreResult<UserId>;

    /// Close the current session.
    async fn sign_out(&self) -> StoreResult<()>;

    /// Change the current principal's password.
    async fn update_password(&self, new_password: &SecretString) -> StoreResult<()>;
}

/// Generic CRUD over JSON rows.
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Rows matching `query`.
    async fn select(&self, query: &Query) -> StoreResult<Vec<Value>>;

    /// Insert rows in one request; returns the stored rows.
    async fn insert(&self, collection: &str, rows: Vec<Value>) -> StoreResult<Vec<Value>>;

    /// Apply a partial update to one row; returns the stored row.
    async fn update(&self, collection: &str, id: &str, patch: Value) -> StoreResult<Value>;

    /// Delete one row.
    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()>;
}

/// File storage.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `bytes` at `path` inside `bucket`; returns the stored path.
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> StoreResult<String>;

    /// Public URL of a stored object.
    fn public_url(&self, bucket: &str, path: &str) -> String;

    /// Delete stored objects.
    async fn remove(&self, bucket: &str, paths: &[String]) -> StoreResult<()>;
}

/// Privileged procedures and side channels.
#[async_trait]
pub trait Procedures: Send + Sync {
    /// Remove both the profile row and the backing identity of a user.
    async fn delete_user_fully(&self, user_id: UserId) -> StoreResult<()>;

    /// Fire-and-forget notification to the administrators.
    async fn notify_admin(&self, notification: &AdminNotification) -> StoreResult<()>;
}

/// The full remote store contract.
pub trait RemoteStore: AuthBackend + RowStore + ObjectStorage + Procedures {}

impl<T> RemoteStore for T where T: AuthBackend + RowStore + ObjectStorage + Procedures {}
