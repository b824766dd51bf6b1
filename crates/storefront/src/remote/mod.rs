//! HTTP client for the hosted backend.
//!
//! Implements the remote store contract over the backend's REST surface:
//!
//! - Auth: `/auth/v1/token`, `/auth/v1/signup`, `/auth/v1/logout`, `/auth/v1/user`
//! - Rows: `/rest/v1/{collection}` with PostgREST filters
//! - Storage: `/storage/v1/object/{bucket}/{path}`
//! - Procedures: `/rest/v1/rpc/delete_user_fully`, `/functions/v1/notify-admin`
//!
//! # Authentication
//!
//! Every request carries the `apikey` header. The bearer token is the session
//! token when signed in, the anon key otherwise. The session is cached in
//! memory and refreshed automatically when it expires.

mod wire;

use std::sync::Arc;

use amicale_core::remote::{
    AdminNotification, AuthBackend, ObjectStorage, Principal, Procedures, Query, RowStore,
    SessionEvent, SignUpMetadata, StoreError, StoreResult,
};
use amicale_core::{Email, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Method, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::StorefrontConfig;
use wire::{SignUpResponse, TokenResponse, apply_query, error_message};

const EVENT_CAPACITY: usize = 32;

/// Remote store client over HTTP.
#[derive(Clone)]
pub struct RestClient {
    inner: Arc<RestClientInner>,
}

struct RestClientInner {
    client: reqwest::Client,
    base_url: Url,
    anon_key: SecretString,
    /// In-memory session cache
    session: RwLock<Option<Session>>,
    events: broadcast::Sender<SessionEvent>,
}

#[derive(Clone)]
struct Session {
    principal: Principal,
    refresh_token: Option<SecretString>,
    expires_at: Option<DateTime<Utc>>,
}

impl Session {
    fn from_token(token: TokenResponse, fallback_email: Option<&Email>) -> StoreResult<Self> {
        let email = match (token.user.email.as_deref(), fallback_email) {
            (Some(email), _) => Email::parse(email).map_err(|e| StoreError::Decode(e.to_string()))?,
            (None, Some(email)) => email.clone(),
            (None, None) => {
                return Err(StoreError::Decode("session has no email".to_string()));
            }
        };
        let expires_at = token.expires_at(Utc::now());
        Ok(Self {
            principal: Principal {
                id: token.user.id,
                email,
                access_token: SecretString::from(token.access_token),
            },
            refresh_token: token.refresh_token.map(SecretString::from),
            expires_at,
        })
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Utc::now())
    }
}

fn transport(e: &reqwest::Error) -> StoreError {
    StoreError::Transport(e.to_string())
}

impl RestClient {
    /// Create a client for the configured backend.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Transport` if the HTTP client cannot be built.
    pub fn new(config: &StorefrontConfig) -> StoreResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| transport(&e))?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(Self {
            inner: Arc::new(RestClientInner {
                client,
                base_url: config.remote_url.clone(),
                anon_key: config.anon_key.clone(),
                session: RwLock::new(None),
                events,
            }),
        })
    }

    /// Absolute URL of an endpoint path.
    fn endpoint(&self, path: &str) -> StoreResult<Url> {
        let base = self.inner.base_url.as_str().trim_end_matches('/');
        Url::parse(&format!("{base}/{}", path.trim_start_matches('/')))
            .map_err(|e| StoreError::Transport(format!("invalid endpoint {path}: {e}")))
    }

    /// Request with the `apikey` header and the current bearer token.
    async fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let bearer = match self.live_session().await {
            Some(session) => session.principal.access_token,
            None => self.inner.anon_key.clone(),
        };
        self.inner
            .client
            .request(method, url)
            .header("apikey", self.inner.anon_key.expose_secret())
            .bearer_auth(bearer.expose_secret())
    }

    /// Send a request, turning non-success responses into `StoreError::Api`.
    async fn send(&self, request: RequestBuilder) -> StoreResult<Response> {
        let response = request.send().await.map_err(|e| transport(&e))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let fallback = status.canonical_reason().unwrap_or("request failed");
        Err(StoreError::Api {
            status: status.as_u16(),
            message: error_message(&body, fallback),
        })
    }

    async fn json<T: serde::de::DeserializeOwned>(response: Response) -> StoreResult<T> {
        let bytes = response.bytes().await.map_err(|e| transport(&e))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// The cached session, refreshed first if it has expired.
    ///
    /// An expired session that cannot be refreshed is dropped and reported
    /// as a sign-out.
    async fn live_session(&self) -> Option<Session> {
        let session = self.inner.session.read().await.clone()?;
        if !session.is_expired() {
            return Some(session);
        }
        match self.refresh(&session).await {
            Ok(refreshed) => Some(refreshed),
            Err(e) => {
                warn!(error = %e, "Session refresh failed, signing out");
                *self.inner.session.write().await = None;
                self.publish(SessionEvent::SignedOut);
                None
            }
        }
    }

    #[instrument(skip(self, session), fields(user_id = %session.principal.id))]
    async fn refresh(&self, session: &Session) -> StoreResult<Session> {
        let refresh_token = session
            .refresh_token
            .as_ref()
            .ok_or_else(|| StoreError::Auth("session expired".to_string()))?;
        let mut url = self.endpoint("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", "refresh_token");

        let request = self
            .inner
            .client
            .post(url)
            .header("apikey", self.inner.anon_key.expose_secret())
            .json(&json!({ "refresh_token": refresh_token.expose_secret() }));
        let token: TokenResponse = Self::json(self.send(request).await?).await?;
        let refreshed = Session::from_token(token, Some(&session.principal.email))?;

        *self.inner.session.write().await = Some(refreshed.clone());
        self.publish(SessionEvent::TokenRefreshed(refreshed.principal.clone()));
        debug!("Session refreshed");
        Ok(refreshed)
    }

    fn publish(&self, event: SessionEvent) {
        // No subscribers is not an error.
        let _ = self.inner.events.send(event);
    }

    fn storage_path(bucket: &str, path: &str) -> String {
        format!("storage/v1/object/{bucket}/{}", path.trim_start_matches('/'))
    }
}

#[async_trait]
impl AuthBackend for RestClient {
    async fn current_session(&self) -> StoreResult<Option<Principal>> {
        Ok(self.live_session().await.map(|session| session.principal))
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    #[instrument(skip(self, password))]
    async fn sign_in_with_password(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> StoreResult<Principal> {
        let mut url = self.endpoint("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", "password");
        let request = self
            .inner
            .client
            .post(url)
            .header("apikey", self.inner.anon_key.expose_secret())
            .json(&json!({
                "email": email.as_str(),
                "password": password.expose_secret(),
            }));

        let response = match self.send(request).await {
            Ok(response) => response,
            Err(StoreError::Api { status, message }) if status == 400 || status == 401 => {
                return Err(StoreError::Auth(message));
            }
            Err(e) => return Err(e),
        };
        let token: TokenResponse = Self::json(response).await?;
        let session = Session::from_token(token, Some(email))?;
        let principal = session.principal.clone();

        *self.inner.session.write().await = Some(session);
        self.publish(SessionEvent::SignedIn(principal.clone()));
        Ok(principal)
    }

    #[instrument(skip(self, password, metadata))]
    async fn sign_up(
        &self,
        email: &Email,
        password: &SecretString,
        metadata: &SignUpMetadata,
    ) -> StoreResult<UserId> {
        let url = self.endpoint("auth/v1/signup")?;
        let request = self
            .inner
            .client
            .post(url)
            .header("apikey", self.inner.anon_key.expose_secret())
            .json(&json!({
                "email": email.as_str(),
                "password": password.expose_secret(),
                "data": metadata,
            }));
        let created: SignUpResponse = Self::json(self.send(request).await?).await?;
        Ok(created.user_id())
    }

    #[instrument(skip(self))]
    async fn sign_out(&self) -> StoreResult<()> {
        let session = self.inner.session.write().await.take();
        let Some(session) = session else {
            return Ok(());
        };
        self.publish(SessionEvent::SignedOut);

        let url = self.endpoint("auth/v1/logout")?;
        let request = self
            .inner
            .client
            .post(url)
            .header("apikey", self.inner.anon_key.expose_secret())
            .bearer_auth(session.principal.access_token.expose_secret());
        self.send(request).await?;
        Ok(())
    }

    #[instrument(skip(self, new_password))]
    async fn update_password(&self, new_password: &SecretString) -> StoreResult<()> {
        if self.live_session().await.is_none() {
            return Err(StoreError::NotAuthenticated);
        }
        let url = self.endpoint("auth/v1/user")?;
        let request = self
            .request(Method::PUT, url)
            .await
            .json(&json!({ "password": new_password.expose_secret() }));
        self.send(request).await?;
        Ok(())
    }
}

#[async_trait]
impl RowStore for RestClient {
    #[instrument(skip(self), fields(collection = %query.collection))]
    async fn select(&self, query: &Query) -> StoreResult<Vec<Value>> {
        let mut url = self.endpoint(&format!("rest/v1/{}", query.collection))?;
        apply_query(&mut url, query);
        let response = self.send(self.request(Method::GET, url).await).await?;
        Self::json(response).await
    }

    #[instrument(skip(self, rows), fields(rows = rows.len()))]
    async fn insert(&self, collection: &str, rows: Vec<Value>) -> StoreResult<Vec<Value>> {
        let url = self.endpoint(&format!("rest/v1/{collection}"))?;
        let request = self
            .request(Method::POST, url)
            .await
            .header("Prefer", "return=representation")
            .json(&rows);
        Self::json(self.send(request).await?).await
    }

    #[instrument(skip(self, patch))]
    async fn update(&self, collection: &str, id: &str, patch: Value) -> StoreResult<Value> {
        let mut url = self.endpoint(&format!("rest/v1/{collection}"))?;
        url.query_pairs_mut().append_pair("id", &format!("eq.{id}"));
        let request = self
            .request(Method::PATCH, url)
            .await
            .header("Prefer", "return=representation")
            .json(&patch);
        let rows: Vec<Value> = Self::json(self.send(request).await?).await?;
        rows.into_iter().next().ok_or_else(|| StoreError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        })
    }

    #[instrument(skip(self))]
    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        let mut url = self.endpoint(&format!("rest/v1/{collection}"))?;
        url.query_pairs_mut().append_pair("id", &format!("eq.{id}"));
        self.send(self.request(Method::DELETE, url).await).await?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStorage for RestClient {
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> StoreResult<String> {
        let url = self.endpoint(&Self::storage_path(bucket, path))?;
        let request = self
            .request(Method::POST, url)
            .await
            .header("Content-Type", content_type)
            .header("x-upsert", "false")
            .body(bytes);
        self.send(request).await?;
        Ok(path.to_string())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        let base = self.inner.base_url.as_str().trim_end_matches('/');
        format!(
            "{base}/storage/v1/object/public/{bucket}/{}",
            path.trim_start_matches('/')
        )
    }

    #[instrument(skip(self, paths), fields(count = paths.len()))]
    async fn remove(&self, bucket: &str, paths: &[String]) -> StoreResult<()> {
        let url = self.endpoint(&format!("storage/v1/object/{bucket}"))?;
        let request = self
            .request(Method::DELETE, url)
            .await
            .json(&json!({ "prefixes": paths }));
        self.send(request).await?;
        Ok(())
    }
}

#[async_trait]
impl Procedures for RestClient {
    #[instrument(skip(self))]
    async fn delete_user_fully(&self, user_id: UserId) -> StoreResult<()> {
        let url = self.endpoint("rest/v1/rpc/delete_user_fully")?;
        let request = self
            .request(Method::POST, url)
            .await
            .json(&json!({ "user_id": user_id }));
        self.send(request).await?;
        Ok(())
    }

    #[instrument(skip(self, notification))]
    async fn notify_admin(&self, notification: &AdminNotification) -> StoreResult<()> {
        let url = self.endpoint("functions/v1/notify-admin")?;
        let request = self
            .request(Method::POST, url)
            .await
            .json(notification);
        self.send(request).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::services::cart::OrphanPolicy;

    fn rest_client(base: &str) -> RestClient {
        let config = StorefrontConfig {
            remote_url: Url::parse(base).unwrap(),
            anon_key: SecretString::from("anon"),
            data_dir: ".amicale".into(),
            orphan_policy: OrphanPolicy::Keep,
            http_timeout: Duration::from_secs(5),
            sentry_dsn: None,
            sentry_environment: None,
        };
        RestClient::new(&config).unwrap()
    }

    #[test]
    fn test_endpoint_joins_paths() {
        let client = rest_client("https://abc.supabase.co/");
        assert_eq!(
            client.endpoint("rest/v1/posts").unwrap().as_str(),
            "https://abc.supabase.co/rest/v1/posts"
        );

        let proxied = rest_client("http://localhost:8000/backend");
        assert_eq!(
            proxied.endpoint("/auth/v1/token").unwrap().as_str(),
            "http://localhost:8000/backend/auth/v1/token"
        );
    }

    #[test]
    fn test_public_url() {
        let client = rest_client("https://abc.supabase.co");
        assert_eq!(
            client.public_url("images", "gallery/a.png"),
            "https://abc.supabase.co/storage/v1/object/public/images/gallery/a.png"
        );
    }

    #[tokio::test]
    async fn test_no_session_initially() {
        let client = rest_client("https://abc.supabase.co");
        assert!(client.current_session().await.unwrap().is_none());
        assert_eq!(
            client.update_password(&SecretString::from("newpassword")).await,
            Err(StoreError::NotAuthenticated)
        );
        // Signing out without a session makes no request
        assert!(client.sign_out().await.is_ok());
    }

    #[tokio::test]
    async fn test_expired_session_without_refresh_token_signs_out() {
        let client = rest_client("https://abc.supabase.co");
        let mut events = client.subscribe();
        *client.inner.session.write().await = Some(Session {
            principal: Principal {
                id: UserId::random(),
                email: Email::parse("m@amicale.org").unwrap(),
                access_token: SecretString::from("t"),
            },
            refresh_token: None,
            expires_at: Some(Utc::now() - chrono::Duration::seconds(1)),
        });

        assert!(client.current_session().await.unwrap().is_none());
        assert!(matches!(events.recv().await.unwrap(), SessionEvent::SignedOut));
    }
}
