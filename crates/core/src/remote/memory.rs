//! In-process remote store.
//!
//! Behaves like the hosted backend closely enough to drive every service
//! without a network: rows get a UUID `id` and a `created_at` timestamp on
//! insert, sign-up creates the matching profile row, and session changes are
//! broadcast to subscribers. Failures can be injected per collection, per
//! object path and for the notification channel.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value, json};
use tokio::sync::broadcast;
use uuid::Uuid;

use super::{
    AdminNotification, AuthBackend, ObjectStorage, Principal, Procedures, Query, RowStore,
    SessionEvent, SignUpMetadata, StoreError, StoreResult,
};
use crate::records::{Profile, Record};
use crate::{Email, ProfileRole, UserId};

const EVENT_CAPACITY: usize = 32;
const PUBLIC_URL_BASE: &str = "http://memory.localhost/storage/v1/object/public";

struct Identity {
    id: UserId,
    email: Email,
    password: SecretString,
}

#[derive(Default)]
struct State {
    rows: HashMap<String, Vec<Value>>,
    identities: Vec<Identity>,
    session: Option<Principal>,
    objects: BTreeMap<(String, String), Vec<u8>>,
    notifications: Vec<AdminNotification>,
    read_failures: HashMap<String, String>,
    write_failures: HashMap<String, String>,
    upload_failures: HashSet<String>,
    session_failure: Option<String>,
    notifications_down: bool,
}

/// In-memory [`RemoteStore`](super::RemoteStore).
pub struct MemoryStore {
    state: Mutex<State>,
    events: broadcast::Sender<SessionEvent>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// An empty store with no identities and no session.
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Mutex::new(State::default()),
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, event: SessionEvent) {
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }

    // =========================================================================
    // Fixtures
    // =========================================================================

    /// Insert a row directly, bypassing failure injection.
    ///
    /// Returns the stored row with its assigned `id` and `created_at`.
    pub fn seed(&self, collection: &str, row: Value) -> Value {
        let mut state = self.lock();
        let stored = prepare_row(row);
        state
            .rows
            .entry(collection.to_owned())
            .or_default()
            .push(stored.clone());
        stored
    }

    /// Every row of `collection`, in insertion order.
    #[must_use]
    pub fn rows(&self, collection: &str) -> Vec<Value> {
        self.lock().rows.get(collection).cloned().unwrap_or_default()
    }

    /// Create an identity and its profile with the given role.
    pub fn register_user(&self, email: &Email, password: &str, role: ProfileRole) -> UserId {
        let id = UserId::random();
        let mut state = self.lock();
        state.identities.push(Identity {
            id,
            email: email.clone(),
            password: SecretString::from(password.to_owned()),
        });
        let profile = json!({
            "id": id,
            "role": role,
            "email": email.as_str(),
            "active": true,
        });
        state
            .rows
            .entry(Profile::COLLECTION.to_owned())
            .or_default()
            .push(prepare_row(profile));
        id
    }

    /// Whether an identity with this ID exists.
    #[must_use]
    pub fn has_identity(&self, id: UserId) -> bool {
        self.lock().identities.iter().any(|i| i.id == id)
    }

    /// Notifications delivered so far.
    #[must_use]
    pub fn notifications(&self) -> Vec<AdminNotification> {
        self.lock().notifications.clone()
    }

    /// Contents of a stored object.
    #[must_use]
    pub fn object(&self, bucket: &str, path: &str) -> Option<Vec<u8>> {
        self.lock()
            .objects
            .get(&(bucket.to_owned(), path.to_owned()))
            .cloned()
    }

    /// Paths stored in `bucket`, sorted.
    #[must_use]
    pub fn object_paths(&self, bucket: &str) -> Vec<String> {
        self.lock()
            .objects
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, p)| p.clone())
            .collect()
    }

    /// End the current session from the backend side, as a token expiry would.
    pub fn expire_session(&self) {
        self.lock().session = None;
        self.publish(SessionEvent::SignedOut);
    }

    /// Issue a fresh token for the current session.
    pub fn refresh_session(&self) {
        let refreshed = {
            let mut state = self.lock();
            state.session.as_mut().map(|principal| {
                principal.access_token = new_token();
                principal.clone()
            })
        };
        if let Some(principal) = refreshed {
            self.publish(SessionEvent::TokenRefreshed(principal));
        }
    }

    // =========================================================================
    // Failure injection
    // =========================================================================

    /// Make selects on `collection` fail with `message`.
    pub fn fail_reads(&self, collection: &str, message: &str) {
        self.lock()
            .read_failures
            .insert(collection.to_owned(), message.to_owned());
    }

    /// Make inserts, updates and deletes on `collection` fail with `message`.
    pub fn fail_writes(&self, collection: &str, message: &str) {
        self.lock()
            .write_failures
            .insert(collection.to_owned(), message.to_owned());
    }

    /// Make uploads fail when the object path contains `fragment`.
    pub fn fail_uploads_matching(&self, fragment: &str) {
        self.lock().upload_failures.insert(fragment.to_owned());
    }

    /// Make session lookups fail with `message`.
    pub fn fail_session_lookup(&self, message: &str) {
        self.lock().session_failure = Some(message.to_owned());
    }

    /// Take the notification channel down (or bring it back).
    pub fn set_notifications_down(&self, down: bool) {
        self.lock().notifications_down = down;
    }

    /// Remove every injected failure.
    pub fn clear_failures(&self) {
        let mut state = self.lock();
        state.read_failures.clear();
        state.write_failures.clear();
        state.upload_failures.clear();
        state.session_failure = None;
        state.notifications_down = false;
    }
}

fn new_token() -> SecretString {
    SecretString::from(Uuid::new_v4().simple().to_string())
}

fn injected(message: &str) -> StoreError {
    StoreError::Api {
        status: 500,
        message: message.to_owned(),
    }
}

/// Assign `id` and `created_at` where the row does not carry them.
fn prepare_row(row: Value) -> Value {
    let mut object = match row {
        Value::Object(object) => object,
        other => {
            let mut object = Map::new();
            object.insert("value".to_owned(), other);
            object
        }
    };
    if object.get("id").is_none_or(Value::is_null) {
        object.insert("id".to_owned(), json!(Uuid::new_v4()));
    }
    if object.get("created_at").is_none_or(Value::is_null) {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        object.insert("created_at".to_owned(), Value::String(now));
    }
    Value::Object(object)
}

fn row_id(row: &Value) -> Option<&str> {
    row.get("id").and_then(Value::as_str)
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        // Nulls sort last.
        (None | Some(Value::Null), _) => Ordering::Greater,
        (_, None | Some(Value::Null)) => Ordering::Less,
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

#[async_trait]
impl AuthBackend for MemoryStore {
    async fn current_session(&self) -> StoreResult<Option<Principal>> {
        let state = self.lock();
        if let Some(message) = &state.session_failure {
            return Err(StoreError::Transport(message.clone()));
        }
        Ok(state.session.clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    async fn sign_in_with_password(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> StoreResult<Principal> {
        let principal = {
            let mut state = self.lock();
            let identity = state
                .identities
                .iter()
                .find(|i| {
                    &i.email == email && i.password.expose_secret() == password.expose_secret()
                })
                .ok_or_else(|| StoreError::Auth("Invalid login credentials".to_owned()))?;
            let principal = Principal {
                id: identity.id,
                email: identity.email.clone(),
                access_token: new_token(),
            };
            state.session = Some(principal.clone());
            principal
        };
        self.publish(SessionEvent::SignedIn(principal.clone()));
        Ok(principal)
    }

    async fn sign_up(
        &self,
        email: &Email,
        password: &SecretString,
        metadata: &SignUpMetadata,
    ) -> StoreResult<UserId> {
        let mut state = self.lock();
        if state.identities.iter().any(|i| &i.email == email) {
            return Err(StoreError::Api {
                status: 422,
                message: "User already registered".to_owned(),
            });
        }
        let id = UserId::random();
        state.identities.push(Identity {
            id,
            email: email.clone(),
            password: password.clone(),
        });
        let profile = json!({
            "id": id,
            "role": ProfileRole::Subscriber,
            "first_name": metadata.first_name,
            "last_name": metadata.last_name,
            "phone": metadata.phone,
            "address": metadata.address,
            "email": email.as_str(),
            "active": true,
        });
        state
            .rows
            .entry(Profile::COLLECTION.to_owned())
            .or_default()
            .push(prepare_row(profile));
        Ok(id)
    }

    async fn sign_out(&self) -> StoreResult<()> {
        self.lock().session = None;
        self.publish(SessionEvent::SignedOut);
        Ok(())
    }

    async fn update_password(&self, new_password: &SecretString) -> StoreResult<()> {
        let mut state = self.lock();
        let id = state
            .session
            .as_ref()
            .map(|p| p.id)
            .ok_or(StoreError::NotAuthenticated)?;
        if let Some(identity) = state.identities.iter_mut().find(|i| i.id == id) {
            identity.password = new_password.clone();
        }
        Ok(())
    }
}

#[async_trait]
impl RowStore for MemoryStore {
    async fn select(&self, query: &Query) -> StoreResult<Vec<Value>> {
        let state = self.lock();
        if let Some(message) = state.read_failures.get(&query.collection) {
            return Err(injected(message));
        }
        let mut rows: Vec<Value> = state
            .rows
            .get(&query.collection)
            .map(|rows| rows.iter().filter(|r| query.matches(r)).cloned().collect())
            .unwrap_or_default();
        if let Some(sort) = query.sort {
            rows.sort_by(|a, b| {
                let order = compare(a.get(sort.column), b.get(sort.column));
                if sort.ascending { order } else { order.reverse() }
            });
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn insert(&self, collection: &str, rows: Vec<Value>) -> StoreResult<Vec<Value>> {
        let mut state = self.lock();
        if let Some(message) = state.write_failures.get(collection) {
            return Err(injected(message));
        }
        let prepared: Vec<Value> = rows.into_iter().map(prepare_row).collect();

        let existing = state.rows.entry(collection.to_owned()).or_default();
        let mut seen: HashSet<&str> = existing.iter().filter_map(row_id).collect();
        for row in &prepared {
            if row_id(row).is_some_and(|id| !seen.insert(id)) {
                return Err(StoreError::Api {
                    status: 409,
                    message: format!(
                        "duplicate key value violates unique constraint \"{collection}_pkey\""
                    ),
                });
            }
        }
        existing.extend(prepared.iter().cloned());
        Ok(prepared)
    }

    async fn update(&self, collection: &str, id: &str, patch: Value) -> StoreResult<Value> {
        let mut state = self.lock();
        if let Some(message) = state.write_failures.get(collection) {
            return Err(injected(message));
        }
        let row = state
            .rows
            .get_mut(collection)
            .and_then(|rows| rows.iter_mut().find(|r| row_id(r) == Some(id)))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_owned(),
                id: id.to_owned(),
            })?;
        if let (Value::Object(target), Value::Object(changes)) = (&mut *row, patch) {
            for (key, value) in changes {
                if key != "id" {
                    target.insert(key, value);
                }
            }
        }
        Ok(row.clone())
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        let mut state = self.lock();
        if let Some(message) = state.write_failures.get(collection) {
            return Err(injected(message));
        }
        if let Some(rows) = state.rows.get_mut(collection) {
            rows.retain(|r| row_id(r) != Some(id));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStorage for MemoryStore {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> StoreResult<String> {
        let mut state = self.lock();
        if state.upload_failures.iter().any(|f| path.contains(f.as_str())) {
            return Err(StoreError::Api {
                status: 500,
                message: format!("failed to store {path}"),
            });
        }
        let key = (bucket.to_owned(), path.to_owned());
        if state.objects.contains_key(&key) {
            return Err(StoreError::Api {
                status: 409,
                message: "The resource already exists".to_owned(),
            });
        }
        state.objects.insert(key, bytes);
        Ok(path.to_owned())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{PUBLIC_URL_BASE}/{bucket}/{path}")
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> StoreResult<()> {
        let mut state = self.lock();
        for path in paths {
            state.objects.remove(&(bucket.to_owned(), path.clone()));
        }
        Ok(())
    }
}

#[async_trait]
impl Procedures for MemoryStore {
    async fn delete_user_fully(&self, user_id: UserId) -> StoreResult<()> {
        let signed_out = {
            let mut state = self.lock();
            if let Some(message) = state.write_failures.get(Profile::COLLECTION) {
                return Err(injected(message));
            }
            let before = state.identities.len();
            state.identities.retain(|i| i.id != user_id);
            if state.identities.len() == before {
                return Err(StoreError::NotFound {
                    collection: "users".to_owned(),
                    id: user_id.to_string(),
                });
            }
            let id = user_id.to_string();
            if let Some(rows) = state.rows.get_mut(Profile::COLLECTION) {
                rows.retain(|r| row_id(r) != Some(id.as_str()));
            }
            let was_current = state.session.as_ref().is_some_and(|p| p.id == user_id);
            if was_current {
                state.session = None;
            }
            was_current
        };
        if signed_out {
            self.publish(SessionEvent::SignedOut);
        }
        Ok(())
    }

    async fn notify_admin(&self, notification: &AdminNotification) -> StoreResult<()> {
        let mut state = self.lock();
        if state.notifications_down {
            return Err(StoreError::Transport(
                "notification channel unavailable".to_owned(),
            ));
        }
        state.notifications.push(notification.clone());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::remote::Sort;

    fn email(s: &str) -> Email {
        Email::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_insert_assigns_id_and_created_at() {
        let store = MemoryStore::new();
        let rows = store
            .insert("events", vec![json!({ "title": "Kermesse" })])
            .await
            .unwrap();
        assert!(rows[0]["id"].is_string());
        assert!(rows[0]["created_at"].is_string());
        assert_eq!(store.rows("events").len(), 1);
    }

    #[tokio::test]
    async fn test_select_filters_sorts_and_limits() {
        let store = MemoryStore::new();
        for (order, name) in [(3, "Chloé"), (1, "Amine"), (2, "Bruno")] {
            store.seed(
                "representatives",
                json!({ "name": name, "display_order": order, "position": "délégué" }),
            );
        }
        let query = Query::new("representatives")
            .eq("position", "délégué")
            .sort(Sort::ascending("display_order"))
            .limit(2);
        let rows = store.select(&query).await.unwrap();
        let names: Vec<_> = rows.iter().map(|r| r["name"].as_str().unwrap()).collect();
        assert_eq!(names, ["Amine", "Bruno"]);

        let query = Query::new("representatives").sort(Sort::descending("display_order"));
        let rows = store.select(&query).await.unwrap();
        assert_eq!(rows[0]["name"], "Chloé");
    }

    #[tokio::test]
    async fn test_update_merges_patch_and_keeps_id() {
        let store = MemoryStore::new();
        let row = store.seed("posts", json!({ "title": "Old", "content": "x" }));
        let id = row["id"].as_str().unwrap();

        let updated = store
            .update("posts", id, json!({ "title": "New", "id": "other" }))
            .await
            .unwrap();
        assert_eq!(updated["title"], "New");
        assert_eq!(updated["content"], "x");
        assert_eq!(updated["id"], id);
    }

    #[tokio::test]
    async fn test_update_missing_row_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .update("posts", "nope", json!({ "title": "t" }))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_duplicate_id_rejects_whole_batch() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();
        let err = store
            .insert("gallery", vec![json!({ "id": id }), json!({ "id": id })])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("duplicate key"));
        assert!(store.rows("gallery").is_empty());
    }

    #[tokio::test]
    async fn test_injected_write_failure() {
        let store = MemoryStore::new();
        store.fail_writes("order_items", "permission denied for table order_items");
        let err = store
            .insert("order_items", vec![json!({})])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "permission denied for table order_items");

        store.clear_failures();
        assert!(store.insert("order_items", vec![json!({})]).await.is_ok());
    }

    #[tokio::test]
    async fn test_sign_up_creates_profile_without_session() {
        let store = MemoryStore::new();
        let metadata = SignUpMetadata {
            first_name: "Nora".to_owned(),
            last_name: "Petit".to_owned(),
            ..SignUpMetadata::default()
        };
        let id = store
            .sign_up(
                &email("nora@amicale.org"),
                &SecretString::from("motdepasse"),
                &metadata,
            )
            .await
            .unwrap();

        assert!(store.current_session().await.unwrap().is_none());
        let profiles = store.rows("profiles");
        assert_eq!(profiles[0]["id"], id.to_string());
        assert_eq!(profiles[0]["role"], "subscriber");
        assert_eq!(profiles[0]["last_name"], "Petit");
    }

    #[tokio::test]
    async fn test_sign_up_twice_is_rejected() {
        let store = MemoryStore::new();
        let address = email("dup@amicale.org");
        let password = SecretString::from("motdepasse");
        let metadata = SignUpMetadata::default();
        store.sign_up(&address, &password, &metadata).await.unwrap();
        let err = store
            .sign_up(&address, &password, &metadata)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "User already registered");
    }

    #[tokio::test]
    async fn test_sign_in_broadcasts_and_opens_session() {
        let store = MemoryStore::new();
        let address = email("admin@amicale.org");
        let id = store.register_user(&address, "correct horse", ProfileRole::Admin);
        let mut events = store.subscribe();

        let bad = store
            .sign_in_with_password(&address, &SecretString::from("wrong"))
            .await
            .unwrap_err();
        assert_eq!(bad, StoreError::Auth("Invalid login credentials".to_owned()));

        let principal = store
            .sign_in_with_password(&address, &SecretString::from("correct horse"))
            .await
            .unwrap();
        assert_eq!(principal.id, id);
        assert!(matches!(events.recv().await.unwrap(), SessionEvent::SignedIn(p) if p.id == id));

        store.sign_out().await.unwrap();
        assert!(matches!(events.recv().await.unwrap(), SessionEvent::SignedOut));
        assert!(store.current_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_user_fully_removes_identity_and_profile() {
        let store = MemoryStore::new();
        let address = email("gone@amicale.org");
        let id = store.register_user(&address, "password1", ProfileRole::Subscriber);

        store.delete_user_fully(id).await.unwrap();
        assert!(!store.has_identity(id));
        assert!(store.rows("profiles").is_empty());
        assert!(
            store
                .sign_in_with_password(&address, &SecretString::from("password1"))
                .await
                .is_err()
        );
        assert!(store.delete_user_fully(id).await.is_err());
    }

    #[tokio::test]
    async fn test_upload_failure_by_path() {
        let store = MemoryStore::new();
        store.fail_uploads_matching("broken");
        assert!(
            store
                .upload("images", "gallery/broken.png", vec![1], "image/png")
                .await
                .is_err()
        );
        let path = store
            .upload("images", "gallery/ok.png", vec![1, 2], "image/png")
            .await
            .unwrap();
        assert_eq!(store.object("images", &path), Some(vec![1, 2]));
        assert_eq!(
            store.public_url("images", &path),
            "http://memory.localhost/storage/v1/object/public/images/gallery/ok.png"
        );

        store.remove("images", &[path]).await.unwrap();
        assert!(store.object_paths("images").is_empty());
    }

    #[tokio::test]
    async fn test_notifications_can_go_down() {
        let store = MemoryStore::new();
        let notification = AdminNotification::NewMember {
            email: email("x@amicale.org"),
            first_name: "X".to_owned(),
            last_name: "Y".to_owned(),
        };
        store.set_notifications_down(true);
        assert!(store.notify_admin(&notification).await.is_err());
        store.set_notifications_down(false);
        store.notify_admin(&notification).await.unwrap();
        assert_eq!(store.notifications(), vec![notification]);
    }
}
