//! Request and response shapes of the hosted backend.

use amicale_core::UserId;
use amicale_core::remote::Query;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

/// Token endpoint response.
#[derive(Debug, Deserialize)]
pub(super) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    pub user: UserBody,
}

impl TokenResponse {
    /// When the access token expires, with a small safety margin.
    pub fn expires_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.expires_in
            .map(|secs| now + Duration::seconds(secs.saturating_sub(EXPIRY_MARGIN_SECS)))
    }
}

/// Seconds before the real expiry at which a token counts as expired.
const EXPIRY_MARGIN_SECS: i64 = 30;

/// Identity as returned by the auth endpoints.
#[derive(Debug, Deserialize)]
pub(super) struct UserBody {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
}

/// Sign-up response: the bare user, or a session wrapping it when the
/// backend confirms addresses automatically.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(super) enum SignUpResponse {
    Session { user: UserBody },
    User(UserBody),
}

impl SignUpResponse {
    pub fn user_id(&self) -> UserId {
        match self {
            Self::Session { user } | Self::User(user) => user.id,
        }
    }
}

/// Append the PostgREST parameters for `query` to `url`.
///
/// Equality filters become `column=eq.value` (`is.null` for null), the sort
/// becomes `order=column.asc|desc`, and the limit `limit=n`.
pub(super) fn apply_query(url: &mut Url, query: &Query) {
    let mut pairs = url.query_pairs_mut();
    pairs.append_pair("select", "*");
    for filter in &query.filters {
        let condition = match &filter.value {
            Value::Null => "is.null".to_string(),
            Value::String(s) => format!("eq.{s}"),
            other => format!("eq.{other}"),
        };
        pairs.append_pair(&filter.column, &condition);
    }
    if let Some(sort) = query.sort {
        let direction = if sort.ascending { "asc" } else { "desc" };
        pairs.append_pair("order", &format!("{}.{direction}", sort.column));
    }
    if let Some(limit) = query.limit {
        pairs.append_pair("limit", &limit.to_string());
    }
}

/// Human-readable message from an error body.
///
/// The backend's services disagree on the field name, so the first of
/// `message`, `msg`, `error_description` and `error` wins; otherwise the raw
/// body, or `fallback` for an empty body.
pub(super) fn error_message(body: &str, fallback: &str) -> String {
    if let Ok(Value::Object(object)) = serde_json::from_str::<Value>(body) {
        for key in ["message", "msg", "error_description", "error"] {
            if let Some(Value::String(message)) = object.get(key)
                && !message.trim().is_empty()
            {
                return message.clone();
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}
