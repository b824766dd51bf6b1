//! Member profile records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Editable, FormDraft, ImageSlots, Record};
use crate::remote::Sort;
use crate::schema::{FieldKind, FieldSpec};
use crate::{ProfileRole, UserId};

const ROLE_CHOICES: &[&str] = &["admin", "editor", "author", "subscriber"];

/// Application profile attached one-to-one to an authenticated principal.
///
/// The profile ID is the principal's user ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    #[serde(default)]
    pub role: ProfileRole,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

const fn default_active() -> bool {
    true
}

impl Profile {
    /// A bare active profile with the given role.
    #[must_use]
    pub const fn new(id: UserId, role: ProfileRole) -> Self {
        Self {
            id,
            role,
            first_name: None,
            last_name: None,
            address: None,
            phone: None,
            email: None,
            active: true,
            created_at: None,
        }
    }

    /// "First Last", falling back to the email or the ID.
    #[must_use]
    pub fn display_name(&self) -> String {
        let name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|part| !part.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if !name.is_empty() {
            return name;
        }
        self.email.clone().unwrap_or_else(|| self.id.to_string())
    }
}

/// Editable profile fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileDraft {
    pub role: ProfileRole,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub active: bool,
}

impl Default for ProfileDraft {
    fn default() -> Self {
        Self {
            role: ProfileRole::Subscriber,
            first_name: None,
            last_name: None,
            address: None,
            phone: None,
            active: true,
        }
    }
}

impl FormDraft for ProfileDraft {}

impl Record for Profile {
    type Id = UserId;
    type Draft = ProfileDraft;

    const COLLECTION: &'static str = "profiles";
    const SORT: Sort = Sort::ascending("last_name");

    fn id(&self) -> UserId {
        self.id
    }
}

impl Editable for Profile {
    const SCHEMA: &'static [FieldSpec] = &[
        FieldSpec::required("role", FieldKind::Choice(ROLE_CHOICES)),
        FieldSpec::optional("first_name", FieldKind::Text),
        FieldSpec::optional("last_name", FieldKind::Text),
        FieldSpec::optional("address", FieldKind::LongText),
        FieldSpec::optional("phone", FieldKind::Text),
        FieldSpec::required("active", FieldKind::Boolean),
    ];
    const IMAGES: ImageSlots = ImageSlots::None;

    fn to_draft(&self) -> ProfileDraft {
        ProfileDraft {
            role: self.role,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            address: self.address.clone(),
            phone: self.phone.clone(),
            active: self.active,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_profile_defaults_when_columns_missing() {
        let id = UserId::random();
        let profile: Profile = serde_json::from_value(json!({ "id": id })).unwrap();
        assert_eq!(profile.role, ProfileRole::Subscriber);
        assert!(profile.active);
    }

    #[test]
    fn test_display_name() {
        let mut profile = Profile::new(UserId::random(), ProfileRole::Author);
        profile.email = Some("a@b.org".to_owned());
        assert_eq!(profile.display_name(), "a@b.org");

        profile.first_name = Some("Amina".to_owned());
        profile.last_name = Some("Benali".to_owned());
        assert_eq!(profile.display_name(), "Amina Benali");
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        let row = json!({ "id": UserId::random(), "role": "owner" });
        assert!(serde_json::from_value::<Profile>(row).is_err());
    }
}
