//! Access roles.
//!
//! A profile row stores a [`ProfileRole`]. The role the application acts on is
//! the derived [`Role`], which adds `Anonymous` for requests with no principal.
//! Capability checks must treat `Anonymous` as "no role" and fail closed.

use serde::{Deserialize, Serialize};

use crate::records::Profile;
use crate::remote::Principal;

/// Role stored on a member profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProfileRole {
    /// Full access, including user management and merchandise.
    Admin,
    /// Manages content, events, representatives and the lottery.
    Editor,
    /// Writes content and uploads photos.
    Author,
    /// Regular member.
    #[default]
    Subscriber,
}

impl ProfileRole {
    /// Every storable role.
    pub const ALL: [Self; 4] = [Self::Admin, Self::Editor, Self::Author, Self::Subscriber];

    /// The stored string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Editor => "editor",
            Self::Author => "author",
            Self::Subscriber => "subscriber",
        }
    }
}

impl std::fmt::Display for ProfileRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProfileRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| format!("invalid role: {s}. Valid roles: admin, editor, author, subscriber"))
    }
}

/// Role derived for the current request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Editor,
    Author,
    Subscriber,
    /// No authenticated principal.
    Anonymous,
}

impl Role {
    /// Whether this role stands for an authenticated principal.
    #[must_use]
    pub const fn is_authenticated(self) -> bool {
        !matches!(self, Self::Anonymous)
    }
}

impl From<ProfileRole> for Role {
    fn from(role: ProfileRole) -> Self {
        match role {
            ProfileRole::Admin => Self::Admin,
            ProfileRole::Editor => Self::Editor,
            ProfileRole::Author => Self::Author,
            ProfileRole::Subscriber => Self::Subscriber,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Admin => f.write_str("admin"),
            Self::Editor => f.write_str("editor"),
            Self::Author => f.write_str("author"),
            Self::Subscriber => f.write_str("subscriber"),
            Self::Anonymous => f.write_str("anonymous"),
        }
    }
}

/// Derive the effective role from an optional principal and profile.
///
/// - no principal: `Anonymous` (a stray profile is ignored)
/// - principal without a profile row: `Subscriber`
/// - otherwise: the profile's role
#[must_use]
pub fn derive_role(principal: Option<&Principal>, profile: Option<&Profile>) -> Role {
    match (principal, profile) {
        (None, _) => Role::Anonymous,
        (Some(_), None) => Role::Subscriber,
        (Some(_), Some(profile)) => profile.role.into(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;
    use crate::{Email, UserId};

    fn principal() -> Principal {
        Principal {
            id: UserId::random(),
            email: Email::parse("member@amicale.org").unwrap(),
            access_token: SecretString::from("token"),
        }
    }

    #[test]
    fn test_derive_role_without_principal_is_anonymous() {
        let profile = Profile::new(UserId::random(), ProfileRole::Admin);
        assert_eq!(derive_role(None, None), Role::Anonymous);
        assert_eq!(derive_role(None, Some(&profile)), Role::Anonymous);
    }

    #[test]
    fn test_derive_role_defaults_to_subscriber() {
        assert_eq!(derive_role(Some(&principal()), None), Role::Subscriber);
    }

    #[test]
    fn test_derive_role_uses_profile_role() {
        let principal = principal();
        let profile = Profile::new(principal.id, ProfileRole::Editor);
        assert_eq!(derive_role(Some(&principal), Some(&profile)), Role::Editor);
    }

    #[test]
    fn test_profile_role_parse() {
        assert_eq!("author".parse::<ProfileRole>().unwrap(), ProfileRole::Author);
        assert!("super_admin".parse::<ProfileRole>().is_err());
    }
}
