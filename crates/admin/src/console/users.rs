//! The users tab.
//!
//! Role and activation toggles are applied to the local list before the
//! store answers, so the operator sees the change at once. A rejected write
//! puts the previous value back; an accepted one is followed by a full
//! reload so the list matches the store.

use std::sync::Arc;

use amicale_core::records::Profile;
use amicale_core::remote::{RemoteStore, Table};
use amicale_core::{ProfileRole, UserId};
use serde_json::{Value, json};
use tracing::instrument;

use super::{Access, Confirm, failure_notice};
use crate::error::{AdminError, Result};

pub struct UsersConsole {
    store: Arc<dyn RemoteStore>,
    access: Access,
    users: Vec<Profile>,
    notice: Option<String>,
}

impl UsersConsole {
    pub(crate) fn new(store: Arc<dyn RemoteStore>, access: Access) -> Self {
        Self {
            store,
            access,
            users: Vec::new(),
            notice: None,
        }
    }

    fn table(&self) -> Table<'_, Profile, dyn RemoteStore> {
        Table::new(self.store.as_ref())
    }

    #[must_use]
    pub fn users(&self) -> &[Profile] {
        &self.users
    }

    #[must_use]
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// Fetch every profile.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::Forbidden` or the store error.
    #[instrument(skip(self))]
    pub async fn load(&mut self) -> Result<&[Profile]> {
        self.access.check()?;
        let listed = self.table().list().await;
        match listed {
            Ok(users) => {
                self.users = users;
                Ok(&self.users)
            }
            Err(e) => Err(self.fail(e.into())),
        }
    }

    /// Change a member's role.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::UnknownRecord` if the user is not loaded,
    /// `AdminError::Forbidden`, or the store error (after reverting).
    #[instrument(skip(self), fields(user_id = %id, role = %role))]
    pub async fn set_role(&mut self, id: UserId, role: ProfileRole) -> Result<()> {
        self.toggle(
            id,
            |p| std::mem::replace(&mut p.role, role),
            |p, old| p.role = old,
            json!({ "role": role }),
        )
        .await?;
        self.notice = Some(format!("Role changed to {role}."));
        Ok(())
    }

    /// Activate or deactivate a member.
    ///
    /// # Errors
    ///
    /// Same as [`set_role`](Self::set_role).
    #[instrument(skip(self), fields(user_id = %id))]
    pub async fn set_active(&mut self, id: UserId, active: bool) -> Result<()> {
        self.toggle(
            id,
            |p| std::mem::replace(&mut p.active, active),
            |p, old| p.active = old,
            json!({ "active": active }),
        )
        .await?;
        self.notice = Some(if active { "Member activated." } else { "Member deactivated." }.to_owned());
        Ok(())
    }

    /// Optimistic update of one profile field.
    async fn toggle<T>(
        &mut self,
        id: UserId,
        apply: impl FnOnce(&mut Profile) -> T,
        revert: impl FnOnce(&mut Profile, T),
        patch: Value,
    ) -> Result<()> {
        self.access.check()?;
        let profile = self
            .users
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| AdminError::UnknownRecord(id.to_string()))?;
        let previous = apply(profile);

        let patched = self.table().patch(id, patch).await;
        if let Err(e) = patched {
            if let Some(profile) = self.users.iter_mut().find(|p| p.id == id) {
                revert(profile, previous);
            }
            tracing::warn!(user_id = %id, error = %e, "Profile update rejected, reverted");
            return Err(self.fail(e.into()));
        }

        let listed = self.table().list().await;
        match listed {
            Ok(users) => self.users = users,
            Err(e) => tracing::warn!(error = %e, "Reload after profile update failed"),
        }
        Ok(())
    }

    /// Delete a member: profile row and identity.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::Cancelled` if the operator declines,
    /// `AdminError::Forbidden`, or the store error.
    #[instrument(skip(self, confirm), fields(user_id = %id))]
    pub async fn delete(&mut self, id: UserId, confirm: &impl Confirm) -> Result<()> {
        self.access.check()?;
        let name = self
            .users
            .iter()
            .find(|p| p.id == id)
            .map_or_else(|| id.to_string(), Profile::display_name);
        if !confirm.confirm(&format!("Delete {name} and their account?")) {
            return Err(AdminError::Cancelled);
        }

        let deleted = self.store.delete_user_fully(id).await;
        if let Err(e) = deleted {
            return Err(self.fail(e.into()));
        }
        tracing::info!(user_id = %id, "Member deleted");
        self.notice = Some(format!("{name} deleted."));

        let listed = self.table().list().await;
        match listed {
            Ok(users) => self.users = users,
            Err(e) => {
                tracing::warn!(error = %e, "Reload after member deletion failed");
                self.users.retain(|p| p.id != id);
            }
        }
        Ok(())
    }

    fn fail(&mut self, error: AdminError) -> AdminError {
        error.capture();
        self.notice = Some(failure_notice(&error));
        error
    }
}
