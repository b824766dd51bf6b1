//! The back-office console.
//!
//! [`AdminConsole`] hands out one console per tab. Opening a tab checks the
//! session gate against the tab's allowed roles, and every remote write
//! re-checks it, so a role revoked mid-session stops further writes.
//!
//! # Tabs
//!
//! | Tab | Roles | Console |
//! |-----|-------|---------|
//! | Posts, Events | admin, editor, author | [`CollectionConsole`] |
//! | Gallery | admin, editor, author | [`GalleryConsole`] |
//! | Representatives | admin, editor | [`CollectionConsole`] |
//! | Lottery | admin, editor | [`LotteryConsole`] |
//! | Users | admin | [`UsersConsole`] |
//! | Merchandise | admin | [`CollectionConsole`] of products |
//! | Orders | admin | [`OrdersConsole`] |

mod collection;
mod gallery;
mod lottery;
mod orders;
mod upload;
mod users;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use amicale_core::Role;
use amicale_core::records::Editable;
use amicale_core::remote::RemoteStore;
use amicale_storefront::services::auth::SessionGate;

pub use collection::{CollectionConsole, SubmitOutcome};
pub use gallery::GalleryConsole;
pub use lottery::LotteryConsole;
pub use orders::{OrderDetails, OrdersConsole};
pub use upload::{IMAGES_BUCKET, ImageUpload, StoredImage, object_path_from_url};
pub use users::UsersConsole;

use crate::error::{AdminError, Result};
use crate::models::{Event, Post, Product, Representative};

// =============================================================================
// Tabs
// =============================================================================

const CONTENT_ROLES: &[Role] = &[Role::Admin, Role::Editor, Role::Author];
const MANAGER_ROLES: &[Role] = &[Role::Admin, Role::Editor];
const ADMIN_ROLES: &[Role] = &[Role::Admin];

/// A section of the back-office.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tab {
    Posts,
    Events,
    Lottery,
    Users,
    Representatives,
    Merchandise,
    Orders,
    Gallery,
}

impl Tab {
    /// Every tab, in menu order.
    pub const ALL: [Self; 8] = [
        Self::Posts,
        Self::Events,
        Self::Lottery,
        Self::Users,
        Self::Representatives,
        Self::Merchandise,
        Self::Orders,
        Self::Gallery,
    ];

    /// Roles allowed to open this tab.
    #[must_use]
    pub const fn allowed_roles(self) -> &'static [Role] {
        match self {
            Self::Posts | Self::Events | Self::Gallery => CONTENT_ROLES,
            Self::Representatives | Self::Lottery => MANAGER_ROLES,
            Self::Users | Self::Merchandise | Self::Orders => ADMIN_ROLES,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Posts => "posts",
            Self::Events => "events",
            Self::Lottery => "lottery",
            Self::Users => "users",
            Self::Representatives => "representatives",
            Self::Merchandise => "merchandise",
            Self::Orders => "orders",
            Self::Gallery => "gallery",
        }
    }
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tab {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tab| tab.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown tab: {s}"))
    }
}

// =============================================================================
// Confirmation
// =============================================================================

/// Asks the operator to confirm a destructive action.
pub trait Confirm {
    /// `true` to go ahead.
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&str) -> bool,
{
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

// =============================================================================
// Access
// =============================================================================

/// Permission check bound to one tab.
#[derive(Clone)]
pub(crate) struct Access {
    gate: SessionGate,
    tab: Tab,
}

impl Access {
    pub(crate) fn check(&self) -> Result<()> {
        if self.gate.check_permission(self.tab.allowed_roles()) {
            Ok(())
        } else {
            tracing::warn!(tab = %self.tab, role = %self.gate.role(), "Back-office access denied");
            Err(AdminError::Forbidden(self.tab))
        }
    }
}

// =============================================================================
// Console
// =============================================================================

/// Entry point of the back-office.
#[derive(Clone)]
pub struct AdminConsole {
    store: Arc<dyn RemoteStore>,
    gate: SessionGate,
}

impl AdminConsole {
    #[must_use]
    pub const fn new(store: Arc<dyn RemoteStore>, gate: SessionGate) -> Self {
        Self { store, gate }
    }

    /// Tabs the current role may open.
    #[must_use]
    pub fn available_tabs(&self) -> Vec<Tab> {
        Tab::ALL
            .into_iter()
            .filter(|tab| self.gate.check_permission(tab.allowed_roles()))
            .collect()
    }

    fn open(&self, tab: Tab) -> Result<Access> {
        let access = Access {
            gate: self.gate.clone(),
            tab,
        };
        access.check()?;
        Ok(access)
    }

    fn collection<R: Editable>(&self, tab: Tab) -> Result<CollectionConsole<R>> {
        let access = self.open(tab)?;
        Ok(CollectionConsole::new(Arc::clone(&self.store), access))
    }

    /// # Errors
    ///
    /// Returns `AdminError::Forbidden` if the current role may not open the tab.
    pub fn posts(&self) -> Result<CollectionConsole<Post>> {
        self.collection(Tab::Posts)
    }

    /// # Errors
    ///
    /// Returns `AdminError::Forbidden` if the current role may not open the tab.
    pub fn events(&self) -> Result<CollectionConsole<Event>> {
        self.collection(Tab::Events)
    }

    /// # Errors
    ///
    /// Returns `AdminError::Forbidden` if the current role may not open the tab.
    pub fn representatives(&self) -> Result<CollectionConsole<Representative>> {
        self.collection(Tab::Representatives)
    }

    /// Merchandise catalog.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::Forbidden` if the current role may not open the tab.
    pub fn products(&self) -> Result<CollectionConsole<Product>> {
        self.collection(Tab::Merchandise)
    }

    /// # Errors
    ///
    /// Returns `AdminError::Forbidden` if the current role may not open the tab.
    pub fn lottery(&self) -> Result<LotteryConsole> {
        let access = self.open(Tab::Lottery)?;
        Ok(LotteryConsole::new(Arc::clone(&self.store), access))
    }

    /// # Errors
    ///
    /// Returns `AdminError::Forbidden` if the current role may not open the tab.
    pub fn orders(&self) -> Result<OrdersConsole> {
        let access = self.open(Tab::Orders)?;
        Ok(OrdersConsole::new(Arc::clone(&self.store), access))
    }

    /// # Errors
    ///
    /// Returns `AdminError::Forbidden` if the current role may not open the tab.
    pub fn users(&self) -> Result<UsersConsole> {
        let access = self.open(Tab::Users)?;
        Ok(UsersConsole::new(Arc::clone(&self.store), access))
    }

    /// # Errors
    ///
    /// Returns `AdminError::Forbidden` if the current role may not open the tab.
    pub fn gallery(&self) -> Result<GalleryConsole> {
        let access = self.open(Tab::Gallery)?;
        Ok(GalleryConsole::new(Arc::clone(&self.store), access))
    }
}

/// Operator message for a failed operation.
fn failure_notice(error: &AdminError) -> String {
    match error {
        AdminError::Validation(errors) => format!("Please fix the form: {errors}"),
        other => format!("Error: {other}"),
    }
}


#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use amicale_core::ProfileRole;
    use amicale_core::remote::MemoryStore;

    use super::testing::console_as;
    use super::*;

    #[test]
    fn test_tab_roles() {
        assert!(Tab::Posts.allowed_roles().contains(&Role::Author));
        assert!(!Tab::Lottery.allowed_roles().contains(&Role::Author));
        assert_eq!(Tab::Orders.allowed_roles(), &[Role::Admin]);
        for tab in Tab::ALL {
            assert!(!tab.allowed_roles().contains(&Role::Anonymous));
            assert!(!tab.allowed_roles().contains(&Role::Subscriber));
        }
    }

    #[test]
    fn test_tab_parse() {
        assert_eq!("Gallery".parse::<Tab>().unwrap(), Tab::Gallery);
        assert!("settings".parse::<Tab>().is_err());
    }

    #[tokio::test]
    async fn test_anonymous_gets_nothing() {
        let store = Arc::new(MemoryStore::new());
        let gate = SessionGate::start(store.clone());
        gate.ready().await;
        let console = AdminConsole::new(store, gate);

        assert!(console.available_tabs().is_empty());
        assert!(matches!(console.posts(), Err(AdminError::Forbidden(Tab::Posts))));
    }

    #[tokio::test]
    async fn test_author_sees_content_tabs_only() {
        let (_store, _gate, console) = console_as(ProfileRole::Author).await;

        assert_eq!(
            console.available_tabs(),
            vec![Tab::Posts, Tab::Events, Tab::Gallery]
        );
        assert!(console.events().is_ok());
        assert!(matches!(console.users(), Err(AdminError::Forbidden(Tab::Users))));
        assert!(matches!(console.lottery(), Err(AdminError::Forbidden(Tab::Lottery))));
    }

    #[tokio::test]
    async fn test_admin_sees_every_tab() {
        let (_store, _gate, console) = console_as(ProfileRole::Admin).await;
        assert_eq!(console.available_tabs(), Tab::ALL.to_vec());
        assert!(console.orders().is_ok());
    }

    #[tokio::test]
    async fn test_sign_out_revokes_open_console() {
        let (_store, gate, console) = console_as(ProfileRole::Editor).await;
        let mut posts = console.posts().unwrap();

        gate.sign_out().await.unwrap();
        gate.wait_until(|s| s.principal().is_none()).await;

        assert!(matches!(posts.load().await, Err(AdminError::Forbidden(Tab::Posts))));
    }
}
