//! Merchandise cart.
//!
//! The cart lives on the device: lines are kept in memory, mirrored to local
//! storage after every mutation, and restored at startup. Lines are unique on
//! `(catalog_item_id, size)`; adding an existing pair increments its quantity.
//!
//! # Checkout
//!
//! Checkout writes the order in two sequential steps, the header and then all
//! items in one batch. The local cart is only cleared once both succeed. When
//! the items fail after the header was written, [`OrphanPolicy`] decides what
//! happens to the header.

mod error;

pub use error::CartError;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use amicale_core::records::{Order, OrderDraft, OrderItem, OrderItemDraft, Product};
use amicale_core::remote::{AdminNotification, RemoteStore, StoreError, Table};
use amicale_core::{LineId, OrderId, OrderStatus, Price, ProductId};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use crate::error::add_breadcrumb;
use crate::services::auth::SessionGate;
use crate::storage::{LocalStorage, StorageKey};

/// What checkout does with an order header whose items could not be saved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrphanPolicy {
    /// Leave the header in place and report [`CartError::PartialOrder`].
    #[default]
    Keep,
    /// Delete the header (best effort) and report [`CartError::Store`].
    Compensate,
}

impl OrphanPolicy {
    /// Configuration value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Keep => "keep",
            Self::Compensate => "compensate",
        }
    }
}

impl fmt::Display for OrphanPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrphanPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keep" => Ok(Self::Keep),
            "compensate" => Ok(Self::Compensate),
            other => Err(format!("unknown orphan policy '{other}' (expected keep or compensate)")),
        }
    }
}

/// An item as entered by the member, validated and ready to add.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartCandidate {
    catalog_item_id: ProductId,
    name: String,
    unit_price: Price,
    size: String,
    image_url: Option<String>,
    quantity: u32,
}

impl CartCandidate {
    /// Validate an item entered by the member.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Validation` for a blank size or a zero quantity.
    pub fn new(
        catalog_item_id: ProductId,
        name: impl Into<String>,
        unit_price: Price,
        size: impl Into<String>,
        image_url: Option<String>,
        quantity: u32,
    ) -> Result<Self, CartError> {
        let size = size.into().trim().to_string();
        if size.is_empty() {
            return Err(CartError::Validation("choose a size".to_string()));
        }
        if quantity == 0 {
            return Err(CartError::Validation(
                "quantity must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            catalog_item_id,
            name: name.into(),
            unit_price,
            size,
            image_url,
            quantity,
        })
    }

    /// Candidate for a catalog product.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Validation` when the product is not on sale, the
    /// size is not offered, or the quantity is zero.
    pub fn from_product(product: &Product, size: &str, quantity: u32) -> Result<Self, CartError> {
        if !product.is_active {
            return Err(CartError::Validation(format!(
                "{} is not on sale",
                product.name
            )));
        }
        let candidate = Self::new(
            product.id,
            product.name.clone(),
            product.price,
            size,
            product.image_url.clone(),
            quantity,
        )?;
        if !product.sizes.is_empty() && !product.offers_size(&candidate.size) {
            return Err(CartError::Validation(format!(
                "size {} is not available for {}",
                candidate.size, product.name
            )));
        }
        Ok(candidate)
    }
}

/// One cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// Device-local line ID, stable across restarts.
    pub local_id: LineId,
    pub catalog_item_id: ProductId,
    pub name: String,
    /// Price snapshot taken when the line was added.
    pub unit_price: Price,
    pub size: String,
    #[serde(default)]
    pub image_url: Option<String>,
    pub quantity: u32,
}

impl CartLine {
    /// `unit_price × quantity`.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.unit_price * self.quantity
    }

    fn same_item(&self, catalog_item_id: ProductId, size: &str) -> bool {
        self.catalog_item_id == catalog_item_id && self.size == size
    }
}

/// A successfully placed order.
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// The device's cart.
///
/// Mutations are synchronous and never fail once their input is valid; a
/// storage failure is logged and the in-memory cart stays authoritative.
pub struct CartEngine {
    store: Arc<dyn RemoteStore>,
    gate: SessionGate,
    storage: Arc<dyn LocalStorage>,
    policy: OrphanPolicy,
    lines: Vec<CartLine>,
    drawer_open: bool,
}

impl CartEngine {
    /// Restore the cart from local storage.
    ///
    /// Unreadable or corrupt content yields an empty cart. Duplicate lines in
    /// the stored snapshot are merged.
    #[must_use]
    pub fn new(
        store: Arc<dyn RemoteStore>,
        gate: SessionGate,
        storage: Arc<dyn LocalStorage>,
        policy: OrphanPolicy,
    ) -> Self {
        let lines = hydrate(storage.as_ref());
        debug!(lines = lines.len(), "Cart restored");
        Self {
            store,
            gate,
            storage,
            policy,
            lines,
            drawer_open: false,
        }
    }

    /// Current lines, in insertion order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Sum of all line totals.
    #[must_use]
    pub fn total(&self) -> Price {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// Sum of all quantities.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|line| line.quantity).sum()
    }

    /// Whether the cart drawer is shown.
    #[must_use]
    pub const fn is_drawer_open(&self) -> bool {
        self.drawer_open
    }

    pub const fn open_drawer(&mut self) {
        self.drawer_open = true;
    }

    pub const fn close_drawer(&mut self) {
        self.drawer_open = false;
    }

    /// Add an item, merging with an existing line for the same item and
    /// size. Opens the drawer.
    ///
    /// Returns the ID of the line holding the item.
    pub fn add_to_cart(&mut self, candidate: CartCandidate) -> LineId {
        let existing = self
            .lines
            .iter_mut()
            .find(|line| line.same_item(candidate.catalog_item_id, &candidate.size));

        let local_id = if let Some(line) = existing {
            line.quantity = line.quantity.saturating_add(candidate.quantity);
            line.local_id
        } else {
            let local_id = LineId::random();
            self.lines.push(CartLine {
                local_id,
                catalog_item_id: candidate.catalog_item_id,
                name: candidate.name,
                unit_price: candidate.unit_price,
                size: candidate.size,
                image_url: candidate.image_url,
                quantity: candidate.quantity,
            });
            local_id
        };

        let product_id = candidate.catalog_item_id.to_string();
        add_breadcrumb("cart", "Added to cart", Some(&[("product_id", &product_id)]));
        self.drawer_open = true;
        self.persist();
        local_id
    }

    /// Remove a line. Returns `false` if there was no such line.
    pub fn remove_from_cart(&mut self, local_id: LineId) -> bool {
        let before = self.lines.len();
        self.lines.retain(|line| line.local_id != local_id);
        let removed = self.lines.len() != before;
        if removed {
            add_breadcrumb("cart", "Removed from cart", None);
            self.persist();
        }
        removed
    }

    /// Set a line's quantity; zero removes the line.
    ///
    /// Returns `false` if there was no such line.
    pub fn update_quantity(&mut self, local_id: LineId, quantity: u32) -> bool {
        if quantity == 0 {
            return self.remove_from_cart(local_id);
        }
        let Some(line) = self.lines.iter_mut().find(|line| line.local_id == local_id) else {
            return false;
        };
        line.quantity = quantity;
        self.persist();
        true
    }

    /// Empty the cart and erase its stored snapshot.
    pub fn clear_cart(&mut self) {
        self.lines.clear();
        if let Err(e) = self.storage.remove(StorageKey::Cart) {
            warn!(error = %e, "Failed to erase stored cart");
        }
    }

    /// Place the order for the signed-in member.
    ///
    /// On success the cart is cleared and the drawer closed. On any failure
    /// the cart is left exactly as it was.
    ///
    /// # Errors
    ///
    /// - `CartError::AuthenticationRequired` when nobody is signed in
    /// - `CartError::EmptyCart` when there are no lines
    /// - `CartError::Store` when the header (or, under
    ///   [`OrphanPolicy::Compensate`], the items) could not be saved
    /// - `CartError::PartialOrder` when the items failed after the header was
    ///   saved, under [`OrphanPolicy::Keep`]
    #[instrument(skip(self), fields(lines = self.lines.len()))]
    pub async fn checkout(&mut self) -> Result<PlacedOrder, CartError> {
        let principal = self
            .gate
            .principal()
            .ok_or(CartError::AuthenticationRequired)?;
        if self.lines.is_empty() {
            return Err(CartError::EmptyCart);
        }
        add_breadcrumb("cart", "Checkout started", None);

        let orders = Table::<Order, _>::new(self.store.as_ref());
        let order = orders
            .insert(&OrderDraft {
                user_id: principal.id,
                total_amount: self.total(),
                status: OrderStatus::Pending,
            })
            .await?;

        let drafts: Vec<OrderItemDraft> = self
            .lines
            .iter()
            .map(|line| OrderItemDraft {
                order_id: order.id,
                product_id: line.catalog_item_id,
                quantity: line.quantity,
                size: line.size.clone(),
                unit_price: line.unit_price,
            })
            .collect();

        let items = match Table::<OrderItem, _>::new(self.store.as_ref())
            .insert_many(&drafts)
            .await
        {
            Ok(items) => items,
            Err(source) => return Err(self.orphaned(order.id, source).await),
        };

        self.clear_cart();
        self.drawer_open = false;
        info!(order_id = %order.id, total = %order.total_amount, "Order placed");
        add_breadcrumb("cart", "Order placed", Some(&[("order_id", &order.id.to_string())]));

        let notification = AdminNotification::OrderPlaced {
            order_id: order.id,
            user_id: principal.id,
            total_amount: order.total_amount,
        };
        if let Err(e) = self.store.notify_admin(&notification).await {
            warn!(error = %e, order_id = %order.id, "Order notification failed");
        }

        Ok(PlacedOrder { order, items })
    }

    async fn orphaned(&self, order_id: OrderId, source: StoreError) -> CartError {
        match self.policy {
            OrphanPolicy::Keep => {
                error!(order_id = %order_id, error = %source, "Order items failed, header kept");
                CartError::PartialOrder { order_id, source }
            }
            OrphanPolicy::Compensate => {
                let orders = Table::<Order, _>::new(self.store.as_ref());
                match orders.delete(order_id).await {
                    Ok(()) => warn!(order_id = %order_id, "Order items failed, header deleted"),
                    Err(e) => error!(
                        order_id = %order_id,
                        error = %e,
                        "Order items failed and the header could not be deleted"
                    ),
                }
                CartError::Store(source)
            }
        }
    }

    fn persist(&self) {
        let result = serde_json::to_string(&self.lines)
            .map_err(|e| e.to_string())
            .and_then(|json| {
                self.storage
                    .set(StorageKey::Cart, &json)
                    .map_err(|e| e.to_string())
            });
        if let Err(e) = result {
            warn!(error = %e, "Failed to save cart");
        }
    }
}

/// Read the stored snapshot, merging duplicates and dropping empty lines.
fn hydrate(storage: &dyn LocalStorage) -> Vec<CartLine> {
    let raw = match storage.get(StorageKey::Cart) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(e) => {
            warn!(error = %e, "Stored cart unreadable, starting empty");
            return Vec::new();
        }
    };
    let stored: Vec<CartLine> = match serde_json::from_str(&raw) {
        Ok(lines) => lines,
        Err(e) => {
            warn!(error = %e, "Stored cart corrupt, starting empty");
            return Vec::new();
        }
    };

    let mut lines: Vec<CartLine> = Vec::with_capacity(stored.len());
    for line in stored.into_iter().filter(|line| line.quantity > 0) {
        if let Some(existing) = lines
            .iter_mut()
            .find(|l| l.same_item(line.catalog_item_id, &line.size))
        {
            existing.quantity = existing.quantity.saturating_add(line.quantity);
        } else {
            lines.push(line);
        }
    }
    lines
}
