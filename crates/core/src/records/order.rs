//! Merchandise order records.
//!
//! An order is written in two steps at checkout: the [`Order`] header first,
//! then one [`OrderItem`] per cart line. Items snapshot the unit price at the
//! time of checkout, so later catalog price changes never alter past orders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Record;
use crate::remote::Sort;
use crate::{OrderId, OrderItemId, OrderStatus, Price, ProductId, UserId};

/// Order header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub total_amount: Price,
    #[serde(default)]
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

/// Header payload written at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDraft {
    pub user_id: UserId,
    pub total_amount: Price,
    pub status: OrderStatus,
}

impl Record for Order {
    type Id = OrderId;
    type Draft = OrderDraft;

    const COLLECTION: &'static str = "orders";
    const SORT: Sort = Sort::descending("created_at");

    fn id(&self) -> OrderId {
        self.id
    }
}

/// One line of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub size: String,
    pub unit_price: Price,
}

impl OrderItem {
    /// `unit_price × quantity`.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.unit_price * self.quantity
    }
}

/// Line payload written at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItemDraft {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub size: String,
    pub unit_price: Price,
}

impl Record for OrderItem {
    type Id = OrderItemId;
    type Draft = OrderItemDraft;

    const COLLECTION: &'static str = "order_items";
    const SORT: Sort = Sort::ascending("size");

    fn id(&self) -> OrderItemId {
        self.id
    }
}
