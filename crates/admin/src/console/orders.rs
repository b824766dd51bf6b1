//! The orders tab.

use std::collections::HashMap;
use std::sync::Arc;

use amicale_core::records::{Order, OrderItem, Profile};
use amicale_core::remote::{RemoteStore, StoreResult, Table};
use amicale_core::{OrderId, OrderStatus, UserId};
use serde_json::json;
use tracing::instrument;

use super::{Access, failure_notice};
use crate::error::{AdminError, Result};

/// An order with its lines and the customer's name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDetails {
    pub order: Order,
    pub items: Vec<OrderItem>,
    /// Display name from the customer's profile, when it could be read.
    pub customer: Option<String>,
}

pub struct OrdersConsole {
    store: Arc<dyn RemoteStore>,
    access: Access,
    orders: Vec<OrderDetails>,
    notice: Option<String>,
}

impl OrdersConsole {
    pub(crate) fn new(store: Arc<dyn RemoteStore>, access: Access) -> Self {
        Self {
            store,
            access,
            orders: Vec::new(),
            notice: None,
        }
    }

    /// Orders as last loaded, newest first.
    #[must_use]
    pub fn orders(&self) -> &[OrderDetails] {
        &self.orders
    }

    #[must_use]
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// Fetch every order with its items.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::Forbidden` or the store error. A failure to read
    /// customer profiles only drops the names.
    #[instrument(skip(self))]
    pub async fn load(&mut self) -> Result<&[OrderDetails]> {
        self.access.check()?;
        let fetched = fetch_orders(self.store.as_ref()).await;
        match fetched {
            Ok(orders) => {
                self.orders = orders;
                Ok(&self.orders)
            }
            Err(e) => Err(self.fail(e.into())),
        }
    }

    /// Move an order to `status`. Any status may follow any other.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::Forbidden` or the store error; the local list is
    /// only changed once the store confirms.
    #[instrument(skip(self), fields(order_id = %order_id, status = %status))]
    pub async fn set_status(&mut self, order_id: OrderId, status: OrderStatus) -> Result<Order> {
        self.access.check()?;
        let patched = Table::<Order, _>::new(self.store.as_ref())
            .patch(order_id, json!({ "status": status }))
            .await;
        match patched {
            Ok(order) => {
                tracing::info!(order_id = %order_id, status = %status, "Order status changed");
                if let Some(details) = self.orders.iter_mut().find(|d| d.order.id == order_id) {
                    details.order = order.clone();
                }
                self.notice = Some(format!("Order marked {status}."));
                Ok(order)
            }
            Err(e) => Err(self.fail(e.into())),
        }
    }

    fn fail(&mut self, error: AdminError) -> AdminError {
        error.capture();
        self.notice = Some(failure_notice(&error));
        error
    }
}

async fn fetch_orders(store: &dyn RemoteStore) -> StoreResult<Vec<OrderDetails>> {
    let orders = Table::<Order, _>::new(store).list().await?;
    let items = Table::<OrderItem, _>::new(store).list().await?;

    let customers: HashMap<UserId, String> = match Table::<Profile, _>::new(store).list().await {
        Ok(profiles) => profiles
            .into_iter()
            .map(|p| (p.id, p.display_name()))
            .collect(),
        Err(e) => {
            tracing::warn!(error = %e, "Could not read customer profiles");
            HashMap::new()
        }
    };

    let mut by_order: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
    for item in items {
        by_order.entry(item.order_id).or_default().push(item);
    }

    Ok(orders
        .into_iter()
        .map(|order| OrderDetails {
            items: by_order.remove(&order.id).unwrap_or_default(),
            customer: customers.get(&order.user_id).cloned(),
            order,
        })
        .collect())
}
