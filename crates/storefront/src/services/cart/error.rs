//! Cart error types.

use amicale_core::OrderId;
use amicale_core::remote::StoreError;
use thiserror::Error;

/// Errors that can occur during cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// The item could not be added as entered.
    #[error("{0}")]
    Validation(String),

    /// Checkout with no lines.
    #[error("your cart is empty")]
    EmptyCart,

    /// Checkout without a signed-in member.
    #[error("sign in to place an order")]
    AuthenticationRequired,

    /// A remote write failed; the cart is unchanged.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The order header was saved but its lines were not.
    ///
    /// The header stays in the store with no items; the cart is unchanged.
    #[error("order {order_id} was recorded without its items: {source}")]
    PartialOrder {
        /// The orphaned header.
        order_id: OrderId,
        /// Why the items were rejected.
        #[source]
        source: StoreError,
    },
}
