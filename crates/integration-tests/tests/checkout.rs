//! Checkout from the member's side, then order handling from the back-office.

use amicale_core::remote::{AdminNotification, StoreError};
use amicale_core::{OrderStatus, Price, ProfileRole};
use amicale_integration_tests::World;
use amicale_storefront::services::cart::{CartCandidate, CartError, OrphanPolicy};

// =============================================================================
// Placing orders
// =============================================================================

#[tokio::test]
async fn test_checkout_then_admin_marks_order_paid() {
    let world = World::new().await;
    let sweat = world.seed_product("Sweat Amicale", "25.00", &["S", "M", "L"]);
    let mug = world.seed_product("Mug", "8.50", &["Unique"]);
    let member = world.signed_in_as("adherent", ProfileRole::Subscriber).await;

    let mut cart = world.state.cart();
    cart.add_to_cart(CartCandidate::from_product(&sweat, "M", 2).unwrap());
    cart.add_to_cart(CartCandidate::from_product(&mug, "Unique", 1).unwrap());
    assert_eq!(cart.total(), Price::parse("58.50").unwrap());

    let placed = cart.checkout().await.unwrap();

    assert_eq!(placed.order.user_id, member);
    assert_eq!(placed.order.status, OrderStatus::Pending);
    assert_eq!(placed.order.total_amount, Price::parse("58.50").unwrap());
    assert_eq!(placed.items.len(), 2);
    assert!(cart.lines().is_empty());
    assert!(world.state.cart().lines().is_empty(), "stored cart is cleared too");
    assert!(world.store.notifications().iter().any(|n| matches!(
        n,
        AdminNotification::OrderPlaced { order_id, .. } if *order_id == placed.order.id
    )));

    world.sign_out().await;
    world.signed_in_as("tresorier", ProfileRole::Admin).await;
    let mut orders = world.console().orders().unwrap();
    let listed = orders.load().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].items.len(), 2);
    assert_eq!(listed[0].customer.as_deref(), Some("adherent@amicale.org"));

    let updated = orders
        .set_status(placed.order.id, OrderStatus::Paid)
        .await
        .unwrap();

    assert_eq!(updated.status, OrderStatus::Paid);
    assert_eq!(orders.orders()[0].order.status, OrderStatus::Paid);
    assert_eq!(world.store.rows("orders")[0]["status"], "paid");
}

#[tokio::test]
async fn test_checkout_requires_sign_in() {
    let world = World::new().await;
    let sweat = world.seed_product("Sweat Amicale", "25.00", &["M"]);
    let mut cart = world.state.cart();
    cart.add_to_cart(CartCandidate::from_product(&sweat, "M", 1).unwrap());

    let result = cart.checkout().await;

    assert!(matches!(result, Err(CartError::AuthenticationRequired)));
    assert_eq!(cart.lines().len(), 1);
    assert!(world.store.rows("orders").is_empty());
}

#[tokio::test]
async fn test_cart_survives_restart() {
    let world = World::new().await;
    let sweat = world.seed_product("Sweat Amicale", "25.00", &["M"]);
    {
        let mut cart = world.state.cart();
        cart.add_to_cart(CartCandidate::from_product(&sweat, "M", 3).unwrap());
    }

    let restored = world.state.cart();

    assert_eq!(restored.lines().len(), 1);
    assert_eq!(restored.item_count(), 3);
}

// =============================================================================
// Item write failures
// =============================================================================

#[tokio::test]
async fn test_keep_policy_leaves_header_and_cart() {
    let world = World::with_policy(OrphanPolicy::Keep).await;
    let sweat = world.seed_product("Sweat Amicale", "25.00", &["M"]);
    world.signed_in_as("adherent", ProfileRole::Subscriber).await;
    world.store.fail_writes("order_items", "insert rejected");

    let mut cart = world.state.cart();
    cart.add_to_cart(CartCandidate::from_product(&sweat, "M", 1).unwrap());
    let result = cart.checkout().await;

    let Err(CartError::PartialOrder { order_id, source }) = result else {
        panic!("expected a partial order, got {result:?}");
    };
    assert!(matches!(source, StoreError::Api { status: 500, .. }));
    assert_eq!(world.store.rows("orders").len(), 1);
    assert_eq!(world.store.rows("orders")[0]["id"], order_id.to_string());
    assert_eq!(cart.lines().len(), 1);
}

#[tokio::test]
async fn test_compensate_policy_removes_header() {
    let world = World::with_policy(OrphanPolicy::Compensate).await;
    let sweat = world.seed_product("Sweat Amicale", "25.00", &["M"]);
    world.signed_in_as("adherent", ProfileRole::Subscriber).await;
    world.store.fail_writes("order_items", "insert rejected");

    let mut cart = world.state.cart();
    cart.add_to_cart(CartCandidate::from_product(&sweat, "M", 1).unwrap());
    let result = cart.checkout().await;

    assert!(matches!(result, Err(CartError::Store(_))));
    assert!(world.store.rows("orders").is_empty());
    assert_eq!(cart.lines().len(), 1);
}
