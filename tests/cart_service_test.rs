mod common;

use common::TestApp;
use rust_decimal_macros::dec;
use sea_orm::EntityTrait;
use uuid::Uuid;

use ruralmarknet_api::entities::order::OrderStatus;
use ruralmarknet_api::entities::order_item;
use ruralmarknet_api::entities::user::UserRole;
use ruralmarknet_api::services::cart::AddOutcome;

#[tokio::test]
async fn cart_is_created_on_demand_and_reused() {
    let app = TestApp::new().await;
    let customer = app.create_user("meera", UserRole::Customer).await;

    let first = app
        .services
        .cart
        .resolve_cart(customer.id, None)
        .await
        .unwrap();
    assert_eq!(first.status, OrderStatus::Cart);

    let second = app
        .services
        .cart
        .resolve_cart(customer.id, None)
        .await
        .unwrap();
    assert_eq!(first.id, second.id);
}

#[tokio::test]
async fn stale_cart_reference_degrades_to_fresh_cart() {
    let app = TestApp::new().await;
    let customer = app.create_user("meera", UserRole::Customer).await;

    let cart = app
        .services
        .cart
        .resolve_cart(customer.id, Some(Uuid::new_v4()))
        .await
        .unwrap();
    assert_eq!(cart.status, OrderStatus::Cart);
    assert_eq!(cart.customer_id, customer.id);
}

#[tokio::test]
async fn another_customers_cart_reference_is_ignored() {
    let app = TestApp::new().await;
    let meera = app.create_user("meera", UserRole::Customer).await;
    let ravi = app.create_user("ravi", UserRole::Customer).await;

    let meeras_cart = app.services.cart.resolve_cart(meera.id, None).await.unwrap();
    let ravis_cart = app
        .services
        .cart
        .resolve_cart(ravi.id, Some(meeras_cart.id))
        .await
        .unwrap();
    assert_ne!(ravis_cart.id, meeras_cart.id);
    assert_eq!(ravis_cart.customer_id, ravi.id);
}

#[tokio::test]
async fn adding_within_stock_succeeds_in_full() {
    let app = TestApp::new().await;
    let customer = app.create_user("meera", UserRole::Customer).await;
    let farmer = app.create_user("asha", UserRole::Farmer).await;
    let product = app
        .create_product(farmer.id, "Spinach", dec!(30.00), 10)
        .await;

    let (cart, outcome) = app
        .services
        .cart
        .add_item(customer.id, None, product.id, 3)
        .await
        .unwrap();

    assert_eq!(outcome, AddOutcome::Added { quantity: 3 });
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, 3);
    assert_eq!(cart.items[0].line_total, dec!(90.00));
    assert_eq!(cart.order.total_amount, dec!(90.00));
}

#[tokio::test]
async fn adding_three_units_with_inventory_two_adds_two_with_notice() {
    let app = TestApp::new().await;
    let customer = app.create_user("meera", UserRole::Customer).await;
    let farmer = app.create_user("asha", UserRole::Farmer).await;
    let product = app
        .create_product(farmer.id, "Tomatoes", dec!(20.00), 2)
        .await;

    let (cart, outcome) = app
        .services
        .cart
        .add_item(customer.id, None, product.id, 3)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        AddOutcome::PartiallyAdded {
            requested: 3,
            added: 2
        }
    );
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, 2);
}

#[tokio::test]
async fn repeated_adds_respect_stock_already_in_cart() {
    let app = TestApp::new().await;
    let customer = app.create_user("meera", UserRole::Customer).await;
    let farmer = app.create_user("asha", UserRole::Farmer).await;
    let product = app
        .create_product(farmer.id, "Spinach", dec!(30.00), 4)
        .await;

    let (_, first) = app
        .services
        .cart
        .add_item(customer.id, None, product.id, 3)
        .await
        .unwrap();
    assert_eq!(first, AddOutcome::Added { quantity: 3 });

    let (cart, second) = app
        .services
        .cart
        .add_item(customer.id, None, product.id, 3)
        .await
        .unwrap();
    assert_eq!(
        second,
        AddOutcome::PartiallyAdded {
            requested: 3,
            added: 1
        }
    );
    assert_eq!(cart.items[0].quantity, 4);

    let (cart, third) = app
        .services
        .cart
        .add_item(customer.id, None, product.id, 1)
        .await
        .unwrap();
    assert_eq!(third, AddOutcome::OutOfStock);
    assert_eq!(cart.items[0].quantity, 4);
}

#[tokio::test]
async fn total_tracks_item_mutations() {
    let app = TestApp::new().await;
    let customer = app.create_user("meera", UserRole::Customer).await;
    let farmer = app.create_user("asha", UserRole::Farmer).await;
    let spinach = app
        .create_product(farmer.id, "Spinach", dec!(30.00), 10)
        .await;
    let milk = app.create_product(farmer.id, "Milk", dec!(55.50), 10).await;

    app.services
        .cart
        .add_item(customer.id, None, spinach.id, 2)
        .await
        .unwrap();
    let (cart, _) = app
        .services
        .cart
        .add_item(customer.id, None, milk.id, 1)
        .await
        .unwrap();
    assert_eq!(cart.order.total_amount, dec!(115.50));

    let item_id = cart
        .items
        .iter()
        .find(|i| i.product_id == spinach.id)
        .unwrap()
        .id;
    let cart = app
        .services
        .cart
        .update_item_quantity(customer.id, None, item_id, 5)
        .await
        .unwrap();
    assert_eq!(cart.order.total_amount, dec!(205.50));

    let expected: rust_decimal::Decimal = cart.items.iter().map(|i| i.line_total).sum();
    assert_eq!(cart.order.total_amount, expected);

    let cart = app
        .services
        .cart
        .remove_item(customer.id, None, item_id)
        .await
        .unwrap();
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.order.total_amount, dec!(55.50));
}

#[tokio::test]
async fn clearing_the_cart_resets_the_total() {
    let app = TestApp::new().await;
    let customer = app.create_user("meera", UserRole::Customer).await;
    let farmer = app.create_user("asha", UserRole::Farmer).await;
    let product = app
        .create_product(farmer.id, "Spinach", dec!(30.00), 10)
        .await;

    let (cart, _) = app
        .services
        .cart
        .add_item(customer.id, None, product.id, 3)
        .await
        .unwrap();
    assert_eq!(cart.order.total_amount, dec!(90.00));

    let cleared = app.services.cart.clear(customer.id, None).await.unwrap();
    assert_eq!(cleared.order.id, cart.order.id);
    assert!(cleared.items.is_empty());
    assert_eq!(cleared.order.total_amount, dec!(0.00));
}

#[tokio::test]
async fn line_items_are_timestamped_on_write() {
    let app = TestApp::new().await;
    let customer = app.create_user("meera", UserRole::Customer).await;
    let farmer = app.create_user("asha", UserRole::Farmer).await;
    let product = app
        .create_product(farmer.id, "Spinach", dec!(30.00), 10)
        .await;

    let (cart, _) = app
        .services
        .cart
        .add_item(customer.id, None, product.id, 2)
        .await
        .unwrap();
    let item = order_item::Entity::find_by_id(cart.items[0].id)
        .one(app.db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert!(item.created_at <= chrono::Utc::now());
    let first_write = item.updated_at.expect("updated_at set on insert");

    app.services
        .cart
        .update_item_quantity(customer.id, None, item.id, 5)
        .await
        .unwrap();
    let item = order_item::Entity::find_by_id(item.id)
        .one(app.db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert!(item.updated_at.unwrap() >= first_write);
}

#[tokio::test]
async fn quantity_update_is_capped_at_stock() {
    let app = TestApp::new().await;
    let customer = app.create_user("meera", UserRole::Customer).await;
    let farmer = app.create_user("asha", UserRole::Farmer).await;
    let product = app
        .create_product(farmer.id, "Spinach", dec!(30.00), 6)
        .await;

    let (cart, _) = app
        .services
        .cart
        .add_item(customer.id, None, product.id, 2)
        .await
        .unwrap();
    let cart = app
        .services
        .cart
        .update_item_quantity(customer.id, None, cart.items[0].id, 50)
        .await
        .unwrap();
    assert_eq!(cart.items[0].quantity, 6);
}

#[tokio::test]
async fn non_positive_quantity_is_rejected() {
    let app = TestApp::new().await;
    let customer = app.create_user("meera", UserRole::Customer).await;
    let farmer = app.create_user("asha", UserRole::Farmer).await;
    let product = app
        .create_product(farmer.id, "Spinach", dec!(30.00), 6)
        .await;

    let result = app
        .services
        .cart
        .add_item(customer.id, None, product.id, 0)
        .await;
    assert!(result.is_err());
}
