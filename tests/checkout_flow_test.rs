mod common;

use chrono::NaiveDate;
use common::TestApp;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

use ruralmarknet_api::entities::delivery::{self, DeliveryStatus};
use ruralmarknet_api::entities::order::{self, DeliveryWindow, OrderPaymentStatus, OrderStatus};
use ruralmarknet_api::entities::payment::{self, PaymentProvider, PaymentStatus};
use ruralmarknet_api::entities::user::UserRole;
use ruralmarknet_api::services::checkout::{CheckoutInput, CheckoutOutcome};

fn checkout_input(provider: PaymentProvider) -> CheckoutInput {
    CheckoutInput {
        provider,
        delivery_address: "14 Canal Road, Nashik".to_string(),
        scheduled_date: NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
        scheduled_window: DeliveryWindow::Morning,
        notes: None,
    }
}

#[tokio::test]
async fn empty_cart_checkout_changes_nothing() {
    let app = TestApp::new().await;
    let customer = app.create_user("meera", UserRole::Customer).await;
    let cart = app.services.cart.resolve_cart(customer.id, None).await.unwrap();

    let result = app
        .services
        .checkout
        .checkout(customer.id, None, checkout_input(PaymentProvider::Cod))
        .await;
    assert!(result.is_err());

    let reloaded = order::Entity::find_by_id(cart.id)
        .one(app.db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reloaded.status, OrderStatus::Cart);
    assert!(reloaded.delivery_address.is_none());
}

#[tokio::test]
async fn cod_checkout_confirms_immediately() {
    let app = TestApp::new().await;
    let customer = app.create_user("meera", UserRole::Customer).await;
    let farmer = app.create_user("asha", UserRole::Farmer).await;
    let product = app
        .create_product(farmer.id, "Spinach", dec!(30.00), 10)
        .await;
    app.services
        .cart
        .add_item(customer.id, None, product.id, 2)
        .await
        .unwrap();

    let outcome = app
        .services
        .checkout
        .checkout(customer.id, None, checkout_input(PaymentProvider::Cod))
        .await
        .unwrap();

    let order = match outcome {
        CheckoutOutcome::Confirmed { order } => order,
        other => panic!("expected immediate confirmation, got {other:?}"),
    };
    assert_eq!(order.status, OrderStatus::Confirmed);
    assert_eq!(order.payment_status, OrderPaymentStatus::Unpaid);
    assert_eq!(order.total_amount, dec!(60.00));

    let payments = payment::Entity::find()
        .filter(payment::Column::OrderId.eq(order.id))
        .all(app.db.as_ref())
        .await
        .unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].status, PaymentStatus::Initiated);
    assert_eq!(payments[0].provider, PaymentProvider::Cod);
    assert_eq!(payments[0].amount, dec!(60.00));
    assert_eq!(payments[0].currency, "INR");

    let deliveries = delivery::Entity::find()
        .filter(delivery::Column::OrderId.eq(order.id))
        .all(app.db.as_ref())
        .await
        .unwrap();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].status, DeliveryStatus::Pending);
}

#[tokio::test]
async fn gateway_checkout_leaves_order_pending_with_redirect() {
    let app = TestApp::new().await;
    let customer = app.create_user("meera", UserRole::Customer).await;
    let farmer = app.create_user("asha", UserRole::Farmer).await;
    let product = app
        .create_product(farmer.id, "Spinach", dec!(30.00), 10)
        .await;
    app.services
        .cart
        .add_item(customer.id, None, product.id, 1)
        .await
        .unwrap();

    let outcome = app
        .services
        .checkout
        .checkout(customer.id, None, checkout_input(PaymentProvider::Stripe))
        .await
        .unwrap();

    match outcome {
        CheckoutOutcome::RedirectToGateway {
            order,
            payment_id,
            redirect_url,
        } => {
            assert_eq!(order.status, OrderStatus::Pending);
            assert_eq!(order.payment_status, OrderPaymentStatus::Unpaid);
            assert!(redirect_url.contains("checkout.stripe.com"));
            assert_ne!(payment_id, Uuid::nil());
        }
        other => panic!("expected gateway redirect, got {other:?}"),
    }
}

#[tokio::test]
async fn provider_options_intersect_across_sellers() {
    let app = TestApp::new().await;
    let customer = app.create_user("meera", UserRole::Customer).await;
    let asha = app
        .create_user_with_methods("asha", UserRole::Farmer, Some(vec!["cod", "stripe"]))
        .await;
    let bala = app
        .create_user_with_methods("bala", UserRole::Farmer, Some(vec!["cod", "paypal"]))
        .await;
    let spinach = app.create_product(asha.id, "Spinach", dec!(30.00), 10).await;
    let milk = app.create_product(bala.id, "Milk", dec!(55.00), 10).await;

    app.services
        .cart
        .add_item(customer.id, None, spinach.id, 1)
        .await
        .unwrap();
    app.services
        .cart
        .add_item(customer.id, None, milk.id, 1)
        .await
        .unwrap();

    let options = app
        .services
        .checkout
        .allowed_providers(customer.id, None)
        .await
        .unwrap();
    assert_eq!(options.providers, vec![PaymentProvider::Cod]);
    assert!(!options.fallback_all);

    let rejected = app
        .services
        .checkout
        .checkout(customer.id, None, checkout_input(PaymentProvider::Stripe))
        .await;
    assert!(rejected.is_err());

    let accepted = app
        .services
        .checkout
        .checkout(customer.id, None, checkout_input(PaymentProvider::Cod))
        .await;
    assert!(accepted.is_ok());
}

#[tokio::test]
async fn empty_intersection_falls_back_to_all_providers() {
    let app = TestApp::new().await;
    let customer = app.create_user("meera", UserRole::Customer).await;
    let asha = app
        .create_user_with_methods("asha", UserRole::Farmer, Some(vec!["stripe"]))
        .await;
    let bala = app
        .create_user_with_methods("bala", UserRole::Farmer, Some(vec!["paypal"]))
        .await;
    let spinach = app.create_product(asha.id, "Spinach", dec!(30.00), 10).await;
    let milk = app.create_product(bala.id, "Milk", dec!(55.00), 10).await;

    app.services
        .cart
        .add_item(customer.id, None, spinach.id, 1)
        .await
        .unwrap();
    app.services
        .cart
        .add_item(customer.id, None, milk.id, 1)
        .await
        .unwrap();

    let options = app
        .services
        .checkout
        .allowed_providers(customer.id, None)
        .await
        .unwrap();
    assert_eq!(options.providers.len(), PaymentProvider::ALL.len());
    assert!(options.fallback_all);

    // Fail-open: any provider is accepted at submission.
    let outcome = app
        .services
        .checkout
        .checkout(customer.id, None, checkout_input(PaymentProvider::Cod))
        .await;
    assert!(outcome.is_ok());
}

#[tokio::test]
async fn unrestricted_sellers_allow_every_provider() {
    let app = TestApp::new().await;
    let customer = app.create_user("meera", UserRole::Customer).await;
    let farmer = app.create_user("asha", UserRole::Farmer).await;
    let product = app
        .create_product(farmer.id, "Spinach", dec!(30.00), 10)
        .await;
    app.services
        .cart
        .add_item(customer.id, None, product.id, 1)
        .await
        .unwrap();

    let options = app
        .services
        .checkout
        .allowed_providers(customer.id, None)
        .await
        .unwrap();
    assert_eq!(options.providers.len(), PaymentProvider::ALL.len());
    assert!(!options.fallback_all);
}
