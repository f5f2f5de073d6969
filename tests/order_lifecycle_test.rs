mod common;

use chrono::NaiveDate;
use common::TestApp;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use uuid::Uuid;

use ruralmarknet_api::entities::audit_log;
use ruralmarknet_api::entities::order::{self, DeliveryWindow, OrderStatus};
use ruralmarknet_api::entities::payment::PaymentProvider;
use ruralmarknet_api::entities::user::{self, UserRole};
use ruralmarknet_api::services::checkout::{CheckoutInput, CheckoutOutcome};
use ruralmarknet_api::services::orders::{CancelOutcome, SHIPPED_CANCEL_MESSAGE};

async fn place_order(app: &TestApp, customer: &user::Model) -> order::Model {
    let farmer = app
        .create_user(&format!("farmer-{}", Uuid::new_v4()), UserRole::Farmer)
        .await;
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
        .checkout(
            customer.id,
            None,
            CheckoutInput {
                provider: PaymentProvider::Cod,
                delivery_address: "14 Canal Road, Nashik".to_string(),
                scheduled_date: NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
                scheduled_window: DeliveryWindow::Evening,
                notes: None,
            },
        )
        .await
        .unwrap();
    match outcome {
        CheckoutOutcome::Confirmed { order } => order,
        other => panic!("expected confirmed order, got {other:?}"),
    }
}

async fn set_status(app: &TestApp, order_id: Uuid, status: OrderStatus) {
    use sea_orm::{ActiveModelTrait, Set};
    let order = order::Entity::find_by_id(order_id)
        .one(app.db.as_ref())
        .await
        .unwrap()
        .unwrap();
    let mut active: order::ActiveModel = order.into();
    active.status = Set(status);
    active.update(app.db.as_ref()).await.unwrap();
}

async fn cancel_audit_count(app: &TestApp, order_id: Uuid) -> u64 {
    audit_log::Entity::find()
        .filter(audit_log::Column::Action.eq("order.cancelled"))
        .filter(audit_log::Column::EntityId.eq(order_id))
        .count(app.db.as_ref())
        .await
        .unwrap()
}

#[tokio::test]
async fn confirmed_order_can_be_cancelled_with_audit() {
    let app = TestApp::new().await;
    let customer = app.create_user("meera", UserRole::Customer).await;
    let order = place_order(&app, &customer).await;
    let actor = app.actor(&customer);

    let outcome = app.services.orders.cancel(&actor, order.id).await.unwrap();
    let cancelled = match outcome {
        CancelOutcome::Cancelled { order } => order,
        other => panic!("expected cancellation, got {other:?}"),
    };
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(cancel_audit_count(&app, order.id).await, 1);

    let entry = audit_log::Entity::find()
        .filter(audit_log::Column::Action.eq("order.cancelled"))
        .filter(audit_log::Column::EntityId.eq(order.id))
        .one(app.db.as_ref())
        .await
        .unwrap()
        .unwrap();
    let metadata = entry.metadata.unwrap();
    assert_eq!(metadata["from"], "confirmed");
    assert_eq!(metadata["to"], "cancelled");
}

#[tokio::test]
async fn shipped_order_cancel_requires_support() {
    let app = TestApp::new().await;
    let customer = app.create_user("meera", UserRole::Customer).await;
    let order = place_order(&app, &customer).await;
    set_status(&app, order.id, OrderStatus::Shipped).await;
    let actor = app.actor(&customer);

    let outcome = app.services.orders.cancel(&actor, order.id).await.unwrap();
    match outcome {
        CancelOutcome::SupportRequired { message } => {
            assert_eq!(message, SHIPPED_CANCEL_MESSAGE);
        }
        other => panic!("expected support-required, got {other:?}"),
    }

    let reloaded = order::Entity::find_by_id(order.id)
        .one(app.db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reloaded.status, OrderStatus::Shipped);
    assert_eq!(cancel_audit_count(&app, order.id).await, 0);
}

#[tokio::test]
async fn delivered_or_cancelled_orders_are_noops() {
    let app = TestApp::new().await;
    let customer = app.create_user("meera", UserRole::Customer).await;
    let order = place_order(&app, &customer).await;
    set_status(&app, order.id, OrderStatus::Delivered).await;
    let actor = app.actor(&customer);

    let outcome = app.services.orders.cancel(&actor, order.id).await.unwrap();
    assert!(matches!(outcome, CancelOutcome::NoOp { .. }));

    set_status(&app, order.id, OrderStatus::Cancelled).await;
    let outcome = app.services.orders.cancel(&actor, order.id).await.unwrap();
    assert!(matches!(outcome, CancelOutcome::NoOp { .. }));
    assert_eq!(cancel_audit_count(&app, order.id).await, 0);
}

#[tokio::test]
async fn only_the_owner_or_admin_may_cancel() {
    let app = TestApp::new().await;
    let customer = app.create_user("meera", UserRole::Customer).await;
    let stranger = app.create_user("ravi", UserRole::Customer).await;
    let admin = app.create_user("root", UserRole::Admin).await;
    let order = place_order(&app, &customer).await;

    let denied = app
        .services
        .orders
        .cancel(&app.actor(&stranger), order.id)
        .await;
    assert!(denied.is_err());

    let allowed = app
        .services
        .orders
        .cancel(&app.actor(&admin), order.id)
        .await
        .unwrap();
    assert!(matches!(allowed, CancelOutcome::Cancelled { .. }));
}

#[tokio::test]
async fn customer_order_list_excludes_carts() {
    let app = TestApp::new().await;
    let customer = app.create_user("meera", UserRole::Customer).await;
    let order = place_order(&app, &customer).await;

    // A fresh cart after checkout must not show up as an order.
    app.services
        .cart
        .resolve_cart(customer.id, None)
        .await
        .unwrap();

    let (orders, total) = app
        .services
        .orders
        .list_for_customer(customer.id, 1, 20)
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(orders[0].id, order.id);
}

#[tokio::test]
async fn admin_can_override_status_but_not_to_cart() {
    let app = TestApp::new().await;
    let customer = app.create_user("meera", UserRole::Customer).await;
    let admin = app.create_user("root", UserRole::Admin).await;
    let order = place_order(&app, &customer).await;
    let actor = app.actor(&admin);

    let updated = app
        .services
        .orders
        .admin_update_status(&actor, order.id, OrderStatus::Shipped)
        .await
        .unwrap();
    assert_eq!(updated.status, OrderStatus::Shipped);

    let rejected = app
        .services
        .orders
        .admin_update_status(&actor, order.id, OrderStatus::Cart)
        .await;
    assert!(rejected.is_err());
}
