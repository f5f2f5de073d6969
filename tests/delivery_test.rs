mod common;

use chrono::NaiveDate;
use common::TestApp;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

use ruralmarknet_api::entities::delivery::{self, DeliveryStatus};
use ruralmarknet_api::entities::order::DeliveryWindow;
use ruralmarknet_api::entities::payment::PaymentProvider;
use ruralmarknet_api::entities::user::{self, UserRole};
use ruralmarknet_api::services::checkout::CheckoutInput;
use ruralmarknet_api::services::deliveries::UpdateDeliveryInput;

struct Scenario {
    customer: user::Model,
    farmer: user::Model,
    delivery: delivery::Model,
}

async fn place_order_with_delivery(app: &TestApp) -> Scenario {
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
    app.services
        .checkout
        .checkout(
            customer.id,
            None,
            CheckoutInput {
                provider: PaymentProvider::Cod,
                delivery_address: "14 Canal Road, Nashik".to_string(),
                scheduled_date: NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
                scheduled_window: DeliveryWindow::Afternoon,
                notes: None,
            },
        )
        .await
        .unwrap();

    let delivery = delivery::Entity::find()
        .one(app.db.as_ref())
        .await
        .unwrap()
        .expect("checkout should create a delivery");
    Scenario {
        customer,
        farmer,
        delivery,
    }
}

fn update(status: DeliveryStatus) -> UpdateDeliveryInput {
    UpdateDeliveryInput {
        status,
        driver_name: None,
        contact_number: None,
    }
}

#[tokio::test]
async fn assigned_farmer_can_move_delivery_forward() {
    let app = TestApp::new().await;
    let scenario = place_order_with_delivery(&app).await;
    app.services
        .deliveries
        .assign_farmer(scenario.delivery.id, Some(scenario.farmer.id))
        .await
        .unwrap();
    let actor = app.actor(&scenario.farmer);

    let updated = app
        .services
        .deliveries
        .update_status(&actor, scenario.delivery.id, update(DeliveryStatus::Scheduled))
        .await
        .unwrap();
    assert_eq!(updated.status, DeliveryStatus::Scheduled);

    let updated = app
        .services
        .deliveries
        .update_status(
            &actor,
            scenario.delivery.id,
            UpdateDeliveryInput {
                status: DeliveryStatus::InTransit,
                driver_name: Some("Kiran".to_string()),
                contact_number: Some("9876543210".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.status, DeliveryStatus::InTransit);
    assert_eq!(updated.driver_name.as_deref(), Some("Kiran"));
}

#[tokio::test]
async fn backward_transitions_are_rejected() {
    let app = TestApp::new().await;
    let scenario = place_order_with_delivery(&app).await;
    app.services
        .deliveries
        .assign_farmer(scenario.delivery.id, Some(scenario.farmer.id))
        .await
        .unwrap();
    let actor = app.actor(&scenario.farmer);

    app.services
        .deliveries
        .update_status(&actor, scenario.delivery.id, update(DeliveryStatus::InTransit))
        .await
        .unwrap();

    let rejected = app
        .services
        .deliveries
        .update_status(&actor, scenario.delivery.id, update(DeliveryStatus::Pending))
        .await;
    assert!(rejected.is_err());
}

#[tokio::test]
async fn unassigned_farmer_is_denied() {
    let app = TestApp::new().await;
    let scenario = place_order_with_delivery(&app).await;
    let other_farmer = app.create_user("bala", UserRole::Farmer).await;

    let denied = app
        .services
        .deliveries
        .update_status(
            &app.actor(&other_farmer),
            scenario.delivery.id,
            update(DeliveryStatus::Scheduled),
        )
        .await;
    assert!(denied.is_err());

    let customer_denied = app
        .services
        .deliveries
        .update_status(
            &app.actor(&scenario.customer),
            scenario.delivery.id,
            update(DeliveryStatus::Scheduled),
        )
        .await;
    assert!(customer_denied.is_err());
}

#[tokio::test]
async fn admin_can_update_any_delivery() {
    let app = TestApp::new().await;
    let scenario = place_order_with_delivery(&app).await;
    let admin = app.create_user("root", UserRole::Admin).await;

    let updated = app
        .services
        .deliveries
        .update_status(
            &app.actor(&admin),
            scenario.delivery.id,
            update(DeliveryStatus::Cancelled),
        )
        .await
        .unwrap();
    assert_eq!(updated.status, DeliveryStatus::Cancelled);

    // Terminal state: no further updates.
    let rejected = app
        .services
        .deliveries
        .update_status(
            &app.actor(&admin),
            scenario.delivery.id,
            update(DeliveryStatus::Completed),
        )
        .await;
    assert!(rejected.is_err());
}

#[tokio::test]
async fn visibility_is_scoped_to_participants() {
    let app = TestApp::new().await;
    let scenario = place_order_with_delivery(&app).await;
    app.services
        .deliveries
        .assign_farmer(scenario.delivery.id, Some(scenario.farmer.id))
        .await
        .unwrap();
    let stranger = app.create_user("ravi", UserRole::Customer).await;

    let customer_view = app
        .services
        .deliveries
        .list_for_actor(&app.actor(&scenario.customer))
        .await
        .unwrap();
    assert_eq!(customer_view.len(), 1);

    let farmer_view = app
        .services
        .deliveries
        .list_for_actor(&app.actor(&scenario.farmer))
        .await
        .unwrap();
    assert_eq!(farmer_view.len(), 1);

    let stranger_view = app
        .services
        .deliveries
        .list_for_actor(&app.actor(&stranger))
        .await
        .unwrap();
    assert!(stranger_view.is_empty());

    let denied = app
        .services
        .deliveries
        .get_delivery(&app.actor(&stranger), scenario.delivery.id)
        .await;
    assert!(denied.is_err());
}

#[tokio::test]
async fn reassignment_rejected_once_terminal() {
    let app = TestApp::new().await;
    let scenario = place_order_with_delivery(&app).await;
    let admin = app.create_user("root", UserRole::Admin).await;

    app.services
        .deliveries
        .update_status(
            &app.actor(&admin),
            scenario.delivery.id,
            update(DeliveryStatus::Cancelled),
        )
        .await
        .unwrap();

    let rejected = app
        .services
        .deliveries
        .assign_farmer(scenario.delivery.id, Some(Uuid::new_v4()))
        .await;
    assert!(rejected.is_err());
}
