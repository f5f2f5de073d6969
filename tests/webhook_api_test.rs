mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::NaiveDate;
use common::TestApp;
use hmac::{Hmac, Mac};
use rust_decimal_macros::dec;
use sea_orm::EntityTrait;
use serde_json::json;
use sha2::Sha256;
use tower::ServiceExt;
use uuid::Uuid;

use ruralmarknet_api::entities::order::{DeliveryWindow, OrderPaymentStatus};
use ruralmarknet_api::entities::payment::{self, PaymentProvider, PaymentStatus};
use ruralmarknet_api::entities::user::UserRole;
use ruralmarknet_api::services::checkout::{CheckoutInput, CheckoutOutcome};

type HmacSha256 = Hmac<Sha256>;

const WEBHOOK_PATH: &str = "/api/v1/webhooks/payments";
const SECRET: &str = "whsec_test";

async fn place_gateway_order(app: &TestApp) -> (Uuid, Uuid) {
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
        .checkout(
            customer.id,
            None,
            CheckoutInput {
                provider: PaymentProvider::Stripe,
                delivery_address: "14 Canal Road, Nashik".to_string(),
                scheduled_date: NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
                scheduled_window: DeliveryWindow::Morning,
                notes: None,
            },
        )
        .await
        .unwrap();
    match outcome {
        CheckoutOutcome::RedirectToGateway {
            order, payment_id, ..
        } => (order.id, payment_id),
        other => panic!("expected gateway redirect, got {other:?}"),
    }
}

fn signed_request(body: String) -> Request<Body> {
    let ts = chrono::Utc::now().timestamp().to_string();
    let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
    mac.update(format!("{ts}.{body}").as_bytes());
    let sig = hex::encode(mac.finalize().into_bytes());

    Request::builder()
        .method("POST")
        .uri(WEBHOOK_PATH)
        .header("content-type", "application/json")
        .header("x-timestamp", ts)
        .header("x-signature", sig)
        .body(Body::from(body))
        .unwrap()
}

fn success_payload(payment_id: Uuid) -> String {
    json!({
        "type": "payment.succeeded",
        "data": { "object": {
            "id": "txn_http",
            "metadata": { "payment_id": payment_id.to_string() },
        }}
    })
    .to_string()
}

#[tokio::test]
async fn signed_webhook_marks_payment_paid() {
    let app = TestApp::new().await;
    let (order_id, payment_id) = place_gateway_order(&app).await;

    let response = app
        .router()
        .oneshot(signed_request(success_payload(payment_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let payment = payment::Entity::find_by_id(payment_id)
        .one(app.db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Success);
    assert_eq!(payment.transaction_id.as_deref(), Some("txn_http"));

    let order = ruralmarknet_api::entities::order::Entity::find_by_id(order_id)
        .one(app.db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.payment_status, OrderPaymentStatus::Paid);
}

#[tokio::test]
async fn unsigned_webhook_returns_ok_without_effects() {
    let app = TestApp::new().await;
    let (_, payment_id) = place_gateway_order(&app).await;

    let request = Request::builder()
        .method("POST")
        .uri(WEBHOOK_PATH)
        .header("content-type", "application/json")
        .body(Body::from(success_payload(payment_id)))
        .unwrap();
    let response = app.router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let payment = payment::Entity::find_by_id(payment_id)
        .one(app.db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Initiated);
}

#[tokio::test]
async fn events_are_dropped_when_no_secret_is_configured() {
    let mut config = common::test_config();
    config.payment_webhook_secret = None;
    let app = TestApp::with_config(config).await;
    let (order_id, payment_id) = place_gateway_order(&app).await;

    // A forged event with no signature at all.
    let request = Request::builder()
        .method("POST")
        .uri(WEBHOOK_PATH)
        .header("content-type", "application/json")
        .body(Body::from(success_payload(payment_id)))
        .unwrap();
    let response = app.router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let payment = payment::Entity::find_by_id(payment_id)
        .one(app.db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Initiated);

    let order = ruralmarknet_api::entities::order::Entity::find_by_id(order_id)
        .one(app.db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.payment_status, OrderPaymentStatus::Unpaid);
}

#[tokio::test]
async fn malformed_payload_still_returns_ok() {
    let app = TestApp::new().await;
    place_gateway_order(&app).await;

    let response = app
        .router()
        .oneshot(signed_request("not json at all".to_string()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn missing_correlation_key_still_returns_ok() {
    let app = TestApp::new().await;
    let (_, payment_id) = place_gateway_order(&app).await;

    let body = json!({"data": {"object": {"id": "txn_x"}}}).to_string();
    let response = app.router().oneshot(signed_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let payment = payment::Entity::find_by_id(payment_id)
        .one(app.db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Initiated);
}
