use crate::handlers::common::{map_service_error, success_response, validate_input};
use crate::{
    auth::{AuthRouterExt, AuthenticatedUser},
    entities::order::DeliveryWindow,
    entities::payment::PaymentProvider,
    errors::ApiError,
    services::checkout::CheckoutInput,
    AppState,
};
use axum::{
    extract::{Json, Query, State},
    routing::{get, post},
    Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

pub fn checkout_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/options", get(payment_options))
        .route("/", post(checkout))
        .with_auth()
}

#[derive(Debug, Deserialize)]
struct OptionsQuery {
    cart_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
struct CheckoutRequest {
    cart_id: Option<Uuid>,
    provider: PaymentProvider,
    #[validate(length(min = 1, max = 500))]
    delivery_address: String,
    scheduled_date: NaiveDate,
    scheduled_window: DeliveryWindow,
    notes: Option<String>,
}

/// Payment providers selectable for the current cart, with a flag when the
/// full set was offered because the sellers had no provider in common.
async fn payment_options(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
    Query(query): Query<OptionsQuery>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let options = state
        .services
        .checkout
        .allowed_providers(auth.id, query.cart_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(options))
}

async fn checkout(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
    Json(payload): Json<CheckoutRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;
    let input = CheckoutInput {
        provider: payload.provider,
        delivery_address: payload.delivery_address,
        scheduled_date: payload.scheduled_date,
        scheduled_window: payload.scheduled_window,
        notes: payload.notes,
    };
    let outcome = state
        .services
        .checkout
        .checkout(auth.id, payload.cart_id, input)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(outcome))
}
