use crate::handlers::common::{map_service_error, success_response};
use crate::{
    auth::{AuthRouterExt, AuthenticatedUser},
    errors::ApiError,
    AppState,
};
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use uuid::Uuid;

pub fn payment_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders/:id/pay", post(initiate_payment))
        .route("/payments/:id", get(get_payment))
        .with_auth()
}

/// Re-open a gateway session for a pending order.
async fn initiate_payment(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
    Path(order_id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let session = state
        .services
        .payments
        .initiate(&auth, order_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(session))
}

async fn get_payment(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let payment = state
        .services
        .payments
        .get_payment(id)
        .await
        .map_err(map_service_error)?;

    if !auth.is_admin() {
        // Fails with Forbidden when the parent order is not the caller's.
        state
            .services
            .orders
            .get_order(&auth, payment.order_id)
            .await
            .map_err(map_service_error)?;
    }
    Ok(success_response(payment))
}
