use crate::handlers::common::{map_service_error, success_response};
use crate::{
    auth::{AuthRouterExt, AuthenticatedUser},
    entities::delivery::DeliveryStatus,
    entities::user::UserRole,
    errors::ApiError,
    services::deliveries::UpdateDeliveryInput,
    AppState,
};
use axum::{
    extract::{Json, Path, State},
    routing::{get, put},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

pub fn delivery_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_deliveries))
        .route("/:id", get(get_delivery))
        .route("/:id", put(update_delivery))
        .with_auth()
}

pub fn admin_delivery_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/:id/assign", put(assign_farmer))
        .with_role(UserRole::Admin)
}

#[derive(Debug, Deserialize)]
struct UpdateDeliveryRequest {
    status: DeliveryStatus,
    driver_name: Option<String>,
    contact_number: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AssignFarmerRequest {
    farmer_id: Option<Uuid>,
}

async fn list_deliveries(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let deliveries = state
        .services
        .deliveries
        .list_for_actor(&auth)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(deliveries))
}

async fn get_delivery(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let detail = state
        .services
        .deliveries
        .get_delivery(&auth, id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(detail))
}

async fn update_delivery(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateDeliveryRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let input = UpdateDeliveryInput {
        status: payload.status,
        driver_name: payload.driver_name,
        contact_number: payload.contact_number,
    };
    let delivery = state
        .services
        .deliveries
        .update_status(&auth, id, input)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(delivery))
}

async fn assign_farmer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignFarmerRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let delivery = state
        .services
        .deliveries
        .assign_farmer(id, payload.farmer_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(delivery))
}
