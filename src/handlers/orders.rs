use crate::handlers::common::{
    map_service_error, success_response, PaginatedResponse,
};
use crate::{
    auth::{AuthRouterExt, AuthenticatedUser},
    entities::order::OrderStatus,
    entities::user::UserRole,
    errors::ApiError,
    AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

pub fn order_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_orders))
        .route("/:id", get(get_order))
        .route("/:id/cancel", post(cancel_order))
        .with_auth()
}

pub fn admin_order_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(admin_list_orders))
        .route("/:id/status", put(admin_update_status))
        .with_role(UserRole::Admin)
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    status: Option<OrderStatus>,
    #[serde(default = "default_page")]
    page: u64,
    #[serde(default = "default_per_page")]
    per_page: u64,
}

fn default_page() -> u64 {
    1
}

fn default_per_page() -> u64 {
    20
}

#[derive(Debug, Deserialize)]
struct UpdateStatusRequest {
    status: OrderStatus,
}

async fn list_orders(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
    Query(query): Query<ListQuery>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let (orders, total) = state
        .services
        .orders
        .list_for_customer(auth.id, query.page, query.per_page)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(PaginatedResponse::new(
        orders,
        query.page,
        query.per_page,
        total,
    )))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let detail = state
        .services
        .orders
        .get_order(&auth, id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(detail))
}

async fn cancel_order(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let outcome = state
        .services
        .orders
        .cancel(&auth, id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(outcome))
}

async fn admin_list_orders(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let (orders, total) = state
        .services
        .orders
        .list_all(query.status, query.page, query.per_page)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(PaginatedResponse::new(
        orders,
        query.page,
        query.per_page,
        total,
    )))
}

async fn admin_update_status(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .admin_update_status(&auth, id, payload.status)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(order))
}
