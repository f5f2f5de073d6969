use crate::handlers::common::{map_service_error, success_response, validate_input};
use crate::{
    auth::{AuthRouterExt, AuthenticatedUser},
    errors::ApiError,
    services::cart::AddOutcome,
    AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    routing::{delete, get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

pub fn cart_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_cart))
        .route("/items", post(add_item))
        .route("/clear", post(clear_cart))
        .route("/items/:item_id", put(update_item))
        .route("/items/:item_id", delete(remove_item))
        .with_auth()
}

/// Explicit cart reference. Absent means "my current cart".
#[derive(Debug, Deserialize)]
struct CartQuery {
    cart_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
struct AddItemRequest {
    cart_id: Option<Uuid>,
    product_id: Uuid,
    #[serde(default = "default_quantity")]
    quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

#[derive(Debug, Deserialize, Validate)]
struct UpdateItemRequest {
    cart_id: Option<Uuid>,
    quantity: i32,
}

#[derive(Debug, Serialize)]
struct AddItemResponse<T: Serialize> {
    cart: T,
    #[serde(flatten)]
    outcome: AddOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    notice: Option<String>,
}

async fn get_cart(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
    Query(query): Query<CartQuery>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let cart = state
        .services
        .cart
        .load_cart_view(auth.id, query.cart_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(cart))
}

async fn add_item(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
    Json(payload): Json<AddItemRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;
    let quantity = payload.quantity.max(1);
    let (cart, outcome) = state
        .services
        .cart
        .add_item(auth.id, payload.cart_id, payload.product_id, quantity)
        .await
        .map_err(map_service_error)?;

    let notice = match &outcome {
        AddOutcome::Added { .. } => None,
        AddOutcome::PartiallyAdded { requested, added } => Some(format!(
            "Only {added} of {requested} requested units were available"
        )),
        AddOutcome::OutOfStock => Some("This product is out of stock".to_string()),
    };
    Ok(success_response(AddItemResponse {
        cart,
        outcome,
        notice,
    }))
}

async fn clear_cart(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
    Query(query): Query<CartQuery>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let cart = state
        .services
        .cart
        .clear(auth.id, query.cart_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(cart))
}

async fn update_item(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<UpdateItemRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;
    let cart = state
        .services
        .cart
        .update_item_quantity(auth.id, payload.cart_id, item_id, payload.quantity)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(cart))
}

async fn remove_item(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
    Path(item_id): Path<Uuid>,
    Query(query): Query<CartQuery>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let cart = state
        .services
        .cart
        .remove_item(auth.id, query.cart_id, item_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(cart))
}
