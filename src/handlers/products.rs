use crate::handlers::common::{
    created_response, map_service_error, no_content_response, success_response, validate_input,
    PaginatedResponse,
};
use crate::{
    auth::{AuthRouterExt, AuthenticatedUser},
    entities::product::{ProductCategory, ProductUnit},
    entities::user::UserRole,
    errors::ApiError,
    services::catalog::{CreateProductInput, InventoryUpdate, ProductFilter, UpdateProductInput},
    AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    routing::{delete, get, post, put},
    Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// Public catalogue browsing.
pub fn catalog_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_products))
        .route("/:id", get(get_product))
}

/// Farmer-side product management.
pub fn product_management_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_product))
        .route("/low-stock", get(low_stock))
        .route("/inventory/bulk", put(bulk_update_inventory))
        .route("/:id", put(update_product))
        .route("/:id", delete(delete_product))
        .with_role(UserRole::Farmer)
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    category: Option<ProductCategory>,
    farmer_id: Option<Uuid>,
    q: Option<String>,
    max_price: Option<Decimal>,
    #[serde(default = "default_in_stock_only")]
    in_stock_only: bool,
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

fn default_in_stock_only() -> bool {
    true
}

#[derive(Debug, Deserialize, Validate)]
struct CreateProductRequest {
    #[validate(length(min = 1, max = 120))]
    name: String,
    category: ProductCategory,
    description: Option<String>,
    price: Decimal,
    unit: ProductUnit,
    #[serde(default)]
    inventory: i32,
    location: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
struct UpdateProductRequest {
    #[validate(length(min = 1, max = 120))]
    name: Option<String>,
    category: Option<ProductCategory>,
    description: Option<String>,
    price: Option<Decimal>,
    unit: Option<ProductUnit>,
    inventory: Option<i32>,
    available: Option<bool>,
    location: Option<String>,
}

async fn list_products(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let filter = ProductFilter {
        category: query.category,
        farmer_id: query.farmer_id,
        q: query.q,
        max_price: query.max_price,
        in_stock_only: query.in_stock_only,
    };
    let (products, total) = state
        .services
        .catalog
        .list_products(filter, query.page, query.per_page)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(PaginatedResponse::new(
        products,
        query.page,
        query.per_page,
        total,
    )))
}

async fn get_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let product = state
        .services
        .catalog
        .get_product(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(product))
}

async fn create_product(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
    Json(payload): Json<CreateProductRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;
    let input = CreateProductInput {
        name: payload.name,
        category: payload.category,
        description: payload.description,
        price: payload.price,
        unit: payload.unit,
        inventory: payload.inventory,
        location: payload.location,
    };
    let product = state
        .services
        .catalog
        .create_product(auth.id, input)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(product))
}

async fn update_product(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;
    let input = UpdateProductInput {
        name: payload.name,
        category: payload.category,
        description: payload.description,
        price: payload.price,
        unit: payload.unit,
        inventory: payload.inventory,
        available: payload.available,
        location: payload.location,
    };
    let product = state
        .services
        .catalog
        .update_product(&auth, id, input)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(product))
}

async fn delete_product(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state
        .services
        .catalog
        .delete_product(&auth, id)
        .await
        .map_err(map_service_error)?;
    Ok(no_content_response())
}

#[derive(Debug, Deserialize)]
struct BulkInventoryRequest {
    updates: Vec<InventoryUpdate>,
}

async fn bulk_update_inventory(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
    Json(payload): Json<BulkInventoryRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let products = state
        .services
        .catalog
        .bulk_update_inventory(&auth, payload.updates)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(products))
}

async fn low_stock(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let products = state
        .services
        .catalog
        .low_stock(auth.id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(products))
}
