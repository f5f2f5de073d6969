use crate::handlers::common::{map_service_error, success_response, PaginatedResponse};
use crate::{
    auth::{AuthRouterExt, AuthenticatedUser},
    entities::user::UserRole,
    errors::ApiError,
    AppState,
};
use axum::{
    extract::{Query, State},
    routing::get,
    Router,
};
use serde::Deserialize;
use std::sync::Arc;

pub fn dashboard_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/customer", get(customer_dashboard))
        .with_auth()
}

pub fn farmer_dashboard_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/farmer", get(farmer_dashboard))
        .with_role(UserRole::Farmer)
}

pub fn admin_dashboard_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin", get(admin_dashboard))
        .route("/admin/audit", get(audit_log))
        .with_role(UserRole::Admin)
}

#[derive(Debug, Deserialize)]
struct AuditQuery {
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

async fn customer_dashboard(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let dashboard = state
        .services
        .dashboard
        .customer_dashboard(auth.id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(dashboard))
}

async fn farmer_dashboard(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let dashboard = state
        .services
        .dashboard
        .farmer_dashboard(auth.id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(dashboard))
}

async fn admin_dashboard(
    State(state): State<Arc<AppState>>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let dashboard = state
        .services
        .dashboard
        .admin_dashboard()
        .await
        .map_err(map_service_error)?;
    Ok(success_response(dashboard))
}

/// Newest-first audit trail for administrators.
async fn audit_log(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AuditQuery>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let (entries, total) = state
        .services
        .audit
        .recent(query.page, query.per_page)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(PaginatedResponse::new(
        entries,
        query.page,
        query.per_page,
        total,
    )))
}
