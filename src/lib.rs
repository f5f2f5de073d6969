pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod services;

use std::sync::Arc;

use axum::{routing::get, routing::post, Json, Router};
use sea_orm::DatabaseConnection;
use serde::Serialize;

use crate::auth::AuthService;
use crate::config::AppConfig;
use crate::events::EventSender;
use crate::handlers::AppServices;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: AppConfig,
    pub event_sender: EventSender,
    pub services: AppServices,
    pub auth: Arc<AuthService>,
}

impl AppState {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: AppConfig,
        event_sender: EventSender,
        auth: Arc<AuthService>,
    ) -> Self {
        let services = AppServices::new(db.clone(), event_sender.clone(), &config);
        Self {
            db,
            config,
            event_sender,
            services,
            auth,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub version: &'static str,
}

async fn health() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub fn health_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(health))
}

/// All /api/v1 routes.
pub fn api_v1_routes() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/auth", handlers::accounts::accounts_routes())
        .nest("/users", handlers::accounts::profile_routes())
        .nest("/products", handlers::products::catalog_routes())
        .nest(
            "/farmer/products",
            handlers::products::product_management_routes(),
        )
        .nest("/cart", handlers::carts::cart_routes())
        .nest("/checkout", handlers::checkout::checkout_routes())
        .nest("/orders", handlers::orders::order_routes())
        .nest("/admin/orders", handlers::orders::admin_order_routes())
        .merge(handlers::payments::payment_routes())
        .route(
            "/webhooks/payments",
            post(handlers::payment_webhooks::payment_webhook),
        )
        .nest("/deliveries", handlers::deliveries::delivery_routes())
        .nest(
            "/admin/deliveries",
            handlers::deliveries::admin_delivery_routes(),
        )
        .nest("/dashboards", handlers::dashboards::dashboard_routes())
        .nest(
            "/dashboards",
            handlers::dashboards::farmer_dashboard_routes(),
        )
        .nest(
            "/dashboards",
            handlers::dashboards::admin_dashboard_routes(),
        )
}
