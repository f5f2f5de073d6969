use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::config::AppConfig;
use crate::events::EventSender;
use crate::services::{
    audit::AuditService, cart::CartService, catalog::CatalogService, checkout::CheckoutService,
    dashboard::DashboardService, deliveries::DeliveryService, orders::OrderService,
    payments::PaymentService,
};

pub mod accounts;
pub mod carts;
pub mod checkout;
pub mod common;
pub mod dashboards;
pub mod deliveries;
pub mod orders;
pub mod payment_webhooks;
pub mod payments;
pub mod products;

/// Service registry shared through application state.
#[derive(Clone)]
pub struct AppServices {
    pub audit: Arc<AuditService>,
    pub catalog: Arc<CatalogService>,
    pub cart: Arc<CartService>,
    pub checkout: Arc<CheckoutService>,
    pub orders: Arc<OrderService>,
    pub payments: Arc<PaymentService>,
    pub deliveries: Arc<DeliveryService>,
    pub dashboard: Arc<DashboardService>,
}

impl AppServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: EventSender,
        config: &AppConfig,
    ) -> Self {
        let audit = AuditService::new(db.clone());
        Self {
            audit: Arc::new(audit.clone()),
            catalog: Arc::new(CatalogService::new(
                db.clone(),
                event_sender.clone(),
                audit.clone(),
                config.low_stock_threshold,
            )),
            cart: Arc::new(CartService::new(db.clone(), event_sender.clone())),
            checkout: Arc::new(CheckoutService::new(
                db.clone(),
                event_sender.clone(),
                config.default_currency.clone(),
            )),
            orders: Arc::new(OrderService::new(
                db.clone(),
                event_sender.clone(),
                audit.clone(),
            )),
            payments: Arc::new(PaymentService::new(
                db.clone(),
                event_sender.clone(),
                audit,
            )),
            deliveries: Arc::new(DeliveryService::new(db.clone(), event_sender)),
            dashboard: Arc::new(DashboardService::new(db, config.low_stock_threshold)),
        }
    }
}
