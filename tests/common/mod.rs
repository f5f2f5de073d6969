#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::{Extension, Router};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use uuid::Uuid;

use ruralmarknet_api::auth::{AuthConfig, AuthService, AuthenticatedUser};
use ruralmarknet_api::config::AppConfig;
use ruralmarknet_api::db::{establish_connection, run_migrations, DbConfig};
use ruralmarknet_api::entities::product::{self, ProductCategory, ProductUnit};
use ruralmarknet_api::entities::user::{self, UserRole};
use ruralmarknet_api::events::{event_channel, process_events};
use ruralmarknet_api::handlers::AppServices;
use ruralmarknet_api::{api_v1_routes, AppState};

/// Test harness backed by an in-memory SQLite database. A single pooled
/// connection keeps every query on the same in-memory instance.
pub struct TestApp {
    pub db: Arc<sea_orm::DatabaseConnection>,
    pub state: Arc<AppState>,
    pub services: AppServices,
    pub auth: Arc<AuthService>,
    _event_task: tokio::task::JoinHandle<()>,
}

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".to_string(),
        host: "127.0.0.1".to_string(),
        port: 0,
        environment: "test".to_string(),
        log_level: "warn".to_string(),
        log_json: false,
        jwt_secret: "test_secret_key_for_testing_purposes_only".to_string(),
        jwt_expiration_secs: 3600,
        payment_webhook_secret: Some("whsec_test".to_string()),
        payment_webhook_tolerance_secs: 300,
        default_currency: "INR".to_string(),
        low_stock_threshold: 5,
        cors_allowed_origins: None,
        auto_migrate: true,
        db_max_connections: 1,
        db_min_connections: 1,
    }
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: AppConfig) -> Self {
        let mut db_config = DbConfig::new(config.database_url.clone());
        db_config.max_connections = 1;
        db_config.min_connections = 1;
        let db = Arc::new(
            establish_connection(&db_config)
                .await
                .expect("failed to open test database"),
        );
        run_migrations(db.as_ref())
            .await
            .expect("failed to migrate test database");

        let auth = Arc::new(AuthService::new(AuthConfig {
            jwt_secret: config.jwt_secret.clone(),
            token_expiration: Duration::from_secs(config.jwt_expiration_secs),
        }));

        let (event_sender, event_receiver) = event_channel(64);
        let state = Arc::new(AppState::new(
            db.clone(),
            config,
            event_sender,
            auth.clone(),
        ));
        let event_task = tokio::spawn(process_events(
            event_receiver,
            state.services.audit.as_ref().clone(),
        ));

        Self {
            db,
            services: state.services.clone(),
            auth,
            state,
            _event_task: event_task,
        }
    }

    /// Full application router, as served by main.
    pub fn router(&self) -> Router {
        Router::new()
            .nest("/api/v1", api_v1_routes())
            .layer(Extension(self.auth.clone()))
            .with_state(self.state.clone())
    }

    pub async fn create_user(&self, username: &str, role: UserRole) -> user::Model {
        self.create_user_with_methods(username, role, None).await
    }

    pub async fn create_user_with_methods(
        &self,
        username: &str,
        role: UserRole,
        accepted_payment_methods: Option<Vec<&str>>,
    ) -> user::Model {
        let model = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            username: Set(username.to_string()),
            email: Set(format!("{username}@example.com")),
            password_hash: Set(String::new()),
            role: Set(role),
            phone_number: Set(None),
            address: Set(None),
            accepted_payment_methods: Set(
                accepted_payment_methods.map(|m| serde_json::json!(m))
            ),
            ..Default::default()
        };
        model
            .insert(self.db.as_ref())
            .await
            .expect("failed to insert user")
    }

    pub async fn create_product(
        &self,
        farmer_id: Uuid,
        name: &str,
        price: Decimal,
        inventory: i32,
    ) -> product::Model {
        let model = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            farmer_id: Set(farmer_id),
            category: Set(ProductCategory::Vegetables),
            description: Set(None),
            price: Set(price),
            unit: Set(ProductUnit::Kilogram),
            inventory: Set(inventory),
            available: Set(true),
            location: Set(None),
            ..Default::default()
        };
        model
            .insert(self.db.as_ref())
            .await
            .expect("failed to insert product")
    }

    pub fn actor(&self, user: &user::Model) -> AuthenticatedUser {
        AuthenticatedUser {
            id: user.id,
            username: user.username.clone(),
            role: user.role,
        }
    }
}
