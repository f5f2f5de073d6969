use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{http::HeaderValue, Extension, Router};
use tokio::net::TcpListener;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

use ruralmarknet_api::auth::{AuthConfig, AuthService};
use ruralmarknet_api::config::{init_tracing, load_config};
use ruralmarknet_api::db::{establish_connection, run_migrations, DbConfig};
use ruralmarknet_api::events::{event_channel, process_events};
use ruralmarknet_api::{api_v1_routes, health_routes, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config().context("failed to load configuration")?;
    init_tracing(&config.log_level, config.log_json);
    info!(
        environment = %config.environment,
        "starting ruralmarknet api"
    );

    let db_config = DbConfig::from(&config);
    let db = Arc::new(
        establish_connection(&db_config)
            .await
            .context("failed to connect to database")?,
    );
    if config.auto_migrate {
        run_migrations(db.as_ref())
            .await
            .context("failed to run migrations")?;
    }

    let auth = Arc::new(AuthService::new(AuthConfig {
        jwt_secret: config.jwt_secret.clone(),
        token_expiration: Duration::from_secs(config.jwt_expiration_secs),
    }));

    let (event_sender, event_receiver) = event_channel(1024);
    let state = Arc::new(AppState::new(
        db,
        config.clone(),
        event_sender,
        auth.clone(),
    ));

    tokio::spawn(process_events(
        event_receiver,
        state.services.audit.as_ref().clone(),
    ));

    let cors = match &config.cors_allowed_origins {
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
        None => CorsLayer::permissive(),
    };

    let app = Router::new()
        .merge(health_routes())
        .nest("/api/v1", api_v1_routes())
        .layer(Extension(auth))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(CompressionLayer::new())
        .with_state(state);

    let addr = config.server_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
