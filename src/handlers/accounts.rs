use crate::handlers::common::{
    created_response, map_service_error, success_response, validate_input,
};
use crate::{
    auth::{AuthRouterExt, AuthenticatedUser},
    entities::user::{self, Entity as User, UserRole},
    errors::{ApiError, ServiceError},
    events::Event,
    AppState,
};
use axum::{
    extract::{Json, State},
    routing::{get, post, put},
    Router,
};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

pub fn accounts_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

pub fn profile_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/me", get(me))
        .route("/me", put(update_profile))
        .with_auth()
}

#[derive(Debug, Deserialize, Validate)]
struct RegisterRequest {
    #[validate(length(min = 3, max = 40))]
    username: String,
    #[validate(email)]
    email: String,
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    password: String,
    role: UserRole,
    phone_number: Option<String>,
    address: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
struct LoginRequest {
    #[validate(length(min = 1))]
    username: String,
    #[validate(length(min = 1))]
    password: String,
}

#[derive(Debug, Deserialize, Validate)]
struct UpdateProfileRequest {
    #[validate(email)]
    email: Option<String>,
    phone_number: Option<String>,
    address: Option<String>,
    /// Provider codes a farmer accepts; ignored for other roles.
    accepted_payment_methods: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct RegisterResponse {
    user: user::Model,
}

/// Create an account. Admin accounts are provisioned out of band, not via
/// self-registration.
async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;
    if payload.role == UserRole::Admin {
        return Err(ApiError::ValidationError(
            "Cannot self-register as admin".to_string(),
        ));
    }

    let existing = User::find()
        .filter(user::Column::Username.eq(payload.username.clone()))
        .one(state.db.as_ref())
        .await
        .map_err(|e| map_service_error(e.into()))?;
    if existing.is_some() {
        return Err(map_service_error(ServiceError::Conflict(
            "Username is already taken".to_string(),
        )));
    }

    let password_hash = state
        .auth
        .hash_password(&payload.password)
        .map_err(|_| map_service_error(ServiceError::InternalError("hashing failed".into())))?;

    let model = user::ActiveModel {
        id: Set(Uuid::new_v4()),
        username: Set(payload.username),
        email: Set(payload.email),
        password_hash: Set(password_hash),
        role: Set(payload.role),
        phone_number: Set(payload.phone_number),
        address: Set(payload.address),
        accepted_payment_methods: Set(None),
        ..Default::default()
    };
    let created = model
        .insert(state.db.as_ref())
        .await
        .map_err(|e| map_service_error(e.into()))?;

    state
        .event_sender
        .send_or_log(Event::UserRegistered {
            user_id: created.id,
        })
        .await;

    Ok(created_response(RegisterResponse { user: created }))
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let user = User::find()
        .filter(user::Column::Username.eq(payload.username.clone()))
        .one(state.db.as_ref())
        .await
        .map_err(|e| map_service_error(e.into()))?
        .ok_or(ApiError::Unauthorized)?;

    let valid = state
        .auth
        .verify_password(&payload.password, &user.password_hash)
        .map_err(|_| ApiError::Unauthorized)?;
    if !valid {
        return Err(ApiError::Unauthorized);
    }

    let token = state
        .auth
        .generate_token(user.id, &user.username, user.role)
        .map_err(|_| map_service_error(ServiceError::InternalError("token issuance".into())))?;
    Ok(success_response(token))
}

async fn me(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let user = User::find_by_id(auth.id)
        .one(state.db.as_ref())
        .await
        .map_err(|e| map_service_error(e.into()))?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    Ok(success_response(user))
}

async fn update_profile(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let user = User::find_by_id(auth.id)
        .one(state.db.as_ref())
        .await
        .map_err(|e| map_service_error(e.into()))?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let is_farmer = user.role == UserRole::Farmer;
    let mut active: user::ActiveModel = user.into();
    if let Some(email) = payload.email {
        active.email = Set(email);
    }
    if let Some(phone_number) = payload.phone_number {
        active.phone_number = Set(Some(phone_number));
    }
    if let Some(address) = payload.address {
        active.address = Set(Some(address));
    }
    if let Some(methods) = payload.accepted_payment_methods {
        if is_farmer {
            active.accepted_payment_methods = Set(Some(serde_json::json!(methods)));
        }
    }

    let updated = active
        .update(state.db.as_ref())
        .await
        .map_err(|e| map_service_error(e.into()))?;
    Ok(success_response(updated))
}
