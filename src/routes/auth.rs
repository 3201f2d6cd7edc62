/**
 * Authentication Routes
 * Admin provisioning, login, and the current-user lookup
 */
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

use crate::auth::{jwt, password, AuthUser};
use crate::db::models::{AdminProfile, NewAdminUser};
use crate::db::StoreError;
use crate::error::{ApiJson, AppError, AppResult};
use crate::routes::new_id;
use crate::state::AppState;

const MIN_PASSWORD_LEN: usize = 6;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize, Serialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CreateAdminRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub setup_key: String,
}

/// Minimal user projection returned by login and create-admin.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: String,
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserSummary,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
    pub user: AdminProfile,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/auth/create-admin
///
/// Gated by the shared setup key rather than a token. Email uniqueness is
/// enforced by the store, so two concurrent registrations cannot both win.
pub async fn create_admin(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateAdminRequest>,
) -> AppResult<impl IntoResponse> {
    let authorized = state
        .config
        .auth
        .setup_key
        .as_deref()
        .is_some_and(|key| key == payload.setup_key);
    if !authorized {
        tracing::warn!("create-admin rejected: setup key mismatch");
        return Err(AppError::Forbidden("Invalid setup key".into()));
    }

    let email = payload.email.trim().to_string();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::Validation("A valid email is required".into()));
    }
    if payload.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let password_hash =
        password::hash_password(payload.password, state.config.auth.bcrypt_cost).await?;
    let admin = state
        .store
        .insert_admin(NewAdminUser {
            id: new_id(),
            email,
            password_hash,
        })
        .await
        .map_err(|e| match e {
            StoreError::Conflict(_) => AppError::Conflict("Email already registered".into()),
            other => other.into(),
        })?;

    tracing::info!(user_id = %admin.id, email = %admin.email, "admin user created");

    Ok((
        StatusCode::CREATED,
        Json(UserSummary {
            id: admin.id,
            email: admin.email,
        }),
    ))
}

/// POST /api/auth/login
///
/// Unknown email and wrong password produce the same 401, and both pay for
/// one bcrypt verification.
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let email = payload.email.trim();
    if email.is_empty() || payload.password.is_empty() {
        return Err(AppError::Validation(
            "Email and password are required".into(),
        ));
    }

    let invalid = || AppError::Unauthorized("Invalid credentials".into());

    let Some(user) = state.store.find_admin_by_email(email).await? else {
        password::verify_unknown_account(payload.password, state.config.auth.bcrypt_cost).await?;
        tracing::warn!(email = %email, "login attempt for unknown user");
        return Err(invalid());
    };

    if !password::verify_password(payload.password, user.password_hash.clone()).await? {
        tracing::warn!(email = %email, "failed login attempt");
        return Err(invalid());
    }

    let token = jwt::issue_token(&user.id, &user.email, &state.config.auth.jwt_secret)
        .map_err(|e| AppError::Internal(format!("token encoding failed: {e}")))?;

    tracing::info!(user_id = %user.id, "admin logged in");

    Ok(Json(LoginResponse {
        token,
        user: UserSummary {
            id: user.id,
            email: user.email,
        },
    }))
}

/// GET /api/auth/me
pub async fn me(State(state): State<AppState>, user: AuthUser) -> AppResult<Json<MeResponse>> {
    let admin = state
        .store
        .find_admin_by_id(&user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    Ok(Json(MeResponse {
        user: admin.into(),
    }))
}
