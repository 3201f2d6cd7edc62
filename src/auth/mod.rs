/*!
 * Authentication
 * Bearer-token gate for the mutating endpoints
 */
pub mod jwt;
pub mod password;

use axum::extract::FromRequestParts;
use axum::http::{header::AUTHORIZATION, request::Parts, HeaderMap};

use crate::config::TokenPolicy;
use crate::error::AppError;
use crate::state::AppState;

pub use jwt::Claims;

/// Authenticated admin, decoded from the `Authorization: Bearer` header.
///
/// Taking this as a handler argument gates the handler: the token is checked
/// before the body is read and before any store access. Under
/// [`TokenPolicy::VerifyUser`] the subject must also still exist.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)
            .ok_or_else(|| AppError::Unauthorized("Token required".into()))?;

        let claims = jwt::verify_token(token, &state.config.auth.jwt_secret).map_err(|e| {
            tracing::debug!(error = %e, "token rejected");
            AppError::Unauthorized("Invalid or expired token".into())
        })?;

        if state.config.auth.token_policy == TokenPolicy::VerifyUser
            && state.store.find_admin_by_id(&claims.sub).await?.is_none()
        {
            tracing::warn!(user_id = %claims.sub, "token subject no longer exists");
            return Err(AppError::Unauthorized("Invalid or expired token".into()));
        }

        Ok(AuthUser {
            id: claims.sub,
            email: claims.email,
        })
    }
}
