/**
 * Site Content Routes
 * Reads go through the content cache; writes invalidate it
 */
use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::db::models::SiteContentItem;
use crate::error::{ApiJson, AppError, AppResult};
use crate::routes::SuccessResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ContentUpdate {
    pub value: Option<String>,
}

/// GET /api/content
pub async fn list_content(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<SiteContentItem>>> {
    let items = state.content_cache.get_or_load(state.store.as_ref()).await?;
    Ok(Json(items.as_ref().clone()))
}

/// GET /api/content/{key}
pub async fn get_content(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> AppResult<Json<SiteContentItem>> {
    let items = state.content_cache.get_or_load(state.store.as_ref()).await?;
    items
        .iter()
        .find(|item| item.key == key)
        .cloned()
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Content not found".into()))
}

/// PUT /api/content/{key}
///
/// Only the value is writable. Unknown keys are not created.
pub async fn update_content(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(key): Path<String>,
    ApiJson(payload): ApiJson<ContentUpdate>,
) -> AppResult<Json<SuccessResponse>> {
    let value = payload
        .value
        .ok_or_else(|| AppError::Validation("Value is required".into()))?;

    if !state.store.update_content_value(&key, &value).await? {
        return Err(AppError::NotFound("Content not found".into()));
    }
    state.content_cache.invalidate().await;

    tracing::info!(key = %key, "site content updated");
    Ok(Json(SuccessResponse::ok()))
}
