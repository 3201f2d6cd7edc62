/**
 * Post Routes
 * Public listing/lookup and authenticated create, replace, delete
 */
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::db::models::{BlogPost, PostFields, PostFilter, PostStatus};
use crate::error::{ApiJson, ApiQuery, AppError, AppResult};
use crate::routes::{blank_to_none, new_id, resolve_slug, IdResponse, SuccessResponse};
use crate::state::AppState;

// ============================================================================
// Request Types
// ============================================================================

/// Query parameters for GET /api/posts. Every filter is an exact match.
#[derive(Debug, Default, Deserialize)]
pub struct PostListQuery {
    pub status: Option<PostStatus>,
    pub slug: Option<String>,
    pub category_id: Option<String>,
    pub exclude: Option<String>,
    pub limit: Option<u32>,
}

impl From<PostListQuery> for PostFilter {
    fn from(query: PostListQuery) -> Self {
        Self {
            status: query.status,
            slug: blank_to_none(query.slug),
            category_id: blank_to_none(query.category_id),
            exclude: blank_to_none(query.exclude),
            limit: query.limit,
        }
    }
}

/// Body of POST /api/posts and PUT /api/posts/{id}.
///
/// PUT replaces every editable field: omitted fields are reset to their
/// defaults, not left unchanged.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct PostPayload {
    #[serde(default)]
    pub title: String,
    pub slug: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub featured_image: Option<String>,
    pub video_url: Option<String>,
    pub category_id: Option<String>,
    #[serde(default)]
    pub status: PostStatus,
    pub published_at: Option<DateTime<Utc>>,
}

impl PostPayload {
    fn into_fields(self) -> AppResult<PostFields> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(AppError::Validation("Title is required".into()));
        }
        let slug = resolve_slug(self.slug.as_deref(), &title)?;

        Ok(PostFields {
            slug,
            title,
            content: self.content.unwrap_or_default(),
            excerpt: self.excerpt.unwrap_or_default(),
            featured_image: self.featured_image.unwrap_or_default(),
            video_url: self.video_url.unwrap_or_default(),
            category_id: blank_to_none(self.category_id),
            status: self.status,
            published_at: self.published_at,
        })
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/posts
pub async fn list_posts(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PostListQuery>,
) -> AppResult<Json<Vec<BlogPost>>> {
    let posts = state.store.list_posts(&query.into()).await?;
    Ok(Json(posts))
}

/// GET /api/posts/{id}
pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<BlogPost>> {
    state
        .store
        .get_post(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Post not found".into()))
}

/// POST /api/posts
pub async fn create_post(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(payload): ApiJson<PostPayload>,
) -> AppResult<impl IntoResponse> {
    let fields = payload.into_fields()?;
    let id = new_id();
    state.store.insert_post(&id, Some(&user.id), &fields).await?;

    tracing::info!(post_id = %id, slug = %fields.slug, status = %fields.status, "post created");
    Ok((StatusCode::CREATED, Json(IdResponse { id })))
}

/// PUT /api/posts/{id}
pub async fn update_post(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<PostPayload>,
) -> AppResult<Json<SuccessResponse>> {
    let fields = payload.into_fields()?;
    if !state.store.update_post(&id, &fields).await? {
        return Err(AppError::NotFound("Post not found".into()));
    }

    tracing::info!(post_id = %id, status = %fields.status, "post updated");
    Ok(Json(SuccessResponse::ok()))
}

/// DELETE /api/posts/{id}
///
/// Reports success whether or not the post existed.
pub async fn delete_post(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<SuccessResponse>> {
    state.store.delete_post(&id).await?;
    tracing::info!(post_id = %id, "post deleted");
    Ok(Json(SuccessResponse::ok()))
}
