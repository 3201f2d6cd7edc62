/**
 * Category Routes
 */
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::db::models::{BlogCategory, CategoryFields};
use crate::db::StoreError;
use crate::error::{ApiJson, AppError, AppResult};
use crate::routes::{new_id, resolve_slug, SuccessResponse};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CategoryPayload {
    #[serde(default)]
    pub name: String,
    pub slug: Option<String>,
}

impl CategoryPayload {
    fn into_fields(self) -> AppResult<CategoryFields> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::Validation("Name is required".into()));
        }
        let slug = resolve_slug(self.slug.as_deref(), &name)?;
        Ok(CategoryFields { name, slug })
    }
}

fn slug_conflict(err: StoreError) -> AppError {
    match err {
        StoreError::Conflict(_) => AppError::Conflict("Slug already in use".into()),
        other => other.into(),
    }
}

/// GET /api/categories, alphabetical by name
pub async fn list_categories(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<BlogCategory>>> {
    Ok(Json(state.store.list_categories().await?))
}

/// POST /api/categories
pub async fn create_category(
    State(state): State<AppState>,
    _user: AuthUser,
    ApiJson(payload): ApiJson<CategoryPayload>,
) -> AppResult<impl IntoResponse> {
    let fields = payload.into_fields()?;
    let category = state
        .store
        .insert_category(&new_id(), &fields)
        .await
        .map_err(slug_conflict)?;

    tracing::info!(category_id = %category.id, slug = %category.slug, "category created");
    Ok((StatusCode::CREATED, Json(category)))
}

/// PUT /api/categories/{id}
pub async fn update_category(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<CategoryPayload>,
) -> AppResult<Json<SuccessResponse>> {
    let fields = payload.into_fields()?;
    let updated = state
        .store
        .update_category(&id, &fields)
        .await
        .map_err(slug_conflict)?;
    if !updated {
        return Err(AppError::NotFound("Category not found".into()));
    }

    tracing::info!(category_id = %id, "category updated");
    Ok(Json(SuccessResponse::ok()))
}

/// DELETE /api/categories/{id}
///
/// Posts keep their `category_id`; it reads back as no category.
pub async fn delete_category(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<SuccessResponse>> {
    state.store.delete_category(&id).await?;
    tracing::info!(category_id = %id, "category deleted");
    Ok(Json(SuccessResponse::ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Store;
    use crate::routes::test_support::{bearer, json_request, send, test_state};
    use serde_json::json;

    #[tokio::test]
    async fn test_create_returns_full_category_and_lists_by_name() {
        let (state, _) = test_state(&[]);
        let auth = bearer(&state);

        for name in ["Salud", "Actividades"] {
            let (status, body) = send(
                crate::create_app(state.clone()),
                json_request("POST", "/api/categories", Some(&auth), Some(json!({ "name": name }))),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
            assert_eq!(body["name"], name);
            assert!(body["id"].is_string());
            assert!(body["created_at"].is_string());
        }

        let (status, list) = send(
            crate::create_app(state),
            json_request("GET", "/api/categories", None, None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let names: Vec<&str> = list
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["Actividades", "Salud"]);
        assert_eq!(list[1]["slug"], "salud");
    }

    #[tokio::test]
    async fn test_create_requires_name() {
        let (state, _) = test_state(&[]);
        let auth = bearer(&state);
        let (status, body) = send(
            crate::create_app(state),
            json_request("POST", "/api/categories", Some(&auth), Some(json!({ "slug": "x" }))),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Name is required");
    }

    #[tokio::test]
    async fn test_update_unknown_category_is_not_found() {
        let (state, _) = test_state(&[]);
        let auth = bearer(&state);
        let (status, _) = send(
            crate::create_app(state),
            json_request(
                "PUT",
                "/api/categories/missing",
                Some(&auth),
                Some(json!({ "name": "Salud", "slug": "salud" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_duplicate_slug_is_conflict() {
        let (state, store) = test_state(&[]);
        let auth = bearer(&state);
        let payload = json!({ "name": "Salud", "slug": "salud" });

        let (status, first) = send(
            crate::create_app(state.clone()),
            json_request("POST", "/api/categories", Some(&auth), Some(payload.clone())),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send(
            crate::create_app(state.clone()),
            json_request("POST", "/api/categories", Some(&auth), Some(payload)),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "Slug already in use");

        let (status, other) = send(
            crate::create_app(state.clone()),
            json_request(
                "POST",
                "/api/categories",
                Some(&auth),
                Some(json!({ "name": "Ocio" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        // Renaming onto a taken slug conflicts; keeping your own slug does not.
        let uri = format!("/api/categories/{}", other["id"].as_str().unwrap());
        let (status, _) = send(
            crate::create_app(state.clone()),
            json_request(
                "PUT",
                &uri,
                Some(&auth),
                Some(json!({ "name": "Ocio", "slug": "salud" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let uri = format!("/api/categories/{}", first["id"].as_str().unwrap());
        let (status, _) = send(
            crate::create_app(state),
            json_request(
                "PUT",
                &uri,
                Some(&auth),
                Some(json!({ "name": "Salud y bienestar", "slug": "salud" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let salud = store
            .list_categories()
            .await
            .unwrap()
            .into_iter()
            .filter(|c| c.slug == "salud")
            .count();
        assert_eq!(salud, 1);
    }

    #[tokio::test]
    async fn test_mutations_require_token() {
        let (state, _) = test_state(&[]);
        let (status, _) = send(
            crate::create_app(state),
            json_request("DELETE", "/api/categories/c1", None, None),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
