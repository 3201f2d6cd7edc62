/**
 * Analytics Routes
 * Public page-view ingestion and the authenticated raw event listing
 */
use axum::{
    extract::State,
    http::{header::USER_AGENT, HeaderMap},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::db::models::{DeviceType, NewPageView, PageView};
use crate::error::{ApiJson, ApiQuery, AppResult};
use crate::routes::{new_id, SuccessResponse};
use crate::state::AppState;

/// Client-reported page view. Nothing is validated; absent fields take
/// defaults.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct TrackRequest {
    pub page_path: Option<String>,
    pub page_title: Option<String>,
    pub referrer: Option<String>,
    pub user_agent: Option<String>,
    pub device_type: Option<String>,
    pub browser: Option<String>,
    pub os: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub session_id: Option<String>,
}

impl TrackRequest {
    fn into_page_view(self, header_agent: Option<&str>) -> NewPageView {
        NewPageView {
            id: new_id(),
            page_path: self
                .page_path
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| "/".to_string()),
            page_title: self.page_title.unwrap_or_default(),
            referrer: self.referrer.unwrap_or_default(),
            user_agent: self
                .user_agent
                .or_else(|| header_agent.map(str::to_string))
                .unwrap_or_default(),
            device_type: self
                .device_type
                .as_deref()
                .map(DeviceType::from_label)
                .unwrap_or_default(),
            browser: self.browser.unwrap_or_default(),
            os: self.os.unwrap_or_default(),
            country: self.country.unwrap_or_default(),
            city: self.city.unwrap_or_default(),
            session_id: self.session_id.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    pub since: Option<DateTime<Utc>>,
}

/// POST /api/analytics
///
/// Every call inserts a row; repeated events are never merged.
pub async fn track(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(payload): ApiJson<TrackRequest>,
) -> AppResult<Json<SuccessResponse>> {
    let header_agent = headers.get(USER_AGENT).and_then(|v| v.to_str().ok());
    let view = payload.into_page_view(header_agent);

    state.store.insert_page_view(&view).await?;
    tracing::debug!(
        path = %view.page_path,
        device = view.device_type.as_str(),
        "page view tracked"
    );
    Ok(Json(SuccessResponse::ok()))
}

/// GET /api/analytics?since=<RFC 3339>
///
/// Raw rows, oldest first. Aggregation is left to the client.
pub async fn list_page_views(
    State(state): State<AppState>,
    _user: AuthUser,
    ApiQuery(query): ApiQuery<AnalyticsQuery>,
) -> AppResult<Json<Vec<PageView>>> {
    Ok(Json(state.store.list_page_views(query.since).await?))
}
