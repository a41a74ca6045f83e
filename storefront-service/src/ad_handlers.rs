use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use common_http_errors::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::actor::{ensure_admin, Actor};
use crate::app::AppState;

const AD_COLUMNS: &str = "id, title, image_url, redirect_url, active, created_at";

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct AdRow {
    pub id: Uuid,
    pub title: String,
    pub image_url: String,
    pub redirect_url: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// GET /ads — the storefront banner carousel asks for `?active=true`.
pub async fn list_ads(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Vec<AdRow>>> {
    let active_only = params.get("active").map(String::as_str) == Some("true");

    let ads = sqlx::query_as::<_, AdRow>(&format!(
        "SELECT {AD_COLUMNS} FROM ads WHERE ($1 = false OR active) ORDER BY created_at DESC"
    ))
    .bind(active_only)
    .fetch_all(&state.db)
    .await
    .map_err(|e| ApiError::internal(e, None))?;

    Ok(Json(ads))
}

#[derive(Debug, Deserialize)]
pub struct CreateAdRequest {
    pub title: String,
    pub image_url: String,
    #[serde(default)]
    pub redirect_url: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

pub async fn create_ad(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<CreateAdRequest>,
) -> ApiResult<(StatusCode, Json<AdRow>)> {
    ensure_admin(&actor)?;
    if req.title.trim().is_empty() || req.image_url.trim().is_empty() {
        return Err(ApiError::bad_request("title_and_image_required", None));
    }

    let created = sqlx::query_as::<_, AdRow>(&format!(
        "INSERT INTO ads (id, title, image_url, redirect_url, active) \
         VALUES ($1, $2, $3, $4, $5) RETURNING {AD_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(req.title.trim())
    .bind(req.image_url.trim())
    .bind(&req.redirect_url)
    .bind(req.active)
    .fetch_one(&state.db)
    .await
    .map_err(|e| ApiError::internal(e, None))?;

    Ok((StatusCode::CREATED, Json(created)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateAdRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub redirect_url: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
}

pub async fn update_ad(
    State(state): State<AppState>,
    actor: Actor,
    Path(ad_id): Path<Uuid>,
    Json(req): Json<UpdateAdRequest>,
) -> ApiResult<Json<AdRow>> {
    ensure_admin(&actor)?;

    let existing = sqlx::query_as::<_, AdRow>(&format!("SELECT {AD_COLUMNS} FROM ads WHERE id = $1"))
        .bind(ad_id)
        .fetch_optional(&state.db)
        .await
        .map_err(|e| ApiError::internal(e, None))?
        .ok_or(ApiError::NotFound { code: "ad_not_found", trace_id: None })?;

    let updated = sqlx::query_as::<_, AdRow>(&format!(
        "UPDATE ads SET title = $2, image_url = $3, redirect_url = $4, active = $5 \
         WHERE id = $1 RETURNING {AD_COLUMNS}"
    ))
    .bind(ad_id)
    .bind(req.title.unwrap_or(existing.title))
    .bind(req.image_url.unwrap_or(existing.image_url))
    .bind(req.redirect_url.or(existing.redirect_url))
    .bind(req.active.unwrap_or(existing.active))
    .fetch_one(&state.db)
    .await
    .map_err(|e| ApiError::internal(e, None))?;

    Ok(Json(updated))
}

pub async fn delete_ad(
    State(state): State<AppState>,
    actor: Actor,
    Path(ad_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    ensure_admin(&actor)?;
    let result = sqlx::query("DELETE FROM ads WHERE id = $1")
        .bind(ad_id)
        .execute(&state.db)
        .await
        .map_err(|e| ApiError::internal(e, None))?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound { code: "ad_not_found", trace_id: None });
    }
    Ok(Json(serde_json::json!({ "success": true })))
}
