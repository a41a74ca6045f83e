use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use common_http_errors::{ApiError, ApiResult};
use common_money::Money;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::actor::{ensure_admin, Actor};
use crate::app::AppState;

const PRODUCT_COLUMNS: &str =
    "id, name, description, car_model, price_cents, stock_quantity, image_url, created_at";

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct SparePartRow {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub car_model: Option<String>,
    pub price_cents: Money,
    pub stock_quantity: i32,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// GET /products — `?in_stock=true` is what the POS picker uses.
pub async fn list_products(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Vec<SparePartRow>>> {
    let in_stock_only = params.get("in_stock").map(String::as_str) == Some("true");

    let products = sqlx::query_as::<_, SparePartRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM spare_parts \
         WHERE ($1 = false OR stock_quantity > 0) \
         ORDER BY name"
    ))
    .bind(in_stock_only)
    .fetch_all(&state.db)
    .await
    .map_err(|e| ApiError::internal(e, None))?;

    Ok(Json(products))
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub car_model: Option<String>,
    pub price_cents: i64,
    #[serde(default)]
    pub stock_quantity: i32,
    #[serde(default)]
    pub image_url: Option<String>,
}

pub async fn create_product(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<CreateProductRequest>,
) -> ApiResult<(StatusCode, Json<SparePartRow>)> {
    ensure_admin(&actor)?;
    if req.name.trim().is_empty() {
        return Err(ApiError::bad_request("name_required", None));
    }
    if req.price_cents < 0 {
        return Err(ApiError::bad_request("invalid_price", None));
    }
    if req.stock_quantity < 0 {
        return Err(ApiError::bad_request("invalid_stock_quantity", None));
    }

    let created = sqlx::query_as::<_, SparePartRow>(&format!(
        "INSERT INTO spare_parts (id, name, description, car_model, price_cents, stock_quantity, image_url) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {PRODUCT_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(req.name.trim())
    .bind(&req.description)
    .bind(&req.car_model)
    .bind(Money::from_cents(req.price_cents))
    .bind(req.stock_quantity)
    .bind(&req.image_url)
    .fetch_one(&state.db)
    .await
    .map_err(|e| ApiError::internal(e, None))?;

    info!(product_id = %created.id, name = %created.name, "product created");
    Ok((StatusCode::CREATED, Json(created)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateProductRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub car_model: Option<String>,
    #[serde(default)]
    pub price_cents: Option<i64>,
    #[serde(default)]
    pub stock_quantity: Option<i32>,
    #[serde(default)]
    pub image_url: Option<String>,
}

pub async fn update_product(
    State(state): State<AppState>,
    actor: Actor,
    Path(product_id): Path<Uuid>,
    Json(req): Json<UpdateProductRequest>,
) -> ApiResult<Json<SparePartRow>> {
    ensure_admin(&actor)?;
    if req.price_cents.is_some_and(|p| p < 0) {
        return Err(ApiError::bad_request("invalid_price", None));
    }
    if req.stock_quantity.is_some_and(|q| q < 0) {
        return Err(ApiError::bad_request("invalid_stock_quantity", None));
    }

    let existing = sqlx::query_as::<_, SparePartRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM spare_parts WHERE id = $1"
    ))
    .bind(product_id)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::internal(e, None))?
    .ok_or(ApiError::NotFound { code: "product_not_found", trace_id: None })?;

    let updated = sqlx::query_as::<_, SparePartRow>(&format!(
        "UPDATE spare_parts \
         SET name = $2, description = $3, car_model = $4, price_cents = $5, stock_quantity = $6, image_url = $7 \
         WHERE id = $1 RETURNING {PRODUCT_COLUMNS}"
    ))
    .bind(product_id)
    .bind(req.name.unwrap_or(existing.name))
    .bind(req.description.or(existing.description))
    .bind(req.car_model.or(existing.car_model))
    .bind(req.price_cents.map(Money::from_cents).unwrap_or(existing.price_cents))
    .bind(req.stock_quantity.unwrap_or(existing.stock_quantity))
    .bind(req.image_url.or(existing.image_url))
    .fetch_one(&state.db)
    .await
    .map_err(|e| ApiError::internal(e, None))?;

    Ok(Json(updated))
}

pub async fn delete_product(
    State(state): State<AppState>,
    actor: Actor,
    Path(product_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    ensure_admin(&actor)?;
    let result = sqlx::query("DELETE FROM spare_parts WHERE id = $1")
        .bind(product_id)
        .execute(&state.db)
        .await
        .map_err(|e| ApiError::internal(e, None))?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound { code: "product_not_found", trace_id: None });
    }
    info!(product_id = %product_id, "product deleted");
    Ok(Json(serde_json::json!({ "success": true })))
}
