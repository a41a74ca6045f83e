use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use common_http_errors::{ApiError, ApiResult};
use common_money::Money;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::actor::{ensure_admin, Actor};
use crate::app::AppState;
use crate::invoice::{self, InvoiceData, InvoiceLine};
use crate::settlement_handlers::generate_and_attach_invoice;

/// Operator-controlled fulfillment states; independent of payment status.
pub const FULFILLMENT_STATUSES: &[&str] = &[
    "booked",
    "confirmed",
    "processing",
    "packed",
    "shipped",
    "delivered",
    "cancelled",
];

const ORDER_COLUMNS: &str = "id, user_id, customer_name, customer_phone, total_amount_cents, \
     payment_status, order_status, payment_method, gateway_intent_id, gateway_payment_id, \
     invoice_url, gst_cents, discount_cents, created_at";

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct OrderRow {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub total_amount_cents: Money,
    pub payment_status: String,
    pub order_status: String,
    pub payment_method: String,
    pub gateway_intent_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub invoice_url: Option<String>,
    pub gst_cents: Money,
    pub discount_cents: Money,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct OrderItemView {
    pub id: Uuid,
    pub spare_part_id: Uuid,
    pub name: Option<String>,
    pub quantity: i32,
    pub unit_price_cents: Money,
}

#[derive(Debug, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: OrderRow,
    pub items: Vec<OrderItemView>,
}

pub async fn list_orders(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Vec<OrderRow>>> {
    let user_id = params.get("user_id").and_then(|s| Uuid::parse_str(s).ok());
    let payment_status = params.get("payment_status").filter(|s| s.as_str() != "all").cloned();

    let orders = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders \
         WHERE ($1::uuid IS NULL OR user_id = $1) \
           AND ($2::text IS NULL OR payment_status = $2) \
         ORDER BY created_at DESC"
    ))
    .bind(user_id)
    .bind(payment_status)
    .fetch_all(&state.db)
    .await
    .map_err(|e| ApiError::internal(e, None))?;

    Ok(Json(orders))
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> ApiResult<Json<OrderDetail>> {
    let order = fetch_order(&state, order_id).await?;
    let items = fetch_items(&state, order_id).await?;
    Ok(Json(OrderDetail { order, items }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub order_status: String,
}

/// PUT /orders/:id — one-field fulfillment transition; no inventory or
/// ledger side effects.
pub async fn update_order_status(
    State(state): State<AppState>,
    actor: Actor,
    Path(order_id): Path<Uuid>,
    Json(req): Json<UpdateOrderStatusRequest>,
) -> ApiResult<Json<OrderRow>> {
    ensure_admin(&actor)?;
    let status = req.order_status.trim().to_ascii_lowercase();
    if !FULFILLMENT_STATUSES.contains(&status.as_str()) {
        return Err(ApiError::BadRequest {
            code: "invalid_order_status",
            trace_id: None,
            message: Some(format!("Unknown order status '{}'", req.order_status)),
        });
    }

    let updated = sqlx::query_as::<_, OrderRow>(&format!(
        "UPDATE orders SET order_status = $2 WHERE id = $1 RETURNING {ORDER_COLUMNS}"
    ))
    .bind(order_id)
    .bind(&status)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::internal(e, None))?
    .ok_or(ApiError::NotFound { code: "order_not_found", trace_id: None })?;

    info!(order_id = %order_id, order_status = %status, "order status updated");
    Ok(Json(updated))
}

#[derive(Debug, Serialize)]
pub struct RegenerateInvoiceResponse {
    pub order_id: Uuid,
    pub invoice_url: String,
}

/// POST /orders/:id/invoice — rebuilds the invoice from the persisted order
/// snapshot. This is the recovery path when step (e) of a settlement failed.
pub async fn regenerate_invoice(
    State(state): State<AppState>,
    actor: Actor,
    Path(order_id): Path<Uuid>,
) -> ApiResult<Json<RegenerateInvoiceResponse>> {
    ensure_admin(&actor)?;
    let order = fetch_order(&state, order_id).await?;
    let items = fetch_items(&state, order_id).await?;

    let customer_email = match order.user_id {
        Some(user_id) => sqlx::query_scalar::<_, String>("SELECT email FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&state.db)
            .await
            .map_err(|e| ApiError::internal(e, None))?,
        None => None,
    };

    let now = Utc::now();
    // subtotal is reconstructible: total = subtotal - discount + gst
    let subtotal = order.total_amount_cents + order.discount_cents - order.gst_cents;
    let data = InvoiceData {
        invoice_number: invoice::invoice_number(order_id, now),
        order_id,
        date: order.created_at,
        customer_name: order.customer_name.clone().unwrap_or_else(|| "Customer".to_string()),
        customer_email,
        customer_phone: order.customer_phone.clone(),
        lines: items
            .iter()
            .map(|item| InvoiceLine {
                name: item.name.clone().unwrap_or_else(|| item.spare_part_id.to_string()),
                unit_price: item.unit_price_cents,
                quantity: item.quantity,
                line_total: item.unit_price_cents.multiply_quantity(item.quantity as i64),
            })
            .collect(),
        subtotal,
        discount: order.discount_cents,
        gst: order.gst_cents,
        total: order.total_amount_cents,
        payment_method: order.payment_method.clone(),
        payment_status: order.payment_status.clone(),
    };

    let invoice_url = generate_and_attach_invoice(&state, order_id, &data).await?;
    info!(order_id = %order_id, invoice_url = %invoice_url, "invoice regenerated");
    Ok(Json(RegenerateInvoiceResponse { order_id, invoice_url }))
}

async fn fetch_order(state: &AppState, order_id: Uuid) -> Result<OrderRow, ApiError> {
    sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
        .bind(order_id)
        .fetch_optional(&state.db)
        .await
        .map_err(|e| ApiError::internal(e, None))?
        .ok_or(ApiError::NotFound { code: "order_not_found", trace_id: None })
}

async fn fetch_items(state: &AppState, order_id: Uuid) -> Result<Vec<OrderItemView>, ApiError> {
    sqlx::query_as::<_, OrderItemView>(
        "SELECT oi.id, oi.spare_part_id, sp.name, oi.quantity, oi.unit_price_cents \
         FROM order_items oi \
         LEFT JOIN spare_parts sp ON sp.id = oi.spare_part_id \
         WHERE oi.order_id = $1 \
         ORDER BY oi.id",
    )
    .bind(order_id)
    .fetch_all(&state.db)
    .await
    .map_err(|e| ApiError::internal(e, None))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fulfillment_statuses_cover_the_order_lifecycle() {
        for status in ["booked", "confirmed", "shipped", "delivered", "cancelled"] {
            assert!(FULFILLMENT_STATUSES.contains(&status));
        }
        assert!(!FULFILLMENT_STATUSES.contains(&"paid"));
    }
}
