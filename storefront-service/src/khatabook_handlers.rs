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

const ENTRY_COLUMNS: &str = "id, customer_id, order_id, total_amount_cents, paid_amount_cents, \
     pending_amount_cents, due_date, status, created_at";

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct KhatabookEntry {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub order_id: Uuid,
    pub total_amount_cents: Money,
    pub paid_amount_cents: Money,
    pub pending_amount_cents: Money,
    pub due_date: DateTime<Utc>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct KhatabookListItem {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub entry: KhatabookEntry,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
}

/// pending = total − paid, never below zero. The only way around this
/// formula is the explicit mark-paid transition (which satisfies it anyway).
pub fn pending_after(total: Money, paid: Money) -> Money {
    total.saturating_sub_floor_zero(paid)
}

/// paid when nothing is pending; overdue once the due date passes; pending
/// otherwise.
pub fn derive_status(pending: Money, due_date: DateTime<Utc>, now: DateTime<Utc>) -> &'static str {
    if pending.is_zero() {
        "paid"
    } else if due_date < now {
        "overdue"
    } else {
        "pending"
    }
}

/// GET /khatabook — the running customer-credit ledger, newest first. The
/// effective status is re-derived at read time so entries flip to overdue
/// without a background sweep.
pub async fn list_entries(
    State(state): State<AppState>,
    actor: Actor,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Vec<KhatabookListItem>>> {
    ensure_admin(&actor)?;
    let customer_id = params.get("customer_id").and_then(|s| Uuid::parse_str(s).ok());

    let mut entries = sqlx::query_as::<_, KhatabookListItem>(
        "SELECT k.id, k.customer_id, k.order_id, k.total_amount_cents, k.paid_amount_cents, \
                k.pending_amount_cents, k.due_date, k.status, k.created_at, \
                u.email AS customer_email, u.full_name AS customer_name, u.phone AS customer_phone \
         FROM khatabook k \
         LEFT JOIN users u ON u.id = k.customer_id \
         WHERE ($1::uuid IS NULL OR k.customer_id = $1) \
         ORDER BY k.created_at DESC",
    )
    .bind(customer_id)
    .fetch_all(&state.db)
    .await
    .map_err(|e| ApiError::internal(e, None))?;

    let now = Utc::now();
    for item in &mut entries {
        item.entry.status =
            derive_status(item.entry.pending_amount_cents, item.entry.due_date, now).to_string();
    }

    Ok(Json(entries))
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateKhatabookRequest {
    #[serde(default)]
    pub paid_amount_cents: Option<i64>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
}

/// PUT /khatabook/:id — `?action=mark-paid` forces paid = total, pending = 0,
/// status = paid regardless of the prior paid amount. A bare body update
/// adjusts paid/due fields and recomputes pending + status from the formula.
pub async fn update_entry(
    State(state): State<AppState>,
    actor: Actor,
    Path(entry_id): Path<Uuid>,
    Query(params): Query<HashMap<String, String>>,
    body: Option<Json<UpdateKhatabookRequest>>,
) -> ApiResult<Json<KhatabookEntry>> {
    ensure_admin(&actor)?;

    if params.get("action").map(String::as_str) == Some("mark-paid") {
        let updated = sqlx::query_as::<_, KhatabookEntry>(&format!(
            "UPDATE khatabook \
             SET paid_amount_cents = total_amount_cents, pending_amount_cents = 0, status = 'paid' \
             WHERE id = $1 RETURNING {ENTRY_COLUMNS}"
        ))
        .bind(entry_id)
        .fetch_optional(&state.db)
        .await
        .map_err(|e| ApiError::internal(e, None))?
        .ok_or(ApiError::NotFound { code: "entry_not_found", trace_id: None })?;

        info!(entry_id = %entry_id, order_id = %updated.order_id, "khatabook entry marked paid");
        return Ok(Json(updated));
    }

    let req = body.map(|Json(req)| req).unwrap_or_default();

    let existing = sqlx::query_as::<_, KhatabookEntry>(&format!(
        "SELECT {ENTRY_COLUMNS} FROM khatabook WHERE id = $1"
    ))
    .bind(entry_id)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::internal(e, None))?
    .ok_or(ApiError::NotFound { code: "entry_not_found", trace_id: None })?;

    let paid = match req.paid_amount_cents {
        Some(cents) if cents < 0 => {
            return Err(ApiError::bad_request("invalid_amount", None));
        }
        Some(cents) => Money::from_cents(cents),
        None => existing.paid_amount_cents,
    };
    let due_date = req.due_date.unwrap_or(existing.due_date);
    let pending = pending_after(existing.total_amount_cents, paid);
    let status = derive_status(pending, due_date, Utc::now());

    let updated = sqlx::query_as::<_, KhatabookEntry>(&format!(
        "UPDATE khatabook \
         SET paid_amount_cents = $2, pending_amount_cents = $3, due_date = $4, status = $5 \
         WHERE id = $1 RETURNING {ENTRY_COLUMNS}"
    ))
    .bind(entry_id)
    .bind(paid)
    .bind(pending)
    .bind(due_date)
    .bind(status)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::internal(e, None))?
    .ok_or(ApiError::NotFound { code: "entry_not_found", trace_id: None })?;

    info!(entry_id = %entry_id, status = %updated.status, "khatabook entry updated");
    Ok(Json(updated))
}
