use axum::extract::State;
use axum::Json;
use chrono::{Duration, Utc};
use common_http_errors::{ApiError, ApiResult};
use common_money::Money;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::app::{AppState, SETTLEMENTS_TOTAL, STOCK_SHORTFALLS_TOTAL};
use crate::billing::{self, BillLine, BillTotals, PaymentMethod, GST_RATE_BPS};
use crate::gateway::GatewayIntent;
use crate::inventory::{self, InventoryError};
use crate::invoice::{self, InvoiceData, InvoiceLine};

/// Credit sales fall due this many days after commit.
pub const KHATA_DUE_DAYS: i64 = 30;

#[derive(Debug, Deserialize)]
pub struct WalkInIdentity {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BillItemPayload {
    pub spare_part_id: Uuid,
    pub quantity: i32,
    /// Price snapshot taken when the operator built the cart; falls back to
    /// the current catalog price when absent.
    #[serde(default)]
    pub unit_price_cents: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SettlementRequest {
    #[serde(default)]
    pub customer_id: Option<Uuid>,
    #[serde(default)]
    pub walk_in: Option<WalkInIdentity>,
    pub items: Vec<BillItemPayload>,
    #[serde(default)]
    pub discount_cents: i64,
    pub payment_method: String,
}

/// Phase two of the gateway path. The bill snapshot rides along because no
/// server-side state survives between intent creation and the callback.
#[derive(Debug, Deserialize)]
pub struct CompleteSettlementRequest {
    #[serde(flatten)]
    pub bill: SettlementRequest,
    pub intent_id: String,
    pub payment_id: String,
    pub signature: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyPaymentRequest {
    pub intent_id: String,
    pub payment_id: String,
    pub signature: String,
}

#[derive(Debug, Serialize)]
pub struct SettlementResponse {
    pub order_id: Uuid,
    pub payment_status: &'static str,
    pub invoice_url: Option<String>,
    pub grand_total_cents: Money,
    /// Non-fatal inventory shortfalls observed while committing; the order
    /// itself is already persisted when these are reported.
    pub stock_warnings: Vec<String>,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct CustomerRecord {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct ProductPick {
    name: String,
    price_cents: Money,
}

/// A validated bill, ready for the Committing phase.
pub(crate) struct PreparedBill {
    customer: Option<CustomerRecord>,
    walk_in: Option<WalkInIdentity>,
    method: PaymentMethod,
    lines: Vec<BillLine>,
    totals: BillTotals,
}

impl PreparedBill {
    fn customer_display_name(&self) -> String {
        if let Some(walk_in) = &self.walk_in {
            return walk_in.name.trim().to_string();
        }
        self.customer
            .as_ref()
            .and_then(|c| c.full_name.clone())
            .unwrap_or_else(|| "Customer".to_string())
    }

    fn customer_phone(&self) -> Option<String> {
        if let Some(walk_in) = &self.walk_in {
            return walk_in.phone.clone();
        }
        self.customer.as_ref().and_then(|c| c.phone.clone())
    }

    fn customer_email(&self) -> Option<String> {
        self.customer.as_ref().map(|c| c.email.clone())
    }
}

/// Validates a bill for the immediate payment paths. Gateway bills must go
/// through the two-phase intent/complete protocol instead.
async fn prepare_immediate(db: &PgPool, req: &SettlementRequest) -> Result<PreparedBill, ApiError> {
    let method = parse_method(&req.payment_method)?;
    if method == PaymentMethod::Gateway {
        return Err(ApiError::BadRequest {
            code: "gateway_requires_intent",
            trace_id: None,
            message: Some("Gateway payments start at POST /settlements/intent".into()),
        });
    }
    prepare(db, req, method).await
}

async fn prepare_gateway(db: &PgPool, req: &SettlementRequest) -> Result<PreparedBill, ApiError> {
    let method = parse_method(&req.payment_method)?;
    if method != PaymentMethod::Gateway {
        return Err(ApiError::BadRequest {
            code: "invalid_payment_method",
            trace_id: None,
            message: Some("This endpoint only settles gateway payments".into()),
        });
    }
    prepare(db, req, method).await
}

fn parse_method(raw: &str) -> Result<PaymentMethod, ApiError> {
    PaymentMethod::parse(raw).ok_or(ApiError::BadRequest {
        code: "invalid_payment_method",
        trace_id: None,
        message: Some(format!("Unknown payment method '{raw}'")),
    })
}

/// All validation happens here, before a single row is read for writing or
/// written; a rejected draft leaves no trace.
async fn prepare(db: &PgPool, req: &SettlementRequest, method: PaymentMethod) -> Result<PreparedBill, ApiError> {
    if req.items.is_empty() {
        return Err(ApiError::BadRequest {
            code: "empty_bill",
            trace_id: None,
            message: Some("A bill needs at least one line item".into()),
        });
    }
    for item in &req.items {
        if item.quantity <= 0 {
            return Err(ApiError::BadRequest {
                code: "invalid_quantity",
                trace_id: None,
                message: Some(format!("Quantity for product {} must be positive", item.spare_part_id)),
            });
        }
        if item.unit_price_cents.is_some_and(|p| p < 0) {
            return Err(ApiError::BadRequest {
                code: "invalid_unit_price",
                trace_id: None,
                message: Some(format!("Unit price for product {} cannot be negative", item.spare_part_id)),
            });
        }
    }
    if req.discount_cents < 0 {
        return Err(ApiError::bad_request("invalid_discount", None));
    }
    match (&req.customer_id, &req.walk_in) {
        (None, None) => {
            return Err(ApiError::BadRequest {
                code: "customer_required",
                trace_id: None,
                message: Some("Select a registered customer or provide a walk-in identity".into()),
            })
        }
        (Some(_), Some(_)) => {
            return Err(ApiError::bad_request("ambiguous_customer", None));
        }
        _ => {}
    }
    if let Some(walk_in) = &req.walk_in {
        if walk_in.name.trim().is_empty() {
            return Err(ApiError::BadRequest {
                code: "walk_in_name_required",
                trace_id: None,
                message: Some("Walk-in customers need a name".into()),
            });
        }
    }
    if method == PaymentMethod::Credit && req.customer_id.is_none() {
        return Err(ApiError::BadRequest {
            code: "credit_requires_customer",
            trace_id: None,
            message: Some("Credit (khatabook) sales need a registered customer".into()),
        });
    }

    let customer = match req.customer_id {
        Some(id) => Some(
            sqlx::query_as::<_, CustomerRecord>("SELECT id, email, full_name, phone FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(db)
                .await
                .map_err(|e| ApiError::internal(e, None))?
                .ok_or(ApiError::NotFound { code: "customer_not_found", trace_id: None })?,
        ),
        None => None,
    };

    let mut lines = Vec::with_capacity(req.items.len());
    for item in &req.items {
        let product = sqlx::query_as::<_, ProductPick>("SELECT name, price_cents FROM spare_parts WHERE id = $1")
            .bind(item.spare_part_id)
            .fetch_optional(db)
            .await
            .map_err(|e| ApiError::internal(e, None))?
            .ok_or(ApiError::NotFound { code: "product_not_found", trace_id: None })?;
        lines.push(BillLine {
            spare_part_id: item.spare_part_id,
            name: product.name,
            unit_price: item.unit_price_cents.map(Money::from_cents).unwrap_or(product.price_cents),
            quantity: item.quantity,
        });
    }

    let totals = billing::compute(&lines, Money::from_cents(req.discount_cents), GST_RATE_BPS);

    Ok(PreparedBill {
        customer,
        walk_in: req.walk_in.as_ref().map(|w| WalkInIdentity { name: w.name.clone(), phone: w.phone.clone() }),
        method,
        lines,
        totals,
    })
}

/// The Committing phase. Steps run in a fixed order; only the order row and
/// its line items are hard requirements. Inventory, the credit ledger, and
/// the invoice are attempted best-effort, matching the documented
/// consistency contract.
async fn commit(
    state: &AppState,
    bill: &PreparedBill,
    payment_status: &'static str,
    gateway_refs: Option<(&str, &str)>,
) -> Result<SettlementResponse, ApiError> {
    let order_id = Uuid::new_v4();
    let now = Utc::now();
    let (intent_id, payment_id) = match gateway_refs {
        Some((i, p)) => (Some(i), Some(p)),
        None => (None, None),
    };

    // (a) order row; a failure here aborts cleanly with nothing persisted
    sqlx::query(
        "INSERT INTO orders (id, user_id, customer_name, customer_phone, total_amount_cents, \
         payment_status, order_status, payment_method, gateway_intent_id, gateway_payment_id, \
         gst_cents, discount_cents, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
    )
    .bind(order_id)
    .bind(bill.customer.as_ref().map(|c| c.id))
    .bind(bill.customer_display_name())
    .bind(bill.customer_phone())
    .bind(bill.totals.grand_total)
    .bind(payment_status)
    .bind("confirmed")
    .bind(bill.method.as_str())
    .bind(intent_id)
    .bind(payment_id)
    .bind(bill.totals.gst)
    .bind(bill.totals.discount)
    .bind(now)
    .execute(&state.db)
    .await
    .map_err(|e| {
        error!(error = %e, "order insert failed; settlement aborted");
        ApiError::internal(e, None)
    })?;

    // (b) line items; the order row already exists, so a failure here is a
    // partial commit the operator has to reconcile by hand
    for line in &bill.lines {
        sqlx::query(
            "INSERT INTO order_items (id, order_id, spare_part_id, quantity, unit_price_cents) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(Uuid::new_v4())
        .bind(order_id)
        .bind(line.spare_part_id)
        .bind(line.quantity)
        .bind(line.unit_price)
        .execute(&state.db)
        .await
        .map_err(|e| {
            error!(order_id = %order_id, error = %e, "order_items insert failed; manual reconciliation required");
            ApiError::persistence(Some(order_id), e)
        })?;
    }

    // (c) stock decrements, individually atomic, never fatal
    let mut stock_warnings = Vec::new();
    for line in &bill.lines {
        match inventory::decrement_stock_best_effort(&state.db, line.spare_part_id, line.quantity).await {
            Ok(remaining) => {
                info!(order_id = %order_id, spare_part_id = %line.spare_part_id, remaining, "stock decremented");
            }
            Err(InventoryError::InsufficientStock { requested, available }) => {
                STOCK_SHORTFALLS_TOTAL.inc();
                warn!(
                    order_id = %order_id,
                    spare_part_id = %line.spare_part_id,
                    requested,
                    available,
                    "insufficient stock at commit time; order kept"
                );
                stock_warnings.push(format!(
                    "insufficient stock for '{}': requested {}, available {}",
                    line.name, requested, available
                ));
            }
            Err(err) => {
                warn!(order_id = %order_id, spare_part_id = %line.spare_part_id, error = %err, "stock decrement failed");
                stock_warnings.push(format!("stock decrement failed for '{}': {}", line.name, err));
            }
        }
    }

    // (d) credit ledger entry for khatabook sales
    if bill.method == PaymentMethod::Credit {
        if let Some(customer) = &bill.customer {
            let due_date = now + Duration::days(KHATA_DUE_DAYS);
            let result = sqlx::query(
                "INSERT INTO khatabook (id, customer_id, order_id, total_amount_cents, \
                 paid_amount_cents, pending_amount_cents, due_date, status, created_at) \
                 VALUES ($1, $2, $3, $4, 0, $5, $6, 'pending', $7)",
            )
            .bind(Uuid::new_v4())
            .bind(customer.id)
            .bind(order_id)
            .bind(bill.totals.grand_total)
            .bind(bill.totals.grand_total)
            .bind(due_date)
            .bind(now)
            .execute(&state.db)
            .await;
            if let Err(e) = result {
                error!(order_id = %order_id, customer_id = %customer.id, error = %e, "khatabook entry insert failed");
            }
        }
    }

    // (e) invoice document; failure leaves invoice_url unset and retriable
    let number = invoice::invoice_number(order_id, now);
    let data = InvoiceData {
        invoice_number: number,
        order_id,
        date: now,
        customer_name: bill.customer_display_name(),
        customer_email: bill.customer_email(),
        customer_phone: bill.customer_phone(),
        lines: bill
            .lines
            .iter()
            .map(|l| InvoiceLine {
                name: l.name.clone(),
                unit_price: l.unit_price,
                quantity: l.quantity,
                line_total: l.line_total(),
            })
            .collect(),
        subtotal: bill.totals.subtotal,
        discount: bill.totals.discount,
        gst: bill.totals.gst,
        total: bill.totals.grand_total,
        payment_method: bill.method.as_str().to_string(),
        payment_status: payment_status.to_string(),
    };
    let invoice_url = match generate_and_attach_invoice(state, order_id, &data).await {
        Ok(url) => Some(url),
        Err(err) => {
            warn!(order_id = %order_id, error = ?err, "invoice generation failed; retry via POST /orders/{{id}}/invoice");
            None
        }
    };

    SETTLEMENTS_TOTAL
        .with_label_values(&[bill.method.as_str(), payment_status])
        .inc();
    info!(
        order_id = %order_id,
        method = bill.method.as_str(),
        payment_status,
        total_cents = bill.totals.grand_total.cents(),
        "settlement committed"
    );

    Ok(SettlementResponse {
        order_id,
        payment_status,
        invoice_url,
        grand_total_cents: bill.totals.grand_total,
        stock_warnings,
    })
}

/// Renders, uploads, and attaches an invoice to an existing order. Shared
/// by the commit path and the operator-initiated regeneration action.
pub(crate) async fn generate_and_attach_invoice(
    state: &AppState,
    order_id: Uuid,
    data: &InvoiceData,
) -> Result<String, ApiError> {
    let bytes = invoice::render(data);
    let url = state
        .invoices
        .store(bytes, &data.invoice_number)
        .await
        .map_err(|e| ApiError::BadGateway {
            code: "invoice_store_unavailable",
            trace_id: None,
            message: Some(e.to_string()),
        })?;
    sqlx::query("UPDATE orders SET invoice_url = $2 WHERE id = $1")
        .bind(order_id)
        .bind(&url)
        .execute(&state.db)
        .await
        .map_err(|e| ApiError::internal(e, None))?;
    Ok(url)
}

/// POST /settlements — immediate paths (cash, upi, cod, credit).
pub async fn settle(
    State(state): State<AppState>,
    Json(req): Json<SettlementRequest>,
) -> ApiResult<Json<SettlementResponse>> {
    let bill = prepare_immediate(&state.db, &req).await?;
    let payment_status = bill.method.initial_payment_status();
    let outcome = commit(&state, &bill, payment_status, None).await?;
    Ok(Json(outcome))
}

/// POST /settlements/intent — gateway path, phase one. Validates the bill,
/// prices it server-side, and asks the gateway for a payment intent.
/// Nothing is persisted; a later failed verification simply starts over
/// here with a fresh intent.
pub async fn create_settlement_intent(
    State(state): State<AppState>,
    Json(req): Json<SettlementRequest>,
) -> ApiResult<Json<GatewayIntent>> {
    let bill = prepare_gateway(&state.db, &req).await?;
    let intent = state.gateway.create_intent(bill.totals.grand_total).await?;
    info!(
        intent_id = %intent.intent_id,
        amount_minor_units = intent.amount_minor_units,
        "created gateway payment intent"
    );
    Ok(Json(intent))
}

/// POST /settlements/complete — gateway path, phase two. The signature gate
/// comes first: nothing is read or written until the callback proves
/// authentic.
pub async fn complete_settlement(
    State(state): State<AppState>,
    Json(req): Json<CompleteSettlementRequest>,
) -> ApiResult<Json<SettlementResponse>> {
    if req.intent_id.is_empty() || req.payment_id.is_empty() {
        return Err(ApiError::bad_request("missing_gateway_reference", None));
    }
    if !state.gateway.verify_signature(&req.intent_id, &req.payment_id, &req.signature) {
        warn!(intent_id = %req.intent_id, "rejected gateway callback with invalid signature");
        return Err(ApiError::BadRequest {
            code: "invalid_signature",
            trace_id: None,
            message: Some("Payment signature did not match".into()),
        });
    }
    let bill = prepare_gateway(&state.db, &req.bill).await?;
    let outcome = commit(
        &state,
        &bill,
        "paid",
        Some((req.intent_id.as_str(), req.payment_id.as_str())),
    )
    .await?;
    Ok(Json(outcome))
}

/// POST /payments/verify — standalone signature check; a mismatch is a 400
/// distinct from server faults.
pub async fn verify_payment(
    State(state): State<AppState>,
    Json(req): Json<VerifyPaymentRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    if state.gateway.verify_signature(&req.intent_id, &req.payment_id, &req.signature) {
        Ok(Json(serde_json::json!({ "valid": true })))
    } else {
        Err(ApiError::BadRequest {
            code: "invalid_signature",
            trace_id: None,
            message: Some("Payment signature did not match".into()),
        })
    }
}
