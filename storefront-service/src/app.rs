use std::sync::Arc;

use axum::http::{
    header::{ACCEPT, CONTENT_TYPE},
    HeaderName, HeaderValue, Method, StatusCode,
};
use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use sqlx::PgPool;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::ad_handlers::{create_ad, delete_ad, list_ads, update_ad};
use crate::gateway::PaymentGateway;
use crate::invoice::InvoiceStore;
use crate::khatabook_handlers::{list_entries, update_entry};
use crate::order_handlers::{get_order, list_orders, regenerate_invoice, update_order_status};
use crate::product_handlers::{create_product, delete_product, list_products, update_product};
use crate::settlement_handlers::{
    complete_settlement, create_settlement_intent, settle, verify_payment,
};

// --- Service metrics (mirrors the error-metrics layout of sibling services) ---
pub static STOREFRONT_REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

static HTTP_ERRORS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let v = IntCounterVec::new(
        Opts::new("http_errors_total", "Count of HTTP error responses emitted (status >= 400)"),
        &["service", "code", "status"],
    )
    .unwrap();
    STOREFRONT_REGISTRY.register(Box::new(v.clone())).ok();
    v
});

pub static SETTLEMENTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let v = IntCounterVec::new(
        Opts::new("settlements_total", "Settlements committed, by method and payment status"),
        &["method", "payment_status"],
    )
    .unwrap();
    STOREFRONT_REGISTRY.register(Box::new(v.clone())).ok();
    v
});

pub static STOCK_SHORTFALLS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let c = IntCounter::new(
        "settlement_stock_shortfalls_total",
        "Line items that could not decrement stock during a commit",
    )
    .unwrap();
    STOREFRONT_REGISTRY.register(Box::new(c.clone())).ok();
    c
});

pub async fn http_error_metrics(
    req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let resp = next.run(req).await;
    let status = resp.status();
    if status.as_u16() >= 400 {
        let code = resp
            .headers()
            .get("X-Error-Code")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown");
        HTTP_ERRORS_TOTAL
            .with_label_values(&["storefront-service", code, status.as_str()])
            .inc();
    }
    resp
}

pub async fn health() -> &'static str {
    "ok"
}

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub gateway: Arc<dyn PaymentGateway>,
    pub invoices: Arc<dyn InvoiceStore>,
}

async fn metrics() -> (StatusCode, String) {
    let encoder = TextEncoder::new();
    let families = STOREFRONT_REGISTRY.gather();
    let mut buf = Vec::new();
    if let Err(e) = encoder.encode(&families, &mut buf) {
        return (StatusCode::INTERNAL_SERVER_ERROR, format!("metrics encode error: {e}"));
    }
    (StatusCode::OK, String::from_utf8_lossy(&buf).to_string())
}

pub fn build_router(state: AppState) -> Router {
    let allowed_origins = [
        "http://localhost:3000",
        "http://localhost:3001",
        "http://localhost:5173",
    ];
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(
            allowed_origins
                .iter()
                .filter_map(|o| o.parse::<HeaderValue>().ok())
                .collect::<Vec<_>>(),
        ))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            ACCEPT,
            CONTENT_TYPE,
            HeaderName::from_static("x-actor-id"),
            HeaderName::from_static("x-actor-role"),
        ]);

    Router::new()
        .route("/healthz", get(health))
        // Settlement: one-shot paths plus the two-phase gateway protocol
        .route("/settlements", post(settle))
        .route("/settlements/intent", post(create_settlement_intent))
        .route("/settlements/complete", post(complete_settlement))
        .route("/payments/verify", post(verify_payment))
        // Back-office order surface
        .route("/orders", get(list_orders))
        .route("/orders/:order_id", get(get_order).put(update_order_status))
        .route("/orders/:order_id/invoice", post(regenerate_invoice))
        // Customer-credit ledger
        .route("/khatabook", get(list_entries))
        .route("/khatabook/:entry_id", put(update_entry))
        // Catalog
        .route("/products", get(list_products).post(create_product))
        .route("/products/:product_id", put(update_product).delete(delete_product))
        // Storefront banners
        .route("/ads", get(list_ads).post(create_ad))
        .route("/ads/:ad_id", put(update_ad).delete(delete_ad))
        .route("/internal/metrics", get(metrics))
        .route("/metrics", get(metrics))
        .with_state(state)
        .layer(cors)
        .layer(middleware::from_fn(http_error_metrics))
}
