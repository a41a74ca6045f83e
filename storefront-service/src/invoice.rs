use std::collections::HashMap;
use std::env;
use std::fmt::Write as _;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common_money::Money;
use thiserror::Error;
use uuid::Uuid;

/// Everything the invoice document shows, snapshotted at generation time so
/// regenerating later yields the same figures even if the catalog moved on.
#[derive(Debug, Clone)]
pub struct InvoiceData {
    pub invoice_number: String,
    pub order_id: Uuid,
    pub date: DateTime<Utc>,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub lines: Vec<InvoiceLine>,
    pub subtotal: Money,
    pub discount: Money,
    pub gst: Money,
    pub total: Money,
    pub payment_method: String,
    pub payment_status: String,
}

#[derive(Debug, Clone)]
pub struct InvoiceLine {
    pub name: String,
    pub unit_price: Money,
    pub quantity: i32,
    pub line_total: Money,
}

/// Unique per generation so a regenerated document never overwrites an
/// earlier blob for the same order.
pub fn invoice_number(order_id: Uuid, at: DateTime<Utc>) -> String {
    let simple = order_id.simple().to_string();
    format!("INV-{}-{}", &simple[..8], at.timestamp())
}

/// Renders the invoice document. Pure and deterministic: identical input
/// data produces identical bytes.
pub fn render(data: &InvoiceData) -> Vec<u8> {
    let mut doc = String::new();
    let _ = writeln!(doc, "CAR SPARE PARTS CO.");
    let _ = writeln!(doc, "TAX INVOICE");
    let _ = writeln!(doc);
    let _ = writeln!(doc, "Invoice #: {}", data.invoice_number);
    let _ = writeln!(doc, "Order ID : {}", data.order_id);
    let _ = writeln!(doc, "Date     : {}", data.date.format("%Y-%m-%d"));
    let _ = writeln!(doc);
    let _ = writeln!(doc, "Bill To  : {}", data.customer_name);
    if let Some(email) = &data.customer_email {
        let _ = writeln!(doc, "Email    : {}", email);
    }
    if let Some(phone) = &data.customer_phone {
        let _ = writeln!(doc, "Phone    : {}", phone);
    }
    let _ = writeln!(doc);
    let _ = writeln!(doc, "{:<40} {:>5} {:>12} {:>12}", "Item", "Qty", "Price", "Total");
    let _ = writeln!(doc, "{}", "-".repeat(72));
    for line in &data.lines {
        let name: String = line.name.chars().take(40).collect();
        let _ = writeln!(
            doc,
            "{:<40} {:>5} {:>12} {:>12}",
            name,
            line.quantity,
            format!("Rs. {}", line.unit_price),
            format!("Rs. {}", line.line_total),
        );
    }
    let _ = writeln!(doc, "{}", "-".repeat(72));
    let _ = writeln!(doc, "{:>59} {:>12}", "Subtotal:", format!("Rs. {}", data.subtotal));
    if !data.discount.is_zero() {
        let _ = writeln!(doc, "{:>59} {:>12}", "Discount:", format!("-Rs. {}", data.discount));
    }
    let _ = writeln!(doc, "{:>59} {:>12}", "GST (18%):", format!("Rs. {}", data.gst));
    let _ = writeln!(doc, "{:>59} {:>12}", "TOTAL:", format!("Rs. {}", data.total));
    let _ = writeln!(doc);
    let _ = writeln!(doc, "Payment Method: {}", data.payment_method.to_uppercase());
    let _ = writeln!(doc, "Payment Status: {}", data.payment_status.to_uppercase());
    let _ = writeln!(doc);
    let _ = writeln!(doc, "Thank you for your business!");
    doc.into_bytes()
}

#[derive(Debug, Error)]
pub enum InvoiceError {
    #[error("invoice upload failed: {0}")]
    Upload(String),
}

/// Blob store for rendered invoices; returns the durable public URL the
/// caller attaches to the order. The store never touches the orders table.
#[async_trait]
pub trait InvoiceStore: Send + Sync {
    async fn store(&self, bytes: Vec<u8>, invoice_number: &str) -> Result<String, InvoiceError>;
}

pub struct HttpInvoiceStore {
    client: reqwest::Client,
    store_url: String,
    public_base_url: String,
}

impl HttpInvoiceStore {
    pub fn new(store_url: impl Into<String>, public_base_url: impl Into<String>) -> Self {
        HttpInvoiceStore {
            client: reqwest::Client::new(),
            store_url: store_url.into(),
            public_base_url: public_base_url.into(),
        }
    }

    pub fn from_env() -> Self {
        let store_url = env::var("INVOICE_STORE_URL").unwrap_or_else(|_| "http://localhost:8091/invoices".to_string());
        let public_base_url = env::var("INVOICE_PUBLIC_BASE_URL").unwrap_or_else(|_| store_url.clone());
        Self::new(store_url, public_base_url)
    }
}

#[async_trait]
impl InvoiceStore for HttpInvoiceStore {
    async fn store(&self, bytes: Vec<u8>, invoice_number: &str) -> Result<String, InvoiceError> {
        let resp = self
            .client
            .put(format!("{}/{}.pdf", self.store_url, invoice_number))
            .header(reqwest::header::CONTENT_TYPE, "application/pdf")
            .body(bytes)
            .send()
            .await
            .map_err(|e| InvoiceError::Upload(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(InvoiceError::Upload(format!("status {}", resp.status())));
        }
        Ok(format!("{}/{}.pdf", self.public_base_url, invoice_number))
    }
}

/// In-process store used by tests.
#[derive(Default)]
pub struct MemoryInvoiceStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryInvoiceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, invoice_number: &str) -> Option<Vec<u8>> {
        self.blobs.lock().expect("invoice store lock").get(invoice_number).cloned()
    }
}

#[async_trait]
impl InvoiceStore for MemoryInvoiceStore {
    async fn store(&self, bytes: Vec<u8>, invoice_number: &str) -> Result<String, InvoiceError> {
        self.blobs
            .lock()
            .expect("invoice store lock")
            .insert(invoice_number.to_string(), bytes);
        Ok(format!("memory://invoices/{}.pdf", invoice_number))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> InvoiceData {
        InvoiceData {
            invoice_number: "INV-abcd1234-1700000000".into(),
            order_id: Uuid::nil(),
            date: Utc.with_ymd_and_hms(2026, 1, 15, 10, 30, 0).unwrap(),
            customer_name: "Walk-in Customer".into(),
            customer_email: None,
            customer_phone: Some("9876543210".into()),
            lines: vec![InvoiceLine {
                name: "Brake Pad".into(),
                unit_price: Money::from_cents(10_000),
                quantity: 2,
                line_total: Money::from_cents(20_000),
            }],
            subtotal: Money::from_cents(25_000),
            discount: Money::zero(),
            gst: Money::from_cents(4_500),
            total: Money::from_cents(29_500),
            payment_method: "cash".into(),
            payment_status: "paid".into(),
        }
    }

    #[test]
    fn render_is_deterministic() {
        assert_eq!(render(&sample()), render(&sample()));
    }

    #[test]
    fn render_shows_totals_and_status() {
        let text = String::from_utf8(render(&sample())).unwrap();
        assert!(text.contains("Rs. 295.00"));
        assert!(text.contains("GST (18%):"));
        assert!(text.contains("Payment Status: PAID"));
        assert!(text.contains("Brake Pad"));
    }

    #[test]
    fn invoice_numbers_are_unique_per_generation() {
        let order_id = Uuid::new_v4();
        let first = invoice_number(order_id, Utc.timestamp_opt(1_700_000_000, 0).unwrap());
        let second = invoice_number(order_id, Utc.timestamp_opt(1_700_000_001, 0).unwrap());
        assert_ne!(first, second);
        assert!(first.starts_with("INV-"));
    }

    #[tokio::test]
    async fn memory_store_returns_durable_url() {
        let store = MemoryInvoiceStore::new();
        let url = store.store(b"doc".to_vec(), "INV-x-1").await.unwrap();
        assert_eq!(url, "memory://invoices/INV-x-1.pdf");
        assert_eq!(store.get("INV-x-1"), Some(b"doc".to_vec()));
    }
}
