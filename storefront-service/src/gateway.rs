use std::env;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Context;
use async_trait::async_trait;
use common_http_errors::ApiError;
use common_money::Money;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const CURRENCY: &str = "INR";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway unreachable: {0}")]
    Unavailable(String),
    #[error("gateway rejected intent: {0}")]
    Rejected(String),
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        ApiError::gateway_unavailable(err)
    }
}

/// Handle for a pending external payment. `amount_minor_units` is what the
/// remote service will collect; every amount in this system is already in
/// minor units so the adapter passes cents through unchanged.
#[derive(Debug, Clone, serde::Serialize)]
pub struct GatewayIntent {
    pub intent_id: String,
    pub amount_minor_units: i64,
    pub currency: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_intent(&self, amount: Money) -> Result<GatewayIntent, GatewayError>;

    /// Checks the callback signature: HMAC-SHA256 over `intent|payment`
    /// under the gateway secret, hex encoded, compared in constant time.
    fn verify_signature(&self, intent_id: &str, payment_id: &str, signature: &str) -> bool;
}

fn expected_signature(secret: &str, intent_id: &str, payment_id: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac accepts any key length");
    mac.update(format!("{intent_id}|{payment_id}").as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

fn signature_matches(secret: &str, intent_id: &str, payment_id: &str, signature: &str) -> bool {
    let expected = expected_signature(secret, intent_id, payment_id);
    expected.as_bytes().ct_eq(signature.as_bytes()).unwrap_u8() == 1
}

/// Production adapter. The only component holding the gateway secret.
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

#[derive(Deserialize)]
struct CreateIntentResponse {
    id: String,
    amount: i64,
    currency: String,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>, key_id: impl Into<String>, key_secret: impl Into<String>) -> Self {
        HttpGateway {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            key_id: key_id.into(),
            key_secret: key_secret.into(),
        }
    }

    pub fn from_env() -> anyhow::Result<Self> {
        let base_url = env::var("GATEWAY_URL").unwrap_or_else(|_| "http://localhost:8090".to_string());
        let key_id = env::var("GATEWAY_KEY_ID").context("GATEWAY_KEY_ID must be set")?;
        let key_secret = env::var("GATEWAY_KEY_SECRET").context("GATEWAY_KEY_SECRET must be set")?;
        Ok(Self::new(base_url, key_id, key_secret))
    }
}

#[async_trait]
impl PaymentGateway for HttpGateway {
    async fn create_intent(&self, amount: Money) -> Result<GatewayIntent, GatewayError> {
        let receipt = format!("pos_{}", chrono::Utc::now().timestamp_millis());
        let resp = self
            .client
            .post(format!("{}/orders", self.base_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&serde_json::json!({
                "amount": amount.cents(),
                "currency": CURRENCY,
                "receipt": receipt,
            }))
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(GatewayError::Rejected(format!("status {}", resp.status())));
        }

        let body: CreateIntentResponse =
            resp.json().await.map_err(|e| GatewayError::Unavailable(e.to_string()))?;
        Ok(GatewayIntent {
            intent_id: body.id,
            amount_minor_units: body.amount,
            currency: body.currency,
        })
    }

    fn verify_signature(&self, intent_id: &str, payment_id: &str, signature: &str) -> bool {
        signature_matches(&self.key_secret, intent_id, payment_id, signature)
    }
}

/// Deterministic in-process gateway for tests: hands out sequential intent
/// ids and signs callbacks with the same HMAC scheme as the real adapter.
pub struct StubGateway {
    secret: String,
    counter: AtomicU64,
}

impl StubGateway {
    pub fn new(secret: impl Into<String>) -> Self {
        StubGateway { secret: secret.into(), counter: AtomicU64::new(0) }
    }

    /// Produces the signature a genuine callback would carry.
    pub fn sign(&self, intent_id: &str, payment_id: &str) -> String {
        expected_signature(&self.secret, intent_id, payment_id)
    }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn create_intent(&self, amount: Money) -> Result<GatewayIntent, GatewayError> {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(GatewayIntent {
            intent_id: format!("stub_intent_{seq}"),
            amount_minor_units: amount.cents(),
            currency: CURRENCY.to_string(),
        })
    }

    fn verify_signature(&self, intent_id: &str, payment_id: &str, signature: &str) -> bool {
        signature_matches(&self.secret, intent_id, payment_id, signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_signature_verifies() {
        let gw = StubGateway::new("test_secret");
        let sig = gw.sign("intent_1", "pay_1");
        assert!(gw.verify_signature("intent_1", "pay_1", &sig));
    }

    #[test]
    fn signature_is_bound_to_both_ids() {
        let gw = StubGateway::new("test_secret");
        let sig = gw.sign("intent_1", "pay_1");
        assert!(!gw.verify_signature("intent_2", "pay_1", &sig));
        assert!(!gw.verify_signature("intent_1", "pay_2", &sig));
    }

    #[tokio::test]
    async fn stub_intents_are_sequential_and_in_minor_units() {
        let gw = StubGateway::new("test_secret");
        let first = gw.create_intent(Money::from_cents(29_500)).await.unwrap();
        let second = gw.create_intent(Money::from_cents(100)).await.unwrap();
        assert_eq!(first.intent_id, "stub_intent_1");
        assert_eq!(second.intent_id, "stub_intent_2");
        assert_eq!(first.amount_minor_units, 29_500);
        assert_eq!(first.currency, "INR");
    }
}
