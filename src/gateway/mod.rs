//! Online payment gateway abstraction
//!
//! The ledger needs three things from a gateway: an order to show the
//! payer, a way to read that order back, and a way to check the signature
//! the gateway hands back once the payer has completed checkout. Signatures follow the Razorpay scheme:
//! hex-encoded HMAC-SHA256 over `"{order_id}|{payment_id}"`, keyed with the
//! merchant key secret.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::config::GatewayConfig;

pub mod dummy;
pub mod razorpay;

type HmacSha256 = Hmac<Sha256>;

/// Result type for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Errors raised while talking to the payment gateway
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway API error: {0}")]
    Api(String),

    #[error("gateway request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid order request: {0}")]
    InvalidRequest(String),

    #[error("unknown order: {0}")]
    UnknownOrder(String),
}

/// Order created on the gateway, handed to the payer's checkout widget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OrderHandle {
    pub order_id: String,
    /// Amount in the currency's minor unit
    pub amount: i64,
    pub currency: String,
    /// Merchant's publishable key, needed by the checkout widget
    pub key_id: String,
    pub receipt: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Short provider name used in logs
    fn name(&self) -> &'static str;

    /// Create an order for `amount_minor` units of `currency`
    async fn create_order(&self, amount_minor: i64, currency: &str, receipt: &str) -> Result<OrderHandle>;

    /// Look up an order previously created on the gateway
    async fn fetch_order(&self, order_id: &str) -> Result<OrderHandle>;

    /// Check the signature returned by checkout for this order/payment pair
    fn verify_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool;
}

/// Build the configured gateway
pub fn create_gateway(config: GatewayConfig) -> Arc<dyn PaymentGateway> {
    match config {
        GatewayConfig::Razorpay(cfg) => Arc::new(razorpay::RazorpayGateway::from(cfg)),
        GatewayConfig::Dummy(cfg) => Arc::new(dummy::DummyGateway::from(cfg)),
    }
}

fn checkout_mac(order_id: &str, payment_id: &str, key_secret: &str) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(key_secret.as_bytes()).ok()?;
    mac.update(format!("{}|{}", order_id, payment_id).as_bytes());
    Some(mac)
}

/// Compute the checkout signature for an order/payment pair
pub fn sign(order_id: &str, payment_id: &str, key_secret: &str) -> Option<String> {
    let mac = checkout_mac(order_id, payment_id, key_secret)?;
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time check of a hex checkout signature
pub fn verify(order_id: &str, payment_id: &str, signature: &str, key_secret: &str) -> bool {
    let Ok(provided) = hex::decode(signature.trim()) else {
        return false;
    };
    let Some(mac) = checkout_mac(order_id, payment_id, key_secret) else {
        return false;
    };
    mac.verify_slice(&provided).is_ok()
}
