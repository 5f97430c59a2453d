//! Dummy payment gateway
//!
//! Issues local order ids, remembers them in memory and verifies signatures
//! with its own key secret, so the whole checkout flow can be exercised
//! without a merchant account.

use async_trait::async_trait;
use rand::{distributions::Alphanumeric, Rng};
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::{GatewayError, OrderHandle, PaymentGateway, Result};
use crate::config::DummyGatewayConfig;

pub struct DummyGateway {
    key_id: String,
    key_secret: String,
    orders: Mutex<HashMap<String, OrderHandle>>,
}

impl DummyGateway {
    pub fn new(key_id: String, key_secret: String) -> Self {
        Self {
            key_id,
            key_secret,
            orders: Mutex::new(HashMap::new()),
        }
    }

    /// Sign a completed checkout the way the real gateway would
    pub fn sign(&self, order_id: &str, payment_id: &str) -> Option<String> {
        super::sign(order_id, payment_id, &self.key_secret)
    }
}

impl From<DummyGatewayConfig> for DummyGateway {
    fn from(config: DummyGatewayConfig) -> Self {
        Self::new(config.key_id, config.key_secret)
    }
}

/// Gateway-style identifier such as `order_Nq3kP0aZr8TbXc`
pub fn random_id(prefix: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(14)
        .map(char::from)
        .collect();
    format!("{}_{}", prefix, suffix)
}

#[async_trait]
impl PaymentGateway for DummyGateway {
    fn name(&self) -> &'static str {
        "dummy"
    }

    async fn create_order(&self, amount_minor: i64, currency: &str, receipt: &str) -> Result<OrderHandle> {
        if amount_minor <= 0 {
            return Err(GatewayError::InvalidRequest("amount must be positive".to_string()));
        }

        let order_id = random_id("order");
        tracing::info!("Dummy gateway created order {} for receipt {}", order_id, receipt);

        let order = OrderHandle {
            order_id: order_id.clone(),
            amount: amount_minor,
            currency: currency.to_string(),
            key_id: self.key_id.clone(),
            receipt: receipt.to_string(),
        };
        self.orders.lock().await.insert(order_id, order.clone());
        Ok(order)
    }

    async fn fetch_order(&self, order_id: &str) -> Result<OrderHandle> {
        self.orders
            .lock()
            .await
            .get(order_id)
            .cloned()
            .ok_or_else(|| GatewayError::UnknownOrder(order_id.to_string()))
    }

    fn verify_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        super::verify(order_id, payment_id, signature, &self.key_secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_full_checkout_flow() {
        let gateway = DummyGateway::new("dummy_key".to_string(), "dummy-secret".to_string());

        let order = gateway.create_order(2000, "INR", "borrow-4").await.unwrap();
        assert!(order.order_id.starts_with("order_"));
        assert_eq!(order.amount, 2000);
        assert_eq!(order.key_id, "dummy_key");

        let payment_id = random_id("pay");
        let signature = gateway.sign(&order.order_id, &payment_id).unwrap();
        assert!(gateway.verify_signature(&order.order_id, &payment_id, &signature));
        assert!(!gateway.verify_signature(&order.order_id, &random_id("pay"), &signature));

        let fetched = gateway.fetch_order(&order.order_id).await.unwrap();
        assert_eq!(fetched, order);
    }

    #[tokio::test]
    async fn test_unknown_order_lookup() {
        let gateway = DummyGateway::new("k".to_string(), "s".to_string());
        let result = gateway.fetch_order("order_missing").await;
        assert!(matches!(result, Err(GatewayError::UnknownOrder(id)) if id == "order_missing"));
    }

    #[tokio::test]
    async fn test_rejects_empty_orders() {
        let gateway = DummyGateway::new("k".to_string(), "s".to_string());
        assert!(gateway.create_order(0, "INR", "borrow-1").await.is_err());
    }

    #[test]
    fn test_random_id_shape() {
        let id = random_id("pay");
        assert_eq!(id.len(), "pay_".len() + 14);
        assert!(id["pay_".len()..].chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
