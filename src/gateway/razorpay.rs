//! Razorpay orders API client

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{GatewayError, OrderHandle, PaymentGateway, Result};
use crate::config::RazorpayConfig;

/// Razorpay gateway
pub struct RazorpayGateway {
    client: reqwest::Client,
    key_id: String,
    key_secret: String,
    base_url: String,
}

impl RazorpayGateway {
    pub fn new(key_id: String, key_secret: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            key_id,
            key_secret,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl From<RazorpayConfig> for RazorpayGateway {
    fn from(config: RazorpayConfig) -> Self {
        Self::new(config.key_id, config.key_secret, config.base_url)
    }
}

#[derive(Serialize)]
struct CreateOrderBody<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
}

#[derive(Deserialize)]
struct OrderResponse {
    id: String,
    amount: i64,
    currency: String,
    #[serde(default)]
    receipt: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    description: String,
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    fn name(&self) -> &'static str {
        "razorpay"
    }

    async fn create_order(&self, amount_minor: i64, currency: &str, receipt: &str) -> Result<OrderHandle> {
        // Razorpay rejects orders below one major unit
        if amount_minor < 100 {
            return Err(GatewayError::InvalidRequest(format!(
                "amount {} is below the gateway minimum",
                amount_minor
            )));
        }

        let response = self
            .client
            .post(format!("{}/v1/orders", self.base_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&CreateOrderBody {
                amount: amount_minor,
                currency,
                receipt,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let description = error_description(response).await;
            tracing::error!("Razorpay order creation failed ({}): {}", status, description);
            return Err(GatewayError::Api(description));
        }

        let order: OrderResponse = response.json().await?;
        tracing::info!("Created Razorpay order {} for receipt {}", order.id, receipt);

        Ok(OrderHandle {
            order_id: order.id,
            amount: order.amount,
            currency: order.currency,
            key_id: self.key_id.clone(),
            receipt: receipt.to_string(),
        })
    }

    async fn fetch_order(&self, order_id: &str) -> Result<OrderHandle> {
        let response = self
            .client
            .get(format!("{}/v1/orders/{}", self.base_url, order_id))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::BAD_REQUEST {
            return Err(GatewayError::UnknownOrder(order_id.to_string()));
        }
        if !status.is_success() {
            let description = error_description(response).await;
            tracing::error!("Razorpay order lookup for {} failed ({}): {}", order_id, status, description);
            return Err(GatewayError::Api(description));
        }

        let order: OrderResponse = response.json().await?;
        Ok(OrderHandle {
            order_id: order.id,
            amount: order.amount,
            currency: order.currency,
            key_id: self.key_id.clone(),
            receipt: order.receipt.unwrap_or_default(),
        })
    }

    fn verify_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        super::verify(order_id, payment_id, signature, &self.key_secret)
    }
}

async fn error_description(response: reqwest::Response) -> String {
    let status = response.status();
    response
        .json::<ErrorEnvelope>()
        .await
        .map(|e| e.error.description)
        .unwrap_or_else(|_| status.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> RazorpayGateway {
        RazorpayGateway::new(
            "rzp_test_key".to_string(),
            "rzp_secret".to_string(),
            "https://api.razorpay.com/".to_string(),
        )
    }

    #[test]
    fn test_base_url_is_normalised() {
        assert_eq!(gateway().base_url, "https://api.razorpay.com");
    }

    #[test]
    fn test_verifies_with_key_secret() {
        let gw = gateway();
        let signature = super::super::sign("order_1", "pay_1", "rzp_secret").unwrap();
        assert!(gw.verify_signature("order_1", "pay_1", &signature));
        assert!(!gw.verify_signature("order_1", "pay_2", &signature));
    }

    #[tokio::test]
    async fn test_rejects_amount_below_minimum_without_calling_out() {
        let result = gateway().create_order(50, "INR", "borrow-1").await;
        assert!(matches!(result, Err(GatewayError::InvalidRequest(_))));
    }
}
