//! Payment receipt model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::text_enum;

/// Only settled payments are ever recorded
pub const PAYMENT_STATUS_PAID: &str = "PAID";

/// How a fine was settled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Card,
    Gateway,
}

text_enum!(PaymentMethod {
    Cash => "cash",
    Card => "card",
    Gateway => "gateway",
});

impl PaymentMethod {
    /// Methods a librarian can record at the desk
    pub fn is_manual(&self) -> bool {
        matches!(self, PaymentMethod::Cash | PaymentMethod::Card)
    }
}

/// Append-only payment receipt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Payment {
    pub id: i32,
    pub user_id: i32,
    pub borrow_id: i32,
    pub amount: i32,
    pub status: String,
    pub method: PaymentMethod,
    pub transaction_id: String,
    pub date: DateTime<Utc>,
}

/// Settlement about to be written for a borrow's fine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub method: PaymentMethod,
    pub transaction_id: String,
    pub date: DateTime<Utc>,
    /// Minor units a gateway actually collected; must cover the fine exactly
    pub amount_minor: Option<i64>,
}

/// Fine in whole currency units expressed in the gateway's minor unit
pub fn fine_in_minor_units(fine: i32) -> i64 {
    i64::from(fine) * 100
}

/// Unique receipt identifier for desk payments
pub fn new_transaction_id() -> String {
    format!("TXN-{}", Uuid::new_v4().simple())
}

/// Manual (desk) payment request
#[derive(Debug, Deserialize, ToSchema)]
pub struct ManualPayment {
    /// `cash` or `card`
    pub method: PaymentMethod,
}

/// Gateway checkout confirmation posted back by the payer
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct GatewayConfirmation {
    #[validate(length(min = 1, max = 64))]
    pub order_id: String,
    #[validate(length(min = 1, max = 64))]
    pub payment_id: String,
    #[validate(length(min = 1, max = 256))]
    pub signature: String,
}
