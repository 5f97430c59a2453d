//! Borrow ledger: borrowing, returns, overdue fines and their settlement
//!
//! State machine per borrow: `borrowed -> returned`. The fine starts at zero,
//! may become positive on an overdue return, and goes back to zero through
//! exactly one settlement, either recorded at the desk or confirmed by the
//! payment gateway.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::{
    config::LedgerConfig,
    error::{AppError, AppResult, LedgerError},
    gateway::{GatewayError, OrderHandle, PaymentGateway},
    models::{
        borrow::{Borrow, BorrowDetails, BorrowQuery, FinePolicy, LedgerStats},
        payment::{
            fine_in_minor_units, new_transaction_id, GatewayConfirmation, Payment, PaymentMethod, Settlement,
        },
    },
};

/// Persistence the ledger runs on. Every mutating method is atomic: it
/// either applies all of its writes or none of them.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Check role and limit, take a copy off the shelf and record the borrow
    async fn open_borrow(&self, user_id: i32, book_id: i32, max_active: i64, now: DateTime<Utc>) -> AppResult<Borrow>;

    /// Mark a borrowed book returned, store its fine and shelve the copy
    async fn close_borrow(&self, borrow_id: i32, returned_at: DateTime<Utc>, policy: FinePolicy) -> AppResult<Borrow>;

    /// Record a payment for the full outstanding fine and clear it
    async fn settle_fine(&self, borrow_id: i32, settlement: Settlement) -> AppResult<Payment>;

    async fn get_borrow(&self, borrow_id: i32) -> AppResult<Borrow>;

    async fn list_borrows(&self, user_id: Option<i32>, query: BorrowQuery) -> AppResult<Vec<BorrowDetails>>;

    async fn list_payments(&self, user_id: Option<i32>) -> AppResult<Vec<Payment>>;

    async fn stats(&self, overdue_cutoff: DateTime<Utc>) -> AppResult<LedgerStats>;
}

/// Gateway receipt tying an order to the borrow whose fine it pays
pub fn order_receipt(borrow_id: i32) -> String {
    format!("borrow-{}", borrow_id)
}

#[derive(Clone)]
pub struct LedgerService {
    store: Arc<dyn LedgerStore>,
    gateway: Arc<dyn PaymentGateway>,
    config: LedgerConfig,
}

impl LedgerService {
    pub fn new(store: Arc<dyn LedgerStore>, gateway: Arc<dyn PaymentGateway>, config: LedgerConfig) -> Self {
        Self { store, gateway, config }
    }

    /// Lend a book to a student
    pub async fn borrow(&self, user_id: i32, book_id: i32) -> AppResult<Borrow> {
        let borrow = self
            .store
            .open_borrow(user_id, book_id, self.config.max_active_borrows, Utc::now())
            .await?;

        tracing::info!("Borrow {} opened: user={} book={}", borrow.id, user_id, book_id);
        Ok(borrow)
    }

    /// Return a borrowed book, computing any overdue fine
    pub async fn return_book(&self, borrow_id: i32) -> AppResult<Borrow> {
        let borrow = self
            .store
            .close_borrow(borrow_id, Utc::now(), self.config.fine_policy())
            .await?;

        if borrow.fine > 0 {
            tracing::info!("Borrow {} returned late, fine {}", borrow_id, borrow.fine);
        } else {
            tracing::info!("Borrow {} returned", borrow_id);
        }
        Ok(borrow)
    }

    /// Record a fine paid at the desk
    pub async fn pay_fine_manual(&self, borrow_id: i32, method: PaymentMethod) -> AppResult<Payment> {
        if !method.is_manual() {
            return Err(AppError::Validation(
                "Gateway payments are settled through checkout verification".to_string(),
            ));
        }

        let settlement = Settlement {
            method,
            transaction_id: new_transaction_id(),
            date: Utc::now(),
            amount_minor: None,
        };
        let payment = self.store.settle_fine(borrow_id, settlement).await?;

        tracing::info!(
            "Fine on borrow {} settled by {}: amount={} txn={}",
            borrow_id, payment.method, payment.amount, payment.transaction_id
        );
        Ok(payment)
    }

    /// Open a gateway order for the outstanding fine. Nothing is written locally.
    pub async fn create_payment_order(&self, borrow_id: i32) -> AppResult<OrderHandle> {
        let borrow = self.store.get_borrow(borrow_id).await?;
        if borrow.fine <= 0 {
            return Err(LedgerError::NoFineDue(borrow_id).into());
        }

        let order = self
            .gateway
            .create_order(
                fine_in_minor_units(borrow.fine),
                &self.config.currency,
                &order_receipt(borrow_id),
            )
            .await?;

        tracing::info!("Payment order {} opened for borrow {}", order.order_id, borrow_id);
        Ok(order)
    }

    /// Verify a completed checkout and settle the fine with it.
    ///
    /// The order is read back from the gateway: it must have been opened for
    /// this borrow, in the ledger currency, and its amount must equal the
    /// fine at settlement time (checked under the borrow's row lock).
    pub async fn verify_and_settle_payment(
        &self,
        borrow_id: i32,
        confirmation: &GatewayConfirmation,
    ) -> AppResult<Payment> {
        if !self.gateway.verify_signature(
            &confirmation.order_id,
            &confirmation.payment_id,
            &confirmation.signature,
        ) {
            tracing::warn!(
                "Rejected payment {} for order {} on borrow {}: bad signature",
                confirmation.payment_id, confirmation.order_id, borrow_id
            );
            return Err(LedgerError::SignatureInvalid.into());
        }

        let order = match self.gateway.fetch_order(&confirmation.order_id).await {
            Ok(order) => order,
            Err(GatewayError::UnknownOrder(id)) => return Err(LedgerError::OrderMismatch(id).into()),
            Err(e) => return Err(e.into()),
        };

        if order.receipt != order_receipt(borrow_id) || order.currency != self.config.currency {
            tracing::warn!(
                "Rejected payment {} on borrow {}: order {} was opened for {} in {}",
                confirmation.payment_id, borrow_id, order.order_id, order.receipt, order.currency
            );
            return Err(LedgerError::OrderMismatch(order.order_id).into());
        }

        let settlement = Settlement {
            method: PaymentMethod::Gateway,
            transaction_id: confirmation.payment_id.clone(),
            date: Utc::now(),
            amount_minor: Some(order.amount),
        };
        let payment = self.store.settle_fine(borrow_id, settlement).await?;

        tracing::info!(
            "Fine on borrow {} settled online: amount={} order={} payment={}",
            borrow_id, payment.amount, order.order_id, payment.transaction_id
        );
        Ok(payment)
    }

    pub async fn get_borrow(&self, borrow_id: i32) -> AppResult<Borrow> {
        self.store.get_borrow(borrow_id).await
    }

    /// Borrows of one user, or of everyone when `user_id` is `None`
    pub async fn list_borrows(&self, user_id: Option<i32>, query: BorrowQuery) -> AppResult<Vec<BorrowDetails>> {
        self.store.list_borrows(user_id, query).await
    }

    pub async fn list_payments(&self, user_id: Option<i32>) -> AppResult<Vec<Payment>> {
        self.store.list_payments(user_id).await
    }

    pub async fn stats(&self) -> AppResult<LedgerStats> {
        let cutoff = self.config.fine_policy().overdue_cutoff(Utc::now());
        self.store.stats(cutoff).await
    }
}
