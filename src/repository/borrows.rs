//! Borrows and payments persistence
//!
//! Each ledger transition runs in a single transaction. Rows that a
//! transition reads and then writes are locked with `FOR UPDATE`, and the
//! shelf count is only ever decremented through a guarded `copies > 0`
//! update, so concurrent requests cannot over-lend a book, exceed a
//! student's borrow limit, or settle the same fine twice. Returning early
//! with an error drops the transaction, which rolls it back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult, LedgerError},
    models::{
        borrow::{Borrow, BorrowDetails, BorrowQuery, BorrowStatus, FinePolicy, LedgerStats},
        payment::{fine_in_minor_units, Payment, Settlement, PAYMENT_STATUS_PAID},
        user::Role,
    },
    services::ledger::LedgerStore,
};

#[derive(Clone)]
pub struct BorrowsRepository {
    pool: Pool<Postgres>,
}

impl BorrowsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerStore for BorrowsRepository {
    async fn open_borrow(
        &self,
        user_id: i32,
        book_id: i32,
        max_active: i64,
        now: DateTime<Utc>,
    ) -> AppResult<Borrow> {
        let mut tx = self.pool.begin().await?;

        // Serialises borrows per user so the limit check below cannot race
        let role: Role = sqlx::query_scalar("SELECT role FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| LedgerError::RecordNotFound(format!("User {}", user_id)))?;

        if role != Role::Student {
            return Err(LedgerError::NotStudent.into());
        }

        let active: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM borrows WHERE user_id = $1 AND status = $2",
        )
        .bind(user_id)
        .bind(BorrowStatus::Borrowed)
        .fetch_one(&mut *tx)
        .await?;

        if active >= max_active {
            return Err(LedgerError::LimitExceeded { active, max: max_active }.into());
        }

        let taken = sqlx::query("UPDATE books SET copies = copies - 1 WHERE id = $1 AND copies > 0")
            .bind(book_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if taken == 0 {
            return Err(LedgerError::BookUnavailable(book_id).into());
        }

        let borrow = sqlx::query_as::<_, Borrow>(
            r#"
            INSERT INTO borrows (user_id, book_id, borrow_date, fine, status)
            VALUES ($1, $2, $3, 0, $4)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .bind(now)
        .bind(BorrowStatus::Borrowed)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(borrow)
    }

    async fn close_borrow(
        &self,
        borrow_id: i32,
        returned_at: DateTime<Utc>,
        policy: FinePolicy,
    ) -> AppResult<Borrow> {
        let mut tx = self.pool.begin().await?;

        let borrow = sqlx::query_as::<_, Borrow>("SELECT * FROM borrows WHERE id = $1 FOR UPDATE")
            .bind(borrow_id)
            .fetch_optional(&mut *tx)
            .await?
            .filter(|b| b.status == BorrowStatus::Borrowed)
            .ok_or(LedgerError::InvalidReturn(borrow_id))?;

        let fine = policy.fine_for(borrow.borrow_date, returned_at);

        let returned = sqlx::query_as::<_, Borrow>(
            r#"
            UPDATE borrows SET status = $2, return_date = $3, fine = $4
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(borrow_id)
        .bind(BorrowStatus::Returned)
        .bind(returned_at)
        .bind(fine)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE books SET copies = copies + 1 WHERE id = $1")
            .bind(borrow.book_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(returned)
    }

    async fn settle_fine(&self, borrow_id: i32, settlement: Settlement) -> AppResult<Payment> {
        let mut tx = self.pool.begin().await?;

        let borrow = sqlx::query_as::<_, Borrow>("SELECT * FROM borrows WHERE id = $1 FOR UPDATE")
            .bind(borrow_id)
            .fetch_optional(&mut *tx)
            .await?
            .filter(|b| b.fine > 0)
            .ok_or(LedgerError::NoFineDue(borrow_id))?;

        if let Some(collected) = settlement.amount_minor {
            if collected != fine_in_minor_units(borrow.fine) {
                return Err(LedgerError::OrderMismatch(settlement.transaction_id).into());
            }
        }

        let payment = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (user_id, borrow_id, amount, status, method, transaction_id, date)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(borrow.user_id)
        .bind(borrow.id)
        .bind(borrow.fine)
        .bind(PAYMENT_STATUS_PAID)
        .bind(settlement.method)
        .bind(&settlement.transaction_id)
        .bind(settlement.date)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => AppError::Conflict(format!(
                "Transaction {} has already been recorded",
                settlement.transaction_id
            )),
            other => AppError::Database(other),
        })?;

        sqlx::query("UPDATE borrows SET fine = 0 WHERE id = $1")
            .bind(borrow_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(payment)
    }

    async fn get_borrow(&self, borrow_id: i32) -> AppResult<Borrow> {
        sqlx::query_as::<_, Borrow>("SELECT * FROM borrows WHERE id = $1")
            .bind(borrow_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| LedgerError::RecordNotFound(format!("Borrow {}", borrow_id)).into())
    }

    async fn list_borrows(&self, user_id: Option<i32>, query: BorrowQuery) -> AppResult<Vec<BorrowDetails>> {
        let rows = sqlx::query_as::<_, BorrowDetails>(
            r#"
            SELECT b.id, b.user_id, u.name AS user_name, b.book_id, bk.name AS book_name,
                   b.borrow_date, b.return_date, b.fine, b.status
            FROM borrows b
            JOIN users u ON u.id = b.user_id
            JOIN books bk ON bk.id = b.book_id
            WHERE ($1::INTEGER IS NULL OR b.user_id = $1)
              AND ($2::TEXT IS NULL OR b.status = $2)
              AND ($3::BOOLEAN IS NOT TRUE OR b.fine > 0)
            ORDER BY b.borrow_date DESC, b.id DESC
            "#,
        )
        .bind(user_id)
        .bind(query.status)
        .bind(query.with_fine)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list_payments(&self, user_id: Option<i32>) -> AppResult<Vec<Payment>> {
        let rows = sqlx::query_as::<_, Payment>(
            r#"
            SELECT * FROM payments
            WHERE ($1::INTEGER IS NULL OR user_id = $1)
            ORDER BY date DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn stats(&self, overdue_cutoff: DateTime<Utc>) -> AppResult<LedgerStats> {
        let stats = sqlx::query_as::<_, LedgerStats>(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status = 'borrowed') AS active_borrows,
                COUNT(*) FILTER (WHERE status = 'borrowed' AND borrow_date <= $1) AS overdue_borrows,
                COALESCE(SUM(fine), 0)::BIGINT AS outstanding_fines,
                (SELECT COALESCE(SUM(amount), 0)::BIGINT FROM payments) AS collected_fines
            FROM borrows
            "#,
        )
        .bind(overdue_cutoff)
        .fetch_one(&self.pool)
        .await?;
        Ok(stats)
    }
}
