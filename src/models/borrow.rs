//! Borrow model, its lifecycle status and the overdue fine tariff

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use super::text_enum;

/// Borrow lifecycle: `borrowed -> returned`, never back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BorrowStatus {
    Borrowed,
    Returned,
}

text_enum!(BorrowStatus {
    Borrowed => "borrowed",
    Returned => "returned",
});

/// Borrow model from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Borrow {
    pub id: i32,
    pub user_id: i32,
    pub book_id: i32,
    pub borrow_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    /// Outstanding fine in whole currency units; only non-zero once returned
    pub fine: i32,
    pub status: BorrowStatus,
}

/// Borrow joined with book and borrower names, for listings
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BorrowDetails {
    pub id: i32,
    pub user_id: i32,
    pub user_name: String,
    pub book_id: i32,
    pub book_name: String,
    pub borrow_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub fine: i32,
    pub status: BorrowStatus,
}

/// Borrow listing filter
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct BorrowQuery {
    pub status: Option<BorrowStatus>,
    /// Only borrows with an unpaid fine
    pub with_fine: Option<bool>,
}

/// Circulation and fine totals
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct LedgerStats {
    pub active_borrows: i64,
    pub overdue_borrows: i64,
    /// Sum of unpaid fines
    pub outstanding_fines: i64,
    /// Sum of all recorded payments
    pub collected_fines: i64,
}

/// Overdue fine tariff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinePolicy {
    /// Whole days a book may be kept free of charge (inclusive)
    pub grace_days: i64,
    /// Charge per day beyond the grace period
    pub per_day: i32,
}

impl FinePolicy {
    /// Whole days elapsed between borrowing and returning, floored
    pub fn days_borrowed(borrowed_at: DateTime<Utc>, returned_at: DateTime<Utc>) -> i64 {
        (returned_at - borrowed_at).num_days().max(0)
    }

    /// Fine owed for a book kept from `borrowed_at` until `returned_at`
    pub fn fine_for(&self, borrowed_at: DateTime<Utc>, returned_at: DateTime<Utc>) -> i32 {
        let days = Self::days_borrowed(borrowed_at, returned_at);
        if days <= self.grace_days {
            return 0;
        }
        let late = days - self.grace_days;
        i32::try_from(late.saturating_mul(i64::from(self.per_day))).unwrap_or(i32::MAX)
    }

    /// Borrows started at or before this instant are overdue at `now`
    pub fn overdue_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - chrono::Duration::days(self.grace_days + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const POLICY: FinePolicy = FinePolicy { grace_days: 7, per_day: 10 };

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_no_fine_within_grace_period() {
        assert_eq!(POLICY.fine_for(day(1), day(5)), 0);
    }

    #[test]
    fn test_grace_period_is_inclusive() {
        assert_eq!(FinePolicy::days_borrowed(day(1), day(8)), 7);
        assert_eq!(POLICY.fine_for(day(1), day(8)), 0);
    }

    #[test]
    fn test_fine_per_late_day() {
        assert_eq!(FinePolicy::days_borrowed(day(1), day(10)), 9);
        assert_eq!(POLICY.fine_for(day(1), day(10)), 20);
    }

    #[test]
    fn test_partial_days_are_floored() {
        let returned = Utc.with_ymd_and_hms(2024, 1, 9, 23, 59, 59).unwrap();
        // 8 days and change
        assert_eq!(POLICY.fine_for(day(1), returned), 10);
    }

    #[test]
    fn test_clock_skew_never_produces_a_fine() {
        assert_eq!(POLICY.fine_for(day(5), day(1)), 0);
    }

    #[test]
    fn test_overdue_cutoff() {
        // Borrowed on the 1st, overdue from the 9th (8 whole days)
        assert_eq!(POLICY.overdue_cutoff(day(9)), day(1));
    }

    #[test]
    fn test_status_text_mapping() {
        assert_eq!(BorrowStatus::Borrowed.as_str(), "borrowed");
        assert_eq!("RETURNED".parse::<BorrowStatus>(), Ok(BorrowStatus::Returned));
    }
}
