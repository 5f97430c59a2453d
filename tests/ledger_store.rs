//! Ledger persistence tests against a real PostgreSQL database
//!
//! Run with: DATABASE_URL=postgres://... cargo test -- --ignored

use bookhouse::{
    error::{AppError, LedgerError},
    models::{
        borrow::{BorrowQuery, BorrowStatus, FinePolicy},
        payment::{new_transaction_id, PaymentMethod, Settlement, PAYMENT_STATUS_PAID},
    },
    repository::borrows::BorrowsRepository,
    services::ledger::LedgerStore,
};
use chrono::{Duration, TimeZone, Utc};
use sqlx::PgPool;

const POLICY: FinePolicy = FinePolicy { grace_days: 7, per_day: 10 };

async fn add_user(pool: &PgPool, email: &str, role: &str) -> i32 {
    sqlx::query_scalar(
        "INSERT INTO users (name, email, password_hash, role) VALUES ($1, $2, 'x', $3) RETURNING id",
    )
    .bind(email)
    .bind(email)
    .bind(role)
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn add_book(pool: &PgPool, copies: i32) -> i32 {
    sqlx::query_scalar("INSERT INTO books (name, author, copies) VALUES ('Dune', 'Herbert', $1) RETURNING id")
        .bind(copies)
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn copies(pool: &PgPool, book_id: i32) -> i32 {
    sqlx::query_scalar("SELECT copies FROM books WHERE id = $1")
        .bind(book_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

fn cash() -> Settlement {
    Settlement {
        method: PaymentMethod::Cash,
        transaction_id: new_transaction_id(),
        date: Utc::now(),
        amount_minor: None,
    }
}

fn online(payment_id: &str, amount_minor: i64) -> Settlement {
    Settlement {
        method: PaymentMethod::Gateway,
        transaction_id: payment_id.to_string(),
        date: Utc::now(),
        amount_minor: Some(amount_minor),
    }
}

/// Borrowed on 2024-01-01 and returned on 2024-01-10: a fine of 20
async fn overdue_borrow(store: &BorrowsRepository, student: i32, book: i32) -> i32 {
    let borrowed_at = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
    let returned_at = Utc.with_ymd_and_hms(2024, 1, 10, 9, 0, 0).unwrap();

    let borrow = store.open_borrow(student, book, 3, borrowed_at).await.unwrap();
    let returned = store.close_borrow(borrow.id, returned_at, POLICY).await.unwrap();
    assert_eq!(returned.fine, 20);
    borrow.id
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_borrow_limit_is_enforced(pool: PgPool) {
    let store = BorrowsRepository::new(pool.clone());
    let student = add_user(&pool, "s@example.org", "student").await;
    let book = add_book(&pool, 10).await;
    let now = Utc::now();

    for _ in 0..3 {
        store.open_borrow(student, book, 3, now).await.unwrap();
    }

    let err = store.open_borrow(student, book, 3, now).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::Ledger(LedgerError::LimitExceeded { active: 3, max: 3 })
    ));
    assert_eq!(copies(&pool, book).await, 7);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_only_students_borrow(pool: PgPool) {
    let store = BorrowsRepository::new(pool.clone());
    let librarian = add_user(&pool, "l@example.org", "librarian").await;
    let book = add_book(&pool, 1).await;

    let err = store.open_borrow(librarian, book, 3, Utc::now()).await.unwrap_err();
    assert!(matches!(err, AppError::Ledger(LedgerError::NotStudent)));

    let err = store.open_borrow(9999, book, 3, Utc::now()).await.unwrap_err();
    assert!(matches!(err, AppError::Ledger(LedgerError::RecordNotFound(_))));
    assert_eq!(copies(&pool, book).await, 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_copies_track_borrows_and_returns(pool: PgPool) {
    let store = BorrowsRepository::new(pool.clone());
    let student = add_user(&pool, "s@example.org", "student").await;
    let book = add_book(&pool, 2).await;
    let now = Utc::now();

    let first = store.open_borrow(student, book, 3, now).await.unwrap();
    store.open_borrow(student, book, 3, now).await.unwrap();
    assert_eq!(copies(&pool, book).await, 0);

    let err = store.open_borrow(student, book, 3, now).await.unwrap_err();
    assert!(matches!(err, AppError::Ledger(LedgerError::BookUnavailable(id)) if id == book));

    let returned = store.close_borrow(first.id, now, POLICY).await.unwrap();
    assert_eq!(returned.status, BorrowStatus::Returned);
    assert_eq!(returned.fine, 0);
    assert_eq!(copies(&pool, book).await, 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_double_return_is_rejected(pool: PgPool) {
    let store = BorrowsRepository::new(pool.clone());
    let student = add_user(&pool, "s@example.org", "student").await;
    let book = add_book(&pool, 1).await;

    let borrow = store.open_borrow(student, book, 3, Utc::now()).await.unwrap();
    store.close_borrow(borrow.id, Utc::now(), POLICY).await.unwrap();

    let err = store.close_borrow(borrow.id, Utc::now(), POLICY).await.unwrap_err();
    assert!(matches!(err, AppError::Ledger(LedgerError::InvalidReturn(_))));
    assert_eq!(copies(&pool, book).await, 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_overdue_fine_is_settled_once(pool: PgPool) {
    let store = BorrowsRepository::new(pool.clone());
    let student = add_user(&pool, "s@example.org", "student").await;
    let book = add_book(&pool, 1).await;

    let borrowed_at = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
    let returned_at = Utc.with_ymd_and_hms(2024, 1, 10, 9, 0, 0).unwrap();

    let borrow = store.open_borrow(student, book, 3, borrowed_at).await.unwrap();
    let returned = store.close_borrow(borrow.id, returned_at, POLICY).await.unwrap();
    assert_eq!(returned.fine, 20);

    let payment = store.settle_fine(borrow.id, cash()).await.unwrap();
    assert_eq!(payment.amount, 20);
    assert_eq!(payment.user_id, student);
    assert_eq!(payment.status, PAYMENT_STATUS_PAID);
    assert_eq!(payment.method, PaymentMethod::Cash);

    let settled = store.get_borrow(borrow.id).await.unwrap();
    assert_eq!(settled.fine, 0);

    let err = store.settle_fine(borrow.id, cash()).await.unwrap_err();
    assert!(matches!(err, AppError::Ledger(LedgerError::NoFineDue(_))));

    let payments = store.list_payments(Some(student)).await.unwrap();
    assert_eq!(payments.len(), 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_no_payment_without_fine(pool: PgPool) {
    let store = BorrowsRepository::new(pool.clone());
    let student = add_user(&pool, "s@example.org", "student").await;
    let book = add_book(&pool, 1).await;

    let borrow = store.open_borrow(student, book, 3, Utc::now()).await.unwrap();

    // Still out, so no fine yet
    let err = store.settle_fine(borrow.id, cash()).await.unwrap_err();
    assert!(matches!(err, AppError::Ledger(LedgerError::NoFineDue(_))));

    store.close_borrow(borrow.id, Utc::now(), POLICY).await.unwrap();
    let err = store.settle_fine(borrow.id, cash()).await.unwrap_err();
    assert!(matches!(err, AppError::Ledger(LedgerError::NoFineDue(_))));

    assert!(store.list_payments(None).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_replayed_transaction_id_is_rejected(pool: PgPool) {
    let store = BorrowsRepository::new(pool.clone());
    let student = add_user(&pool, "s@example.org", "student").await;
    let book = add_book(&pool, 2).await;
    let borrowed_at = Utc::now() - Duration::days(20);

    let first = store.open_borrow(student, book, 3, borrowed_at).await.unwrap();
    let second = store.open_borrow(student, book, 3, borrowed_at).await.unwrap();
    store.close_borrow(first.id, Utc::now(), POLICY).await.unwrap();
    store.close_borrow(second.id, Utc::now(), POLICY).await.unwrap();

    let replayed = online("pay_replayed", 13000);
    store.settle_fine(first.id, replayed.clone()).await.unwrap();

    let err = store.settle_fine(second.id, replayed).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    // The failed settlement rolled back: the second fine is still owed
    let still_owed = store.get_borrow(second.id).await.unwrap();
    assert_eq!(still_owed.fine, 130);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_gateway_amount_must_match_fine(pool: PgPool) {
    let store = BorrowsRepository::new(pool.clone());
    let student = add_user(&pool, "s@example.org", "student").await;
    let book = add_book(&pool, 1).await;
    let borrow_id = overdue_borrow(&store, student, book).await;

    // An order for a smaller fine cannot clear this one
    let err = store.settle_fine(borrow_id, online("pay_short", 1000)).await.unwrap_err();
    assert!(matches!(err, AppError::Ledger(LedgerError::OrderMismatch(_))));
    assert_eq!(store.get_borrow(borrow_id).await.unwrap().fine, 20);
    assert!(store.list_payments(None).await.unwrap().is_empty());

    let payment = store.settle_fine(borrow_id, online("pay_exact", 2000)).await.unwrap();
    assert_eq!(payment.amount, 20);
    assert_eq!(payment.method, PaymentMethod::Gateway);
    assert_eq!(payment.transaction_id, "pay_exact");
    assert_eq!(store.get_borrow(borrow_id).await.unwrap().fine, 0);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_concurrent_settlements_record_one_payment(pool: PgPool) {
    let store = BorrowsRepository::new(pool.clone());
    let student = add_user(&pool, "s@example.org", "student").await;
    let book = add_book(&pool, 1).await;
    let borrow_id = overdue_borrow(&store, student, book).await;

    let (desk, gateway) = tokio::join!(
        store.settle_fine(borrow_id, cash()),
        store.settle_fine(borrow_id, online("pay_race", 2000)),
    );

    assert_eq!([desk.is_ok(), gateway.is_ok()].iter().filter(|ok| **ok).count(), 1);
    let loser = if desk.is_ok() { gateway } else { desk };
    assert!(matches!(loser, Err(AppError::Ledger(LedgerError::NoFineDue(id))) if id == borrow_id));

    let payments = store.list_payments(Some(student)).await.unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].amount, 20);
    assert_eq!(store.get_borrow(borrow_id).await.unwrap().fine, 0);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_concurrent_borrows_respect_limit(pool: PgPool) {
    let store = BorrowsRepository::new(pool.clone());
    let student = add_user(&pool, "s@example.org", "student").await;
    let first = add_book(&pool, 5).await;
    let second = add_book(&pool, 5).await;
    let now = Utc::now();

    store.open_borrow(student, first, 3, now).await.unwrap();
    store.open_borrow(student, first, 3, now).await.unwrap();

    let (a, b) = tokio::join!(
        store.open_borrow(student, first, 3, now),
        store.open_borrow(student, second, 3, now),
    );

    assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
    let loser = if a.is_ok() { b } else { a };
    assert!(matches!(
        loser,
        Err(AppError::Ledger(LedgerError::LimitExceeded { active: 3, max: 3 }))
    ));

    let active = store
        .list_borrows(Some(student), BorrowQuery { status: Some(BorrowStatus::Borrowed), with_fine: None })
        .await
        .unwrap();
    assert_eq!(active.len(), 3);
    assert_eq!(copies(&pool, first).await + copies(&pool, second).await, 7);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_last_copy_goes_to_one_borrower(pool: PgPool) {
    let store = BorrowsRepository::new(pool.clone());
    let alice = add_user(&pool, "alice@example.org", "student").await;
    let bob = add_user(&pool, "bob@example.org", "student").await;
    let book = add_book(&pool, 1).await;
    let now = Utc::now();

    let (a, b) = tokio::join!(
        store.open_borrow(alice, book, 3, now),
        store.open_borrow(bob, book, 3, now),
    );

    assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
    let loser = if a.is_ok() { b } else { a };
    assert!(matches!(loser, Err(AppError::Ledger(LedgerError::BookUnavailable(_)))));
    assert_eq!(copies(&pool, book).await, 0);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_listing_and_stats(pool: PgPool) {
    let store = BorrowsRepository::new(pool.clone());
    let alice = add_user(&pool, "alice@example.org", "student").await;
    let bob = add_user(&pool, "bob@example.org", "student").await;
    let book = add_book(&pool, 5).await;
    let long_ago = Utc::now() - Duration::days(12);

    let late = store.open_borrow(alice, book, 3, long_ago).await.unwrap();
    store.open_borrow(alice, book, 3, long_ago).await.unwrap();
    store.open_borrow(bob, book, 3, Utc::now()).await.unwrap();
    store.close_borrow(late.id, Utc::now(), POLICY).await.unwrap();

    let all = store.list_borrows(None, BorrowQuery::default()).await.unwrap();
    assert_eq!(all.len(), 3);

    let alices = store.list_borrows(Some(alice), BorrowQuery::default()).await.unwrap();
    assert_eq!(alices.len(), 2);
    assert!(alices.iter().all(|b| b.user_name == "alice@example.org"));

    let fined = store
        .list_borrows(None, BorrowQuery { status: None, with_fine: Some(true) })
        .await
        .unwrap();
    assert_eq!(fined.len(), 1);
    assert_eq!(fined[0].fine, 50);

    let out = store
        .list_borrows(None, BorrowQuery { status: Some(BorrowStatus::Borrowed), with_fine: None })
        .await
        .unwrap();
    assert_eq!(out.len(), 2);

    let stats = store.stats(POLICY.overdue_cutoff(Utc::now())).await.unwrap();
    assert_eq!(stats.active_borrows, 2);
    assert_eq!(stats.overdue_borrows, 1);
    assert_eq!(stats.outstanding_fines, 50);
    assert_eq!(stats.collected_fines, 0);
}
