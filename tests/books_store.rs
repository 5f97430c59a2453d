//! Catalog persistence tests against a real PostgreSQL database
//!
//! Run with: DATABASE_URL=postgres://... cargo test -- --ignored

use bookhouse::{
    error::AppError,
    models::book::{BookQuery, CreateBook},
    repository::books::BooksRepository,
};
use sqlx::PgPool;

fn book(name: &str, copies: i32) -> CreateBook {
    CreateBook {
        name: name.to_string(),
        author: "Anonymous".to_string(),
        publisher: None,
        category: None,
        copies,
    }
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_restock_beyond_integer_range_is_a_validation_error(pool: PgPool) {
    let books = BooksRepository::new(pool.clone());
    let full = books.create(&book("Dune", i32::MAX - 5)).await.unwrap();

    let err = books.restock(full.id, 10).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(books.get_by_id(full.id).await.unwrap().copies, i32::MAX - 5);

    let topped_up = books.restock(full.id, 5).await.unwrap();
    assert_eq!(topped_up.copies, i32::MAX);

    let err = books.restock(full.id + 1000, 1).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_search_treats_wildcards_literally(pool: PgPool) {
    let books = BooksRepository::new(pool.clone());
    books.create(&book("100% Rust", 1)).await.unwrap();
    books.create(&book("1000 Recipes", 1)).await.unwrap();
    books.create(&book("snake_case style", 1)).await.unwrap();
    books.create(&book("snakecase", 1)).await.unwrap();

    let query = BookQuery { search: Some("100%".to_string()), ..Default::default() };
    let (found, total) = books.search(&query).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(found[0].name, "100% Rust");

    let query = BookQuery { search: Some("e_c".to_string()), ..Default::default() };
    let (found, total) = books.search(&query).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(found[0].name, "snake_case style");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_far_page_is_empty(pool: PgPool) {
    let books = BooksRepository::new(pool.clone());
    books.create(&book("Dune", 1)).await.unwrap();

    let query = BookQuery { page: Some(i64::MAX), per_page: Some(200), ..Default::default() };
    let (found, total) = books.search(&query).await.unwrap();
    assert!(found.is_empty());
    assert_eq!(total, 1);
}
