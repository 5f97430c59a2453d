//! Books repository for database operations

use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::book::{Book, BookQuery, CreateBook, UpdateBook},
};

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get book by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// Search books with filters and pagination
    pub async fn search(&self, query: &BookQuery) -> AppResult<(Vec<Book>, i64)> {
        let mut conditions: Vec<String> = Vec::new();
        let mut params: Vec<String> = Vec::new();

        if let Some(ref search) = query.search {
            params.push(format!("%{}%", escape_like(search)));
            conditions.push(format!(
                "(name ILIKE ${0} OR author ILIKE ${0})",
                params.len()
            ));
        }

        if let Some(ref category) = query.category {
            params.push(category.clone());
            conditions.push(format!("LOWER(category) = LOWER(${})", params.len()));
        }

        if query.available.unwrap_or(false) {
            conditions.push("copies > 0".to_string());
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_query = format!("SELECT COUNT(*) FROM books {}", where_clause);
        let mut count_builder = sqlx::query_scalar::<_, i64>(&count_query);
        for param in &params {
            count_builder = count_builder.bind(param);
        }
        let total = count_builder.fetch_one(&self.pool).await?;

        let select_query = format!(
            "SELECT * FROM books {} ORDER BY name, id LIMIT {} OFFSET {}",
            where_clause,
            query.per_page(),
            query.offset()
        );
        let mut select_builder = sqlx::query_as::<_, Book>(&select_query);
        for param in &params {
            select_builder = select_builder.bind(param);
        }
        let books = select_builder.fetch_all(&self.pool).await?;

        Ok((books, total))
    }

    /// Create a new book
    pub async fn create(&self, book: &CreateBook) -> AppResult<Book> {
        let row = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (name, author, publisher, category, copies)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(&book.name)
        .bind(&book.author)
        .bind(&book.publisher)
        .bind(&book.category)
        .bind(book.copies)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    /// Update book metadata; absent fields are left unchanged
    pub async fn update(&self, id: i32, book: &UpdateBook) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(
            r#"
            UPDATE books SET
                name = COALESCE($2, name),
                author = COALESCE($3, author),
                publisher = COALESCE($4, publisher),
                category = COALESCE($5, category)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&book.name)
        .bind(&book.author)
        .bind(&book.publisher)
        .bind(&book.category)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// Put additional copies on the shelf
    pub async fn restock(&self, id: i32, copies: i32) -> AppResult<Book> {
        // The guard keeps copies within INTEGER range
        let restocked = sqlx::query_as::<_, Book>(
            "UPDATE books SET copies = copies + $2 WHERE id = $1 AND copies <= 2147483647 - $2 RETURNING *",
        )
        .bind(id)
        .bind(copies)
        .fetch_optional(&self.pool)
        .await?;

        match restocked {
            Some(book) => Ok(book),
            None => {
                let book = self.get_by_id(id).await?;
                Err(AppError::Validation(format!(
                    "Book {} already has {} copies; adding {} would overflow the stock count",
                    id, book.copies, copies
                )))
            }
        }
    }
}

/// Escape LIKE wildcards so a search term only matches literally
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
