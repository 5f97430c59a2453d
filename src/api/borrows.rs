//! Borrow and return endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::borrow::{Borrow, BorrowDetails, BorrowQuery},
};

use super::AuthenticatedUser;

/// Borrow request; the borrower is the authenticated student
#[derive(Deserialize, ToSchema)]
pub struct CreateBorrowRequest {
    /// Book ID
    pub book_id: i32,
}

/// Return response with the fine charged, if any
#[derive(Serialize, ToSchema)]
pub struct ReturnResponse {
    /// Return status
    pub status: String,
    /// Updated borrow record
    pub borrow: Borrow,
}

/// Borrow a book
#[utoipa::path(
    post,
    path = "/borrows",
    tag = "borrows",
    security(("bearer_auth" = [])),
    request_body = CreateBorrowRequest,
    responses(
        (status = 201, description = "Book borrowed", body = Borrow),
        (status = 403, description = "Only students can borrow"),
        (status = 409, description = "Borrow limit reached or no copy available", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_borrow(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateBorrowRequest>,
) -> AppResult<(StatusCode, Json<Borrow>)> {
    claims.require_student()?;

    let borrow = state.services.ledger.borrow(claims.user_id, request.book_id).await?;
    Ok((StatusCode::CREATED, Json(borrow)))
}

/// List borrows. Librarians see every borrow, students their own.
#[utoipa::path(
    get,
    path = "/borrows",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(BorrowQuery),
    responses(
        (status = 200, description = "Borrows", body = Vec<BorrowDetails>)
    )
)]
pub async fn list_borrows(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<BorrowQuery>,
) -> AppResult<Json<Vec<BorrowDetails>>> {
    let owner = if claims.is_librarian() { None } else { Some(claims.user_id) };

    let borrows = state.services.ledger.list_borrows(owner, query).await?;
    Ok(Json(borrows))
}

/// Get a borrow by ID
#[utoipa::path(
    get,
    path = "/borrows/{id}",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Borrow ID")
    ),
    responses(
        (status = 200, description = "Borrow", body = Borrow),
        (status = 403, description = "Not your borrow"),
        (status = 404, description = "Borrow not found")
    )
)]
pub async fn get_borrow(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Borrow>> {
    let borrow = state.services.ledger.get_borrow(id).await?;
    claims.require_self_or_librarian(borrow.user_id)?;

    Ok(Json(borrow))
}

/// Return a borrowed book, charging a fine when it is overdue
#[utoipa::path(
    post,
    path = "/borrows/{id}/return",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Borrow ID")
    ),
    responses(
        (status = 200, description = "Book returned", body = ReturnResponse),
        (status = 403, description = "Not your borrow"),
        (status = 404, description = "Borrow not found"),
        (status = 409, description = "Already returned", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_borrow(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<ReturnResponse>> {
    let current = state.services.ledger.get_borrow(id).await?;
    claims.require_self_or_librarian(current.user_id)?;

    let borrow = state.services.ledger.return_book(id).await?;
    let status = if borrow.fine > 0 { "returned_with_fine" } else { "returned" };

    Ok(Json(ReturnResponse {
        status: status.to_string(),
        borrow,
    }))
}
