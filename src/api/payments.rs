//! Payment history and ledger statistics

use axum::{extract::State, Json};

use crate::{
    error::AppResult,
    models::{borrow::LedgerStats, payment::Payment},
};

use super::AuthenticatedUser;

/// List recorded payments. Librarians see all, students their own.
#[utoipa::path(
    get,
    path = "/payments",
    tag = "fines",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Payments, newest first", body = Vec<Payment>)
    )
)]
pub async fn list_payments(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<Payment>>> {
    let owner = if claims.is_librarian() { None } else { Some(claims.user_id) };

    let payments = state.services.ledger.list_payments(owner).await?;
    Ok(Json(payments))
}

/// Circulation and fine totals
#[utoipa::path(
    get,
    path = "/stats",
    tag = "stats",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Ledger statistics", body = LedgerStats),
        (status = 403, description = "Librarian privileges required")
    )
)]
pub async fn get_stats(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<LedgerStats>> {
    claims.require_librarian()?;

    let stats = state.services.ledger.stats().await?;
    Ok(Json(stats))
}
