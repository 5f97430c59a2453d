//! Fine settlement endpoints: desk payments and gateway checkout

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::{
    error::AppResult,
    gateway::OrderHandle,
    models::payment::{GatewayConfirmation, ManualPayment, Payment},
};

use super::AuthenticatedUser;

/// Record a cash or card payment taken at the desk
#[utoipa::path(
    post,
    path = "/borrows/{id}/fine/pay",
    tag = "fines",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Borrow ID")
    ),
    request_body = ManualPayment,
    responses(
        (status = 201, description = "Fine settled", body = Payment),
        (status = 403, description = "Librarian privileges required"),
        (status = 409, description = "No fine due", body = crate::error::ErrorResponse)
    )
)]
pub async fn pay_fine(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<ManualPayment>,
) -> AppResult<(StatusCode, Json<Payment>)> {
    claims.require_librarian()?;

    let payment = state.services.ledger.pay_fine_manual(id, request.method).await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

/// Open a gateway order for the outstanding fine
#[utoipa::path(
    post,
    path = "/borrows/{id}/fine/order",
    tag = "fines",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Borrow ID")
    ),
    responses(
        (status = 200, description = "Checkout order", body = OrderHandle),
        (status = 403, description = "Not your borrow"),
        (status = 409, description = "No fine due", body = crate::error::ErrorResponse),
        (status = 502, description = "Gateway unavailable")
    )
)]
pub async fn create_order(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<OrderHandle>> {
    let borrow = state.services.ledger.get_borrow(id).await?;
    claims.require_self_or_librarian(borrow.user_id)?;

    let order = state.services.ledger.create_payment_order(id).await?;
    Ok(Json(order))
}

/// Confirm a completed checkout and settle the fine
#[utoipa::path(
    post,
    path = "/borrows/{id}/fine/verify",
    tag = "fines",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Borrow ID")
    ),
    request_body = GatewayConfirmation,
    responses(
        (status = 201, description = "Fine settled", body = Payment),
        (status = 400, description = "Signature mismatch", body = crate::error::ErrorResponse),
        (status = 403, description = "Not your borrow"),
        (status = 409, description = "No fine due", body = crate::error::ErrorResponse)
    )
)]
pub async fn verify_payment(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(confirmation): Json<GatewayConfirmation>,
) -> AppResult<(StatusCode, Json<Payment>)> {
    confirmation.validate()?;

    let borrow = state.services.ledger.get_borrow(id).await?;
    claims.require_self_or_librarian(borrow.user_id)?;

    let payment = state
        .services
        .ledger
        .verify_and_settle_payment(id, &confirmation)
        .await?;
    Ok((StatusCode::CREATED, Json(payment)))
}
