//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{auth, books, borrows, fines, health, payments};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Bookhouse API",
        version = "0.3.0",
        description = "Library borrowing, overdue fines and fine payments"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Auth
        auth::register,
        auth::login,
        auth::me,
        // Books
        books::list_books,
        books::get_book,
        books::create_book,
        books::update_book,
        books::restock_book,
        // Borrows
        borrows::create_borrow,
        borrows::list_borrows,
        borrows::get_borrow,
        borrows::return_borrow,
        // Fines
        fines::pay_fine,
        fines::create_order,
        fines::verify_payment,
        payments::list_payments,
        // Stats
        payments::get_stats,
    ),
    components(
        schemas(
            // Auth
            auth::LoginRequest,
            auth::LoginResponse,
            crate::models::user::UserInfo,
            crate::models::user::RegisterUser,
            crate::models::user::Role,
            // Books
            books::BookPage,
            crate::models::book::Book,
            crate::models::book::CreateBook,
            crate::models::book::UpdateBook,
            crate::models::book::Restock,
            // Borrows
            borrows::CreateBorrowRequest,
            borrows::ReturnResponse,
            crate::models::borrow::Borrow,
            crate::models::borrow::BorrowDetails,
            crate::models::borrow::BorrowStatus,
            crate::models::borrow::LedgerStats,
            // Fines
            crate::models::payment::Payment,
            crate::models::payment::PaymentMethod,
            crate::models::payment::ManualPayment,
            crate::models::payment::GatewayConfirmation,
            crate::gateway::OrderHandle,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Registration and login"),
        (name = "books", description = "Catalog management"),
        (name = "borrows", description = "Borrowing and returns"),
        (name = "fines", description = "Overdue fines and payments"),
        (name = "stats", description = "Statistics")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_ledger_paths() {
        let doc = ApiDoc::openapi();
        for path in [
            "/borrows",
            "/borrows/{id}/return",
            "/borrows/{id}/fine/pay",
            "/borrows/{id}/fine/order",
            "/borrows/{id}/fine/verify",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
    }
}
