//! Bookhouse library server
//!
//! A REST JSON API for a small library: librarians catalog books, students
//! borrow them, overdue returns accrue fines, and fines are settled at the
//! desk or through an online payment gateway.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod gateway;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult, LedgerError};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
