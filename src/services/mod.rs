//! Business logic services

pub mod catalog;
pub mod ledger;
pub mod users;

use std::sync::Arc;

use crate::{
    config::AppConfig,
    error::AppResult,
    gateway::PaymentGateway,
    repository::Repository,
};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub users: users::UsersService,
    pub catalog: catalog::CatalogService,
    pub ledger: ledger::LedgerService,
    repository: Repository,
}

impl Services {
    /// Create all services with the given repository and payment gateway
    pub fn new(repository: Repository, gateway: Arc<dyn PaymentGateway>, config: &AppConfig) -> Self {
        Self {
            users: users::UsersService::new(repository.clone(), config.auth.clone()),
            catalog: catalog::CatalogService::new(repository.clone()),
            ledger: ledger::LedgerService::new(
                Arc::new(repository.borrows.clone()),
                gateway,
                config.ledger.clone(),
            ),
            repository,
        }
    }

    /// Check the database is reachable
    pub async fn ready(&self) -> AppResult<()> {
        self.repository.ping().await
    }
}
