use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

use shoprec_core::domain::analytics::{ActionEvent, UserAnalyticsRecord, UserId};
use shoprec_core::domain::product::{CatalogProduct, ProductId, ProductSummary, Shop};
use shoprec_core::errors::CollaboratorError;

pub mod analytics;
pub mod catalog;
pub mod memory;

pub use analytics::SqlAnalyticsRepository;
pub use catalog::SqlCatalogRepository;
pub use memory::{InMemoryAnalyticsRepository, InMemoryCatalogRepository};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("encode error: {0}")]
    Encode(String),
}

impl From<RepositoryError> for CollaboratorError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::Database(error) => Self::Unavailable(error.to_string()),
            RepositoryError::Decode(message) => Self::Decode(message),
            RepositoryError::Encode(message) => {
                Self::Unavailable(format!("encode error: {message}"))
            }
        }
    }
}

#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Active products joined with their shop, newest first.
    async fn list_active(&self) -> Result<Vec<ProductSummary>, RepositoryError>;
    async fn save_shop(&self, shop: &Shop) -> Result<(), RepositoryError>;
    async fn save_product(&self, product: &CatalogProduct) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait AnalyticsRepository: Send + Sync {
    async fn find_by_user_id(
        &self,
        user_id: &UserId,
    ) -> Result<Option<UserAnalyticsRecord>, RepositoryError>;

    /// Writes the id list and training time together; creates the record if missing.
    async fn upsert_recommendations(
        &self,
        user_id: &UserId,
        ids: &[ProductId],
        trained_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;

    /// Appends an interaction, creating an untrained record on first contact.
    async fn record_action(
        &self,
        user_id: &UserId,
        event: &ActionEvent,
    ) -> Result<(), RepositoryError>;

    async fn list_all_actions(&self) -> Result<HashMap<UserId, Vec<ActionEvent>>, RepositoryError>;
}

/// Fixed-width RFC 3339 so stored timestamps sort lexically.
pub(crate) fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(column: &str, value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("invalid timestamp in `{column}`: {e}")))
}
