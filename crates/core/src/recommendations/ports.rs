//! Collaborator seams consumed by [`RecommendationService`](super::RecommendationService).

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::analytics::{ActionEvent, UserAnalyticsRecord, UserId};
use crate::domain::product::{ProductId, ProductSummary};
use crate::errors::{CollaboratorError, TrainingError};

use super::catalog::Catalog;

#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Every product currently eligible for recommendation.
    async fn list_active_products(&self) -> Result<Vec<ProductSummary>, CollaboratorError>;
}

#[async_trait]
pub trait AnalyticsStore: Send + Sync {
    async fn get_by_user_id(
        &self,
        user_id: &UserId,
    ) -> Result<Option<UserAnalyticsRecord>, CollaboratorError>;

    /// Replaces the cached id list and training time in a single write.
    async fn upsert_recommendations(
        &self,
        user_id: &UserId,
        ids: &[ProductId],
        trained_at: DateTime<Utc>,
    ) -> Result<(), CollaboratorError>;
}

#[async_trait]
pub trait Trainer: Send + Sync {
    async fn train(
        &self,
        user_id: &UserId,
        catalog: &Catalog,
    ) -> Result<Vec<ProductId>, TrainingError>;
}

#[async_trait]
pub trait InteractionLog: Send + Sync {
    async fn all_interactions(&self)
        -> Result<HashMap<UserId, Vec<ActionEvent>>, CollaboratorError>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
