use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::config::RecommendationConfig;
use crate::domain::analytics::UserId;
use crate::domain::product::ProductSummary;
use crate::errors::{RecommendationError, TrainingError};

use super::catalog::Catalog;
use super::fallback::fallback;
use super::gate::RetrainGate;
use super::ports::{AnalyticsStore, CatalogProvider, Clock, SystemClock, Trainer};
use super::staleness::{CacheState, StalenessPolicy};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServedFrom {
    /// No analytics record; newest catalog products.
    Fallback,
    CacheHit,
    Retrained,
    /// Another request refreshed the cache while this one waited on the retrain gate.
    Coalesced,
}

impl ServedFrom {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fallback => "fallback",
            Self::CacheHit => "cache_hit",
            Self::Retrained => "retrained",
            Self::Coalesced => "coalesced",
        }
    }

    fn event_name(&self) -> &'static str {
        match self {
            Self::Fallback => "recommendations.fallback",
            Self::CacheHit => "recommendations.cache_hit",
            Self::Retrained => "recommendations.retrained",
            Self::Coalesced => "recommendations.coalesced",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Recommendations {
    pub served_from: ServedFrom,
    pub products: Vec<ProductSummary>,
}

pub struct RecommendationService {
    catalog: Arc<dyn CatalogProvider>,
    analytics: Arc<dyn AnalyticsStore>,
    trainer: Arc<dyn Trainer>,
    clock: Arc<dyn Clock>,
    policy: StalenessPolicy,
    fallback_limit: usize,
    trainer_timeout: Duration,
    gate: Option<RetrainGate>,
}

impl RecommendationService {
    pub fn new(
        catalog: Arc<dyn CatalogProvider>,
        analytics: Arc<dyn AnalyticsStore>,
        trainer: Arc<dyn Trainer>,
        config: &RecommendationConfig,
    ) -> Self {
        Self {
            catalog,
            analytics,
            trainer,
            clock: Arc::new(SystemClock),
            policy: StalenessPolicy::new(config.staleness_window()),
            fallback_limit: config.fallback_limit,
            trainer_timeout: config.trainer_timeout(),
            gate: config.single_flight.then(RetrainGate::new),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn policy(&self) -> &StalenessPolicy {
        &self.policy
    }

    /// Serves the user's recommendations, retraining first when the cache is stale.
    ///
    /// Nothing is written unless the trainer succeeds; a failed request leaves the
    /// previously persisted list untouched.
    pub async fn get_recommendations(
        &self,
        user_id: &UserId,
        correlation_id: &str,
    ) -> Result<Recommendations, RecommendationError> {
        let result = self.resolve(user_id, correlation_id).await;

        match &result {
            Ok(recommendations) => info!(
                event_name = recommendations.served_from.event_name(),
                correlation_id,
                user_id = %user_id,
                served_from = recommendations.served_from.as_str(),
                count = recommendations.products.len(),
                "recommendations served"
            ),
            Err(error) => error!(
                event_name = failure_event(error),
                correlation_id,
                user_id = %user_id,
                error_kind = error.kind(),
                error = %error,
                "recommendation request failed"
            ),
        }

        result
    }

    async fn resolve(
        &self,
        user_id: &UserId,
        correlation_id: &str,
    ) -> Result<Recommendations, RecommendationError> {
        let (products, record) = tokio::join!(
            self.catalog.list_active_products(),
            self.analytics.get_by_user_id(user_id)
        );
        let catalog = Catalog::from_products(products.map_err(RecommendationError::CatalogFetch)?);
        let record = record.map_err(RecommendationError::AnalyticsFetch)?;

        match (self.policy.classify(record.as_ref(), self.clock.now()), record) {
            (CacheState::Fresh, Some(record)) => Ok(Recommendations {
                served_from: ServedFrom::CacheHit,
                products: catalog.resolve(&record.recommendations),
            }),
            (CacheState::Stale, Some(_)) => self.retrain(user_id, &catalog, correlation_id).await,
            _ => Ok(Recommendations {
                served_from: ServedFrom::Fallback,
                products: fallback(&catalog, self.fallback_limit),
            }),
        }
    }

    async fn retrain(
        &self,
        user_id: &UserId,
        catalog: &Catalog,
        correlation_id: &str,
    ) -> Result<Recommendations, RecommendationError> {
        let permit = match &self.gate {
            Some(gate) => Some(gate.acquire(user_id).await),
            None => None,
        };

        if permit.as_ref().is_some_and(|permit| permit.waited()) {
            let refreshed = self
                .analytics
                .get_by_user_id(user_id)
                .await
                .map_err(RecommendationError::AnalyticsFetch)?;
            if let Some(record) = refreshed {
                if self.policy.is_fresh(record.last_trained, self.clock.now()) {
                    return Ok(Recommendations {
                        served_from: ServedFrom::Coalesced,
                        products: catalog.resolve(&record.recommendations),
                    });
                }
            }
        }

        info!(
            event_name = "recommendations.retrain_started",
            correlation_id,
            user_id = %user_id,
            catalog_size = catalog.len(),
            "cached recommendations are stale; retraining"
        );

        let training = self.trainer.train(user_id, catalog);
        let ids = match tokio::time::timeout(self.trainer_timeout, training).await {
            Ok(trained) => trained?,
            Err(_) => {
                warn!(
                    event_name = "recommendations.trainer_timeout",
                    correlation_id,
                    user_id = %user_id,
                    timeout_secs = self.trainer_timeout.as_secs(),
                    "trainer exceeded its deadline"
                );
                return Err(TrainingError::TimedOut { timeout_secs: self.trainer_timeout.as_secs() }
                    .into());
            }
        };

        let trained_at = self.clock.now();
        self.analytics
            .upsert_recommendations(user_id, &ids, trained_at)
            .await
            .map_err(RecommendationError::Upsert)?;
        drop(permit);

        Ok(Recommendations { served_from: ServedFrom::Retrained, products: catalog.resolve(&ids) })
    }
}

fn failure_event(error: &RecommendationError) -> &'static str {
    match error {
        RecommendationError::CatalogFetch(_) | RecommendationError::AnalyticsFetch(_) => {
            "recommendations.fetch_failed"
        }
        RecommendationError::Training(_) => "recommendations.training_failed",
        RecommendationError::Upsert(_) => "recommendations.upsert_failed",
    }
}
