use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use shoprec_core::domain::analytics::{ActionEvent, UserAnalyticsRecord, UserId};
use shoprec_core::domain::product::{CatalogProduct, ProductId, ProductSummary, Shop, ShopId};
use shoprec_core::errors::CollaboratorError;
use shoprec_core::recommendations::{AnalyticsStore, CatalogProvider, InteractionLog};

use super::{AnalyticsRepository, CatalogRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryCatalogRepository {
    shops: RwLock<HashMap<ShopId, Shop>>,
    products: RwLock<HashMap<ProductId, CatalogProduct>>,
}

#[async_trait]
impl CatalogRepository for InMemoryCatalogRepository {
    async fn list_active(&self) -> Result<Vec<ProductSummary>, RepositoryError> {
        let shops = self.shops.read().await;
        let products = self.products.read().await;

        let mut active: Vec<ProductSummary> = products
            .values()
            .filter(|product| product.active)
            .filter_map(|product| {
                shops.get(&product.shop_id).map(|shop| ProductSummary {
                    id: product.id.clone(),
                    title: product.title.clone(),
                    shop_id: shop.id.clone(),
                    shop_name: shop.name.clone(),
                    created_at: product.created_at,
                })
            })
            .collect();
        active.sort_by(|left, right| {
            right.created_at.cmp(&left.created_at).then_with(|| left.id.cmp(&right.id))
        });
        Ok(active)
    }

    async fn save_shop(&self, shop: &Shop) -> Result<(), RepositoryError> {
        let mut shops = self.shops.write().await;
        shops.insert(shop.id.clone(), shop.clone());
        Ok(())
    }

    async fn save_product(&self, product: &CatalogProduct) -> Result<(), RepositoryError> {
        let mut products = self.products.write().await;
        products.insert(product.id.clone(), product.clone());
        Ok(())
    }
}

#[async_trait]
impl CatalogProvider for InMemoryCatalogRepository {
    async fn list_active_products(&self) -> Result<Vec<ProductSummary>, CollaboratorError> {
        Ok(self.list_active().await?)
    }
}

#[derive(Default)]
pub struct InMemoryAnalyticsRepository {
    records: RwLock<HashMap<UserId, UserAnalyticsRecord>>,
}

#[async_trait]
impl AnalyticsRepository for InMemoryAnalyticsRepository {
    async fn find_by_user_id(
        &self,
        user_id: &UserId,
    ) -> Result<Option<UserAnalyticsRecord>, RepositoryError> {
        let records = self.records.read().await;
        Ok(records.get(user_id).cloned())
    }

    async fn upsert_recommendations(
        &self,
        user_id: &UserId,
        ids: &[ProductId],
        trained_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut records = self.records.write().await;
        let record = records
            .entry(user_id.clone())
            .or_insert_with(|| UserAnalyticsRecord::new(user_id.clone()));
        record.recommendations = ids.to_vec();
        record.last_trained = Some(trained_at);
        Ok(())
    }

    async fn record_action(
        &self,
        user_id: &UserId,
        event: &ActionEvent,
    ) -> Result<(), RepositoryError> {
        let mut records = self.records.write().await;
        let record = records
            .entry(user_id.clone())
            .or_insert_with(|| UserAnalyticsRecord::new(user_id.clone()));
        record.actions.push(event.clone());
        record.actions.sort_by_key(|action| action.timestamp);
        Ok(())
    }

    async fn list_all_actions(&self) -> Result<HashMap<UserId, Vec<ActionEvent>>, RepositoryError> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|record| !record.actions.is_empty())
            .map(|record| (record.user_id.clone(), record.actions.clone()))
            .collect())
    }
}

#[async_trait]
impl AnalyticsStore for InMemoryAnalyticsRepository {
    async fn get_by_user_id(
        &self,
        user_id: &UserId,
    ) -> Result<Option<UserAnalyticsRecord>, CollaboratorError> {
        Ok(self.find_by_user_id(user_id).await?)
    }

    async fn upsert_recommendations(
        &self,
        user_id: &UserId,
        ids: &[ProductId],
        trained_at: DateTime<Utc>,
    ) -> Result<(), CollaboratorError> {
        Ok(AnalyticsRepository::upsert_recommendations(self, user_id, ids, trained_at).await?)
    }
}

#[async_trait]
impl InteractionLog for InMemoryAnalyticsRepository {
    async fn all_interactions(
        &self,
    ) -> Result<HashMap<UserId, Vec<ActionEvent>>, CollaboratorError> {
        Ok(self.list_all_actions().await?)
    }
}
