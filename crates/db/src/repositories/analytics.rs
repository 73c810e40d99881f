use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use shoprec_core::domain::analytics::{ActionEvent, ActionType, UserAnalyticsRecord, UserId};
use shoprec_core::domain::product::ProductId;
use shoprec_core::errors::CollaboratorError;
use shoprec_core::recommendations::{AnalyticsStore, InteractionLog};

use super::{format_timestamp, parse_timestamp, AnalyticsRepository, RepositoryError};
use crate::DbPool;

pub struct SqlAnalyticsRepository {
    pool: DbPool,
}

impl SqlAnalyticsRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AnalyticsRepository for SqlAnalyticsRepository {
    async fn find_by_user_id(
        &self,
        user_id: &UserId,
    ) -> Result<Option<UserAnalyticsRecord>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let Some(row) = sqlx::query(
            "SELECT user_id, recommendations_json, last_trained_at
             FROM user_analytics
             WHERE user_id = ?",
        )
        .bind(user_id.as_str())
        .fetch_optional(&mut *tx)
        .await?
        else {
            return Ok(None);
        };

        let actions = sqlx::query(
            "SELECT product_id, action_type, occurred_at
             FROM user_action
             WHERE user_id = ?
             ORDER BY occurred_at ASC, id ASC",
        )
        .bind(user_id.as_str())
        .fetch_all(&mut *tx)
        .await?
        .iter()
        .map(action_event_from_row)
        .collect::<Result<Vec<_>, _>>()?;
        tx.commit().await?;

        let recommendations_json: String = row.try_get("recommendations_json")?;
        let last_trained_at: Option<String> = row.try_get("last_trained_at")?;

        Ok(Some(UserAnalyticsRecord {
            user_id: UserId(row.try_get("user_id")?),
            actions,
            recommendations: decode_recommendations(&recommendations_json)?,
            last_trained: last_trained_at
                .as_deref()
                .map(|value| parse_timestamp("last_trained_at", value))
                .transpose()?,
        }))
    }

    async fn upsert_recommendations(
        &self,
        user_id: &UserId,
        ids: &[ProductId],
        trained_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let recommendations_json = serde_json::to_string(ids)
            .map_err(|e| RepositoryError::Encode(format!("recommendations: {e}")))?;
        let now = format_timestamp(Utc::now());

        sqlx::query(
            r#"
            INSERT INTO user_analytics (
                user_id, recommendations_json, last_trained_at, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                recommendations_json = excluded.recommendations_json,
                last_trained_at = excluded.last_trained_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(user_id.as_str())
        .bind(recommendations_json)
        .bind(format_timestamp(trained_at))
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn record_action(
        &self,
        user_id: &UserId,
        event: &ActionEvent,
    ) -> Result<(), RepositoryError> {
        let now = format_timestamp(Utc::now());
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO user_analytics (user_id, recommendations_json, created_at, updated_at)
             VALUES (?, '[]', ?, ?)
             ON CONFLICT(user_id) DO NOTHING",
        )
        .bind(user_id.as_str())
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO user_action (user_id, product_id, action_type, occurred_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(user_id.as_str())
        .bind(event.product_id.as_str())
        .bind(event.action_type.as_str())
        .bind(format_timestamp(event.timestamp))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn list_all_actions(&self) -> Result<HashMap<UserId, Vec<ActionEvent>>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT user_id, product_id, action_type, occurred_at
             FROM user_action
             ORDER BY user_id ASC, occurred_at ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut by_user: HashMap<UserId, Vec<ActionEvent>> = HashMap::new();
        for row in &rows {
            let user_id = UserId(row.try_get("user_id")?);
            by_user.entry(user_id).or_default().push(action_event_from_row(row)?);
        }
        Ok(by_user)
    }
}

#[async_trait]
impl AnalyticsStore for SqlAnalyticsRepository {
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
impl InteractionLog for SqlAnalyticsRepository {
    async fn all_interactions(
        &self,
    ) -> Result<HashMap<UserId, Vec<ActionEvent>>, CollaboratorError> {
        Ok(self.list_all_actions().await?)
    }
}

fn action_event_from_row(row: &SqliteRow) -> Result<ActionEvent, RepositoryError> {
    let action_type: String = row.try_get("action_type")?;
    let occurred_at: String = row.try_get("occurred_at")?;

    Ok(ActionEvent {
        product_id: ProductId(row.try_get("product_id")?),
        action_type: ActionType::parse(&action_type)
            .ok_or_else(|| RepositoryError::Decode(format!("invalid action_type: {action_type}")))?,
        timestamp: parse_timestamp("occurred_at", &occurred_at)?,
    })
}

fn decode_recommendations(value: &str) -> Result<Vec<ProductId>, RepositoryError> {
    serde_json::from_str(value)
        .map_err(|e| RepositoryError::Decode(format!("invalid recommendations_json: {e}")))
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use shoprec_core::domain::analytics::{ActionEvent, ActionType, UserId};
    use shoprec_core::domain::product::ProductId;
    use shoprec_core::errors::CollaboratorError;
    use shoprec_core::recommendations::{AnalyticsStore, InteractionLog};

    use super::SqlAnalyticsRepository;
    use crate::repositories::AnalyticsRepository;
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup_pool() -> DbPool {
        let pool =
            connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 10, hour, 0, 0).single().expect("timestamp")
    }

    fn event(product: &str, action_type: ActionType, timestamp: DateTime<Utc>) -> ActionEvent {
        ActionEvent { product_id: ProductId(product.to_string()), action_type, timestamp }
    }

    fn ids(values: &[&str]) -> Vec<ProductId> {
        values.iter().map(|value| ProductId(value.to_string())).collect()
    }

    #[tokio::test]
    async fn unknown_user_has_no_record() {
        let pool = setup_pool().await;
        let repo = SqlAnalyticsRepository::new(pool.clone());

        let record = repo.get_by_user_id(&UserId::from("nobody")).await.expect("lookup");

        assert!(record.is_none());
        pool.close().await;
    }

    #[tokio::test]
    async fn first_action_creates_an_untrained_record_with_ordered_actions() {
        let pool = setup_pool().await;
        let repo = SqlAnalyticsRepository::new(pool.clone());
        let user = UserId::from("u-1");

        repo.record_action(&user, &event("lamp", ActionType::CartAdd, at(11)))
            .await
            .expect("record later action");
        repo.record_action(&user, &event("desk", ActionType::View, at(9)))
            .await
            .expect("record earlier action");

        let record = repo.find_by_user_id(&user).await.expect("lookup").expect("record exists");

        assert_eq!(record.last_trained, None);
        assert!(record.recommendations.is_empty());
        assert_eq!(
            record.actions,
            vec![event("desk", ActionType::View, at(9)), event("lamp", ActionType::CartAdd, at(11))]
        );
        pool.close().await;
    }

    #[tokio::test]
    async fn upsert_replaces_list_and_timestamp_together() {
        let pool = setup_pool().await;
        let repo = SqlAnalyticsRepository::new(pool.clone());
        let user = UserId::from("u-2");
        repo.record_action(&user, &event("desk", ActionType::View, at(8)))
            .await
            .expect("record action");

        AnalyticsStore::upsert_recommendations(&repo, &user, &ids(&["p1", "p3"]), at(10))
            .await
            .expect("first upsert");
        AnalyticsStore::upsert_recommendations(&repo, &user, &ids(&["p2", "p5"]), at(14))
            .await
            .expect("second upsert");

        let record = repo.get_by_user_id(&user).await.expect("lookup").expect("record exists");
        assert_eq!(record.recommendations, ids(&["p2", "p5"]));
        assert_eq!(record.last_trained, Some(at(14)));
        assert_eq!(record.actions.len(), 1, "upsert must not touch the action log");
        pool.close().await;
    }

    #[tokio::test]
    async fn upsert_creates_missing_record() {
        let pool = setup_pool().await;
        let repo = SqlAnalyticsRepository::new(pool.clone());
        let user = UserId::from("u-3");

        AnalyticsStore::upsert_recommendations(&repo, &user, &ids(&["p9"]), at(12))
            .await
            .expect("upsert");

        let record = repo.get_by_user_id(&user).await.expect("lookup").expect("record exists");
        assert_eq!(record.recommendations, ids(&["p9"]));
        assert!(record.actions.is_empty());
        pool.close().await;
    }

    #[tokio::test]
    async fn record_and_actions_are_read_in_one_transaction_that_is_released() {
        let pool = setup_pool().await;
        let repo = SqlAnalyticsRepository::new(pool.clone());
        let user = UserId::from("u-4");
        repo.record_action(&user, &event("desk", ActionType::View, at(8)))
            .await
            .expect("record action");
        AnalyticsStore::upsert_recommendations(&repo, &user, &ids(&["p1"]), at(9))
            .await
            .expect("upsert");

        let record = repo.find_by_user_id(&user).await.expect("lookup").expect("record exists");
        let missing = repo.find_by_user_id(&UserId::from("nobody")).await.expect("lookup");

        assert_eq!(record.recommendations, ids(&["p1"]));
        assert_eq!(record.actions, vec![event("desk", ActionType::View, at(8))]);
        assert!(missing.is_none());
        repo.record_action(&user, &event("lamp", ActionType::Purchase, at(10)))
            .await
            .expect("single pooled connection is free again after both reads");
        pool.close().await;
    }

    #[tokio::test]
    async fn interaction_log_groups_actions_by_user() {
        let pool = setup_pool().await;
        let repo = SqlAnalyticsRepository::new(pool.clone());
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");
        repo.record_action(&alice, &event("desk", ActionType::Purchase, at(7)))
            .await
            .expect("alice action");
        repo.record_action(&bob, &event("lamp", ActionType::Wishlist, at(7)))
            .await
            .expect("bob action");
        repo.record_action(&alice, &event("lamp", ActionType::View, at(7) + Duration::minutes(5)))
            .await
            .expect("alice second action");

        let log = repo.all_interactions().await.expect("interactions");

        assert_eq!(log.len(), 2);
        assert_eq!(log[&alice].len(), 2);
        assert_eq!(log[&alice][0].product_id, ProductId::from("desk"));
        assert_eq!(log[&bob], vec![event("lamp", ActionType::Wishlist, at(7))]);
        pool.close().await;
    }

    #[tokio::test]
    async fn corrupt_cached_list_is_a_decode_error() {
        let pool = setup_pool().await;
        let repo = SqlAnalyticsRepository::new(pool.clone());
        sqlx::query(
            "INSERT INTO user_analytics (user_id, recommendations_json, created_at, updated_at)
             VALUES ('u-bad', 'not-json', '2026-06-10T00:00:00Z', '2026-06-10T00:00:00Z')",
        )
        .execute(&pool)
        .await
        .expect("insert corrupt row");

        let result = repo.get_by_user_id(&UserId::from("u-bad")).await;

        assert!(matches!(result, Err(CollaboratorError::Decode(_))));
        pool.close().await;
    }
}
