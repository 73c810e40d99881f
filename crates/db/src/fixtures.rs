use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::info;

use shoprec_core::domain::analytics::ActionType;

use crate::connection::DbPool;
use crate::repositories::{format_timestamp, RepositoryError};

const DEMO_SHOPS: &[(&str, &str)] =
    &[("shop-harbor", "Harbor Goods"), ("shop-timber", "Timber Works")];

/// `(id, title, shop, active, age in days)`
const DEMO_PRODUCTS: &[(&str, &str, &str, bool, i64)] = &[
    ("prod-walnut-desk", "Walnut Desk", "shop-timber", true, 40),
    ("prod-oak-shelf", "Oak Shelf", "shop-timber", true, 36),
    ("prod-brass-lamp", "Brass Lamp", "shop-harbor", true, 30),
    ("prod-linen-throw", "Linen Throw", "shop-harbor", true, 27),
    ("prod-wool-rug", "Wool Rug", "shop-harbor", true, 21),
    ("prod-desk-mat", "Leather Desk Mat", "shop-timber", true, 18),
    ("prod-ceramic-vase", "Ceramic Vase", "shop-harbor", true, 14),
    ("prod-reading-chair", "Reading Chair", "shop-timber", true, 11),
    ("prod-wall-clock", "Wall Clock", "shop-harbor", true, 8),
    ("prod-pine-stool", "Pine Stool", "shop-timber", true, 5),
    ("prod-cotton-pillow", "Cotton Pillow", "shop-harbor", true, 3),
    ("prod-mirror", "Round Mirror", "shop-harbor", true, 1),
    ("prod-retired-bench", "Cedar Bench", "shop-timber", false, 2),
];

/// `(user, product, action, hours ago)`
const DEMO_ACTIONS: &[(&str, &str, ActionType, i64)] = &[
    ("user-ada", "prod-walnut-desk", ActionType::View, 30),
    ("user-ada", "prod-walnut-desk", ActionType::CartAdd, 29),
    ("user-ada", "prod-brass-lamp", ActionType::View, 28),
    ("user-bo", "prod-walnut-desk", ActionType::Purchase, 50),
    ("user-bo", "prod-desk-mat", ActionType::CartAdd, 49),
    ("user-bo", "prod-reading-chair", ActionType::Wishlist, 48),
    ("user-cy", "prod-brass-lamp", ActionType::Purchase, 20),
    ("user-cy", "prod-linen-throw", ActionType::View, 19),
    ("user-cy", "prod-wool-rug", ActionType::CartAdd, 18),
];

/// Deterministic demo catalog and interaction history.
///
/// Product ages and action times are relative to the `now` passed to [`load`](Self::load) so the
/// catalog always looks recent. Seeded users start untrained; the first request for each one
/// retrains.
pub struct DemoSeedDataset;

impl DemoSeedDataset {
    /// Replaces any previously seeded demo rows.
    pub async fn load(pool: &DbPool, now: DateTime<Utc>) -> Result<SeedResult, RepositoryError> {
        Self::clean(pool).await?;

        let mut tx = pool.begin().await?;

        for (id, name) in DEMO_SHOPS {
            sqlx::query("INSERT INTO shop (id, name) VALUES (?, ?)")
                .bind(*id)
                .bind(*name)
                .execute(&mut *tx)
                .await?;
        }

        for (id, title, shop_id, active, age_days) in DEMO_PRODUCTS {
            sqlx::query(
                "INSERT INTO product (id, title, shop_id, active, created_at)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(*id)
            .bind(*title)
            .bind(*shop_id)
            .bind(*active)
            .bind(format_timestamp(now - Duration::days(*age_days)))
            .execute(&mut *tx)
            .await?;
        }

        let stamp = format_timestamp(now);
        for user_id in demo_user_ids() {
            sqlx::query(
                "INSERT INTO user_analytics (user_id, recommendations_json, created_at, updated_at)
                 VALUES (?, '[]', ?, ?)",
            )
            .bind(user_id)
            .bind(&stamp)
            .bind(&stamp)
            .execute(&mut *tx)
            .await?;
        }

        for (user_id, product_id, action_type, hours_ago) in DEMO_ACTIONS {
            sqlx::query(
                "INSERT INTO user_action (user_id, product_id, action_type, occurred_at)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(*user_id)
            .bind(*product_id)
            .bind(action_type.as_str())
            .bind(format_timestamp(now - Duration::hours(*hours_ago)))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        info!(
            event_name = "db.seed.loaded",
            shops = DEMO_SHOPS.len(),
            products = DEMO_PRODUCTS.len(),
            actions = DEMO_ACTIONS.len(),
            "demo dataset loaded"
        );

        Ok(SeedResult {
            shops: DEMO_SHOPS.len(),
            products: DEMO_PRODUCTS.len(),
            users: demo_user_ids().into_iter().map(str::to_string).collect(),
            actions: DEMO_ACTIONS.len(),
        })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let shop_ids: Vec<&str> = DEMO_SHOPS.iter().map(|(id, _)| *id).collect();
        let product_ids: Vec<&str> = DEMO_PRODUCTS.iter().map(|(id, ..)| *id).collect();
        let user_ids = demo_user_ids();

        let shops: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM shop WHERE id IN {}",
            sql_array_from_ids(&shop_ids)
        ))
        .fetch_one(pool)
        .await?;
        let products: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM product WHERE id IN {}",
            sql_array_from_ids(&product_ids)
        ))
        .fetch_one(pool)
        .await?;
        let users: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM user_analytics WHERE user_id IN {}",
            sql_array_from_ids(&user_ids)
        ))
        .fetch_one(pool)
        .await?;
        let actions: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM user_action WHERE user_id IN {}",
            sql_array_from_ids(&user_ids)
        ))
        .fetch_one(pool)
        .await?;

        let checks = vec![
            ("demo-shops", shops == DEMO_SHOPS.len() as i64),
            ("demo-products", products == DEMO_PRODUCTS.len() as i64),
            ("demo-users", users == user_ids.len() as i64),
            ("demo-actions", actions == DEMO_ACTIONS.len() as i64),
        ];
        let all_present = checks.iter().all(|(_, ok)| *ok);

        Ok(VerificationResult { all_present, checks })
    }

    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let shop_ids: Vec<&str> = DEMO_SHOPS.iter().map(|(id, _)| *id).collect();
        let quoted_users = sql_array_from_ids(&demo_user_ids());
        let quoted_shops = sql_array_from_ids(&shop_ids);

        let mut tx = pool.begin().await?;

        sqlx::query(&format!("DELETE FROM user_action WHERE user_id IN {quoted_users}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM user_analytics WHERE user_id IN {quoted_users}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM product WHERE shop_id IN {quoted_shops}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM shop WHERE id IN {quoted_shops}"))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

fn demo_user_ids() -> Vec<&'static str> {
    let mut users: Vec<&'static str> = DEMO_ACTIONS.iter().map(|(user, ..)| *user).collect();
    users.dedup();
    users
}

fn sql_array_from_ids(ids: &[&str]) -> String {
    let quoted = ids.iter().map(|id| format!("'{}'", id)).collect::<Vec<_>>().join(",");
    format!("({quoted})")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeedResult {
    pub shops: usize,
    pub products: usize,
    pub users: Vec<String>,
    pub actions: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use shoprec_core::domain::analytics::UserId;

    use super::DemoSeedDataset;
    use crate::repositories::{
        AnalyticsRepository, CatalogRepository, SqlAnalyticsRepository, SqlCatalogRepository,
    };
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30)
            .await
            .expect("connect to test database");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }

    #[tokio::test]
    async fn seed_is_complete_and_idempotent() {
        let pool = setup_pool().await;
        let now = Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).single().expect("timestamp");

        let first = DemoSeedDataset::load(&pool, now).await.expect("load seed");
        let first_verification = DemoSeedDataset::verify(&pool).await.expect("verify seed");
        assert!(first_verification.all_present);
        assert_eq!(first.users, vec!["user-ada", "user-bo", "user-cy"]);

        DemoSeedDataset::load(&pool, now).await.expect("reload seed");
        let second_verification = DemoSeedDataset::verify(&pool).await.expect("re-verify seed");
        assert_eq!(first_verification, second_verification);

        pool.close().await;
    }

    #[tokio::test]
    async fn seeded_catalog_excludes_retired_products_and_users_start_untrained() {
        let pool = setup_pool().await;
        let now = Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).single().expect("timestamp");
        DemoSeedDataset::load(&pool, now).await.expect("load seed");

        let catalog = SqlCatalogRepository::new(pool.clone()).list_active().await.expect("catalog");
        assert_eq!(catalog.len(), 12);
        assert_eq!(catalog[0].id.as_str(), "prod-mirror");
        assert!(catalog.iter().all(|product| product.id.as_str() != "prod-retired-bench"));

        let ada = SqlAnalyticsRepository::new(pool.clone())
            .find_by_user_id(&UserId::from("user-ada"))
            .await
            .expect("lookup")
            .expect("seeded user");
        assert_eq!(ada.last_trained, None);
        assert_eq!(ada.actions.len(), 3);

        pool.close().await;
    }

    #[tokio::test]
    async fn clean_removes_seeded_rows() {
        let pool = setup_pool().await;
        let now = Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).single().expect("timestamp");
        DemoSeedDataset::load(&pool, now).await.expect("load seed");

        DemoSeedDataset::clean(&pool).await.expect("clean seed");

        let verification = DemoSeedDataset::verify(&pool).await.expect("verify after clean");
        assert!(!verification.all_present);
        assert!(verification.checks.iter().all(|(_, ok)| !ok));
        pool.close().await;
    }
}
