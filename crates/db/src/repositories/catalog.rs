use async_trait::async_trait;
use sqlx::{sqlite::SqliteRow, Row};

use shoprec_core::domain::product::{CatalogProduct, ProductId, ProductSummary, Shop, ShopId};
use shoprec_core::errors::CollaboratorError;
use shoprec_core::recommendations::CatalogProvider;

use super::{format_timestamp, parse_timestamp, CatalogRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCatalogRepository {
    pool: DbPool,
}

impl SqlCatalogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogRepository for SqlCatalogRepository {
    async fn list_active(&self) -> Result<Vec<ProductSummary>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT p.id, p.title, p.shop_id, s.name AS shop_name, p.created_at
            FROM product p
            JOIN shop s ON s.id = p.shop_id
            WHERE p.active = 1
            ORDER BY p.created_at DESC, p.id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(product_summary_from_row).collect()
    }

    async fn save_shop(&self, shop: &Shop) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO shop (id, name) VALUES (?, ?)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name",
        )
        .bind(shop.id.as_str())
        .bind(&shop.name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_product(&self, product: &CatalogProduct) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO product (id, title, shop_id, active, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                shop_id = excluded.shop_id,
                active = excluded.active,
                created_at = excluded.created_at
            "#,
        )
        .bind(product.id.as_str())
        .bind(&product.title)
        .bind(product.shop_id.as_str())
        .bind(product.active)
        .bind(format_timestamp(product.created_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl CatalogProvider for SqlCatalogRepository {
    async fn list_active_products(&self) -> Result<Vec<ProductSummary>, CollaboratorError> {
        Ok(self.list_active().await?)
    }
}

fn product_summary_from_row(row: &SqliteRow) -> Result<ProductSummary, RepositoryError> {
    let created_at: String = row.try_get("created_at")?;

    Ok(ProductSummary {
        id: ProductId(row.try_get("id")?),
        title: row.try_get("title")?,
        shop_id: ShopId(row.try_get("shop_id")?),
        shop_name: row.try_get("shop_name")?,
        created_at: parse_timestamp("created_at", &created_at)?,
    })
}
