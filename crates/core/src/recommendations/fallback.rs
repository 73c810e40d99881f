use crate::domain::product::ProductSummary;

use super::catalog::Catalog;

pub const DEFAULT_FALLBACK_LIMIT: usize = 10;

/// Cold-start list: the `limit` newest catalog products, newest first.
/// Equal creation times are ordered by product id.
pub fn fallback(catalog: &Catalog, limit: usize) -> Vec<ProductSummary> {
    let mut newest: Vec<&ProductSummary> = catalog.products().iter().collect();
    newest.sort_by(|left, right| {
        right.created_at.cmp(&left.created_at).then_with(|| left.id.cmp(&right.id))
    });
    newest.into_iter().take(limit).cloned().collect()
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{fallback, DEFAULT_FALLBACK_LIMIT};
    use crate::domain::product::{ProductId, ProductSummary, ShopId};
    use crate::recommendations::catalog::Catalog;

    fn product(id: &str, day: i64) -> ProductSummary {
        let base = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).single().expect("timestamp");
        ProductSummary {
            id: ProductId(id.to_string()),
            title: format!("Product {id}"),
            shop_id: ShopId("shop-9".to_string()),
            shop_name: "Night Market".to_string(),
            created_at: base + Duration::days(day),
        }
    }

    fn returned_ids(products: &[ProductSummary]) -> Vec<String> {
        products.iter().map(|product| product.id.0.clone()).collect()
    }

    #[test]
    fn returns_the_ten_newest_products_newest_first() {
        let catalog =
            Catalog::from_products((0..15).map(|day| product(&format!("p{day}"), day)).collect());

        let result = fallback(&catalog, DEFAULT_FALLBACK_LIMIT);

        let expected: Vec<String> = (5..15).rev().map(|day| format!("p{day}")).collect();
        assert_eq!(returned_ids(&result), expected);
    }

    #[test]
    fn small_catalog_returns_everything() {
        let catalog = Catalog::from_products(vec![product("old", 1), product("new", 3)]);

        let result = fallback(&catalog, DEFAULT_FALLBACK_LIMIT);

        assert_eq!(returned_ids(&result), vec!["new", "old"]);
    }

    #[test]
    fn empty_catalog_yields_empty_list() {
        assert!(fallback(&Catalog::default(), DEFAULT_FALLBACK_LIMIT).is_empty());
    }

    #[test]
    fn ties_on_creation_time_break_by_id() {
        let catalog =
            Catalog::from_products(vec![product("b", 2), product("a", 2), product("c", 1)]);

        assert_eq!(returned_ids(&fallback(&catalog, 3)), vec!["a", "b", "c"]);
    }
}
