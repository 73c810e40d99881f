//! Point-in-time catalog snapshot with an id index for O(1) resolution.

use std::collections::{HashMap, HashSet};

use crate::domain::product::{ProductId, ProductSummary};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Catalog {
    products: Vec<ProductSummary>,
    index: HashMap<ProductId, usize>,
}

impl Catalog {
    /// Builds a snapshot. When the provider returns the same id twice the first row wins.
    pub fn from_products(products: Vec<ProductSummary>) -> Self {
        let mut catalog =
            Self { products: Vec::with_capacity(products.len()), index: HashMap::new() };
        for product in products {
            if catalog.index.contains_key(&product.id) {
                continue;
            }
            catalog.index.insert(product.id.clone(), catalog.products.len());
            catalog.products.push(product);
        }
        catalog
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn contains(&self, id: &ProductId) -> bool {
        self.index.contains_key(id)
    }

    pub fn get(&self, id: &ProductId) -> Option<&ProductSummary> {
        self.index.get(id).map(|position| &self.products[*position])
    }

    pub fn products(&self) -> &[ProductSummary] {
        &self.products
    }

    /// Maps ids to catalog products in the given order. Ids missing from the
    /// snapshot are dropped and repeated ids keep their first position.
    pub fn resolve(&self, ids: &[ProductId]) -> Vec<ProductSummary> {
        let mut seen = HashSet::with_capacity(ids.len());
        ids.iter()
            .filter(|id| seen.insert(*id))
            .filter_map(|id| self.get(id).cloned())
            .collect()
    }
}
