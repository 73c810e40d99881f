pub mod analytics;
pub mod product;
