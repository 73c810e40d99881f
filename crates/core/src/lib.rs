pub mod auth;
pub mod config;
pub mod domain;
pub mod errors;
pub mod recommendations;

pub use auth::{AuthError, TokenSigner};
pub use domain::analytics::{ActionEvent, ActionType, UserAnalyticsRecord, UserId};
pub use domain::product::{CatalogProduct, ProductId, ProductSummary, Shop, ShopId};
pub use errors::{CollaboratorError, InterfaceError, RecommendationError, TrainingError};
pub use recommendations::{
    AnalyticsStore, CacheState, Catalog, CatalogProvider, Clock, InteractionLog,
    InteractionTrainer, RecommendationService, Recommendations, ServedFrom, StalenessPolicy,
    SystemClock, Trainer,
};
