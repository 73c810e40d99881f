//! Per-user recommendation caching with staleness-triggered retraining.

pub mod catalog;
pub mod fallback;
pub mod gate;
pub mod ports;
pub mod service;
pub mod staleness;
pub mod trainer;

pub use catalog::Catalog;
pub use fallback::{fallback, DEFAULT_FALLBACK_LIMIT};
pub use gate::{RetrainGate, RetrainPermit};
pub use ports::{AnalyticsStore, CatalogProvider, Clock, InteractionLog, SystemClock, Trainer};
pub use service::{RecommendationService, Recommendations, ServedFrom};
pub use staleness::{CacheState, StalenessPolicy};
pub use trainer::{InteractionTrainer, DEFAULT_TRAINER_TOP_N};
