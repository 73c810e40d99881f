use std::sync::Arc;

use axum::Router;
use shoprec_core::config::{AppConfig, ConfigError, LoadOptions};
use shoprec_core::{InteractionTrainer, RecommendationService, TokenSigner};
use shoprec_db::{connect, migrations, DbPool, SqlAnalyticsRepository, SqlCatalogRepository};
use thiserror::Error;
use tracing::info;

use crate::{api, health};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub router: Router,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let catalog = Arc::new(SqlCatalogRepository::new(db_pool.clone()));
    let analytics = Arc::new(SqlAnalyticsRepository::new(db_pool.clone()));
    let trainer =
        Arc::new(InteractionTrainer::new(analytics.clone(), config.recommendations.trainer_top_n));
    let service = RecommendationService::new(catalog, analytics, trainer, &config.recommendations);
    let signer = TokenSigner::new(config.auth.signing_secret.clone(), config.auth.token_ttl_secs);

    info!(
        event_name = "system.bootstrap.recommendations_ready",
        correlation_id = "bootstrap",
        staleness_window_secs = config.recommendations.staleness_window_secs,
        single_flight = config.recommendations.single_flight,
        "recommendation service initialized"
    );

    let router = api::router(api::ApiState::new(Arc::new(service), Arc::new(signer)))
        .merge(health::router(db_pool.clone()));

    Ok(Application { config, db_pool, router })
}
