use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use shoprec_core::domain::analytics::UserId;
use shoprec_core::domain::product::ProductSummary;
use shoprec_core::{InteractionTrainer, RecommendationService};
use shoprec_db::{SqlAnalyticsRepository, SqlCatalogRepository};

use crate::commands::{load_config, open_database, runtime, to_data, CommandResult};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RecommendOutput {
    user_id: String,
    served_from: &'static str,
    recommendations: Vec<ProductSummary>,
}

/// Runs one recommendation request against the configured database.
pub fn run(user_id: &str) -> CommandResult {
    let user_id = user_id.trim();
    if user_id.is_empty() {
        return CommandResult::failure("recommend", "invalid_input", "user id must not be empty", 2);
    }

    let config = match load_config("recommend") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match runtime("recommend") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let user = UserId::from(user_id);
    let correlation_id = format!("cli-{}", Utc::now().timestamp_millis());

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;

        let catalog = Arc::new(SqlCatalogRepository::new(pool.clone()));
        let analytics = Arc::new(SqlAnalyticsRepository::new(pool.clone()));
        let trainer = Arc::new(InteractionTrainer::new(
            analytics.clone(),
            config.recommendations.trainer_top_n,
        ));
        let service =
            RecommendationService::new(catalog, analytics, trainer, &config.recommendations);

        let outcome = service.get_recommendations(&user, &correlation_id).await;
        pool.close().await;
        outcome.map_err(|error| (error.kind(), error.to_string(), 6u8))
    });

    match result {
        Ok(recommendations) => {
            let output = RecommendOutput {
                user_id: user.0.clone(),
                served_from: recommendations.served_from.as_str(),
                recommendations: recommendations.products,
            };
            CommandResult::success_with(
                "recommend",
                format!(
                    "{} recommendations for {} ({})",
                    output.recommendations.len(),
                    output.user_id,
                    output.served_from
                ),
                to_data(&output),
            )
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("recommend", error_class, message, exit_code)
        }
    }
}
