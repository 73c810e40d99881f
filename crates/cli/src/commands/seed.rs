use chrono::Utc;
use shoprec_db::{DemoSeedDataset, SeedResult};

use crate::commands::{load_config, open_database, runtime, to_data, CommandFailure, CommandResult};

pub fn run() -> CommandResult {
    let config = match load_config("seed") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match runtime("seed") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;

        let seeded = DemoSeedDataset::load(&pool, Utc::now())
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;
        let verification = DemoSeedDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

        let failed: Vec<&str> = verification
            .checks
            .iter()
            .filter_map(|(check, passed)| (!passed).then_some(*check))
            .collect();
        pool.close().await;

        if verification.all_present {
            Ok::<SeedResult, CommandFailure>(seeded)
        } else {
            Err(("seed_verification", verification_message(&failed), 6u8))
        }
    });

    match result {
        Ok(seeded) => CommandResult::success_with(
            "seed",
            format!(
                "demo dataset loaded: {} shops, {} products, {} actions for users {}",
                seeded.shops,
                seeded.products,
                seeded.actions,
                seeded.users.join(", ")
            ),
            to_data(&seeded),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

fn verification_message(failed_checks: &[&str]) -> String {
    if failed_checks.is_empty() {
        "some seed data failed to load".to_string()
    } else {
        format!("seed verification failed for checks: {}", failed_checks.join(", "))
    }
}
