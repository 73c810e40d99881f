use std::env;
use std::sync::{Mutex, OnceLock};

use serde_json::Value;
use shoprec_cli::commands::{config, migrate, recommend, seed, token};
use tempfile::TempDir;

const SECRET: &str = "cli-test-signing-secret";
const MEMORY_DB: &str = "sqlite::memory:";

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&[("SHOPREC_AUTH_SIGNING_SECRET", SECRET), ("SHOPREC_DATABASE_URL", MEMORY_DB)], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["data"]["applied"], 1);
    });
}

#[test]
fn migrate_returns_config_failure_without_signing_secret() {
    with_env(&[], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
        assert!(payload["message"].as_str().unwrap_or_default().contains("auth.signing_secret"));
    });
}

#[test]
fn seed_reports_demo_dataset_summary() {
    with_env(&[("SHOPREC_AUTH_SIGNING_SECRET", SECRET), ("SHOPREC_DATABASE_URL", MEMORY_DB)], || {
        let result = seed::run();
        assert_eq!(result.exit_code, 0, "expected seed success");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "seed");
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["data"]["shops"], 2);
        assert_eq!(payload["data"]["products"], 13);
        assert_eq!(payload["data"]["users"], serde_json::json!(["user-ada", "user-bo", "user-cy"]));
        let message = payload["message"].as_str().unwrap_or_default();
        assert!(message.starts_with("demo dataset loaded: 2 shops, 13 products"));
    });
}

#[test]
fn seed_is_idempotent_across_runs() {
    let dir = TempDir::new().expect("temp dir");
    let url = file_database_url(&dir);

    with_env(&[("SHOPREC_AUTH_SIGNING_SECRET", SECRET), ("SHOPREC_DATABASE_URL", &url)], || {
        let first = seed::run();
        assert_eq!(first.exit_code, 0, "expected first seed invocation success");
        let second = seed::run();
        assert_eq!(second.exit_code, 0, "expected second seed invocation success");

        let first_payload = parse_payload(&first.output);
        let second_payload = parse_payload(&second.output);
        assert_eq!(first_payload["data"], second_payload["data"]);
    });
}

#[test]
fn recommend_retrains_seeded_user_then_serves_cache() {
    let dir = TempDir::new().expect("temp dir");
    let url = file_database_url(&dir);

    with_env(&[("SHOPREC_AUTH_SIGNING_SECRET", SECRET), ("SHOPREC_DATABASE_URL", &url)], || {
        assert_eq!(seed::run().exit_code, 0, "expected seed success");

        let first = recommend::run("user-ada");
        assert_eq!(first.exit_code, 0, "expected recommend success: {}", first.output);
        let first_payload = parse_payload(&first.output);
        assert_eq!(first_payload["command"], "recommend");
        assert_eq!(first_payload["data"]["userId"], "user-ada");
        assert_eq!(first_payload["data"]["servedFrom"], "retrained");
        let recommendations = first_payload["data"]["recommendations"].as_array();
        assert!(recommendations.is_some_and(|items| !items.is_empty()));

        let second = recommend::run("user-ada");
        let second_payload = parse_payload(&second.output);
        assert_eq!(second_payload["data"]["servedFrom"], "cache_hit");
        assert_eq!(
            first_payload["data"]["recommendations"],
            second_payload["data"]["recommendations"]
        );
    });
}

#[test]
fn recommend_falls_back_to_newest_products_for_unknown_user() {
    let dir = TempDir::new().expect("temp dir");
    let url = file_database_url(&dir);

    with_env(&[("SHOPREC_AUTH_SIGNING_SECRET", SECRET), ("SHOPREC_DATABASE_URL", &url)], || {
        assert_eq!(seed::run().exit_code, 0, "expected seed success");

        let result = recommend::run("user-nobody");
        assert_eq!(result.exit_code, 0, "expected recommend success");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["data"]["servedFrom"], "fallback");
        let recommendations =
            payload["data"]["recommendations"].as_array().cloned().unwrap_or_default();
        assert_eq!(recommendations.len(), 10);
        assert_eq!(recommendations[0]["id"], "prod-mirror");
    });
}

#[test]
fn recommend_rejects_blank_user_id() {
    with_env(&[("SHOPREC_AUTH_SIGNING_SECRET", SECRET), ("SHOPREC_DATABASE_URL", MEMORY_DB)], || {
        let result = recommend::run("   ");
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "invalid_input");
    });
}

#[test]
fn token_is_scoped_to_the_requested_user() {
    with_env(&[("SHOPREC_AUTH_SIGNING_SECRET", SECRET), ("SHOPREC_DATABASE_URL", MEMORY_DB)], || {
        let result = token::run("user-bo");
        assert_eq!(result.exit_code, 0, "expected token success");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "token");
        assert_eq!(payload["data"]["userId"], "user-bo");
        let token = payload["data"]["token"].as_str().unwrap_or_default();
        assert!(token.starts_with("user-bo."), "token should carry the user id: {token}");
    });
}

#[test]
fn config_redacts_signing_secret_and_attributes_env_source() {
    with_env(
        &[
            ("SHOPREC_AUTH_SIGNING_SECRET", SECRET),
            ("SHOPREC_RECOMMENDATIONS_STALENESS_WINDOW_SECS", "7200"),
        ],
        || {
            let result = config::run();
            assert_eq!(result.exit_code, 0, "expected config success");

            let payload = parse_payload(&result.output);
            let message = payload["message"].as_str().unwrap_or_default();
            assert!(!message.contains(SECRET), "signing secret must never be printed");
            assert!(message.contains("auth.signing_secret = <redacted:23 bytes>"));
            assert!(message.contains(
                "recommendations.staleness_window_secs = 7200 \
                 (source: env (SHOPREC_RECOMMENDATIONS_STALENESS_WINDOW_SECS))"
            ));
            assert!(message.contains("recommendations.fallback_limit = 10 (source: default)"));
        },
    );
}

fn file_database_url(dir: &TempDir) -> String {
    format!("sqlite://{}?mode=rwc", dir.path().join("shoprec.db").display())
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "SHOPREC_DATABASE_URL",
        "SHOPREC_DATABASE_MAX_CONNECTIONS",
        "SHOPREC_DATABASE_TIMEOUT_SECS",
        "SHOPREC_SERVER_BIND_ADDRESS",
        "SHOPREC_SERVER_PORT",
        "SHOPREC_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "SHOPREC_RECOMMENDATIONS_STALENESS_WINDOW_SECS",
        "SHOPREC_RECOMMENDATIONS_FALLBACK_LIMIT",
        "SHOPREC_RECOMMENDATIONS_TRAINER_TIMEOUT_SECS",
        "SHOPREC_RECOMMENDATIONS_TRAINER_TOP_N",
        "SHOPREC_RECOMMENDATIONS_SINGLE_FLIGHT",
        "SHOPREC_AUTH_SIGNING_SECRET",
        "SHOPREC_AUTH_TOKEN_TTL_SECS",
        "SHOPREC_LOGGING_LEVEL",
        "SHOPREC_LOGGING_FORMAT",
        "SHOPREC_LOG_LEVEL",
        "SHOPREC_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
