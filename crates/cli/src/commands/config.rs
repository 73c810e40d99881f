use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::ExposeSecret;
use shoprec_core::config::AppConfig;
use toml::Value;

use crate::commands::{load_config, CommandResult};

/// Renders the effective configuration with the source of every value. Secrets are redacted.
pub fn run() -> CommandResult {
    let config = match load_config("config") {
        Ok(config) => config,
        Err(result) => return result,
    };

    let path = detect_config_path();
    let doc = path.as_deref().and_then(load_config_file_doc);

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, value, env_key) in effective_values(&config) {
        let source = field_source(key, env_key, doc.as_ref(), path.as_deref());
        lines.push(format!("- {key} = {value} (source: {source})"));
    }

    CommandResult::success("config", lines.join("\n"))
}

fn effective_values(config: &AppConfig) -> Vec<(&'static str, String, &'static str)> {
    let recommendations = &config.recommendations;
    vec![
        ("database.url", config.database.url.clone(), "SHOPREC_DATABASE_URL"),
        (
            "database.max_connections",
            config.database.max_connections.to_string(),
            "SHOPREC_DATABASE_MAX_CONNECTIONS",
        ),
        (
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            "SHOPREC_DATABASE_TIMEOUT_SECS",
        ),
        ("server.bind_address", config.server.bind_address.clone(), "SHOPREC_SERVER_BIND_ADDRESS"),
        ("server.port", config.server.port.to_string(), "SHOPREC_SERVER_PORT"),
        (
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            "SHOPREC_SERVER_GRACEFUL_SHUTDOWN_SECS",
        ),
        (
            "recommendations.staleness_window_secs",
            recommendations.staleness_window_secs.to_string(),
            "SHOPREC_RECOMMENDATIONS_STALENESS_WINDOW_SECS",
        ),
        (
            "recommendations.fallback_limit",
            recommendations.fallback_limit.to_string(),
            "SHOPREC_RECOMMENDATIONS_FALLBACK_LIMIT",
        ),
        (
            "recommendations.trainer_timeout_secs",
            recommendations.trainer_timeout_secs.to_string(),
            "SHOPREC_RECOMMENDATIONS_TRAINER_TIMEOUT_SECS",
        ),
        (
            "recommendations.trainer_top_n",
            recommendations.trainer_top_n.to_string(),
            "SHOPREC_RECOMMENDATIONS_TRAINER_TOP_N",
        ),
        (
            "recommendations.single_flight",
            recommendations.single_flight.to_string(),
            "SHOPREC_RECOMMENDATIONS_SINGLE_FLIGHT",
        ),
        (
            "auth.signing_secret",
            redact_secret(config.auth.signing_secret.expose_secret()),
            "SHOPREC_AUTH_SIGNING_SECRET",
        ),
        (
            "auth.token_ttl_secs",
            config.auth.token_ttl_secs.to_string(),
            "SHOPREC_AUTH_TOKEN_TTL_SECS",
        ),
        ("logging.level", config.logging.level.clone(), "SHOPREC_LOG_LEVEL"),
        ("logging.format", format!("{:?}", config.logging.format), "SHOPREC_LOG_FORMAT"),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("shoprec.toml"), PathBuf::from("config/shoprec.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: &Path) -> Option<Value> {
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    let logging_alias = env_key.replacen("SHOPREC_LOG_", "SHOPREC_LOGGING_", 1);
    for key in [logging_alias.as_str(), env_key] {
        if env::var_os(key).is_some() {
            return format!("env ({key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn redact_secret(secret: &str) -> String {
    if secret.trim().is_empty() {
        "<empty>".to_string()
    } else {
        format!("<redacted:{} bytes>", secret.len())
    }
}
