use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::MAX_TOKEN_TTL_SECS;

/// Staleness window must classify one hour as fresh and five hours as stale.
pub const MIN_STALENESS_WINDOW_SECS: u64 = 3_600;
pub const MAX_STALENESS_WINDOW_SECS: u64 = 18_000;
pub const DEFAULT_STALENESS_WINDOW_SECS: u64 = 4 * 3_600;

pub const MIN_SIGNING_SECRET_LEN: usize = 16;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub recommendations: RecommendationConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecommendationConfig {
    pub staleness_window_secs: u64,
    pub fallback_limit: usize,
    pub trainer_timeout_secs: u64,
    pub trainer_top_n: usize,
    pub single_flight: bool,
}

impl RecommendationConfig {
    pub fn staleness_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.staleness_window_secs).unwrap_or(i64::MAX))
    }

    pub fn trainer_timeout(&self) -> Duration {
        Duration::from_secs(self.trainer_timeout_secs)
    }
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            staleness_window_secs: DEFAULT_STALENESS_WINDOW_SECS,
            fallback_limit: 10,
            trainer_timeout_secs: 30,
            trainer_top_n: 20,
            single_flight: true,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub signing_secret: SecretString,
    pub token_ttl_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub auth_signing_secret: Option<String>,
    pub staleness_window_secs: Option<u64>,
    pub single_flight: Option<bool>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://shoprec.db?mode=rwc".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            recommendations: RecommendationConfig::default(),
            auth: AuthConfig { signing_secret: String::new().into(), token_ttl_secs: 86_400 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("shoprec.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(recommendations) = patch.recommendations {
            if let Some(window) = recommendations.staleness_window_secs {
                self.recommendations.staleness_window_secs = window;
            }
            if let Some(fallback_limit) = recommendations.fallback_limit {
                self.recommendations.fallback_limit = fallback_limit;
            }
            if let Some(timeout_secs) = recommendations.trainer_timeout_secs {
                self.recommendations.trainer_timeout_secs = timeout_secs;
            }
            if let Some(top_n) = recommendations.trainer_top_n {
                self.recommendations.trainer_top_n = top_n;
            }
            if let Some(single_flight) = recommendations.single_flight {
                self.recommendations.single_flight = single_flight;
            }
        }

        if let Some(auth) = patch.auth {
            if let Some(signing_secret) = auth.signing_secret {
                self.auth.signing_secret = signing_secret.into();
            }
            if let Some(token_ttl_secs) = auth.token_ttl_secs {
                self.auth.token_ttl_secs = token_ttl_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("SHOPREC_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("SHOPREC_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_env("SHOPREC_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("SHOPREC_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_env("SHOPREC_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("SHOPREC_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("SHOPREC_SERVER_PORT") {
            self.server.port = parse_env("SHOPREC_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("SHOPREC_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_env("SHOPREC_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("SHOPREC_RECOMMENDATIONS_STALENESS_WINDOW_SECS") {
            self.recommendations.staleness_window_secs =
                parse_env("SHOPREC_RECOMMENDATIONS_STALENESS_WINDOW_SECS", &value)?;
        }
        if let Some(value) = read_env("SHOPREC_RECOMMENDATIONS_FALLBACK_LIMIT") {
            self.recommendations.fallback_limit =
                parse_env("SHOPREC_RECOMMENDATIONS_FALLBACK_LIMIT", &value)?;
        }
        if let Some(value) = read_env("SHOPREC_RECOMMENDATIONS_TRAINER_TIMEOUT_SECS") {
            self.recommendations.trainer_timeout_secs =
                parse_env("SHOPREC_RECOMMENDATIONS_TRAINER_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("SHOPREC_RECOMMENDATIONS_TRAINER_TOP_N") {
            self.recommendations.trainer_top_n =
                parse_env("SHOPREC_RECOMMENDATIONS_TRAINER_TOP_N", &value)?;
        }
        if let Some(value) = read_env("SHOPREC_RECOMMENDATIONS_SINGLE_FLIGHT") {
            self.recommendations.single_flight =
                parse_env("SHOPREC_RECOMMENDATIONS_SINGLE_FLIGHT", &value)?;
        }

        if let Some(value) = read_env("SHOPREC_AUTH_SIGNING_SECRET") {
            self.auth.signing_secret = value.into();
        }
        if let Some(value) = read_env("SHOPREC_AUTH_TOKEN_TTL_SECS") {
            self.auth.token_ttl_secs = parse_env("SHOPREC_AUTH_TOKEN_TTL_SECS", &value)?;
        }

        let log_level = read_env("SHOPREC_LOGGING_LEVEL").or_else(|| read_env("SHOPREC_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("SHOPREC_LOGGING_FORMAT").or_else(|| read_env("SHOPREC_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(signing_secret) = overrides.auth_signing_secret {
            self.auth.signing_secret = signing_secret.into();
        }
        if let Some(window) = overrides.staleness_window_secs {
            self.recommendations.staleness_window_secs = window;
        }
        if let Some(single_flight) = overrides.single_flight {
            self.recommendations.single_flight = single_flight;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_recommendations(&self.recommendations)?;
        validate_auth(&self.auth)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("shoprec.toml"), PathBuf::from("config/shoprec.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_recommendations(recommendations: &RecommendationConfig) -> Result<(), ConfigError> {
    let window = recommendations.staleness_window_secs;
    if window <= MIN_STALENESS_WINDOW_SECS || window > MAX_STALENESS_WINDOW_SECS {
        return Err(ConfigError::Validation(format!(
            "recommendations.staleness_window_secs must be in range {}..={}",
            MIN_STALENESS_WINDOW_SECS + 1,
            MAX_STALENESS_WINDOW_SECS
        )));
    }

    if recommendations.fallback_limit == 0 {
        return Err(ConfigError::Validation(
            "recommendations.fallback_limit must be greater than zero".to_string(),
        ));
    }

    if recommendations.trainer_timeout_secs == 0 || recommendations.trainer_timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "recommendations.trainer_timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if recommendations.trainer_top_n == 0 {
        return Err(ConfigError::Validation(
            "recommendations.trainer_top_n must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_auth(auth: &AuthConfig) -> Result<(), ConfigError> {
    let secret = auth.signing_secret.expose_secret();
    if secret.trim().is_empty() {
        return Err(ConfigError::Validation(
            "auth.signing_secret is required (set SHOPREC_AUTH_SIGNING_SECRET)".to_string(),
        ));
    }
    if secret.len() < MIN_SIGNING_SECRET_LEN {
        return Err(ConfigError::Validation(format!(
            "auth.signing_secret must be at least {MIN_SIGNING_SECRET_LEN} bytes"
        )));
    }

    if auth.token_ttl_secs == 0 || auth.token_ttl_secs > MAX_TOKEN_TTL_SECS {
        return Err(ConfigError::Validation(format!(
            "auth.token_ttl_secs must be in range 1..={MAX_TOKEN_TTL_SECS}"
        )));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    recommendations: Option<RecommendationsPatch>,
    auth: Option<AuthPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RecommendationsPatch {
    staleness_window_secs: Option<u64>,
    fallback_limit: Option<usize>,
    trainer_timeout_secs: Option<u64>,
    trainer_top_n: Option<usize>,
    single_flight: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct AuthPatch {
    signing_secret: Option<String>,
    token_ttl_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
