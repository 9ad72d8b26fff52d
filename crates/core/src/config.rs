use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub analytics: AnalyticsConfig,
    pub notification: NotificationConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
    pub event_buffer: usize,
}

/// Thresholds and horizons for the sales analytics engine. The defaults are
/// the per-analysis values the dashboard has always used; they are not
/// unified across analyses.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    pub forecast_min_days: usize,
    pub forecast_horizon_days: i64,
    pub anomaly_min_days: usize,
    pub anomaly_contamination: f64,
    pub anomaly_trees: usize,
    pub anomaly_seed: u64,
    pub price_min_observations: usize,
    pub price_headroom: i64,
    pub restock_min_days: usize,
    pub restock_horizon_days: i64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            forecast_min_days: 2,
            forecast_horizon_days: 30,
            anomaly_min_days: 2,
            anomaly_contamination: 0.2,
            anomaly_trees: 100,
            anomaly_seed: 42,
            price_min_observations: 5,
            price_headroom: 5,
            restock_min_days: 5,
            restock_horizon_days: 7,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NotificationConfig {
    pub enabled: bool,
    pub sender: String,
    pub subject: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
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
    pub server_port: Option<u16>,
    pub notification_enabled: Option<bool>,
    pub anomaly_seed: Option<u64>,
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
                url: "sqlite://tantrata.db?mode=rwc".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
                event_buffer: 64,
            },
            analytics: AnalyticsConfig::default(),
            notification: NotificationConfig {
                enabled: true,
                sender: "store@tantrata.local".to_string(),
                subject: "Product Recommendations Just for You".to_string(),
            },
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
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("tantrata.toml"));
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
            if let Some(event_buffer) = server.event_buffer {
                self.server.event_buffer = event_buffer;
            }
        }

        if let Some(analytics) = patch.analytics {
            let target = &mut self.analytics;
            if let Some(value) = analytics.forecast_min_days {
                target.forecast_min_days = value;
            }
            if let Some(value) = analytics.forecast_horizon_days {
                target.forecast_horizon_days = value;
            }
            if let Some(value) = analytics.anomaly_min_days {
                target.anomaly_min_days = value;
            }
            if let Some(value) = analytics.anomaly_contamination {
                target.anomaly_contamination = value;
            }
            if let Some(value) = analytics.anomaly_trees {
                target.anomaly_trees = value;
            }
            if let Some(value) = analytics.anomaly_seed {
                target.anomaly_seed = value;
            }
            if let Some(value) = analytics.price_min_observations {
                target.price_min_observations = value;
            }
            if let Some(value) = analytics.price_headroom {
                target.price_headroom = value;
            }
            if let Some(value) = analytics.restock_min_days {
                target.restock_min_days = value;
            }
            if let Some(value) = analytics.restock_horizon_days {
                target.restock_horizon_days = value;
            }
        }

        if let Some(notification) = patch.notification {
            if let Some(enabled) = notification.enabled {
                self.notification.enabled = enabled;
            }
            if let Some(sender) = notification.sender {
                self.notification.sender = sender;
            }
            if let Some(subject) = notification.subject {
                self.notification.subject = subject;
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
        if let Some(value) = read_env("TANTRATA_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("TANTRATA_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_env("TANTRATA_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("TANTRATA_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_env("TANTRATA_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("TANTRATA_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("TANTRATA_SERVER_PORT") {
            self.server.port = parse_env("TANTRATA_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("TANTRATA_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_env("TANTRATA_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("TANTRATA_ANALYTICS_ANOMALY_SEED") {
            self.analytics.anomaly_seed = parse_env("TANTRATA_ANALYTICS_ANOMALY_SEED", &value)?;
        }
        if let Some(value) = read_env("TANTRATA_ANALYTICS_FORECAST_HORIZON_DAYS") {
            self.analytics.forecast_horizon_days =
                parse_env("TANTRATA_ANALYTICS_FORECAST_HORIZON_DAYS", &value)?;
        }

        if let Some(value) = read_env("TANTRATA_NOTIFICATION_ENABLED") {
            self.notification.enabled = parse_env("TANTRATA_NOTIFICATION_ENABLED", &value)?;
        }
        if let Some(value) = read_env("TANTRATA_NOTIFICATION_SENDER") {
            self.notification.sender = value;
        }

        let log_level =
            read_env("TANTRATA_LOGGING_LEVEL").or_else(|| read_env("TANTRATA_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("TANTRATA_LOGGING_FORMAT").or_else(|| read_env("TANTRATA_LOG_FORMAT"));
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
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
        if let Some(enabled) = overrides.notification_enabled {
            self.notification.enabled = enabled;
        }
        if let Some(seed) = overrides.anomaly_seed {
            self.analytics.anomaly_seed = seed;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_analytics(&self.analytics)?;
        validate_notification(&self.notification)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("tantrata.toml"), PathBuf::from("config/tantrata.toml")]
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

    if server.event_buffer == 0 {
        return Err(ConfigError::Validation(
            "server.event_buffer must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_analytics(analytics: &AnalyticsConfig) -> Result<(), ConfigError> {
    let min_points = [
        ("analytics.forecast_min_days", analytics.forecast_min_days),
        ("analytics.anomaly_min_days", analytics.anomaly_min_days),
        ("analytics.price_min_observations", analytics.price_min_observations),
        ("analytics.restock_min_days", analytics.restock_min_days),
    ];
    for (key, value) in min_points {
        if value < 2 {
            return Err(ConfigError::Validation(format!(
                "{key} must be at least 2 (a line needs two points)"
            )));
        }
    }

    if analytics.forecast_horizon_days < 0 || analytics.restock_horizon_days < 0 {
        return Err(ConfigError::Validation(
            "analytics horizons must not be negative".to_string(),
        ));
    }

    let contamination = analytics.anomaly_contamination;
    if !(contamination > 0.0 && contamination <= 0.5) {
        return Err(ConfigError::Validation(
            "analytics.anomaly_contamination must be in range (0, 0.5]".to_string(),
        ));
    }

    if analytics.anomaly_trees == 0 {
        return Err(ConfigError::Validation(
            "analytics.anomaly_trees must be greater than zero".to_string(),
        ));
    }

    if analytics.price_headroom < 0 {
        return Err(ConfigError::Validation(
            "analytics.price_headroom must not be negative".to_string(),
        ));
    }

    Ok(())
}

fn validate_notification(notification: &NotificationConfig) -> Result<(), ConfigError> {
    if notification.enabled && !notification.sender.contains('@') {
        return Err(ConfigError::Validation(
            "notification.sender must be an email address when notifications are enabled"
                .to_string(),
        ));
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
    analytics: Option<AnalyticsPatch>,
    notification: Option<NotificationPatch>,
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
    event_buffer: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct AnalyticsPatch {
    forecast_min_days: Option<usize>,
    forecast_horizon_days: Option<i64>,
    anomaly_min_days: Option<usize>,
    anomaly_contamination: Option<f64>,
    anomaly_trees: Option<usize>,
    anomaly_seed: Option<u64>,
    price_min_observations: Option<usize>,
    price_headroom: Option<i64>,
    restock_min_days: Option<usize>,
    restock_horizon_days: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct NotificationPatch {
    enabled: Option<bool>,
    sender: Option<String>,
    subject: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
