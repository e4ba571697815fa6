//! Configuration module for the log harness.
//!
//! Loads settings from an optional file and the process environment into an
//! immutable [`Settings`] value built once at startup.

use config::{Config as ConfigLoader, ConfigError, Environment, File};
use serde::Deserialize;

use crate::domain::Level;

/// Service name used when no log group is configured.
pub const DEFAULT_SERVICE_NAME: &str = "my-backend-service";

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_RETENTION_DAYS: i32 = 30;

/// Root settings structure.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub environment: AppEnvironment,
    /// Minimum level a record needs to reach any sink.
    pub log_level: Level,
    pub cloudwatch: CloudWatchSettings,
}

/// Server settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// Deployment environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Production,
    /// Any other name (`test`, `staging`, ...).
    Other(String),
}

impl AppEnvironment {
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "development" => AppEnvironment::Development,
            "production" => AppEnvironment::Production,
            other => AppEnvironment::Other(other.to_string()),
        }
    }

    /// Read `NODE_ENV` (or `APP_ENV`) directly, for setup that runs before
    /// [`Settings::load`].
    pub fn from_process_env() -> Self {
        Self::select(
            std::env::var("NODE_ENV").ok(),
            std::env::var("APP_ENV").ok(),
        )
    }

    /// `NODE_ENV` wins over its `APP_ENV` alias; unset means development.
    fn select(node_env: Option<String>, app_env: Option<String>) -> Self {
        non_empty(node_env)
            .or_else(|| non_empty(app_env))
            .map(|name| Self::parse(&name))
            .unwrap_or(AppEnvironment::Development)
    }

    pub fn as_str(&self) -> &str {
        match self {
            AppEnvironment::Development => "development",
            AppEnvironment::Production => "production",
            AppEnvironment::Other(name) => name,
        }
    }

    /// Default minimum level when `LOG_LEVEL` is unset.
    pub fn default_log_level(&self) -> Level {
        match self {
            AppEnvironment::Production => Level::Info,
            _ => Level::Debug,
        }
    }
}

impl std::fmt::Display for AppEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// CloudWatch Logs sink settings.
#[derive(Debug, Clone)]
pub struct CloudWatchSettings {
    pub enabled: bool,
    pub region: Option<String>,
    pub log_group: Option<String>,
    /// Stream names are `<prefix>-<YYYY-MM-DD>`.
    pub log_stream_prefix: String,
    pub retention_days: i32,
    /// Static credentials; `None` falls back to the ambient credential chain.
    pub credentials: Option<StaticCredentials>,
}

/// Static AWS credentials.
#[derive(Clone)]
pub struct StaticCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl std::fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// Flat view of the environment, keyed by lowercased variable names.
///
/// Numbers and flags stay strings here so a malformed value falls back to
/// its default instead of failing startup.
#[derive(Debug, Deserialize)]
struct RawSettings {
    host: String,
    #[serde(default)]
    port: Option<String>,
    #[serde(default)]
    node_env: Option<String>,
    #[serde(default)]
    app_env: Option<String>,
    #[serde(default)]
    log_level: Option<String>,
    #[serde(default)]
    aws_region: Option<String>,
    #[serde(default)]
    aws_access_key_id: Option<String>,
    #[serde(default)]
    aws_secret_access_key: Option<String>,
    #[serde(default)]
    aws_cloudwatch_enabled: Option<String>,
    #[serde(default)]
    aws_cloudwatch_log_group: Option<String>,
    aws_cloudwatch_log_stream: String,
    #[serde(default)]
    aws_cloudwatch_retention_days: Option<String>,
}

impl Settings {
    /// Load settings from files and environment.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (`PORT`, `NODE_ENV`, `LOG_LEVEL`, `AWS_*`)
    /// 2. config/default.{toml,yaml,json} (if exists)
    /// 3. Built-in defaults
    pub fn load() -> Result<Self, ConfigError> {
        let config = with_defaults(ConfigLoader::builder())?
            .add_source(File::with_name("config/default").required(false))
            .add_source(Environment::default())
            .build()?;

        Self::from_raw(config.try_deserialize()?)
    }

    /// Build settings from an explicit variable map instead of the process
    /// environment.
    #[cfg(test)]
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let source: config::Map<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        let config = with_defaults(ConfigLoader::builder())?
            .add_source(Environment::default().source(Some(source)))
            .build()?;

        Self::from_raw(config.try_deserialize()?)
    }

    fn from_raw(raw: RawSettings) -> Result<Self, ConfigError> {
        let environment = AppEnvironment::select(raw.node_env, raw.app_env);

        let log_level = match non_empty(raw.log_level) {
            Some(level) => level.parse().unwrap_or_else(|e: String| {
                let fallback = environment.default_log_level();
                tracing::warn!(error = %e, fallback = %fallback, "Ignoring LOG_LEVEL");
                fallback
            }),
            None => environment.default_log_level(),
        };

        let credentials = match (
            non_empty(raw.aws_access_key_id),
            non_empty(raw.aws_secret_access_key),
        ) {
            (Some(access_key_id), Some(secret_access_key)) => Some(StaticCredentials {
                access_key_id,
                secret_access_key,
            }),
            _ => None,
        };

        Ok(Self {
            server: ServerSettings {
                host: raw.host,
                port: parse_or("PORT", raw.port, DEFAULT_PORT),
            },
            environment,
            log_level,
            cloudwatch: CloudWatchSettings {
                enabled: parse_flag("AWS_CLOUDWATCH_ENABLED", raw.aws_cloudwatch_enabled),
                region: non_empty(raw.aws_region),
                log_group: non_empty(raw.aws_cloudwatch_log_group),
                log_stream_prefix: non_empty(Some(raw.aws_cloudwatch_log_stream))
                    .unwrap_or_else(|| "app".to_string()),
                retention_days: parse_or(
                    "AWS_CLOUDWATCH_RETENTION_DAYS",
                    raw.aws_cloudwatch_retention_days,
                    DEFAULT_RETENTION_DAYS,
                ),
                credentials,
            },
        })
    }

    pub fn is_development(&self) -> bool {
        self.environment == AppEnvironment::Development
    }

    pub fn is_production(&self) -> bool {
        self.environment == AppEnvironment::Production
    }

    /// Name written into every JSON record's `service` field.
    pub fn service_name(&self) -> &str {
        self.cloudwatch
            .log_group
            .as_deref()
            .unwrap_or(DEFAULT_SERVICE_NAME)
    }

    /// CloudWatch settings when the remote sink should be wired.
    ///
    /// Requires production, the enable flag, and a log group.
    pub fn remote_sink(&self) -> Option<&CloudWatchSettings> {
        let cw = &self.cloudwatch;
        (self.is_production() && cw.enabled && cw.log_group.is_some()).then_some(cw)
    }
}

fn with_defaults(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
    builder
        .set_default("host", "0.0.0.0")?
        .set_default("aws_cloudwatch_log_stream", "app")
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Parse `value`, falling back to `default` when unset or malformed.
fn parse_or<T>(key: &str, value: Option<String>, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display,
    T::Err: std::fmt::Display,
{
    match non_empty(value) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|e: T::Err| {
            tracing::warn!(
                key,
                value = %raw,
                error = %e,
                fallback = %default,
                "Ignoring malformed setting"
            );
            default
        }),
        None => default,
    }
}

/// Boolean flag; anything unrecognized counts as off.
fn parse_flag(key: &str, value: Option<String>) -> bool {
    let Some(raw) = non_empty(value) else {
        return false;
    };
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => true,
        "false" | "0" | "no" | "off" => false,
        _ => {
            tracing::warn!(key, value = %raw, "Ignoring malformed flag, treating it as false");
            false
        }
    }
}
