//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use clap::{Args, Parser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::domain::types::ResourceType;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "varco";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 4000;
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 10;
const DEFAULT_CACHE_CAPACITY: usize = 2048;
const DEFAULT_PUSH_INITIAL_BACKOFF_MS: u64 = 500;
const DEFAULT_PUSH_MAX_BACKOFF_MS: u64 = 30_000;
const DEFAULT_PUSH_BUFFER: usize = 256;
const DEFAULT_LOCALE: &str = "en";

/// Command-line arguments for the varco binary.
#[derive(Debug, Parser)]
#[command(name = "varco", version, about = "Varco backend-for-frontend server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "VARCO_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Emit logs as JSON instead of the compact format.
    #[arg(long = "log-json", value_parser = clap::builder::BoolishValueParser::new())]
    pub log_json: Option<bool>,

    /// Override the upstream API base URL.
    #[arg(long = "upstream-base-url", value_name = "URL")]
    pub upstream_base_url: Option<String>,

    /// Override the upstream request timeout, in seconds.
    #[arg(long = "upstream-timeout-seconds", value_name = "SECONDS")]
    pub upstream_timeout_seconds: Option<u64>,

    /// Disable the fetch-through cache.
    #[arg(long = "cache-disabled", action = clap::ArgAction::SetTrue)]
    pub cache_disabled: bool,

    /// Override the cache entry capacity.
    #[arg(long = "cache-capacity", value_name = "ENTRIES")]
    pub cache_capacity: Option<usize>,

    /// Override the upstream push events URL.
    #[arg(long = "push-events-url", value_name = "URL")]
    pub push_events_url: Option<String>,

    /// Override the default locale for user-facing messages.
    #[arg(long = "default-locale", value_name = "LOCALE")]
    pub default_locale: Option<String>,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub upstream: UpstreamSettings,
    pub cache: CacheSettings,
    pub push: PushSettings,
    pub locale: LocaleSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct UpstreamSettings {
    pub base_url: Url,
    pub timeout: Duration,
    pub service_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub capacity: usize,
    pub ttl_secs: HashMap<ResourceType, u64>,
}

#[derive(Debug, Clone)]
pub struct PushSettings {
    pub events_url: Option<Url>,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub buffer: usize,
}

#[derive(Debug, Clone)]
pub struct LocaleSettings {
    pub default: String,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Parse CLI arguments and load settings in one step.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let cli = CliArgs::parse();
    let settings = load(&cli)?;
    Ok((cli, settings))
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("VARCO").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(&cli.overrides);

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    upstream: RawUpstreamSettings,
    cache: RawCacheSettings,
    push: RawPushSettings,
    locale: RawLocaleSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.upstream_base_url.as_ref() {
            self.upstream.base_url = Some(url.clone());
        }
        if let Some(seconds) = overrides.upstream_timeout_seconds {
            self.upstream.timeout_seconds = Some(seconds);
        }
        if overrides.cache_disabled {
            self.cache.enabled = Some(false);
        }
        if let Some(capacity) = overrides.cache_capacity {
            self.cache.capacity = Some(capacity);
        }
        if let Some(url) = overrides.push_events_url.as_ref() {
            self.push.events_url = Some(url.clone());
        }
        if let Some(locale) = overrides.default_locale.as_ref() {
            self.locale.default = Some(locale.clone());
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawUpstreamSettings {
    base_url: Option<String>,
    timeout_seconds: Option<u64>,
    service_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    capacity: Option<usize>,
    ttl_secs: Option<HashMap<ResourceType, u64>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawPushSettings {
    events_url: Option<String>,
    initial_backoff_ms: Option<u64>,
    max_backoff_ms: Option<u64>,
    buffer: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLocaleSettings {
    default: Option<String>,
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let host = raw.server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = raw.server.port.unwrap_or(DEFAULT_PORT);
        let addr = format!("{host}:{port}")
            .parse::<SocketAddr>()
            .map_err(|err| LoadError::invalid("server.host", err.to_string()))?;

        let level = match raw.logging.level {
            Some(value) => LevelFilter::from_str(&value)
                .map_err(|err| LoadError::invalid("logging.level", err.to_string()))?,
            None => LevelFilter::INFO,
        };
        let format = if raw.logging.json.unwrap_or(false) {
            LogFormat::Json
        } else {
            LogFormat::Compact
        };

        let base_url = raw
            .upstream
            .base_url
            .ok_or_else(|| LoadError::invalid("upstream.base_url", "is not configured"))?;
        let base_url = Url::parse(&base_url)
            .map_err(|err| LoadError::invalid("upstream.base_url", err.to_string()))?;
        let timeout = Duration::from_secs(
            raw.upstream
                .timeout_seconds
                .unwrap_or(DEFAULT_UPSTREAM_TIMEOUT_SECS),
        );

        let events_url = raw
            .push
            .events_url
            .map(|value| {
                Url::parse(&value)
                    .map_err(|err| LoadError::invalid("push.events_url", err.to_string()))
            })
            .transpose()?;

        Ok(Self {
            server: ServerSettings { addr },
            logging: LoggingSettings { level, format },
            upstream: UpstreamSettings {
                base_url,
                timeout,
                service_token: raw.upstream.service_token,
            },
            cache: CacheSettings {
                enabled: raw.cache.enabled.unwrap_or(true),
                capacity: raw.cache.capacity.unwrap_or(DEFAULT_CACHE_CAPACITY),
                ttl_secs: raw.cache.ttl_secs.unwrap_or_default(),
            },
            push: PushSettings {
                events_url,
                initial_backoff_ms: raw
                    .push
                    .initial_backoff_ms
                    .unwrap_or(DEFAULT_PUSH_INITIAL_BACKOFF_MS),
                max_backoff_ms: raw.push.max_backoff_ms.unwrap_or(DEFAULT_PUSH_MAX_BACKOFF_MS),
                buffer: raw.push.buffer.unwrap_or(DEFAULT_PUSH_BUFFER),
            },
            locale: LocaleSettings {
                default: raw.locale.default.unwrap_or_else(|| DEFAULT_LOCALE.to_string()),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_with_upstream() -> RawSettings {
        RawSettings {
            upstream: RawUpstreamSettings {
                base_url: Some("https://api.example.test/v2/".into()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn defaults_resolve_from_minimal_raw() {
        let settings = Settings::from_raw(raw_with_upstream()).expect("settings");
        assert_eq!(settings.server.addr.port(), DEFAULT_PORT);
        assert!(settings.cache.enabled);
        assert_eq!(settings.cache.capacity, DEFAULT_CACHE_CAPACITY);
        assert!(settings.push.events_url.is_none());
        assert_eq!(settings.locale.default, "en");
    }

    #[test]
    fn missing_upstream_base_url_is_rejected() {
        let err = Settings::from_raw(RawSettings::default()).expect_err("no base url");
        assert!(matches!(err, LoadError::Invalid { key: "upstream.base_url", .. }));
    }

    #[test]
    fn invalid_level_is_rejected() {
        let mut raw = raw_with_upstream();
        raw.logging.level = Some("chatty".into());
        assert!(Settings::from_raw(raw).is_err());
    }

    #[test]
    fn cli_overrides_take_precedence() {
        let mut raw = raw_with_upstream();
        raw.server.port = Some(8080);
        raw.apply_overrides(&ServeOverrides {
            server_port: Some(9090),
            cache_disabled: true,
            push_events_url: Some("https://api.example.test/events".into()),
            ..Default::default()
        });

        let settings = Settings::from_raw(raw).expect("settings");
        assert_eq!(settings.server.addr.port(), 9090);
        assert!(!settings.cache.enabled);
        assert_eq!(
            settings.push.events_url.map(|u| u.to_string()),
            Some("https://api.example.test/events".to_string())
        );
    }

    #[test]
    fn ttl_map_uses_resource_tags() {
        let mut raw = raw_with_upstream();
        raw.cache.ttl_secs = Some(HashMap::from([(ResourceType::Blog, 600)]));
        let settings = Settings::from_raw(raw).expect("settings");
        assert_eq!(settings.cache.ttl_secs.get(&ResourceType::Blog), Some(&600));
    }
}
