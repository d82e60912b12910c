use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Once;
use thiserror::Error;
use tracing_subscriber::prelude::*;

mod schema;

pub use schema::{json_schema, json_schema_string};

/// Tracing targets used across the workspace.
pub mod targets {
    pub const THUNK: &str = "junction.thunk";
    pub const LOOKUP: &str = "junction.lookup";
    pub const CALLSITE: &str = "junction.callsite";
    pub const HANDLE: &str = "junction.handle";
    pub const CONFIG: &str = "junction.config";
}

/// How the dispatch-stub cache reclaims entries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum EvictionPolicy {
    /// Entries live for the lifetime of the cache. Canonical signatures are low-cardinality,
    /// so this is the default.
    #[default]
    Never,
    /// Drop the least recently used entry once `max_entries` is exceeded.
    Lru,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
#[schemars(deny_unknown_fields)]
pub struct ThunkCacheConfig {
    #[serde(default)]
    pub eviction: EvictionPolicy,

    /// Capacity for the `lru` policy. Ignored by `never`.
    #[serde(default = "ThunkCacheConfig::default_max_entries")]
    #[schemars(range(min = 1))]
    pub max_entries: usize,
}

impl ThunkCacheConfig {
    fn default_max_entries() -> usize {
        4_096
    }

    pub fn bounded(max_entries: usize) -> Self {
        Self {
            eviction: EvictionPolicy::Lru,
            max_entries,
        }
    }

    /// Effective capacity, or `None` when entries are never evicted.
    pub fn capacity(&self) -> Option<usize> {
        match self.eviction {
            EvictionPolicy::Never => None,
            EvictionPolicy::Lru => Some(self.max_entries.max(1)),
        }
    }
}

impl Default for ThunkCacheConfig {
    fn default() -> Self {
        Self {
            eviction: EvictionPolicy::default(),
            max_entries: Self::default_max_entries(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
#[schemars(deny_unknown_fields)]
pub struct InvokeConfig {
    /// Remember the most recent `as_type` result on each handle.
    #[serde(default = "InvokeConfig::default_memoize_as_type")]
    pub memoize_as_type: bool,
}

impl InvokeConfig {
    fn default_memoize_as_type() -> bool {
        true
    }
}

impl Default for InvokeConfig {
    fn default() -> Self {
        Self {
            memoize_as_type: Self::default_memoize_as_type(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
#[schemars(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Logging level, or a full `EnvFilter` directive string.
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,

    /// Emit logs in JSON format.
    #[serde(default)]
    pub json: bool,

    /// Write logs to stderr.
    #[serde(default = "LoggingConfig::default_stderr")]
    pub stderr: bool,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_owned()
    }

    fn default_stderr() -> bool {
        true
    }

    pub(crate) fn normalize_level_directives(input: &str) -> String {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Self::default_level();
        }

        match trimmed.to_ascii_lowercase().as_str() {
            "trace" => "trace".to_owned(),
            "debug" => "debug".to_owned(),
            "info" => "info".to_owned(),
            "warn" | "warning" => "warn".to_owned(),
            "error" => "error".to_owned(),
            // Anything else is treated as an `EnvFilter` directive string.
            _ => trimmed.to_owned(),
        }
    }

    fn config_env_filter(&self) -> tracing_subscriber::EnvFilter {
        let directives = Self::normalize_level_directives(&self.level);
        tracing_subscriber::EnvFilter::try_new(directives).unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::default()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
        })
    }

    /// Effective `EnvFilter`; `RUST_LOG`, when set, is merged after the configured level.
    pub fn env_filter(&self) -> tracing_subscriber::EnvFilter {
        let env_directives = std::env::var("RUST_LOG")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());

        let config_directives = Self::normalize_level_directives(&self.level);

        match env_directives {
            Some(env_directives) => {
                let combined = format!("{config_directives},{env_directives}");
                tracing_subscriber::EnvFilter::try_new(combined)
                    .or_else(|_| tracing_subscriber::EnvFilter::try_new(env_directives))
                    .unwrap_or_else(|_| self.config_env_filter())
            }
            None => self.config_env_filter(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            json: false,
            stderr: Self::default_stderr(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
#[schemars(deny_unknown_fields)]
pub struct JunctionConfig {
    #[serde(default)]
    pub thunk_cache: ThunkCacheConfig,
    #[serde(default)]
    pub invoke: InvokeConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse toml config: {0}")]
    Toml(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        // The default `Display` embeds a source snippet; keep only the message.
        ConfigError::Toml(err.message().to_owned())
    }
}

impl JunctionConfig {
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::load_from_str(&text)
    }

    pub fn load_from_str(text: &str) -> Result<Self, ConfigError> {
        let config: JunctionConfig = toml::from_str(text)?;
        if config.thunk_cache.eviction == EvictionPolicy::Lru && config.thunk_cache.max_entries == 0
        {
            tracing::warn!(
                target: targets::CONFIG,
                "thunk_cache.max_entries = 0 with lru eviction; treating as 1"
            );
        }
        Ok(config)
    }
}

/// Installs the global tracing subscriber described by `logging`.
///
/// Only the first call has an effect; later calls (and calls made after another subscriber
/// was installed) are ignored.
pub fn init_tracing(logging: &LoggingConfig) {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let filter = logging.env_filter();
        let layer: Box<dyn tracing_subscriber::Layer<_> + Send + Sync> =
            match (logging.json, logging.stderr) {
                (_, false) => tracing_subscriber::layer::Identity::new().boxed(),
                (true, true) => tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_ansi(false)
                    .boxed(),
                (false, true) => tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(false)
                    .boxed(),
            };

        let subscriber = tracing_subscriber::registry().with(filter).with(layer);
        if tracing::subscriber::set_global_default(subscriber).is_err() {
            tracing::debug!(
                target: targets::CONFIG,
                "global tracing subscriber already installed; keeping the existing one"
            );
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn normalize_level_directives_accepts_synonyms() {
        assert_eq!(LoggingConfig::normalize_level_directives(" WARNING "), "warn");
        assert_eq!(LoggingConfig::normalize_level_directives(""), "info");
        assert_eq!(
            LoggingConfig::normalize_level_directives("junction.thunk=trace"),
            "junction.thunk=trace"
        );
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config = JunctionConfig::load_from_str("").unwrap();
        assert_eq!(config, JunctionConfig::default());
        assert_eq!(config.thunk_cache.capacity(), None);
        assert!(config.invoke.memoize_as_type);
    }

    #[test]
    fn lru_capacity_is_at_least_one() {
        let config = JunctionConfig::load_from_str(
            r#"
            [thunk_cache]
            eviction = "lru"
            max_entries = 0
            "#,
        )
        .unwrap();
        assert_eq!(config.thunk_cache.capacity(), Some(1));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = JunctionConfig::load_from_str("[thunk_cache]\nsize = 3\n").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)), "{err}");
    }

    #[test]
    fn logging_filter_builds_from_directive_strings() {
        let logging = LoggingConfig {
            level: "junction.thunk=debug,info".to_owned(),
            ..LoggingConfig::default()
        };
        let rendered = logging.config_env_filter().to_string();
        assert!(rendered.contains("junction.thunk=debug"), "{rendered}");
    }
}
