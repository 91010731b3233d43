use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{PipesockError, Result};

pub const DEFAULT_PORT: u16 = 9193;
pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_VIEW: &str = "default";
pub const DEFAULT_BUFFER_SIZE: usize = 20; // broadcasts kept for late joiners
pub const DEFAULT_DELAY_MS: u64 = 2_000; // flush period
pub const DEFAULT_MAX_PENDING: usize = 10_000; // events held between flushes
pub const DEFAULT_INBOUND_QUEUE: usize = 1_024;
pub const DEFAULT_SUBSCRIBER_QUEUE: usize = 64; // frames queued per slow subscriber
pub const DATA_DIR_NAME: &str = ".pipesock";
pub const CONFIG_FILE_NAME: &str = "pipesock.toml";
pub const ENV_PREFIX: &str = "PIPESOCK_";

/// Top-level config (pipesock.toml + PIPESOCK_* env overrides + CLI flags).
///
/// Read once at startup; immutable afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PipesockConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub hub: HubSettings,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub view: ViewConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

/// Broadcast hub tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HubSettings {
    /// Flush period in milliseconds. Events arriving within one period are
    /// coalesced into a single broadcast.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    /// Number of past broadcasts replayed to new subscribers. `0` disables history.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// Upper bound on events held between two flushes. Once reached the hub
    /// stops draining the inbound queue until the next flush.
    #[serde(default = "default_max_pending")]
    pub max_pending: usize,
    /// Capacity of the inbound event queue in front of the hub.
    #[serde(default = "default_inbound_queue")]
    pub inbound_queue: usize,
    /// Frames buffered per subscriber before it is considered too slow and dropped.
    #[serde(default = "default_subscriber_queue")]
    pub subscriber_queue: usize,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            delay_ms: default_delay_ms(),
            buffer_size: default_buffer_size(),
            max_pending: default_max_pending(),
            inbound_queue: default_inbound_queue(),
            subscriber_queue: default_subscriber_queue(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SourceConfig {
    /// Echo every ingested line to stdout.
    #[serde(default)]
    pub pass_through: bool,
}

/// Static viewer served at `/`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ViewConfig {
    /// Directory name under the view root.
    #[serde(default = "default_view")]
    pub name: String,
    /// Directory holding the views. Defaults to `~/.pipesock`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            name: default_view(),
            root: None,
        }
    }
}

impl ViewConfig {
    /// Resolve the directory the viewer is served from.
    ///
    /// Fails when no explicit root is configured and the home directory
    /// cannot be determined.
    pub fn resolve_dir(&self) -> Result<PathBuf> {
        let root = match &self.root {
            Some(root) => root.clone(),
            None => dirs::home_dir()
                .map(|home| home.join(DATA_DIR_NAME))
                .ok_or_else(|| {
                    PipesockError::Config("cannot resolve home directory for views".to_string())
                })?,
        };
        Ok(root.join(&self.name))
    }
}

fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_view() -> String {
    DEFAULT_VIEW.to_string()
}
fn default_delay_ms() -> u64 {
    DEFAULT_DELAY_MS
}
fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}
fn default_max_pending() -> usize {
    DEFAULT_MAX_PENDING
}
fn default_inbound_queue() -> usize {
    DEFAULT_INBOUND_QUEUE
}
fn default_subscriber_queue() -> usize {
    DEFAULT_SUBSCRIBER_QUEUE
}

impl PipesockConfig {
    /// Build the layered figment: defaults, then the TOML file, then
    /// `PIPESOCK_*` env vars (`__` separates nested keys).
    ///
    /// The file is looked up at the explicit path if given, otherwise at
    /// `~/.pipesock/pipesock.toml`. A missing file is not an error.
    pub fn figment(config_path: Option<&str>) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(PipesockConfig::default()));

        if let Some(path) = config_path.map(PathBuf::from).or_else(default_config_path) {
            figment = figment.merge(Toml::file(path));
        }

        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load config from file + env, with `overrides` (typically CLI flags)
    /// merged on top. Only keys present in `overrides` replace lower layers.
    pub fn load_with<T: Serialize>(config_path: Option<&str>, overrides: T) -> Result<Self> {
        Self::from_figment(Self::figment(config_path).merge(Serialized::defaults(overrides)))
    }

    /// Extract and validate a config from an already layered figment.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: PipesockConfig = figment
            .extract()
            .map_err(|e| PipesockError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the hub cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.hub.delay_ms == 0 {
            return Err(PipesockError::Config("hub.delay_ms must be > 0".to_string()));
        }
        if self.hub.max_pending == 0 {
            return Err(PipesockError::Config("hub.max_pending must be > 0".to_string()));
        }
        if self.hub.inbound_queue == 0 {
            return Err(PipesockError::Config("hub.inbound_queue must be > 0".to_string()));
        }
        if self.hub.subscriber_queue == 0 {
            return Err(PipesockError::Config(
                "hub.subscriber_queue must be > 0".to_string(),
            ));
        }
        if self.view.name.is_empty() {
            return Err(PipesockError::Config("view.name must not be empty".to_string()));
        }
        Ok(())
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(DATA_DIR_NAME).join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    fn load(path: &str) -> Result<PipesockConfig> {
        PipesockConfig::from_figment(PipesockConfig::figment(Some(path)))
    }

    #[test]
    fn defaults_match_documented_flags() {
        let config = PipesockConfig::default();
        assert_eq!(config.server.port, 9193);
        assert_eq!(config.hub.delay_ms, 2000);
        assert_eq!(config.hub.buffer_size, 20);
        assert_eq!(config.view.name, "default");
        assert!(!config.source.pass_through);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn toml_then_env_layering() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "pipesock.toml",
                r#"
                [server]
                port = 8000

                [hub]
                delay_ms = 500
                buffer_size = 5
                "#,
            )?;
            jail.set_env("PIPESOCK_HUB__BUFFER_SIZE", "7");

            let config = load("pipesock.toml").expect("config loads");
            assert_eq!(config.server.port, 8000);
            assert_eq!(config.hub.delay_ms, 500);
            assert_eq!(config.hub.buffer_size, 7);
            assert_eq!(config.server.bind, DEFAULT_BIND);
            Ok(())
        });
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        Jail::expect_with(|_jail| {
            let config = load("nope.toml").expect("config loads");
            assert_eq!(config, PipesockConfig::default());
            Ok(())
        });
    }

    #[test]
    fn overrides_win_over_env() {
        Jail::expect_with(|jail| {
            jail.set_env("PIPESOCK_SERVER__PORT", "7000");
            jail.set_env("PIPESOCK_SOURCE__PASS_THROUGH", "true");
            let overrides = serde_json::json!({ "server": { "port": 9000 } });

            let config = PipesockConfig::load_with(Some("absent.toml"), overrides)
                .expect("config loads");
            assert_eq!(config.server.port, 9000);
            assert!(config.source.pass_through);
            Ok(())
        });
    }

    #[test]
    fn zero_delay_is_rejected() {
        Jail::expect_with(|jail| {
            jail.set_env("PIPESOCK_HUB__DELAY_MS", "0");
            let err = load("absent.toml").unwrap_err();
            assert_eq!(err.code(), "CONFIG_ERROR");
            Ok(())
        });
    }

    #[test]
    fn zero_buffer_size_is_allowed() {
        let mut config = PipesockConfig::default();
        config.hub.buffer_size = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn explicit_view_root() {
        let view = ViewConfig {
            name: "graph".to_string(),
            root: Some(PathBuf::from("/srv/views")),
        };
        assert_eq!(view.resolve_dir().unwrap(), PathBuf::from("/srv/views/graph"));
    }
}
