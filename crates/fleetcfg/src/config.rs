//! Configuration loading and types

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::WrapErr;
use serde::{Deserialize, Serialize};

use fleetcfg_core::config::{
    DispatchConfig, DispatchResultConfig, EnableConfig, InventoryEventConfig, default_service_state,
};

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "FLEETCFG_CONFIG";

/// Top-level configuration for the fleetcfg daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub playbooks: PlaybookConfig,
    #[serde(default)]
    pub inventory: InventoryConfig,
    #[serde(default)]
    pub connector: ConnectorConfig,
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    #[serde(default)]
    pub enablement: EnablementConfig,
    #[serde(default)]
    pub consumers: ConsumersConfig,
    /// State of default profiles created for new organizations
    #[serde(default = "default_service_state")]
    pub service_config: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            daemon: DaemonConfig::default(),
            database: DatabaseConfig::default(),
            playbooks: PlaybookConfig::default(),
            inventory: InventoryConfig::default(),
            connector: ConnectorConfig::default(),
            dispatcher: DispatcherConfig::default(),
            enablement: EnablementConfig::default(),
            consumers: ConsumersConfig::default(),
            service_config: default_service_state(),
        }
    }
}

/// Daemon server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Address and port to bind to
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// `json` or `text`
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_url_path_prefix")]
    pub url_path_prefix: String,
    #[serde(default = "default_app_name")]
    pub app_name: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            url_path_prefix: default_url_path_prefix(),
            app_name: default_app_name(),
        }
    }
}

impl DaemonConfig {
    /// Route prefix of one API version, e.g. `/api/config-manager/v2`
    #[must_use]
    pub fn api_base(&self, version: &str) -> String {
        format!(
            "/{}/{}/{version}",
            self.url_path_prefix.trim_matches('/'),
            self.app_name.trim_matches('/')
        )
    }
}

fn default_bind() -> String {
    "127.0.0.1:8081".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_url_path_prefix() -> String {
    "api".to_string()
}

fn default_app_name() -> String {
    "config-manager".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file, `:memory:` for a throwaway database
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("fleetcfg.db")
}

/// Playbook templates and the URL hosts fetch playbooks from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybookConfig {
    #[serde(default = "default_playbook_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_url_base")]
    pub url_base: String,
    /// Path appended to `url_base`; `{profile_id}` is substituted
    #[serde(default = "default_url_path")]
    pub url_path: String,
}

impl Default for PlaybookConfig {
    fn default() -> Self {
        Self {
            dir: default_playbook_dir(),
            url_base: default_url_base(),
            url_path: default_url_path(),
        }
    }
}

fn default_playbook_dir() -> PathBuf {
    PathBuf::from("./playbooks/")
}

fn default_url_base() -> String {
    "http://localhost:8081".to_string()
}

fn default_url_path() -> String {
    "/api/config-manager/v2/playbooks?profile_id={profile_id}".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryConfig {
    #[serde(default = "default_inventory_host")]
    pub host: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            host: default_inventory_host(),
            timeout_secs: default_timeout_secs(),
            per_page: default_per_page(),
        }
    }
}

fn default_inventory_host() -> String {
    "http://host-inventory-service:8000".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_per_page() -> u64 {
    50
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorConfig {
    #[serde(default = "default_connector_host")]
    pub host: String,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default)]
    pub psk: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            host: default_connector_host(),
            client_id: default_client_id(),
            psk: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_connector_host() -> String {
    "http://cloud-connector:8080".to_string()
}

fn default_client_id() -> String {
    "config-manager".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    #[serde(default = "default_dispatcher_host")]
    pub host: String,
    #[serde(default)]
    pub psk: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            host: default_dispatcher_host(),
            psk: String::new(),
            timeout_secs: default_timeout_secs(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_dispatcher_host() -> String {
    "http://playbook-dispatcher-api:8000".to_string()
}

fn default_batch_size() -> usize {
    50
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnablementConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_enable_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_base_capability")]
    pub base_capability: String,
    #[serde(default = "default_worker_capability")]
    pub worker_capability: String,
}

impl Default for EnablementConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            timeout_secs: default_enable_timeout_secs(),
            base_capability: default_base_capability(),
            worker_capability: default_worker_capability(),
        }
    }
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_enable_timeout_secs() -> u64 {
    180
}

fn default_base_capability() -> String {
    "package-manager".to_string()
}

fn default_worker_capability() -> String {
    "rhc-worker-playbook".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumersConfig {
    /// `service` header value owned by this daemon
    #[serde(default = "default_service_name")]
    pub service_name: String,
    /// Prefix of published message keys
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    #[serde(default = "default_stale_event_secs")]
    pub stale_event_secs: u64,
    #[serde(default = "default_true")]
    pub converge_on_event: bool,
    #[serde(default = "default_true")]
    pub enable_on_create: bool,
    #[serde(default = "default_dispatcher_topic")]
    pub dispatcher_topic: String,
    #[serde(default = "default_inventory_topic")]
    pub inventory_topic: String,
    #[serde(default = "default_update_topic")]
    pub update_topic: String,
}

impl Default for ConsumersConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            key_prefix: default_key_prefix(),
            stale_event_secs: default_stale_event_secs(),
            converge_on_event: true,
            enable_on_create: true,
            dispatcher_topic: default_dispatcher_topic(),
            inventory_topic: default_inventory_topic(),
            update_topic: default_update_topic(),
        }
    }
}

fn default_service_name() -> String {
    "config_manager".to_string()
}

fn default_key_prefix() -> String {
    "cm".to_string()
}

fn default_stale_event_secs() -> u64 {
    24 * 60 * 60
}

fn default_true() -> bool {
    true
}

fn default_dispatcher_topic() -> String {
    "platform.playbook-dispatcher.runs".to_string()
}

fn default_inventory_topic() -> String {
    "platform.inventory.events".to_string()
}

fn default_update_topic() -> String {
    "platform.inventory.system-profile".to_string()
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("cannot read {}", path.display()))?;
        let config: Config =
            toml::from_str(&content).wrap_err_with(|| format!("cannot parse {}", path.display()))?;
        Ok(config)
    }

    /// Load from default paths or use defaults
    ///
    /// # Errors
    /// Returns error if a found file cannot be read or parsed
    pub fn load_default() -> eyre::Result<Self> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::load(Path::new(&path));
        }

        let paths = [
            PathBuf::from("fleetcfg.toml"),
            PathBuf::from("/etc/fleetcfg/fleetcfg.toml"),
            dirs::config_dir()
                .map(|p| p.join("fleetcfg/fleetcfg.toml"))
                .unwrap_or_default(),
        ];

        for path in paths {
            if path.is_file() {
                return Self::load(&path);
            }
        }

        tracing::warn!("no config file found, using defaults");
        Ok(Config::default())
    }

    #[must_use]
    pub fn dispatch(&self) -> DispatchConfig {
        DispatchConfig {
            batch_size: self.dispatcher.batch_size,
            playbook_url: format!(
                "{}{}",
                self.playbooks.url_base.trim_end_matches('/'),
                self.playbooks.url_path
            ),
        }
    }

    #[must_use]
    pub fn enable(&self) -> EnableConfig {
        EnableConfig {
            poll_interval: Duration::from_secs(self.enablement.poll_interval_secs),
            timeout: Duration::from_secs(self.enablement.timeout_secs),
            base_capability: self.enablement.base_capability.clone(),
            worker_capability: self.enablement.worker_capability.clone(),
        }
    }

    #[must_use]
    pub fn dispatch_results(&self) -> DispatchResultConfig {
        DispatchResultConfig {
            service_name: self.consumers.service_name.clone(),
            key_prefix: self.consumers.key_prefix.clone(),
            update_topic: self.consumers.update_topic.clone(),
        }
    }

    #[must_use]
    pub fn inventory_events(&self) -> InventoryEventConfig {
        InventoryEventConfig {
            stale_after: Duration::from_secs(self.consumers.stale_event_secs),
            default_state: self.service_config.clone(),
            enable_on_create: self.consumers.enable_on_create,
            converge: self.consumers.converge_on_event,
        }
    }
}
