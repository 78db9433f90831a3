//! Builds the store, clients and core services from configuration

use std::sync::Arc;
use std::time::Duration;

use eyre::{Result, WrapErr};
use tracing::info;

use fleetcfg_client::{
    Connector, ConnectorClient, Dispatcher, DispatcherClient, HostDirectory, InventoryClient,
};
use fleetcfg_core::{Clock, FleetDispatcher, HostEnabler, SystemClock};
use fleetcfg_playbook::{PlaybookCompiler, TemplateRegistry};
use fleetcfg_store::SqliteProfileStore;

use crate::config::Config;

/// Everything the daemon modules share
#[derive(Clone)]
pub struct Services {
    pub store: SqliteProfileStore,
    pub compiler: Arc<PlaybookCompiler>,
    pub directory: Arc<dyn HostDirectory>,
    pub connector: Arc<dyn Connector>,
    pub dispatcher: Arc<dyn Dispatcher>,
    pub clock: Arc<dyn Clock>,
}

impl Services {
    /// Open the store and build every client
    ///
    /// # Errors
    /// Fails on an unopenable database, an unreadable template directory or
    /// an invalid service URL
    pub fn build(config: &Config) -> Result<Self> {
        let store = open_store(config)?;

        let registry = TemplateRegistry::load(&config.playbooks.dir).wrap_err_with(|| {
            format!(
                "cannot load playbook templates from {}",
                config.playbooks.dir.display()
            )
        })?;
        let compiler = Arc::new(PlaybookCompiler::new(Arc::new(registry)));

        let directory = InventoryClient::with_options(
            &config.inventory.host,
            Duration::from_secs(config.inventory.timeout_secs),
            config.inventory.per_page,
        )
        .wrap_err("invalid inventory settings")?;
        let connector = ConnectorClient::new(
            &config.connector.host,
            &config.connector.client_id,
            &config.connector.psk,
            Duration::from_secs(config.connector.timeout_secs),
        )
        .wrap_err("invalid connector settings")?;
        let dispatcher = DispatcherClient::new(
            &config.dispatcher.host,
            &config.dispatcher.psk,
            Duration::from_secs(config.dispatcher.timeout_secs),
        )
        .wrap_err("invalid dispatcher settings")?;

        Ok(Self {
            store,
            compiler,
            directory: Arc::new(directory),
            connector: Arc::new(connector),
            dispatcher: Arc::new(dispatcher),
            clock: Arc::new(SystemClock),
        })
    }

    #[must_use]
    pub fn fleet_dispatcher(&self, config: &Config) -> FleetDispatcher {
        FleetDispatcher::new(
            Arc::clone(&self.compiler),
            Arc::clone(&self.dispatcher),
            config.dispatch(),
        )
    }

    #[must_use]
    pub fn host_enabler(&self, config: &Config) -> HostEnabler {
        HostEnabler::new(
            Arc::clone(&self.connector),
            Arc::clone(&self.clock),
            config.enable(),
        )
    }
}

/// Open the configured database and create the schema
///
/// # Errors
/// Fails when the database cannot be opened or migrated
pub fn open_store(config: &Config) -> Result<SqliteProfileStore> {
    let path = &config.database.path;
    let store = SqliteProfileStore::open(path)
        .wrap_err_with(|| format!("cannot open database {}", path.display()))?;
    store.migrate().wrap_err("cannot create schema")?;
    info!(path = %path.display(), "profile store ready");
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_with_memory_database() {
        let templates = tempfile::tempdir().unwrap();
        std::fs::write(
            templates.path().join("insights_setup.yml"),
            "---\n- name: setup insights\n",
        )
        .unwrap();
        let mut config = Config::default();
        config.database.path = ":memory:".into();
        config.playbooks.dir = templates.path().to_path_buf();

        let services = Services::build(&config).unwrap();

        assert_eq!(services.store.count_profiles("org-1").unwrap(), 0);
    }

    #[test]
    fn test_missing_template_dir_fails() {
        let mut config = Config::default();
        config.database.path = ":memory:".into();
        config.playbooks.dir = "/nonexistent/fleetcfg/playbooks".into();

        assert!(Services::build(&config).is_err());
    }

    #[test]
    fn test_invalid_service_url_fails() {
        let templates = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.database.path = ":memory:".into();
        config.playbooks.dir = templates.path().to_path_buf();
        config.dispatcher.host = "not a url".to_string();

        assert!(Services::build(&config).is_err());
    }
}
