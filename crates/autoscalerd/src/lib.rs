//! autoscalerd — assembles the autoscaler service broker.
//!
//! Loads the TOML configuration and JSON catalog, opens the redb state
//! store and wires the broker with its credential helper, scheduler client
//! and policy checks.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use autoscaler_broker::{Broker, BrokerSettings, Stores};
use autoscaler_core::config::DEFAULT_CRED_HELPER;
use autoscaler_core::{BrokerConfig, Catalog};
use autoscaler_policy::{PlanChecker, PolicyValidator};
use autoscaler_scheduler::HttpSchedulerClient;
use autoscaler_state::{CredentialStore, DbCredentialStore, StateStore};
use tracing::info;

/// File name of the broker database inside `data_dir`.
pub const DB_FILE: &str = "broker.redb";

/// Load and validate the configuration at `path`, then the catalog it
/// names. A relative `catalog_path` is resolved against the config file's
/// directory.
pub fn load(path: &Path) -> anyhow::Result<(BrokerConfig, Catalog)> {
    let config = BrokerConfig::from_file(path)?;
    config.validate()?;

    let catalog_path = resolve(path, &config.catalog_path);
    let catalog = Catalog::from_file(&catalog_path)
        .with_context(|| format!("loading catalog {}", catalog_path.display()))?;
    info!(
        config = %path.display(),
        catalog = %catalog_path.display(),
        services = catalog.services.len(),
        "configuration loaded"
    );
    Ok((config, catalog))
}

fn resolve(config_path: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    config_path
        .parent()
        .map(|dir| dir.join(path))
        .unwrap_or_else(|| path.to_path_buf())
}

/// Open (creating if needed) the state store under `data_dir`.
pub fn open_state(data_dir: &Path) -> anyhow::Result<StateStore> {
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("creating data dir {}", data_dir.display()))?;
    let db_path = data_dir.join(DB_FILE);
    let state = StateStore::open(&db_path)?;
    info!(path = ?db_path, "state store opened");
    Ok(state)
}

fn credential_helper(
    config: &BrokerConfig,
    state: &StateStore,
) -> anyhow::Result<Arc<dyn CredentialStore>> {
    match config.cred_helper_impl.as_str() {
        DEFAULT_CRED_HELPER => Ok(Arc::new(DbCredentialStore::new(state.clone()))),
        other => bail!("unsupported cred_helper_impl {other:?}"),
    }
}

/// Wire a broker over `state` from a validated configuration.
pub fn build_broker(
    config: &BrokerConfig,
    catalog: Catalog,
    state: StateStore,
) -> anyhow::Result<Broker> {
    let credentials = credential_helper(config, &state)?;
    let scheduler = HttpSchedulerClient::new(&config.scheduler)?;
    info!(url = %config.scheduler.url, "scheduler client initialized");

    let validator = PolicyValidator::new(config.scaling_rules.clone())?;
    let plan_checker = PlanChecker::new(config.plan_check.clone());

    let stores = Stores {
        bindings: Arc::new(state.clone()),
        policies: Arc::new(state),
        credentials,
    };
    let settings = BrokerSettings {
        dashboard_redirect_uri: config.dashboard_redirect_uri.clone(),
        default_credential_type: config.default_credential_type,
        metrics_forwarder: config.metrics_forwarder.clone(),
    };
    Ok(Broker::new(
        stores,
        Arc::new(scheduler),
        validator,
        plan_checker,
        catalog,
        settings,
    ))
}
