use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use kiosk_core::catalog::{Catalog, CatalogError};
use kiosk_core::config::{AppConfig, ConfigError, LoadOptions};
use kiosk_core::domain::UserId;
use kiosk_core::session::engine::ShopEngine;
use kiosk_db::{connect_with_settings, migrations, DbPool, SqliteLedgerStore, SqliteOrderStore};
use kiosk_telegram::events::ChatId;
use kiosk_telegram::handler::{AdminIds, UpdateDispatcher};
use kiosk_telegram::notify::{AdminChannelNotifier, NoopMessageGateway};
use kiosk_telegram::poller::{NoopUpdateTransport, PollingRunner, ReconnectPolicy};

type Engine = ShopEngine<SqliteLedgerStore, SqliteOrderStore, AdminChannelNotifier>;
type Runner = PollingRunner<SqliteLedgerStore, SqliteOrderStore, AdminChannelNotifier>;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub engine: Arc<Engine>,
    pub runner: Runner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    let catalog = match &config.catalog.path {
        Some(path) => Catalog::load(path)?,
        None => Catalog::builtin(),
    };
    if catalog.is_empty() {
        warn!(
            event_name = "system.bootstrap.catalog_empty",
            "catalog has no products; the storefront will show empty categories"
        );
    }
    info!(
        event_name = "system.bootstrap.catalog_loaded",
        categories = catalog.categories().len(),
        "product catalog loaded"
    );

    let ledger = Arc::new(SqliteLedgerStore::new(db_pool.clone()));
    let orders = Arc::new(SqliteOrderStore::new(db_pool.clone()));

    // The production wire transport plugs in behind these traits; without
    // one, the runner drains the noop transport and exits cleanly.
    let gateway = Arc::new(NoopMessageGateway);
    let notifier = Arc::new(AdminChannelNotifier::new(
        gateway.clone(),
        ChatId(config.telegram.admin_chat_id.clone()),
    ));

    let engine = Arc::new(ShopEngine::new(catalog, ledger, orders.clone(), notifier));
    let dispatcher = Arc::new(UpdateDispatcher::new(
        engine.clone(),
        orders,
        gateway,
        AdminIds {
            user_id: UserId(config.telegram.admin_user_id.clone()),
            chat_id: ChatId(config.telegram.admin_chat_id.clone()),
        },
    ));
    let runner = PollingRunner::new(
        Arc::new(NoopUpdateTransport),
        dispatcher,
        ReconnectPolicy::default(),
    );

    Ok(Application { config, db_pool, engine, runner })
}
