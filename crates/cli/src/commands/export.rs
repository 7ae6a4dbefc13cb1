use kiosk_core::config::{AppConfig, LoadOptions};
use kiosk_core::report;
use kiosk_core::stores::OrderStore;
use kiosk_db::{connect_with_settings, SqliteOrderStore};

use crate::commands::CommandResult;

/// Renders every committed order as a tab-separated table, newest first.
pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "export",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "export",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        let store = SqliteOrderStore::new(pool.clone());
        let orders =
            store.list_all().await.map_err(|error| ("order_store", error.to_string(), 5u8))?;
        pool.close().await;
        Ok::<String, (&'static str, String, u8)>(report::render_table(&orders))
    });

    match result {
        Ok(table) => CommandResult::raw(table),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("export", error_class, message, exit_code)
        }
    }
}
