use serde::Serialize;

use kiosk_core::config::{AppConfig, LoadOptions};
use kiosk_db::connect_with_settings;

#[derive(Debug, Serialize)]
struct Check {
    name: &'static str,
    status: &'static str,
    detail: String,
}

/// Validates config and database connectivity. Never fails the process; the
/// findings are the output.
pub fn run(json: bool) -> String {
    let mut checks = Vec::new();

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(Check {
                name: "config",
                status: "ok",
                detail: format!("database url `{}`", config.database.url),
            });
            Some(config)
        }
        Err(error) => {
            checks.push(Check { name: "config", status: "error", detail: error.to_string() });
            None
        }
    };

    if let Some(config) = config {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build();
        match runtime {
            Ok(runtime) => {
                let connectivity = runtime.block_on(async {
                    let pool = connect_with_settings(
                        &config.database.url,
                        config.database.max_connections,
                        config.database.timeout_secs,
                    )
                    .await
                    .map_err(|error| error.to_string())?;
                    pool.close().await;
                    Ok::<(), String>(())
                });
                match connectivity {
                    Ok(()) => checks.push(Check {
                        name: "database",
                        status: "ok",
                        detail: "connection established".to_string(),
                    }),
                    Err(error) => checks.push(Check {
                        name: "database",
                        status: "error",
                        detail: error.to_string(),
                    }),
                }
            }
            Err(error) => {
                checks.push(Check { name: "runtime", status: "error", detail: error.to_string() })
            }
        }
    }

    if json {
        serde_json::to_string_pretty(&checks).unwrap_or_else(|error| error.to_string())
    } else {
        checks
            .iter()
            .map(|check| format!("[{}] {}: {}", check.status, check.name, check.detail))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
