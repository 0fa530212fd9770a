//! Launchdeck - Entry Point
//!
//! Serves the deployment platform API and drives deployments through their
//! pipeline.

use std::collections::HashMap;
use std::env;

use anyhow::{anyhow, Context};
use launchdeck::app::options::AppOptions;
use launchdeck::app::run::run;
use launchdeck::filesys::file::File;
use launchdeck::logs::{init_logging, LogOptions};
use launchdeck::storage::layout::StorageLayout;
use launchdeck::storage::settings::Settings;
use launchdeck::utils::version_info;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let mut cli_args: HashMap<String, String> = HashMap::new();
    for arg in env::args().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    let version = version_info();
    if cli_args.contains_key("version") {
        println!("{}", serde_json::to_string_pretty(&version)?);
        return Ok(());
    }

    // Retrieve the settings file; defaults when the layout has none yet
    let layout = StorageLayout::default();
    let settings = match cli_args.get("config") {
        Some(path) => File::new(path)
            .read_json::<Settings>()
            .await
            .with_context(|| format!("Unable to read settings file {}", path))?,
        None => {
            let settings_file = layout.settings_file();
            if settings_file.exists().await {
                settings_file
                    .read_json::<Settings>()
                    .await
                    .with_context(|| {
                        format!(
                            "Unable to read settings file {}",
                            settings_file.path().display()
                        )
                    })?
            } else {
                Settings::default()
            }
        }
    };
    settings.check()?;

    // Initialize logging
    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        json_format: settings.json_logs,
        log_dir: settings.log_dir.clone(),
        ..Default::default()
    };
    let _log_guard = init_logging(log_options)?;

    let mut options = AppOptions::from_settings(&settings);
    if let Some(port) = cli_args.get("port") {
        options.server.port = port
            .parse()
            .map_err(|_| anyhow!("Invalid --port value: {}", port))?;
    }

    info!("Running launchdeck with options: {:?}", options);
    run(version.version, options, await_shutdown_signal()).await?;
    Ok(())
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(term), Ok(int)) => (term, int),
                _ => {
                    let _ = tokio::signal::ctrl_c().await;
                    info!("Ctrl+C received, shutting down...");
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Ctrl+C received, shutting down...");
    }
}
