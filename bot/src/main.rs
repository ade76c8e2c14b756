//! deploybot - Entry Point
//!
//! Serves chat deploy commands over HTTP and runs queued retries and build
//! reapers in the background.

use std::collections::HashMap;
use std::env;

use colored::Colorize;
use tracing::{error, info};

use deploybot::app::options::AppOptions;
use deploybot::app::run::run;
use deploybot::filesys::file::File;
use deploybot::logs::{init_logging, LogOptions};
use deploybot::storage::settings::Settings;
use deploybot::utils::version_info;

const DEFAULT_CONFIG: &str = "deploybot.json";

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let mut cli_args: HashMap<String, String> = HashMap::new();
    for arg in env::args().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            cli_args.insert(key.trim_start_matches('-').to_string(), value.to_string());
        } else if arg.starts_with("--") {
            cli_args.insert(arg.trim_start_matches('-').to_string(), "true".to_string());
        }
    }

    // Print version and exit
    let version = version_info();
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("{}", format!("Unable to render version: {}", e).red()),
        }
        return;
    }

    // Retrieve the settings file
    let config_path = cli_args
        .get("config")
        .cloned()
        .unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let settings = match Settings::load(&File::new(&config_path)).await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!(
                "{}",
                format!("Unable to read settings file {}: {}", config_path, e).red()
            );
            std::process::exit(1);
        }
    };

    // Initialize logging; the guard flushes the file writer on exit
    let log_options = LogOptions {
        log_level: settings.log_level,
        json_format: settings.json_logs,
        log_dir: settings.log_dir.clone(),
    };
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{}", format!("Failed to initialize logging: {}", e).yellow());
            None
        }
    };

    let options = AppOptions::from(&settings);
    info!(
        "Running deploybot {} ({}) with options: {:?}",
        version.version, version.git_hash, options
    );

    if let Err(e) = run(options, await_shutdown_signal()).await {
        error!("Failed to run deploybot: {}", e);
        eprintln!("{}", format!("deploybot exited with an error: {}", e).red());
        std::process::exit(1);
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
                _ => {
                    error!("Unable to install signal handlers, waiting for Ctrl+C only");
                    let _ = tokio::signal::ctrl_c().await;
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
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
        info!("Ctrl+C received, shutting down...");
    }
}
