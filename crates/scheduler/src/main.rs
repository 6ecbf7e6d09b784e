//! Autorenew - Main entry point
//!
//! Keeps the certificates listed in an inventory renewed ahead of expiry.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{error, info, warn};

use autorenew_config::validate::validate_all;
use autorenew_config::Config;
use autorenew_scheduler::signals::spawn_signal_listener;
use autorenew_scheduler::{
    shutdown_channel, DryRunIssuer, FileStore, HttpIssuer, IntervalClock, Issuer,
    RenewalScanner, WakeChannel,
};

/// Autorenew - TLS certificate renewal scheduler
#[derive(Parser, Debug)]
#[command(name = "autorenew")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path (.kdl or .toml)
    #[arg(short = 'c', long = "config", env = "AUTORENEW_CONFIG")]
    config: Option<String>,

    /// Test configuration and exit
    #[arg(short = 't', long = "test")]
    test: bool,

    /// Enable verbose logging (debug level)
    #[arg(long = "verbose")]
    verbose: bool,

    /// Log output format
    #[arg(long = "log-format", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_format);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to start async runtime");
            return ExitCode::FAILURE;
        }
    };

    let result = if cli.test {
        runtime.block_on(test_config(cli.config.as_deref()))
    } else {
        runtime.block_on(run(cli.config.as_deref()))
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{:#}", e), "autorenew exiting");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool, format: LogFormat) {
    let log_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn load_config(config_path: Option<&str>) -> Result<Config> {
    let config = match config_path {
        Some(path) => {
            info!("Loading configuration from: {}", path);
            Config::from_file(path).context("Failed to load configuration file")?
        }
        None => {
            info!("No configuration specified, using embedded default configuration");
            Config::default_embedded().context("Failed to load embedded configuration")?
        }
    };

    config
        .validate()
        .context("Configuration validation failed")?;
    Ok(config)
}

/// Test configuration file and exit
async fn test_config(config_path: Option<&str>) -> Result<()> {
    let config = load_config(config_path)?;
    let result = validate_all(&config).await;

    info!("Configuration test:");
    info!("  - scan interval: {}s", config.scheduler.scan_interval_secs);
    info!("  - store failure policy: {}", config.store_failure.policy);
    info!("  - inventory: {}", config.store.inventory.display());
    match config.issuer.endpoint {
        Some(ref endpoint) if config.issuer.is_live() => info!("  - issuer: {}", endpoint),
        _ => info!("  - issuer: dry run"),
    }

    for warning in &result.warnings {
        warn!("{}", warning.message);
    }
    for error in &result.errors {
        error!("{}", error);
    }

    if !result.is_ok() {
        anyhow::bail!(
            "configuration test failed with {} error(s)",
            result.errors.len()
        );
    }

    println!(
        "autorenew: configuration file {} test is successful",
        config_path.unwrap_or("(embedded)")
    );
    Ok(())
}

fn build_issuer(config: &Config) -> Result<Arc<dyn Issuer>> {
    match config.issuer.endpoint {
        Some(ref endpoint) if config.issuer.is_live() => {
            let issuer = HttpIssuer::new(
                endpoint.clone(),
                config.issuer.auth_token.clone(),
                config.scheduler.renew_timeout(),
            )
            .context("Failed to create HTTP issuer")?;
            info!(endpoint = %endpoint, "Renewals go to issuance service");
            Ok(Arc::new(issuer))
        }
        _ => {
            warn!("No live issuer configured, renewals are only logged");
            Ok(Arc::new(DryRunIssuer::new()))
        }
    }
}

/// Run the scheduler until shutdown
async fn run(config_path: Option<&str>) -> Result<()> {
    let config = load_config(config_path)?;

    let store = Arc::new(FileStore::new(&config.store.inventory));
    let issuer = build_issuer(&config)?;

    let clock = IntervalClock::new(config.scheduler.scan_interval());
    let (wake, triggers) = WakeChannel::new(clock, config.scheduler.trigger_capacity);
    let (shutdown, signal) = shutdown_channel();

    let listener = spawn_signal_listener(triggers, shutdown)
        .context("Failed to install signal handlers")?;

    info!(
        inventory = %config.store.inventory.display(),
        scan_interval_secs = config.scheduler.scan_interval_secs,
        "autorenew started"
    );

    let scanner = RenewalScanner::from_config(
        &config.scheduler,
        &config.store_failure,
        store,
        issuer,
        wake,
    );
    let result = scanner.run(signal).await;

    listener.abort();
    result.context("Renewal scanner stopped")?;

    info!("autorenew stopped");
    Ok(())
}
