// # notifierd - Notification Delivery Daemon
//
// Thin integration layer: no polling, delivery or ledger logic lives here.
// All of that is in notifier-core and the plugin crates.
//
// The daemon is responsible for:
// 1. Reading settings from environment variables
// 2. Loading and validating the JSON configuration file
// 3. Registering connectors, adaptors and stores
// 4. Starting the notifier engine and stopping it on SIGTERM/SIGINT
//
// ## Environment
//
// - `NOTIFIER_CONFIG_PATH`: Path to the JSON configuration file (required)
// - `NOTIFIER_LOG_LEVEL`: trace, debug, info, warn or error (default: info)
// - `NOTIFIER_POLL_INTERVAL`: Overrides `engine.poll_interval_secs`
//
// ## Example
//
// ```bash
// export NOTIFIER_CONFIG_PATH=/etc/notifier/notifier.json
// export NOTIFIER_LOG_LEVEL=debug
//
// notifierd
// ```

use anyhow::{Context, Result};
use notifier_core::{EngineEvent, NotifierConfig, NotifierEngine, NotifierRegistry, SimpleTemplateRenderer};
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum NotifierExitCode {
    CleanShutdown = 0,
    ConfigError = 1,
    RuntimeError = 2,
}

impl From<NotifierExitCode> for ExitCode {
    fn from(code: NotifierExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Settings read from the environment
struct DaemonSettings {
    config_path: String,
    log_level: String,
    poll_interval: Option<u64>,
}

impl DaemonSettings {
    fn from_env() -> Result<Self> {
        let poll_interval = match env::var("NOTIFIER_POLL_INTERVAL") {
            Ok(value) => Some(value.trim().parse().with_context(|| {
                format!("NOTIFIER_POLL_INTERVAL must be a number of seconds. Got: {}", value)
            })?),
            Err(_) => None,
        };

        Ok(Self {
            config_path: env::var("NOTIFIER_CONFIG_PATH").context(
                "NOTIFIER_CONFIG_PATH is required. \
                Set it via: export NOTIFIER_CONFIG_PATH=/etc/notifier/notifier.json",
            )?,
            log_level: env::var("NOTIFIER_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            poll_interval,
        })
    }

    fn validate(&self) -> Result<()> {
        if self.config_path.is_empty() {
            anyhow::bail!("NOTIFIER_CONFIG_PATH cannot be empty");
        }

        if let Some(interval) = self.poll_interval
            && !(10..=86_400).contains(&interval)
        {
            anyhow::bail!(
                "NOTIFIER_POLL_INTERVAL must be between 10 and 86400 seconds. Got: {}",
                interval
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "NOTIFIER_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }

    /// Read, parse and validate the configuration file
    fn load_config(&self) -> Result<NotifierConfig> {
        let raw = std::fs::read_to_string(&self.config_path)
            .with_context(|| format!("Failed to read {}", self.config_path))?;
        let mut config = NotifierConfig::from_json_str(&raw)
            .with_context(|| format!("Failed to parse {}", self.config_path))?;

        if let Some(interval) = self.poll_interval {
            config.engine.poll_interval_secs = interval;
        }

        config
            .validate()
            .with_context(|| format!("Invalid configuration in {}", self.config_path))?;
        Ok(config)
    }
}

fn main() -> ExitCode {
    let settings = match DaemonSettings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return NotifierExitCode::ConfigError.into();
        }
    };

    if let Err(e) = settings.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return NotifierExitCode::ConfigError.into();
    }

    let log_level = match settings.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return NotifierExitCode::ConfigError.into();
    }

    let config = match settings.load_config() {
        Ok(config) => config,
        Err(e) => {
            error!("{:#}", e);
            return NotifierExitCode::ConfigError.into();
        }
    };

    info!("Starting notifierd");
    info!(
        "Configuration loaded: {} subscription(s), {} adaptor(s)",
        config.subscriptions.len(),
        config.adaptors.len()
    );

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return NotifierExitCode::RuntimeError.into();
        }
    };

    rt.block_on(async {
        let engine = match build_engine(config).await {
            Ok(engine) => engine,
            Err(e) => {
                error!("Startup failed: {:#}", e);
                return NotifierExitCode::ConfigError;
            }
        };

        match run_daemon(engine).await {
            Ok(()) => NotifierExitCode::CleanShutdown,
            Err(e) => {
                error!("Daemon error: {:#}", e);
                NotifierExitCode::RuntimeError
            }
        }
    })
    .into()
}

fn registry() -> NotifierRegistry {
    let registry = NotifierRegistry::with_builtin_stores();

    #[cfg(feature = "webdav")]
    {
        info!("Registering WebDAV connector");
        notifier_connector_webdav::register(&registry);
    }

    #[cfg(feature = "email")]
    {
        info!("Registering email adaptor");
        notifier_adaptor_email::register(&registry);
    }

    #[cfg(feature = "sms")]
    {
        info!("Registering SMS adaptor");
        notifier_adaptor_sms::register(&registry);
    }

    registry
}

/// Build the engine and spawn its event logger
async fn build_engine(config: NotifierConfig) -> Result<NotifierEngine> {
    let registry = registry();
    let templates = Arc::new(SimpleTemplateRenderer::from_config(&config.templates));

    let connector = registry.create_connector(&config.connector, &config.engine)?;
    info!("Connector: {}", config.connector.type_name());

    let mut adaptors = Vec::with_capacity(config.adaptors.len());
    for adaptor_config in &config.adaptors {
        adaptors.push(registry.create_adaptor(adaptor_config, templates.clone())?);
        info!("Adaptor: {}", adaptor_config.processor_type());
    }

    let store = registry.create_store(&config.store).await?;
    info!("Notification store: {}", config.store.type_name());

    let (engine, events) =
        NotifierEngine::new(connector, adaptors, store, config.subscriptions, config.engine)?;
    tokio::spawn(log_events(events));

    Ok(engine)
}

async fn log_events(mut events: mpsc::Receiver<EngineEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            EngineEvent::CycleCompleted { report } => info!(
                "Subscription {}: {} listed, {} unchanged, {} dispatched, {} fully processed, {} pruned",
                report.subscription_id,
                report.listed,
                report.unchanged,
                report.dispatched,
                report.fully_processed,
                report.pruned
            ),
            EngineEvent::CycleFailed {
                subscription_id,
                error,
            } => warn!("Subscription {} poll failed: {}", subscription_id, error),
            EngineEvent::ConfigurationError {
                subscription_id,
                processor_type,
                error,
            } => error!(
                "Adaptor {} misconfigured for {}: {}",
                processor_type, subscription_id, error
            ),
            other => debug!("Engine event: {:?}", other),
        }
    }
}

/// Run the engine until a shutdown signal arrives
async fn run_daemon(engine: NotifierEngine) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    tokio::spawn(async move {
        match wait_for_shutdown().await {
            Ok(signal) => info!("Received shutdown signal: {}", signal),
            Err(e) => error!("Signal handling failed, shutting down: {}", e),
        }
        let _ = shutdown_tx.send(());
    });

    engine.run_with_shutdown(Some(shutdown_rx)).await?;
    info!("notifierd stopped");
    Ok(())
}

/// Wait for SIGTERM or SIGINT
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for CTRL-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
