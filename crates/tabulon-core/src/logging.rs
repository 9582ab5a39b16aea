//! Logging and tracing bootstrap
//!
//! Library crates only emit `tracing` events; binaries and tests install a
//! subscriber through this module. `RUST_LOG` takes precedence over the
//! configured default filter.

use std::path::PathBuf;

use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Directory for rolling JSON log files; `None` disables file output
    pub json_log_dir: Option<PathBuf>,

    /// Whether to enable console output
    pub enable_console_logs: bool,

    /// Whether to include file/line information in console logs
    pub include_location: bool,

    /// Default log level filter
    pub default_filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            json_log_dir: None,
            enable_console_logs: true,
            include_location: cfg!(debug_assertions),
            default_filter: "info,tabulon_engine=debug,tabulon_augment=debug".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Quiet console, JSON file output
    pub fn production(log_dir: PathBuf) -> Self {
        Self {
            json_log_dir: Some(log_dir),
            enable_console_logs: false,
            include_location: false,
            default_filter: "warn,tabulon_engine=info,tabulon_augment=info".to_string(),
        }
    }
}

/// Install the global subscriber
pub fn init(config: LoggingConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    let mut layers = Vec::new();

    if config.enable_console_logs {
        let console_layer = fmt::layer()
            .with_target(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(std::io::stderr)
            .with_filter(env_filter.clone())
            .boxed();
        layers.push(console_layer);
    }

    if let Some(log_dir) = &config.json_log_dir {
        std::fs::create_dir_all(log_dir)?;
        let file_appender = tracing_appender::rolling::daily(log_dir, "tabulon.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        // The guard flushes on drop; it has to live as long as the process.
        std::mem::forget(guard);

        let json_layer = fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false)
            .json()
            .with_current_span(true)
            .with_writer(non_blocking)
            .with_filter(env_filter)
            .boxed();
        layers.push(json_layer);
    }

    tracing_subscriber::registry().with(layers).try_init()?;

    tracing::info!(
        json_log_dir = ?config.json_log_dir,
        console_enabled = config.enable_console_logs,
        "Logging system initialized"
    );

    Ok(())
}

/// Initialize logging for tests if not already initialized
pub fn init_for_tests() {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("tabulon=debug,tabulon_engine=debug,tabulon_augment=debug"));
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .finish();

        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
