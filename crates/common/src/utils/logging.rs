use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt::writer::BoxMakeWriter, EnvFilter};

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Write logs to a daily-rolling file instead of stdout
    #[serde(default)]
    pub file_logging: bool,

    /// Log file directory
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Log file name prefix
    #[serde(default = "default_log_file")]
    pub log_file: String,

    /// Log format (json, pretty, compact)
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Whether to include target/module
    #[serde(default = "default_include_target")]
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_logging: false,
            log_dir: default_log_dir(),
            log_file: default_log_file(),
            format: default_log_format(),
            include_target: default_include_target(),
        }
    }
}

// Default values
fn default_log_level() -> String { "info".to_string() }
fn default_log_dir() -> PathBuf { PathBuf::from("logs") }
fn default_log_file() -> String { "faucet.log".to_string() }
fn default_log_format() -> String { "pretty".to_string() }
fn default_include_target() -> bool { true }

/// Log format types
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

impl From<&str> for LogFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Pretty,
        }
    }
}

/// Initialize the global tracing subscriber.
///
/// When file logging is on, the returned guard owns the background writer and must be
/// held for the life of the process or buffered lines are lost.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let env_filter = build_env_filter(config)?;

    let (writer, guard) = if config.file_logging {
        std::fs::create_dir_all(&config.log_dir)
            .with_context(|| format!("Failed to create log dir {}", config.log_dir.display()))?;
        let appender = tracing_appender::rolling::daily(&config.log_dir, &config.log_file);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        (BoxMakeWriter::new(non_blocking), Some(guard))
    } else {
        (BoxMakeWriter::new(std::io::stdout), None)
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(config.include_target)
        .with_writer(writer);

    let installed = match LogFormat::from(config.format.as_str()) {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };
    installed.map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))?;

    tracing::info!("Logging system initialized with level: {}", config.level);
    Ok(guard)
}

/// Build environment filter from configuration
fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let mut filter_string = config.level.clone();

    // RUST_LOG directives refine the configured level
    if let Ok(rust_log) = std::env::var("RUST_LOG") {
        if !rust_log.is_empty() {
            filter_string.push(',');
            filter_string.push_str(&rust_log);
        }
    }

    EnvFilter::try_new(&filter_string)
        .with_context(|| format!("Invalid log filter: {}", filter_string))
}
