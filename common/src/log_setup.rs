use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use thiserror::Error;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Where and how much to log.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Filter used when `RUST_LOG` is not set, e.g. `"info"` or
    /// `"fieldtrack=debug,info"`.
    pub base_level: String,
    pub dir: PathBuf,
    pub file_prefix: String,
    /// Rolled files kept on disk.
    pub max_files: usize,
    /// Also log to stdout (warnings and errors go to stderr).
    pub console: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            base_level: "info".to_string(),
            dir: PathBuf::from("logs"),
            file_prefix: "fieldtrack".to_string(),
            max_files: 5,
            console: true,
        }
    }
}

impl LogConfig {
    pub fn with_level(base_level: &str) -> Self {
        Self {
            base_level: base_level.to_string(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Error)]
pub enum LogSetupError {
    #[error("Invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    #[error("Failed to create log directory '{}': {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create log file appender: {0}")]
    Appender(#[from] tracing_appender::rolling::InitError),

    #[error("Logging already initialized")]
    AlreadyInitialized,

    #[error("Logger initialization failed: {0}")]
    Install(#[from] tracing_subscriber::util::TryInitError),
}

/// Installs daily rolling file logging plus optional console output.
///
/// `RUST_LOG` overrides `config.base_level`. Succeeds at most once per
/// process.
pub fn setup_logging(config: &LogConfig) -> Result<(), LogSetupError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.base_level)?,
    };

    create_dir(&config.dir)?;
    let file_appender = tracing_appender::rolling::Builder::new()
        .rotation(tracing_appender::rolling::Rotation::DAILY)
        .filename_prefix(&config.file_prefix)
        .filename_suffix("log")
        .max_log_files(config.max_files.max(1))
        .build(&config.dir)?;

    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    LOG_GUARD
        .set(guard)
        .map_err(|_| LogSetupError::AlreadyInitialized)?;

    let console_layer = config.console.then(|| {
        let console_writer = std::io::stdout.and(std::io::stderr.with_min_level(Level::WARN));
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_line_number(true)
            .with_ansi(true)
            .with_writer(console_writer)
    });

    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false)
        .with_writer(file_writer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;
    Ok(())
}

fn create_dir(path: &Path) -> Result<(), LogSetupError> {
    std::fs::create_dir_all(path).map_err(|source| LogSetupError::CreateDir {
        path: path.to_path_buf(),
        source,
    })
}

/// Console-only subscriber for tests. Safe to call from every test.
/// Respects `RUST_LOG`, defaults to "info".
pub fn init_test_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
