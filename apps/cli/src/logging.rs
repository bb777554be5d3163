//! Tracing setup
//!
//! Logs go to stderr (stdout carries command output). When
//! `PROVISIONER_LOG_DIR` is set, a daily rolling file gets a more detailed
//! copy.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Directory for rolling log files
pub const LOG_DIR_ENV: &str = "PROVISIONER_LOG_DIR";

const LOG_PREFIX: &str = "provisioner";

/// Filter used when `RUST_LOG` is not set
const DEFAULT_FILTER: &str =
    "info,provisioner_core=debug,provisioner_client=debug,provisioner_cli=debug,reqwest=info,hyper=warn";

/// Initialize tracing; returns the file writer guard when file logging is on
pub fn init_tracing() -> Option<WorkerGuard> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    // Console layer: colored, compact
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .compact()
        .with_thread_names(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true);

    let (file_layer, guard) = match std::env::var(LOG_DIR_ENV) {
        Ok(dir) if !dir.is_empty() => match file_appender(Path::new(&dir)) {
            Ok(appender) => {
                let (writer, guard) = tracing_appender::non_blocking(appender);
                // File layer: no colors, include more detail
                let layer = fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_thread_ids(true)
                    .with_line_number(true)
                    .with_file(true)
                    .with_target(true);
                (Some(layer), Some(guard))
            }
            Err(e) => {
                eprintln!("Warning: file logging disabled: {}", e);
                (None, None)
            }
        },
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    guard
}

/// Daily rotation, files like `provisioner.2026-01-22.log`
fn file_appender(dir: &Path) -> Result<RollingFileAppender, String> {
    std::fs::create_dir_all(dir)
        .map_err(|e| format!("failed to create logs directory {}: {}", dir.display(), e))?;
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_PREFIX)
        .filename_suffix("log")
        .build(dir)
        .map_err(|e| format!("failed to create log file appender: {}", e))
}
