use color_eyre::Result;
use color_eyre::eyre::Context;
use std::fs::{self, File};
use std::path::Path;
use tracing::Level;
use tracing_appender::non_blocking;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_error::ErrorLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use crate::constants::LOG_FILE_NAME;

/// Initialize the tracing subscriber
///
/// Logs go to `appd-logs.log` inside `log_dir` when one is given, and to stdout otherwise.
/// Either way they are written through a non-blocking worker so request handlers never wait
/// on the log sink. The returned [`WorkerGuard`] must be kept alive for the duration of the
/// program so buffered lines are flushed on shutdown.
pub fn init_tracing(log_dir: Option<&Path>) -> Result<WorkerGuard> {
    let (writer, guard) = match log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)
                .wrap_err_with(|| format!("failed to create log directory {}", dir.display()))?;
            let file = File::create(dir.join(LOG_FILE_NAME))
                .wrap_err_with(|| format!("failed to create {}", LOG_FILE_NAME))?;
            non_blocking(file)
        }
        None => non_blocking(std::io::stdout()),
    };

    // By default only `INFO` and above are logged, but this can be changed by setting the
    // `RUST_LOG` environment variable.
    let env_filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(log_dir.is_none()),
        )
        .with(ErrorLayer::default())
        .try_init()
        .wrap_err("failed to install tracing subscriber")?;

    Ok(guard)
}
