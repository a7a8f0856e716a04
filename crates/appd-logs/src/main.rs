use std::sync::Arc;

use appd_logs::config::Config;
use appd_logs::constants::APPD_LOGS_VERSION;
use appd_logs::server::{AppState, serve};
use appd_logs::tracing::init_tracing;

use appd_logs_collector::LogCollector;
use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    // Init Tracing
    color_eyre::install()?;
    let config = Config::parse();
    let _guard = init_tracing(config.log_dir.as_deref())?;
    tracing::info!("appd-logs {} starting.", APPD_LOGS_VERSION);

    // Build the collector once, every request shares it.
    let collector = LogCollector::new(Arc::new(config.copier()), config.collector_settings());
    tracing::info!(
        "Copying {} with {} into workspaces under {}",
        collector.settings().remote_log_path,
        config.kubectl.display(),
        collector.settings().work_root.display()
    );

    serve(&config, AppState { collector }).await
}
