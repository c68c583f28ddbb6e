use anyhow::Result;
use clap::Parser;

use logwire_core::config::LogwireConfig;
use logwire_daemon::cli::DaemonCli;
use logwire_daemon::logging;
use logwire_daemon::orchestrator::Orchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    let mut config = LogwireConfig::load(&cli.config)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load config {}: {}", cli.config.display(), e))?;

    // CLI overrides take precedence over file and environment
    if let Some(level) = cli.log_level {
        config.general.log_level = level;
    }
    if let Some(format) = cli.log_format {
        config.general.log_format = format;
    }
    config.validate()?;

    logging::init_tracing(&config.general)?;

    if cli.validate {
        if config.dispatch.enabled {
            let instances = logwire_dispatch::config::load(&config.dispatch.config_path).await?;
            tracing::info!(
                path = config.dispatch.config_path.as_str(),
                instances = instances.len(),
                "dispatcher config is valid"
            );
        }
        tracing::info!(path = %cli.config.display(), "configuration is valid");
        return Ok(());
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "logwire-daemon starting");
    Orchestrator::build_from_config(config)?.run().await
}
