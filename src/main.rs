use clap::Parser;
use tracing::error;
use vigil::cli::client::{self, ApiClient};
use vigil::cli::{Cli, Commands, OutputMode};
use vigil::config::AppConfig;

mod main_runtime;

use main_runtime::{init_logging, init_logging_simple, run_orchestrator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mode = OutputMode::from_json_flag(cli.json);

    match cli.command.clone().unwrap_or(Commands::Run) {
        Commands::Run => {
            let config = AppConfig::load_from(&cli.config_dir)?;
            init_logging(&config.logging);
            if let Err(e) = run_orchestrator(config).await {
                error!("vigil failed: {}", e);
                return Err(e.into());
            }
        }
        Commands::CheckConfig => {
            init_logging_simple();
            let config = AppConfig::load_from(&cli.config_dir)?;
            config.validate()?;
            println!(
                "Configuration OK: {} dependencies, cycle every {}s, executor {:?}, event store {:?}",
                config.dependencies.len(),
                config.orchestrator.cycle_interval_secs,
                config.executor.kind,
                config.event_store.backend
            );
        }
        Commands::Status => {
            init_logging_simple();
            let api = ApiClient::new(&cli.url)?;
            client::show_status(&api, mode).await?;
        }
        Commands::Events { limit, offset } => {
            init_logging_simple();
            let api = ApiClient::new(&cli.url)?;
            client::show_events(&api, limit, offset, mode).await?;
        }
        Commands::Trigger { name, action } => {
            init_logging_simple();
            let api = ApiClient::new(&cli.url)?;
            client::trigger_remediation(&api, &name, &action, mode).await?;
        }
    }

    Ok(())
}
