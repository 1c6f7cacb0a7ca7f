//! Vigil CLI
//!
//! Commands:
//! - `vigil run` - Run the orchestrator and its HTTP API
//! - `vigil status` - Show system health from a running instance
//! - `vigil events` - Page through remediation history
//! - `vigil trigger` - Request a manual remediation
//! - `vigil check-config` - Validate configuration and exit

pub mod client;
pub mod output;

use clap::{Parser, Subcommand};

pub use client::ApiClient;
pub use output::OutputMode;

/// Self-healing orchestrator
#[derive(Parser, Debug)]
#[command(name = "vigil")]
#[command(author, version, about = "Health probing, circuit breaking and automated remediation")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration directory (default.toml, {VIGIL_ENV}.toml)
    #[arg(short, long, env = "VIGIL_CONFIG_DIR", default_value = "config")]
    pub config_dir: String,

    /// Base URL of a running vigil API
    #[arg(short, long, env = "VIGIL_URL", default_value = "http://localhost:8007")]
    pub url: String,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the orchestrator loop and HTTP API (default)
    Run,
    /// Show system health
    Status,
    /// Show recent remediation events, newest first
    Events {
        #[arg(long, default_value = "20")]
        limit: usize,
        #[arg(long, default_value = "0")]
        offset: usize,
    },
    /// Trigger a remediation for one dependency
    Trigger {
        /// Dependency name
        name: String,
        /// restart, clear_cache or circuit_break
        action: String,
    },
    /// Validate configuration and exit
    CheckConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trigger() {
        let cli = Cli::parse_from(["vigil", "trigger", "cache-service", "clear_cache"]);
        match cli.command {
            Some(Commands::Trigger { name, action }) => {
                assert_eq!(name, "cache-service");
                assert_eq!(action, "clear_cache");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["vigil", "--json", "events", "--limit", "5"]);
        assert!(cli.json);
        assert!(matches!(
            cli.command,
            Some(Commands::Events { limit: 5, offset: 0 })
        ));
        assert!(Cli::parse_from(["vigil"]).command.is_none());
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
