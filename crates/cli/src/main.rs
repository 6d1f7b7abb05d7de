//! openshrimp CLI: the main entry point.
//!
//! Commands:
//! - `run`    : Run one query through the agent loop
//! - `config` : Print, locate or validate configuration
//! - `doctor` : Diagnose setup

use clap::{Parser, Subcommand};
use shrimp_core::Effort;

mod commands;

#[derive(Parser)]
#[command(
    name = "shrimp",
    about = "openshrimp — governed tool-calling task agent",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single query and print the answer
    Run {
        /// Effort tier: quick, normal or deep
        #[arg(short, long, default_value = "normal")]
        effort: Effort,

        /// Chat session used for questions and updates
        #[arg(short, long, default_value = "cli")]
        session: String,

        /// Send questions to this Telegram chat instead of the console
        #[arg(long)]
        telegram: bool,

        /// Do not archive research results to memory
        #[arg(long)]
        no_archive: bool,

        /// The task or research query
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },

    /// Diagnose configuration and model setup
    Doctor,
}

#[derive(Subcommand, Debug, PartialEq)]
enum ConfigAction {
    /// Print the default configuration (the default action)
    Default,
    /// Print the effective configuration, secrets removed
    Show,
    /// Print the config file path
    Path,
    /// Load and validate the configuration
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so answers can be piped.
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            effort,
            session,
            telegram,
            no_archive,
            query,
        } => {
            let opts = commands::run::RunOptions {
                effort,
                session,
                telegram,
                archive: !no_archive,
            };
            commands::run::run(query.join(" "), opts).await?
        }
        Commands::Config { action } => match action.unwrap_or(ConfigAction::Default) {
            ConfigAction::Default => commands::config_cmd::print_default(),
            ConfigAction::Show => commands::config_cmd::show()?,
            ConfigAction::Path => commands::config_cmd::path(),
            ConfigAction::Validate => commands::config_cmd::validate()?,
        },
        Commands::Doctor => commands::doctor::run()?,
    }

    Ok(())
}
