//! Gauntlet CLI — the main entry point.
//!
//! Commands:
//! - `run`      — Drive the agent through the challenge set
//! - `onboard`  — Write a default config file
//! - `config`   — Show, locate or validate the configuration
//! - `pricing`  — List known model prices

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(
    name = "gauntlet",
    about = "Gauntlet — unattended browser-challenge agent",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the agent against the challenge site
    Run(RunArgs),

    /// Initialize configuration
    Onboard,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },

    /// List known model prices
    Pricing,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration (secrets redacted)
    Show,
    /// Print the config file path
    Path,
    /// Validate the configuration
    Validate,
}

/// Flags for `gauntlet run`; each one overrides its config value.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Oracle provider (anthropic, openai, openrouter, ...)
    #[arg(long)]
    pub provider: Option<String>,

    /// Oracle model
    #[arg(long)]
    pub model: Option<String>,

    /// Show the browser window
    #[arg(long)]
    pub visible: bool,

    /// Run time budget in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Path of the JSON run report
    #[arg(short, long)]
    pub output: Option<String>,

    /// Only print warnings and the exit status
    #[arg(short, long)]
    pub quiet: bool,

    /// Never fall back to screenshot decisions
    #[arg(long)]
    pub no_vision: bool,

    /// Entry URL of the challenge site
    #[arg(long)]
    pub url: Option<String>,
}

fn init_tracing(verbose: bool, quiet: bool, json: bool) {
    let level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let quiet = matches!(&cli.command, Commands::Run(args) if args.quiet);
    init_tracing(cli.verbose, quiet, cli.log_json);

    match cli.command {
        Commands::Run(args) => {
            let code = commands::run::run(args).await?;
            std::process::exit(code);
        }
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Config { action } => match action {
            Some(ConfigAction::Show) | None => commands::config_cmd::show().await?,
            Some(ConfigAction::Path) => commands::config_cmd::path().await?,
            Some(ConfigAction::Validate) => commands::config_cmd::validate().await?,
        },
        Commands::Pricing => commands::pricing::run().await?,
    }

    Ok(())
}
