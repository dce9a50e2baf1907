//! rollcall CLI
//!
//! Command-line interface for rollcall - a live, searchable user list.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use rollcall_core::Config;

mod commands;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "rollcall")]
#[command(about = "rollcall - Live, searchable user list")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// More log output on stderr (repeat for debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Use a specific config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Backend URL (overrides server_url)
    #[arg(long, global = true)]
    server: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the user list once and print it
    #[command(alias = "ls")]
    List {
        /// Only show users whose name contains this text
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Follow the user list live (default)
    Watch {
        /// Only show users whose name contains this text
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (server_url, event_url, update_policy, ...)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    // Config commands work on the file, not the effective settings
    if let Some(Commands::Config { command }) = &cli.command {
        return match command {
            Some(ConfigCommands::Show) | None => {
                commands::config::show(cli.config.as_ref(), &output)
            }
            Some(ConfigCommands::Set { key, value }) => commands::config::set(
                key.clone(),
                value.clone(),
                cli.config.as_ref(),
                &output,
            ),
        };
    }

    let mut config = Config::load_with_cli_override(cli.config.as_ref())
        .context("Failed to load configuration")?;
    if let Some(server) = cli.server {
        config.server_url = server;
    }

    match cli.command {
        Some(Commands::List { search }) => commands::list::run(&config, search, &output).await,
        Some(Commands::Watch { search }) => commands::watch::run(config, search, &output).await,
        None => commands::watch::run(config, None, &output).await,
        Some(Commands::Config { .. }) => unreachable!(), // Handled above
    }
}

/// Log to stderr so stdout stays clean for --json
///
/// RUST_LOG takes precedence over -v.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("rollcall_core={},rollcall={}", level, level))
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
