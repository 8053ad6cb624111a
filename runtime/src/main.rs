// Copyright 2026 Web Explorer Contributors
// SPDX-License-Identifier: MIT

use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use explorer_runtime::cli;
use explorer_runtime::cli::explore_cmd::ExploreArgs;
use explorer_runtime::cli::output::OutputFormat;
use explorer_runtime::config::Credentials;

#[derive(Parser)]
#[command(
    name = "web-explorer",
    about = "Web Explorer — map the states of a web application with a model-driven browser",
    version,
    after_help = "Run 'web-explorer <command> --help' for details on each command."
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence.
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Data directory for title logs (default: $EXPLORER_DATA_DIR or ~/.web-explorer).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Explore a web application starting from http://<domain>
    Explore {
        /// Domain to explore (e.g. "shop.example.com")
        domain: String,
        /// Maximum number of iterations (default: until nothing is left to try)
        #[arg(short, long)]
        iterations: Option<usize>,
        /// Output format
        #[arg(short, long, value_enum, default_value = "digraph")]
        output: OutputFormat,
        /// Write the output here instead of stdout
        #[arg(long)]
        output_file: Option<PathBuf>,
        /// Resume from a JSON snapshot
        #[arg(short, long)]
        restore: Option<PathBuf>,
        /// Login credentials as user:password
        #[arg(short, long)]
        login: Option<Credentials>,
        /// Additional information for choosing actions
        #[arg(short, long)]
        additional_info: Option<String>,
        /// Append generated titles to titles.jsonl in the data directory
        #[arg(short = 't', long)]
        store_titles: bool,
        /// Confirm every generated title on the terminal
        #[arg(long)]
        confirm_titles: bool,
        /// Accept cookie banners after navigating
        #[arg(long)]
        accept_cookies: bool,
        /// YAML file overriding built-in prompts by name
        #[arg(long)]
        prompts: Option<PathBuf>,
        /// Write a snapshot after every iteration
        #[arg(long)]
        autosave: Option<PathBuf>,
        /// Show the browser window
        #[arg(long)]
        headed: bool,
        /// Seed for action sampling
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Convert a JSON snapshot into another output format
    Export {
        /// Snapshot written with `-o json`
        snapshot: PathBuf,
        /// Output format
        #[arg(short, long, value_enum, default_value = "digraph")]
        output: OutputFormat,
        /// Write the output here instead of stdout
        #[arg(long)]
        output_file: Option<PathBuf>,
    },
    /// Check that a JSON snapshot loads and print its size
    Validate {
        /// Snapshot written with `-o json`
        snapshot: PathBuf,
    },
    /// Check environment and diagnose issues
    Doctor,
    /// Generate shell completion scripts
    ///
    /// Examples:
    ///   web-explorer completions bash > ~/.local/share/bash-completion/completions/web-explorer
    ///   web-explorer completions zsh > ~/.zfunc/_web-explorer
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish)
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Explore {
            domain,
            iterations,
            output,
            output_file,
            restore,
            login,
            additional_info,
            store_titles,
            confirm_titles,
            accept_cookies,
            prompts,
            autosave,
            headed,
            seed,
        } => {
            cli::explore_cmd::run(ExploreArgs {
                domain,
                iterations,
                output,
                output_file,
                restore,
                login,
                additional_info,
                store_titles,
                confirm_titles,
                accept_cookies,
                prompts,
                autosave,
                headed,
                seed,
                data_dir: cli.data_dir,
            })
            .await
        }
        Commands::Export {
            snapshot,
            output,
            output_file,
        } => cli::export_cmd::run(&snapshot, output, output_file.as_deref()),
        Commands::Validate { snapshot } => cli::validate_cmd::run(&snapshot),
        Commands::Doctor => cli::doctor::run(cli.data_dir.as_deref()).await,
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "web-explorer", &mut std::io::stdout());
            Ok(())
        }
    };

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        eprintln!("  Error: {e:#}");
        std::process::exit(1);
    }

    result
}
