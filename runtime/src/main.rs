// Copyright 2026 Dashtap Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use dashtap_runtime::cli;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "dashtap",
    about = "Dashtap: KPI extraction from dashboard network traffic",
    version,
    after_help = "Run 'dashtap <command> --help' for details on each command."
)]
struct Cli {
    /// Output results as JSON (machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Log level when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Configuration file (JSON); defaults to $DASHTAP_CONFIG
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract every section's metrics from the dashboard
    Extract {
        /// Dashboard URL; overrides the config file and $DASHTAP_URL
        #[arg(long)]
        url: Option<String>,
        /// Show the browser window
        #[arg(long)]
        headful: bool,
        /// Also write the JSON report to this file
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Serve extractions over HTTP
    Serve {
        /// Port for the REST API
        #[arg(long, default_value = "7878")]
        port: u16,
    },
    /// Check environment and diagnose issues
    Doctor,
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

fn init_tracing(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if cli.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global flags via environment variables so all modules can check them
    if cli.json {
        std::env::set_var("DASHTAP_JSON", "1");
    }
    if cli.quiet {
        std::env::set_var("DASHTAP_QUIET", "1");
    }
    init_tracing(&cli);

    let result = match &cli.command {
        Commands::Extract { url, headful, out } => {
            match cli::load_config(cli.config.as_deref(), url.as_deref()) {
                Ok(mut config) => {
                    if *headful {
                        config.headless = false;
                    }
                    cli::extract_cmd::run(config, out.as_deref()).await
                }
                Err(e) => Err(e),
            }
        }
        Commands::Serve { port } => match cli::load_config(cli.config.as_deref(), None) {
            Ok(config) => cli::serve_cmd::run(config, *port).await,
            Err(e) => Err(e),
        },
        Commands::Doctor => cli::doctor::run(cli::load_config(cli.config.as_deref(), None)).await,
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(*shell, &mut cmd, "dashtap", &mut std::io::stdout());
            Ok(())
        }
    };

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        if cli::output::is_json() {
            cli::output::print_json(&serde_json::json!({
                "error": true,
                "message": format!("{e:#}"),
            }));
        } else if !cli::output::is_quiet() {
            eprintln!("  Error: {e:#}");
        }
        std::process::exit(1);
    }

    result
}
