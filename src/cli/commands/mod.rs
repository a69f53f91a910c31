//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod analyze;
mod config_cmd;
mod session;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{load_settings, LoadOptions};

#[derive(Parser)]
#[command(name = "moodtrack")]
#[command(about = "Find out what your music feels like")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Analysis service base URL (overrides config and environment)
    #[arg(short, long, global = true)]
    endpoint: Option<String>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a track (only the first file given is analyzed)
    Analyze {
        /// Audio file(s); extra files are ignored
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
        /// Write the mood image to this path
        #[arg(short, long)]
        image_out: Option<PathBuf>,
        /// Write the mood image to the configured image directory
        #[arg(short, long)]
        save_image: bool,
    },

    /// Interactive drop zone: type events, watch the state change
    Session,

    /// Show the effective configuration
    Config,
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
        endpoint: cli.endpoint,
        timeout: cli.timeout,
    };
    let settings = load_settings(&options).await?;

    match cli.command {
        Commands::Analyze {
            files,
            json,
            image_out,
            save_image,
        } => {
            analyze::cmd_analyze(&settings, &files, json, image_out.as_deref(), save_image).await
        }
        Commands::Session => session::cmd_session(&settings).await,
        Commands::Config => config_cmd::cmd_config_show(&settings),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_analyze() {
        let cli = Cli::try_parse_from([
            "moodtrack",
            "-e",
            "http://mood.local",
            "analyze",
            "song.mp3",
            "other.mp3",
            "--json",
        ])
        .unwrap();
        assert_eq!(cli.endpoint.as_deref(), Some("http://mood.local"));
        match cli.command {
            Commands::Analyze { files, json, .. } => {
                assert_eq!(files.len(), 2);
                assert!(json);
            }
            _ => panic!("expected analyze"),
        }
    }

    #[test]
    fn test_analyze_requires_file() {
        assert!(Cli::try_parse_from(["moodtrack", "analyze"]).is_err());
    }
}
