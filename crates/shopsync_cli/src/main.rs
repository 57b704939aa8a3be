//! shopsync CLI
//!
//! Command-line tools for shopsync connector operators.
//!
//! # Commands
//!
//! - `check-config` - Validate a connector configuration file
//! - `plan-categories` - Show the import plan of a saved category tree
//! - `decode-job` - Decode a queued job payload for debugging

mod commands;

use clap::{Parser, Subcommand};
use commands::Format;
use shopsync_core::DEFAULT_BASE_PRIORITY;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// shopsync command-line connector tools.
#[derive(Parser)]
#[command(name = "shopsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a connector configuration file
    CheckConfig {
        /// Path to the JSON configuration
        path: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show the import plan of a category tree saved as JSON
    PlanCategories {
        /// Path to the saved `catalog_category.tree` answer
        path: PathBuf,

        /// Priority of the root categories
        #[arg(short, long, default_value_t = DEFAULT_BASE_PRIORITY)]
        base_priority: u32,

        /// Plan only these remote category ids
        #[arg(short, long, value_delimiter = ',')]
        changed: Option<Vec<String>>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Decode a CBOR job payload
    DecodeJob {
        /// Path to the payload
        path: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::CheckConfig { path, format } => {
            commands::check_config::run(&path, Format::parse(&format)?)?;
        }
        Commands::PlanCategories {
            path,
            base_priority,
            changed,
            format,
        } => {
            commands::plan_categories::run(&path, base_priority, changed.as_deref(), Format::parse(&format)?)?;
        }
        Commands::DecodeJob { path, format } => {
            commands::decode_job::run(&path, Format::parse(&format)?)?;
        }
        Commands::Version => {
            println!("shopsync CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("shopsync core v{}", shopsync_core::VERSION);
        }
    }

    Ok(())
}
