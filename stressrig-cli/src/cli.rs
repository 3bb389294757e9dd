//! CLI argument parsing definitions

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use stressrig_config::{LogFormat, LogLevel};

#[derive(Parser)]
#[command(author, version, about = "Scripted scale and log stress tests for cluster deployments", long_about = None)]
pub struct Cli {
    /// Override the configured log level
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    /// Override the configured log format
    #[arg(long, value_name = "FORMAT", global = true)]
    pub log_format: Option<LogFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the test suites of a configuration file
    Run {
        /// Path to the configuration file
        #[arg(value_name = "PATH")]
        config: PathBuf,

        /// Only run the named test (repeatable)
        #[arg(long = "suite", value_name = "NAME")]
        suites: Vec<String>,

        /// Print the run report as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Check a configuration file and print the action plan without running it
    Validate {
        /// Path to the configuration file
        #[arg(value_name = "PATH")]
        config: PathBuf,
    },

    /// Query the status listing of one resource and check it has converged
    Status {
        /// Path to the configuration file
        #[arg(value_name = "PATH")]
        config: PathBuf,

        /// Logical image name, or a resource identifier
        #[arg(value_name = "RESOURCE")]
        resource: String,
    },
}

impl Commands {
    pub fn config_path(&self) -> &Path {
        match self {
            Commands::Run { config, .. }
            | Commands::Validate { config }
            | Commands::Status { config, .. } => config,
        }
    }
}
