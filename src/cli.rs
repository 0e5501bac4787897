//! CLI argument parsing using clap v4

use clap::{Args, Parser, Subcommand};

/// Build a persona profile of a Reddit user
///
/// Scrapes the user's public profile, posts and comments, asks a language
/// model to profile the author and saves the answer under the output
/// directory.
#[derive(Parser, Debug)]
#[command(name = "persona-builder")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true, subcommand_negates_reqs = true)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,

    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Options for a persona run
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Reddit username to profile (without the u/ prefix)
    #[arg(short, long, required = true)]
    pub username: Option<String>,

    /// Model identifier sent to the generation API
    #[arg(short, long)]
    pub model: Option<String>,

    /// Path to configuration file
    #[arg(short, long, env = "PERSONA_CONFIG")]
    pub config: Option<String>,

    /// Directory the persona files are written to
    #[arg(short, long)]
    pub output_dir: Option<String>,

    /// Also save the aggregated document sent to the model
    #[arg(long, value_name = "PATH")]
    pub dump_document: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Display version and build information
    Version,

    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

/// Configuration subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigSubcommand {
    /// Display the effective configuration (API key redacted)
    Show {
        /// Path to configuration file
        #[arg(short, long, env = "PERSONA_CONFIG")]
        config: Option<String>,
    },

    /// Initialize a new configuration file
    Init {
        /// Path where to create the config file
        #[arg(short, long)]
        path: Option<String>,

        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Validate a configuration file
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long, env = "PERSONA_CONFIG")]
        config: Option<String>,
    },
}

/// Strip a leading `u/` or `/u/` from a username argument.
pub fn normalize_username(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix("/u/")
        .or_else(|| trimmed.strip_prefix("u/"))
        .unwrap_or(trimmed)
}
