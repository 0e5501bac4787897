//! persona-builder binary
//!
//! Builds a persona for one Reddit user per invocation and writes it to
//! `<output_dir>/persona_<username>.txt` and `.md`.

use clap::Parser;
use tracing::info;

use persona_builder::cli::{normalize_username, Cli, Commands, ConfigSubcommand, RunArgs};
use persona_builder::config::{self, AppConfig};
use persona_builder::error::{Error, Result};
use persona_builder::logging;
use persona_builder::pipeline::PersonaPipeline;
use persona_builder::version::{self, BuildInfo};

fn main() {
    // .env must be loaded before clap reads PERSONA_CONFIG
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprint!("{}", e.format_for_terminal());
        std::process::exit(e.exit_code());
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Some(Commands::Version) => {
            version::print_version();
            Ok(())
        }
        Some(Commands::Config { subcommand }) => {
            logging::init_simple(tracing::Level::WARN)?;
            handle_config_command(subcommand)
        }
        None => run_persona(cli.run, cli.verbose, cli.quiet),
    }
}

/// Build and save the persona for `args.username`
fn run_persona(args: RunArgs, verbose: u8, quiet: bool) -> Result<()> {
    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(dir) = &args.output_dir {
        config.output.dir = dir.clone();
    }

    // The guards must be kept alive for the lifetime of the program
    let _log_guards = logging::init_logging(&config.logging, verbose, quiet)?;

    let build = BuildInfo::current();
    info!(
        version = %build.full_version(),
        target = %build.target,
        profile = %build.profile,
        "Starting persona-builder"
    );

    let username = args.username.as_deref().map(normalize_username).unwrap_or_default();
    let model = args
        .model
        .clone()
        .unwrap_or_else(|| config.api.default_model.clone());
    let api_key = config.api_key().ok_or(Error::MissingApiKey)?;

    info!(
        username = %username,
        model = %model,
        output_dir = %config.output.dir,
        "Configuration loaded"
    );

    let mut pipeline = PersonaPipeline::from_config(&config)?;
    if let Some(path) = &args.dump_document {
        pipeline = pipeline.with_document_dump(path);
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| Error::Internal(format!("Failed to create runtime: {}", e)))?;

    let report = runtime.block_on(pipeline.run(username, &model, Some(api_key)))?;

    if !quiet {
        for path in &report.writes.written {
            println!("Persona saved to {}", path.display());
        }
    }

    let mut failures = report.writes.failures.into_iter();
    match failures.next() {
        Some(first) => {
            for other in failures {
                eprint!("{}", other.format_for_terminal());
            }
            Err(first)
        }
        None => Ok(()),
    }
}

/// Handle configuration subcommands
fn handle_config_command(subcommand: ConfigSubcommand) -> Result<()> {
    match subcommand {
        ConfigSubcommand::Show { config } => {
            let cfg = AppConfig::load(config.as_deref())?;
            println!("{}", toml::to_string_pretty(&cfg.redacted())?);
        }
        ConfigSubcommand::Init { path, force } => {
            let written = config::init_config(path.as_deref(), force)?;
            println!("Configuration written to {}", written.display());
        }
        ConfigSubcommand::Validate { config } => {
            AppConfig::load(config.as_deref())?;
            println!("Configuration is valid.");
        }
    }

    Ok(())
}
