//! ctxstore CLI Binary
//!
//! Command-line interface for importing JSON into a ctxstore database and
//! inspecting what it holds.

use anyhow::Context as _;
use clap::Parser;
use ctxstore::cli::{Cli, RunContext};
use ctxstore::config::ConfigLoader;
use ctxstore::logging::{init_logging, LogOutput, LoggingConfig};
use owo_colors::OwoColorize;
use std::process;
use tracing::{error, info};

fn main() {
    let cli = Cli::parse();

    let logging_config = match build_logging_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            process::exit(2);
        }
    };

    if let Err(e) = init_logging(Some(&logging_config)) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    info!("ctxstore CLI starting");

    let context = match RunContext::new(
        cli.workspace.clone(),
        cli.config.clone(),
        cli.schema.clone(),
        cli.in_memory,
    ) {
        Ok(ctx) => ctx,
        Err(e) => {
            error!("Error loading configuration: {}", e);
            eprintln!("{} {}", "error:".red().bold(), ctxstore::cli::map_error(&e));
            process::exit(1);
        }
    };

    let result = context.execute(&cli.command);
    if let Err(e) = context.handle().close() {
        error!("Failed to close store: {}", e);
    }
    match result {
        Ok(output) => {
            info!("Command completed successfully");
            println!("{}", output);
        }
        Err(e) => {
            error!("Command failed: {}", e);
            eprintln!("{} {}", "error:".red().bold(), ctxstore::cli::map_error(&e));
            process::exit(1);
        }
    }
}

/// Build logging configuration from CLI args and the config file.
/// Precedence: CLI flags override config file override defaults.
fn build_logging_config(cli: &Cli) -> anyhow::Result<LoggingConfig> {
    let mut config = if let Some(ref config_path) = cli.config {
        ConfigLoader::load_from_file(config_path)
            .ok()
            .map(|c| c.logging)
            .unwrap_or_default()
    } else {
        ConfigLoader::load(&cli.workspace)
            .ok()
            .map(|c| c.logging)
            .unwrap_or_default()
    };

    if cli.verbose {
        config.level = "debug".to_string();
    }
    if let Some(ref level) = cli.log_level {
        config.level = level.clone();
    }
    if let Some(ref format) = cli.log_format {
        config.format = format.parse().context("--log-format")?;
    }
    if let Some(ref output) = cli.log_output {
        config.output = output.parse().context("--log-output")?;
    }
    if let Some(ref file) = cli.log_file {
        config.file = Some(file.clone());
        if config.output == LogOutput::Stderr {
            config.output = LogOutput::Both;
        }
    }

    Ok(config)
}
