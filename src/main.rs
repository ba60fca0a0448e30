// src/main.rs

use anyhow::Result;
use clap::Parser;
use conda_convert::ConversionOptions;

mod cli;
mod commands;

use cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };

    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    let options = ConversionOptions {
        platforms: cli.platforms,
        output_dir: cli.output_dir,
        force: cli.force,
        show_imports: cli.show_imports,
        dry_run: cli.dry_run,
        verbose: cli.verbose,
        platform_subdirs: cli.platform_subdirs,
        jobs: cli.jobs,
    };

    commands::cmd_convert(&cli.package_files, options)
}
