// src/cli/mod.rs
//! CLI definitions for conda-convert
//!
//! This module contains the command-line interface definition using clap.
//! The command implementation is in the `commands` module.

use clap::Parser;
use conda_convert::Platform;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "conda-convert")]
#[command(author = "conda-convert Contributors")]
#[command(version)]
#[command(about = "Convert pure-Python conda packages to other platforms", long_about = None)]
pub struct Cli {
    /// Package files to convert (.tar.bz2)
    #[arg(required = true, value_name = "PACKAGE")]
    pub package_files: Vec<PathBuf>,

    /// Destination platform; repeat for several (osx-64, linux-32, linux-64, win-32, win-64)
    #[arg(short, long = "platform", required = true, value_name = "PLATFORM")]
    pub platforms: Vec<Platform>,

    /// Directory to write converted packages to
    #[arg(short, long, env = "CONDA_CONVERT_OUTPUT_DIR", value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Convert even if the package contains compiled code or non-Python entry points
    #[arg(short, long)]
    pub force: bool,

    /// Print the import names of compiled extension modules
    #[arg(long)]
    pub show_imports: bool,

    /// Show what would be converted without writing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Print the file map of each conversion
    #[arg(short, long)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Write each platform's packages to its own subdirectory of the output directory
    #[arg(long)]
    pub platform_subdirs: bool,

    /// Number of packages to convert in parallel
    #[arg(short, long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    pub jobs: usize,
}
