// src/commands/convert.rs

//! Package conversion command
//!
//! Runs the converter over all inputs and prints one block per package:
//! what was converted, what was skipped and why, and a closing summary.

use anyhow::{Context, Result};
use conda_convert::convert::{
    ConversionOptions, ConversionOutcome, PackageConverter, PackageReport, RunReport, SkipReason,
    UnitReport,
};
use std::path::PathBuf;
use tracing::info;

/// Convert packages to other platforms
pub fn cmd_convert(package_files: &[PathBuf], options: ConversionOptions) -> Result<()> {
    info!(
        "Converting {} package(s) to {} platform(s) in {}",
        package_files.len(),
        options.platforms.len(),
        options.output_dir.display()
    );

    let converter = PackageConverter::new(options);
    let report = converter
        .run(package_files)
        .context("Conversion could not start")?;

    for package in &report.packages {
        print_package(package, converter.options());
    }
    print_summary(&report, converter.options().dry_run);

    let failures = report.open_failures().count();
    if failures > 0 {
        anyhow::bail!("{} package(s) could not be read", failures);
    }

    Ok(())
}

fn print_package(package: &PackageReport, options: &ConversionOptions) {
    if let Some(e) = &package.error {
        eprintln!("Error: {}: {}", package.input.display(), e);
        return;
    }

    let source = package.source_platform.as_deref().unwrap_or("unknown");

    if options.show_imports && package.native_code.is_present() {
        println!("{} contains compiled code:", package.name);
        for import in &package.native_code.imports {
            println!("  import {}", import);
        }
    }

    for unit in &package.units {
        print_unit(package, source, unit, options);
    }
}

fn print_unit(package: &PackageReport, source: &str, unit: &UnitReport, options: &ConversionOptions) {
    for reason in &unit.overridden {
        println!(
            "WARNING: Package {} {}, converting from {} to {} anyway.",
            package.name, reason, source, unit.platform
        );
        print_implicated(reason, options);
    }

    match &unit.outcome {
        ConversionOutcome::Converted { result, file_map } => {
            println!(
                "Converting {} from {} to {}",
                package.name, source, unit.platform
            );
            if options.verbose {
                print!("{}", file_map);
            }
            println!("  [OK] {} ({} entries)", result.path.display(), result.entries);
        }
        ConversionOutcome::WouldConvert { output, file_map } => {
            println!(
                "Would convert {} from {} to {}",
                package.name, source, unit.platform
            );
            if options.verbose {
                print!("{}", file_map);
            }
            println!("  -> {}", output.display());
        }
        ConversionOutcome::Skipped(reason) => {
            print_skip(package, source, unit, reason);
            print_implicated(reason, options);
        }
        ConversionOutcome::Failed(e) => {
            eprintln!(
                "  [FAILED] {} from {} to {}: {}",
                package.name, source, unit.platform, e
            );
        }
    }
}

fn print_skip(package: &PackageReport, source: &str, unit: &UnitReport, reason: &SkipReason) {
    let hint = if reason.is_overridable() {
        " Use -f to force conversion."
    } else {
        ""
    };
    println!(
        "WARNING: Package {} {}, skipping {} to {} conversion.{}",
        package.name, reason, source, unit.platform, hint
    );
}

/// Paths behind a finding, shown with `--verbose` or `--show-imports`
fn implicated_lines(reason: &SkipReason, options: &ConversionOptions) -> Vec<String> {
    if !(options.verbose || options.show_imports) {
        return Vec::new();
    }
    let mut lines: Vec<String> = reason.paths().iter().map(|path| format!("  {}", path)).collect();
    if let SkipReason::IncompatibleEntryPoints { declared, .. } = reason {
        lines.extend(declared.iter().map(|entry_point| format!("  entry point: {}", entry_point)));
    }
    lines
}

fn print_implicated(reason: &SkipReason, options: &ConversionOptions) {
    for line in implicated_lines(reason, options) {
        println!("{}", line);
    }
}

fn print_summary(report: &RunReport, dry_run: bool) {
    let stats = report.stats;
    if dry_run {
        println!(
            "\nWould convert {}, skipped {}, failed {}",
            stats.would_convert, stats.skipped, stats.failed
        );
    } else {
        println!(
            "\nConverted {}, skipped {}, failed {}",
            stats.converted, stats.skipped, stats.failed
        );
    }
}
