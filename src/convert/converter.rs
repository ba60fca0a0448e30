// src/convert/converter.rs
//! Conversion orchestrator
//!
//! Runs every (package, destination platform) pair of an invocation:
//! open the package, inspect it, compute the file map, then write the
//! converted package or report what would be written. Failures and
//! rejections are local to their pair; only the up-front output directory
//! check can stop a whole run.

use crate::convert::inspector::{
    EntryPointReason, NativeCodeFinding, find_incompatible_entry_points, find_native_code,
};
use crate::convert::layout::{FileMap, map_paths};
use crate::convert::metadata::metadata_overrides;
use crate::convert::writer::{ArchiveWriter, WriteResult};
use crate::error::{Error, Result};
use crate::filesystem::path::normalize_dir;
use crate::package::archive::PackageArchive;
use crate::platform::{OsFamily, Platform};
use rayon::prelude::*;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};

/// Options for a conversion run
#[derive(Debug, Clone)]
pub struct ConversionOptions {
    /// Destination platforms, in the order given
    pub platforms: Vec<Platform>,
    /// Directory receiving converted packages
    pub output_dir: PathBuf,
    /// Convert despite native code or non-Python entry points
    pub force: bool,
    /// Print importable names of native extension modules
    pub show_imports: bool,
    /// Compute file maps without writing anything
    pub dry_run: bool,
    /// Print the full file map of each conversion
    pub verbose: bool,
    /// Write to `output_dir/<platform>/` instead of `output_dir/`
    pub platform_subdirs: bool,
    /// Number of packages converted in parallel
    pub jobs: usize,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            platforms: Vec::new(),
            output_dir: PathBuf::from("."),
            force: false,
            show_imports: false,
            dry_run: false,
            verbose: false,
            platform_subdirs: false,
            jobs: 1,
        }
    }
}

/// Why a (package, platform) pair was not converted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Compiled artifacts found in the package
    NativeCodePresent { paths: Vec<String> },
    /// Entry points that cannot be carried to the destination family
    IncompatibleEntryPoints {
        reason: EntryPointReason,
        paths: Vec<String>,
        declared: Vec<String>,
    },
    /// Another pair of this run already produces the same output file
    DestinationClaimed { path: PathBuf },
}

impl SkipReason {
    /// Whether `--force` turns this rejection into a warning
    pub fn is_overridable(&self) -> bool {
        match self {
            Self::NativeCodePresent { .. } => true,
            Self::IncompatibleEntryPoints { reason, .. } => reason.is_overridable(),
            Self::DestinationClaimed { .. } => false,
        }
    }

    /// Entries implicated in the finding
    pub fn paths(&self) -> &[String] {
        match self {
            Self::NativeCodePresent { paths } | Self::IncompatibleEntryPoints { paths, .. } => paths,
            Self::DestinationClaimed { .. } => &[],
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NativeCodePresent { .. } => write!(f, "contains compiled code"),
            Self::IncompatibleEntryPoints { reason, .. } => write!(f, "has {}", reason),
            Self::DestinationClaimed { path } => {
                write!(f, "{} is already produced by another conversion in this run", path.display())
            }
        }
    }
}

/// Result of one (package, platform) pair
#[derive(Debug)]
pub enum ConversionOutcome {
    /// Package written
    Converted { result: WriteResult, file_map: FileMap },
    /// Dry run: package would be written with this file map
    WouldConvert { output: PathBuf, file_map: FileMap },
    /// Rejected before mapping
    Skipped(SkipReason),
    /// Mapping or writing failed
    Failed(Error),
}

/// Report for one destination platform of a package
#[derive(Debug)]
pub struct UnitReport {
    pub platform: Platform,
    /// Where the converted package goes
    pub destination: PathBuf,
    pub outcome: ConversionOutcome,
    /// Rejections that `--force` overrode
    pub overridden: Vec<SkipReason>,
}

/// Report for one input package
#[derive(Debug)]
pub struct PackageReport {
    pub input: PathBuf,
    /// Package file name
    pub name: String,
    /// Manifest platform, `None` if the package could not be opened
    pub source_platform: Option<String>,
    pub native_code: NativeCodeFinding,
    pub units: Vec<UnitReport>,
    /// Why the package could not be processed at all
    pub error: Option<Error>,
}

impl PackageReport {
    fn failed(input: &Path, error: Error) -> Self {
        Self {
            input: input.to_path_buf(),
            name: input
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            source_platform: None,
            native_code: NativeCodeFinding::default(),
            units: Vec::new(),
            error: Some(error),
        }
    }
}

/// Counters shared by all workers of a run
#[derive(Debug, Default)]
pub struct ConversionStats {
    converted: AtomicUsize,
    would_convert: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
}

/// Point-in-time copy of [`ConversionStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub converted: usize,
    pub would_convert: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl ConversionStats {
    fn record(&self, outcome: &ConversionOutcome) {
        let counter = match outcome {
            ConversionOutcome::Converted { .. } => &self.converted,
            ConversionOutcome::WouldConvert { .. } => &self.would_convert,
            ConversionOutcome::Skipped(_) => &self.skipped,
            ConversionOutcome::Failed(_) => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            converted: self.converted.load(Ordering::Relaxed),
            would_convert: self.would_convert.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Everything a run produced
#[derive(Debug)]
pub struct RunReport {
    /// One report per input, in input order
    pub packages: Vec<PackageReport>,
    pub stats: StatsSnapshot,
}

impl RunReport {
    /// Inputs that could not be opened
    pub fn open_failures(&self) -> impl Iterator<Item = &PackageReport> {
        self.packages.iter().filter(|p| p.error.is_some())
    }
}

/// Per-run shared state
#[derive(Default)]
struct RunState {
    claims: Mutex<HashSet<PathBuf>>,
    stats: ConversionStats,
}

impl RunState {
    /// Claim `path` for this run; false if it was already claimed
    fn claim(&self, path: &Path) -> bool {
        match self.claims.lock() {
            Ok(mut claims) => claims.insert(path.to_path_buf()),
            Err(poisoned) => poisoned.into_inner().insert(path.to_path_buf()),
        }
    }
}

/// Converts conda packages to other platforms
pub struct PackageConverter {
    options: ConversionOptions,
}

impl PackageConverter {
    pub fn new(options: ConversionOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ConversionOptions {
        &self.options
    }

    /// Convert every input to every destination platform
    ///
    /// Fails only when the output directory collides with an input
    /// directory, before any package is opened. Everything else is
    /// reported per package in the returned [`RunReport`].
    pub fn run(&self, inputs: &[PathBuf]) -> Result<RunReport> {
        self.check_output_dir(inputs)?;

        let state = RunState::default();
        let jobs = self.options.jobs.max(1);

        let packages: Vec<PackageReport> = if jobs > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(jobs)
                .build()
                .map_err(|e| Error::Io(std::io::Error::other(e)))?;
            pool.install(|| {
                inputs
                    .par_iter()
                    .map(|input| self.convert_package(input, &state))
                    .collect()
            })
        } else {
            inputs
                .iter()
                .map(|input| self.convert_package(input, &state))
                .collect()
        };

        Ok(RunReport {
            packages,
            stats: state.stats.snapshot(),
        })
    }

    /// Directories that must not hold any input: the output directory and,
    /// with platform subdirectories, each `output_dir/<platform>`
    fn output_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = vec![self.options.output_dir.clone()];
        if self.options.platform_subdirs {
            dirs.extend(
                self.options
                    .platforms
                    .iter()
                    .map(|p| self.options.output_dir.join(p.subdir())),
            );
        }
        dirs
    }

    fn check_output_dir(&self, inputs: &[PathBuf]) -> Result<()> {
        let outputs = self
            .output_dirs()
            .iter()
            .map(|dir| normalize_dir(dir))
            .collect::<Result<Vec<_>>>()?;

        for input in inputs {
            let parent = match input.parent() {
                Some(p) if !p.as_os_str().is_empty() => p,
                _ => Path::new("."),
            };
            let input_dir = normalize_dir(parent)?;
            if let Some(dir) = outputs.iter().find(|dir| **dir == input_dir) {
                return Err(Error::OutputCollision { dir: dir.clone() });
            }
        }

        Ok(())
    }

    /// Output path for converting `archive` to `platform`
    pub fn destination_for(&self, file_name: &str, platform: Platform) -> PathBuf {
        let dir = if self.options.platform_subdirs {
            self.options.output_dir.join(platform.subdir())
        } else {
            self.options.output_dir.clone()
        };
        dir.join(file_name)
    }

    fn convert_package(&self, input: &Path, state: &RunState) -> PackageReport {
        let opened = PackageArchive::open(input).and_then(|archive| {
            let family = archive.manifest().source_family()?;
            Ok((archive, family))
        });
        let (archive, source_family) = match opened {
            Ok(opened) => opened,
            Err(e) => {
                warn!("Skipping {}: {}", input.display(), e);
                state.stats.failed.fetch_add(1, Ordering::Relaxed);
                return PackageReport::failed(input, e);
            }
        };

        // Native code does not depend on the destination; check it once
        let native_code = find_native_code(&archive);
        if native_code.is_present() {
            debug!(
                "{} contains {} compiled file(s)",
                archive.file_name(),
                native_code.paths.len()
            );
        }

        let units = self
            .options
            .platforms
            .iter()
            .map(|&platform| {
                let unit = self.convert_unit(&archive, source_family, &native_code, platform, state);
                state.stats.record(&unit.outcome);
                unit
            })
            .collect();

        PackageReport {
            input: input.to_path_buf(),
            name: archive.file_name(),
            source_platform: Some(archive.manifest().platform.clone()),
            native_code,
            units,
            error: None,
        }
    }

    fn convert_unit(
        &self,
        archive: &PackageArchive,
        source_family: OsFamily,
        native_code: &NativeCodeFinding,
        platform: Platform,
        state: &RunState,
    ) -> UnitReport {
        let destination = self.destination_for(&archive.file_name(), platform);
        let mut overridden = Vec::new();

        let mut findings = Vec::new();
        if native_code.is_present() {
            findings.push(SkipReason::NativeCodePresent {
                paths: native_code.paths.clone(),
            });
        }
        if let Some(found) = find_incompatible_entry_points(archive, source_family, platform.family()) {
            findings.push(SkipReason::IncompatibleEntryPoints {
                reason: found.reason,
                paths: found.paths,
                declared: found.declared,
            });
        }

        for finding in findings {
            if self.options.force && finding.is_overridable() {
                info!("{} {}, converting to {} anyway", archive.file_name(), finding, platform);
                overridden.push(finding);
            } else {
                info!("Skipping {} for {}: {}", archive.file_name(), platform, finding);
                return UnitReport {
                    platform,
                    destination,
                    outcome: ConversionOutcome::Skipped(finding),
                    overridden,
                };
            }
        }

        let outcome = match self.map_and_write(archive, source_family, platform, &destination, state) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Failed to convert {} to {}: {}", archive.file_name(), platform, e);
                ConversionOutcome::Failed(e)
            }
        };

        UnitReport {
            platform,
            destination,
            outcome,
            overridden,
        }
    }

    fn map_and_write(
        &self,
        archive: &PackageArchive,
        source_family: OsFamily,
        platform: Platform,
        destination: &Path,
        state: &RunState,
    ) -> Result<ConversionOutcome> {
        let version = archive.manifest().interpreter_version()?;
        let file_map = map_paths(
            archive.entry_paths(),
            source_family,
            platform.family(),
            version.as_deref(),
        )?;

        if !state.claim(destination) {
            return Ok(ConversionOutcome::Skipped(SkipReason::DestinationClaimed {
                path: destination.to_path_buf(),
            }));
        }

        if self.options.dry_run {
            return Ok(ConversionOutcome::WouldConvert {
                output: destination.to_path_buf(),
                file_map,
            });
        }

        info!(
            "Converting {} from {} to {}",
            archive.file_name(),
            archive.manifest().platform,
            platform
        );
        let overrides = metadata_overrides(archive, &file_map, platform)?;
        let result = ArchiveWriter::new(archive, &file_map)
            .with_overrides(overrides)
            .write(destination)?;

        Ok(ConversionOutcome::Converted { result, file_map })
    }
}
