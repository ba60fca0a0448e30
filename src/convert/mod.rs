// src/convert/mod.rs
//! Cross-platform package conversion
//!
//! A pure-Python package built on one OS family can be installed on the
//! other once its files move to the other family's layout:
//!
//! | Unix | Windows |
//! |------|---------|
//! | `lib/pythonX.Y/` | `Lib/` |
//! | `bin/` | `Scripts/` |
//!
//! Conversion per (package, destination platform):
//!
//! 1. Inspect the package for compiled code and OS-specific entry points
//! 2. Reject, or warn and continue when forced
//! 3. Compute the file map
//! 4. Write the converted package, or report the map on a dry run

pub mod converter;
pub mod inspector;
pub mod layout;
pub mod metadata;
pub mod writer;

pub use converter::{
    ConversionOptions, ConversionOutcome, ConversionStats, PackageConverter, PackageReport,
    RunReport, SkipReason, StatsSnapshot, UnitReport,
};
pub use inspector::{
    EntryPointFinding, EntryPointReason, NativeCodeFinding, ScriptKind, classify_script,
    find_incompatible_entry_points, find_native_code,
};
pub use layout::{Direction, FileMap, PATH_RULES, PathMapping, PathRule, map_paths};
pub use writer::{ArchiveWriter, WriteResult};
