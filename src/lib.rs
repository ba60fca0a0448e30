// src/lib.rs

//! conda-convert
//!
//! Converts pure-Python conda packages between platforms by moving their
//! files into the destination platform's directory layout and retargeting
//! the package metadata.
//!
//! # Architecture
//!
//! - Packages are read fully into memory and never modified in place
//! - Compatibility is decided before any file is written
//! - Layout rules are data, not code paths
//! - Converted packages are published atomically

pub mod compression;
pub mod convert;
mod error;
pub mod filesystem;
pub mod package;
pub mod platform;

pub use convert::{ConversionOptions, ConversionOutcome, PackageConverter, SkipReason};
pub use error::{Error, Result};
pub use package::{Manifest, PackageArchive};
pub use platform::{OsFamily, Platform};
