// src/package/mod.rs

//! Conda package access
//!
//! A conda package is a bzip2-compressed tar archive whose `info/`
//! directory carries the metadata. `archive` reads the container and
//! `manifest` models `info/index.json`.

pub mod archive;
pub mod manifest;

pub use archive::{ArchiveEntry, EntryKind, PACKAGE_EXTENSION, PackageArchive};
pub use manifest::{INDEX_JSON, Manifest};
