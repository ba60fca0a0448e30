// src/filesystem/mod.rs

//! Filesystem helpers for conda-convert
//!
//! Archive entry path sanitization and directory identity checks used to keep
//! converted packages away from their inputs.

pub mod path;

pub use path::{normalize_dir, sanitize_entry_path};
