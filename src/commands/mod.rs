// src/commands/mod.rs
//! Command handlers for the conda-convert CLI

mod convert;

pub use convert::cmd_convert;
