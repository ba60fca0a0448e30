// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use bzip2::Compression;
use bzip2::write::BzEncoder;
use serde_json::{Value, json};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tar::{Builder, EntryType, Header};

/// Fixed mtime so fixtures are reproducible
pub const FIXTURE_MTIME: u64 = 1_400_000_000;

/// Builder for conda package fixtures
pub struct FixturePackage {
    index: Value,
    entries: Vec<(String, Vec<u8>, u32)>,
    with_listings: bool,
}

impl FixturePackage {
    /// Package built for `platform` (`osx`, `linux`, `win`)
    pub fn new(name: &str, platform: &str, subdir: &str) -> Self {
        Self {
            index: json!({
                "name": name,
                "version": "1.0",
                "build": "py34_0",
                "build_number": 0,
                "platform": platform,
                "arch": "x86_64",
                "subdir": subdir,
                "depends": ["python 3.4*"],
            }),
            entries: Vec::new(),
            with_listings: true,
        }
    }

    /// Set a top-level `info/index.json` field
    pub fn index_field(mut self, key: &str, value: Value) -> Self {
        if let Some(object) = self.index.as_object_mut() {
            object.insert(key.to_string(), value);
        }
        self
    }

    pub fn file(mut self, path: &str, data: &[u8]) -> Self {
        self.entries.push((path.to_string(), data.to_vec(), 0o644));
        self
    }

    pub fn executable(mut self, path: &str, data: &[u8]) -> Self {
        self.entries.push((path.to_string(), data.to_vec(), 0o755));
        self
    }

    /// Skip generating `info/files` and `info/has_prefix`
    pub fn without_listings(mut self) -> Self {
        self.with_listings = false;
        self
    }

    /// Write the package as `dir/file_name`
    pub fn write(&self, dir: &Path, file_name: &str) -> PathBuf {
        let mut builder = Builder::new(Vec::new());

        let index = serde_json::to_vec_pretty(&self.index).unwrap();
        append(&mut builder, "info/index.json", &index, 0o644);

        if self.with_listings {
            let files: String = self.entries.iter().map(|(p, _, _)| format!("{}\n", p)).collect();
            append(&mut builder, "info/files", files.as_bytes(), 0o644);

            let has_prefix: String = self
                .entries
                .iter()
                .filter(|(p, _, _)| p.starts_with("bin/"))
                .map(|(p, _, _)| format!("/opt/anaconda1anaconda2anaconda3 text {}\n", p))
                .collect();
            if !has_prefix.is_empty() {
                append(&mut builder, "info/has_prefix", has_prefix.as_bytes(), 0o644);
            }
        }

        for (path, data, mode) in &self.entries {
            append(&mut builder, path, data, *mode);
        }

        let tar = builder.into_inner().unwrap();
        let mut encoder = BzEncoder::new(Vec::new(), Compression::best());
        encoder.write_all(&tar).unwrap();

        fs::create_dir_all(dir).unwrap();
        let path = dir.join(file_name);
        fs::write(&path, encoder.finish().unwrap()).unwrap();
        path
    }
}

fn append(builder: &mut Builder<Vec<u8>>, path: &str, data: &[u8], mode: u32) {
    let mut header = Header::new_gnu();
    header.set_entry_type(EntryType::Regular);
    header.set_size(data.len() as u64);
    header.set_mode(mode);
    header.set_mtime(FIXTURE_MTIME);
    builder.append_data(&mut header, path, data).unwrap();
}

/// Pure-Python osx package with a Python console script
pub fn pkga(dir: &Path) -> PathBuf {
    FixturePackage::new("pkga", "osx", "osx-64")
        .file("lib/python3.4/site-packages/pkgA/__init__.py", b"VERSION = '1.0'\n")
        .executable("bin/pkgA-cli", b"#!/opt/anaconda1anaconda2anaconda3/bin/python\nimport pkgA\n")
        .write(dir, "pkgA-1.0-osx-64.tar.bz2")
}

/// osx package carrying a compiled extension module
pub fn pkgb(dir: &Path) -> PathBuf {
    FixturePackage::new("pkgb", "osx", "osx-64")
        .file("lib/python3.4/site-packages/pkgB/__init__.py", b"from ._accel import *\n")
        .file("lib/python3.4/site-packages/pkgB/_accel.so", b"\xcf\xfa\xed\xfe\x07\x00\x00\x01")
        .write(dir, "pkgB-1.0-py34_0.tar.bz2")
}

/// Sorted file names in `dir`, empty if it does not exist
pub fn list_dir(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match fs::read_dir(dir) {
        Ok(entries) => entries
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}
