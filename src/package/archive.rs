// src/package/archive.rs

//! Conda package archive reader
//!
//! Opens a `.tar.bz2` package, validates it, and loads every entry with its
//! tar header and content. Pure-Python packages are small, so the whole
//! archive is held in memory; this gives restartable, physically ordered
//! iteration and random access by path without re-decompressing.

use crate::compression::{self, CompressionFormat};
use crate::error::{Error, Result};
use crate::filesystem::path::sanitize_entry_path;
use crate::package::manifest::{INDEX_JSON, Manifest};
use serde_json::Value;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tar::{Archive, EntryType, Header};
use tracing::debug;

/// File name suffix every conda package carries
pub const PACKAGE_EXTENSION: &str = ".tar.bz2";

/// Noarch link metadata that can also declare entry points
const LINK_JSON: &str = "info/link.json";

/// What an archive entry is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    /// Regular file with content
    File,
    /// Directory
    Directory,
    /// Symbolic link; the target is stored verbatim
    Symlink { target: String },
    /// Hard link to another entry of the same archive
    HardLink { target: String },
}

/// A single archive entry
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    /// Sanitized, `/`-separated path relative to the package root
    pub path: String,
    /// Entry type
    pub kind: EntryKind,
    /// Original tar header (mode, mtime, ownership)
    pub header: Header,
    data: Vec<u8>,
}

impl ArchiveEntry {
    /// Content of a regular file (empty for other kinds)
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Permission bits
    pub fn mode(&self) -> u32 {
        self.header.mode().unwrap_or(0o644)
    }

    /// Modification time in seconds since the epoch
    pub fn mtime(&self) -> u64 {
        self.header.mtime().unwrap_or(0)
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }
}

/// An opened, read-only conda package
#[derive(Debug)]
pub struct PackageArchive {
    path: PathBuf,
    entries: Vec<ArchiveEntry>,
    index: HashMap<String, usize>,
    manifest: Manifest,
}

impl PackageArchive {
    /// Open and fully load a package
    ///
    /// Fails with `NotAPackage` when the file is missing, lacks the
    /// `.tar.bz2` suffix or the bzip2 magic, and with `CorruptManifest` when
    /// `info/index.json` is absent or unparsable.
    pub fn open(path: &Path) -> Result<Self> {
        let not_a_package = |reason: String| Error::NotAPackage {
            path: path.to_path_buf(),
            reason,
        };

        let file_name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        if !file_name.ends_with(PACKAGE_EXTENSION) {
            return Err(not_a_package(format!("expected a {} file", PACKAGE_EXTENSION)));
        }
        if !path.is_file() {
            return Err(not_a_package("no such file".to_string()));
        }

        let mut file = File::open(path).map_err(|e| not_a_package(e.to_string()))?;
        let mut magic = [0u8; 4];
        let read = file.read(&mut magic).map_err(|e| not_a_package(e.to_string()))?;
        let format = match CompressionFormat::from_magic_bytes(&magic[..read]) {
            Some(format) if CompressionFormat::from_extension(&file_name) == Some(format) => format,
            _ => {
                return Err(not_a_package(format!("missing {} signature", CompressionFormat::Bzip2)));
            }
        };

        // Reopen instead of seeking so the decoder sees the stream from byte 0
        let file = File::open(path).map_err(|e| not_a_package(e.to_string()))?;
        let decoder = compression::create_decoder(BufReader::new(file), format);
        let entries = Self::load_entries(Archive::new(decoder), path)?;

        let mut index = HashMap::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            if index.insert(entry.path.clone(), i).is_some() {
                return Err(not_a_package(format!("duplicate archive entry: {}", entry.path)));
            }
        }

        let manifest_bytes = index
            .get(INDEX_JSON)
            .map(|&i| entries[i].data())
            .ok_or_else(|| Error::CorruptManifest {
                path: path.to_path_buf(),
                reason: format!("{} not found", INDEX_JSON),
            })?;
        let manifest = Manifest::parse(manifest_bytes, path)?;

        debug!(
            "Opened {} ({} entries, platform {})",
            path.display(),
            entries.len(),
            manifest.platform
        );

        Ok(Self {
            path: path.to_path_buf(),
            entries,
            index,
            manifest,
        })
    }

    fn load_entries<R: Read>(mut archive: Archive<R>, path: &Path) -> Result<Vec<ArchiveEntry>> {
        let listing = path.display().to_string();
        let mut entries = Vec::new();

        for entry in archive.entries().map_err(|e| Error::read(&listing, e))? {
            let mut entry = entry.map_err(|e| Error::read(&listing, e))?;

            let raw_path = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
            let entry_path = sanitize_entry_path(&raw_path)?;
            let link_target = entry
                .link_name_bytes()
                .map(|b| String::from_utf8_lossy(&b).into_owned());

            let kind = match entry.header().entry_type() {
                EntryType::Regular | EntryType::Continuous => EntryKind::File,
                EntryType::Directory => EntryKind::Directory,
                EntryType::Symlink => EntryKind::Symlink {
                    target: link_target.unwrap_or_default(),
                },
                EntryType::Link => EntryKind::HardLink {
                    target: sanitize_entry_path(&link_target.unwrap_or_default())?,
                },
                other => {
                    return Err(Error::NotAPackage {
                        path: path.to_path_buf(),
                        reason: format!("unsupported entry type {:?} for {}", other, entry_path),
                    });
                }
            };

            let mut data = Vec::new();
            if kind == EntryKind::File {
                entry
                    .read_to_end(&mut data)
                    .map_err(|e| Error::read(&entry_path, e))?;
            }

            entries.push(ArchiveEntry {
                path: entry_path,
                kind,
                header: entry.header().clone(),
                data,
            });
        }

        Ok(entries)
    }

    /// Path the package was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name of the package, e.g. `pkga-1.0-py34_0.tar.bz2`
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Parsed `info/index.json`
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Entries in archive order
    pub fn entries(&self) -> impl Iterator<Item = &ArchiveEntry> {
        self.entries.iter()
    }

    /// Entry paths in archive order
    pub fn entry_paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.path.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an entry by its sanitized path
    pub fn entry(&self, path: &str) -> Option<&ArchiveEntry> {
        self.index.get(path).map(|&i| &self.entries[i])
    }

    /// Content of the entry at `path`
    pub fn read(&self, path: &str) -> Result<&[u8]> {
        let entry = self
            .entry(path)
            .ok_or_else(|| Error::read(path, "no such entry in archive"))?;
        match entry.kind {
            EntryKind::File => Ok(entry.data()),
            _ => Err(Error::read(path, "not a regular file")),
        }
    }

    /// Console entry points declared by the package metadata
    ///
    /// Combines `entry_points` from `info/index.json` with the noarch
    /// `entry_points` list from `info/link.json` when present.
    pub fn declared_entry_points(&self) -> Vec<String> {
        let mut declared = self.manifest.entry_points.clone();

        if let Some(link) = self.entry(LINK_JSON).filter(|e| e.is_file())
            && let Ok(value) = serde_json::from_slice::<Value>(link.data())
            && let Some(points) = value
                .pointer("/noarch/entry_points")
                .and_then(Value::as_array)
        {
            declared.extend(points.iter().filter_map(Value::as_str).map(str::to_string));
        }

        declared
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::Encoder;
    use std::io::Write;

    fn append_file(builder: &mut tar::Builder<Vec<u8>>, path: &str, data: &[u8], mode: u32) {
        let mut header = Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(mode);
        header.set_mtime(1_400_000_000);
        header.set_entry_type(EntryType::Regular);
        builder.append_data(&mut header, path, data).unwrap();
    }

    fn write_package(dir: &Path, name: &str, tar: Vec<u8>) -> PathBuf {
        let mut encoder = Encoder::new(Vec::new(), CompressionFormat::Bzip2);
        encoder.write_all(&tar).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, encoder.finish().unwrap()).unwrap();
        path
    }

    fn sample_tar() -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        append_file(&mut builder, "info/index.json", br#"{"platform": "osx", "depends": ["python 3.4*"]}"#, 0o644);
        append_file(&mut builder, "lib/python3.4/site-packages/pkga/__init__.py", b"x = 1\n", 0o644);
        append_file(&mut builder, "./bin/pkga-cli", b"#!/usr/bin/env python\n", 0o755);
        builder.into_inner().unwrap()
    }

    #[test]
    fn test_open_lists_entries_in_order() {
        let temp = tempfile::tempdir().unwrap();
        let path = write_package(temp.path(), "pkga-1.0-py34_0.tar.bz2", sample_tar());

        let archive = PackageArchive::open(&path).unwrap();
        let paths: Vec<&str> = archive.entry_paths().collect();
        assert_eq!(
            paths,
            vec![
                "info/index.json",
                "lib/python3.4/site-packages/pkga/__init__.py",
                "bin/pkga-cli",
            ]
        );
        assert_eq!(archive.manifest().platform, "osx");
        assert_eq!(archive.file_name(), "pkga-1.0-py34_0.tar.bz2");
        assert_eq!(archive.len(), 3);

        // Iteration is restartable
        assert_eq!(archive.entry_paths().count(), 3);
    }

    #[test]
    fn test_read_entry_content_and_metadata() {
        let temp = tempfile::tempdir().unwrap();
        let path = write_package(temp.path(), "pkga-1.0-py34_0.tar.bz2", sample_tar());
        let archive = PackageArchive::open(&path).unwrap();

        assert_eq!(archive.read("lib/python3.4/site-packages/pkga/__init__.py").unwrap(), b"x = 1\n");
        let cli = archive.entry("bin/pkga-cli").unwrap();
        assert_eq!(cli.mode(), 0o755);
        assert_eq!(cli.mtime(), 1_400_000_000);
        assert!(archive.read("missing").is_err());
    }

    #[test]
    fn test_open_rejects_wrong_extension() {
        let temp = tempfile::tempdir().unwrap();
        let path = write_package(temp.path(), "pkga-1.0.tar.gz", sample_tar());
        assert!(matches!(PackageArchive::open(&path), Err(Error::NotAPackage { .. })));
    }

    #[test]
    fn test_open_rejects_missing_file() {
        let result = PackageArchive::open(Path::new("/nonexistent/pkga-1.0-0.tar.bz2"));
        assert!(matches!(result, Err(Error::NotAPackage { .. })));
    }

    #[test]
    fn test_open_rejects_bad_magic() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("pkga-1.0-0.tar.bz2");
        std::fs::write(&path, sample_tar()).unwrap();
        assert!(matches!(PackageArchive::open(&path), Err(Error::NotAPackage { .. })));
    }

    #[test]
    fn test_open_requires_manifest() {
        let mut builder = tar::Builder::new(Vec::new());
        append_file(&mut builder, "bin/tool", b"#!/bin/sh\n", 0o755);
        let temp = tempfile::tempdir().unwrap();
        let path = write_package(temp.path(), "tool-1.0-0.tar.bz2", builder.into_inner().unwrap());

        assert!(matches!(PackageArchive::open(&path), Err(Error::CorruptManifest { .. })));
    }

    #[test]
    fn test_open_rejects_malformed_manifest() {
        let mut builder = tar::Builder::new(Vec::new());
        append_file(&mut builder, "info/index.json", b"{\"platform\": ", 0o644);
        let temp = tempfile::tempdir().unwrap();
        let path = write_package(temp.path(), "tool-1.0-0.tar.bz2", builder.into_inner().unwrap());

        assert!(matches!(PackageArchive::open(&path), Err(Error::CorruptManifest { .. })));
    }

    #[test]
    fn test_declared_entry_points_from_link_json() {
        let mut builder = tar::Builder::new(Vec::new());
        append_file(&mut builder, "info/index.json", br#"{"platform": "linux", "entry_points": ["a = a:main"]}"#, 0o644);
        append_file(
            &mut builder,
            "info/link.json",
            br#"{"noarch": {"type": "python", "entry_points": ["b = b.cli:run"]}}"#,
            0o644,
        );
        let temp = tempfile::tempdir().unwrap();
        let path = write_package(temp.path(), "ab-1.0-0.tar.bz2", builder.into_inner().unwrap());

        let archive = PackageArchive::open(&path).unwrap();
        assert_eq!(
            archive.declared_entry_points(),
            vec!["a = a:main".to_string(), "b = b.cli:run".to_string()]
        );
    }
}
