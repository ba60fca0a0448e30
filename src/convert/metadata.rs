// src/convert/metadata.rs

//! Metadata rewrites for converted packages
//!
//! A package's `info/` directory describes its own payload. Once the payload
//! is moved to another layout, `info/index.json` must name the destination
//! platform and the path listings in `info/files`, `info/has_prefix` and,
//! for newer packages, `info/paths.json` must follow the file map.

use crate::convert::layout::FileMap;
use crate::error::{Error, Result};
use crate::package::archive::PackageArchive;
use crate::package::manifest::INDEX_JSON;
use crate::platform::Platform;
use serde_json::Value;
use std::collections::HashMap;

/// Newline-separated list of every payload path
pub const FILES_LIST: &str = "info/files";

/// Paths containing the build prefix placeholder
pub const HAS_PREFIX: &str = "info/has_prefix";

/// Per-file records (`_path`, `path_type`, hashes) of newer packages
pub const PATHS_JSON: &str = "info/paths.json";

/// Replacement content keyed by source entry path
pub type ContentOverrides = HashMap<String, Vec<u8>>;

/// Remap each line of `info/files`
fn remap_files_list(text: &str, file_map: &FileMap) -> String {
    text.split_inclusive('\n')
        .map(|line| {
            let (path, ending) = split_line_ending(line);
            match file_map.get(path) {
                Some(dest) => format!("{}{}", dest, ending),
                None => line.to_string(),
            }
        })
        .collect()
}

/// Remap the path field of each `info/has_prefix` line
///
/// Lines are either a bare path or `<placeholder> <mode> <path>`; the path
/// is the last field and may itself contain spaces.
fn remap_has_prefix(text: &str, file_map: &FileMap) -> String {
    text.split_inclusive('\n')
        .map(|line| {
            let (body, ending) = split_line_ending(line);
            if let Some(dest) = file_map.get(body) {
                return format!("{}{}", dest, ending);
            }

            let fields: Vec<&str> = body.splitn(3, ' ').collect();
            if let [placeholder, mode, path] = fields.as_slice()
                && let Some(dest) = file_map.get(path)
            {
                return format!("{} {} {}{}", placeholder, mode, dest, ending);
            }

            line.to_string()
        })
        .collect()
}

/// Remap the `_path` of every record in `info/paths.json`
///
/// Returns `None` when no record names a moved file.
fn remap_paths_json(bytes: &[u8], file_map: &FileMap) -> Result<Option<Vec<u8>>> {
    let mut doc: Value = serde_json::from_slice(bytes)
        .map_err(|e| Error::read(PATHS_JSON, format!("not valid JSON: {}", e)))?;

    let mut changed = false;
    if let Some(records) = doc.get_mut("paths").and_then(Value::as_array_mut) {
        for record in records {
            let Some(path) = record.get("_path").and_then(Value::as_str) else {
                continue;
            };
            if let Some(dest) = file_map.get(path)
                && dest != path
            {
                record["_path"] = Value::String(dest.to_string());
                changed = true;
            }
        }
    }

    if !changed {
        return Ok(None);
    }
    Ok(Some(serde_json::to_vec_pretty(&doc)?))
}

fn split_line_ending(line: &str) -> (&str, &str) {
    let body = line.trim_end_matches(['\n', '\r']);
    (body, &line[body.len()..])
}

/// Compute replacement content for the metadata entries of `archive`
///
/// Only entries whose content actually changes are returned, so a
/// same-platform conversion yields no overrides and the output stays
/// byte-for-byte equal to the input entries.
pub fn metadata_overrides(
    archive: &PackageArchive,
    file_map: &FileMap,
    dest: Platform,
) -> Result<ContentOverrides> {
    let mut overrides = ContentOverrides::new();

    if let Some(index) = archive.manifest().retargeted(dest)? {
        overrides.insert(INDEX_JSON.to_string(), index);
    }

    if file_map.is_identity() {
        return Ok(overrides);
    }

    let listings: [(&str, fn(&str, &FileMap) -> String); 2] =
        [(FILES_LIST, remap_files_list), (HAS_PREFIX, remap_has_prefix)];

    for (entry, remap) in listings {
        let Some(found) = archive.entry(entry).filter(|e| e.is_file()) else {
            continue;
        };
        let text = std::str::from_utf8(found.data())
            .map_err(|e| Error::read(entry, format!("not valid UTF-8: {}", e)))?;

        let remapped = remap(text, file_map);
        if remapped != text {
            overrides.insert(entry.to_string(), remapped.into_bytes());
        }
    }

    if let Some(found) = archive.entry(PATHS_JSON).filter(|e| e.is_file())
        && let Some(remapped) = remap_paths_json(found.data(), file_map)?
    {
        overrides.insert(PATHS_JSON.to_string(), remapped);
    }

    Ok(overrides)
}
