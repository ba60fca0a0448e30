// src/convert/layout.rs

//! Directory layout translation between OS families
//!
//! Unix packages put the Python library under `lib/pythonX.Y/` and scripts
//! under `bin/`; Windows packages use `Lib/` and `Scripts/`. The rules live
//! in [`PATH_RULES`] as plain data, ordered and first-match-wins, and
//! [`map_paths`] turns them into a [`FileMap`] covering every archive entry.

use crate::error::{Error, Result};
use crate::platform::OsFamily;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

/// Any `lib/pythonX.Y` directory, whatever the version
static INTERPRETER_LIB_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^lib/python\d+\.\d+(?:/|$)").unwrap());

/// Which way a rule translates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    UnixToWindows,
    WindowsToUnix,
}

impl Direction {
    /// Translation direction for a family pair, `None` when no translation applies
    pub fn between(source: OsFamily, dest: OsFamily) -> Option<Self> {
        match (source, dest) {
            (OsFamily::Unix, OsFamily::Windows) => Some(Self::UnixToWindows),
            (OsFamily::Windows, OsFamily::Unix) => Some(Self::WindowsToUnix),
            _ => None,
        }
    }
}

/// A directory prefix, always ending in `/`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prefix {
    /// Fixed directory such as `bin/`
    Literal(&'static str),
    /// `lib/pythonX.Y/`, version taken from the package manifest
    InterpreterLib,
}

impl Prefix {
    /// Concrete prefix string, `None` if it needs a version that is unknown
    pub fn resolve(&self, version: Option<&str>) -> Option<String> {
        match self {
            Self::Literal(prefix) => Some((*prefix).to_string()),
            Self::InterpreterLib => version.map(|v| format!("lib/python{}/", v)),
        }
    }

    /// Whether `path` sits under this prefix for some interpreter version
    fn could_match(&self, path: &str) -> bool {
        match self {
            Self::Literal(prefix) => matches_prefix(path, prefix),
            Self::InterpreterLib => INTERPRETER_LIB_RE.is_match(path),
        }
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(prefix) => write!(f, "{}", prefix),
            Self::InterpreterLib => write!(f, "lib/python{{version}}/"),
        }
    }
}

/// One directory rename rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathRule {
    pub from: Prefix,
    pub to: Prefix,
    pub direction: Direction,
}

/// Directory rename rules, in match order
pub static PATH_RULES: [PathRule; 4] = [
    PathRule {
        from: Prefix::InterpreterLib,
        to: Prefix::Literal("Lib/"),
        direction: Direction::UnixToWindows,
    },
    PathRule {
        from: Prefix::Literal("bin/"),
        to: Prefix::Literal("Scripts/"),
        direction: Direction::UnixToWindows,
    },
    PathRule {
        from: Prefix::Literal("Lib/"),
        to: Prefix::InterpreterLib,
        direction: Direction::WindowsToUnix,
    },
    PathRule {
        from: Prefix::Literal("Scripts/"),
        to: Prefix::Literal("bin/"),
        direction: Direction::WindowsToUnix,
    },
];

/// Rules applying in `direction`, in match order
pub fn rules_for(direction: Direction) -> impl Iterator<Item = &'static PathRule> {
    PATH_RULES.iter().filter(move |r| r.direction == direction)
}

/// `path` is the prefix directory itself or something below it
fn matches_prefix(path: &str, prefix: &str) -> bool {
    path.starts_with(prefix) || path == prefix.trim_end_matches('/')
}

/// Replace `from` with `to` at the start of `path`
fn rewrite(path: &str, from: &str, to: &str) -> String {
    if path.len() < from.len() {
        // The directory entry itself, e.g. `bin` -> `Scripts`
        to.trim_end_matches('/').to_string()
    } else {
        format!("{}{}", to, &path[from.len()..])
    }
}

/// One entry's source and destination path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMapping {
    pub source: String,
    pub dest: String,
}

impl PathMapping {
    pub fn is_renamed(&self) -> bool {
        self.source != self.dest
    }
}

/// Source-path to destination-path mapping for one conversion
///
/// Holds exactly one mapping per archive entry, in archive order.
/// Destination paths are unique too.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileMap {
    mappings: Vec<PathMapping>,
    by_source: HashMap<String, usize>,
}

impl FileMap {
    /// Destination of `source`
    pub fn get(&self, source: &str) -> Option<&str> {
        self.by_source
            .get(source)
            .map(|&i| self.mappings[i].dest.as_str())
    }

    /// All mappings in archive order
    pub fn iter(&self) -> impl Iterator<Item = &PathMapping> {
        self.mappings.iter()
    }

    /// Only the mappings that rename their entry
    pub fn renamed(&self) -> impl Iterator<Item = &PathMapping> {
        self.mappings.iter().filter(|m| m.is_renamed())
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// No entry changes path
    pub fn is_identity(&self) -> bool {
        self.mappings.iter().all(|m| !m.is_renamed())
    }
}

impl fmt::Display for FileMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for mapping in &self.mappings {
            if mapping.is_renamed() {
                writeln!(f, "  {} -> {}", mapping.source, mapping.dest)?;
            } else {
                writeln!(f, "  {}", mapping.source)?;
            }
        }
        Ok(())
    }
}

/// Compute the file map for moving `entries` from `source` to `dest` layout
///
/// `version` is the package's Python `X.Y` version. It is only needed by
/// rules naming `lib/pythonX.Y/`; if it is missing and an entry falls under
/// such a rule, the mapping fails with `MissingInterpreterVersion`.
pub fn map_paths<'a>(
    entries: impl IntoIterator<Item = &'a str>,
    source: OsFamily,
    dest: OsFamily,
    version: Option<&str>,
) -> Result<FileMap> {
    let rules: Vec<&PathRule> = match Direction::between(source, dest) {
        Some(direction) => rules_for(direction).collect(),
        None => Vec::new(),
    };

    // Resolved (from, to) pairs; None marks a rule blocked on the version
    let resolved: Vec<Option<(String, String)>> = rules
        .iter()
        .map(|rule| Some((rule.from.resolve(version)?, rule.to.resolve(version)?)))
        .collect();

    let mut map = FileMap::default();
    let mut by_dest: HashMap<String, usize> = HashMap::new();

    for path in entries {
        let mut dest_path = None;

        for (rule, prefixes) in rules.iter().zip(&resolved) {
            match prefixes {
                Some((from, to)) if matches_prefix(path, from) => {
                    dest_path = Some(rewrite(path, from, to));
                    break;
                }
                None if rule.from.could_match(path) => {
                    return Err(Error::MissingInterpreterVersion {
                        entry: path.to_string(),
                    });
                }
                _ => {}
            }
        }

        let dest_path = dest_path.unwrap_or_else(|| path.to_string());
        let index = map.mappings.len();

        if let Some(&other) = by_dest.get(&dest_path) {
            return Err(Error::MappingConflict {
                destination: dest_path,
                first: map.mappings[other].source.clone(),
                second: path.to_string(),
            });
        }
        if map.by_source.insert(path.to_string(), index).is_some() {
            return Err(Error::InvalidPath(format!("duplicate archive entry: {}", path)));
        }

        by_dest.insert(dest_path.clone(), index);
        map.mappings.push(PathMapping {
            source: path.to_string(),
            dest: dest_path,
        });
    }

    Ok(map)
}
