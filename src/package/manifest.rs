// src/package/manifest.rs

//! Conda package manifest (`info/index.json`)
//!
//! Only a handful of fields matter to conversion: `platform` decides the
//! source OS family, `depends`/`build` carry the Python version that appears
//! in `lib/pythonX.Y/`, and `entry_points` marks packages whose launchers
//! cannot be carried across OS families. The raw JSON is kept so the
//! converted package can be written back with every other field untouched.

use crate::error::{Error, Result};
use crate::platform::{OsFamily, Platform};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::LazyLock;

/// Fixed location of the manifest inside a package
pub const INDEX_JSON: &str = "info/index.json";

static DEPENDS_PYTHON_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^python\s+(\d+\.\d+)").unwrap());
static BUILD_PYTHON_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^A-Za-z])py(\d)(\d{1,2})(?:\D|$)").unwrap());

#[derive(Debug, Deserialize)]
struct IndexFields {
    #[serde(default)]
    name: String,
    #[serde(default)]
    version: String,
    #[serde(default)]
    build: String,
    platform: Option<String>,
    #[serde(default)]
    depends: Vec<String>,
    #[serde(default)]
    entry_points: Vec<String>,
}

/// Parsed `info/index.json`
#[derive(Debug, Clone)]
pub struct Manifest {
    /// Package name
    pub name: String,
    /// Package version
    pub version: String,
    /// Build string, e.g. `py34_0`
    pub build: String,
    /// Origin platform, e.g. `osx`
    pub platform: String,
    /// Run-time dependency specs, e.g. `python 3.4*`
    pub depends: Vec<String>,
    /// Console entry points declared in the manifest
    pub entry_points: Vec<String>,
    raw: Value,
}

impl Manifest {
    /// Parse manifest bytes read from the package at `archive`
    pub fn parse(bytes: &[u8], archive: &Path) -> Result<Self> {
        let corrupt = |reason: String| Error::CorruptManifest {
            path: archive.to_path_buf(),
            reason,
        };

        let raw: Value = serde_json::from_slice(bytes)
            .map_err(|e| corrupt(format!("{} is not valid JSON: {}", INDEX_JSON, e)))?;
        if !raw.is_object() {
            return Err(corrupt(format!("{} is not a JSON object", INDEX_JSON)));
        }

        let fields: IndexFields = serde_json::from_value(raw.clone())
            .map_err(|e| corrupt(format!("unexpected field type in {}: {}", INDEX_JSON, e)))?;

        let platform = fields
            .platform
            .filter(|p| !p.is_empty())
            .ok_or_else(|| corrupt(format!("{} has no platform field", INDEX_JSON)))?;

        Ok(Self {
            name: fields.name,
            version: fields.version,
            build: fields.build,
            platform,
            depends: fields.depends,
            entry_points: fields.entry_points,
            raw,
        })
    }

    /// OS family the package was built for
    pub fn source_family(&self) -> Result<OsFamily> {
        OsFamily::from_platform_name(&self.platform)
    }

    /// Python `X.Y` version the package was built against
    ///
    /// Looks for `python X.Y...` in `depends` first and falls back to a
    /// `pyXY` tag in the build string. Returns `Ok(None)` for packages with no
    /// Python dependency at all.
    pub fn interpreter_version(&self) -> Result<Option<String>> {
        let versions: BTreeSet<String> = self
            .depends
            .iter()
            .filter_map(|dep| DEPENDS_PYTHON_RE.captures(dep.trim()))
            .map(|caps| caps[1].to_string())
            .collect();

        match versions.len() {
            0 => Ok(BUILD_PYTHON_RE
                .captures(&self.build)
                .map(|caps| format!("{}.{}", &caps[1], &caps[2]))),
            1 => Ok(versions.into_iter().next()),
            _ => Err(Error::AmbiguousInterpreterVersion {
                versions: versions.into_iter().collect(),
            }),
        }
    }

    /// Manifest bytes retargeted at `dest`, or `None` when nothing changes
    ///
    /// Updates `platform`, `arch` and `subdir`; every other field is kept.
    /// Keys come out sorted, matching how conda-build writes the file.
    pub fn retargeted(&self, dest: Platform) -> Result<Option<Vec<u8>>> {
        let updates = [
            ("platform", dest.os_name()),
            ("arch", dest.arch()),
            ("subdir", dest.subdir()),
        ];

        let unchanged = updates
            .iter()
            .all(|(key, value)| self.raw.get(*key).and_then(Value::as_str) == Some(*value));
        if unchanged {
            return Ok(None);
        }

        let mut patched = self.raw.clone();
        if let Some(object) = patched.as_object_mut() {
            for (key, value) in updates {
                object.insert(key.to_string(), Value::String(value.to_string()));
            }
        }

        Ok(Some(serde_json::to_vec_pretty(&patched)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<Manifest> {
        Manifest::parse(json.as_bytes(), Path::new("/tmp/pkg-1.0-py34_0.tar.bz2"))
    }

    #[test]
    fn test_parse_minimal() {
        let manifest = parse(r#"{"platform": "osx"}"#).unwrap();
        assert_eq!(manifest.platform, "osx");
        assert!(manifest.depends.is_empty());
        assert_eq!(manifest.source_family().unwrap(), OsFamily::Unix);
    }

    #[test]
    fn test_parse_full() {
        let manifest = parse(
            r#"{"name": "pkga", "version": "1.0", "build": "py34_0", "platform": "win",
                "arch": "x86_64", "depends": ["python 3.4*", "six"]}"#,
        )
        .unwrap();
        assert_eq!(manifest.name, "pkga");
        assert_eq!(manifest.version, "1.0");
        assert_eq!(manifest.source_family().unwrap(), OsFamily::Windows);
    }

    #[test]
    fn test_parse_rejects_bad_json() {
        assert!(matches!(parse("{not json"), Err(Error::CorruptManifest { .. })));
        assert!(matches!(parse("[1, 2]"), Err(Error::CorruptManifest { .. })));
        assert!(matches!(
            parse(r#"{"platform": "osx", "depends": "python"}"#),
            Err(Error::CorruptManifest { .. })
        ));
    }

    #[test]
    fn test_parse_requires_platform() {
        assert!(matches!(parse(r#"{"name": "a"}"#), Err(Error::CorruptManifest { .. })));
        assert!(matches!(
            parse(r#"{"name": "a", "platform": null}"#),
            Err(Error::CorruptManifest { .. })
        ));
    }

    #[test]
    fn test_unknown_platform_family() {
        let manifest = parse(r#"{"platform": "solaris"}"#).unwrap();
        assert!(matches!(manifest.source_family(), Err(Error::UnknownPlatform(_))));
    }

    #[test]
    fn test_interpreter_version_from_depends() {
        let manifest = parse(r#"{"platform": "osx", "depends": ["python 3.4*", "numpy >=1.9"]}"#).unwrap();
        assert_eq!(manifest.interpreter_version().unwrap().as_deref(), Some("3.4"));

        let manifest = parse(r#"{"platform": "osx", "depends": ["python  3.10.2 h1234_0"]}"#).unwrap();
        assert_eq!(manifest.interpreter_version().unwrap().as_deref(), Some("3.10"));
    }

    #[test]
    fn test_interpreter_version_ignores_python_named_packages() {
        let manifest = parse(r#"{"platform": "osx", "depends": ["python-dateutil 2.4*"]}"#).unwrap();
        assert_eq!(manifest.interpreter_version().unwrap(), None);
    }

    #[test]
    fn test_interpreter_version_from_build_string() {
        let manifest = parse(r#"{"platform": "linux", "build": "py27_1"}"#).unwrap();
        assert_eq!(manifest.interpreter_version().unwrap().as_deref(), Some("2.7"));

        let manifest = parse(r#"{"platform": "linux", "build": "np19py35_0"}"#).unwrap();
        assert_eq!(manifest.interpreter_version().unwrap().as_deref(), Some("3.5"));

        let manifest = parse(r#"{"platform": "win", "build": "np110py310h1a2b3c_2"}"#).unwrap();
        assert_eq!(manifest.interpreter_version().unwrap().as_deref(), Some("3.10"));
    }

    #[test]
    fn test_interpreter_version_needs_a_py_tag() {
        for build in ["pypy36_0", "numpy19_0", "py_0"] {
            let json = format!(r#"{{"platform": "linux", "build": "{}"}}"#, build);
            let manifest = parse(&json).unwrap();
            assert_eq!(manifest.interpreter_version().unwrap(), None, "{}", build);
        }
    }

    #[test]
    fn test_interpreter_version_absent() {
        let manifest = parse(r#"{"platform": "linux", "build": "0", "depends": ["zlib"]}"#).unwrap();
        assert_eq!(manifest.interpreter_version().unwrap(), None);
    }

    #[test]
    fn test_interpreter_version_ambiguous() {
        let manifest = parse(r#"{"platform": "linux", "depends": ["python 2.7*", "python 3.4*"]}"#).unwrap();
        assert!(matches!(
            manifest.interpreter_version(),
            Err(Error::AmbiguousInterpreterVersion { .. })
        ));
    }

    #[test]
    fn test_retargeted_updates_platform_fields() {
        let manifest = parse(
            r#"{"name": "pkga", "platform": "osx", "arch": "x86_64", "subdir": "osx-64", "depends": []}"#,
        )
        .unwrap();

        let bytes = manifest.retargeted(Platform::Win32).unwrap().unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["platform"], "win");
        assert_eq!(value["arch"], "x86");
        assert_eq!(value["subdir"], "win-32");
        assert_eq!(value["name"], "pkga");
    }

    #[test]
    fn test_retargeted_same_platform_is_none() {
        let manifest = parse(r#"{"platform": "osx", "arch": "x86_64", "subdir": "osx-64"}"#).unwrap();
        assert!(manifest.retargeted(Platform::Osx64).unwrap().is_none());
    }

    #[test]
    fn test_retargeted_fills_missing_fields() {
        let manifest = parse(r#"{"platform": "osx"}"#).unwrap();
        let bytes = manifest.retargeted(Platform::Osx64).unwrap().unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["subdir"], "osx-64");
    }
}
