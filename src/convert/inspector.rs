// src/convert/inspector.rs

//! Compatibility checks run before a package is converted
//!
//! Two things make a package unsafe to move between platforms:
//!
//! - **Compiled native code**: extension modules and shared libraries are
//!   built for one platform. Detection is by file suffix only, so a renamed
//!   binary goes unnoticed; that false negative is accepted.
//! - **Entry points**: executable wrappers in `bin/` or `Scripts/` are
//!   OS-specific. Python scripts in `bin/` can be carried to Windows, but
//!   anything else needs a native launcher, and Windows launchers cannot be
//!   turned back into Unix scripts at all.

use crate::convert::layout::Direction;
use crate::package::archive::{ArchiveEntry, EntryKind, PackageArchive};
use crate::platform::OsFamily;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use tracing::debug;

/// Suffixes of compiled artifacts
const NATIVE_SUFFIXES: [&str; 4] = [".so", ".pyd", ".dylib", ".dll"];

/// Versioned shared objects such as `libfoo.so.1.2`
static VERSIONED_SO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.so(?:\.\d+)+$").unwrap());

/// Python extension modules under a site-packages or lib-dynload tree
static EXTENSION_MODULE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:lib/python\d+\.\d+|Lib)/(?:site-packages|lib-dynload)/(\S+?)(?:\.(?:cpython|cp|pypy|abi)[^/]*)?\.(?:so|pyd)$",
    )
    .unwrap()
});

/// Native code found in a package
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NativeCodeFinding {
    /// Entries that look like compiled artifacts
    pub paths: Vec<String>,
    /// Importable module names of the Python extension modules among them
    pub imports: Vec<String>,
}

impl NativeCodeFinding {
    pub fn is_present(&self) -> bool {
        !self.paths.is_empty()
    }
}

/// Whether an entry path names a compiled artifact
pub fn is_native_artifact(path: &str) -> bool {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    NATIVE_SUFFIXES.iter().any(|s| file_name.ends_with(s)) || VERSIONED_SO_RE.is_match(file_name)
}

/// Module name of a Python extension module, e.g. `pkgb._accel`
pub fn extension_module_name(path: &str) -> Option<String> {
    EXTENSION_MODULE_RE
        .captures(path)
        .map(|caps| caps[1].replace('/', "."))
}

/// Scan a package for compiled native code
pub fn find_native_code(archive: &PackageArchive) -> NativeCodeFinding {
    let mut finding = NativeCodeFinding::default();

    for entry in archive.entries() {
        if entry.kind == EntryKind::Directory || !is_native_artifact(&entry.path) {
            continue;
        }
        if let Some(module) = extension_module_name(&entry.path) {
            finding.imports.push(module);
        }
        finding.paths.push(entry.path.clone());
    }

    finding
}

/// What an executable in the scripts directory turned out to be
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptKind {
    /// `#!` line naming a Python interpreter
    Python,
    /// `#!` line naming some other interpreter
    Interpreter(String),
    /// ELF, Mach-O or PE binary
    Native,
    /// Symlink, empty file, or anything without a recognizable header
    Unknown,
}

impl ScriptKind {
    pub fn is_python(&self) -> bool {
        matches!(self, Self::Python)
    }
}

impl fmt::Display for ScriptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Python => write!(f, "Python script"),
            Self::Interpreter(line) => write!(f, "script for #!{}", line),
            Self::Native => write!(f, "native executable"),
            Self::Unknown => write!(f, "file of unrecognized type"),
        }
    }
}

/// Classify a script by its leading bytes
pub fn classify_script(data: &[u8]) -> ScriptKind {
    const NATIVE_MAGIC: [&[u8]; 7] = [
        b"\x7fELF",
        b"\xfe\xed\xfa\xce",
        b"\xfe\xed\xfa\xcf",
        b"\xce\xfa\xed\xfe",
        b"\xcf\xfa\xed\xfe",
        b"\xca\xfe\xba\xbe",
        b"MZ",
    ];

    if let Some(rest) = data.strip_prefix(b"#!") {
        let line_end = rest.iter().position(|&b| b == b'\n').unwrap_or(rest.len());
        let line = String::from_utf8_lossy(&rest[..line_end]).trim().to_string();
        if line.contains("python") {
            ScriptKind::Python
        } else {
            ScriptKind::Interpreter(line)
        }
    } else if NATIVE_MAGIC.iter().any(|magic| data.starts_with(magic)) {
        ScriptKind::Native
    } else {
        ScriptKind::Unknown
    }
}

/// Why entry points block a conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryPointReason {
    /// Unix to Windows: non-Python entry points need native launchers
    NativeLauncherRequired,
    /// Windows to Unix: entry point conversion is not supported
    Unsupported,
}

impl EntryPointReason {
    /// Whether `--force` may override this rejection
    pub fn is_overridable(&self) -> bool {
        matches!(self, Self::NativeLauncherRequired)
    }
}

impl fmt::Display for EntryPointReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NativeLauncherRequired => write!(f, "non-Python entry points"),
            Self::Unsupported => write!(f, "entry points, which are not supported for Windows to Unix conversion"),
        }
    }
}

/// Entry points that block a cross-family conversion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPointFinding {
    pub reason: EntryPointReason,
    /// Offending entries in the scripts directory
    pub paths: Vec<String>,
    /// Entry points declared in package metadata
    pub declared: Vec<String>,
}

fn script_data<'a>(archive: &'a PackageArchive, entry: &'a ArchiveEntry) -> &'a [u8] {
    match &entry.kind {
        EntryKind::HardLink { target } => archive.entry(target).map(|t| t.data()).unwrap_or_default(),
        _ => entry.data(),
    }
}

/// Check whether a package's entry points survive a `source` to `dest` move
///
/// Returns `None` for same-family conversions and for packages without
/// problematic entry points.
pub fn find_incompatible_entry_points(
    archive: &PackageArchive,
    source: OsFamily,
    dest: OsFamily,
) -> Option<EntryPointFinding> {
    let direction = Direction::between(source, dest)?;
    let declared = archive.declared_entry_points();

    let (scripts_dir, reason) = match direction {
        Direction::UnixToWindows => ("bin/", EntryPointReason::NativeLauncherRequired),
        Direction::WindowsToUnix => ("Scripts/", EntryPointReason::Unsupported),
    };

    let paths: Vec<String> = archive
        .entries()
        .filter(|e| e.kind != EntryKind::Directory && e.path.starts_with(scripts_dir))
        .filter(|e| match direction {
            Direction::UnixToWindows => {
                let kind = classify_script(script_data(archive, e));
                if !kind.is_python() {
                    debug!("{} is a {}", e.path, kind);
                }
                !kind.is_python()
            }
            Direction::WindowsToUnix => true,
        })
        .map(|e| e.path.clone())
        .collect();

    if paths.is_empty() && declared.is_empty() {
        None
    } else {
        Some(EntryPointFinding {
            reason,
            paths,
            declared,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_artifact_suffixes() {
        assert!(is_native_artifact("lib/python3.4/site-packages/pkgb/_accel.so"));
        assert!(is_native_artifact("Lib/site-packages/pkgb/_accel.pyd"));
        assert!(is_native_artifact("lib/libfoo.dylib"));
        assert!(is_native_artifact("Library/bin/foo.dll"));
        assert!(is_native_artifact("lib/libfoo.so.1.2"));
        assert!(!is_native_artifact("lib/python3.4/site-packages/pkga/__init__.py"));
        assert!(!is_native_artifact("share/doc/also.so.txt"));
        assert!(!is_native_artifact("lib/python3.4/site-packages/isonomy.py"));
    }

    #[test]
    fn test_extension_module_name() {
        assert_eq!(
            extension_module_name("lib/python3.4/site-packages/pkgb/_accel.so").as_deref(),
            Some("pkgb._accel")
        );
        assert_eq!(
            extension_module_name("lib/python3.4/site-packages/pkgb/_accel.cpython-34m.so").as_deref(),
            Some("pkgb._accel")
        );
        assert_eq!(
            extension_module_name("lib/python3.10/lib-dynload/_ssl.cpython-310-x86_64-linux-gnu.so").as_deref(),
            Some("_ssl")
        );
        assert_eq!(
            extension_module_name("Lib/site-packages/pkgb/_accel.cp310-win_amd64.pyd").as_deref(),
            Some("pkgb._accel")
        );
        assert_eq!(extension_module_name("lib/libfoo.so"), None);
    }

    #[test]
    fn test_classify_script() {
        assert_eq!(classify_script(b"#!/usr/bin/env python\nimport sys\n"), ScriptKind::Python);
        assert_eq!(classify_script(b"#!/opt/anaconda1anaconda2anaconda3/bin/python3.4\n"), ScriptKind::Python);
        assert_eq!(
            classify_script(b"#!/bin/sh\nexec foo\n"),
            ScriptKind::Interpreter("/bin/sh".to_string())
        );
        assert_eq!(classify_script(b"\x7fELF\x02\x01\x01"), ScriptKind::Native);
        assert_eq!(classify_script(b"\xcf\xfa\xed\xfe\x07\x00"), ScriptKind::Native);
        assert_eq!(classify_script(b"MZ\x90\x00"), ScriptKind::Native);
        assert_eq!(classify_script(b""), ScriptKind::Unknown);
        assert_eq!(classify_script(b"echo hi\n"), ScriptKind::Unknown);
    }

    #[test]
    fn test_script_kind_display_names_interpreter() {
        let kind = classify_script(b"#!/usr/bin/env perl\n");
        assert_eq!(kind.to_string(), "script for #!/usr/bin/env perl");
        assert_eq!(ScriptKind::Native.to_string(), "native executable");
    }

    #[test]
    fn test_shebang_python_must_be_on_first_line() {
        assert_eq!(
            classify_script(b"#!/bin/bash\n# runs python later\n"),
            ScriptKind::Interpreter("/bin/bash".to_string())
        );
    }

    #[test]
    fn test_entry_point_reason_override() {
        assert!(EntryPointReason::NativeLauncherRequired.is_overridable());
        assert!(!EntryPointReason::Unsupported.is_overridable());
    }
}
