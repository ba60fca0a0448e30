// src/platform.rs

//! Conda platform descriptors
//!
//! Destination platforms are a fixed set of conda subdir tokens
//! (`osx-64`, `linux-32`, `linux-64`, `win-32`, `win-64`). Everything that
//! depends on directory layout only cares about the coarse OS family, which
//! is derived once here and never re-derived from strings elsewhere.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Coarse OS grouping that decides layout translation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OsFamily {
    /// osx and linux: `bin/`, `lib/pythonX.Y/`
    Unix,
    /// win: `Scripts/`, `Lib/`
    Windows,
}

impl OsFamily {
    /// Family of a manifest `platform` value (`osx`, `linux`, `win`)
    pub fn from_platform_name(name: &str) -> Result<Self> {
        match name {
            "osx" | "linux" => Ok(Self::Unix),
            "win" => Ok(Self::Windows),
            other => Err(Error::UnknownPlatform(other.to_string())),
        }
    }

    /// Short name used in diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unix => "unix",
            Self::Windows => "win",
        }
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A destination platform conda can install on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Platform {
    Osx64,
    Linux32,
    Linux64,
    Win32,
    Win64,
}

impl Platform {
    /// Every supported destination, in CLI listing order
    pub const ALL: [Platform; 5] = [
        Self::Osx64,
        Self::Linux32,
        Self::Linux64,
        Self::Win32,
        Self::Win64,
    ];

    /// The conda subdir token, e.g. `win-64`
    pub fn subdir(&self) -> &'static str {
        match self {
            Self::Osx64 => "osx-64",
            Self::Linux32 => "linux-32",
            Self::Linux64 => "linux-64",
            Self::Win32 => "win-32",
            Self::Win64 => "win-64",
        }
    }

    /// The manifest `platform` value, e.g. `win`
    pub fn os_name(&self) -> &'static str {
        match self {
            Self::Osx64 => "osx",
            Self::Linux32 | Self::Linux64 => "linux",
            Self::Win32 | Self::Win64 => "win",
        }
    }

    /// Word size of the platform
    pub fn bits(&self) -> u8 {
        match self {
            Self::Linux32 | Self::Win32 => 32,
            Self::Osx64 | Self::Linux64 | Self::Win64 => 64,
        }
    }

    /// The manifest `arch` value
    pub fn arch(&self) -> &'static str {
        if self.bits() == 64 { "x86_64" } else { "x86" }
    }

    pub fn family(&self) -> OsFamily {
        match self {
            Self::Osx64 | Self::Linux32 | Self::Linux64 => OsFamily::Unix,
            Self::Win32 | Self::Win64 => OsFamily::Windows,
        }
    }

    /// Comma-separated list of accepted tokens, for help and error text
    pub fn choices() -> String {
        Self::ALL
            .iter()
            .map(|p| p.subdir())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl FromStr for Platform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.subdir() == s)
            .ok_or_else(|| {
                Error::UnknownPlatform(format!("{} (expected one of: {})", s, Self::choices()))
            })
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.subdir())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_parse_roundtrip() {
        for platform in Platform::ALL {
            assert_eq!(platform.subdir().parse::<Platform>().unwrap(), platform);
        }
    }

    #[test]
    fn test_platform_parse_rejects_unknown() {
        assert!(matches!(
            "linux-aarch64".parse::<Platform>(),
            Err(Error::UnknownPlatform(_))
        ));
        assert!("WIN-64".parse::<Platform>().is_err());
        assert!("".parse::<Platform>().is_err());
    }

    #[test]
    fn test_platform_attributes() {
        assert_eq!(Platform::Win64.os_name(), "win");
        assert_eq!(Platform::Win64.arch(), "x86_64");
        assert_eq!(Platform::Linux32.arch(), "x86");
        assert_eq!(Platform::Linux32.bits(), 32);
        assert_eq!(Platform::Osx64.to_string(), "osx-64");
    }

    #[test]
    fn test_platform_family() {
        assert_eq!(Platform::Osx64.family(), OsFamily::Unix);
        assert_eq!(Platform::Linux64.family(), OsFamily::Unix);
        assert_eq!(Platform::Win32.family(), OsFamily::Windows);
    }

    #[test]
    fn test_family_from_manifest_platform() {
        assert_eq!(OsFamily::from_platform_name("osx").unwrap(), OsFamily::Unix);
        assert_eq!(OsFamily::from_platform_name("linux").unwrap(), OsFamily::Unix);
        assert_eq!(OsFamily::from_platform_name("win").unwrap(), OsFamily::Windows);
        assert!(OsFamily::from_platform_name("freebsd").is_err());
    }
}
