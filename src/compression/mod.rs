// src/compression/mod.rs
//! Compression utilities for conda package archives
//!
//! Conda's classic package format is a bzip2-compressed tarball
//! (`.tar.bz2`). This module detects it by extension or magic bytes and
//! hands out streaming decoders and encoders for it.

use std::io::{self, Read, Write};
use thiserror::Error;

/// Compression-related errors
#[derive(Error, Debug)]
pub enum CompressionError {
    #[error("Failed to finish {format} stream: {source}")]
    Finish {
        format: &'static str,
        source: io::Error,
    },
}

/// Supported compression formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionFormat {
    /// Bzip2 compression (.bz2)
    Bzip2,
}

impl CompressionFormat {
    /// Detect compression format from file extension
    ///
    /// # Examples
    /// ```
    /// use conda_convert::compression::CompressionFormat;
    ///
    /// assert_eq!(CompressionFormat::from_extension("pkg-1.0-0.tar.bz2"), Some(CompressionFormat::Bzip2));
    /// assert_eq!(CompressionFormat::from_extension("pkg-1.0-0.tar"), None);
    /// ```
    pub fn from_extension(path: &str) -> Option<Self> {
        if path.ends_with(".bz2") || path.ends_with(".tbz2") {
            Some(Self::Bzip2)
        } else {
            None
        }
    }

    /// Detect compression format from magic bytes
    ///
    /// Bzip2 streams start with `BZh` followed by the block size digit `1`-`9`.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.len() >= 4 && &data[0..3] == b"BZh" && (b'1'..=b'9').contains(&data[3]) {
            Some(Self::Bzip2)
        } else {
            None
        }
    }

    /// Get a human-readable name for this format
    pub fn name(&self) -> &'static str {
        match self {
            Self::Bzip2 => "bzip2",
        }
    }
}

impl std::fmt::Display for CompressionFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Create a decompressing reader for the given format
pub fn create_decoder<'a, R: Read + 'a>(reader: R, format: CompressionFormat) -> Box<dyn Read + 'a> {
    match format {
        CompressionFormat::Bzip2 => Box::new(bzip2::read::BzDecoder::new(reader)),
    }
}

/// Compressing writer that must be finished explicitly
///
/// Dropping an encoder without calling [`Encoder::finish`] leaves a truncated
/// stream, so the writer path always finishes before publishing.
pub enum Encoder<W: Write> {
    /// Bzip2 at the highest block size, as conda-build writes packages
    Bzip2(bzip2::write::BzEncoder<W>),
}

impl<W: Write> Encoder<W> {
    /// Wrap `writer` in an encoder for `format`
    pub fn new(writer: W, format: CompressionFormat) -> Self {
        match format {
            CompressionFormat::Bzip2 => {
                Self::Bzip2(bzip2::write::BzEncoder::new(writer, bzip2::Compression::best()))
            }
        }
    }

    /// Flush the trailer and return the inner writer
    pub fn finish(self) -> Result<W, CompressionError> {
        match self {
            Self::Bzip2(encoder) => encoder.finish().map_err(|e| CompressionError::Finish {
                format: "bzip2",
                source: e,
            }),
        }
    }
}

impl<W: Write> Write for Encoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Bzip2(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Bzip2(w) => w.flush(),
        }
    }
}
