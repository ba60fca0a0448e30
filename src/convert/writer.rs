// src/convert/writer.rs

//! Converted package writer
//!
//! Streams every source entry into a new `.tar.bz2` under its mapped path,
//! keeping mode, mtime and ownership. The archive is built in a temporary
//! file next to the destination and renamed into place only after the
//! compressed stream is finished and synced, so a failed write never leaves
//! a partial package behind.

use crate::compression::{CompressionFormat, Encoder};
use crate::convert::layout::FileMap;
use crate::convert::metadata::ContentOverrides;
use crate::error::{Error, Result};
use crate::package::archive::{ArchiveEntry, EntryKind, PackageArchive};
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tar::{Builder, EntryType, Header};
use tracing::debug;

/// Summary of a written package
#[derive(Debug, Clone)]
pub struct WriteResult {
    /// Final location of the package
    pub path: PathBuf,
    /// Number of entries written
    pub entries: usize,
    /// Compressed size in bytes
    pub size: u64,
}

/// Writes one converted package
pub struct ArchiveWriter<'a> {
    archive: &'a PackageArchive,
    file_map: &'a FileMap,
    overrides: ContentOverrides,
}

impl<'a> ArchiveWriter<'a> {
    pub fn new(archive: &'a PackageArchive, file_map: &'a FileMap) -> Self {
        Self {
            archive,
            file_map,
            overrides: ContentOverrides::new(),
        }
    }

    /// Replace the content of some entries, keyed by source path
    pub fn with_overrides(mut self, overrides: ContentOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Write the package to `dest`, replacing any existing file
    pub fn write(&self, dest: &Path) -> Result<WriteResult> {
        let parent = match dest.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent).map_err(|e| Error::write(dest, e))?;

        let temp = tempfile::Builder::new()
            .prefix(".conda-convert-")
            .suffix(".partial")
            .tempfile_in(parent)
            .map_err(|e| Error::write(dest, e))?;

        let encoder = Encoder::new(BufWriter::new(temp.as_file()), CompressionFormat::Bzip2);
        let mut builder = Builder::new(encoder);
        let entries = self
            .append_entries(&mut builder)
            .map_err(|e| Error::write(dest, e))?;

        let encoder = builder.into_inner().map_err(|e| Error::write(dest, e))?;
        let mut buffered = encoder.finish()?;
        buffered.flush().map_err(|e| Error::write(dest, e))?;
        drop(buffered);
        temp.as_file().sync_all().map_err(|e| Error::write(dest, e))?;

        // Temp files are created 0600; packages should be world-readable
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(temp.path(), fs::Permissions::from_mode(0o644))
                .map_err(|e| Error::write(dest, e))?;
        }

        temp.persist(dest).map_err(|e| Error::write(dest, e.error))?;
        let size = fs::metadata(dest).map(|m| m.len()).unwrap_or(0);

        debug!("Wrote {} ({} entries, {} bytes)", dest.display(), entries, size);

        Ok(WriteResult {
            path: dest.to_path_buf(),
            entries,
            size,
        })
    }

    fn dest_path<'p>(&'p self, source: &'p str) -> &'p str {
        self.file_map.get(source).unwrap_or(source)
    }

    fn append_entries<W: Write>(&self, builder: &mut Builder<W>) -> io::Result<usize> {
        let mut count = 0;

        for entry in self.archive.entries() {
            let path = self.dest_path(&entry.path);
            let mut header = header_from(entry)?;

            match &entry.kind {
                EntryKind::File => {
                    let data = self
                        .overrides
                        .get(&entry.path)
                        .map(Vec::as_slice)
                        .unwrap_or(entry.data());
                    header.set_size(data.len() as u64);
                    builder.append_data(&mut header, path, data)?;
                }
                EntryKind::Directory => {
                    builder.append_data(&mut header, path, io::empty())?;
                }
                EntryKind::Symlink { target } => {
                    builder.append_link(&mut header, path, target)?;
                }
                EntryKind::HardLink { target } => {
                    builder.append_link(&mut header, path, self.dest_path(target))?;
                }
            }
            count += 1;
        }

        Ok(count)
    }
}

/// Fresh GNU header carrying the metadata of `entry`
///
/// The source header is not reused: its path and link fields would have to
/// be cleared by hand, and ustar prefixes from other tar writers would leak
/// into the new entry names.
fn header_from(entry: &ArchiveEntry) -> io::Result<Header> {
    let source = &entry.header;
    let mut header = Header::new_gnu();

    header.set_entry_type(match entry.kind {
        EntryKind::File => EntryType::Regular,
        EntryKind::Directory => EntryType::Directory,
        EntryKind::Symlink { .. } => EntryType::Symlink,
        EntryKind::HardLink { .. } => EntryType::Link,
    });
    header.set_mode(entry.mode());
    header.set_mtime(entry.mtime());
    header.set_uid(source.uid().unwrap_or(0));
    header.set_gid(source.gid().unwrap_or(0));
    header.set_size(0);

    if let Ok(Some(name)) = source.username() {
        header.set_username(name)?;
    }
    if let Ok(Some(name)) = source.groupname() {
        header.set_groupname(name)?;
    }

    Ok(header)
}
