//! APK/ZIP container support. Android native libraries are addressed with
//! the `archive!/entry` URL convention (e.g. `base.apk!/lib/arm64-v8a/libfoo.so`);
//! this module splits that convention apart and extracts the named entry's
//! bytes so the ELF parser in `elf.rs` can run over them unmodified.

use std::fs::File;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

const SEPARATOR: &str = "!/";

/// A path that may or may not use the `archive!/entry` container
/// convention.
pub enum ContainerPath {
    Plain(PathBuf),
    Archive { archive: PathBuf, entry: String },
}

impl ContainerPath {
    pub fn parse(path: &str) -> ContainerPath {
        match path.split_once(SEPARATOR) {
            Some((archive, entry)) => ContainerPath::Archive {
                archive: PathBuf::from(archive),
                entry: entry.to_string(),
            },
            None => ContainerPath::Plain(PathBuf::from(path)),
        }
    }

    pub fn is_archive(&self) -> bool {
        matches!(self, ContainerPath::Archive { .. })
    }
}

/// Reads the uncompressed bytes of `entry` out of the zip archive at
/// `archive_path`.
pub fn read_archive_entry(archive_path: &Path, entry: &str) -> Result<Vec<u8>> {
    let file = File::open(archive_path).map_err(|e| Error::Io(archive_path.to_path_buf(), e))?;
    let mut zip = zip::ZipArchive::new(file)
        .map_err(|e| Error::ZipError(archive_path.to_path_buf(), e))?;
    let mut zip_file = zip.by_name(entry).map_err(|_| Error::NoSuchZipEntry {
        archive: archive_path.to_path_buf(),
        entry: entry.to_string(),
    })?;
    let mut buf = Vec::with_capacity(zip_file.size() as usize);
    std::io::copy(&mut zip_file, &mut buf)
        .map_err(|e| Error::Io(archive_path.to_path_buf(), e))?;
    Ok(buf)
}

/// Resolves a dso path (plain or `archive!/entry`) to the bytes that
/// `elf.rs`'s parsing functions should run over.
pub fn read_binary_bytes(path: &str) -> Result<Vec<u8>> {
    match ContainerPath::parse(path) {
        ContainerPath::Plain(p) => {
            std::fs::read(&p).map_err(|e| Error::Io(p.clone(), e))
        }
        ContainerPath::Archive { archive, entry } => read_archive_entry(&archive, &entry),
    }
}
