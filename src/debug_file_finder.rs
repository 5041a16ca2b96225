//! `DebugFileFinder`: maps `(dso_path, build_id, bitness)` to an on-disk
//! debug file using a build-id index file, a symbol-root directory, a
//! system debug directory, and per-bitness VDSO overrides.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::warn;

use crate::build_id::BuildId;
use crate::error::{Error, Result};

const VDSO_PATH: &str = "[vdso]";
const SYSTEM_DEBUG_DIR: &str = "/usr/lib/debug";

#[derive(Debug, Default)]
pub struct DebugFileFinder {
    symfs_dir: Option<PathBuf>,
    build_id_to_file: HashMap<String, PathBuf>,
    vdso_32: Option<PathBuf>,
    vdso_64: Option<PathBuf>,
}

impl DebugFileFinder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_vdso_paths(&mut self, vdso_32: Option<PathBuf>, vdso_64: Option<PathBuf>) {
        self.vdso_32 = vdso_32;
        self.vdso_64 = vdso_64;
    }

    /// Validates that `dir` is a directory, records it with a trailing
    /// separator implied by `Path::join`, and reloads the `build_id_list`
    /// index found directly under it.
    pub fn set_symfs_dir(&mut self, dir: &Path) -> Result<()> {
        if !dir.is_dir() {
            return Err(Error::NotADirectory(dir.to_path_buf()));
        }
        self.symfs_dir = Some(dir.to_path_buf());
        self.build_id_to_file = load_build_id_list(dir);
        Ok(())
    }

    /// `FindDebugFile(dso_path, force_64bit, build_id)`.
    pub fn find_debug_file(
        &self,
        dso_path: &str,
        force_64bit: bool,
        build_id: Option<&BuildId>,
    ) -> PathBuf {
        if dso_path == VDSO_PATH {
            let preferred = if force_64bit {
                self.vdso_64.as_ref()
            } else {
                self.vdso_32.as_ref()
            };
            if let Some(path) = preferred {
                return path.clone();
            }
            return PathBuf::from(dso_path);
        }

        let Some(symfs_dir) = &self.symfs_dir else {
            return PathBuf::from(dso_path);
        };

        let build_id_hex = build_id.filter(|b| !b.is_empty()).map(BuildId::to_hex);
        let readable_build_id = build_id_hex.clone().or_else(|| {
            crate::binary_reader::read_build_id(dso_path)
                .ok()
                .map(|b| b.to_hex())
        });

        let Some(expected_hex) = readable_build_id else {
            return PathBuf::from(dso_path);
        };

        let mut candidates = Vec::new();
        if let Some(relpath) = self.build_id_to_file.get(&expected_hex) {
            candidates.push(symfs_dir.join(relpath));
        }
        candidates.push(join_dso_path(symfs_dir, dso_path));
        candidates.push(join_dso_path(Path::new(SYSTEM_DEBUG_DIR), dso_path));

        for candidate in candidates {
            match crate::binary_reader::read_build_id(&candidate.to_string_lossy()) {
                Ok(found) if found.to_hex() == expected_hex => return candidate,
                Ok(_) => continue,
                Err(_) => continue,
            }
        }

        PathBuf::from(dso_path)
    }
}

/// Joins `symfs_dir` with `dso_path`, preserving an `archive!/entry`
/// suffix so APK-embedded requests keep working after concatenation.
fn join_dso_path(base: &Path, dso_path: &str) -> PathBuf {
    match dso_path.split_once("!/") {
        Some((archive, entry)) => {
            let joined = base.join(archive.trim_start_matches('/'));
            PathBuf::from(format!("{}!/{}", joined.display(), entry))
        }
        None => base.join(dso_path.trim_start_matches('/')),
    }
}

/// Parses `symfs_dir/build_id_list`: newline-separated `HEX=relpath`
/// lines. Lines without exactly one `=`, and blank lines, are skipped.
fn load_build_id_list(symfs_dir: &Path) -> HashMap<String, PathBuf> {
    let list_path = symfs_dir.join("build_id_list");
    let Ok(contents) = std::fs::read_to_string(&list_path) else {
        return HashMap::new();
    };
    let mut map = HashMap::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut parts = line.splitn(2, '=');
        let (Some(hex), Some(relpath)) = (parts.next(), parts.next()) else {
            continue;
        };
        if hex.is_empty() || relpath.is_empty() {
            warn!("skipping malformed build_id_list line: {line}");
            continue;
        }
        map.insert(hex.to_lowercase(), PathBuf::from(relpath));
    }
    map
}
