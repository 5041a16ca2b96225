//! `BinaryReader`: the four top-level parsing operations named in §4.1,
//! dispatching to `elf.rs`, `dex.rs`, `apk.rs`, and `kallsyms.rs`. Each
//! operation opens (and, for ELF/DEX, memory-maps) the underlying file
//! itself — callers never see the intermediate bytes.

use std::fs::File;
use std::path::Path;

use log::warn;

use crate::apk::ContainerPath;
use crate::build_id::BuildId;
use crate::dex;
use crate::elf;
use crate::error::{Error, Result};
use crate::interner::NameInterner;
use crate::symbol::Symbol;

fn mmap_file(path: &Path) -> Result<memmap2::Mmap> {
    let file = File::open(path).map_err(|e| Error::Io(path.to_path_buf(), e))?;
    // SAFETY: the file is not expected to be mutated concurrently by
    // another process during a profiling session; this mirrors the
    // teacher's own `kernel_module_build_id` mmap usage.
    unsafe { memmap2::MmapOptions::new().map(&file) }.map_err(|e| Error::Io(path.to_path_buf(), e))
}

/// **ReadBuildId(path)**. `path` may be a plain ELF path or an
/// `archive!/entry` APK-embedded path.
pub fn read_build_id(path: &str) -> Result<BuildId> {
    match ContainerPath::parse(path) {
        ContainerPath::Plain(p) => {
            let mmap = mmap_file(&p)?;
            elf::read_build_id(&mmap)
        }
        ContainerPath::Archive { archive, entry } => {
            let bytes = crate::apk::read_archive_entry(&archive, &entry)?;
            elf::read_build_id(&bytes)
        }
    }
}

/// **ReadMinExecutableVaddr(path, expected_build_id)**.
pub fn read_min_executable_vaddr(path: &str, expected_build_id: &BuildId) -> Result<u64> {
    let data = crate::apk::read_binary_bytes(path)?;
    if !expected_build_id.is_empty() {
        let found = elf::read_build_id(&data).ok();
        let matches = found.as_ref().is_some_and(|f| f.matches(expected_build_id));
        if !matches {
            return Err(Error::BuildIdMismatch {
                path: Path::new(path).to_path_buf(),
                expected: expected_build_id.clone(),
                found,
            });
        }
    }
    elf::min_executable_vaddr(&data)
}

/// **ParseElfSymbols(path, expected_build_id, sink)**. `sink` here is
/// simply the returned `Vec<Symbol>`; callers append it into the Dso's
/// symbol list.
pub fn parse_elf_symbols(
    path: &str,
    expected_build_id: Option<&BuildId>,
    interner: &mut NameInterner,
) -> Result<Vec<Symbol>> {
    let data = crate::apk::read_binary_bytes(path)?;
    if let Some(expected) = expected_build_id {
        if !expected.is_empty() {
            let found = elf::read_build_id(&data).ok();
            if !found.as_ref().is_some_and(|f| f.matches(expected)) {
                return Err(Error::BuildIdMismatch {
                    path: Path::new(path).to_path_buf(),
                    expected: expected.clone(),
                    found,
                });
            }
        }
    }
    elf::parse_symbols(&data, Path::new(path), interner)
}

/// **ParseDexSymbols(path, offsets, sink)**. Memory-maps `path` once and
/// parses every offset against that single mapping.
pub fn parse_dex_symbols(
    path: &str,
    offsets: &[u64],
    interner: &mut NameInterner,
) -> Result<Vec<Symbol>> {
    let data = crate::apk::read_binary_bytes(path)?;
    let mut symbols = Vec::new();
    for &offset in offsets {
        match dex::parse_dex_symbols(&data, offset, Path::new(path), interner) {
            Ok(mut found) => symbols.append(&mut found),
            Err(e) => {
                warn!("failed to parse DEX at offset {offset:#x} in {path}: {e}");
            }
        }
    }
    Ok(symbols)
}

/// **ParseKallsyms(text)**.
pub fn parse_kallsyms(text: &[u8], interner: &mut NameInterner) -> Vec<Symbol> {
    crate::kallsyms::parse_kallsyms(text, interner)
}
