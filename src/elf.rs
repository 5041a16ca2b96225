//! ELF parsing: build-id, minimum executable virtual address, and symbol
//! table walking. Grounded on `kernel_symbols::kernel_module_build_id`'s
//! `object::File::parse` + `.build_id()` pattern (simpler than hand-rolling
//! an `NT_GNU_BUILD_ID` note walk) and on `lib/src/shared.rs`'s
//! `.symbols().filter(|s| s.kind() == SymbolKind::Text)` idiom.

use object::read::ObjectSegment;
use object::{Object, ObjectSection, ObjectSymbol, SectionKind, SegmentFlags, SymbolKind};

use crate::build_id::BuildId;
use crate::error::{Error, Result};
use crate::interner::NameInterner;
use crate::symbol::Symbol;

const PF_X: u32 = 0x1;

/// Reads the `NT_GNU_BUILD_ID` note from ELF bytes already in memory
/// (either a whole file's mmap, or an APK zip entry's decompressed bytes).
pub fn read_build_id(data: &[u8]) -> Result<BuildId> {
    let obj = object::File::parse(data)?;
    match obj.build_id() {
        Ok(Some(build_id)) => Ok(BuildId::from_bytes(build_id)),
        Ok(None) => Err(Error::FileMalformed("no NT_GNU_BUILD_ID note")),
        Err(e) => Err(Error::ObjectParseError(e)),
    }
}

/// The lowest `p_vaddr` among LOAD segments with `PF_X` set. Zero if no
/// executable LOAD segment exists. `object`'s `ObjectSegment` abstraction
/// already restricts `.segments()` to LOAD-equivalent program headers.
pub fn min_executable_vaddr(data: &[u8]) -> Result<u64> {
    let obj = object::File::parse(data)?;
    let mut min_vaddr = None;
    for segment in obj.segments() {
        let is_executable = match segment.flags() {
            SegmentFlags::Elf { p_flags } => p_flags & PF_X != 0,
            _ => false,
        };
        if is_executable {
            let addr = segment.address();
            min_vaddr = Some(match min_vaddr {
                Some(current) if current <= addr => current,
                _ => addr,
            });
        }
    }
    Ok(min_vaddr.unwrap_or(0))
}

/// Walks `.symtab` if present, otherwise `.dynsym`. Emits every `STT_FUNC`
/// symbol, and every `STT_NOTYPE` symbol whose section is the text
/// section. `path` is used only to annotate the `NO_SYMBOL_TABLE` error.
pub fn parse_symbols(
    data: &[u8],
    path: &std::path::Path,
    interner: &mut NameInterner,
) -> Result<Vec<Symbol>> {
    let obj = object::File::parse(data)?;

    let text_section_index = obj
        .sections()
        .find(|s| s.kind() == SectionKind::Text)
        .map(|s| s.index());

    let has_symtab = obj.symbols().next().is_some();
    let iter: Box<dyn Iterator<Item = object::read::Symbol<'_, '_>>> = if has_symtab {
        Box::new(obj.symbols())
    } else if obj.dynamic_symbols().next().is_some() {
        Box::new(obj.dynamic_symbols())
    } else {
        return Err(Error::NoSymbolTable(path.to_path_buf()));
    };

    let mut symbols = Vec::new();
    for symbol in iter {
        let is_func = symbol.kind() == SymbolKind::Text;
        // `object` maps STT_NOTYPE to `SymbolKind::Unknown`.
        let is_label = symbol.kind() == SymbolKind::Unknown;
        let is_in_text_section = text_section_index
            .is_some_and(|idx| symbol.section_index() == Some(idx));

        if !is_func && !(is_label && is_in_text_section) {
            continue;
        }
        let Ok(name) = symbol.name() else { continue };
        if name.is_empty() {
            continue;
        }
        let interned = interner.intern(name);
        symbols.push(Symbol::new(symbol.address(), symbol.size(), interned));
    }
    Ok(symbols)
}

/// Like [`parse_symbols`] but only ever accepts `STT_FUNC` symbols, used by
/// the KERNEL variant when a `vmlinux` image is configured (§4.3: "parse it
/// as ELF accepting only STT_FUNC").
pub fn parse_function_symbols_only(data: &[u8], interner: &mut NameInterner) -> Result<Vec<Symbol>> {
    let obj = object::File::parse(data)?;
    let mut symbols = Vec::new();
    for symbol in obj.symbols() {
        if symbol.kind() != SymbolKind::Text {
            continue;
        }
        let Ok(name) = symbol.name() else { continue };
        if name.is_empty() {
            continue;
        }
        let interned = interner.intern(name);
        symbols.push(Symbol::new(symbol.address(), symbol.size(), interned));
    }
    Ok(symbols)
}

/// Reused by the KERNEL_MODULE variant (§4.3: "ELF parse accepting
/// STT_FUNC or text-section labels"). Identical acceptance rule to
/// [`parse_symbols`]; kept as a distinct name so call sites read like the
/// spec's per-variant rule list.
pub fn parse_kernel_module_symbols(
    data: &[u8],
    path: &std::path::Path,
    interner: &mut NameInterner,
) -> Result<Vec<Symbol>> {
    parse_symbols(data, path, interner)
}
