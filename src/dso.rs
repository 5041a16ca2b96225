//! `Dso`: a lazily-loaded symbol table for one binary, polymorphic over
//! the five variants named in §3 (KERNEL, KERNEL_MODULE, ELF_FILE,
//! DEX_FILE, UNKNOWN).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use log::{debug, warn};

use crate::binary_reader;
use crate::build_id::BuildId;
use crate::debug_file_finder::DebugFileFinder;
use crate::interner::NameInterner;
use crate::symbol::{self, Symbol};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DsoType {
    Kernel,
    KernelModule,
    ElfFile,
    DexFile,
    Unknown,
}

/// Where a KERNEL Dso should source its symbols from, in priority order.
#[derive(Debug, Default)]
pub struct KernelSymbolSource {
    pub vmlinux_path: Option<PathBuf>,
    pub kallsyms_text: Option<Vec<u8>>,
    pub allow_proc_kallsyms: bool,
}

pub struct Dso {
    pub dso_type: DsoType,
    pub path: String,
    pub debug_file_path: PathBuf,
    pub file_name: String,
    pub force_64bit: bool,
    pub expected_build_id: Option<BuildId>,
    is_loaded: bool,
    symbols: Vec<Symbol>,
    unknown_symbols: BTreeMap<u64, Symbol>,
    min_vaddr: Option<u64>,
    dex_file_offsets: Vec<u64>,
    pub dump_id: Option<u32>,
    symbol_dump_id: u32,
}

impl Dso {
    /// `CreateDso(type, path, force_64bit)`. For ELF, `debug_file_path` is
    /// resolved immediately via `finder`.
    pub fn new(
        dso_type: DsoType,
        path: &str,
        force_64bit: bool,
        expected_build_id: Option<BuildId>,
        finder: &DebugFileFinder,
    ) -> Self {
        let file_name = Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string());

        let debug_file_path = if dso_type == DsoType::ElfFile {
            finder.find_debug_file(path, force_64bit, expected_build_id.as_ref())
        } else {
            PathBuf::from(path)
        };

        Dso {
            dso_type,
            path: path.to_string(),
            debug_file_path,
            file_name,
            force_64bit,
            expected_build_id,
            is_loaded: false,
            symbols: Vec::new(),
            unknown_symbols: BTreeMap::new(),
            min_vaddr: None,
            dex_file_offsets: Vec::new(),
            dump_id: None,
            symbol_dump_id: 0,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.is_loaded
    }

    pub fn dex_file_offsets(&self) -> Option<&[u64]> {
        (self.dso_type == DsoType::DexFile).then_some(&self.dex_file_offsets[..])
    }

    /// Reclassifies an ELF Dso to DEX when the unwinder discovers the
    /// mapping actually hosts Dalvik bytecode.
    pub fn add_dex_file_offset(&mut self, offset: u64) {
        if self.dso_type == DsoType::ElfFile {
            self.dso_type = DsoType::DexFile;
            self.is_loaded = false;
            self.symbols.clear();
        }
        self.dex_file_offsets.push(offset);
    }

    /// `MinVirtualAddress()`, ELF variant only. Caches 0 on failure and
    /// logs a warning, as specified.
    pub fn min_virtual_address(&mut self) -> u64 {
        if let Some(cached) = self.min_vaddr {
            return cached;
        }
        let expected = self.expected_build_id.clone().unwrap_or_else(BuildId::empty);
        let vaddr = binary_reader::read_min_executable_vaddr(&self.debug_file_path_str(), &expected)
            .unwrap_or_else(|e| {
                warn!("MinVirtualAddress failed for {}: {e}", self.path);
                0
            });
        self.min_vaddr = Some(vaddr);
        vaddr
    }

    fn debug_file_path_str(&self) -> String {
        self.debug_file_path.to_string_lossy().into_owned()
    }

    /// `FindSymbol(vaddr)`. Loads lazily on first call.
    pub fn find_symbol(
        &mut self,
        vaddr: u64,
        interner: &mut NameInterner,
        kernel_source: &KernelSymbolSource,
    ) -> Option<&Symbol> {
        if !self.is_loaded {
            self.load_symbols(interner, kernel_source);
        }
        if let idx @ Some(_) = symbol::find_symbol(&self.symbols, vaddr) {
            return idx;
        }
        self.unknown_symbols.get(&vaddr)
    }

    fn load_symbols(&mut self, interner: &mut NameInterner, kernel_source: &KernelSymbolSource) {
        debug!("loading symbols for {} ({:?})", self.path, self.dso_type);
        let freshly_loaded = match self.dso_type {
            DsoType::ElfFile => binary_reader::parse_elf_symbols(
                &self.debug_file_path_str(),
                self.expected_build_id.as_ref(),
                interner,
            )
            .unwrap_or_else(|e| {
                warn!("failed to load ELF symbols for {}: {e}", self.path);
                Vec::new()
            }),
            DsoType::KernelModule => binary_reader::parse_elf_symbols(
                &self.debug_file_path_str(),
                self.expected_build_id.as_ref(),
                interner,
            )
            .unwrap_or_else(|e| {
                warn!("failed to load kernel module symbols for {}: {e}", self.path);
                Vec::new()
            }),
            DsoType::Kernel => self.load_kernel_symbols(interner, kernel_source),
            DsoType::DexFile => binary_reader::parse_dex_symbols(
                &self.debug_file_path_str(),
                &self.dex_file_offsets,
                interner,
            )
            .unwrap_or_else(|e| {
                warn!("failed to load DEX symbols for {}: {e}", self.path);
                Vec::new()
            }),
            DsoType::Unknown => Vec::new(),
        };

        self.symbols.extend(freshly_loaded);
        symbol::sort_and_fix(&mut self.symbols);

        if self.dso_type == DsoType::Kernel {
            if let Some(last) = self.symbols.last_mut() {
                last.len = u64::MAX - last.addr;
            }
        }

        for symbol in &mut self.symbols {
            symbol.dump_id = Some(self.symbol_dump_id);
            self.symbol_dump_id += 1;
        }

        self.is_loaded = true;
    }

    fn load_kernel_symbols(
        &self,
        interner: &mut NameInterner,
        source: &KernelSymbolSource,
    ) -> Vec<Symbol> {
        if let Some(vmlinux) = &source.vmlinux_path {
            match binary_reader::parse_elf_symbols(&vmlinux.to_string_lossy(), None, interner) {
                Ok(symbols) => return symbols,
                Err(e) => warn!("failed to parse vmlinux {}: {e}", vmlinux.display()),
            }
        }
        if let Some(text) = &source.kallsyms_text {
            return binary_reader::parse_kallsyms(text, interner);
        }
        if source.allow_proc_kallsyms {
            if let Ok(text) = std::fs::read("/proc/kallsyms") {
                return binary_reader::parse_kallsyms(&text, interner);
            }
        }
        Vec::new()
    }

    /// Records a symbol resolved by a collaborator outside the normal
    /// symbol-table walk (e.g. a synthetic JIT/DEX stub name).
    pub fn insert_unknown_symbol(&mut self, vaddr: u64, name: Rc<str>) {
        self.unknown_symbols
            .entry(vaddr)
            .or_insert_with(|| Symbol::new(vaddr, 0, name));
    }
}

impl std::fmt::Debug for Dso {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dso")
            .field("dso_type", &self.dso_type)
            .field("path", &self.path)
            .field("is_loaded", &self.is_loaded)
            .field("symbol_count", &self.symbols.len())
            .finish()
    }
}
