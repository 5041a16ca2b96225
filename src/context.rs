//! Process-wide state (§3 "Process-wide state"): the demangle flag,
//! optional vmlinux/kallsyms sources, the build-id map, the Dso registry
//! (keyed by path so that distinct mappings of the same binary share one
//! `Dso`), and the name interner.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use log::debug;

use crate::build_id::BuildId;
use crate::debug_file_finder::DebugFileFinder;
use crate::dso::{Dso, DsoType, KernelSymbolSource};
use crate::interner::NameInterner;
use crate::map_entry::MapEntry;
use crate::symbol::Symbol;

/// Creates (or reuses) `Dso` handles by path. Distinct `MapEntry`s for the
/// same path share one `Dso`, per §3's ownership rule.
#[derive(Default)]
pub struct DsoRegistry {
    finder: DebugFileFinder,
    build_id_map: HashMap<String, BuildId>,
    dsos: HashMap<String, Rc<RefCell<Dso>>>,
}

fn classify(path: &str) -> DsoType {
    if path.starts_with("[kernel.kallsyms]") || path == "[kernel]" {
        DsoType::Kernel
    } else if path.ends_with(".ko") || path.contains("[kernel.kallsyms]_") {
        DsoType::KernelModule
    } else if path.is_empty() || path.starts_with('[') && path != "[vdso]" {
        DsoType::Unknown
    } else {
        DsoType::ElfFile
    }
}

impl DsoRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn debug_file_finder_mut(&mut self) -> &mut DebugFileFinder {
        &mut self.finder
    }

    pub fn register_build_id(&mut self, path: &str, build_id: BuildId) {
        self.build_id_map.insert(path.to_string(), build_id);
    }

    /// Returns the shared `Dso` handle for `path`, creating it (and
    /// resolving its debug file immediately, for ELF) on first use.
    pub fn dso_for_mapping(&mut self, path: &str, build_id_hint: Option<BuildId>) -> Rc<RefCell<Dso>> {
        if let Some(existing) = self.dsos.get(path) {
            return Rc::clone(existing);
        }
        let expected_build_id = build_id_hint.or_else(|| self.build_id_map.get(path).cloned());
        let dso_type = classify(path);
        debug!("creating Dso for {path} as {dso_type:?}");
        let dso = Rc::new(RefCell::new(Dso::new(
            dso_type,
            path,
            false,
            expected_build_id,
            &self.finder,
        )));
        self.dsos.insert(path.to_string(), Rc::clone(&dso));
        dso
    }

    /// The sentinel `Dso` a lookup falls back to when no real mapping
    /// covers an address; never persisted in the registry.
    pub fn unknown_dso(&self) -> Rc<RefCell<Dso>> {
        Rc::new(RefCell::new(Dso::new(
            DsoType::Unknown,
            "",
            false,
            None,
            &self.finder,
        )))
    }

    pub fn live_dso_count(&self) -> usize {
        self.dsos.values().filter(|d| Rc::strong_count(d) > 1).count()
    }
}

pub struct Context {
    pub demangle_enabled: bool,
    pub kernel_source: KernelSymbolSource,
    pub registry: DsoRegistry,
    pub interner: NameInterner,
    dump_id: u32,
}

impl Default for Context {
    fn default() -> Self {
        Context {
            demangle_enabled: true,
            kernel_source: KernelSymbolSource::default(),
            registry: DsoRegistry::new(),
            interner: NameInterner::new(),
            dump_id: 0,
        }
    }
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_symfs_dir(&mut self, dir: &Path) -> crate::error::Result<()> {
        self.registry.debug_file_finder_mut().set_symfs_dir(dir)
    }

    pub fn set_vdso_paths(&mut self, vdso_32: Option<PathBuf>, vdso_64: Option<PathBuf>) {
        self.registry.debug_file_finder_mut().set_vdso_paths(vdso_32, vdso_64);
    }

    pub fn set_vmlinux_path(&mut self, path: Option<PathBuf>) {
        self.kernel_source.vmlinux_path = path;
    }

    pub fn set_kallsyms_text(&mut self, text: Option<Vec<u8>>) {
        self.kernel_source.kallsyms_text = text;
    }

    pub fn set_allow_proc_kallsyms(&mut self, allow: bool) {
        self.kernel_source.allow_proc_kallsyms = allow;
    }

    pub fn next_dump_id(&mut self) -> u32 {
        let id = self.dump_id;
        self.dump_id += 1;
        id
    }

    /// Translates `ip` within `map` to an in-file vaddr (subtracting the
    /// ELF's minimum executable vaddr and applying the mapping's page
    /// offset correction) and resolves the covering `Symbol`, if any.
    pub fn find_symbol(&mut self, map: &MapEntry, ip: u64) -> (u64, Option<SymbolSnapshot>) {
        let mut dso = map.dso.borrow_mut();
        let min_vaddr = if dso.dso_type == DsoType::ElfFile {
            dso.min_virtual_address()
        } else {
            0
        };
        let vaddr_in_file = ip
            .wrapping_sub(map.start_addr)
            .wrapping_add(map.pgoff)
            .wrapping_sub(min_vaddr);

        let symbol = dso
            .find_symbol(vaddr_in_file, &mut self.interner, &self.kernel_source)
            .map(|s| SymbolSnapshot {
                addr: s.addr,
                len: s.len,
                name: s.demangled_name(&mut self.interner, self.demangle_enabled),
            });
        (vaddr_in_file, symbol)
    }
}

/// An owned snapshot of the parts of a resolved [`Symbol`] a caller needs,
/// decoupled from the `Dso`'s borrow so it can outlive the lookup.
#[derive(Debug, Clone)]
pub struct SymbolSnapshot {
    pub addr: u64,
    pub len: u64,
    pub name: Rc<str>,
}

impl From<&Symbol> for SymbolSnapshot {
    fn from(s: &Symbol) -> Self {
        SymbolSnapshot {
            addr: s.addr,
            len: s.len,
            name: Rc::clone(&s.name),
        }
    }
}
