use std::cell::OnceCell;
use std::rc::Rc;

use crate::demangle;
use crate::interner::NameInterner;

/// One symbol table entry inside a loaded [`crate::dso::Dso`].
///
/// Within a Dso's sorted symbol list, symbols are ordered by `addr`
/// ascending. `len == 0` is a placeholder patched by [`sort_and_fix`].
#[derive(Debug, Clone)]
pub struct Symbol {
    pub addr: u64,
    pub len: u64,
    pub name: Rc<str>,
    demangled_name: OnceCell<Rc<str>>,
    pub dump_id: Option<u32>,
}

impl Symbol {
    pub fn new(addr: u64, len: u64, name: Rc<str>) -> Self {
        Symbol {
            addr,
            len,
            name,
            demangled_name: OnceCell::new(),
            dump_id: None,
        }
    }

    /// The demangled form of `name`, computed lazily on first access and
    /// cached. `demangle_enabled = false` returns the mangled name
    /// unmodified (and does not populate the cache with anything other
    /// than the mangled name itself).
    pub fn demangled_name(&self, interner: &mut NameInterner, demangle_enabled: bool) -> Rc<str> {
        if !demangle_enabled {
            return Rc::clone(&self.name);
        }
        Rc::clone(self.demangled_name.get_or_init(|| {
            let demangled = demangle::demangle(&self.name);
            interner.intern(&demangled)
        }))
    }

    pub fn end_addr(&self) -> u64 {
        self.addr.saturating_add(self.len)
    }

    pub fn covers(&self, vaddr: u64) -> bool {
        self.addr <= vaddr && vaddr < self.end_addr()
    }
}

/// Stable-sorts `symbols` by `addr`, then patches each zero-length symbol's
/// `len` to the distance to its successor (when the successor's address is
/// strictly greater). The final symbol of a KERNEL Dso is stretched to
/// `u64::MAX - addr` by the caller, not by this function, since only the
/// Dso knows its own variant.
///
/// If `symbols` already contains entries from a previous load, duplicates
/// are resolved by keeping the first occurrence of any `(addr, len, name)`
/// triple produced by set-union merge semantics (the tie-break the spec
/// leaves as an open question).
pub fn sort_and_fix(symbols: &mut Vec<Symbol>) {
    symbols.sort_by_key(|s| s.addr);

    let mut seen = std::collections::HashSet::new();
    symbols.retain(|s| seen.insert((s.addr, s.len, Rc::clone(&s.name))));

    let len = symbols.len();
    for i in 0..len {
        if symbols[i].len == 0 {
            if let Some(next) = symbols.get(i + 1) {
                if next.addr > symbols[i].addr {
                    symbols[i].len = next.addr - symbols[i].addr;
                }
            }
        }
    }
}

/// Binary-searches `symbols` (assumed sorted by `addr`) for the largest
/// symbol with `addr <= vaddr`, returning it only if `vaddr` also falls
/// within its length.
pub fn find_symbol(symbols: &[Symbol], vaddr: u64) -> Option<&Symbol> {
    let idx = match symbols.binary_search_by_key(&vaddr, |s| s.addr) {
        Ok(idx) => idx,
        Err(0) => return None,
        Err(idx) => idx - 1,
    };
    let symbol = &symbols[idx];
    symbol.covers(vaddr).then_some(symbol)
}
