//! `/proc/kallsyms`-format text parsing. Grounded directly on
//! `linux_shared/kernel_symbols.rs`'s `KallSymIter`/`parse_kallsyms`, but
//! generalized per spec §4.1 operation 5: admit a line iff its type
//! character is one of `T t W w` and its address is non-zero (the teacher's
//! version anchors everything relative to a `_text` symbol for its own
//! profile-building purposes; this engine instead hands back absolute
//! addresses and leaves anchoring to the caller, since `ParseKallsyms` is
//! specified as a standalone operation with no `_text`-relative contract).

use std::rc::Rc;

use crate::interner::NameInterner;
use crate::symbol::Symbol;

struct KallSymIter<'a> {
    remaining_data: &'a [u8],
}

impl<'a> KallSymIter<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            remaining_data: data,
        }
    }
}

impl<'a> Iterator for KallSymIter<'a> {
    type Item = (u64, u8, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.remaining_data.is_empty() {
                return None;
            }
            let line_end = memchr::memchr(b'\n', self.remaining_data)
                .unwrap_or(self.remaining_data.len());
            let (line, rest) = self.remaining_data.split_at(line_end);
            self.remaining_data = rest.get(1..).unwrap_or(&[]);

            let mut fields = line
                .split(|&b| b == b' ' || b == b'\t')
                .filter(|f| !f.is_empty());
            let Some(addr_field) = fields.next() else { continue };
            let Some(type_field) = fields.next() else { continue };
            let Some(name_field) = fields.next() else { continue };
            let Some(&type_char) = type_field.first() else { continue };
            if type_field.len() != 1 {
                continue;
            }
            let Some(addr) = hex_str(addr_field) else { continue };
            return Some((addr, type_char, name_field));
        }
    }
}

fn hex_str(input: &[u8]) -> Option<u64> {
    if input.is_empty() {
        return None;
    }
    let mut value: u64 = 0;
    for &b in input {
        let digit = (b as char).to_digit(16)?;
        value = value.checked_shl(4)?.checked_add(digit as u64)?;
    }
    Some(value)
}

/// Parses `kallsyms`-format text, admitting lines whose type character is
/// one of `T t W w` and whose address is non-zero. Emitted symbols all have
/// `len == 0`; the caller runs [`crate::symbol::sort_and_fix`].
pub fn parse_kallsyms(text: &[u8], interner: &mut NameInterner) -> Vec<Symbol> {
    let mut symbols = Vec::new();
    for (addr, type_char, name) in KallSymIter::new(text) {
        if addr == 0 {
            continue;
        }
        if !matches!(type_char, b'T' | b't' | b'W' | b'w') {
            continue;
        }
        let name = String::from_utf8_lossy(name);
        let interned: Rc<str> = interner.intern(&name);
        symbols.push(Symbol::new(addr, 0, interned));
    }
    symbols
}
