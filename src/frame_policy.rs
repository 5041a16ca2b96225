//! `FramePolicy` (§4.6): walks one sample's raw call chain, elides
//! ART-interpreter frames adjacent to DEX frames, and resolves every
//! surviving frame to a [`crate::sample::SymbolEntry`].
//!
//! Grounded on the `AndroidArtInfo::{LibArt, JavaFrame}` distinction in
//! `samply`'s `shared/lib_mappings.rs`: that file already tags mappings
//! this way but never wires a suppression pass on top of the tag. This
//! module is that suppression pass.

use crate::context::Context;
use crate::dso::DsoType;
use crate::map_entry::MapEntry;
use crate::sample::{CallChainEntry, Mapping, SymbolEntry};

const LIBART_SUFFIX: &str = "/libart.so";

fn is_interpreter(map: &MapEntry) -> bool {
    map.dso.borrow().path.ends_with(LIBART_SUFFIX)
}

fn is_dex(map: &MapEntry) -> bool {
    map.dso.borrow().dso_type == DsoType::DexFile
}

struct ResolvedFrame {
    ip: u64,
    map: MapEntry,
}

/// Filters `frames` (already resolved to an optional `MapEntry` each, by
/// the caller's thread-tree lookup) per the near-Java state machine, then
/// resolves symbols for the survivors. Returns `None` if every frame was
/// unresolvable (no MapEntry at all) — the caller falls back to its own
/// "unknown" sentinel sample.
pub fn apply(
    frames: &[(u64, Option<MapEntry>)],
    art_suppression_enabled: bool,
    context: &mut Context,
) -> Option<(u64, SymbolEntry, Vec<CallChainEntry>, Vec<Mapping>)> {
    let mut survivors: Vec<ResolvedFrame> = Vec::new();
    let mut near_java = false;

    for (ip, map_opt) in frames {
        let Some(map) = map_opt else { continue };

        if art_suppression_enabled && is_dex(map) {
            near_java = true;
            while matches!(survivors.last(), Some(f) if is_interpreter(&f.map)) {
                survivors.pop();
            }
            survivors.push(ResolvedFrame { ip: *ip, map: map.clone() });
            continue;
        }

        if art_suppression_enabled && near_java && is_interpreter(map) {
            continue;
        }

        near_java = false;
        survivors.push(ResolvedFrame { ip: *ip, map: map.clone() });
    }

    if survivors.is_empty() {
        return None;
    }

    let mut mappings = Vec::with_capacity(survivors.len());
    let mut entries = Vec::with_capacity(survivors.len());
    for frame in &survivors {
        let (vaddr_in_file, symbol) = context.find_symbol(&frame.map, frame.ip);
        let dso_name = frame.map.dso.borrow().file_name.clone();
        let mapping_ref = mappings.len();
        mappings.push(Mapping {
            start_addr: frame.map.start_addr,
            len: frame.map.len,
            dso_path: frame.map.dso.borrow().path.clone(),
        });
        entries.push(CallChainEntry {
            ip: frame.ip,
            resolved: SymbolEntry {
                dso_name,
                vaddr_in_file,
                symbol_name: symbol.as_ref().map(|s| s.name.clone()),
                symbol_addr: symbol.as_ref().map(|s| s.addr),
                symbol_len: symbol.as_ref().map(|s| s.len),
                mapping_ref,
            },
        });
    }

    let current_ip = entries[0].ip;
    let current_symbol = entries[0].resolved.clone();
    let call_chain = entries.split_off(1);
    Some((current_ip, current_symbol, call_chain, mappings))
}
