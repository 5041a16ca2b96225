//! The data model emitted to callers (§3 "Sample (emitted)" /
//! "CallChainEntry" / "SymbolEntry").

use std::rc::Rc;

/// One resolved stack frame.
#[derive(Debug, Clone)]
pub struct SymbolEntry {
    pub dso_name: String,
    pub vaddr_in_file: u64,
    pub symbol_name: Option<Rc<str>>,
    pub symbol_addr: Option<u64>,
    pub symbol_len: Option<u64>,
    /// Index into the per-sample [`Mapping`] arena this frame was resolved
    /// against, cleared and rebuilt at the start of every sample.
    pub mapping_ref: usize,
}

#[derive(Debug, Clone)]
pub struct CallChainEntry {
    pub ip: u64,
    pub resolved: SymbolEntry,
}

/// A per-sample arena entry describing the mapping a frame's `mapping_ref`
/// points into; rebuilt fresh for every sample so references never
/// outlive the sample they were computed for.
#[derive(Debug, Clone)]
pub struct Mapping {
    pub start_addr: u64,
    pub len: u64,
    pub dso_path: String,
}

#[derive(Debug, Clone)]
pub struct Sample {
    pub ip: u64,
    pub pid: i32,
    pub tid: i32,
    pub thread_comm: String,
    pub time: u64,
    pub in_kernel: bool,
    pub cpu: u32,
    pub period: u64,
    pub current_symbol: SymbolEntry,
    pub call_chain: Vec<CallChainEntry>,
    pub mappings: Vec<Mapping>,
}
