//! `SampleStream` (§4.5): pulls records off a `perf.data`-format
//! recording, drives [`ThreadTree`] state from every record, buffers one
//! pending sample per tid for off-CPU duration, and emits a fully
//! resolved [`Sample`] per [`SampleStream::next_sample`] call.
//!
//! Grounded directly on `import/perf.rs`'s `convert_impl`: same
//! `PerfFileReader`/`EventRecord::{Sample,Fork,Comm,Exit,Mmap,Mmap2}`
//! dispatch, same build-id-feature priming via `build_ids()`, same
//! callchain-context-marker handling via `PERF_CONTEXT_KERNEL`/
//! `PERF_CONTEXT_USER`/`PERF_CONTEXT_MAX` from
//! `linux_perf_event_reader::constants`. Where `import/perf.rs` feeds a
//! `fxprof_processed_profile::Profile`, this module feeds one `Sample` at
//! a time back to its caller instead.

use std::collections::HashMap;
use std::io::{Read, Seek};

use linux_perf_data::linux_perf_event_reader;
use linux_perf_data::{DsoInfo, DsoKey, PerfFile, PerfFileReader, PerfFileRecord, PerfRecordIter};
use linux_perf_event_reader::constants::{PERF_CONTEXT_KERNEL, PERF_CONTEXT_MAX, PERF_CONTEXT_USER};
use linux_perf_event_reader::{
    CommOrExecRecord, CpuMode, EventRecord, ForkOrExitRecord, Mmap2FileId, Mmap2Record, MmapRecord, SampleRecord,
};
use log::warn;

use crate::build_id::BuildId;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::frame_policy;
use crate::map_entry::MapEntry;
use crate::sample::Sample;
use crate::thread_tree::{Record, ThreadTree};

/// One sample's worth of raw, not-yet-symbolized state, held in
/// `next_sample_cache` until its off-CPU duration is known.
struct PendingSample {
    pid: i32,
    tid: i32,
    time: u64,
    cpu: u32,
    period: Option<u64>,
    ips: Vec<u64>,
    kernel_ip_count: usize,
}

impl PendingSample {
    fn from_record(e: &SampleRecord) -> Option<Self> {
        let pid = e.pid?;
        let tid = e.tid?;
        let time = e.timestamp?;
        let (ips, kernel_ip_count) = collect_ips(e);
        Some(PendingSample {
            pid,
            tid,
            time,
            cpu: e.cpu.unwrap_or(0),
            period: e.period,
            ips,
            kernel_ip_count,
        })
    }
}

/// Walks `e.callchain`, stripping `PERF_CONTEXT_*` markers and tracking
/// how many of the leading frames precede the first `PERF_CONTEXT_USER`
/// switch (i.e. are kernel addresses), falling back to `e.ip` when there
/// is no callchain at all.
fn is_kernel_mode(mode: CpuMode) -> bool {
    matches!(mode, CpuMode::Kernel | CpuMode::GuestKernel)
}

fn collect_ips(e: &SampleRecord) -> (Vec<u64>, usize) {
    let mut ips = Vec::new();
    let mut kernel_ip_count = 0;
    let mut in_kernel = is_kernel_mode(e.cpu_mode);

    if let Some(callchain) = e.callchain {
        for i in 0..callchain.len() {
            let Some(address) = callchain.get(i) else { continue };
            if address >= PERF_CONTEXT_MAX {
                if address == PERF_CONTEXT_KERNEL {
                    in_kernel = true;
                } else if address == PERF_CONTEXT_USER {
                    in_kernel = false;
                }
                continue;
            }
            if in_kernel && ips.len() == kernel_ip_count {
                kernel_ip_count += 1;
            }
            ips.push(address);
        }
    }

    if ips.is_empty() {
        if let Some(ip) = e.ip {
            ips.push(ip);
            if is_kernel_mode(e.cpu_mode) {
                kernel_ip_count = 1;
            }
        }
    }

    (ips, kernel_ip_count)
}

/// Wraps `linux_perf_data::PerfFileReader`, presenting the record stream
/// as a sequence of resolved [`Sample`]s.
///
/// `PerfFileReader` splits into a metadata half (`perf_file`) and an
/// iteration half (`record_iter`) that borrows it mutably per call, so the
/// two live as separate fields rather than behind one shared owner.
pub struct SampleStream<R: Read + Seek> {
    perf_file: PerfFile,
    record_iter: PerfRecordIter<R>,
    opened: bool,
    trace_offcpu: bool,
    event_type_info: Option<String>,
    tree: ThreadTree,
    next_sample_cache: HashMap<i32, PendingSample>,
}

impl<R: Read + Seek> SampleStream<R> {
    pub fn new(source: R) -> Result<Self> {
        let PerfFileReader { perf_file, record_iter } =
            PerfFileReader::parse_file(source).map_err(Error::RecordFile)?;
        Ok(SampleStream {
            perf_file,
            record_iter,
            opened: false,
            trace_offcpu: false,
            event_type_info: None,
            tree: ThreadTree::new(),
            next_sample_cache: HashMap::new(),
        })
    }

    /// On first use, registers every build-id feature entry and reads
    /// `trace_offcpu`/`event_type_info` out of the simpleperf meta-info
    /// feature section.
    fn ensure_open(&mut self, context: &mut Context) -> Result<()> {
        if self.opened {
            return Ok(());
        }
        self.opened = true;

        let build_ids: HashMap<DsoKey, DsoInfo> = self.perf_file.build_ids().map_err(Error::RecordFile)?;
        for (key, info) in build_ids {
            context.registry.register_build_id(key.name(), BuildId::from_bytes(&info.build_id));
        }

        if let Some(meta) = self.perf_file.simpleperf_meta_info().map_err(Error::RecordFile)? {
            self.trace_offcpu = meta.get("trace_offcpu").map(|v| *v == "true").unwrap_or(false);
            self.event_type_info = meta.get("event_type_info").map(|v| v.to_string());
        }

        Ok(())
    }

    pub fn trace_offcpu(&self) -> bool {
        self.trace_offcpu
    }

    pub fn event_type_info(&self) -> Option<&str> {
        self.event_type_info.as_deref()
    }

    /// `NextSample()`: returns the next enriched sample, or `None` once
    /// the record stream is exhausted. Non-sample records are consumed
    /// internally to advance [`ThreadTree`] state and never reach the
    /// caller.
    pub fn next_sample(&mut self, context: &mut Context, art_suppression_enabled: bool) -> Result<Option<Sample>> {
        self.ensure_open(context)?;

        loop {
            let Some(raw) = self.record_iter.next_record(&mut self.perf_file).map_err(Error::RecordFile)? else {
                return Ok(None);
            };
            let (record, parsed) = match raw {
                PerfFileRecord::EventRecord { record, .. } => match record.parse() {
                    Ok(parsed) => (record, parsed),
                    Err(_) => continue,
                },
                PerfFileRecord::UserRecord(_) => continue,
            };
            let timestamp = record.timestamp().unwrap_or(0);

            match parsed {
                EventRecord::Fork(e) => self.apply_fork(e, context),
                EventRecord::Exit(e) => self.apply_exit(e, context),
                EventRecord::Comm(e) => {
                    let pid = e.pid;
                    let tid = e.tid;
                    let name = String::from_utf8_lossy(&e.name.as_slice()).into_owned();
                    self.apply_comm(pid, tid, name, timestamp, context);
                }
                EventRecord::Mmap(e) => {
                    if e.is_executable {
                        let pid = e.pid;
                        let tid = e.tid;
                        let start_addr = e.address;
                        let len = e.length;
                        let pgoff = e.page_offset;
                        let path = String::from_utf8_lossy(&e.path.as_slice()).into_owned();
                        self.apply_mmap(pid, tid, start_addr, len, pgoff, path, timestamp, context);
                    }
                }
                EventRecord::Mmap2(e) => {
                    const PROT_EXEC: u32 = 0b100;
                    if e.protection & PROT_EXEC != 0 {
                        let pid = e.pid;
                        let tid = e.tid;
                        let start_addr = e.address;
                        let len = e.length;
                        let pgoff = e.page_offset;
                        let path = String::from_utf8_lossy(&e.path.as_slice()).into_owned();
                        let build_id = match &e.file_id {
                            Mmap2FileId::BuildId(build_id) => Some(BuildId::from_bytes(build_id)),
                            Mmap2FileId::InodeAndVersion(_) => None,
                        };
                        self.apply_mmap2(pid, tid, start_addr, len, pgoff, path, build_id, timestamp, context);
                    }
                }
                EventRecord::Sample(e) => {
                    let Some(pending) = PendingSample::from_record(&e) else { continue };
                    if let Some(sample) = self.resolve_sample(pending, context, art_suppression_enabled)? {
                        return Ok(Some(sample));
                    }
                }
                _ => {}
            }
        }
    }

    fn apply_fork(&mut self, e: ForkOrExitRecord, context: &mut Context) {
        self.tree.update(
            &Record::Fork { pid: e.pid, ppid: e.ppid, tid: e.tid, ptid: e.ptid, time: e.timestamp },
            &mut context.registry,
        );
    }

    fn apply_exit(&mut self, e: ForkOrExitRecord, context: &mut Context) {
        self.tree.update(
            &Record::Exit { pid: e.pid, tid: e.tid, time: e.timestamp },
            &mut context.registry,
        );
    }

    fn apply_comm(&mut self, pid: i32, tid: i32, name: String, timestamp: u64, context: &mut Context) {
        self.tree.update(
            &Record::Comm { pid, tid, name, time: timestamp },
            &mut context.registry,
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_mmap(
        &mut self,
        pid: i32,
        tid: i32,
        start_addr: u64,
        len: u64,
        pgoff: u64,
        path: String,
        timestamp: u64,
        context: &mut Context,
    ) {
        self.tree.update(
            &Record::Mmap { pid, tid, start_addr, len, pgoff, path, build_id: None, time: timestamp },
            &mut context.registry,
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_mmap2(
        &mut self,
        pid: i32,
        tid: i32,
        start_addr: u64,
        len: u64,
        pgoff: u64,
        path: String,
        build_id: Option<BuildId>,
        timestamp: u64,
        context: &mut Context,
    ) {
        self.tree.update(
            &Record::Mmap { pid, tid, start_addr, len, pgoff, path, build_id, time: timestamp },
            &mut context.registry,
        );
    }

    /// Applies the off-CPU cache-and-swap rule, then resolves whichever
    /// sample was chosen through [`frame_policy::apply`].
    fn resolve_sample(
        &mut self,
        pending: PendingSample,
        context: &mut Context,
        art_suppression_enabled: bool,
    ) -> Result<Option<Sample>> {
        let chosen = if self.trace_offcpu {
            match self.next_sample_cache.remove(&pending.tid) {
                None => {
                    self.next_sample_cache.insert(pending.tid, pending);
                    return Ok(None);
                }
                Some(cached) => {
                    // `cached` is the sample we're about to emit; `pending`
                    // (the newly arrived record) only supplies the "time of
                    // the next sample on this tid" used to derive its period,
                    // then takes `cached`'s place in the cache.
                    let period = pending.time.max(cached.time + 1) - cached.time;
                    self.next_sample_cache.insert(pending.tid, pending);
                    (cached, period)
                }
            }
        } else {
            let period = pending.period.unwrap_or(1);
            (pending, period)
        };
        let (pending, period) = chosen;

        let frames: Vec<(u64, Option<MapEntry>)> = pending
            .ips
            .iter()
            .enumerate()
            .map(|(i, ip)| {
                let in_kernel = i < pending.kernel_ip_count;
                let map = self
                    .tree
                    .find_map(pending.pid, pending.tid, *ip, pending.time, in_kernel)
                    .cloned();
                (*ip, map)
            })
            .collect();

        let Some((ip, current_symbol, call_chain, mappings)) = frame_policy::apply(&frames, art_suppression_enabled, context) else {
            warn!("sample at pid={} tid={} resolved to no usable frame", pending.pid, pending.tid);
            return Ok(None);
        };

        let thread_comm = self
            .tree
            .find_thread(pending.pid, pending.tid)
            .map(|t| t.comm.clone())
            .unwrap_or_default();

        Ok(Some(Sample {
            ip,
            pid: pending.pid,
            tid: pending.tid,
            thread_comm,
            time: pending.time,
            in_kernel: pending.kernel_ip_count > 0,
            cpu: pending.cpu,
            period,
            current_symbol,
            call_chain,
            mappings,
        }))
    }
}
