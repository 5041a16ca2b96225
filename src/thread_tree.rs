//! `ThreadTree`: the per-pid/tid process view. Applies fork/exit/comm/mmap
//! records and answers "which `MapEntry` covered address A on thread T at
//! time T?".
//!
//! `sample_stream.rs` translates the four record kinds this engine reads
//! off `linux_perf_data::linux_perf_event_reader::EventRecord` (grounded
//! on how `linux_shared::converter::Converter::handle_mmap`/`handle_mmap2`/
//! `handle_fork`/`handle_exit` do the same translation) into the [`Record`]
//! values this module actually consumes, keeping this module's tests free
//! of the real record-file reader.

use std::collections::HashMap;
use std::ops::Range;
use std::rc::Rc;

use rangemap::RangeMap;

use crate::build_id::BuildId;
use crate::context::DsoRegistry;
use crate::map_entry::MapEntry;

#[derive(Debug, Clone)]
pub enum Record {
    Fork { pid: i32, ppid: i32, tid: i32, ptid: i32, time: u64 },
    Exit { pid: i32, tid: i32, time: u64 },
    Comm { pid: i32, tid: i32, name: String, time: u64 },
    Mmap {
        pid: i32,
        tid: i32,
        start_addr: u64,
        len: u64,
        pgoff: u64,
        path: String,
        build_id: Option<BuildId>,
        time: u64,
    },
}

#[derive(Debug, Default)]
pub struct ThreadEntry {
    pub pid: i32,
    pub tid: i32,
    pub comm: String,
    pub is_dead: bool,
    maps: RangeMap<u64, Vec<MapEntry>>,
}

impl ThreadEntry {
    fn new(pid: i32, tid: i32) -> Self {
        ThreadEntry {
            pid,
            tid,
            comm: String::new(),
            is_dead: false,
            maps: RangeMap::new(),
        }
    }

    /// Installs `entry` over its address range, preserving every mapping
    /// that previously occupied an overlapping byte so that a later
    /// `find_map` query at an earlier `time` still resolves correctly.
    fn install_mapping(&mut self, entry: MapEntry) {
        let range: Range<u64> = entry.start_addr..entry.end_addr();
        if range.start >= range.end {
            return;
        }
        let overlaps: Vec<(Range<u64>, Vec<MapEntry>)> = self
            .maps
            .overlapping(&range)
            .map(|(r, v)| (r.clone(), v.clone()))
            .collect();

        let mut cursor = range.start;
        for (r, v) in overlaps {
            let seg_start = r.start.max(range.start);
            let seg_end = r.end.min(range.end);
            if seg_start > cursor {
                self.maps.insert(cursor..seg_start, vec![entry.clone()]);
            }
            let mut new_v = v;
            new_v.push(entry.clone());
            self.maps.insert(seg_start..seg_end, new_v);
            cursor = seg_end;
        }
        if cursor < range.end {
            self.maps.insert(cursor..range.end, vec![entry.clone()]);
        }
    }

    /// `FindMap(ip, time)`: the most recently installed mapping covering
    /// `ip` whose `time_installed <= time`.
    pub fn find_map(&self, ip: u64, time: u64) -> Option<&MapEntry> {
        let (_, candidates) = self.maps.get_key_value(&ip)?;
        candidates
            .iter()
            .rev()
            .find(|entry| entry.time_installed <= time && entry.contains(ip))
    }
}

#[derive(Debug, Default)]
pub struct ThreadTree {
    threads: HashMap<(i32, i32), ThreadEntry>,
    process_tids: HashMap<i32, Vec<i32>>,
}

impl ThreadTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// `FindThreadOrNew(pid, tid)`.
    pub fn find_thread_or_new(&mut self, pid: i32, tid: i32) -> &mut ThreadEntry {
        self.threads.entry((pid, tid)).or_insert_with(|| {
            self.process_tids.entry(pid).or_default().push(tid);
            ThreadEntry::new(pid, tid)
        })
    }

    pub fn find_thread(&self, pid: i32, tid: i32) -> Option<&ThreadEntry> {
        self.threads.get(&(pid, tid))
    }

    /// `FindMap(thread, ip, in_kernel)`: kernel mmaps arrive tagged with
    /// `pid == -1` (the kernel image is the same for every process), so a
    /// kernel-space lookup is always served from the synthetic `(-1, -1)`
    /// thread rather than the sampled thread's own table.
    pub fn find_map(&self, pid: i32, tid: i32, ip: u64, time: u64, in_kernel: bool) -> Option<&MapEntry> {
        let key = if in_kernel { (-1, -1) } else { (pid, tid) };
        self.threads.get(&key)?.find_map(ip, time)
    }

    /// `Update(record)`. Dispatches on the four record kinds this engine
    /// maintains process/thread/mapping state from. `registry` resolves
    /// (and, on first use of a path, creates) the shared `Dso` handle a
    /// `Mmap` record's path refers to.
    pub fn update(&mut self, record: &Record, registry: &mut DsoRegistry) {
        match record {
            Record::Fork { pid, ppid, tid, ptid, .. } => self.handle_fork(*pid, *ppid, *tid, *ptid),
            Record::Exit { pid, tid, .. } => self.handle_exit(*pid, *tid),
            Record::Comm { pid, tid, name, .. } => self.handle_comm(*pid, *tid, name),
            Record::Mmap {
                pid,
                tid,
                start_addr,
                len,
                pgoff,
                path,
                build_id,
                time,
            } => self.handle_mmap(
                *pid, *tid, *start_addr, *len, *pgoff, path, build_id.clone(), *time, registry,
            ),
        }
    }

    fn handle_fork(&mut self, pid: i32, ppid: i32, tid: i32, ptid: i32) {
        let parent_maps = (pid == ppid)
            .then(|| self.threads.get(&(ppid, ptid)).map(|t| t.maps.clone()))
            .flatten();
        let entry = self.find_thread_or_new(pid, tid);
        if let Some(maps) = parent_maps {
            entry.maps = maps;
        }
    }

    fn handle_exit(&mut self, pid: i32, tid: i32) {
        if let Some(entry) = self.threads.get_mut(&(pid, tid)) {
            entry.is_dead = true;
        }
    }

    fn handle_comm(&mut self, pid: i32, tid: i32, name: &str) {
        self.find_thread_or_new(pid, tid).comm = name.to_string();
    }

    /// Mappings are process-wide: install the new entry into every live
    /// thread of `pid`, each thread keeping its own copy of the mapping
    /// table (mirrors how the teacher's `Process` owns one mapping set
    /// shared across its `ThreadProfiler`s).
    #[allow(clippy::too_many_arguments)]
    fn handle_mmap(
        &mut self,
        pid: i32,
        tid: i32,
        start_addr: u64,
        len: u64,
        pgoff: u64,
        path: &str,
        build_id: Option<BuildId>,
        time: u64,
        registry: &mut DsoRegistry,
    ) {
        self.find_thread_or_new(pid, tid);
        let dso = registry.dso_for_mapping(path, build_id);
        let entry = MapEntry {
            start_addr,
            len,
            pgoff,
            time_installed: time,
            dso,
        };
        if let Some(tids) = self.process_tids.get(&pid).cloned() {
            for other_tid in tids {
                if let Some(thread) = self.threads.get_mut(&(pid, other_tid)) {
                    thread.install_mapping(entry.clone());
                }
            }
        }
    }
}
