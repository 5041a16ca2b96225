//! Symbolization and sample-iteration engine for Linux/Android
//! `perf.data`-style profiling recordings.
//!
//! Given a record file plus the debug-symbol configuration (`symfs`
//! directory, vdso overrides, optional vmlinux/kallsyms sources), this
//! crate resolves every sampled instruction pointer to a symbol name,
//! tracking per-process address-space history over time so that a
//! sample taken at time `T` is resolved against the mapping that was
//! actually live at `T`, not whatever mapping currently occupies that
//! address range.
//!
//! The pipeline, roughly in call order:
//!
//! - [`sample_stream::SampleStream`] drives a [`linux_perf_data::PerfFileReader`]
//!   and keeps a [`thread_tree::ThreadTree`] up to date as fork/exit/comm/mmap
//!   records go by.
//! - [`thread_tree::ThreadTree`] answers "which mapping covered this address
//!   on this thread at this time", backed by a time-sliced
//!   [`rangemap::RangeMap`] per thread.
//! - [`context::Context`] owns the process-wide [`dso::Dso`] registry, the
//!   name interner, and the IP-to-in-file-vaddr translation.
//! - [`dso::Dso`] lazily loads a binary's symbol table (ELF, DEX, APK-embedded
//!   DEX, kernel image, or kernel module) on first lookup.
//! - [`frame_policy`] elides ART-interpreter frames adjacent to DEX frames
//!   before handing a resolved call chain back to the caller.
//!
//! This crate does not decode DWARF line tables, unwind registers, or
//! interpret any record kind beyond what's needed to maintain the
//! process/thread/mapping view — see each module's documentation for its
//! specific scope.

pub mod apk;
pub mod binary_reader;
pub mod build_id;
pub mod context;
pub mod debug_file_finder;
pub mod demangle;
pub mod dex;
pub mod dso;
pub mod elf;
pub mod error;
pub mod frame_policy;
pub mod interner;
pub mod kallsyms;
pub mod map_entry;
pub mod sample;
pub mod sample_stream;
pub mod symbol;
pub mod thread_tree;

pub use error::{Error, Result};
