// Copyright (c) 2017-2021 Fabian Schuiki

//! The trace writer facade
//!
//! [`TraceWriter`] ties a [`Vcd`] stream to the model callbacks that feed it.
//! The usual flow is to add callbacks, open a file, dump once per time step,
//! and close:
//!
//! ```no_run
//! use vcdtrace::TraceWriter;
//!
//! let mut w = TraceWriter::new();
//! w.add_callback_fns(
//!     |vcd, base| vcd.declare_bit(base, "top.clk", None),
//!     |vcd, base| vcd.full_bit(base, false),
//!     |vcd, base| vcd.chg_bit(base, true),
//! );
//! w.open("trace.vcd");
//! w.dump(0);
//! w.dump(10);
//! w.close();
//! ```

use crate::{
    callback::{CallbackRegistry, FnCallback, TraceCallback},
    file::{FsFile, TraceFile},
    registry,
    signal::{Code, Declaration},
    thread::AssertOneThread,
    vcd::Vcd,
};
use std::{
    io,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

/// A VCD trace writer driven by model callbacks.
///
/// The writer may be moved between threads, but only one thread may drive it
/// at a time. Call [`change_thread`](Self::change_thread) before driving it
/// from another thread.
pub struct TraceWriter {
    vcd: Arc<Mutex<Vcd>>,
    callbacks: CallbackRegistry,
    thread: AssertOneThread,
    id: usize,
}

impl TraceWriter {
    /// Create a writer that writes to the file system.
    pub fn new() -> Self {
        Self::with_file(FsFile::new())
    }

    /// Create a writer that writes through a custom file.
    pub fn with_file(file: impl TraceFile + Send + 'static) -> Self {
        Self::with_vcd(Vcd::new(file))
    }

    /// Create a writer around a configured stream.
    pub fn with_vcd(vcd: Vcd) -> Self {
        let vcd = Arc::new(Mutex::new(vcd));
        let id = registry::register(&vcd);
        TraceWriter {
            vcd,
            callbacks: CallbackRegistry::new(),
            thread: AssertOneThread::new(),
            id,
        }
    }

    fn lock(&self) -> MutexGuard<Vcd> {
        self.vcd.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Direct access to the underlying stream, for standalone use outside of
    /// the callback flow.
    ///
    /// Use [`open`](Self::open) on the writer rather than on the returned
    /// stream. Opening the stream directly skips the `init` hooks of the
    /// registered callbacks, so their signals would be missing from the
    /// header and any later dump of them would panic.
    pub fn vcd(&mut self) -> MutexGuard<Vcd> {
        self.thread.check();
        self.lock()
    }

    /// Register a model callback.
    ///
    /// Panics if the header has already been written.
    pub fn add_callback(&mut self, callback: impl TraceCallback + 'static) {
        self.thread.check();
        if self.lock().is_header_written() {
            panic!("trace callback added after the trace header was written");
        }
        self.callbacks.add(Box::new(callback));
    }

    /// Register a model callback made of three closures.
    pub fn add_callback_fns<I, F, C>(&mut self, init: I, full: F, change: C)
    where
        I: FnMut(&mut Vcd, Code) + Send + 'static,
        F: FnMut(&mut Vcd, Code) + Send + 'static,
        C: FnMut(&mut Vcd, Code) + Send + 'static,
    {
        self.add_callback(FnCallback::new(init, full, change));
    }

    /// Declare a signal directly.
    pub fn declare(&mut self, decl: &Declaration) {
        self.vcd().declare(decl);
    }

    /// Open a trace file.
    ///
    /// Runs the `init` hook of every callback that has not seen one yet, then
    /// writes the header. Does nothing if a file is already open.
    pub fn open(&mut self, filename: &str) {
        self.thread.check();
        let mut vcd = self.vcd.lock().unwrap_or_else(PoisonError::into_inner);
        if vcd.is_open() {
            return;
        }
        if !vcd.is_header_written() {
            self.callbacks.init_all(&mut vcd);
        }
        vcd.open(filename);
    }

    /// Close the current file and continue in the next one.
    pub fn open_next(&mut self, inc_filename: bool) {
        self.vcd().open_next(inc_filename);
    }

    /// Flush and close the file.
    pub fn close(&mut self) {
        self.vcd().close();
    }

    /// Write all buffered data to the file.
    pub fn flush(&mut self) {
        self.vcd().flush();
    }

    /// Check whether a file is open and accepting data.
    pub fn is_open(&self) -> bool {
        self.lock().is_open()
    }

    /// The kind and message of the error that closed the trace, if any.
    pub fn last_error(&self) -> Option<(io::ErrorKind, String)> {
        self.lock()
            .last_error()
            .map(|e| (e.kind(), e.to_string()))
    }

    /// Set the number of bytes after which a new file is started.
    pub fn set_rollover_size(&mut self, bytes: u64) {
        self.vcd().set_rollover_size(bytes);
    }

    /// Set the rollover size in megabytes.
    pub fn set_rollover_mb(&mut self, mb: u64) {
        self.vcd().set_rollover_mb(mb);
    }

    /// Set the time unit, e.g. `"1ns"`.
    pub fn set_time_unit(&mut self, unit: &str) {
        self.vcd().set_time_unit(unit);
    }

    /// Set the time resolution, e.g. `"1ps"`.
    pub fn set_time_resolution(&mut self, resolution: &str) {
        self.vcd().set_time_resolution(resolution);
    }

    /// Set the character that separates scopes in signal names.
    pub fn set_scope_escape(&mut self, c: char) {
        self.vcd().set_scope_escape(c);
    }

    /// Write EVCD instead of VCD.
    pub fn set_evcd(&mut self, evcd: bool) {
        self.vcd().set_evcd(evcd);
    }

    /// Set the module prefix for subsequent declarations.
    pub fn set_module(&mut self, name: &str) {
        self.vcd().set_module(name);
    }

    /// Dump all callbacks at `time`, in ticks of the resolution.
    ///
    /// The first dump after opening a file, and after each rollover, is a
    /// full dump. All others only write what changed. Does nothing if no file
    /// is open.
    pub fn dump(&mut self, time: u64) {
        self.thread.check();
        let mut vcd = self.vcd.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(full) = vcd.begin_dump(time) {
            self.callbacks.dump_all(&mut vcd, full);
            vcd.end_dump();
        }
    }

    /// Dump all callbacks at an absolute time in seconds.
    pub fn dump_seconds(&mut self, seconds: f64) {
        let time = self.lock().seconds_to_ticks(seconds);
        self.dump(time);
    }

    /// Allow the next call to come from a different thread.
    pub fn change_thread(&mut self) {
        self.thread.change_thread();
    }
}

impl Default for TraceWriter {
    fn default() -> Self {
        TraceWriter::new()
    }
}

impl Drop for TraceWriter {
    fn drop(&mut self) {
        registry::deregister(self.id);
        self.lock().close();
    }
}

/// Flush every live trace writer in the process.
pub fn flush_all() {
    let n = registry::flush_all();
    debug!("Flushed {} trace writers", n);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::MemFile;

    fn counter_writer(file: MemFile) -> (TraceWriter, Arc<Mutex<u32>>) {
        let count = Arc::new(Mutex::new(0u32));
        let (c1, c2) = (count.clone(), count.clone());
        let mut w = TraceWriter::with_file(file);
        w.vcd().set_date("today");
        w.add_callback_fns(
            |vcd, base| vcd.declare_bus(base, "top.count", None, 7, 0),
            move |vcd, base| vcd.full_bus(base, *c1.lock().unwrap()),
            move |vcd, base| vcd.chg_bus(base, *c2.lock().unwrap()),
        );
        (w, count)
    }

    #[test]
    fn dumps_through_callbacks() {
        let file = MemFile::new();
        let files = file.handle();
        let (mut w, count) = counter_writer(file);
        w.open("w.vcd");
        w.dump(0);
        *count.lock().unwrap() = 3;
        w.dump(5);
        w.dump(6);
        w.close();
        let out = files.contents("w.vcd");
        assert!(out.contains("$var wire  8 ! count [7:0] $end"));
        assert!(out.ends_with("#0\n$dumpvars\nb00000000 !\n$end\n#5\nb00000011 !\n#6\n"));
    }

    #[test]
    fn failed_open_makes_dumps_no_ops() {
        let (mut w, _count) = counter_writer(MemFile::new().failing_open());
        w.open("nope.vcd");
        assert!(!w.is_open());
        let (kind, _) = w.last_error().unwrap();
        assert_eq!(kind, io::ErrorKind::PermissionDenied);
        w.dump(0);
        w.flush();
        w.close();
    }

    #[test]
    #[should_panic(expected = "added after the trace header was written")]
    fn late_callbacks_panic() {
        let (mut w, _count) = counter_writer(MemFile::new());
        w.open("late.vcd");
        w.add_callback_fns(|_, _| (), |_, _| (), |_, _| ());
    }

    #[test]
    fn reopen_keeps_declarations() {
        let file = MemFile::new();
        let files = file.handle();
        let (mut w, _count) = counter_writer(file);
        w.open("a.vcd");
        w.dump(0);
        w.close();
        w.open("b.vcd");
        w.dump(1);
        w.close();
        let b = files.contents("b.vcd");
        assert!(b.contains("$var wire  8 ! count [7:0] $end"));
        assert!(b.ends_with("#1\n$dumpvars\nb00000000 !\n$end\n"));
        assert_eq!(w.vcd().signals().len(), 1);
    }

    #[test]
    fn only_the_writer_open_runs_init_hooks() {
        let file = MemFile::new();
        let files = file.handle();
        let (mut w, _count) = counter_writer(file);
        w.vcd().open("raw.vcd");
        assert_eq!(w.vcd().signals().len(), 0);
        w.close();
        assert!(!files.contents("raw.vcd").contains("count"));

        let file = MemFile::new();
        let files = file.handle();
        let (mut w, _count) = counter_writer(file);
        w.vcd().set_time_resolution("1ps");
        w.open("cooked.vcd");
        assert_eq!(w.vcd().signals().len(), 1);
        w.dump(0);
        w.close();
        let out = files.contents("cooked.vcd");
        assert!(out.contains("$var wire  8 ! count [7:0] $end"));
        assert!(out.ends_with("#0\n$dumpvars\nb00000000 !\n$end\n"));
    }
}
