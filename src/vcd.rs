// Copyright (c) 2017-2021 Fabian Schuiki

//! The VCD stream
//!
//! [`Vcd`] owns everything a trace needs: the signal table, the old value
//! store, the write buffer, and the file. It implements declaration, the full
//! and change dump paths for every width class, and the open/close/rollover
//! life cycle of the output file.
//!
//! I/O errors never escape from here. A failed open or write is logged, the
//! file is closed, and all further dumps do nothing until the next successful
//! [`open`](Vcd::open). Check [`is_open`](Vcd::is_open) to see whether tracing
//! still works.

use crate::{
    buffer::WriteBuffer,
    encode::{self, IdentTable},
    file::TraceFile,
    header,
    signal::{Code, Declaration, Signal, SignalKind, SignalTable},
    store::OldValueStore,
    time::TimeBase,
};
use std::io;

/// The active state of a VCD trace.
pub struct Vcd {
    file: Box<dyn TraceFile + Send>,
    filename: String,
    is_open: bool,
    last_error: Option<io::Error>,
    rollover_size: u64,
    wrote_bytes: u64,

    signals: SignalTable,
    store: OldValueStore,
    buffer: WriteBuffer,
    idents: IdentTable,
    time: TimeBase,
    date: Option<String>,

    header_written: bool,
    full_dump: bool,
    dumped_vars: bool,
    in_dump: bool,
    in_full_block: bool,
    last_time: Option<u64>,
    warned_backwards: bool,
}

/// The storage layout of a signal, copied out of the signal table so the hot
/// paths do not hold a borrow of it.
#[derive(Copy, Clone)]
struct Slot {
    bits: usize,
    words: usize,
    mask: u32,
}

impl Slot {
    #[inline]
    fn quad_mask(self) -> u64 {
        if self.bits >= 64 {
            !0
        } else {
            (1u64 << self.bits) - 1
        }
    }
}

impl Vcd {
    /// Create a closed trace that writes through `file`.
    pub fn new(file: impl TraceFile + Send + 'static) -> Self {
        Vcd::with_chunk(file, crate::buffer::DEFAULT_CHUNK)
    }

    /// Create a closed trace whose write buffer starts out with `chunk` byte
    /// chunks instead of the default.
    pub fn with_chunk(file: impl TraceFile + Send + 'static, chunk: usize) -> Self {
        Vcd {
            file: Box::new(file),
            filename: String::new(),
            is_open: false,
            last_error: None,
            rollover_size: 0,
            wrote_bytes: 0,
            signals: SignalTable::new(),
            store: OldValueStore::new(),
            buffer: WriteBuffer::with_chunk(chunk),
            idents: IdentTable::default(),
            time: TimeBase::new(),
            date: None,
            header_written: false,
            full_dump: true,
            dumped_vars: false,
            in_dump: false,
            in_full_block: false,
            last_time: None,
            warned_backwards: false,
        }
    }

    // Configuration

    /// Set the number of bytes after which a new file is started. Zero
    /// disables rollover.
    pub fn set_rollover_size(&mut self, bytes: u64) {
        self.rollover_size = bytes;
    }

    /// Set the rollover size in megabytes.
    pub fn set_rollover_mb(&mut self, mb: u64) {
        self.set_rollover_size(mb.saturating_mul(1024 * 1024));
    }

    /// The number of bytes after which a new file is started.
    pub fn rollover_size(&self) -> u64 {
        self.rollover_size
    }

    /// Set the character that separates scopes in signal names.
    pub fn set_scope_escape(&mut self, c: char) {
        self.signals.set_scope_escape(c);
    }

    /// Write EVCD instead of VCD.
    pub fn set_evcd(&mut self, evcd: bool) {
        self.signals.set_evcd(evcd);
    }

    /// Set the module prefix for subsequent declarations.
    pub fn set_module(&mut self, name: &str) {
        self.signals.set_module(name);
    }

    /// Set the time unit, e.g. `"1ns"`.
    pub fn set_time_unit(&mut self, unit: &str) {
        self.time.set_unit(unit);
    }

    /// Set the time resolution, e.g. `"10ps"`.
    pub fn set_time_resolution(&mut self, resolution: &str) {
        self.time.set_resolution(resolution);
    }

    /// Fix the text of the `$date` header line instead of using the current
    /// local time.
    pub fn set_date(&mut self, date: &str) {
        self.date = Some(date.to_owned());
    }

    /// The time unit and resolution.
    pub fn time_base(&self) -> &TimeBase {
        &self.time
    }

    // Queries

    /// Check whether a file is open and accepting data.
    pub fn is_open(&self) -> bool {
        self.is_open
    }

    /// The error that closed the trace, if any.
    pub fn last_error(&self) -> Option<&io::Error> {
        self.last_error.as_ref()
    }

    /// The name of the current file.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// The number of bytes flushed to the current file.
    pub fn bytes_written(&self) -> u64 {
        self.wrote_bytes
    }

    /// The bytes waiting to be flushed.
    pub fn buffer(&self) -> &WriteBuffer {
        &self.buffer
    }

    /// The declared signals.
    pub fn signals(&self) -> &SignalTable {
        &self.signals
    }

    /// The next free code.
    pub fn next_code(&self) -> Code {
        self.signals.next_code()
    }

    /// The old value words of a signal.
    pub fn old_value(&self, code: Code) -> &[u32] {
        let words = match self.signals.get(code) {
            Some(s) => s.words(),
            None => panic!("no signal declared at code {}", code),
        };
        self.store.words(code, words)
    }

    /// Check whether the header has been written and declarations are
    /// closed.
    pub fn is_header_written(&self) -> bool {
        self.header_written
    }

    // Declaration

    /// Declare a signal.
    ///
    /// Panics if the header has already been written.
    pub fn declare(&mut self, decl: &Declaration) {
        if self.header_written {
            panic!(
                "signal `{}` declared at {} after the trace header was written",
                decl.name, decl.code
            );
        }
        let bits = self.signals.declare(decl).bits;
        // Leave room for one line of this signal: one character per bit plus
        // the identifier and punctuation.
        self.buffer.resize(bits + 1024);
    }

    /// Declare a single bit.
    pub fn declare_bit(&mut self, code: Code, name: &str, array: Option<i32>) {
        self.declare_simple(code, name, SignalKind::Bit, array, false, 0, 0);
    }

    /// Declare a bus of up to 32 bits.
    pub fn declare_bus(&mut self, code: Code, name: &str, array: Option<i32>, msb: i32, lsb: i32) {
        self.declare_simple(code, name, SignalKind::Bus, array, false, msb, lsb);
    }

    /// Declare a bus of up to 64 bits.
    pub fn declare_quad(&mut self, code: Code, name: &str, array: Option<i32>, msb: i32, lsb: i32) {
        self.declare_simple(code, name, SignalKind::Quad, array, false, msb, lsb);
    }

    /// Declare a bus of arbitrary width.
    pub fn declare_array(
        &mut self,
        code: Code,
        name: &str,
        array: Option<i32>,
        msb: i32,
        lsb: i32,
    ) {
        self.declare_simple(code, name, SignalKind::Array, array, false, msb, lsb);
    }

    /// Declare a 32 bit real.
    pub fn declare_float(&mut self, code: Code, name: &str, array: Option<i32>) {
        self.declare_simple(code, name, SignalKind::Float, array, false, 31, 0);
    }

    /// Declare a 64 bit real.
    pub fn declare_double(&mut self, code: Code, name: &str, array: Option<i32>) {
        self.declare_simple(code, name, SignalKind::Double, array, false, 63, 0);
    }

    /// Declare a tri-state bit.
    pub fn declare_tri_bit(&mut self, code: Code, name: &str, array: Option<i32>) {
        self.declare_simple(code, name, SignalKind::Bit, array, true, 0, 0);
    }

    /// Declare a tri-state bus of up to 32 bits.
    pub fn declare_tri_bus(
        &mut self,
        code: Code,
        name: &str,
        array: Option<i32>,
        msb: i32,
        lsb: i32,
    ) {
        self.declare_simple(code, name, SignalKind::Bus, array, true, msb, lsb);
    }

    /// Declare a tri-state bus of up to 64 bits.
    pub fn declare_tri_quad(
        &mut self,
        code: Code,
        name: &str,
        array: Option<i32>,
        msb: i32,
        lsb: i32,
    ) {
        self.declare_simple(code, name, SignalKind::Quad, array, true, msb, lsb);
    }

    /// Declare a tri-state bus of arbitrary width.
    pub fn declare_tri_array(
        &mut self,
        code: Code,
        name: &str,
        array: Option<i32>,
        msb: i32,
        lsb: i32,
    ) {
        self.declare_simple(code, name, SignalKind::Array, array, true, msb, lsb);
    }

    #[allow(clippy::too_many_arguments)]
    fn declare_simple(
        &mut self,
        code: Code,
        name: &str,
        kind: SignalKind,
        array_index: Option<i32>,
        tri: bool,
        msb: i32,
        lsb: i32,
    ) {
        let bussed = match kind {
            SignalKind::Bus | SignalKind::Quad | SignalKind::Array => true,
            _ => false,
        };
        self.declare(&Declaration {
            code,
            name,
            kind,
            array_index,
            tri,
            bussed,
            msb,
            lsb,
        });
    }

    // File life cycle

    /// Open a trace file and write the header.
    ///
    /// Only signals declared so far make it into the header. Callbacks
    /// registered with a [`TraceWriter`](crate::TraceWriter) declare theirs
    /// when the writer is opened, not here.
    ///
    /// Does nothing if a file is already open. On failure the trace stays
    /// closed; check [`is_open`](Self::is_open). With rollover enabled, the
    /// header goes into `<name>_cat0000.<ext>` and the data follows in
    /// `_cat0001`, `_cat0002`, and so on.
    pub fn open(&mut self, filename: &str) {
        if self.is_open {
            return;
        }
        self.filename = filename.to_owned();
        self.last_time = None;
        self.dumped_vars = false;
        self.open_file(self.rollover_size != 0);
        if !self.is_open {
            return;
        }
        self.write_header();
        if self.rollover_size != 0 {
            self.open_file(true);
        }
    }

    /// Close the current file and continue the trace in the next one.
    ///
    /// If `inc_filename` is set, the name's numeric `_catNNNN` suffix is
    /// incremented (or added). The header is not repeated, so concatenating
    /// all files yields one trace. Does nothing if no header has been written.
    pub fn open_next(&mut self, inc_filename: bool) {
        if !self.header_written {
            warn!("Cannot continue a trace that was never opened");
            return;
        }
        self.open_file(inc_filename);
    }

    /// Flush, write any trailer, and close the file.
    ///
    /// Closing a closed trace does nothing.
    pub fn close(&mut self) {
        if !self.is_open {
            return;
        }
        if self.signals.is_evcd() {
            self.print("$vcdclose #");
            encode::write_decimal(&mut self.buffer, self.last_time.unwrap_or(0));
            self.print(" $end\n");
        }
        self.close_prev();
        info!("Closed trace `{}`", self.filename);
    }

    /// Write all buffered data to the file.
    ///
    /// Starts the next file if the rollover size has been exceeded, unless
    /// called in the middle of a dump, in which case the next dump rolls over.
    pub fn flush(&mut self) {
        self.flush_buffer();
        if !self.in_dump && self.rollover_due() {
            self.open_file(true);
        }
    }

    fn rollover_due(&self) -> bool {
        self.is_open
            && self.rollover_size != 0
            && !self.filename.is_empty()
            && self.wrote_bytes > self.rollover_size
    }

    fn open_file(&mut self, inc_filename: bool) {
        self.close_prev();
        if inc_filename {
            self.filename = next_filename(&self.filename);
        }
        // A new file never inherits bytes meant for a dead one.
        self.buffer.clear();
        match self.file.open(&self.filename) {
            Ok(()) => {
                info!("Tracing to `{}`", self.filename);
                self.is_open = true;
                self.last_error = None;
                self.full_dump = true;
                self.wrote_bytes = 0;
            }
            Err(e) => {
                error!("Cannot open trace file `{}`: {}", self.filename, e);
                self.is_open = false;
                self.last_error = Some(e);
            }
        }
    }

    fn close_prev(&mut self) {
        if !self.is_open {
            return;
        }
        self.flush_buffer();
        self.is_open = false;
        self.file.close();
    }

    fn flush_buffer(&mut self) {
        if !self.is_open {
            self.buffer.clear();
            return;
        }
        match self.buffer.write_to(&mut *self.file) {
            Ok(n) => self.wrote_bytes += n as u64,
            Err(e) => {
                error!("Cannot write trace file `{}`: {}", self.filename, e);
                self.is_open = false;
                self.file.close();
                self.last_error = Some(e);
            }
        }
    }

    fn write_header(&mut self) {
        let date = match self.date {
            Some(ref d) => d.clone(),
            None => format!("{}", ::time::now().ctime()),
        };
        let version = format!(
            "$version Generated by vcdtrace {} $end\n",
            env!("CARGO_PKG_VERSION")
        );
        self.print(&version);
        self.print(&format!("$date {} $end\n", date));
        self.print(&format!("$timescale {} $end\n", self.time.timescale()));

        let names = self.signals.take_names();
        header::write_scopes(&names, &mut |line| self.print(line));
        self.signals.restore_names(names);

        self.header_written = true;
        self.store.allocate(self.signals.next_code().index());
        if self.idents.len() != self.signals.next_code().index() {
            self.idents = IdentTable::build(self.signals.next_code().index());
        }
        debug!(
            "Trace header written: {} signals in {} words",
            self.signals.len(),
            self.store.len()
        );
    }

    // Dumping

    /// Start a dump cycle at `time`.
    ///
    /// Returns `None` if the trace is closed, otherwise whether this cycle
    /// must be a full dump. Every started cycle must be finished with
    /// [`end_dump`](Self::end_dump).
    pub fn begin_dump(&mut self, time: u64) -> Option<bool> {
        if !self.is_open {
            return None;
        }
        if self.rollover_due() {
            self.open_file(true);
            if !self.is_open {
                return None;
            }
        }
        self.in_dump = true;
        self.write_time(time);
        let full = std::mem::replace(&mut self.full_dump, false);
        if full {
            if self.dumped_vars {
                self.print("$dumpall\n");
            } else {
                self.print("$dumpvars\n");
                self.dumped_vars = true;
            }
            self.in_full_block = true;
        }
        Some(full)
    }

    /// Finish a dump cycle.
    pub fn end_dump(&mut self) {
        let in_full_block = std::mem::replace(&mut self.in_full_block, false);
        if in_full_block && self.is_open {
            self.print("$end\n");
        }
        self.in_dump = false;
    }

    /// Request that the next dump cycle be a full dump.
    pub fn request_full_dump(&mut self) {
        self.full_dump = true;
    }

    /// Convert absolute seconds into ticks of the resolution.
    pub fn seconds_to_ticks(&self, seconds: f64) -> u64 {
        self.time.ticks(seconds)
    }

    fn write_time(&mut self, time: u64) {
        let time = match self.last_time {
            Some(last) if time < last => {
                if !self.warned_backwards {
                    self.warned_backwards = true;
                    warn!(
                        "Trace time moved backwards from {} to {}; wave file may be incorrect",
                        last, time
                    );
                }
                last
            }
            _ => time,
        };
        if self.last_time == Some(time) {
            return;
        }
        self.last_time = Some(time);
        self.buffer.push(b'#');
        encode::write_decimal(&mut self.buffer, time);
        self.buffer.push(b'\n');
        self.check();
    }

    fn print(&mut self, text: &str) {
        self.buffer.extend(text.as_bytes());
        self.check();
    }

    #[inline]
    fn check(&mut self) {
        if self.buffer.needs_flush() {
            self.flush_buffer();
        }
    }

    #[inline]
    fn end_line(&mut self, code: Code) {
        match self.idents.get(code) {
            Some(ident) => self.buffer.extend(ident),
            None => encode::write_code(&mut self.buffer, code),
        }
        self.buffer.push(b'\n');
        self.check();
    }

    #[inline]
    fn slot(&self, code: Code, kind: SignalKind, tri: bool) -> Slot {
        match self.signals.get(code) {
            Some(s) if s.kind == kind && s.tri == tri => Slot {
                bits: s.bits,
                words: s.words(),
                mask: s.top_mask(),
            },
            Some(s) => mismatch(s, kind, tri),
            None => panic!("no signal declared at code {}", code),
        }
    }

    // Full dumps

    /// Dump a bit.
    pub fn full_bit(&mut self, code: Code, value: bool) {
        if !self.is_open {
            return;
        }
        self.slot(code, SignalKind::Bit, false);
        self.emit_bit(code, value);
    }

    /// Dump a bus of up to 32 bits.
    pub fn full_bus(&mut self, code: Code, value: u32) {
        if !self.is_open {
            return;
        }
        let slot = self.slot(code, SignalKind::Bus, false);
        self.emit_bus(code, slot, value);
    }

    /// Dump a bus of up to 64 bits.
    pub fn full_quad(&mut self, code: Code, value: u64) {
        if !self.is_open {
            return;
        }
        let slot = self.slot(code, SignalKind::Quad, false);
        self.emit_quad(code, slot, value);
    }

    /// Dump a wide bus given as little-endian 32 bit words.
    pub fn full_array(&mut self, code: Code, value: &[u32]) {
        if !self.is_open {
            return;
        }
        let slot = self.slot(code, SignalKind::Array, false);
        check_len(code, value, slot.words);
        self.emit_array(code, slot, value);
    }

    /// Dump a 32 bit real.
    pub fn full_float(&mut self, code: Code, value: f32) {
        if !self.is_open {
            return;
        }
        self.slot(code, SignalKind::Float, false);
        self.emit_float(code, value);
    }

    /// Dump a 64 bit real.
    pub fn full_double(&mut self, code: Code, value: f64) {
        if !self.is_open {
            return;
        }
        self.slot(code, SignalKind::Double, false);
        self.emit_double(code, value);
    }

    /// Dump a tri-state bit. `tri` set means not driven.
    pub fn full_tri_bit(&mut self, code: Code, value: bool, tri: bool) {
        if !self.is_open {
            return;
        }
        self.slot(code, SignalKind::Bit, true);
        self.emit_tri_bit(code, value, tri);
    }

    /// Dump a tri-state bus of up to 32 bits. Set bits in `tri` are not
    /// driven.
    pub fn full_tri_bus(&mut self, code: Code, value: u32, tri: u32) {
        if !self.is_open {
            return;
        }
        let slot = self.slot(code, SignalKind::Bus, true);
        self.emit_tri_bus(code, slot, value, tri);
    }

    /// Dump a tri-state bus of up to 64 bits.
    pub fn full_tri_quad(&mut self, code: Code, value: u64, tri: u64) {
        if !self.is_open {
            return;
        }
        let slot = self.slot(code, SignalKind::Quad, true);
        self.emit_tri_quad(code, slot, value, tri);
    }

    /// Dump a wide tri-state bus.
    pub fn full_tri_array(&mut self, code: Code, value: &[u32], tri: &[u32]) {
        if !self.is_open {
            return;
        }
        let slot = self.slot(code, SignalKind::Array, true);
        check_len(code, value, slot.words / 2);
        check_len(code, tri, slot.words / 2);
        self.emit_tri_array(code, slot, value, tri);
    }

    // Unknown dumps. These leave the old value untouched, so the caller must
    // use a `full_*` dump once the signal is known again.

    /// Dump a bit as unknown.
    pub fn full_bit_x(&mut self, code: Code) {
        self.emit_x(code, SignalKind::Bit);
    }

    /// Dump a bus as unknown.
    pub fn full_bus_x(&mut self, code: Code) {
        self.emit_x(code, SignalKind::Bus);
    }

    /// Dump a 64 bit bus as unknown.
    pub fn full_quad_x(&mut self, code: Code) {
        self.emit_x(code, SignalKind::Quad);
    }

    /// Dump a wide bus as unknown.
    pub fn full_array_x(&mut self, code: Code) {
        self.emit_x(code, SignalKind::Array);
    }

    // Change dumps

    /// Dump a bit if it changed.
    #[inline]
    pub fn chg_bit(&mut self, code: Code, value: bool) {
        if !self.is_open {
            return;
        }
        self.slot(code, SignalKind::Bit, false);
        if (self.store.word(code) ^ value as u32) & 1 != 0 {
            self.emit_bit(code, value);
        }
    }

    /// Dump a bus if any of its declared bits changed.
    #[inline]
    pub fn chg_bus(&mut self, code: Code, value: u32) {
        if !self.is_open {
            return;
        }
        let slot = self.slot(code, SignalKind::Bus, false);
        if (self.store.word(code) ^ value) & slot.mask != 0 {
            self.emit_bus(code, slot, value);
        }
    }

    /// Dump a 64 bit bus if any of its declared bits changed.
    #[inline]
    pub fn chg_quad(&mut self, code: Code, value: u64) {
        if !self.is_open {
            return;
        }
        let slot = self.slot(code, SignalKind::Quad, false);
        if (self.store.quad(code) ^ value) & slot.quad_mask() != 0 {
            self.emit_quad(code, slot, value);
        }
    }

    /// Dump a wide bus if any of its declared bits changed.
    #[inline]
    pub fn chg_array(&mut self, code: Code, value: &[u32]) {
        if !self.is_open {
            return;
        }
        let slot = self.slot(code, SignalKind::Array, false);
        check_len(code, value, slot.words);
        let old = self.store.words(code, slot.words);
        let top = slot.words - 1;
        let changed = (0..slot.words).any(|i| {
            let diff = old[i] ^ value[i];
            if i == top {
                diff & slot.mask != 0
            } else {
                diff != 0
            }
        });
        if changed {
            self.emit_array(code, slot, value);
        }
    }

    /// Dump a 32 bit real if its bit pattern changed.
    #[inline]
    pub fn chg_float(&mut self, code: Code, value: f32) {
        if !self.is_open {
            return;
        }
        self.slot(code, SignalKind::Float, false);
        if self.store.word(code) != value.to_bits() {
            self.emit_float(code, value);
        }
    }

    /// Dump a 64 bit real if its bit pattern changed.
    #[inline]
    pub fn chg_double(&mut self, code: Code, value: f64) {
        if !self.is_open {
            return;
        }
        self.slot(code, SignalKind::Double, false);
        if self.store.quad(code) != value.to_bits() {
            self.emit_double(code, value);
        }
    }

    /// Dump a tri-state bit if its value or drive changed.
    #[inline]
    pub fn chg_tri_bit(&mut self, code: Code, value: bool, tri: bool) {
        if !self.is_open {
            return;
        }
        self.slot(code, SignalKind::Bit, true);
        let old = self.store.words(code, 2);
        if ((old[0] ^ value as u32) | (old[1] ^ tri as u32)) & 1 != 0 {
            self.emit_tri_bit(code, value, tri);
        }
    }

    /// Dump a tri-state bus if any declared value or drive bit changed.
    #[inline]
    pub fn chg_tri_bus(&mut self, code: Code, value: u32, tri: u32) {
        if !self.is_open {
            return;
        }
        let slot = self.slot(code, SignalKind::Bus, true);
        let old = self.store.words(code, 2);
        if ((old[0] ^ value) | (old[1] ^ tri)) & slot.mask != 0 {
            self.emit_tri_bus(code, slot, value, tri);
        }
    }

    /// Dump a tri-state 64 bit bus if any declared value or drive bit
    /// changed.
    #[inline]
    pub fn chg_tri_quad(&mut self, code: Code, value: u64, tri: u64) {
        if !self.is_open {
            return;
        }
        let slot = self.slot(code, SignalKind::Quad, true);
        let old = self.store.words(code, 4);
        let old_value = (old[0] as u64) | ((old[2] as u64) << 32);
        let old_tri = (old[1] as u64) | ((old[3] as u64) << 32);
        if ((old_value ^ value) | (old_tri ^ tri)) & slot.quad_mask() != 0 {
            self.emit_tri_quad(code, slot, value, tri);
        }
    }

    /// Dump a wide tri-state bus if any declared value or drive bit changed.
    #[inline]
    pub fn chg_tri_array(&mut self, code: Code, value: &[u32], tri: &[u32]) {
        if !self.is_open {
            return;
        }
        let slot = self.slot(code, SignalKind::Array, true);
        let words = slot.words / 2;
        check_len(code, value, words);
        check_len(code, tri, words);
        let old = self.store.words(code, slot.words);
        let top = words - 1;
        let changed = (0..words).any(|i| {
            let diff = (old[2 * i] ^ value[i]) | (old[2 * i + 1] ^ tri[i]);
            if i == top {
                diff & slot.mask != 0
            } else {
                diff != 0
            }
        });
        if changed {
            self.emit_tri_array(code, slot, value, tri);
        }
    }

    // Encoders. These store the new value and append the line.

    fn emit_bit(&mut self, code: Code, value: bool) {
        self.store.words_mut(code, 1)[0] = value as u32;
        self.buffer.push(if value { b'1' } else { b'0' });
        self.end_line(code);
    }

    fn emit_bus(&mut self, code: Code, slot: Slot, value: u32) {
        let value = value & slot.mask;
        self.store.words_mut(code, 1)[0] = value;
        self.buffer.push(b'b');
        encode::write_word(&mut self.buffer, value, slot.bits);
        self.buffer.push(b' ');
        self.end_line(code);
    }

    fn emit_quad(&mut self, code: Code, slot: Slot, value: u64) {
        let value = value & slot.quad_mask();
        self.store.set_quad(code, value);
        self.buffer.push(b'b');
        encode::write_quad(&mut self.buffer, value, slot.bits);
        self.buffer.push(b' ');
        self.end_line(code);
    }

    fn emit_array(&mut self, code: Code, slot: Slot, value: &[u32]) {
        let old = self.store.words_mut(code, slot.words);
        old.copy_from_slice(&value[..slot.words]);
        old[slot.words - 1] &= slot.mask;
        self.buffer.push(b'b');
        encode::write_words(&mut self.buffer, &value[..slot.words], slot.bits);
        self.buffer.push(b' ');
        self.end_line(code);
    }

    fn emit_float(&mut self, code: Code, value: f32) {
        let old = self.store.words_mut(code, 2);
        old[0] = value.to_bits();
        old[1] = 0;
        self.buffer.push(b'r');
        encode::write_real(&mut self.buffer, value as f64);
        self.buffer.push(b' ');
        self.end_line(code);
    }

    fn emit_double(&mut self, code: Code, value: f64) {
        self.store.set_quad(code, value.to_bits());
        self.buffer.push(b'r');
        encode::write_real(&mut self.buffer, value);
        self.buffer.push(b' ');
        self.end_line(code);
    }

    fn emit_tri_bit(&mut self, code: Code, value: bool, tri: bool) {
        let old = self.store.words_mut(code, 2);
        old[0] = value as u32;
        old[1] = tri as u32;
        encode::write_tri_word(&mut self.buffer, value as u32, tri as u32, 1);
        self.end_line(code);
    }

    fn emit_tri_bus(&mut self, code: Code, slot: Slot, value: u32, tri: u32) {
        let (value, tri) = (value & slot.mask, tri & slot.mask);
        let old = self.store.words_mut(code, 2);
        old[0] = value;
        old[1] = tri;
        self.buffer.push(b'b');
        encode::write_tri_word(&mut self.buffer, value, tri, slot.bits);
        self.buffer.push(b' ');
        self.end_line(code);
    }

    fn emit_tri_quad(&mut self, code: Code, slot: Slot, value: u64, tri: u64) {
        let mask = slot.quad_mask();
        let (value, tri) = (value & mask, tri & mask);
        let old = self.store.words_mut(code, 4);
        old[0] = value as u32;
        old[1] = tri as u32;
        old[2] = (value >> 32) as u32;
        old[3] = (tri >> 32) as u32;
        self.buffer.push(b'b');
        encode::write_tri_quad(&mut self.buffer, value, tri, slot.bits);
        self.buffer.push(b' ');
        self.end_line(code);
    }

    fn emit_tri_array(&mut self, code: Code, slot: Slot, value: &[u32], tri: &[u32]) {
        let words = slot.words / 2;
        let old = self.store.words_mut(code, slot.words);
        for i in 0..words {
            old[2 * i] = value[i];
            old[2 * i + 1] = tri[i];
        }
        old[2 * words - 2] &= slot.mask;
        old[2 * words - 1] &= slot.mask;
        self.buffer.push(b'b');
        encode::write_tri_words(&mut self.buffer, &value[..words], &tri[..words], slot.bits);
        self.buffer.push(b' ');
        self.end_line(code);
    }

    fn emit_x(&mut self, code: Code, kind: SignalKind) {
        if !self.is_open {
            return;
        }
        let bits = match self.signals.get(code) {
            Some(s) if s.kind == kind => s.bits,
            Some(s) => mismatch(s, kind, s.tri),
            None => panic!("no signal declared at code {}", code),
        };
        if kind == SignalKind::Bit {
            self.buffer.push(b'x');
        } else {
            self.buffer.push(b'b');
            encode::write_unknown(&mut self.buffer, bits);
            self.buffer.push(b' ');
        }
        self.end_line(code);
    }
}

impl Drop for Vcd {
    fn drop(&mut self) {
        self.close();
    }
}

#[cold]
fn mismatch(signal: &Signal, kind: SignalKind, tri: bool) -> ! {
    let tri_str = |t: bool| if t { "tri-state " } else { "" };
    panic!(
        "signal `{}` at {} is a {}{} but was dumped as a {}{}",
        signal.name,
        signal.code,
        tri_str(signal.tri),
        signal.kind,
        tri_str(tri),
        kind
    )
}

#[inline]
fn check_len(code: Code, value: &[u32], words: usize) {
    if value.len() < words {
        panic!(
            "value for signal at {} has {} words, needs {}",
            code,
            value.len(),
            words
        );
    }
}

/// Derive the next file name of a rollover sequence.
///
/// A trailing `_cat` number of at least four digits before the extension is
/// incremented. It never wraps, so the first file of a sequence is never
/// reused. Otherwise `_cat0000` is inserted before the extension.
pub fn next_filename(name: &str) -> String {
    let dot = match name.rfind('.') {
        Some(pos) if !name[pos..].contains('/') => pos,
        _ => name.len(),
    };
    let (stem, ext) = name.split_at(dot);
    let digits = stem.bytes().rev().take_while(u8::is_ascii_digit).count();
    let prefix = &stem[..stem.len() - digits];
    if digits >= 4 && prefix.ends_with("_cat") {
        if let Ok(number) = stem[prefix.len()..].parse::<u64>() {
            return format!("{}{:04}{}", prefix, number.saturating_add(1), ext);
        }
    }
    format!("{}_cat0000{}", stem, ext)
}
