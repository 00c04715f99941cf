// Copyright (c) 2017-2021 Fabian Schuiki

//! Output buffering
//!
//! Encoded lines are composed directly into a [`WriteBuffer`]. The buffer is
//! sized in chunks: it holds eight chunks but asks to be flushed once six are
//! used, leaving two chunks of slack. The chunk is always at least twice the
//! longest line a declared signal can produce, so checking for a flush once
//! after each complete line is enough to never run off the end.

use crate::file::TraceFile;
use std::io;

/// The default chunk size in bytes.
pub const DEFAULT_CHUNK: usize = 8 * 1024;

/// A growable byte buffer with a flush threshold.
pub struct WriteBuffer {
    data: Vec<u8>,
    chunk: usize,
    flush_at: usize,
}

impl WriteBuffer {
    /// Create a buffer with the default chunk size.
    pub fn new() -> Self {
        Self::with_chunk(DEFAULT_CHUNK)
    }

    /// Create a buffer with a specific chunk size.
    pub fn with_chunk(chunk: usize) -> Self {
        WriteBuffer {
            data: Vec::with_capacity(chunk * 8),
            chunk,
            flush_at: chunk * 6,
        }
    }

    /// The current chunk size.
    pub fn chunk(&self) -> usize {
        self.chunk
    }

    /// The fill level at which the buffer wants to be flushed.
    pub fn flush_at(&self) -> usize {
        self.flush_at
    }

    /// The size of the backing storage.
    pub fn capacity(&self) -> usize {
        self.chunk * 8
    }

    /// The number of bytes waiting to be flushed.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check whether there is nothing to flush.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The bytes waiting to be flushed.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Make room for lines of up to `min_line` bytes.
    ///
    /// Grows the chunk to twice `min_line` if the current chunk is smaller
    /// than `min_line`. Bytes not yet flushed are kept.
    pub fn resize(&mut self, min_line: usize) {
        if min_line > self.chunk {
            self.chunk = min_line * 2;
            self.flush_at = self.chunk * 6;
            let capacity = self.chunk * 8;
            self.data.reserve_exact(capacity - self.data.len());
            debug!("Trace buffer grown to {} bytes", capacity);
        }
    }

    /// Append a single byte.
    #[inline]
    pub fn push(&mut self, byte: u8) {
        self.data.push(byte);
    }

    /// Append a slice of bytes.
    #[inline]
    pub fn extend(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Check whether the buffer has crossed its flush threshold.
    ///
    /// Called once after each complete line.
    #[inline]
    pub fn needs_flush(&self) -> bool {
        debug_assert!(
            self.data.len() < self.capacity(),
            "trace line overran the write buffer slack"
        );
        self.data.len() > self.flush_at
    }

    /// Drop all pending bytes.
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Write all pending bytes to `file` in one call and reset the buffer.
    ///
    /// A failed write, or one that accepts fewer bytes than were pending, is
    /// an error. Nothing is retried. The pending bytes are dropped either way.
    /// On success, returns the number of bytes written.
    pub fn write_to(&mut self, file: &mut dyn TraceFile) -> io::Result<usize> {
        let pending = self.data.len();
        let result = if pending == 0 {
            Ok(0)
        } else {
            match file.write(&self.data) {
                Ok(n) if n < pending => Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    format!("short write of {} out of {} bytes", n, pending),
                )),
                Ok(n) => Ok(n),
                Err(e) => Err(e),
            }
        };
        self.data.clear();
        result
    }
}

impl Default for WriteBuffer {
    fn default() -> Self {
        WriteBuffer::new()
    }
}

impl io::Write for WriteBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.extend(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
