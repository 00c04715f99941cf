// Copyright (c) 2017-2021 Fabian Schuiki

//! File abstraction
//!
//! The trace writer never touches the file system directly. It goes through
//! a [`TraceFile`], which can be overridden to redirect a trace into memory, a
//! socket, or anything else that accepts bytes.

use std::{
    collections::BTreeMap,
    fs::File,
    io::{self, Write},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

/// The sink a trace is written into.
pub trait TraceFile {
    /// Open the file with the given name, replacing any previous contents.
    fn open(&mut self, name: &str) -> io::Result<()>;

    /// Close the file. Closing a file that is not open does nothing.
    fn close(&mut self);

    /// Write some bytes to the file.
    ///
    /// Returns the number of bytes actually written, which may be less than
    /// `buf.len()`.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;
}

/// A trace file on disk.
#[derive(Default)]
pub struct FsFile {
    file: Option<File>,
}

impl FsFile {
    /// Create a new closed file.
    pub fn new() -> Self {
        Default::default()
    }
}

impl TraceFile for FsFile {
    fn open(&mut self, name: &str) -> io::Result<()> {
        self.file = Some(File::create(name)?);
        Ok(())
    }

    fn close(&mut self) {
        if let Some(mut file) = self.file.take() {
            if let Err(e) = file.flush() {
                warn!("Failed to flush trace file on close: {}", e);
            }
        }
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.file {
            Some(ref mut file) => file.write(buf),
            None => Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "trace file is not open",
            )),
        }
    }
}

/// An in-memory trace file.
///
/// All files opened through a `MemFile` end up in a shared map from file name
/// to contents, which stays accessible through [`MemFile::handle`] after the
/// file itself has been moved into a writer.
#[derive(Clone, Default)]
pub struct MemFile {
    files: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
    current: Option<String>,
    fail_open: bool,
    write_limit: Option<usize>,
    fail_writes: Arc<AtomicBool>,
}

impl MemFile {
    /// Create a new in-memory file system.
    pub fn new() -> Self {
        Default::default()
    }

    /// Make every subsequent `open` fail.
    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Accept at most `limit` bytes per `write` call.
    pub fn short_writes(mut self, limit: usize) -> Self {
        self.write_limit = Some(limit);
        self
    }

    /// Get a handle to the files written so far.
    pub fn handle(&self) -> MemFiles {
        MemFiles {
            files: self.files.clone(),
            fail_writes: self.fail_writes.clone(),
        }
    }
}

impl TraceFile for MemFile {
    fn open(&mut self, name: &str) -> io::Result<()> {
        if self.fail_open {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("cannot create `{}`", name),
            ));
        }
        self.lock().insert(name.to_owned(), Vec::new());
        self.current = Some(name.to_owned());
        Ok(())
    }

    fn close(&mut self) {
        self.current = None;
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let name = match self.current {
            Some(ref name) => name.clone(),
            None => {
                return Err(io::Error::new(
                    io::ErrorKind::NotConnected,
                    "trace file is not open",
                ))
            }
        };
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
        }
        let len = self.write_limit.map(|l| l.min(buf.len())).unwrap_or(buf.len());
        self.lock()
            .entry(name)
            .or_insert_with(Vec::new)
            .extend_from_slice(&buf[..len]);
        Ok(len)
    }
}

impl MemFile {
    fn lock(&self) -> std::sync::MutexGuard<BTreeMap<String, Vec<u8>>> {
        self.files
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// A view onto the files written through a [`MemFile`].
#[derive(Clone)]
pub struct MemFiles {
    files: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemFiles {
    /// Make subsequent writes through the file fail, or succeed again.
    pub fn set_failing_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    /// Get the names of all files, in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    /// Get the contents of a file as a string.
    ///
    /// Panics if the file does not exist.
    pub fn contents(&self, name: &str) -> String {
        let files = self.lock();
        let data = files
            .get(name)
            .unwrap_or_else(|| panic!("no in-memory file named `{}`", name));
        String::from_utf8_lossy(data).into_owned()
    }

    /// Concatenate all files in name order.
    pub fn concat(&self) -> String {
        self.lock()
            .values()
            .map(|data| String::from_utf8_lossy(data).into_owned())
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<BTreeMap<String, Vec<u8>>> {
        self.files
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
