// Copyright (c) 2017-2021 Fabian Schuiki

//! Single driving thread assertion.

use std::thread::{self, ThreadId};

/// Asserts that a writer is only driven from one thread at a time.
///
/// The first checked call records the current thread. A later call from any
/// other thread panics until [`change_thread`](Self::change_thread) hands the
/// writer over.
#[derive(Debug, Default)]
pub struct AssertOneThread {
    owner: Option<ThreadId>,
}

impl AssertOneThread {
    /// Create an assertion not yet bound to any thread.
    pub fn new() -> Self {
        Default::default()
    }

    /// Check that the current thread is the owning thread.
    #[inline]
    pub fn check(&mut self) {
        let current = thread::current().id();
        match self.owner {
            Some(owner) if owner != current => panic!(
                "trace writer driven from thread {:?} but owned by {:?}; call `change_thread` first",
                current, owner
            ),
            Some(_) => (),
            None => self.owner = Some(current),
        }
    }

    /// Allow the next call to come from a different thread.
    pub fn change_thread(&mut self) {
        self.owner = None;
    }
}
