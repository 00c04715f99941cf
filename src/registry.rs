// Copyright (c) 2017-2021 Fabian Schuiki

//! The process-wide list of live writers, used to flush every trace at once,
//! for example from a signal or panic handler.

use crate::vcd::Vcd;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex, MutexGuard, PoisonError, TryLockError, Weak,
};

/// A registered writer.
struct Registered {
    id: usize,
    vcd: Weak<Mutex<Vcd>>,
}

lazy_static! {
    static ref WRITERS: Mutex<Vec<Registered>> = Mutex::new(Vec::new());
}

static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

fn writers() -> MutexGuard<'static, Vec<Registered>> {
    WRITERS.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Add a writer to the registry and return its id.
pub fn register(vcd: &Arc<Mutex<Vcd>>) -> usize {
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    writers().push(Registered {
        id,
        vcd: Arc::downgrade(vcd),
    });
    id
}

/// Remove a writer from the registry.
pub fn deregister(id: usize) {
    writers().retain(|r| r.id != id);
}

/// The number of registered writers.
pub fn count() -> usize {
    writers().len()
}

/// Flush every registered writer.
///
/// Writers that are busy on another thread, or already gone, are skipped.
/// Returns the number of writers flushed.
pub fn flush_all() -> usize {
    // Take a snapshot so the list lock is not held while flushing.
    let snapshot: Vec<_> = writers().iter().filter_map(|r| r.vcd.upgrade()).collect();
    let mut flushed = 0;
    for vcd in snapshot {
        match vcd.try_lock() {
            Ok(mut vcd) => {
                vcd.flush();
                flushed += 1;
            }
            Err(TryLockError::Poisoned(e)) => {
                e.into_inner().flush();
                flushed += 1;
            }
            Err(TryLockError::WouldBlock) => {
                debug!("Skipping busy trace writer in flush_all");
            }
        }
    }
    flushed
}
