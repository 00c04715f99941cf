// Copyright (c) 2017-2021 Fabian Schuiki

//! An incremental Value Change Dump trace writer for cycle-based hardware
//! simulators.
//!
//! The simulated model registers callbacks with a [`TraceWriter`]. When a file
//! is opened, the callbacks declare their signals, and on every time step they
//! report the signal values. Only values that changed since the last step are
//! written, except right after a file was opened or rolled over, when every
//! value is written once.
//!
//! Both plain VCD and extended VCD (EVCD) are supported. Large traces can be
//! split into numbered files that concatenate into one valid trace.

#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;

pub mod buffer;
pub mod callback;
pub mod encode;
pub mod file;
pub mod header;
pub mod registry;
pub mod signal;
pub mod store;
pub mod thread;
pub mod time;
pub mod vcd;
pub mod writer;

pub use crate::{
    callback::{FnCallback, TraceCallback},
    file::{FsFile, MemFile, MemFiles, TraceFile},
    signal::{Code, Declaration, SignalKind},
    vcd::Vcd,
    writer::{flush_all, TraceWriter},
};
