// Copyright (c) 2017-2021 Fabian Schuiki

//! Model callbacks
//!
//! The writer knows nothing about the model it traces. Instead, the model
//! registers callbacks that declare its signals and dump their values when
//! asked to.

use crate::{signal::Code, vcd::Vcd};

/// A part of a model that can be traced.
///
/// Each callback gets a base code, which is the first code that was free when
/// its `init` hook ran. Callbacks declare their signals at offsets from it and
/// use the same offsets when dumping.
pub trait TraceCallback: Send {
    /// Declare all signals. Called once, while the header is built.
    fn init(&mut self, vcd: &mut Vcd, base: Code);

    /// Dump every signal unconditionally with `Vcd::full_*`.
    fn full(&mut self, vcd: &mut Vcd, base: Code);

    /// Dump the signals that changed with `Vcd::chg_*`.
    fn change(&mut self, vcd: &mut Vcd, base: Code);
}

/// A callback assembled from three closures.
pub struct FnCallback<I, F, C> {
    init: I,
    full: F,
    change: C,
}

impl<I, F, C> FnCallback<I, F, C>
where
    I: FnMut(&mut Vcd, Code) + Send,
    F: FnMut(&mut Vcd, Code) + Send,
    C: FnMut(&mut Vcd, Code) + Send,
{
    /// Create a new callback from an init, full, and change closure.
    pub fn new(init: I, full: F, change: C) -> Self {
        FnCallback { init, full, change }
    }
}

impl<I, F, C> TraceCallback for FnCallback<I, F, C>
where
    I: FnMut(&mut Vcd, Code) + Send,
    F: FnMut(&mut Vcd, Code) + Send,
    C: FnMut(&mut Vcd, Code) + Send,
{
    fn init(&mut self, vcd: &mut Vcd, base: Code) {
        (self.init)(vcd, base)
    }

    fn full(&mut self, vcd: &mut Vcd, base: Code) {
        (self.full)(vcd, base)
    }

    fn change(&mut self, vcd: &mut Vcd, base: Code) {
        (self.change)(vcd, base)
    }
}

struct Entry {
    callback: Box<dyn TraceCallback>,
    base: Option<Code>,
}

/// The ordered list of registered callbacks.
#[derive(Default)]
pub struct CallbackRegistry {
    entries: Vec<Entry>,
}

impl CallbackRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Default::default()
    }

    /// Append a callback.
    pub fn add(&mut self, callback: Box<dyn TraceCallback>) {
        self.entries.push(Entry {
            callback,
            base: None,
        });
    }

    /// The number of registered callbacks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether no callbacks are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run the `init` hook of every callback that has not been initialized
    /// yet, in registration order.
    pub fn init_all(&mut self, vcd: &mut Vcd) {
        for entry in &mut self.entries {
            if entry.base.is_none() {
                let base = vcd.next_code();
                debug!("Initializing trace callback at base {}", base);
                entry.callback.init(vcd, base);
                entry.base = Some(base);
            }
        }
    }

    /// Run the `full` hook of every callback if `full` is set, or the
    /// `change` hook otherwise, in registration order.
    pub fn dump_all(&mut self, vcd: &mut Vcd, full: bool) {
        for entry in &mut self.entries {
            let base = match entry.base {
                Some(base) => base,
                None => panic!("trace callback dumped before it was initialized"),
            };
            if full {
                entry.callback.full(vcd, base);
            } else {
                entry.callback.change(vcd, base);
            }
        }
    }
}
