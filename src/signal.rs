// Copyright (c) 2017-2021 Fabian Schuiki

//! Signal declarations
//!
//! This module keeps track of every traced signal: its code, its width, and
//! how many words of old value storage it reserves. It also collects the
//! `$var` lines of the header, keyed by hierarchical name.

use crate::encode::code_string;
use std::{collections::BTreeMap, fmt};

/// A dense handle identifying the old value slot of a signal.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Code(pub u32);

impl Code {
    /// The index of the first word of the slot.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// The code `n` words further on.
    #[inline]
    pub fn offset(self, n: u32) -> Code {
        Code(self.0 + n)
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

impl fmt::Debug for Code {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl From<u32> for Code {
    fn from(code: u32) -> Code {
        Code(code)
    }
}

/// The width class of a signal, which selects its encoder.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum SignalKind {
    /// A single bit.
    Bit,
    /// Up to 32 bits.
    Bus,
    /// Up to 64 bits.
    Quad,
    /// Any width, stored as a sequence of 32 bit words.
    Array,
    /// A 32 bit IEEE float.
    Float,
    /// A 64 bit IEEE double.
    Double,
}

impl SignalKind {
    /// Whether this kind is a real number.
    pub fn is_real(self) -> bool {
        match self {
            SignalKind::Float | SignalKind::Double => true,
            _ => false,
        }
    }

    /// The largest width this kind can hold, if any.
    fn max_bits(self) -> Option<usize> {
        match self {
            SignalKind::Bit => Some(1),
            SignalKind::Bus => Some(32),
            SignalKind::Quad => Some(64),
            SignalKind::Array => None,
            SignalKind::Float => Some(32),
            SignalKind::Double => Some(64),
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SignalKind::Bit => write!(f, "bit"),
            SignalKind::Bus => write!(f, "bus"),
            SignalKind::Quad => write!(f, "quad"),
            SignalKind::Array => write!(f, "array"),
            SignalKind::Float => write!(f, "float"),
            SignalKind::Double => write!(f, "double"),
        }
    }
}

/// A traced signal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signal {
    /// The code of the signal's first storage word.
    pub code: Code,
    /// The declared width in bits.
    pub bits: usize,
    /// The width class.
    pub kind: SignalKind,
    /// Whether the signal carries a tri-state word next to each value word.
    pub tri: bool,
    /// The name the signal was first declared under.
    pub name: String,
}

impl Signal {
    /// The number of 32 bit value words, not counting tri-state words.
    ///
    /// Quads and reals always take two, whatever their declared width.
    pub fn value_words(&self) -> usize {
        if self.kind.is_real() || self.kind == SignalKind::Quad {
            2
        } else {
            (self.bits + 31) / 32
        }
    }

    /// The number of storage words the signal reserves.
    pub fn words(&self) -> usize {
        if self.tri {
            self.value_words() * 2
        } else {
            self.value_words()
        }
    }

    /// The mask of valid bits in the topmost value word.
    #[inline]
    pub fn top_mask(&self) -> u32 {
        match self.bits % 32 {
            0 => !0,
            n => (1u32 << n) - 1,
        }
    }
}

/// A full signal declaration.
#[derive(Clone, Debug)]
pub struct Declaration<'a> {
    /// The first storage word of the signal.
    pub code: Code,
    /// The hierarchical name, split at the scope escape and whitespace.
    pub name: &'a str,
    /// The width class.
    pub kind: SignalKind,
    /// The element index, if the signal is one element of an array.
    pub array_index: Option<i32>,
    /// Whether the signal has a tri-state word next to each value word.
    pub tri: bool,
    /// Whether to print the `[msb:lsb]` range.
    pub bussed: bool,
    /// The most significant bit index.
    pub msb: i32,
    /// The least significant bit index.
    pub lsb: i32,
}

/// The table of all declared signals.
pub struct SignalTable {
    slots: Vec<Option<Signal>>,
    names: BTreeMap<String, String>,
    next_code: u32,
    module: String,
    scope_escape: char,
    evcd: bool,
}

impl SignalTable {
    /// Create an empty table.
    pub fn new() -> Self {
        SignalTable {
            slots: Vec::new(),
            names: BTreeMap::new(),
            next_code: 0,
            module: String::new(),
            scope_escape: '.',
            evcd: false,
        }
    }

    /// One past the last reserved storage word. This is the size of the old
    /// value store, and the base code handed to the next callback.
    pub fn next_code(&self) -> Code {
        Code(self.next_code)
    }

    /// Set the character that separates scope names.
    ///
    /// Whitespace always separates scopes as well.
    pub fn set_scope_escape(&mut self, c: char) {
        self.scope_escape = c;
    }

    /// Check whether a character separates scopes.
    pub fn is_scope_escape(&self, c: char) -> bool {
        c.is_whitespace() || c == self.scope_escape
    }

    /// Set the module prefix for subsequent declarations.
    pub fn set_module(&mut self, name: &str) {
        self.module = name.to_owned();
    }

    /// Switch between VCD and EVCD type tags.
    pub fn set_evcd(&mut self, evcd: bool) {
        self.evcd = evcd;
    }

    /// Whether EVCD type tags are used.
    pub fn is_evcd(&self) -> bool {
        self.evcd
    }

    /// Look up the signal occupying a code, if any.
    #[inline]
    pub fn get(&self, code: Code) -> Option<&Signal> {
        self.slots.get(code.index()).and_then(|s| s.as_ref())
    }

    /// Iterate over all declared signals in code order.
    pub fn iter(&self) -> impl Iterator<Item = &Signal> {
        self.slots.iter().flatten()
    }

    /// The number of declared signals, not counting aliases.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Check whether no signals have been declared.
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// The `$var` lines, keyed by hierarchical name.
    pub fn names(&self) -> &BTreeMap<String, String> {
        &self.names
    }

    pub(crate) fn take_names(&mut self) -> BTreeMap<String, String> {
        std::mem::take(&mut self.names)
    }

    pub(crate) fn restore_names(&mut self, names: BTreeMap<String, String>) {
        self.names = names;
    }

    /// Register a signal and return it.
    ///
    /// Declaring an already registered code under another name creates an
    /// alias that shares the old value slot. Panics if the alias disagrees
    /// with the original declaration on width or tri-state-ness, or if the
    /// declared width does not fit the width class.
    pub fn declare(&mut self, decl: &Declaration) -> &Signal {
        let bits = match decl.kind {
            SignalKind::Bit => 1,
            SignalKind::Float => 32,
            SignalKind::Double => 64,
            _ => ((decl.msb as i64 - decl.lsb as i64).abs() + 1) as usize,
        };
        if let Some(max) = decl.kind.max_bits() {
            if bits > max {
                panic!(
                    "signal `{}` declared as {} with {} bits (at most {})",
                    decl.name, decl.kind, bits, max
                );
            }
        }
        if decl.tri && decl.kind.is_real() {
            panic!("signal `{}`: {} cannot be tri-state", decl.name, decl.kind);
        }
        let signal = Signal {
            code: decl.code,
            bits,
            kind: decl.kind,
            tri: decl.tri,
            name: decl.name.to_owned(),
        };

        // Reserve the storage words, or check the alias.
        let index = decl.code.index();
        if self.slots.len() <= index {
            self.slots.resize(index + 1, None);
        }
        match self.slots[index] {
            Some(ref existing) => {
                if existing.bits != signal.bits || existing.tri != signal.tri {
                    panic!(
                        "signal `{}` aliases `{}` at code {} with a different width ({} vs {} bits)",
                        decl.name, existing.name, decl.code, signal.bits, existing.bits
                    );
                }
                trace!("Alias `{}` of `{}` at {}", decl.name, existing.name, decl.code);
            }
            None => {
                self.next_code = self.next_code.max(decl.code.0 + signal.words() as u32);
                trace!(
                    "Declare `{}` at {}: {} bits, {} words",
                    decl.name,
                    decl.code,
                    bits,
                    signal.words()
                );
                self.slots[index] = Some(signal);
            }
        }

        // Split the name into scopes and a basename. Scopes are separated by
        // spaces in the hierarchical name, and a tab precedes the basename.
        // Tabs sort before spaces, so signals list before nested scopes.
        let full_name = if self.module.is_empty() {
            decl.name.to_owned()
        } else {
            format!("{}{}{}", self.module, self.scope_escape, decl.name)
        };
        let mut hier_name = String::new();
        let mut basename = String::new();
        for c in full_name.chars() {
            if self.is_scope_escape(c) {
                if !basename.is_empty() {
                    if !hier_name.is_empty() {
                        hier_name.push(' ');
                    }
                    hier_name.push_str(&basename);
                    basename.clear();
                }
            } else {
                basename.push(c);
            }
        }
        hier_name.push('\t');
        hier_name.push_str(&basename);

        // Compose the `$var` line.
        let tag = if decl.kind.is_real() {
            "real"
        } else if decl.tri && self.evcd {
            "port"
        } else if decl.tri {
            "tri"
        } else {
            "wire"
        };
        let mut line = format!(
            "$var {} {:>2} {} {}",
            tag,
            bits,
            code_string(decl.code),
            basename
        );
        if let Some(index) = decl.array_index {
            let suffix = format!("({})", index);
            line.push_str(&suffix);
            hier_name.push_str(&suffix);
        }
        if decl.bussed {
            line.push_str(&format!(" [{}:{}]", decl.msb, decl.lsb));
        }
        line.push_str(" $end\n");
        self.names.entry(hier_name).or_insert(line);

        self.slots[index].as_ref().expect("slot declared above")
    }
}

impl Default for SignalTable {
    fn default() -> Self {
        SignalTable::new()
    }
}
