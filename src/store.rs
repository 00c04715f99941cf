// Copyright (c) 2017-2021 Fabian Schuiki

//! Storage for the last value emitted for each signal.

use crate::signal::Code;

/// A flat array of 32 bit words holding the last value written to the trace
/// for every signal code.
///
/// A signal owns a run of consecutive words starting at its code. The run
/// lengths are tracked by the [`SignalTable`](crate::signal::SignalTable);
/// the store only checks that accesses stay in bounds.
#[derive(Debug, Default, Clone)]
pub struct OldValueStore {
    words: Vec<u32>,
}

impl OldValueStore {
    /// Create an empty, unallocated store.
    pub fn new() -> Self {
        Default::default()
    }

    /// Allocate `len` words, all zero.
    ///
    /// Allocation happens exactly once, after all declarations are final.
    /// Reallocating a store keeps existing values and zeroes any new words.
    pub fn allocate(&mut self, len: usize) {
        self.words.resize(len, 0);
    }

    /// Check whether the store has been allocated.
    pub fn is_allocated(&self) -> bool {
        !self.words.is_empty()
    }

    /// The total number of words.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// The word run of a signal.
    pub fn words(&self, code: Code, len: usize) -> &[u32] {
        let start = code.index();
        match self.words.get(start..start + len) {
            Some(w) => w,
            None => panic!(
                "code {} (+{} words) outside of old value store ({} words)",
                code,
                len,
                self.words.len()
            ),
        }
    }

    /// The mutable word run of a signal.
    pub fn words_mut(&mut self, code: Code, len: usize) -> &mut [u32] {
        let start = code.index();
        let total = self.words.len();
        match self.words.get_mut(start..start + len) {
            Some(w) => w,
            None => panic!(
                "code {} (+{} words) outside of old value store ({} words)",
                code, len, total
            ),
        }
    }

    /// Read the first word of a signal.
    #[inline]
    pub fn word(&self, code: Code) -> u32 {
        self.words(code, 1)[0]
    }

    /// Read two consecutive words as a little-endian 64 bit value.
    #[inline]
    pub fn quad(&self, code: Code) -> u64 {
        let w = self.words(code, 2);
        (w[0] as u64) | ((w[1] as u64) << 32)
    }

    /// Store a 64 bit value in two consecutive words.
    #[inline]
    pub fn set_quad(&mut self, code: Code, value: u64) {
        let w = self.words_mut(code, 2);
        w[0] = value as u32;
        w[1] = (value >> 32) as u32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quads_span_two_words() {
        let mut store = OldValueStore::new();
        store.allocate(4);
        store.set_quad(Code(1), 0x1234_5678_9abc_def0);
        assert_eq!(store.words(Code(1), 2), &[0x9abc_def0, 0x1234_5678]);
        assert_eq!(store.quad(Code(1)), 0x1234_5678_9abc_def0);
        assert_eq!(store.word(Code(0)), 0);
        assert_eq!(store.word(Code(3)), 0);
    }

    #[test]
    fn reallocation_keeps_values() {
        let mut store = OldValueStore::new();
        assert!(!store.is_allocated());
        store.allocate(2);
        store.words_mut(Code(1), 1)[0] = 7;
        store.allocate(5);
        assert_eq!(store.len(), 5);
        assert_eq!(store.word(Code(1)), 7);
    }

    #[test]
    #[should_panic(expected = "outside of old value store")]
    fn out_of_bounds_access_panics() {
        let mut store = OldValueStore::new();
        store.allocate(2);
        store.words(Code(1), 2);
    }
}
