// Copyright (c) 2017-2021 Fabian Schuiki

//! Value encoders
//!
//! These functions append the textual VCD form of values to a
//! [`WriteBuffer`]. They only encode. Storing old values, comparing, and
//! checking for flushes is up to the caller. Multi-bit values are written most
//! significant bit first, without a leading `b` or trailing identifier.

use crate::{buffer::WriteBuffer, signal::Code};
use std::io::Write;

/// The characters for each 4 bit group, most significant bit first.
const NIBBLES: [[u8; 4]; 16] = [
    *b"0000", *b"0001", *b"0010", *b"0011", *b"0100", *b"0101", *b"0110", *b"0111", *b"1000",
    *b"1001", *b"1010", *b"1011", *b"1100", *b"1101", *b"1110", *b"1111",
];

/// The character for a tri-state bit, indexed by `value | tri << 1`.
const TRI_CHARS: [u8; 4] = *b"01zz";

/// Append the identifier code of a signal.
///
/// Codes are written in base 94 using the printable characters `!` to `~`,
/// least significant digit first.
#[inline]
pub fn write_code(buf: &mut WriteBuffer, code: Code) {
    let (digits, len) = code_digits(code);
    buf.extend(&digits[..len]);
}

/// The base 94 digits of a code. Five digits cover every `u32`.
#[inline]
fn code_digits(code: Code) -> ([u8; 5], usize) {
    let mut digits = [0u8; 5];
    let mut code = code.0;
    digits[0] = b'!' + (code % 94) as u8;
    let mut len = 1;
    code /= 94;
    while code != 0 {
        code -= 1;
        digits[len] = b'!' + (code % 94) as u8;
        len += 1;
        code /= 94;
    }
    (digits, len)
}

/// The identifier codes of all codes below a bound, rendered once so that
/// emitting a value line only copies bytes.
#[derive(Clone, Debug, Default)]
pub struct IdentTable {
    bytes: Vec<u8>,
    ends: Vec<usize>,
}

impl IdentTable {
    /// Render the identifiers of codes `0..len`.
    pub fn build(len: usize) -> Self {
        let mut table = IdentTable {
            bytes: Vec::with_capacity(len * 2),
            ends: Vec::with_capacity(len),
        };
        for index in 0..len {
            let (digits, n) = code_digits(Code(index as u32));
            table.bytes.extend_from_slice(&digits[..n]);
            table.ends.push(table.bytes.len());
        }
        table
    }

    /// The number of rendered codes.
    pub fn len(&self) -> usize {
        self.ends.len()
    }

    /// Check whether no codes are rendered.
    pub fn is_empty(&self) -> bool {
        self.ends.is_empty()
    }

    /// The identifier of a code, if it was rendered.
    #[inline]
    pub fn get(&self, code: Code) -> Option<&[u8]> {
        let index = code.index();
        let end = *self.ends.get(index)?;
        let start = if index == 0 { 0 } else { self.ends[index - 1] };
        Some(&self.bytes[start..end])
    }
}

/// Render the identifier code of a signal as a string.
pub fn code_string(code: Code) -> String {
    let mut buf = WriteBuffer::with_chunk(2);
    write_code(&mut buf, code);
    String::from_utf8_lossy(buf.as_bytes()).into_owned()
}

/// Append the low `bits` bits of a word, where `bits <= 32`.
#[inline]
pub fn write_word(buf: &mut WriteBuffer, value: u32, bits: usize) {
    debug_assert!(bits <= 32);
    let mut bit = bits;
    while bit % 4 != 0 {
        bit -= 1;
        buf.push(b'0' + ((value >> bit) & 1) as u8);
    }
    while bit > 0 {
        bit -= 4;
        buf.extend(&NIBBLES[((value >> bit) & 0xf) as usize]);
    }
}

/// Append the low `bits` bits of a 64 bit value.
#[inline]
pub fn write_quad(buf: &mut WriteBuffer, value: u64, bits: usize) {
    if bits > 32 {
        write_word(buf, (value >> 32) as u32, bits - 32);
        write_word(buf, value as u32, 32);
    } else {
        write_word(buf, value as u32, bits);
    }
}

/// Append `bits` bits stored in little-endian 32 bit words.
pub fn write_words(buf: &mut WriteBuffer, words: &[u32], bits: usize) {
    match bits {
        0 => (),
        1..=32 => write_word(buf, words[0], bits),
        _ => {
            let top = (bits - 1) / 32;
            write_word(buf, words[top], bits - top * 32);
            for &w in words[..top].iter().rev() {
                write_word(buf, w, 32);
            }
        }
    }
}

/// Append the low `bits` bits of a tri-state word pair, where `bits <= 32`.
///
/// A set bit in `tri` marks the bit as not driven, which prints as `z`.
/// Otherwise the bit in `value` prints as `0` or `1`.
#[inline]
pub fn write_tri_word(buf: &mut WriteBuffer, value: u32, tri: u32, bits: usize) {
    debug_assert!(bits <= 32);
    for bit in (0..bits).rev() {
        let index = ((value >> bit) & 1) | (((tri >> bit) & 1) << 1);
        buf.push(TRI_CHARS[index as usize]);
    }
}

/// Append the low `bits` bits of a tri-state 64 bit value.
pub fn write_tri_quad(buf: &mut WriteBuffer, value: u64, tri: u64, bits: usize) {
    if bits > 32 {
        write_tri_word(buf, (value >> 32) as u32, (tri >> 32) as u32, bits - 32);
        write_tri_word(buf, value as u32, tri as u32, 32);
    } else {
        write_tri_word(buf, value as u32, tri as u32, bits);
    }
}

/// Append `bits` tri-state bits stored in little-endian 32 bit words.
pub fn write_tri_words(buf: &mut WriteBuffer, values: &[u32], tris: &[u32], bits: usize) {
    if bits == 0 {
        return;
    }
    let top = (bits - 1) / 32;
    write_tri_word(buf, values[top], tris[top], bits - top * 32);
    for word in (0..top).rev() {
        write_tri_word(buf, values[word], tris[word], 32);
    }
}

/// Append `count` unknown bits.
pub fn write_unknown(buf: &mut WriteBuffer, count: usize) {
    for _ in 0..count {
        buf.push(b'x');
    }
}

/// Append a real number.
///
/// Uses plain decimal notation for magnitudes between `1e-4` and `1e16`, and
/// exponent notation otherwise, which mirrors C's `%.16g`.
pub fn write_real(buf: &mut WriteBuffer, value: f64) {
    if value.is_nan() {
        buf.extend(b"nan");
    } else if value.is_infinite() {
        buf.extend(if value > 0.0 { b"inf" as &[u8] } else { b"-inf" });
    } else {
        let mag = value.abs();
        // Writing into a `WriteBuffer` cannot fail.
        let _ = if mag == 0.0 || (mag >= 1e-4 && mag < 1e16) {
            write!(buf, "{}", value)
        } else {
            write!(buf, "{:e}", value)
        };
    }
}

/// Append an unsigned decimal number.
pub fn write_decimal(buf: &mut WriteBuffer, mut value: u64) {
    let mut digits = [0u8; 20];
    let mut i = digits.len();
    loop {
        i -= 1;
        digits[i] = b'0' + (value % 10) as u8;
        value /= 10;
        if value == 0 {
            break;
        }
    }
    buf.extend(&digits[i..]);
}
