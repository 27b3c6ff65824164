//! A copy-on-write Unicode string value backed by a reference-counted UTF-8 body.
//!
//! [`UString`] holds a single `Arc<StringBody>`. Every mutating method runs a *cow guard*
//! (`Arc::make_mut`) first, so a clone of the underlying bytes only happens when the body is
//! actually shared; methods that replace the value outright (the `reset_*` family) instead run
//! a *row guard*, dropping the old `Arc` and allocating a fresh body rather than cloning
//! content that is about to be discarded anyway.
#![cfg_attr(all(not(feature = "std"), not(test)), no_std)]

extern crate alloc;

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::cmp::Ordering;
use core::fmt;
use core::ops::{AddAssign, ControlFlow};

pub use unikit_bom::Bom;
pub use unikit_codepoint::Utf32;
pub use unikit_sequence::{Sequence, Utf16Sequence, Utf8Sequence};

use unikit_codepoint::Utf8;

/// Sentinel returned by search operations that find no match, or by `rfind`/`find` to request
/// "start of none" / "end of none".
pub const INVALID_INDEX: usize = 0xFFFF_FFFF;

#[derive(Clone, Debug, Default)]
struct StringBody {
    seq: Utf8Sequence,
    has_null: bool,
}

impl StringBody {
    fn new() -> Self {
        Self { seq: Utf8Sequence::new(), has_null: false }
    }

    fn payload_len(&self) -> usize {
        self.seq.len_bytes() - usize::from(self.has_null)
    }

    fn payload_bytes(&self) -> &[u8] {
        &self.seq.as_bytes()[..self.payload_len()]
    }

    fn add_null(&mut self) {
        if !self.has_null {
            let _ = self.seq.append_raw(&[0], 0);
            self.has_null = true;
        }
    }

    fn rm_null(&mut self) {
        if self.has_null {
            let raw_len = self.seq.len_bytes();
            self.seq.truncate_bytes(raw_len - 1);
            self.has_null = false;
        }
    }
}

#[cfg(feature = "std")]
fn empty_body() -> Arc<StringBody> {
    static EMPTY: std::sync::OnceLock<Arc<StringBody>> = std::sync::OnceLock::new();
    Arc::clone(EMPTY.get_or_init(|| Arc::new(StringBody::new())))
}

// No `OnceLock` without `std`; every caller pays one allocation for an empty body instead of
// sharing a process-wide singleton. This is the "forbid process-wide state" fallback spec.md
// §9 calls out for default construction.
#[cfg(not(feature = "std"))]
fn empty_body() -> Arc<StringBody> {
    Arc::new(StringBody::new())
}

fn byte_eq(a: &[u8], b: &[u8], case_insensitive: bool) -> bool {
    if a.len() != b.len() {
        return false;
    }
    if case_insensitive {
        a.iter().zip(b).all(|(x, y)| x.to_ascii_lowercase() == y.to_ascii_lowercase())
    } else {
        a == b
    }
}

fn find_bytes(hay: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.len() > hay.len() {
        return None;
    }
    (0..=hay.len() - needle.len()).find(|&i| &hay[i..i + needle.len()] == needle)
}

fn rfind_bytes(hay: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.len() > hay.len() {
        return None;
    }
    (0..=hay.len() - needle.len()).rev().find(|&i| &hay[i..i + needle.len()] == needle)
}

fn djb2(bytes: &[u8]) -> u32 {
    let mut h: u32 = 5381;
    for &b in bytes {
        h = h.wrapping_add(h.wrapping_shl(5)).wrapping_add(u32::from(b));
    }
    h
}

fn bytes_to_u16_ne(bytes: &[u8]) -> Vec<u16> {
    bytes.chunks_exact(2).map(|c| u16::from_ne_bytes([c[0], c[1]])).collect()
}

fn bytes_to_u32_ne(bytes: &[u8]) -> Vec<u32> {
    bytes.chunks_exact(4).map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]])).collect()
}

fn code_point_utf8_bytes(cp: u32) -> ([u8; 4], usize) {
    let mut buf = [0_u8; 4];
    let n = Utf8::from(Utf32::from(cp)).encode(&mut buf);
    (buf, n)
}

/// A reference-counted, copy-on-write Unicode string.
///
/// Internally a [`Utf8Sequence`] body shared behind an `Arc`; cloning a `UString` is `O(1)` and
/// shares the body until one of the clones is mutated.
#[derive(Clone)]
pub struct UString(Arc<StringBody>);

impl UString {
    // ---- construction -----------------------------------------------------------------

    /// An empty string. Shares a process-wide singleton body when the `std` feature is on.
    #[must_use]
    pub fn new() -> Self {
        Self(empty_body())
    }

    /// Wraps an existing UTF-8 sequence body directly; no copy.
    #[must_use]
    pub fn from_utf8_seq(seq: Utf8Sequence) -> Self {
        Self(Arc::new(StringBody { seq, has_null: false }))
    }

    /// Builds a string from a UTF-16 sequence. The source is already a validated sequence of
    /// Unicode scalar values, so this conversion never replaces anything.
    #[must_use]
    pub fn from_utf16_seq(seq: &Utf16Sequence) -> Self {
        let mut out = Utf8Sequence::new();
        let _ = seq.apply_low_to_high(|cp| {
            let _ = out.append(cp);
            ControlFlow::Continue(())
        });
        Self::from_utf8_seq(out)
    }

    /// Decodes a NUL-terminated (or unterminated) UTF-8 byte string, stopping at the first NUL.
    /// Returns the string and the count of malformed bytes replaced by `default_char`.
    #[must_use]
    pub fn from_c_str(bytes: &[u8], default_char: u32) -> (Self, usize) {
        let len = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Self::from_bytes(&bytes[..len], default_char)
    }

    /// Decodes `bytes` as UTF-8 in full (explicit length, no NUL scanning). Returns the string
    /// and the count of malformed bytes replaced by `default_char`.
    #[must_use]
    pub fn from_bytes(bytes: &[u8], default_char: u32) -> (Self, usize) {
        let (seq, replaced) = Utf8Sequence::convert_from_utf8(bytes, default_char);
        (Self::from_utf8_seq(seq), replaced)
    }

    /// Builds a string from a NUL-terminated array of 32-bit wide characters, stopping at the
    /// first `0`. Returns the string and the count of invalid scalar values replaced.
    #[must_use]
    pub fn from_wide_c_str(wide: &[u32], default_char: u32) -> (Self, usize) {
        let len = wide.iter().position(|&c| c == 0).unwrap_or(wide.len());
        Self::from_wide(&wide[..len], default_char)
    }

    /// Builds a string from an explicit-length array of 32-bit wide characters. Returns the
    /// string and the count of invalid scalar values replaced.
    #[must_use]
    pub fn from_wide(wide: &[u32], default_char: u32) -> (Self, usize) {
        let (seq, replaced) = Utf8Sequence::shrink_from_u32(wide, default_char);
        (Self::from_utf8_seq(seq), replaced)
    }

    /// A string holding `count` repetitions of the single ASCII byte `byte`.
    #[must_use]
    pub fn from_repeat_ascii(count: usize, byte: u8) -> Self {
        let mut seq = Utf8Sequence::new();
        let _ = seq.append_fill(count, byte);
        Self::from_utf8_seq(seq)
    }

    /// A string holding `count` repetitions of the single wide character `cp`.
    #[must_use]
    pub fn from_repeat_wide(count: usize, cp: u32) -> Self {
        let c = Utf32::from(cp);
        let mut seq = Utf8Sequence::new();
        for _ in 0..count {
            let _ = seq.append(c);
        }
        Self::from_utf8_seq(seq)
    }

    /// A string holding `count` code points copied from `other`, starting at code-point index
    /// `start`.
    #[must_use]
    pub fn from_substr(other: &Self, start: usize, count: usize) -> Self {
        let mut seq = Utf8Sequence::new();
        let _ = seq.append_from(&other.0.seq, start, count);
        Self::from_utf8_seq(seq)
    }

    // ---- cow / row guards ---------------------------------------------------------------

    fn make_mut(&mut self) -> &mut StringBody {
        Arc::make_mut(&mut self.0)
    }

    fn reset_to(&mut self, body: StringBody) {
        self.0 = Arc::new(body);
    }

    /// The number of distinct [`UString`]/clone handles currently sharing this value's body.
    #[must_use]
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    /// `true` if `a` and `b` currently share the same body.
    #[must_use]
    pub fn body_shared(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    // ---- mutation: append_* (mirrors spec's "+=" sources, explicit length) --------------

    /// Appends a single byte, treated as its own one-byte code point.
    pub fn append_byte(&mut self, byte: u8) {
        let body = self.make_mut();
        body.rm_null();
        let _ = body.seq.append_ascii(&[byte]);
    }

    /// Appends a single code point (also used for a single wide character: both are 32-bit
    /// scalar values in this crate).
    pub fn append_code_point(&mut self, cp: u32) {
        let c = Utf32::from(cp);
        let body = self.make_mut();
        body.rm_null();
        let _ = body.seq.append(c);
    }

    /// Appends the content of `other`.
    pub fn append_str(&mut self, other: &Self) {
        let bytes = other.as_bytes();
        let n = other.len_code_points();
        let body = self.make_mut();
        body.rm_null();
        let _ = body.seq.append_raw(bytes, n);
    }

    /// Appends the content of a raw UTF-8 sequence.
    pub fn append_utf8_seq(&mut self, seq: &Utf8Sequence) {
        let bytes = seq.as_bytes();
        let n = seq.len_code_points();
        let body = self.make_mut();
        body.rm_null();
        let _ = body.seq.append_raw(bytes, n);
    }

    /// Appends the content of a raw UTF-16 sequence (already validated, never replaces).
    pub fn append_utf16_seq(&mut self, seq: &Utf16Sequence) {
        let mut tmp = Utf8Sequence::new();
        let _ = seq.apply_low_to_high(|cp| {
            let _ = tmp.append(cp);
            ControlFlow::Continue(())
        });
        self.append_utf8_seq(&tmp);
    }

    /// Appends a NUL-terminated UTF-8 byte string, stopping at the first NUL. Returns the count
    /// of malformed bytes replaced.
    pub fn append_c_str(&mut self, bytes: &[u8], default_char: u32) -> usize {
        let len = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        self.append_bytes(&bytes[..len], default_char)
    }

    /// Appends an explicit-length UTF-8 byte string. Returns the count of malformed bytes
    /// replaced.
    pub fn append_bytes(&mut self, bytes: &[u8], default_char: u32) -> usize {
        let (seq, replaced) = Utf8Sequence::convert_from_utf8(bytes, default_char);
        self.append_utf8_seq(&seq);
        replaced
    }

    /// Appends a NUL-terminated array of wide characters, stopping at the first `0`. Returns
    /// the count of invalid scalar values replaced.
    pub fn append_wide_c_str(&mut self, wide: &[u32], default_char: u32) -> usize {
        let len = wide.iter().position(|&c| c == 0).unwrap_or(wide.len());
        self.append_wide(&wide[..len], default_char)
    }

    /// Appends an explicit-length array of wide characters. Returns the count of invalid scalar
    /// values replaced.
    pub fn append_wide(&mut self, wide: &[u32], default_char: u32) -> usize {
        let (seq, replaced) = Utf8Sequence::shrink_from_u32(wide, default_char);
        self.append_utf8_seq(&seq);
        replaced
    }

    /// Appends `count` code points copied from `other`, starting at code-point index `start`.
    pub fn append_substr(&mut self, other: &Self, start: usize, count: usize) {
        let from = other.0.seq.seek(start);
        let to = other.0.seq.seek(start + count);
        let bytes = &other.0.seq.as_bytes()[from..to];
        let n = count.min(other.len_code_points().saturating_sub(start));
        let body = self.make_mut();
        body.rm_null();
        let _ = body.seq.append_raw(bytes, n);
    }

    /// Appends `count` repetitions of the ASCII byte `byte`.
    pub fn append_fill_ascii(&mut self, count: usize, byte: u8) {
        let body = self.make_mut();
        body.rm_null();
        let _ = body.seq.append_fill(count, byte);
    }

    /// Appends `count` repetitions of the wide character `cp`.
    pub fn append_fill_wide(&mut self, count: usize, cp: u32) {
        let c = Utf32::from(cp);
        let body = self.make_mut();
        body.rm_null();
        for _ in 0..count {
            let _ = body.seq.append(c);
        }
    }

    // ---- mutation: reset_* (assignment; row guard, never clones the old body) -----------

    /// Replaces the value with the empty string.
    pub fn reset_empty(&mut self) {
        self.0 = empty_body();
    }

    /// Replaces the value with the given UTF-8 sequence.
    pub fn reset_utf8_seq(&mut self, seq: Utf8Sequence) {
        self.reset_to(StringBody { seq, has_null: false });
    }

    /// Replaces the value by decoding a raw UTF-16 sequence (already validated, never
    /// replaces).
    pub fn reset_utf16_seq(&mut self, seq: &Utf16Sequence) {
        self.reset_to(StringBody { seq: Utf8Sequence::new(), has_null: false });
        let _ = seq.apply_low_to_high(|cp| {
            let _ = Arc::make_mut(&mut self.0).seq.append(cp);
            ControlFlow::Continue(())
        });
    }

    /// Replaces the value, decoding `bytes` as UTF-8. Returns the count of malformed bytes
    /// replaced.
    pub fn reset_bytes(&mut self, bytes: &[u8], default_char: u32) -> usize {
        let (seq, replaced) = Utf8Sequence::convert_from_utf8(bytes, default_char);
        self.reset_utf8_seq(seq);
        replaced
    }

    /// Replaces the value, decoding `bytes` as UTF-8 up to the first NUL. Returns the count of
    /// malformed bytes replaced.
    pub fn reset_c_str(&mut self, bytes: &[u8], default_char: u32) -> usize {
        let len = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        self.reset_bytes(&bytes[..len], default_char)
    }

    /// Replaces the value from an explicit-length array of wide characters. Returns the count
    /// of invalid scalar values replaced.
    pub fn reset_wide(&mut self, wide: &[u32], default_char: u32) -> usize {
        let (seq, replaced) = Utf8Sequence::shrink_from_u32(wide, default_char);
        self.reset_utf8_seq(seq);
        replaced
    }

    /// Replaces the value from a NUL-terminated array of wide characters. Returns the count of
    /// invalid scalar values replaced.
    pub fn reset_wide_c_str(&mut self, wide: &[u32], default_char: u32) -> usize {
        let len = wide.iter().position(|&c| c == 0).unwrap_or(wide.len());
        self.reset_wide(&wide[..len], default_char)
    }

    /// Replaces the value with `count` repetitions of the ASCII byte `byte`.
    pub fn reset_repeat_ascii(&mut self, count: usize, byte: u8) {
        let mut seq = Utf8Sequence::new();
        let _ = seq.append_fill(count, byte);
        self.reset_utf8_seq(seq);
    }

    /// Replaces the value with `count` repetitions of the wide character `cp`.
    pub fn reset_repeat_wide(&mut self, count: usize, cp: u32) {
        let c = Utf32::from(cp);
        let mut seq = Utf8Sequence::new();
        for _ in 0..count {
            let _ = seq.append(c);
        }
        self.reset_utf8_seq(seq);
    }

    /// Replaces the value with `count` code points copied from `other`, starting at code-point
    /// index `start`.
    pub fn reset_substr(&mut self, other: &Self, start: usize, count: usize) {
        let mut seq = Utf8Sequence::new();
        let _ = seq.append_from(&other.0.seq, start, count);
        self.reset_utf8_seq(seq);
    }

    // ---- mutation: misc ------------------------------------------------------------------

    /// Substitutes every occurrence of the ASCII byte `old` with `new`. A no-op if either byte
    /// is not ASCII (`>= 0x80`): substitution at that granularity could split a multi-byte
    /// sequence.
    pub fn replace(&mut self, old: u8, new: u8) {
        if old >= 0x80 || new >= 0x80 {
            return;
        }
        let body = self.make_mut();
        let len = body.payload_len();
        for i in 0..len {
            if body.seq.as_bytes()[i] == old {
                body.seq.set_byte(i, new);
            }
        }
    }

    /// Trims ASCII whitespace (space, tab, CR, LF, vertical tab, form feed) from the left
    /// and/or right end.
    pub fn trim_space(&mut self, left: bool, right: bool) {
        fn is_space(b: u8) -> bool {
            matches!(b, b' ' | b'\t' | b'\n' | b'\r' | 0x0B | 0x0C)
        }
        let bytes = self.as_bytes();
        let mut start = 0;
        let mut end = bytes.len();
        if left {
            while start < end && is_space(bytes[start]) {
                start += 1;
            }
        }
        if right {
            while end > start && is_space(bytes[end - 1]) {
                end -= 1;
            }
        }
        if start == 0 && end == bytes.len() {
            return;
        }
        let trimmed = bytes[start..end].to_vec();
        let (_, count) = Utf8Sequence::count_code_points(&trimmed);
        self.reset_utf8_seq(Utf8Sequence::from_raw(trimmed, count));
    }

    /// Drops trailing code points so that only the first `n_code_points` remain.
    pub fn truncate(&mut self, n_code_points: usize) {
        let body = self.make_mut();
        if n_code_points < body.seq.len_code_points() {
            body.rm_null();
        }
        body.seq.truncate(n_code_points);
    }

    /// Strips a matching leading/trailing quote and resolves C-style escapes (see
    /// [`unikit_escape::dequote`]). Returns whether anything changed.
    pub fn dequote(&mut self, allow_in_single_quotes: bool) -> bool {
        let (resolved, changed) = unikit_escape::dequote(self.as_bytes(), allow_in_single_quotes);
        if changed {
            let (_, count) = Utf8Sequence::count_code_points(&resolved);
            self.reset_utf8_seq(Utf8Sequence::from_raw(resolved, count));
        }
        changed
    }

    // ---- queries ---------------------------------------------------------------------

    /// The number of code points in the string.
    #[must_use]
    pub fn len_code_points(&self) -> usize {
        self.0.seq.len_code_points()
    }

    /// The number of UTF-8 bytes in the string (excluding any NUL added by [`Self::as_c_str`]).
    #[must_use]
    pub fn len_bytes(&self) -> usize {
        self.0.payload_len()
    }

    /// `true` if the string holds no code points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len_bytes() == 0
    }

    /// `true` if every byte is in the ASCII range.
    #[must_use]
    pub fn is_ascii(&self) -> bool {
        self.as_bytes().iter().all(|&b| b < 0x80)
    }

    /// `true` if the string begins with `needle`.
    #[must_use]
    pub fn starts_with(&self, needle: &[u8], case_insensitive: bool) -> bool {
        let hay = self.as_bytes();
        needle.len() <= hay.len() && byte_eq(&hay[..needle.len()], needle, case_insensitive)
    }

    /// `true` if the string ends with `needle`.
    #[must_use]
    pub fn ends_with(&self, needle: &[u8], case_insensitive: bool) -> bool {
        let hay = self.as_bytes();
        needle.len() <= hay.len()
            && byte_eq(&hay[hay.len() - needle.len()..], needle, case_insensitive)
    }

    /// `true` if `needle` occurs anywhere in the string.
    #[must_use]
    pub fn contains(&self, needle: &[u8]) -> bool {
        self.find(needle, 0) != INVALID_INDEX
    }

    fn byte_index_to_code_point(&self, target_byte: usize) -> usize {
        let bytes = self.as_bytes();
        let mut offset = 0;
        let mut count = 0;
        while offset < target_byte && offset < bytes.len() {
            let (_, n) = Utf8::decode(&bytes[offset..]).expect("payload is valid UTF-8");
            offset += n;
            count += 1;
        }
        count
    }

    /// The code-point index of the leftmost occurrence of `needle` at or after `start`, or
    /// [`INVALID_INDEX`].
    #[must_use]
    pub fn find(&self, needle: &[u8], start: usize) -> usize {
        if needle.is_empty() {
            return if start <= self.len_code_points() { start } else { INVALID_INDEX };
        }
        let from_byte = self.0.seq.seek(start);
        let hay = &self.as_bytes()[from_byte..];
        match find_bytes(hay, needle) {
            Some(rel) => self.byte_index_to_code_point(from_byte + rel),
            None => INVALID_INDEX,
        }
    }

    /// The code-point index of the rightmost occurrence of `needle` at or before `start`
    /// (`start == INVALID_INDEX` searches the whole string), or [`INVALID_INDEX`].
    #[must_use]
    pub fn rfind(&self, needle: &[u8], start: usize) -> usize {
        let len = self.len_code_points();
        let hi = if start == INVALID_INDEX || start > len { len } else { start };
        if needle.is_empty() {
            return hi;
        }
        let to_byte = self.0.seq.seek(hi);
        let bytes = self.as_bytes();
        let hay_end = (to_byte + needle.len()).min(bytes.len());
        let hay = &bytes[..hay_end];
        match rfind_bytes(hay, needle) {
            Some(rel) => self.byte_index_to_code_point(rel),
            None => INVALID_INDEX,
        }
    }

    /// The code-point index of the leftmost occurrence of `cp` at or after `start`, or
    /// [`INVALID_INDEX`].
    #[must_use]
    pub fn find_code_point(&self, cp: u32, start: usize) -> usize {
        let (buf, n) = code_point_utf8_bytes(cp);
        self.find(&buf[..n], start)
    }

    /// The code-point index of the rightmost occurrence of `cp` at or before `start`, or
    /// [`INVALID_INDEX`].
    #[must_use]
    pub fn rfind_code_point(&self, cp: u32, start: usize) -> usize {
        let (buf, n) = code_point_utf8_bytes(cp);
        self.rfind(&buf[..n], start)
    }

    /// djb2 hash of the raw UTF-8 bytes (`h = h*33 + b`, seed `5381`).
    #[must_use]
    pub fn hash(&self) -> u32 {
        djb2(self.as_bytes())
    }

    /// `value.hash() % buckets`, exposed as a free-standing static for hash-table use.
    #[must_use]
    pub fn hash_p(value: &Self, buckets: u32) -> u32 {
        value.hash() % buckets
    }

    // ---- indexing ----------------------------------------------------------------------

    /// The `i`-th code point, or `None` if out of range.
    ///
    /// Not exposed as `core::ops::Index`: a UTF-8 body can't hand back `&Utf32` to an
    /// addressable code point, since most code points span more than one stored byte.
    #[must_use]
    pub fn code_point_at(&self, i: usize) -> Option<Utf32> {
        self.0.seq.code_point_at(i)
    }

    // ---- views -------------------------------------------------------------------------

    /// A read-only view of the raw UTF-8 bytes (never includes a NUL added by
    /// [`Self::as_c_str`]).
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.payload_bytes()
    }

    /// The raw UTF-8 bytes paired with their length. A Rust slice already carries its own
    /// length, so this is a thin wrapper kept for parity with the two-overload pointer API
    /// (pointer alone vs. pointer-plus-length) callers reach for at an FFI boundary.
    #[must_use]
    pub fn as_bytes_with_len(&self) -> (&[u8], usize) {
        let bytes = self.as_bytes();
        (bytes, bytes.len())
    }

    /// A NUL-terminated view of the raw UTF-8 bytes, appending the terminator if not already
    /// present.
    pub fn as_c_str(&mut self) -> &[u8] {
        let body = self.make_mut();
        body.add_null();
        body.seq.as_bytes()
    }

    /// The underlying UTF-8 sequence body.
    #[must_use]
    pub fn as_utf8_seq(&self) -> &Utf8Sequence {
        &self.0.seq
    }

    /// Expands the string to an owned array of 32-bit wide characters (`char`, since every
    /// stored code point is, by construction, a valid Unicode scalar value).
    #[must_use]
    pub fn widen(&self) -> Vec<char> {
        self.0
            .seq
            .expand()
            .into_iter()
            .map(|v| char::from_u32(v).unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect()
    }

    /// Downcasts to one byte per code point, substituting `default_char` for any code point
    /// above `0xFF`. Returns the bytes and the count of replacements made.
    #[must_use]
    pub fn as_ascii8(&self, default_char: u8) -> (Vec<u8>, usize) {
        let mut out = Vec::with_capacity(self.len_code_points());
        let mut replaced = 0;
        let _ = self.0.seq.apply_low_to_high(|cp| {
            let v = cp.value();
            if v <= 0xFF {
                out.push(v as u8);
            } else {
                out.push(default_char);
                replaced += 1;
            }
            ControlFlow::Continue(())
        });
        (out, replaced)
    }

    // ---- conversion / serialization ------------------------------------------------------

    /// Encodes the string in the requested on-the-wire form, optionally prefixed with the
    /// matching byte-order mark. [`Bom::None`] behaves identically to [`Bom::Utf8`].
    #[must_use]
    pub fn form_utfx(&self, form: Bom, add_bom: bool) -> Vec<u8> {
        let mut out = Vec::new();
        if add_bom {
            let mut bom_buf = [0_u8; 4];
            let n = form.encode(&mut bom_buf);
            out.extend_from_slice(&bom_buf[..n]);
        }
        match form {
            Bom::Utf16Native | Bom::Utf16Swapped => {
                let swap = matches!(form, Bom::Utf16Swapped);
                let mut seq16 = Utf16Sequence::new();
                let _ = self.0.seq.apply_low_to_high(|cp| {
                    let _ = seq16.append(cp);
                    ControlFlow::Continue(())
                });
                for &u in seq16.as_units() {
                    let u = if swap { unikit_bom::bswap16(u) } else { u };
                    out.extend_from_slice(&u.to_ne_bytes());
                }
            }
            Bom::Utf32Native | Bom::Utf32Swapped => {
                let swap = matches!(form, Bom::Utf32Swapped);
                let _ = self.0.seq.apply_low_to_high(|cp| {
                    let v = if swap { unikit_bom::bswap32(cp.value()) } else { cp.value() };
                    out.extend_from_slice(&v.to_ne_bytes());
                    ControlFlow::Continue(())
                });
            }
            Bom::Utf8 | Bom::None => out.extend_from_slice(self.as_bytes()),
        }
        out
    }

    /// Decodes `bytes` using `bom` (or auto-detecting a leading byte-order mark when `None`),
    /// replacing the value. Returns the count of invalid code points replaced.
    pub fn reset_x(&mut self, bom: Option<Bom>, bytes: &[u8], default_char: u32) -> usize {
        let detected = bom.unwrap_or_else(|| Bom::decode(bytes));
        let payload = if bom.is_none() { &bytes[detected.len()..] } else { bytes };
        let (seq, replaced) = match detected {
            Bom::Utf16Native => {
                Utf8Sequence::convert_from_utf16_native(&bytes_to_u16_ne(payload), default_char)
            }
            Bom::Utf16Swapped => {
                Utf8Sequence::convert_from_utf16_swapped(&bytes_to_u16_ne(payload), default_char)
            }
            Bom::Utf32Native => Utf8Sequence::shrink_from_u32(&bytes_to_u32_ne(payload), default_char),
            Bom::Utf32Swapped => {
                let swapped: Vec<u32> =
                    bytes_to_u32_ne(payload).into_iter().map(unikit_bom::bswap32).collect();
                Utf8Sequence::shrink_from_u32(&swapped, default_char)
            }
            Bom::Utf8 | Bom::None => Utf8Sequence::convert_from_utf8(payload, default_char),
        };
        self.reset_utf8_seq(seq);
        replaced
    }

    // ---- boxing --------------------------------------------------------------------------

    /// Wraps the string at `width` columns, indenting the first line by `indent0` spaces and
    /// subsequent lines by `indent` spaces. Only defined for ASCII input: non-ASCII strings are
    /// returned unmodified (the reference implementation has a `TODO` here and falls through;
    /// see `DESIGN.md`).
    #[must_use]
    pub fn form_box(&self, indent0: usize, indent: usize, width: usize) -> Vec<u8> {
        let bytes = self.as_bytes();
        let len = bytes.len();
        if !self.is_ascii() {
            return bytes.to_vec();
        }
        if indent0 == 0 && len <= width {
            return bytes.to_vec();
        }
        if indent0 + len <= width {
            let mut out = alloc::vec![b' '; indent0];
            out.extend_from_slice(bytes);
            return out;
        }
        let height = len / width + 1;
        let mut out = Vec::with_capacity(indent0 + len + height * (indent + 1));
        out.resize(indent0, b' ');
        let mut src = 0;
        for _ in 1..height {
            out.extend_from_slice(&bytes[src..src + width]);
            src += width;
            out.push(b'\n');
            if indent > 0 {
                out.resize(out.len() + indent, b' ');
            }
        }
        let remainder = len % width;
        if remainder > 0 {
            out.extend_from_slice(&bytes[src..src + remainder]);
        } else {
            out.truncate(out.len() - indent - 1);
        }
        out
    }
}

/// Case-sensitive, case-insensitive, and reversed static comparators, for use with ordered
/// containers that want a comparator function rather than [`Ord`].
pub fn cmp_case_sensitive(a: &UString, b: &UString) -> Ordering {
    a.cmp(b)
}

/// Compares ASCII-case-insensitively.
#[must_use]
pub fn cmp_case_insensitive(a: &UString, b: &UString) -> Ordering {
    a.as_bytes().iter().map(u8::to_ascii_lowercase).cmp(b.as_bytes().iter().map(u8::to_ascii_lowercase))
}

/// The reverse of [`cmp_case_sensitive`].
#[must_use]
pub fn cmp_reversed(a: &UString, b: &UString) -> Ordering {
    b.cmp(a)
}

impl Default for UString {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for UString {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for UString {}

impl PartialOrd for UString {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for UString {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_bytes().cmp(other.as_bytes())
    }
}

impl PartialEq<[u8]> for UString {
    fn eq(&self, other: &[u8]) -> bool {
        self.as_bytes() == other
    }
}

impl PartialEq<UString> for [u8] {
    fn eq(&self, other: &UString) -> bool {
        self == other.as_bytes()
    }
}

impl PartialEq<str> for UString {
    fn eq(&self, other: &str) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl core::hash::Hash for UString {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.as_bytes().hash(state);
    }
}

impl AddAssign<u8> for UString {
    fn add_assign(&mut self, byte: u8) {
        self.append_byte(byte);
    }
}

impl AddAssign<u32> for UString {
    fn add_assign(&mut self, cp: u32) {
        self.append_code_point(cp);
    }
}

impl AddAssign<&UString> for UString {
    fn add_assign(&mut self, other: &UString) {
        self.append_str(other);
    }
}

impl AddAssign<&Utf8Sequence> for UString {
    fn add_assign(&mut self, seq: &Utf8Sequence) {
        self.append_utf8_seq(seq);
    }
}

impl fmt::Display for UString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(core::str::from_utf8(self.as_bytes()).unwrap_or(""))
    }
}

impl fmt::Debug for UString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("UString")
            .field(&core::str::from_utf8(self.as_bytes()).unwrap_or("<invalid utf8>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{Bom, UString, Utf8Sequence, INVALID_INDEX};
    use alloc::vec::Vec;
    use unikit_codepoint::Utf32;

    const SAMPLE: [u32; 16] = [
        0x0000_00AB,
        0x0000_000A,
        0x0000_007F,
        0x0000_0080,
        0x0000_00AB,
        0x0000_07FF,
        0x0000_0800,
        0x0000_ABCD,
        0x0000_FFFF,
        0x0001_0000,
        0x000A_BCDE,
        0x0010_FFFF,
        0x000A_BCDE,
        0x0000_ABCD,
        0x0000_000A,
        0x0000_000B,
    ];

    fn sample_string() -> UString {
        let (s, replaced) = UString::from_wide(&SAMPLE, u32::from(b'?'));
        assert_eq!(replaced, 0);
        s
    }

    #[test]
    fn decode_of_sample_is_41_bytes_16_code_points() {
        let s = sample_string();
        assert_eq!(s.len_code_points(), 16);
        assert_eq!(s.len_bytes(), 41);
    }

    #[test]
    fn bom_round_trip() {
        let s = sample_string();
        let bytes = s.form_utfx(Bom::Utf16Swapped, true);
        let mut t = UString::new();
        let replaced = t.reset_x(None, &bytes, u32::from(b'?'));
        assert_eq!(replaced, 0);
        assert_eq!(t.widen().iter().map(|&c| c as u32).collect::<Vec<_>>(), SAMPLE);
    }

    #[test]
    fn as_ascii8_downcast_reports_replacements() {
        let s = sample_string();
        let (bytes, replaced) = s.as_ascii8(b'x');
        assert_eq!(bytes.len(), 16);
        assert_eq!(replaced, 9);
    }

    #[test]
    fn form_box_single_line_and_wrapped() {
        let (s, _) = UString::from_bytes(b"abc123xy", u32::from(b'?'));
        assert_eq!(s.form_box(0, 0, 3), b"abc\n123\nxy");

        // This exercises the same folding rule as `form_box_single_line_and_wrapped`'s first
        // case but with non-zero indentation, forcing the general wrap path.
        let (s2, _) = UString::from_bytes(b"abc123xyz", u32::from(b'?'));
        assert_eq!(s2.form_box(1, 1, 4), b" abc1\n 23xy\n z");
    }

    #[test]
    fn hash_matches_known_value() {
        let (s, _) = UString::from_bytes(b"aRandomStringUsedForHash!!!", u32::from(b'?'));
        assert_eq!(s.hash(), 93_520_317);
        assert_eq!(UString::hash_p(&s, 131), 72);
    }

    #[test]
    fn clone_shares_body_until_mutated() {
        let s = UString::from_bytes(b"hello", u32::from(b'?')).0;
        let mut t = s.clone();
        assert!(UString::body_shared(&s, &t));
        t.append_byte(b'!');
        assert!(!UString::body_shared(&s, &t));
        assert_eq!(s.as_bytes(), b"hello");
        assert_eq!(t.as_bytes(), b"hello!");
    }

    #[test]
    fn find_rfind_contains_agree() {
        let (s, _) = UString::from_bytes(b"abcabc", u32::from(b'?'));
        assert_eq!(s.find(b"bc", 0), 1);
        assert_eq!(s.rfind(b"bc", INVALID_INDEX), 4);
        assert!(s.contains(b"bc"));
        assert!(!s.contains(b"zz"));
        assert_eq!(s.find(b"zz", 0), INVALID_INDEX);
    }

    #[test]
    fn rfind_with_explicit_start_finds_match_starting_at_start() {
        let (s, _) = UString::from_bytes(b"abcabc", u32::from(b'?'));
        assert_eq!(s.rfind(b"bc", 4), 4);
        assert_eq!(s.rfind(b"bc", 3), 1);
    }

    #[test]
    fn trim_space_is_idempotent_and_shortening() {
        let (mut s, _) = UString::from_bytes(b"  hi there  ", u32::from(b'?'));
        let before = s.len_bytes();
        s.trim_space(true, true);
        assert_eq!(s.as_bytes(), b"hi there");
        assert!(s.len_bytes() < before);
        let after_first = s.len_bytes();
        s.trim_space(true, true);
        assert_eq!(s.len_bytes(), after_first);
    }

    #[test]
    fn replace_is_ascii_only() {
        let (mut s, _) = UString::from_bytes(b"a-b-c", u32::from(b'?'));
        s.replace(b'-', b'_');
        assert_eq!(s.as_bytes(), b"a_b_c");
    }

    #[test]
    fn dequote_round_trip() {
        let (mut s, _) = UString::from_bytes(b"\"abc\\'\\\"123\"", u32::from(b'?'));
        let changed = s.dequote(true);
        assert!(changed);
        assert_eq!(s.as_bytes(), b"abc'\"123");
    }

    #[test]
    fn as_c_str_appends_null_once() {
        let mut s = UString::from_bytes(b"hi", u32::from(b'?')).0;
        assert_eq!(s.as_c_str(), b"hi\0");
        assert_eq!(s.as_c_str(), b"hi\0");
        assert_eq!(s.len_bytes(), 2);
    }

    #[test]
    fn as_bytes_with_len_matches_as_bytes() {
        let (s, _) = UString::from_bytes(b"hi there", u32::from(b'?'));
        let (bytes, len) = s.as_bytes_with_len();
        assert_eq!(bytes, s.as_bytes());
        assert_eq!(len, s.as_bytes().len());
    }

    #[test]
    fn ordering_and_case_insensitive_comparator() {
        let (a, _) = UString::from_bytes(b"Abc", u32::from(b'?'));
        let (b, _) = UString::from_bytes(b"abc", u32::from(b'?'));
        assert!(a < b);
        assert_eq!(super::cmp_case_insensitive(&a, &b), core::cmp::Ordering::Equal);
    }

    #[test]
    fn append_code_point_and_widen() {
        let mut s = UString::new();
        s.append_code_point(0x1F600);
        s.append_byte(b'!');
        assert_eq!(s.widen(), alloc::vec![char::from_u32(0x1F600).unwrap(), '!']);
    }

    #[test]
    fn utf8_seq_construction_matches_direct_bytes() {
        let mut seq = Utf8Sequence::new();
        let _ = seq.append(Utf32::from(b'h' as u32));
        let _ = seq.append(Utf32::from(b'i' as u32));
        let s = UString::from_utf8_seq(seq);
        assert_eq!(s.as_bytes(), b"hi");
    }

    proptest::proptest! {
        #[test]
        fn widen_round_trips_through_from_wide(
            cps in proptest::collection::vec(
                proptest::prelude::prop_oneof![0_u32..0xD800, 0xE000_u32..=0x0010_FFFF],
                0..32,
            )
        ) {
            let (s, replaced) = UString::from_wide(&cps, u32::from(b'?'));
            proptest::prop_assert_eq!(replaced, 0);
            let widened: Vec<u32> = s.widen().iter().map(|&c| c as u32).collect();
            proptest::prop_assert_eq!(widened, cps);
        }

        #[test]
        fn append_str_length_is_additive(a in "[ -~]{0,16}", b in "[ -~]{0,16}") {
            let (mut x, _) = UString::from_bytes(a.as_bytes(), u32::from(b'?'));
            let (y, _) = UString::from_bytes(b.as_bytes(), u32::from(b'?'));
            let before = x.len_code_points();
            x.append_str(&y);
            proptest::prop_assert_eq!(x.len_code_points(), before + y.len_code_points());
        }
    }
}
