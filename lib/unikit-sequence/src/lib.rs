//! Growable sequence bodies over UTF-8 bytes and native-endian UTF-16 code units.
//!
//! [`Utf8Sequence`] and [`Utf16Sequence`] both implement [`Sequence`], the shared capability
//! set: character/byte counts, expansion to and shrinking from a flat `u32` code-point array,
//! ordered callback iteration, and cloning. Each concrete type additionally exposes the
//! mutating operations ([`Utf8Sequence::append`], [`Utf8Sequence::truncate`], ...) and the
//! conversion endpoints that decode from or encode into the other on-the-wire forms.
#![cfg_attr(all(not(feature = "std"), not(test)), no_std)]

extern crate alloc;

use alloc::vec::Vec;
use core::ops::ControlFlow;

pub use unikit_buffer::{Growth, GrowthError};

use unikit_buffer::Buffer;
use unikit_codepoint::{
    LeaderByte, Utf16, Utf32, Utf8, MAX_HIGH_SURROGATE, MAX_LOW_SURROGATE, MIN_HIGH_SURROGATE,
    MIN_LOW_SURROGATE,
};

/// The capability set shared by every UTFx sequence body, independent of its concrete
/// encoding.
pub trait Sequence: Clone {
    /// The number of code points currently stored.
    fn len_code_points(&self) -> usize;

    /// The number of storage units (bytes or 16-bit words) currently stored.
    fn len_bytes(&self) -> usize;

    /// Returns the `i`-th code point, or `None` if `i` is out of range.
    fn code_point_at(&self, i: usize) -> Option<Utf32>;

    /// Expands the sequence to a freshly allocated array of 32-bit code points.
    #[must_use]
    fn expand(&self) -> Vec<u32> {
        let mut out = alloc::vec![0_u32; self.len_code_points()];
        self.expand_into(&mut out);
        out
    }

    /// Expands the sequence into `out`, writing at most `out.len()` code points. Returns the
    /// number of code points written.
    fn expand_into(&self, out: &mut [u32]) -> usize;

    /// Walks code points from first to last, stopping early if `f` returns
    /// [`ControlFlow::Break`]. Returns `true` if iteration reached the end.
    fn apply_low_to_high<F: FnMut(Utf32) -> ControlFlow<()>>(&self, f: F) -> bool;

    /// Walks code points from last to first, stopping early if `f` returns
    /// [`ControlFlow::Break`]. Returns `true` if iteration reached the start.
    fn apply_high_to_low<F: FnMut(Utf32) -> ControlFlow<()>>(&self, f: F) -> bool;

    /// A deep copy of the sequence, preserving encoding.
    #[must_use]
    fn clone_seq(&self) -> Self {
        self.clone()
    }
}

#[inline]
fn leader_len(byte0: u8) -> usize {
    match Utf8::seq_length_from_leader(byte0) {
        LeaderByte::Length(n) => usize::from(n),
        LeaderByte::InvalidByte0 | LeaderByte::InvalidByte => 1,
    }
}

/// A growable sequence of UTF-8 bytes.
#[derive(Clone, Debug, Default)]
pub struct Utf8Sequence {
    buf: Buffer<u8>,
    code_points: usize,
}

impl Utf8Sequence {
    /// Creates an empty, exponentially-growing sequence.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty sequence with the given growth policy.
    #[must_use]
    pub fn with_growth(growth: Growth) -> Self {
        Self { buf: Buffer::new(growth), code_points: 0 }
    }

    /// A read-only view of the raw bytes.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.buf.as_slice()
    }

    /// `true` when every code point stored is a single byte, making indexing and iteration
    /// O(1) per step.
    #[inline]
    #[must_use]
    pub fn is_single_byte_fast_path(&self) -> bool {
        self.code_points == self.buf.len()
    }

    fn prev_byte_len_at(&self, offset: usize) -> usize {
        let bytes = self.buf.as_slice();
        let mut start = offset - 1;
        while start > 0 && (bytes[start] & 0xC0) == 0x80 {
            start -= 1;
        }
        offset - start
    }

    /// The byte offset of the `i`-th code point, walking from whichever end is closer.
    /// Returns `len_bytes()` when `i >= len_code_points()`.
    #[must_use]
    pub fn seek(&self, i: usize) -> usize {
        if i == 0 {
            return 0;
        }
        if i >= self.code_points {
            return self.buf.len();
        }
        if self.is_single_byte_fast_path() {
            return i;
        }
        if i <= self.code_points / 2 {
            let mut offset = 0;
            let mut count = 0;
            while count < i {
                offset += leader_len(self.buf.as_slice()[offset]);
                count += 1;
            }
            offset
        } else {
            let mut offset = self.buf.len();
            let mut count = self.code_points;
            while count > i {
                offset -= self.prev_byte_len_at(offset);
                count -= 1;
            }
            offset
        }
    }

    /// Appends one code point, growing the backing buffer as needed.
    pub fn append(&mut self, cp: Utf32) -> Result<(), GrowthError> {
        let mut tmp = [0_u8; 4];
        let n = Utf8::from(cp).encode(&mut tmp);
        self.buf.extend_from_slice(&tmp[..n])?;
        self.code_points += 1;
        Ok(())
    }

    /// Appends raw bytes that the caller asserts are already a valid UTF-8 sequence encoding
    /// exactly `n_code_points` code points.
    pub fn append_raw(&mut self, bytes: &[u8], n_code_points: usize) -> Result<(), GrowthError> {
        self.buf.extend_from_slice(bytes)?;
        self.code_points += n_code_points;
        Ok(())
    }

    /// Appends each byte of `ascii` as its own one-byte code point.
    pub fn append_ascii(&mut self, ascii: &[u8]) -> Result<(), GrowthError> {
        self.append_raw(ascii, ascii.len())
    }

    /// Appends `count` code points copied from `other`, starting at code-point index `start`.
    pub fn append_from(&mut self, other: &Self, start: usize, count: usize) -> Result<(), GrowthError> {
        let from = other.seek(start);
        let to = other.seek(start + count);
        self.append_raw(&other.buf.as_slice()[from..to], count)
    }

    /// Appends `count` repetitions of the single ASCII byte `ascii_byte`.
    pub fn append_fill(&mut self, count: usize, ascii_byte: u8) -> Result<(), GrowthError> {
        let fill = alloc::vec![ascii_byte; count];
        self.append_raw(&fill, count)
    }

    /// Drops trailing code points so that only the first `n_code_points` remain. A no-op if
    /// `n_code_points >= len_code_points()`.
    pub fn truncate(&mut self, n_code_points: usize) {
        if n_code_points >= self.code_points {
            return;
        }
        let offset = self.seek(n_code_points);
        self.buf.truncate(offset);
        self.code_points = n_code_points;
    }

    /// Drops trailing raw bytes down to exactly `new_len`, without adjusting the code-point
    /// count. For trimming bookkeeping bytes (e.g. a NUL terminator) appended through
    /// [`Self::append_raw`] with `n_code_points == 0`; callers that truncate real payload are
    /// responsible for keeping the code-point count consistent themselves.
    pub fn truncate_bytes(&mut self, new_len: usize) {
        self.buf.truncate(new_len);
    }

    /// Overwrites the byte at byte offset `i`. Intended for ASCII fast paths, where byte
    /// offset and code-point index coincide.
    pub fn set_byte(&mut self, i: usize, b: u8) {
        self.buf.as_mut_slice()[i] = b;
    }

    /// Adopts an owned, pre-validated byte buffer as the sequence body.
    #[must_use]
    pub fn from_raw(bytes: Vec<u8>, n_code_points: usize) -> Self {
        Self { buf: Buffer::from_vec(bytes, Growth::Exponential), code_points: n_code_points }
    }

    /// Gives up the backing buffer, leaving the sequence empty.
    #[must_use]
    pub fn detach(&mut self) -> Vec<u8> {
        self.code_points = 0;
        core::mem::take(&mut self.buf).into_vec()
    }

    /// Decodes `bytes` as UTF-8, replacing malformed or invalid code points with
    /// `default_char`. Returns the new sequence and the count of replacements made.
    #[must_use]
    pub fn convert_from_utf8(bytes: &[u8], default_char: u32) -> (Self, usize) {
        let mut seq = Self::new();
        let mut i = 0;
        let mut replaced = 0;
        while i < bytes.len() {
            match Utf8::decode(&bytes[i..]) {
                Some((cp, n)) => {
                    let _ = seq.append(Utf32::from(cp));
                    i += n;
                }
                None => {
                    let _ = seq.append(Utf32::from(default_char));
                    i += 1;
                    replaced += 1;
                }
            }
        }
        (seq, replaced)
    }

    /// Decodes `units` as native-endian UTF-16, replacing malformed or invalid code points
    /// with `default_char`. Returns the new sequence and the count of replacements made.
    #[must_use]
    pub fn convert_from_utf16_native(units: &[u16], default_char: u32) -> (Self, usize) {
        let mut seq = Self::new();
        let mut i = 0;
        let mut replaced = 0;
        while i < units.len() {
            match Utf16::decode(&units[i..]) {
                Some((cp, n)) => {
                    let _ = seq.append(Utf32::from(cp));
                    i += n;
                }
                None => {
                    let _ = seq.append(Utf32::from(default_char));
                    i += 1;
                    replaced += 1;
                }
            }
        }
        (seq, replaced)
    }

    /// Decodes `units` as byte-swapped UTF-16, replacing malformed or invalid code points
    /// with `default_char`. Returns the new sequence and the count of replacements made.
    #[must_use]
    pub fn convert_from_utf16_swapped(units: &[u16], default_char: u32) -> (Self, usize) {
        let swapped: Vec<u16> = units.iter().copied().map(unikit_bom::bswap16).collect();
        Self::convert_from_utf16_native(&swapped, default_char)
    }

    /// Rebuilds a sequence from a flat array of 32-bit code points, replacing invalid entries
    /// with `default_char`. Returns the new sequence and the count of replacements made.
    #[must_use]
    pub fn shrink_from_u32(src: &[u32], default_char: u32) -> (Self, usize) {
        let mut seq = Self::new();
        let mut replaced = 0;
        for &v in src {
            if unikit_codepoint::is_valid(v) {
                let _ = seq.append(Utf32::from_valid(v));
            } else {
                let _ = seq.append(Utf32::from(default_char));
                replaced += 1;
            }
        }
        (seq, replaced)
    }

    /// Rebuilds a sequence from a flat array of 32-bit code points the caller has already
    /// validated. Skips the per-entry validity check `shrink_from_u32` performs; passing an
    /// out-of-range value here produces a sequence holding that invalid value.
    #[must_use]
    pub fn shrink_from_u32_unchecked(src: &[u32]) -> Self {
        let mut seq = Self::new();
        for &v in src {
            let _ = seq.append(Utf32::from_valid(v));
        }
        seq
    }

    /// Walks `bytes` as UTF-8, counting valid code points until the first invalid prefix.
    /// Returns `(true, count)` if all of `bytes` decoded cleanly, `(false, count)` otherwise.
    #[must_use]
    pub fn count_code_points(bytes: &[u8]) -> (bool, usize) {
        let mut i = 0;
        let mut count = 0;
        while i < bytes.len() {
            match Utf8::decode(&bytes[i..]) {
                Some((_, n)) => {
                    i += n;
                    count += 1;
                }
                None => return (false, count),
            }
        }
        (true, count)
    }

    /// Validates that `bytes` is a well-formed UTF-8 sequence, returning the byte offset of
    /// the first invalid unit on failure.
    pub fn is_valid(bytes: &[u8]) -> Result<(), usize> {
        let mut i = 0;
        while i < bytes.len() {
            match Utf8::decode(&bytes[i..]) {
                Some((_, n)) => i += n,
                None => return Err(i),
            }
        }
        Ok(())
    }

    /// A borrowing, forward/backward code-point iterator over this sequence.
    #[must_use]
    pub fn iter(&self) -> Utf8Iter<'_> {
        Utf8Iter { seq: self, offset: 0 }
    }

    /// An owning code-point iterator that snapshots this sequence at attach time, safe
    /// against concurrent mutation of the original.
    #[must_use]
    pub fn iter_owned(&self) -> Utf8OwningIter {
        Utf8OwningIter { seq: self.clone(), offset: 0 }
    }
}

impl Sequence for Utf8Sequence {
    fn len_code_points(&self) -> usize {
        self.code_points
    }

    fn len_bytes(&self) -> usize {
        self.buf.len()
    }

    fn code_point_at(&self, i: usize) -> Option<Utf32> {
        if i >= self.code_points {
            return None;
        }
        let offset = self.seek(i);
        Utf8::decode(&self.buf.as_slice()[offset..]).map(|(cp, _)| Utf32::from(cp))
    }

    fn expand_into(&self, out: &mut [u32]) -> usize {
        let mut offset = 0;
        let mut i = 0;
        while offset < self.buf.len() && i < out.len() {
            let (cp, n) =
                Utf8::decode(&self.buf.as_slice()[offset..]).expect("sequence body is valid UTF-8");
            out[i] = cp.value();
            offset += n;
            i += 1;
        }
        i
    }

    fn apply_low_to_high<F: FnMut(Utf32) -> ControlFlow<()>>(&self, mut f: F) -> bool {
        let mut offset = 0;
        while offset < self.buf.len() {
            let (cp, n) =
                Utf8::decode(&self.buf.as_slice()[offset..]).expect("sequence body is valid UTF-8");
            if f(Utf32::from(cp)).is_break() {
                return false;
            }
            offset += n;
        }
        true
    }

    fn apply_high_to_low<F: FnMut(Utf32) -> ControlFlow<()>>(&self, mut f: F) -> bool {
        let mut offset = self.buf.len();
        while offset > 0 {
            let len = self.prev_byte_len_at(offset);
            let start = offset - len;
            let (cp, _) = Utf8::decode(&self.buf.as_slice()[start..offset])
                .expect("sequence body is valid UTF-8");
            if f(Utf32::from(cp)).is_break() {
                return false;
            }
            offset = start;
        }
        true
    }
}

/// A borrowing code-point iterator over a [`Utf8Sequence`].
#[derive(Clone, Debug)]
pub struct Utf8Iter<'a> {
    seq: &'a Utf8Sequence,
    offset: usize,
}

impl<'a> Utf8Iter<'a> {
    /// Rewinds to the previous code point, returning it, or `None` at the start.
    pub fn prev(&mut self) -> Option<Utf32> {
        if self.offset == 0 {
            return None;
        }
        let len = self.seq.prev_byte_len_at(self.offset);
        let start = self.offset - len;
        let (cp, _) = Utf8::decode(&self.seq.buf.as_slice()[start..self.offset])?;
        self.offset = start;
        Some(Utf32::from(cp))
    }

    /// Reads the code point to the left of the cursor without moving.
    #[must_use]
    pub fn peek_left(&self) -> Option<Utf32> {
        if self.offset == 0 {
            return None;
        }
        let len = self.seq.prev_byte_len_at(self.offset);
        let start = self.offset - len;
        Utf8::decode(&self.seq.buf.as_slice()[start..self.offset]).map(|(cp, _)| Utf32::from(cp))
    }

    /// Reads the code point to the right of the cursor without moving.
    #[must_use]
    pub fn peek_right(&self) -> Option<Utf32> {
        Utf8::decode(&self.seq.buf.as_slice()[self.offset..]).map(|(cp, _)| Utf32::from(cp))
    }
}

impl<'a> Iterator for Utf8Iter<'a> {
    type Item = Utf32;

    fn next(&mut self) -> Option<Utf32> {
        let (cp, n) = Utf8::decode(&self.seq.buf.as_slice()[self.offset..])?;
        self.offset += n;
        Some(Utf32::from(cp))
    }
}

/// An owning code-point iterator over a snapshot of a [`Utf8Sequence`].
#[derive(Clone, Debug)]
pub struct Utf8OwningIter {
    seq: Utf8Sequence,
    offset: usize,
}

impl Utf8OwningIter {
    /// Rewinds to the previous code point, returning it, or `None` at the start.
    pub fn prev(&mut self) -> Option<Utf32> {
        if self.offset == 0 {
            return None;
        }
        let len = self.seq.prev_byte_len_at(self.offset);
        let start = self.offset - len;
        let (cp, _) = Utf8::decode(&self.seq.buf.as_slice()[start..self.offset])?;
        self.offset = start;
        Some(Utf32::from(cp))
    }

    /// Reads the code point to the left of the cursor without moving.
    #[must_use]
    pub fn peek_left(&self) -> Option<Utf32> {
        if self.offset == 0 {
            return None;
        }
        let len = self.seq.prev_byte_len_at(self.offset);
        let start = self.offset - len;
        Utf8::decode(&self.seq.buf.as_slice()[start..self.offset]).map(|(cp, _)| Utf32::from(cp))
    }

    /// Reads the code point to the right of the cursor without moving.
    #[must_use]
    pub fn peek_right(&self) -> Option<Utf32> {
        Utf8::decode(&self.seq.buf.as_slice()[self.offset..]).map(|(cp, _)| Utf32::from(cp))
    }
}

impl Iterator for Utf8OwningIter {
    type Item = Utf32;

    fn next(&mut self) -> Option<Utf32> {
        let (cp, n) = Utf8::decode(&self.seq.buf.as_slice()[self.offset..])?;
        self.offset += n;
        Some(Utf32::from(cp))
    }
}

#[inline]
fn is_high_surrogate(u: u16) -> bool {
    (MIN_HIGH_SURROGATE..=MAX_HIGH_SURROGATE).contains(&u)
}

#[inline]
fn is_low_surrogate(u: u16) -> bool {
    (MIN_LOW_SURROGATE..=MAX_LOW_SURROGATE).contains(&u)
}

/// A growable sequence of native-endian UTF-16 code units.
#[derive(Clone, Debug, Default)]
pub struct Utf16Sequence {
    buf: Buffer<u16>,
    code_points: usize,
}

impl Utf16Sequence {
    /// Creates an empty, exponentially-growing sequence.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty sequence with the given growth policy.
    #[must_use]
    pub fn with_growth(growth: Growth) -> Self {
        Self { buf: Buffer::new(growth), code_points: 0 }
    }

    /// A read-only view of the raw, native-endian code units.
    #[inline]
    #[must_use]
    pub fn as_units(&self) -> &[u16] {
        self.buf.as_slice()
    }

    /// `true` when every code point stored is a single unit, making indexing and iteration
    /// O(1) per step.
    #[inline]
    #[must_use]
    pub fn is_single_unit_fast_path(&self) -> bool {
        self.code_points == self.buf.len()
    }

    fn prev_unit_len_at(&self, offset: usize) -> usize {
        if offset >= 2 && is_low_surrogate(self.buf.as_slice()[offset - 1]) {
            2
        } else {
            1
        }
    }

    /// The unit offset of the `i`-th code point, walking from whichever end is closer.
    /// Returns `len_bytes()` (in units) when `i >= len_code_points()`.
    #[must_use]
    pub fn seek(&self, i: usize) -> usize {
        if i == 0 {
            return 0;
        }
        if i >= self.code_points {
            return self.buf.len();
        }
        if self.is_single_unit_fast_path() {
            return i;
        }
        if i <= self.code_points / 2 {
            let mut offset = 0;
            let mut count = 0;
            while count < i {
                offset += if is_high_surrogate(self.buf.as_slice()[offset]) { 2 } else { 1 };
                count += 1;
            }
            offset
        } else {
            let mut offset = self.buf.len();
            let mut count = self.code_points;
            while count > i {
                offset -= self.prev_unit_len_at(offset);
                count -= 1;
            }
            offset
        }
    }

    /// Appends one code point, growing the backing buffer as needed.
    pub fn append(&mut self, cp: Utf32) -> Result<(), GrowthError> {
        let mut tmp = [0_u16; 2];
        let n = Utf16::from(cp).encode(&mut tmp);
        self.buf.extend_from_slice(&tmp[..n])?;
        self.code_points += 1;
        Ok(())
    }

    /// Appends raw units that the caller asserts already encode exactly `n_code_points` valid
    /// code points in native-endian UTF-16.
    pub fn append_raw(&mut self, units: &[u16], n_code_points: usize) -> Result<(), GrowthError> {
        self.buf.extend_from_slice(units)?;
        self.code_points += n_code_points;
        Ok(())
    }

    /// Appends `count` code points copied from `other`, starting at code-point index `start`.
    pub fn append_from(&mut self, other: &Self, start: usize, count: usize) -> Result<(), GrowthError> {
        let from = other.seek(start);
        let to = other.seek(start + count);
        self.append_raw(&other.buf.as_slice()[from..to], count)
    }

    /// Drops trailing code points so that only the first `n_code_points` remain. A no-op if
    /// `n_code_points >= len_code_points()`.
    pub fn truncate(&mut self, n_code_points: usize) {
        if n_code_points >= self.code_points {
            return;
        }
        let offset = self.seek(n_code_points);
        self.buf.truncate(offset);
        self.code_points = n_code_points;
    }

    /// Adopts an owned, pre-validated native-endian unit buffer as the sequence body.
    #[must_use]
    pub fn from_raw(units: Vec<u16>, n_code_points: usize) -> Self {
        Self { buf: Buffer::from_vec(units, Growth::Exponential), code_points: n_code_points }
    }

    /// Gives up the backing buffer, leaving the sequence empty.
    #[must_use]
    pub fn detach(&mut self) -> Vec<u16> {
        self.code_points = 0;
        core::mem::take(&mut self.buf).into_vec()
    }

    /// Decodes `bytes` as UTF-8, replacing malformed or invalid code points with
    /// `default_char`. Returns the new sequence and the count of replacements made.
    #[must_use]
    pub fn convert_from_utf8(bytes: &[u8], default_char: u32) -> (Self, usize) {
        let mut seq = Self::new();
        let mut i = 0;
        let mut replaced = 0;
        while i < bytes.len() {
            match Utf8::decode(&bytes[i..]) {
                Some((cp, n)) => {
                    let _ = seq.append(Utf32::from(cp));
                    i += n;
                }
                None => {
                    let _ = seq.append(Utf32::from(default_char));
                    i += 1;
                    replaced += 1;
                }
            }
        }
        (seq, replaced)
    }

    /// Validates and re-encodes `units` as native-endian UTF-16, replacing malformed or
    /// invalid code points with `default_char`. Returns the new sequence and the count of
    /// replacements made.
    #[must_use]
    pub fn convert_from_utf16_native(units: &[u16], default_char: u32) -> (Self, usize) {
        let mut seq = Self::new();
        let mut i = 0;
        let mut replaced = 0;
        while i < units.len() {
            match Utf16::decode(&units[i..]) {
                Some((cp, n)) => {
                    let _ = seq.append(Utf32::from(cp));
                    i += n;
                }
                None => {
                    let _ = seq.append(Utf32::from(default_char));
                    i += 1;
                    replaced += 1;
                }
            }
        }
        (seq, replaced)
    }

    /// Byte-swaps each unit of `units` and decodes the result as native-endian UTF-16,
    /// replacing malformed or invalid code points with `default_char`.
    #[must_use]
    pub fn convert_from_utf16_swapped(units: &[u16], default_char: u32) -> (Self, usize) {
        let swapped: Vec<u16> = units.iter().copied().map(unikit_bom::bswap16).collect();
        Self::convert_from_utf16_native(&swapped, default_char)
    }

    /// Rebuilds a sequence from a flat array of 32-bit code points, replacing invalid entries
    /// with `default_char`. Returns the new sequence and the count of replacements made.
    #[must_use]
    pub fn shrink_from_u32(src: &[u32], default_char: u32) -> (Self, usize) {
        let mut seq = Self::new();
        let mut replaced = 0;
        for &v in src {
            if unikit_codepoint::is_valid(v) {
                let _ = seq.append(Utf32::from_valid(v));
            } else {
                let _ = seq.append(Utf32::from(default_char));
                replaced += 1;
            }
        }
        (seq, replaced)
    }

    /// Rebuilds a sequence from a flat array of 32-bit code points the caller has already
    /// validated. Skips the per-entry validity check `shrink_from_u32` performs; passing an
    /// out-of-range value here produces a sequence holding that invalid value.
    #[must_use]
    pub fn shrink_from_u32_unchecked(src: &[u32]) -> Self {
        let mut seq = Self::new();
        for &v in src {
            let _ = seq.append(Utf32::from_valid(v));
        }
        seq
    }

    /// Walks `units` as native-endian UTF-16, counting valid code points until the first
    /// invalid prefix. Returns `(true, count)` if all of `units` decoded cleanly.
    #[must_use]
    pub fn count_code_points(units: &[u16]) -> (bool, usize) {
        let mut i = 0;
        let mut count = 0;
        while i < units.len() {
            match Utf16::decode(&units[i..]) {
                Some((_, n)) => {
                    i += n;
                    count += 1;
                }
                None => return (false, count),
            }
        }
        (true, count)
    }

    /// Validates that `units` is well-formed native-endian UTF-16, returning the unit offset
    /// of the first invalid unit on failure.
    pub fn is_valid(units: &[u16]) -> Result<(), usize> {
        let mut i = 0;
        while i < units.len() {
            match Utf16::decode(&units[i..]) {
                Some((_, n)) => i += n,
                None => return Err(i),
            }
        }
        Ok(())
    }

    /// A borrowing, forward/backward code-point iterator over this sequence.
    #[must_use]
    pub fn iter(&self) -> Utf16Iter<'_> {
        Utf16Iter { seq: self, offset: 0 }
    }

    /// An owning code-point iterator that snapshots this sequence at attach time.
    #[must_use]
    pub fn iter_owned(&self) -> Utf16OwningIter {
        Utf16OwningIter { seq: self.clone(), offset: 0 }
    }
}

impl Sequence for Utf16Sequence {
    fn len_code_points(&self) -> usize {
        self.code_points
    }

    fn len_bytes(&self) -> usize {
        self.buf.len() * 2
    }

    fn code_point_at(&self, i: usize) -> Option<Utf32> {
        if i >= self.code_points {
            return None;
        }
        let offset = self.seek(i);
        Utf16::decode(&self.buf.as_slice()[offset..]).map(|(cp, _)| Utf32::from(cp))
    }

    fn expand_into(&self, out: &mut [u32]) -> usize {
        let mut offset = 0;
        let mut i = 0;
        while offset < self.buf.len() && i < out.len() {
            let (cp, n) = Utf16::decode(&self.buf.as_slice()[offset..])
                .expect("sequence body is valid UTF-16");
            out[i] = cp.value();
            offset += n;
            i += 1;
        }
        i
    }

    fn apply_low_to_high<F: FnMut(Utf32) -> ControlFlow<()>>(&self, mut f: F) -> bool {
        let mut offset = 0;
        while offset < self.buf.len() {
            let (cp, n) = Utf16::decode(&self.buf.as_slice()[offset..])
                .expect("sequence body is valid UTF-16");
            if f(Utf32::from(cp)).is_break() {
                return false;
            }
            offset += n;
        }
        true
    }

    fn apply_high_to_low<F: FnMut(Utf32) -> ControlFlow<()>>(&self, mut f: F) -> bool {
        let mut offset = self.buf.len();
        while offset > 0 {
            let len = self.prev_unit_len_at(offset);
            let start = offset - len;
            let (cp, _) = Utf16::decode(&self.buf.as_slice()[start..offset])
                .expect("sequence body is valid UTF-16");
            if f(Utf32::from(cp)).is_break() {
                return false;
            }
            offset = start;
        }
        true
    }
}

/// A borrowing code-point iterator over a [`Utf16Sequence`].
#[derive(Clone, Debug)]
pub struct Utf16Iter<'a> {
    seq: &'a Utf16Sequence,
    offset: usize,
}

impl<'a> Utf16Iter<'a> {
    /// Rewinds to the previous code point, returning it, or `None` at the start.
    pub fn prev(&mut self) -> Option<Utf32> {
        if self.offset == 0 {
            return None;
        }
        let len = self.seq.prev_unit_len_at(self.offset);
        let start = self.offset - len;
        let (cp, _) = Utf16::decode(&self.seq.buf.as_slice()[start..self.offset])?;
        self.offset = start;
        Some(Utf32::from(cp))
    }

    /// Reads the code point to the left of the cursor without moving.
    #[must_use]
    pub fn peek_left(&self) -> Option<Utf32> {
        if self.offset == 0 {
            return None;
        }
        let len = self.seq.prev_unit_len_at(self.offset);
        let start = self.offset - len;
        Utf16::decode(&self.seq.buf.as_slice()[start..self.offset]).map(|(cp, _)| Utf32::from(cp))
    }

    /// Reads the code point to the right of the cursor without moving.
    #[must_use]
    pub fn peek_right(&self) -> Option<Utf32> {
        Utf16::decode(&self.seq.buf.as_slice()[self.offset..]).map(|(cp, _)| Utf32::from(cp))
    }
}

impl<'a> Iterator for Utf16Iter<'a> {
    type Item = Utf32;

    fn next(&mut self) -> Option<Utf32> {
        let (cp, n) = Utf16::decode(&self.seq.buf.as_slice()[self.offset..])?;
        self.offset += n;
        Some(Utf32::from(cp))
    }
}

/// An owning code-point iterator over a snapshot of a [`Utf16Sequence`].
#[derive(Clone, Debug)]
pub struct Utf16OwningIter {
    seq: Utf16Sequence,
    offset: usize,
}

impl Utf16OwningIter {
    /// Rewinds to the previous code point, returning it, or `None` at the start.
    pub fn prev(&mut self) -> Option<Utf32> {
        if self.offset == 0 {
            return None;
        }
        let len = self.seq.prev_unit_len_at(self.offset);
        let start = self.offset - len;
        let (cp, _) = Utf16::decode(&self.seq.buf.as_slice()[start..self.offset])?;
        self.offset = start;
        Some(Utf32::from(cp))
    }

    /// Reads the code point to the left of the cursor without moving.
    #[must_use]
    pub fn peek_left(&self) -> Option<Utf32> {
        if self.offset == 0 {
            return None;
        }
        let len = self.seq.prev_unit_len_at(self.offset);
        let start = self.offset - len;
        Utf16::decode(&self.seq.buf.as_slice()[start..self.offset]).map(|(cp, _)| Utf32::from(cp))
    }

    /// Reads the code point to the right of the cursor without moving.
    #[must_use]
    pub fn peek_right(&self) -> Option<Utf32> {
        Utf16::decode(&self.seq.buf.as_slice()[self.offset..]).map(|(cp, _)| Utf32::from(cp))
    }
}

impl Iterator for Utf16OwningIter {
    type Item = Utf32;

    fn next(&mut self) -> Option<Utf32> {
        let (cp, n) = Utf16::decode(&self.seq.buf.as_slice()[self.offset..])?;
        self.offset += n;
        Some(Utf32::from(cp))
    }
}

#[cfg(test)]
mod tests {
    use super::{Sequence, Utf16Sequence, Utf8Sequence};
    use core::ops::ControlFlow;
    use proptest::prelude::*;
    use unikit_codepoint::Utf32;

    fn valid_code_point() -> impl Strategy<Value = u32> {
        prop_oneof![0_u32..0xD800, 0xE000_u32..=0x0010_FFFF]
    }

    #[test]
    fn append_and_index() {
        let mut seq = Utf8Sequence::new();
        seq.append(Utf32::from(b'a' as u32)).unwrap();
        seq.append(Utf32::from(0x00AB_u32)).unwrap();
        seq.append(Utf32::from(0x1_0000_u32)).unwrap();
        assert_eq!(seq.len_code_points(), 3);
        assert_eq!(seq.code_point_at(0).unwrap().value(), b'a' as u32);
        assert_eq!(seq.code_point_at(1).unwrap().value(), 0x00AB);
        assert_eq!(seq.code_point_at(2).unwrap().value(), 0x1_0000);
        assert!(seq.code_point_at(3).is_none());
    }

    #[test]
    fn truncate_drops_tail() {
        let mut seq = Utf8Sequence::new();
        for cp in [0x41_u32, 0x00E9, 0x1F600] {
            seq.append(Utf32::from(cp)).unwrap();
        }
        seq.truncate(2);
        assert_eq!(seq.len_code_points(), 2);
        assert_eq!(seq.code_point_at(1).unwrap().value(), 0x00E9);
    }

    #[test]
    fn iterator_forward_and_back() {
        let mut seq = Utf8Sequence::new();
        for cp in [0x41_u32, 0x00E9, 0x1F600] {
            seq.append(Utf32::from(cp)).unwrap();
        }
        let mut it = seq.iter();
        assert_eq!(it.next().unwrap().value(), 0x41);
        assert_eq!(it.next().unwrap().value(), 0x00E9);
        assert_eq!(it.peek_right().unwrap().value(), 0x1F600);
        assert_eq!(it.prev().unwrap().value(), 0x00E9);
    }

    #[test]
    fn apply_high_to_low_visits_in_reverse() {
        let mut seq = Utf8Sequence::new();
        for cp in [0x41_u32, 0x00E9, 0x1F600] {
            seq.append(Utf32::from(cp)).unwrap();
        }
        let mut seen = alloc::vec::Vec::new();
        seq.apply_high_to_low(|cp| {
            seen.push(cp.value());
            ControlFlow::Continue(())
        });
        assert_eq!(seen, alloc::vec![0x1F600, 0x00E9, 0x41]);
    }

    #[test]
    fn utf16_surrogate_seek() {
        let mut seq = Utf16Sequence::new();
        for cp in [0x41_u32, 0x1F600, 0x42] {
            seq.append(Utf32::from(cp)).unwrap();
        }
        assert_eq!(seq.len_code_points(), 3);
        assert_eq!(seq.code_point_at(1).unwrap().value(), 0x1F600);
        assert_eq!(seq.code_point_at(2).unwrap().value(), 0x42);
    }

    #[test]
    fn shrink_from_u32_unchecked_skips_validation() {
        let seq = Utf8Sequence::shrink_from_u32_unchecked(&[0x41, 0x1F600, 0x42]);
        assert_eq!(seq.len_code_points(), 3);
        assert_eq!(seq.expand(), [0x41, 0x1F600, 0x42]);
    }

    proptest! {
        #[test]
        fn utf8_expand_shrink_round_trips(cps in prop::collection::vec(valid_code_point(), 0..32)) {
            let mut seq = Utf8Sequence::new();
            for &cp in &cps {
                seq.append(Utf32::from(cp)).unwrap();
            }
            let expanded = seq.expand();
            prop_assert_eq!(&expanded, &cps);
            let (rebuilt, replaced) = Utf8Sequence::shrink_from_u32(&expanded, u32::from(b'?'));
            prop_assert_eq!(replaced, 0);
            prop_assert_eq!(rebuilt.expand(), cps);
        }

        #[test]
        fn utf16_round_trips_through_swap(cps in prop::collection::vec(valid_code_point(), 0..32)) {
            let mut seq = Utf16Sequence::new();
            for &cp in &cps {
                seq.append(Utf32::from(cp)).unwrap();
            }
            let swapped: alloc::vec::Vec<u16> =
                seq.as_units().iter().copied().map(unikit_bom::bswap16).collect();
            let (back, replaced) = Utf16Sequence::convert_from_utf16_swapped(&swapped, u32::from(b'?'));
            prop_assert_eq!(replaced, 0);
            prop_assert_eq!(back.expand(), cps);
        }
    }
}
