//! Unicode text subsystem: code point codecs, byte-order marks, growable UTFx sequences,
//! C-style escape handling, and a copy-on-write string value.
//!
//! This crate is a thin facade: each concern lives in its own `unikit-*` crate, re-exported here
//! as a module of the same name (minus the `unikit-` prefix) for callers that want the whole
//! stack behind one dependency. [`UString`] is the type most callers reach for first.
#![cfg_attr(all(not(feature = "std"), not(test)), no_std)]

/// Byte order marks and byte swapping for the five on-the-wire UTFx forms.
pub mod bom {
    pub use unikit_bom::{bswap16, bswap32, bswap64, Bom};
}

/// Growth policy and growable backing storage shared by the UTFx sequence bodies.
pub mod buffer {
    pub use unikit_buffer::{Buffer, Growth, GrowthError};
}

/// Code point codecs for UTF-8, UTF-16, and UTF-32.
pub mod codepoint {
    pub use unikit_codepoint::{
        is_valid, LeaderByte, Utf16, Utf32, Utf8, DEFAULT_CHAR, MAX_CODE_POINT, MAX_HIGH_SURROGATE,
        MAX_LOW_SURROGATE, MAX_SURROGATE, MIN_HIGH_SURROGATE, MIN_LOW_SURROGATE, MIN_SURROGATE,
    };
}

/// C-style enquote/dequote escape handling for string literals.
pub mod escape {
    pub use unikit_escape::{dequote, enquote, Quote};
}

/// Growable UTF-8 and UTF-16 sequence bodies.
pub mod sequence {
    pub use unikit_sequence::{
        Sequence, Utf16Iter, Utf16OwningIter, Utf16Sequence, Utf8Iter, Utf8OwningIter, Utf8Sequence,
    };
}

/// The copy-on-write string value.
pub mod string {
    pub use unikit_string::{
        cmp_case_insensitive, cmp_case_sensitive, cmp_reversed, UString, INVALID_INDEX,
    };
}

pub use bom::Bom;
pub use codepoint::{Utf16, Utf32, Utf8};
pub use escape::Quote;
pub use sequence::{Sequence, Utf16Sequence, Utf8Sequence};
pub use string::UString;
