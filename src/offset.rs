//! UTF-16 offset mapping.
//!
//! The annotation service reports offsets in UTF-16 code units (it counts the
//! way Java and JavaScript strings index). Rust strings are indexed by byte.
//! For ASCII the two agree; everywhere else a `€` is one code unit but three
//! bytes, and a `𝔸` is two code units but four bytes.
//!
//! ```text
//!   text:    a   €   𝔸        b
//!   utf16:   0   1   2   3    4   5
//!   bytes:   0   1   4        8   9
//! ```
//!
//! [`Utf16Index`] converts once per text and answers lookups by binary search.
//! An offset pointing between the two halves of a surrogate pair has no byte
//! equivalent and maps to `None`.

use std::ops::Range;

/// Maps UTF-16 offsets of one text onto byte offsets.
#[derive(Debug, Clone)]
pub struct Utf16Index {
    /// `(utf16_offset, byte_offset)` at every char boundary, including the end.
    /// Empty for ASCII text, where the mapping is the identity.
    boundaries: Vec<(usize, usize)>,
    len_utf16: usize,
    len_bytes: usize,
}

impl Utf16Index {
    pub fn new(text: &str) -> Self {
        if text.is_ascii() {
            return Self {
                boundaries: Vec::new(),
                len_utf16: text.len(),
                len_bytes: text.len(),
            };
        }

        let mut boundaries = Vec::with_capacity(text.len() + 1);
        let mut utf16 = 0;
        for (byte, ch) in text.char_indices() {
            boundaries.push((utf16, byte));
            utf16 += ch.len_utf16();
        }
        boundaries.push((utf16, text.len()));

        Self {
            boundaries,
            len_utf16: utf16,
            len_bytes: text.len(),
        }
    }

    /// Length of the text in UTF-16 code units.
    pub fn len_utf16(&self) -> usize {
        self.len_utf16
    }

    /// Byte offset of a UTF-16 offset, if it falls on a char boundary.
    pub fn byte_offset(&self, utf16: usize) -> Option<usize> {
        if utf16 > self.len_utf16 {
            return None;
        }
        if self.boundaries.is_empty() {
            return Some(utf16.min(self.len_bytes));
        }
        self.boundaries
            .binary_search_by_key(&utf16, |&(u, _)| u)
            .ok()
            .map(|i| self.boundaries[i].1)
    }

    /// Byte range of a UTF-16 range, if both ends are valid and ordered.
    pub fn byte_range(&self, start: usize, end: usize) -> Option<Range<usize>> {
        if end < start {
            return None;
        }
        Some(self.byte_offset(start)?..self.byte_offset(end)?)
    }
}
