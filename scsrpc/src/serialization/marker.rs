//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Delimiter search over byte windows.
//!
//! The framing layer splits a socket stream into messages by looking for a
//! fixed multi-byte marker. Reads rarely line up with message boundaries, so
//! the search reports three outcomes:
//!
//! - [`MarkMatch::Found`]: the whole marker starts at the given absolute index.
//! - [`MarkMatch::Partial`]: the window ends inside a marker candidate. The
//!   payload is the number of marker elements already matched; the caller keeps
//!   that many trailing bytes and searches again once more bytes arrive.
//! - [`MarkMatch::NotFound`]: no prefix of the marker appears in the window.
//!
//! # Examples
//!
//! ```rust
//! use scsrpc::serialization::marker::{search_mark, MarkMatch};
//!
//! assert_eq!(search_mark(b"ABCXYZ", b"XYZ"), MarkMatch::Found(3));
//! assert_eq!(search_mark(b"ABCXY", b"XYZ"), MarkMatch::Partial(2));
//! assert_eq!(search_mark(b"ABCXY", b"XYZ").as_signed(), Some(-2));
//! assert_eq!(search_mark(b"ABC", b"XYZ"), MarkMatch::NotFound);
//! ```

/// Outcome of a marker search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkMatch {
    /// The full marker starts at this absolute index of the source.
    Found(usize),
    /// The window ended after this many marker elements had matched.
    Partial(usize),
    /// No marker prefix occurs in the window.
    NotFound,
}

impl MarkMatch {
    /// Returns the classic signed encoding of the outcome.
    ///
    /// A full match yields its start index, a partial match yields the
    /// negated matched count, and "not found" yields `None`.
    #[must_use]
    pub fn as_signed(self) -> Option<isize> {
        match self {
            Self::Found(index) => Some(index as isize),
            Self::Partial(matched) => Some(-(matched as isize)),
            Self::NotFound => None,
        }
    }

    /// Returns `true` for a full match.
    #[must_use]
    pub const fn is_found(self) -> bool {
        matches!(self, Self::Found(_))
    }
}

/// Searches the whole of `source` for `mark`.
pub fn search_mark<T: PartialEq>(source: &[T], mark: &[T]) -> MarkMatch {
    search_mark_in(source, 0, source.len(), mark)
}

/// Searches `source[offset..offset + length]` for the first occurrence of `mark`.
///
/// Indices in the result are absolute positions in `source`. The window is
/// clamped to the source, and an empty marker never matches.
pub fn search_mark_in<T: PartialEq>(
    source: &[T],
    offset: usize,
    length: usize,
    mark: &[T],
) -> MarkMatch {
    let Some(first) = mark.first() else {
        return MarkMatch::NotFound;
    };
    let end = offset.saturating_add(length).min(source.len());
    if offset >= end {
        return MarkMatch::NotFound;
    }

    let window = &source[offset..end];
    let mut pos = 0;
    while pos < window.len() {
        let Some(rel) = window[pos..].iter().position(|item| item == first) else {
            return MarkMatch::NotFound;
        };
        let start = pos + rel;
        let matched = (window.len() - start).min(mark.len());

        if window[start..start + matched] == mark[..matched] {
            return if matched == mark.len() {
                MarkMatch::Found(offset + start)
            } else {
                MarkMatch::Partial(matched)
            };
        }

        // Restart one past the candidate so overlapping markers are not skipped.
        pos = start + 1;
    }

    MarkMatch::NotFound
}

/// Checks how much of `mark` the start of `source` matches.
///
/// See [`starts_with_in`].
pub fn starts_with<T: PartialEq>(source: &[T], mark: &[T]) -> Option<usize> {
    starts_with_in(source, 0, source.len(), mark)
}

/// Checks how much of `mark` the window `source[offset..offset + length]` begins with.
///
/// Returns `Some(mark.len())` on a full match, `Some(n)` with `n < mark.len()`
/// when the window ends after `n` matching elements, and `None` on a mismatch.
pub fn starts_with_in<T: PartialEq>(
    source: &[T],
    offset: usize,
    length: usize,
    mark: &[T],
) -> Option<usize> {
    let end = offset.saturating_add(length).min(source.len());
    let window = source.get(offset..end).unwrap_or_default();

    for (i, expected) in mark.iter().enumerate() {
        match window.get(i) {
            None => return Some(i),
            Some(actual) if actual != expected => return None,
            Some(_) => {}
        }
    }

    Some(mark.len())
}

/// Returns `true` if `source` ends with exactly `mark`.
pub fn ends_with<T: PartialEq>(source: &[T], mark: &[T]) -> bool {
    ends_with_in(source, 0, source.len(), mark)
}

/// Returns `true` if the window `source[offset..offset + length]` ends with `mark`.
pub fn ends_with_in<T: PartialEq>(source: &[T], offset: usize, length: usize, mark: &[T]) -> bool {
    let end = offset.saturating_add(length).min(source.len());
    let window = source.get(offset..end).unwrap_or_default();
    window.ends_with(mark)
}

/// Copies `source[offset..offset + length]` into a new, independent buffer.
///
/// The range is clamped to the source; an offset past the end yields an
/// empty buffer.
pub fn clone_range<T: Clone>(source: &[T], offset: usize, length: usize) -> Vec<T> {
    let end = offset.saturating_add(length).min(source.len());
    source.get(offset..end).map(<[T]>::to_vec).unwrap_or_default()
}
