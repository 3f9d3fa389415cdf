//! Foundation types for the sqlint toolchain.
//!
//! This module provides fundamental types used throughout the linter:
//! - [`PositionMarker`] - Dual source/templated location of a segment
//! - [`GrammarId`] - Index into a dialect's grammar tables
//! - [`TextRange`], [`TextSize`] - Byte slices into source or templated text
//!
//! This module has NO dependencies on other sqlint modules.

mod ids;
mod position;

pub use ids::GrammarId;
pub use position::PositionMarker;

// Re-export text-size types for convenience
pub use text_size;
pub use text_size::{TextRange, TextSize};

/// Build a `TextRange` from plain `usize` offsets.
///
/// Panics in debug builds if `start > stop`, same as `TextRange::new`.
pub fn range(start: usize, stop: usize) -> TextRange {
    TextRange::new(size(start), size(stop))
}

/// Convert a `usize` byte offset into a `TextSize`.
pub fn size(offset: usize) -> TextSize {
    TextSize::new(offset as u32)
}

/// Zero-width range at `offset`.
pub fn point(offset: usize) -> TextRange {
    TextRange::empty(size(offset))
}

/// `(start, stop)` of a range as `usize`.
pub fn bounds(range: TextRange) -> (usize, usize) {
    (range.start().into(), range.end().into())
}

/// The part of `text` covered by `range`, or `None` when it is out of
/// bounds or not on char boundaries.
pub fn text_at(text: &str, range: TextRange) -> Option<&str> {
    let (start, stop) = bounds(range);
    text.get(start..stop)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_at() {
        assert_eq!(text_at("SELECT 1", range(0, 6)), Some("SELECT"));
        assert_eq!(text_at("SELECT 1", point(8)), Some(""));
        assert_eq!(text_at("SELECT 1", range(4, 12)), None);
        assert_eq!(text_at("é", range(0, 1)), None);
    }
}
