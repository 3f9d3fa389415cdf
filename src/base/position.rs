/// Position tracking for segments
///
/// A segment lives in two coordinate spaces at once: the original source
/// (before templating) and the templated text the lexer actually saw. Line
/// and column are reported in templated space, 1-based.
use text_size::{TextRange, TextSize};

/// Location of a segment in both source and templated space.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PositionMarker {
    /// Byte range into the original source.
    pub source_slice: TextRange,
    /// Byte range into the templated text.
    pub templated_slice: TextRange,
    /// 1-based line in templated space.
    pub line_no: usize,
    /// 1-based column in templated space.
    pub line_pos: usize,
    /// Line tracked while fixes shift content around.
    pub working_line_no: usize,
    /// Column tracked while fixes shift content around.
    pub working_line_pos: usize,
    is_literal: bool,
}

impl PositionMarker {
    pub fn new(
        source_slice: TextRange,
        templated_slice: TextRange,
        line_no: usize,
        line_pos: usize,
        is_literal: bool,
    ) -> Self {
        Self {
            source_slice,
            templated_slice,
            line_no,
            line_pos,
            working_line_no: line_no,
            working_line_pos: line_pos,
            is_literal,
        }
    }

    /// Zero-width marker in both spaces.
    pub fn from_point(
        source_point: TextSize,
        templated_point: TextSize,
        line_no: usize,
        line_pos: usize,
        is_literal: bool,
    ) -> Self {
        Self::new(
            TextRange::empty(source_point),
            TextRange::empty(templated_point),
            line_no,
            line_pos,
            is_literal,
        )
    }

    /// Marker spanning from the start of `start` to the start of `end`.
    pub fn from_points(start: &PositionMarker, end: &PositionMarker) -> Self {
        let source_end = end.source_slice.start().max(start.source_slice.start());
        let templated_end = end.templated_slice.start().max(start.templated_slice.start());
        Self {
            source_slice: TextRange::new(start.source_slice.start(), source_end),
            templated_slice: TextRange::new(start.templated_slice.start(), templated_end),
            line_no: start.line_no,
            line_pos: start.line_pos,
            working_line_no: start.working_line_no,
            working_line_pos: start.working_line_pos,
            is_literal: start.is_literal && end.is_literal,
        }
    }

    /// Smallest marker covering every marker in `markers`.
    ///
    /// Returns `None` for an empty input. Line information comes from the
    /// first marker.
    pub fn from_child_markers<'a>(markers: impl IntoIterator<Item = &'a PositionMarker>) -> Option<Self> {
        let mut iter = markers.into_iter();
        let first = iter.next()?;
        let mut merged = first.clone();
        for marker in iter {
            merged.source_slice = merged.source_slice.cover(marker.source_slice);
            merged.templated_slice = merged.templated_slice.cover(marker.templated_slice);
            merged.is_literal &= marker.is_literal;
        }
        Some(merged)
    }

    /// True iff the underlying raw slices are all literal source.
    pub fn is_literal(&self) -> bool {
        self.is_literal
    }

    /// True when the marker is zero-width in both spaces.
    pub fn is_point(&self) -> bool {
        self.source_slice.is_empty() && self.templated_slice.is_empty()
    }

    pub fn start_point_marker(&self) -> Self {
        Self {
            source_slice: TextRange::empty(self.source_slice.start()),
            templated_slice: TextRange::empty(self.templated_slice.start()),
            ..self.clone()
        }
    }

    pub fn end_point_marker(&self) -> Self {
        let (line_no, line_pos) = (self.working_line_no, self.working_line_pos);
        Self {
            source_slice: TextRange::empty(self.source_slice.end()),
            templated_slice: TextRange::empty(self.templated_slice.end()),
            line_no,
            line_pos,
            working_line_no: line_no,
            working_line_pos: line_pos,
            is_literal: self.is_literal,
        }
    }

    pub fn with_working_position(mut self, line_no: usize, line_pos: usize) -> Self {
        self.working_line_no = line_no;
        self.working_line_pos = line_pos;
        self
    }

    /// `(line_no, line_pos)` in templated space.
    pub fn working_loc(&self) -> (usize, usize) {
        (self.working_line_no, self.working_line_pos)
    }

    /// Where the next segment starts after consuming `raw` from `(line_no, line_pos)`.
    pub fn infer_next_position(raw: &str, line_no: usize, line_pos: usize) -> (usize, usize) {
        if raw.is_empty() {
            return (line_no, line_pos);
        }
        let newlines = raw.matches('\n').count();
        if newlines == 0 {
            (line_no, line_pos + raw.len())
        } else {
            let tail = raw.rsplit('\n').next().unwrap_or("");
            (line_no + newlines, tail.len() + 1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::range;

    #[test]
    fn test_infer_next_position() {
        assert_eq!(PositionMarker::infer_next_position("", 1, 1), (1, 1));
        assert_eq!(PositionMarker::infer_next_position("abc", 1, 1), (1, 4));
        assert_eq!(PositionMarker::infer_next_position("a\nbc", 1, 5), (2, 3));
        assert_eq!(PositionMarker::infer_next_position("\n\n", 3, 7), (5, 1));
    }

    #[test]
    fn test_from_child_markers_covers() {
        let a = PositionMarker::new(range(0, 3), range(0, 3), 1, 1, true);
        let b = PositionMarker::new(range(5, 9), range(4, 6), 1, 5, false);
        let merged = PositionMarker::from_child_markers([&a, &b]).unwrap();
        assert_eq!(merged.source_slice, range(0, 9));
        assert_eq!(merged.templated_slice, range(0, 6));
        assert!(!merged.is_literal());
        assert_eq!(merged.working_loc(), (1, 1));
    }

    #[test]
    fn test_point_markers() {
        let m = PositionMarker::new(range(2, 4), range(2, 4), 1, 3, true);
        assert!(m.start_point_marker().is_point());
        assert_eq!(m.end_point_marker().source_slice, range(4, 4));
        assert!(!m.is_point());
    }
}
