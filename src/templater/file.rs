//! The templated file and its source slice map
//!
//! A [`TemplatedFile`] pairs the original source with the text produced by a
//! templater, plus two slicings of it:
//!
//! ```text
//! raw_sliced   (source space)     "SELECT " | "{{ col }}" | " ,b"
//!                                  literal    templated     literal
//! sliced_file  (templated space)  "SELECT " | "a"         | " ,b"
//! ```
//!
//! `sliced_file` tiles the templated text exactly. `raw_sliced` tiles the
//! source exactly. Both are ordered.

use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;

use crate::base::{TextRange, bounds, point, range};
use crate::errors::{TemplateError, TemplateMappingError};

/// Classification of a slice of source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SliceType {
    Literal,
    Templated,
    BlockStart,
    BlockEnd,
    Comment,
}

impl SliceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Literal => "literal",
            Self::Templated => "templated",
            Self::BlockStart => "block_start",
            Self::BlockEnd => "block_end",
            Self::Comment => "comment",
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Self::Literal)
    }
}

/// A contiguous span of the source string
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RawFileSlice {
    pub source_str: String,
    pub slice_type: SliceType,
    pub source_idx: usize,
    /// Block the slice belongs to. Changes at every block tag.
    pub block_idx: usize,
    /// Tag keyword for block slices (`for`, `if`, `endfor`, ...)
    pub tag: Option<SmolStr>,
}

impl RawFileSlice {
    pub fn new(source_str: impl Into<String>, slice_type: SliceType, source_idx: usize) -> Self {
        Self {
            source_str: source_str.into(),
            slice_type,
            source_idx,
            block_idx: 0,
            tag: None,
        }
    }

    pub fn with_block(mut self, block_idx: usize, tag: Option<&str>) -> Self {
        self.block_idx = block_idx;
        self.tag = tag.map(SmolStr::new);
        self
    }

    pub fn end_source_idx(&self) -> usize {
        self.source_idx + self.source_str.len()
    }

    pub fn source_slice(&self) -> TextRange {
        range(self.source_idx, self.end_source_idx())
    }

    /// Anything that isn't literal SQL
    pub fn is_source_only(&self) -> bool {
        !self.slice_type.is_literal()
    }
}

/// A span of templated text with its back-pointer into the source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplatedFileSlice {
    pub slice_type: SliceType,
    pub source_slice: TextRange,
    pub templated_slice: TextRange,
}

impl TemplatedFileSlice {
    pub fn new(slice_type: SliceType, source_slice: TextRange, templated_slice: TextRange) -> Self {
        Self {
            slice_type,
            source_slice,
            templated_slice,
        }
    }
}

/// Block structure of the raw slices
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawSliceBlockInfo {
    /// Raw slice (keyed by `source_idx`) to block id
    pub block_ids: FxHashMap<usize, usize>,
    /// Loop bodies that contain only literal SQL
    pub literal_only_loops: FxHashSet<usize>,
}

impl RawSliceBlockInfo {
    fn compute(raw_sliced: &[RawFileSlice]) -> Self {
        struct Frame {
            tag: Option<SmolStr>,
            literal_only: bool,
            body: Vec<usize>,
        }

        let mut info = Self::default();
        let mut stack: Vec<Frame> = Vec::new();
        for slice in raw_sliced {
            info.block_ids.insert(slice.source_idx, slice.block_idx);
            match slice.slice_type {
                SliceType::BlockStart => {
                    if let Some(parent) = stack.last_mut() {
                        parent.literal_only = false;
                    }
                    stack.push(Frame {
                        tag: slice.tag.clone(),
                        literal_only: true,
                        body: Vec::new(),
                    });
                }
                SliceType::BlockEnd => {
                    let Some(frame) = stack.pop() else { continue };
                    if frame.tag.as_deref() == Some("for") && frame.literal_only {
                        info.literal_only_loops.extend(frame.body);
                    }
                }
                SliceType::Literal => {
                    if let Some(frame) = stack.last_mut() {
                        frame.body.push(slice.block_idx);
                    }
                }
                SliceType::Templated => {
                    if let Some(frame) = stack.last_mut() {
                        frame.literal_only = false;
                    }
                }
                SliceType::Comment => {}
            }
        }
        info
    }

    pub fn block_id(&self, slice: &RawFileSlice) -> usize {
        self.block_ids.get(&slice.source_idx).copied().unwrap_or(slice.block_idx)
    }
}

/// Source text, templated text and the map between them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplatedFile {
    pub source_str: String,
    pub templated_str: String,
    pub fname: String,
    sliced_file: Vec<TemplatedFileSlice>,
    raw_sliced: Vec<RawFileSlice>,
    source_line_starts: Vec<usize>,
    templated_line_starts: Vec<usize>,
    block_info: RawSliceBlockInfo,
}

impl TemplatedFile {
    /// A file with no templating: one literal slice covering everything.
    pub fn from_string(source: impl Into<String>) -> Self {
        let source_str = source.into();
        let len = source_str.len();
        let sliced_file = vec![TemplatedFileSlice::new(SliceType::Literal, range(0, len), range(0, len))];
        let raw_sliced = vec![RawFileSlice::new(source_str.clone(), SliceType::Literal, 0)];
        Self::assemble(
            source_str.clone(),
            source_str,
            "<string>".to_string(),
            sliced_file,
            raw_sliced,
        )
    }

    /// Build from templater output, checking that both slicings tile their text.
    pub fn new(
        source_str: impl Into<String>,
        templated_str: impl Into<String>,
        fname: impl Into<String>,
        sliced_file: Vec<TemplatedFileSlice>,
        raw_sliced: Vec<RawFileSlice>,
    ) -> Result<Self, TemplateError> {
        let source_str = source_str.into();
        let templated_str = templated_str.into();
        Self::check_templated_tiling(&sliced_file, &templated_str, source_str.len())?;
        Self::check_raw_tiling(&raw_sliced, &source_str)?;
        Ok(Self::assemble(source_str, templated_str, fname.into(), sliced_file, raw_sliced))
    }

    fn assemble(
        source_str: String,
        templated_str: String,
        fname: String,
        sliced_file: Vec<TemplatedFileSlice>,
        raw_sliced: Vec<RawFileSlice>,
    ) -> Self {
        let block_info = RawSliceBlockInfo::compute(&raw_sliced);
        Self {
            source_line_starts: line_starts(&source_str),
            templated_line_starts: line_starts(&templated_str),
            source_str,
            templated_str,
            fname,
            sliced_file,
            raw_sliced,
            block_info,
        }
    }

    fn check_templated_tiling(
        sliced_file: &[TemplatedFileSlice],
        templated_str: &str,
        source_len: usize,
    ) -> Result<(), TemplateError> {
        let invalid = |reason: String| TemplateError::InvalidSlices {
            space: "templated",
            reason,
        };
        let mut cursor = 0usize;
        for slice in sliced_file {
            let (start, stop) = bounds(slice.templated_slice);
            if start != cursor {
                return Err(invalid(format!("gap or overlap at offset {cursor}, next slice starts at {start}")));
            }
            if usize::from(slice.source_slice.end()) > source_len {
                return Err(invalid(format!("source slice {:?} beyond source end", slice.source_slice)));
            }
            cursor = stop;
        }
        if cursor != templated_str.len() {
            return Err(invalid(format!(
                "slices end at {cursor}, text has length {}",
                templated_str.len()
            )));
        }
        Ok(())
    }

    fn check_raw_tiling(raw_sliced: &[RawFileSlice], source_str: &str) -> Result<(), TemplateError> {
        let invalid = |reason: String| TemplateError::InvalidSlices { space: "source", reason };
        let mut cursor = 0usize;
        for slice in raw_sliced {
            if slice.source_idx != cursor {
                return Err(invalid(format!("raw slice at {} expected at {cursor}", slice.source_idx)));
            }
            if source_str.get(slice.source_idx..slice.end_source_idx()) != Some(slice.source_str.as_str()) {
                return Err(invalid(format!("raw slice at {} does not match source", slice.source_idx)));
            }
            cursor = slice.end_source_idx();
        }
        if cursor != source_str.len() {
            return Err(invalid(format!("raw slices end at {cursor}, source has length {}", source_str.len())));
        }
        Ok(())
    }

    pub fn sliced_file(&self) -> &[TemplatedFileSlice] {
        &self.sliced_file
    }

    pub fn raw_sliced(&self) -> &[RawFileSlice] {
        &self.raw_sliced
    }

    pub fn raw_slice_block_info(&self) -> &RawSliceBlockInfo {
        &self.block_info
    }

    /// True when templating changed nothing.
    pub fn is_identity(&self) -> bool {
        self.raw_sliced.iter().all(|s| s.slice_type.is_literal()) && self.source_str == self.templated_str
    }

    /// `(line_no, line_pos)`, both 1-based, of a byte offset.
    pub fn get_line_pos_of_char_pos(&self, char_pos: usize, source: bool) -> (usize, usize) {
        let starts = if source {
            &self.source_line_starts
        } else {
            &self.templated_line_starts
        };
        let line_idx = starts.partition_point(|&s| s <= char_pos).max(1);
        (line_idx, char_pos - starts[line_idx - 1] + 1)
    }

    // =========================================================================
    // Templated → source mapping
    // =========================================================================

    /// Map a templated slice back to the source.
    ///
    /// Fails when either end falls strictly inside a `templated` slice: there
    /// is no source text that corresponds to part of an expansion.
    pub fn templated_slice_to_source_slice(&self, templated_slice: TextRange) -> Result<TextRange, TemplateMappingError> {
        let (start, stop) = bounds(templated_slice);
        if stop > self.templated_str.len() {
            return Err(TemplateMappingError::OutOfRange {
                slice: templated_slice,
                len: self.templated_str.len(),
            });
        }
        if self.sliced_file.is_empty() {
            return Ok(templated_slice);
        }
        if start == stop {
            return self.point_to_source(start).map(point);
        }

        let source_start = self.source_start(start, templated_slice)?;
        let source_stop = self.source_stop(stop, templated_slice)?;
        if source_start <= source_stop {
            Ok(range(source_start, source_stop))
        } else {
            // Loops can reorder slices. Take the widest span.
            Ok(self.widest_source_span(start, stop))
        }
    }

    /// Like [`templated_slice_to_source_slice`](Self::templated_slice_to_source_slice)
    /// but widens to whole template tags instead of failing.
    ///
    /// Returns `None` only when the slice lies outside the templated text.
    pub fn enclosing_source_slice(&self, templated_slice: TextRange) -> Option<TextRange> {
        let (start, stop) = bounds(templated_slice);
        if stop > self.templated_str.len() {
            return None;
        }
        match self.templated_slice_to_source_slice(templated_slice) {
            Ok(slice) => Some(slice),
            Err(TemplateMappingError::OutOfRange { .. }) => None,
            Err(TemplateMappingError::InsideTemplated { .. }) => {
                let widened = self.widest_source_span(start, stop.max(start + 1).min(self.templated_str.len()));
                Some(widened)
            }
        }
    }

    fn point_to_source(&self, pos: usize) -> Result<usize, TemplateMappingError> {
        let mut insertion: Option<usize> = None;
        for slice in &self.sliced_file {
            let (t_start, t_stop) = bounds(slice.templated_slice);
            if t_start > pos {
                break;
            }
            let (s_start, s_stop) = bounds(slice.source_slice);
            if t_start == pos {
                insertion = Some(insertion.map_or(s_start, |p| p.min(s_start)));
            }
            if t_stop == pos {
                insertion = Some(insertion.map_or(s_stop, |p| p.min(s_stop)));
            }
        }
        if let Some(p) = insertion {
            return Ok(p);
        }
        let containing = self.sliced_file.iter().find(|s| {
            let (t_start, t_stop) = bounds(s.templated_slice);
            t_start < pos && pos < t_stop
        });
        match containing {
            Some(slice) if slice.slice_type.is_literal() => {
                Ok(usize::from(slice.source_slice.start()) + pos - usize::from(slice.templated_slice.start()))
            }
            _ => Err(TemplateMappingError::InsideTemplated { slice: point(pos) }),
        }
    }

    fn source_start(&self, start: usize, whole: TextRange) -> Result<usize, TemplateMappingError> {
        let slice = self
            .sliced_file
            .iter()
            .find(|s| {
                let (t_start, t_stop) = bounds(s.templated_slice);
                t_start <= start && start < t_stop
            })
            .ok_or(TemplateMappingError::OutOfRange {
                slice: whole,
                len: self.templated_str.len(),
            })?;
        let (t_start, _) = bounds(slice.templated_slice);
        let (s_start, _) = bounds(slice.source_slice);
        if slice.slice_type.is_literal() {
            Ok(s_start + start - t_start)
        } else if start == t_start {
            Ok(s_start)
        } else {
            Err(TemplateMappingError::InsideTemplated { slice: whole })
        }
    }

    fn source_stop(&self, stop: usize, whole: TextRange) -> Result<usize, TemplateMappingError> {
        let slice = self
            .sliced_file
            .iter()
            .find(|s| {
                let (t_start, t_stop) = bounds(s.templated_slice);
                t_start < stop && stop <= t_stop
            })
            .ok_or(TemplateMappingError::OutOfRange {
                slice: whole,
                len: self.templated_str.len(),
            })?;
        let (_, t_stop) = bounds(slice.templated_slice);
        let (_, s_stop) = bounds(slice.source_slice);
        if slice.slice_type.is_literal() {
            Ok(s_stop - (t_stop - stop))
        } else if stop == t_stop {
            Ok(s_stop)
        } else {
            Err(TemplateMappingError::InsideTemplated { slice: whole })
        }
    }

    fn widest_source_span(&self, start: usize, stop: usize) -> TextRange {
        let mut lo = usize::MAX;
        let mut hi = 0usize;
        for slice in &self.sliced_file {
            let (t_start, t_stop) = bounds(slice.templated_slice);
            let touches = if start == stop {
                t_start <= start && start <= t_stop
            } else {
                t_start < stop && start < t_stop
            };
            if touches {
                let (s_start, s_stop) = bounds(slice.source_slice);
                lo = lo.min(s_start);
                hi = hi.max(s_stop);
            }
        }
        if lo > hi { point(start) } else { range(lo, hi) }
    }

    // =========================================================================
    // Source space queries
    // =========================================================================

    /// Raw slices overlapping `source_slice`, in order.
    ///
    /// A zero-length slice on a boundary returns the slice starting there.
    /// Past the end of the file this is empty.
    pub fn raw_slices_spanning_source_slice(&self, source_slice: TextRange) -> &[RawFileSlice] {
        let (start, stop) = bounds(source_slice);
        let Some(last) = self.raw_sliced.last() else {
            return &[];
        };
        if start >= last.end_source_idx() {
            return &[];
        }
        let mut first = 0;
        while first + 1 < self.raw_sliced.len() && self.raw_sliced[first + 1].source_idx <= start {
            first += 1;
        }
        let mut span = 1;
        while first + span < self.raw_sliced.len() && self.raw_sliced[first + span].source_idx < stop {
            span += 1;
        }
        &self.raw_sliced[first..first + span]
    }

    /// Every non-literal raw slice, in order.
    pub fn source_only_slices(&self) -> Vec<&RawFileSlice> {
        self.raw_sliced.iter().filter(|s| s.is_source_only()).collect()
    }

    /// True if `source_slice` touches only literal raw slices.
    pub fn is_source_slice_literal(&self, source_slice: TextRange) -> bool {
        if self.raw_sliced.is_empty() || source_slice.is_empty() {
            return true;
        }
        let (start, stop) = bounds(source_slice);
        let mut is_literal = true;
        for slice in &self.raw_sliced {
            if slice.source_idx <= start {
                is_literal = slice.slice_type.is_literal();
            } else if slice.source_idx >= stop {
                break;
            } else if !slice.slice_type.is_literal() {
                is_literal = false;
            }
        }
        is_literal
    }
}

fn line_starts(text: &str) -> Vec<usize> {
    std::iter::once(0)
        .chain(text.match_indices('\n').map(|(idx, _)| idx + 1))
        .collect()
}
