//! Patch extraction from an edited tree
//!
//! Walks a (possibly fixed) tree alongside the templated text and yields a
//! [`FixPatch`] wherever they disagree. Subtrees whose raw still equals the
//! templated text they cover are skipped wholesale.

use std::collections::VecDeque;

use crate::base::{PositionMarker, TextRange, bounds, range, text_at};
use crate::segments::Segment;
use crate::templater::TemplatedFile;

/// How a patch was derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatchCategory {
    /// A changed segment sitting entirely on literal source
    Literal,
    /// An explicit source fix carried by a segment
    Source,
    /// Insertion or deletion between two children
    MidPoint,
    /// Insertion or deletion after the last child
    EndPoint,
}

impl PatchCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Literal => "literal",
            Self::Source => "source",
            Self::MidPoint => "mid_point",
            Self::EndPoint => "end_point",
        }
    }
}

/// A source-string edit derived from the fixed tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixPatch {
    pub templated_slice: TextRange,
    pub fixed_raw: String,
    pub patch_category: PatchCategory,
    pub source_slice: TextRange,
    pub templated_str: String,
    pub source_str: String,
}

impl FixPatch {
    pub fn dedupe_tuple(&self) -> (TextRange, &str) {
        (self.source_slice, &self.fixed_raw)
    }
}

/// Range from `a` to `b`, collapsed to a point at `a` if they are reversed.
fn span(a: usize, b: usize) -> TextRange {
    if a <= b { range(a, b) } else { range(a, a) }
}

struct Frame<'a> {
    segment: &'a Segment,
    position: PositionMarker,
    child_idx: usize,
    source_idx: usize,
    templated_idx: usize,
    insert_buff: String,
    first_pos: Option<PositionMarker>,
}

/// Pull-based patch iterator, see [`Segment::iter_patches`].
pub struct PatchIter<'a> {
    templated_file: &'a TemplatedFile,
    stack: Vec<Frame<'a>>,
    pending: VecDeque<FixPatch>,
}

impl<'a> PatchIter<'a> {
    fn new(root: &'a Segment, templated_file: &'a TemplatedFile) -> Self {
        let mut iter = Self {
            templated_file,
            stack: Vec::new(),
            pending: VecDeque::new(),
        };
        iter.visit(root);
        iter
    }

    fn templated_str(&self, slice: TextRange) -> String {
        text_at(&self.templated_file.templated_str, slice).unwrap_or_default().to_string()
    }

    fn source_str(&self, slice: TextRange) -> String {
        text_at(&self.templated_file.source_str, slice).unwrap_or_default().to_string()
    }

    fn queue_source_fixes<'s>(&mut self, fixes: impl IntoIterator<Item = &'s crate::segments::SourceFix>) {
        for fix in fixes {
            self.pending.push_back(FixPatch {
                templated_slice: fix.templated_slice,
                fixed_raw: fix.edit.to_string(),
                patch_category: PatchCategory::Source,
                source_slice: fix.source_slice,
                templated_str: self.templated_str(fix.templated_slice),
                source_str: self.source_str(fix.source_slice),
            });
        }
    }

    /// Start processing a segment: queue its patches or open a frame.
    fn visit(&mut self, segment: &'a Segment) {
        let Some(position) = segment.position() else {
            return;
        };
        let templated_raw = text_at(&self.templated_file.templated_str, position.templated_slice);
        if templated_raw == Some(segment.raw()) {
            let fixes = segment.source_fixes();
            self.queue_source_fixes(&fixes);
            return;
        }

        self.queue_source_fixes(segment.own_source_fixes());
        if position.is_literal() {
            self.pending.push_back(FixPatch {
                templated_slice: position.templated_slice,
                fixed_raw: segment.raw().to_string(),
                patch_category: PatchCategory::Literal,
                source_slice: position.source_slice,
                templated_str: self.templated_str(position.templated_slice),
                source_str: self.source_str(position.source_slice),
            });
        } else if !segment.segments().is_empty() {
            let (source_idx, _) = bounds(position.source_slice);
            let (templated_idx, _) = bounds(position.templated_slice);
            self.stack.push(Frame {
                segment,
                position: position.clone(),
                child_idx: 0,
                source_idx,
                templated_idx,
                insert_buff: String::new(),
                first_pos: None,
            });
        }
    }

    /// Advance the top frame by one child. Returns the child to visit.
    fn step(&mut self) -> Option<&'a Segment> {
        let frame = self.stack.last_mut()?;
        let parent: &'a Segment = frame.segment;
        let child = parent.segments().get(frame.child_idx)?;
        frame.child_idx += 1;

        let Some(child_pos) = child.position() else {
            return None;
        };
        if !child.raw().is_empty() && child_pos.is_point() {
            frame.insert_buff.push_str(child.raw());
            frame.first_pos.get_or_insert_with(|| child_pos.clone());
            return None;
        }

        let (child_t_start, child_t_stop) = bounds(child_pos.templated_slice);
        let (_, child_s_stop) = bounds(child_pos.source_slice);
        if child_t_start > frame.templated_idx || !frame.insert_buff.is_empty() {
            let first = frame.first_pos.take().unwrap_or_else(|| child_pos.clone());
            let (first_s, _) = bounds(first.source_slice);
            let (first_t, _) = bounds(first.templated_slice);
            let patch = FixPatch {
                source_slice: span(frame.source_idx, first_s),
                templated_slice: span(frame.templated_idx, first_t),
                patch_category: PatchCategory::MidPoint,
                fixed_raw: std::mem::take(&mut frame.insert_buff),
                templated_str: String::new(),
                source_str: String::new(),
            };
            self.pending.push_back(patch);
        }
        let frame = self.stack.last_mut()?;
        frame.source_idx = child_s_stop;
        frame.templated_idx = child_t_stop;
        Some(child)
    }

    fn close_frame(&mut self) {
        let Some(frame) = self.stack.pop() else {
            return;
        };
        let (_, t_stop) = bounds(frame.position.templated_slice);
        let (_, s_stop) = bounds(frame.position.source_slice);
        if t_stop != frame.templated_idx || !frame.insert_buff.is_empty() {
            let source_slice = span(frame.source_idx, s_stop);
            let templated_slice = span(frame.templated_idx, t_stop);
            self.pending.push_back(FixPatch {
                templated_str: self.templated_str(templated_slice),
                source_str: self.source_str(source_slice),
                source_slice,
                templated_slice,
                patch_category: PatchCategory::EndPoint,
                fixed_raw: frame.insert_buff,
            });
        }
    }
}

impl Iterator for PatchIter<'_> {
    type Item = FixPatch;

    fn next(&mut self) -> Option<FixPatch> {
        loop {
            if let Some(patch) = self.pending.pop_front() {
                return Some(patch);
            }
            let frame = self.stack.last()?;
            if frame.child_idx >= frame.segment.segments().len() {
                self.close_frame();
                continue;
            }
            if let Some(child) = self.step() {
                self.visit(child);
            }
        }
    }
}

impl Segment {
    /// Patches that turn the templated text into this tree's raw, in
    /// document order.
    pub fn iter_patches<'a>(&'a self, templated_file: &'a TemplatedFile) -> PatchIter<'a> {
        PatchIter::new(self, templated_file)
    }
}
