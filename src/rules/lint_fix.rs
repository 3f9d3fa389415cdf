//! Declarative edits proposed by rules
//!
//! Rules never touch the tree. They describe an edit relative to an anchor
//! segment (found again later by `uuid`) and leave applying it to the fix
//! engine.

use std::fmt;

use crate::base::{TextRange, bounds, range};
use crate::segments::Segment;
use crate::templater::{RawFileSlice, SliceType, TemplatedFile};

/// What a [`LintFix`] does to its anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditType {
    CreateBefore,
    CreateAfter,
    Replace,
    Delete,
}

impl EditType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateBefore => "create_before",
            Self::CreateAfter => "create_after",
            Self::Replace => "replace",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for EditType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One edit to the parse tree.
#[derive(Clone)]
pub struct LintFix {
    pub edit_type: EditType,
    pub anchor: Segment,
    /// New segments; `None` only for deletes
    pub edit: Option<Vec<Segment>>,
    /// Segments the edit was derived from, checked for template safety
    pub source: Vec<Segment>,
}

impl LintFix {
    fn new(edit_type: EditType, anchor: &Segment, edit: Option<Vec<Segment>>) -> Self {
        // Inserted segments are positioned by the fix engine from their
        // neighbours, never from wherever a rule copied them from.
        let edit = edit.map(|segments| match edit_type {
            EditType::CreateBefore | EditType::CreateAfter => {
                segments.iter().map(Segment::without_position).collect()
            }
            _ => segments,
        });
        Self {
            edit_type,
            anchor: anchor.clone(),
            edit,
            source: Vec::new(),
        }
    }

    pub fn create_before(anchor: &Segment, edit: Vec<Segment>) -> Self {
        Self::new(EditType::CreateBefore, anchor, Some(edit))
    }

    pub fn create_after(anchor: &Segment, edit: Vec<Segment>) -> Self {
        Self::new(EditType::CreateAfter, anchor, Some(edit))
    }

    pub fn replace(anchor: &Segment, edit: Vec<Segment>) -> Self {
        Self::new(EditType::Replace, anchor, Some(edit))
    }

    pub fn delete(anchor: &Segment) -> Self {
        Self::new(EditType::Delete, anchor, None)
    }

    pub fn with_source(mut self, source: Vec<Segment>) -> Self {
        self.source = source;
        self
    }

    pub fn edit_segments(&self) -> &[Segment] {
        self.edit.as_deref().unwrap_or_default()
    }

    /// A fix that would change nothing.
    pub fn is_trivial(&self) -> bool {
        match self.edit_type {
            EditType::CreateBefore | EditType::CreateAfter => self.edit_segments().is_empty(),
            EditType::Replace => match self.edit_segments() {
                [single] => {
                    single.raw() == self.anchor.raw()
                        && single.class_types() == self.anchor.class_types()
                        && single.source_fixes().is_empty()
                }
                _ => false,
            },
            EditType::Delete => false,
        }
    }

    /// A replace that keeps the raw and only carries source fixes.
    pub fn is_just_source_edit(&self) -> bool {
        match (self.edit_type, self.edit_segments()) {
            (EditType::Replace, [single]) => {
                single.raw() == self.anchor.raw() && !single.source_fixes().is_empty()
            }
            _ => false,
        }
    }

    /// Raw source slices this fix touches.
    ///
    /// Creations look one character either side of the insertion point;
    /// with `within_only` they look only at the side being inserted into.
    /// An insertion at either end of the file yields a synthetic empty
    /// literal slice.
    pub fn fix_slices(&self, templated_file: &TemplatedFile, within_only: bool) -> Vec<RawFileSlice> {
        let Some(anchor_pos) = self.anchor.position() else {
            return Vec::new();
        };
        let (start, stop) = bounds(anchor_pos.templated_slice);
        let boundary = usize::from(!within_only);
        let templated_slices: Vec<Option<TextRange>> = match self.edit_type {
            EditType::CreateBefore => vec![start.checked_sub(1).map(|lo| range(lo, start + boundary))],
            EditType::CreateAfter => vec![stop.checked_sub(boundary).map(|lo| range(lo, stop + 1))],
            EditType::Replace if anchor_pos.source_slice.is_empty() => {
                // Nothing in the source to protect.
                return Vec::new();
            }
            EditType::Replace => {
                // Fixes on a source-only edit only touch their own slices.
                let edit_source: Vec<Option<TextRange>> = self
                    .edit_segments()
                    .iter()
                    .flat_map(Segment::source_fixes)
                    .map(|fix| Some(fix.templated_slice))
                    .collect();
                if self.is_just_source_edit() && !edit_source.is_empty() {
                    edit_source
                } else {
                    vec![Some(anchor_pos.templated_slice)]
                }
            }
            EditType::Delete => vec![Some(anchor_pos.templated_slice)],
        };
        raw_slices_from_templated(templated_file, templated_slices)
    }

    /// Whether applying this fix could corrupt templated source.
    pub fn has_template_conflicts(&self, templated_file: &TemplatedFile) -> bool {
        if self.is_just_source_edit() {
            return false;
        }
        let slices = self.fix_slices(templated_file, false);
        let is_templated = |s: &RawFileSlice| s.slice_type == SliceType::Templated;
        let conflict = match self.edit_type {
            EditType::CreateBefore | EditType::CreateAfter => !slices.is_empty() && slices.iter().all(is_templated),
            _ => slices.iter().any(is_templated),
        };
        if conflict || self.source.is_empty() {
            return conflict;
        }
        let source_slices: Vec<Option<TextRange>> = self
            .source
            .iter()
            .filter_map(Segment::position)
            .map(|p| Some(p.templated_slice))
            .collect();
        raw_slices_from_templated(templated_file, source_slices)
            .iter()
            .any(is_templated)
    }
}

/// Map templated slices to the raw slices they cover. `None` (or a slice
/// past the end) stands for an edit at a file boundary.
fn raw_slices_from_templated(templated_file: &TemplatedFile, slices: Vec<Option<TextRange>>) -> Vec<RawFileSlice> {
    let mut out: Vec<RawFileSlice> = Vec::new();
    let mut push = |slice: RawFileSlice| {
        if !out.contains(&slice) {
            out.push(slice);
        }
    };
    for slice in slices {
        let source = slice.and_then(|s| templated_file.enclosing_source_slice(s));
        let spanning = source.map(|s| templated_file.raw_slices_spanning_source_slice(s)).unwrap_or_default();
        if spanning.is_empty() {
            push(RawFileSlice::new("", SliceType::Literal, templated_file.source_str.len()));
        }
        for raw in spanning {
            push(raw.clone());
        }
    }
    out
}

impl PartialEq for LintFix {
    fn eq(&self, other: &Self) -> bool {
        if self.edit_type != other.edit_type
            || self.anchor.uuid() != other.anchor.uuid()
            || self.anchor.class_types() != other.anchor.class_types()
        {
            return false;
        }
        let (a, b) = (self.edit_segments(), other.edit_segments());
        a.len() == b.len()
            && a.iter()
                .zip(b)
                .all(|(x, y)| x.raw() == y.raw() && x.source_fixes() == y.source_fixes())
    }
}

impl fmt::Debug for LintFix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let edit: String = self.edit_segments().iter().map(Segment::raw).collect();
        write!(f, "LintFix({} {:?}", self.edit_type, self.anchor)?;
        if self.edit.is_some() {
            write!(f, " -> {edit:?}")?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::PositionMarker;
    use crate::segments::{SourceFix, TokenFlags};
    use crate::templater::TemplatedFileSlice;

    fn leaf(raw: &str, seg_type: &str, start: usize, literal: bool) -> Segment {
        let pos = PositionMarker::new(range(start, start + raw.len()), range(start, start + raw.len()), 1, start + 1, literal);
        let flags = if raw.trim().is_empty() {
            TokenFlags::WHITESPACE
        } else {
            TokenFlags::CODE
        };
        Segment::token(raw, seg_type, flags, Some(pos))
    }

    /// `SELECT {{ col }},b` where `col` renders as `x `.
    fn trailing_space_expansion() -> TemplatedFile {
        TemplatedFile::new(
            "SELECT {{ col }},b",
            "SELECT x ,b",
            "t.sql",
            vec![
                TemplatedFileSlice::new(SliceType::Literal, range(0, 7), range(0, 7)),
                TemplatedFileSlice::new(SliceType::Templated, range(7, 16), range(7, 9)),
                TemplatedFileSlice::new(SliceType::Literal, range(16, 18), range(9, 11)),
            ],
            vec![
                RawFileSlice::new("SELECT ", SliceType::Literal, 0),
                RawFileSlice::new("{{ col }}", SliceType::Templated, 7),
                RawFileSlice::new(",b", SliceType::Literal, 16),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_equality_is_by_anchor_and_edit_content() {
        let anchor = leaf("a", "word", 0, true);
        let a = LintFix::create_after(&anchor, vec![Segment::whitespace(" ")]);
        let b = LintFix::create_after(&anchor, vec![Segment::whitespace(" ")]);
        let c = LintFix::create_after(&anchor, vec![Segment::whitespace("  ")]);
        let d = LintFix::create_before(&anchor, vec![Segment::whitespace(" ")]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn test_created_segments_lose_positions() {
        let anchor = leaf("a", "word", 0, true);
        let copied = leaf(" ", "whitespace", 4, true);
        let fix = LintFix::create_before(&anchor, vec![copied]);
        assert!(fix.edit_segments()[0].position().is_none());
    }

    #[test]
    fn test_trivial_fixes() {
        let anchor = leaf("a", "word", 0, true);
        assert!(LintFix::create_after(&anchor, vec![]).is_trivial());
        assert!(LintFix::replace(&anchor, vec![anchor.clone()]).is_trivial());
        assert!(!LintFix::replace(&anchor, vec![anchor.edit(Some("A"), None)]).is_trivial());
        assert!(!LintFix::delete(&anchor).is_trivial());
    }

    #[test]
    fn test_just_source_edit() {
        let anchor = leaf("a", "word", 0, true);
        let fix = SourceFix::new("b", range(0, 1), range(0, 1));
        let edit = anchor.edit(None, Some(vec![fix]));
        assert!(LintFix::replace(&anchor, vec![edit]).is_just_source_edit());
        assert!(!LintFix::replace(&anchor, vec![anchor.edit(Some("b"), None)]).is_just_source_edit());
    }

    #[test]
    fn test_delete_inside_expansion_conflicts() {
        let tf = trailing_space_expansion();
        let ws = leaf(" ", "whitespace", 8, false);
        assert!(LintFix::delete(&ws).has_template_conflicts(&tf));
    }

    #[test]
    fn test_delete_on_literal_is_safe() {
        let tf = TemplatedFile::from_string("SELECT a ,b");
        let ws = leaf(" ", "whitespace", 8, true);
        assert!(!LintFix::delete(&ws).has_template_conflicts(&tf));
        let slices = LintFix::delete(&ws).fix_slices(&tf, true);
        assert_eq!(slices.len(), 1);
    }

    #[test]
    fn test_create_at_file_end_uses_sentinel_slice() {
        let tf = TemplatedFile::from_string("SELECT 1");
        let last = leaf("1", "numeric_literal", 7, true);
        let fix = LintFix::create_after(&last, vec![Segment::newline("\n")]);
        let slices = fix.fix_slices(&tf, false);
        assert!(slices.iter().all(|s| s.slice_type == SliceType::Literal));
        assert!(!fix.has_template_conflicts(&tf));
    }
}
