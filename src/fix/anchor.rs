//! Grouping of fixes by the segment they are anchored on

use indexmap::IndexMap;
use uuid::Uuid;

use crate::rules::{EditType, LintFix};
use crate::segments::SourceFix;

/// Every fix proposed for one anchor segment.
#[derive(Debug, Clone, Default)]
pub struct AnchorEditInfo {
    pub delete: usize,
    pub replace: usize,
    pub create_before: usize,
    pub create_after: usize,
    pub fixes: Vec<LintFix>,
    /// Source fixes gathered from source-only edits
    pub source_fixes: Vec<SourceFix>,
    /// Index in `fixes` of the first replace
    first_replace: Option<usize>,
}

impl AnchorEditInfo {
    /// Add a fix, dropping exact duplicates and merging source-only edits
    /// into an existing replace.
    pub fn add(&mut self, fix: LintFix) {
        if self.fixes.contains(&fix) {
            tracing::info!(fix = ?fix, "ignoring duplicate fix");
            return;
        }

        if fix.is_just_source_edit() {
            for source_fix in fix.edit_segments().iter().flat_map(|s| s.source_fixes()) {
                if !self.source_fixes.contains(&source_fix) {
                    self.source_fixes.push(source_fix);
                }
            }
            if let Some(idx) = self.first_replace {
                tracing::info!(fix = ?fix, onto = ?self.fixes[idx], "condensing source-only edit onto replace");
                self.condense_onto(idx);
                return;
            }
        } else if fix.edit_type == EditType::Replace {
            // A regular replace arriving after a source-only one takes its place.
            if let Some(idx) = self.first_replace.filter(|&idx| self.fixes[idx].is_just_source_edit()) {
                tracing::info!(fix = ?fix, onto = ?self.fixes[idx], "condensing source-only edit onto replace");
                self.fixes[idx] = fix;
                self.condense_onto(idx);
                return;
            }
        }

        if fix.edit_type == EditType::Replace && self.first_replace.is_none() {
            self.first_replace = Some(self.fixes.len());
        }
        match fix.edit_type {
            EditType::Delete => self.delete += 1,
            EditType::Replace => self.replace += 1,
            EditType::CreateBefore => self.create_before += 1,
            EditType::CreateAfter => self.create_after += 1,
        }
        self.fixes.push(fix);
    }

    /// Put every gathered source fix on the first edit of `fixes[idx]`.
    fn condense_onto(&mut self, idx: usize) {
        let Some(edit) = self.fixes[idx].edit.as_mut() else {
            return;
        };
        let Some(first) = edit.first_mut() else {
            return;
        };
        let mut merged = first.own_source_fixes().to_vec();
        for source_fix in &self.source_fixes {
            if !merged.contains(source_fix) {
                merged.push(source_fix.clone());
            }
        }
        *first = first.edit(None, Some(merged));
    }

    pub fn total(&self) -> usize {
        self.delete + self.replace + self.create_before + self.create_after
    }

    /// One fix, or exactly one insertion on each side.
    pub fn is_valid(&self) -> bool {
        match self.total() {
            0 | 1 => true,
            2 => self.create_before == 1 && self.create_after == 1,
            _ => false,
        }
    }
}

/// Group `fixes` by anchor uuid, in the order anchors are first seen.
pub fn compute_anchor_edit_info<'a>(fixes: impl IntoIterator<Item = &'a LintFix>) -> IndexMap<Uuid, AnchorEditInfo> {
    let mut anchors: IndexMap<Uuid, AnchorEditInfo> = IndexMap::new();
    for fix in fixes {
        anchors.entry(fix.anchor.uuid()).or_default().add(fix.clone());
    }
    anchors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::range;
    use crate::segments::Segment;

    fn source_only(anchor: &Segment, edit: &str) -> LintFix {
        let fix = SourceFix::new(edit, range(0, 3), range(0, 0));
        LintFix::replace(anchor, vec![anchor.edit(None, Some(vec![fix]))])
    }

    #[test]
    fn test_duplicates_are_dropped() {
        let anchor = Segment::whitespace("  ");
        let fixes = [LintFix::delete(&anchor), LintFix::delete(&anchor)];
        let info = compute_anchor_edit_info(&fixes);
        let entry = &info[&anchor.uuid()];
        assert_eq!(entry.total(), 1);
        assert!(entry.is_valid());
    }

    #[test]
    fn test_create_pair_is_valid_other_pairs_are_not() {
        let anchor = Segment::keyword("SELECT");
        let pair = [
            LintFix::create_after(&anchor, vec![Segment::whitespace(" ")]),
            LintFix::create_before(&anchor, vec![Segment::newline("\n")]),
        ];
        assert!(compute_anchor_edit_info(&pair)[&anchor.uuid()].is_valid());

        let clash = [LintFix::delete(&anchor), LintFix::replace(&anchor, vec![Segment::keyword("select")])];
        assert!(!compute_anchor_edit_info(&clash)[&anchor.uuid()].is_valid());
    }

    #[test]
    fn test_source_edit_condensed_after_replace() {
        let anchor = Segment::keyword("select");
        let fixes = [
            LintFix::replace(&anchor, vec![anchor.edit(Some("SELECT"), None)]),
            source_only(&anchor, "{{ x }}"),
        ];
        let info = compute_anchor_edit_info(&fixes);
        let entry = &info[&anchor.uuid()];
        assert_eq!(entry.total(), 1);
        let edit = &entry.fixes[0].edit_segments()[0];
        assert_eq!(edit.raw(), "SELECT");
        assert_eq!(edit.own_source_fixes().len(), 1);
    }

    #[test]
    fn test_source_edit_condensed_before_replace() {
        let anchor = Segment::keyword("select");
        let fixes = [
            source_only(&anchor, "{{ x }}"),
            LintFix::replace(&anchor, vec![anchor.edit(Some("SELECT"), None)]),
        ];
        let info = compute_anchor_edit_info(&fixes);
        let entry = &info[&anchor.uuid()];
        assert!(entry.is_valid());
        assert_eq!(entry.fixes.len(), 1);
        let edit = &entry.fixes[0].edit_segments()[0];
        assert_eq!(edit.raw(), "SELECT");
        assert_eq!(edit.own_source_fixes()[0].edit, "{{ x }}");
    }
}
