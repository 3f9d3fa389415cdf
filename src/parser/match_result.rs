//! Deferred match results
//!
//! Matching never builds segments. Each grammar returns a [`MatchResult`]
//! describing which slice of the input it claimed, what to wrap that slice
//! in, which metas to insert where, and its nested child matches. Only once
//! the root grammar is done does [`MatchResult::apply`] turn the whole
//! description into a tree.

use std::ops::Range;

use smol_str::SmolStr;

use crate::base::GrammarId;
use crate::segments::{MetaKind, Segment};

/// What a claimed slice becomes when applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matched {
    /// A node of `seg_type`, remembering the grammar that built it
    Node { seg_type: SmolStr, grammar: GrammarId },
    /// A single token re-typed by a terminal grammar
    Token {
        seg_type: SmolStr,
        normalized: Option<SmolStr>,
    },
    Bracketed,
    Unparsable { expected: String },
}

/// Outcome of matching a grammar at a position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchResult {
    /// Absolute indices into the segment slice being parsed
    pub matched_slice: Range<usize>,
    pub matched_class: Option<Matched>,
    /// Metas to insert before the segment at each absolute index
    pub insert_segments: Vec<(usize, MetaKind)>,
    pub child_matches: Vec<MatchResult>,
}

impl MatchResult {
    pub fn empty_at(idx: usize) -> Self {
        Self {
            matched_slice: idx..idx,
            ..Self::default()
        }
    }

    pub fn from_slice(matched_slice: Range<usize>) -> Self {
        Self {
            matched_slice,
            ..Self::default()
        }
    }

    /// A match claiming `matched_slice` as one unparsable section.
    pub fn unparsable(matched_slice: Range<usize>, expected: impl Into<String>) -> Self {
        Self {
            matched_slice,
            matched_class: Some(Matched::Unparsable {
                expected: expected.into(),
            }),
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.matched_slice.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matched_slice.is_empty()
    }

    pub fn start(&self) -> usize {
        self.matched_slice.start
    }

    pub fn stop(&self) -> usize {
        self.matched_slice.end
    }

    /// Whether anything was claimed or inserted.
    pub fn is_match(&self) -> bool {
        !self.matched_slice.is_empty() || !self.insert_segments.is_empty()
    }

    pub fn is_better_than(&self, other: &MatchResult) -> bool {
        self.len() > other.len()
    }

    /// Whether an unparsable section sits anywhere in this match.
    pub fn has_unparsable(&self) -> bool {
        matches!(self.matched_class, Some(Matched::Unparsable { .. }))
            || self.child_matches.iter().any(MatchResult::has_unparsable)
    }

    /// Join a match that follows this one.
    ///
    /// Classless matches are flattened into the combined result so the tree
    /// does not grow a level per sequence element.
    pub fn append(self, other: MatchResult) -> MatchResult {
        if !self.is_match() {
            return other;
        }
        if !other.is_match() {
            return self;
        }
        let matched_slice = self.start()..other.stop();
        let mut insert_segments = Vec::new();
        let mut child_matches = Vec::new();
        for m in [self, other] {
            if m.matched_class.is_some() {
                child_matches.push(m);
            } else {
                insert_segments.extend(m.insert_segments);
                child_matches.extend(m.child_matches);
            }
        }
        MatchResult {
            matched_slice,
            matched_class: None,
            insert_segments,
            child_matches,
        }
    }

    /// Wrap this match in `class`. Failed matches pass through unchanged.
    pub fn wrap(self, class: Matched) -> MatchResult {
        if !self.is_match() {
            return self;
        }
        if self.matched_class.is_none() {
            return MatchResult {
                matched_class: Some(class),
                ..self
            };
        }
        MatchResult {
            matched_slice: self.matched_slice.clone(),
            matched_class: Some(class),
            insert_segments: Vec::new(),
            child_matches: vec![self],
        }
    }

    /// Build the segments this match describes over `segments`.
    pub fn apply(&self, segments: &[Segment]) -> Vec<Segment> {
        if self.matched_slice.is_empty() {
            // Only metas can sit in an empty slice; a class around nothing
            // collapses to its metas.
            return self
                .insert_segments
                .iter()
                .map(|(_, kind)| Segment::meta(*kind, None))
                .collect();
        }

        enum Trigger<'a> {
            Meta(MetaKind),
            Child(&'a MatchResult),
        }
        let mut triggers: Vec<(usize, Trigger<'_>)> = Vec::new();
        for (idx, kind) in &self.insert_segments {
            triggers.push((*idx, Trigger::Meta(*kind)));
        }
        for child in &self.child_matches {
            triggers.push((child.start(), Trigger::Child(child)));
        }
        // Stable: at one index metas come before children.
        triggers.sort_by_key(|(idx, _)| *idx);

        let mut result: Vec<Segment> = Vec::new();
        let mut max_idx = self.start();
        for (idx, trigger) in triggers {
            if idx > max_idx {
                result.extend_from_slice(&segments[max_idx..idx]);
                max_idx = idx;
            }
            match trigger {
                Trigger::Meta(kind) => result.push(Segment::meta(kind, None)),
                Trigger::Child(child) => {
                    result.extend(child.apply(segments));
                    max_idx = max_idx.max(child.stop());
                }
            }
        }
        if max_idx < self.stop() {
            result.extend_from_slice(&segments[max_idx..self.stop()]);
        }

        match &self.matched_class {
            None => result,
            Some(Matched::Token { seg_type, normalized }) => result
                .into_iter()
                .map(|seg| {
                    if !seg.is_raw() || seg.is_meta() {
                        return seg;
                    }
                    let seg = seg.retyped(seg_type, &[]);
                    match normalized {
                        Some(n) => seg.with_normalized(n.clone()),
                        None => seg,
                    }
                })
                .collect(),
            Some(Matched::Node { seg_type, grammar }) => {
                if result.iter().all(Segment::is_meta) {
                    return result;
                }
                vec![Segment::node(seg_type.clone(), Some(*grammar), result)]
            }
            Some(Matched::Bracketed) => vec![Segment::bracketed(result)],
            Some(Matched::Unparsable { expected }) => vec![Segment::unparsable(result, Some(expected.clone()))],
        }
    }

    /// Indented dump for debug logging.
    pub fn stringify(&self) -> String {
        let mut out = String::new();
        self.stringify_into(&mut out, 0);
        out
    }

    fn stringify_into(&self, out: &mut String, depth: usize) {
        let class = match &self.matched_class {
            None => String::new(),
            Some(Matched::Node { seg_type, .. }) => format!(" {seg_type}"),
            Some(Matched::Token { seg_type, .. }) => format!(" token:{seg_type}"),
            Some(Matched::Bracketed) => " bracketed".to_string(),
            Some(Matched::Unparsable { .. }) => " unparsable".to_string(),
        };
        out.push_str(&format!(
            "{}Match ({}..{}){class}",
            "  ".repeat(depth),
            self.start(),
            self.stop()
        ));
        if !self.insert_segments.is_empty() {
            out.push_str(&format!(" +{:?}", self.insert_segments));
        }
        out.push('\n');
        for child in &self.child_matches {
            child.stringify_into(out, depth + 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens() -> Vec<Segment> {
        vec![
            Segment::keyword("SELECT"),
            Segment::whitespace(" "),
            Segment::code("a", "word"),
        ]
    }

    #[test]
    fn test_append_flattens_classless_matches() {
        let a = MatchResult::from_slice(0..1);
        let mut b = MatchResult::from_slice(1..3);
        b.insert_segments.push((2, MetaKind::Indent));
        let joined = a.append(b);
        assert_eq!(joined.matched_slice, 0..3);
        assert_eq!(joined.insert_segments, vec![(2, MetaKind::Indent)]);
        assert!(joined.child_matches.is_empty());
    }

    #[test]
    fn test_append_keeps_classed_matches_as_children() {
        let a = MatchResult::from_slice(0..1).wrap(Matched::Bracketed);
        let joined = MatchResult::empty_at(0).append(a.clone()).append(MatchResult::from_slice(1..3));
        assert_eq!(joined.child_matches, vec![a]);
    }

    #[test]
    fn test_wrap_empty_is_noop() {
        let m = MatchResult::empty_at(4).wrap(Matched::Bracketed);
        assert_eq!(m.matched_class, None);
    }

    #[test]
    fn test_apply_builds_nodes_and_metas() {
        let segs = tokens();
        let keyword = MatchResult {
            matched_slice: 0..1,
            matched_class: Some(Matched::Token {
                seg_type: "keyword".into(),
                normalized: None,
            }),
            ..Default::default()
        };
        let m = MatchResult {
            matched_slice: 0..3,
            matched_class: Some(Matched::Node {
                seg_type: "select_clause".into(),
                grammar: GrammarId(0),
            }),
            insert_segments: vec![(1, MetaKind::Indent), (3, MetaKind::Dedent)],
            child_matches: vec![keyword],
        };
        let out = m.apply(&segs);
        assert_eq!(out.len(), 1);
        let node = &out[0];
        assert_eq!(node.seg_type(), "select_clause");
        assert_eq!(node.grammar(), Some(GrammarId(0)));
        let types: Vec<_> = node.segments().iter().map(|s| s.seg_type().to_string()).collect();
        assert_eq!(types, vec!["keyword", "indent", "whitespace", "word", "dedent"]);
        assert_eq!(node.raw(), "SELECT a");
    }

    #[test]
    fn test_apply_token_sets_normalized() {
        let segs = vec![Segment::code("\"Col\"", "double_quote")];
        let m = MatchResult {
            matched_slice: 0..1,
            matched_class: Some(Matched::Token {
                seg_type: "quoted_identifier".into(),
                normalized: Some("Col".into()),
            }),
            ..Default::default()
        };
        let out = m.apply(&segs);
        assert!(out[0].is_type("quoted_identifier"));
        assert!(out[0].is_type("double_quote"));
        assert_eq!(out[0].raw_normalized(), "Col");
        assert_eq!(out[0].raw(), "\"Col\"");
    }

    #[test]
    fn test_has_unparsable_looks_through_children() {
        let inner = MatchResult::unparsable(1..3, "Nothing here.");
        let m = MatchResult {
            matched_slice: 0..3,
            child_matches: vec![inner],
            ..Default::default()
        };
        assert!(m.has_unparsable());
        assert!(!MatchResult::from_slice(0..1).has_unparsable());
    }
}
