//! Segment tree nodes
//!
//! Segments are immutable and reference counted. Edits build new parents
//! around shared, untouched children, so a subtree nobody edited keeps both
//! its allocation and its `uuid`.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use smol_str::SmolStr;
use uuid::Uuid;

use crate::base::{GrammarId, PositionMarker, TextRange};
use crate::templater::SliceType;

/// Zero-width segment kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetaKind {
    Indent,
    Dedent,
    ImplicitIndent,
    EndOfFile,
    /// Stand-in for source-only template text (tags, comments)
    Placeholder,
}

impl MetaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Indent => "indent",
            Self::Dedent => "dedent",
            Self::ImplicitIndent => "implicit_indent",
            Self::EndOfFile => "end_of_file",
            Self::Placeholder => "placeholder",
        }
    }

    /// Default indent contribution
    pub fn indent_val(&self) -> i32 {
        match self {
            Self::Indent | Self::ImplicitIndent => 1,
            Self::Dedent => -1,
            Self::EndOfFile | Self::Placeholder => 0,
        }
    }
}

/// A fix applied directly to source text that has no templated counterpart.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceFix {
    pub edit: SmolStr,
    pub source_slice: TextRange,
    pub templated_slice: TextRange,
}

impl SourceFix {
    pub fn new(edit: impl Into<SmolStr>, source_slice: TextRange, templated_slice: TextRange) -> Self {
        Self {
            edit: edit.into(),
            source_slice,
            templated_slice,
        }
    }
}

/// Leaf flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TokenFlags {
    pub is_code: bool,
    pub is_comment: bool,
    pub is_whitespace: bool,
}

impl TokenFlags {
    pub const CODE: Self = Self {
        is_code: true,
        is_comment: false,
        is_whitespace: false,
    };
    pub const COMMENT: Self = Self {
        is_code: false,
        is_comment: true,
        is_whitespace: false,
    };
    pub const WHITESPACE: Self = Self {
        is_code: false,
        is_comment: false,
        is_whitespace: true,
    };
}

#[derive(Debug, Clone)]
pub(crate) struct MetaInfo {
    pub(crate) kind: MetaKind,
    pub(crate) indent_val: i32,
    /// Emitted for a template block rather than by the grammar
    pub(crate) is_template: bool,
    /// Template text the meta stands in for
    pub(crate) source_str: Option<String>,
    pub(crate) block_type: Option<SliceType>,
}

#[derive(Debug, Clone)]
pub(crate) enum SegmentKind {
    Raw {
        raw: SmolStr,
        flags: TokenFlags,
        /// Case-folded / trimmed form set by typed grammars
        normalized: Option<SmolStr>,
    },
    Meta(MetaInfo),
    Node {
        grammar: Option<GrammarId>,
    },
    Bracketed,
    Unparsable {
        expected: Option<String>,
    },
    File,
}

#[derive(Debug)]
struct SegmentData {
    kind: SegmentKind,
    seg_type: SmolStr,
    class_types: Vec<SmolStr>,
    uuid: Uuid,
    position: Option<PositionMarker>,
    segments: Vec<Segment>,
    source_fixes: Vec<SourceFix>,
    flags: TokenFlags,
    raw: OnceCell<String>,
}

/// A node in the parse tree.
#[derive(Clone)]
pub struct Segment(Arc<SegmentData>);

impl Segment {
    // =========================================================================
    // Construction
    // =========================================================================

    fn build(
        kind: SegmentKind,
        seg_type: SmolStr,
        mut class_types: Vec<SmolStr>,
        uuid: Uuid,
        position: Option<PositionMarker>,
        segments: Vec<Segment>,
        source_fixes: Vec<SourceFix>,
    ) -> Self {
        if !class_types.contains(&seg_type) {
            class_types.insert(0, seg_type.clone());
        }
        let flags = match &kind {
            SegmentKind::Raw { flags, .. } => *flags,
            SegmentKind::Meta(_) => TokenFlags::default(),
            _ => TokenFlags {
                is_code: segments.iter().any(|s| s.is_code()),
                is_comment: !segments.is_empty() && segments.iter().all(|s| s.is_comment()),
                is_whitespace: !segments.is_empty() && segments.iter().all(|s| s.is_whitespace()),
            },
        };
        let raw = OnceCell::new();
        match &kind {
            SegmentKind::Raw { raw: text, .. } => {
                let _ = raw.set(text.to_string());
            }
            SegmentKind::Meta(_) => {
                let _ = raw.set(String::new());
            }
            _ => {}
        }
        Self(Arc::new(SegmentData {
            kind,
            seg_type,
            class_types,
            uuid,
            position,
            segments,
            source_fixes,
            flags,
            raw,
        }))
    }

    /// A leaf token.
    pub fn token(
        raw: impl Into<SmolStr>,
        seg_type: impl Into<SmolStr>,
        flags: TokenFlags,
        position: Option<PositionMarker>,
    ) -> Self {
        Self::build(
            SegmentKind::Raw {
                raw: raw.into(),
                flags,
                normalized: None,
            },
            seg_type.into(),
            Vec::new(),
            Uuid::new_v4(),
            position,
            Vec::new(),
            Vec::new(),
        )
    }

    /// A code token such as a keyword or symbol.
    pub fn code(raw: impl Into<SmolStr>, seg_type: impl Into<SmolStr>) -> Self {
        Self::token(raw, seg_type, TokenFlags::CODE, None)
    }

    pub fn keyword(raw: impl Into<SmolStr>) -> Self {
        Self::code(raw, "keyword")
    }

    pub fn whitespace(raw: impl Into<SmolStr>) -> Self {
        Self::token(raw, "whitespace", TokenFlags::WHITESPACE, None)
    }

    pub fn newline(raw: impl Into<SmolStr>) -> Self {
        Self::token(raw, "newline", TokenFlags::WHITESPACE, None)
    }

    pub fn comma() -> Self {
        Self::code(",", "comma")
    }

    /// A grammar-inserted zero-width meta.
    pub fn meta(kind: MetaKind, position: Option<PositionMarker>) -> Self {
        Self::build(
            SegmentKind::Meta(MetaInfo {
                kind,
                indent_val: kind.indent_val(),
                is_template: false,
                source_str: None,
                block_type: None,
            }),
            SmolStr::new_static(kind.as_str()),
            vec![SmolStr::new_static("meta")],
            Uuid::new_v4(),
            position,
            Vec::new(),
            Vec::new(),
        )
    }

    /// A zero-width meta standing in for source-only template text.
    pub fn template_meta(
        kind: MetaKind,
        source_str: impl Into<String>,
        block_type: SliceType,
        position: Option<PositionMarker>,
    ) -> Self {
        Self::build(
            SegmentKind::Meta(MetaInfo {
                kind,
                indent_val: kind.indent_val(),
                is_template: true,
                source_str: Some(source_str.into()),
                block_type: Some(block_type),
            }),
            SmolStr::new_static(kind.as_str()),
            vec![SmolStr::new_static("meta")],
            Uuid::new_v4(),
            position,
            Vec::new(),
            Vec::new(),
        )
    }

    /// A typed node built by a segment grammar.
    pub fn node(seg_type: impl Into<SmolStr>, grammar: Option<GrammarId>, segments: Vec<Segment>) -> Self {
        Self::branch(SegmentKind::Node { grammar }, seg_type.into(), Vec::new(), segments)
    }

    pub fn bracketed(segments: Vec<Segment>) -> Self {
        Self::branch(SegmentKind::Bracketed, SmolStr::new_static("bracketed"), Vec::new(), segments)
    }

    /// Tokens the parser could not match. `segments` must not be empty.
    pub fn unparsable(segments: Vec<Segment>, expected: Option<String>) -> Self {
        debug_assert!(!segments.is_empty(), "unparsable segment must wrap tokens");
        Self::branch(
            SegmentKind::Unparsable { expected },
            SmolStr::new_static("unparsable"),
            Vec::new(),
            segments,
        )
    }

    pub fn file(segments: Vec<Segment>) -> Self {
        Self::branch(SegmentKind::File, SmolStr::new_static("file"), Vec::new(), segments)
    }

    fn branch(kind: SegmentKind, seg_type: SmolStr, class_types: Vec<SmolStr>, segments: Vec<Segment>) -> Self {
        let segments = super::layout::fill_meta_positions(segments);
        let position = PositionMarker::from_child_markers(segments.iter().filter_map(|s| s.position()));
        Self::build(kind, seg_type, class_types, Uuid::new_v4(), position, segments, Vec::new())
    }

    // =========================================================================
    // Derived copies
    // =========================================================================

    /// Same segment (same uuid) with a different position.
    pub fn with_position(&self, position: Option<PositionMarker>) -> Self {
        let d = &self.0;
        Self::build(
            d.kind.clone(),
            d.seg_type.clone(),
            d.class_types.clone(),
            d.uuid,
            position,
            d.segments.clone(),
            d.source_fixes.clone(),
        )
    }

    /// Same segment (same uuid) with its position stripped.
    pub fn without_position(&self) -> Self {
        self.with_position(None)
    }

    /// Same segment (same uuid) with new children and position.
    pub fn with_segments(&self, segments: Vec<Segment>, position: Option<PositionMarker>) -> Self {
        let d = &self.0;
        Self::build(
            d.kind.clone(),
            d.seg_type.clone(),
            d.class_types.clone(),
            d.uuid,
            position,
            segments,
            d.source_fixes.clone(),
        )
    }

    /// A re-typed copy of a leaf, as produced by a terminal grammar.
    ///
    /// The new type is prepended to the existing class types.
    pub fn retyped(&self, seg_type: &str, extra_types: &[SmolStr]) -> Self {
        let d = &self.0;
        let mut class_types: Vec<SmolStr> = Vec::with_capacity(d.class_types.len() + extra_types.len() + 1);
        class_types.push(SmolStr::new(seg_type));
        class_types.extend(extra_types.iter().cloned());
        class_types.extend(d.class_types.iter().cloned());
        class_types.dedup();
        Self::build(
            d.kind.clone(),
            SmolStr::new(seg_type),
            class_types,
            Uuid::new_v4(),
            d.position.clone(),
            d.segments.clone(),
            d.source_fixes.clone(),
        )
    }

    /// Edited copy of a leaf: new raw and/or source fixes, fresh uuid.
    pub fn edit(&self, raw: Option<&str>, source_fixes: Option<Vec<SourceFix>>) -> Self {
        let d = &self.0;
        let kind = match (&d.kind, raw) {
            (SegmentKind::Raw { flags, .. }, Some(raw)) => SegmentKind::Raw {
                raw: SmolStr::new(raw),
                flags: *flags,
                normalized: None,
            },
            (kind, _) => kind.clone(),
        };
        Self::build(
            kind,
            d.seg_type.clone(),
            d.class_types.clone(),
            Uuid::new_v4(),
            d.position.clone(),
            d.segments.clone(),
            source_fixes.unwrap_or_else(|| d.source_fixes.clone()),
        )
    }

    /// Copy of a leaf (same uuid) carrying a normalized raw.
    pub fn with_normalized(&self, value: impl Into<SmolStr>) -> Self {
        let d = &self.0;
        let kind = match &d.kind {
            SegmentKind::Raw { raw, flags, .. } => SegmentKind::Raw {
                raw: raw.clone(),
                flags: *flags,
                normalized: Some(value.into()),
            },
            kind => kind.clone(),
        };
        Self::build(
            kind,
            d.seg_type.clone(),
            d.class_types.clone(),
            d.uuid,
            d.position.clone(),
            d.segments.clone(),
            d.source_fixes.clone(),
        )
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn seg_type(&self) -> &str {
        &self.0.seg_type
    }

    pub fn class_types(&self) -> &[SmolStr] {
        &self.0.class_types
    }

    pub fn is_type(&self, seg_type: &str) -> bool {
        self.0.class_types.iter().any(|t| t == seg_type)
    }

    pub fn is_any_type(&self, types: &[&str]) -> bool {
        types.iter().any(|t| self.is_type(t))
    }

    pub fn uuid(&self) -> Uuid {
        self.0.uuid
    }

    pub fn position(&self) -> Option<&PositionMarker> {
        self.0.position.as_ref()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0.segments
    }

    /// Concatenated raw text of every leaf.
    pub fn raw(&self) -> &str {
        self.0
            .raw
            .get_or_init(|| self.0.segments.iter().map(|s| s.raw()).collect())
    }

    pub fn raw_upper(&self) -> String {
        self.raw().to_uppercase()
    }

    /// Normalized raw of a leaf, falling back to the raw itself.
    pub fn raw_normalized(&self) -> &str {
        match &self.0.kind {
            SegmentKind::Raw {
                normalized: Some(n), ..
            } => n,
            _ => self.raw(),
        }
    }

    pub fn is_raw(&self) -> bool {
        matches!(self.0.kind, SegmentKind::Raw { .. } | SegmentKind::Meta(_))
    }

    pub fn is_meta(&self) -> bool {
        matches!(self.0.kind, SegmentKind::Meta(_))
    }

    pub fn is_code(&self) -> bool {
        self.0.flags.is_code
    }

    pub fn is_comment(&self) -> bool {
        self.0.flags.is_comment
    }

    pub fn is_whitespace(&self) -> bool {
        self.0.flags.is_whitespace
    }

    pub fn is_unparsable(&self) -> bool {
        matches!(self.0.kind, SegmentKind::Unparsable { .. })
    }

    /// What the parser expected where an unparsable segment sits.
    pub fn expected(&self) -> Option<&str> {
        match &self.0.kind {
            SegmentKind::Unparsable { expected } => expected.as_deref(),
            _ => None,
        }
    }

    /// Grammar that built this node, used to revalidate after fixes.
    pub fn grammar(&self) -> Option<GrammarId> {
        match &self.0.kind {
            SegmentKind::Node { grammar } => *grammar,
            _ => None,
        }
    }

    pub fn meta_kind(&self) -> Option<MetaKind> {
        match &self.0.kind {
            SegmentKind::Meta(info) => Some(info.kind),
            _ => None,
        }
    }

    /// Indent contribution of a meta; zero for everything else.
    pub fn indent_val(&self) -> i32 {
        match &self.0.kind {
            SegmentKind::Meta(info) => info.indent_val,
            _ => 0,
        }
    }

    /// Copy of a meta with a new indent contribution (same uuid).
    pub fn with_indent_val(&self, indent_val: i32) -> Self {
        match &self.0.kind {
            SegmentKind::Meta(info) => {
                let d = &self.0;
                let mut info = info.clone();
                info.indent_val = indent_val;
                Self::build(
                    SegmentKind::Meta(info),
                    d.seg_type.clone(),
                    d.class_types.clone(),
                    d.uuid,
                    d.position.clone(),
                    Vec::new(),
                    d.source_fixes.clone(),
                )
            }
            _ => self.clone(),
        }
    }

    pub fn is_template_meta(&self) -> bool {
        matches!(&self.0.kind, SegmentKind::Meta(info) if info.is_template)
    }

    /// Source text a template meta stands in for.
    pub fn template_source(&self) -> Option<&str> {
        match &self.0.kind {
            SegmentKind::Meta(info) => info.source_str.as_deref(),
            _ => None,
        }
    }

    pub fn block_type(&self) -> Option<SliceType> {
        match &self.0.kind {
            SegmentKind::Meta(info) => info.block_type,
            _ => None,
        }
    }

    /// Source fixes on this segment only.
    pub fn own_source_fixes(&self) -> &[SourceFix] {
        &self.0.source_fixes
    }

    /// Source fixes on this segment and all descendants, in order.
    pub fn source_fixes(&self) -> Vec<SourceFix> {
        let mut fixes = self.0.source_fixes.clone();
        for child in &self.0.segments {
            fixes.extend(child.source_fixes());
        }
        fixes
    }

    /// Whether fixes may leave this node starting or ending with non-code.
    pub fn can_start_end_non_code(&self) -> bool {
        matches!(self.0.kind, SegmentKind::File | SegmentKind::Unparsable { .. })
    }

    pub fn is_file(&self) -> bool {
        matches!(self.0.kind, SegmentKind::File)
    }

    pub fn is_bracketed(&self) -> bool {
        matches!(self.0.kind, SegmentKind::Bracketed)
    }

    pub(crate) fn kind(&self) -> &SegmentKind {
        &self.0.kind
    }

    /// Pointer identity.
    pub fn ptr_eq(&self, other: &Segment) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    // =========================================================================
    // Children
    // =========================================================================

    /// First direct child of any of `types`.
    pub fn child(&self, types: &[&str]) -> Option<&Segment> {
        self.segments().iter().find(|s| s.is_any_type(types))
    }

    /// Direct children of any of `types`.
    pub fn children<'a>(&'a self, types: &'a [&'a str]) -> impl Iterator<Item = &'a Segment> + 'a {
        self.segments().iter().filter(move |s| s.is_any_type(types))
    }

    pub fn first_code(&self) -> Option<&Segment> {
        self.segments().iter().find(|s| s.is_code())
    }

    /// All leaves (tokens and metas) in document order.
    pub fn raw_segments(&self) -> Vec<Segment> {
        super::iter::RawSegments::new(self).cloned().collect()
    }

    pub fn iter_raw_segments(&self) -> super::iter::RawSegments<'_> {
        super::iter::RawSegments::new(self)
    }

    /// Pre-order descendants (including `self`) matching any of `types`.
    pub fn recursive_crawl<'a>(&'a self, types: &'a [&'a str], recurse_into: bool) -> super::iter::RecursiveCrawl<'a> {
        super::iter::RecursiveCrawl::new(self, types, recurse_into)
    }

    /// Indented dump of the tree, one segment per line.
    pub fn stringify(&self) -> String {
        let mut out = String::new();
        self.stringify_into(&mut out, 0);
        out
    }

    fn stringify_into(&self, out: &mut String, depth: usize) {
        let (line_no, line_pos) = self.position().map_or((0, 0), |p| (p.line_no, p.line_pos));
        out.push_str(&format!("[L:{line_no:3}, P:{line_pos:3}]  {}{}:", "    ".repeat(depth), self.seg_type()));
        if self.is_raw() {
            if !self.raw().is_empty() {
                out.push_str(&format!("  {:?}", self.raw()));
            }
            out.push('\n');
        } else {
            out.push('\n');
            for child in self.segments() {
                child.stringify_into(out, depth + 1);
            }
        }
    }
}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position() {
            Some(p) => write!(f, "{}({:?} @ L{}P{})", self.seg_type(), self.raw(), p.line_no, p.line_pos),
            None => write!(f, "{}({:?})", self.seg_type(), self.raw()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::range;

    fn at(start: usize, stop: usize) -> Option<PositionMarker> {
        Some(PositionMarker::new(range(start, stop), range(start, stop), 1, start + 1, true))
    }

    fn leaf(raw: &str, seg_type: &str, start: usize) -> Segment {
        let flags = if raw.trim().is_empty() {
            TokenFlags::WHITESPACE
        } else {
            TokenFlags::CODE
        };
        Segment::token(raw, seg_type, flags, at(start, start + raw.len()))
    }

    #[test]
    fn test_node_raw_and_position() {
        let node = Segment::node(
            "select_clause",
            None,
            vec![leaf("SELECT", "keyword", 0), leaf(" ", "whitespace", 6), leaf("1", "numeric_literal", 7)],
        );
        assert_eq!(node.raw(), "SELECT 1");
        assert_eq!(node.position().unwrap().templated_slice, range(0, 8));
        assert!(node.is_code());
        assert!(!node.is_whitespace());
    }

    #[test]
    fn test_metas_get_positions_from_neighbours() {
        let node = Segment::node(
            "select_clause",
            None,
            vec![leaf("SELECT", "keyword", 0), Segment::meta(MetaKind::Indent, None), leaf("1", "numeric_literal", 6)],
        );
        let meta = &node.segments()[1];
        assert!(meta.position().unwrap().is_point());
        assert_eq!(meta.position().unwrap().templated_slice, range(6, 6));
        assert_eq!(meta.indent_val(), 1);
    }

    #[test]
    fn test_retyped_keeps_old_types() {
        let word = leaf("select", "word", 0);
        let kw = word.retyped("keyword", &[]);
        assert!(kw.is_type("keyword"));
        assert!(kw.is_type("word"));
        assert_eq!(kw.seg_type(), "keyword");
        assert_ne!(kw.uuid(), word.uuid());
    }

    #[test]
    fn test_with_position_keeps_uuid() {
        let seg = leaf("a", "word", 0);
        let moved = seg.with_position(at(3, 4));
        assert_eq!(moved.uuid(), seg.uuid());
        assert!(seg.without_position().position().is_none());
    }

    #[test]
    fn test_edit_changes_raw_and_uuid() {
        let seg = leaf("select", "keyword", 0);
        let edited = seg.edit(Some("SELECT"), None);
        assert_eq!(edited.raw(), "SELECT");
        assert_ne!(edited.uuid(), seg.uuid());
        assert!(edited.is_code());
    }

    #[test]
    fn test_source_fixes_collect_recursively() {
        let fix = SourceFix::new("x", range(0, 1), range(0, 0));
        let inner = leaf("a", "word", 0).edit(None, Some(vec![fix.clone()]));
        let node = Segment::node("expression", None, vec![inner]);
        assert_eq!(node.source_fixes(), vec![fix]);
        assert!(node.own_source_fixes().is_empty());
    }

    #[test]
    fn test_stringify_lists_types() {
        let node = Segment::file(vec![leaf("SELECT", "keyword", 0)]);
        let dump = node.stringify();
        assert!(dump.contains("file:"));
        assert!(dump.contains("keyword:  \"SELECT\""));
    }
}
