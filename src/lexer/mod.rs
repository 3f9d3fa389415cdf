//! Table-driven lexer
//!
//! Turns a [`TemplatedFile`] into a flat token stream. Scanning happens over
//! the templated text; every token is then mapped back to the source so that
//! fixes can be spliced into the original file.
//!
//! ```text
//! templated text ──scan──▶ elements ──map──▶ tokens + template metas + EOF
//!                 longest    (start,end,    PositionMarker per token,
//!                 match      matcher)       placeholders for source-only slices
//! ```

use smol_str::SmolStr;

use crate::base::{PositionMarker, TextRange, bounds, point, range};
use crate::dialect::{Dialect, LexMatcher};
use crate::errors::LexError;
use crate::segments::{MetaKind, Segment, TokenFlags};
use crate::templater::{SliceType, TemplatedFile, TemplatedFileSlice};

/// Whether template blocks (`{% if %}`, `{% for %}`) contribute indentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TemplateBlocksIndent {
    /// Indent unless the blocks are unbalanced
    #[default]
    Enabled,
    Disabled,
    /// Indent even when unbalanced
    Force,
}

/// Result of lexing one file.
#[derive(Debug, Clone)]
pub struct LexOutput {
    pub segments: Vec<Segment>,
    pub errors: Vec<LexError>,
    /// False when template block metas were neutralised
    pub template_blocks_indent: bool,
}

/// A scanned span of templated text.
#[derive(Debug, Clone)]
struct Element {
    start: usize,
    end: usize,
    seg_type: SmolStr,
    flags: TokenFlags,
}

/// Lexer for one dialect.
#[derive(Debug, Clone)]
pub struct Lexer<'d> {
    dialect: &'d Dialect,
    blocks_indent: TemplateBlocksIndent,
}

impl<'d> Lexer<'d> {
    pub fn new(dialect: &'d Dialect) -> Self {
        Self {
            dialect,
            blocks_indent: TemplateBlocksIndent::default(),
        }
    }

    pub fn with_template_blocks_indent(mut self, blocks_indent: TemplateBlocksIndent) -> Self {
        self.blocks_indent = blocks_indent;
        self
    }

    /// Lex a whole file.
    pub fn lex(&self, file: &TemplatedFile) -> LexOutput {
        let elements = self.scan(&file.templated_str);
        let mut stream = TokenStream::new(file);
        stream.build(&elements);
        let TokenStream {
            mut segments, errors, ..
        } = stream;

        let balance: i32 = segments
            .iter()
            .filter(|s| s.is_template_meta())
            .map(|s| s.indent_val())
            .sum();
        let template_blocks_indent = match self.blocks_indent {
            TemplateBlocksIndent::Force => true,
            TemplateBlocksIndent::Disabled => false,
            TemplateBlocksIndent::Enabled => balance == 0,
        };
        if !template_blocks_indent {
            if balance != 0 {
                tracing::debug!(fname = %file.fname, balance, "unbalanced template blocks, disabling block indents");
            }
            segments = segments
                .into_iter()
                .map(|s| {
                    if s.is_template_meta() && s.indent_val() != 0 {
                        s.with_indent_val(0)
                    } else {
                        s
                    }
                })
                .collect();
        }

        tracing::debug!(
            fname = %file.fname,
            tokens = segments.len(),
            errors = errors.len(),
            "lexed file"
        );
        LexOutput {
            segments,
            errors,
            template_blocks_indent,
        }
    }

    /// Lex a plain string with no templating.
    pub fn lex_str(&self, sql: &str) -> LexOutput {
        self.lex(&TemplatedFile::from_string(sql))
    }

    /// Longest-match scan of `text`. Unmatched runs become `unlexable`
    /// elements, one per run.
    fn scan(&self, text: &str) -> Vec<Element> {
        let matchers = self.dialect.lexer_matchers();
        let mut elements = Vec::new();
        let mut unlexable_start: Option<usize> = None;
        let mut pos = 0;
        while pos < text.len() {
            let rest = &text[pos..];
            let mut best: Option<(usize, &LexMatcher)> = None;
            for matcher in matchers {
                if let Some(len) = matcher.match_len(rest) {
                    if best.is_none_or(|(best_len, _)| len > best_len) {
                        best = Some((len, matcher));
                    }
                }
            }
            match best {
                Some((len, matcher)) => {
                    if let Some(start) = unlexable_start.take() {
                        elements.push(Element {
                            start,
                            end: pos,
                            seg_type: SmolStr::new_static("unlexable"),
                            flags: TokenFlags::CODE,
                        });
                    }
                    subdivide(matcher, pos, &rest[..len], &mut elements);
                    pos += len;
                }
                None => {
                    unlexable_start.get_or_insert(pos);
                    pos += rest.chars().next().map_or(1, char::len_utf8);
                }
            }
        }
        if let Some(start) = unlexable_start {
            elements.push(Element {
                start,
                end: text.len(),
                seg_type: SmolStr::new_static("unlexable"),
                flags: TokenFlags::CODE,
            });
        }
        elements
    }
}

fn element(matcher: &LexMatcher, start: usize, end: usize) -> Element {
    Element {
        start,
        end,
        seg_type: matcher.seg_type.clone(),
        flags: matcher.flags,
    }
}

/// Split one match with the matcher's subdivider, peeling whitespace off
/// the pieces in between.
fn subdivide(matcher: &LexMatcher, offset: usize, raw: &str, out: &mut Vec<Element>) {
    let Some(sub) = matcher.subdivider.as_deref() else {
        out.push(element(matcher, offset, offset + raw.len()));
        return;
    };
    let mut cursor = 0;
    while let Some((start, end)) = sub.search(&raw[cursor..]) {
        if start > 0 {
            trim(matcher, offset + cursor, &raw[cursor..cursor + start], out);
        }
        out.push(element(sub, offset + cursor + start, offset + cursor + end));
        cursor += end;
    }
    if cursor < raw.len() {
        trim(matcher, offset + cursor, &raw[cursor..], out);
    }
}

fn trim(matcher: &LexMatcher, offset: usize, raw: &str, out: &mut Vec<Element>) {
    let Some(trimmer) = matcher.trim_post_subdivide.as_deref() else {
        out.push(element(matcher, offset, offset + raw.len()));
        return;
    };
    let lead = trimmer.match_len(raw).unwrap_or(0);
    if lead == raw.len() {
        out.push(element(trimmer, offset, offset + raw.len()));
        return;
    }
    if lead > 0 {
        out.push(element(trimmer, offset, offset + lead));
    }
    let body = &raw[lead..];
    let mut tail = body.len();
    let mut cursor = 0;
    while let Some((start, end)) = trimmer.search(&body[cursor..]) {
        if cursor + end == body.len() {
            tail = cursor + start;
            break;
        }
        cursor += end;
    }
    out.push(element(matcher, offset + lead, offset + lead + tail));
    if tail < body.len() {
        out.push(element(trimmer, offset + lead + tail, offset + raw.len()));
    }
}

// =============================================================================
// Element → segment mapping
// =============================================================================

struct TokenStream<'f> {
    file: &'f TemplatedFile,
    /// Zero-length templated slices, i.e. source-only template text
    points: Vec<&'f TemplatedFileSlice>,
    next_point: usize,
    segments: Vec<Segment>,
    errors: Vec<LexError>,
}

impl<'f> TokenStream<'f> {
    fn new(file: &'f TemplatedFile) -> Self {
        Self {
            file,
            points: file
                .sliced_file()
                .iter()
                .filter(|s| s.templated_slice.is_empty() && !s.source_slice.is_empty())
                .collect(),
            next_point: 0,
            segments: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn build(&mut self, elements: &[Element]) {
        for el in elements {
            self.flush_points(|pos| pos <= el.start);
            let mut cursor = el.start;
            while let Some(slice) = self.points.get(self.next_point).copied() {
                let pos = usize::from(slice.templated_slice.start());
                if pos >= el.end {
                    break;
                }
                self.push_token(el, cursor, pos);
                self.push_placeholder(slice);
                self.next_point += 1;
                cursor = pos;
            }
            self.push_token(el, cursor, el.end);
        }
        self.flush_points(|_| true);

        let end = self.file.templated_str.len();
        let (line_no, line_pos) = self.file.get_line_pos_of_char_pos(end, false);
        let marker = PositionMarker::new(point(self.file.source_str.len()), point(end), line_no, line_pos, true);
        self.segments.push(Segment::meta(MetaKind::EndOfFile, Some(marker)));
    }

    fn flush_points(&mut self, until: impl Fn(usize) -> bool) {
        while let Some(slice) = self.points.get(self.next_point).copied() {
            if !until(usize::from(slice.templated_slice.start())) {
                break;
            }
            self.push_placeholder(slice);
            self.next_point += 1;
        }
    }

    fn marker(&self, templated: TextRange) -> PositionMarker {
        let (start, _) = bounds(templated);
        let (line_no, line_pos) = self.file.get_line_pos_of_char_pos(start, false);
        match self.file.templated_slice_to_source_slice(templated) {
            Ok(source) => {
                let is_literal = self.file.is_source_slice_literal(source);
                PositionMarker::new(source, templated, line_no, line_pos, is_literal)
            }
            Err(e) => {
                tracing::trace!(error = %e, "token inside templated region");
                let source = self.file.enclosing_source_slice(templated).unwrap_or(point(0));
                PositionMarker::new(source, templated, line_no, line_pos, false)
            }
        }
    }

    fn push_token(&mut self, el: &Element, start: usize, end: usize) {
        if start >= end {
            return;
        }
        let raw = &self.file.templated_str[start..end];
        let marker = self.marker(range(start, end));
        if el.seg_type == "unlexable" {
            self.errors
                .push(LexError::new(format!("Unable to lex characters: {raw:?}"), &marker));
        }
        self.segments
            .push(Segment::token(raw, el.seg_type.clone(), el.flags, Some(marker)));
    }

    fn push_placeholder(&mut self, slice: &TemplatedFileSlice) {
        let (s_start, s_stop) = bounds(slice.source_slice);
        let pos = usize::from(slice.templated_slice.start());
        let (line_no, line_pos) = self.file.get_line_pos_of_char_pos(pos, false);
        let source_str = &self.file.source_str[s_start..s_stop];
        let marker = PositionMarker::new(slice.source_slice, point(pos), line_no, line_pos, false);
        let placeholder = Segment::template_meta(MetaKind::Placeholder, source_str, slice.slice_type, Some(marker));
        let at = |source: usize| Some(PositionMarker::new(point(source), point(pos), line_no, line_pos, false));
        match slice.slice_type {
            SliceType::BlockStart => {
                self.segments.push(placeholder);
                self.segments
                    .push(Segment::template_meta(MetaKind::Indent, "", SliceType::BlockStart, at(s_stop)));
            }
            SliceType::BlockEnd => {
                self.segments
                    .push(Segment::template_meta(MetaKind::Dedent, "", SliceType::BlockEnd, at(s_start)));
                self.segments.push(placeholder);
            }
            _ => self.segments.push(placeholder),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::dialect_selector;
    use crate::templater::{PlaceholderTemplater, Templater};

    fn lex(sql: &str) -> LexOutput {
        Lexer::new(dialect_selector("ansi").unwrap()).lex_str(sql)
    }

    fn types(out: &LexOutput) -> Vec<&str> {
        out.segments.iter().map(|s| s.seg_type()).collect()
    }

    #[test]
    fn test_simple_select() {
        let out = lex("SELECT 1");
        assert_eq!(types(&out), vec!["word", "whitespace", "numeric_literal", "end_of_file"]);
        assert!(out.errors.is_empty());
        let one = &out.segments[2];
        assert_eq!(one.position().unwrap().line_pos, 8);
        assert!(one.position().unwrap().is_literal());
    }

    #[test]
    fn test_longest_match_wins() {
        let out = lex("a--b\n1.5");
        assert_eq!(types(&out), vec!["word", "comment", "newline", "numeric_literal", "end_of_file"]);
        assert_eq!(out.segments[1].raw(), "--b");
        assert!(out.segments[1].is_comment());
    }

    #[test]
    fn test_raw_round_trips() {
        let sql = "SELECT a::int, 'it''s' FROM \"t\" -- done\n";
        let out = lex(sql);
        let joined: String = out.segments.iter().map(|s| s.raw()).collect();
        assert_eq!(joined, sql);
    }

    #[test]
    fn test_block_comment_is_subdivided() {
        let out = lex("/* a\n  b */");
        let pieces: Vec<(&str, &str)> = out.segments.iter().map(|s| (s.seg_type(), s.raw())).collect();
        assert_eq!(
            pieces,
            vec![
                ("comment", "/* a"),
                ("newline", "\n"),
                ("whitespace", "  "),
                ("comment", "b */"),
                ("end_of_file", ""),
            ]
        );
    }

    #[test]
    fn test_unlexable_run_is_one_error() {
        let out = lex("SELECT $$ 1");
        assert_eq!(out.errors.len(), 1);
        assert!(out.segments.iter().any(|s| s.seg_type() == "unlexable" && s.raw() == "$$"));
        assert_eq!(out.errors[0].line_pos, 8);
    }

    #[test]
    fn test_templated_token_is_not_literal() {
        let file = PlaceholderTemplater::new()
            .with_var("col", "a")
            .process("SELECT {{ col }} ,b", "t.sql")
            .unwrap();
        let out = Lexer::new(dialect_selector("ansi").unwrap()).lex(&file);
        let a = out.segments.iter().find(|s| s.raw() == "a").unwrap();
        let pos = a.position().unwrap();
        assert!(!pos.is_literal());
        assert_eq!(pos.source_slice, range(7, 16));
        let ws = out.segments.iter().filter(|s| s.raw() == " ").nth(1).unwrap();
        assert!(ws.position().unwrap().is_literal());
        assert_eq!(ws.position().unwrap().source_slice, range(16, 17));
    }

    #[test]
    fn test_block_tags_become_placeholders_and_indents() {
        let file = PlaceholderTemplater::new()
            .with_var("flag", "true")
            .process("SELECT 1{% if flag %}, 2{% endif %}", "t.sql")
            .unwrap();
        let out = Lexer::new(dialect_selector("ansi").unwrap()).lex(&file);
        let metas: Vec<(&str, i32)> = out
            .segments
            .iter()
            .filter(|s| s.is_template_meta())
            .map(|s| (s.seg_type(), s.indent_val()))
            .collect();
        assert_eq!(
            metas,
            vec![("placeholder", 0), ("indent", 1), ("dedent", -1), ("placeholder", 0)]
        );
        assert!(out.template_blocks_indent);
        let tag = out.segments.iter().find(|s| s.is_template_meta()).unwrap();
        assert_eq!(tag.template_source(), Some("{% if flag %}"));
    }

    #[test]
    fn test_disabled_block_indents_are_neutralised() {
        let file = PlaceholderTemplater::new()
            .process("SELECT 1{% if x %}, 2{% endif %}", "t.sql")
            .unwrap();
        let out = Lexer::new(dialect_selector("ansi").unwrap())
            .with_template_blocks_indent(TemplateBlocksIndent::Disabled)
            .lex(&file);
        assert!(!out.template_blocks_indent);
        assert!(out.segments.iter().all(|s| s.indent_val() == 0));
    }
}
