//! Recursive-descent parser over lexed segments
//!
//! Parsing runs the dialect's grammar tables against the flat token list
//! produced by the lexer. Grammars never fail hard: anything they cannot
//! place ends up inside an `unparsable` node, and one [`ParseError`] is
//! reported per such node afterwards.
//!
//! ## Architecture
//!
//! ```text
//! &[Segment] (lexer output)
//!     ↓
//! matchers.rs         one routine per grammar variant
//!     ↓  uses
//! match_algorithms.rs longest match, bracket resolution, terminator scans
//!     ↓
//! MatchResult         slices + classes + metas, no segments built yet
//!     ↓  apply
//! Segment tree (file → statement → … → raw tokens)
//! ```
//!
//! A [`ParseContext`] carries the terminator stack, grammar config such as
//! `indented_joins`, a depth guard and a memo of `Ref` matches.

mod context;
mod match_algorithms;
mod match_result;
mod matchers;

pub use context::{DEFAULT_MAX_DEPTH, ParseAnnotation, ParseContext};
pub use match_algorithms::{
    greedy_match, longest_match, next_ex_bracket_match, next_match, prune_options, resolve_bracket,
    skip_start_index_forward_to_code, skip_stop_index_backward_to_code, trim_to_terminator,
};
pub use match_result::{MatchResult, Matched};
pub use matchers::match_grammar;

use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use crate::dialect::Dialect;
use crate::errors::ParseError;
use crate::segments::Segment;

/// Longest raw shown in an unparsable-section message.
const MAX_SNIPPET: usize = 40;

/// Stack reserved per level of grammar nesting on the parse thread.
const STACK_PER_LEVEL: usize = 16 * 1024;
const MIN_PARSE_STACK: usize = 8 * 1024 * 1024;

/// Result of parsing one file.
#[derive(Debug, Clone)]
pub struct ParseOutput {
    /// Root `file` segment; its raw equals the lexed text
    pub tree: Segment,
    pub errors: Vec<ParseError>,
    pub annotations: Vec<ParseAnnotation>,
    pub cache_hits: usize,
}

/// Parser for one dialect.
#[derive(Debug, Clone)]
pub struct Parser<'d> {
    dialect: &'d Dialect,
    indent_config: FxHashMap<SmolStr, SmolStr>,
    max_depth: usize,
}

impl<'d> Parser<'d> {
    pub fn new(dialect: &'d Dialect) -> Self {
        Self {
            dialect,
            indent_config: FxHashMap::default(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Set a flag read by conditional grammars, e.g. `indented_joins`.
    pub fn with_indent_config(mut self, key: impl Into<SmolStr>, value: impl Into<SmolStr>) -> Self {
        self.indent_config.insert(key.into(), value.into());
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn dialect(&self) -> &'d Dialect {
        self.dialect
    }

    fn context(&self) -> ParseContext<'d> {
        ParseContext::new(self.dialect, self.indent_config.clone()).with_max_depth(self.max_depth)
    }

    /// Run `f` on a thread whose stack fits `max_depth` levels of matching,
    /// so the depth guard trips before the stack runs out.
    fn on_parse_stack<R: Send>(&self, f: impl Fn() -> R + Sync) -> R {
        let stack_size = self.max_depth.saturating_mul(STACK_PER_LEVEL).max(MIN_PARSE_STACK);
        // Logs from the parse thread go to the caller's subscriber.
        let dispatch = tracing::dispatcher::get_default(Clone::clone);
        std::thread::scope(|scope| {
            let body = &f;
            let dispatch = &dispatch;
            let spawned = std::thread::Builder::new()
                .name("sqlint-parse".to_string())
                .stack_size(stack_size)
                .spawn_scoped(scope, move || tracing::dispatcher::with_default(dispatch, body));
            match spawned {
                Ok(handle) => match handle.join() {
                    Ok(out) => out,
                    Err(payload) => std::panic::resume_unwind(payload),
                },
                Err(e) => {
                    tracing::warn!(error = %e, stack_size, "could not start parse thread, parsing inline");
                    f()
                }
            }
        })
    }

    /// Parse lexed segments into a `file` tree.
    ///
    /// Leading and trailing non-code stays outside the root match. Code the
    /// root grammar leaves unclaimed is wrapped as unparsable.
    pub fn parse(&self, segments: &[Segment]) -> ParseOutput {
        self.on_parse_stack(|| self.parse_segments(segments))
    }

    fn parse_segments(&self, segments: &[Segment]) -> ParseOutput {
        let mut ctx = self.context();
        let len = segments.len();
        let start = skip_start_index_forward_to_code(segments, 0, len);
        let end = skip_stop_index_backward_to_code(segments, len, start);

        if start == end {
            let tree = Segment::file(segments.to_vec());
            return ParseOutput {
                tree,
                errors: Vec::new(),
                annotations: ctx.take_annotations(),
                cache_hits: 0,
            };
        }

        let root = self.dialect.root();
        let m = match_grammar(&segments[..end], start, root, &mut ctx);
        tracing::trace!(root_match = %m.stringify(), "root match");

        let mut content: Vec<Segment> = segments[..start].to_vec();
        if m.is_match() {
            content.extend(m.apply(segments));
            let unmatched = &segments[m.stop().max(start)..end];
            let code_at = unmatched.iter().position(Segment::is_code).unwrap_or(unmatched.len());
            content.extend_from_slice(&unmatched[..code_at]);
            if code_at < unmatched.len() {
                content.push(Segment::unparsable(
                    unmatched[code_at..].to_vec(),
                    Some("Nothing else in FileSegment.".to_string()),
                ));
            }
        } else {
            let expected = self.dialect.tables().describe(root);
            content.push(Segment::unparsable(segments[start..end].to_vec(), Some(expected)));
        }
        content.extend_from_slice(&segments[end..]);

        let tree = Segment::file(content);
        let errors = unparsable_errors(&tree);
        tracing::debug!(
            dialect = self.dialect.name(),
            errors = errors.len(),
            cache_hits = ctx.cache_hits(),
            "parsed file"
        );
        ParseOutput {
            tree,
            errors,
            annotations: ctx.take_annotations(),
            cache_hits: ctx.cache_hits(),
        }
    }

    /// Whether `node` still matches the grammar that built it.
    ///
    /// Used after fixes change a node's children. Nodes without a recorded
    /// grammar are accepted.
    pub fn revalidate(&self, node: &Segment) -> bool {
        let Some(grammar) = node.grammar() else {
            return true;
        };
        let leaves: Vec<Segment> = node
            .iter_raw_segments()
            .filter(|s| !s.is_meta() || s.is_template_meta())
            .cloned()
            .collect();
        let start = skip_start_index_forward_to_code(&leaves, 0, leaves.len());
        let stop = skip_stop_index_backward_to_code(&leaves, leaves.len(), start);
        self.on_parse_stack(|| {
            let mut ctx = self.context();
            let m = match_grammar(&leaves[..stop], start, grammar, &mut ctx);
            m.matched_slice == (start..stop) && !m.has_unparsable()
        })
    }
}

/// One error per unparsable node in `tree`.
pub fn unparsable_errors(tree: &Segment) -> Vec<ParseError> {
    tree.recursive_crawl(&["unparsable"], true)
        .filter_map(|seg| {
            let pos = seg.position()?;
            let raw = seg.raw();
            let snippet = if raw.chars().count() < MAX_SNIPPET {
                raw.to_string()
            } else {
                format!("{}...", raw.chars().take(MAX_SNIPPET).collect::<String>())
            };
            let error = ParseError::new(format!("Found unparsable section: {snippet:?}"), pos);
            Some(match seg.expected() {
                Some(expected) => error.with_expected(expected),
                None => error,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::dialect_selector;
    use crate::lexer::Lexer;

    fn parse(sql: &str) -> ParseOutput {
        let dialect = dialect_selector("ansi").unwrap();
        let lexed = Lexer::new(dialect).lex_str(sql);
        Parser::new(dialect).parse(&lexed.segments)
    }

    fn types_of(tree: &Segment, types: &[&str]) -> usize {
        tree.recursive_crawl(types, true).count()
    }

    #[test]
    fn test_simple_select() {
        let out = parse("SELECT a, b FROM t\n");
        assert!(out.errors.is_empty(), "{:?}", out.errors);
        assert_eq!(out.tree.raw(), "SELECT a, b FROM t\n");
        assert_eq!(types_of(&out.tree, &["select_statement"]), 1);
        assert_eq!(types_of(&out.tree, &["select_clause_element"]), 2);
        assert_eq!(types_of(&out.tree, &["from_clause"]), 1);
        assert_eq!(types_of(&out.tree, &["table_reference"]), 1);
    }

    #[test]
    fn test_missing_from_target_is_unparsable() {
        let out = parse("SELECT a FROM");
        assert_eq!(out.errors.len(), 1);
        let from = out.tree.recursive_crawl(&["from_clause"], true).next().unwrap();
        assert!(from.segments()[0].is_unparsable());
        assert_eq!(from.segments()[0].raw(), "FROM");
        assert!(out.errors[0].message.contains("FROM"));
    }

    #[test]
    fn test_trailing_garbage_is_unparsable() {
        let out = parse("SELECT 1; )");
        assert_eq!(out.errors.len(), 1);
        let unparsable = out.tree.recursive_crawl(&["unparsable"], true).next().unwrap();
        assert_eq!(unparsable.raw(), ")");
        assert_eq!(unparsable.expected(), Some("Nothing else in FileSegment."));
    }

    #[test]
    fn test_whitespace_only_file() {
        let out = parse("  \n");
        assert!(out.errors.is_empty());
        assert_eq!(out.tree.raw(), "  \n");
    }

    #[test]
    fn test_multiple_statements() {
        let out = parse("SELECT 1;\nSELECT 2;\n");
        assert!(out.errors.is_empty(), "{:?}", out.errors);
        assert_eq!(types_of(&out.tree, &["statement"]), 2);
        assert_eq!(types_of(&out.tree, &["statement_terminator"]), 2);
    }

    fn nested(levels: usize) -> String {
        format!("SELECT {}1{}\n", "(".repeat(levels), ")".repeat(levels))
    }

    #[test]
    fn test_deeply_nested_brackets_parse() {
        for levels in [60, 150] {
            let out = parse(&nested(levels));
            assert!(out.errors.is_empty(), "{levels} levels: {:?}", out.errors);
            assert_eq!(types_of(&out.tree, &["bracketed"]), levels);
        }
    }

    #[test]
    fn test_depth_limit_gives_unparsable_not_overflow() {
        let dialect = dialect_selector("ansi").unwrap();
        let lexed = Lexer::new(dialect).lex_str(&nested(60));
        let out = Parser::new(dialect).with_max_depth(64).parse(&lexed.segments);
        assert!(!out.errors.is_empty());
        assert_eq!(out.tree.raw(), nested(60));
    }

    #[test]
    fn test_revalidate_accepts_parsed_nodes() {
        let dialect = dialect_selector("ansi").unwrap();
        let parser = Parser::new(dialect);
        let out = parse("SELECT a FROM t");
        let clause = out.tree.recursive_crawl(&["select_clause"], true).next().unwrap();
        assert!(parser.revalidate(clause));
        let broken = clause.with_segments(vec![Segment::keyword("FROM")], None);
        assert!(!parser.revalidate(&broken));
    }

    #[test]
    fn test_every_token_survives_parsing() {
        let sql = "SELECT a + 1 AS x, CASE WHEN b THEN 'y' END FROM t AS u WHERE c = 2 -- note\n";
        let out = parse(sql);
        assert!(out.errors.is_empty(), "{:?}", out.errors);
        assert_eq!(out.tree.raw(), sql);
    }
}
