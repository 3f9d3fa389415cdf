//! Rule trait, results and the crawler that drives rule evaluation

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;

use super::context::{Memory, RuleContext};
use super::lint_fix::LintFix;
use crate::base::{PositionMarker, TextRange};
use crate::dialect::Dialect;
use crate::errors::{LexError, ParseError, RuleInternalError, Severity};
use crate::segments::Segment;
use crate::templater::TemplatedFile;

// ============================================================================
// RULE DEFINITION
// ============================================================================

/// A configuration keyword a rule accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigKeyword {
    pub name: &'static str,
    pub description: &'static str,
    pub default: &'static str,
    /// Accepted values; empty accepts anything
    pub allowed: &'static [&'static str],
}

/// Validated keyword values for one rule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleConfig {
    values: FxHashMap<String, String>,
}

impl RuleConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, keyword: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(keyword.into(), value.into());
        self
    }

    pub fn get(&self, keyword: &str) -> Option<&str> {
        self.values.get(keyword).map(String::as_str)
    }

    /// Value of `keyword`, falling back to its declared default.
    pub fn get_or_default<'a>(&'a self, keyword: &ConfigKeyword) -> &'a str {
        self.get(keyword.name).unwrap_or(keyword.default)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RuleConfig {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Which segments the crawler offers to a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlBehaviour {
    /// Every segment, pre-order
    AllSegments,
    /// Only the root `file` segment
    RootOnly,
    /// Segments of any of these types
    SegmentTypes(&'static [&'static str]),
}

impl CrawlBehaviour {
    fn wants(&self, segment: &Segment, is_root: bool) -> bool {
        match self {
            Self::AllSegments => true,
            Self::RootOnly => is_root,
            Self::SegmentTypes(types) => segment.is_any_type(types),
        }
    }
}

/// A lint rule.
///
/// Rules are instantiated per file, so `eval` may be called from any
/// worker thread but never concurrently on one instance.
pub trait Rule: Send + Sync + fmt::Debug {
    /// Code such as `L001`
    fn code(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn config_keywords(&self) -> &'static [ConfigKeyword] {
        &[]
    }

    /// Whether the rule still runs inside unparsable sections.
    fn works_on_unparsable(&self) -> bool {
        false
    }

    fn crawl_behaviour(&self) -> CrawlBehaviour {
        CrawlBehaviour::AllSegments
    }

    /// Evaluate one segment. Results without an anchor only update memory.
    fn eval(&self, ctx: &RuleContext<'_>) -> Vec<LintResult>;
}

// ============================================================================
// RESULTS
// ============================================================================

/// Outcome of one rule evaluation.
#[derive(Debug, Clone, Default)]
pub struct LintResult {
    pub anchor: Option<Segment>,
    pub fixes: Vec<LintFix>,
    pub memory: Option<Memory>,
    pub description: Option<String>,
}

impl LintResult {
    pub fn new(anchor: &Segment) -> Self {
        Self {
            anchor: Some(anchor.clone()),
            ..Self::default()
        }
    }

    /// A result that only carries memory forward.
    pub fn memory_only(memory: Memory) -> Self {
        Self {
            memory: Some(memory),
            ..Self::default()
        }
    }

    /// Attach fixes, dropping any that would change nothing.
    pub fn with_fixes(mut self, fixes: Vec<LintFix>) -> Self {
        self.fixes = fixes.into_iter().filter(|f| !f.is_trivial()).collect();
        self
    }

    pub fn with_memory(mut self, memory: Memory) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A violation reported for a file.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct LintViolation {
    /// Rule code, or an error code (`PRS`, `LXR`, ...) for non-rule errors
    pub code: SmolStr,
    pub description: String,
    pub line_no: usize,
    pub line_pos: usize,
    pub source_slice: TextRange,
    pub severity: Severity,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub fixes: Vec<LintFix>,
}

impl LintViolation {
    pub fn new(code: impl Into<SmolStr>, description: impl Into<String>, position: Option<&PositionMarker>) -> Self {
        let (line_no, line_pos, source_slice) = position.map_or((1, 1, TextRange::default()), |p| {
            (p.line_no, p.line_pos, p.source_slice)
        });
        Self {
            code: code.into(),
            description: description.into(),
            line_no,
            line_pos,
            source_slice,
            severity: Severity::Error,
            fixes: Vec::new(),
        }
    }

    pub fn with_fixes(mut self, fixes: Vec<LintFix>) -> Self {
        self.fixes = fixes;
        self
    }

    pub fn fixable(&self) -> bool {
        !self.fixes.is_empty()
    }

    /// Whether this came from a rule rather than lexing or parsing.
    pub fn is_rule_violation(&self) -> bool {
        self.code.starts_with('L') && self.code.len() == 4
    }
}

impl fmt::Display for LintViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L:{:4} | P:{:4} | {} | {}", self.line_no, self.line_pos, self.code, self.description)
    }
}

impl From<&ParseError> for LintViolation {
    fn from(e: &ParseError) -> Self {
        Self {
            code: SmolStr::new_static(e.code().as_str()),
            description: e.message.clone(),
            line_no: e.line_no,
            line_pos: e.line_pos,
            source_slice: e.source_slice,
            severity: Severity::Error,
            fixes: Vec::new(),
        }
    }
}

impl From<&LexError> for LintViolation {
    fn from(e: &LexError) -> Self {
        Self {
            code: SmolStr::new_static(e.code().as_str()),
            description: e.message.clone(),
            line_no: e.line_no,
            line_pos: e.line_pos,
            source_slice: e.source_slice,
            severity: Severity::Error,
            fixes: Vec::new(),
        }
    }
}

impl From<&RuleInternalError> for LintViolation {
    fn from(e: &RuleInternalError) -> Self {
        Self {
            code: e.code.clone(),
            description: e.to_string(),
            line_no: e.line_no,
            line_pos: e.line_pos,
            source_slice: TextRange::default(),
            severity: Severity::Error,
            fixes: Vec::new(),
        }
    }
}

// ============================================================================
// TEMPLATE SAFETY
// ============================================================================

/// Drop every fix on `result` if any of them could corrupt templated code.
///
/// A result's fixes are discarded together when one touches a templated
/// slice, when they span more than one template block, or when they touch a
/// loop body that renders only literal SQL (editing one iteration would
/// edit them all).
pub fn discard_unsafe_fixes(result: &mut LintResult, templated_file: &TemplatedFile) {
    if result.fixes.is_empty() {
        return;
    }
    if result.fixes.iter().any(|f| f.has_template_conflicts(templated_file)) {
        tracing::info!(fixes = ?result.fixes, "discarding fixes that touch templated code");
        result.fixes.clear();
        return;
    }

    let block_info = templated_file.raw_slice_block_info();
    let mut block_ids: FxHashSet<usize> = FxHashSet::default();
    for fix in &result.fixes {
        for slice in fix.fix_slices(templated_file, true) {
            if slice.is_source_only() || !block_info.block_ids.contains_key(&slice.source_idx) {
                continue;
            }
            block_ids.insert(block_info.block_id(&slice));
        }
    }
    if block_ids.len() > 1 {
        tracing::info!(fixes = ?result.fixes, "discarding fixes that span multiple template blocks");
        result.fixes.clear();
        return;
    }
    if block_ids.iter().any(|id| block_info.literal_only_loops.contains(id)) {
        tracing::info!(fixes = ?result.fixes, "discarding fixes inside a literal-only loop");
        result.fixes.clear();
    }
}

// ============================================================================
// CRAWLING
// ============================================================================

/// Everything one rule produced over a tree.
#[derive(Debug, Clone, Default)]
pub struct CrawlOutput {
    pub violations: Vec<LintViolation>,
    /// Set when the rule panicked; the crawl stopped there
    pub internal_error: Option<RuleInternalError>,
}

impl CrawlOutput {
    /// Fixes from every violation, in document order.
    pub fn fixes(&self) -> Vec<LintFix> {
        self.violations.iter().flat_map(|v| v.fixes.iter().cloned()).collect()
    }
}

struct Crawler<'a> {
    rule: &'a dyn Rule,
    dialect: &'a Dialect,
    templated_file: &'a TemplatedFile,
    behaviour: CrawlBehaviour,
    parent_stack: Vec<Segment>,
    raw_stack: Vec<Segment>,
    memory: Memory,
    output: CrawlOutput,
}

impl Crawler<'_> {
    /// Returns false once the rule has failed and crawling must stop.
    fn visit(&mut self, segment: &Segment, siblings_pre: &[Segment], siblings_post: &[Segment]) -> bool {
        if segment.is_unparsable() && !self.rule.works_on_unparsable() {
            // Keep the raw stack complete for later segments.
            self.raw_stack.extend(segment.raw_segments());
            return true;
        }

        if self.behaviour.wants(segment, self.parent_stack.is_empty()) {
            let ctx = RuleContext {
                segment,
                parent_stack: &self.parent_stack,
                siblings_pre,
                siblings_post,
                raw_stack: &self.raw_stack,
                memory: &self.memory,
                dialect: self.dialect,
                templated_file: self.templated_file,
            };
            let rule = self.rule;
            let results = match panic::catch_unwind(AssertUnwindSafe(|| rule.eval(&ctx))) {
                Ok(results) => results,
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    tracing::warn!(rule = rule.code(), %message, "rule panicked, skipping it for this file");
                    self.output.internal_error =
                        Some(RuleInternalError::new(rule.code(), message).at(segment.position()));
                    return false;
                }
            };
            for mut result in results {
                if let Some(memory) = result.memory.take() {
                    self.memory = memory;
                }
                let Some(anchor) = result.anchor.clone() else {
                    continue;
                };
                discard_unsafe_fixes(&mut result, self.templated_file);
                let description = result.description.take().unwrap_or_else(|| rule.description().to_string());
                self.output.violations.push(
                    LintViolation::new(rule.code(), description, anchor.position()).with_fixes(result.fixes),
                );
            }
        }

        if self.behaviour == CrawlBehaviour::RootOnly {
            return true;
        }
        if segment.is_raw() {
            self.raw_stack.push(segment.clone());
            return true;
        }
        self.parent_stack.push(segment.clone());
        let children = segment.segments();
        for (idx, child) in children.iter().enumerate() {
            if !self.visit(child, &children[..idx], &children[idx + 1..]) {
                return false;
            }
        }
        self.parent_stack.pop();
        true
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "rule panicked".to_string()
    }
}

/// Run `rule` over `tree` in pre-order, threading the rule's memory from
/// one evaluation to the next.
pub fn crawl(rule: &dyn Rule, tree: &Segment, dialect: &Dialect, templated_file: &TemplatedFile) -> CrawlOutput {
    let mut crawler = Crawler {
        rule,
        dialect,
        templated_file,
        behaviour: rule.crawl_behaviour(),
        parent_stack: Vec::new(),
        raw_stack: Vec::new(),
        memory: Memory::default(),
        output: CrawlOutput::default(),
    };
    crawler.visit(tree, &[], &[]);
    tracing::trace!(rule = rule.code(), violations = crawler.output.violations.len(), "crawled");
    crawler.output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::dialect_selector;
    use crate::lexer::Lexer;
    use crate::parser::Parser;
    use crate::rules::EditType;

    fn parse(sql: &str) -> (Segment, TemplatedFile) {
        let dialect = dialect_selector("ansi").unwrap();
        let tf = TemplatedFile::from_string(sql);
        let lexed = Lexer::new(dialect).lex(&tf);
        (Parser::new(dialect).parse(&lexed.segments).tree, tf)
    }

    /// Flags every comma and counts how many it has seen in memory.
    #[derive(Debug)]
    struct CountCommas;

    impl Rule for CountCommas {
        fn code(&self) -> &'static str {
            "L900"
        }
        fn description(&self) -> &'static str {
            "Comma."
        }
        fn crawl_behaviour(&self) -> CrawlBehaviour {
            CrawlBehaviour::SegmentTypes(&["comma"])
        }
        fn eval(&self, ctx: &RuleContext<'_>) -> Vec<LintResult> {
            let seen = ctx.memory.get::<usize>().copied().unwrap_or(0) + 1;
            vec![LintResult::new(ctx.segment)
                .with_memory(Memory::new(seen))
                .with_description(format!("Comma number {seen}."))]
        }
    }

    #[derive(Debug)]
    struct Panics;

    impl Rule for Panics {
        fn code(&self) -> &'static str {
            "L901"
        }
        fn description(&self) -> &'static str {
            "Always fails."
        }
        fn eval(&self, _ctx: &RuleContext<'_>) -> Vec<LintResult> {
            panic!("boom")
        }
    }

    #[derive(Debug)]
    struct DeleteWhitespace;

    impl Rule for DeleteWhitespace {
        fn code(&self) -> &'static str {
            "L902"
        }
        fn description(&self) -> &'static str {
            "Whitespace."
        }
        fn crawl_behaviour(&self) -> CrawlBehaviour {
            CrawlBehaviour::SegmentTypes(&["whitespace"])
        }
        fn eval(&self, ctx: &RuleContext<'_>) -> Vec<LintResult> {
            vec![LintResult::new(ctx.segment).with_fixes(vec![LintFix::delete(ctx.segment)])]
        }
    }

    #[test]
    fn test_memory_is_threaded_between_evaluations() {
        let dialect = dialect_selector("ansi").unwrap();
        let (tree, tf) = parse("SELECT a, b, c FROM t");
        let out = crawl(&CountCommas, &tree, dialect, &tf);
        let descriptions: Vec<_> = out.violations.iter().map(|v| v.description.as_str()).collect();
        assert_eq!(descriptions, vec!["Comma number 1.", "Comma number 2."]);
        assert_eq!((out.violations[0].line_no, out.violations[0].line_pos), (1, 9));
    }

    #[test]
    fn test_panicking_rule_becomes_internal_error() {
        let dialect = dialect_selector("ansi").unwrap();
        let (tree, tf) = parse("SELECT 1");
        let out = crawl(&Panics, &tree, dialect, &tf);
        let err = out.internal_error.unwrap();
        assert_eq!(err.code, "L901");
        assert!(err.message.contains("boom"));
        assert!(out.violations.is_empty());
    }

    #[test]
    fn test_unparsable_sections_are_skipped() {
        let dialect = dialect_selector("ansi").unwrap();
        let (tree, tf) = parse("SELECT 1; ) , (");
        let out = crawl(&CountCommas, &tree, dialect, &tf);
        assert!(out.violations.is_empty());
    }

    #[test]
    fn test_fixes_collected_from_violations() {
        let dialect = dialect_selector("ansi").unwrap();
        let (tree, tf) = parse("SELECT 1 FROM t");
        let out = crawl(&DeleteWhitespace, &tree, dialect, &tf);
        assert_eq!(out.violations.len(), 3);
        let fixes = out.fixes();
        assert_eq!(fixes.len(), 3);
        assert!(fixes.iter().all(|f| f.edit_type == EditType::Delete));
        assert!(out.violations.iter().all(LintViolation::fixable));
    }

    #[test]
    fn test_parse_error_to_violation() {
        let marker = PositionMarker::new(crate::base::range(0, 1), crate::base::range(0, 1), 1, 1, true);
        let v = LintViolation::from(&ParseError::new("Found unparsable section: \")\"", &marker));
        assert_eq!(v.code, "PRS");
        assert!(!v.fixable());
        assert!(!v.is_rule_violation());
    }
}
