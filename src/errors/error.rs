//! Error types for every stage of the lint pipeline
//!
//! Provides:
//! - Severity levels
//! - One error type per stage (lexing, parsing, templating, rules, config)
//! - Fatal errors that abort a single file ([`LintError`])
//!
//! Everything except [`GrammarError`] and [`ConfigError`] is recoverable: the
//! stage records the error and carries on.

use smol_str::SmolStr;
use thiserror::Error;

use super::codes::ErrorCode;
use crate::base::{PositionMarker, TextRange};

/// Severity level for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Severity {
    /// A hard error that prevents a clean lint
    #[default]
    Error,
    /// A warning that doesn't prevent linting
    Warning,
    /// An informational hint
    Hint,
}

impl Severity {
    /// Check if this is an error
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error)
    }

    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Hint => "hint",
        }
    }
}

// ============================================================================
// LEXING
// ============================================================================

/// A raw character sequence not matched by any lexer matcher.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Line {line_no}, Position {line_pos}: {message}")]
pub struct LexError {
    pub message: String,
    pub source_slice: TextRange,
    pub line_no: usize,
    pub line_pos: usize,
}

impl LexError {
    pub fn new(message: impl Into<String>, marker: &PositionMarker) -> Self {
        Self {
            message: message.into(),
            source_slice: marker.source_slice,
            line_no: marker.line_no,
            line_pos: marker.line_pos,
        }
    }

    pub fn code(&self) -> ErrorCode {
        ErrorCode::Lexing
    }
}

// ============================================================================
// PARSING
// ============================================================================

/// A required grammar element did not match.
///
/// The parser never raises these; one is synthesised per unparsable
/// segment after parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Line {line_no}, Position {line_pos}: {message}")]
pub struct ParseError {
    pub message: String,
    /// Description of what the grammar expected at this point
    pub expected: Option<String>,
    pub source_slice: TextRange,
    pub line_no: usize,
    pub line_pos: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, marker: &PositionMarker) -> Self {
        Self {
            message: message.into(),
            expected: None,
            source_slice: marker.source_slice,
            line_no: marker.line_no,
            line_pos: marker.line_pos,
        }
    }

    /// Attach what the grammar was looking for
    pub fn with_expected(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }

    pub fn code(&self) -> ErrorCode {
        ErrorCode::Parsing
    }
}

// ============================================================================
// TEMPLATING
// ============================================================================

/// `templated_slice_to_source_slice` could not produce a source slice.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateMappingError {
    #[error("templated slice {slice:?} lies inside a templated region")]
    InsideTemplated { slice: TextRange },
    #[error("templated slice {slice:?} is outside templated text of length {len}")]
    OutOfRange { slice: TextRange, len: usize },
}

impl TemplateMappingError {
    pub fn code(&self) -> ErrorCode {
        ErrorCode::Templating
    }
}

/// A templater could not render its input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unclosed `{tag}` block opened at offset {offset}")]
    UnclosedBlock { tag: SmolStr, offset: usize },
    #[error("unexpected `{tag}` at offset {offset}")]
    UnexpectedEnd { tag: SmolStr, offset: usize },
    #[error("unsupported template tag `{tag}` at offset {offset}")]
    UnsupportedTag { tag: SmolStr, offset: usize },
    #[error("invalid variable name `{name}` at offset {offset}")]
    InvalidName { name: SmolStr, offset: usize },
    #[error("sliced file does not tile the {space} text: {reason}")]
    InvalidSlices { space: &'static str, reason: String },
}

impl TemplateError {
    pub fn code(&self) -> ErrorCode {
        ErrorCode::Templating
    }
}

// ============================================================================
// RULES
// ============================================================================

/// A rule's evaluation panicked or returned a bad shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unexpected exception: {message}; Could you open an issue? You can ignore this \
         error by adding `-- noqa: {code}` to the line.")]
pub struct RuleInternalError {
    pub code: SmolStr,
    pub message: String,
    pub line_no: usize,
    pub line_pos: usize,
}

impl RuleInternalError {
    pub fn new(code: impl Into<SmolStr>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            line_no: 1,
            line_pos: 1,
        }
    }

    pub fn at(mut self, marker: Option<&PositionMarker>) -> Self {
        if let Some(marker) = marker {
            self.line_no = marker.line_no;
            self.line_pos = marker.line_pos;
        }
        self
    }

    pub fn code(&self) -> ErrorCode {
        ErrorCode::RuleInternal
    }
}

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Invalid configuration, raised while building a rule set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unknown dialect `{0}`")]
    UnknownDialect(String),
    #[error("unknown rule `{0}`")]
    UnknownRule(String),
    #[error("rule {rule} has no config keyword `{keyword}`")]
    UnknownKeyword { rule: String, keyword: String },
    #[error("invalid value `{value}` for {rule}.{keyword}; expected one of {expected}")]
    InvalidValue {
        rule: String,
        keyword: String,
        value: String,
        expected: String,
    },
}

impl ConfigError {
    pub fn code(&self) -> ErrorCode {
        ErrorCode::Config
    }
}

// ============================================================================
// FIX LOOP
// ============================================================================

/// The fix loop could not reach a fixpoint cleanly.
///
/// Logged, never fatal: the last stable tree is kept.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnfixableWarning {
    #[error("rule {rule} proposed the same fixes again in loop {loop_idx}")]
    RepeatedFixes { rule: SmolStr, loop_idx: usize },
    #[error("rule {rule} produced a previously seen file in loop {loop_idx}")]
    Cycle { rule: SmolStr, loop_idx: usize },
    #[error("rule {rule} returned conflicting fixes with the same anchor")]
    ConflictingFixes { rule: SmolStr },
    #[error("runaway limit of {limit} loops reached")]
    RunawayLimit { limit: usize },
}

impl UnfixableWarning {
    pub fn code(&self) -> ErrorCode {
        ErrorCode::Unfixable
    }
}

// ============================================================================
// GRAMMAR TABLES
// ============================================================================

/// Grammar tables failed to build or failed the load-time integrity check.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrammarError {
    #[error("reference to undefined grammar `{0}`")]
    UnknownReference(SmolStr),
    #[error("grammar `{0}` is defined twice")]
    DuplicateDefinition(SmolStr),
    #[error("grammar `{0}` refers to itself without consuming input")]
    SelfReference(SmolStr),
    #[error("instruction {inst}: child id {child} out of range")]
    ChildOutOfRange { inst: u32, child: u32 },
    #[error("instruction {inst}: terminator id {terminator} out of range")]
    TerminatorOutOfRange { inst: u32, terminator: u32 },
    #[error("instruction {inst}: {what} slice out of range")]
    SliceOutOfRange { inst: u32, what: &'static str },
    #[error("instruction {inst}: aux data [{offset}..{end}) exceeds table of length {len}")]
    AuxOutOfRange { inst: u32, offset: usize, end: usize, len: usize },
    #[error("instruction {inst}: string id {id} out of range")]
    StringOutOfRange { inst: u32, id: u32 },
    #[error("instruction {inst}: regex id {id} out of range")]
    RegexOutOfRange { inst: u32, id: u32 },
    #[error("invalid regex `{pattern}`: {message}")]
    Regex { pattern: String, message: String },
    #[error("root grammar `{0}` not found")]
    MissingRoot(SmolStr),
    #[error("too many {0} for the table layout")]
    Overflow(&'static str),
}

impl GrammarError {
    pub fn code(&self) -> ErrorCode {
        ErrorCode::Grammar
    }
}

// ============================================================================
// FATAL
// ============================================================================

/// Errors that abort linting of a file (or the whole run).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LintError {
    #[error(transparent)]
    Grammar(#[from] GrammarError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error("internal invariant violated: {0}")]
    Internal(String),
}

impl LintError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Grammar(e) => e.code(),
            Self::Config(e) => e.code(),
            Self::Template(e) => e.code(),
            Self::Internal(_) => ErrorCode::Grammar,
        }
    }
}
