//! # sqlint-base
//!
//! Core library for dialect-aware SQL linting: templating, lexing,
//! grammar-driven parsing, lint rules and template-safe fixing.
//!
//! ## Module Structure (dependency order)
//!
//! ```text
//! linter    → Linter, config, noqa, fix loop, LintedFile
//!   ↓
//! fix       → AnchorEditInfo, apply_fixes, source patch splicing
//!   ↓
//! rules     → Rule trait, crawler, LintFix, L001/L005/L008/L009/L010
//!   ↓
//! parser    → recursive-descent matching over grammar tables
//!   ↓
//! lexer     → table-driven lexer, template placeholders and metas
//!   ↓
//! dialect   → grammar builder, flat GrammarTables, ANSI dialect
//!   ↓
//! segments  → immutable Segment tree, iter_patches, position layout
//!   ↓
//! templater → TemplatedFile, RawFileSlice, Templater implementations
//!   ↓
//! base      → PositionMarker, GrammarId, TextRange
//! ```
//!
//! `errors` holds the error taxonomy used by every layer.

// ============================================================================
// MODULES (dependency order: base → templater → segments → ... → linter)
// ============================================================================

/// Foundation types: PositionMarker, GrammarId, TextRange
pub mod base;

/// Error codes, severities and per-stage error types
pub mod errors;

/// Templated files and the templaters that produce them
pub mod templater;

/// The segment tree
pub mod segments;

/// Grammar tables and dialects
pub mod dialect;

/// Lexer
pub mod lexer;

/// Parser
pub mod parser;

/// Lint rules and the crawler
pub mod rules;

/// Fix application and source patching
pub mod fix;

/// Linting orchestration
pub mod linter;

// Re-export the main entry points
pub use base::{GrammarId, PositionMarker, TextRange, TextSize};
pub use dialect::{Dialect, dialect_readout, dialect_selector};
pub use errors::{ErrorCode, LintError, Severity};
pub use linter::{FluffConfig, IndentConfig, LintedFile, Linter};
pub use rules::{LintFix, LintViolation, Rule, RuleRegistry};
pub use segments::Segment;
pub use templater::{PlaceholderTemplater, RawTemplater, TemplatedFile, Templater};
