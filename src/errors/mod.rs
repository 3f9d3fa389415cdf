//! Error handling for the lint pipeline
//!
//! This module provides:
//! - Categorized error codes for filtering and reporting
//! - One error type per pipeline stage
//! - Severity levels shared by violations

mod codes;
mod error;

pub use codes::ErrorCode;
pub use error::{
    ConfigError, GrammarError, LexError, LintError, ParseError, RuleInternalError, Severity, TemplateError,
    TemplateMappingError, UnfixableWarning,
};
