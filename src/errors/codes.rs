//! Error code definitions for lint diagnostics
//!
//! Codes are short upper-case tags so they sit in the same column as rule
//! codes (`L001`, `L010`) when violations are listed:
//! - LXR: Lexing errors (unmatched characters)
//! - PRS: Parsing errors (unparsable sections)
//! - TMP: Templating errors (bad markup, unmappable slices)
//! - RUL: A rule failed internally
//! - CFG: Invalid configuration
//! - FIX: Fix loop could not reach a fixpoint
//! - GRM: Malformed grammar tables

use std::fmt;

/// Error codes for lint diagnostics
///
/// Each error code represents one category of the error taxonomy,
/// enabling filtering and stable reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorCode {
    /// Character sequence not matched by any lexer matcher
    Lexing,
    /// Required grammar element did not match
    Parsing,
    /// Template markup could not be processed or mapped
    Templating,
    /// A rule panicked or misbehaved during evaluation
    RuleInternal,
    /// Invalid configuration value
    Config,
    /// Fix loop produced a cycle or hit the runaway limit
    Unfixable,
    /// Grammar table failed the integrity check
    Grammar,
}

impl ErrorCode {
    /// Get the string representation of the error code (e.g., "PRS")
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lexing => "LXR",
            Self::Parsing => "PRS",
            Self::Templating => "TMP",
            Self::RuleInternal => "RUL",
            Self::Config => "CFG",
            Self::Unfixable => "FIX",
            Self::Grammar => "GRM",
        }
    }

    /// Get a short description of the error category
    pub fn category_description(&self) -> &'static str {
        match self {
            Self::Lexing => "lexing error",
            Self::Parsing => "parsing error",
            Self::Templating => "templating error",
            Self::RuleInternal => "rule error",
            Self::Config => "configuration error",
            Self::Unfixable => "fix error",
            Self::Grammar => "grammar error",
        }
    }

    /// Get the default message template for this error code
    pub fn default_message(&self) -> &'static str {
        match self {
            Self::Lexing => "unable to lex characters",
            Self::Parsing => "found unparsable section",
            Self::Templating => "unable to map template slice",
            Self::RuleInternal => "unexpected exception in rule",
            Self::Config => "invalid configuration value",
            Self::Unfixable => "fixes did not converge",
            Self::Grammar => "malformed grammar table",
        }
    }

    /// Check if this code is reported alongside lint violations for a file
    pub fn is_file_violation(&self) -> bool {
        matches!(self, Self::Lexing | Self::Parsing | Self::Templating | Self::RuleInternal)
    }

    /// Check if this is a recoverable error (linting can continue)
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Grammar | Self::Config)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_as_str() {
        assert_eq!(ErrorCode::Lexing.as_str(), "LXR");
        assert_eq!(ErrorCode::Parsing.as_str(), "PRS");
    }

    #[test]
    fn test_error_code_display() {
        assert_eq!(format!("{}", ErrorCode::Templating), "TMP");
    }

    #[test]
    fn test_error_code_category() {
        assert_eq!(ErrorCode::Parsing.category_description(), "parsing error");
        assert_eq!(ErrorCode::Config.category_description(), "configuration error");
    }

    #[test]
    fn test_file_violation_codes() {
        assert!(ErrorCode::Lexing.is_file_violation());
        assert!(ErrorCode::RuleInternal.is_file_violation());
        assert!(!ErrorCode::Unfixable.is_file_violation());
    }

    #[test]
    fn test_is_recoverable() {
        assert!(ErrorCode::Parsing.is_recoverable());
        assert!(!ErrorCode::Grammar.is_recoverable());
    }
}
