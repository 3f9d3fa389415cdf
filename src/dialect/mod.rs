//! Dialects: lexer matchers plus compiled grammar tables
//!
//! ```text
//! grammar.rs   combinator DSL (seq, one_of, delimited, ...)
//!     ↓
//! compile.rs   names → GrammarId, first-set hints
//!     ↓
//! tables.rs    flat GrammarTables (20-byte GrammarInst + side tables)
//!     ↓
//! validate.rs  integrity check, run on every load
//! ```
//!
//! Dialects are built once and live for the whole process. Built-in dialects
//! are compiled lazily on first use; embedders can add their own with
//! [`register_dialect`].

pub mod ansi;
mod compile;
pub mod grammar;
mod lexing;
mod tables;
mod validate;

pub use compile::GrammarBuilder;
pub use grammar::Grammar;
pub use lexing::{LexMatcher, LexPattern};
pub use tables::{
    BracketPair, Casefold, GrammarFlags, GrammarInst, GrammarTables, GrammarVariant, NONE, ParseMode, SimpleHint,
};
pub use validate::validate;

pub use crate::base::GrammarId;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use rustc_hash::FxHashSet;
use smol_str::SmolStr;

use crate::errors::{ConfigError, GrammarError, LintError};

/// A SQL dialect.
#[derive(Debug)]
pub struct Dialect {
    name: SmolStr,
    tables: GrammarTables,
    lexer_matchers: Vec<LexMatcher>,
    reserved_keywords: FxHashSet<SmolStr>,
    unreserved_keywords: FxHashSet<SmolStr>,
}

impl Dialect {
    pub fn new(
        name: &str,
        tables: GrammarTables,
        lexer_matchers: Vec<LexMatcher>,
        reserved_keywords: impl IntoIterator<Item = SmolStr>,
        unreserved_keywords: impl IntoIterator<Item = SmolStr>,
    ) -> Self {
        Self {
            name: SmolStr::new(name),
            tables,
            lexer_matchers,
            reserved_keywords: reserved_keywords.into_iter().collect(),
            unreserved_keywords: unreserved_keywords.into_iter().collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tables(&self) -> &GrammarTables {
        &self.tables
    }

    pub fn lexer_matchers(&self) -> &[LexMatcher] {
        &self.lexer_matchers
    }

    /// Grammar the file is parsed with.
    pub fn root(&self) -> GrammarId {
        self.tables.root()
    }

    /// Grammar id of a named grammar or segment.
    pub fn grammar(&self, name: &str) -> Option<GrammarId> {
        self.tables.lookup(name)
    }

    pub fn is_reserved(&self, word: &str) -> bool {
        self.reserved_keywords.contains(word.to_uppercase().as_str())
    }

    pub fn is_keyword(&self, word: &str) -> bool {
        let upper = word.to_uppercase();
        self.reserved_keywords.contains(upper.as_str()) || self.unreserved_keywords.contains(upper.as_str())
    }

    pub fn bracket_pairs(&self) -> &[BracketPair] {
        &self.tables.bracket_pairs
    }
}

// =============================================================================
// Registry
// =============================================================================

type DialectLoader = fn() -> &'static Result<Dialect, GrammarError>;

fn load_ansi() -> &'static Result<Dialect, GrammarError> {
    static ANSI: Lazy<Result<Dialect, GrammarError>> = Lazy::new(ansi::build);
    &ANSI
}

const BUILTIN: &[(&str, DialectLoader)] = &[("ansi", load_ansi)];

static REGISTERED: Lazy<RwLock<Vec<&'static Dialect>>> = Lazy::new(|| RwLock::new(Vec::new()));

/// Add a dialect at runtime. A later registration shadows an earlier one of
/// the same name.
pub fn register_dialect(dialect: Dialect) -> &'static Dialect {
    let dialect: &'static Dialect = Box::leak(Box::new(dialect));
    tracing::debug!(dialect = dialect.name(), "registered dialect");
    REGISTERED.write().push(dialect);
    dialect
}

/// Load a dialect by name, surfacing grammar build failures.
pub fn load_dialect(name: &str) -> Result<&'static Dialect, LintError> {
    if let Some(d) = REGISTERED.read().iter().rev().find(|d| d.name() == name) {
        return Ok(*d);
    }
    let loader = BUILTIN
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, l)| *l)
        .ok_or_else(|| ConfigError::UnknownDialect(name.to_string()))?;
    loader().as_ref().map_err(|e| LintError::Grammar(e.clone()))
}

/// Look up a dialect by name.
pub fn dialect_selector(name: &str) -> Option<&'static Dialect> {
    load_dialect(name).ok()
}

/// Names of all available dialects.
pub fn dialect_readout() -> Vec<String> {
    let mut names: Vec<String> = BUILTIN.iter().map(|(n, _)| n.to_string()).collect();
    for d in REGISTERED.read().iter() {
        if !names.iter().any(|n| n == d.name()) {
            names.push(d.name().to_string());
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::grammar::*;

    #[test]
    fn test_ansi_is_available() {
        let ansi = dialect_selector("ansi").unwrap();
        assert_eq!(ansi.name(), "ansi");
        assert!(ansi.grammar("SelectStatementSegment").is_some());
        assert!(ansi.is_reserved("select"));
        assert!(dialect_readout().contains(&"ansi".to_string()));
    }

    #[test]
    fn test_unknown_dialect() {
        assert!(dialect_selector("klingon").is_none());
        assert!(matches!(
            load_dialect("klingon"),
            Err(LintError::Config(ConfigError::UnknownDialect(_)))
        ));
    }

    #[test]
    fn test_register_dialect() {
        let mut b = GrammarBuilder::new("FileSegment");
        b.add("FileSegment", kw("PING"));
        let tables = b.compile().unwrap();
        register_dialect(Dialect::new("ping_test", tables, Vec::new(), [], []));
        assert_eq!(dialect_selector("ping_test").unwrap().name(), "ping_test");
        assert!(dialect_readout().contains(&"ping_test".to_string()));
    }
}
