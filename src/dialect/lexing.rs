//! Lexer matcher definitions
//!
//! A dialect lists its matchers in priority order. The lexer tries all of
//! them at each position and keeps the longest match, earlier matchers
//! winning ties.

use regex::Regex;
use smol_str::SmolStr;

use crate::errors::GrammarError;
use crate::segments::TokenFlags;

#[derive(Debug, Clone)]
pub enum LexPattern {
    Literal(SmolStr),
    Regex {
        /// Matches only at the start of the input
        anchored: Regex,
        /// Matches anywhere, used when subdividing
        search: Regex,
    },
}

/// One lexer rule.
#[derive(Debug, Clone)]
pub struct LexMatcher {
    pub name: SmolStr,
    pub pattern: LexPattern,
    pub seg_type: SmolStr,
    pub flags: TokenFlags,
    /// Splits a match into finer tokens, e.g. newlines inside block comments
    pub subdivider: Option<Box<LexMatcher>>,
    /// Peels leading/trailing whitespace off each subdivided piece
    pub trim_post_subdivide: Option<Box<LexMatcher>>,
}

impl LexMatcher {
    pub fn literal(name: &str, literal: &str, seg_type: &str, flags: TokenFlags) -> Self {
        Self {
            name: SmolStr::new(name),
            pattern: LexPattern::Literal(SmolStr::new(literal)),
            seg_type: SmolStr::new(seg_type),
            flags,
            subdivider: None,
            trim_post_subdivide: None,
        }
    }

    pub fn regex(name: &str, pattern: &str, seg_type: &str, flags: TokenFlags) -> Result<Self, GrammarError> {
        let compile = |p: String| {
            Regex::new(&p).map_err(|e| GrammarError::Regex {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })
        };
        Ok(Self {
            name: SmolStr::new(name),
            pattern: LexPattern::Regex {
                anchored: compile(format!("^(?:{pattern})"))?,
                search: compile(pattern.to_string())?,
            },
            seg_type: SmolStr::new(seg_type),
            flags,
            subdivider: None,
            trim_post_subdivide: None,
        })
    }

    pub fn with_subdivider(mut self, subdivider: LexMatcher) -> Self {
        self.subdivider = Some(Box::new(subdivider));
        self
    }

    pub fn with_trim_post_subdivide(mut self, trim: LexMatcher) -> Self {
        self.trim_post_subdivide = Some(Box::new(trim));
        self
    }

    /// Length of a non-empty match at the very start of `text`.
    pub fn match_len(&self, text: &str) -> Option<usize> {
        let len = match &self.pattern {
            LexPattern::Literal(lit) => text.starts_with(lit.as_str()).then_some(lit.len())?,
            LexPattern::Regex { anchored, .. } => anchored.find(text)?.end(),
        };
        (len > 0).then_some(len)
    }

    /// First non-empty match anywhere in `text`, as `(start, end)`.
    pub fn search(&self, text: &str) -> Option<(usize, usize)> {
        match &self.pattern {
            LexPattern::Literal(lit) if !lit.is_empty() => {
                text.find(lit.as_str()).map(|start| (start, start + lit.len()))
            }
            LexPattern::Literal(_) => None,
            LexPattern::Regex { search, .. } => search
                .find_iter(text)
                .find(|m| !m.is_empty())
                .map(|m| (m.start(), m.end())),
        }
    }
}
