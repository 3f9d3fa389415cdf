//! Mutable state threaded through one parse

use std::hash::{Hash, Hasher};

use rustc_hash::{FxHashMap, FxHasher};
use smol_str::SmolStr;

use super::match_result::MatchResult;
use crate::base::{GrammarId, PositionMarker};
use crate::dialect::{Dialect, GrammarTables};

/// Default limit on grammar nesting before a branch is abandoned.
///
/// Counted per nested grammar match, which is several levels for each pair
/// of brackets in the SQL.
pub const DEFAULT_MAX_DEPTH: usize = 4096;

/// A non-fatal note recorded while parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseAnnotation {
    pub message: String,
    pub position: Option<PositionMarker>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CacheKey {
    idx: usize,
    max_idx: usize,
    grammar: GrammarId,
    terminators: u64,
}

/// Parse state: the active terminator stack, grammar config, a depth guard
/// and a memo of previous matches.
pub struct ParseContext<'d> {
    dialect: &'d Dialect,
    terminators: Vec<GrammarId>,
    indent_config: FxHashMap<SmolStr, SmolStr>,
    depth: usize,
    max_depth: usize,
    depth_exceeded: bool,
    cache: FxHashMap<CacheKey, MatchResult>,
    cache_hits: usize,
    annotations: Vec<ParseAnnotation>,
}

impl<'d> ParseContext<'d> {
    pub fn new(dialect: &'d Dialect, indent_config: FxHashMap<SmolStr, SmolStr>) -> Self {
        Self {
            dialect,
            terminators: Vec::new(),
            indent_config,
            depth: 0,
            max_depth: DEFAULT_MAX_DEPTH,
            depth_exceeded: false,
            cache: FxHashMap::default(),
            cache_hits: 0,
            annotations: Vec::new(),
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn dialect(&self) -> &'d Dialect {
        self.dialect
    }

    pub fn tables(&self) -> &'d GrammarTables {
        self.dialect.tables()
    }

    pub fn terminators(&self) -> &[GrammarId] {
        &self.terminators
    }

    /// Value of a grammar config flag such as `indented_joins`.
    pub fn indent_config(&self, key: &str) -> Option<&str> {
        self.indent_config.get(key).map(SmolStr::as_str)
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// False once nesting is past the limit. Warns the first time.
    pub(crate) fn check_depth(&mut self) -> bool {
        if self.depth <= self.max_depth {
            return true;
        }
        if !self.depth_exceeded {
            self.depth_exceeded = true;
            tracing::warn!(max_depth = self.max_depth, "parse depth limit reached, abandoning branch");
        }
        false
    }

    /// Run `f` one level deeper with an adjusted terminator stack.
    ///
    /// With `clear` the outer terminators are hidden from `f`. Either way the
    /// stack is restored afterwards.
    pub fn deeper_match<R>(&mut self, clear: bool, push: &[GrammarId], f: impl FnOnce(&mut Self) -> R) -> R {
        let saved = clear.then(|| std::mem::take(&mut self.terminators));
        let len = self.terminators.len();
        for t in push {
            if !self.terminators.contains(t) {
                self.terminators.push(*t);
            }
        }
        self.depth += 1;
        let out = f(self);
        self.depth -= 1;
        match saved {
            Some(prev) => self.terminators = prev,
            None => self.terminators.truncate(len),
        }
        out
    }

    fn cache_key(&self, idx: usize, max_idx: usize, grammar: GrammarId) -> CacheKey {
        let mut hasher = FxHasher::default();
        self.terminators.hash(&mut hasher);
        CacheKey {
            idx,
            max_idx,
            grammar,
            terminators: hasher.finish(),
        }
    }

    pub(crate) fn check_cache(&mut self, idx: usize, max_idx: usize, grammar: GrammarId) -> Option<MatchResult> {
        let key = self.cache_key(idx, max_idx, grammar);
        let hit = self.cache.get(&key).cloned();
        if hit.is_some() {
            self.cache_hits += 1;
        }
        hit
    }

    pub(crate) fn put_cache(&mut self, idx: usize, max_idx: usize, grammar: GrammarId, result: &MatchResult) {
        let key = self.cache_key(idx, max_idx, grammar);
        self.cache.insert(key, result.clone());
    }

    pub fn cache_hits(&self) -> usize {
        self.cache_hits
    }

    pub fn annotate(&mut self, message: impl Into<String>, position: Option<PositionMarker>) {
        let message = message.into();
        tracing::debug!(%message, "parse annotation");
        self.annotations.push(ParseAnnotation { message, position });
    }

    pub fn take_annotations(&mut self) -> Vec<ParseAnnotation> {
        std::mem::take(&mut self.annotations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::dialect_selector;

    fn ctx() -> ParseContext<'static> {
        ParseContext::new(dialect_selector("ansi").unwrap(), FxHashMap::default())
    }

    #[test]
    fn test_deeper_match_restores_terminators() {
        let mut ctx = ctx();
        ctx.deeper_match(false, &[GrammarId(1)], |ctx| {
            assert_eq!(ctx.terminators(), &[GrammarId(1)]);
            ctx.deeper_match(false, &[GrammarId(2), GrammarId(1)], |ctx| {
                assert_eq!(ctx.terminators(), &[GrammarId(1), GrammarId(2)]);
                assert_eq!(ctx.depth(), 2);
            });
            ctx.deeper_match(true, &[GrammarId(3)], |ctx| {
                assert_eq!(ctx.terminators(), &[GrammarId(3)]);
            });
            assert_eq!(ctx.terminators(), &[GrammarId(1)]);
        });
        assert!(ctx.terminators().is_empty());
        assert_eq!(ctx.depth(), 0);
    }

    #[test]
    fn test_cache_is_keyed_on_terminators() {
        let mut ctx = ctx();
        let m = MatchResult::from_slice(0..2);
        ctx.put_cache(0, 5, GrammarId(7), &m);
        assert_eq!(ctx.check_cache(0, 5, GrammarId(7)), Some(m));
        assert_eq!(ctx.check_cache(0, 4, GrammarId(7)), None);
        let under_terminator = ctx.deeper_match(false, &[GrammarId(1)], |ctx| ctx.check_cache(0, 5, GrammarId(7)));
        assert_eq!(under_terminator, None);
        assert_eq!(ctx.cache_hits(), 1);
    }

    #[test]
    fn test_depth_guard() {
        let mut ctx = ctx().with_max_depth(1);
        assert!(ctx.check_depth());
        let tripped = ctx.deeper_match(false, &[], |ctx| ctx.deeper_match(false, &[], |ctx| ctx.check_depth()));
        assert!(!tripped);
    }
}
