//! Scanning routines shared by the grammar matchers
//!
//! All positions are absolute indices into the slice being parsed. A caller
//! limits how far a child may look by passing a shorter slice; nothing here
//! reads past `segments.len()`.

use smol_str::SmolStr;

use super::context::ParseContext;
use super::match_result::{MatchResult, Matched};
use super::matchers::match_grammar;
use crate::base::GrammarId;
use crate::dialect::{BracketPair, GrammarTables};
use crate::segments::{MetaKind, Segment};

// ============================================================================
// Index helpers
// ============================================================================

/// First index at or after `start_idx` holding code, capped at `max_idx`.
pub fn skip_start_index_forward_to_code(segments: &[Segment], start_idx: usize, max_idx: usize) -> usize {
    let mut idx = start_idx;
    while idx < max_idx && !segments[idx].is_code() {
        idx += 1;
    }
    idx
}

/// Stop index with trailing non-code before `stop_idx` dropped, never below
/// `min_idx`.
pub fn skip_stop_index_backward_to_code(segments: &[Segment], stop_idx: usize, min_idx: usize) -> usize {
    let mut idx = stop_idx;
    while idx > min_idx && !segments[idx - 1].is_code() {
        idx -= 1;
    }
    idx
}

/// Upper-cased raw and class types of the first segment from `start_idx`
/// that is not whitespace or a meta.
fn first_non_whitespace(segments: &[Segment], start_idx: usize) -> Option<(String, &[SmolStr])> {
    segments
        .get(start_idx..)?
        .iter()
        .find(|s| !s.raw().trim().is_empty())
        .map(|s| (s.raw_upper(), s.class_types()))
}

/// First word of a segment's upper-cased raw.
fn first_trimmed_raw(seg: &Segment) -> String {
    seg.raw_upper().split_whitespace().next().unwrap_or_default().to_string()
}

// ============================================================================
// Option pruning and longest match
// ============================================================================

/// Options whose first-set hint admits the next non-whitespace token.
pub fn prune_options(options: &[GrammarId], segments: &[Segment], start_idx: usize, tables: &GrammarTables) -> Vec<GrammarId> {
    let Some((raw_upper, types)) = first_non_whitespace(segments, start_idx) else {
        return options.to_vec();
    };
    options
        .iter()
        .copied()
        .filter(|opt| tables.hint_accepts(*opt, &raw_upper, types))
        .collect()
}

/// Try each option at `idx` and keep the longest match.
///
/// Returns as soon as an option consumes everything available, or once the
/// best match so far is followed by one of the active terminators.
pub fn longest_match(
    segments: &[Segment],
    matchers: &[GrammarId],
    idx: usize,
    ctx: &mut ParseContext<'_>,
) -> (MatchResult, Option<GrammarId>) {
    let max_idx = segments.len();
    if idx >= max_idx {
        return (MatchResult::empty_at(idx), None);
    }
    let available = prune_options(matchers, segments, idx, ctx.tables());
    if available.is_empty() {
        return (MatchResult::empty_at(idx), None);
    }
    let terminators = ctx.terminators().to_vec();

    let mut best = MatchResult::empty_at(idx);
    let mut best_matcher = None;
    for (opt_idx, matcher) in available.iter().enumerate() {
        let result = ctx.deeper_match(false, &[], |ctx| match_grammar(segments, idx, *matcher, ctx));
        if result.is_match() && result.stop() == max_idx {
            return (result, Some(*matcher));
        }
        if !result.is_better_than(&best) {
            continue;
        }
        best = result;
        best_matcher = Some(*matcher);
        if opt_idx == available.len() - 1 {
            break;
        }
        if terminators.is_empty() {
            continue;
        }
        let next_code = skip_start_index_forward_to_code(segments, best.stop(), max_idx);
        if next_code == max_idx {
            break;
        }
        let terminated = terminators
            .iter()
            .any(|t| match_grammar(segments, next_code, *t, ctx).is_match());
        if terminated {
            break;
        }
    }
    (best, best_matcher)
}

// ============================================================================
// Forward scanning
// ============================================================================

/// Scan forward from `idx` for the first position where any matcher matches.
///
/// Matchers are only tried where their hint admits the token; matchers with
/// no hint are tried at every code segment. Returns the match and the index
/// of the matcher that produced it.
pub fn next_match(
    segments: &[Segment],
    idx: usize,
    matchers: &[GrammarId],
    ctx: &mut ParseContext<'_>,
) -> (MatchResult, Option<usize>) {
    if idx >= segments.len() {
        return (MatchResult::empty_at(idx), None);
    }
    let tables = ctx.tables();
    let hints: Vec<_> = matchers.iter().map(|m| tables.simple_hint(*m)).collect();
    for pos in idx..segments.len() {
        let seg = &segments[pos];
        if seg.is_meta() {
            continue;
        }
        let raw = first_trimmed_raw(seg);
        for (matcher_idx, hint) in hints.iter().enumerate() {
            let candidate = match hint {
                Some((raws, types)) => raws.iter().any(|r| *r == raw) || types.iter().any(|t| seg.is_type(t)),
                None => seg.is_code(),
            };
            if !candidate {
                continue;
            }
            let m = match_grammar(segments, pos, matchers[matcher_idx], ctx);
            if m.is_match() {
                return (m, Some(matcher_idx));
            }
        }
    }
    (MatchResult::empty_at(idx), None)
}

/// Find the closing bracket for `opening`, an already matched opener of
/// bracket pair `type_idx`.
///
/// Nested pairs are resolved recursively. Returns `None` for an unclosed or
/// mismatched bracket.
pub fn resolve_bracket(
    segments: &[Segment],
    opening: MatchResult,
    type_idx: usize,
    pairs: &[BracketPair],
    ctx: &mut ParseContext<'_>,
    nested_match: bool,
) -> Option<MatchResult> {
    let n = pairs.len();
    let matchers: Vec<GrammarId> = pairs.iter().map(|p| p.start).chain(pairs.iter().map(|p| p.end)).collect();
    let start = opening.start();
    let indent_at = opening.stop();
    let mut matched_idx = opening.stop();
    let mut child_matches = vec![opening];
    loop {
        let (m, which) = next_match(segments, matched_idx, &matchers, ctx);
        let which = which?;
        if which >= n {
            if which - n != type_idx {
                tracing::debug!(
                    expected = %pairs[type_idx].bracket_type,
                    found = %pairs[which - n].bracket_type,
                    "mismatched closing bracket"
                );
                return None;
            }
            let result = MatchResult {
                matched_slice: start..m.stop(),
                matched_class: None,
                insert_segments: vec![(indent_at, MetaKind::Indent), (m.start(), MetaKind::Dedent)],
                child_matches: {
                    child_matches.push(m);
                    child_matches
                },
            };
            return Some(if pairs[type_idx].persists {
                result.wrap(Matched::Bracketed)
            } else {
                result
            });
        }
        let inner = resolve_bracket(segments, m, which, pairs, ctx, nested_match)?;
        matched_idx = inner.stop();
        if nested_match {
            child_matches.push(inner);
        }
    }
}

/// Like [`next_match`], but steps over whole bracketed sections so a match
/// inside brackets is never returned.
///
/// Also returns the bracket matches skipped on the way.
pub fn next_ex_bracket_match(
    segments: &[Segment],
    idx: usize,
    matchers: &[GrammarId],
    ctx: &mut ParseContext<'_>,
) -> (MatchResult, Option<usize>, Vec<MatchResult>) {
    if idx >= segments.len() {
        return (MatchResult::empty_at(idx), None, Vec::new());
    }
    let pairs = ctx.dialect().bracket_pairs();
    let n = matchers.len();
    let n_pairs = pairs.len();
    let mut all = matchers.to_vec();
    all.extend(pairs.iter().map(|p| p.start));
    all.extend(pairs.iter().map(|p| p.end));

    let mut matched_idx = idx;
    let mut child_matches = Vec::new();
    loop {
        let (m, which) = next_match(segments, matched_idx, &all, ctx);
        let Some(which) = which else {
            return (m, None, child_matches);
        };
        if which < n {
            return (m, Some(which), child_matches);
        }
        if which >= n + n_pairs {
            // Closing bracket before any target.
            return (MatchResult::empty_at(idx), None, Vec::new());
        }
        match resolve_bracket(segments, m, which - n, pairs, ctx, true) {
            Some(bracket) => {
                matched_idx = bracket.stop();
                child_matches.push(bracket);
            }
            None => return (MatchResult::empty_at(idx), None, Vec::new()),
        }
    }
}

/// Claim everything from `idx` up to the first terminator outside brackets.
///
/// Terminators made only of words must be preceded by whitespace, so that
/// `a.from` does not end a clause on `from`.
pub fn greedy_match(
    segments: &[Segment],
    idx: usize,
    matchers: &[GrammarId],
    ctx: &mut ParseContext<'_>,
    include_terminator: bool,
    nested_match: bool,
) -> MatchResult {
    let max_idx = segments.len();
    let tables = ctx.tables();
    let mut working_idx = idx;
    let mut child_matches = Vec::new();
    let terminator = loop {
        let (m, which, inner) = ctx.deeper_match(false, &[], |ctx| next_ex_bracket_match(segments, working_idx, matchers, ctx));
        if nested_match {
            child_matches.extend(inner);
        }
        let Some(which) = which else {
            return MatchResult {
                matched_slice: idx..max_idx,
                child_matches,
                ..MatchResult::default()
            };
        };
        let keyword_like = tables.simple_hint(matchers[which]).is_some_and(|(raws, types)| {
            types.is_empty() && raws.iter().all(|r| r.chars().all(char::is_alphabetic))
        });
        if keyword_like && !preceded_by_whitespace(segments, m.start(), working_idx) {
            working_idx = m.stop();
            continue;
        }
        break m;
    };

    if include_terminator {
        return MatchResult {
            matched_slice: idx..terminator.stop(),
            child_matches,
            ..MatchResult::default()
        };
    }
    let stop = skip_stop_index_backward_to_code(segments, terminator.start(), idx);
    let stop = if stop == idx { terminator.start() } else { stop };
    // Bracket children past the cut point would overrun the slice.
    child_matches.retain(|c| c.stop() <= stop);
    MatchResult {
        matched_slice: idx..stop,
        child_matches,
        ..MatchResult::default()
    }
}

fn preceded_by_whitespace(segments: &[Segment], start_idx: usize, working_idx: usize) -> bool {
    if start_idx == working_idx {
        return true;
    }
    for i in (working_idx + 1..=start_idx).rev() {
        let prev = &segments[i - 1];
        if prev.is_meta() {
            continue;
        }
        return prev.is_type("whitespace") || prev.is_type("newline");
    }
    false
}

/// Index to stop at so that a greedy grammar starting at `idx` does not run
/// into a terminator. Returns `idx` itself when a terminator starts there.
pub fn trim_to_terminator(segments: &[Segment], idx: usize, terminators: &[GrammarId], ctx: &mut ParseContext<'_>) -> usize {
    if idx >= segments.len() {
        return segments.len();
    }
    if terminators.is_empty() {
        return segments.len();
    }
    let tables = ctx.tables();
    let immediate = ctx.deeper_match(false, &[], |ctx| {
        prune_options(terminators, segments, idx, tables)
            .into_iter()
            .any(|t| match_grammar(segments, idx, t, ctx).is_match())
    });
    if immediate {
        return idx;
    }
    let (m, which, _) = ctx.deeper_match(false, &[], |ctx| next_ex_bracket_match(segments, idx, terminators, ctx));
    if which.is_some() {
        return skip_stop_index_backward_to_code(segments, m.start(), idx);
    }
    segments.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::dialect_selector;
    use crate::lexer::Lexer;
    use rustc_hash::FxHashMap;

    fn lex(sql: &str) -> Vec<Segment> {
        let dialect = dialect_selector("ansi").unwrap();
        let mut segs = Lexer::new(dialect).lex_str(sql).segments;
        segs.retain(|s| !s.is_type("end_of_file"));
        segs
    }

    fn ctx() -> ParseContext<'static> {
        ParseContext::new(dialect_selector("ansi").unwrap(), FxHashMap::default())
    }

    fn g(name: &str) -> GrammarId {
        dialect_selector("ansi").unwrap().grammar(name).unwrap()
    }

    #[test]
    fn test_skip_helpers() {
        let segs = lex("a  b ");
        assert_eq!(skip_start_index_forward_to_code(&segs, 1, segs.len()), 2);
        assert_eq!(skip_stop_index_backward_to_code(&segs, segs.len(), 0), 3);
        assert_eq!(skip_stop_index_backward_to_code(&segs, 2, 1), 1);
    }

    #[test]
    fn test_prune_options_by_first_token() {
        let segs = lex("SELECT 1");
        let ctx = ctx();
        let opts = [g("InsertStatementSegment"), g("SelectStatementSegment")];
        assert_eq!(prune_options(&opts, &segs, 0, ctx.tables()), vec![g("SelectStatementSegment")]);
    }

    #[test]
    fn test_next_ex_bracket_match_skips_brackets() {
        let segs = lex("(a, b), c");
        let mut ctx = ctx();
        let (m, which, skipped) = next_ex_bracket_match(&segs, 0, &[g("CommaSegment")], &mut ctx);
        assert_eq!(which, Some(0));
        // The comma after the closing bracket, not the one inside.
        assert_eq!(segs[m.start()].raw(), ",");
        assert_eq!(m.start(), 6);
        assert_eq!(skipped.len(), 1);
    }

    #[test]
    fn test_unclosed_bracket_has_no_match() {
        let segs = lex("(a, b");
        let mut ctx = ctx();
        let (m, which, _) = next_ex_bracket_match(&segs, 0, &[g("CommaSegment")], &mut ctx);
        assert_eq!(which, None);
        assert!(!m.is_match());
    }

    #[test]
    fn test_greedy_match_requires_space_before_keyword() {
        let segs = lex("a.from FROM t");
        let mut ctx = ctx();
        let m = greedy_match(&segs, 0, &[g("SelectClauseTerminatorGrammar")], &mut ctx, false, false);
        assert_eq!(m.matched_slice, 0..3);
    }

    #[test]
    fn test_trim_to_terminator() {
        let segs = lex("a, b ; c");
        let mut ctx = ctx();
        let stop = trim_to_terminator(&segs, 0, &[g("SemicolonSegment")], &mut ctx);
        assert_eq!(segs[stop - 1].raw(), "b");
        assert_eq!(trim_to_terminator(&segs, 5, &[g("SemicolonSegment")], &mut ctx), 5);
    }
}
