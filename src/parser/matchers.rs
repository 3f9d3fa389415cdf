//! Per-variant grammar matching
//!
//! [`match_grammar`] is the single entry point: it dispatches on the
//! instruction's variant and wraps the result in a node when the instruction
//! defines a segment.

use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use super::context::ParseContext;
use super::match_algorithms::{
    greedy_match, longest_match, resolve_bracket, skip_start_index_forward_to_code, skip_stop_index_backward_to_code,
    trim_to_terminator,
};
use super::match_result::{MatchResult, Matched};
use crate::base::GrammarId;
use crate::dialect::{BracketPair, GrammarFlags, GrammarTables, GrammarVariant, ParseMode};
use crate::segments::{MetaKind, Segment};

/// Match grammar `id` against `segments` starting at `idx`.
pub fn match_grammar(segments: &[Segment], idx: usize, id: GrammarId, ctx: &mut ParseContext<'_>) -> MatchResult {
    if !ctx.check_depth() {
        return MatchResult::empty_at(idx);
    }
    let tables = ctx.tables();
    let result = match tables.inst(id).variant {
        GrammarVariant::Ref => match_ref(segments, idx, id, ctx),
        GrammarVariant::Sequence => {
            let spec = SequenceSpec::of(tables, id);
            match_sequence(segments, idx, &spec, ctx)
        }
        GrammarVariant::OneOf | GrammarVariant::AnyNumberOf => match_any_number_of(segments, idx, id, ctx),
        GrammarVariant::Delimited => match_delimited(segments, idx, id, ctx),
        GrammarVariant::Bracketed => match_bracketed(segments, idx, id, ctx),
        GrammarVariant::StringParser => match_string(segments, idx, id, tables),
        GrammarVariant::MultiStringParser => match_multi_string(segments, idx, id, tables),
        GrammarVariant::TypedParser => match_typed(segments, idx, id, tables),
        GrammarVariant::RegexParser => match_regex(segments, idx, id, tables),
        GrammarVariant::Token => match segments.get(idx) {
            Some(seg) if seg.is_code() => MatchResult::from_slice(idx..idx + 1),
            _ => MatchResult::empty_at(idx),
        },
        GrammarVariant::Anything => match_anything(segments, idx, id, ctx),
        GrammarVariant::Meta => match meta_if_enabled(id, ctx) {
            Some(kind) => MatchResult {
                matched_slice: idx..idx,
                insert_segments: vec![(idx, kind)],
                ..MatchResult::default()
            },
            None => MatchResult::empty_at(idx),
        },
        GrammarVariant::Nothing | GrammarVariant::Missing => MatchResult::empty_at(idx),
    };
    match tables.segment_type(id) {
        Some(seg_type) => result.wrap(Matched::Node {
            seg_type: SmolStr::new(seg_type),
            grammar: id,
        }),
        None => result,
    }
}

/// Follow `Ref` instructions to the grammar they name.
pub(crate) fn resolve_ref(tables: &GrammarTables, mut id: GrammarId) -> GrammarId {
    // Bounded: a cycle of pure references cannot be built, but stay safe.
    for _ in 0..tables.len() {
        if tables.inst(id).variant != GrammarVariant::Ref {
            break;
        }
        match tables.ref_target(id) {
            Some(target) => id = target,
            None => break,
        }
    }
    id
}

fn terminators_of(tables: &GrammarTables, id: GrammarId) -> (Vec<GrammarId>, bool) {
    (
        tables.terminators(id).collect(),
        tables.inst(id).flags.contains(GrammarFlags::RESET_TERMINATORS),
    )
}

/// A grammar's own terminators followed by the inherited ones.
fn combined_terminators(own: &[GrammarId], reset: bool, ctx: &ParseContext<'_>) -> Vec<GrammarId> {
    let mut terms = own.to_vec();
    if !reset {
        terms.extend(ctx.terminators().iter().copied().filter(|t| !own.contains(t)));
    }
    terms
}

fn describe_segment(seg: &Segment) -> String {
    format!("{seg:?}")
}

// ============================================================================
// Ref
// ============================================================================

fn match_ref(segments: &[Segment], idx: usize, id: GrammarId, ctx: &mut ParseContext<'_>) -> MatchResult {
    let tables = ctx.tables();
    let Some(target) = tables.ref_target(id) else {
        return MatchResult::empty_at(idx);
    };
    let (own, reset) = terminators_of(tables, id);
    if let Some(exclude) = tables.exclude(id) {
        let excluded = ctx.deeper_match(reset, &own, |ctx| match_grammar(segments, idx, exclude, ctx));
        if excluded.is_match() {
            return MatchResult::empty_at(idx);
        }
    }
    ctx.deeper_match(reset, &own, |ctx| {
        let max_idx = segments.len();
        if let Some(hit) = ctx.check_cache(idx, max_idx, target) {
            return hit;
        }
        let result = match_grammar(segments, idx, target, ctx);
        ctx.put_cache(idx, max_idx, target, &result);
        result
    })
}

// ============================================================================
// Sequence
// ============================================================================

/// Everything a sequence match needs; shared by `Sequence` and the content
/// of `Bracketed`.
pub(crate) struct SequenceSpec {
    elements: Vec<GrammarId>,
    parse_mode: ParseMode,
    allow_gaps: bool,
    terminators: Vec<GrammarId>,
    reset: bool,
}

impl SequenceSpec {
    fn of(tables: &GrammarTables, id: GrammarId) -> Self {
        let inst = tables.inst(id);
        let (terminators, reset) = terminators_of(tables, id);
        Self {
            elements: tables.children(id).collect(),
            parse_mode: inst.parse_mode,
            allow_gaps: inst.allow_gaps(),
            terminators,
            reset,
        }
    }
}

fn meta_if_enabled(id: GrammarId, ctx: &ParseContext<'_>) -> Option<MetaKind> {
    let tables = ctx.tables();
    let kind = tables.meta_kind(id)?;
    match tables.condition(id) {
        Some((key, value)) => (ctx.indent_config(key) == Some(value)).then_some(kind),
        None => Some(kind),
    }
}

fn match_sequence(segments: &[Segment], idx: usize, spec: &SequenceSpec, ctx: &mut ParseContext<'_>) -> MatchResult {
    let tables = ctx.tables();
    let start_idx = idx;
    let mut matched_idx = idx;
    let mut max_idx = segments.len();
    let mut insert_segments: Vec<(usize, MetaKind)> = Vec::new();
    let mut child_matches: Vec<MatchResult> = Vec::new();
    let mut first_match = true;
    // Metas wait here until we know which side of the whitespace they go.
    let mut meta_buffer: Vec<MetaKind> = Vec::new();

    if spec.parse_mode == ParseMode::Greedy {
        let terms = combined_terminators(&spec.terminators, spec.reset, ctx);
        max_idx = trim_to_terminator(segments, idx, &terms, ctx);
    }

    for &elem in &spec.elements {
        let elem_inst = *tables.inst(elem);
        if elem_inst.variant == GrammarVariant::Meta {
            meta_buffer.extend(meta_if_enabled(elem, ctx));
            continue;
        }

        let elem_idx = if spec.allow_gaps {
            skip_start_index_forward_to_code(segments, matched_idx, max_idx)
        } else {
            matched_idx
        };

        if elem_idx >= max_idx {
            if elem_inst.is_optional() {
                continue;
            }
            if spec.parse_mode == ParseMode::Strict || matched_idx == start_idx {
                return MatchResult::empty_at(idx);
            }
            // Already claimed in a greedy mode: what we have is unparsable.
            insert_segments.extend(meta_buffer.drain(..).map(|k| (matched_idx, k)));
            let expected = format!(
                "{} after {}. Found nothing.",
                tables.describe(elem),
                describe_segment(&segments[matched_idx - 1])
            );
            return MatchResult {
                matched_slice: start_idx..matched_idx,
                matched_class: None,
                insert_segments,
                child_matches,
            }
            .wrap(Matched::Unparsable { expected });
        }

        let elem_match = ctx.deeper_match(spec.reset, &spec.terminators, |ctx| {
            match_grammar(&segments[..max_idx], elem_idx, elem, ctx)
        });

        if !elem_match.is_match() {
            if elem_inst.is_optional() {
                continue;
            }
            if spec.parse_mode == ParseMode::Strict
                || (spec.parse_mode == ParseMode::GreedyOnceStarted && matched_idx == start_idx)
            {
                return MatchResult::empty_at(idx);
            }
            if matched_idx == start_idx {
                return MatchResult::unparsable(
                    start_idx..max_idx,
                    format!(
                        "{} to start sequence. Found {}",
                        tables.describe(elem),
                        describe_segment(&segments[elem_idx])
                    ),
                );
            }
            // `elem_idx` already honours the gap policy and is below `max_idx`.
            child_matches.push(MatchResult::unparsable(
                elem_idx..max_idx,
                format!(
                    "{} after {}. Found {}",
                    tables.describe(elem),
                    describe_segment(&segments[matched_idx - 1]),
                    describe_segment(&segments[elem_idx])
                ),
            ));
            return MatchResult {
                matched_slice: start_idx..max_idx,
                matched_class: None,
                insert_segments,
                child_matches,
            };
        }

        // Indents sit before the gap, dedents after it.
        let meta_idx = if meta_buffer.iter().all(|k| k.indent_val() >= 0) {
            matched_idx
        } else {
            elem_idx
        };
        insert_segments.extend(meta_buffer.drain(..).map(|k| (meta_idx, k)));

        matched_idx = elem_match.stop();

        if first_match && spec.parse_mode == ParseMode::GreedyOnceStarted {
            let terms = combined_terminators(&spec.terminators, spec.reset, ctx);
            max_idx = trim_to_terminator(segments, matched_idx, &terms, ctx);
            first_match = false;
        }

        if elem_match.matched_class.is_some() {
            child_matches.push(elem_match);
        } else {
            child_matches.extend(elem_match.child_matches);
            insert_segments.extend(elem_match.insert_segments);
        }
    }

    insert_segments.extend(meta_buffer.drain(..).map(|k| (matched_idx, k)));

    if spec.parse_mode != ParseMode::Strict && max_idx > matched_idx {
        let leftover_start = skip_start_index_forward_to_code(segments, matched_idx, max_idx);
        let leftover_stop = skip_stop_index_backward_to_code(segments, max_idx, leftover_start);
        if leftover_stop > leftover_start {
            child_matches.push(MatchResult::unparsable(leftover_start..leftover_stop, "Nothing here."));
            matched_idx = leftover_stop;
        }
    }

    MatchResult {
        matched_slice: start_idx..matched_idx,
        matched_class: None,
        insert_segments,
        child_matches,
    }
}

// ============================================================================
// OneOf / AnyNumberOf
// ============================================================================

fn match_any_number_of(segments: &[Segment], idx: usize, id: GrammarId, ctx: &mut ParseContext<'_>) -> MatchResult {
    let tables = ctx.tables();
    let inst = *tables.inst(id);
    let (min_times, max_times, max_per_element) = if inst.variant == GrammarVariant::OneOf {
        (1, Some(1), None)
    } else {
        let (max_times, max_per_element) = tables.repeat_limits(id);
        (inst.min_times as usize, max_times, max_per_element)
    };

    if let Some(exclude) = tables.exclude(id) {
        if ctx.deeper_match(false, &[], |ctx| match_grammar(segments, idx, exclude, ctx)).is_match() {
            return MatchResult::empty_at(idx);
        }
    }

    let options: Vec<GrammarId> = tables.children(id).collect();
    let (own, reset) = terminators_of(tables, id);
    let mut max_idx = segments.len();
    if inst.parse_mode == ParseMode::Greedy {
        let terms = combined_terminators(&own, reset, ctx);
        max_idx = trim_to_terminator(segments, idx, &terms, ctx);
    }

    let mut option_counts: FxHashMap<GrammarId, usize> = FxHashMap::default();
    let mut n_matches = 0;
    let mut matched = MatchResult::empty_at(idx);
    let mut matched_idx = idx;
    let mut working_idx = idx;
    loop {
        if n_matches >= min_times && (max_times.is_some_and(|m| n_matches >= m) || matched_idx >= max_idx) {
            break;
        }
        if matched_idx >= max_idx {
            return MatchResult::empty_at(idx);
        }

        let (m, option) = ctx.deeper_match(reset, &own, |ctx| {
            longest_match(&segments[..max_idx], &options, working_idx, ctx)
        });
        if !m.is_match() || m.is_empty() {
            if n_matches < min_times {
                matched = MatchResult::empty_at(idx);
            }
            break;
        }
        if let (Some(limit), Some(option)) = (max_per_element, option) {
            let count = option_counts.entry(option).or_default();
            *count += 1;
            if *count > limit {
                break;
            }
        }

        matched = matched.append(m);
        matched_idx = matched.stop();
        working_idx = if inst.allow_gaps() {
            skip_start_index_forward_to_code(segments, matched_idx, max_idx)
        } else {
            matched_idx
        };
        n_matches += 1;
    }

    if inst.parse_mode == ParseMode::Greedy && max_idx > matched_idx {
        let leftover_start = skip_start_index_forward_to_code(segments, matched_idx, max_idx);
        let leftover_stop = skip_stop_index_backward_to_code(segments, max_idx, leftover_start);
        if leftover_stop > leftover_start {
            matched = matched.append(MatchResult::unparsable(leftover_start..leftover_stop, "Nothing here."));
        }
    }
    matched
}

// ============================================================================
// Delimited
// ============================================================================

fn match_delimited(segments: &[Segment], idx: usize, id: GrammarId, ctx: &mut ParseContext<'_>) -> MatchResult {
    let tables = ctx.tables();
    let inst = *tables.inst(id);
    let (Some(delimiter), min_delimiters) = tables.delimiter(id) else {
        return MatchResult::empty_at(idx);
    };
    let elements: Vec<GrammarId> = tables.children(id).collect();
    let allow_gaps = inst.allow_gaps();
    let allow_trailing = inst.flags.contains(GrammarFlags::ALLOW_TRAILING);
    let optional_delimiter = inst.flags.contains(GrammarFlags::OPTIONAL_DELIMITER);

    // The delimiter counts as a delimiter here, never as a terminator, even
    // when an outer delimited list of the same kind pushed it.
    let delimiter_target = resolve_ref(tables, delimiter);
    let mut terminators: Vec<GrammarId> = tables.terminators(id).collect();
    terminators.extend(
        ctx.terminators()
            .iter()
            .copied()
            .filter(|t| resolve_ref(tables, *t) != delimiter_target),
    );

    let max_idx = segments.len();
    let mut delimiters = 0;
    let mut seeking_delimiter = false;
    let mut working_idx = idx;
    let mut working_match = MatchResult::empty_at(idx);
    let mut delimiter_match: Option<MatchResult> = None;

    loop {
        if allow_gaps && working_idx > idx {
            working_idx = skip_start_index_forward_to_code(segments, working_idx, max_idx);
        }
        if working_idx >= max_idx {
            break;
        }
        if !allow_gaps && !segments[working_idx].is_code() {
            break;
        }

        let (term, _) = ctx.deeper_match(false, &[], |ctx| longest_match(segments, &terminators, working_idx, ctx));
        if term.is_match() {
            break;
        }

        let (push, matchers): (&[GrammarId], &[GrammarId]) = if seeking_delimiter {
            (&[], std::slice::from_ref(&delimiter))
        } else {
            (std::slice::from_ref(&delimiter), &elements)
        };
        let (m, _) = ctx.deeper_match(false, push, |ctx| longest_match(segments, matchers, working_idx, ctx));

        if !m.is_match() {
            if seeking_delimiter && optional_delimiter {
                let (content, _) = ctx.deeper_match(false, &[delimiter], |ctx| {
                    longest_match(segments, &elements, working_idx, ctx)
                });
                if content.is_match() {
                    ctx.annotate(
                        format!("Missing delimiter before {}", describe_segment(&segments[working_idx])),
                        segments[working_idx].position().cloned(),
                    );
                    working_idx = content.stop();
                    working_match = working_match.append(content);
                    delimiter_match = None;
                    continue;
                }
            }
            break;
        }

        let stop = m.stop();
        if seeking_delimiter {
            delimiter_match = Some(m);
        } else {
            if let Some(d) = delimiter_match.take() {
                delimiters += 1;
                working_match = working_match.append(d);
            }
            working_match = working_match.append(m);
        }
        working_idx = stop;
        seeking_delimiter = !seeking_delimiter;
    }

    // A trailing delimiter never counts towards the minimum.
    if delimiters < min_delimiters {
        return MatchResult::empty_at(idx);
    }
    if allow_trailing && !seeking_delimiter {
        if let Some(d) = delimiter_match {
            working_match = working_match.append(d);
        }
    }
    working_match
}

// ============================================================================
// Bracketed
// ============================================================================

fn match_bracketed(segments: &[Segment], idx: usize, id: GrammarId, ctx: &mut ParseContext<'_>) -> MatchResult {
    let tables = ctx.tables();
    let Some((start, end, persists)) = tables.brackets(id) else {
        return MatchResult::empty_at(idx);
    };
    let start_match = ctx.deeper_match(false, &[], |ctx| match_grammar(segments, idx, start, ctx));
    if !start_match.is_match() {
        return MatchResult::empty_at(idx);
    }

    let mut pairs: Vec<BracketPair> = ctx.dialect().bracket_pairs().to_vec();
    let start_target = resolve_ref(tables, start);
    let type_idx = match pairs.iter().position(|p| resolve_ref(tables, p.start) == start_target) {
        Some(i) => {
            pairs[i].persists = persists;
            i
        }
        None => {
            pairs.push(BracketPair {
                bracket_type: SmolStr::new_static("inline"),
                start,
                end,
                persists,
            });
            pairs.len() - 1
        }
    };
    let content_start = start_match.stop();
    let Some(bracketed) = resolve_bracket(segments, start_match, type_idx, &pairs, ctx, false) else {
        return MatchResult::empty_at(idx);
    };

    let spec = SequenceSpec::of(tables, id);
    let closer_idx = bracketed.stop() - 1;
    let (content_idx, end_idx) = if spec.allow_gaps {
        let content_idx = skip_start_index_forward_to_code(segments, content_start, closer_idx);
        (content_idx, skip_stop_index_backward_to_code(segments, closer_idx, content_idx))
    } else {
        (content_start, closer_idx)
    };

    let mut content = ctx.deeper_match(true, &[end], |ctx| {
        match_sequence(&segments[..end_idx], content_idx, &spec, ctx)
    });
    if content.stop() != end_idx && spec.parse_mode == ParseMode::Strict {
        return MatchResult::empty_at(idx);
    }
    if !spec.allow_gaps && content.stop() < closer_idx {
        let leftover = MatchResult::unparsable(content.stop()..closer_idx, tables.describe(id));
        content = content.append(leftover);
    }

    let mut insert_segments = bracketed.insert_segments;
    let mut child_matches = bracketed.child_matches;
    if content.matched_class.is_some() {
        child_matches.push(content);
    } else {
        child_matches.extend(content.child_matches);
        insert_segments.extend(content.insert_segments);
    }
    MatchResult {
        matched_slice: bracketed.matched_slice,
        matched_class: bracketed.matched_class,
        insert_segments,
        child_matches,
    }
}

// ============================================================================
// Anything
// ============================================================================

fn match_anything(segments: &[Segment], idx: usize, id: GrammarId, ctx: &mut ParseContext<'_>) -> MatchResult {
    let (own, reset) = terminators_of(ctx.tables(), id);
    let terms = combined_terminators(&own, reset, ctx);
    if terms.is_empty() {
        return MatchResult::from_slice(idx..segments.len().max(idx));
    }
    greedy_match(segments, idx, &terms, ctx, false, true)
}

// ============================================================================
// Terminals
// ============================================================================

fn token_match(idx: usize, seg_type: &str, normalized: Option<SmolStr>) -> MatchResult {
    MatchResult {
        matched_slice: idx..idx + 1,
        matched_class: Some(Matched::Token {
            seg_type: SmolStr::new(seg_type),
            normalized,
        }),
        ..MatchResult::default()
    }
}

fn match_string(segments: &[Segment], idx: usize, id: GrammarId, tables: &GrammarTables) -> MatchResult {
    let (template, seg_type) = tables.template_and_type(id);
    match segments.get(idx) {
        Some(seg) if seg.is_code() && seg.raw_upper() == template => token_match(idx, seg_type, None),
        _ => MatchResult::empty_at(idx),
    }
}

fn match_multi_string(segments: &[Segment], idx: usize, id: GrammarId, tables: &GrammarTables) -> MatchResult {
    let (seg_type, mut templates) = tables.multi_strings(id);
    match segments.get(idx) {
        Some(seg) if seg.is_code() => {
            let raw_upper = seg.raw_upper();
            if templates.any(|t| t == raw_upper) {
                token_match(idx, seg_type, None)
            } else {
                MatchResult::empty_at(idx)
            }
        }
        _ => MatchResult::empty_at(idx),
    }
}

fn match_typed(segments: &[Segment], idx: usize, id: GrammarId, tables: &GrammarTables) -> MatchResult {
    let (template, seg_type) = tables.template_and_type(id);
    let Some(seg) = segments.get(idx) else {
        return MatchResult::empty_at(idx);
    };
    if !seg.is_type(template) {
        return MatchResult::empty_at(idx);
    }
    let casefold = tables.casefold(id);
    let trim_chars: Vec<&str> = tables.trim_chars(id).collect();
    let normalized = if trim_chars.is_empty() && casefold == crate::dialect::Casefold::None {
        None
    } else {
        let mut value = seg.raw();
        for t in &trim_chars {
            value = value.trim_start_matches(t).trim_end_matches(t);
        }
        Some(SmolStr::new(casefold.apply(value)))
    };
    token_match(idx, seg_type, normalized)
}

fn match_regex(segments: &[Segment], idx: usize, id: GrammarId, tables: &GrammarTables) -> MatchResult {
    let (regex, anti, seg_type) = tables.regex_parts(id);
    let (Some(seg), Some(regex)) = (segments.get(idx), regex) else {
        return MatchResult::empty_at(idx);
    };
    let raw = seg.raw();
    if !seg.is_code() || raw.is_empty() || !regex.is_match(raw) {
        return MatchResult::empty_at(idx);
    }
    if anti.is_some_and(|a| a.is_match(raw)) {
        return MatchResult::empty_at(idx);
    }
    token_match(idx, seg_type, None)
}
