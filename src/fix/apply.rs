//! Tree-level fix application

use indexmap::IndexMap;
use uuid::Uuid;

use super::anchor::AnchorEditInfo;
use crate::parser::{Parser, unparsable_errors};
use crate::rules::EditType;
use crate::segments::{Segment, position_segments};

/// Result of [`apply_fixes`] for one segment.
#[derive(Debug, Clone)]
pub struct AppliedFixes {
    pub segment: Segment,
    /// Non-code the segment may not start with, handed to the parent
    pub before: Vec<Segment>,
    /// Non-code the segment may not end with, handed to the parent
    pub after: Vec<Segment>,
    /// Whether the segment still matches its grammar
    pub validated: bool,
}

impl AppliedFixes {
    fn unchanged(segment: &Segment) -> Self {
        Self {
            segment: segment.clone(),
            before: Vec::new(),
            after: Vec::new(),
            validated: true,
        }
    }
}

/// Split off the non-code at either end of `children`. Metas at the edges
/// stay with the segment, so a trailing dedent does not pin whitespace or
/// newlines that precede it.
fn split_non_code_edges(children: Vec<Segment>) -> (Vec<Segment>, Vec<Segment>, Vec<Segment>) {
    let start = children.iter().position(Segment::is_code).unwrap_or(children.len());
    let stop = children.iter().rposition(Segment::is_code).map_or(start, |idx| idx + 1);
    let mut before = Vec::new();
    let mut kept = Vec::with_capacity(children.len());
    let mut after = Vec::new();
    for (idx, child) in children.into_iter().enumerate() {
        if (start..stop).contains(&idx) || child.is_meta() {
            kept.push(child);
        } else if idx < start {
            before.push(child);
        } else {
            after.push(child);
        }
    }
    (before, kept, after)
}

/// Apply the fixes in `fixes` to `segment` and its descendants.
///
/// Entries are removed from `fixes` as their anchors are found, so anything
/// left afterwards was anchored on a segment not in the tree. Untouched
/// segments keep their uuid.
pub fn apply_fixes(
    segment: &Segment,
    parser: &Parser<'_>,
    rule_code: &str,
    fixes: &mut IndexMap<Uuid, AnchorEditInfo>,
) -> AppliedFixes {
    if fixes.is_empty() || segment.segments().is_empty() {
        return AppliedFixes::unchanged(segment);
    }

    let mut buffer: Vec<Segment> = Vec::with_capacity(segment.segments().len());
    let mut requires_validate = false;
    let mut fixes_applied = false;

    for child in segment.segments() {
        let Some(info) = fixes.shift_remove(&child.uuid()) else {
            buffer.push(child.clone());
            continue;
        };
        fixes_applied = true;
        let mut anchor_fixes = info.fixes;
        if anchor_fixes.len() == 2 && anchor_fixes[0].edit_type == EditType::CreateAfter {
            anchor_fixes.swap(0, 1);
        }
        let alone = anchor_fixes.len() == 1;
        tracing::trace!(rule = rule_code, anchor = %child.uuid(), fixes = anchor_fixes.len(), "applying fixes");

        for fix in anchor_fixes {
            if fix.edit_type == EditType::Delete {
                requires_validate = true;
                continue;
            }
            if fix.edit_type == EditType::CreateAfter && alone {
                buffer.push(child.clone());
            }
            let edit = fix.edit_segments();
            let mut consumed_pos = false;
            for new in edit {
                if fix.edit_type == EditType::Replace && !consumed_pos && new.raw() == child.raw() {
                    buffer.push(new.with_position(child.position().cloned()));
                    consumed_pos = true;
                } else {
                    buffer.push(new.clone());
                }
            }
            let same_type_edit =
                fix.edit_type == EditType::Replace && edit.len() == 1 && edit[0].class_types() == child.class_types();
            if !same_type_edit {
                requires_validate = true;
            }
            if fix.edit_type == EditType::CreateBefore {
                buffer.push(child.clone());
            }
        }
    }

    // Children recursing below need positions for anything created here.
    if fixes_applied {
        buffer = position_segments(&buffer, segment.position());
    }

    let mut children: Vec<Segment> = Vec::with_capacity(buffer.len());
    for child in &buffer {
        let applied = apply_fixes(child, parser, rule_code, fixes);
        // A child that no longer parses on its own may still be valid in context.
        if !applied.validated {
            requires_validate = true;
        }
        children.extend(applied.before);
        children.push(applied.segment);
        children.extend(applied.after);
    }

    let (before, children, after) = if segment.can_start_end_non_code() {
        (Vec::new(), children, Vec::new())
    } else {
        split_non_code_edges(children)
    };

    let children = position_segments(&children, segment.position());
    let new_segment = segment.with_segments(children, segment.position().cloned());

    let validated = if !requires_validate {
        true
    } else if new_segment.is_file() {
        reparse_is_clean(&new_segment, parser)
    } else if new_segment.grammar().is_some() {
        parser.revalidate(&new_segment)
    } else {
        false
    };
    if requires_validate && !validated {
        tracing::debug!(rule = rule_code, segment = new_segment.seg_type(), "fixed segment no longer matches its grammar");
    }

    AppliedFixes {
        segment: new_segment,
        before,
        after,
        validated,
    }
}

/// Reparse a fixed file and check it has no more unparsable sections than
/// the tree already carries.
fn reparse_is_clean(file: &Segment, parser: &Parser<'_>) -> bool {
    let leaves: Vec<Segment> = file
        .iter_raw_segments()
        .filter(|s| !s.is_meta() || s.is_template_meta())
        .cloned()
        .collect();
    let reparsed = parser.parse(&leaves);
    reparsed.errors.len() <= unparsable_errors(file).len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::dialect_selector;
    use crate::fix::compute_anchor_edit_info;
    use crate::lexer::Lexer;
    use crate::rules::LintFix;
    use crate::segments::MetaKind;
    use crate::templater::TemplatedFile;

    fn parse(sql: &str) -> Segment {
        let dialect = dialect_selector("ansi").unwrap();
        let lexed = Lexer::new(dialect).lex(&TemplatedFile::from_string(sql));
        Parser::new(dialect).parse(&lexed.segments).tree
    }

    fn run(tree: &Segment, fixes: &[LintFix]) -> AppliedFixes {
        let parser = Parser::new(dialect_selector("ansi").unwrap());
        let mut info = compute_anchor_edit_info(fixes);
        let out = apply_fixes(tree, &parser, "L999", &mut info);
        assert!(info.is_empty(), "every anchor should be found");
        out
    }

    fn find<'a>(tree: &'a Segment, raw: &str) -> &'a Segment {
        tree.iter_raw_segments().find(|s| s.raw() == raw).unwrap()
    }

    #[test]
    fn test_delete_whitespace() {
        let tree = parse("SELECT a  , b FROM t");
        let ws = find(&tree, "  ");
        let out = run(&tree, &[LintFix::delete(ws)]);
        assert_eq!(out.segment.raw(), "SELECT a, b FROM t");
        assert!(out.validated);
    }

    #[test]
    fn test_replace_keeps_position_of_matching_raw() {
        let tree = parse("select 1");
        let kw = find(&tree, "select");
        let out = run(&tree, &[LintFix::replace(kw, vec![kw.edit(Some("SELECT"), None)])]);
        assert_eq!(out.segment.raw(), "SELECT 1");
        let new_kw = find(&out.segment, "SELECT");
        assert_eq!(new_kw.position().map(|p| p.source_slice), kw.position().map(|p| p.source_slice));
    }

    #[test]
    fn test_create_pair_around_anchor() {
        let tree = parse("SELECT a,b FROM t");
        let b = find(&tree, "b");
        let fixes = [
            LintFix::create_after(b, vec![Segment::whitespace(" ")]),
            LintFix::create_before(b, vec![Segment::whitespace(" ")]),
        ];
        let out = run(&tree, &fixes);
        assert_eq!(out.segment.raw(), "SELECT a, b  FROM t");
    }

    #[test]
    fn test_untouched_segments_keep_uuid() {
        let tree = parse("SELECT a , b FROM t");
        let ws = tree.iter_raw_segments().filter(|s| s.raw() == " ").nth(1).unwrap();
        let from = find(&tree, "FROM").uuid();
        let out = run(&tree, &[LintFix::delete(ws)]);
        assert_eq!(out.segment.uuid(), tree.uuid());
        assert_eq!(find(&out.segment, "FROM").uuid(), from);
        assert!(out.segment.iter_raw_segments().all(|s| s.position().is_some()));
    }

    #[test]
    fn test_trailing_newline_hoisted_to_file() {
        let tree = parse("SELECT 1");
        let one = find(&tree, "1");
        let out = run(&tree, &[LintFix::create_after(one, vec![Segment::newline("\n")])]);
        assert_eq!(out.segment.raw(), "SELECT 1\n");
        // The newline ends up a direct child of the file, not of the statement.
        assert!(out.segment.segments().iter().any(|s| s.is_type("newline")));
        let clause = out.segment.recursive_crawl(&["select_clause"], true).next().unwrap();
        assert!(clause.segments().last().is_some_and(Segment::is_meta));
        assert!(!clause.raw().ends_with('\n'));
    }

    #[test]
    fn test_edge_split_keeps_metas() {
        let children = vec![
            Segment::whitespace(" "),
            Segment::meta(MetaKind::Indent, None),
            Segment::code("1", "literal"),
            Segment::newline("\n"),
            Segment::meta(MetaKind::Dedent, None),
        ];
        let (before, kept, after) = split_non_code_edges(children);
        assert_eq!(before.len(), 1);
        assert_eq!(after.iter().map(Segment::raw).collect::<String>(), "\n");
        assert_eq!(kept.len(), 3);
        assert!(kept[0].is_meta() && kept[2].is_meta());
    }

    #[test]
    fn test_invalid_edit_not_validated() {
        let tree = parse("SELECT a FROM t");
        let select = find(&tree, "SELECT");
        let out = run(&tree, &[LintFix::replace(select, vec![Segment::code("FROM", "keyword")])]);
        assert!(!out.validated);
    }
}
