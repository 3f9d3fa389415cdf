//! Lint and fix loop over a parsed tree

use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;

use super::noqa::IgnoreMask;
use crate::errors::UnfixableWarning;
use crate::fix::{apply_fixes, compute_anchor_edit_info};
use crate::parser::Parser;
use crate::rules::{LintFix, LintViolation, Rule, crawl};
use crate::segments::{Segment, SourceFix};
use crate::templater::TemplatedFile;

/// Output of [`lint_fix_parsed`].
#[derive(Debug, Clone)]
pub struct FixLoopOutput {
    /// Final tree; unchanged unless fixing
    pub tree: Segment,
    /// Violations found in the first loop
    pub violations: Vec<LintViolation>,
    pub warnings: Vec<UnfixableWarning>,
    /// Loops run
    pub loops: usize,
}

/// Identity of a file version for cycle detection.
fn version_key(tree: &Segment) -> (String, Vec<SourceFix>) {
    (tree.raw().to_string(), tree.source_fixes())
}

fn unfixable(warnings: &mut Vec<UnfixableWarning>, warning: UnfixableWarning) {
    tracing::warn!(%warning, "unable to apply fixes");
    warnings.push(warning);
}

/// Run every rule over `tree`, applying fixes between rules when `fix` is
/// set, until no rule changes the tree or `runaway_limit` loops have run.
///
/// Only violations from the first loop are reported. Masked violations are
/// dropped before their fixes are considered.
pub fn lint_fix_parsed(
    tree: Segment,
    rules: &[Box<dyn Rule>],
    parser: &Parser<'_>,
    templated_file: &TemplatedFile,
    mask: &IgnoreMask,
    fix: bool,
    runaway_limit: usize,
) -> FixLoopOutput {
    let dialect = parser.dialect();
    let loop_limit = if fix { runaway_limit.max(1) } else { 1 };

    let mut tree = tree;
    let mut reported: Vec<LintViolation> = Vec::new();
    let mut warnings: Vec<UnfixableWarning> = Vec::new();
    let mut previous_fixes: FxHashMap<&'static str, Vec<LintFix>> = FxHashMap::default();
    let mut seen_versions: FxHashSet<(String, Vec<SourceFix>)> = FxHashSet::default();
    seen_versions.insert(version_key(&tree));

    let mut loops = 0;
    let mut settled = !fix;
    for loop_idx in 0..loop_limit {
        loops += 1;
        let mut changed = false;

        for rule in rules {
            let code = rule.code();
            let output = crawl(rule.as_ref(), &tree, dialect, templated_file);
            let mut violations = mask.filter(output.violations);
            if let Some(error) = &output.internal_error {
                if loop_idx == 0 {
                    reported.push(LintViolation::from(error));
                }
            }

            let fixes: Vec<LintFix> = violations.iter().flat_map(|v| v.fixes.iter().cloned()).collect();
            if fix && !fixes.is_empty() {
                if previous_fixes.get(code) == Some(&fixes) {
                    unfixable(&mut warnings, UnfixableWarning::RepeatedFixes {
                        rule: SmolStr::new_static(code),
                        loop_idx,
                    });
                } else {
                    let mut anchors = compute_anchor_edit_info(&fixes);
                    previous_fixes.insert(code, fixes);
                    if anchors.values().any(|info| !info.is_valid()) {
                        unfixable(&mut warnings, UnfixableWarning::ConflictingFixes {
                            rule: SmolStr::new_static(code),
                        });
                        for violation in &mut violations {
                            violation.fixes.clear();
                        }
                    } else {
                        let applied = apply_fixes(&tree, parser, code, &mut anchors);
                        if !applied.validated {
                            tracing::warn!(rule = code, "fixes not applied, the result would not parse");
                        } else if !seen_versions.insert(version_key(&applied.segment)) {
                            unfixable(&mut warnings, UnfixableWarning::Cycle {
                                rule: SmolStr::new_static(code),
                                loop_idx,
                            });
                        } else {
                            tracing::debug!(rule = code, loop_idx, "applied fixes");
                            tree = applied.segment;
                            changed = true;
                        }
                    }
                }
            }

            if loop_idx == 0 {
                reported.extend(violations);
            }
        }

        if fix && !changed {
            settled = true;
            break;
        }
    }

    if !settled {
        unfixable(&mut warnings, UnfixableWarning::RunawayLimit { limit: loop_limit });
    }

    FixLoopOutput {
        tree,
        violations: reported,
        warnings,
        loops,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::dialect_selector;
    use crate::lexer::Lexer;
    use crate::rules::{CrawlBehaviour, LintResult, RuleContext, RuleL001, RuleL010};

    fn run(rules: &[Box<dyn Rule>], sql: &str, fix: bool, limit: usize) -> (FixLoopOutput, TemplatedFile) {
        let dialect = dialect_selector("ansi").unwrap();
        let tf = TemplatedFile::from_string(sql);
        let lexed = Lexer::new(dialect).lex(&tf);
        let parser = Parser::new(dialect);
        let tree = parser.parse(&lexed.segments).tree;
        let (mask, _) = IgnoreMask::from_tree(&tree);
        (lint_fix_parsed(tree, rules, &parser, &tf, &mask, fix, limit), tf)
    }

    /// Toggles the case of the first keyword forever.
    #[derive(Debug)]
    struct Flip;

    impl Rule for Flip {
        fn code(&self) -> &'static str {
            "L950"
        }
        fn description(&self) -> &'static str {
            "Flip."
        }
        fn crawl_behaviour(&self) -> CrawlBehaviour {
            CrawlBehaviour::SegmentTypes(&["keyword"])
        }
        fn eval(&self, ctx: &RuleContext<'_>) -> Vec<LintResult> {
            let raw = ctx.segment.raw();
            let flipped = if raw == raw.to_uppercase() { raw.to_lowercase() } else { raw.to_uppercase() };
            let edit = ctx.segment.edit(Some(&flipped), None);
            vec![LintResult::new(ctx.segment).with_fixes(vec![LintFix::replace(ctx.segment, vec![edit])])]
        }
    }

    #[test]
    fn test_lint_only_runs_once() {
        let rules: Vec<Box<dyn Rule>> = vec![Box::new(RuleL001)];
        let (out, _) = run(&rules, "SELECT 1   \n", false, 10);
        assert_eq!(out.loops, 1);
        assert_eq!(out.violations.len(), 1);
        assert!(out.warnings.is_empty());
        assert_eq!(out.tree.raw(), "SELECT 1   \n");
    }

    #[test]
    fn test_fix_reaches_fixpoint() {
        let rules: Vec<Box<dyn Rule>> = vec![Box::new(RuleL001), Box::new(RuleL010::default())];
        let (out, _) = run(&rules, "select a FROM t   \n", true, 10);
        assert_eq!(out.tree.raw(), "select a from t\n");
        // Second loop finds nothing new.
        assert_eq!(out.loops, 2);
        assert_eq!(out.violations.len(), 2);
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_cycle_is_detected() {
        let rules: Vec<Box<dyn Rule>> = vec![Box::new(Flip)];
        let (out, _) = run(&rules, "SELECT 1\n", true, 10);
        assert!(out.loops < 10);
        assert!(out.warnings.iter().any(|w| matches!(w, UnfixableWarning::Cycle { .. })));
        assert_eq!(out.tree.raw(), "select 1\n");
    }

    #[test]
    fn test_runaway_limit() {
        let rules: Vec<Box<dyn Rule>> = vec![Box::new(Flip)];
        let (out, _) = run(&rules, "SELECT 1\n", true, 1);
        assert_eq!(out.loops, 1);
        assert!(matches!(out.warnings.last(), Some(UnfixableWarning::RunawayLimit { limit: 1 })));
    }
}
