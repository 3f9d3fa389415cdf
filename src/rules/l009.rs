//! L009: files end with a single trailing newline

use super::base::{CrawlBehaviour, LintResult, Rule, RuleConfig};
use super::context::RuleContext;
use super::lint_fix::LintFix;
use crate::errors::ConfigError;
use crate::segments::Segment;

#[derive(Debug, Clone, Copy, Default)]
pub struct RuleL009;

impl RuleL009 {
    pub fn create(_config: &RuleConfig) -> Result<Box<dyn Rule>, ConfigError> {
        Ok(Box::new(Self))
    }
}

impl Rule for RuleL009 {
    fn code(&self) -> &'static str {
        "L009"
    }

    fn description(&self) -> &'static str {
        "Files must end with a single trailing newline."
    }

    fn crawl_behaviour(&self) -> CrawlBehaviour {
        CrawlBehaviour::RootOnly
    }

    fn eval(&self, ctx: &RuleContext<'_>) -> Vec<LintResult> {
        let leaves: Vec<&Segment> = ctx.segment.iter_raw_segments().filter(|s| !s.is_meta()).collect();
        if !leaves.iter().any(|s| s.is_code() || s.is_comment()) {
            return Vec::new();
        }
        let trailing = leaves.iter().rev().take_while(|s| s.is_type("newline")).count();
        match trailing {
            1 => Vec::new(),
            0 => {
                let Some(last) = leaves.last() else {
                    return Vec::new();
                };
                vec![LintResult::new(last).with_fixes(vec![LintFix::create_after(last, vec![Segment::newline("\n")])])]
            }
            n => {
                let extra = &leaves[leaves.len() - n + 1..];
                let fixes = extra.iter().map(|s| LintFix::delete(s)).collect();
                vec![LintResult::new(extra[0]).with_fixes(fixes)]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::EditType;
    use crate::rules::test_support::lint_rule;

    #[test]
    fn test_missing_final_newline() {
        let violations = lint_rule(&RuleL009, "SELECT 1");
        assert_eq!(violations.len(), 1);
        assert_eq!((violations[0].line_no, violations[0].line_pos), (1, 8));
        assert_eq!(violations[0].fixes[0].edit_type, EditType::CreateAfter);
    }

    #[test]
    fn test_extra_final_newlines() {
        let violations = lint_rule(&RuleL009, "SELECT 1\n\n\n");
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].line_no, 2);
        assert_eq!(violations[0].fixes.len(), 2);
    }

    #[test]
    fn test_single_newline_and_empty_file() {
        assert!(lint_rule(&RuleL009, "SELECT 1\n").is_empty());
        assert!(lint_rule(&RuleL009, "").is_empty());
        assert!(lint_rule(&RuleL009, "\n\n").is_empty());
    }
}
