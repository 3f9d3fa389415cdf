//! L001: unnecessary trailing whitespace

use super::base::{CrawlBehaviour, LintResult, Rule, RuleConfig};
use super::context::RuleContext;
use super::lint_fix::LintFix;
use crate::errors::ConfigError;
use crate::segments::{MetaKind, Segment};

/// Whitespace directly before a newline or the end of the file.
///
/// Whitespace produced by template expansion is left alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleL001;

impl RuleL001 {
    pub fn create(_config: &RuleConfig) -> Result<Box<dyn Rule>, ConfigError> {
        Ok(Box::new(Self))
    }
}

fn ends_line(seg: &Segment) -> bool {
    seg.is_type("newline") || seg.meta_kind() == Some(MetaKind::EndOfFile)
}

impl Rule for RuleL001 {
    fn code(&self) -> &'static str {
        "L001"
    }

    fn description(&self) -> &'static str {
        "Unnecessary trailing whitespace."
    }

    fn crawl_behaviour(&self) -> CrawlBehaviour {
        CrawlBehaviour::RootOnly
    }

    fn eval(&self, ctx: &RuleContext<'_>) -> Vec<LintResult> {
        // Grammar metas are invisible here; template placeholders are not,
        // since they stand for real source text.
        let leaves: Vec<&Segment> = ctx
            .segment
            .iter_raw_segments()
            .filter(|s| !s.is_meta() || s.is_template_meta() || s.meta_kind() == Some(MetaKind::EndOfFile))
            .collect();

        leaves
            .windows(2)
            .filter(|pair| ends_line(pair[1]) && pair[0].is_type("whitespace"))
            .map(|pair| pair[0])
            .filter(|ws| ws.position().is_some_and(|p| p.is_literal()))
            .map(|ws| LintResult::new(ws).with_fixes(vec![LintFix::delete(ws)]))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::test_support::lint_rule;

    #[test]
    fn test_trailing_whitespace_before_newline() {
        let violations = lint_rule(&RuleL001, "SELECT 1    \n");
        assert_eq!(violations.len(), 1);
        assert_eq!((violations[0].line_no, violations[0].line_pos), (1, 9));
        assert!(violations[0].fixable());
    }

    #[test]
    fn test_trailing_whitespace_at_end_of_file() {
        let violations = lint_rule(&RuleL001, "SELECT 1\nFROM t  ");
        assert_eq!(violations.len(), 1);
        assert_eq!((violations[0].line_no, violations[0].line_pos), (2, 7));
    }

    #[test]
    fn test_indentation_is_not_trailing() {
        assert!(lint_rule(&RuleL001, "SELECT\n    1\n").is_empty());
    }

    #[test]
    fn test_whitespace_before_comment_is_not_trailing() {
        assert!(lint_rule(&RuleL001, "SELECT 1 -- note\n").is_empty());
    }
}
