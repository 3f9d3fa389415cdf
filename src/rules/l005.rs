//! L005: whitespace before a comma

use super::base::{CrawlBehaviour, LintResult, Rule, RuleConfig};
use super::context::RuleContext;
use super::lint_fix::LintFix;
use crate::errors::ConfigError;

/// Commas should not have whitespace directly before them, unless that
/// whitespace is indentation at the start of a line.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleL005;

impl RuleL005 {
    pub fn create(_config: &RuleConfig) -> Result<Box<dyn Rule>, ConfigError> {
        Ok(Box::new(Self))
    }
}

impl Rule for RuleL005 {
    fn code(&self) -> &'static str {
        "L005"
    }

    fn description(&self) -> &'static str {
        "Commas should not have whitespace directly before them."
    }

    fn crawl_behaviour(&self) -> CrawlBehaviour {
        CrawlBehaviour::SegmentTypes(&["comma"])
    }

    fn eval(&self, ctx: &RuleContext<'_>) -> Vec<LintResult> {
        let mut before = ctx.raw_stack.iter().rev().filter(|s| !s.is_meta());
        let Some(ws) = before.next() else {
            return Vec::new();
        };
        if !ws.is_type("whitespace") {
            return Vec::new();
        }
        // Leading commas sit after indentation.
        if before.next().is_none_or(|s| s.is_type("newline")) {
            return Vec::new();
        }
        vec![LintResult::new(ws).with_fixes(vec![LintFix::delete(ws)])]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::test_support::lint_rule;

    #[test]
    fn test_space_before_comma() {
        let violations = lint_rule(&RuleL005, "SELECT a , b FROM t");
        assert_eq!(violations.len(), 1);
        assert_eq!((violations[0].line_no, violations[0].line_pos), (1, 9));
        assert!(violations[0].fixable());
    }

    #[test]
    fn test_leading_comma_indentation_allowed() {
        assert!(lint_rule(&RuleL005, "SELECT\n    a\n    , b\nFROM t\n").is_empty());
    }

    #[test]
    fn test_clean_commas() {
        assert!(lint_rule(&RuleL005, "SELECT a, b, c FROM t").is_empty());
    }
}
