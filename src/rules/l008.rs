//! L008: commas followed by a single space

use super::base::{CrawlBehaviour, LintResult, Rule, RuleConfig};
use super::context::RuleContext;
use super::lint_fix::LintFix;
use crate::errors::ConfigError;
use crate::segments::Segment;

/// Commas should be followed by a single whitespace unless followed by a
/// comment or a newline.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleL008;

impl RuleL008 {
    pub fn create(_config: &RuleConfig) -> Result<Box<dyn Rule>, ConfigError> {
        Ok(Box::new(Self))
    }
}

fn ends_line(seg: Option<&Segment>) -> bool {
    seg.is_none_or(|s| s.is_type("newline") || s.is_comment())
}

impl Rule for RuleL008 {
    fn code(&self) -> &'static str {
        "L008"
    }

    fn description(&self) -> &'static str {
        "Commas should be followed by a single whitespace unless followed by a comment."
    }

    fn crawl_behaviour(&self) -> CrawlBehaviour {
        CrawlBehaviour::SegmentTypes(&["comma"])
    }

    fn eval(&self, ctx: &RuleContext<'_>) -> Vec<LintResult> {
        let mut following = ctx.siblings_post.iter().filter(|s| !s.is_meta());
        let Some(next) = following.next() else {
            return Vec::new();
        };
        if ends_line(Some(next)) {
            return Vec::new();
        }
        if next.is_type("whitespace") {
            // Trailing whitespace is L001's concern.
            if next.raw() == " " || ends_line(following.next()) {
                return Vec::new();
            }
            let single = next.edit(Some(" "), None);
            return vec![LintResult::new(next).with_fixes(vec![LintFix::replace(next, vec![single])])];
        }
        vec![LintResult::new(next).with_fixes(vec![LintFix::create_before(next, vec![Segment::whitespace(" ")])])]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::EditType;
    use crate::rules::test_support::lint_rule;

    #[test]
    fn test_missing_space_after_comma() {
        let violations = lint_rule(&RuleL008, "SELECT a,b FROM t");
        assert_eq!(violations.len(), 1);
        assert_eq!((violations[0].line_no, violations[0].line_pos), (1, 10));
        assert_eq!(violations[0].fixes[0].edit_type, EditType::CreateBefore);
    }

    #[test]
    fn test_too_much_space_after_comma() {
        let violations = lint_rule(&RuleL008, "SELECT a,   b FROM t");
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].fixes[0].edit_type, EditType::Replace);
        assert_eq!(violations[0].fixes[0].edit_segments()[0].raw(), " ");
    }

    #[test]
    fn test_comma_before_newline_or_comment() {
        assert!(lint_rule(&RuleL008, "SELECT a,\n    b FROM t").is_empty());
        assert!(lint_rule(&RuleL008, "SELECT a, -- first\n    b FROM t").is_empty());
        assert!(lint_rule(&RuleL008, "SELECT a, b FROM t").is_empty());
    }
}
