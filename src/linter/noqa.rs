//! Inline `noqa` directives
//!
//! ```sql
//! SELECT a  -- noqa                   (ignore everything on this line)
//! SELECT a  -- noqa: L001,L010        (ignore these codes on this line)
//! -- noqa: disable=L010               (ignore L010 from here on)
//! -- noqa: enable=all                 (stop ignoring)
//! ```

use smol_str::SmolStr;

use crate::rules::LintViolation;
use crate::segments::Segment;

/// Range action of a directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoqaAction {
    Disable,
    Enable,
}

/// One parsed `noqa` comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoqaDirective {
    pub line_no: usize,
    /// Codes covered; `None` covers every code
    pub rules: Option<Vec<SmolStr>>,
    /// `None` for a directive that only covers its own line
    pub action: Option<NoqaAction>,
}

impl NoqaDirective {
    fn covers(&self, code: &str) -> bool {
        self.rules.as_ref().is_none_or(|rules| rules.iter().any(|r| r == code))
    }
}

const MALFORMED: &str = "Malformed 'noqa' section. Expected 'noqa: <rule>[,...]'";

/// Parse the text of one comment. `Ok(None)` means it is not a directive.
pub fn parse_noqa(comment: &str, line_no: usize) -> Result<Option<NoqaDirective>, &'static str> {
    let body = comment
        .trim()
        .trim_start_matches("--")
        .trim_start_matches('#')
        .trim_start_matches("/*")
        .trim_end_matches("*/")
        .trim();
    let Some(rest) = body.strip_prefix("noqa") else {
        return Ok(None);
    };
    let rest = rest.trim();
    if rest.is_empty() {
        return Ok(Some(NoqaDirective {
            line_no,
            rules: None,
            action: None,
        }));
    }
    let Some(spec) = rest.strip_prefix(':') else {
        return Err(MALFORMED);
    };

    let (action, codes) = match spec.split_once('=') {
        Some((action, codes)) => {
            let action = match action.trim() {
                "disable" => NoqaAction::Disable,
                "enable" => NoqaAction::Enable,
                _ => return Err("Malformed 'noqa' section. Expected 'noqa: enable=<rule>[,...] | all' or 'noqa: disable=<rule>[,...] | all'"),
            };
            (Some(action), codes)
        }
        None => (None, spec),
    };

    let codes: Vec<SmolStr> = codes
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(|c| SmolStr::new(c.to_uppercase()))
        .collect();
    if codes.is_empty() {
        return Err(MALFORMED);
    }
    let rules = if codes.iter().any(|c| c == "ALL") {
        None
    } else {
        Some(codes)
    };
    Ok(Some(NoqaDirective { line_no, rules, action }))
}

/// Directives found in a file, in line order.
#[derive(Debug, Clone, Default)]
pub struct IgnoreMask {
    directives: Vec<NoqaDirective>,
}

impl IgnoreMask {
    /// Collect directives from every comment in `tree`. Malformed directives
    /// are reported as `PRS` violations.
    pub fn from_tree(tree: &Segment) -> (Self, Vec<LintViolation>) {
        let mut directives = Vec::new();
        let mut violations = Vec::new();
        for comment in tree.iter_raw_segments().filter(|s| s.is_comment()) {
            let line_no = comment.position().map_or(1, |p| p.line_no);
            match parse_noqa(comment.raw(), line_no) {
                Ok(Some(directive)) => directives.push(directive),
                Ok(None) => {}
                Err(message) => violations.push(LintViolation::new("PRS", message, comment.position())),
            }
        }
        directives.sort_by_key(|d| d.line_no);
        tracing::trace!(directives = directives.len(), "collected noqa directives");
        (Self { directives }, violations)
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    pub fn is_masked(&self, violation: &LintViolation) -> bool {
        let mut disabled = false;
        for directive in self.directives.iter().take_while(|d| d.line_no <= violation.line_no) {
            if !directive.covers(&violation.code) {
                continue;
            }
            match directive.action {
                None if directive.line_no == violation.line_no => return true,
                None => {}
                Some(NoqaAction::Disable) => disabled = true,
                Some(NoqaAction::Enable) => disabled = false,
            }
        }
        disabled
    }

    /// Drop masked violations.
    pub fn filter(&self, violations: Vec<LintViolation>) -> Vec<LintViolation> {
        if self.is_empty() {
            return violations;
        }
        violations.into_iter().filter(|v| !self.is_masked(v)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn violation(code: &str, line_no: usize) -> LintViolation {
        let mut v = LintViolation::new(code, "test", None);
        v.line_no = line_no;
        v
    }

    #[test]
    fn test_parse_forms() {
        assert_eq!(parse_noqa("-- just a comment", 1), Ok(None));
        let all = parse_noqa("-- noqa", 3).unwrap().unwrap();
        assert_eq!((all.line_no, all.rules, all.action), (3, None, None));
        let some = parse_noqa("--noqa: L001, l010", 1).unwrap().unwrap();
        assert_eq!(some.rules, Some(vec![SmolStr::new("L001"), SmolStr::new("L010")]));
        let range = parse_noqa("/* noqa: disable=all */", 1).unwrap().unwrap();
        assert_eq!((range.rules, range.action), (None, Some(NoqaAction::Disable)));
    }

    #[test]
    fn test_malformed() {
        assert!(parse_noqa("-- noqa L001", 1).is_err());
        assert!(parse_noqa("-- noqa:", 1).is_err());
        assert!(parse_noqa("-- noqa: skip=L001", 1).is_err());
    }

    #[test]
    fn test_line_and_range_masks() {
        let mask = IgnoreMask {
            directives: vec![
                parse_noqa("-- noqa: L001", 1).unwrap().unwrap(),
                parse_noqa("-- noqa: disable=L010", 2).unwrap().unwrap(),
                parse_noqa("-- noqa: enable=all", 4).unwrap().unwrap(),
            ],
        };
        assert!(mask.is_masked(&violation("L001", 1)));
        assert!(!mask.is_masked(&violation("L010", 1)));
        assert!(mask.is_masked(&violation("L010", 3)));
        assert!(!mask.is_masked(&violation("L001", 3)));
        assert!(!mask.is_masked(&violation("L010", 5)));
    }
}
