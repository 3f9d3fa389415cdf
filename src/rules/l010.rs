//! L010: inconsistent capitalisation of keywords

use rustc_hash::FxHashSet;

use super::base::{ConfigKeyword, CrawlBehaviour, LintResult, Rule, RuleConfig};
use super::context::{Memory, RuleContext};
use super::lint_fix::LintFix;
use crate::errors::ConfigError;

pub const CAPITALISATION_POLICY: ConfigKeyword = ConfigKeyword {
    name: "capitalisation_policy",
    description: "The capitalisation policy to enforce.",
    default: "consistent",
    allowed: &["consistent", "upper", "lower", "capitalise"],
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Case {
    Upper,
    Lower,
    Capitalise,
}

impl Case {
    const ALL: [Case; 3] = [Case::Upper, Case::Lower, Case::Capitalise];

    fn apply(self, raw: &str) -> String {
        match self {
            Self::Upper => raw.to_uppercase(),
            Self::Lower => raw.to_lowercase(),
            Self::Capitalise => {
                let mut chars = raw.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                    None => String::new(),
                }
            }
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Self::Upper => "upper case.",
            Self::Lower => "lower case.",
            Self::Capitalise => "capitalised.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Policy {
    Consistent,
    Fixed(Case),
}

/// What earlier keywords in the file ruled out.
#[derive(Debug, Clone, Default)]
struct CaseMemory {
    refuted: FxHashSet<Case>,
    latest_possible: Option<Case>,
}

/// Keywords must use one capitalisation style.
#[derive(Debug, Clone, Copy)]
pub struct RuleL010 {
    policy: Policy,
}

impl Default for RuleL010 {
    fn default() -> Self {
        Self {
            policy: Policy::Consistent,
        }
    }
}

impl RuleL010 {
    pub fn create(config: &RuleConfig) -> Result<Box<dyn Rule>, ConfigError> {
        let value = config.get_or_default(&CAPITALISATION_POLICY);
        let policy = match value {
            "consistent" => Policy::Consistent,
            "upper" => Policy::Fixed(Case::Upper),
            "lower" => Policy::Fixed(Case::Lower),
            "capitalise" => Policy::Fixed(Case::Capitalise),
            other => {
                return Err(ConfigError::InvalidValue {
                    rule: "L010".to_string(),
                    keyword: CAPITALISATION_POLICY.name.to_string(),
                    value: other.to_string(),
                    expected: CAPITALISATION_POLICY.allowed.join(", "),
                });
            }
        };
        Ok(Box::new(Self { policy }))
    }
}

impl Rule for RuleL010 {
    fn code(&self) -> &'static str {
        "L010"
    }

    fn description(&self) -> &'static str {
        "Inconsistent capitalisation of keywords."
    }

    fn config_keywords(&self) -> &'static [ConfigKeyword] {
        &[CAPITALISATION_POLICY]
    }

    fn crawl_behaviour(&self) -> CrawlBehaviour {
        CrawlBehaviour::SegmentTypes(&["keyword", "binary_operator"])
    }

    fn eval(&self, ctx: &RuleContext<'_>) -> Vec<LintResult> {
        let segment = ctx.segment;
        let raw = segment.raw();
        if !segment.is_raw()
            || !raw.chars().any(char::is_alphabetic)
            || segment.position().is_some_and(|p| !p.is_literal())
        {
            return Vec::new();
        }

        let mut memory = ctx.memory.get::<CaseMemory>().cloned().unwrap_or_default();
        memory.refuted.extend(Case::ALL.into_iter().filter(|case| case.apply(raw) != raw));

        let concrete = match self.policy {
            Policy::Fixed(case) => case,
            Policy::Consistent => {
                if let Some(case) = Case::ALL.into_iter().find(|c| !memory.refuted.contains(c)) {
                    memory.latest_possible = Some(case);
                    return vec![LintResult::memory_only(Memory::new(memory))];
                }
                memory.latest_possible.unwrap_or(Case::Upper)
            }
        };

        let fixed = concrete.apply(raw);
        if fixed == raw {
            return vec![LintResult::memory_only(Memory::new(memory))];
        }
        let consistency = if self.policy == Policy::Consistent {
            "consistently "
        } else {
            ""
        };
        let description = format!("Keywords must be {consistency}{}", concrete.describe());
        let edit = segment.edit(Some(&fixed), None);
        vec![
            LintResult::new(segment)
                .with_fixes(vec![LintFix::replace(segment, vec![edit])])
                .with_memory(Memory::new(memory))
                .with_description(description),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::test_support::lint_rule;

    fn with_policy(policy: &str) -> Box<dyn Rule> {
        RuleL010::create(&RuleConfig::new().with("capitalisation_policy", policy)).unwrap()
    }

    #[test]
    fn test_upper_policy() {
        let rule = with_policy("upper");
        let violations = lint_rule(rule.as_ref(), "select 1 FROM t");
        assert_eq!(violations.len(), 1);
        assert_eq!((violations[0].line_no, violations[0].line_pos), (1, 1));
        assert_eq!(violations[0].description, "Keywords must be upper case.");
        assert_eq!(violations[0].fixes[0].edit_segments()[0].raw(), "SELECT");
    }

    #[test]
    fn test_consistent_follows_first_keyword() {
        let violations = lint_rule(&RuleL010::default(), "select a from t WHERE b");
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].description, "Keywords must be consistently lower case.");
        assert_eq!(violations[0].fixes[0].edit_segments()[0].raw(), "where");
    }

    #[test]
    fn test_capitalise_policy_and_operators() {
        let rule = with_policy("capitalise");
        let violations = lint_rule(rule.as_ref(), "Select a From t Where b AND c");
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].fixes[0].edit_segments()[0].raw(), "And");
    }

    #[test]
    fn test_invalid_policy_rejected() {
        let err = RuleL010::create(&RuleConfig::new().with("capitalisation_policy", "shouty")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_capitalise() {
        assert_eq!(Case::Capitalise.apply("sElEcT"), "Select");
        assert_eq!(Case::Capitalise.apply(""), "");
    }
}
