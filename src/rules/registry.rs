//! Rule registry and rule-set selection

use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use super::base::{ConfigKeyword, Rule, RuleConfig};
use super::{RuleL001, RuleL005, RuleL008, RuleL009, RuleL010};
use crate::errors::ConfigError;

/// Builds a configured rule instance.
pub type RuleFactory = fn(&RuleConfig) -> Result<Box<dyn Rule>, ConfigError>;

#[derive(Debug, Clone, Copy)]
struct RegisteredRule {
    code: &'static str,
    description: &'static str,
    config_keywords: &'static [ConfigKeyword],
    factory: RuleFactory,
}

/// All known rules, in registration order.
#[derive(Debug, Clone, Default)]
pub struct RuleRegistry {
    rules: IndexMap<&'static str, RegisteredRule>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the bundled rules.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        for factory in [
            RuleL001::create as RuleFactory,
            RuleL005::create,
            RuleL008::create,
            RuleL009::create,
            RuleL010::create,
        ] {
            // Bundled rules always build with defaults.
            if let Err(e) = registry.register(factory) {
                tracing::warn!(error = %e, "failed to register bundled rule");
            }
        }
        registry
    }

    /// Add a rule. Its metadata is read from an instance built with the
    /// default config; a later rule with the same code replaces an earlier one.
    pub fn register(&mut self, factory: RuleFactory) -> Result<(), ConfigError> {
        let probe = factory(&RuleConfig::default())?;
        let entry = RegisteredRule {
            code: probe.code(),
            description: probe.description(),
            config_keywords: probe.config_keywords(),
            factory,
        };
        tracing::debug!(rule = entry.code, "registered rule");
        self.rules.insert(entry.code, entry);
        Ok(())
    }

    pub fn codes(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.rules.keys().copied()
    }

    /// `(code, description)` for every registered rule.
    pub fn rule_readout(&self) -> Vec<(&'static str, &'static str)> {
        self.rules.values().map(|r| (r.code, r.description)).collect()
    }

    pub fn config_keywords(&self, code: &str) -> Option<&'static [ConfigKeyword]> {
        self.rules.get(code).map(|r| r.config_keywords)
    }

    /// Instantiate the selected rules with their config.
    ///
    /// `allowlist` of `None` selects everything. Unknown codes and invalid
    /// keyword values are rejected.
    pub fn get_ruleset(
        &self,
        allowlist: Option<&[String]>,
        denylist: &[String],
        rule_config: &FxHashMap<String, FxHashMap<String, String>>,
    ) -> Result<Vec<Box<dyn Rule>>, ConfigError> {
        for code in allowlist.unwrap_or_default().iter().chain(denylist).chain(rule_config.keys()) {
            if !self.rules.contains_key(code.as_str()) {
                return Err(ConfigError::UnknownRule(code.clone()));
            }
        }

        let mut ruleset = Vec::new();
        for rule in self.rules.values() {
            let allowed = allowlist.is_none_or(|codes| codes.iter().any(|c| c == rule.code));
            if !allowed || denylist.iter().any(|c| c == rule.code) {
                continue;
            }
            let config: RuleConfig = rule_config
                .get(rule.code)
                .map(|values| values.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                .unwrap_or_default();
            validate_config(rule, &config)?;
            ruleset.push((rule.factory)(&config)?);
        }
        Ok(ruleset)
    }
}

fn validate_config(rule: &RegisteredRule, config: &RuleConfig) -> Result<(), ConfigError> {
    for (keyword, value) in config.iter() {
        let Some(declared) = rule.config_keywords.iter().find(|k| k.name == keyword) else {
            return Err(ConfigError::UnknownKeyword {
                rule: rule.code.to_string(),
                keyword: keyword.to_string(),
            });
        };
        if !declared.allowed.is_empty() && !declared.allowed.contains(&value) {
            return Err(ConfigError::InvalidValue {
                rule: rule.code.to_string(),
                keyword: keyword.to_string(),
                value: value.to_string(),
                expected: declared.allowed.join(", "),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(rule: &str, keyword: &str, value: &str) -> FxHashMap<String, FxHashMap<String, String>> {
        let mut values = FxHashMap::default();
        values.insert(keyword.to_string(), value.to_string());
        let mut out = FxHashMap::default();
        out.insert(rule.to_string(), values);
        out
    }

    fn codes(ruleset: &[Box<dyn Rule>]) -> Vec<&'static str> {
        ruleset.iter().map(|r| r.code()).collect()
    }

    #[test]
    fn test_standard_registry_order() {
        let registry = RuleRegistry::standard();
        assert_eq!(registry.codes().collect::<Vec<_>>(), vec!["L001", "L005", "L008", "L009", "L010"]);
        assert_eq!(registry.config_keywords("L010").map(<[_]>::len), Some(1));
    }

    #[test]
    fn test_allow_and_deny() {
        let registry = RuleRegistry::standard();
        let allow = vec!["L001".to_string(), "L010".to_string()];
        let ruleset = registry
            .get_ruleset(Some(&allow), &["L010".to_string()], &FxHashMap::default())
            .unwrap();
        assert_eq!(codes(&ruleset), vec!["L001"]);
    }

    #[test]
    fn test_unknown_rule_rejected() {
        let registry = RuleRegistry::standard();
        let err = registry.get_ruleset(Some(&["L999".to_string()]), &[], &FxHashMap::default());
        assert_eq!(err.unwrap_err(), ConfigError::UnknownRule("L999".to_string()));
    }

    #[test]
    fn test_keyword_validation() {
        let registry = RuleRegistry::standard();
        let err = registry.get_ruleset(None, &[], &config("L010", "capitalisation_policy", "shouty"));
        assert!(matches!(err, Err(ConfigError::InvalidValue { .. })));
        let err = registry.get_ruleset(None, &[], &config("L001", "tabs", "yes"));
        assert!(matches!(err, Err(ConfigError::UnknownKeyword { .. })));
        let ok = registry.get_ruleset(None, &[], &config("L010", "capitalisation_policy", "upper"));
        assert_eq!(ok.map(|r| r.len()), Ok(5));
    }
}
