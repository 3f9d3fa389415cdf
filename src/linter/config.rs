//! Resolved linter configuration

use rustc_hash::FxHashMap;

use crate::lexer::TemplateBlocksIndent;

/// Default loop limit for fixing.
pub const DEFAULT_RUNAWAY_LIMIT: usize = 10;

/// Indentation settings.
///
/// `indented_joins` and `template_blocks_indent` affect parsing and lexing.
/// With `ignore_templated_areas`, rule violations anchored on templated
/// source are not reported.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct IndentConfig {
    pub tab_space_size: usize,
    pub indent_unit: String,
    pub indented_joins: bool,
    pub template_blocks_indent: TemplateBlocksIndent,
    pub ignore_templated_areas: bool,
}

impl Default for IndentConfig {
    fn default() -> Self {
        Self {
            tab_space_size: 4,
            indent_unit: "space".to_string(),
            indented_joins: false,
            template_blocks_indent: TemplateBlocksIndent::Enabled,
            ignore_templated_areas: true,
        }
    }
}

/// Everything the linter needs to know, already resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FluffConfig {
    pub dialect: String,
    /// Rules to run; `None` runs every registered rule
    pub rules: Option<Vec<String>>,
    pub exclude_rules: Vec<String>,
    pub indentation: IndentConfig,
    pub runaway_limit: usize,
    /// Keyword values per rule code
    pub rule_config: FxHashMap<String, FxHashMap<String, String>>,
    /// Apply fixes even when the file has unparsable sections
    pub fix_even_unparsable: bool,
}

impl Default for FluffConfig {
    fn default() -> Self {
        Self {
            dialect: "ansi".to_string(),
            rules: None,
            exclude_rules: Vec::new(),
            indentation: IndentConfig::default(),
            runaway_limit: DEFAULT_RUNAWAY_LIMIT,
            rule_config: FxHashMap::default(),
            fix_even_unparsable: false,
        }
    }
}

impl FluffConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dialect(mut self, dialect: impl Into<String>) -> Self {
        self.dialect = dialect.into();
        self
    }

    pub fn with_rules<I, S>(mut self, rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rules = Some(rules.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_exclude_rules<I, S>(mut self, rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_rules = rules.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_indentation(mut self, indentation: IndentConfig) -> Self {
        self.indentation = indentation;
        self
    }

    pub fn with_runaway_limit(mut self, limit: usize) -> Self {
        self.runaway_limit = limit;
        self
    }

    /// Set one keyword for one rule.
    pub fn with_rule_config(mut self, rule: impl Into<String>, keyword: impl Into<String>, value: impl Into<String>) -> Self {
        self.rule_config
            .entry(rule.into())
            .or_default()
            .insert(keyword.into(), value.into());
        self
    }

    pub fn with_fix_even_unparsable(mut self, fix_even_unparsable: bool) -> Self {
        self.fix_even_unparsable = fix_even_unparsable;
        self
    }

    /// Value of an indentation key as seen by conditional grammars.
    pub fn indent_config_value(&self, key: &str) -> Option<String> {
        let indentation = &self.indentation;
        let value = match key {
            "tab_space_size" => indentation.tab_space_size.to_string(),
            "indent_unit" => indentation.indent_unit.clone(),
            "indented_joins" => indentation.indented_joins.to_string(),
            "ignore_templated_areas" => indentation.ignore_templated_areas.to_string(),
            "template_blocks_indent" => match indentation.template_blocks_indent {
                TemplateBlocksIndent::Enabled => "true",
                TemplateBlocksIndent::Disabled => "false",
                TemplateBlocksIndent::Force => "force",
            }
            .to_string(),
            _ => return None,
        };
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FluffConfig::default();
        assert_eq!(config.dialect, "ansi");
        assert_eq!(config.runaway_limit, 10);
        assert!(config.rules.is_none());
        assert!(!config.fix_even_unparsable);
    }

    #[test]
    fn test_builders() {
        let config = FluffConfig::new()
            .with_rules(["L001", "L010"])
            .with_exclude_rules(["L010"])
            .with_rule_config("L010", "capitalisation_policy", "lower")
            .with_runaway_limit(3);
        assert_eq!(config.rules.as_deref(), Some(&["L001".to_string(), "L010".to_string()][..]));
        assert_eq!(config.rule_config["L010"]["capitalisation_policy"], "lower");
        assert_eq!(config.runaway_limit, 3);
    }

    #[test]
    fn test_indent_config_value() {
        let mut indentation = IndentConfig::default();
        indentation.indented_joins = true;
        let config = FluffConfig::new().with_indentation(indentation);
        assert_eq!(config.indent_config_value("indented_joins").as_deref(), Some("true"));
        assert_eq!(config.indent_config_value("tab_space_size").as_deref(), Some("4"));
        assert_eq!(config.indent_config_value("nonsense"), None);
    }
}
