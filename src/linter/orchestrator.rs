//! The [`Linter`]: template, lex, parse, lint and fix files

use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;

use super::config::FluffConfig;
use super::fix_loop::lint_fix_parsed;
use super::linted_file::{LintedFile, TimeDict};
use super::noqa::IgnoreMask;
use crate::dialect::{Dialect, load_dialect};
use crate::errors::{LexError, LintError, ParseError};
use crate::fix;
use crate::lexer::Lexer;
use crate::parser::Parser;
use crate::rules::{LintViolation, Rule, RuleFactory, RuleRegistry};
use crate::segments::Segment;
use crate::templater::{RawTemplater, TemplatedFile, Templater};

/// A file taken as far as parsing.
#[derive(Debug, Clone)]
pub struct ParsedString {
    pub tree: Segment,
    pub templated_file: TemplatedFile,
    pub lex_errors: Vec<LexError>,
    pub parse_errors: Vec<ParseError>,
    pub time_dict: TimeDict,
}

impl ParsedString {
    /// Lexing and parsing errors as violations.
    pub fn violations(&self) -> Vec<LintViolation> {
        self.lex_errors
            .iter()
            .map(LintViolation::from)
            .chain(self.parse_errors.iter().map(LintViolation::from))
            .collect()
    }
}

/// Lints SQL with one configuration.
///
/// A `Linter` is `Sync`; [`lint_strings`](Self::lint_strings) shares it
/// across worker threads while every file gets fresh rule instances.
#[derive(Clone)]
pub struct Linter {
    config: FluffConfig,
    dialect: &'static Dialect,
    registry: RuleRegistry,
    templater: Arc<dyn Templater>,
}

impl std::fmt::Debug for Linter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Linter")
            .field("dialect", &self.dialect.name())
            .field("templater", &self.templater.name())
            .field("rules", &self.registry.codes().collect::<Vec<_>>())
            .finish()
    }
}

impl Linter {
    /// Build a linter, resolving the dialect and checking the rule config.
    pub fn new(config: FluffConfig) -> Result<Self, LintError> {
        let dialect = load_dialect(&config.dialect)?;
        let linter = Self {
            config,
            dialect,
            registry: RuleRegistry::standard(),
            templater: Arc::new(RawTemplater),
        };
        linter.ruleset()?;
        Ok(linter)
    }

    pub fn with_templater(mut self, templater: impl Templater + 'static) -> Self {
        self.templater = Arc::new(templater);
        self
    }

    /// Register an extra rule and recheck the config against it.
    pub fn with_rule(mut self, factory: RuleFactory) -> Result<Self, LintError> {
        self.registry.register(factory)?;
        self.ruleset()?;
        Ok(self)
    }

    pub fn config(&self) -> &FluffConfig {
        &self.config
    }

    pub fn dialect(&self) -> &'static Dialect {
        self.dialect
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    /// Fresh rule instances for one file.
    pub fn ruleset(&self) -> Result<Vec<Box<dyn Rule>>, LintError> {
        Ok(self.registry.get_ruleset(
            self.config.rules.as_deref(),
            &self.config.exclude_rules,
            &self.config.rule_config,
        )?)
    }

    fn parser(&self) -> Parser<'static> {
        let mut parser = Parser::new(self.dialect);
        if let Some(value) = self.config.indent_config_value("indented_joins") {
            parser = parser.with_indent_config("indented_joins", value);
        }
        parser
    }

    fn lexer(&self) -> Lexer<'static> {
        Lexer::new(self.dialect).with_template_blocks_indent(self.config.indentation.template_blocks_indent)
    }

    /// Template, lex and parse `sql`.
    pub fn parse_string(&self, sql: &str, fname: &str) -> Result<ParsedString, LintError> {
        let mut time_dict = TimeDict::new();
        let started = Instant::now();
        let templated_file = self.templater.process(sql, fname)?;
        time_dict.record("templating", started.elapsed());
        Ok(self.parse_templated(templated_file, time_dict))
    }

    fn parse_templated(&self, templated_file: TemplatedFile, mut time_dict: TimeDict) -> ParsedString {
        let started = Instant::now();
        let lexed = self.lexer().lex(&templated_file);
        time_dict.record("lexing", started.elapsed());

        let started = Instant::now();
        let parsed = self.parser().parse(&lexed.segments);
        time_dict.record("parsing", started.elapsed());

        ParsedString {
            tree: parsed.tree,
            templated_file,
            lex_errors: lexed.errors,
            parse_errors: parsed.errors,
            time_dict,
        }
    }

    /// Lint one string. With `fix`, the fix loop runs and the fixed source
    /// is included in the result.
    pub fn lint_string(&self, sql: &str, fname: &str, fix: bool) -> Result<LintedFile, LintError> {
        let parsed = self.parse_string(sql, fname)?;
        self.lint_parsed(parsed, fix)
    }

    /// Lint a file that was templated elsewhere.
    pub fn lint_templated(&self, templated_file: TemplatedFile, fix: bool) -> Result<LintedFile, LintError> {
        let parsed = self.parse_templated(templated_file, TimeDict::new());
        self.lint_parsed(parsed, fix)
    }

    /// Lint `(fname, sql)` pairs in parallel, keeping input order.
    pub fn lint_strings(&self, files: &[(String, String)], fix: bool) -> Vec<Result<LintedFile, LintError>> {
        files
            .par_iter()
            .map(|(fname, sql)| self.lint_string(sql, fname, fix))
            .collect()
    }

    fn lint_parsed(&self, parsed: ParsedString, fix: bool) -> Result<LintedFile, LintError> {
        let rules = self.ruleset()?;
        let ParsedString {
            tree,
            templated_file,
            lex_errors,
            parse_errors,
            mut time_dict,
        } = parsed;

        let (mask, noqa_violations) = IgnoreMask::from_tree(&tree);
        let mut violations: Vec<LintViolation> = lex_errors
            .iter()
            .map(LintViolation::from)
            .chain(parse_errors.iter().map(LintViolation::from))
            .collect();
        violations = mask.filter(violations);
        violations.extend(noqa_violations);

        // Fixes are never applied to a file with unparsable sections unless
        // forced, so its violations are not reported as fixable either.
        let fixes_blocked = !parse_errors.is_empty() && !self.config.fix_even_unparsable;
        let can_fix = fix && !fixes_blocked;
        if fix && !can_fix {
            tracing::warn!(
                fname = %templated_file.fname,
                "not fixing file with unparsable sections; set fix_even_unparsable to override"
            );
        }

        let started = Instant::now();
        let parser = self.parser();
        let output = lint_fix_parsed(
            tree,
            &rules,
            &parser,
            &templated_file,
            &mask,
            can_fix,
            self.config.runaway_limit,
        );
        time_dict.record("linting", started.elapsed());
        let mut rule_violations = output.violations;
        if fixes_blocked {
            rule_violations.iter_mut().for_each(|v| v.fixes.clear());
        }
        if self.config.indentation.ignore_templated_areas {
            rule_violations
                .retain(|v| !v.is_rule_violation() || templated_file.is_source_slice_literal(v.source_slice));
        }
        violations.extend(rule_violations);
        violations.sort_by_key(|v| (v.line_no, v.line_pos));

        let fixed_source = if fix {
            let started = Instant::now();
            let (fixed, _) = fix::fix_string(&output.tree, &templated_file);
            time_dict.record("fixing", started.elapsed());
            Some(fixed)
        } else {
            None
        };

        Ok(LintedFile {
            path: templated_file.fname.clone(),
            violations,
            fixed_source,
            time_dict,
            tree: Some(output.tree),
            templated_file,
            warnings: output.warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::errors::ConfigError;
    use crate::templater::PlaceholderTemplater;

    fn linter() -> Linter {
        Linter::new(FluffConfig::default()).unwrap()
    }

    #[test]
    fn test_unknown_dialect_and_rule_rejected() {
        assert!(Linter::new(FluffConfig::new().with_dialect("nope")).is_err());
        let err = Linter::new(FluffConfig::new().with_rules(["L999"])).unwrap_err();
        assert_eq!(err, LintError::Config(ConfigError::UnknownRule("L999".to_string())));
    }

    #[test]
    fn test_lint_reports_sorted_violations() {
        let result = linter().lint_string("select a,b FROM t  \n", "a.sql", false).unwrap();
        let codes: Vec<&str> = result.violations.iter().map(|v| v.code.as_str()).collect();
        assert_eq!(codes, vec!["L008", "L010", "L001"]);
        assert!(result.fixed_source.is_none());
        assert!(result.time_dict.get("parsing").is_some());
    }

    #[test]
    fn test_fix_mode_produces_fixed_source() {
        let result = linter().lint_string("select a,b FROM t  \n", "a.sql", true).unwrap();
        assert_eq!(result.fixed_source.as_deref(), Some("select a, b from t\n"));
        assert_eq!(result.fix_string(), ("select a, b from t\n".to_string(), true));
    }

    #[test]
    fn test_noqa_masks_violations() {
        let result = linter()
            .lint_string("SELECT a,b FROM t  -- noqa: L008\n", "a.sql", false)
            .unwrap();
        assert!(result.violations.iter().all(|v| v.code != "L008"));
        let result = linter().lint_string("SELECT a FROM t  -- noqa\n", "a.sql", false).unwrap();
        assert!(result.is_clean());
    }

    #[test]
    fn test_unparsable_not_fixed_by_default() {
        let result = linter().lint_string("SELECT 1  \n) (\n", "a.sql", true).unwrap();
        assert!(result.violations.iter().any(|v| v.code == "PRS"));
        assert_eq!(result.fixed_source.as_deref(), Some("SELECT 1  \n) (\n"));
    }

    #[test]
    fn test_unparsable_file_reports_nothing_fixable() {
        let sql = "SELECT 1  \n) (\n";
        for fix in [false, true] {
            let result = linter().lint_string(sql, "a.sql", fix).unwrap();
            assert!(result.violations.iter().any(|v| v.code == "L001"));
            assert!(result.violations.iter().all(|v| !v.fixable()), "fix={fix}");
        }

        let forced = Linter::new(FluffConfig::new().with_fix_even_unparsable(true)).unwrap();
        let result = forced.lint_string(sql, "a.sql", false).unwrap();
        assert!(result.violations.iter().any(|v| v.code == "L001" && v.fixable()));
    }

    /// Counts events whose message is `lexed file`.
    struct LexedEvents(Arc<AtomicUsize>);

    struct MessageVisitor(String);

    impl tracing::field::Visit for MessageVisitor {
        fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
            if field.name() == "message" {
                self.0 = format!("{value:?}");
            }
        }
    }

    impl tracing::Subscriber for LexedEvents {
        fn enabled(&self, _: &tracing::Metadata<'_>) -> bool {
            true
        }

        fn new_span(&self, _: &tracing::span::Attributes<'_>) -> tracing::span::Id {
            tracing::span::Id::from_u64(1)
        }

        fn record(&self, _: &tracing::span::Id, _: &tracing::span::Record<'_>) {}

        fn record_follows_from(&self, _: &tracing::span::Id, _: &tracing::span::Id) {}

        fn event(&self, event: &tracing::Event<'_>) {
            let mut visitor = MessageVisitor(String::new());
            event.record(&mut visitor);
            if visitor.0 == "lexed file" {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        fn enter(&self, _: &tracing::span::Id) {}

        fn exit(&self, _: &tracing::span::Id) {}
    }

    #[test]
    fn test_lexing_logged_once_per_file() {
        let count = Arc::new(AtomicUsize::new(0));
        let linter = linter();
        tracing::subscriber::with_default(LexedEvents(Arc::clone(&count)), || {
            linter.lint_string("SELECT 1\n", "a.sql", false).unwrap();
        });
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_lint_strings_keeps_order() {
        let files = vec![
            ("a.sql".to_string(), "SELECT 1\n".to_string()),
            ("b.sql".to_string(), "SELECT 1   \n".to_string()),
        ];
        let results = linter().lint_strings(&files, false);
        assert_eq!(results.len(), 2);
        let a = results[0].as_ref().unwrap();
        let b = results[1].as_ref().unwrap();
        assert_eq!((a.path.as_str(), a.num_violations()), ("a.sql", 0));
        assert_eq!((b.path.as_str(), b.num_violations()), ("b.sql", 1));
    }

    #[test]
    fn test_placeholder_templater() {
        let linter = linter().with_templater(PlaceholderTemplater::new().with_var("col", "a"));
        let result = linter.lint_string("SELECT {{ col }} , b FROM t\n", "a.sql", true).unwrap();
        assert_eq!(result.fixed_source.as_deref(), Some("SELECT {{ col }}, b FROM t\n"));
    }
}
