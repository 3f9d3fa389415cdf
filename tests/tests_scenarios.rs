#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

//! End-to-end linting and fixing of small SQL files.

use rstest::rstest;
use sqlint::{FluffConfig, IndentConfig, LintedFile, Linter, PlaceholderTemplater};

fn linter(rules: &[&str]) -> Linter {
    Linter::new(FluffConfig::new().with_rules(rules.iter().copied())).unwrap()
}

fn positions(result: &LintedFile) -> Vec<(&str, usize, usize)> {
    result
        .violations
        .iter()
        .map(|v| (v.code.as_str(), v.line_no, v.line_pos))
        .collect()
}

// ============================================================================
// Layout rules
// ============================================================================

#[test]
fn test_trailing_whitespace_removed() {
    let result = linter(&["L001"]).lint_string("SELECT 1    \n", "s1.sql", true).unwrap();
    assert_eq!(positions(&result), vec![("L001", 1, 9)]);
    assert_eq!(result.fixed_source.as_deref(), Some("SELECT 1\n"));
    assert!(result.warnings.is_empty());
}

#[test]
fn test_space_added_after_comma() {
    let result = linter(&["L008"]).lint_string("SELECT a,b FROM t", "s2.sql", true).unwrap();
    assert_eq!(positions(&result), vec![("L008", 1, 10)]);
    assert_eq!(result.fixed_source.as_deref(), Some("SELECT a, b FROM t"));
}

#[rstest]
#[case("SELECT a ,b FROM t", "SELECT a,b FROM t")]
#[case("SELECT a   , b FROM t", "SELECT a, b FROM t")]
#[case("SELECT a, b FROM t", "SELECT a, b FROM t")]
fn test_space_before_comma(#[case] sql: &str, #[case] expected: &str) {
    let result = linter(&["L005"]).lint_string(sql, "l005.sql", true).unwrap();
    assert_eq!(result.fixed_source.as_deref(), Some(expected));
    assert_eq!(result.is_clean(), sql == expected);
}

// ============================================================================
// Capitalisation
// ============================================================================

#[test]
fn test_upper_policy_fixes_keywords() {
    let config = FluffConfig::new()
        .with_rules(["L010"])
        .with_rule_config("L010", "capitalisation_policy", "upper");
    let result = Linter::new(config).unwrap().lint_string("select 1 FROM t", "s3.sql", true).unwrap();
    assert_eq!(positions(&result), vec![("L010", 1, 1)]);
    assert_eq!(result.fixed_source.as_deref(), Some("SELECT 1 FROM t"));
}

#[rstest]
#[case("upper", "select a from t", "SELECT a FROM t")]
#[case("lower", "SELECT a FROM t", "select a from t")]
#[case("capitalise", "select a FROM t", "Select a From t")]
#[case("consistent", "select a FROM t", "select a from t")]
fn test_capitalisation_policies(#[case] policy: &str, #[case] sql: &str, #[case] expected: &str) {
    let config = FluffConfig::new()
        .with_rules(["L010"])
        .with_rule_config("L010", "capitalisation_policy", policy);
    let result = Linter::new(config).unwrap().lint_string(sql, "l010.sql", true).unwrap();
    assert_eq!(result.fixed_source.as_deref(), Some(expected));
}

// ============================================================================
// Parse recovery
// ============================================================================

#[test]
fn test_unparsable_from_clause_recovers() {
    let result = linter(&["L001"]).lint_string("SELECT 1 FROM ; SELECT 2", "s4.sql", false).unwrap();
    let codes: Vec<&str> = result.violations.iter().map(|v| v.code.as_str()).collect();
    assert_eq!(codes, vec!["PRS"]);

    let tree = result.tree.as_ref().unwrap();
    assert_eq!(tree.raw(), "SELECT 1 FROM ; SELECT 2");
    let statements: Vec<_> = tree.recursive_crawl(&["select_statement"], true).collect();
    assert_eq!(statements.len(), 2);

    let from = statements[0].recursive_crawl(&["from_clause"], true).next().unwrap();
    assert_eq!(from.recursive_crawl(&["unparsable"], true).count(), 1);
    assert_eq!(statements[1].recursive_crawl(&["unparsable"], true).count(), 0);
}

#[test]
fn test_unparsable_fixed_when_forced() {
    let config = FluffConfig::new().with_rules(["L001"]).with_fix_even_unparsable(true);
    let result = Linter::new(config)
        .unwrap()
        .lint_string("SELECT 1 FROM ; SELECT 2   \n", "s4.sql", true)
        .unwrap();
    assert_eq!(result.fixed_source.as_deref(), Some("SELECT 1 FROM ; SELECT 2\n"));
}

// ============================================================================
// Templated files
// ============================================================================

#[test]
fn test_fix_on_literal_source_is_applied() {
    let linter = linter(&["L005"]).with_templater(PlaceholderTemplater::new().with_var("col", "a"));
    let result = linter.lint_string("SELECT {{ col }} ,b", "s5.sql", true).unwrap();
    assert_eq!(result.templated_file.templated_str, "SELECT a ,b");
    assert_eq!(result.num_violations(), 1);
    assert_eq!(result.fixed_source.as_deref(), Some("SELECT {{ col }},b"));
}

#[test]
fn test_fix_inside_template_is_rejected() {
    let indentation = IndentConfig {
        ignore_templated_areas: false,
        ..IndentConfig::default()
    };
    let config = FluffConfig::new().with_rules(["L005"]).with_indentation(indentation);
    let linter = Linter::new(config)
        .unwrap()
        .with_templater(PlaceholderTemplater::new().with_var("col", "x "));
    let result = linter.lint_string("SELECT {{ col }},b", "s6.sql", true).unwrap();
    assert_eq!(result.templated_file.templated_str, "SELECT x ,b");
    assert_eq!(result.num_violations(), 1);
    assert!(!result.violations[0].fixable());
    assert_eq!(result.fixed_source.as_deref(), Some("SELECT {{ col }},b"));
    assert_eq!(result.fix_string(), ("SELECT {{ col }},b".to_string(), false));
}

#[test]
fn test_violations_in_templated_areas_hidden_by_default() {
    let linter = linter(&["L005"]).with_templater(PlaceholderTemplater::new().with_var("col", "x "));
    let result = linter.lint_string("SELECT {{ col }},b", "s6.sql", true).unwrap();
    assert!(result.is_clean());
    assert_eq!(result.fixed_source.as_deref(), Some("SELECT {{ col }},b"));
}

#[test]
fn test_template_comment_survives_fix() {
    let linter = linter(&["L001"]).with_templater(PlaceholderTemplater::new());
    let sql = "{# header #}\nSELECT 1   \n";
    let result = linter.lint_string(sql, "comment.sql", true).unwrap();
    assert_eq!(result.fixed_source.as_deref(), Some("{# header #}\nSELECT 1\n"));
}

// ============================================================================
// Whole ruleset
// ============================================================================

#[rstest]
#[case("SELECT a,b FROM t  \n", "SELECT a, b FROM t\n")]
#[case("select a , b from t\n", "select a, b from t\n")]
#[case("SELECT 1;\nselect 2;\n", "SELECT 1;\nSELECT 2;\n")]
fn test_default_ruleset_fixes(#[case] sql: &str, #[case] expected: &str) {
    let linter = Linter::new(FluffConfig::default()).unwrap();
    let result = linter.lint_string(sql, "all.sql", true).unwrap();
    assert_eq!(result.fixed_source.as_deref(), Some(expected));
    let again = linter.lint_string(expected, "all.sql", false).unwrap();
    assert!(again.is_clean(), "{:?}", again.violations);
}
