#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

//! Linter configuration, noqa handling and the dialect and rule registries.

use rstest::rstest;
use sqlint::dialect::grammar::kw;
use sqlint::dialect::{GrammarBuilder, ansi, load_dialect, register_dialect};
use sqlint::errors::ConfigError;
use sqlint::{Dialect, FluffConfig, LintError, Linter, RuleRegistry, dialect_readout};

fn linter() -> Linter {
    Linter::new(FluffConfig::default()).unwrap()
}

fn codes(linter: &Linter, sql: &str) -> Vec<String> {
    let result = linter.lint_string(sql, "test.sql", false).unwrap();
    result.violations.iter().map(|v| v.code.to_string()).collect()
}

// ============================================================================
// Configuration
// ============================================================================

#[rstest]
#[case(FluffConfig::new().with_dialect("tsql"), LintError::Config(ConfigError::UnknownDialect("tsql".to_string())))]
#[case(FluffConfig::new().with_exclude_rules(["L404"]), LintError::Config(ConfigError::UnknownRule("L404".to_string())))]
#[case(
    FluffConfig::new().with_rule_config("L010", "capitalisation_policy", "shouty"),
    LintError::Config(ConfigError::InvalidValue {
        rule: "L010".to_string(),
        keyword: "capitalisation_policy".to_string(),
        value: "shouty".to_string(),
        expected: "consistent, upper, lower, capitalise".to_string(),
    })
)]
#[case(
    FluffConfig::new().with_rule_config("L001", "tab_width", "4"),
    LintError::Config(ConfigError::UnknownKeyword { rule: "L001".to_string(), keyword: "tab_width".to_string() })
)]
fn test_invalid_config_rejected(#[case] config: FluffConfig, #[case] expected: LintError) {
    assert_eq!(Linter::new(config).unwrap_err(), expected);
}

#[test]
fn test_exclude_rules() {
    let linter = Linter::new(FluffConfig::new().with_exclude_rules(["L001", "L010"])).unwrap();
    assert_eq!(codes(&linter, "select a,b FROM t   \n"), vec!["L008"]);
}

#[test]
fn test_registry_readout_in_code_order() {
    let registry = RuleRegistry::standard();
    let readout: Vec<&str> = registry.rule_readout().into_iter().map(|(code, _)| code).collect();
    assert_eq!(readout, vec!["L001", "L005", "L008", "L009", "L010"]);
    assert_eq!(linter().ruleset().unwrap().len(), 5);
}

// ============================================================================
// noqa
// ============================================================================

#[rstest]
#[case("SELECT a,b FROM t  -- noqa\n", vec![])]
#[case("SELECT a,b FROM t  -- noqa: L001\n", vec!["L008"])]
#[case("-- noqa: disable=L001\nSELECT 1  \nFROM t  \n", vec![])]
fn test_noqa_directives(#[case] sql: &str, #[case] expected: Vec<&str>) {
    assert_eq!(codes(&linter(), sql), expected);
}

#[test]
fn test_noqa_range_ends_at_enable() {
    let sql = "SELECT a  -- noqa: disable=L001\n, b  \n-- noqa: enable=all\nFROM t  \n";
    let result = linter().lint_string(sql, "range.sql", false).unwrap();
    let lines: Vec<(&str, usize)> = result
        .violations
        .iter()
        .filter(|v| v.code == "L001")
        .map(|v| (v.code.as_str(), v.line_no))
        .collect();
    assert_eq!(lines, vec![("L001", 4)]);
}

#[test]
fn test_malformed_noqa_reported() {
    let result = linter().lint_string("SELECT 1 -- noqa L001\n", "bad.sql", false).unwrap();
    assert_eq!(result.violations.len(), 1);
    assert_eq!(result.violations[0].code, "PRS");
    assert_eq!(result.violations[0].line_no, 1);
}

// ============================================================================
// Dialects
// ============================================================================

#[test]
fn test_registered_dialect_is_loadable() {
    let mut b = GrammarBuilder::new("Root");
    b.add("Root", kw("PING"));
    let dialect = Dialect::new("ping", b.compile().unwrap(), ansi::lexer_matchers().unwrap(), [], []);
    let registered = register_dialect(dialect);

    assert!(std::ptr::eq(load_dialect("ping").unwrap(), registered));
    let names = dialect_readout();
    assert_eq!(names.first().map(String::as_str), Some("ansi"));
    assert!(names.iter().any(|n| n == "ping"));
}

// ============================================================================
// Batches
// ============================================================================

#[test]
fn test_parallel_lint_matches_serial() {
    let linter = linter();
    let files: Vec<(String, String)> = (0..32)
        .map(|i| {
            let sql = if i % 2 == 0 {
                format!("select c{i},d FROM t  \n")
            } else {
                format!("SELECT c{i}\n")
            };
            (format!("f{i}.sql"), sql)
        })
        .collect();

    let parallel = linter.lint_strings(&files, true);
    assert_eq!(parallel.len(), files.len());
    for ((fname, sql), result) in files.iter().zip(parallel) {
        let result = result.unwrap();
        let serial = linter.lint_string(sql, fname, true).unwrap();
        assert_eq!(&result.path, fname);
        assert_eq!(result.fixed_source, serial.fixed_source);
        assert_eq!(result.num_violations(), serial.num_violations());
    }
}

#[cfg(feature = "serde")]
#[test]
fn test_linted_file_to_json() {
    let result = linter().lint_string("SELECT 1  \n", "json.sql", false).unwrap();
    let json: serde_json::Value = serde_json::from_str(&result.to_json().unwrap()).unwrap();
    assert_eq!(json["path"], "json.sql");
    assert_eq!(json["violations"][0]["code"], "L001");
    assert!(json["time_dict"]["parsing"].is_number());
}
