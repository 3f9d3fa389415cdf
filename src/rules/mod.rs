//! Lint rules
//!
//! A [`Rule`] is evaluated by [`crawl`] against every segment it asks for and
//! returns [`LintResult`]s. Each result becomes a [`LintViolation`], carrying
//! the [`LintFix`]es that survived template-safety checks.
//!
//! ## Bundled rules
//!
//! | Code | Checks |
//! |------|--------|
//! | L001 | trailing whitespace |
//! | L005 | whitespace before commas |
//! | L008 | single space after commas |
//! | L009 | single trailing newline |
//! | L010 | keyword capitalisation |

mod base;
mod context;
mod l001;
mod l005;
mod l008;
mod l009;
mod l010;
mod lint_fix;
mod registry;

pub use base::{
    ConfigKeyword, CrawlBehaviour, CrawlOutput, LintResult, LintViolation, Rule, RuleConfig, crawl,
    discard_unsafe_fixes,
};
pub use context::{Memory, RuleContext};
pub use l001::RuleL001;
pub use l005::RuleL005;
pub use l008::RuleL008;
pub use l009::RuleL009;
pub use l010::{CAPITALISATION_POLICY, RuleL010};
pub use lint_fix::{EditType, LintFix};
pub use registry::{RuleFactory, RuleRegistry};

#[cfg(test)]
pub(crate) mod test_support {
    use super::{LintViolation, Rule, crawl};
    use crate::dialect::dialect_selector;
    use crate::lexer::Lexer;
    use crate::parser::Parser;
    use crate::templater::TemplatedFile;

    /// Lex, parse and crawl `sql` with one rule under the ANSI dialect.
    pub fn lint_rule(rule: &dyn Rule, sql: &str) -> Vec<LintViolation> {
        let dialect = dialect_selector("ansi").expect("ansi dialect is registered");
        let templated_file = TemplatedFile::from_string(sql);
        let lexed = Lexer::new(dialect).lex(&templated_file);
        let parsed = Parser::new(dialect).parse(&lexed.segments);
        crawl(rule, &parsed.tree, dialect, &templated_file).violations
    }
}
