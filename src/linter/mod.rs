//! Linting orchestration
//!
//! ## Per-file flow
//!
//! ```text
//! source ──Templater──▶ TemplatedFile ──Lexer──▶ segments ──Parser──▶ tree
//!                                                                      │
//!                        IgnoreMask (noqa) ◀───────────────────────────┤
//!                                                                      ▼
//!                          lint_fix_parsed: crawl rules, apply fixes, repeat
//!                                                                      │
//!                                                                      ▼
//!                          LintedFile { violations, fixed_source, time_dict }
//! ```
//!
//! Files are independent, so [`Linter::lint_strings`] lints them in
//! parallel with `rayon`.

mod config;
mod fix_loop;
mod linted_file;
mod noqa;
mod orchestrator;

pub use config::{DEFAULT_RUNAWAY_LIMIT, FluffConfig, IndentConfig};
pub use fix_loop::{FixLoopOutput, lint_fix_parsed};
pub use linted_file::{LintedFile, TimeDict};
pub use noqa::{IgnoreMask, NoqaAction, NoqaDirective, parse_noqa};
pub use orchestrator::{Linter, ParsedString};
