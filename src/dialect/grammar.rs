//! Grammar builder
//!
//! Dialects are written with this small combinator language and compiled
//! into [`GrammarTables`](super::GrammarTables) once. Names are resolved at
//! compile time, so grammars can refer to each other in any order.
//!
//! ```ignore
//! seq([kw("SELECT"), indent(), delimited([r("SelectClauseElementSegment")]), dedent()])
//!     .terminators([kw("FROM"), kw("WHERE")])
//!     .parse_mode(ParseMode::GreedyOnceStarted)
//! ```

use smol_str::SmolStr;

use super::tables::{Casefold, ParseMode};
use crate::segments::MetaKind;

/// A grammar expression before compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct Grammar {
    pub(crate) kind: GrammarKind,
    pub(crate) opts: GrammarOpts,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum GrammarKind {
    Ref(SmolStr),
    Sequence(Vec<Grammar>),
    OneOf(Vec<Grammar>),
    AnyNumberOf {
        children: Vec<Grammar>,
        max_times: Option<u32>,
        max_times_per_element: Option<u32>,
    },
    Delimited {
        children: Vec<Grammar>,
        delimiter: Box<Grammar>,
        min_delimiters: u32,
    },
    Bracketed {
        children: Vec<Grammar>,
        bracket_type: SmolStr,
        persists: Option<bool>,
    },
    String {
        template: SmolStr,
        seg_type: SmolStr,
    },
    MultiString {
        templates: Vec<SmolStr>,
        seg_type: SmolStr,
    },
    Typed {
        template: SmolStr,
        seg_type: SmolStr,
        casefold: Casefold,
        trim_chars: Vec<SmolStr>,
    },
    Regex {
        pattern: String,
        anti_pattern: Option<String>,
        seg_type: SmolStr,
    },
    Nothing,
    Anything,
    Token,
    Missing,
    Meta(MetaKind),
    Conditional {
        meta: MetaKind,
        key: SmolStr,
        value: SmolStr,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct GrammarOpts {
    pub(crate) optional: bool,
    pub(crate) terminators: Vec<Grammar>,
    pub(crate) reset_terminators: bool,
    pub(crate) allow_gaps: bool,
    pub(crate) allow_trailing: bool,
    pub(crate) optional_delimiter: bool,
    pub(crate) parse_mode: ParseMode,
    pub(crate) min_times: u16,
    pub(crate) exclude: Option<Box<Grammar>>,
}

impl Default for GrammarOpts {
    fn default() -> Self {
        Self {
            optional: false,
            terminators: Vec::new(),
            reset_terminators: false,
            allow_gaps: true,
            allow_trailing: false,
            optional_delimiter: false,
            parse_mode: ParseMode::Strict,
            min_times: 0,
            exclude: None,
        }
    }
}

impl Grammar {
    fn of(kind: GrammarKind) -> Self {
        Self {
            kind,
            opts: GrammarOpts::default(),
        }
    }

    pub fn optional(mut self) -> Self {
        self.opts.optional = true;
        self
    }

    pub fn terminators(mut self, terminators: impl IntoIterator<Item = Grammar>) -> Self {
        self.opts.terminators.extend(terminators);
        self
    }

    /// Replace (rather than extend) the enclosing terminators.
    pub fn reset_terminators(mut self) -> Self {
        self.opts.reset_terminators = true;
        self
    }

    pub fn allow_gaps(mut self, allow: bool) -> Self {
        self.opts.allow_gaps = allow;
        self
    }

    pub fn parse_mode(mut self, mode: ParseMode) -> Self {
        self.opts.parse_mode = mode;
        self
    }

    pub fn exclude(mut self, exclude: Grammar) -> Self {
        self.opts.exclude = Some(Box::new(exclude));
        self
    }

    pub fn min_times(mut self, n: u16) -> Self {
        self.opts.min_times = n;
        self
    }

    pub fn max_times(mut self, n: u32) -> Self {
        if let GrammarKind::AnyNumberOf { max_times, .. } = &mut self.kind {
            *max_times = Some(n);
        }
        self
    }

    pub fn max_times_per_element(mut self, n: u32) -> Self {
        if let GrammarKind::AnyNumberOf {
            max_times_per_element, ..
        } = &mut self.kind
        {
            *max_times_per_element = Some(n);
        }
        self
    }

    pub fn delimiter(mut self, new: Grammar) -> Self {
        if let GrammarKind::Delimited { delimiter, .. } = &mut self.kind {
            *delimiter = Box::new(new);
        }
        self
    }

    pub fn min_delimiters(mut self, n: u32) -> Self {
        if let GrammarKind::Delimited { min_delimiters, .. } = &mut self.kind {
            *min_delimiters = n;
        }
        self
    }

    pub fn allow_trailing(mut self) -> Self {
        self.opts.allow_trailing = true;
        self
    }

    pub fn optional_delimiter(mut self) -> Self {
        self.opts.optional_delimiter = true;
        self
    }

    pub fn bracket_type(mut self, new: &str) -> Self {
        if let GrammarKind::Bracketed { bracket_type, .. } = &mut self.kind {
            *bracket_type = SmolStr::new(new);
        }
        self
    }

    /// Whether bracket segments survive in the output tree.
    pub fn persists(mut self, keep: bool) -> Self {
        if let GrammarKind::Bracketed { persists, .. } = &mut self.kind {
            *persists = Some(keep);
        }
        self
    }

    pub fn casefold(mut self, fold: Casefold) -> Self {
        if let GrammarKind::Typed { casefold, .. } = &mut self.kind {
            *casefold = fold;
        }
        self
    }

    pub fn trim_chars(mut self, chars: &[&str]) -> Self {
        if let GrammarKind::Typed { trim_chars, .. } = &mut self.kind {
            *trim_chars = chars.iter().map(|c| SmolStr::new(c)).collect();
        }
        self
    }

    pub fn anti_template(mut self, pattern: &str) -> Self {
        if let GrammarKind::Regex { anti_pattern, .. } = &mut self.kind {
            *anti_pattern = Some(pattern.to_string());
        }
        self
    }
}

// =============================================================================
// Constructors
// =============================================================================

/// Reference to a named grammar or segment.
pub fn r(name: &str) -> Grammar {
    Grammar::of(GrammarKind::Ref(SmolStr::new(name)))
}

pub fn seq(children: impl IntoIterator<Item = Grammar>) -> Grammar {
    Grammar::of(GrammarKind::Sequence(children.into_iter().collect()))
}

pub fn one_of(children: impl IntoIterator<Item = Grammar>) -> Grammar {
    Grammar::of(GrammarKind::OneOf(children.into_iter().collect()))
}

pub fn any_number_of(children: impl IntoIterator<Item = Grammar>) -> Grammar {
    Grammar::of(GrammarKind::AnyNumberOf {
        children: children.into_iter().collect(),
        max_times: None,
        max_times_per_element: None,
    })
}

/// Each option at most once, in any order.
pub fn any_set_of(children: impl IntoIterator<Item = Grammar>) -> Grammar {
    any_number_of(children).max_times_per_element(1)
}

/// Comma-delimited by default; see [`Grammar::delimiter`].
pub fn delimited(children: impl IntoIterator<Item = Grammar>) -> Grammar {
    Grammar::of(GrammarKind::Delimited {
        children: children.into_iter().collect(),
        delimiter: Box::new(r("CommaSegment")),
        min_delimiters: 0,
    })
}

/// Round brackets by default; see [`Grammar::bracket_type`].
pub fn bracketed(children: impl IntoIterator<Item = Grammar>) -> Grammar {
    Grammar::of(GrammarKind::Bracketed {
        children: children.into_iter().collect(),
        bracket_type: SmolStr::new_static("round"),
        persists: None,
    })
}

/// Case-insensitive match of one raw string, retyped as `seg_type`.
pub fn string(template: &str, seg_type: &str) -> Grammar {
    Grammar::of(GrammarKind::String {
        template: SmolStr::new(template.to_uppercase()),
        seg_type: SmolStr::new(seg_type),
    })
}

/// Keyword shorthand.
pub fn kw(template: &str) -> Grammar {
    string(template, "keyword")
}

pub fn multi_string(templates: &[&str], seg_type: &str) -> Grammar {
    Grammar::of(GrammarKind::MultiString {
        templates: templates.iter().map(|t| SmolStr::new(t.to_uppercase())).collect(),
        seg_type: SmolStr::new(seg_type),
    })
}

/// Match a token whose class types contain `template`, retyped as `seg_type`.
pub fn typed(template: &str, seg_type: &str) -> Grammar {
    Grammar::of(GrammarKind::Typed {
        template: SmolStr::new(template),
        seg_type: SmolStr::new(seg_type),
        casefold: Casefold::None,
        trim_chars: Vec::new(),
    })
}

/// Full, case-insensitive regex match of one token's raw.
pub fn regex(pattern: &str, seg_type: &str) -> Grammar {
    Grammar::of(GrammarKind::Regex {
        pattern: pattern.to_string(),
        anti_pattern: None,
        seg_type: SmolStr::new(seg_type),
    })
}

pub fn nothing() -> Grammar {
    Grammar::of(GrammarKind::Nothing)
}

pub fn anything() -> Grammar {
    Grammar::of(GrammarKind::Anything)
}

/// Any single code token.
pub fn token() -> Grammar {
    Grammar::of(GrammarKind::Token)
}

pub fn missing() -> Grammar {
    Grammar::of(GrammarKind::Missing)
}

pub fn meta(kind: MetaKind) -> Grammar {
    Grammar::of(GrammarKind::Meta(kind))
}

pub fn indent() -> Grammar {
    meta(MetaKind::Indent)
}

pub fn dedent() -> Grammar {
    meta(MetaKind::Dedent)
}

pub fn implicit_indent() -> Grammar {
    meta(MetaKind::ImplicitIndent)
}

/// Emit `kind` only when indent config `key` equals `value`.
pub fn conditional(kind: MetaKind, key: &str, value: &str) -> Grammar {
    Grammar::of(GrammarKind::Conditional {
        meta: kind,
        key: SmolStr::new(key),
        value: SmolStr::new(value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_sets_options() {
        let g = any_set_of([kw("A"), kw("B")]).min_times(1).optional();
        assert!(g.opts.optional);
        assert_eq!(g.opts.min_times, 1);
        assert!(matches!(
            g.kind,
            GrammarKind::AnyNumberOf {
                max_times_per_element: Some(1),
                ..
            }
        ));
    }

    #[test]
    fn test_string_templates_are_upper_cased() {
        let g = kw("select");
        assert!(matches!(g.kind, GrammarKind::String { ref template, .. } if template == "SELECT"));
    }

    #[test]
    fn test_kind_specific_setters_ignore_other_kinds() {
        let g = seq([kw("A")]).max_times(3).min_delimiters(2);
        assert!(matches!(g.kind, GrammarKind::Sequence(_)));
        assert!(g.opts.allow_gaps);
    }
}
