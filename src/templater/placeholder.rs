//! Logos-based placeholder templater
//!
//! Understands a small, Jinja-shaped subset:
//!
//! ```text
//! {{ name }}                 expression, replaced from the context map
//! {# anything #}             comment, renders nothing
//! {% if name %} {% endif %}  rendered when `name` is truthy (`if not name` inverts)
//! {% for v in a, b %}        body rendered once per item, `{{ v }}` bound inside
//! {% endfor %}
//! ```
//!
//! Unknown expression names render as the name itself so that the output
//! still parses.

use logos::Logos;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use super::Templater;
use super::file::{RawFileSlice, SliceType, TemplatedFile, TemplatedFileSlice};
use crate::base::range;
use crate::errors::TemplateError;

/// Template markup tokens
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
enum MarkupToken {
    #[regex(r"\{\{([^}]|\}[^}])*\}\}")]
    Expression,
    #[regex(r"\{%([^%]|%[^}])*%\}")]
    Statement,
    #[regex(r"\{#([^#]|#[^}])*#\}")]
    Comment,
    #[regex(r"[^{]+")]
    Text,
    #[token("{")]
    Brace,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Tag {
    If { name: SmolStr, negate: bool },
    EndIf,
    For { var: SmolStr, items: Vec<String> },
    EndFor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Literal,
    Expression(SmolStr),
    Comment,
    Tag(Tag),
}

/// Block structure over raw slice indices
#[derive(Debug)]
enum Node {
    Literal(usize),
    Expression(usize, SmolStr),
    Comment(usize),
    If {
        start: usize,
        name: SmolStr,
        negate: bool,
        body: Vec<Node>,
        end: usize,
    },
    For {
        start: usize,
        var: SmolStr,
        items: Vec<String>,
        body: Vec<Node>,
        end: usize,
    },
}

/// Templater for `{{ }}`, `{% %}` and `{# #}` markup.
#[derive(Debug, Clone, Default)]
pub struct PlaceholderTemplater {
    context: FxHashMap<SmolStr, String>,
}

impl PlaceholderTemplater {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a context variable.
    pub fn with_var(mut self, name: impl Into<SmolStr>, value: impl Into<String>) -> Self {
        self.context.insert(name.into(), value.into());
        self
    }

    fn slice_source(source: &str) -> Result<(Vec<RawFileSlice>, Vec<Piece>), TemplateError> {
        let mut raw: Vec<RawFileSlice> = Vec::new();
        let mut pieces: Vec<Piece> = Vec::new();
        let mut block_idx = 0usize;
        let mut lexer = MarkupToken::lexer(source);

        while let Some(token) = lexer.next() {
            let text = lexer.slice();
            let offset = lexer.span().start;
            match token {
                Ok(MarkupToken::Text | MarkupToken::Brace) | Err(()) => {
                    if let (Some(Piece::Literal), Some(last)) = (pieces.last(), raw.last_mut()) {
                        last.source_str.push_str(text);
                        continue;
                    }
                    raw.push(RawFileSlice::new(text, SliceType::Literal, offset).with_block(block_idx, None));
                    pieces.push(Piece::Literal);
                }
                Ok(MarkupToken::Expression) => {
                    let name = parse_name(inner(text, 2), offset)?;
                    raw.push(RawFileSlice::new(text, SliceType::Templated, offset).with_block(block_idx, None));
                    pieces.push(Piece::Expression(name));
                }
                Ok(MarkupToken::Comment) => {
                    raw.push(RawFileSlice::new(text, SliceType::Comment, offset).with_block(block_idx, None));
                    pieces.push(Piece::Comment);
                }
                Ok(MarkupToken::Statement) => {
                    let tag = parse_tag(inner(text, 2), offset)?;
                    let keyword = tag_keyword(&tag);
                    match tag {
                        Tag::If { .. } | Tag::For { .. } => {
                            raw.push(
                                RawFileSlice::new(text, SliceType::BlockStart, offset)
                                    .with_block(block_idx, Some(keyword)),
                            );
                            block_idx += 1;
                        }
                        Tag::EndIf | Tag::EndFor => {
                            block_idx += 1;
                            raw.push(
                                RawFileSlice::new(text, SliceType::BlockEnd, offset)
                                    .with_block(block_idx, Some(keyword)),
                            );
                        }
                    }
                    pieces.push(Piece::Tag(tag));
                }
            }
        }
        Ok((raw, pieces))
    }

    fn build_tree(raw: &[RawFileSlice], pieces: Vec<Piece>) -> Result<Vec<Node>, TemplateError> {
        // Each open frame: (start index, opening tag, body so far)
        let mut stack: Vec<(usize, Tag, Vec<Node>)> = Vec::new();
        let mut root: Vec<Node> = Vec::new();

        for (idx, piece) in pieces.into_iter().enumerate() {
            let node = match piece {
                Piece::Literal => Node::Literal(idx),
                Piece::Expression(name) => Node::Expression(idx, name),
                Piece::Comment => Node::Comment(idx),
                Piece::Tag(tag @ (Tag::If { .. } | Tag::For { .. })) => {
                    stack.push((idx, tag, Vec::new()));
                    continue;
                }
                Piece::Tag(end_tag) => {
                    let unexpected = || TemplateError::UnexpectedEnd {
                        tag: SmolStr::new(tag_keyword(&end_tag)),
                        offset: raw[idx].source_idx,
                    };
                    let Some((start, open, body)) = stack.pop() else {
                        return Err(unexpected());
                    };
                    match (open, &end_tag) {
                        (Tag::If { name, negate }, Tag::EndIf) => Node::If {
                            start,
                            name,
                            negate,
                            body,
                            end: idx,
                        },
                        (Tag::For { var, items }, Tag::EndFor) => Node::For {
                            start,
                            var,
                            items,
                            body,
                            end: idx,
                        },
                        _ => return Err(unexpected()),
                    }
                }
            };
            match stack.last_mut() {
                Some((_, _, body)) => body.push(node),
                None => root.push(node),
            }
        }

        if let Some((start, open, _)) = stack.pop() {
            return Err(TemplateError::UnclosedBlock {
                tag: SmolStr::new(tag_keyword(&open)),
                offset: raw[start].source_idx,
            });
        }
        Ok(root)
    }
}

impl Templater for PlaceholderTemplater {
    fn name(&self) -> &'static str {
        "placeholder"
    }

    fn process(&self, source: &str, fname: &str) -> Result<TemplatedFile, TemplateError> {
        let (raw, pieces) = Self::slice_source(source)?;
        let tree = Self::build_tree(&raw, pieces)?;
        let mut renderer = Renderer {
            raw: &raw,
            context: &self.context,
            scopes: Vec::new(),
            out: String::with_capacity(source.len()),
            slices: Vec::new(),
        };
        renderer.render(&tree);
        tracing::debug!(
            fname,
            raw_slices = raw.len(),
            templated_slices = renderer.slices.len(),
            "rendered template"
        );
        let Renderer { out, slices, .. } = renderer;
        TemplatedFile::new(source, out, fname, slices, raw)
    }
}

struct Renderer<'a> {
    raw: &'a [RawFileSlice],
    context: &'a FxHashMap<SmolStr, String>,
    scopes: Vec<(SmolStr, String)>,
    out: String,
    slices: Vec<TemplatedFileSlice>,
}

impl Renderer<'_> {
    fn emit(&mut self, idx: usize, text: &str) {
        let slice = &self.raw[idx];
        let start = self.out.len();
        self.out.push_str(text);
        self.slices.push(TemplatedFileSlice::new(
            slice.slice_type,
            slice.source_slice(),
            range(start, self.out.len()),
        ));
    }

    fn lookup(&self, name: &str) -> Option<String> {
        self.scopes
            .iter()
            .rev()
            .find(|(var, _)| var == name)
            .map(|(_, value)| value.clone())
            .or_else(|| self.context.get(name).cloned())
    }

    fn render(&mut self, nodes: &[Node]) {
        for node in nodes {
            match node {
                Node::Literal(idx) => {
                    let text = self.raw[*idx].source_str.clone();
                    self.emit(*idx, &text);
                }
                Node::Expression(idx, name) => {
                    let value = self.lookup(name).unwrap_or_else(|| name.to_string());
                    self.emit(*idx, &value);
                }
                Node::Comment(idx) => self.emit(*idx, ""),
                Node::If {
                    start,
                    name,
                    negate,
                    body,
                    end,
                } => {
                    self.emit(*start, "");
                    let truthy = self.lookup(name).is_some_and(|v| is_truthy(&v));
                    if truthy != *negate {
                        self.render(body);
                    }
                    self.emit(*end, "");
                }
                Node::For {
                    start,
                    var,
                    items,
                    body,
                    end,
                } => {
                    self.emit(*start, "");
                    let items = self.expand_items(items);
                    for item in items {
                        self.scopes.push((var.clone(), item));
                        self.render(body);
                        self.scopes.pop();
                    }
                    self.emit(*end, "");
                }
            }
        }
    }

    /// A single bare name refers to a comma separated context value.
    fn expand_items(&self, items: &[String]) -> Vec<String> {
        if let [single] = items {
            if let Some(value) = self.lookup(single) {
                return split_items(&value);
            }
        }
        items.to_vec()
    }
}

fn tag_keyword(tag: &Tag) -> &'static str {
    match tag {
        Tag::If { .. } => "if",
        Tag::EndIf => "endif",
        Tag::For { .. } => "for",
        Tag::EndFor => "endfor",
    }
}

/// Strip the `{{`/`}}` style delimiters and any whitespace-control dashes.
fn inner(text: &str, delim: usize) -> &str {
    let body = &text[delim..text.len() - delim];
    body.trim().trim_start_matches('-').trim_end_matches('-').trim()
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first == '_' || unicode_ident::is_xid_start(first) => chars.all(unicode_ident::is_xid_continue),
        _ => false,
    }
}

fn parse_name(text: &str, offset: usize) -> Result<SmolStr, TemplateError> {
    if !text.is_empty() && text.split('.').all(is_identifier) {
        Ok(SmolStr::new(text))
    } else {
        Err(TemplateError::InvalidName {
            name: SmolStr::new(text),
            offset,
        })
    }
}

fn parse_tag(text: &str, offset: usize) -> Result<Tag, TemplateError> {
    let mut words = text.split_whitespace();
    let keyword = words.next().unwrap_or_default();
    let unsupported = || TemplateError::UnsupportedTag {
        tag: SmolStr::new(keyword),
        offset,
    };
    match keyword {
        "if" => {
            let rest: Vec<&str> = words.collect();
            match rest.as_slice() {
                ["not", name] => Ok(Tag::If {
                    name: parse_name(name, offset)?,
                    negate: true,
                }),
                [name] => Ok(Tag::If {
                    name: parse_name(name, offset)?,
                    negate: false,
                }),
                _ => Err(unsupported()),
            }
        }
        "endif" => Ok(Tag::EndIf),
        "for" => {
            let var = words.next().ok_or_else(unsupported)?;
            if words.next() != Some("in") {
                return Err(unsupported());
            }
            let rest = words.collect::<Vec<_>>().join(" ");
            Ok(Tag::For {
                var: parse_name(var, offset)?,
                items: split_items(&rest),
            })
        }
        "endfor" => Ok(Tag::EndFor),
        _ => Err(unsupported()),
    }
}

fn split_items(text: &str) -> Vec<String> {
    text.trim_matches(|c: char| c == '[' || c == ']' || c == '(' || c == ')')
        .split(',')
        .map(|item| item.trim().trim_matches(|c: char| c == '\'' || c == '"').to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn is_truthy(value: &str) -> bool {
    !matches!(value.trim(), "" | "0" | "false" | "False" | "none" | "None")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::range;

    #[test]
    fn test_expression_substitution() {
        let t = PlaceholderTemplater::new().with_var("col", "a");
        let tf = t.process("SELECT {{ col }} ,b", "t.sql").unwrap();
        assert_eq!(tf.templated_str, "SELECT a ,b");
        let types: Vec<_> = tf.sliced_file().iter().map(|s| s.slice_type).collect();
        assert_eq!(types, vec![SliceType::Literal, SliceType::Templated, SliceType::Literal]);
        assert_eq!(tf.sliced_file()[1].source_slice, range(7, 16));
        assert_eq!(tf.sliced_file()[1].templated_slice, range(7, 8));
    }

    #[test]
    fn test_unknown_variable_renders_name() {
        let tf = PlaceholderTemplater::new().process("SELECT {{ tbl }}", "t.sql").unwrap();
        assert_eq!(tf.templated_str, "SELECT tbl");
    }

    #[test]
    fn test_comment_renders_nothing() {
        let tf = PlaceholderTemplater::new()
            .process("SELECT 1 {# note #}\n", "t.sql")
            .unwrap();
        assert_eq!(tf.templated_str, "SELECT 1 \n");
        assert_eq!(tf.source_only_slices().len(), 1);
        assert_eq!(tf.source_only_slices()[0].slice_type, SliceType::Comment);
    }

    #[test]
    fn test_if_block() {
        let t = PlaceholderTemplater::new().with_var("flag", "true");
        let tf = t.process("SELECT 1{% if flag %}, 2{% endif %}", "t.sql").unwrap();
        assert_eq!(tf.templated_str, "SELECT 1, 2");
        let tf = t.process("SELECT 1{% if not flag %}, 2{% endif %}", "t.sql").unwrap();
        assert_eq!(tf.templated_str, "SELECT 1");
    }

    #[test]
    fn test_for_loop_repeats_body() {
        let tf = PlaceholderTemplater::new()
            .process("SELECT {% for c in a, b %}{{ c }}, {% endfor %}1", "t.sql")
            .unwrap();
        assert_eq!(tf.templated_str, "SELECT a, b, 1");
        let info = tf.raw_slice_block_info();
        assert!(info.literal_only_loops.is_empty());
    }

    #[test]
    fn test_literal_only_loop_is_flagged() {
        let tf = PlaceholderTemplater::new()
            .process("SELECT {% for c in x, y %}1, {% endfor %}2", "t.sql")
            .unwrap();
        assert_eq!(tf.templated_str, "SELECT 1, 1, 2");
        let body = tf.raw_sliced().iter().find(|s| s.source_str == "1, ").unwrap();
        assert!(tf.raw_slice_block_info().literal_only_loops.contains(&body.block_idx));
    }

    #[test]
    fn test_unclosed_block_is_an_error() {
        let err = PlaceholderTemplater::new()
            .process("SELECT {% if x %} 1", "t.sql")
            .unwrap_err();
        assert!(matches!(err, TemplateError::UnclosedBlock { .. }));
    }

    #[test]
    fn test_stray_end_tag_is_an_error() {
        let err = PlaceholderTemplater::new().process("SELECT 1 {% endfor %}", "t.sql").unwrap_err();
        assert!(matches!(err, TemplateError::UnexpectedEnd { .. }));
    }

    #[test]
    fn test_lone_brace_is_literal() {
        let tf = PlaceholderTemplater::new().process("SELECT '{' AS x", "t.sql").unwrap();
        assert_eq!(tf.templated_str, "SELECT '{' AS x");
        assert_eq!(tf.raw_sliced().len(), 1);
    }
}
