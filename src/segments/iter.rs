//! Lazy tree iterators

use super::Segment;

/// Leaves (tokens and metas) in document order.
pub struct RawSegments<'a> {
    stack: Vec<&'a Segment>,
}

impl<'a> RawSegments<'a> {
    pub fn new(root: &'a Segment) -> Self {
        Self { stack: vec![root] }
    }
}

impl<'a> Iterator for RawSegments<'a> {
    type Item = &'a Segment;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(seg) = self.stack.pop() {
            if seg.is_raw() {
                return Some(seg);
            }
            self.stack.extend(seg.segments().iter().rev());
        }
        None
    }
}

/// Pre-order descendants matching any of a set of types.
///
/// With `recurse_into = false` the crawl does not descend into a segment it
/// has just yielded.
pub struct RecursiveCrawl<'a> {
    stack: Vec<&'a Segment>,
    types: &'a [&'a str],
    recurse_into: bool,
}

impl<'a> RecursiveCrawl<'a> {
    pub fn new(root: &'a Segment, types: &'a [&'a str], recurse_into: bool) -> Self {
        Self {
            stack: vec![root],
            types,
            recurse_into,
        }
    }
}

impl<'a> Iterator for RecursiveCrawl<'a> {
    type Item = &'a Segment;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(seg) = self.stack.pop() {
            let matched = seg.is_any_type(self.types);
            if !matched || self.recurse_into {
                self.stack.extend(seg.segments().iter().rev());
            }
            if matched {
                return Some(seg);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segments::TokenFlags;

    fn tree() -> Segment {
        let inner = Segment::node(
            "expression",
            None,
            vec![Segment::code("a", "column_reference"), Segment::code("+", "binary_operator")],
        );
        let outer = Segment::node("expression", None, vec![inner, Segment::code("1", "numeric_literal")]);
        Segment::file(vec![
            Segment::keyword("SELECT"),
            Segment::token(" ", "whitespace", TokenFlags::WHITESPACE, None),
            outer,
        ])
    }

    #[test]
    fn test_raw_segments_in_order() {
        let root = tree();
        let raws: Vec<_> = RawSegments::new(&root).map(|s| s.raw().to_string()).collect();
        assert_eq!(raws, vec!["SELECT", " ", "a", "+", "1"]);
    }

    #[test]
    fn test_recursive_crawl_finds_nested() {
        let root = tree();
        assert_eq!(root.recursive_crawl(&["expression"], true).count(), 2);
        assert_eq!(root.recursive_crawl(&["expression"], false).count(), 1);
        let kinds: Vec<_> = root
            .recursive_crawl(&["keyword", "numeric_literal"], true)
            .map(|s| s.seg_type().to_string())
            .collect();
        assert_eq!(kinds, vec!["keyword", "numeric_literal"]);
    }
}
