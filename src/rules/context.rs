//! What a rule sees when it evaluates one segment

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::dialect::Dialect;
use crate::segments::Segment;
use crate::templater::TemplatedFile;

/// Opaque per-rule state threaded between evaluations of the same rule.
#[derive(Clone, Default)]
pub struct Memory(Option<Arc<dyn Any + Send + Sync>>);

impl Memory {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Some(Arc::new(value)))
    }

    pub fn get<T: Any>(&self) -> Option<&T> {
        self.0.as_deref()?.downcast_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }
}

impl fmt::Debug for Memory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            f.write_str("Memory(empty)")
        } else {
            f.write_str("Memory(..)")
        }
    }
}

/// Context for one rule evaluation.
///
/// Segments have no parent pointers, so everything positional (ancestors,
/// siblings, preceding leaves) is supplied here by the crawler.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    pub segment: &'a Segment,
    /// Ancestors, root first
    pub parent_stack: &'a [Segment],
    pub siblings_pre: &'a [Segment],
    pub siblings_post: &'a [Segment],
    /// Every leaf before `segment` in document order
    pub raw_stack: &'a [Segment],
    pub memory: &'a Memory,
    pub dialect: &'a Dialect,
    pub templated_file: &'a TemplatedFile,
}

impl RuleContext<'_> {
    pub fn parent(&self) -> Option<&Segment> {
        self.parent_stack.last()
    }

    /// Last non-meta leaf before the current segment.
    pub fn previous_raw(&self) -> Option<&Segment> {
        self.raw_stack.iter().rev().find(|s| !s.is_meta())
    }

    /// First non-meta sibling after the current segment.
    pub fn next_sibling(&self) -> Option<&Segment> {
        self.siblings_post.iter().find(|s| !s.is_meta())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Seen(u32);

    #[test]
    fn test_memory_downcast() {
        let memory = Memory::new(Seen(3));
        assert_eq!(memory.get::<Seen>(), Some(&Seen(3)));
        assert_eq!(memory.get::<String>(), None);
        assert!(Memory::default().is_empty());
        assert!(Memory::default().get::<Seen>().is_none());
    }
}
