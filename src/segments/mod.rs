//! Parse tree
//!
//! - [`Segment`] - immutable, reference-counted tree node with a stable `uuid`
//! - [`position_segments`] - re-layout of children after edits
//! - [`RawSegments`], [`RecursiveCrawl`] - lazy traversal
//! - [`PatchIter`] - lazy diff of a tree against its templated text

mod iter;
mod layout;
mod patches;
mod segment;

pub use iter::{RawSegments, RecursiveCrawl};
pub use layout::position_segments;
pub use patches::{FixPatch, PatchCategory, PatchIter};
pub use segment::{MetaKind, Segment, SourceFix, TokenFlags};
pub(crate) use segment::SegmentKind;
