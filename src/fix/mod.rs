//! Fix engine
//!
//! ## Pipeline
//!
//! ```text
//! Vec<LintFix> (one rule, one loop)
//!     ↓  compute_anchor_edit_info
//! IndexMap<Uuid, AnchorEditInfo>
//!     ↓  apply_fixes
//! fixed tree (validated at the root)
//!     ↓  generate_source_patches  (template-safety filter)
//! Vec<FixPatch>
//!     ↓  splice_patches
//! fixed source string
//! ```

mod anchor;
mod apply;
mod splice;

pub use anchor::{AnchorEditInfo, compute_anchor_edit_info};
pub use apply::{AppliedFixes, apply_fixes};
pub use splice::{fix_string, generate_source_patches, splice_patches};
