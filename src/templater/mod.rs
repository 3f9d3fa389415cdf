//! Templating layer
//!
//! Templaters turn source text into a [`TemplatedFile`]. The rest of the
//! pipeline only ever sees the `TemplatedFile`, never a templater: the
//! orchestrator is handed one through dependency injection.
//!
//! - [`RawTemplater`] - no templating; one literal slice
//! - [`PlaceholderTemplater`] - `{{ var }}`, `{# comment #}`, `{% if %}` and `{% for %}`

mod file;
mod placeholder;

pub use file::{RawFileSlice, RawSliceBlockInfo, SliceType, TemplatedFile, TemplatedFileSlice};
pub use placeholder::PlaceholderTemplater;

use crate::errors::TemplateError;

/// Renders source text into a [`TemplatedFile`].
pub trait Templater: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    fn process(&self, source: &str, fname: &str) -> Result<TemplatedFile, TemplateError>;
}

/// The identity templater.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawTemplater;

impl Templater for RawTemplater {
    fn name(&self) -> &'static str {
        "raw"
    }

    fn process(&self, source: &str, fname: &str) -> Result<TemplatedFile, TemplateError> {
        let mut file = TemplatedFile::from_string(source);
        file.fname = fname.to_string();
        Ok(file)
    }
}
