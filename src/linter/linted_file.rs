//! Per-file lint results

use std::time::Duration;

use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::errors::UnfixableWarning;
use crate::fix;
use crate::rules::LintViolation;
use crate::segments::Segment;
use crate::templater::TemplatedFile;

/// Stage durations in seconds, in the order the stages ran.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TimeDict(IndexMap<SmolStr, f64>);

impl TimeDict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, stage: &'static str, elapsed: Duration) {
        *self.0.entry(SmolStr::new_static(stage)).or_default() += elapsed.as_secs_f64();
    }

    pub fn get(&self, stage: &str) -> Option<f64> {
        self.0.get(stage).copied()
    }

    pub fn stages(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(SmolStr::as_str)
    }

    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }
}

/// Everything produced by linting one file.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct LintedFile {
    pub path: String,
    /// Sorted by position
    pub violations: Vec<LintViolation>,
    /// Fixed source, when linting in fix mode
    pub fixed_source: Option<String>,
    pub time_dict: TimeDict,
    /// Final tree; the fixed tree in fix mode
    #[cfg_attr(feature = "serde", serde(skip))]
    pub tree: Option<Segment>,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub templated_file: TemplatedFile,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub warnings: Vec<UnfixableWarning>,
}

impl LintedFile {
    pub fn num_violations(&self) -> usize {
        self.violations.len()
    }

    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    /// Violation counts per code, in order of first appearance.
    pub fn violations_by_code(&self) -> IndexMap<SmolStr, usize> {
        let mut counts: IndexMap<SmolStr, usize> = IndexMap::new();
        for violation in &self.violations {
            *counts.entry(violation.code.clone()).or_default() += 1;
        }
        counts
    }

    /// Source produced from the final tree, and whether it differs from the
    /// original source.
    pub fn fix_string(&self) -> (String, bool) {
        match &self.tree {
            Some(tree) => fix::fix_string(tree, &self.templated_file),
            None => (self.templated_file.source_str.clone(), false),
        }
    }

    /// Serialize the violations as JSON.
    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
