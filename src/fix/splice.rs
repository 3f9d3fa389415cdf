//! Source-level patch filtering and splicing
//!
//! The fixed tree is compared with the templated text to get patches in
//! templated space. Each patch is mapped back to the source and kept only
//! when it cannot disturb template code; the survivors are spliced into the
//! original source string.

use rustc_hash::FxHashSet;

use crate::base::{TextRange, bounds, range, text_at};
use crate::segments::{FixPatch, PatchCategory, Segment};
use crate::templater::{SliceType, TemplatedFile};

fn slice_str(text: &str, slice: TextRange) -> String {
    text_at(text, slice).unwrap_or_default().to_string()
}

/// Why a patch is kept, or the reason it must be dropped.
fn classify(patch: &mut FixPatch, templated_file: &TemplatedFile) -> Result<&'static str, &'static str> {
    let local_raw_slices = templated_file.raw_slices_spanning_source_slice(patch.source_slice);
    let types: FxHashSet<SliceType> = local_raw_slices.iter().map(|s| s.slice_type).collect();
    let (start, stop) = bounds(patch.source_slice);

    if local_raw_slices.is_empty() || types.iter().all(SliceType::is_literal) {
        return Ok("literal");
    }
    if patch.patch_category == PatchCategory::Source {
        return Ok("source fix");
    }
    if start == stop && local_raw_slices.first().is_some_and(|s| s.source_idx == start) {
        return Ok("insertion at slice boundary");
    }
    if !types.contains(&SliceType::Literal) {
        return Err("patch over templated section");
    }
    if local_raw_slices.len() > 2 {
        return Err("patch spans too many slices");
    }
    if patch.templated_str.is_empty() {
        return Err("insertion cannot be placed");
    }
    let occurrences: Vec<usize> = patch
        .source_str
        .match_indices(patch.templated_str.as_str())
        .map(|(idx, _)| idx)
        .collect();
    match occurrences.as_slice() {
        [] => Err("templated text not found in source"),
        [offset] => {
            let new_start = start + offset;
            patch.source_slice = range(new_start, new_start + patch.templated_str.len());
            patch.source_str = patch.templated_str.clone();
            Ok("relocated")
        }
        _ => Err("templated text is ambiguous in source"),
    }
}

/// Source patches for `tree` that are safe to apply, sorted by source start.
pub fn generate_source_patches(tree: &Segment, templated_file: &TemplatedFile) -> Vec<FixPatch> {
    let mut seen: FxHashSet<(TextRange, String)> = FxHashSet::default();
    let mut patches: Vec<FixPatch> = Vec::new();

    for mut patch in tree.iter_patches(templated_file) {
        if patch.patch_category != PatchCategory::Source {
            match templated_file.templated_slice_to_source_slice(patch.templated_slice) {
                Ok(source_slice) => {
                    patch.source_slice = source_slice;
                    patch.templated_str = slice_str(&templated_file.templated_str, patch.templated_slice);
                    patch.source_str = slice_str(&templated_file.source_str, source_slice);
                }
                Err(e) => {
                    tracing::info!(
                        category = patch.patch_category.as_str(),
                        templated_slice = ?patch.templated_slice,
                        error = %e,
                        "dropping patch that cannot be mapped to source"
                    );
                    continue;
                }
            }
        }
        let key = (patch.source_slice, patch.fixed_raw.clone());
        if seen.contains(&key) {
            continue;
        }

        match classify(&mut patch, templated_file) {
            Ok(reason) => {
                tracing::trace!(reason, source_slice = ?patch.source_slice, "keeping patch");
                seen.insert(key);
                patches.push(patch);
            }
            Err(reason) => {
                tracing::info!(
                    reason,
                    category = patch.patch_category.as_str(),
                    source_slice = ?patch.source_slice,
                    "dropping patch"
                );
            }
        }
    }

    patches.sort_by_key(|p| bounds(p.source_slice).0);
    patches
}

/// Splice sorted `patches` into the source of `templated_file`.
///
/// Source-only slices between patches are passed through verbatim. A patch
/// overlapping an earlier one is skipped.
pub fn splice_patches(templated_file: &TemplatedFile, patches: &[FixPatch]) -> String {
    let source = templated_file.source_str.as_str();
    let source_only = templated_file.source_only_slices();
    let mut out = String::with_capacity(source.len());
    let mut source_idx = 0usize;

    for patch in patches {
        let (start, stop) = bounds(patch.source_slice);
        if start < source_idx {
            tracing::info!(source_slice = ?patch.source_slice, "skipping overlapping patch");
            continue;
        }
        let from = source_idx;
        for slice in source_only.iter().filter(|s| s.source_idx >= from && s.end_source_idx() <= start) {
            out.push_str(source.get(source_idx..slice.source_idx).unwrap_or_default());
            out.push_str(&slice.source_str);
            source_idx = slice.end_source_idx();
        }
        out.push_str(source.get(source_idx..start).unwrap_or_default());
        out.push_str(&patch.fixed_raw);
        source_idx = stop;
    }
    out.push_str(source.get(source_idx..).unwrap_or_default());
    out
}

/// Fixed source for `tree`, and whether it differs from the original.
pub fn fix_string(tree: &Segment, templated_file: &TemplatedFile) -> (String, bool) {
    let patches = generate_source_patches(tree, templated_file);
    if patches.is_empty() {
        return (templated_file.source_str.clone(), false);
    }
    let fixed = splice_patches(templated_file, &patches);
    let changed = fixed != templated_file.source_str;
    tracing::debug!(patches = patches.len(), changed, "spliced source patches");
    (fixed, changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templater::{PlaceholderTemplater, RawFileSlice, Templater, TemplatedFileSlice};

    fn patch(category: PatchCategory, source: TextRange, templated: TextRange, fixed: &str) -> FixPatch {
        FixPatch {
            templated_slice: templated,
            fixed_raw: fixed.to_string(),
            patch_category: category,
            source_slice: source,
            templated_str: String::new(),
            source_str: String::new(),
        }
    }

    /// `SELECT {{ col }} ,b` rendered with `col = a`.
    fn templated_select() -> TemplatedFile {
        let source = "SELECT {{ col }} ,b";
        let templated = "SELECT a ,b";
        TemplatedFile::new(
            source,
            templated,
            "test.sql",
            vec![
                TemplatedFileSlice::new(SliceType::Literal, range(0, 7), range(0, 7)),
                TemplatedFileSlice::new(SliceType::Templated, range(7, 16), range(7, 8)),
                TemplatedFileSlice::new(SliceType::Literal, range(16, 19), range(8, 11)),
            ],
            vec![
                RawFileSlice::new("SELECT ", SliceType::Literal, 0),
                RawFileSlice::new("{{ col }}", SliceType::Templated, 7),
                RawFileSlice::new(" ,b", SliceType::Literal, 16),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_literal_patch_kept() {
        let tf = templated_select();
        let mut p = patch(PatchCategory::MidPoint, range(16, 17), range(8, 9), "");
        assert_eq!(classify(&mut p, &tf), Ok("literal"));
        assert_eq!(splice_patches(&tf, &[p]), "SELECT {{ col }},b");
    }

    #[test]
    fn test_templated_patch_dropped() {
        let tf = templated_select();
        let mut p = patch(PatchCategory::Literal, range(7, 16), range(7, 8), "b");
        assert_eq!(classify(&mut p, &tf), Err("patch over templated section"));
    }

    #[test]
    fn test_mixed_patch_relocated() {
        let tf = templated_select();
        let mut p = patch(PatchCategory::Literal, range(7, 19), range(7, 11), "a, b");
        p.templated_str = "a ,b".to_string();
        p.source_str = "{{ col }} ,b".to_string();
        // The templated text doesn't occur in the source.
        assert_eq!(classify(&mut p, &tf), Err("templated text not found in source"));

        let mut p = patch(PatchCategory::Literal, range(7, 19), range(8, 11), ", b");
        p.templated_str = " ,b".to_string();
        p.source_str = "{{ col }} ,b".to_string();
        assert_eq!(classify(&mut p, &tf), Ok("relocated"));
        assert_eq!(p.source_slice, range(16, 19));
    }

    #[test]
    fn test_source_only_slices_pass_through() {
        let tf = PlaceholderTemplater::new()
            .process("SELECT 1 {# note #} ,2", "test.sql")
            .unwrap();
        let comma = tf.source_str.find(" ,").unwrap();
        let p = patch(PatchCategory::Literal, range(comma, comma + 1), range(0, 0), "");
        assert_eq!(splice_patches(&tf, &[p]), "SELECT 1 {# note #},2");
    }

    #[test]
    fn test_overlapping_patch_skipped() {
        let tf = TemplatedFile::from_string("abcdef");
        let patches = [
            patch(PatchCategory::Literal, range(1, 3), range(1, 3), "X"),
            patch(PatchCategory::Literal, range(2, 4), range(2, 4), "Y"),
        ];
        assert_eq!(splice_patches(&tf, &patches), "aXdef");
    }
}
