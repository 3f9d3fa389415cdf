//! Load-time integrity check for grammar tables
//!
//! Every index stored in a table must land inside the table it points to.
//! The parser indexes without bounds checks on the hot path, so tables that
//! fail here are rejected before they are ever used.

use super::tables::{GrammarFlags, GrammarTables, GrammarVariant, NONE};
use crate::base::GrammarId;
use crate::errors::GrammarError;

pub fn validate(tables: &GrammarTables) -> Result<(), GrammarError> {
    let n = tables.instructions.len();
    let n_strings = tables.strings.len();
    if tables.aux_data_offsets.len() != n + 1 {
        return Err(GrammarError::SliceOutOfRange {
            inst: n as u32,
            what: "aux offsets",
        });
    }
    for (what, len) in [
        ("simple hint index", tables.simple_hint_indices.len()),
        ("segment type", tables.segment_type_offsets.len()),
        ("segment class", tables.segment_class_offsets.len()),
        ("casefold", tables.casefold_offsets.len()),
        ("trim chars offsets", tables.trim_chars_offsets.len()),
        ("trim chars counts", tables.trim_chars_counts.len()),
    ] {
        if len != n {
            return Err(GrammarError::SliceOutOfRange { inst: len as u32, what });
        }
    }
    if tables.root.index() >= n {
        return Err(GrammarError::MissingRoot(tables.root.to_string().into()));
    }

    for (idx, inst) in tables.instructions.iter().enumerate() {
        let id = idx as u32;
        let check_inst = |target: u32| -> Result<(), GrammarError> {
            if target as usize >= n {
                return Err(GrammarError::ChildOutOfRange { inst: id, child: target });
            }
            Ok(())
        };
        let check_string = |sid: u32| -> Result<(), GrammarError> {
            if sid as usize >= n_strings {
                return Err(GrammarError::StringOutOfRange { inst: id, id: sid });
            }
            Ok(())
        };

        let child_end = inst.first_child_idx as usize + inst.child_count as usize;
        let children = tables
            .child_ids
            .get(inst.first_child_idx as usize..child_end)
            .ok_or(GrammarError::SliceOutOfRange { inst: id, what: "child" })?;
        for child in children {
            check_inst(*child)?;
        }

        let term_end = inst.first_terminator_idx as usize + inst.terminator_count as usize;
        let terminators = tables
            .terminators
            .get(inst.first_terminator_idx as usize..term_end)
            .ok_or(GrammarError::SliceOutOfRange {
                inst: id,
                what: "terminator",
            })?;
        for t in terminators {
            if *t as usize >= n {
                return Err(GrammarError::TerminatorOutOfRange {
                    inst: id,
                    terminator: *t,
                });
            }
        }

        let offset = tables.aux_data_offsets[idx] as usize;
        let end = tables.aux_data_offsets[idx + 1] as usize;
        let mut footprint = inst.variant.aux_footprint();
        if inst.flags.contains(GrammarFlags::IS_CONDITIONAL) {
            footprint += 2;
        }
        if inst.variant == GrammarVariant::MultiStringParser {
            let count = tables.aux_data.get(offset + 1).copied().unwrap_or(0) as usize;
            footprint += count;
        }
        if end < offset || offset + footprint > end || end > tables.aux_data.len() {
            return Err(GrammarError::AuxOutOfRange {
                inst: id,
                offset,
                end: offset + footprint,
                len: tables.aux_data.len(),
            });
        }
        let aux = &tables.aux_data[offset..end];
        let optional_inst = |target: u32| if target == NONE { Ok(()) } else { check_inst(target) };

        match inst.variant {
            GrammarVariant::Ref => {
                check_string(aux[0])?;
                if aux[1] == NONE {
                    return Err(GrammarError::UnknownReference(tables.string(aux[0]).into()));
                }
                check_inst(aux[1])?;
                optional_inst(aux[2])?;
            }
            GrammarVariant::OneOf => optional_inst(aux[0])?,
            GrammarVariant::AnyNumberOf => optional_inst(aux[2])?,
            GrammarVariant::Delimited => check_inst(aux[0])?,
            GrammarVariant::Bracketed => {
                check_inst(aux[0])?;
                check_inst(aux[1])?;
            }
            GrammarVariant::StringParser | GrammarVariant::TypedParser => {
                check_string(aux[0])?;
                check_string(aux[1])?;
            }
            GrammarVariant::MultiStringParser => {
                check_string(aux[0])?;
                for sid in &aux[2..footprint] {
                    check_string(*sid)?;
                }
            }
            GrammarVariant::RegexParser => {
                for rid in [aux[0], aux[1]] {
                    if rid != NONE && tables.regex(rid).is_none() {
                        return Err(GrammarError::RegexOutOfRange { inst: id, id: rid });
                    }
                }
                if aux[0] == NONE {
                    return Err(GrammarError::RegexOutOfRange { inst: id, id: NONE });
                }
                check_string(aux[2])?;
            }
            GrammarVariant::Meta => {
                if tables.meta_kind(GrammarId(id)).is_none() {
                    return Err(GrammarError::AuxOutOfRange {
                        inst: id,
                        offset,
                        end,
                        len: tables.aux_data.len(),
                    });
                }
                if inst.flags.contains(GrammarFlags::IS_CONDITIONAL) {
                    check_string(aux[1])?;
                    check_string(aux[2])?;
                }
            }
            GrammarVariant::Sequence
            | GrammarVariant::Nothing
            | GrammarVariant::Anything
            | GrammarVariant::Token
            | GrammarVariant::Missing => {}
        }

        if inst.flags.contains(GrammarFlags::HAS_SIMPLE_HINT) {
            let hint_idx = tables.simple_hint_indices[idx];
            let hint = tables.simple_hints.get(hint_idx as usize).ok_or(GrammarError::SliceOutOfRange {
                inst: id,
                what: "simple hint",
            })?;
            for (start, count) in [(hint.raw_start, hint.raw_count), (hint.type_start, hint.type_count)] {
                let sids = tables
                    .hint_string_indices
                    .get(start as usize..(start + count) as usize)
                    .ok_or(GrammarError::SliceOutOfRange {
                        inst: id,
                        what: "hint strings",
                    })?;
                for sid in sids {
                    check_string(*sid)?;
                }
            }
        }

        for sid in [tables.segment_type_offsets[idx], tables.segment_class_offsets[idx]] {
            if sid != NONE {
                check_string(sid)?;
            }
        }

        let trim_start = tables.trim_chars_offsets[idx] as usize;
        let trim_end = trim_start + tables.trim_chars_counts[idx] as usize;
        let trims = tables
            .trim_chars_data
            .get(trim_start..trim_end)
            .ok_or(GrammarError::SliceOutOfRange {
                inst: id,
                what: "trim chars",
            })?;
        for sid in trims {
            check_string(*sid)?;
        }
    }

    for pair in &tables.bracket_pairs {
        for g in [pair.start, pair.end] {
            if g.index() >= n {
                return Err(GrammarError::ChildOutOfRange {
                    inst: g.0,
                    child: g.0,
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::GrammarBuilder;
    use crate::dialect::grammar::*;

    fn tables() -> GrammarTables {
        let mut b = GrammarBuilder::new("Root");
        b.add("CommaSegment", string(",", "comma"))
            .add("Root", delimited([kw("A"), multi_string(&["B", "C"], "keyword")]));
        b.compile().unwrap()
    }

    #[test]
    fn test_compiled_tables_validate() {
        assert_eq!(validate(&tables()), Ok(()));
    }

    #[test]
    fn test_child_out_of_range_is_caught() {
        let mut t = tables();
        t.child_ids[0] = 999;
        assert!(matches!(validate(&t), Err(GrammarError::ChildOutOfRange { child: 999, .. })));
    }

    #[test]
    fn test_truncated_aux_is_caught() {
        let mut t = tables();
        let last = t.aux_data.len();
        t.aux_data.truncate(last - 1);
        assert!(matches!(validate(&t), Err(GrammarError::AuxOutOfRange { .. })));
    }

    #[test]
    fn test_bad_string_id_is_caught() {
        let mut t = tables();
        let string_inst = t
            .instructions
            .iter()
            .position(|i| i.variant == GrammarVariant::StringParser)
            .unwrap();
        let off = t.aux_data_offsets[string_inst] as usize;
        t.aux_data[off] = 10_000;
        assert!(matches!(validate(&t), Err(GrammarError::StringOutOfRange { id: 10_000, .. })));
    }
}
