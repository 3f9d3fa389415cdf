//! Flat grammar tables
//!
//! A dialect's grammar is one contiguous block of arrays. Each grammar node
//! is a 20-byte [`GrammarInst`]; its children, terminators, parameters and
//! first-set hint live in side tables indexed from the instruction.
//!
//! | Table | Indexed by |
//! |---|---|
//! | `instructions` | [`GrammarId`] |
//! | `child_ids`, `terminators` | `first_*_idx .. + *_count` |
//! | `aux_data` | `aux_data_offsets[id] .. aux_data_offsets[id + 1]` |
//! | `simple_hint_indices` | [`GrammarId`], into `simple_hints` |
//! | `segment_type_offsets`, `segment_class_offsets` | [`GrammarId`], into `strings` |
//! | `casefold_offsets`, `trim_chars_*` | [`GrammarId`] |

use regex::Regex;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use crate::base::GrammarId;
use crate::segments::MetaKind;

/// Sentinel for an absent index in any `u32` side table.
pub const NONE: u32 = u32::MAX;

/// Grammar node kind
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GrammarVariant {
    Ref = 0,
    Sequence,
    OneOf,
    AnyNumberOf,
    Delimited,
    Bracketed,
    StringParser,
    TypedParser,
    MultiStringParser,
    RegexParser,
    Nothing,
    Anything,
    Meta,
    /// Any single code token
    Token,
    /// Never matches; placeholder for grammars a dialect leaves out
    Missing,
}

impl GrammarVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ref => "Ref",
            Self::Sequence => "Sequence",
            Self::OneOf => "OneOf",
            Self::AnyNumberOf => "AnyNumberOf",
            Self::Delimited => "Delimited",
            Self::Bracketed => "Bracketed",
            Self::StringParser => "StringParser",
            Self::TypedParser => "TypedParser",
            Self::MultiStringParser => "MultiStringParser",
            Self::RegexParser => "RegexParser",
            Self::Nothing => "Nothing",
            Self::Anything => "Anything",
            Self::Meta => "Meta",
            Self::Token => "Token",
            Self::Missing => "Missing",
        }
    }

    /// Fixed number of aux slots the variant reads.
    ///
    /// `MultiStringParser` additionally reads `count` string ids after its
    /// fixed part and a conditional `Meta` reads two more slots.
    pub fn aux_footprint(&self) -> usize {
        match self {
            Self::Ref | Self::AnyNumberOf | Self::Bracketed | Self::RegexParser => 3,
            Self::Delimited | Self::StringParser | Self::TypedParser | Self::MultiStringParser => 2,
            Self::OneOf | Self::Meta => 1,
            Self::Sequence | Self::Nothing | Self::Anything | Self::Token | Self::Missing => 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::StringParser | Self::TypedParser | Self::MultiStringParser | Self::RegexParser | Self::Token
        )
    }
}

/// How a grammar recovers when children fail to match
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ParseMode {
    /// Fail on any mismatch
    #[default]
    Strict = 0,
    /// Claim everything up to the next terminator, wrapping leftovers
    Greedy,
    /// Strict until the first element matches, then greedy
    GreedyOnceStarted,
}

/// Instruction flag bits
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GrammarFlags(u16);

impl GrammarFlags {
    pub const OPTIONAL: Self = Self(1 << 0);
    pub const RESET_TERMINATORS: Self = Self(1 << 1);
    pub const ALLOW_GAPS: Self = Self(1 << 2);
    pub const ALLOW_TRAILING: Self = Self(1 << 3);
    pub const OPTIONAL_DELIMITER: Self = Self(1 << 4);
    pub const HAS_SIMPLE_HINT: Self = Self(1 << 5);
    pub const HAS_EXCLUDE: Self = Self(1 << 6);
    pub const IS_CONDITIONAL: Self = Self(1 << 7);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn set(&mut self, other: Self, on: bool) {
        if on {
            self.0 |= other.0;
        } else {
            self.0 &= !other.0;
        }
    }
}

impl std::fmt::Debug for GrammarFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        const NAMES: [&str; 8] = [
            "optional",
            "reset_terminators",
            "allow_gaps",
            "allow_trailing",
            "optional_delimiter",
            "has_simple_hint",
            "has_exclude",
            "is_conditional",
        ];
        let set: Vec<_> = NAMES
            .iter()
            .enumerate()
            .filter(|(bit, _)| self.0 & (1 << bit) != 0)
            .map(|(_, n)| *n)
            .collect();
        write!(f, "GrammarFlags({})", set.join("|"))
    }
}

/// One grammar node.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrammarInst {
    pub variant: GrammarVariant,
    pub parse_mode: ParseMode,
    pub flags: GrammarFlags,
    pub first_child_idx: u32,
    pub child_count: u16,
    pub min_times: u16,
    pub first_terminator_idx: u32,
    pub terminator_count: u16,
    pub _padding: u16,
}

const _: () = assert!(std::mem::size_of::<GrammarInst>() == 20);

impl GrammarInst {
    pub const fn new(variant: GrammarVariant) -> Self {
        Self {
            variant,
            parse_mode: ParseMode::Strict,
            flags: GrammarFlags::empty(),
            first_child_idx: 0,
            child_count: 0,
            min_times: 0,
            first_terminator_idx: 0,
            terminator_count: 0,
            _padding: 0,
        }
    }

    /// Whether a sequence may skip this element. An `AnyNumberOf` that
    /// needs no repetitions is implicitly optional.
    pub fn is_optional(&self) -> bool {
        self.flags.contains(GrammarFlags::OPTIONAL) || (self.variant == GrammarVariant::AnyNumberOf && self.min_times == 0)
    }

    pub fn allow_gaps(&self) -> bool {
        self.flags.contains(GrammarFlags::ALLOW_GAPS)
    }
}

/// Span of a first-set hint in `hint_string_indices`.
///
/// Raw strings are stored upper-cased.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SimpleHint {
    pub raw_start: u32,
    pub raw_count: u32,
    pub type_start: u32,
    pub type_count: u32,
}

/// Case folding applied by a `TypedParser` before matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Casefold {
    #[default]
    None = 0,
    Upper,
    Lower,
}

impl Casefold {
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Upper,
            2 => Self::Lower,
            _ => Self::None,
        }
    }

    pub fn apply(self, raw: &str) -> String {
        match self {
            Self::None => raw.to_string(),
            Self::Upper => raw.to_uppercase(),
            Self::Lower => raw.to_lowercase(),
        }
    }
}

pub(crate) fn meta_kind_to_u32(kind: MetaKind) -> u32 {
    match kind {
        MetaKind::Indent => 0,
        MetaKind::Dedent => 1,
        MetaKind::ImplicitIndent => 2,
        MetaKind::EndOfFile => 3,
        MetaKind::Placeholder => 4,
    }
}

pub(crate) fn meta_kind_from_u32(v: u32) -> Option<MetaKind> {
    Some(match v {
        0 => MetaKind::Indent,
        1 => MetaKind::Dedent,
        2 => MetaKind::ImplicitIndent,
        3 => MetaKind::EndOfFile,
        4 => MetaKind::Placeholder,
        _ => return None,
    })
}

/// A bracket pair usable by `Bracketed` and by bracket-aware scanning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BracketPair {
    pub bracket_type: SmolStr,
    pub start: GrammarId,
    pub end: GrammarId,
    pub persists: bool,
}

/// All grammar tables of one dialect.
#[derive(Debug)]
pub struct GrammarTables {
    pub instructions: Vec<GrammarInst>,
    pub child_ids: Vec<u32>,
    pub terminators: Vec<u32>,
    pub strings: Vec<SmolStr>,
    pub aux_data: Vec<u32>,
    /// One more entry than `instructions`
    pub aux_data_offsets: Vec<u32>,
    pub regex_patterns: Vec<String>,
    pub simple_hints: Vec<SimpleHint>,
    pub hint_string_indices: Vec<u32>,
    pub simple_hint_indices: Vec<u32>,
    pub segment_type_offsets: Vec<u32>,
    pub segment_class_offsets: Vec<u32>,
    pub casefold_offsets: Vec<u8>,
    pub trim_chars_offsets: Vec<u32>,
    pub trim_chars_counts: Vec<u16>,
    pub trim_chars_data: Vec<u32>,
    pub bracket_pairs: Vec<BracketPair>,
    pub(crate) compiled_regexes: Vec<Regex>,
    pub(crate) names: FxHashMap<SmolStr, GrammarId>,
    pub(crate) root: GrammarId,
}

impl GrammarTables {
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn inst(&self, id: GrammarId) -> &GrammarInst {
        &self.instructions[id.index()]
    }

    pub fn root(&self) -> GrammarId {
        self.root
    }

    /// Grammar id of a named grammar or segment.
    pub fn lookup(&self, name: &str) -> Option<GrammarId> {
        self.names.get(name).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = (&str, GrammarId)> {
        self.names.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn children(&self, id: GrammarId) -> impl ExactSizeIterator<Item = GrammarId> + '_ {
        let inst = self.inst(id);
        let start = inst.first_child_idx as usize;
        self.child_ids[start..start + inst.child_count as usize]
            .iter()
            .map(|c| GrammarId(*c))
    }

    pub fn terminators(&self, id: GrammarId) -> impl ExactSizeIterator<Item = GrammarId> + '_ {
        let inst = self.inst(id);
        let start = inst.first_terminator_idx as usize;
        self.terminators[start..start + inst.terminator_count as usize]
            .iter()
            .map(|c| GrammarId(*c))
    }

    pub fn aux(&self, id: GrammarId) -> &[u32] {
        let start = self.aux_data_offsets[id.index()] as usize;
        let end = self.aux_data_offsets[id.index() + 1] as usize;
        &self.aux_data[start..end]
    }

    fn aux_at(&self, id: GrammarId, slot: usize) -> u32 {
        self.aux(id).get(slot).copied().unwrap_or(NONE)
    }

    pub fn string(&self, sid: u32) -> &str {
        self.strings.get(sid as usize).map_or("", SmolStr::as_str)
    }

    pub fn regex(&self, rid: u32) -> Option<&Regex> {
        self.compiled_regexes.get(rid as usize)
    }

    // =========================================================================
    // Per-variant aux decoding
    // =========================================================================

    /// Name a `Ref` was written with.
    pub fn ref_name(&self, id: GrammarId) -> &str {
        self.string(self.aux_at(id, 0))
    }

    pub fn ref_target(&self, id: GrammarId) -> Option<GrammarId> {
        GrammarId::from_raw(self.aux_at(id, 1))
    }

    /// Exclude grammar of a `Ref`, `OneOf` or `AnyNumberOf`.
    pub fn exclude(&self, id: GrammarId) -> Option<GrammarId> {
        let inst = self.inst(id);
        if !inst.flags.contains(GrammarFlags::HAS_EXCLUDE) {
            return None;
        }
        let slot = match inst.variant {
            GrammarVariant::Ref | GrammarVariant::AnyNumberOf => 2,
            GrammarVariant::OneOf => 0,
            _ => return None,
        };
        GrammarId::from_raw(self.aux_at(id, slot))
    }

    /// `(max_times, max_times_per_element)` of an `AnyNumberOf`.
    pub fn repeat_limits(&self, id: GrammarId) -> (Option<usize>, Option<usize>) {
        let decode = |v: u32| (v != NONE).then_some(v as usize);
        (decode(self.aux_at(id, 0)), decode(self.aux_at(id, 1)))
    }

    /// `(delimiter, min_delimiters)` of a `Delimited`.
    pub fn delimiter(&self, id: GrammarId) -> (Option<GrammarId>, usize) {
        (GrammarId::from_raw(self.aux_at(id, 0)), self.aux_at(id, 1) as usize)
    }

    /// `(start, end, persists)` of a `Bracketed`.
    pub fn brackets(&self, id: GrammarId) -> Option<(GrammarId, GrammarId, bool)> {
        Some((
            GrammarId::from_raw(self.aux_at(id, 0))?,
            GrammarId::from_raw(self.aux_at(id, 1))?,
            self.aux_at(id, 2) != 0,
        ))
    }

    /// Template and output type of a `StringParser` or `TypedParser`.
    pub fn template_and_type(&self, id: GrammarId) -> (&str, &str) {
        (self.string(self.aux_at(id, 0)), self.string(self.aux_at(id, 1)))
    }

    /// Output type and templates of a `MultiStringParser`.
    pub fn multi_strings(&self, id: GrammarId) -> (&str, impl Iterator<Item = &str>) {
        let aux = self.aux(id);
        let seg_type = self.string(aux.first().copied().unwrap_or(NONE));
        let count = aux.get(1).copied().unwrap_or(0) as usize;
        let strs = aux.iter().skip(2).take(count).map(|sid| self.string(*sid));
        (seg_type, strs)
    }

    /// `(regex, anti_regex, output type)` of a `RegexParser`.
    pub fn regex_parts(&self, id: GrammarId) -> (Option<&Regex>, Option<&Regex>, &str) {
        let anti = self.aux_at(id, 1);
        (
            self.regex(self.aux_at(id, 0)),
            if anti == NONE { None } else { self.regex(anti) },
            self.string(self.aux_at(id, 2)),
        )
    }

    pub fn meta_kind(&self, id: GrammarId) -> Option<MetaKind> {
        meta_kind_from_u32(self.aux_at(id, 0))
    }

    /// `(config key, expected value)` of a conditional `Meta`.
    pub fn condition(&self, id: GrammarId) -> Option<(&str, &str)> {
        if !self.inst(id).flags.contains(GrammarFlags::IS_CONDITIONAL) {
            return None;
        }
        Some((self.string(self.aux_at(id, 1)), self.string(self.aux_at(id, 2))))
    }

    pub fn casefold(&self, id: GrammarId) -> Casefold {
        Casefold::from_u8(self.casefold_offsets.get(id.index()).copied().unwrap_or(0))
    }

    pub fn trim_chars(&self, id: GrammarId) -> impl Iterator<Item = &str> {
        let start = self.trim_chars_offsets.get(id.index()).copied().unwrap_or(0) as usize;
        let count = self.trim_chars_counts.get(id.index()).copied().unwrap_or(0) as usize;
        self.trim_chars_data
            .get(start..start + count)
            .unwrap_or_default()
            .iter()
            .map(|sid| self.string(*sid))
    }

    // =========================================================================
    // Segment metadata
    // =========================================================================

    /// Node type a match of this instruction is wrapped in, if any.
    pub fn segment_type(&self, id: GrammarId) -> Option<&str> {
        let sid = *self.segment_type_offsets.get(id.index())?;
        (sid != NONE).then(|| self.string(sid))
    }

    /// Name of the segment class defined by this instruction, if any.
    pub fn segment_class(&self, id: GrammarId) -> Option<&str> {
        let sid = *self.segment_class_offsets.get(id.index())?;
        (sid != NONE).then(|| self.string(sid))
    }

    // =========================================================================
    // Simple hints
    // =========================================================================

    /// First-set of an instruction: upper-cased raws and token types.
    pub fn simple_hint(&self, id: GrammarId) -> Option<(Vec<&str>, Vec<&str>)> {
        if !self.inst(id).flags.contains(GrammarFlags::HAS_SIMPLE_HINT) {
            return None;
        }
        let hint = self.simple_hints.get(*self.simple_hint_indices.get(id.index())? as usize)?;
        let slice = |start: u32, count: u32| -> Vec<&str> {
            self.hint_string_indices
                .get(start as usize..(start + count) as usize)
                .unwrap_or_default()
                .iter()
                .map(|sid| self.string(*sid))
                .collect()
        };
        Some((slice(hint.raw_start, hint.raw_count), slice(hint.type_start, hint.type_count)))
    }

    /// Whether a token with `raw_upper` and `types` can begin `id`.
    ///
    /// Always true for instructions without a hint.
    pub fn hint_accepts(&self, id: GrammarId, raw_upper: &str, types: &[SmolStr]) -> bool {
        let Some((raws, hint_types)) = self.simple_hint(id) else {
            return true;
        };
        raws.iter().any(|r| *r == raw_upper) || hint_types.iter().any(|t| types.iter().any(|ct| ct == t))
    }

    /// Short human-readable description used in parse errors.
    pub fn describe(&self, id: GrammarId) -> String {
        let inst = self.inst(id);
        if let Some(class) = self.segment_class(id) {
            return class.to_string();
        }
        match inst.variant {
            GrammarVariant::Ref => self.ref_name(id).to_string(),
            GrammarVariant::StringParser => format!("'{}'", self.template_and_type(id).0),
            GrammarVariant::TypedParser => format!("<{}>", self.template_and_type(id).0),
            GrammarVariant::MultiStringParser => {
                let (_, strs) = self.multi_strings(id);
                let strs: Vec<_> = strs.map(|s| format!("'{s}'")).collect();
                strs.join(" or ")
            }
            GrammarVariant::RegexParser => {
                let (re, _, seg_type) = self.regex_parts(id);
                re.map_or_else(|| seg_type.to_string(), |r| format!("/{}/", r.as_str()))
            }
            other => other.as_str().to_string(),
        }
    }
}
