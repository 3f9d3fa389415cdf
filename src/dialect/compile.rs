//! Grammar compilation
//!
//! Lowers named [`Grammar`] definitions into flat [`GrammarTables`]:
//! 1. every named definition gets its instruction slot up front
//! 2. definitions are compiled into their slots, anonymous sub-grammars are
//!    appended as they are met
//! 3. `Ref`s are resolved by name
//! 4. first-set hints are computed
//! 5. the finished tables are checked with [`validate`](super::validate)

use indexmap::IndexMap;
use regex::Regex;
use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;

use super::grammar::{Grammar, GrammarKind};
use super::tables::{
    BracketPair, Casefold, GrammarFlags, GrammarInst, GrammarTables, GrammarVariant, NONE, SimpleHint,
    meta_kind_to_u32,
};
use super::validate::validate;
use crate::base::GrammarId;
use crate::errors::GrammarError;

/// Deduplicating string pool for the `strings` table.
#[derive(Debug, Default)]
struct StringPool {
    ids: FxHashMap<SmolStr, u32>,
    strings: Vec<SmolStr>,
}

impl StringPool {
    fn intern(&mut self, s: &str) -> u32 {
        if let Some(id) = self.ids.get(s) {
            return *id;
        }
        let id = self.strings.len() as u32;
        self.strings.push(SmolStr::new(s));
        self.ids.insert(SmolStr::new(s), id);
        id
    }
}

#[derive(Debug, Clone)]
struct Definition {
    grammar: Grammar,
    seg_type: Option<SmolStr>,
}

#[derive(Debug, Clone)]
struct BracketDef {
    bracket_type: SmolStr,
    start: SmolStr,
    end: SmolStr,
    persists: bool,
}

/// Collects a dialect's named grammars and compiles them to tables.
#[derive(Debug, Clone)]
pub struct GrammarBuilder {
    root: SmolStr,
    definitions: IndexMap<SmolStr, Definition>,
    brackets: Vec<BracketDef>,
    duplicate: Option<SmolStr>,
}

impl GrammarBuilder {
    pub fn new(root: &str) -> Self {
        Self {
            root: SmolStr::new(root),
            definitions: IndexMap::new(),
            brackets: Vec::new(),
            duplicate: None,
        }
    }

    fn define(&mut self, name: &str, grammar: Grammar, seg_type: Option<&str>) -> &mut Self {
        let name = SmolStr::new(name);
        if self.definitions.contains_key(&name) && self.duplicate.is_none() {
            self.duplicate = Some(name.clone());
        }
        self.definitions.insert(
            name,
            Definition {
                grammar,
                seg_type: seg_type.map(SmolStr::new),
            },
        );
        self
    }

    /// A named grammar. Matches are not wrapped in a node.
    pub fn add(&mut self, name: &str, grammar: Grammar) -> &mut Self {
        self.define(name, grammar, None)
    }

    /// A segment: matches are wrapped in a node of `seg_type`.
    pub fn add_segment(&mut self, name: &str, seg_type: &str, grammar: Grammar) -> &mut Self {
        self.define(name, grammar, Some(seg_type))
    }

    /// Swap the body of an existing definition, keeping its node type.
    pub fn replace(&mut self, name: &str, grammar: Grammar) -> Result<&mut Self, GrammarError> {
        let def = self
            .definitions
            .get_mut(name)
            .ok_or_else(|| GrammarError::UnknownReference(SmolStr::new(name)))?;
        def.grammar = grammar;
        Ok(self)
    }

    /// Declare a bracket pair, referring to two named grammars.
    pub fn bracket_pair(&mut self, bracket_type: &str, start: &str, end: &str, persists: bool) -> &mut Self {
        self.brackets.push(BracketDef {
            bracket_type: SmolStr::new(bracket_type),
            start: SmolStr::new(start),
            end: SmolStr::new(end),
            persists,
        });
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    pub fn compile(&self) -> Result<GrammarTables, GrammarError> {
        if let Some(name) = &self.duplicate {
            return Err(GrammarError::DuplicateDefinition(name.clone()));
        }
        let mut compiler = Compiler::new(self);
        let mut names = FxHashMap::default();
        for name in self.definitions.keys() {
            let slot = compiler.alloc();
            names.insert(name.clone(), GrammarId(slot));
        }
        for (idx, (name, def)) in self.definitions.iter().enumerate() {
            let slot = idx as u32;
            compiler.compile_into(slot, &def.grammar)?;
            if let Some(seg_type) = &def.seg_type {
                compiler.segment_type[slot as usize] = compiler.pool.intern(seg_type);
                compiler.segment_class[slot as usize] = compiler.pool.intern(name);
            }
        }
        let bracket_pairs = compiler.compile_bracket_pairs()?;
        compiler.resolve_refs(&names)?;
        let root = *names
            .get(&self.root)
            .ok_or_else(|| GrammarError::MissingRoot(self.root.clone()))?;
        let tables = compiler.finish(names, root, bracket_pairs)?;
        validate(&tables)?;
        tracing::debug!(
            instructions = tables.instructions.len(),
            strings = tables.strings.len(),
            hints = tables.simple_hints.len(),
            "compiled grammar tables"
        );
        Ok(tables)
    }
}

#[derive(Debug, Clone, Default)]
struct HintSets {
    raws: FxHashSet<SmolStr>,
    types: FxHashSet<SmolStr>,
}

impl HintSets {
    fn union(&mut self, other: &HintSets) {
        self.raws.extend(other.raws.iter().cloned());
        self.types.extend(other.types.iter().cloned());
    }
}

#[derive(Clone)]
enum HintState {
    Unvisited,
    InProgress,
    Done(Option<HintSets>),
}

struct Compiler<'b> {
    builder: &'b GrammarBuilder,
    insts: Vec<GrammarInst>,
    aux: Vec<Vec<u32>>,
    child_ids: Vec<u32>,
    terminators: Vec<u32>,
    pool: StringPool,
    regex_patterns: Vec<String>,
    regex_ids: FxHashMap<String, u32>,
    segment_type: Vec<u32>,
    segment_class: Vec<u32>,
    casefold: Vec<u8>,
    trim_offsets: Vec<u32>,
    trim_counts: Vec<u16>,
    trim_data: Vec<u32>,
    pending_refs: Vec<(u32, SmolStr)>,
}

impl<'b> Compiler<'b> {
    fn new(builder: &'b GrammarBuilder) -> Self {
        Self {
            builder,
            insts: Vec::new(),
            aux: Vec::new(),
            child_ids: Vec::new(),
            terminators: Vec::new(),
            pool: StringPool::default(),
            regex_patterns: Vec::new(),
            regex_ids: FxHashMap::default(),
            segment_type: Vec::new(),
            segment_class: Vec::new(),
            casefold: Vec::new(),
            trim_offsets: Vec::new(),
            trim_counts: Vec::new(),
            trim_data: Vec::new(),
            pending_refs: Vec::new(),
        }
    }

    fn alloc(&mut self) -> u32 {
        let slot = self.insts.len() as u32;
        self.insts.push(GrammarInst::new(GrammarVariant::Missing));
        self.aux.push(Vec::new());
        self.segment_type.push(NONE);
        self.segment_class.push(NONE);
        self.casefold.push(Casefold::None as u8);
        self.trim_offsets.push(0);
        self.trim_counts.push(0);
        slot
    }

    fn compile(&mut self, grammar: &Grammar) -> Result<u32, GrammarError> {
        let slot = self.alloc();
        self.compile_into(slot, grammar)?;
        Ok(slot)
    }

    fn compile_all(&mut self, grammars: &[Grammar]) -> Result<Vec<u32>, GrammarError> {
        grammars.iter().map(|g| self.compile(g)).collect()
    }

    fn regex_id(&mut self, pattern: &str) -> u32 {
        if let Some(id) = self.regex_ids.get(pattern) {
            return *id;
        }
        let id = self.regex_patterns.len() as u32;
        self.regex_patterns.push(pattern.to_string());
        self.regex_ids.insert(pattern.to_string(), id);
        id
    }

    fn compile_into(&mut self, slot: u32, grammar: &Grammar) -> Result<(), GrammarError> {
        let opts = &grammar.opts;
        let mut inst = GrammarInst::new(GrammarVariant::Missing);
        inst.parse_mode = opts.parse_mode;
        inst.min_times = opts.min_times;
        inst.flags.set(GrammarFlags::OPTIONAL, opts.optional);
        inst.flags.set(GrammarFlags::RESET_TERMINATORS, opts.reset_terminators);
        inst.flags.set(GrammarFlags::ALLOW_GAPS, opts.allow_gaps);
        inst.flags.set(GrammarFlags::ALLOW_TRAILING, opts.allow_trailing);
        inst.flags.set(GrammarFlags::OPTIONAL_DELIMITER, opts.optional_delimiter);

        let terminator_ids = self.compile_all(&opts.terminators)?;
        let exclude = match &opts.exclude {
            Some(g) => {
                inst.flags.insert(GrammarFlags::HAS_EXCLUDE);
                self.compile(g)?
            }
            None => NONE,
        };

        let mut aux: Vec<u32> = Vec::new();
        let mut children: Vec<u32> = Vec::new();
        match &grammar.kind {
            GrammarKind::Ref(name) => {
                inst.variant = GrammarVariant::Ref;
                aux.extend([self.pool.intern(name), NONE, exclude]);
                self.pending_refs.push((slot, name.clone()));
            }
            GrammarKind::Sequence(items) => {
                inst.variant = GrammarVariant::Sequence;
                children = self.compile_all(items)?;
            }
            GrammarKind::OneOf(items) => {
                inst.variant = GrammarVariant::OneOf;
                children = self.compile_all(items)?;
                aux.push(exclude);
            }
            GrammarKind::AnyNumberOf {
                children: items,
                max_times,
                max_times_per_element,
            } => {
                inst.variant = GrammarVariant::AnyNumberOf;
                children = self.compile_all(items)?;
                aux.extend([max_times.unwrap_or(NONE), max_times_per_element.unwrap_or(NONE), exclude]);
            }
            GrammarKind::Delimited {
                children: items,
                delimiter,
                min_delimiters,
            } => {
                inst.variant = GrammarVariant::Delimited;
                children = self.compile_all(items)?;
                let delimiter = self.compile(delimiter)?;
                aux.extend([delimiter, *min_delimiters]);
            }
            GrammarKind::Bracketed {
                children: items,
                bracket_type,
                persists,
            } => {
                inst.variant = GrammarVariant::Bracketed;
                let pair = self
                    .builder
                    .brackets
                    .iter()
                    .find(|b| b.bracket_type == *bracket_type)
                    .cloned()
                    .ok_or_else(|| GrammarError::UnknownReference(bracket_type.clone()))?;
                children = self.compile_all(items)?;
                let start = self.compile(&super::grammar::r(&pair.start))?;
                let end = self.compile(&super::grammar::r(&pair.end))?;
                aux.extend([start, end, u32::from(persists.unwrap_or(pair.persists))]);
            }
            GrammarKind::String { template, seg_type } => {
                inst.variant = GrammarVariant::StringParser;
                aux.extend([self.pool.intern(template), self.pool.intern(seg_type)]);
            }
            GrammarKind::MultiString { templates, seg_type } => {
                inst.variant = GrammarVariant::MultiStringParser;
                aux.extend([self.pool.intern(seg_type), templates.len() as u32]);
                for t in templates {
                    aux.push(self.pool.intern(t));
                }
            }
            GrammarKind::Typed {
                template,
                seg_type,
                casefold,
                trim_chars,
            } => {
                inst.variant = GrammarVariant::TypedParser;
                aux.extend([self.pool.intern(template), self.pool.intern(seg_type)]);
                self.casefold[slot as usize] = *casefold as u8;
                self.trim_offsets[slot as usize] = self.trim_data.len() as u32;
                self.trim_counts[slot as usize] =
                    u16::try_from(trim_chars.len()).map_err(|_| GrammarError::Overflow("trim chars"))?;
                for c in trim_chars {
                    let sid = self.pool.intern(c);
                    self.trim_data.push(sid);
                }
            }
            GrammarKind::Regex {
                pattern,
                anti_pattern,
                seg_type,
            } => {
                inst.variant = GrammarVariant::RegexParser;
                let rid = self.regex_id(pattern);
                let anti = anti_pattern.as_deref().map_or(NONE, |p| self.regex_id(p));
                aux.extend([rid, anti, self.pool.intern(seg_type)]);
            }
            GrammarKind::Nothing => inst.variant = GrammarVariant::Nothing,
            GrammarKind::Anything => inst.variant = GrammarVariant::Anything,
            GrammarKind::Token => inst.variant = GrammarVariant::Token,
            GrammarKind::Missing => inst.variant = GrammarVariant::Missing,
            GrammarKind::Meta(kind) => {
                inst.variant = GrammarVariant::Meta;
                aux.push(meta_kind_to_u32(*kind));
            }
            GrammarKind::Conditional { meta, key, value } => {
                inst.variant = GrammarVariant::Meta;
                inst.flags.insert(GrammarFlags::IS_CONDITIONAL);
                aux.extend([meta_kind_to_u32(*meta), self.pool.intern(key), self.pool.intern(value)]);
            }
        }

        inst.first_child_idx = self.child_ids.len() as u32;
        inst.child_count = u16::try_from(children.len()).map_err(|_| GrammarError::Overflow("children"))?;
        self.child_ids.extend(children);
        inst.first_terminator_idx = self.terminators.len() as u32;
        inst.terminator_count =
            u16::try_from(terminator_ids.len()).map_err(|_| GrammarError::Overflow("terminators"))?;
        self.terminators.extend(terminator_ids);

        self.insts[slot as usize] = inst;
        self.aux[slot as usize] = aux;
        Ok(())
    }

    fn compile_bracket_pairs(&mut self) -> Result<Vec<BracketPair>, GrammarError> {
        let defs = self.builder.brackets.clone();
        defs.iter()
            .map(|b| {
                Ok(BracketPair {
                    bracket_type: b.bracket_type.clone(),
                    start: GrammarId(self.compile(&super::grammar::r(&b.start))?),
                    end: GrammarId(self.compile(&super::grammar::r(&b.end))?),
                    persists: b.persists,
                })
            })
            .collect()
    }

    fn resolve_refs(&mut self, names: &FxHashMap<SmolStr, GrammarId>) -> Result<(), GrammarError> {
        for (slot, name) in std::mem::take(&mut self.pending_refs) {
            let target = names
                .get(&name)
                .ok_or_else(|| GrammarError::UnknownReference(name.clone()))?;
            if target.0 == slot {
                return Err(GrammarError::SelfReference(name));
            }
            self.aux[slot as usize][1] = target.0;
        }
        Ok(())
    }

    /// First-set of `slot`, `None` when any token might begin it.
    fn hint(&self, slot: u32, states: &mut Vec<HintState>) -> Option<HintSets> {
        match &states[slot as usize] {
            HintState::Done(h) => return h.clone(),
            // Left recursion: stay conservative
            HintState::InProgress => return None,
            HintState::Unvisited => {}
        }
        states[slot as usize] = HintState::InProgress;
        let inst = self.insts[slot as usize];
        let aux = &self.aux[slot as usize];
        let start = inst.first_child_idx as usize;
        let children = &self.child_ids[start..start + inst.child_count as usize];
        let sid = |i: usize| aux.get(i).map(|s| self.pool.strings[*s as usize].clone());

        let result = match inst.variant {
            GrammarVariant::Ref => aux.get(1).and_then(|t| self.hint(*t, states)),
            GrammarVariant::Sequence => {
                let mut sets = HintSets::default();
                let mut ok = true;
                for child in children {
                    let child_inst = self.insts[*child as usize];
                    if child_inst.variant == GrammarVariant::Meta {
                        continue;
                    }
                    match self.hint(*child, states) {
                        Some(h) => sets.union(&h),
                        None => {
                            ok = false;
                            break;
                        }
                    }
                    if !child_inst.is_optional() {
                        break;
                    }
                }
                ok.then_some(sets)
            }
            GrammarVariant::OneOf | GrammarVariant::AnyNumberOf | GrammarVariant::Delimited => {
                let mut sets = HintSets::default();
                let mut ok = true;
                for child in children {
                    match self.hint(*child, states) {
                        Some(h) => sets.union(&h),
                        None => ok = false,
                    }
                }
                ok.then_some(sets)
            }
            GrammarVariant::Bracketed => aux.first().and_then(|s| self.hint(*s, states)),
            GrammarVariant::StringParser => sid(0).map(|raw| HintSets {
                raws: FxHashSet::from_iter([raw]),
                types: FxHashSet::default(),
            }),
            GrammarVariant::MultiStringParser => {
                let count = aux.get(1).copied().unwrap_or(0) as usize;
                Some(HintSets {
                    raws: (2..2 + count).filter_map(sid).collect(),
                    types: FxHashSet::default(),
                })
            }
            GrammarVariant::TypedParser => sid(0).map(|t| HintSets {
                raws: FxHashSet::default(),
                types: FxHashSet::from_iter([t]),
            }),
            GrammarVariant::Nothing | GrammarVariant::Missing => Some(HintSets::default()),
            GrammarVariant::RegexParser | GrammarVariant::Anything | GrammarVariant::Token | GrammarVariant::Meta => {
                None
            }
        };
        states[slot as usize] = HintState::Done(result.clone());
        result
    }

    fn finish(
        mut self,
        names: FxHashMap<SmolStr, GrammarId>,
        root: GrammarId,
        bracket_pairs: Vec<BracketPair>,
    ) -> Result<GrammarTables, GrammarError> {
        let n = self.insts.len();
        let mut states = vec![HintState::Unvisited; n];
        let hints: Vec<Option<HintSets>> = (0..n as u32).map(|slot| self.hint(slot, &mut states)).collect();

        let mut simple_hints = Vec::new();
        let mut hint_string_indices = Vec::new();
        let mut simple_hint_indices = vec![NONE; n];
        for (slot, hint) in hints.iter().enumerate() {
            let Some(hint) = hint else { continue };
            let mut raws: Vec<_> = hint.raws.iter().collect();
            raws.sort();
            let mut types: Vec<_> = hint.types.iter().collect();
            types.sort();
            let raw_start = hint_string_indices.len() as u32;
            for raw in &raws {
                let sid = self.pool.intern(raw);
                hint_string_indices.push(sid);
            }
            let type_start = hint_string_indices.len() as u32;
            for t in &types {
                let sid = self.pool.intern(t);
                hint_string_indices.push(sid);
            }
            simple_hint_indices[slot] = simple_hints.len() as u32;
            simple_hints.push(SimpleHint {
                raw_start,
                raw_count: raws.len() as u32,
                type_start,
                type_count: types.len() as u32,
            });
            self.insts[slot].flags.insert(GrammarFlags::HAS_SIMPLE_HINT);
        }

        let mut aux_data = Vec::new();
        let mut aux_data_offsets = Vec::with_capacity(n + 1);
        for aux in &self.aux {
            aux_data_offsets.push(aux_data.len() as u32);
            aux_data.extend_from_slice(aux);
        }
        aux_data_offsets.push(aux_data.len() as u32);

        let compiled_regexes = self
            .regex_patterns
            .iter()
            .map(|p| {
                Regex::new(&format!("(?i)^(?:{p})$")).map_err(|e| GrammarError::Regex {
                    pattern: p.clone(),
                    message: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(GrammarTables {
            instructions: self.insts,
            child_ids: self.child_ids,
            terminators: self.terminators,
            strings: self.pool.strings,
            aux_data,
            aux_data_offsets,
            regex_patterns: self.regex_patterns,
            simple_hints,
            hint_string_indices,
            simple_hint_indices,
            segment_type_offsets: self.segment_type,
            segment_class_offsets: self.segment_class,
            casefold_offsets: self.casefold,
            trim_chars_offsets: self.trim_offsets,
            trim_chars_counts: self.trim_counts,
            trim_chars_data: self.trim_data,
            bracket_pairs,
            compiled_regexes,
            names,
            root,
        })
    }
}
