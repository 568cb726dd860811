//! Semantic layer: resolves the untyped [`crate::parser::ParsedGame`] produced
//! by the textual grammar into a fully name-checked, immutable [`Game`] with
//! concrete [`VarId`]s and [`Formula`] trees. Everything downstream (solver
//! back-ends, experiment enumeration, strategy selection) only ever sees
//! this resolved form.
//!
//! Grounded on `cobra::Game`'s construction pass: a single top-to-bottom
//! walk of the declaration that assigns variable ids densely in
//! declaration order, resolves every formula's names against what has been
//! declared so far, and rejects anything dangling as a [`SemanticError`].

pub mod wellformed;

use std::collections::{HashMap, HashSet};

use log::{info, warn};

use crate::error::{GameError, SemanticError};
use crate::formula::tseitin::MappingResolver;
use crate::formula::{CharId, CountKind, Formula, FormulaRef, MapId, VarId};
use crate::parser::{self, ParsedExperiment, RawCountKind, RawFormula};

/// A named lookup table from alphabet characters to concrete variables
/// (spec §3, "Mapping").
#[derive(Debug, Clone)]
pub struct Mapping {
    pub name: String,
    pub table: Vec<VarId>,
}

/// One of an experiment type's mutually-exclusive named responses.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub name: String,
    pub formula: FormulaRef,
    pub is_final: bool,
}

/// A declared experiment template: its arity, outcome formulas, and the
/// parameter-tuple admissibility relations (spec §3, "ExperimentType").
#[derive(Debug, Clone)]
pub struct ExperimentType {
    pub name: String,
    pub arity: usize,
    pub outcomes: Vec<Outcome>,
    /// Each group lists positions required pairwise distinct.
    pub params_distinct: Vec<Vec<usize>>,
    /// Flattened chain constraints `P[l] < P[r]`.
    pub params_sorted: Vec<(usize, usize)>,
    /// Index into `outcomes` of the declared "final" outcome, if any
    /// (Open Question 1: a final outcome costs one fewer experiment in
    /// the optimal analyzer, spec §4.7/§9).
    pub final_outcome: Option<usize>,
}

/// A fully resolved, immutable game declaration.
pub struct Game {
    pub var_names: Vec<String>,
    var_by_name: HashMap<String, VarId>,
    pub restriction: FormulaRef,
    pub alphabet: Vec<String>,
    pub mappings: Vec<Mapping>,
    mapping_by_name: HashMap<String, MapId>,
    pub experiments: Vec<ExperimentType>,
}

impl Game {
    /// Parses and semantically resolves `src` into a [`Game`].
    pub fn load(src: &str) -> Result<Self, GameError> {
        let parsed = parser::parse_game(src)?;

        let mut var_names = Vec::with_capacity(parsed.variables.len());
        let mut var_by_name = HashMap::with_capacity(parsed.variables.len());
        for name in &parsed.variables {
            if var_by_name.contains_key(name) {
                return Err(SemanticError::DuplicateVariable(name.clone()).into());
            }
            let id = (var_names.len() + 1) as VarId;
            var_by_name.insert(name.clone(), id);
            var_names.push(name.clone());
        }

        let restriction = resolve_formula(&parsed.restriction, &var_by_name, None)?;

        if parsed.alphabets.len() > 1 {
            return Err(SemanticError::AlphabetRedefined.into());
        }
        let alphabet = parsed.alphabets.first().cloned().unwrap_or_default();

        let mut mappings = Vec::with_capacity(parsed.mappings.len());
        let mut mapping_by_name = HashMap::with_capacity(parsed.mappings.len());
        for (name, targets) in &parsed.mappings {
            if mapping_by_name.contains_key(name) {
                return Err(SemanticError::DuplicateMapping(name.clone()).into());
            }
            if targets.len() != alphabet.len() {
                return Err(SemanticError::MappingLengthMismatch {
                    name: name.clone(),
                    expected: alphabet.len(),
                    found: targets.len(),
                }
                .into());
            }
            let table = targets
                .iter()
                .map(|t| {
                    var_by_name
                        .get(t)
                        .copied()
                        .ok_or_else(|| SemanticError::UndefinedVariable(t.clone()))
                })
                .collect::<Result<Vec<_>, _>>()?;
            let map_id = mappings.len();
            mapping_by_name.insert(name.clone(), map_id);
            mappings.push(Mapping { name: name.clone(), table });
        }

        let mut experiments = Vec::with_capacity(parsed.experiments.len());
        let mut experiment_names = HashSet::with_capacity(parsed.experiments.len());
        for parsed_exp in &parsed.experiments {
            if !experiment_names.insert(parsed_exp.name.clone()) {
                return Err(SemanticError::DuplicateExperiment(parsed_exp.name.clone()).into());
            }
            experiments.push(resolve_experiment(parsed_exp, &var_by_name, &mapping_by_name)?);
        }

        let game = Game {
            var_names,
            var_by_name,
            restriction,
            alphabet,
            mappings,
            mapping_by_name,
            experiments,
        };

        info!(
            "loaded game: {} variables, {} alphabet symbols, {} experiment type(s)",
            game.var_names.len(),
            game.alphabet.len(),
            game.experiments.len(),
        );
        game.warn_dead_mappings();

        Ok(game)
    }

    pub fn variable_id(&self, name: &str) -> Option<VarId> {
        self.var_by_name.get(name).copied()
    }

    pub fn mapping_id(&self, name: &str) -> Option<MapId> {
        self.mapping_by_name.get(name).copied()
    }

    pub fn mapping_value(&self, map_id: MapId, char_id: CharId) -> VarId {
        self.mappings[map_id].table[char_id]
    }

    /// Renders a parameter tuple as alphabet characters joined by `,`,
    /// reinstated from `cobra::Game::ParamsToStr` (spec §5 item).
    pub fn params_to_str(&self, params: &[CharId]) -> String {
        params.iter().map(|&c| self.alphabet[c].as_str()).collect::<Vec<_>>().join(",")
    }

    fn warn_dead_mappings(&self) {
        let mut directly_referenced = HashSet::new();
        collect_variable_refs(&self.restriction, &mut directly_referenced);
        for exp in &self.experiments {
            for outcome in &exp.outcomes {
                collect_variable_refs(&outcome.formula, &mut directly_referenced);
            }
        }

        let mut slot_count: HashMap<VarId, usize> = HashMap::new();
        for mapping in &self.mappings {
            for &var in &mapping.table {
                *slot_count.entry(var).or_insert(0) += 1;
            }
        }

        for mapping in &self.mappings {
            for (char_id, &var) in mapping.table.iter().enumerate() {
                let only_this_slot = slot_count.get(&var).copied().unwrap_or(0) == 1;
                if only_this_slot && !directly_referenced.contains(&var) {
                    warn!(
                        "dead mapping entry: mapping '{}' character '{}' resolves to variable '{}', which is never referenced elsewhere",
                        mapping.name,
                        self.alphabet.get(char_id).map(String::as_str).unwrap_or("?"),
                        self.var_names.get((var - 1) as usize).map(String::as_str).unwrap_or("?"),
                    );
                }
            }
        }
    }
}

impl MappingResolver for Game {
    fn resolve(&self, map_id: MapId, char_id: CharId) -> VarId {
        self.mapping_value(map_id, char_id)
    }
}

fn collect_variable_refs(formula: &FormulaRef, out: &mut HashSet<VarId>) {
    match formula.as_ref() {
        Formula::Variable(id) => {
            out.insert(id.abs());
        }
        Formula::Mapping { .. } => {}
        _ => {
            for child in formula.children() {
                collect_variable_refs(child, out);
            }
        }
    }
}

fn resolve_experiment(
    parsed: &ParsedExperiment,
    var_by_name: &HashMap<String, VarId>,
    mapping_by_name: &HashMap<String, MapId>,
) -> Result<ExperimentType, SemanticError> {
    let arity = parsed.arity;

    let mut params_distinct = Vec::with_capacity(parsed.params_distinct.len());
    for group in &parsed.params_distinct {
        for &pos in group {
            if pos >= arity {
                return Err(SemanticError::MalformedParamsDistinct { index: pos, arity });
            }
        }
        params_distinct.push(group.clone());
    }

    let mut params_sorted = Vec::new();
    for chain in &parsed.params_sorted {
        for &pos in chain {
            if pos >= arity {
                return Err(SemanticError::MalformedParamsSorted { left: pos, right: pos, arity });
            }
        }
        for pair in chain.windows(2) {
            let (l, r) = (pair[0], pair[1]);
            if l == r {
                return Err(SemanticError::MalformedParamsSorted { left: l, right: r, arity });
            }
            params_sorted.push((l, r));
        }
    }

    let mut outcomes = Vec::with_capacity(parsed.outcomes.len());
    let mut final_outcome = None;
    for (idx, parsed_outcome) in parsed.outcomes.iter().enumerate() {
        let formula = resolve_formula(&parsed_outcome.formula, var_by_name, Some((mapping_by_name, arity)))?;
        if parsed_outcome.is_final && final_outcome.is_none() {
            final_outcome = Some(idx);
        }
        outcomes.push(Outcome {
            name: parsed_outcome.name.clone(),
            formula,
            is_final: parsed_outcome.is_final,
        });
    }

    Ok(ExperimentType {
        name: parsed.name.clone(),
        arity,
        outcomes,
        params_distinct,
        params_sorted,
        final_outcome,
    })
}

/// Converts an untyped [`RawFormula`] into a real [`FormulaRef`], binding
/// variable/mapping names to ids. `mapping_ctx` is `None` for the
/// restriction (which has no parameter tuple) and `Some((mapping_by_name,
/// arity))` for an experiment outcome formula.
fn resolve_formula(
    raw: &RawFormula,
    var_by_name: &HashMap<String, VarId>,
    mapping_ctx: Option<(&HashMap<String, MapId>, usize)>,
) -> Result<FormulaRef, SemanticError> {
    match raw {
        RawFormula::Var(name) => {
            let id = var_by_name
                .get(name)
                .copied()
                .ok_or_else(|| SemanticError::UndefinedVariable(name.clone()))?;
            Ok(Formula::var(id))
        }
        RawFormula::Param(name, pos) => {
            let (mapping_by_name, arity) =
                mapping_ctx.ok_or_else(|| SemanticError::UndefinedMapping(name.clone()))?;
            let map_id = mapping_by_name
                .get(name)
                .copied()
                .ok_or_else(|| SemanticError::UndefinedMapping(name.clone()))?;
            if *pos >= arity {
                return Err(SemanticError::ParamIndexOutOfRange { param_pos: *pos, arity });
            }
            Ok(Formula::mapping(name.clone(), map_id, *pos))
        }
        RawFormula::Not(c) => Ok(Formula::not(resolve_formula(c, var_by_name, mapping_ctx)?)),
        RawFormula::And(cs) => Ok(Formula::and(resolve_all(cs, var_by_name, mapping_ctx)?)),
        RawFormula::Or(cs) => Ok(Formula::or(resolve_all(cs, var_by_name, mapping_ctx)?)),
        RawFormula::Implies(l, r) => Ok(Formula::implies(
            resolve_formula(l, var_by_name, mapping_ctx)?,
            resolve_formula(r, var_by_name, mapping_ctx)?,
        )),
        RawFormula::Equiv(l, r) => Ok(Formula::equiv(
            resolve_formula(l, var_by_name, mapping_ctx)?,
            resolve_formula(r, var_by_name, mapping_ctx)?,
        )),
        RawFormula::Count(kind, k, cs) => {
            let kind = match kind {
                RawCountKind::AtLeast => CountKind::AtLeast,
                RawCountKind::AtMost => CountKind::AtMost,
                RawCountKind::Exactly => CountKind::Exactly,
            };
            Ok(Formula::count(kind, *k, resolve_all(cs, var_by_name, mapping_ctx)?))
        }
    }
}

fn resolve_all(
    items: &[RawFormula],
    var_by_name: &HashMap<String, VarId>,
    mapping_ctx: Option<(&HashMap<String, MapId>, usize)>,
) -> Result<Vec<FormulaRef>, SemanticError> {
    items.iter().map(|c| resolve_formula(c, var_by_name, mapping_ctx)).collect()
}
