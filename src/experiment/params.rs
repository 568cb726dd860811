//! Three-phase parameter-tuple enumeration with symmetry breaking (spec
//! §4.4): constrained fill, a basic essential-position filter, then a
//! graph-canonicalization filter as the authoritative de-duplication
//! backstop.
//!
//! Grounded on `cobra::Experiment::GenParams`'s three-pass structure;
//! `used_maps`/`used_vars`/`interchangeable` are recomputed per call
//! rather than cached on `ExperimentType` (which is otherwise immutable
//! once built) — cheap relative to the enumeration itself, and it keeps
//! `Game`'s construction pass free of per-experiment mutable caches.

use std::collections::{HashMap, HashSet};
use std::fmt;

use fixedbitset::FixedBitSet;

use crate::formula::graph::{canonicalize, Canonical, GraphBuilder};
use crate::formula::tseitin::MappingResolver;
use crate::formula::{CharId, Formula, FormulaRef, MapId, VarId};
use crate::game::{ExperimentType, Game};

/// Per-phase survivor counts, reinstated from `cobra::GenParamsStats`
/// (spec §5 supplement item).
#[derive(Debug, Default, Clone, Copy)]
pub struct ParamGenStats {
    pub ph1: u64,
    pub ph2: u64,
    pub ph3: u64,
}

impl fmt::Display for ParamGenStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "phase1: {}, phase2: {}, phase3: {}", self.ph1, self.ph2, self.ph3)
    }
}

/// Enumerates the non-redundant, admissible parameter tuples for `exp`
/// under the variable-equivalence coloring `coloring` (indexed `v - 1`
/// for variable id `v`; spec §4.5).
pub fn enumerate_params(game: &Game, exp: &ExperimentType, coloring: &[u32], stats: &mut ParamGenStats) -> Vec<Vec<CharId>> {
    let alphabet_len = game.alphabet.len();
    let (used_maps, used_vars) = collect_used(exp);
    let interchangeable = compute_interchangeable(game, exp, &used_maps, &used_vars, alphabet_len);

    let mut phase1 = Vec::new();
    let mut current = vec![0usize; exp.arity];
    fill(game, exp, &used_maps, &interchangeable, coloring, alphabet_len, 0, &mut current, &mut phase1);
    stats.ph1 += phase1.len() as u64;

    let mut phase2 = Vec::new();
    for tuple in phase1 {
        if phase2_keep(game, exp, &used_maps, &used_vars, &interchangeable, coloring, &tuple) {
            phase2.push(tuple);
        }
    }
    stats.ph2 += phase2.len() as u64;

    let mut seen = HashSet::new();
    let mut phase3 = Vec::new();
    for tuple in phase2 {
        let canon = canonicalize_tuple(game, exp, coloring, &tuple);
        if seen.insert(canon) {
            phase3.push(tuple);
        }
    }
    stats.ph3 += phase3.len() as u64;

    phase3
}

/// Collects, per parameter position, the set of map ids referenced there,
/// and the set of variable ids referenced directly (not via a Mapping
/// leaf) across all of `exp`'s outcome formulas.
fn collect_used(exp: &ExperimentType) -> (Vec<HashSet<MapId>>, HashSet<VarId>) {
    let mut used_maps = vec![HashSet::new(); exp.arity];
    let mut used_vars = HashSet::new();
    for outcome in &exp.outcomes {
        collect_used_rec(&outcome.formula, &mut used_maps, &mut used_vars);
    }
    (used_maps, used_vars)
}

fn collect_used_rec(formula: &FormulaRef, used_maps: &mut [HashSet<MapId>], used_vars: &mut HashSet<VarId>) {
    match formula.as_ref() {
        Formula::Variable(id) => {
            used_vars.insert(id.abs());
        }
        Formula::Mapping { map_id, param_pos, .. } => {
            used_maps[*param_pos].insert(*map_id);
        }
        _ => {
            for child in formula.children() {
                collect_used_rec(child, used_maps, used_vars);
            }
        }
    }
}

/// True iff positions `d` (holding `a`) and `e` (holding `b`) are jointly
/// allowed by `exp`'s `params_distinct`/`params_sorted` relations.
fn pairwise_admissible(exp: &ExperimentType, d: usize, a: CharId, e: usize, b: CharId) -> bool {
    for group in &exp.params_distinct {
        if group.contains(&d) && group.contains(&e) && a == b {
            return false;
        }
    }
    for &(l, r) in &exp.params_sorted {
        if l == d && r == e && !(a < b) {
            return false;
        }
        if l == e && r == d && !(b < a) {
            return false;
        }
    }
    true
}

/// `interchangeable[d][a]`: placing `a` at position `d` ties it to
/// nothing else — the variables it resolves to (over `used_maps[d]`)
/// are not directly referenced elsewhere and cannot coincide with any
/// other position's resolved variable under any jointly-admissible
/// character (spec §4.4 precomputation).
fn compute_interchangeable(
    game: &Game,
    exp: &ExperimentType,
    used_maps: &[HashSet<MapId>],
    used_vars: &HashSet<VarId>,
    alphabet_len: usize,
) -> Vec<Vec<bool>> {
    let arity = exp.arity;
    let mut result = vec![vec![true; alphabet_len]; arity];
    for d in 0..arity {
        for a in 0..alphabet_len {
            let resolved: HashSet<VarId> = used_maps[d].iter().map(|&f| game.mapping_value(f, a)).collect();
            let mut ok = resolved.iter().all(|v| !used_vars.contains(v));
            if ok {
                'search: for e in 0..arity {
                    if e == d {
                        continue;
                    }
                    for b in 0..alphabet_len {
                        if !pairwise_admissible(exp, d, a, e, b) {
                            continue;
                        }
                        for &f2 in &used_maps[e] {
                            if resolved.contains(&game.mapping_value(f2, b)) {
                                ok = false;
                                break 'search;
                            }
                        }
                    }
                }
            }
            result[d][a] = ok;
        }
    }
    result
}

fn color_of(coloring: &[u32], var: VarId) -> u32 {
    coloring.get((var.unsigned_abs() - 1) as usize).copied().unwrap_or(0)
}

/// True iff `a` and `b`, placed at the same position, resolve every map
/// in `maps` to identically-colored variables.
fn chars_equivalent(game: &Game, coloring: &[u32], maps: &HashSet<MapId>, a: CharId, b: CharId) -> bool {
    maps.iter().all(|&f| color_of(coloring, game.mapping_value(f, a)) == color_of(coloring, game.mapping_value(f, b)))
}

#[allow(clippy::too_many_arguments)]
fn fill(
    game: &Game,
    exp: &ExperimentType,
    used_maps: &[HashSet<MapId>],
    interchangeable: &[Vec<bool>],
    coloring: &[u32],
    alphabet_len: usize,
    pos: usize,
    current: &mut Vec<CharId>,
    out: &mut Vec<Vec<CharId>>,
) {
    if pos == exp.arity {
        out.push(current.clone());
        return;
    }
    let mut tried = FixedBitSet::with_capacity(alphabet_len);
    for a in 0..alphabet_len {
        current[pos] = a;
        if !admissible_so_far(exp, current, pos) {
            continue;
        }
        if interchangeable[pos][a] && tried.ones().any(|b| chars_equivalent(game, coloring, &used_maps[pos], a, b)) {
            continue;
        }
        tried.insert(a);
        fill(game, exp, used_maps, interchangeable, coloring, alphabet_len, pos + 1, current, out);
    }
}

fn admissible_so_far(exp: &ExperimentType, current: &[CharId], pos: usize) -> bool {
    for group in &exp.params_distinct {
        if group.contains(&pos) {
            for &other in group {
                if other < pos && current[other] == current[pos] {
                    return false;
                }
            }
        }
    }
    for &(l, r) in &exp.params_sorted {
        if r == pos && l < pos && current[l] >= current[pos] {
            return false;
        }
    }
    true
}

/// Position `n` is essential in `tuple` if some map used there resolves
/// to a variable also reachable from `used_vars` or from any other
/// position's resolved variables.
fn is_essential(
    game: &Game,
    exp: &ExperimentType,
    used_maps: &[HashSet<MapId>],
    used_vars: &HashSet<VarId>,
    tuple: &[CharId],
    n: usize,
) -> bool {
    let mut other_vars: HashSet<VarId> = used_vars.clone();
    for i in 0..exp.arity {
        if i == n {
            continue;
        }
        for &f in &used_maps[i] {
            other_vars.insert(game.mapping_value(f, tuple[i]));
        }
    }
    used_maps[n].iter().any(|&f| other_vars.contains(&game.mapping_value(f, tuple[n])))
}

fn phase2_keep(
    game: &Game,
    exp: &ExperimentType,
    used_maps: &[HashSet<MapId>],
    used_vars: &HashSet<VarId>,
    interchangeable: &[Vec<bool>],
    coloring: &[u32],
    tuple: &[CharId],
) -> bool {
    for n in 0..exp.arity {
        if interchangeable[n][tuple[n]] {
            continue;
        }
        if is_essential(game, exp, used_maps, used_vars, tuple, n) {
            continue;
        }
        for b in 0..tuple[n] {
            if !chars_equivalent(game, coloring, &used_maps[n], b, tuple[n]) {
                continue;
            }
            let mut substituted = tuple.to_vec();
            substituted[n] = b;
            if !is_essential(game, exp, used_maps, used_vars, &substituted, n) {
                return false;
            }
        }
    }
    true
}

/// Builds the colored graph of `exp`'s outcome formulas resolved under
/// `tuple` and returns its canonical form, the authoritative
/// de-duplication key of phase 3.
fn canonicalize_tuple(game: &Game, exp: &ExperimentType, coloring: &[u32], tuple: &[CharId]) -> Canonical {
    let resolver: &dyn MappingResolver = game;
    let mut builder = GraphBuilder::new(resolver, coloring);
    for outcome in &exp.outcomes {
        builder.embed(&outcome.formula, Some(tuple));
    }
    canonicalize(&builder.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Game;

    #[test]
    fn respects_distinct_and_sorted_constraints() {
        let src = r#"
            VARS { a, b, c };
            RESTRICTION: a | b | c;
            ALPHABET { x, y, z };
            MAPPING f { a, b, c };
            EXPERIMENT query(2) {
                PARAMS_DISTINCT { 0, 1 };
                PARAMS_SORTED { 0, 1 };
                OUTCOME yes: f$1 & f$2;
                OUTCOME no: !f$1 | !f$2;
            }
        "#;
        let game = Game::load(src).unwrap();
        let exp = &game.experiments[0];
        // Distinct colors per variable, as if a prior coloring pass had
        // already told a, b, c apart (this test exercises enumeration
        // mechanics directly, not the coloring pass itself).
        let coloring: Vec<u32> = (0..game.var_names.len() as u32).collect();
        let mut stats = ParamGenStats::default();
        let tuples = enumerate_params(&game, exp, &coloring, &mut stats);
        for t in &tuples {
            assert_eq!(t.len(), 2);
            assert_ne!(t[0], t[1]);
            assert!(t[0] < t[1]);
        }
        assert_eq!(tuples.len(), 3); // (0,1), (0,2), (1,2) out of 3 alphabet symbols
    }

    #[test]
    fn recoloring_does_not_change_result_when_orbits_are_unchanged() {
        let src = r#"
            VARS { a, b };
            RESTRICTION: a | b;
            ALPHABET { x, y };
            MAPPING f { a, b };
            EXPERIMENT query(1) {
                OUTCOME yes: f$1;
                OUTCOME no: !f$1;
            }
        "#;
        let game = Game::load(src).unwrap();
        let exp = &game.experiments[0];
        let mut stats = ParamGenStats::default();
        let all_zero = vec![0u32; 2];
        let all_one_color = vec![5u32; 2];
        let t1 = enumerate_params(&game, exp, &all_zero, &mut stats);
        let t2 = enumerate_params(&game, exp, &all_one_color, &mut stats);
        assert_eq!(t1.len(), t2.len());
    }
}
