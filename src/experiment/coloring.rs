//! Variable-equivalence coloring via canonical-graph automorphism orbits
//! (spec §4.5): two variables are in the same class iff individualizing
//! each of them in turn (coloring it uniquely, everything else left
//! uniform) yields isomorphic canonical knowledge graphs — the
//! standard "individualization" proxy for orbit membership when only a
//! canonical-labeling routine (not a full automorphism-group generator)
//! is available, which is what `nauty-pet`'s `CanonLabeling` gives us.
//!
//! Grounded on `cobra::Game::bliss_calls`/`bliss_time` for the
//! accompanying [`CanonicalizerStats`] (spec §5 supplement item); the
//! individualization technique itself has no teacher-repo precedent and
//! is the natural way to recover orbits from a canonicalizer-only API.

use std::fmt;
use std::time::{Duration, Instant};

use crate::formula::graph::{canonicalize, Canonical, GraphBuilder};
use crate::formula::tseitin::MappingResolver;
use crate::formula::{CharId, FormulaRef, VarId};
use crate::game::Game;

#[derive(Debug, Default, Clone, Copy)]
pub struct CanonicalizerStats {
    pub calls: u64,
    pub time: Duration,
}

impl fmt::Display for CanonicalizerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} canonicalizations / {:?}", self.calls, self.time)
    }
}

/// One conjunct of the accumulated knowledge: an outcome formula already
/// applied, paired with the parameter tuple it was applied under (`None`
/// for the restriction itself, which has no parameters).
pub type KnowledgeItem = (FormulaRef, Option<Vec<CharId>>);

/// Computes `coloring[v - 1]` for every declared variable `v`, given the
/// restriction plus every outcome applied so far.
pub fn compute_coloring(game: &Game, knowledge: &[KnowledgeItem], stats: &mut CanonicalizerStats) -> Vec<u32> {
    let n = game.var_names.len();
    let marks: Vec<Canonical> = (1..=n as VarId).map(|v| canonical_with_mark(game, knowledge, v, stats)).collect();

    let mut rep_indices: Vec<usize> = Vec::new();
    let mut group = vec![0u32; n];
    for (i, mark) in marks.iter().enumerate() {
        let found = rep_indices.iter().position(|&r| &marks[r] == mark);
        group[i] = match found {
            Some(g) => g as u32,
            None => {
                rep_indices.push(i);
                (rep_indices.len() - 1) as u32
            }
        };
    }
    group
}

fn canonical_with_mark(game: &Game, knowledge: &[KnowledgeItem], marked_var: VarId, stats: &mut CanonicalizerStats) -> Canonical {
    let n = game.var_names.len();
    let mut var_group = vec![0u32; n];
    var_group[(marked_var - 1) as usize] = 1;

    let resolver: &dyn MappingResolver = game;
    let mut builder = GraphBuilder::new(resolver, &var_group);
    builder.embed(&game.restriction, None);
    for (formula, params) in knowledge {
        builder.embed(formula, params.as_deref());
    }

    let start = Instant::now();
    let canon = canonicalize(&builder.finish());
    stats.calls += 1;
    stats.time += start.elapsed();
    canon
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Game;

    #[test]
    fn symmetric_restriction_colors_variables_alike() {
        let src = r#"
            VARS { a, b };
            RESTRICTION: a | b;
            ALPHABET { x };
        "#;
        let game = Game::load(src).unwrap();
        let mut stats = CanonicalizerStats::default();
        let coloring = compute_coloring(&game, &[], &mut stats);
        assert_eq!(coloring[0], coloring[1]);
        assert_eq!(stats.calls, 2);
    }

    #[test]
    fn asymmetric_restriction_distinguishes_variables() {
        let src = r#"
            VARS { a, b };
            RESTRICTION: a -> b;
            ALPHABET { x };
        "#;
        let game = Game::load(src).unwrap();
        let mut stats = CanonicalizerStats::default();
        let coloring = compute_coloring(&game, &[], &mut stats);
        assert_ne!(coloring[0], coloring[1]);
    }

    #[test]
    fn applied_knowledge_can_break_prior_symmetry() {
        let src = r#"
            VARS { a, b };
            RESTRICTION: a | b;
            ALPHABET { x };
        "#;
        let game = Game::load(src).unwrap();
        let mut stats = CanonicalizerStats::default();
        let before = compute_coloring(&game, &[], &mut stats);
        assert_eq!(before[0], before[1]);

        let knowledge = vec![(game.restriction.clone(), None)];
        let after_redundant = compute_coloring(&game, &knowledge, &mut stats);
        assert_eq!(after_redundant[0], after_redundant[1]);
    }
}
