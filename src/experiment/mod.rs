//! An experiment template paired with one concrete parameter tuple (spec
//! §4.6, "Option"); `Option` would clash with the prelude type, so this is
//! named [`ExperimentChoice`] instead. Lazily evaluates every outcome
//! against the current knowledge held open in a [`crate::solver::Solver`]
//! and exposes the derived aggregate metrics strategies choose among.
//!
//! Grounded on `cobra::Option`/`cobra::Experiment::GenParams`: an Option is
//! always produced together with the parameter tuple it came from, and its
//! per-outcome metrics are computed eagerly (not re-derived lazily field by
//! field) the moment the tuple is accepted by [`params::enumerate_params`].

pub mod coloring;
pub mod params;

use crate::formula::CharId;
use crate::game::{ExperimentType, Game};
use crate::solver::Solver;

use self::params::ParamGenStats;

/// One experiment template instantiated with a concrete parameter tuple,
/// with every outcome's satisfiability, model count and fixed-variable
/// count evaluated against the knowledge currently held open in a solver.
#[derive(Debug, Clone)]
pub struct ExperimentChoice<'e> {
    pub exp: &'e ExperimentType,
    pub params: Vec<CharId>,
    pub is_sat: Vec<bool>,
    pub num_models: Vec<u64>,
    pub num_fixed: Vec<usize>,
}

impl<'e> ExperimentChoice<'e> {
    /// Evaluates every outcome of `exp` under `params` against the
    /// knowledge currently asserted in `solver`: `open_context /
    /// add_constraint(outcome, params) / query / close_context` per
    /// outcome (spec §4.6).
    pub fn evaluate(exp: &'e ExperimentType, params: Vec<CharId>, solver: &mut dyn Solver) -> Self {
        let mut is_sat = Vec::with_capacity(exp.outcomes.len());
        let mut num_models = Vec::with_capacity(exp.outcomes.len());
        let mut num_fixed = Vec::with_capacity(exp.outcomes.len());

        for outcome in &exp.outcomes {
            solver.open_context();
            solver.add_constraint(&outcome.formula, Some(&params));
            let sat = solver.satisfiable();
            let models = if sat { solver.num_models() } else { 0 };
            num_fixed.push(solver.num_fixed_vars());
            is_sat.push(sat);
            num_models.push(models);
            solver.close_context();
        }

        ExperimentChoice { exp, params, is_sat, num_models, num_fixed }
    }

    /// Number of outcomes still satisfiable under the current knowledge.
    pub fn num_sat_outcomes(&self) -> usize {
        self.is_sat.iter().filter(|&&sat| sat).count()
    }

    /// Sum of per-outcome model counts (models of `knowledge` itself,
    /// since every model falls under exactly one outcome).
    pub fn total_num_models(&self) -> u64 {
        self.num_models.iter().sum()
    }

    /// The largest residual model count over all outcomes.
    pub fn max_num_models(&self) -> u64 {
        self.num_models.iter().copied().max().unwrap_or(0)
    }

    /// True iff every satisfiable outcome singles out exactly one model —
    /// asking this one question would immediately determine the code
    /// (spec §4.7 step 2).
    pub fn partitions_into_singletons(&self) -> bool {
        self.num_sat_outcomes() as u64 == self.total_num_models()
    }

    /// Renders `exp.name(params)` with params spelled out as alphabet
    /// characters, reinstated from `cobra::Game::ParamsToStr` for
    /// `--info`/simulation transcripts and test failure messages.
    pub fn describe(&self, game: &Game) -> String {
        format!("{}({})", self.exp.name, game.params_to_str(&self.params))
    }
}

/// Enumerates every non-redundant admissible parameter tuple for `exp`
/// under `coloring` and evaluates each into an [`ExperimentChoice`]
/// against the knowledge currently open in `solver`.
pub fn enumerate_choices<'e>(
    game: &Game,
    exp: &'e ExperimentType,
    coloring: &[u32],
    stats: &mut ParamGenStats,
    solver: &mut dyn Solver,
) -> Vec<ExperimentChoice<'e>> {
    params::enumerate_params(game, exp, coloring, stats)
        .into_iter()
        .map(|p| ExperimentChoice::evaluate(exp, p, solver))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::cnf::CnfSolver;

    #[test]
    fn evaluate_reports_sat_outcomes_and_model_counts() {
        let src = r#"
            VARS { a, b };
            RESTRICTION: a | b;
            ALPHABET { x };
            EXPERIMENT query(0) {
                OUTCOME both: a & b;
                OUTCOME not_both: !a | !b;
            }
        "#;
        let game = Game::load(src).unwrap();
        let exp = &game.experiments[0];
        let mut solver = CnfSolver::new(game.var_names.len(), &game);
        solver.add_constraint(&game.restriction, None);

        let choice = ExperimentChoice::evaluate(exp, vec![], &mut solver);
        assert_eq!(choice.num_sat_outcomes(), 2);
        assert_eq!(choice.num_models, vec![1, 2]);
        assert_eq!(choice.total_num_models(), 3);
        assert_eq!(choice.max_num_models(), 2);
        assert!(!choice.partitions_into_singletons());
    }

    #[test]
    fn enumerate_choices_evaluates_every_surviving_tuple() {
        let src = r#"
            VARS { a, b, c };
            RESTRICTION: a | b | c;
            ALPHABET { x, y, z };
            MAPPING f { a, b, c };
            EXPERIMENT query(1) {
                OUTCOME yes: f$1;
                OUTCOME no: !f$1;
            }
        "#;
        let game = Game::load(src).unwrap();
        let exp = &game.experiments[0];
        let coloring: Vec<u32> = (0..game.var_names.len() as u32).collect();
        let mut param_stats = ParamGenStats::default();
        let mut solver = CnfSolver::new(game.var_names.len(), &game);
        solver.add_constraint(&game.restriction, None);

        let choices = enumerate_choices(&game, exp, &coloring, &mut param_stats, &mut solver);
        assert_eq!(choices.len(), 3);
        for choice in &choices {
            assert_eq!(choice.is_sat.len(), 2);
        }
    }
}
