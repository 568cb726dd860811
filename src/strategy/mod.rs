//! Heuristic code-breaker/code-maker strategies (spec §4.7) plus the
//! recursive optimal analyzer ([`optimal`]).
//!
//! Grounded on `cobra::strategy::breaker`/`cobra::strategy::maker` and the
//! `breaker_strategies`/`maker_strategies` name tables in
//! `cobra/src/strategy.h`; each function here is a direct idiomatic
//! translation of its C++ counterpart in `cobra/src/strategy.cpp`,
//! including its first-strict-improvement tie-break (spec §5,
//! "Ordering": outcome/position/character iteration order is observable
//! in tie-breaks), which is why these are written as explicit loops
//! rather than `Iterator::max_by_key` (whose tie-break keeps the *last*
//! maximum, not the first).

pub mod optimal;

use rand::Rng;

use crate::experiment::ExperimentChoice;
use crate::game::Game;

/// Abstracts interactive prompting so this crate never touches stdin or
/// stdout directly; the CLI binary supplies a terminal-backed
/// implementation, tests supply a scripted one (spec §1 Out-of-scope,
/// "interactive prompting is an external collaborator"; SPEC_FULL §5).
pub trait Chooser {
    /// Prompts for which experiment (index into `choices`) to perform
    /// next. Only called with a `choices` slice already filtered to
    /// entries with more than one satisfiable outcome.
    fn choose_experiment(&mut self, choices: &[ExperimentChoice<'_>], game: &Game) -> usize;
    /// Prompts for which outcome (index into `choice.exp.outcomes`) the
    /// experiment actually produced. Only satisfiable outcomes are legal.
    fn choose_outcome(&mut self, choice: &ExperimentChoice<'_>) -> usize;
}

macro_rules! clap_display {
    ($ty:ty) => {
        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                use clap::ValueEnum;
                write!(f, "{}", self.to_possible_value().expect("no variant is hidden").get_name())
            }
        }
    };
}

/// Code-breaker strategy selector, mirroring `cobra::breaker_strategies`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum BreakerStrategy {
    /// Asks the user which experiment to perform next.
    Interactive,
    /// Picks the next experiment at random.
    Random,
    /// Selects the experiment with the maximal number of possible outcomes.
    Parts,
    /// Minimizes the worst-case number of remaining codes in the next step.
    MinNum,
    /// Minimizes the expected number of remaining codes in the next step.
    ExpNum,
    /// Maximizes the entropy of the numbers of remaining codes.
    Entropy,
    /// Maximizes the worst-case number of fixed variables in the next step.
    Fixed,
}
clap_display!(BreakerStrategy);

/// Code-maker strategy selector, mirroring `cobra::maker_strategies`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum MakerStrategy {
    /// Asks the user what the outcome of the experiment is.
    Interactive,
    /// Picks the outcome of the experiment at random.
    Random,
    /// Maximizes the number of remaining codes.
    MaxNum,
    /// Minimizes the number of fixed variables.
    Fixed,
}
clap_display!(MakerStrategy);

/// Code-breaker heuristics: given a list of experiments each already
/// filtered to more than one satisfiable outcome, pick an index.
pub mod breaker {
    use super::*;

    pub fn interactive(choices: &[ExperimentChoice<'_>], game: &Game, chooser: &mut dyn Chooser) -> usize {
        chooser.choose_experiment(choices, game)
    }

    pub fn random(choices: &[ExperimentChoice<'_>], rng: &mut impl Rng) -> usize {
        rng.gen_range(0..choices.len())
    }

    /// Maximizes `num_sat_outcomes` (`cobra::Strategy::breaker_parts`).
    pub fn parts(choices: &[ExperimentChoice<'_>]) -> usize {
        let mut result = 0;
        let mut max = 0usize;
        for (i, choice) in choices.iter().enumerate() {
            let value = choice.num_sat_outcomes();
            if value > max {
                max = value;
                result = i;
            }
        }
        result
    }

    /// Minimizes `max_num_models` (`cobra::Strategy::breaker_max`).
    pub fn min_num(choices: &[ExperimentChoice<'_>]) -> usize {
        let mut result = 0;
        let mut min: Option<u64> = None;
        for (i, choice) in choices.iter().enumerate() {
            let value = choice.max_num_models();
            if min.map_or(true, |m| value < m) {
                min = Some(value);
                result = i;
            }
        }
        result
    }

    /// Minimizes `Σ num_models[o]^2 / total_num_models`
    /// (`cobra::Strategy::breaker_exp`).
    pub fn exp_num(choices: &[ExperimentChoice<'_>]) -> usize {
        let mut result = 0;
        let mut min: Option<f64> = None;
        for (i, choice) in choices.iter().enumerate() {
            let sumsq: u64 = choice.num_models.iter().map(|&m| m * m).sum();
            let value = sumsq as f64 / choice.total_num_models() as f64;
            if min.map_or(true, |m| value < m) {
                min = Some(value);
                result = i;
            }
        }
        result
    }

    /// Maximizes `−Σ p_o log2 p_o` over `p_o = num_models[o] / total`
    /// (`cobra::Strategy::breaker_entropy`).
    pub fn entropy(choices: &[ExperimentChoice<'_>]) -> usize {
        let mut result = 0;
        let mut max = 0.0f64;
        for (i, choice) in choices.iter().enumerate() {
            let total = choice.total_num_models() as f64;
            let mut value = 0.0;
            for &m in &choice.num_models {
                if m == 0 {
                    continue;
                }
                let p = m as f64 / total;
                value -= p * p.log2();
            }
            if value > max {
                max = value;
                result = i;
            }
        }
        result
    }

    /// Maximizes the minimum `num_fixed[o]` over outcomes
    /// (`cobra::Strategy::breaker_fixed`).
    pub fn fixed(choices: &[ExperimentChoice<'_>]) -> usize {
        let mut result = 0;
        let mut max = 0usize;
        for (i, choice) in choices.iter().enumerate() {
            let value = choice.num_fixed.iter().copied().min().expect("an experiment has at least one outcome");
            if value > max {
                max = value;
                result = i;
            }
        }
        result
    }
}

/// Code-maker heuristics: given a single experiment's evaluation, pick
/// which satisfiable outcome to report.
pub mod maker {
    use super::*;

    pub fn interactive(choice: &ExperimentChoice<'_>, chooser: &mut dyn Chooser) -> usize {
        chooser.choose_outcome(choice)
    }

    /// Uniform over satisfiable outcomes (`cobra::Strategy::maker_random`).
    pub fn random(choice: &ExperimentChoice<'_>, rng: &mut impl Rng) -> usize {
        let mut p = rng.gen_range(0..choice.num_sat_outcomes());
        for (i, &sat) in choice.is_sat.iter().enumerate() {
            if sat {
                if p == 0 {
                    return i;
                }
                p -= 1;
            }
        }
        unreachable!("p counted down past the number of satisfiable outcomes")
    }

    /// Picks the satisfiable outcome with the largest residual model
    /// count (`cobra::strategy.h`'s `maxnum`, not defined in the
    /// retrieved `strategy.cpp`; built directly from spec §4.7).
    pub fn max_num(choice: &ExperimentChoice<'_>) -> usize {
        let mut result = 0;
        let mut max: Option<u64> = None;
        for (i, (&sat, &models)) in choice.is_sat.iter().zip(&choice.num_models).enumerate() {
            if sat && max.map_or(true, |m| models > m) {
                max = Some(models);
                result = i;
            }
        }
        result
    }

    /// Picks the satisfiable outcome minimizing the number of fixed
    /// variables (`cobra::strategy.h`'s `fixed`, not defined in the
    /// retrieved `strategy.cpp`; built directly from spec §4.7).
    pub fn fixed(choice: &ExperimentChoice<'_>) -> usize {
        let mut result = 0;
        let mut min: Option<usize> = None;
        for (i, (&sat, &fixed)) in choice.is_sat.iter().zip(&choice.num_fixed).enumerate() {
            if sat && min.map_or(true, |m| fixed < m) {
                min = Some(fixed);
                result = i;
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Game;
    use crate::solver::cnf::CnfSolver;
    use crate::solver::Solver;

    fn two_outcome_choices(src: &str) -> (Game, Vec<Vec<crate::formula::CharId>>) {
        let game = Game::load(src).unwrap();
        (game, vec![])
    }

    #[test]
    fn parts_prefers_more_satisfiable_outcomes() {
        let (game, _) = two_outcome_choices(
            r#"
            VARS { a, b, c };
            RESTRICTION: a | b | c;
            ALPHABET { x };
            EXPERIMENT single(0) {
                OUTCOME yes: a;
                OUTCOME no: !a;
            }
            EXPERIMENT triple(0) {
                OUTCOME one: a & !b & !c;
                OUTCOME two: !a & b & !c;
                OUTCOME three: !a & !b & c;
                OUTCOME other: (a & b) | (a & c) | (b & c);
            }
        "#,
        );
        let mut solver = CnfSolver::new(game.var_names.len(), &game);
        solver.add_constraint(&game.restriction, None);
        let choices = vec![
            ExperimentChoice::evaluate(&game.experiments[0], vec![], &mut solver),
            ExperimentChoice::evaluate(&game.experiments[1], vec![], &mut solver),
        ];
        assert_eq!(breaker::parts(&choices), 1);
    }

    #[test]
    fn maker_max_num_picks_largest_satisfiable_outcome() {
        let game = Game::load(
            r#"
            VARS { a, b, c };
            RESTRICTION: a | b | c;
            ALPHABET { x };
            EXPERIMENT triple(0) {
                OUTCOME one: a & !b & !c;
                OUTCOME rest: !(a & !b & !c);
            }
        "#,
        )
        .unwrap();
        let mut solver = CnfSolver::new(game.var_names.len(), &game);
        solver.add_constraint(&game.restriction, None);
        let choice = ExperimentChoice::evaluate(&game.experiments[0], vec![], &mut solver);
        assert_eq!(maker::max_num(&choice), 1);
    }
}
