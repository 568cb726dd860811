//! Well-formedness check (spec §6): for every experiment template and
//! every admissible parameter tuple, `R → Exactly-1(outcomes)(P)` must be
//! a tautology, i.e. `R ∧ ¬Exactly-1(outcomes)(P)` must be UNSAT. Any
//! satisfying assignment is a counter-example.
//!
//! Deliberately ignores the graph-canonicalization symmetry reduction of
//! §4.4: this check runs once at game load, not on every decision step,
//! so enumerating every `PARAMS_DISTINCT`/`PARAMS_SORTED`-admissible
//! tuple plainly is simpler and cheap enough in practice, matching
//! `cobra::Game::CheckWellFormed`'s own unreduced enumeration.

use crate::error::WellFormedViolation;
use crate::formula::{CharId, Formula};
use crate::solver::cnf::CnfSolver;
use crate::solver::Solver;

use super::{ExperimentType, Game};

/// Checks every experiment type in `game`; returns the first counter-example
/// found, in declaration order of experiment types and ascending parameter
/// tuple order (spec §5, "Ordering").
pub fn check_well_formed(game: &Game) -> Result<(), WellFormedViolation> {
    for exp in &game.experiments {
        let mut solver = CnfSolver::new(game.var_names.len(), game);
        solver.add_constraint(&game.restriction, None);

        let outcome_formulas = exp.outcomes.iter().map(|o| o.formula.clone()).collect();
        let negated_exactly_one = Formula::not(Formula::exactly(1, outcome_formulas));

        for params in admissible_params(exp, game.alphabet.len()) {
            solver.open_context();
            solver.add_constraint(&negated_exactly_one, Some(&params));
            let violated = solver.satisfiable();
            let assignment = violated.then(|| solver.get_assignment().to_vec());
            solver.close_context();

            if let Some(assignment) = assignment {
                return Err(WellFormedViolation {
                    experiment: exp.name.clone(),
                    params: params.iter().map(|&c| game.alphabet[c].clone()).collect(),
                    assignment,
                });
            }
        }
    }
    Ok(())
}

/// Enumerates every parameter tuple admissible under `exp`'s
/// `params_distinct`/`params_sorted` relations, characters `0..alphabet_len`
/// ascending per position, positions `0..arity` ascending (spec §5).
fn admissible_params(exp: &ExperimentType, alphabet_len: usize) -> Vec<Vec<CharId>> {
    let mut out = Vec::new();
    let mut current = vec![0usize; exp.arity];
    fill(0, exp, alphabet_len, &mut current, &mut out);
    out
}

fn fill(pos: usize, exp: &ExperimentType, alphabet_len: usize, current: &mut Vec<CharId>, out: &mut Vec<Vec<CharId>>) {
    if pos == exp.arity {
        out.push(current.clone());
        return;
    }
    for a in 0..alphabet_len {
        current[pos] = a;
        if admissible_so_far(exp, current, pos) {
            fill(pos + 1, exp, alphabet_len, current, out);
        }
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Game;

    #[test]
    fn well_formed_game_passes() {
        let src = r#"
            VARS { a, b };
            RESTRICTION: a | b | (!a & !b);
            ALPHABET { x, y };
            EXPERIMENT query(1) {
                OUTCOME is_a: a;
                OUTCOME is_not_a: !a;
            }
        "#;
        let game = Game::load(src).unwrap();
        assert!(check_well_formed(&game).is_ok());
    }

    #[test]
    fn ill_formed_game_reports_counter_example() {
        let src = r#"
            VARS { a, b };
            RESTRICTION: a | b;
            ALPHABET { x };
            EXPERIMENT query(0) {
                OUTCOME both: a & b;
                OUTCOME neither: !a & !b;
            }
        "#;
        let game = Game::load(src).unwrap();
        let err = check_well_formed(&game).unwrap_err();
        assert_eq!(err.experiment, "query");
    }
}
