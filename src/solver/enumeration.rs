//! Back-end B: precomputed model-list enumeration, for knowledge states
//! whose model set is small but queried often.
//!
//! Grounded on `cobra::SimpleSolver`: at construction, enumerate every
//! model of the initial restriction once (here, by delegating to
//! [`super::cnf::CnfSolver`] for that one-time SAT enumeration) and keep
//! a "live" index set into it. Constraints added afterwards are
//! evaluation predicates, not clauses — `satisfiable` lazily filters
//! `live` against constraints not yet applied (the `ready_` flag of the
//! original), and each open context remembers how many constraints and
//! which live indices existed when it was opened, so closing it is an
//! exact rollback.

use crate::formula::tseitin::MappingResolver;
use crate::formula::{CharId, FormulaRef, MapId, VarId};

use super::cnf::CnfSolver;
use super::{Solver, SolverStats};

struct ContextMark {
    constraints_len: usize,
    removed: Vec<usize>,
}

pub struct EnumerationSolver<'g> {
    resolver: &'g dyn MappingResolver,
    num_orig_vars: usize,
    models: Vec<Vec<bool>>,
    live: Vec<usize>,
    constraints: Vec<(FormulaRef, Option<Vec<CharId>>)>,
    checked_len: usize,
    ready: bool,
    context_stack: Vec<ContextMark>,
    last_model_idx: Option<usize>,
    stats: SolverStats,
}

impl<'g> EnumerationSolver<'g> {
    /// Enumerates every model of `restriction` once, up front.
    pub fn new(num_vars: usize, resolver: &'g dyn MappingResolver, restriction: &FormulaRef) -> Self {
        let mut seed = CnfSolver::new(num_vars, resolver);
        seed.add_constraint(restriction, None);
        let models = seed.generate_models();
        let live: Vec<usize> = (0..models.len()).collect();
        Self {
            resolver,
            num_orig_vars: num_vars,
            models,
            live,
            constraints: Vec::new(),
            checked_len: 0,
            ready: true,
            context_stack: Vec::new(),
            last_model_idx: None,
            stats: SolverStats::default(),
        }
    }

    /// Applies any constraints added since the last refresh, removing
    /// now-unsatisfying codes from `live` and, if a context is open,
    /// recording them so [`Solver::close_context`] can restore them.
    fn refresh(&mut self) {
        if self.ready {
            return;
        }
        let resolver = self.resolver;
        while self.checked_len < self.constraints.len() {
            let (formula, params) = self.constraints[self.checked_len].clone();
            let models = &self.models;
            let mut removed_now = Vec::new();
            self.live.retain(|&idx| {
                let resolve = |map_id: MapId, char_id: CharId| resolver.resolve(map_id, char_id);
                let get = |v: VarId| models[idx][v as usize];
                let keep = formula.eval(params.as_deref(), &resolve, &get);
                if !keep {
                    removed_now.push(idx);
                }
                keep
            });
            if let Some(top) = self.context_stack.last_mut() {
                top.removed.extend(removed_now);
            }
            self.checked_len += 1;
        }
        self.ready = true;
    }
}

impl<'g> Solver for EnumerationSolver<'g> {
    fn stats(&self) -> &SolverStats {
        &self.stats
    }

    fn stats_mut(&mut self) -> &mut SolverStats {
        &mut self.stats
    }

    fn open_context_impl(&mut self) {
        self.refresh();
        self.context_stack.push(ContextMark {
            constraints_len: self.constraints.len(),
            removed: Vec::new(),
        });
    }

    fn close_context_impl(&mut self) {
        self.refresh();
        let mark = self.context_stack.pop().expect("close_context called without a matching open_context");
        self.constraints.truncate(mark.constraints_len);
        self.checked_len = mark.constraints_len;
        self.live.extend(mark.removed);
        self.live.sort_unstable();
    }

    fn add_constraint_impl(&mut self, formula: &FormulaRef, params: Option<&[CharId]>) {
        self.constraints.push((formula.clone(), params.map(|p| p.to_vec())));
        self.ready = false;
    }

    fn must_be_true_impl(&mut self, id: VarId) -> bool {
        self.refresh();
        if self.live.is_empty() {
            return true;
        }
        self.live.iter().all(|&idx| self.models[idx][id as usize])
    }

    fn must_be_false_impl(&mut self, id: VarId) -> bool {
        self.refresh();
        if self.live.is_empty() {
            return true;
        }
        self.live.iter().all(|&idx| !self.models[idx][id as usize])
    }

    fn satisfiable_impl(&mut self) -> bool {
        self.refresh();
        self.last_model_idx = self.live.first().copied();
        !self.live.is_empty()
    }

    fn only_one_model_impl(&mut self) -> bool {
        self.refresh();
        self.live.len() == 1
    }

    fn num_models_impl(&mut self) -> u64 {
        self.refresh();
        self.live.len() as u64
    }

    fn generate_models_impl(&mut self) -> Vec<Vec<bool>> {
        self.refresh();
        self.live.iter().map(|&idx| self.models[idx].clone()).collect()
    }

    fn get_assignment_impl(&self) -> &[bool] {
        let idx = self.last_model_idx.expect("get_assignment called with no prior positive satisfiable()");
        &self.models[idx]
    }

    fn num_vars_impl(&self) -> usize {
        self.num_orig_vars
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::Formula;

    struct NoMappings;
    impl MappingResolver for NoMappings {
        fn resolve(&self, _map_id: MapId, _char_id: CharId) -> VarId {
            unreachable!("tests below use no Mapping leaves")
        }
    }

    #[test]
    fn matches_cnf_back_end_on_implication() {
        let restriction = Formula::implies(Formula::var(1), Formula::var(2));
        let mut solver = EnumerationSolver::new(2, &NoMappings, &restriction);
        assert!(solver.satisfiable());
        assert_eq!(solver.num_models(), 3);
        assert!(!solver.only_one_model());

        solver.add_constraint(&Formula::var(1), None);
        assert!(solver.satisfiable());
        assert!(solver.only_one_model());
    }

    #[test]
    fn push_pop_restores_model_count() {
        let restriction = Formula::and(vec![
            Formula::implies(Formula::var(1), Formula::var(2)),
            Formula::implies(Formula::var(3), Formula::var(4)),
            Formula::or(vec![Formula::not(Formula::var(2)), Formula::not(Formula::var(4))]),
        ]);
        let mut solver = EnumerationSolver::new(4, &NoMappings, &restriction);
        assert_eq!(solver.num_models(), 5);

        solver.open_context();
        solver.add_constraint(&Formula::and(vec![Formula::var(1), Formula::var(3)]), None);
        assert!(!solver.satisfiable());
        solver.close_context();

        assert_eq!(solver.num_models(), 5);
    }
}
