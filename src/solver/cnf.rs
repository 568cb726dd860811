//! Back-end A: incremental SAT via `varisat`, with push/pop contexts
//! emulated over a non-push/pop-native incremental solver using
//! activation literals — one fresh selector variable per open context,
//! ANDed (as a negated disjunct) into every clause added while that
//! context is open. Closing a context simply stops assuming its
//! selector true; its clauses remain physically in the solver but are
//! permanently satisfiable for free from then on, which is
//! observationally identical to having removed them.
//!
//! Grounded on `strix::controller::machine::sat`'s direct use of
//! `varisat::Solver`/`Lit`, and on `cobra::CnfFormula`'s
//! `OpenContext`/`CloseContext`/`WriteDimacs`.

use std::io;

use varisat::{ExtendFormula, Lit};

use crate::formula::tseitin::{ClauseSink, MappingResolver, TseitinEncoder};
use crate::formula::{CharId, FormulaRef, VarId};

use super::{Solver, SolverStats};

/// Routes clause/variable-allocation calls from [`TseitinEncoder`] into
/// a `varisat::Solver`, tagging every clause with the currently-open
/// activation literals and mirroring it into `log` for [`Solver::write_dimacs`].
struct ActivatedSink<'s> {
    sat: &'s mut varisat::Solver<'static>,
    next_var: &'s mut VarId,
    activation: &'s [VarId],
    log: &'s mut Vec<Vec<VarId>>,
}

impl ClauseSink for ActivatedSink<'_> {
    fn fresh_var(&mut self) -> VarId {
        let v = *self.next_var;
        *self.next_var += 1;
        v
    }

    fn add_clause(&mut self, lits: &[VarId]) {
        let mut full: Vec<Lit> = lits.iter().map(|&l| Lit::from_dimacs(l as isize)).collect();
        let mut logged = lits.to_vec();
        for &a in self.activation {
            full.push(Lit::from_dimacs(-a as isize));
            logged.push(-a);
        }
        self.sat.add_clause(&full);
        self.log.push(logged);
    }
}

pub struct CnfSolver<'g> {
    sat: varisat::Solver<'static>,
    resolver: &'g dyn MappingResolver,
    next_var: VarId,
    num_orig_vars: usize,
    activation_stack: Vec<VarId>,
    clauses_log: Vec<Vec<VarId>>,
    last_model: Vec<bool>,
    stats: SolverStats,
}

impl<'g> CnfSolver<'g> {
    /// `num_vars` is the number of original (declared) variables; ids
    /// `1..=num_vars` are reserved before any auxiliary or activation
    /// variable is allocated.
    pub fn new(num_vars: usize, resolver: &'g dyn MappingResolver) -> Self {
        Self {
            sat: varisat::Solver::new(),
            resolver,
            next_var: num_vars as VarId + 1,
            num_orig_vars: num_vars,
            activation_stack: Vec::new(),
            clauses_log: Vec::new(),
            last_model: vec![false; num_vars + 1],
            stats: SolverStats::default(),
        }
    }

    fn context_assumptions(&self) -> Vec<Lit> {
        self.activation_stack.iter().map(|&a| Lit::from_dimacs(a as isize)).collect()
    }

    fn solve_assuming(&mut self, extra: &[Lit]) -> bool {
        let mut assumptions = self.context_assumptions();
        assumptions.extend_from_slice(extra);
        self.sat.assume(&assumptions);
        self.sat.solve().expect("varisat solve should not fail without external interrupts")
    }

    fn cache_model(&mut self) {
        let model = self
            .sat
            .model()
            .expect("a model must be available immediately after a positive solve");
        self.last_model = vec![false; self.num_orig_vars + 1];
        for lit in model {
            let dimacs = lit.to_dimacs();
            let v = dimacs.unsigned_abs() as usize;
            if v <= self.num_orig_vars {
                self.last_model[v] = dimacs > 0;
            }
        }
    }
}

impl<'g> Solver for CnfSolver<'g> {
    fn stats(&self) -> &SolverStats {
        &self.stats
    }

    fn stats_mut(&mut self) -> &mut SolverStats {
        &mut self.stats
    }

    fn open_context_impl(&mut self) {
        let a = self.next_var;
        self.next_var += 1;
        self.activation_stack.push(a);
    }

    fn close_context_impl(&mut self) {
        self.activation_stack.pop().expect("close_context called without a matching open_context");
    }

    fn add_constraint_impl(&mut self, formula: &FormulaRef, params: Option<&[CharId]>) {
        let activation = self.activation_stack.clone();
        let mut enc = TseitinEncoder::new(self.resolver, params);
        let mut sink = ActivatedSink {
            sat: &mut self.sat,
            next_var: &mut self.next_var,
            activation: &activation,
            log: &mut self.clauses_log,
        };
        enc.assert(formula, &mut sink);
    }

    fn must_be_true_impl(&mut self, id: VarId) -> bool {
        !self.solve_assuming(&[Lit::from_dimacs(-id as isize)])
    }

    fn must_be_false_impl(&mut self, id: VarId) -> bool {
        !self.solve_assuming(&[Lit::from_dimacs(id as isize)])
    }

    fn satisfiable_impl(&mut self) -> bool {
        let sat = self.solve_assuming(&[]);
        if sat {
            self.cache_model();
        }
        sat
    }

    fn only_one_model_impl(&mut self) -> bool {
        self.open_context_impl();
        let blocking: Vec<VarId> = (1..=self.num_orig_vars as VarId)
            .map(|v| if self.last_model[v as usize] { -v } else { v })
            .collect();
        let activation = self.activation_stack.clone();
        {
            let mut sink = ActivatedSink {
                sat: &mut self.sat,
                next_var: &mut self.next_var,
                activation: &activation,
                log: &mut self.clauses_log,
            };
            sink.add_clause(&blocking);
        }
        let still_sat = self.solve_assuming(&[]);
        self.close_context_impl();
        !still_sat
    }

    fn num_models_impl(&mut self) -> u64 {
        let mut count = 0u64;
        self.count_models_rec(1, &mut count);
        count
    }

    fn generate_models_impl(&mut self) -> Vec<Vec<bool>> {
        let mut out = Vec::new();
        self.collect_models_rec(1, &mut vec![false; self.num_orig_vars + 1], &mut out);
        out
    }

    fn get_assignment_impl(&self) -> &[bool] {
        &self.last_model
    }

    fn num_vars_impl(&self) -> usize {
        self.num_orig_vars
    }

    fn write_dimacs(&self, out: &mut dyn io::Write) -> io::Result<()> {
        writeln!(out, "p cnf {} {}", self.next_var - 1, self.clauses_log.len())?;
        for clause in &self.clauses_log {
            for lit in clause {
                write!(out, "{lit} ")?;
            }
            writeln!(out, "0")?;
        }
        Ok(())
    }
}

impl CnfSolver<'_> {
    fn count_models_rec(&mut self, next_orig: VarId, count: &mut u64) {
        if next_orig as usize > self.num_orig_vars {
            *count += 1;
            return;
        }
        for &val in &[true, false] {
            let lit = Lit::from_dimacs(if val { next_orig as isize } else { -(next_orig as isize) });
            if self.solve_assuming(&[lit]) {
                self.activation_stack.push(lit_as_forced_var(lit));
                self.count_models_rec(next_orig + 1, count);
                self.activation_stack.pop();
            }
        }
    }

    fn collect_models_rec(&mut self, next_orig: VarId, partial: &mut [bool], out: &mut Vec<Vec<bool>>) {
        if next_orig as usize > self.num_orig_vars {
            out.push(partial.to_vec());
            return;
        }
        for &val in &[true, false] {
            let lit = Lit::from_dimacs(if val { next_orig as isize } else { -(next_orig as isize) });
            if self.solve_assuming(&[lit]) {
                partial[next_orig as usize] = val;
                self.activation_stack.push(lit_as_forced_var(lit));
                self.collect_models_rec(next_orig + 1, partial, out);
                self.activation_stack.pop();
            }
        }
    }
}

/// `count_models_rec`/`collect_models_rec` push values onto
/// `activation_stack` purely to thread the fixed-so-far assumptions
/// through `context_assumptions()`; these are never real activation
/// variables and are always popped before the stack is used again for
/// actual context bookkeeping (the recursion is strictly nested inside
/// one `num_models`/`generate_models` call, with no intervening
/// `open_context`/`close_context`).
fn lit_as_forced_var(lit: Lit) -> VarId {
    lit.to_dimacs() as VarId
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::Formula;

    struct NoMappings;
    impl MappingResolver for NoMappings {
        fn resolve(&self, _map_id: crate::formula::MapId, _char_id: CharId) -> VarId {
            unreachable!("tests below use no Mapping leaves")
        }
    }

    #[test]
    fn satisfiable_and_model_count_of_implication() {
        let mut solver = CnfSolver::new(2, &NoMappings);
        let f = Formula::implies(Formula::var(1), Formula::var(2));
        solver.add_constraint(&f, None);
        assert!(solver.satisfiable());
        assert_eq!(solver.num_models(), 3);
    }

    #[test]
    fn only_one_model_detects_uniqueness() {
        let mut solver = CnfSolver::new(2, &NoMappings);
        let f = Formula::implies(Formula::var(1), Formula::var(2));
        solver.add_constraint(&f, None);
        assert!(solver.satisfiable());
        assert!(!solver.only_one_model());

        solver.add_constraint(&Formula::var(1), None);
        assert!(solver.satisfiable());
        assert!(solver.only_one_model());
    }

    #[test]
    fn push_pop_restores_model_count() {
        let mut solver = CnfSolver::new(4, &NoMappings);
        let restriction = Formula::and(vec![
            Formula::implies(Formula::var(1), Formula::var(2)),
            Formula::implies(Formula::var(3), Formula::var(4)),
            Formula::or(vec![Formula::not(Formula::var(2)), Formula::not(Formula::var(4))]),
        ]);
        solver.add_constraint(&restriction, None);
        assert!(solver.satisfiable());
        assert_eq!(solver.num_models(), 5);

        solver.open_context();
        solver.add_constraint(&Formula::and(vec![Formula::var(1), Formula::var(3)]), None);
        assert!(!solver.satisfiable());
        solver.close_context();

        assert!(solver.satisfiable());
        assert_eq!(solver.num_models(), 5);
    }
}
