//! Incremental solver abstraction (spec §4.2): satisfiability, fixed-variable
//! detection, model enumeration/counting and uniqueness testing over a
//! stack of nested push/pop contexts.
//!
//! Mirrors `cobra::Solver`'s split between a stable, timed public API and
//! a per-back-end implementation: the public methods here are default
//! trait methods that time themselves into [`SolverStats`] and delegate
//! to the `_impl` methods each back-end provides, the same shape as
//! `cobra/src/solver.h`'s public wrappers calling private `_Foo`
//! virtuals. The timing/`Display` idiom itself is `strix`'s
//! `parity::solver::SolvingStats`.

pub mod cnf;
pub mod enumeration;

use std::fmt;
use std::io;
use std::time::{Duration, Instant};

use crate::formula::{CharId, FormulaRef, VarId};

/// Cumulative call counts and wall-clock time per solver operation
/// group, reinstated from `cobra::SolverStats` (spec §4.2, "All timed
/// operations must update per-solver statistics").
#[derive(Debug, Default, Clone, Copy)]
pub struct SolverStats {
    pub fixed_calls: u64,
    pub fixed_time: Duration,
    pub sat_calls: u64,
    pub sat_time: Duration,
    pub models_calls: u64,
    pub models_time: Duration,
}

impl fmt::Display for SolverStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fixed: {} calls / {:?}, sat: {} calls / {:?}, models: {} calls / {:?}",
            self.fixed_calls, self.fixed_time, self.sat_calls, self.sat_time, self.models_calls, self.models_time,
        )
    }
}

/// Incremental, push/pop-scoped satisfiability solver over a [`crate::formula::Formula`]
/// knowledge base. The optimal analyzer (`crate::strategy::optimal`) and
/// the well-formedness check (`crate::game::wellformed`) depend only on
/// this trait, not on a concrete back-end (spec §9).
pub trait Solver {
    fn stats(&self) -> &SolverStats;
    fn stats_mut(&mut self) -> &mut SolverStats;

    fn open_context_impl(&mut self);
    fn close_context_impl(&mut self);
    fn add_constraint_impl(&mut self, formula: &FormulaRef, params: Option<&[CharId]>);
    fn must_be_true_impl(&mut self, id: VarId) -> bool;
    fn must_be_false_impl(&mut self, id: VarId) -> bool;
    fn satisfiable_impl(&mut self) -> bool;
    fn only_one_model_impl(&mut self) -> bool;
    fn num_models_impl(&mut self) -> u64;
    fn generate_models_impl(&mut self) -> Vec<Vec<bool>>;
    fn get_assignment_impl(&self) -> &[bool];
    fn num_vars_impl(&self) -> usize;

    /// Dumps the current CNF in DIMACS format. Only the CNF/SAT back-end
    /// implements this (`cobra::CnfFormula::WriteDimacs`, reinstated for
    /// debugging); the enumeration back-end keeps the default, which
    /// reports the operation as unsupported.
    fn write_dimacs(&self, _out: &mut dyn io::Write) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "this solver back-end has no CNF to dump"))
    }

    /// Opens a new nested context. Must be matched by exactly one
    /// [`Solver::close_context`] at the same nesting depth.
    fn open_context(&mut self) {
        log::debug!("open_context");
        self.open_context_impl();
    }

    /// Closes the innermost open context, undoing everything added
    /// since the matching [`Solver::open_context`].
    fn close_context(&mut self) {
        log::debug!("close_context");
        self.close_context_impl();
    }

    /// Permanently adds `formula` (under `params`, if parameterized) to
    /// the current context.
    fn add_constraint(&mut self, formula: &FormulaRef, params: Option<&[CharId]>) {
        log::trace!("add_constraint({formula})");
        self.add_constraint_impl(formula, params);
    }

    fn must_be_true(&mut self, id: VarId) -> bool {
        let start = Instant::now();
        let r = self.must_be_true_impl(id);
        let elapsed = start.elapsed();
        let st = self.stats_mut();
        st.fixed_calls += 1;
        st.fixed_time += elapsed;
        r
    }

    fn must_be_false(&mut self, id: VarId) -> bool {
        let start = Instant::now();
        let r = self.must_be_false_impl(id);
        let elapsed = start.elapsed();
        let st = self.stats_mut();
        st.fixed_calls += 1;
        st.fixed_time += elapsed;
        r
    }

    /// Number of original variables currently forced to a value.
    fn num_fixed_vars(&mut self) -> usize {
        let n = self.num_vars_impl();
        (1..=n as VarId).filter(|&v| self.must_be_true(v) || self.must_be_false(v)).count()
    }

    /// Is the current constraint set satisfiable?
    fn satisfiable(&mut self) -> bool {
        let start = Instant::now();
        let r = self.satisfiable_impl();
        let elapsed = start.elapsed();
        let st = self.stats_mut();
        st.sat_calls += 1;
        st.sat_time += elapsed;
        r
    }

    /// Must be called immediately after a positive [`Solver::satisfiable`]:
    /// true iff the model just found is the unique model.
    fn only_one_model(&mut self) -> bool {
        let start = Instant::now();
        let r = self.only_one_model_impl();
        let elapsed = start.elapsed();
        let st = self.stats_mut();
        st.sat_calls += 1;
        st.sat_time += elapsed;
        r
    }

    /// Total number of models over original variables.
    fn num_models(&mut self) -> u64 {
        let start = Instant::now();
        let r = self.num_models_impl();
        let elapsed = start.elapsed();
        let st = self.stats_mut();
        st.models_calls += 1;
        st.models_time += elapsed;
        r
    }

    /// Enumerates every model over original variables.
    fn generate_models(&mut self) -> Vec<Vec<bool>> {
        let start = Instant::now();
        let r = self.generate_models_impl();
        let elapsed = start.elapsed();
        let st = self.stats_mut();
        st.models_calls += 1;
        st.models_time += elapsed;
        r
    }

    /// The last model found by [`Solver::satisfiable`], indexed by
    /// variable id (index 0 is unused padding).
    fn get_assignment(&self) -> &[bool] {
        self.get_assignment_impl()
    }
}
