//! Tseitin transformation: converts a [`Formula`] into clauses over a
//! target solver, introducing auxiliary variables for non-leaf
//! subformulas rather than blowing up with naive CNF distribution.
//!
//! Grounded on the sequential-counter cardinality encoding in
//! `meyerphi-strix`'s `controller::machine::sat::minimal_model`, reused
//! here for the three counting operators instead of just a single
//! "at most one" constraint.

use std::collections::HashMap;
use std::rc::Rc;

use super::operator_enums::CountKind;
use super::{CharId, Formula, FormulaRef, MapId, VarId};

/// Destination for clauses emitted during Tseitin transformation.
///
/// Implemented by each [`crate::solver`] back-end over its own variable
/// pool (a `varisat::Solver` for the CNF back-end, a throwaway one for
/// the enumeration back-end's one-time model precomputation).
pub trait ClauseSink {
    /// Allocates and returns a fresh, never-before-seen variable id.
    fn fresh_var(&mut self) -> VarId;
    /// Adds one clause, a disjunction of the given signed literals.
    fn add_clause(&mut self, lits: &[VarId]);
}

/// Resolves a `Mapping` leaf's `(map_id, char_id)` pair to a concrete
/// variable id. Implemented by [`crate::game::Game`].
pub trait MappingResolver {
    fn resolve(&self, map_id: MapId, char_id: CharId) -> VarId;
}

/// Stateful Tseitin encoder for a single formula assertion.
///
/// A fresh encoder should be used per [`crate::solver::Solver::add_constraint`]
/// call: the auxiliary-variable cache is keyed by node pointer identity
/// and is only valid for as long as the clauses it produced remain in
/// the sink (i.e. until the enclosing context is popped).
pub struct TseitinEncoder<'a> {
    resolver: &'a dyn MappingResolver,
    params: Option<&'a [CharId]>,
    cache: HashMap<usize, VarId>,
}

impl<'a> TseitinEncoder<'a> {
    pub fn new(resolver: &'a dyn MappingResolver, params: Option<&'a [CharId]>) -> Self {
        Self {
            resolver,
            params,
            cache: HashMap::new(),
        }
    }

    /// Asserts `formula` as true in `sink`, using the direct top-level
    /// encodings of spec §4.1 where available to avoid an unnecessary
    /// auxiliary variable.
    pub fn assert(&mut self, formula: &FormulaRef, sink: &mut dyn ClauseSink) {
        match formula.as_ref() {
            Formula::And(children) => {
                for c in children {
                    self.assert(c, sink);
                }
            }
            Formula::Or(children) => {
                let lits: Vec<VarId> = children.iter().map(|c| self.literal(c, sink)).collect();
                sink.add_clause(&lits);
            }
            Formula::Implies(l, r) => {
                let ll = self.literal(l, sink);
                let rl = self.literal(r, sink);
                sink.add_clause(&[-ll, rl]);
            }
            Formula::Equiv(l, r) => {
                let ll = self.literal(l, sink);
                let rl = self.literal(r, sink);
                sink.add_clause(&[-ll, rl]);
                sink.add_clause(&[ll, -rl]);
            }
            _ => {
                let l = self.literal(formula, sink);
                sink.add_clause(&[l]);
            }
        }
    }

    /// Returns the literal representing `formula` — resolved directly for
    /// leaves, `-t(child)` reused for `Not` of a literal, or a cached
    /// auxiliary variable `t(formula)` for anything else, allocating and
    /// defining it on first use.
    fn literal(&mut self, formula: &FormulaRef, sink: &mut dyn ClauseSink) -> VarId {
        match formula.as_ref() {
            Formula::Variable(id) => *id,
            Formula::Mapping { map_id, param_pos, .. } => {
                let params = self
                    .params
                    .expect("Mapping leaf encountered with no parameter tuple bound");
                self.resolver.resolve(*map_id, params[*param_pos])
            }
            Formula::Not(inner) if inner.is_literal() => -self.literal(inner, sink),
            _ => self.cached_aux(formula, sink),
        }
    }

    fn cached_aux(&mut self, formula: &FormulaRef, sink: &mut dyn ClauseSink) -> VarId {
        let key = Rc::as_ptr(formula) as usize;
        if let Some(&t) = self.cache.get(&key) {
            return t;
        }
        let t = sink.fresh_var();
        self.cache.insert(key, t);
        self.encode_non_top(formula, t, sink);
        t
    }

    /// Emits the defining clauses `t ↔ formula` for a non-top occurrence.
    fn encode_non_top(&mut self, formula: &FormulaRef, t: VarId, sink: &mut dyn ClauseSink) {
        match formula.as_ref() {
            Formula::Variable(_) | Formula::Mapping { .. } => {
                unreachable!("literals are returned directly by literal(), never cached")
            }
            Formula::Not(child) => {
                let c = self.literal(child, sink);
                sink.add_clause(&[-t, -c]);
                sink.add_clause(&[t, c]);
            }
            Formula::And(children) => {
                let lits: Vec<VarId> = children.iter().map(|c| self.literal(c, sink)).collect();
                encode_and(t, &lits, sink);
            }
            Formula::Or(children) => {
                let lits: Vec<VarId> = children.iter().map(|c| self.literal(c, sink)).collect();
                let mut clause = vec![-t];
                clause.extend(lits.iter().copied());
                sink.add_clause(&clause);
                for l in lits {
                    sink.add_clause(&[t, -l]);
                }
            }
            Formula::Implies(l, r) => {
                let ll = self.literal(l, sink);
                let rl = self.literal(r, sink);
                sink.add_clause(&[-t, -ll, rl]);
                sink.add_clause(&[ll, t]);
                sink.add_clause(&[-rl, t]);
            }
            Formula::Equiv(l, r) => {
                let ll = self.literal(l, sink);
                let rl = self.literal(r, sink);
                sink.add_clause(&[-t, -ll, rl]);
                sink.add_clause(&[-t, ll, -rl]);
                sink.add_clause(&[t, ll, rl]);
                sink.add_clause(&[t, -ll, -rl]);
            }
            Formula::Count { kind, k, children } => {
                let lits: Vec<VarId> = children.iter().map(|c| self.literal(c, sink)).collect();
                tseitin_count(t, *kind, *k, &lits, sink);
            }
        }
    }
}

/// Emits `t ↔ AND(lits)`, shared by the `And` encoding and by the
/// sequential-counter base cases.
fn encode_and(t: VarId, lits: &[VarId], sink: &mut dyn ClauseSink) {
    let mut clause = vec![t];
    clause.extend(lits.iter().map(|l| -l));
    sink.add_clause(&clause);
    for &l in lits {
        sink.add_clause(&[-t, l]);
    }
}

/// Recursive sequential-counter encoding of `kind`-`k` over `list`,
/// defining `t` per spec §4.1: base cases collapse to a conjunction (or
/// its negation), otherwise an if-then-else gate splits on the first
/// literal and recurses with a fresh pair of counters.
fn tseitin_count(t: VarId, kind: CountKind, k: usize, list: &[VarId], sink: &mut dyn ClauseSink) {
    let at_least = matches!(kind, CountKind::AtLeast | CountKind::Exactly);
    let at_most = matches!(kind, CountKind::AtMost | CountKind::Exactly);
    tseitin_count_rec(t, at_least, at_most, k, list, sink);
}

fn tseitin_count_rec(
    t: VarId,
    at_least: bool,
    at_most: bool,
    k: usize,
    list: &[VarId],
    sink: &mut dyn ClauseSink,
) {
    let n = list.len();
    if k == n {
        if at_least {
            encode_and(t, list, sink);
        } else {
            sink.add_clause(&[t]);
        }
        return;
    }
    if k == 0 {
        if at_most {
            let negs: Vec<VarId> = list.iter().map(|l| -l).collect();
            encode_and(t, &negs, sink);
        } else {
            sink.add_clause(&[t]);
        }
        return;
    }

    let t1 = sink.fresh_var();
    let t2 = sink.fresh_var();
    let c0 = list[0];

    // t <-> (c0 & t2) | (!c0 & t1), an if-then-else gate on c0.
    sink.add_clause(&[-c0, -t2, t]);
    sink.add_clause(&[-c0, t2, -t]);
    sink.add_clause(&[c0, -t1, t]);
    sink.add_clause(&[c0, t1, -t]);

    tseitin_count_rec(t1, at_least, at_most, k - 1, &list[1..], sink);
    tseitin_count_rec(t2, at_least, at_most, k, &list[1..], sink);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    /// An in-memory clause sink used only for testing, brute-force
    /// checked for equisatisfiability against the source formula.
    #[derive(Default)]
    struct VecSink {
        next_var: VarId,
        clauses: Vec<Vec<VarId>>,
    }

    impl VecSink {
        fn new(first_free_var: VarId) -> Self {
            Self {
                next_var: first_free_var,
                clauses: Vec::new(),
            }
        }
    }

    impl ClauseSink for VecSink {
        fn fresh_var(&mut self) -> VarId {
            let v = self.next_var;
            self.next_var += 1;
            v
        }

        fn add_clause(&mut self, lits: &[VarId]) {
            self.clauses.push(lits.to_vec());
        }
    }

    struct NoMappings;
    impl MappingResolver for NoMappings {
        fn resolve(&self, _map_id: MapId, _char_id: CharId) -> VarId {
            unreachable!("test formulas contain no Mapping leaves")
        }
    }

    fn clauses_sat(clauses: &[Vec<VarId>], assign: &HashMap<VarId, bool>) -> bool {
        clauses.iter().all(|clause| {
            clause.iter().any(|&lit| {
                let v = lit.abs();
                let val = *assign.get(&v).unwrap_or(&false);
                if lit < 0 {
                    !val
                } else {
                    val
                }
            })
        })
    }

    /// Brute-forces every assignment over `n_orig` original variables
    /// (ids `1..=n_orig`), extended with every combination of auxiliary
    /// variables, and checks that the CNF is satisfiable under an
    /// assignment to the originals iff the source formula is true there.
    fn assert_equisatisfiable(formula: &FormulaRef, n_orig: usize) {
        let mut sink = VecSink::new(n_orig as VarId + 1);
        let mut enc = TseitinEncoder::new(&NoMappings, None);
        enc.assert(formula, &mut sink);
        let n_aux = (sink.next_var - 1 - n_orig as VarId) as usize;

        for bits in 0..(1u32 << n_orig) {
            let mut assign: HashMap<VarId, bool> = HashMap::new();
            for i in 0..n_orig {
                assign.insert((i + 1) as VarId, (bits >> i) & 1 == 1);
            }
            let resolve = |_: MapId, _: CharId| unreachable!();
            let get = |id: VarId| *assign.get(&id).unwrap_or(&false);
            let formula_true = formula.eval(None, &resolve, &get);

            let mut any_aux_sat = false;
            for aux_bits in 0..(1u32 << n_aux) {
                for j in 0..n_aux {
                    assign.insert((n_orig + 1 + j) as VarId, (aux_bits >> j) & 1 == 1);
                }
                if clauses_sat(&sink.clauses, &assign) {
                    any_aux_sat = true;
                    break;
                }
            }
            assert_eq!(
                any_aux_sat, formula_true,
                "CNF/formula disagree at assignment bits={bits:#b}"
            );
        }
    }

    #[test]
    fn and_or_not_are_equisatisfiable() {
        let a = Formula::var(1);
        let b = Formula::var(2);
        let c = Formula::var(3);
        let f = Formula::and(vec![Formula::or(vec![a.clone(), b.clone()]), Formula::not(c)]);
        assert_equisatisfiable(&f, 3);
    }

    #[test]
    fn implies_and_equiv_are_equisatisfiable() {
        let a = Formula::var(1);
        let b = Formula::var(2);
        let f = Formula::equiv(Formula::implies(a.clone(), b.clone()), Formula::not(a));
        assert_equisatisfiable(&f, 2);
    }

    #[test]
    fn counting_operators_at_boundaries_are_equisatisfiable() {
        let children = |n: usize| (1..=n as VarId).map(Formula::var).collect::<Vec<_>>();
        for n in [1usize, 3, 4] {
            for k in [0usize, 1, n.saturating_sub(1), n] {
                assert_equisatisfiable(&Formula::at_least(k, children(n)), n);
                assert_equisatisfiable(&Formula::at_most(k, children(n)), n);
                assert_equisatisfiable(&Formula::exactly(k, children(n)), n);
            }
        }
    }

    #[test]
    fn exactly_two_of_five_has_ten_models() {
        let f = Formula::exactly(2, (1..=5).map(Formula::var).collect());
        let mut sink = VecSink::new(6);
        let mut enc = TseitinEncoder::new(&NoMappings, None);
        enc.assert(&f, &mut sink);
        let n_aux = (sink.next_var - 6) as usize;

        let mut model_count = 0;
        for bits in 0..(1u32 << 5) {
            let mut assign: HashMap<VarId, bool> = HashMap::new();
            for i in 0..5 {
                assign.insert((i + 1) as VarId, (bits >> i) & 1 == 1);
            }
            let mut any_aux_sat = false;
            for aux_bits in 0..(1u32 << n_aux) {
                for j in 0..n_aux {
                    assign.insert((6 + j) as VarId, (aux_bits >> j) & 1 == 1);
                }
                if clauses_sat(&sink.clauses, &assign) {
                    any_aux_sat = true;
                    break;
                }
            }
            if any_aux_sat {
                model_count += 1;
            }
        }
        assert_eq!(model_count, 10);
    }
}
