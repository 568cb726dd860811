//! Propositional formula representation, parameterized by alphabet
//! substitutions ("mappings"), with Tseitin CNF conversion and colored
//! graph embedding for canonicalization.
//!
//! The AST is a DAG: shared subformulae are interned as [`Rc<Formula>`]
//! rather than arena-allocated with raw indices, since this crate has no
//! single parse-time arena owner that every other structure borrows from
//! for the process lifetime (spec §9, design note (b): reference-counted
//! nodes, avoiding raw cyclic ownership).

pub mod graph;
pub mod operator_enums;
pub mod tseitin;

use std::fmt;
use std::rc::Rc;

pub use operator_enums::CountKind;

/// Identifier of a declared propositional variable. Always positive;
/// negation is expressed by negating a literal id, never by negating
/// a `VarId` itself.
pub type VarId = i64;

/// Identifier of a [`crate::game::Mapping`] table.
pub type MapId = usize;

/// An alphabet symbol index, `0..alphabet_len`.
pub type CharId = usize;

/// A reference-counted formula node, cheaply cloned to share subtrees.
pub type FormulaRef = Rc<Formula>;

/// Tagged union of propositional formula nodes (spec §3).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Formula {
    /// Leaf: a literal over a concrete variable. Positive `id` for the
    /// variable itself, negative for its negation.
    Variable(VarId),
    /// Leaf: resolves under a parameter tuple `P` to
    /// `variables[mappings[map_id][P[param_pos]]]`.
    Mapping {
        ident: String,
        map_id: MapId,
        param_pos: usize,
    },
    Not(FormulaRef),
    And(Vec<FormulaRef>),
    Or(Vec<FormulaRef>),
    Implies(FormulaRef, FormulaRef),
    Equiv(FormulaRef, FormulaRef),
    Count {
        kind: CountKind,
        k: usize,
        children: Vec<FormulaRef>,
    },
}

impl Formula {
    /// Wraps `self` as an `Rc`, the usual way formulas are stored once built.
    pub fn into_ref(self) -> FormulaRef {
        Rc::new(self)
    }

    /// Smart constructor for [`Formula::Variable`].
    pub fn var(id: VarId) -> FormulaRef {
        assert_ne!(id, 0, "variable id 0 is forbidden (spec §3)");
        Formula::Variable(id).into_ref()
    }

    /// Smart constructor for [`Formula::Mapping`].
    pub fn mapping(ident: impl Into<String>, map_id: MapId, param_pos: usize) -> FormulaRef {
        Formula::Mapping {
            ident: ident.into(),
            map_id,
            param_pos,
        }
        .into_ref()
    }

    /// Smart constructor for [`Formula::Not`], normalizing double negation
    /// (`neg(Not(x)) = x`) exactly as [`Formula::neg`] does.
    pub fn not(child: FormulaRef) -> FormulaRef {
        child.neg()
    }

    /// Smart constructor for [`Formula::And`], flattening nested `And`
    /// children so an `And` never directly contains another `And`
    /// (spec §3 invariant).
    pub fn and(children: Vec<FormulaRef>) -> FormulaRef {
        Formula::And(flatten(children, |f| matches!(f.as_ref(), Formula::And(_)))).into_ref()
    }

    /// Smart constructor for [`Formula::Or`], with the same flattening
    /// guarantee as [`Formula::and`].
    pub fn or(children: Vec<FormulaRef>) -> FormulaRef {
        Formula::Or(flatten(children, |f| matches!(f.as_ref(), Formula::Or(_)))).into_ref()
    }

    pub fn implies(l: FormulaRef, r: FormulaRef) -> FormulaRef {
        Formula::Implies(l, r).into_ref()
    }

    pub fn equiv(l: FormulaRef, r: FormulaRef) -> FormulaRef {
        Formula::Equiv(l, r).into_ref()
    }

    pub fn count(kind: CountKind, k: usize, children: Vec<FormulaRef>) -> FormulaRef {
        assert!(k <= children.len(), "counting threshold exceeds arity");
        Formula::Count { kind, k, children }.into_ref()
    }

    pub fn at_least(k: usize, children: Vec<FormulaRef>) -> FormulaRef {
        Self::count(CountKind::AtLeast, k, children)
    }

    pub fn at_most(k: usize, children: Vec<FormulaRef>) -> FormulaRef {
        Self::count(CountKind::AtMost, k, children)
    }

    pub fn exactly(k: usize, children: Vec<FormulaRef>) -> FormulaRef {
        Self::count(CountKind::Exactly, k, children)
    }

    /// Direct children of this node, in declaration order.
    pub fn children(&self) -> Vec<&FormulaRef> {
        match self {
            Formula::Variable(_) | Formula::Mapping { .. } => Vec::new(),
            Formula::Not(c) => vec![c],
            Formula::And(cs) | Formula::Or(cs) => cs.iter().collect(),
            Formula::Implies(l, r) | Formula::Equiv(l, r) => vec![l, r],
            Formula::Count { children, .. } => children.iter().collect(),
        }
    }

    /// The node-kind identifier used to color non-literal vertices in the
    /// graph embedding (spec §3, §4.1).
    pub fn node_kind(&self) -> u32 {
        use operator_enums::base_id;
        match self {
            Formula::Variable(_) | Formula::Mapping { .. } => {
                unreachable!("literals have no node kind; they color as variables")
            }
            Formula::Not(_) => base_id::NOT,
            Formula::And(_) => base_id::AND,
            Formula::Or(_) => base_id::OR,
            Formula::Implies(..) => base_id::IMPLIES,
            Formula::Equiv(..) => base_id::EQUIV,
            Formula::Count { kind, k, .. } => kind.node_kind(*k),
        }
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn size(&self) -> usize {
        1 + self.children().iter().map(|c| c.size()).sum::<usize>()
    }

    /// True for `Variable`, `Mapping`, and `Not` of a literal.
    pub fn is_literal(&self) -> bool {
        match self {
            Formula::Variable(_) | Formula::Mapping { .. } => true,
            Formula::Not(c) => c.is_literal(),
            _ => false,
        }
    }

    /// Negates a formula, collapsing `Not(Not(x))` to `x` rather than
    /// ever producing a double negation (spec §4.1).
    pub fn neg(self: &FormulaRef) -> FormulaRef {
        match self.as_ref() {
            Formula::Not(inner) => inner.clone(),
            _ => Formula::Not(self.clone()).into_ref(),
        }
    }

    /// Evaluates this formula under a concrete variable assignment,
    /// resolving `Mapping` leaves through `resolve` and `params`.
    ///
    /// Used directly by the enumeration solver back-end, which re-checks
    /// every stored model against each added constraint rather than
    /// emitting clauses for it.
    pub fn eval(
        &self,
        params: Option<&[CharId]>,
        resolve: &dyn Fn(MapId, CharId) -> VarId,
        assign: &dyn Fn(VarId) -> bool,
    ) -> bool {
        match self {
            Formula::Variable(id) => lit_value(*id, assign),
            Formula::Mapping { map_id, param_pos, .. } => {
                let p = params.expect("Mapping leaf evaluated with no parameter tuple bound");
                let resolved = resolve(*map_id, p[*param_pos]);
                lit_value(resolved, assign)
            }
            Formula::Not(c) => !c.eval(params, resolve, assign),
            Formula::And(cs) => cs.iter().all(|c| c.eval(params, resolve, assign)),
            Formula::Or(cs) => cs.iter().any(|c| c.eval(params, resolve, assign)),
            Formula::Implies(l, r) => !l.eval(params, resolve, assign) || r.eval(params, resolve, assign),
            Formula::Equiv(l, r) => l.eval(params, resolve, assign) == r.eval(params, resolve, assign),
            Formula::Count { kind, k, children } => {
                let count = children
                    .iter()
                    .filter(|c| c.eval(params, resolve, assign))
                    .count();
                match kind {
                    CountKind::AtLeast => count >= *k,
                    CountKind::AtMost => count <= *k,
                    CountKind::Exactly => count == *k,
                }
            }
        }
    }
}

/// Interprets a signed literal id against an assignment over positive ids.
fn lit_value(id: VarId, assign: &dyn Fn(VarId) -> bool) -> bool {
    if id < 0 {
        !assign(-id)
    } else {
        assign(id)
    }
}

/// Flattens direct children matching `is_same_op` into the parent's
/// child list, implementing the And/Or associativity invariant of spec §3.
fn flatten(children: Vec<FormulaRef>, is_same_op: impl Fn(&FormulaRef) -> bool) -> Vec<FormulaRef> {
    let mut out = Vec::with_capacity(children.len());
    for child in children {
        if is_same_op(&child) {
            out.extend(child.children().into_iter().cloned());
        } else {
            out.push(child);
        }
    }
    out
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Formula::Variable(id) => {
                if *id < 0 {
                    write!(f, "!v{}", -id)
                } else {
                    write!(f, "v{id}")
                }
            }
            Formula::Mapping { ident, param_pos, .. } => write!(f, "{ident}${}", param_pos + 1),
            Formula::Not(c) => write!(f, "!{c}"),
            Formula::And(cs) => write!(f, "({})", join(cs, " & ")),
            Formula::Or(cs) => write!(f, "({})", join(cs, " | ")),
            Formula::Implies(l, r) => write!(f, "({l} -> {r})"),
            Formula::Equiv(l, r) => write!(f, "({l} <-> {r})"),
            Formula::Count { kind, k, children } => {
                write!(f, "{kind}-{k}({})", join(children, ", "))
            }
        }
    }
}

fn join(items: &[FormulaRef], sep: &str) -> String {
    items
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(sep)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattening_merges_nested_and() {
        let a = Formula::var(1);
        let b = Formula::var(2);
        let c = Formula::var(3);
        let inner = Formula::and(vec![a.clone(), b.clone()]);
        let outer = Formula::and(vec![inner, c.clone()]);
        match outer.as_ref() {
            Formula::And(children) => assert_eq!(children.len(), 3),
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn negation_cancels_double_not() {
        let a = Formula::var(1);
        let not_a = Formula::not(a.clone());
        let not_not_a = Formula::not(not_a.clone());
        assert_eq!(not_not_a, a);
    }

    #[test]
    fn display_round_trip_shape() {
        let a = Formula::var(1);
        let b = Formula::var(2);
        let f = Formula::implies(Formula::and(vec![a.clone(), b.clone()]), Formula::equiv(a, b));
        assert_eq!(f.to_string(), "((v1 & v2) -> (v1 <-> v2))");
    }

    #[test]
    fn is_literal_through_mapping_and_not() {
        let m = Formula::mapping("f", 0, 0);
        assert!(m.is_literal());
        assert!(Formula::not(m).is_literal());
        let and = Formula::and(vec![Formula::var(1), Formula::var(2)]);
        assert!(!and.is_literal());
    }

    #[test]
    fn eval_matches_truth_table_for_implication() {
        let f = Formula::implies(Formula::var(1), Formula::var(2));
        let resolve = |_: MapId, _: CharId| unreachable!("no mappings in this formula");
        let assign_both_true = |id: VarId| matches!(id, 1 | 2);
        assert!(f.eval(None, &resolve, &assign_both_true));
        let assign_only_first = |id: VarId| id == 1;
        assert!(!f.eval(None, &resolve, &assign_only_first));
    }

    #[test]
    fn eval_counts_true_children_for_exactly() {
        let f = Formula::exactly(2, vec![Formula::var(1), Formula::var(2), Formula::var(3)]);
        let resolve = |_: MapId, _: CharId| unreachable!();
        let assign = |id: VarId| id == 1 || id == 2;
        assert!(f.eval(None, &resolve, &assign));
        let assign_all = |_: VarId| true;
        assert!(!f.eval(None, &resolve, &assign_all));
    }

    #[test]
    fn node_kinds_differ_by_count_threshold() {
        let children = vec![Formula::var(1), Formula::var(2), Formula::var(3)];
        let at_least_1 = Formula::at_least(1, children.clone());
        let at_least_2 = Formula::at_least(2, children);
        assert_ne!(at_least_1.node_kind(), at_least_2.node_kind());
    }
}
