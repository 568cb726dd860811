//! Colored directed-graph embedding of formulas and knowledge states,
//! used for canonicalization (spec §4.1, §4.4 phase 3, §4.5).
//!
//! Grounded on `cobra::Formula::AddToGraph` (one vertex per non-literal
//! node, two polarity vertices per variable) and on `strix`'s
//! `parity::game::Region`/`FixedBitSet` idiom for bookkeeping sets of
//! vertices cheaply. Canonicalization itself is delegated to `nauty-pet`,
//! playing the role `bliss` plays in the original implementation.

use std::collections::HashMap;
use std::rc::Rc;

use nauty_pet::canon::CanonLabeling;
use petgraph::graph::{DiGraph, NodeIndex};

use super::tseitin::MappingResolver;
use super::{CharId, Formula, FormulaRef, VarId};

/// Vertex color: either an operator's node-kind id, or a literal vertex
/// tagged by its variable's equivalence group. The two literal vertices
/// of one variable share this color — spec §4.4 phase 3 colors both
/// polarity vertices of a variable alike, distinguishing them only by
/// the directed pos↔neg edge pair between them (`cobra::Formula::AddToGraph`
/// gives both the same bliss color for the same reason).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Color {
    Operator(u32),
    Literal(u32),
}

/// The mutable digraph being built, before canonicalization.
pub type Graph = DiGraph<Color, ()>;

/// The canonical form of a [`Graph`]: two graphs with this canonical
/// form equal are isomorphic as colored digraphs. Used directly as a
/// memo key by the optimal analyzer (spec §4.7, §9).
pub type Canonical = CanonLabeling<Color, (), petgraph::Directed>;

/// Computes the canonical labeling of `graph`, suitable for hashing and
/// equality comparisons independent of vertex numbering.
pub fn canonicalize(graph: &Graph) -> Canonical {
    CanonLabeling::from(graph)
}

/// Incrementally builds a colored digraph out of one or more formulas,
/// sharing literal and operator vertices across calls so that embedding
/// a whole knowledge state (restriction plus every outcome applied so
/// far) produces a single connected-where-shared graph rather than one
/// disjoint copy per conjunct.
pub struct GraphBuilder<'a> {
    resolver: &'a dyn MappingResolver,
    var_group: &'a [u32],
    graph: Graph,
    lit_nodes: HashMap<VarId, (NodeIndex, NodeIndex)>,
    op_nodes: HashMap<usize, NodeIndex>,
}

impl<'a> GraphBuilder<'a> {
    /// `var_group[i]` is the equivalence-group color of variable `i + 1`
    /// (spec §4.5); pass an all-zero slice before any coloring has been
    /// computed.
    pub fn new(resolver: &'a dyn MappingResolver, var_group: &'a [u32]) -> Self {
        Self {
            resolver,
            var_group,
            graph: Graph::new(),
            lit_nodes: HashMap::new(),
            op_nodes: HashMap::new(),
        }
    }

    /// Embeds `formula` (under `params`, if it is parameterized) into the
    /// graph, returning the vertex representing it.
    pub fn embed(&mut self, formula: &FormulaRef, params: Option<&[CharId]>) -> NodeIndex {
        self.node_for(formula, params)
    }

    pub fn finish(self) -> Graph {
        self.graph
    }

    fn node_for(&mut self, formula: &FormulaRef, params: Option<&[CharId]>) -> NodeIndex {
        if formula.is_literal() {
            let id = resolve_literal_id(formula, params, self.resolver);
            return self.literal_node(id);
        }
        let key = Rc::as_ptr(formula) as usize;
        if let Some(&n) = self.op_nodes.get(&key) {
            return n;
        }
        let node = self.graph.add_node(Color::Operator(formula.node_kind()));
        self.op_nodes.insert(key, node);
        for child in formula.children() {
            let child_node = self.node_for(child, params);
            self.graph.add_edge(node, child_node, ());
        }
        node
    }

    fn literal_node(&mut self, id: VarId) -> NodeIndex {
        let key = id.abs();
        if let Some(&(pos, neg)) = self.lit_nodes.get(&key) {
            return if id < 0 { neg } else { pos };
        }
        let group = self.var_group.get((key - 1) as usize).copied().unwrap_or(0);
        let pos = self.graph.add_node(Color::Literal(group));
        let neg = self.graph.add_node(Color::Literal(group));
        self.graph.add_edge(pos, neg, ());
        self.graph.add_edge(neg, pos, ());
        self.lit_nodes.insert(key, (pos, neg));
        if id < 0 {
            neg
        } else {
            pos
        }
    }
}

/// Resolves a literal-shaped formula (`Variable`, `Mapping`, or `Not` of
/// either) down to its signed variable id.
fn resolve_literal_id(
    formula: &FormulaRef,
    params: Option<&[CharId]>,
    resolver: &dyn MappingResolver,
) -> VarId {
    match formula.as_ref() {
        Formula::Variable(id) => *id,
        Formula::Mapping { map_id, param_pos, .. } => {
            let p = params.expect("Mapping leaf embedded with no parameter tuple bound");
            resolver.resolve(*map_id, p[*param_pos])
        }
        Formula::Not(inner) => -resolve_literal_id(inner, params, resolver),
        other => panic!("resolve_literal_id called on non-literal formula {other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct IdentityMap;
    impl MappingResolver for IdentityMap {
        fn resolve(&self, _map_id: super::super::MapId, char_id: CharId) -> VarId {
            char_id as VarId + 1
        }
    }

    #[test]
    fn literal_vertices_share_an_edge_pair() {
        let no_groups = [0u32; 8];
        let mut builder = GraphBuilder::new(&IdentityMap, &no_groups);
        let v1 = Formula::var(1);
        let not_v1 = Formula::not(v1.clone());
        let n1 = builder.embed(&v1, None);
        let n2 = builder.embed(&not_v1, None);
        assert_ne!(n1, n2);
        let g = builder.finish();
        assert!(g.find_edge(n1, n2).is_some());
        assert!(g.find_edge(n2, n1).is_some());
    }

    #[test]
    fn isomorphic_formulas_canonicalize_equal() {
        let no_groups = [0u32; 8];
        let f1 = Formula::and(vec![Formula::var(1), Formula::var(2)]);
        let f2 = Formula::and(vec![Formula::var(2), Formula::var(1)]);

        let mut b1 = GraphBuilder::new(&IdentityMap, &no_groups);
        b1.embed(&f1, None);
        let g1 = b1.finish();

        let mut b2 = GraphBuilder::new(&IdentityMap, &no_groups);
        b2.embed(&f2, None);
        let g2 = b2.finish();

        assert_eq!(canonicalize(&g1), canonicalize(&g2));
    }

    #[test]
    fn differently_colored_literals_canonicalize_distinctly() {
        let groups_same = [0u32, 0];
        let groups_diff = [0u32, 1];

        let f = Formula::and(vec![Formula::var(1), Formula::var(2)]);

        let mut b1 = GraphBuilder::new(&IdentityMap, &groups_same);
        b1.embed(&f, None);
        let g1 = b1.finish();

        let mut b2 = GraphBuilder::new(&IdentityMap, &groups_diff);
        b2.embed(&f, None);
        let g2 = b2.finish();

        assert_ne!(canonicalize(&g1), canonicalize(&g2));
    }
}
