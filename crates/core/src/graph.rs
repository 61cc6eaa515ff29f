//! Pairwise relations and the conflict graph built from them.
//!
//! Nodes are shape indices `0..n`. Every shape is a node, including shapes
//! with no contacts at all. Edges carry the overlap area of the pair as
//! weight (0.0 for pure touches).

use crate::solver::{Mode, TouchPolicy};
use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Geometric relation between two shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RelationKind {
    /// No contact.
    None,
    /// Boundaries meet in isolated points only.
    CornerTouch,
    /// Boundaries share a segment of positive length.
    EdgeTouch,
    /// Interiors overlap with positive area.
    Overlap,
}

/// Classified relation of one candidate pair.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PairRelation {
    /// Lower shape index.
    pub a: usize,
    /// Higher shape index.
    pub b: usize,
    /// Relation kind.
    pub kind: RelationKind,
    /// Area of `A ∩ B` (0.0 unless `kind` is `Overlap`).
    pub overlap_area: f64,
}

impl PairRelation {
    /// Creates a relation, normalizing the pair so that `a < b`.
    pub fn new(a: usize, b: usize, kind: RelationKind, overlap_area: f64) -> Self {
        let (a, b) = if a <= b { (a, b) } else { (b, a) };
        let overlap_area = if kind == RelationKind::Overlap {
            overlap_area.max(0.0)
        } else {
            0.0
        };
        Self {
            a,
            b,
            kind,
            overlap_area,
        }
    }

    /// A relation for a pair that does not touch.
    pub fn disjoint(a: usize, b: usize) -> Self {
        Self::new(a, b, RelationKind::None, 0.0)
    }
}

/// Rule that decides which relations become conflict edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Edge iff the pair overlaps with positive area.
    OverlapOnly,
    /// Edge on any contact.
    AnyContact,
    /// Edge on edge touch or overlap; corner contact is allowed.
    EdgeOrOverlap,
}

impl ConflictPolicy {
    /// Policy for the given mode and touch policy.
    pub fn for_mode(mode: Mode, touch_policy: TouchPolicy) -> Self {
        match (mode, touch_policy) {
            (Mode::Overlaid, _) => ConflictPolicy::OverlapOnly,
            (Mode::Flat, TouchPolicy::Strict) => ConflictPolicy::AnyContact,
            (Mode::Flat, TouchPolicy::CornerAllowed) => ConflictPolicy::EdgeOrOverlap,
        }
    }

    /// Returns true if the relation conflicts under this policy.
    pub fn conflicts(self, relation: &PairRelation) -> bool {
        match self {
            ConflictPolicy::OverlapOnly => {
                relation.kind == RelationKind::Overlap && relation.overlap_area > 0.0
            }
            ConflictPolicy::AnyContact => relation.kind != RelationKind::None,
            ConflictPolicy::EdgeOrOverlap => matches!(
                relation.kind,
                RelationKind::EdgeTouch | RelationKind::Overlap
            ),
        }
    }
}

/// Undirected weighted conflict graph.
#[derive(Debug, Clone, Default)]
pub struct ConflictGraph {
    adjacency: Vec<Vec<usize>>,
    weights: BTreeMap<(usize, usize), f64>,
    node_weights: Vec<f64>,
}

impl ConflictGraph {
    /// Creates a graph with `n` isolated nodes.
    pub fn new(n: usize) -> Self {
        Self {
            adjacency: vec![Vec::new(); n],
            weights: BTreeMap::new(),
            node_weights: vec![0.0; n],
        }
    }

    /// Builds the graph from classified relations under a policy.
    ///
    /// The result depends only on the relation set, not on its order.
    pub fn from_relations(n: usize, relations: &[PairRelation], policy: ConflictPolicy) -> Self {
        let mut graph = Self::new(n);
        for relation in relations {
            if policy.conflicts(relation) {
                graph.add_edge(relation.a, relation.b, relation.overlap_area);
            }
        }
        graph
    }

    /// Sets per-node weights (shape areas), used for tie-breaking.
    pub fn with_node_weights(mut self, weights: Vec<f64>) -> Self {
        if weights.len() == self.adjacency.len() {
            self.node_weights = weights;
        }
        self
    }

    /// Adds an undirected edge. Self-loops and out-of-range nodes are ignored.
    pub fn add_edge(&mut self, a: usize, b: usize, weight: f64) {
        let n = self.adjacency.len();
        if a == b || a >= n || b >= n {
            return;
        }
        let key = (a.min(b), a.max(b));
        if self.weights.insert(key, weight).is_none() {
            insert_sorted(&mut self.adjacency[a], b);
            insert_sorted(&mut self.adjacency[b], a);
        }
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.weights.len()
    }

    /// Neighbors of a node in ascending order.
    pub fn neighbors(&self, node: usize) -> &[usize] {
        &self.adjacency[node]
    }

    /// Degree of a node.
    pub fn degree(&self, node: usize) -> usize {
        self.adjacency[node].len()
    }

    /// Returns true if the two nodes are adjacent.
    pub fn has_edge(&self, a: usize, b: usize) -> bool {
        self.weights.contains_key(&(a.min(b), a.max(b)))
    }

    /// Edge weight (overlap area), if the edge exists.
    pub fn weight(&self, a: usize, b: usize) -> Option<f64> {
        self.weights.get(&(a.min(b), a.max(b))).copied()
    }

    /// Node weight (shape area).
    pub fn node_weight(&self, node: usize) -> f64 {
        self.node_weights.get(node).copied().unwrap_or(0.0)
    }

    /// All edges as `(a, b, weight)` with `a < b`, in ascending order.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.weights.iter().map(|(&(a, b), &w)| (a, b, w))
    }

    /// Edge density: |E| / (N·(N−1)/2), or 0.0 for fewer than two nodes.
    pub fn density(&self) -> f64 {
        let n = self.node_count();
        if n < 2 {
            return 0.0;
        }
        let possible = n as f64 * (n as f64 - 1.0) / 2.0;
        self.edge_count() as f64 / possible
    }
}

fn insert_sorted(list: &mut Vec<usize>, value: usize) {
    if let Err(pos) = list.binary_search(&value) {
        list.insert(pos, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn relations() -> Vec<PairRelation> {
        vec![
            PairRelation::new(0, 1, RelationKind::Overlap, 25.0),
            PairRelation::new(1, 2, RelationKind::EdgeTouch, 0.0),
            PairRelation::new(2, 3, RelationKind::CornerTouch, 0.0),
            PairRelation::disjoint(3, 4),
        ]
    }

    #[test]
    fn test_pair_relation_normalizes_order() {
        let r = PairRelation::new(5, 2, RelationKind::Overlap, 3.0);
        assert_eq!((r.a, r.b), (2, 5));

        let touch = PairRelation::new(0, 1, RelationKind::EdgeTouch, 7.0);
        assert_eq!(touch.overlap_area, 0.0);
    }

    #[test]
    fn test_overlaid_policy_keeps_only_overlaps() {
        let g = ConflictGraph::from_relations(5, &relations(), ConflictPolicy::OverlapOnly);
        assert_eq!(g.node_count(), 5);
        assert_eq!(g.edge_count(), 1);
        assert!(g.has_edge(1, 0));
        assert_relative_eq!(g.weight(0, 1).unwrap(), 25.0);
    }

    #[test]
    fn test_strict_policy_keeps_all_contacts() {
        let policy = ConflictPolicy::for_mode(Mode::Flat, TouchPolicy::Strict);
        let g = ConflictGraph::from_relations(5, &relations(), policy);
        assert_eq!(g.edge_count(), 3);
        assert!(g.has_edge(2, 3));
        assert!(!g.has_edge(3, 4));
    }

    #[test]
    fn test_corner_allowed_policy_skips_corner_touch() {
        let policy = ConflictPolicy::for_mode(Mode::Flat, TouchPolicy::CornerAllowed);
        let g = ConflictGraph::from_relations(5, &relations(), policy);
        assert_eq!(g.edge_count(), 2);
        assert!(g.has_edge(1, 2));
        assert!(!g.has_edge(2, 3));
    }

    #[test]
    fn test_no_self_loops_or_duplicates() {
        let mut g = ConflictGraph::new(3);
        g.add_edge(1, 1, 4.0);
        g.add_edge(0, 2, 1.0);
        g.add_edge(2, 0, 1.0);
        g.add_edge(0, 9, 1.0);
        assert_eq!(g.edge_count(), 1);
        assert_eq!(g.neighbors(0), &[2]);
        assert_eq!(g.degree(1), 0);
    }

    #[test]
    fn test_order_independent_build() {
        let mut reversed = relations();
        reversed.reverse();
        let policy = ConflictPolicy::AnyContact;
        let g1 = ConflictGraph::from_relations(5, &relations(), policy);
        let g2 = ConflictGraph::from_relations(5, &reversed, policy);
        let e1: Vec<_> = g1.edges().collect();
        let e2: Vec<_> = g2.edges().collect();
        assert_eq!(e1, e2);
    }

    #[test]
    fn test_density() {
        let mut g = ConflictGraph::new(4);
        assert_eq!(g.density(), 0.0);
        g.add_edge(0, 1, 0.0);
        g.add_edge(2, 3, 0.0);
        g.add_edge(0, 3, 0.0);
        assert_relative_eq!(g.density(), 0.5);
        assert_eq!(ConflictGraph::new(1).density(), 0.0);
    }
}
