//! Flat-mode decomposition.
//!
//! In flat mode overlapping shapes are cut apart so that no two output
//! fragments cover the same area. Every contested pair has a winner that keeps
//! the shared region and a loser that gives it up. Pairs are processed in a
//! fixed priority order against a per-shape arena of working fragments.

use crate::boolean::{self, SubtractOutcome};
use diastasis_core::{
    ConflictGraph, ConflictPair, ConflictReason, Error, LayerAssignment, PriorityOrder, Result,
    Warning,
};
use geo::MultiPolygon;
use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicBool, Ordering};

// ============================================================================
// Ranking
// ============================================================================

/// Stacking and size key of one shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeRank {
    /// Input position.
    pub index: usize,
    /// Paint order from the artwork.
    pub paint_order: usize,
    /// Shape area.
    pub area: f64,
}

impl ShapeRank {
    /// Creates a rank.
    pub fn new(index: usize, paint_order: usize, area: f64) -> Self {
        Self {
            index,
            paint_order,
            area,
        }
    }

    /// Stacking key: later paint order is higher, ties go to input order.
    pub fn stacking_key(&self) -> (usize, usize) {
        (self.paint_order, self.index)
    }

    /// Returns true if this shape is painted above `other`.
    pub fn is_above(&self, other: &ShapeRank) -> bool {
        self.stacking_key() > other.stacking_key()
    }
}

/// A contested pair with its winner decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContestedPair {
    /// Shape that keeps the shared region.
    pub winner: usize,
    /// Shape that loses the shared region.
    pub loser: usize,
}

/// Conflict edges whose shared region has to be cut.
///
/// Only edges with positive overlap weight are contested. With
/// `same_layer_only` the scope narrows to edges whose endpoints ended up on the
/// same layer (used after a forced layer count).
pub fn contested_pairs(
    graph: &ConflictGraph,
    assignment: &LayerAssignment,
    same_layer_only: bool,
) -> Vec<(usize, usize)> {
    graph
        .edges()
        .filter(|&(_, _, weight)| weight > 0.0)
        .filter(|&(a, b, _)| !same_layer_only || assignment.layer_of(a) == assignment.layer_of(b))
        .map(|(a, b, _)| (a, b))
        .collect()
}

/// Decides winners and sorts contested pairs by the priority order.
///
/// - `Source`: the higher stacked shape wins; pairs run bottom-up.
/// - `LargestFirst`: the larger shape wins; pairs run by descending winner area.
/// - `SmallestFirst`: the smaller shape wins; pairs run by ascending winner area.
///
/// Equal areas fall back to stacking.
pub fn order_contested(
    pairs: &[(usize, usize)],
    ranks: &[ShapeRank],
    priority: PriorityOrder,
) -> Vec<ContestedPair> {
    let mut ordered: Vec<ContestedPair> = pairs
        .iter()
        .map(|&(a, b)| {
            let (ra, rb) = (&ranks[a], &ranks[b]);
            let a_wins = match priority {
                PriorityOrder::Source => ra.is_above(rb),
                PriorityOrder::LargestFirst => match ra.area.total_cmp(&rb.area) {
                    CmpOrdering::Equal => ra.is_above(rb),
                    ord => ord == CmpOrdering::Greater,
                },
                PriorityOrder::SmallestFirst => match ra.area.total_cmp(&rb.area) {
                    CmpOrdering::Equal => ra.is_above(rb),
                    ord => ord == CmpOrdering::Less,
                },
            };
            if a_wins {
                ContestedPair { winner: a, loser: b }
            } else {
                ContestedPair { winner: b, loser: a }
            }
        })
        .collect();

    let key = |p: &ContestedPair| (ranks[p.winner], ranks[p.loser]);
    ordered.sort_by(|x, y| {
        let (xw, xl) = key(x);
        let (yw, yl) = key(y);
        let primary = match priority {
            PriorityOrder::Source => xw
                .stacking_key()
                .cmp(&yw.stacking_key())
                .then(xl.stacking_key().cmp(&yl.stacking_key())),
            PriorityOrder::LargestFirst => yw
                .area
                .total_cmp(&xw.area)
                .then(yl.area.total_cmp(&xl.area)),
            PriorityOrder::SmallestFirst => xw
                .area
                .total_cmp(&yw.area)
                .then(xl.area.total_cmp(&yl.area)),
        };
        primary
            .then(x.winner.cmp(&y.winner))
            .then(x.loser.cmp(&y.loser))
    });
    ordered
}

// ============================================================================
// Fragment arena
// ============================================================================

/// Working fragment per shape.
#[derive(Debug, Clone, Default)]
pub struct FragmentArena {
    working: Vec<MultiPolygon<f64>>,
}

impl FragmentArena {
    /// Seeds the arena with the prepared geometry. Excluded shapes start empty.
    pub fn from_geometries(geometries: &[Option<MultiPolygon<f64>>]) -> Self {
        Self {
            working: geometries
                .iter()
                .map(|g| g.clone().unwrap_or_else(|| MultiPolygon(Vec::new())))
                .collect(),
        }
    }

    /// Number of shapes.
    pub fn len(&self) -> usize {
        self.working.len()
    }

    /// Returns true if the arena holds no shapes.
    pub fn is_empty(&self) -> bool {
        self.working.is_empty()
    }

    /// Working fragment of a shape.
    pub fn get(&self, index: usize) -> &MultiPolygon<f64> {
        &self.working[index]
    }

    /// Area of a shape's working fragment.
    pub fn area(&self, index: usize) -> f64 {
        boolean::area(&self.working[index])
    }

    /// Total area across all fragments.
    pub fn total_area(&self) -> f64 {
        self.working.iter().map(boolean::area).sum()
    }

    /// Consumes the arena.
    pub fn into_geometries(self) -> Vec<MultiPolygon<f64>> {
        self.working
    }
}

// ============================================================================
// Decomposition
// ============================================================================

/// What happened during decomposition.
#[derive(Debug, Clone, Default)]
pub struct DecompositionReport {
    /// Pairs whose shared region was removed from the loser.
    pub resolved: usize,
    /// Pairs already separated when reached.
    pub skipped: usize,
    /// Resolved pairs cut a second time by the closing check.
    pub recut: usize,
    /// Pairs that could not be cut apart.
    pub unresolved: Vec<ConflictPair>,
    /// Repairs and failures.
    pub warnings: Vec<Warning>,
}

/// Runs the contested pairs against the arena in order.
///
/// The loser's working fragment becomes `loser − winner`. A pair whose shared
/// area is within [`boolean::overlap_threshold`] is skipped, so running the
/// same pairs twice changes nothing. A subtraction that fails even after
/// repair leaves the loser unchanged and records an unresolved conflict.
///
/// Later cuts rebuild a loser's whole outline, so every resolved pair is
/// checked once more at the end and cut again if it drifted back into its
/// winner.
pub fn decompose(
    arena: &mut FragmentArena,
    ordered: &[ContestedPair],
    overlap_epsilon: f64,
    cancelled: &AtomicBool,
) -> Result<DecompositionReport> {
    let mut report = DecompositionReport::default();
    let mut resolved_pairs: Vec<ContestedPair> = Vec::new();

    for pair in ordered {
        if cancelled.load(Ordering::Relaxed) {
            return Err(Error::Cancelled);
        }

        let (winner, loser) = (pair.winner, pair.loser);
        let outcome = subtract_pair(arena, winner, loser, overlap_epsilon);
        match outcome {
            SubtractOutcome::Unchanged => report.skipped += 1,
            SubtractOutcome::Subtracted(rest) => {
                arena.working[loser] = rest;
                report.resolved += 1;
                resolved_pairs.push(*pair);
            }
            SubtractOutcome::Repaired(rest) => {
                arena.working[loser] = rest;
                report.resolved += 1;
                report.warnings.push(Warning::FragmentRepaired { shape: loser });
                resolved_pairs.push(*pair);
            }
            SubtractOutcome::Failed => {
                log::warn!(
                    "could not separate shapes {} and {}, keeping both",
                    winner,
                    loser
                );
                let conflict = ConflictPair::new(winner, loser, ConflictReason::UnresolvedOverlap);
                report.warnings.push(Warning::PairUnresolved {
                    a: conflict.a,
                    b: conflict.b,
                });
                report.unresolved.push(conflict);
            }
        }
    }

    for pair in &resolved_pairs {
        if cancelled.load(Ordering::Relaxed) {
            return Err(Error::Cancelled);
        }
        // A failure here keeps the already-resolved fragment.
        match subtract_pair(arena, pair.winner, pair.loser, overlap_epsilon) {
            SubtractOutcome::Subtracted(rest) | SubtractOutcome::Repaired(rest) => {
                log::debug!(
                    "shape {} drifted back into shape {}, cut again",
                    pair.loser,
                    pair.winner
                );
                arena.working[pair.loser] = rest;
                report.recut += 1;
            }
            SubtractOutcome::Unchanged | SubtractOutcome::Failed => {}
        }
    }

    log::debug!(
        "decomposition: {} resolved, {} skipped, {} recut, {} unresolved",
        report.resolved,
        report.skipped,
        report.recut,
        report.unresolved.len()
    );
    Ok(report)
}

fn subtract_pair(
    arena: &FragmentArena,
    winner: usize,
    loser: usize,
    overlap_epsilon: f64,
) -> SubtractOutcome {
    let (rest, clip) = (arena.get(loser), arena.get(winner));
    let threshold = boolean::overlap_threshold(
        rest,
        arena.area(loser),
        clip,
        arena.area(winner),
        overlap_epsilon,
    );
    boolean::subtract_checked(rest, clip, threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::Shape;
    use approx::assert_relative_eq;

    fn geometries(shapes: &[Shape]) -> Vec<Option<MultiPolygon<f64>>> {
        shapes
            .iter()
            .map(|s| Some(MultiPolygon(vec![s.to_geo_polygon()])))
            .collect()
    }

    fn ranks(shapes: &[Shape]) -> Vec<ShapeRank> {
        shapes
            .iter()
            .enumerate()
            .map(|(i, s)| ShapeRank::new(i, s.paint_order(), s.area()))
            .collect()
    }

    #[test]
    fn test_stacking_ties_use_input_order() {
        let low = ShapeRank::new(0, 3, 10.0);
        let high = ShapeRank::new(1, 3, 1.0);
        assert!(high.is_above(&low));
        assert!(!low.is_above(&high));
        assert!(ShapeRank::new(0, 4, 1.0).is_above(&high));
    }

    #[test]
    fn test_contested_pairs_scope() {
        let mut graph = ConflictGraph::new(3);
        graph.add_edge(0, 1, 25.0);
        graph.add_edge(1, 2, 0.0);
        graph.add_edge(0, 2, 4.0);
        let assignment = LayerAssignment::new(vec![0, 1, 0]);

        assert_eq!(contested_pairs(&graph, &assignment, false), vec![(0, 1), (0, 2)]);
        assert_eq!(contested_pairs(&graph, &assignment, true), vec![(0, 2)]);
    }

    #[test]
    fn test_order_source() {
        let r = vec![
            ShapeRank::new(0, 2, 100.0),
            ShapeRank::new(1, 0, 50.0),
            ShapeRank::new(2, 1, 10.0),
        ];
        let ordered = order_contested(&[(0, 1), (1, 2), (0, 2)], &r, PriorityOrder::Source);
        assert_eq!(
            ordered,
            vec![
                ContestedPair { winner: 2, loser: 1 },
                ContestedPair { winner: 0, loser: 1 },
                ContestedPair { winner: 0, loser: 2 },
            ]
        );
    }

    #[test]
    fn test_order_by_size() {
        let r = vec![
            ShapeRank::new(0, 0, 100.0),
            ShapeRank::new(1, 1, 50.0),
            ShapeRank::new(2, 2, 10.0),
        ];
        let pairs = [(0, 1), (1, 2), (0, 2)];

        let largest = order_contested(&pairs, &r, PriorityOrder::LargestFirst);
        assert_eq!(largest[0], ContestedPair { winner: 0, loser: 1 });
        assert_eq!(largest[1], ContestedPair { winner: 0, loser: 2 });
        assert_eq!(largest[2], ContestedPair { winner: 1, loser: 2 });

        let smallest = order_contested(&pairs, &r, PriorityOrder::SmallestFirst);
        assert_eq!(smallest[0], ContestedPair { winner: 2, loser: 1 });
        assert_eq!(smallest[1], ContestedPair { winner: 2, loser: 0 });
        assert_eq!(smallest[2], ContestedPair { winner: 1, loser: 0 });
    }

    #[test]
    fn test_equal_areas_fall_back_to_stacking() {
        let r = vec![ShapeRank::new(0, 5, 10.0), ShapeRank::new(1, 1, 10.0)];
        for priority in [PriorityOrder::LargestFirst, PriorityOrder::SmallestFirst] {
            let ordered = order_contested(&[(0, 1)], &r, priority);
            assert_eq!(ordered[0].winner, 0);
        }
    }

    #[test]
    fn test_decompose_two_squares() {
        let shapes = vec![
            Shape::rectangle("A", 0.0, 0.0, 10.0, 10.0).with_paint_order(0),
            Shape::rectangle("B", 5.0, 5.0, 10.0, 10.0).with_paint_order(1),
        ];
        let mut arena = FragmentArena::from_geometries(&geometries(&shapes));
        let ordered = order_contested(&[(0, 1)], &ranks(&shapes), PriorityOrder::Source);
        let cancelled = AtomicBool::new(false);

        let report = decompose(&mut arena, &ordered, 1e-9, &cancelled).unwrap();
        assert_eq!(report.resolved, 1);
        assert!(report.unresolved.is_empty());
        assert_relative_eq!(arena.area(0), 75.0, epsilon = 1e-6);
        assert_relative_eq!(arena.area(1), 100.0, epsilon = 1e-6);
        assert_relative_eq!(arena.total_area(), 175.0, epsilon = 1e-6);
    }

    #[test]
    fn test_decompose_is_idempotent() {
        let shapes = vec![
            Shape::rectangle("A", 0.0, 0.0, 10.0, 10.0),
            Shape::rectangle("B", 5.0, 0.0, 10.0, 10.0),
            Shape::rectangle("C", 2.0, 2.0, 4.0, 4.0),
        ];
        let mut arena = FragmentArena::from_geometries(&geometries(&shapes));
        let ordered = order_contested(
            &[(0, 1), (0, 2), (1, 2)],
            &ranks(&shapes),
            PriorityOrder::Source,
        );
        let cancelled = AtomicBool::new(false);

        decompose(&mut arena, &ordered, 1e-9, &cancelled).unwrap();
        let first: Vec<f64> = (0..3).map(|i| arena.area(i)).collect();

        let again = decompose(&mut arena, &ordered, 1e-9, &cancelled).unwrap();
        assert_eq!(again.resolved, 0);
        assert_eq!(again.skipped, 3);
        for (i, area) in first.iter().enumerate() {
            assert_relative_eq!(arena.area(i), *area, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_decompose_leaves_no_measurable_overlap() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(8);
        let shapes: Vec<Shape> = (0..20)
            .map(|i| {
                let x = rng.gen_range(0.0..90.0);
                let y = rng.gen_range(0.0..90.0);
                let w = rng.gen_range(2.0..20.0);
                let h = rng.gen_range(2.0..20.0);
                Shape::rectangle(format!("r{}", i), x, y, w, h).with_paint_order(i)
            })
            .collect();
        let geoms = geometries(&shapes);
        let mut pairs = Vec::new();
        for i in 0..shapes.len() {
            for j in (i + 1)..shapes.len() {
                if boolean::residual_overlap(geoms[i].as_ref().unwrap(), geoms[j].as_ref().unwrap())
                    > 0.0
                {
                    pairs.push((i, j));
                }
            }
        }
        assert!(!pairs.is_empty());

        let mut arena = FragmentArena::from_geometries(&geoms);
        let ordered = order_contested(&pairs, &ranks(&shapes), PriorityOrder::Source);
        let cancelled = AtomicBool::new(false);
        decompose(&mut arena, &ordered, 1e-9, &cancelled).unwrap();

        for i in 0..arena.len() {
            for j in (i + 1)..arena.len() {
                let (a, b) = (arena.get(i), arena.get(j));
                let threshold =
                    boolean::overlap_threshold(a, arena.area(i), b, arena.area(j), 1e-9);
                let residual = boolean::residual_overlap(a, b);
                assert!(
                    residual <= threshold,
                    "r{} and r{} still share {:e} (threshold {:e})",
                    i,
                    j,
                    residual,
                    threshold
                );
            }
        }

        let again = decompose(&mut arena, &ordered, 1e-9, &cancelled).unwrap();
        assert_eq!(again.resolved, 0);
        assert_eq!(again.recut, 0);
        assert_eq!(again.skipped, ordered.len());
    }

    #[test]
    fn test_decompose_cancelled() {
        let shapes = vec![
            Shape::rectangle("A", 0.0, 0.0, 10.0, 10.0),
            Shape::rectangle("B", 5.0, 5.0, 10.0, 10.0),
        ];
        let mut arena = FragmentArena::from_geometries(&geometries(&shapes));
        let ordered = vec![ContestedPair { winner: 1, loser: 0 }];
        let cancelled = AtomicBool::new(true);
        let result = decompose(&mut arena, &ordered, 1e-9, &cancelled);
        assert_eq!(result.unwrap_err(), Error::Cancelled);
        assert_relative_eq!(arena.area(0), 100.0);
    }

    #[test]
    fn test_excluded_shape_starts_empty() {
        let arena = FragmentArena::from_geometries(&[None]);
        assert_eq!(arena.len(), 1);
        assert_eq!(arena.area(0), 0.0);
    }
}
