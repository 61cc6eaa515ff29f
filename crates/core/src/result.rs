//! Separation result representation.

use crate::coloring::{ConflictPair, ConflictReason, LayerAssignment};
use crate::solver::Algorithm;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Non-fatal condition met during a run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Warning {
    /// A shape with broken topology was rebuilt before processing.
    GeometryRepaired {
        /// Shape index.
        shape: usize,
        /// What was wrong.
        reason: String,
    },
    /// A shape could not be used and was left out of contact detection.
    GeometryExcluded {
        /// Shape index.
        shape: usize,
        /// What was wrong.
        reason: String,
    },
    /// A boolean operation produced a bad result and was repaired.
    FragmentRepaired {
        /// Shape whose fragment was repaired.
        shape: usize,
    },
    /// A contested or clipped pair could not be cut apart.
    PairUnresolved {
        /// Lower shape index.
        a: usize,
        /// Higher shape index.
        b: usize,
    },
    /// An iterative strategy ran out of steps and DSATUR was used instead.
    RecursionFallback {
        /// The strategy that was requested.
        requested: Algorithm,
    },
    /// The `force_k` target is below the clique lower bound.
    InfeasibleForceK {
        /// Requested layer count.
        k: usize,
        /// Clique lower bound.
        lower_bound: usize,
    },
}

impl Warning {
    /// Returns true for geometry repair/exclusion warnings.
    pub fn is_geometry_warning(&self) -> bool {
        matches!(
            self,
            Warning::GeometryRepaired { .. }
                | Warning::GeometryExcluded { .. }
                | Warning::FragmentRepaired { .. }
                | Warning::PairUnresolved { .. }
        )
    }
}

/// Aggregated numbers for one run.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Summary {
    /// Number of input shapes.
    pub shape_count: usize,
    /// Number of bounding-box candidate pairs.
    pub candidate_pair_count: usize,
    /// Number of conflict edges.
    pub edge_count: usize,
    /// |E| / (N·(N−1)/2).
    pub graph_density: f64,
    /// Greedy clique size.
    pub clique_lower_bound: usize,
    /// Number of output layers.
    pub achieved_layer_count: usize,
    /// Conflict pairs of all reasons.
    pub conflict_pair_count: usize,
    /// Fragments below the tiny-area threshold.
    pub tiny_fragment_count: usize,
    /// Total number of output fragments.
    pub fragment_count: usize,
    /// Share of the total fragment area per layer (sums to 1 unless empty).
    pub per_layer_area_share: Vec<f64>,
    /// Shapes left out of contact detection.
    pub excluded_shape_count: usize,
    /// Geometry repairs and exclusions.
    pub geometry_warning_count: usize,
    /// Strategy that produced the assignment.
    pub algorithm_used: Option<Algorithm>,
    /// Whether the requested strategy fell back to DSATUR.
    pub recursion_fallback: bool,
    /// Computation time in milliseconds.
    pub computation_time_ms: u64,
}

/// Output piece that knows which layer it belongs to.
pub trait LayeredFragment {
    /// Layer index.
    fn layer(&self) -> usize;
}

/// Result of a separation run.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SeparationResult<F> {
    /// Shape id per node index.
    pub shape_ids: Vec<String>,
    /// Layer per node index.
    pub assignment: LayerAssignment,
    /// Pairs left in conflict.
    pub conflicts: Vec<ConflictPair>,
    /// Output geometry pieces.
    pub fragments: Vec<F>,
    /// Non-fatal conditions met during the run.
    pub warnings: Vec<Warning>,
    /// Aggregated numbers.
    pub summary: Summary,
}

impl<F> SeparationResult<F> {
    /// Number of output layers.
    pub fn layer_count(&self) -> usize {
        self.assignment.layer_count()
    }

    /// Layer of the shape with the given id.
    pub fn layer_of(&self, shape_id: &str) -> Option<usize> {
        self.shape_ids
            .iter()
            .position(|id| id == shape_id)
            .map(|index| self.assignment.layer_of(index))
    }

    /// Shape ids per layer.
    pub fn layer_groups(&self) -> Vec<Vec<&str>> {
        self.assignment
            .groups()
            .into_iter()
            .map(|group| {
                group
                    .into_iter()
                    .map(|index| self.shape_ids[index].as_str())
                    .collect()
            })
            .collect()
    }

    /// Conflicts with the given reason.
    pub fn conflicts_with_reason(&self, reason: ConflictReason) -> Vec<ConflictPair> {
        self.conflicts
            .iter()
            .filter(|c| c.reason == reason)
            .copied()
            .collect()
    }

    /// Returns true if no conflict pair was recorded.
    pub fn is_conflict_free(&self) -> bool {
        self.conflicts.is_empty()
    }
}

impl<F: LayeredFragment> SeparationResult<F> {
    /// Fragments on the given layer, in output order.
    pub fn fragments_in_layer(&self, layer: usize) -> Vec<&F> {
        self.fragments.iter().filter(|f| f.layer() == layer).collect()
    }
}
