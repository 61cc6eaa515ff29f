//! Summary aggregation.

use crate::fragment::Fragment;
use diastasis_core::{Algorithm, ConflictGraph, ConflictPair, LayerAssignment, Summary, Warning};

/// Everything a run produced, borrowed for aggregation.
#[derive(Debug, Clone, Copy)]
pub struct RunArtifacts<'a> {
    /// Number of input shapes.
    pub shape_count: usize,
    /// Number of bounding-box candidate pairs.
    pub candidate_pair_count: usize,
    /// Conflict graph.
    pub graph: &'a ConflictGraph,
    /// Clique lower bound.
    pub clique_lower_bound: usize,
    /// Final layer assignment.
    pub assignment: &'a LayerAssignment,
    /// All recorded conflicts.
    pub conflicts: &'a [ConflictPair],
    /// Output fragments.
    pub fragments: &'a [Fragment],
    /// Warnings of the run.
    pub warnings: &'a [Warning],
    /// Number of shapes left out by preparation.
    pub excluded_shape_count: usize,
    /// Strategy that produced the assignment.
    pub algorithm_used: Algorithm,
    /// Whether the strategy fell back to DSATUR.
    pub recursion_fallback: bool,
    /// Area below which a fragment counts as tiny.
    pub tiny_fragment_area: f64,
    /// Wall time of the run.
    pub computation_time_ms: u64,
}

/// Builds the summary record.
pub fn summarize(artifacts: &RunArtifacts<'_>) -> Summary {
    let layer_count = artifacts.assignment.layer_count();
    Summary {
        shape_count: artifacts.shape_count,
        candidate_pair_count: artifacts.candidate_pair_count,
        edge_count: artifacts.graph.edge_count(),
        graph_density: artifacts.graph.density(),
        clique_lower_bound: artifacts.clique_lower_bound,
        achieved_layer_count: layer_count,
        conflict_pair_count: artifacts.conflicts.len(),
        tiny_fragment_count: tiny_fragment_count(artifacts.fragments, artifacts.tiny_fragment_area),
        fragment_count: artifacts.fragments.len(),
        per_layer_area_share: per_layer_area_share(artifacts.fragments, layer_count),
        excluded_shape_count: artifacts.excluded_shape_count,
        geometry_warning_count: artifacts
            .warnings
            .iter()
            .filter(|w| w.is_geometry_warning())
            .count(),
        algorithm_used: Some(artifacts.algorithm_used),
        recursion_fallback: artifacts.recursion_fallback,
        computation_time_ms: artifacts.computation_time_ms,
    }
}

/// Number of fragments with area below `threshold`.
pub fn tiny_fragment_count(fragments: &[Fragment], threshold: f64) -> usize {
    fragments.iter().filter(|f| f.is_tiny(threshold)).count()
}

/// Share of the total fragment area per layer.
///
/// One entry per layer; all zero when there is no area at all.
pub fn per_layer_area_share(fragments: &[Fragment], layer_count: usize) -> Vec<f64> {
    let mut shares = vec![0.0; layer_count];
    for fragment in fragments {
        if let Some(slot) = shares.get_mut(fragment.layer) {
            *slot += fragment.area;
        }
    }
    let total: f64 = shares.iter().sum();
    if total > 0.0 {
        for share in &mut shares {
            *share /= total;
        }
    }
    shares
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::Shape;
    use approx::assert_relative_eq;

    fn fragment(layer: usize, size: f64) -> Fragment {
        let polygon = Shape::rectangle("f", 0.0, 0.0, size, size).to_geo_polygon();
        Fragment {
            shape_index: 0,
            shape_id: "f".into(),
            layer,
            polygon,
            area: size * size,
            fill: None,
            style: None,
        }
    }

    #[test]
    fn test_area_share() {
        let fragments = vec![fragment(0, 3.0), fragment(1, 1.0), fragment(0, 0.0)];
        let shares = per_layer_area_share(&fragments, 3);
        assert_eq!(shares.len(), 3);
        assert_relative_eq!(shares[0], 0.9);
        assert_relative_eq!(shares[1], 0.1);
        assert_relative_eq!(shares[2], 0.0);
        assert_relative_eq!(shares.iter().sum::<f64>(), 1.0);
    }

    #[test]
    fn test_area_share_empty() {
        assert_eq!(per_layer_area_share(&[], 2), vec![0.0, 0.0]);
        assert!(per_layer_area_share(&[], 0).is_empty());
    }

    #[test]
    fn test_tiny_count() {
        let fragments = vec![fragment(0, 0.5), fragment(0, 2.0)];
        assert_eq!(tiny_fragment_count(&fragments, 1.0), 1);
        assert_eq!(tiny_fragment_count(&fragments, 0.0), 0);
    }

    #[test]
    fn test_summarize() {
        let mut graph = ConflictGraph::new(2);
        graph.add_edge(0, 1, 25.0);
        let assignment = LayerAssignment::new(vec![0, 1]);
        let fragments = vec![fragment(0, 10.0), fragment(1, 10.0)];
        let warnings = vec![Warning::GeometryExcluded {
            shape: 1,
            reason: "zero area".into(),
        }];
        let summary = summarize(&RunArtifacts {
            shape_count: 2,
            candidate_pair_count: 1,
            graph: &graph,
            clique_lower_bound: 2,
            assignment: &assignment,
            conflicts: &[],
            fragments: &fragments,
            warnings: &warnings,
            excluded_shape_count: 0,
            algorithm_used: Algorithm::Dsatur,
            recursion_fallback: false,
            tiny_fragment_area: 1.0,
            computation_time_ms: 3,
        });

        assert_eq!(summary.edge_count, 1);
        assert_relative_eq!(summary.graph_density, 1.0);
        assert_eq!(summary.achieved_layer_count, 2);
        assert_eq!(summary.fragment_count, 2);
        assert_eq!(summary.geometry_warning_count, 1);
        assert_eq!(summary.algorithm_used, Some(Algorithm::Dsatur));
        assert_relative_eq!(summary.per_layer_area_share[0], 0.5);
    }
}
