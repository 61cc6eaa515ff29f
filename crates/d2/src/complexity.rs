//! Up-front workload estimate.
//!
//! Builds only the bounding-box index, so hosts can decide whether to warn the
//! user or switch on performance mode before starting a full run.

use crate::shape::Shape;
use crate::spatial_index::{SpatialEntry2D, SpatialIndex2D};
use diastasis_core::Config;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Seconds per shape for preparation and indexing.
const SECONDS_PER_SHAPE: f64 = 5e-4;

/// Seconds per candidate pair for exact classification.
const SECONDS_PER_PAIR: f64 = 2e-3;

/// Speedup assumed when performance mode simplifies the rings.
const PERFORMANCE_MODE_FACTOR: f64 = 0.5;

/// Rough workload class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ComplexityLevel {
    /// Fewer than 1,000 candidate pairs.
    Low,
    /// Fewer than 20,000 candidate pairs.
    Medium,
    /// Fewer than 200,000 candidate pairs.
    High,
    /// Anything above.
    Extreme,
}

impl ComplexityLevel {
    fn from_pairs(pairs: usize) -> Self {
        match pairs {
            0..=999 => ComplexityLevel::Low,
            1_000..=19_999 => ComplexityLevel::Medium,
            20_000..=199_999 => ComplexityLevel::High,
            _ => ComplexityLevel::Extreme,
        }
    }
}

impl fmt::Display for ComplexityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ComplexityLevel::Low => "low",
            ComplexityLevel::Medium => "medium",
            ComplexityLevel::High => "high",
            ComplexityLevel::Extreme => "extreme",
        };
        f.write_str(label)
    }
}

/// Workload estimate for a set of shapes.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ComplexityEstimate {
    /// Number of shapes.
    pub shape_count: usize,
    /// Bounding-box candidate pairs.
    pub candidate_pairs: usize,
    /// Candidate pairs over N·(N−1)/2.
    pub density: f64,
    /// Workload class.
    pub level: ComplexityLevel,
    /// Rough wall time in seconds.
    pub estimated_seconds: f64,
}

/// Estimates the cost of separating `shapes` under `config`.
pub fn estimate_complexity(shapes: &[Shape], config: &Config) -> ComplexityEstimate {
    let entries: Vec<SpatialEntry2D> = shapes
        .iter()
        .enumerate()
        .map(|(index, shape)| SpatialEntry2D::from_shape(index, shape))
        .collect();
    let index = SpatialIndex2D::with_entries(entries);
    let candidate_pairs = index.candidate_pairs().len();

    let n = shapes.len();
    let density = if n < 2 {
        0.0
    } else {
        candidate_pairs as f64 / (n as f64 * (n as f64 - 1.0) / 2.0)
    };

    let mut estimated_seconds =
        n as f64 * SECONDS_PER_SHAPE + candidate_pairs as f64 * SECONDS_PER_PAIR;
    if config.performance_mode {
        estimated_seconds *= PERFORMANCE_MODE_FACTOR;
    }

    ComplexityEstimate {
        shape_count: n,
        candidate_pairs,
        density,
        level: ComplexityLevel::from_pairs(candidate_pairs),
        estimated_seconds,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_estimate_grid() {
        // 3x3 grid of touching unit squares
        let shapes: Vec<Shape> = (0..9)
            .map(|i| Shape::rectangle(format!("s{}", i), (i % 3) as f64, (i / 3) as f64, 1.0, 1.0))
            .collect();
        let estimate = estimate_complexity(&shapes, &Config::default());
        assert_eq!(estimate.shape_count, 9);
        // 12 edge neighbours + 8 diagonal neighbours
        assert_eq!(estimate.candidate_pairs, 20);
        assert_relative_eq!(estimate.density, 20.0 / 36.0);
        assert_eq!(estimate.level, ComplexityLevel::Low);
        assert!(estimate.estimated_seconds > 0.0);
    }

    #[test]
    fn test_estimate_empty_and_single() {
        let empty = estimate_complexity(&[], &Config::default());
        assert_eq!(empty.candidate_pairs, 0);
        assert_eq!(empty.density, 0.0);

        let single = estimate_complexity(
            &[Shape::rectangle("a", 0.0, 0.0, 1.0, 1.0)],
            &Config::default(),
        );
        assert_eq!(single.candidate_pairs, 0);
        assert_eq!(single.density, 0.0);
    }

    #[test]
    fn test_performance_mode_halves_estimate() {
        let shapes = vec![
            Shape::rectangle("a", 0.0, 0.0, 2.0, 2.0),
            Shape::rectangle("b", 1.0, 1.0, 2.0, 2.0),
        ];
        let normal = estimate_complexity(&shapes, &Config::default());
        let fast = estimate_complexity(&shapes, &Config::default().with_performance_mode(0.5));
        assert_relative_eq!(fast.estimated_seconds, normal.estimated_seconds * 0.5);
    }

    #[test]
    fn test_levels() {
        assert_eq!(ComplexityLevel::from_pairs(0), ComplexityLevel::Low);
        assert_eq!(ComplexityLevel::from_pairs(5_000), ComplexityLevel::Medium);
        assert_eq!(ComplexityLevel::from_pairs(50_000), ComplexityLevel::High);
        assert_eq!(ComplexityLevel::from_pairs(500_000), ComplexityLevel::Extreme);
        assert_eq!(ComplexityLevel::Extreme.to_string(), "extreme");
    }
}
