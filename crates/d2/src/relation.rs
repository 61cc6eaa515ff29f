//! Exact relation classification for candidate pairs.
//!
//! Classification uses the DE-9IM matrix from geo's `Relate`:
//!
//! - interiors meet in 2D with a measurable intersection area: overlap
//! - boundaries share a segment (or a negligible overlap): edge touch
//! - anything else that still intersects: corner touch

use crate::boolean;
use diastasis_core::{Error, PairRelation, RelationKind, Result};
use geo::coordinate_position::CoordPos;
use geo::dimensions::Dimensions;
use geo::{MultiPolygon, Relate};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};

/// Classifies one pair of geometries.
///
/// `overlap_epsilon` is relative to the smaller of the two areas: an overlap
/// at or below `overlap_epsilon * min(area_a, area_b)`, or below the
/// snapping noise of the boolean ops, is treated as an edge touch.
pub fn classify_pair(
    a: usize,
    geometry_a: &MultiPolygon<f64>,
    area_a: f64,
    b: usize,
    geometry_b: &MultiPolygon<f64>,
    area_b: f64,
    overlap_epsilon: f64,
) -> PairRelation {
    let matrix = geometry_a.relate(geometry_b);
    if !matrix.is_intersects() {
        return PairRelation::disjoint(a, b);
    }

    let interiors = matrix.get(CoordPos::Inside, CoordPos::Inside);
    let overlap_area = if interiors == Dimensions::TwoDimensional {
        boolean::area(&boolean::intersection(geometry_a, geometry_b))
    } else {
        0.0
    };

    let threshold =
        boolean::overlap_threshold(geometry_a, area_a, geometry_b, area_b, overlap_epsilon);
    if overlap_area > threshold {
        return PairRelation::new(a, b, RelationKind::Overlap, overlap_area);
    }

    let shared_boundary = matrix.get(CoordPos::OnBoundary, CoordPos::OnBoundary);
    if interiors != Dimensions::Empty || shared_boundary == Dimensions::OneDimensional {
        PairRelation::new(a, b, RelationKind::EdgeTouch, 0.0)
    } else {
        PairRelation::new(a, b, RelationKind::CornerTouch, 0.0)
    }
}

/// Classifies all candidate pairs in parallel.
///
/// The output has one relation per candidate pair, in the order of `pairs`.
/// Pairs involving an excluded shape come back as disjoint. The cancel flag is
/// checked before every pair.
pub fn detect_relations(
    geometries: &[Option<MultiPolygon<f64>>],
    areas: &[f64],
    pairs: &[(usize, usize)],
    overlap_epsilon: f64,
    cancelled: &AtomicBool,
) -> Result<Vec<PairRelation>> {
    let relations: Vec<Option<PairRelation>> = pairs
        .par_iter()
        .map(|&(a, b)| {
            if cancelled.load(Ordering::Relaxed) {
                return None;
            }
            let relation = match (&geometries[a], &geometries[b]) {
                (Some(ga), Some(gb)) => {
                    classify_pair(a, ga, areas[a], b, gb, areas[b], overlap_epsilon)
                }
                _ => PairRelation::disjoint(a, b),
            };
            Some(relation)
        })
        .collect();

    if cancelled.load(Ordering::Relaxed) {
        return Err(Error::Cancelled);
    }

    let relations: Vec<PairRelation> = relations.into_iter().flatten().collect();
    log::debug!(
        "classified {} pairs: {} overlaps",
        relations.len(),
        relations
            .iter()
            .filter(|r| r.kind == RelationKind::Overlap)
            .count()
    );
    Ok(relations)
}
