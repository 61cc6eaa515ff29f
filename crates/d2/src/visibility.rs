//! Visible-boundary clipping.
//!
//! Each fragment is cut by the original geometry of every shape painted above
//! it, so only what is actually visible in the artwork is kept. The input
//! fragments are not modified; a new set is returned.

use crate::boolean::{self, SubtractOutcome};
use crate::flatten::ShapeRank;
use crate::spatial_index::SpatialIndex2D;
use diastasis_core::{Error, Result, Warning};
use geo::MultiPolygon;
use std::sync::atomic::{AtomicBool, Ordering};

/// Clipped fragments plus anything that went wrong.
#[derive(Debug, Clone, Default)]
pub struct ClipReport {
    /// Fragment per shape after clipping.
    pub fragments: Vec<MultiPolygon<f64>>,
    /// Number of subtractions that removed something.
    pub clipped: usize,
    /// Repairs and failed subtractions.
    pub warnings: Vec<Warning>,
}

/// Clips every fragment by the shapes stacked above it.
///
/// Occluders are found through the spatial index and applied in stacking
/// order. A failed subtraction keeps the fragment as it was before that step.
pub fn clip_visible(
    fragments: &[MultiPolygon<f64>],
    originals: &[Option<MultiPolygon<f64>>],
    ranks: &[ShapeRank],
    index: &SpatialIndex2D,
    overlap_epsilon: f64,
    cancelled: &AtomicBool,
) -> Result<ClipReport> {
    let mut report = ClipReport {
        fragments: Vec::with_capacity(fragments.len()),
        ..ClipReport::default()
    };

    for (shape, fragment) in fragments.iter().enumerate() {
        if cancelled.load(Ordering::Relaxed) {
            return Err(Error::Cancelled);
        }

        let Some(aabb) = boolean::bounding_box(fragment) else {
            report.fragments.push(fragment.clone());
            continue;
        };

        let mut occluders: Vec<usize> = index
            .query_indices(aabb)
            .into_iter()
            .filter(|&other| other != shape && ranks[other].is_above(&ranks[shape]))
            .collect();
        occluders.sort_by_key(|&other| ranks[other].stacking_key());

        let mut current = fragment.clone();
        for other in occluders {
            let Some(occluder) = &originals[other] else {
                continue;
            };
            let min_area = boolean::overlap_threshold(
                &current,
                boolean::area(&current),
                occluder,
                ranks[other].area,
                overlap_epsilon,
            );
            let outcome = boolean::subtract_checked(&current, occluder, min_area);
            match outcome {
                SubtractOutcome::Unchanged => {}
                SubtractOutcome::Subtracted(rest) => {
                    current = rest;
                    report.clipped += 1;
                }
                SubtractOutcome::Repaired(rest) => {
                    current = rest;
                    report.clipped += 1;
                    report.warnings.push(Warning::FragmentRepaired { shape });
                }
                SubtractOutcome::Failed => {
                    log::warn!("could not clip shape {} by shape {}", shape, other);
                    report.warnings.push(Warning::PairUnresolved {
                        a: shape.min(other),
                        b: shape.max(other),
                    });
                }
            }
            if current.0.is_empty() {
                break;
            }
        }
        report.fragments.push(current);
    }

    log::debug!("visibility clipping: {} subtractions", report.clipped);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::Shape;
    use approx::assert_relative_eq;

    struct Fixture {
        geometries: Vec<Option<MultiPolygon<f64>>>,
        ranks: Vec<ShapeRank>,
        index: SpatialIndex2D,
    }

    fn fixture(shapes: &[Shape]) -> Fixture {
        let geometries: Vec<Option<MultiPolygon<f64>>> = shapes
            .iter()
            .map(|s| Some(MultiPolygon(vec![s.to_geo_polygon()])))
            .collect();
        let aabbs: Vec<Option<[f64; 4]>> = geometries
            .iter()
            .map(|g| g.as_ref().and_then(boolean::bounding_box))
            .collect();
        Fixture {
            ranks: shapes
                .iter()
                .enumerate()
                .map(|(i, s)| ShapeRank::new(i, s.paint_order(), s.area()))
                .collect(),
            index: SpatialIndex2D::from_aabbs(&aabbs),
            geometries,
        }
    }

    fn fragments(f: &Fixture) -> Vec<MultiPolygon<f64>> {
        f.geometries.iter().flatten().cloned().collect()
    }

    #[test]
    fn test_lower_shape_is_clipped() {
        let shapes = vec![
            Shape::rectangle("bottom", 0.0, 0.0, 10.0, 10.0).with_paint_order(0),
            Shape::rectangle("top", 5.0, 5.0, 10.0, 10.0).with_paint_order(1),
        ];
        let f = fixture(&shapes);
        let cancelled = AtomicBool::new(false);
        let report = clip_visible(
            &fragments(&f),
            &f.geometries,
            &f.ranks,
            &f.index,
            1e-9,
            &cancelled,
        )
        .unwrap();

        assert_eq!(report.clipped, 1);
        assert_relative_eq!(boolean::area(&report.fragments[0]), 75.0, epsilon = 1e-6);
        assert_relative_eq!(boolean::area(&report.fragments[1]), 100.0, epsilon = 1e-6);
    }

    #[test]
    fn test_fully_hidden_shape_vanishes() {
        let shapes = vec![
            Shape::rectangle("hidden", 2.0, 2.0, 2.0, 2.0),
            Shape::rectangle("cover", 0.0, 0.0, 10.0, 10.0),
        ];
        let f = fixture(&shapes);
        let cancelled = AtomicBool::new(false);
        let report = clip_visible(
            &fragments(&f),
            &f.geometries,
            &f.ranks,
            &f.index,
            1e-9,
            &cancelled,
        )
        .unwrap();
        assert_relative_eq!(boolean::area(&report.fragments[0]), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_input_is_untouched() {
        let shapes = vec![
            Shape::rectangle("a", 0.0, 0.0, 10.0, 10.0),
            Shape::rectangle("b", 5.0, 0.0, 10.0, 10.0),
        ];
        let f = fixture(&shapes);
        let input = fragments(&f);
        let cancelled = AtomicBool::new(false);
        let _ = clip_visible(&input, &f.geometries, &f.ranks, &f.index, 1e-9, &cancelled).unwrap();
        assert_relative_eq!(boolean::area(&input[0]), 100.0);
    }

    #[test]
    fn test_clip_cancelled() {
        let shapes = vec![Shape::rectangle("a", 0.0, 0.0, 10.0, 10.0)];
        let f = fixture(&shapes);
        let cancelled = AtomicBool::new(true);
        let result = clip_visible(
            &fragments(&f),
            &f.geometries,
            &f.ranks,
            &f.index,
            1e-9,
            &cancelled,
        );
        assert_eq!(result.unwrap_err(), Error::Cancelled);
    }
}
