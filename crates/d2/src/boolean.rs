//! Checked polygon boolean operations.
//!
//! Intersections and differences go through geo's `BooleanOps`. Every result
//! that feeds the output is checked for area consistency and finite
//! coordinates, and a bad result gets one repair attempt: a zero-width buffer
//! through `i_overlay`, which rebuilds valid contours from any ring soup.

use geo::{Area, BooleanOps, BoundingRect, Coord, CoordsIter, LineString, MultiPolygon, Polygon};
use i_overlay::core::fill_rule::FillRule;
use i_overlay::core::overlay_rule::OverlayRule;
use i_overlay::float::single::SingleFloatOverlay;

/// Relative tolerance for the area consistency check after a subtraction.
const AREA_CONSISTENCY_TOLERANCE: f64 = 1e-6;

/// Absolute floor below which areas count as zero.
const AREA_FLOOR: f64 = 1e-12;

/// Overlay results are snapped to a fixed-point grid centered on the
/// operands; this bounds the grid step relative to their extent.
const SNAP_RELATIVE: f64 = 1e-7;

/// Outcome of [`subtract_checked`].
#[derive(Debug, Clone)]
pub enum SubtractOutcome {
    /// The clip does not cover a measurable part of the subject.
    Unchanged,
    /// Clean subtraction.
    Subtracted(MultiPolygon<f64>),
    /// The subtraction had to be repaired before it passed the checks.
    Repaired(MultiPolygon<f64>),
    /// No consistent result could be produced; the subject should be kept.
    Failed,
}

/// Unsigned area of a multipolygon.
pub fn area(geometry: &MultiPolygon<f64>) -> f64 {
    geometry.unsigned_area()
}

/// Returns true if every coordinate is finite.
pub fn is_finite(geometry: &MultiPolygon<f64>) -> bool {
    geometry
        .coords_iter()
        .all(|c| c.x.is_finite() && c.y.is_finite())
}

/// Bounding box as `[min_x, min_y, max_x, max_y]`, or `None` when empty.
pub fn bounding_box(geometry: &MultiPolygon<f64>) -> Option<[f64; 4]> {
    geometry
        .bounding_rect()
        .map(|rect| [rect.min().x, rect.min().y, rect.max().x, rect.max().y])
}

/// Intersection of two geometries.
pub fn intersection(a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    a.intersection(b)
}

/// Largest shared area between `a` and `b` that still counts as a touch.
///
/// This is `overlap_epsilon` times the smaller area, raised to the area a
/// snapped edge can sweep inside the pair's bounding box. Classification,
/// decomposition and clipping all use it, so a cut edge never re-registers
/// as an overlap.
pub fn overlap_threshold(
    a: &MultiPolygon<f64>,
    area_a: f64,
    b: &MultiPolygon<f64>,
    area_b: f64,
    overlap_epsilon: f64,
) -> f64 {
    (overlap_epsilon * area_a.min(area_b))
        .max(snap_floor(a, b))
        .max(AREA_FLOOR)
}

fn snap_floor(a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> f64 {
    let (Some(ba), Some(bb)) = (bounding_box(a), bounding_box(b)) else {
        return 0.0;
    };
    let width = ba[2].max(bb[2]) - ba[0].min(bb[0]);
    let height = ba[3].max(bb[3]) - ba[1].min(bb[1]);
    let extent = width.max(height);
    // one grid step swept along the perimeter of the shared box
    SNAP_RELATIVE * extent * 4.0 * extent
}

/// Rebuilds a geometry from its rings with an even-odd fill.
///
/// Self-intersecting rings come back as their simple pieces. Returns `None`
/// if nothing with positive area survives.
pub fn repair(geometry: &MultiPolygon<f64>) -> Option<MultiPolygon<f64>> {
    let contours: Vec<Vec<[f64; 2]>> = geometry
        .0
        .iter()
        .flat_map(|polygon| std::iter::once(polygon.exterior()).chain(polygon.interiors()))
        .filter_map(|ring| {
            let mut contour: Vec<[f64; 2]> = ring
                .coords()
                .filter(|c| c.x.is_finite() && c.y.is_finite())
                .map(|c| [c.x, c.y])
                .collect();
            if contour.len() > 1 && contour.first() == contour.last() {
                contour.pop();
            }
            (contour.len() >= 3).then_some(contour)
        })
        .collect();

    if contours.is_empty() {
        return None;
    }

    let empty: Vec<Vec<[f64; 2]>> = Vec::new();
    let shapes = contours.overlay(&empty, OverlayRule::Subject, FillRule::EvenOdd);

    let polygons: Vec<Polygon<f64>> = shapes
        .into_iter()
        .filter_map(|shape| {
            let mut rings = shape.into_iter();
            let outer = rings.next()?;
            if outer.len() < 3 {
                return None;
            }
            let holes = rings
                .filter(|hole| hole.len() >= 3)
                .map(contour_to_line_string)
                .collect();
            Some(Polygon::new(contour_to_line_string(outer), holes))
        })
        .collect();

    let repaired = MultiPolygon(polygons);
    (area(&repaired) > AREA_FLOOR && is_finite(&repaired)).then_some(repaired)
}

/// Removes `clip` from `subject` and checks the result.
///
/// When `subject ∩ clip` has an area at or below `min_contested_area` nothing
/// is removed, so repeating a subtraction is a no-op. A result passes when its
/// coordinates are finite and its area equals the subject's area minus the
/// contested area within a small relative tolerance. A passing result that
/// still shares more than `min_contested_area` with the clip is cut once more.
pub fn subtract_checked(
    subject: &MultiPolygon<f64>,
    clip: &MultiPolygon<f64>,
    min_contested_area: f64,
) -> SubtractOutcome {
    if subject.0.is_empty() || clip.0.is_empty() {
        return SubtractOutcome::Unchanged;
    }

    let subject_area = area(subject);
    let contested_area = area(&subject.intersection(clip));
    if !contested_area.is_finite() {
        return SubtractOutcome::Failed;
    }
    let threshold = min_contested_area.max(AREA_FLOOR);
    if contested_area <= threshold {
        return SubtractOutcome::Unchanged;
    }

    let expected = (subject_area - contested_area).max(0.0);
    let tolerance = AREA_CONSISTENCY_TOLERANCE * subject_area.max(1.0);

    let remainder = drop_slivers(subject.difference(clip), subject_area);
    if is_consistent(&remainder, expected, tolerance) {
        let settled = settle(remainder, clip, threshold, subject_area);
        return SubtractOutcome::Subtracted(settled);
    }

    log::debug!(
        "subtraction inconsistent (expected area {:.6}, got {:.6}), repairing",
        expected,
        area(&remainder)
    );

    if let Some(fixed) = repair(&remainder) {
        if is_consistent(&fixed, expected, tolerance) {
            return SubtractOutcome::Repaired(settle(fixed, clip, threshold, subject_area));
        }
    }

    // Second chance: clean both operands first.
    if let (Some(s), Some(c)) = (repair(subject), repair(clip)) {
        let retry = drop_slivers(s.difference(&c), subject_area);
        if is_consistent(&retry, expected, tolerance) {
            return SubtractOutcome::Repaired(settle(retry, clip, threshold, subject_area));
        }
    }

    SubtractOutcome::Failed
}

/// Area still shared by `geometry` and `clip`.
pub fn residual_overlap(geometry: &MultiPolygon<f64>, clip: &MultiPolygon<f64>) -> f64 {
    if geometry.0.is_empty() || clip.0.is_empty() {
        return 0.0;
    }
    area(&geometry.intersection(clip))
}

/// Cuts `clip` out of `rest` again if a measurable part of it survived.
///
/// The second cut is kept only if it leaves less behind.
fn settle(
    rest: MultiPolygon<f64>,
    clip: &MultiPolygon<f64>,
    threshold: f64,
    reference_area: f64,
) -> MultiPolygon<f64> {
    let residual = residual_overlap(&rest, clip);
    if residual <= threshold {
        return rest;
    }
    log::debug!("residual overlap {:.3e} after subtraction, cutting again", residual);
    let again = drop_slivers(rest.difference(clip), reference_area);
    if is_finite(&again) && residual_overlap(&again, clip) < residual {
        again
    } else {
        rest
    }
}

/// Drops pieces whose area is negligible relative to `reference_area`.
fn drop_slivers(geometry: MultiPolygon<f64>, reference_area: f64) -> MultiPolygon<f64> {
    let floor = (f64::EPSILON * reference_area).max(AREA_FLOOR);
    MultiPolygon(
        geometry
            .0
            .into_iter()
            .filter(|polygon| polygon.unsigned_area() > floor)
            .collect(),
    )
}

fn is_consistent(geometry: &MultiPolygon<f64>, expected: f64, tolerance: f64) -> bool {
    is_finite(geometry) && (area(geometry) - expected).abs() <= tolerance
}

fn contour_to_line_string(contour: Vec<[f64; 2]>) -> LineString<f64> {
    LineString::from(
        contour
            .into_iter()
            .map(|[x, y]| Coord { x, y })
            .collect::<Vec<_>>(),
    )
}
