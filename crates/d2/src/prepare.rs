//! Shape preparation: optional simplification, validation and repair.

use crate::boolean;
use crate::shape::{GeometryIssue, Shape};
use diastasis_core::{Config, Warning};
use geo::MultiPolygon;

/// Per-shape geometry ready for the pipeline.
///
/// Indexed like the input. Excluded shapes have no geometry and no box; they
/// stay in the graph as isolated nodes and produce no fragments.
#[derive(Debug, Clone, Default)]
pub struct PreparedShapes {
    /// Working geometry, `None` if excluded.
    pub geometries: Vec<Option<MultiPolygon<f64>>>,
    /// Area of the working geometry (0.0 if excluded).
    pub areas: Vec<f64>,
    /// Bounding box of the working geometry.
    pub aabbs: Vec<Option<[f64; 4]>>,
    /// Repairs and exclusions.
    pub warnings: Vec<Warning>,
}

impl PreparedShapes {
    /// Number of shapes, excluded ones included.
    pub fn len(&self) -> usize {
        self.geometries.len()
    }

    /// Returns true if there are no shapes.
    pub fn is_empty(&self) -> bool {
        self.geometries.is_empty()
    }

    /// Returns true if the shape was left out.
    pub fn is_excluded(&self, index: usize) -> bool {
        self.geometries[index].is_none()
    }

    /// Number of excluded shapes.
    pub fn excluded_count(&self) -> usize {
        self.geometries.iter().filter(|g| g.is_none()).count()
    }

    /// Index of the largest usable shape. Ties go to the lower index.
    pub fn largest(&self) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (index, &area) in self.areas.iter().enumerate() {
            if self.geometries[index].is_none() {
                continue;
            }
            if best.map_or(true, |b| area > self.areas[b]) {
                best = Some(index);
            }
        }
        best
    }
}

/// Validates every shape and builds its working geometry.
pub fn prepare_shapes(shapes: &[Shape], config: &Config) -> PreparedShapes {
    let mut prepared = PreparedShapes {
        geometries: Vec::with_capacity(shapes.len()),
        areas: Vec::with_capacity(shapes.len()),
        aabbs: Vec::with_capacity(shapes.len()),
        warnings: Vec::new(),
    };

    for (index, shape) in shapes.iter().enumerate() {
        let geometry = prepare_one(index, shape, config, &mut prepared.warnings);
        let area = geometry.as_ref().map_or(0.0, boolean::area);
        let aabb = geometry.as_ref().and_then(boolean::bounding_box);
        prepared.geometries.push(geometry);
        prepared.areas.push(area);
        prepared.aabbs.push(aabb);
    }

    if !prepared.warnings.is_empty() {
        log::warn!(
            "{} geometry warnings while preparing {} shapes",
            prepared.warnings.len(),
            shapes.len()
        );
    }
    prepared
}

fn prepare_one(
    index: usize,
    shape: &Shape,
    config: &Config,
    warnings: &mut Vec<Warning>,
) -> Option<MultiPolygon<f64>> {
    let simplified;
    let shape = if config.performance_mode {
        simplified = shape.simplified(config.simplify_tolerance);
        &simplified
    } else {
        shape
    };

    let geometry = MultiPolygon(vec![shape.to_geo_polygon()]);
    match shape.diagnose() {
        None => Some(geometry),
        Some(issue) if issue.is_repairable() => match boolean::repair(&geometry) {
            Some(repaired) => {
                log::debug!("repaired shape '{}': {}", shape.id(), issue.describe());
                warnings.push(Warning::GeometryRepaired {
                    shape: index,
                    reason: issue.describe().to_string(),
                });
                Some(repaired)
            }
            None => exclude(index, shape, GeometryIssue::SelfIntersecting, warnings),
        },
        Some(issue) => exclude(index, shape, issue, warnings),
    }
}

fn exclude(
    index: usize,
    shape: &Shape,
    issue: GeometryIssue,
    warnings: &mut Vec<Warning>,
) -> Option<MultiPolygon<f64>> {
    log::warn!("excluding shape '{}': {}", shape.id(), issue.describe());
    warnings.push(Warning::GeometryExcluded {
        shape: index,
        reason: issue.describe().to_string(),
    });
    None
}
