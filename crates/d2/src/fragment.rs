//! Output fragments.

use crate::shape::Shape;
use diastasis_core::LayeredFragment;
use geo::{Area, MultiPolygon, Polygon};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One connected piece of a shape's output geometry.
///
/// A shape cut apart by decomposition or clipping yields several fragments;
/// each one carries the fill and style of the shape it came from.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Fragment {
    /// Index of the owning shape.
    pub shape_index: usize,
    /// Id of the owning shape.
    pub shape_id: String,
    /// Output layer.
    pub layer: usize,
    /// Geometry of the piece.
    pub polygon: Polygon<f64>,
    /// Area of the piece.
    pub area: f64,
    /// Fill paint of the owning shape.
    pub fill: Option<String>,
    /// Style of the owning shape.
    pub style: Option<String>,
}

impl Fragment {
    /// Exterior ring as (x, y) vertices, without the closing vertex.
    pub fn exterior(&self) -> Vec<(f64, f64)> {
        let mut ring: Vec<(f64, f64)> = self
            .polygon
            .exterior()
            .coords()
            .map(|c| (c.x, c.y))
            .collect();
        if ring.len() > 1 && ring.first() == ring.last() {
            ring.pop();
        }
        ring
    }

    /// Number of holes.
    pub fn hole_count(&self) -> usize {
        self.polygon.interiors().len()
    }

    /// Returns true if the piece is smaller than `threshold`.
    pub fn is_tiny(&self, threshold: f64) -> bool {
        self.area < threshold
    }
}

impl LayeredFragment for Fragment {
    fn layer(&self) -> usize {
        self.layer
    }
}

/// Splits a shape's final geometry into fragments. Empty pieces are dropped.
pub fn explode(
    shape_index: usize,
    shape: &Shape,
    layer: usize,
    geometry: &MultiPolygon<f64>,
) -> Vec<Fragment> {
    geometry
        .0
        .iter()
        .filter_map(|polygon| {
            let area = polygon.unsigned_area();
            (area > 0.0).then(|| Fragment {
                shape_index,
                shape_id: shape.id().clone(),
                layer,
                polygon: polygon.clone(),
                area,
                fill: shape.fill().map(str::to_string),
                style: shape.style().map(str::to_string),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_explode_keeps_metadata() {
        let shape = Shape::rectangle("r", 0.0, 0.0, 4.0, 2.0).with_fill("#00ff00");
        let a = Shape::rectangle("a", 0.0, 0.0, 1.0, 1.0).to_geo_polygon();
        let b = Shape::rectangle("b", 3.0, 0.0, 1.0, 2.0).to_geo_polygon();
        let pieces = explode(4, &shape, 2, &MultiPolygon(vec![a, b]));

        assert_eq!(pieces.len(), 2);
        assert_eq!(pieces[0].shape_id, "r");
        assert_eq!(pieces[0].shape_index, 4);
        assert_eq!(pieces[1].layer, 2);
        assert_eq!(pieces[1].fill.as_deref(), Some("#00ff00"));
        assert_relative_eq!(pieces[1].area, 2.0);
        assert_eq!(pieces[0].exterior().len(), 4);
        assert!(pieces[0].is_tiny(1.5));
        assert!(!pieces[1].is_tiny(1.5));
    }

    #[test]
    fn test_explode_empty() {
        let shape = Shape::rectangle("r", 0.0, 0.0, 1.0, 1.0);
        assert!(explode(0, &shape, 0, &MultiPolygon(Vec::new())).is_empty());
    }
}
