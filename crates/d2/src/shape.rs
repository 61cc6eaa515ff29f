//! 2D shape records.

use diastasis_core::{Error, Result};
use geo::{Area, BoundingRect, Coord, Intersects, Line, LineString, Polygon, Simplify};
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{RTree, AABB};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Unique identifier for a shape.
pub type ShapeId = String;

/// A filled polygon extracted from the source artwork.
///
/// Shapes are built once with the `with_*` methods and treated as immutable
/// afterwards. The paint order gives the stacking: a shape with a greater
/// paint order is drawn on top. Shapes with equal paint order stack in input
/// order.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Shape {
    /// Unique identifier.
    id: ShapeId,

    /// Outer boundary of the polygon.
    exterior: Vec<(f64, f64)>,

    /// Interior holes (if any).
    holes: Vec<Vec<(f64, f64)>>,

    /// Fill paint from the artwork (e.g. `#ff0000`).
    fill: Option<String>,

    /// Remaining style attributes, passed through untouched.
    style: Option<String>,

    /// Stacking position in the source artwork.
    paint_order: usize,
}

/// Topology problem found by [`Shape::diagnose`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryIssue {
    /// Fewer than three distinct vertices.
    TooFewVertices,
    /// NaN or infinite coordinate.
    NonFinite,
    /// Zero enclosed area.
    ZeroArea,
    /// A ring crosses itself.
    SelfIntersecting,
}

impl GeometryIssue {
    /// Returns true if a zero-width buffer pass may fix the problem.
    pub fn is_repairable(self) -> bool {
        matches!(self, GeometryIssue::SelfIntersecting)
    }

    /// Short description for warnings.
    pub fn describe(self) -> &'static str {
        match self {
            GeometryIssue::TooFewVertices => "fewer than 3 distinct vertices",
            GeometryIssue::NonFinite => "non-finite coordinate",
            GeometryIssue::ZeroArea => "zero area",
            GeometryIssue::SelfIntersecting => "self-intersecting ring",
        }
    }
}

impl Shape {
    /// Creates a new shape with the given ID.
    pub fn new(id: impl Into<ShapeId>) -> Self {
        Self {
            id: id.into(),
            exterior: Vec::new(),
            holes: Vec::new(),
            fill: None,
            style: None,
            paint_order: 0,
        }
    }

    /// Sets the polygon from a list of (x, y) vertices.
    pub fn with_polygon(mut self, vertices: Vec<(f64, f64)>) -> Self {
        self.exterior = vertices;
        self
    }

    /// Adds an interior hole.
    pub fn with_hole(mut self, vertices: Vec<(f64, f64)>) -> Self {
        self.holes.push(vertices);
        self
    }

    /// Sets the fill paint.
    pub fn with_fill(mut self, fill: impl Into<String>) -> Self {
        self.fill = Some(fill.into());
        self
    }

    /// Sets the pass-through style string.
    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }

    /// Sets the paint order.
    pub fn with_paint_order(mut self, paint_order: usize) -> Self {
        self.paint_order = paint_order;
        self
    }

    /// Creates an axis-aligned rectangle with its lower-left corner at (x, y).
    pub fn rectangle(id: impl Into<ShapeId>, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(id).with_polygon(vec![
            (x, y),
            (x + width, y),
            (x + width, y + height),
            (x, y + height),
        ])
    }

    /// Creates a rectangle from two opposite corners.
    pub fn from_corners(id: impl Into<ShapeId>, min: (f64, f64), max: (f64, f64)) -> Self {
        Self::rectangle(id, min.0, min.1, max.0 - min.0, max.1 - min.1)
    }

    /// Creates a circle approximation with n vertices.
    pub fn circle(id: impl Into<ShapeId>, cx: f64, cy: f64, radius: f64, n: usize) -> Self {
        let n = n.max(8);
        let step = std::f64::consts::TAU / n as f64;
        let vertices: Vec<(f64, f64)> = (0..n)
            .map(|i| {
                let angle = i as f64 * step;
                (cx + radius * angle.cos(), cy + radius * angle.sin())
            })
            .collect();
        Self::new(id).with_polygon(vertices)
    }

    /// Returns the shape ID.
    pub fn id(&self) -> &ShapeId {
        &self.id
    }

    /// Returns the exterior vertices.
    pub fn exterior(&self) -> &[(f64, f64)] {
        &self.exterior
    }

    /// Returns the hole rings.
    pub fn holes(&self) -> &[Vec<(f64, f64)>] {
        &self.holes
    }

    /// Returns the fill paint.
    pub fn fill(&self) -> Option<&str> {
        self.fill.as_deref()
    }

    /// Returns the pass-through style string.
    pub fn style(&self) -> Option<&str> {
        self.style.as_deref()
    }

    /// Returns the paint order.
    pub fn paint_order(&self) -> usize {
        self.paint_order
    }

    /// Converts to a geo crate Polygon.
    pub fn to_geo_polygon(&self) -> Polygon<f64> {
        Polygon::new(
            ring_to_line_string(&self.exterior),
            self.holes.iter().map(|h| ring_to_line_string(h)).collect(),
        )
    }

    /// Area of the polygon (holes subtracted).
    pub fn area(&self) -> f64 {
        self.to_geo_polygon().unsigned_area()
    }

    /// Axis-aligned bounding box as ([min_x, min_y], [max_x, max_y]).
    pub fn aabb(&self) -> ([f64; 2], [f64; 2]) {
        match self.to_geo_polygon().bounding_rect() {
            Some(rect) => (
                [rect.min().x, rect.min().y],
                [rect.max().x, rect.max().y],
            ),
            None => ([0.0, 0.0], [0.0, 0.0]),
        }
    }

    /// Returns the first topology problem of the shape, if any.
    pub fn diagnose(&self) -> Option<GeometryIssue> {
        let all_finite = self
            .exterior
            .iter()
            .chain(self.holes.iter().flatten())
            .all(|&(x, y)| x.is_finite() && y.is_finite());
        if !all_finite {
            return Some(GeometryIssue::NonFinite);
        }

        if distinct_ring(&self.exterior).len() < 3 {
            return Some(GeometryIssue::TooFewVertices);
        }

        // Lobes of a figure-eight cancel in the signed area, so crossings
        // are looked for first.
        let self_intersecting = std::iter::once(&self.exterior)
            .chain(self.holes.iter())
            .any(|ring| ring_self_intersects(ring));
        if self_intersecting {
            return Some(GeometryIssue::SelfIntersecting);
        }

        if self.area() <= 0.0 {
            return Some(GeometryIssue::ZeroArea);
        }

        None
    }

    /// Validates the shape, reporting the first topology problem as an error.
    pub fn validate(&self) -> Result<()> {
        match self.diagnose() {
            None => Ok(()),
            Some(issue) => Err(Error::InvalidGeometry(format!(
                "Shape '{}': {}",
                self.id,
                issue.describe()
            ))),
        }
    }

    /// Returns a copy with rings simplified by Ramer-Douglas-Peucker.
    ///
    /// Rings that would collapse are kept as they are.
    pub fn simplified(&self, tolerance: f64) -> Shape {
        if tolerance <= 0.0 {
            return self.clone();
        }
        let simplified = self.to_geo_polygon().simplify(&tolerance);
        if simplified.exterior().0.len() < 4 || simplified.unsigned_area() <= 0.0 {
            return self.clone();
        }

        let mut shape = self.clone();
        shape.exterior = line_string_to_ring(simplified.exterior());
        shape.holes = simplified
            .interiors()
            .iter()
            .filter(|h| h.0.len() >= 4)
            .map(line_string_to_ring)
            .collect();
        shape
    }
}

fn ring_to_line_string(ring: &[(f64, f64)]) -> LineString<f64> {
    LineString::from(
        ring.iter()
            .map(|&(x, y)| Coord { x, y })
            .collect::<Vec<_>>(),
    )
}

fn line_string_to_ring(line: &LineString<f64>) -> Vec<(f64, f64)> {
    let mut ring: Vec<(f64, f64)> = line.coords().map(|c| (c.x, c.y)).collect();
    if ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    ring
}

/// Ring vertices without consecutive duplicates or a closing repeat.
fn distinct_ring(ring: &[(f64, f64)]) -> Vec<(f64, f64)> {
    let mut out: Vec<(f64, f64)> = Vec::with_capacity(ring.len());
    for &p in ring {
        if out.last() != Some(&p) {
            out.push(p);
        }
    }
    while out.len() > 1 && out.first() == out.last() {
        out.pop();
    }
    out
}

/// Checks whether any two non-adjacent edges of a ring intersect.
///
/// Edge boxes go into an R-tree so only edges with overlapping boxes are
/// tested exactly.
fn ring_self_intersects(ring: &[(f64, f64)]) -> bool {
    let points = distinct_ring(ring);
    let m = points.len();
    if m < 4 {
        return false;
    }

    let edges: Vec<Line<f64>> = (0..m)
        .map(|i| {
            let (x1, y1) = points[i];
            let (x2, y2) = points[(i + 1) % m];
            Line::new(Coord { x: x1, y: y1 }, Coord { x: x2, y: y2 })
        })
        .collect();

    let tree: RTree<GeomWithData<Rectangle<[f64; 2]>, usize>> = RTree::bulk_load(
        edges
            .iter()
            .enumerate()
            .map(|(i, edge)| {
                GeomWithData::new(
                    Rectangle::from_corners([edge.start.x, edge.start.y], [edge.end.x, edge.end.y]),
                    i,
                )
            })
            .collect(),
    );

    edges.iter().enumerate().any(|(i, edge)| {
        let envelope = AABB::from_corners([edge.start.x, edge.start.y], [edge.end.x, edge.end.y]);
        tree.locate_in_envelope_intersecting(&envelope)
            .map(|candidate| candidate.data)
            .filter(|&j| j > i + 1 && !(i == 0 && j == m - 1))
            .any(|j| edge.intersects(&edges[j]))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rectangle_area() {
        let rect = Shape::rectangle("R1", 0.0, 0.0, 10.0, 5.0);
        assert_relative_eq!(rect.area(), 50.0, epsilon = 0.001);
    }

    #[test]
    fn test_polygon_with_hole() {
        let frame = Shape::new("P1")
            .with_polygon(vec![(0.0, 0.0), (100.0, 0.0), (100.0, 100.0), (0.0, 100.0)])
            .with_hole(vec![(25.0, 25.0), (75.0, 25.0), (75.0, 75.0), (25.0, 75.0)]);

        // 100*100 - 50*50
        assert_relative_eq!(frame.area(), 7500.0, epsilon = 0.001);
        assert!(frame.validate().is_ok());
    }

    #[test]
    fn test_aabb() {
        let shape = Shape::from_corners("P1", (10.0, 20.0), (50.0, 80.0));
        let (min, max) = shape.aabb();
        assert_relative_eq!(min[0], 10.0);
        assert_relative_eq!(min[1], 20.0);
        assert_relative_eq!(max[0], 50.0);
        assert_relative_eq!(max[1], 80.0);
    }

    #[test]
    fn test_metadata_builders() {
        let shape = Shape::rectangle("R", 0.0, 0.0, 1.0, 1.0)
            .with_fill("#ff0000")
            .with_style("stroke:none")
            .with_paint_order(7);
        assert_eq!(shape.fill(), Some("#ff0000"));
        assert_eq!(shape.style(), Some("stroke:none"));
        assert_eq!(shape.paint_order(), 7);
    }

    #[test]
    fn test_diagnose_degenerate_shapes() {
        let two_points = Shape::new("a").with_polygon(vec![(0.0, 0.0), (1.0, 0.0)]);
        assert_eq!(two_points.diagnose(), Some(GeometryIssue::TooFewVertices));

        let collinear =
            Shape::new("b").with_polygon(vec![(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)]);
        assert_eq!(collinear.diagnose(), Some(GeometryIssue::ZeroArea));

        let nan = Shape::new("c").with_polygon(vec![(0.0, 0.0), (f64::NAN, 0.0), (1.0, 1.0)]);
        assert_eq!(nan.diagnose(), Some(GeometryIssue::NonFinite));
        assert!(nan.validate().is_err());
    }

    #[test]
    fn test_diagnose_bowtie() {
        let bowtie = Shape::new("bow").with_polygon(vec![
            (0.0, 0.0),
            (10.0, 10.0),
            (10.0, 0.0),
            (0.0, 10.0),
        ]);
        // The two lobes cancel in the signed area
        assert_relative_eq!(bowtie.area(), 0.0, epsilon = 1e-9);
        let issue = bowtie.diagnose();
        assert_eq!(issue, Some(GeometryIssue::SelfIntersecting));
        assert!(issue.unwrap().is_repairable());
    }

    #[test]
    fn test_diagnose_large_rings() {
        let circle = Shape::circle("big", 0.0, 0.0, 100.0, 4096);
        assert_eq!(circle.diagnose(), None);

        // Swapping two distant vertices makes their chords cross
        let mut ring = circle.exterior().to_vec();
        ring.swap(10, 2000);
        let crossed = Shape::new("crossed").with_polygon(ring);
        assert_eq!(crossed.diagnose(), Some(GeometryIssue::SelfIntersecting));
    }

    #[test]
    fn test_closed_ring_is_valid() {
        let closed = Shape::new("closed").with_polygon(vec![
            (0.0, 0.0),
            (4.0, 0.0),
            (4.0, 4.0),
            (0.0, 4.0),
            (0.0, 0.0),
        ]);
        assert_eq!(closed.diagnose(), None);
    }

    #[test]
    fn test_circle() {
        let circle = Shape::circle("C1", 5.0, 5.0, 10.0, 32);
        let expected = std::f64::consts::PI * 10.0 * 10.0;
        assert_relative_eq!(circle.area(), expected, epsilon = 5.0);
        assert!(circle.validate().is_ok());
    }

    #[test]
    fn test_simplified_drops_collinear_vertices() {
        let shape = Shape::new("s").with_polygon(vec![
            (0.0, 0.0),
            (5.0, 0.0),
            (10.0, 0.0),
            (10.0, 10.0),
            (0.0, 10.0),
        ]);
        let simple = shape.simplified(0.1);
        assert_eq!(simple.exterior().len(), 4);
        assert_relative_eq!(simple.area(), 100.0, epsilon = 1e-9);
        assert_eq!(simple.id(), shape.id());
    }

    #[test]
    fn test_simplified_keeps_collapsing_ring() {
        let sliver = Shape::new("s").with_polygon(vec![(0.0, 0.0), (10.0, 0.0), (10.0, 0.01)]);
        let simple = sliver.simplified(1.0);
        assert_eq!(simple, sliver);
    }
}
