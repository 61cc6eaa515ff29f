//! # Diastasis 2D
//!
//! 2D layer separation for the Diastasis engine.
//!
//! Takes filled polygons extracted from vector artwork and splits them into
//! output layers so that conflicting shapes never share a layer, for example to
//! drive one laser-cutting or plotting pass per layer.
//!
//! ## Features
//!
//! - Polygon shapes with holes, fill/style metadata and paint order
//! - Shape validation with automatic repair of self-intersecting rings
//! - R*-tree broad phase and exact overlap/edge/corner classification
//! - Eight coloring strategies, including a fixed layer count (`force_k`)
//! - Flat mode: overlapping shapes are cut into non-overlapping fragments
//! - Visible-boundary clipping against shapes painted above
//! - Run summary with clique lower bound, conflicts and area share
//!
//! ## Quick Start
//!
//! ```rust
//! use diastasis_d2::{Config, Separator, Separator2D, Shape};
//!
//! let shapes = vec![
//!     Shape::rectangle("A", 0.0, 0.0, 10.0, 10.0),
//!     Shape::rectangle("B", 5.0, 5.0, 10.0, 10.0),
//! ];
//!
//! let separator = Separator2D::new(Config::default());
//! let result = separator.separate(&shapes).unwrap();
//!
//! assert_eq!(result.layer_count(), 2);
//! assert_ne!(result.layer_of("A"), result.layer_of("B"));
//! ```
//!
//! ## Flat Mode
//!
//! ```rust
//! use diastasis_d2::{Config, Mode, PriorityOrder, Separator, Separator2D, Shape};
//!
//! let shapes = vec![
//!     Shape::rectangle("A", 0.0, 0.0, 10.0, 10.0).with_paint_order(0),
//!     Shape::rectangle("B", 5.0, 5.0, 10.0, 10.0).with_paint_order(1),
//! ];
//!
//! let config = Config::new()
//!     .with_mode(Mode::Flat)
//!     .with_priority_order(PriorityOrder::Source);
//! let result = Separator2D::new(config).separate(&shapes).unwrap();
//!
//! // B is on top and keeps the shared corner; A becomes an L-shape.
//! let a_area: f64 = result
//!     .fragments
//!     .iter()
//!     .filter(|f| f.shape_id == "A")
//!     .map(|f| f.area)
//!     .sum();
//! assert!((a_area - 75.0).abs() < 1e-6);
//! ```
//!
//! ## Complexity Estimate
//!
//! ```rust
//! use diastasis_d2::{estimate_complexity, ComplexityLevel, Config, Shape};
//!
//! let shapes: Vec<Shape> = (0..10)
//!     .map(|i| Shape::rectangle(format!("s{}", i), i as f64 * 20.0, 0.0, 10.0, 10.0))
//!     .collect();
//! let estimate = estimate_complexity(&shapes, &Config::default());
//! assert_eq!(estimate.candidate_pairs, 0);
//! assert_eq!(estimate.level, ComplexityLevel::Low);
//! ```

pub mod analytics;
pub mod boolean;
pub mod complexity;
pub mod flatten;
pub mod fragment;
pub mod prepare;
pub mod relation;
pub mod separator;
pub mod shape;
pub mod spatial_index;
pub mod visibility;

// Re-exports
pub use complexity::{estimate_complexity, ComplexityEstimate, ComplexityLevel};
pub use diastasis_core::{
    Algorithm, Config, ConflictGraph, ConflictPair, ConflictReason, Error, LayerAssignment,
    LayeredFragment, Mode, PairRelation, PriorityOrder, ProgressCallback, ProgressInfo,
    RelationKind, Result, SeparationResult, Separator, Summary, TouchPolicy, Warning,
};
pub use fragment::Fragment;
pub use relation::classify_pair;
pub use separator::Separator2D;
pub use shape::{GeometryIssue, Shape, ShapeId};
pub use spatial_index::{SpatialEntry2D, SpatialIndex2D};
