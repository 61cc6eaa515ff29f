//! # Diastasis Core
//!
//! Geometry-agnostic part of the Diastasis layer separation engine.
//!
//! Shapes extracted from vector artwork are split into output layers so that
//! no two conflicting shapes share a layer. This crate owns everything that
//! does not need polygons: the conflict graph, the coloring strategies, the
//! configuration and the result types. The 2D pipeline lives in
//! `diastasis-d2`.
//!
//! ## Core Components
//!
//! - **Conflict graph**: [`ConflictGraph`], built from [`PairRelation`]s under a [`ConflictPolicy`]
//! - **Coloring engine**: [`color_graph`] dispatching every [`Algorithm`]
//! - **Lower bound**: [`clique_lower_bound`]
//! - **Separator trait**: [`Separator`] - common interface for pipelines
//!
//! ## Configuration
//!
//! ```rust
//! use diastasis_core::{Config, Mode, PriorityOrder, TouchPolicy};
//!
//! let config = Config::new()
//!     .with_mode(Mode::Flat)
//!     .with_touch_policy(TouchPolicy::CornerAllowed)
//!     .with_priority_order(PriorityOrder::LargestFirst)
//!     .with_force_k(3);
//!
//! assert!(config.validate().is_ok());
//! ```
//!
//! ## Coloring a graph directly
//!
//! ```rust
//! use diastasis_core::{color_graph, Algorithm, ColoringParams, ConflictGraph};
//!
//! let mut graph = ConflictGraph::new(3);
//! graph.add_edge(0, 1, 25.0);
//! graph.add_edge(1, 2, 4.0);
//!
//! let outcome = color_graph(&graph, &ColoringParams::new(Algorithm::Dsatur)).unwrap();
//! assert_eq!(outcome.assignment.layer_count(), 2);
//! assert!(outcome.assignment.is_proper(&graph));
//! ```
//!
//! ## Feature Flags
//!
//! - `serde`: Enable serialization/deserialization support

pub mod coloring;
pub mod error;
pub mod graph;
pub mod result;
pub mod solver;

// Re-exports
pub use coloring::{
    clique_lower_bound, color_graph, dsatur, force_k, greedy_clique, greedy_color,
    independent_set, reduce_layers, ColoringOutcome, ColoringParams, ConflictPair,
    ConflictReason, LayerAssignment, StepBudgetExceeded,
};
pub use error::{Error, Result};
pub use graph::{ConflictGraph, ConflictPolicy, PairRelation, RelationKind};
pub use result::{LayeredFragment, SeparationResult, Summary, Warning};
pub use solver::{
    Algorithm, Config, Mode, PriorityOrder, ProgressCallback, ProgressInfo, Separator,
    TouchPolicy,
};
