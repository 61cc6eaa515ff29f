//! 2D layer separation pipeline.

use crate::analytics::{summarize, RunArtifacts};
use crate::flatten::{contested_pairs, decompose, order_contested, FragmentArena, ShapeRank};
use crate::fragment::{explode, Fragment};
use crate::prepare::{prepare_shapes, PreparedShapes};
use crate::relation::detect_relations;
use crate::shape::Shape;
use crate::spatial_index::SpatialIndex2D;
use crate::visibility::clip_visible;
use diastasis_core::{
    color_graph, Algorithm, ColoringParams, Config, ConflictGraph, ConflictPolicy, Error, Mode,
    PairRelation, ProgressCallback, ProgressInfo, Result, SeparationResult, Separator, Warning,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// 2D layer separator.
///
/// Runs the whole pipeline: preparation, broad phase, relation
/// classification, conflict graph, coloring, then (depending on the
/// configuration) flat decomposition and visibility clipping.
pub struct Separator2D {
    config: Config,
    cancelled: Arc<AtomicBool>,
}

impl Separator2D {
    /// Creates a new separator with the given configuration.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Creates a separator with default configuration.
    pub fn default_config() -> Self {
        Self::new(Config::default())
    }

    /// Returns the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shared handle to the cancel flag, for cancelling from another thread.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancelled.load(Ordering::Relaxed) {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Classifies candidate pairs, on a dedicated pool when `threads` is set.
    fn classify(
        &self,
        prepared: &PreparedShapes,
        pairs: &[(usize, usize)],
    ) -> Result<Vec<PairRelation>> {
        let run = || {
            detect_relations(
                &prepared.geometries,
                &prepared.areas,
                pairs,
                self.config.overlap_epsilon,
                &self.cancelled,
            )
        };

        if self.config.threads > 0 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.threads)
                .build()
                .map_err(|e| Error::Internal(format!("failed to build thread pool: {}", e)))?;
            pool.install(run)
        } else {
            run()
        }
    }

    fn run(
        &self,
        shapes: &[Shape],
        callback: Option<&ProgressCallback>,
    ) -> Result<SeparationResult<Fragment>> {
        self.config.validate()?;

        let start = Instant::now();
        let report = |phase: &str, completed: usize, total: usize| {
            if let Some(cb) = callback {
                cb(ProgressInfo::new(phase)
                    .with_units(completed, total)
                    .with_elapsed(start.elapsed().as_millis() as u64));
            }
        };

        let n = shapes.len();
        let mut warnings: Vec<Warning> = Vec::new();

        // Preparation
        report("prepare", 0, n);
        let prepared = prepare_shapes(shapes, &self.config);
        warnings.extend(prepared.warnings.iter().cloned());
        self.check_cancelled()?;

        // Broad phase
        let index = SpatialIndex2D::from_aabbs(&prepared.aabbs);
        let pairs = index.candidate_pairs();
        log::debug!("{} shapes, {} candidate pairs", n, pairs.len());

        // Relation classification
        report("classify", 0, pairs.len());
        let relations = self.classify(&prepared, &pairs)?;
        report("classify", pairs.len(), pairs.len());

        // Conflict graph
        let policy = ConflictPolicy::for_mode(self.config.mode, self.config.touch_policy);
        let graph = ConflictGraph::from_relations(n, &relations, policy)
            .with_node_weights(prepared.areas.clone());
        self.check_cancelled()?;

        // Coloring
        report("color", 0, n);
        let params = ColoringParams::from_config(&self.config);
        let outcome = color_graph(&graph, &params)?;
        if outcome.fell_back {
            warnings.push(Warning::RecursionFallback {
                requested: self.config.algorithm,
            });
        }
        let force_k = self.config.algorithm == Algorithm::ForceK;
        if let (true, Some(k)) = (force_k, self.config.force_k_target) {
            if k < outcome.lower_bound {
                warnings.push(Warning::InfeasibleForceK {
                    k,
                    lower_bound: outcome.lower_bound,
                });
            }
        }

        let mut assignment = outcome.assignment.clone();
        if self.config.separate_background && self.config.mode == Mode::Overlaid && !force_k {
            if let Some(background) = prepared.largest() {
                log::debug!("moving background shape {} to its own layer", background);
                assignment.move_to_new_layer(background);
            }
        }
        self.check_cancelled()?;

        let ranks: Vec<ShapeRank> = shapes
            .iter()
            .enumerate()
            .map(|(i, shape)| ShapeRank::new(i, shape.paint_order(), prepared.areas[i]))
            .collect();
        let mut conflicts = outcome.conflicts.clone();

        // Flat decomposition
        let mut arena = FragmentArena::from_geometries(&prepared.geometries);
        if self.config.mode == Mode::Flat {
            let contested = contested_pairs(&graph, &assignment, force_k);
            let ordered = order_contested(&contested, &ranks, self.config.priority_order);
            report("decompose", 0, ordered.len());
            let decomposition = decompose(
                &mut arena,
                &ordered,
                self.config.overlap_epsilon,
                &self.cancelled,
            )?;
            report("decompose", ordered.len(), ordered.len());
            conflicts.extend(decomposition.unresolved);
            warnings.extend(decomposition.warnings);
        }
        let mut geometries = arena.into_geometries();

        // Visibility clipping
        if self.config.clip_visible_boundaries {
            report("clip", 0, n);
            let clipped = clip_visible(
                &geometries,
                &prepared.geometries,
                &ranks,
                &index,
                self.config.overlap_epsilon,
                &self.cancelled,
            )?;
            geometries = clipped.fragments;
            warnings.extend(clipped.warnings);
        }

        let fragments: Vec<Fragment> = shapes
            .iter()
            .zip(geometries.iter())
            .enumerate()
            .flat_map(|(i, (shape, geometry))| {
                explode(i, shape, assignment.layer_of(i), geometry)
            })
            .collect();

        let computation_time_ms = start.elapsed().as_millis() as u64;
        let summary = summarize(&RunArtifacts {
            shape_count: n,
            candidate_pair_count: pairs.len(),
            graph: &graph,
            clique_lower_bound: outcome.lower_bound,
            assignment: &assignment,
            conflicts: &conflicts,
            fragments: &fragments,
            warnings: &warnings,
            excluded_shape_count: prepared.excluded_count(),
            algorithm_used: outcome.algorithm_used,
            recursion_fallback: outcome.fell_back,
            tiny_fragment_area: self.config.tiny_fragment_area,
            computation_time_ms,
        });

        log::info!(
            "separated {} shapes into {} layers ({} mode, {}): {} edges, {} conflicts, {} fragments in {}ms",
            n,
            summary.achieved_layer_count,
            self.config.mode,
            summary
                .algorithm_used
                .map_or_else(String::new, |a| a.to_string()),
            summary.edge_count,
            summary.conflict_pair_count,
            summary.fragment_count,
            computation_time_ms
        );

        if let Some(cb) = callback {
            cb(ProgressInfo::new("done")
                .with_units(n, n)
                .with_elapsed(computation_time_ms)
                .finished());
        }

        Ok(SeparationResult {
            shape_ids: shapes.iter().map(|s| s.id().clone()).collect(),
            assignment,
            conflicts,
            fragments,
            warnings,
            summary,
        })
    }
}

impl Separator for Separator2D {
    type Shape = Shape;
    type Fragment = Fragment;

    fn separate(&self, shapes: &[Self::Shape]) -> Result<SeparationResult<Fragment>> {
        // Reset cancellation flag
        self.cancelled.store(false, Ordering::Relaxed);
        self.run(shapes, None)
    }

    fn separate_with_progress(
        &self,
        shapes: &[Self::Shape],
        callback: ProgressCallback,
    ) -> Result<SeparationResult<Fragment>> {
        // Reset cancellation flag
        self.cancelled.store(false, Ordering::Relaxed);
        self.run(shapes, Some(&callback))
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use diastasis_core::{ConflictReason, TouchPolicy};
    use std::sync::Mutex;

    fn two_squares() -> Vec<Shape> {
        vec![
            Shape::rectangle("A", 0.0, 0.0, 10.0, 10.0).with_paint_order(0),
            Shape::rectangle("B", 5.0, 5.0, 10.0, 10.0).with_paint_order(1),
        ]
    }

    #[test]
    fn test_overlaid_two_squares() {
        let separator = Separator2D::default_config();
        let result = separator.separate(&two_squares()).unwrap();

        assert_eq!(result.summary.edge_count, 1);
        assert_eq!(result.layer_count(), 2);
        assert_ne!(result.layer_of("A"), result.layer_of("B"));
        assert_eq!(result.fragments.len(), 2);
        assert!(result.is_conflict_free());
    }

    #[test]
    fn test_flat_source_priority() {
        let config = Config::new()
            .with_mode(Mode::Flat)
            .with_touch_policy(TouchPolicy::Strict);
        let result = Separator2D::new(config).separate(&two_squares()).unwrap();

        let a: f64 = result.fragments.iter().filter(|f| f.shape_id == "A").map(|f| f.area).sum();
        let b: f64 = result.fragments.iter().filter(|f| f.shape_id == "B").map(|f| f.area).sum();
        assert_relative_eq!(a, 75.0, epsilon = 1e-6);
        assert_relative_eq!(b, 100.0, epsilon = 1e-6);
    }

    #[test]
    fn test_invalid_config_is_rejected_before_work() {
        let config = Config::new()
            .with_algorithm(Algorithm::ForceK)
            .with_overlap_epsilon(-1.0);
        let result = Separator2D::new(config).separate(&two_squares());
        assert!(result.unwrap_err().is_config_error());
    }

    #[test]
    fn test_force_k_infeasible_warning() {
        let shapes = vec![
            Shape::rectangle("a", 0.0, 0.0, 10.0, 10.0),
            Shape::rectangle("b", 2.0, 2.0, 10.0, 10.0),
            Shape::rectangle("c", 4.0, 4.0, 10.0, 10.0),
        ];
        let result = Separator2D::new(Config::new().with_force_k(2))
            .separate(&shapes)
            .unwrap();
        assert_eq!(result.layer_count(), 2);
        assert_eq!(result.summary.clique_lower_bound, 3);
        assert!(!result.conflicts_with_reason(ConflictReason::SharedLayer).is_empty());
        assert!(result
            .warnings
            .iter()
            .any(|w| matches!(w, Warning::InfeasibleForceK { k: 2, lower_bound: 3 })));
    }

    #[test]
    fn test_background_separation() {
        let shapes = vec![
            Shape::rectangle("bg", 0.0, 0.0, 100.0, 100.0),
            Shape::rectangle("x", 10.0, 10.0, 5.0, 5.0),
            Shape::rectangle("y", 50.0, 50.0, 5.0, 5.0),
        ];
        let config = Config::new().with_separate_background(true);
        let result = Separator2D::new(config).separate(&shapes).unwrap();

        let bg = result.layer_of("bg").unwrap();
        let x = result.layer_of("x").unwrap();
        assert_ne!(bg, x);
        assert_eq!(result.layer_of("x"), result.layer_of("y"));
        assert_eq!(result.assignment.members(bg), vec![0]);
    }

    #[test]
    fn test_progress_reports_phases() {
        let phases = Arc::new(Mutex::new(Vec::new()));
        let sink = phases.clone();
        let callback: ProgressCallback = Box::new(move |info: ProgressInfo| {
            if let Ok(mut p) = sink.lock() {
                p.push((info.phase.clone(), info.running));
            }
        });

        Separator2D::default_config()
            .separate_with_progress(&two_squares(), callback)
            .unwrap();

        let phases = phases.lock().unwrap();
        assert_eq!(phases.first().map(|p| p.0.as_str()), Some("prepare"));
        assert_eq!(phases.last(), Some(&("done".to_string(), false)));
        assert!(phases.iter().any(|p| p.0 == "classify"));
    }

    #[test]
    fn test_cancel_flag_is_reset_per_run() {
        let separator = Separator2D::default_config();
        separator.cancel();
        assert!(separator.cancel_handle().load(Ordering::Relaxed));
        // A new run clears the flag and completes.
        assert!(separator.separate(&two_squares()).is_ok());
    }

    #[test]
    fn test_dedicated_thread_pool() {
        let config = Config::new().with_threads(2);
        let result = Separator2D::new(config).separate(&two_squares()).unwrap();
        assert_eq!(result.layer_count(), 2);
    }
}
