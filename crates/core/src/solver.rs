//! Separator trait and configuration.

use crate::error::{Error, Result};
use crate::result::SeparationResult;
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Processing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Mode {
    /// Shapes keep their full geometry; only overlapping shapes are split apart.
    #[default]
    Overlaid,
    /// Contested regions are cut so every point belongs to one shape.
    Flat,
}

/// Graph coloring strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Algorithm {
    /// Descending degree order, greedy coloring.
    LargestFirst,
    /// Reverse minimum-degree removal order, greedy coloring.
    SmallestLast,
    /// Repeated maximal independent set extraction.
    IndependentSet,
    /// Degree of saturation (recommended).
    #[default]
    Dsatur,
    /// Seeded random order, greedy coloring.
    RandomSequential,
    /// Breadth-first order per component, greedy coloring.
    ConnectedSequentialBfs,
    /// Depth-first order per component, greedy coloring.
    ConnectedSequentialDfs,
    /// Exactly `k` layers, recording conflicts if infeasible.
    ForceK,
}

impl Algorithm {
    /// All strategies in presentation order.
    pub const ALL: [Algorithm; 8] = [
        Algorithm::LargestFirst,
        Algorithm::SmallestLast,
        Algorithm::IndependentSet,
        Algorithm::Dsatur,
        Algorithm::RandomSequential,
        Algorithm::ConnectedSequentialBfs,
        Algorithm::ConnectedSequentialDfs,
        Algorithm::ForceK,
    ];

    /// Canonical option name.
    pub fn as_str(self) -> &'static str {
        match self {
            Algorithm::LargestFirst => "largest_first",
            Algorithm::SmallestLast => "smallest_last",
            Algorithm::IndependentSet => "independent_set",
            Algorithm::Dsatur => "DSATUR",
            Algorithm::RandomSequential => "random_sequential",
            Algorithm::ConnectedSequentialBfs => "connected_sequential_bfs",
            Algorithm::ConnectedSequentialDfs => "connected_sequential_dfs",
            Algorithm::ForceK => "force_k",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let found = match s.trim() {
            "largest_first" => Algorithm::LargestFirst,
            "smallest_last" => Algorithm::SmallestLast,
            "independent_set" => Algorithm::IndependentSet,
            "DSATUR" | "dsatur" | "saturation_largest_first" => Algorithm::Dsatur,
            "random_sequential" => Algorithm::RandomSequential,
            "connected_sequential_bfs" | "connected_sequential" => {
                Algorithm::ConnectedSequentialBfs
            }
            "connected_sequential_dfs" => Algorithm::ConnectedSequentialDfs,
            "force_k" => Algorithm::ForceK,
            other => {
                return Err(Error::UnknownAlgorithm {
                    name: other.to_string(),
                    available: Algorithm::ALL
                        .iter()
                        .map(|a| a.as_str())
                        .collect::<Vec<_>>()
                        .join(", "),
                })
            }
        };
        Ok(found)
    }
}

/// Which contacts count as conflicts in Flat mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TouchPolicy {
    /// Any contact (corner, edge or overlap) conflicts.
    #[default]
    Strict,
    /// Corner-only contact is allowed on the same layer.
    CornerAllowed,
}

/// Which shape keeps a contested region during Flat decomposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum PriorityOrder {
    /// The higher-stacked shape (later in paint order) wins.
    #[default]
    Source,
    /// The larger shape wins.
    LargestFirst,
    /// The smaller shape wins.
    SmallestFirst,
}

macro_rules! named_option {
    ($ty:ty, $kind:literal, { $($name:literal $(| $alias:literal)* => $variant:expr),+ $(,)? }) => {
        impl FromStr for $ty {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                match s.trim() {
                    $($name $(| $alias)* => Ok($variant),)+
                    other => Err(Error::UnknownOption {
                        kind: $kind,
                        name: other.to_string(),
                    }),
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                $(if *self == $variant {
                    return f.write_str($name);
                })+
                Ok(())
            }
        }
    };
}

named_option!(Mode, "mode", {
    "overlaid" => Mode::Overlaid,
    "flat" => Mode::Flat,
});

named_option!(TouchPolicy, "touch_policy", {
    "strict" | "any_touch" => TouchPolicy::Strict,
    "corner_allowed" | "edge_or_overlap" => TouchPolicy::CornerAllowed,
});

named_option!(PriorityOrder, "priority_order", {
    "source" => PriorityOrder::Source,
    "largest_first" => PriorityOrder::LargestFirst,
    "smallest_first" => PriorityOrder::SmallestFirst,
});

/// Configuration for a separation run.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Config {
    /// Overlaid or Flat pipeline.
    pub mode: Mode,

    /// Coloring strategy.
    pub algorithm: Algorithm,

    /// Contact criterion for Flat mode.
    pub touch_policy: TouchPolicy,

    /// Ownership rule for contested regions in Flat mode.
    pub priority_order: PriorityOrder,

    /// Subtract higher-stacked geometry from every output fragment.
    pub clip_visible_boundaries: bool,

    /// Exact layer count for [`Algorithm::ForceK`].
    pub force_k_target: Option<usize>,

    /// Simplify shape rings before indexing.
    pub performance_mode: bool,

    /// Ramer-Douglas-Peucker tolerance used in performance mode.
    pub simplify_tolerance: f64,

    /// Seed for [`Algorithm::RandomSequential`].
    pub random_seed: u64,

    /// Overlaps smaller than this fraction of the smaller shape's area are touches.
    pub overlap_epsilon: f64,

    /// Fragments below this area are reported as tiny.
    pub tiny_fragment_area: f64,

    /// Step ceiling for iterative strategies before falling back to DSATUR.
    pub max_strategy_steps: usize,

    /// Run the layer-reduction pass after coloring (not for `force_k`).
    pub optimize_layers: bool,

    /// Move the largest shape onto its own layer (Overlaid mode only).
    pub separate_background: bool,

    /// Number of worker threads for relation classification (0 = auto).
    pub threads: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            algorithm: Algorithm::default(),
            touch_policy: TouchPolicy::default(),
            priority_order: PriorityOrder::default(),
            clip_visible_boundaries: false,
            force_k_target: None,
            performance_mode: false,
            simplify_tolerance: 0.25,
            random_seed: 0,
            overlap_epsilon: 1e-9,
            tiny_fragment_area: 1.0,
            max_strategy_steps: 2_000_000,
            optimize_layers: false,
            separate_background: false,
            threads: 0,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the processing mode.
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the coloring strategy.
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Selects `force_k` with the given target layer count.
    pub fn with_force_k(mut self, k: usize) -> Self {
        self.algorithm = Algorithm::ForceK;
        self.force_k_target = Some(k);
        self
    }

    /// Sets the Flat-mode touch policy.
    pub fn with_touch_policy(mut self, policy: TouchPolicy) -> Self {
        self.touch_policy = policy;
        self
    }

    /// Sets the Flat-mode overlap priority.
    pub fn with_priority_order(mut self, order: PriorityOrder) -> Self {
        self.priority_order = order;
        self
    }

    /// Enables or disables visible-boundary clipping.
    pub fn with_clip_visible_boundaries(mut self, enabled: bool) -> Self {
        self.clip_visible_boundaries = enabled;
        self
    }

    /// Enables performance mode with the given simplification tolerance.
    pub fn with_performance_mode(mut self, tolerance: f64) -> Self {
        self.performance_mode = true;
        self.simplify_tolerance = tolerance;
        self
    }

    /// Sets the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }

    /// Sets the relative overlap noise threshold.
    pub fn with_overlap_epsilon(mut self, epsilon: f64) -> Self {
        self.overlap_epsilon = epsilon;
        self
    }

    /// Sets the tiny fragment area threshold.
    pub fn with_tiny_fragment_area(mut self, area: f64) -> Self {
        self.tiny_fragment_area = area;
        self
    }

    /// Sets the step ceiling for iterative strategies.
    pub fn with_max_strategy_steps(mut self, steps: usize) -> Self {
        self.max_strategy_steps = steps;
        self
    }

    /// Enables the layer-reduction pass.
    pub fn with_optimize_layers(mut self, enabled: bool) -> Self {
        self.optimize_layers = enabled;
        self
    }

    /// Enables background separation.
    pub fn with_separate_background(mut self, enabled: bool) -> Self {
        self.separate_background = enabled;
        self
    }

    /// Sets the worker thread count.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Checks the configuration for inconsistencies.
    pub fn validate(&self) -> Result<()> {
        if self.algorithm == Algorithm::ForceK {
            match self.force_k_target {
                Some(k) if k >= 1 => {}
                Some(k) => {
                    return Err(Error::InvalidConfig(format!(
                        "force_k target must be at least 1, got {}",
                        k
                    )))
                }
                None => {
                    return Err(Error::InvalidConfig(
                        "force_k requires a target layer count".into(),
                    ))
                }
            }
        }

        if !(self.overlap_epsilon.is_finite() && self.overlap_epsilon >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "overlap_epsilon must be a non-negative number, got {}",
                self.overlap_epsilon
            )));
        }

        if !(self.tiny_fragment_area.is_finite() && self.tiny_fragment_area >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "tiny_fragment_area must be a non-negative number, got {}",
                self.tiny_fragment_area
            )));
        }

        if self.performance_mode
            && !(self.simplify_tolerance.is_finite() && self.simplify_tolerance >= 0.0)
        {
            return Err(Error::InvalidConfig(format!(
                "simplify_tolerance must be a non-negative number, got {}",
                self.simplify_tolerance
            )));
        }

        if self.max_strategy_steps == 0 {
            return Err(Error::InvalidConfig(
                "max_strategy_steps must be positive".into(),
            ));
        }

        Ok(())
    }
}

/// Progress callback for long-running operations.
pub type ProgressCallback = Box<dyn Fn(ProgressInfo) + Send + Sync>;

/// Progress information during a separation run.
#[derive(Debug, Clone, Default)]
pub struct ProgressInfo {
    /// Current pipeline stage.
    pub phase: String,
    /// Units of work completed in this stage.
    pub completed: usize,
    /// Total units of work in this stage (0 if unknown).
    pub total: usize,
    /// Elapsed time in milliseconds since the run started.
    pub elapsed_ms: u64,
    /// Whether the run is still going.
    pub running: bool,
}

impl ProgressInfo {
    /// Creates a new progress info for the given stage.
    pub fn new(phase: impl Into<String>) -> Self {
        Self {
            phase: phase.into(),
            running: true,
            ..Default::default()
        }
    }

    /// Sets the work counters.
    pub fn with_units(mut self, completed: usize, total: usize) -> Self {
        self.completed = completed;
        self.total = total;
        self
    }

    /// Sets the elapsed time.
    pub fn with_elapsed(mut self, elapsed_ms: u64) -> Self {
        self.elapsed_ms = elapsed_ms;
        self
    }

    /// Marks the run as finished.
    pub fn finished(mut self) -> Self {
        self.running = false;
        self
    }

    /// Fraction of the current stage completed (0.0 to 1.0).
    pub fn progress_percent(&self) -> f64 {
        if self.total > 0 {
            self.completed as f64 / self.total as f64
        } else {
            0.0
        }
    }
}

/// Trait for layer separators.
pub trait Separator {
    /// Input shape type.
    type Shape;
    /// Output fragment type.
    type Fragment;

    /// Runs the full pipeline over the given shapes.
    fn separate(&self, shapes: &[Self::Shape]) -> Result<SeparationResult<Self::Fragment>>;

    /// Runs the pipeline, reporting progress between stages.
    fn separate_with_progress(
        &self,
        shapes: &[Self::Shape],
        callback: ProgressCallback,
    ) -> Result<SeparationResult<Self::Fragment>>;

    /// Requests cooperative cancellation of an ongoing run.
    fn cancel(&self);
}
