//! Layer assignment by graph coloring.
//!
//! Every strategy is a deterministic function of the conflict graph (plus the
//! seed for [`Algorithm::RandomSequential`]). All strategies are dispatched
//! through [`color_graph`], which also computes the clique lower bound.
//!
//! ## Strategies
//!
//! | Strategy | Speed | Quality | Notes |
//! |----------|-------|---------|-------|
//! | `largest_first` | Fast | Basic | Descending degree order |
//! | `smallest_last` | Fast | Good | Degeneracy order |
//! | `independent_set` | Slow | High | Step-bounded, falls back to DSATUR |
//! | `DSATUR` | Medium | Good | Default, fallback target |
//! | `random_sequential` | Fastest | Low | Seeded |
//! | `connected_sequential_bfs` / `_dfs` | Fast | Basic | Traversal order |
//! | `force_k` | Medium | n/a | Exactly k layers, conflicts recorded |

use crate::error::{Error, Result};
use crate::graph::ConflictGraph;
use crate::solver::{Algorithm, Config};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, VecDeque};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

const UNCOLORED: usize = usize::MAX;

/// Mapping from node (shape index) to layer index.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LayerAssignment {
    layers: Vec<usize>,
    layer_count: usize,
}

impl LayerAssignment {
    /// Creates an assignment; the layer count is `max + 1`.
    pub fn new(layers: Vec<usize>) -> Self {
        let layer_count = layers.iter().max().map_or(0, |&m| m + 1);
        Self {
            layers,
            layer_count,
        }
    }

    /// Creates an assignment with a fixed layer count (some layers may be empty).
    pub fn with_layer_count(layers: Vec<usize>, layer_count: usize) -> Self {
        let needed = layers.iter().max().map_or(0, |&m| m + 1);
        Self {
            layers,
            layer_count: layer_count.max(needed),
        }
    }

    /// Layer of a node.
    pub fn layer_of(&self, node: usize) -> usize {
        self.layers[node]
    }

    /// Number of layers (indices `0..layer_count`).
    pub fn layer_count(&self) -> usize {
        self.layer_count
    }

    /// Number of assigned nodes.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Returns true if no node is assigned.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Layer per node.
    pub fn as_slice(&self) -> &[usize] {
        &self.layers
    }

    /// Nodes on the given layer, ascending.
    pub fn members(&self, layer: usize) -> Vec<usize> {
        self.layers
            .iter()
            .enumerate()
            .filter(|&(_, &l)| l == layer)
            .map(|(node, _)| node)
            .collect()
    }

    /// Nodes grouped by layer; one (possibly empty) group per layer.
    pub fn groups(&self) -> Vec<Vec<usize>> {
        let mut groups = vec![Vec::new(); self.layer_count];
        for (node, &layer) in self.layers.iter().enumerate() {
            groups[layer].push(node);
        }
        groups
    }

    /// Number of layers with at least one node.
    pub fn used_layer_count(&self) -> usize {
        self.layers.iter().collect::<BTreeSet<_>>().len()
    }

    /// Graph edges whose endpoints share a layer, ascending.
    pub fn same_layer_edges(&self, graph: &ConflictGraph) -> Vec<(usize, usize)> {
        graph
            .edges()
            .filter(|&(a, b, _)| self.layers[a] == self.layers[b])
            .map(|(a, b, _)| (a, b))
            .collect()
    }

    /// Returns true if no edge joins two nodes on the same layer.
    pub fn is_proper(&self, graph: &ConflictGraph) -> bool {
        graph
            .edges()
            .all(|(a, b, _)| self.layers[a] != self.layers[b])
    }

    /// Renumbers layers so that only used layers remain, keeping their order.
    pub fn compact(&mut self) {
        let used: Vec<usize> = self
            .layers
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        for layer in self.layers.iter_mut() {
            // `used` holds every value present in `layers`
            *layer = used.binary_search(layer).unwrap_or(0);
        }
        self.layer_count = used.len();
    }

    /// Moves a node onto a new layer of its own, then compacts.
    pub fn move_to_new_layer(&mut self, node: usize) {
        if node >= self.layers.len() {
            return;
        }
        self.layers[node] = self.layer_count;
        self.layer_count += 1;
        self.compact();
    }
}

/// Why two shapes ended up conflicting in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ConflictReason {
    /// `force_k` could not keep the pair on different layers.
    SharedLayer,
    /// Flat decomposition could not cut the pair apart.
    UnresolvedOverlap,
}

/// A pair of shapes left in conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConflictPair {
    /// Lower shape index.
    pub a: usize,
    /// Higher shape index.
    pub b: usize,
    /// Source of the conflict.
    pub reason: ConflictReason,
}

impl ConflictPair {
    /// Creates a conflict pair with `a < b`.
    pub fn new(a: usize, b: usize, reason: ConflictReason) -> Self {
        Self {
            a: a.min(b),
            b: a.max(b),
            reason,
        }
    }
}

/// Parameters for [`color_graph`].
#[derive(Debug, Clone)]
pub struct ColoringParams {
    /// Strategy to run.
    pub algorithm: Algorithm,
    /// Target layer count for `force_k`.
    pub force_k_target: Option<usize>,
    /// Seed for `random_sequential`.
    pub seed: u64,
    /// Step ceiling for `independent_set`.
    pub max_steps: usize,
    /// Run the layer-reduction pass afterwards.
    pub optimize: bool,
}

impl Default for ColoringParams {
    fn default() -> Self {
        Self::new(Algorithm::default())
    }
}

impl ColoringParams {
    /// Parameters for a strategy with default knobs.
    pub fn new(algorithm: Algorithm) -> Self {
        Self {
            algorithm,
            force_k_target: None,
            seed: 0,
            max_steps: 2_000_000,
            optimize: false,
        }
    }

    /// Parameters for `force_k` with target `k`.
    pub fn force_k(k: usize) -> Self {
        Self {
            force_k_target: Some(k),
            ..Self::new(Algorithm::ForceK)
        }
    }

    /// Extracts the coloring parameters from a run configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            algorithm: config.algorithm,
            force_k_target: config.force_k_target,
            seed: config.random_seed,
            max_steps: config.max_strategy_steps,
            optimize: config.optimize_layers,
        }
    }

    /// Sets the seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the step ceiling.
    pub fn with_max_steps(mut self, steps: usize) -> Self {
        self.max_steps = steps;
        self
    }

    /// Enables the layer-reduction pass.
    pub fn with_optimize(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }
}

/// Result of [`color_graph`].
#[derive(Debug, Clone)]
pub struct ColoringOutcome {
    /// Layer per node.
    pub assignment: LayerAssignment,
    /// Size of the greedy clique found in the graph.
    pub lower_bound: usize,
    /// Same-layer edges (only ever non-empty for `force_k`).
    pub conflicts: Vec<ConflictPair>,
    /// Strategy that actually produced the assignment.
    pub algorithm_used: Algorithm,
    /// True if the requested strategy exceeded its budget and DSATUR was used.
    pub fell_back: bool,
}

impl ColoringOutcome {
    /// Returns true if a `force_k` target is below the clique lower bound.
    pub fn is_infeasible(&self) -> bool {
        !self.conflicts.is_empty() && self.assignment.layer_count() < self.lower_bound
    }
}

/// The independent-set strategy ran out of steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepBudgetExceeded {
    /// Steps taken before giving up.
    pub steps: usize,
}

/// Colors a graph with the requested strategy.
///
/// Fails only on a configuration problem (`force_k` without a positive
/// target). Budget overruns fall back to DSATUR and are flagged in the
/// outcome.
pub fn color_graph(graph: &ConflictGraph, params: &ColoringParams) -> Result<ColoringOutcome> {
    let lower_bound = clique_lower_bound(graph);
    let mut fell_back = false;
    let mut algorithm_used = params.algorithm;

    let assignment = match params.algorithm {
        Algorithm::ForceK => {
            let k = match params.force_k_target {
                Some(k) if k >= 1 => k,
                _ => {
                    return Err(Error::InvalidConfig(
                        "force_k requires a target layer count of at least 1".into(),
                    ))
                }
            };
            let (assignment, conflicts) = force_k(graph, k);
            if k < lower_bound {
                log::warn!(
                    "force_k target {} is below the clique lower bound {}; {} conflicts recorded",
                    k,
                    lower_bound,
                    conflicts.len()
                );
            }
            return Ok(ColoringOutcome {
                assignment,
                lower_bound,
                conflicts,
                algorithm_used,
                fell_back,
            });
        }
        Algorithm::LargestFirst => greedy_color(graph, &largest_first_order(graph)),
        Algorithm::SmallestLast => greedy_color(graph, &smallest_last_order(graph)),
        Algorithm::Dsatur => dsatur(graph),
        Algorithm::RandomSequential => greedy_color(graph, &random_order(graph, params.seed)),
        Algorithm::ConnectedSequentialBfs => greedy_color(graph, &bfs_order(graph)),
        Algorithm::ConnectedSequentialDfs => greedy_color(graph, &dfs_order(graph)),
        Algorithm::IndependentSet => match independent_set(graph, params.max_steps) {
            Ok(assignment) => assignment,
            Err(exceeded) => {
                log::warn!(
                    "independent_set exceeded its step budget after {} steps; falling back to DSATUR",
                    exceeded.steps
                );
                fell_back = true;
                algorithm_used = Algorithm::Dsatur;
                dsatur(graph)
            }
        },
    };

    let assignment = if params.optimize {
        reduce_layers(graph, &assignment)
    } else {
        assignment
    };

    log::debug!(
        "{} colored {} nodes with {} layers (lower bound {})",
        algorithm_used,
        graph.node_count(),
        assignment.layer_count(),
        lower_bound
    );

    Ok(ColoringOutcome {
        assignment,
        lower_bound,
        conflicts: Vec::new(),
        algorithm_used,
        fell_back,
    })
}

// ============================================================================
// Greedy rule and node orders
// ============================================================================

/// Colors nodes in the given order, each with the smallest layer unused by
/// already-colored neighbors.
pub fn greedy_color(graph: &ConflictGraph, order: &[usize]) -> LayerAssignment {
    let n = graph.node_count();
    let mut colors = vec![UNCOLORED; n];
    let mut taken: Vec<bool> = Vec::new();

    for &node in order {
        if colors[node] != UNCOLORED {
            continue;
        }
        let degree = graph.degree(node);
        taken.clear();
        taken.resize(degree + 1, false);
        for &nb in graph.neighbors(node) {
            let c = colors[nb];
            if c != UNCOLORED && c <= degree {
                taken[c] = true;
            }
        }
        colors[node] = taken.iter().position(|&t| !t).unwrap_or(degree);
    }

    // nodes missing from `order` still need a layer
    for node in 0..n {
        if colors[node] == UNCOLORED {
            colors[node] = smallest_free_color(graph, &colors, node);
        }
    }

    LayerAssignment::new(colors)
}

fn smallest_free_color(graph: &ConflictGraph, colors: &[usize], node: usize) -> usize {
    let used: BTreeSet<usize> = graph
        .neighbors(node)
        .iter()
        .map(|&nb| colors[nb])
        .filter(|&c| c != UNCOLORED)
        .collect();
    (0..).find(|c| !used.contains(c)).unwrap_or(0)
}

/// Nodes by descending degree, ties by ascending index.
pub fn largest_first_order(graph: &ConflictGraph) -> Vec<usize> {
    let mut order: Vec<usize> = (0..graph.node_count()).collect();
    order.sort_by(|&a, &b| graph.degree(b).cmp(&graph.degree(a)).then(a.cmp(&b)));
    order
}

/// Reverse of the order in which minimum-degree nodes are removed.
pub fn smallest_last_order(graph: &ConflictGraph) -> Vec<usize> {
    let n = graph.node_count();
    let mut degree: Vec<usize> = (0..n).map(|v| graph.degree(v)).collect();
    let mut queue: BTreeSet<(usize, usize)> = (0..n).map(|v| (degree[v], v)).collect();
    let mut removed = vec![false; n];
    let mut removal = Vec::with_capacity(n);

    while let Some((_, v)) = queue.pop_first() {
        removed[v] = true;
        removal.push(v);
        for &nb in graph.neighbors(v) {
            if removed[nb] {
                continue;
            }
            queue.remove(&(degree[nb], nb));
            degree[nb] -= 1;
            queue.insert((degree[nb], nb));
        }
    }

    removal.reverse();
    removal
}

/// Seeded random permutation of the nodes.
pub fn random_order(graph: &ConflictGraph, seed: u64) -> Vec<usize> {
    let mut order: Vec<usize> = (0..graph.node_count()).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    order.shuffle(&mut rng);
    order
}

/// Breadth-first order per connected component, components by lowest node.
pub fn bfs_order(graph: &ConflictGraph) -> Vec<usize> {
    let n = graph.node_count();
    let mut visited = vec![false; n];
    let mut order = Vec::with_capacity(n);
    let mut queue = VecDeque::new();

    for start in 0..n {
        if visited[start] {
            continue;
        }
        visited[start] = true;
        queue.push_back(start);
        while let Some(v) = queue.pop_front() {
            order.push(v);
            for &nb in graph.neighbors(v) {
                if !visited[nb] {
                    visited[nb] = true;
                    queue.push_back(nb);
                }
            }
        }
    }

    order
}

/// Depth-first preorder per connected component, using an explicit stack.
pub fn dfs_order(graph: &ConflictGraph) -> Vec<usize> {
    let n = graph.node_count();
    let mut visited = vec![false; n];
    let mut order = Vec::with_capacity(n);
    let mut stack = Vec::new();

    for start in 0..n {
        if visited[start] {
            continue;
        }
        stack.push(start);
        while let Some(v) = stack.pop() {
            if visited[v] {
                continue;
            }
            visited[v] = true;
            order.push(v);
            // reversed so the lowest neighbor is visited first
            for &nb in graph.neighbors(v).iter().rev() {
                if !visited[nb] {
                    stack.push(nb);
                }
            }
        }
    }

    order
}

// ============================================================================
// DSATUR and force-k
// ============================================================================

/// DSATUR: always color the node with the most distinctly colored neighbors,
/// ties by degree, then by lowest index.
pub fn dsatur(graph: &ConflictGraph) -> LayerAssignment {
    LayerAssignment::new(saturation_coloring(graph, None))
}

/// Colors the graph with exactly `k` layers.
///
/// Runs DSATUR capped at `k` colors. When a node has no legal layer, it takes
/// the layer with the fewest already-colored neighbors, then the smallest
/// summed overlap weight to them, then the lowest index. Every same-layer
/// edge of the final assignment is returned as a [`ConflictPair`].
pub fn force_k(graph: &ConflictGraph, k: usize) -> (LayerAssignment, Vec<ConflictPair>) {
    let k = k.max(1);
    let colors = saturation_coloring(graph, Some(k));
    let assignment = LayerAssignment::with_layer_count(colors, k);
    let conflicts = assignment
        .same_layer_edges(graph)
        .into_iter()
        .map(|(a, b)| ConflictPair::new(a, b, ConflictReason::SharedLayer))
        .collect();
    (assignment, conflicts)
}

fn saturation_coloring(graph: &ConflictGraph, limit: Option<usize>) -> Vec<usize> {
    let n = graph.node_count();
    let mut colors = vec![UNCOLORED; n];
    let mut saturation: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n];
    let mut heap: BinaryHeap<(usize, usize, Reverse<usize>)> = (0..n)
        .map(|v| (0, graph.degree(v), Reverse(v)))
        .collect();

    while let Some((sat, _, Reverse(node))) = heap.pop() {
        if colors[node] != UNCOLORED || sat != saturation[node].len() {
            continue;
        }

        let free = (0..)
            .find(|c| !saturation[node].contains(c))
            .unwrap_or(0);
        let color = match limit {
            Some(k) if free >= k => least_conflicting_color(graph, &colors, node, k),
            _ => free,
        };
        colors[node] = color;

        for &nb in graph.neighbors(node) {
            if colors[nb] == UNCOLORED && saturation[nb].insert(color) {
                heap.push((saturation[nb].len(), graph.degree(nb), Reverse(nb)));
            }
        }
    }

    colors
}

fn least_conflicting_color(graph: &ConflictGraph, colors: &[usize], node: usize, k: usize) -> usize {
    let mut counts = vec![0usize; k];
    let mut weights = vec![0.0f64; k];
    for &nb in graph.neighbors(node) {
        let c = colors[nb];
        if c < k {
            counts[c] += 1;
            weights[c] += graph.weight(node, nb).unwrap_or(0.0);
        }
    }

    (0..k)
        .min_by(|&x, &y| {
            counts[x]
                .cmp(&counts[y])
                .then(weights[x].total_cmp(&weights[y]))
                .then(x.cmp(&y))
        })
        .unwrap_or(0)
}

// ============================================================================
// Independent set
// ============================================================================

/// Colors by repeatedly extracting a maximal independent set as one layer.
///
/// Each set is grown by taking the minimum-degree node of the remaining
/// candidate subgraph and discarding its neighbors. Every node visit and
/// degree update counts as a step; exceeding `max_steps` aborts with
/// [`StepBudgetExceeded`].
pub fn independent_set(
    graph: &ConflictGraph,
    max_steps: usize,
) -> std::result::Result<LayerAssignment, StepBudgetExceeded> {
    let n = graph.node_count();
    let mut colors = vec![UNCOLORED; n];
    let mut remaining = vec![true; n];
    let mut remaining_count = n;
    let mut steps = 0usize;
    let mut layer = 0usize;

    while remaining_count > 0 {
        let mut candidate = remaining.clone();
        let mut degree: Vec<usize> = vec![0; n];
        let mut queue = BTreeSet::new();
        for v in (0..n).filter(|&v| remaining[v]) {
            degree[v] = graph
                .neighbors(v)
                .iter()
                .filter(|&&nb| remaining[nb])
                .count();
            queue.insert((degree[v], v));
            steps += 1;
        }

        while let Some((_, v)) = queue.pop_first() {
            steps += 1;
            if steps > max_steps {
                return Err(StepBudgetExceeded { steps });
            }

            colors[v] = layer;
            remaining[v] = false;
            remaining_count -= 1;
            candidate[v] = false;

            // drop v's neighbors from the candidate subgraph
            for &nb in graph.neighbors(v) {
                if !candidate[nb] {
                    continue;
                }
                candidate[nb] = false;
                queue.remove(&(degree[nb], nb));
                for &nn in graph.neighbors(nb) {
                    if candidate[nn] {
                        steps += 1;
                        queue.remove(&(degree[nn], nn));
                        degree[nn] -= 1;
                        queue.insert((degree[nn], nn));
                    }
                }
            }
        }

        layer += 1;
    }

    Ok(LayerAssignment::new(colors))
}

// ============================================================================
// Lower bound and layer reduction
// ============================================================================

/// Greedy maximal clique: for each start node by descending degree, add
/// neighbors (by descending degree) adjacent to every member so far.
///
/// Starts whose degree cannot beat the best clique are skipped.
pub fn greedy_clique(graph: &ConflictGraph) -> Vec<usize> {
    let order = largest_first_order(graph);
    let mut best: Vec<usize> = order.first().map(|&v| vec![v]).unwrap_or_default();

    for &start in &order {
        if graph.degree(start) + 1 <= best.len() {
            break;
        }
        let mut candidates = graph.neighbors(start).to_vec();
        candidates.sort_by(|&a, &b| graph.degree(b).cmp(&graph.degree(a)).then(a.cmp(&b)));

        let mut clique = vec![start];
        for u in candidates {
            if clique.iter().all(|&c| graph.has_edge(c, u)) {
                clique.push(u);
            }
        }
        if clique.len() > best.len() {
            best = clique;
        }
    }

    best
}

/// Size of [`greedy_clique`]; a lower bound on the layers any proper
/// assignment needs.
pub fn clique_lower_bound(graph: &ConflictGraph) -> usize {
    greedy_clique(graph).len()
}

/// Tries to empty the highest layer by moving each member to the lowest
/// legal lower layer; repeats until a layer cannot be emptied.
pub fn reduce_layers(graph: &ConflictGraph, assignment: &LayerAssignment) -> LayerAssignment {
    let mut layers = assignment.as_slice().to_vec();
    let mut count = assignment.layer_count();

    while count > 1 {
        let top = count - 1;
        let mut trial = layers.clone();
        let mut emptied = true;

        for node in (0..trial.len()).filter(|&v| layers[v] == top) {
            let target = (0..top).find(|&c| {
                graph
                    .neighbors(node)
                    .iter()
                    .all(|&nb| trial[nb] != c)
            });
            match target {
                Some(c) => trial[node] = c,
                None => {
                    emptied = false;
                    break;
                }
            }
        }

        if !emptied {
            break;
        }
        layers = trial;
        count -= 1;
    }

    LayerAssignment::with_layer_count(layers, count)
}
