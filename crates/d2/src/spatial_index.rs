//! Spatial indexing for 2D contact detection using R*-tree.
//!
//! This module provides the broad phase of relation detection: an R*-tree over
//! shape bounding boxes quickly identifies the pairs that may touch, so that
//! exact classification only runs on those.

use crate::shape::Shape;
use rstar::{RTree, RTreeObject, AABB};

/// An entry in the 2D spatial index representing one shape.
#[derive(Debug, Clone)]
pub struct SpatialEntry2D {
    /// Index of the shape in the input list
    pub index: usize,
    /// Axis-aligned bounding box (min_x, min_y, max_x, max_y)
    pub aabb: [f64; 4],
}

impl SpatialEntry2D {
    /// Creates a new spatial entry.
    pub fn new(index: usize, aabb: [f64; 4]) -> Self {
        Self { index, aabb }
    }

    /// Creates a spatial entry from a shape's bounding box.
    pub fn from_shape(index: usize, shape: &Shape) -> Self {
        let (min, max) = shape.aabb();
        Self {
            index,
            aabb: [min[0], min[1], max[0], max[1]],
        }
    }
}

impl RTreeObject for SpatialEntry2D {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners([self.aabb[0], self.aabb[1]], [self.aabb[2], self.aabb[3]])
    }
}

/// 2D spatial index using R*-tree for contact queries.
#[derive(Debug)]
pub struct SpatialIndex2D {
    tree: RTree<SpatialEntry2D>,
}

impl SpatialIndex2D {
    /// Creates a new empty spatial index.
    pub fn new() -> Self {
        Self { tree: RTree::new() }
    }

    /// Creates a spatial index with the given entries.
    pub fn with_entries(entries: Vec<SpatialEntry2D>) -> Self {
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Bulk-loads an index from per-shape bounding boxes.
    ///
    /// Shapes without a box (excluded geometry) are left out, so they never
    /// show up in candidate pairs or clipping queries.
    pub fn from_aabbs(aabbs: &[Option<[f64; 4]>]) -> Self {
        let entries = aabbs
            .iter()
            .enumerate()
            .filter_map(|(index, aabb)| aabb.map(|aabb| SpatialEntry2D::new(index, aabb)))
            .collect();
        Self::with_entries(entries)
    }

    /// Inserts a new entry into the spatial index.
    pub fn insert(&mut self, entry: SpatialEntry2D) {
        self.tree.insert(entry);
    }

    /// Returns the number of entries in the index.
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Returns true if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Finds all entries whose bounding boxes intersect with the given AABB.
    ///
    /// Boxes that only share a side or a corner count as intersecting.
    pub fn query_aabb(&self, min: [f64; 2], max: [f64; 2]) -> Vec<&SpatialEntry2D> {
        let envelope = AABB::from_corners(min, max);
        self.tree
            .locate_in_envelope_intersecting(&envelope)
            .collect()
    }

    /// Indices of entries whose boxes intersect the given box, ascending.
    pub fn query_indices(&self, aabb: [f64; 4]) -> Vec<usize> {
        let mut indices: Vec<usize> = self
            .query_aabb([aabb[0], aabb[1]], [aabb[2], aabb[3]])
            .into_iter()
            .map(|entry| entry.index)
            .collect();
        indices.sort_unstable();
        indices
    }

    /// Returns an iterator over all entries in the index.
    pub fn iter(&self) -> impl Iterator<Item = &SpatialEntry2D> {
        self.tree.iter()
    }

    /// All unordered pairs `(i, j)` with `i < j` whose boxes intersect.
    ///
    /// Sorted ascending, so downstream work sees the same order every run.
    pub fn candidate_pairs(&self) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for entry in self.tree.iter() {
            let envelope = entry.envelope();
            for other in self.tree.locate_in_envelope_intersecting(&envelope) {
                if other.index > entry.index {
                    pairs.push((entry.index, other.index));
                }
            }
        }
        pairs.sort_unstable();
        pairs.dedup();
        pairs
    }
}

impl Default for SpatialIndex2D {
    fn default() -> Self {
        Self::new()
    }
}
