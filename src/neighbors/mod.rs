//! Exact k-nearest-neighbor index
//!
//! Brute-force Euclidean search parallelized over query rows with rayon.
//! Candidates are ranked by `(distance, row index)`, so ties always resolve
//! to the earlier row and results are identical run to run.

use crate::error::{AtlasError, Result};
use crate::utils::distance::squared_euclidean;
use crate::utils::DenseRows;
use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A candidate neighbor in the bounded max-heap
#[derive(Debug, Clone, Copy)]
struct Candidate {
    index: usize,
    sq_distance: f64,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap on (distance, index): the top is the worst kept candidate
        self.sq_distance
            .total_cmp(&other.sq_distance)
            .then(self.index.cmp(&other.index))
    }
}

/// k nearest other rows for every row of the indexed matrix
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeighborGraph {
    /// `indices[i]` lists row ids nearest-first, never containing `i`
    pub indices: Vec<Vec<usize>>,
    /// Euclidean distances aligned with `indices`
    pub distances: Vec<Vec<f64>>,
}

impl NeighborGraph {
    pub fn n_rows(&self) -> usize {
        self.indices.len()
    }

    pub fn k(&self) -> usize {
        self.indices.first().map_or(0, Vec::len)
    }

    /// The first `k` neighbors of every row. Lists are ranked by
    /// `(distance, index)`, so this equals a direct `k`-query.
    pub fn truncated(&self, k: usize) -> NeighborGraph {
        NeighborGraph {
            indices: take_prefix(&self.indices, k),
            distances: take_prefix(&self.distances, k),
        }
    }
}

fn take_prefix<T: Clone>(lists: &[Vec<T>], k: usize) -> Vec<Vec<T>> {
    lists.iter().map(|l| l[..k.min(l.len())].to_vec()).collect()
}

/// Build-once, query-once exact Euclidean index
#[derive(Debug, Clone)]
pub struct NeighborIndex {
    rows: DenseRows,
}

impl NeighborIndex {
    /// Index the rows of `x`.
    pub fn build(x: &Array2<f64>) -> Self {
        Self {
            rows: DenseRows::from_array(x),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.n_rows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The `k` indexed rows closest to `point`, skipping `exclude`.
    pub fn query(&self, point: &[f64], k: usize, exclude: Option<usize>) -> Vec<(usize, f64)> {
        let mut heap: BinaryHeap<Candidate> = BinaryHeap::with_capacity(k + 1);

        for j in 0..self.len() {
            if Some(j) == exclude {
                continue;
            }
            let candidate = Candidate {
                index: j,
                sq_distance: squared_euclidean(point, self.rows.row(j)),
            };

            if heap.len() < k {
                heap.push(candidate);
            } else if let Some(top) = heap.peek() {
                if candidate < *top {
                    heap.pop();
                    heap.push(candidate);
                }
            }
        }

        heap.into_sorted_vec()
            .into_iter()
            .map(|c| (c.index, c.sq_distance.sqrt()))
            .collect()
    }

    /// For every indexed row, its `k` nearest other rows.
    pub fn kneighbors(&self, k: usize) -> Result<NeighborGraph> {
        if k == 0 {
            return Err(AtlasError::InvalidParameter {
                name: "k".to_string(),
                value: k.to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        let n_rows = self.len();
        if n_rows < k + 1 {
            return Err(AtlasError::InsufficientData {
                what: "rows for the neighbor lists".to_string(),
                required: k + 1,
                actual: n_rows,
            });
        }

        let results: Vec<Vec<(usize, f64)>> = (0..n_rows)
            .into_par_iter()
            .map(|i| self.query(self.rows.row(i), k, Some(i)))
            .collect();

        let mut indices = Vec::with_capacity(n_rows);
        let mut distances = Vec::with_capacity(n_rows);
        for row in results {
            let (idx, dist): (Vec<usize>, Vec<f64>) = row.into_iter().unzip();
            indices.push(idx);
            distances.push(dist);
        }

        Ok(NeighborGraph { indices, distances })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_kneighbors_excludes_self_and_sorts() {
        let x = array![[0.0], [1.0], [3.0], [6.0], [10.0], [15.0], [21.0]];
        let graph = NeighborIndex::build(&x).kneighbors(5).unwrap();

        assert_eq!(graph.n_rows(), 7);
        for (i, (idx, dist)) in graph.indices.iter().zip(&graph.distances).enumerate() {
            assert_eq!(idx.len(), 5);
            assert!(!idx.contains(&i));
            assert!(dist.windows(2).all(|w| w[0] <= w[1]));
        }
        assert_eq!(graph.indices[0], vec![1, 2, 3, 4, 5]);
        assert_eq!(graph.indices[3], vec![2, 4, 1, 0, 5]);
    }

    #[test]
    fn test_ties_break_by_row_order() {
        // Rows 1..=6 are all at distance 1 from row 0
        let x = array![
            [0.0, 0.0],
            [1.0, 0.0],
            [0.0, 1.0],
            [-1.0, 0.0],
            [0.0, -1.0],
            [1.0, 0.0],
            [0.0, 1.0],
        ];
        let graph = NeighborIndex::build(&x).kneighbors(5).unwrap();
        assert_eq!(graph.indices[0], vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_duplicates_are_neighbors_at_zero() {
        let x = array![[1.0], [1.0], [1.0], [2.0], [3.0], [4.0]];
        let graph = NeighborIndex::build(&x).kneighbors(5).unwrap();
        assert_eq!(graph.indices[1][..2], [0, 2]);
        assert_eq!(graph.distances[1][0], 0.0);
    }

    #[test]
    fn test_truncated_equals_smaller_query() {
        // Plenty of exact ties so the cut lands inside tied runs
        let x = Array2::from_shape_fn((25, 2), |(i, j)| ((i * 3 + j) % 4) as f64);
        let index = NeighborIndex::build(&x);
        let wide = index.kneighbors(12).unwrap();
        let narrow = index.kneighbors(5).unwrap();

        let cut = wide.truncated(5);
        assert_eq!(cut.indices, narrow.indices);
        assert_eq!(cut.distances, narrow.distances);
        assert_eq!(wide.truncated(40).k(), 12);
    }

    #[test]
    fn test_too_few_rows() {
        let x = array![[0.0], [1.0], [2.0]];
        let err = NeighborIndex::build(&x).kneighbors(5).unwrap_err();
        assert!(matches!(err, AtlasError::InsufficientData { required: 6, actual: 3, .. }));
    }

    #[test]
    fn test_query_point() {
        let x = array![[0.0, 0.0], [5.0, 5.0], [1.0, 1.0]];
        let index = NeighborIndex::build(&x);
        let hits = index.query(&[0.9, 0.9], 2, None);
        assert_eq!(hits[0].0, 2);
        assert_eq!(hits[1].0, 0);
    }
}
