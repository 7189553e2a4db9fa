//! UMAP: Uniform Manifold Approximation and Projection
//!
//! Projects the normalized feature matrix into a few dimensions for the 3D map.
//! Implements the UMAP algorithm (McInnes et al., 2018) with:
//! - Exact KNN graph from the shared neighbor index
//! - Fuzzy simplicial set with binary-search sigma
//! - `a`/`b` curve parameters fitted to `min_dist` and `spread`
//! - SGD layout optimization with negative sampling
//!
//! The layout loop runs on one thread from a seeded ChaCha stream, so the
//! same matrix and config always give the same coordinates.

use crate::error::{AtlasError, Result};
use crate::neighbors::{NeighborGraph, NeighborIndex};
use crate::utils::distance::squared_euclidean;
use crate::utils::DenseRows;
use ndarray::Array2;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

const SMOOTH_K_TOLERANCE: f64 = 1e-5;
const MIN_K_DIST_SCALE: f64 = 1e-3;
const GRAD_CLIP: f64 = 4.0;

/// UMAP configuration parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UmapConfig {
    /// Number of nearest neighbors (controls local vs global structure)
    pub n_neighbors: usize,
    /// Minimum distance between points in the embedding
    pub min_dist: f64,
    /// Number of output dimensions
    pub n_components: usize,
    /// Optimization epochs; `None` picks 500 for small data, 200 above 10k rows
    pub n_epochs: Option<usize>,
    /// SGD learning rate
    pub learning_rate: f64,
    /// Number of negative samples per positive edge
    pub negative_sample_rate: usize,
    /// Spread of the embedding
    pub spread: f64,
    /// Random seed for reproducibility
    pub random_state: u64,
}

impl Default for UmapConfig {
    fn default() -> Self {
        Self {
            n_neighbors: 30,
            min_dist: 0.1,
            n_components: 3,
            n_epochs: None,
            learning_rate: 1.0,
            negative_sample_rate: 5,
            spread: 1.0,
            random_state: 42,
        }
    }
}

impl UmapConfig {
    pub fn validate(&self) -> Result<()> {
        let invalid = |name: &str, value: String, reason: &str| {
            Err(AtlasError::InvalidParameter {
                name: name.to_string(),
                value,
                reason: reason.to_string(),
            })
        };
        if self.n_neighbors < 1 {
            return invalid("n_neighbors", self.n_neighbors.to_string(), "must be at least 1");
        }
        if self.n_components == 0 {
            return invalid("n_components", "0".to_string(), "must be at least 1");
        }
        if !(self.min_dist >= 0.0) {
            return invalid("min_dist", self.min_dist.to_string(), "must be non-negative");
        }
        if !(self.spread > 0.0) {
            return invalid("spread", self.spread.to_string(), "must be positive");
        }
        if self.min_dist > self.spread {
            return invalid("min_dist", self.min_dist.to_string(), "must not exceed spread");
        }
        if !(self.learning_rate > 0.0) {
            return invalid("learning_rate", self.learning_rate.to_string(), "must be positive");
        }
        if self.n_epochs == Some(0) {
            return invalid("n_epochs", "0".to_string(), "must be at least 1");
        }
        Ok(())
    }

    fn epochs_for(&self, n_samples: usize) -> usize {
        self.n_epochs
            .unwrap_or(if n_samples <= 10_000 { 500 } else { 200 })
    }
}

/// A directed edge of the symmetrized fuzzy graph
#[derive(Debug, Clone, Copy)]
struct Edge {
    head: usize,
    tail: usize,
    weight: f64,
}

/// UMAP dimensionality reduction
pub struct Umap {
    config: UmapConfig,
}

impl Umap {
    /// Create a new UMAP instance
    pub fn new(config: UmapConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &UmapConfig {
        &self.config
    }

    /// Neighbors per point used for the fuzzy graph over `n_samples` rows.
    pub fn graph_size(&self, n_samples: usize) -> usize {
        self.config.n_neighbors.min(n_samples.saturating_sub(1))
    }

    /// Run UMAP on dense data. Returns `n_samples × n_components`.
    pub fn fit_transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.config.validate()?;
        let n = x.nrows();
        if n <= 1 {
            return self.trivial_layout(n);
        }

        let graph = NeighborIndex::build(x).kneighbors(self.graph_size(n))?;
        self.fit_graph(&graph)
    }

    /// Run UMAP from a precomputed exact neighbor graph with at least
    /// [`graph_size`](Self::graph_size) neighbors per row; longer lists are
    /// cut to that size.
    pub fn fit_graph(&self, graph: &NeighborGraph) -> Result<Array2<f64>> {
        self.config.validate()?;
        let n = graph.n_rows();
        if n <= 1 {
            return self.trivial_layout(n);
        }

        let k = self.graph_size(n);
        if graph.k() < k {
            return Err(AtlasError::InvalidParameter {
                name: "neighbor graph".to_string(),
                value: graph.k().to_string(),
                reason: format!("UMAP needs {k} neighbors per row"),
            });
        }
        let graph = graph.truncated(k);

        let n_epochs = self.config.epochs_for(n);
        let edges = self.fuzzy_simplicial_set(&graph, n_epochs);
        let (a, b) = find_ab_params(self.config.spread, self.config.min_dist)?;
        debug!(n, k, n_epochs, edges = edges.len(), a, b, "UMAP graph ready");

        let embedding = self.optimize_layout(n, &edges, n_epochs, a, b);

        if embedding.as_slice().iter().any(|v| !v.is_finite()) {
            return Err(AtlasError::ComputationError(
                "UMAP produced non-finite coordinates".to_string(),
            ));
        }
        Ok(embedding.into_array()?)
    }

    fn trivial_layout(&self, n: usize) -> Result<Array2<f64>> {
        if n == 0 {
            return Err(AtlasError::EmptyData("UMAP needs at least one row".to_string()));
        }
        Ok(Array2::zeros((1, self.config.n_components)))
    }

    /// Compute fuzzy simplicial set (edge weights).
    /// For each point, find rho (distance to the nearest distinct neighbor)
    /// and sigma (smooth normalization via binary search), then symmetrize.
    fn fuzzy_simplicial_set(&self, graph: &NeighborGraph, n_epochs: usize) -> Vec<Edge> {
        let n = graph.n_rows();
        let k = graph.k();
        let target = (k as f64).log2();
        let mean_all = {
            let total: f64 = graph.distances.iter().flatten().sum();
            total / (n * k).max(1) as f64
        };

        let params: Vec<(f64, f64)> = graph
            .distances
            .par_iter()
            .map(|dists| smooth_knn_dist(dists, target, mean_all))
            .collect();

        // Directed memberships; BTreeMap keeps the edge order stable
        let mut directed: BTreeMap<(usize, usize), f64> = BTreeMap::new();
        for i in 0..n {
            let (rho, sigma) = params[i];
            for (&j, &d) in graph.indices[i].iter().zip(graph.distances[i].iter()) {
                let w = if d - rho <= 0.0 {
                    1.0
                } else {
                    (-(d - rho) / sigma).exp()
                };
                directed.insert((i, j), w);
            }
        }

        // Probabilistic t-conorm: w(i,j) + w(j,i) - w(i,j) * w(j,i)
        let mut symmetric: BTreeMap<(usize, usize), f64> = BTreeMap::new();
        for (&(i, j), &w_ij) in &directed {
            let w_ji = directed.get(&(j, i)).copied().unwrap_or(0.0);
            let w = w_ij + w_ji - w_ij * w_ji;
            symmetric.insert((i, j), w);
            symmetric.insert((j, i), w);
        }

        let max_weight = symmetric.values().copied().fold(0.0_f64, f64::max);
        let floor = max_weight / n_epochs as f64;

        symmetric
            .into_iter()
            .filter(|&(_, w)| w > 0.0 && w >= floor)
            .map(|((head, tail), weight)| Edge { head, tail, weight })
            .collect()
    }

    /// SGD layout optimization with negative sampling.
    fn optimize_layout(
        &self,
        n_samples: usize,
        edges: &[Edge],
        n_epochs: usize,
        a: f64,
        b: f64,
    ) -> DenseRows {
        let dim = self.config.n_components;
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.random_state);

        // Initialize embedding with uniform random coordinates
        let mut embedding = DenseRows::zeros(n_samples, dim);
        for i in 0..n_samples {
            for v in embedding.row_mut(i) {
                *v = rng.gen_range(-10.0..10.0);
            }
        }

        let max_weight = edges.iter().map(|e| e.weight).fold(0.0_f64, f64::max);
        let epochs_per_sample: Vec<f64> = edges.iter().map(|e| max_weight / e.weight).collect();
        let neg_rate = self.config.negative_sample_rate as f64;
        let epochs_per_negative: Vec<f64> = if neg_rate > 0.0 {
            epochs_per_sample.iter().map(|e| e / neg_rate).collect()
        } else {
            vec![f64::INFINITY; edges.len()]
        };
        let mut next_sample = epochs_per_sample.clone();
        let mut next_negative = epochs_per_negative.clone();

        let mut current = vec![0.0f64; dim];
        let mut grad = vec![0.0f64; dim];

        for epoch in 0..n_epochs {
            let alpha = self.config.learning_rate * (1.0 - epoch as f64 / n_epochs as f64);
            let now = epoch as f64;

            for (e, edge) in edges.iter().enumerate() {
                if next_sample[e] > now {
                    continue;
                }
                let (i, j) = (edge.head, edge.tail);

                // Attractive force
                current.copy_from_slice(embedding.row(i));
                let dist_sq = squared_euclidean(&current, embedding.row(j));
                let coeff = if dist_sq > 0.0 {
                    -2.0 * a * b * dist_sq.powf(b - 1.0) / (a * dist_sq.powf(b) + 1.0)
                } else {
                    0.0
                };
                for (g, (c, o)) in grad.iter_mut().zip(current.iter().zip(embedding.row(j))) {
                    *g = clip(coeff * (c - o)) * alpha;
                }
                for (c, g) in current.iter_mut().zip(&grad) {
                    *c += g;
                }
                for (o, g) in embedding.row_mut(j).iter_mut().zip(&grad) {
                    *o -= g;
                }

                next_sample[e] += epochs_per_sample[e];

                // Negative sampling (repulsive forces)
                let n_neg = ((now - next_negative[e]) / epochs_per_negative[e]).max(0.0) as usize;
                for _ in 0..n_neg {
                    let other = rng.gen_range(0..n_samples);
                    if other == i {
                        continue;
                    }
                    let other_row = embedding.row(other);
                    let dist_sq = squared_euclidean(&current, other_row);
                    let coeff = if dist_sq > 0.0 {
                        2.0 * b / ((0.001 + dist_sq) * (a * dist_sq.powf(b) + 1.0))
                    } else {
                        0.0
                    };
                    for (c, o) in current.iter_mut().zip(other_row) {
                        let g = if coeff > 0.0 {
                            clip(coeff * (*c - o))
                        } else {
                            // Coincident points: push apart with the clip bound
                            GRAD_CLIP
                        };
                        *c += g * alpha;
                    }
                }
                next_negative[e] += n_neg as f64 * epochs_per_negative[e];

                embedding.row_mut(i).copy_from_slice(&current);
            }
        }

        embedding
    }
}

#[inline]
fn clip(v: f64) -> f64 {
    v.clamp(-GRAD_CLIP, GRAD_CLIP)
}

/// Binary search for the sigma that makes the neighbor memberships sum to
/// `target`. Returns `(rho, sigma)`.
fn smooth_knn_dist(dists: &[f64], target: f64, mean_all: f64) -> (f64, f64) {
    let rho = dists.iter().copied().find(|&d| d > 0.0).unwrap_or(0.0);

    let mut lo = 0.0_f64;
    let mut hi = f64::INFINITY;
    let mut mid = 1.0_f64;

    for _ in 0..64 {
        let psum: f64 = dists
            .iter()
            .map(|&d| {
                let excess = d - rho;
                if excess > 0.0 {
                    (-excess / mid).exp()
                } else {
                    1.0
                }
            })
            .sum();

        if (psum - target).abs() < SMOOTH_K_TOLERANCE {
            break;
        }
        if psum > target {
            hi = mid;
            mid = (lo + hi) / 2.0;
        } else {
            lo = mid;
            mid = if hi.is_infinite() { mid * 2.0 } else { (lo + hi) / 2.0 };
        }
    }

    // Keep sigma away from zero for duplicate-heavy neighborhoods
    let mean_local = if dists.is_empty() {
        0.0
    } else {
        dists.iter().sum::<f64>() / dists.len() as f64
    };
    let floor = if rho > 0.0 {
        MIN_K_DIST_SCALE * mean_local
    } else {
        MIN_K_DIST_SCALE * mean_all
    };
    (rho, mid.max(floor).max(1e-12))
}

/// Fit `a`, `b` of the curve `1 / (1 + a * d^(2b))` to the target membership
/// (1 below `min_dist`, exponential decay with scale `spread` beyond it) by
/// Levenberg-Marquardt least squares on 300 points over `[0, 3 * spread]`.
pub fn find_ab_params(spread: f64, min_dist: f64) -> Result<(f64, f64)> {
    let xs: Vec<f64> = (0..300).map(|i| 3.0 * spread * i as f64 / 299.0).collect();
    let ys: Vec<f64> = xs
        .iter()
        .map(|&x| {
            if x < min_dist {
                1.0
            } else {
                (-(x - min_dist) / spread).exp()
            }
        })
        .collect();

    let sse = |a: f64, b: f64| -> f64 {
        xs.iter()
            .zip(&ys)
            .map(|(&x, &y)| (1.0 / (1.0 + a * x.powf(2.0 * b)) - y).powi(2))
            .sum()
    };

    let (mut a, mut b) = (1.0_f64, 1.0_f64);
    let mut cost = sse(a, b);
    let mut lambda = 1e-3;

    for _ in 0..500 {
        let (mut jaa, mut jab, mut jbb, mut ga, mut gb) = (0.0, 0.0, 0.0, 0.0, 0.0);
        for (&x, &y) in xs.iter().zip(&ys) {
            if x <= 0.0 {
                // f(0) = 1 regardless of a, b
                continue;
            }
            let u = x.powf(2.0 * b);
            let denom = 1.0 + a * u;
            let r = 1.0 / denom - y;
            let da = -u / (denom * denom);
            let db = -2.0 * a * u * x.ln() / (denom * denom);
            jaa += da * da;
            jab += da * db;
            jbb += db * db;
            ga += da * r;
            gb += db * r;
        }

        let m00 = jaa * (1.0 + lambda);
        let m11 = jbb * (1.0 + lambda);
        let det = m00 * m11 - jab * jab;
        if !det.is_finite() || det.abs() < 1e-300 {
            break;
        }
        let step_a = -(m11 * ga - jab * gb) / det;
        let step_b = -(m00 * gb - jab * ga) / det;
        let (na, nb) = (a + step_a, b + step_b);

        let new_cost = if na > 0.0 && nb > 0.0 { sse(na, nb) } else { f64::INFINITY };
        if new_cost < cost {
            let gain = cost - new_cost;
            a = na;
            b = nb;
            cost = new_cost;
            lambda = (lambda * 0.1).max(1e-12);
            if gain < 1e-14 {
                break;
            }
        } else {
            lambda *= 10.0;
            if lambda > 1e12 {
                break;
            }
        }
    }

    if !(a.is_finite() && b.is_finite() && a > 0.0 && b > 0.0) {
        return Err(AtlasError::ComputationError(format!(
            "curve fit failed for spread={spread}, min_dist={min_dist}"
        )));
    }
    Ok((a, b))
}
