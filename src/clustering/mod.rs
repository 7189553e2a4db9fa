//! K-Means cluster assignment
//!
//! k-means++ seeding, Lloyd iterations and several seeded restarts, keeping
//! the restart with the lowest within-cluster sum of squares.

use crate::error::{AtlasError, Result};
use crate::utils::distance::squared_euclidean;
use crate::utils::DenseRows;
use ndarray::Array2;
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// K-Means parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub n_clusters: usize,
    /// Independent restarts; the lowest-inertia one wins
    pub n_init: usize,
    pub max_iter: usize,
    /// Convergence threshold on total centroid movement
    pub tol: f64,
    pub random_state: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            n_clusters: 20,
            n_init: 10,
            max_iter: 300,
            tol: 1e-4,
            random_state: 42,
        }
    }
}

impl ClusterConfig {
    pub fn with_n_clusters(mut self, n_clusters: usize) -> Self {
        self.n_clusters = n_clusters;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_clusters == 0 {
            return Err(AtlasError::InvalidParameter {
                name: "n_clusters".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.n_init == 0 {
            return Err(AtlasError::InvalidParameter {
                name: "n_init".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Result of a K-Means fit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterAssignment {
    /// Label in `[0, n_clusters)` for every row
    pub labels: Vec<usize>,
    /// n_clusters × n_features
    pub centroids: Array2<f64>,
    /// Sum of squared distances to the assigned centroid
    pub inertia: f64,
    pub n_iter: usize,
}

impl ClusterAssignment {
    /// Row count per cluster label
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0usize; self.centroids.nrows()];
        for &label in &self.labels {
            sizes[label] += 1;
        }
        sizes
    }
}

/// K-Means clustering with k-means++ initialization and restarts
#[derive(Debug, Clone)]
pub struct KMeans {
    config: ClusterConfig,
}

impl Default for KMeans {
    fn default() -> Self {
        Self::new(ClusterConfig::default())
    }
}

impl KMeans {
    pub fn new(config: ClusterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// Cluster the rows of `x`.
    pub fn fit(&self, x: &Array2<f64>) -> Result<ClusterAssignment> {
        self.config.validate()?;
        let n_samples = x.nrows();
        if n_samples < self.config.n_clusters {
            return Err(AtlasError::InsufficientData {
                what: "rows for clustering".to_string(),
                required: self.config.n_clusters,
                actual: n_samples,
            });
        }

        let rows = DenseRows::from_array(x);

        // One seed per restart, all drawn from the configured stream
        let mut seeder = ChaCha8Rng::seed_from_u64(self.config.random_state);
        let seeds: Vec<u64> = (0..self.config.n_init).map(|_| seeder.next_u64()).collect();

        let runs: Vec<Run> = seeds
            .par_iter()
            .map(|&seed| self.fit_once(&rows, seed))
            .collect();

        for (run, result) in runs.iter().enumerate() {
            debug!(run, inertia = result.inertia, n_iter = result.n_iter, "K-Means restart");
        }

        // Lowest inertia; earlier restart wins ties
        let best = runs
            .into_iter()
            .reduce(|best, next| if next.inertia < best.inertia { next } else { best })
            .ok_or_else(|| AtlasError::ComputationError("no K-Means restart ran".to_string()))?;

        Ok(ClusterAssignment {
            labels: best.labels,
            centroids: best.centroids.into_array()?,
            inertia: best.inertia,
            n_iter: best.n_iter,
        })
    }

    fn fit_once(&self, x: &DenseRows, seed: u64) -> Run {
        let k = self.config.n_clusters;
        let n_samples = x.n_rows();
        let n_features = x.n_cols();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let mut centroids = Self::kmeans_pp_init(x, k, &mut rng);
        let mut labels = vec![usize::MAX; n_samples];
        let mut n_iter = 0;

        for iter in 0..self.config.max_iter {
            n_iter = iter + 1;

            // Assignment step: nearest centroid, lowest label on ties
            let assigned: Vec<(usize, f64)> = (0..n_samples)
                .into_par_iter()
                .map(|i| Self::nearest_centroid(x.row(i), &centroids))
                .collect();

            let mut changed = 0;
            for (label, &(new, _)) in labels.iter_mut().zip(assigned.iter()) {
                if *label != new {
                    changed += 1;
                    *label = new;
                }
            }

            // Update step: recompute centroids
            let mut new_centroids = DenseRows::zeros(k, n_features);
            let mut counts = vec![0usize; k];
            for i in 0..n_samples {
                let c = labels[i];
                counts[c] += 1;
                for (acc, v) in new_centroids.row_mut(c).iter_mut().zip(x.row(i)) {
                    *acc += v;
                }
            }

            for c in 0..k {
                if counts[c] > 0 {
                    let n = counts[c] as f64;
                    new_centroids.row_mut(c).iter_mut().for_each(|v| *v /= n);
                }
            }

            // Empty cluster: re-seed on the point worst served by its centroid
            for c in (0..k).filter(|&c| counts[c] == 0) {
                let far = (0..n_samples)
                    .map(|i| (i, squared_euclidean(x.row(i), new_centroids.row(labels[i]))))
                    .max_by(|a, b| a.1.total_cmp(&b.1).then(b.0.cmp(&a.0)))
                    .map_or(0, |(i, _)| i);
                new_centroids.row_mut(c).copy_from_slice(x.row(far));
                labels[far] = c;
            }

            let shift = squared_euclidean(centroids.as_slice(), new_centroids.as_slice()).sqrt();
            centroids = new_centroids;

            if changed == 0 || shift < self.config.tol {
                break;
            }
        }

        // Final assignment against the settled centroids
        let assigned: Vec<(usize, f64)> = (0..n_samples)
            .into_par_iter()
            .map(|i| Self::nearest_centroid(x.row(i), &centroids))
            .collect();
        let inertia = assigned.iter().map(|(_, d)| d).sum();
        let labels = assigned.into_iter().map(|(c, _)| c).collect();

        Run {
            labels,
            centroids,
            inertia,
            n_iter,
        }
    }

    /// K-means++ initialization: pick centroids spread apart
    fn kmeans_pp_init(x: &DenseRows, k: usize, rng: &mut ChaCha8Rng) -> DenseRows {
        let n_samples = x.n_rows();
        let mut centroids = DenseRows::zeros(k, x.n_cols());

        let first = rng.gen_range(0..n_samples);
        centroids.row_mut(0).copy_from_slice(x.row(first));

        let mut closest: Vec<f64> = (0..n_samples)
            .map(|i| squared_euclidean(x.row(i), centroids.row(0)))
            .collect();

        for c in 1..k {
            // Weighted random selection proportional to D²
            let total: f64 = closest.iter().sum();
            let chosen = if total <= 0.0 || !total.is_finite() {
                rng.gen_range(0..n_samples)
            } else {
                let r = rng.gen::<f64>() * total;
                let mut cumulative = 0.0;
                closest
                    .iter()
                    .position(|&d| {
                        cumulative += d;
                        cumulative >= r
                    })
                    .unwrap_or(n_samples - 1)
            };
            centroids.row_mut(c).copy_from_slice(x.row(chosen));

            for (i, d) in closest.iter_mut().enumerate() {
                let nd = squared_euclidean(x.row(i), centroids.row(c));
                if nd < *d {
                    *d = nd;
                }
            }
        }

        centroids
    }

    fn nearest_centroid(row: &[f64], centroids: &DenseRows) -> (usize, f64) {
        let mut best_c = 0;
        let mut best_dist = f64::INFINITY;
        for c in 0..centroids.n_rows() {
            let d = squared_euclidean(row, centroids.row(c));
            if d < best_dist {
                best_dist = d;
                best_c = c;
            }
        }
        (best_c, best_dist)
    }
}

/// One restart's outcome
struct Run {
    labels: Vec<usize>,
    centroids: DenseRows,
    inertia: f64,
    n_iter: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn two_blobs() -> Array2<f64> {
        array![
            [1.0, 1.0],
            [1.5, 1.5],
            [1.2, 1.3],
            [8.0, 8.0],
            [8.5, 8.5],
            [8.2, 8.3],
        ]
    }

    #[test]
    fn test_kmeans_basic() {
        let config = ClusterConfig::default().with_n_clusters(2);
        let result = KMeans::new(config).fit(&two_blobs()).unwrap();
        let labels = &result.labels;

        assert_eq!(labels.len(), 6);
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[0], labels[2]);
        assert_eq!(labels[3], labels[4]);
        assert_eq!(labels[3], labels[5]);
        assert_ne!(labels[0], labels[3]);
    }

    #[test]
    fn test_kmeans_inertia() {
        let x = array![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [10.0, 10.0]];
        let config = ClusterConfig::default().with_n_clusters(2);
        let result = KMeans::new(config).fit(&x).unwrap();
        // Best split puts the far point alone: 4/3 within-cluster SS
        assert!((result.inertia - 4.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_labels_in_range_and_deterministic() {
        let x = Array2::from_shape_fn((60, 3), |(i, j)| ((i * 7 + j * 13) % 17) as f64 / 4.0);
        let config = ClusterConfig::default().with_n_clusters(5);
        let a = KMeans::new(config.clone()).fit(&x).unwrap();
        let b = KMeans::new(config).fit(&x).unwrap();

        assert!(a.labels.iter().all(|&l| l < 5));
        assert_eq!(a.labels, b.labels);
        assert_eq!(a.inertia, b.inertia);
        assert_eq!(a.cluster_sizes().iter().sum::<usize>(), 60);
    }

    #[test]
    fn test_duplicate_rows_do_not_fail() {
        let x = Array2::from_elem((25, 2), 3.0);
        let config = ClusterConfig::default().with_n_clusters(20);
        let result = KMeans::new(config).fit(&x).unwrap();
        assert_eq!(result.labels.len(), 25);
        assert_eq!(result.inertia, 0.0);
    }

    #[test]
    fn test_fewer_rows_than_clusters() {
        let err = KMeans::default().fit(&two_blobs()).unwrap_err();
        assert!(matches!(err, AtlasError::InsufficientData { required: 20, actual: 6, .. }));
    }
}
