//! Standard (z-score) scaling over dense feature matrices

use crate::error::{AtlasError, Result};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

/// Relative threshold under which a column's spread counts as zero
const DEGENERATE_STD: f64 = 1e-12;

/// Parameters for one fitted column
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ScalerParams {
    center: f64,
    scale: f64,
    degenerate: bool,
}

/// Column-wise standardization: `(x - mean) / std`, population std (ddof = 0).
///
/// Columns with no spread are degenerate: they transform to exactly zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StandardScaler {
    params: Vec<ScalerParams>,
    is_fitted: bool,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit the scaler to the data
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        if x.nrows() == 0 {
            return Err(AtlasError::EmptyData(
                "cannot fit a scaler on zero rows".to_string(),
            ));
        }

        self.params = x
            .axis_iter(Axis(1))
            .map(|col| {
                let n = col.len() as f64;
                let mean = col.sum() / n;
                let var = col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
                let std = var.sqrt();
                let degenerate = !std.is_finite() || std <= DEGENERATE_STD * mean.abs().max(1.0);
                ScalerParams {
                    center: mean,
                    scale: if degenerate { 1.0 } else { std },
                    degenerate,
                }
            })
            .collect();

        self.is_fitted = true;
        Ok(self)
    }

    /// Transform the data
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(AtlasError::ComputationError(
                "scaler used before fit".to_string(),
            ));
        }
        if x.ncols() != self.params.len() {
            return Err(AtlasError::ShapeError {
                expected: format!("{} columns", self.params.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }

        let mut out = x.clone();
        for (mut col, params) in out.axis_iter_mut(Axis(1)).zip(self.params.iter()) {
            if params.degenerate {
                col.fill(0.0);
            } else {
                col.mapv_inplace(|v| (v - params.center) / params.scale);
            }
        }
        Ok(out)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }

    /// Indices of columns with no spread
    pub fn degenerate_columns(&self) -> Vec<usize> {
        self.params
            .iter()
            .enumerate()
            .filter(|(_, p)| p.degenerate)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn means(&self) -> Vec<f64> {
        self.params.iter().map(|p| p.center).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_standard_scaler() {
        let x = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0], [4.0, 40.0], [5.0, 50.0]];
        let mut scaler = StandardScaler::new();
        let scaled = scaler.fit_transform(&x).unwrap();

        for col in scaled.axis_iter(Axis(1)) {
            let mean = col.sum() / col.len() as f64;
            let var = col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / col.len() as f64;
            assert!(mean.abs() < 1e-10);
            assert!((var.sqrt() - 1.0).abs() < 1e-10);
        }
    }

    #[test]
    fn test_constant_column_maps_to_zero() {
        let x = array![[0.1, 1.0], [0.1, 2.0], [0.1, 3.0]];
        let mut scaler = StandardScaler::new();
        let scaled = scaler.fit_transform(&x).unwrap();

        assert_eq!(scaler.degenerate_columns(), vec![0]);
        assert!(scaled.column(0).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_transform_before_fit() {
        let scaler = StandardScaler::new();
        assert!(scaler.transform(&array![[1.0]]).is_err());
    }

    #[test]
    fn test_shape_mismatch() {
        let mut scaler = StandardScaler::new();
        scaler.fit(&array![[1.0, 2.0], [3.0, 4.0]]).unwrap();
        let err = scaler.transform(&array![[1.0], [2.0]]).unwrap_err();
        assert!(matches!(err, AtlasError::ShapeError { .. }));
    }
}
