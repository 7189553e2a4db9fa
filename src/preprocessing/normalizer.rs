//! Feature normalizer: raw heterogeneous table → standardized feature matrix

use super::coerce::{column_as_numeric, Coercion};
use super::scaler::StandardScaler;
use crate::error::{AtlasError, Result};
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Audio descriptors considered for similarity, in matrix column order.
pub const DEFAULT_FEATURES: &[&str] = &[
    "acousticness",
    "danceability",
    "energy",
    "instrumentalness",
    "liveness",
    "loudness",
    "speechiness",
    "valence",
    "tempo",
    "duration_ms",
    "mode",
    "key",
    "time_signature",
];

/// Standardized features for the rows that survived cleaning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedMatrix {
    /// rows × retained features, zero mean / unit variance per column
    pub values: Array2<f64>,
    /// Retained feature names, one per column of `values`
    pub features: Vec<String>,
    /// Position of each matrix row in the raw table
    pub row_index: Vec<usize>,
    /// Candidates present in the input but entirely missing
    pub dropped_features: Vec<String>,
    /// Retained features with zero variance (all-zero columns)
    pub degenerate_features: Vec<String>,
    /// Raw rows removed because every feature was missing
    pub dropped_rows: usize,
}

impl NormalizedMatrix {
    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.values.ncols()
    }
}

/// Coerces, cleans, imputes and standardizes the candidate feature columns.
#[derive(Debug, Clone)]
pub struct FeatureNormalizer {
    candidates: Vec<String>,
}

impl Default for FeatureNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_FEATURES.iter().map(|s| s.to_string()).collect())
    }
}

impl FeatureNormalizer {
    pub fn new(candidates: Vec<String>) -> Self {
        Self { candidates }
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// Run the full cleaning pass over `df`.
    pub fn normalize(&self, df: &DataFrame) -> Result<NormalizedMatrix> {
        let n_raw = df.height();

        // Coerce every candidate that exists; absent columns are skipped
        let mut present: Vec<(String, Vec<Option<f64>>)> = Vec::new();
        for name in &self.candidates {
            if let Some(values) = column_as_numeric(df, name, Coercion::for_column(name))? {
                present.push((name.clone(), values));
            }
        }

        if present.is_empty() {
            return Err(AtlasError::SchemaError(format!(
                "no usable features: none of [{}] found in input",
                self.candidates.join(", ")
            )));
        }

        // Infinities count as missing
        for (_, values) in present.iter_mut() {
            for v in values.iter_mut() {
                if v.is_some_and(|x| !x.is_finite()) {
                    *v = None;
                }
            }
        }

        let (columns, dropped_features): (Vec<_>, Vec<_>) = present
            .into_iter()
            .partition(|(_, values)| values.iter().any(Option::is_some));
        let dropped_features: Vec<String> =
            dropped_features.into_iter().map(|(name, _)| name).collect();
        if !dropped_features.is_empty() {
            warn!(columns = ?dropped_features, "Dropping entirely missing feature columns");
        }

        let row_index: Vec<usize> = (0..n_raw)
            .filter(|&i| columns.iter().any(|(_, values)| values[i].is_some()))
            .collect();

        if row_index.is_empty() {
            return Err(AtlasError::EmptyData(
                "no usable rows after cleaning".to_string(),
            ));
        }

        let features: Vec<String> = columns.iter().map(|(name, _)| name.clone()).collect();
        let raw = Self::impute_mean(&columns, &row_index)?;

        let mut scaler = StandardScaler::new();
        let values = scaler.fit_transform(&raw)?;

        let degenerate_features: Vec<String> = scaler
            .degenerate_columns()
            .into_iter()
            .map(|j| features[j].clone())
            .collect();
        if !degenerate_features.is_empty() {
            warn!(
                columns = ?degenerate_features,
                "Zero-variance features contribute no signal"
            );
        }
        debug!(means = ?scaler.means(), "Fitted feature means");

        let dropped_rows = n_raw - row_index.len();
        info!(
            rows = row_index.len(),
            dropped_rows,
            features = ?features,
            "Normalized feature matrix"
        );

        Ok(NormalizedMatrix {
            values,
            features,
            row_index,
            dropped_features,
            degenerate_features,
            dropped_rows,
        })
    }

    /// Build the dense matrix for the kept rows, filling holes with the
    /// column mean of the observed cells.
    fn impute_mean(
        columns: &[(String, Vec<Option<f64>>)],
        row_index: &[usize],
    ) -> Result<Array2<f64>> {
        let n_rows = row_index.len();
        let n_cols = columns.len();
        let mut out = Array2::zeros((n_rows, n_cols));

        for (j, (name, values)) in columns.iter().enumerate() {
            let observed: Vec<f64> = row_index.iter().filter_map(|&i| values[i]).collect();
            if observed.is_empty() {
                return Err(AtlasError::ComputationError(format!(
                    "feature {name} has no observed value among kept rows"
                )));
            }
            let mean = observed.iter().sum::<f64>() / observed.len() as f64;
            for (r, &i) in row_index.iter().enumerate() {
                out[[r, j]] = values[i].unwrap_or(mean);
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Axis;

    fn column_stats(m: &NormalizedMatrix, j: usize) -> (f64, f64) {
        let col = m.values.index_axis(Axis(1), j);
        let n = col.len() as f64;
        let mean = col.sum() / n;
        let var = col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        (mean, var.sqrt())
    }

    #[test]
    fn test_columns_standardized() {
        let df = df!(
            "energy" => &[0.1, 0.4, 0.9, 0.3],
            "tempo" => &[90.0, 120.0, 140.0, 100.0],
        )
        .unwrap();
        let m = FeatureNormalizer::default().normalize(&df).unwrap();

        assert_eq!(m.features, vec!["energy", "tempo"]);
        for j in 0..m.n_features() {
            let (mean, std) = column_stats(&m, j);
            assert!(mean.abs() < 1e-10);
            assert!((std - 1.0).abs() < 1e-10);
        }
    }

    #[test]
    fn test_no_candidate_columns() {
        let df = df!("title" => &["a", "b"]).unwrap();
        let err = FeatureNormalizer::default().normalize(&df).unwrap_err();
        assert!(matches!(err, AtlasError::SchemaError(_)));
    }

    #[test]
    fn test_all_missing_column_dropped() {
        let df = df!(
            "energy" => &[Some(0.2), Some(0.5), Some(0.7)],
            "liveness" => &[None::<f64>, None, None],
        )
        .unwrap();
        let m = FeatureNormalizer::default().normalize(&df).unwrap();

        assert_eq!(m.features, vec!["energy"]);
        assert_eq!(m.dropped_features, vec!["liveness"]);
    }

    #[test]
    fn test_empty_rows_dropped_and_order_kept() {
        let df = df!(
            "energy" => &[Some(0.2), None, Some(0.7), None],
            "tempo" => &[Some(100.0), None, None, Some(90.0)],
        )
        .unwrap();
        let m = FeatureNormalizer::default().normalize(&df).unwrap();

        assert_eq!(m.row_index, vec![0, 2, 3]);
        assert_eq!(m.dropped_rows, 1);
        assert!(m.values.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_no_usable_rows() {
        let df = df!("energy" => &["n/a", "", "?"]).unwrap();
        let err = FeatureNormalizer::default().normalize(&df).unwrap_err();
        assert!(matches!(err, AtlasError::EmptyData(_)));
    }

    #[test]
    fn test_infinity_treated_as_missing() {
        let df = df!(
            "energy" => &[0.1, 0.2, 0.3],
            "loudness" => &["-5.0", "inf", "-7.0"],
        )
        .unwrap();
        let m = FeatureNormalizer::default().normalize(&df).unwrap();

        // energy keeps the row; loudness is imputed with the mean of -5 and -7
        assert_eq!(m.row_index, vec![0, 1, 2]);
        let j = m.features.iter().position(|f| f == "loudness").unwrap();
        assert!(m.values[[1, j]].abs() < 1e-12);
        assert!(m.values.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_row_with_only_infinity_dropped() {
        let df = df!("loudness" => &["-5.0", "-inf", "-7.0"]).unwrap();
        let m = FeatureNormalizer::default().normalize(&df).unwrap();

        assert_eq!(m.row_index, vec![0, 2]);
        assert_eq!(m.dropped_rows, 1);
    }

    #[test]
    fn test_key_name_mapped_before_scaling() {
        let df = df!("key" => &["Db", "C", "D"]).unwrap();
        let normalizer = FeatureNormalizer::new(vec!["key".to_string()]);
        let m = normalizer.normalize(&df).unwrap();
        // 1, 0, 2 → the Db row sits exactly on the mean
        assert!(m.values[[0, 0]].abs() < 1e-12);
        assert!(m.values[[1, 0]] < 0.0);
        assert!(m.values[[2, 0]] > 0.0);
    }

    #[test]
    fn test_constant_column_is_zero() {
        let df = df!(
            "mode" => &["Major", "major", "MAJOR"],
            "energy" => &[0.1, 0.2, 0.3],
        )
        .unwrap();
        let m = FeatureNormalizer::default().normalize(&df).unwrap();
        let j = m.features.iter().position(|f| f == "mode").unwrap();
        assert!(m.values.column(j).iter().all(|&v| v == 0.0));
        assert_eq!(m.degenerate_features, vec!["mode"]);
    }
}
