//! Pipeline orchestrator
//!
//! Normalizer first, then one exact neighbor graph shared by the neighbor
//! lists and the embedding reducer, with the cluster assigner running beside
//! the embedding over the same read-only matrix, then the joined output table.
//! Every fatal condition surfaces before the output file is touched.

pub mod labels;
pub mod output;

use crate::clustering::{ClusterAssignment, KMeans};
use crate::config::PipelineConfig;
use crate::error::{AtlasError, Result};
use crate::neighbors::{NeighborGraph, NeighborIndex};
use crate::preprocessing::{FeatureNormalizer, NormalizedMatrix};
use crate::utils::{DataLoader, DataSaver};
use crate::visualization::Umap;
use chrono::{DateTime, Utc};
use ndarray::Array2;
use output::{build_output_table, OutputInputs};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

/// Everything one in-memory pass produced
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Enriched output table, one row per kept input row
    pub table: DataFrame,
    pub matrix: NormalizedMatrix,
    pub neighbors: NeighborGraph,
    pub clusters: ClusterAssignment,
    /// rows × n_components
    pub embedding: Array2<f64>,
}

/// Summary of a completed run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub output_path: PathBuf,
    pub rows: usize,
    pub features: Vec<String>,
    pub dropped_features: Vec<String>,
    pub degenerate_features: Vec<String>,
    pub dropped_rows: usize,
    pub cluster_sizes: Vec<usize>,
    pub inertia: f64,
    pub generated_at: DateTime<Utc>,
}

impl PipelineReport {
    /// Report for `result` written to `output_path`, stamped now.
    pub fn from_output(output_path: &Path, result: &PipelineOutput) -> Self {
        Self {
            output_path: output_path.to_path_buf(),
            rows: result.table.height(),
            features: result.matrix.features.clone(),
            dropped_features: result.matrix.dropped_features.clone(),
            degenerate_features: result.matrix.degenerate_features.clone(),
            dropped_rows: result.matrix.dropped_rows,
            cluster_sizes: result.clusters.cluster_sizes(),
            inertia: result.clusters.inertia,
            generated_at: Utc::now(),
        }
    }

    /// `Saved embeddings: <path> rows=<n> features=[...]`
    pub fn summary_line(&self) -> String {
        format!(
            "Saved embeddings: {} rows={} features=[{}]",
            self.output_path.display(),
            self.rows,
            self.features.join(", ")
        )
    }

    /// Write the report as pretty JSON.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Batch transform from the raw track table to the enriched table.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage over an already-loaded table. Writes nothing.
    pub fn process(&self, raw: &DataFrame) -> Result<PipelineOutput> {
        self.config.validate()?;

        let start = Instant::now();
        let matrix = FeatureNormalizer::new(self.config.features.clone()).normalize(raw)?;
        self.check_row_count(matrix.n_rows())?;

        let x = &matrix.values;
        let umap = Umap::new(self.config.embedding.clone());

        // One exact graph serves both the neighbor lists and the embedding
        let k = self.config.n_similar.max(umap.graph_size(matrix.n_rows()));
        let graph = NeighborIndex::build(x).kneighbors(k)?;
        let neighbors = graph.truncated(self.config.n_similar);

        let (clusters, embedding) = rayon::join(
            || KMeans::new(self.config.clustering.clone()).fit(x),
            || umap.fit_graph(&graph),
        );
        let (clusters, embedding) = (clusters?, embedding?);

        info!(
            rows = matrix.n_rows(),
            clusters = self.config.clustering.n_clusters,
            inertia = clusters.inertia,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Neighbors, clusters and embedding computed"
        );

        let table = build_output_table(&OutputInputs {
            raw,
            matrix: &matrix,
            neighbors: &neighbors,
            clusters: &clusters,
            embedding: &embedding,
            search_url_base: &self.config.search_url_base,
        })?;

        Ok(PipelineOutput {
            table,
            matrix,
            neighbors,
            clusters,
            embedding,
        })
    }

    /// Read the input table, process it and write the output table.
    pub fn run(&self) -> Result<PipelineReport> {
        self.config.validate()?;

        let raw = DataLoader::new().load_auto(&self.config.input_path)?;
        info!(
            path = %self.config.input_path.display(),
            rows = raw.height(),
            columns = raw.width(),
            "Loaded input table"
        );

        let mut result = self.process(&raw)?;
        DataSaver::save_csv(&mut result.table, &self.config.output_path)?;

        let report = PipelineReport::from_output(&self.config.output_path, &result);
        info!("{}", report.summary_line());
        Ok(report)
    }

    // Checked before any stage starts
    fn check_row_count(&self, rows: usize) -> Result<()> {
        let required = self.config.n_similar + 1;
        if rows < required {
            return Err(AtlasError::InsufficientData {
                what: "rows for neighbor lists".to_string(),
                required,
                actual: rows,
            });
        }
        if rows < self.config.clustering.n_clusters {
            return Err(AtlasError::InsufficientData {
                what: "rows for clustering".to_string(),
                required: self.config.clustering.n_clusters,
                actual: rows,
            });
        }
        Ok(())
    }
}
