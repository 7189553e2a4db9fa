//! Pipeline configuration

use crate::clustering::ClusterConfig;
use crate::error::{AtlasError, Result};
use crate::preprocessing::DEFAULT_FEATURES;
use crate::visualization::UmapConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Everything one run depends on besides the input table itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Raw track table placed by the acquisition step
    pub input_path: PathBuf,

    /// Enriched table read by the presentation layer
    pub output_path: PathBuf,

    /// Candidate feature columns, in matrix order
    pub features: Vec<String>,

    /// Cluster assigner settings (count, restarts, seed)
    pub clustering: ClusterConfig,

    /// Embedding reducer settings (neighbors, min_dist, seed)
    pub embedding: UmapConfig,

    /// Similar tracks listed per row
    pub n_similar: usize,

    /// Prefix for the per-track search link
    pub search_url_base: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("data/tracks.csv"),
            output_path: PathBuf::from("artifacts/embeddings_3d.csv"),
            features: DEFAULT_FEATURES.iter().map(|s| s.to_string()).collect(),
            clustering: ClusterConfig::default(),
            embedding: UmapConfig::default(),
            n_similar: 5,
            search_url_base: "https://open.spotify.com/search/".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON config; missing keys keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            AtlasError::ConfigError(format!("cannot read {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_input(mut self, path: impl Into<PathBuf>) -> Self {
        self.input_path = path.into();
        self
    }

    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = path.into();
        self
    }

    pub fn with_n_clusters(mut self, n_clusters: usize) -> Self {
        self.clustering = self.clustering.with_n_clusters(n_clusters);
        self
    }

    /// Seed both the cluster assigner and the embedding reducer
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.clustering = self.clustering.with_random_state(seed);
        self.embedding.random_state = seed;
        self
    }

    pub fn with_embedding(mut self, embedding: UmapConfig) -> Self {
        self.embedding = embedding;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.features.is_empty() {
            return Err(AtlasError::ConfigError(
                "candidate feature list is empty".to_string(),
            ));
        }
        if self.n_similar == 0 {
            return Err(AtlasError::InvalidParameter {
                name: "n_similar".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        self.clustering.validate()?;
        self.embedding.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.clustering.n_clusters, 20);
        assert_eq!(config.clustering.n_init, 10);
        assert_eq!(config.embedding.n_neighbors, 30);
        assert_eq!(config.n_similar, 5);
        assert_eq!(config.features.len(), 13);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = PipelineConfig::new()
            .with_input("in.csv")
            .with_n_clusters(4)
            .with_seed(7);

        assert_eq!(config.input_path, PathBuf::from("in.csv"));
        assert_eq!(config.clustering.n_clusters, 4);
        assert_eq!(config.clustering.random_state, 7);
        assert_eq!(config.embedding.random_state, 7);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let json = r#"{ "n_similar": 3, "clustering": { "n_clusters": 8 } }"#;
        let config: PipelineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.n_similar, 3);
        assert_eq!(config.clustering.n_clusters, 8);
        assert_eq!(config.clustering.n_init, 10);
        assert!((config.embedding.min_dist - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let config = PipelineConfig::new().with_n_clusters(0);
        assert!(config.validate().is_err());

        let config = PipelineConfig {
            features: Vec::new(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(AtlasError::ConfigError(_))));
    }

    #[test]
    fn test_missing_config_file() {
        let err = PipelineConfig::from_json_file(Path::new("/no/such/config.json")).unwrap_err();
        assert!(matches!(err, AtlasError::ConfigError(_)));
    }
}
