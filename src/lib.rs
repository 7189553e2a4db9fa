//! track-atlas - 3D similarity map for audio-descriptor track tables
//!
//! Turns a table of per-track audio features into an enriched table that a
//! presentation layer can render as an interactive point cloud:
//!
//! - [`preprocessing`] - symbolic/numeric coercion, cleaning, imputation, standardization
//! - [`neighbors`] - exact Euclidean k-nearest-neighbor lists
//! - [`clustering`] - K-Means with k-means++ seeding and restarts
//! - [`visualization`] - UMAP projection to 3 dimensions
//! - [`pipeline`] - orchestration, display labels and the output table
//! - [`cli`] - command-line interface
//!
//! # Example
//!
//! ```no_run
//! use track_atlas::prelude::*;
//!
//! let config = PipelineConfig::new()
//!     .with_input("data/tracks.csv")
//!     .with_output("artifacts/embeddings_3d.csv");
//! let report = Pipeline::new(config).run()?;
//! println!("{}", report.summary_line());
//! # Ok::<(), track_atlas::error::AtlasError>(())
//! ```

pub mod error;
pub mod config;

pub mod preprocessing;
pub mod neighbors;
pub mod clustering;
pub mod visualization;
pub mod pipeline;

pub mod utils;
pub mod cli;

pub use error::{AtlasError, Result};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::clustering::{ClusterAssignment, ClusterConfig, KMeans};
    pub use crate::config::PipelineConfig;
    pub use crate::error::{AtlasError, Result};
    pub use crate::neighbors::{NeighborGraph, NeighborIndex};
    pub use crate::pipeline::{Pipeline, PipelineOutput, PipelineReport};
    pub use crate::preprocessing::{FeatureNormalizer, NormalizedMatrix, StandardScaler};
    pub use crate::utils::{DataLoader, DataSaver};
    pub use crate::visualization::{Umap, UmapConfig};
}
