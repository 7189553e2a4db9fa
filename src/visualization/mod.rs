//! Visualization module: manifold projection of the feature matrix for the 3D map.

pub mod umap;
pub use umap::{find_ab_params, Umap, UmapConfig};
