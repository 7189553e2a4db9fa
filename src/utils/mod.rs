//! Utility functions and types

pub mod data_loader;
pub mod distance;
pub mod rows;

pub use data_loader::{DataLoader, DataSaver};
pub use distance::squared_euclidean;
pub use rows::DenseRows;
