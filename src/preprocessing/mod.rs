//! Data preprocessing module
//!
//! Turns the raw track table into a clean numeric matrix:
//! - Symbolic and textual value coercion (musical key, mode, numbers)
//! - Missing-value handling (column and row drops, mean imputation)
//! - Standard scaling with zero-variance protection

pub mod coerce;
mod normalizer;
mod scaler;

pub use coerce::{parse_key, parse_mode, parse_numeric, Coercion};
pub use normalizer::{FeatureNormalizer, NormalizedMatrix, DEFAULT_FEATURES};
pub use scaler::StandardScaler;
