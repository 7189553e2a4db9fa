//! Output table assembly
//!
//! Joins display metadata of the kept rows with the neighbor labels, cluster
//! labels and embedding coordinates. Column layout:
//!
//! | columns | content |
//! |---|---|
//! | metadata fields found in the input | raw text (`popularity`, `year` as numbers) |
//! | `__display`, `__spotify_url` | track label and search link |
//! | `nn1`..`nnK` | labels of the nearest other tracks |
//! | `cluster` | cluster label |
//! | `x`, `y`, `z` | embedding coordinates |
//! | numeric allow-list fields not already emitted | raw values for coloring |

use super::labels::{display_name, search_url, SynonymField, ARTIST_FIELDS, TITLE_FIELDS};
use crate::clustering::ClusterAssignment;
use crate::error::{AtlasError, Result};
use crate::neighbors::NeighborGraph;
use crate::preprocessing::coerce::{column_as_numeric, column_as_text};
use crate::preprocessing::{Coercion, NormalizedMatrix};
use ndarray::Array2;
use polars::prelude::*;

/// Display metadata carried into the output, in column order
pub const METADATA_FIELDS: &[&str] = &[
    "track_name",
    "name",
    "artists",
    "artist_name",
    "genre",
    "popularity",
    "year",
    "release_date",
    "album",
    "album_name",
];

/// Raw numeric fields kept for downstream coloring
pub const NUMERIC_FIELDS: &[&str] = &[
    "popularity",
    "year",
    "tempo",
    "energy",
    "danceability",
    "valence",
    "loudness",
];

pub const DISPLAY_COLUMN: &str = "__display";
pub const URL_COLUMN: &str = "__spotify_url";
pub const CLUSTER_COLUMN: &str = "cluster";

/// Name of the `j`-th (0-based) neighbor label column
pub fn neighbor_column(j: usize) -> String {
    format!("nn{}", j + 1)
}

/// Name of the `d`-th embedding coordinate column
pub fn coordinate_column(d: usize) -> String {
    match d {
        0 => "x".to_string(),
        1 => "y".to_string(),
        2 => "z".to_string(),
        _ => format!("dim{d}"),
    }
}

/// Everything the output table is built from
pub struct OutputInputs<'a> {
    pub raw: &'a DataFrame,
    pub matrix: &'a NormalizedMatrix,
    pub neighbors: &'a NeighborGraph,
    pub clusters: &'a ClusterAssignment,
    pub embedding: &'a Array2<f64>,
    pub search_url_base: &'a str,
}

/// Per-row display labels for the kept rows
pub fn display_labels(
    raw: &DataFrame,
    row_index: &[usize],
    search_url_base: &str,
) -> Result<(Vec<String>, Vec<String>)> {
    let title = SynonymField::resolve(raw, TITLE_FIELDS)?;
    let artist = SynonymField::resolve(raw, ARTIST_FIELDS)?;

    Ok(row_index
        .iter()
        .map(|&i| {
            let (t, a) = (title.get(i), artist.get(i));
            (display_name(t, a), search_url(search_url_base, t, a))
        })
        .unzip())
}

/// Assemble the enriched output table.
pub fn build_output_table(inputs: &OutputInputs<'_>) -> Result<DataFrame> {
    let rows = &inputs.matrix.row_index;
    let n = rows.len();
    check_len("neighbor lists", inputs.neighbors.n_rows(), n)?;
    check_len("cluster labels", inputs.clusters.labels.len(), n)?;
    check_len("embedding points", inputs.embedding.nrows(), n)?;

    let mut columns: Vec<Column> = Vec::new();
    let mut emitted: Vec<&str> = Vec::new();

    for &field in METADATA_FIELDS {
        if NUMERIC_FIELDS.contains(&field) {
            if let Some(values) = column_as_numeric(inputs.raw, field, Coercion::Numeric)? {
                columns.push(numeric_column(field, &values, rows));
                emitted.push(field);
            }
        } else if let Some(values) = column_as_text(inputs.raw, field)? {
            let picked: Vec<Option<String>> = rows.iter().map(|&i| values[i].clone()).collect();
            columns.push(Series::new(field.into(), picked).into());
            emitted.push(field);
        }
    }

    let (display, urls) = display_labels(inputs.raw, rows, inputs.search_url_base)?;

    let neighbor_columns: Vec<Column> = (0..inputs.neighbors.k())
        .map(|j| {
            let labels: Vec<&str> = inputs
                .neighbors
                .indices
                .iter()
                .map(|list| display[list[j]].as_str())
                .collect();
            Series::new(neighbor_column(j).into(), labels).into()
        })
        .collect();

    columns.push(Series::new(DISPLAY_COLUMN.into(), display).into());
    columns.push(Series::new(URL_COLUMN.into(), urls).into());
    columns.extend(neighbor_columns);

    let clusters: Vec<u32> = inputs.clusters.labels.iter().map(|&c| c as u32).collect();
    columns.push(Series::new(CLUSTER_COLUMN.into(), clusters).into());

    for (d, coords) in inputs.embedding.columns().into_iter().enumerate() {
        let values: Vec<f64> = coords.to_vec();
        columns.push(Series::new(coordinate_column(d).into(), values).into());
    }

    for &field in NUMERIC_FIELDS {
        if emitted.contains(&field) {
            continue;
        }
        if let Some(values) = column_as_numeric(inputs.raw, field, Coercion::Numeric)? {
            columns.push(numeric_column(field, &values, rows));
        }
    }

    Ok(DataFrame::new(columns)?)
}

/// Raw numeric values for the kept rows; `Int64` when every observed value
/// is a whole number, `Float64` otherwise.
fn numeric_column(name: &str, values: &[Option<f64>], rows: &[usize]) -> Column {
    let picked: Vec<Option<f64>> = rows
        .iter()
        .map(|&i| values[i].filter(|v| v.is_finite()))
        .collect();

    let integral = picked
        .iter()
        .flatten()
        .all(|v| v.fract() == 0.0 && v.abs() < I64_EXACT);
    if integral {
        let ints: Vec<Option<i64>> = picked.iter().map(|v| v.map(|v| v as i64)).collect();
        Series::new(name.into(), ints).into()
    } else {
        Series::new(name.into(), picked).into()
    }
}

// Largest magnitude below which every whole f64 converts to i64 exactly
const I64_EXACT: f64 = 9_007_199_254_740_992.0;

fn check_len(what: &str, actual: usize, expected: usize) -> Result<()> {
    if actual == expected {
        Ok(())
    } else {
        Err(AtlasError::ShapeError {
            expected: format!("{expected} {what}"),
            actual: actual.to_string(),
        })
    }
}
