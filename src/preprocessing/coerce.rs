//! Best-effort coercion of raw cell values into numbers
//!
//! Every parser returns `Option<f64>`; `None` means "missing".

use crate::error::Result;
use polars::prelude::*;

/// Musical key names mapped to their semitone index.
const KEY_NAMES: &[(&str, f64)] = &[
    ("C", 0.0),
    ("C#", 1.0),
    ("Db", 1.0),
    ("D", 2.0),
    ("D#", 3.0),
    ("Eb", 3.0),
    ("E", 4.0),
    ("F", 5.0),
    ("F#", 6.0),
    ("Gb", 6.0),
    ("G", 7.0),
    ("G#", 8.0),
    ("Ab", 8.0),
    ("A", 9.0),
    ("A#", 10.0),
    ("Bb", 10.0),
    ("B", 11.0),
];

const MODE_NAMES: &[(&str, f64)] = &[
    ("Major", 1.0),
    ("major", 1.0),
    ("MAJOR", 1.0),
    ("Minor", 0.0),
    ("minor", 0.0),
    ("MINOR", 0.0),
];

/// How a column's raw text is turned into a number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    /// Plain numeric parse
    Numeric,
    /// Key name lookup, then numeric parse
    MusicalKey,
    /// Mode name lookup, then numeric parse
    Mode,
}

impl Coercion {
    /// Pick the coercion rule for a feature column name.
    pub fn for_column(name: &str) -> Self {
        match name {
            "key" => Coercion::MusicalKey,
            "mode" => Coercion::Mode,
            _ => Coercion::Numeric,
        }
    }

    /// Apply this rule to one raw value.
    pub fn apply(self, raw: &str) -> Option<f64> {
        match self {
            Coercion::Numeric => parse_numeric(raw),
            Coercion::MusicalKey => parse_key(raw),
            Coercion::Mode => parse_mode(raw),
        }
    }
}

/// Parse a trimmed value as `f64`. Infinities are kept (the normalizer
/// removes them later); NaN and unparseable text are missing.
pub fn parse_numeric(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_nan() => None,
        Ok(v) => Some(v),
        Err(_) => None,
    }
}

pub fn parse_key(raw: &str) -> Option<f64> {
    lookup(KEY_NAMES, raw).or_else(|| parse_numeric(raw))
}

pub fn parse_mode(raw: &str) -> Option<f64> {
    lookup(MODE_NAMES, raw).or_else(|| parse_numeric(raw))
}

fn lookup(table: &[(&str, f64)], raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    table
        .iter()
        .find(|(name, _)| *name == trimmed)
        .map(|&(_, value)| value)
}

/// Read a column as text, whatever its physical dtype.
pub fn column_as_text(df: &DataFrame, name: &str) -> Result<Option<Vec<Option<String>>>> {
    let column = match df.column(name) {
        Ok(column) => column,
        Err(_) => return Ok(None),
    };
    let series = column.as_materialized_series().cast(&DataType::String)?;
    let values = series
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.to_string()))
        .collect();
    Ok(Some(values))
}

/// Read a column and coerce every cell with `rule`. Returns `None` when the
/// column is absent from the frame.
pub fn column_as_numeric(
    df: &DataFrame,
    name: &str,
    rule: Coercion,
) -> Result<Option<Vec<Option<f64>>>> {
    Ok(column_as_text(df, name)?.map(|cells| {
        cells
            .iter()
            .map(|cell| cell.as_deref().and_then(|raw| rule.apply(raw)))
            .collect()
    }))
}
