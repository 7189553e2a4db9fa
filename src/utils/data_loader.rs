//! Data loading and saving utilities

use crate::error::{AtlasError, Result};
use polars::prelude::*;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Loads the raw track table.
///
/// Every column is read as text; numeric coercion happens in the normalizer.
pub struct DataLoader {
    delimiter: u8,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    /// Create a new data loader
    pub fn new() -> Self {
        Self { delimiter: b',' }
    }

    /// Set the field delimiter
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Load a delimited text file, picking `\t` for `.tsv` paths.
    pub fn load_auto(&self, path: &Path) -> Result<DataFrame> {
        let is_tsv = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("tsv"));
        if is_tsv {
            Self::new().with_delimiter(b'\t').load_csv(path)
        } else {
            self.load_csv(path)
        }
    }

    /// Load a CSV file
    pub fn load_csv(&self, path: &Path) -> Result<DataFrame> {
        let file = File::open(path).map_err(|e| AtlasError::MissingInput {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let parse_opts = CsvParseOptions::default().with_separator(self.delimiter);

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .with_parse_options(parse_opts)
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| AtlasError::MissingInput {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        info!(
            path = %path.display(),
            rows = df.height(),
            cols = df.width(),
            "Loaded input table"
        );
        Ok(df)
    }
}

/// Writes the output table without ever leaving a half-written file at the
/// destination.
pub struct DataSaver;

impl DataSaver {
    pub fn save_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let tmp = Self::staging_path(path);
        let written = File::create(&tmp)
            .map_err(AtlasError::from)
            .and_then(|mut file| {
                CsvWriter::new(&mut file)
                    .include_header(true)
                    .finish(df)
                    .map_err(AtlasError::from)
            });

        if let Err(e) = written {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }

        fs::rename(&tmp, path)?;
        debug!(path = %path.display(), rows = df.height(), "Wrote output table");
        Ok(())
    }

    fn staging_path(path: &Path) -> PathBuf {
        let mut name = path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".partial");
        path.with_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file() {
        let err = DataLoader::new()
            .load_csv(Path::new("/definitely/not/here.csv"))
            .unwrap_err();
        match err {
            AtlasError::MissingInput { path, .. } => {
                assert_eq!(path, PathBuf::from("/definitely/not/here.csv"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_everything_read_as_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracks.csv");
        let mut f = File::create(&path).unwrap();
        writeln!(f, "track_name,key,energy").unwrap();
        writeln!(f, "Song A,5,0.8").unwrap();
        writeln!(f, "Song B,Db,0.6").unwrap();
        drop(f);

        let df = DataLoader::new().load_csv(&path).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.column("key").unwrap().dtype(), &DataType::String);
        assert_eq!(df.column("energy").unwrap().dtype(), &DataType::String);
    }

    #[test]
    fn test_save_creates_parent_and_no_staging_left() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifacts").join("out.csv");
        let mut df = df!("x" => &[1.0, 2.0]).unwrap();

        DataSaver::save_csv(&mut df, &path).unwrap();
        assert!(path.exists());
        assert!(!DataSaver::staging_path(&path).exists());
    }
}
