//! Dataset loading and saving

use crate::error::{DafuError, Result};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::debug;

/// Loads transaction datasets and scoring batches from disk
#[derive(Debug, Clone)]
pub struct DataLoader {
    /// Rows used by polars to infer CSV column types
    infer_schema_length: usize,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    /// Create a new data loader
    pub fn new() -> Self {
        Self {
            infer_schema_length: 1000,
        }
    }

    /// Set the number of rows used for CSV schema inference
    pub fn with_infer_schema_length(mut self, rows: usize) -> Self {
        self.infer_schema_length = rows.max(1);
        self
    }

    /// Load a CSV (or TSV) file with a header row
    pub fn load_csv(&self, path: &Path, separator: u8) -> Result<DataFrame> {
        let file = open(path)?;
        let parse_opts = CsvParseOptions::default().with_separator(separator);

        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(self.infer_schema_length))
            .with_parse_options(parse_opts)
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| DafuError::DataError(e.to_string()))
    }

    /// Load a Parquet file
    pub fn load_parquet(&self, path: &Path) -> Result<DataFrame> {
        let file = open(path)?;
        ParquetReader::new(file)
            .finish()
            .map_err(|e| DafuError::DataError(e.to_string()))
    }

    /// Load a JSON file
    pub fn load_json(&self, path: &Path) -> Result<DataFrame> {
        let file = open(path)?;
        JsonReader::new(file)
            .finish()
            .map_err(|e| DafuError::DataError(e.to_string()))
    }

    /// Detect file format from extension and load
    pub fn load_auto(&self, path: &Path) -> Result<DataFrame> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        let df = match ext.as_str() {
            "tsv" => self.load_csv(path, b'\t')?,
            "parquet" | "pq" => self.load_parquet(path)?,
            "json" => self.load_json(path)?,
            _ => self.load_csv(path, b',')?,
        };

        debug!(
            path = %path.display(),
            rows = df.height(),
            cols = df.width(),
            "Dataset loaded"
        );
        Ok(df)
    }
}

fn open(path: &Path) -> Result<File> {
    File::open(path)
        .map_err(|e| DafuError::DataError(format!("cannot open {}: {}", path.display(), e)))
}

/// Writes result frames to disk
pub struct DataSaver;

impl DataSaver {
    /// Save to CSV
    pub fn save_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
        let mut file = File::create(path)?;
        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(df)
            .map_err(|e| DafuError::DataError(e.to_string()))
    }
}
