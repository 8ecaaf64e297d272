//! Column classification for training datasets

use crate::error::{DafuError, Result};
use crate::utils::columns::{
    float_chunked, is_integer_dtype, is_numeric_dtype, n_distinct, sample_variance,
};
use polars::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Storage class of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    Numerical,
    Categorical,
}

/// Per-column facts gathered while profiling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub name: String,
    pub kind: ColumnKind,
    /// Distinct non-missing values
    pub n_unique: usize,
    pub n_missing: usize,
    /// Sample variance, numerical columns only
    pub variance: Option<f64>,
    /// Integer storage (relevant for primary-key detection)
    pub is_integer: bool,
}

impl ColumnProfile {
    /// Ratio of distinct values to rows
    pub fn unique_ratio(&self, n_rows: usize) -> f64 {
        if n_rows == 0 {
            0.0
        } else {
            self.n_unique as f64 / n_rows as f64
        }
    }
}

/// Immutable result of profiling a training dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaProfile {
    pub n_rows: usize,
    /// All column names in dataset order
    pub columns: Vec<String>,
    pub primary_keys: BTreeSet<String>,
    pub categorical_columns: BTreeSet<String>,
    pub numerical_columns: BTreeSet<String>,
    pub high_cardinality_columns: BTreeSet<String>,
    pub low_variance_columns: BTreeSet<String>,
    pub label_column: Option<String>,
}

impl SchemaProfile {
    fn empty(columns: Vec<String>, label_column: Option<String>) -> Self {
        Self {
            n_rows: 0,
            columns,
            primary_keys: BTreeSet::new(),
            categorical_columns: BTreeSet::new(),
            numerical_columns: BTreeSet::new(),
            high_cardinality_columns: BTreeSet::new(),
            low_variance_columns: BTreeSet::new(),
            label_column,
        }
    }

    /// True when the profiled dataset had no rows
    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }

    /// Columns removed before training. The label is never part of this set.
    pub fn dropped_columns(&self) -> BTreeSet<String> {
        self.primary_keys
            .iter()
            .chain(&self.high_cardinality_columns)
            .chain(&self.low_variance_columns)
            .filter(|c| Some(c.as_str()) != self.label_column.as_deref())
            .cloned()
            .collect()
    }

    /// Columns that survive dropping, in dataset order (label included)
    pub fn retained_columns(&self) -> Vec<String> {
        let dropped = self.dropped_columns();
        self.columns
            .iter()
            .filter(|c| !dropped.contains(*c))
            .cloned()
            .collect()
    }

    /// Numerical columns that will become model features
    pub fn numerical_features(&self) -> Vec<String> {
        let dropped = self.dropped_columns();
        self.columns
            .iter()
            .filter(|c| self.numerical_columns.contains(*c))
            .filter(|c| !dropped.contains(*c))
            .filter(|c| Some(c.as_str()) != self.label_column.as_deref())
            .cloned()
            .collect()
    }

    /// Whether a column is stored as categorical
    pub fn is_categorical(&self, column: &str) -> bool {
        self.categorical_columns.contains(column)
    }
}

/// Classifies dataset columns by storage type, identity and information content
#[derive(Debug, Clone)]
pub struct SchemaProfiler {
    /// Unique ratio above which a categorical column is high-cardinality
    high_cardinality_ratio: f64,
    /// Sample variance below which a numerical column is low-variance
    low_variance_threshold: f64,
}

impl Default for SchemaProfiler {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaProfiler {
    /// Create a profiler with the standard thresholds (0.5 unique ratio, 0.01 variance)
    pub fn new() -> Self {
        Self {
            high_cardinality_ratio: 0.5,
            low_variance_threshold: 0.01,
        }
    }

    /// Set the high-cardinality unique ratio
    pub fn with_high_cardinality_ratio(mut self, ratio: f64) -> Self {
        self.high_cardinality_ratio = ratio;
        self
    }

    /// Set the low-variance threshold
    pub fn with_low_variance_threshold(mut self, threshold: f64) -> Self {
        self.low_variance_threshold = threshold;
        self
    }

    /// Profile a dataset. Fails only if the named label column does not exist.
    pub fn profile(&self, df: &DataFrame, label_column: Option<&str>) -> Result<SchemaProfile> {
        let columns: Vec<String> = df.get_columns().iter().map(|c| c.name().to_string()).collect();

        if let Some(label) = label_column {
            if !columns.iter().any(|c| c == label) {
                return Err(DafuError::invalid_parameter(
                    "label_column",
                    label,
                    "column does not exist in the dataset",
                ));
            }
        }
        let label = label_column.map(str::to_string);

        let n_rows = df.height();
        if n_rows == 0 {
            return Ok(SchemaProfile::empty(columns, label));
        }

        let column_profiles = self.profile_columns(df)?;

        let mut profile = SchemaProfile::empty(columns, label);
        profile.n_rows = n_rows;

        for col in &column_profiles {
            let is_label = profile.label_column.as_deref() == Some(col.name.as_str());

            match col.kind {
                ColumnKind::Categorical => {
                    profile.categorical_columns.insert(col.name.clone());
                }
                ColumnKind::Numerical => {
                    profile.numerical_columns.insert(col.name.clone());
                }
            }

            if is_label {
                continue;
            }

            let identifier_storage = col.is_integer || col.kind == ColumnKind::Categorical;
            if identifier_storage && col.n_unique == n_rows {
                info!(column = %col.name, "Detected primary key");
                profile.primary_keys.insert(col.name.clone());
            }

            if col.kind == ColumnKind::Categorical
                && col.unique_ratio(n_rows) > self.high_cardinality_ratio
            {
                info!(
                    column = %col.name,
                    unique_ratio = col.unique_ratio(n_rows),
                    "High cardinality column detected"
                );
                profile.high_cardinality_columns.insert(col.name.clone());
            }

            if col.kind == ColumnKind::Numerical {
                let low = col
                    .variance
                    .map_or(true, |v| v < self.low_variance_threshold);
                if low {
                    info!(column = %col.name, variance = ?col.variance, "Low variance column detected");
                    profile.low_variance_columns.insert(col.name.clone());
                }
            }
        }

        debug!(
            rows = n_rows,
            categorical = profile.categorical_columns.len(),
            numerical = profile.numerical_columns.len(),
            dropped = profile.dropped_columns().len(),
            "Schema profile complete"
        );

        Ok(profile)
    }

    /// Gather per-column statistics in parallel
    pub fn profile_columns(&self, df: &DataFrame) -> Result<Vec<ColumnProfile>> {
        df.get_columns()
            .par_iter()
            .map(|column| profile_column(column.as_materialized_series()))
            .collect()
    }
}

fn profile_column(series: &Series) -> Result<ColumnProfile> {
    let name = series.name().to_string();
    let dtype = series.dtype();

    if is_numeric_dtype(dtype) {
        let ca = float_chunked(series)?;
        let n_missing = ca.null_count();
        let variance = sample_variance(&ca);

        Ok(ColumnProfile {
            name,
            kind: ColumnKind::Numerical,
            n_unique: n_distinct(&ca.into_series())?,
            n_missing,
            variance,
            is_integer: is_integer_dtype(dtype),
        })
    } else {
        let values = series.cast(&DataType::String)?;

        Ok(ColumnProfile {
            name,
            kind: ColumnKind::Categorical,
            n_unique: n_distinct(&values)?,
            n_missing: values.null_count(),
            variance: None,
            is_integer: false,
        })
    }
}
