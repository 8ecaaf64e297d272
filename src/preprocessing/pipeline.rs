//! Two-phase preprocessing transform: fit once on training data, apply to any batch

use super::encoder::{CategoryEncoder, Encoded};
use super::imputer::MedianImputer;
use super::scaler::StandardScaler;
use crate::error::{DafuError, Result};
use crate::profiling::SchemaProfile;
use crate::utils::columns::{float_chunked, numeric_values, series, string_values};
use ndarray::Array2;
use polars::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Number of distinct unseen values kept as examples in a warning
const MAX_UNKNOWN_EXAMPLES: usize = 5;

/// Fitted transform for one feature column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FeatureTransform {
    Categorical(CategoryEncoder),
    Numerical {
        imputer: MedianImputer,
        scaler: StandardScaler,
    },
}

/// A feature column and its fitted transform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureColumn {
    pub name: String,
    pub transform: FeatureTransform,
}

/// Categorical values seen at apply time that were absent during fit.
///
/// Not an error: every such value was encoded with the fallback index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnknownCategoryWarning {
    pub column: String,
    /// Rows carrying an unseen value
    pub count: usize,
    /// A few of the distinct unseen values
    pub examples: Vec<String>,
}

/// Transformed feature matrix, columns in `PreprocessingState::feature_columns` order
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    pub values: Array2<f64>,
    pub columns: Vec<String>,
    pub unknown_categories: Vec<UnknownCategoryWarning>,
}

impl FeatureMatrix {
    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.values.ncols()
    }
}

/// Unfit preprocessing transform. Fitting consumes it and yields a
/// [`PreprocessingState`], so applying an unfit transform cannot be expressed.
#[derive(Debug, Clone, Default)]
pub struct Preprocessor;

impl Preprocessor {
    pub fn new() -> Self {
        Self
    }

    /// Learn imputation values, category vocabularies and scaling parameters.
    ///
    /// Columns the profile marks as primary keys, high-cardinality or
    /// low-variance are dropped; the label column is retained but never
    /// becomes a feature.
    pub fn fit(self, df: &DataFrame, profile: &SchemaProfile) -> Result<PreprocessingState> {
        let start = Instant::now();

        let dropped = profile.dropped_columns();
        if !dropped.is_empty() {
            info!(columns = ?dropped, "Dropping columns before training");
        }

        let retained_columns = profile.retained_columns();
        let label_column = profile.label_column.clone();

        let feature_names: Vec<&String> = retained_columns
            .iter()
            .filter(|c| Some(c.as_str()) != label_column.as_deref())
            .collect();

        let features = feature_names
            .par_iter()
            .map(|name| {
                let s = series(df, name)?;
                let transform = if profile.is_categorical(name) {
                    let values = string_values(s)?;
                    let encoder = CategoryEncoder::fit(values.iter().map(|v| v.as_deref()));
                    debug!(
                        column = %name,
                        categories = encoder.len(),
                        mode = ?encoder.mode(),
                        "Fitted category encoder"
                    );
                    FeatureTransform::Categorical(encoder)
                } else {
                    let values = float_chunked(s)?;
                    let imputer = MedianImputer::fit(&values);
                    let scaler = StandardScaler::fit(&imputer.transform(&values)?);
                    debug!(
                        column = %name,
                        median = imputer.median,
                        mean = scaler.mean,
                        scale = scaler.scale,
                        "Fitted numeric imputer and scaler"
                    );
                    FeatureTransform::Numerical { imputer, scaler }
                };
                Ok(FeatureColumn {
                    name: (*name).clone(),
                    transform,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        info!(
            features = features.len(),
            rows = df.height(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Preprocessing fitted"
        );

        Ok(PreprocessingState {
            retained_columns,
            label_column,
            features,
        })
    }
}

/// Everything needed to reproduce the training-time feature transformation.
///
/// Read-only after fit; `apply` takes `&self` and is safe to share across threads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingState {
    /// Columns kept after drops, dataset order, label included
    pub retained_columns: Vec<String>,
    pub label_column: Option<String>,
    pub features: Vec<FeatureColumn>,
}

impl PreprocessingState {
    /// Feature column names in matrix order
    pub fn feature_columns(&self) -> Vec<String> {
        self.features.iter().map(|f| f.name.clone()).collect()
    }

    /// Columns an input batch must provide
    pub fn required_columns(&self) -> impl Iterator<Item = &str> {
        self.features.iter().map(|f| f.name.as_str())
    }

    /// Required columns absent from a batch, in feature order
    pub fn missing_columns(&self, df: &DataFrame) -> Vec<String> {
        let present: BTreeSet<&str> = df.get_columns().iter().map(|c| c.name().as_str()).collect();
        self.required_columns()
            .filter(|c| !present.contains(c))
            .map(str::to_string)
            .collect()
    }

    /// Replay the fitted transform on a batch.
    ///
    /// Extra columns and the label column are ignored. A missing feature column
    /// fails with `SchemaMismatch`; unseen categories do not fail.
    pub fn apply(&self, df: &DataFrame) -> Result<FeatureMatrix> {
        let missing = self.missing_columns(df);
        if !missing.is_empty() {
            return Err(DafuError::SchemaMismatch { missing });
        }

        let n_rows = df.height();
        let encoded = self
            .features
            .par_iter()
            .map(|feature| encode_column(df, feature))
            .collect::<Result<Vec<_>>>()?;

        let mut values = Array2::<f64>::zeros((n_rows, self.features.len()));
        let mut unknown_categories = Vec::new();
        for (j, (column, warning)) in encoded.into_iter().enumerate() {
            for (i, v) in column.into_iter().enumerate() {
                values[[i, j]] = v;
            }
            if let Some(w) = warning {
                warn!(
                    column = %w.column,
                    rows = w.count,
                    examples = ?w.examples,
                    "Unseen categories mapped to most frequent training category"
                );
                unknown_categories.push(w);
            }
        }

        Ok(FeatureMatrix {
            values,
            columns: self.feature_columns(),
            unknown_categories,
        })
    }
}

fn encode_column(
    df: &DataFrame,
    feature: &FeatureColumn,
) -> Result<(Vec<f64>, Option<UnknownCategoryWarning>)> {
    let s = series(df, &feature.name)?;
    match &feature.transform {
        FeatureTransform::Numerical { imputer, scaler } => {
            let encoded = numeric_values(s)?
                .into_iter()
                .map(|v| scaler.transform(imputer.fill(v)))
                .collect();
            Ok((encoded, None))
        }
        FeatureTransform::Categorical(encoder) => {
            let values = string_values(s)?;
            let mut count = 0;
            let mut examples: Vec<String> = Vec::new();
            let encoded = values
                .iter()
                .map(|v| {
                    let e = encoder.encode(v.as_deref());
                    if e == Encoded::Unseen {
                        count += 1;
                        if let Some(value) = v {
                            if examples.len() < MAX_UNKNOWN_EXAMPLES && !examples.contains(value) {
                                examples.push(value.clone());
                            }
                        }
                    }
                    e.index() as f64
                })
                .collect();

            let warning = (count > 0).then(|| UnknownCategoryWarning {
                column: feature.name.clone(),
                count,
                examples,
            });
            Ok((encoded, warning))
        }
    }
}
