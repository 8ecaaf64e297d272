//! Dataset overview and suitability checks for anomaly detection

use super::profiler::SchemaProfile;
use crate::error::{DafuError, Result};
use crate::utils::columns::float_chunked;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Minimum numerical features required for training
pub const MIN_NUMERICAL_FEATURES: usize = 2;
/// Minimum training rows
pub const MIN_TRAINING_ROWS: usize = 100;

/// Missing values in one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingValues {
    pub column: String,
    pub count: usize,
    pub percentage: f64,
}

/// One label value and how often it occurs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelCount {
    pub value: String,
    pub count: usize,
    pub percentage: f64,
}

/// Distribution of the label column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelDistribution {
    pub column: String,
    /// Sorted by count descending
    pub counts: Vec<LabelCount>,
    pub is_binary: bool,
}

/// Reason a dataset may be a poor fit for anomaly detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SuitabilityIssue {
    TooFewNumericalFeatures { found: usize },
    TooFewRows { found: usize },
    TooManyHighCardinality { high_cardinality: usize, categorical: usize },
}

impl SuitabilityIssue {
    /// Issues that stop training unless explicitly overridden
    pub fn is_blocking(&self) -> bool {
        matches!(
            self,
            SuitabilityIssue::TooFewNumericalFeatures { .. } | SuitabilityIssue::TooFewRows { .. }
        )
    }
}

impl fmt::Display for SuitabilityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuitabilityIssue::TooFewNumericalFeatures { found } => write!(
                f,
                "only {} numerical feature(s) available, at least {} required",
                found, MIN_NUMERICAL_FEATURES
            ),
            SuitabilityIssue::TooFewRows { found } => write!(
                f,
                "only {} row(s) available, at least {} recommended",
                found, MIN_TRAINING_ROWS
            ),
            SuitabilityIssue::TooManyHighCardinality {
                high_cardinality,
                categorical,
            } => write!(
                f,
                "{} of {} categorical columns are high-cardinality",
                high_cardinality, categorical
            ),
        }
    }
}

/// Suitability verdict for a dataset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SuitabilityReport {
    pub issues: Vec<SuitabilityIssue>,
}

impl SuitabilityReport {
    pub fn is_suitable(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn blocking_issues(&self) -> impl Iterator<Item = &SuitabilityIssue> {
        self.issues.iter().filter(|i| i.is_blocking())
    }

    /// Apply the insufficient-data gate.
    ///
    /// Blocking issues become an `InsufficientData` error unless `allow` is set,
    /// in which case every issue is returned as a warning message.
    pub fn enforce(&self, allow: bool) -> Result<Vec<String>> {
        let blocking: Vec<String> = self.blocking_issues().map(|i| i.to_string()).collect();
        if !blocking.is_empty() && !allow {
            return Err(DafuError::InsufficientData { reasons: blocking });
        }
        for issue in &self.issues {
            warn!(issue = %issue, "Dataset suitability issue");
        }
        Ok(self.issues.iter().map(|i| i.to_string()).collect())
    }
}

/// Structured overview of a training dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataAnalysis {
    pub n_rows: usize,
    pub n_columns: usize,
    /// Columns with missing values, highest percentage first
    pub missing_values: Vec<MissingValues>,
    pub label_distribution: Option<LabelDistribution>,
    /// Numerical columns that survive dropping, label excluded
    pub numerical_feature_count: usize,
    pub suitability: SuitabilityReport,
}

/// Summarise a dataset against its profile
pub fn analyze(df: &DataFrame, profile: &SchemaProfile) -> Result<DataAnalysis> {
    let n_rows = df.height();

    let mut missing_values: Vec<MissingValues> = df
        .get_columns()
        .iter()
        .filter_map(|col| {
            let series = col.as_materialized_series();
            let count = missing_count(series);
            (count > 0).then(|| MissingValues {
                column: series.name().to_string(),
                count,
                percentage: percentage(count, n_rows),
            })
        })
        .collect();
    missing_values.sort_by(|a, b| {
        b.percentage
            .total_cmp(&a.percentage)
            .then_with(|| a.column.cmp(&b.column))
    });

    let label_distribution = match &profile.label_column {
        Some(label) => Some(label_distribution(df, label)?),
        None => None,
    };

    let numerical_feature_count = profile.numerical_features().len();

    let mut issues = Vec::new();
    if numerical_feature_count < MIN_NUMERICAL_FEATURES {
        issues.push(SuitabilityIssue::TooFewNumericalFeatures {
            found: numerical_feature_count,
        });
    }
    if n_rows < MIN_TRAINING_ROWS {
        issues.push(SuitabilityIssue::TooFewRows { found: n_rows });
    }
    let categorical = profile
        .categorical_columns
        .iter()
        .filter(|c| Some(c.as_str()) != profile.label_column.as_deref())
        .count();
    let high_cardinality = profile.high_cardinality_columns.len();
    if high_cardinality as f64 > categorical as f64 * 0.5 {
        issues.push(SuitabilityIssue::TooManyHighCardinality {
            high_cardinality,
            categorical,
        });
    }

    Ok(DataAnalysis {
        n_rows,
        n_columns: df.width(),
        missing_values,
        label_distribution,
        numerical_feature_count,
        suitability: SuitabilityReport { issues },
    })
}

fn missing_count(series: &Series) -> usize {
    match series.dtype() {
        DataType::Float32 | DataType::Float64 => float_chunked(series)
            .map(|ca| ca.null_count())
            .unwrap_or_else(|_| series.null_count()),
        _ => series.null_count(),
    }
}

fn label_distribution(df: &DataFrame, label: &str) -> Result<LabelDistribution> {
    let values = crate::utils::columns::series(df, label)?
        .cast(&DataType::String)?
        .drop_nulls();
    let total = values.len();

    let table = values.value_counts(false, false, "count".into(), false)?;
    let names = table.column(label)?.str()?;
    let tallies = table.column("count")?.cast(&DataType::UInt64)?;
    let tallies = tallies.u64()?;

    let mut counts: Vec<LabelCount> = names
        .into_iter()
        .zip(tallies)
        .filter_map(|(value, count)| Some((value?, count? as usize)))
        .map(|(value, count)| LabelCount {
            value: value.to_string(),
            count,
            percentage: percentage(count, total),
        })
        .collect();
    counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));

    Ok(LabelDistribution {
        column: label.to_string(),
        is_binary: counts.len() == 2,
        counts,
    })
}

fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiling::SchemaProfiler;

    #[test]
    fn test_small_dataset_flags_blocking_issues() {
        let df = df!(
            "amount" => &[1.0, 2.0, 3.0, 4.0],
            "label" => &[0i64, 0, 1, 0],
        )
        .unwrap();
        let profile = SchemaProfiler::new().profile(&df, Some("label")).unwrap();
        let analysis = analyze(&df, &profile).unwrap();

        assert_eq!(analysis.numerical_feature_count, 1);
        assert!(analysis
            .suitability
            .issues
            .contains(&SuitabilityIssue::TooFewNumericalFeatures { found: 1 }));
        assert!(analysis
            .suitability
            .issues
            .contains(&SuitabilityIssue::TooFewRows { found: 4 }));

        let err = analysis.suitability.enforce(false).unwrap_err();
        assert!(matches!(err, DafuError::InsufficientData { ref reasons } if reasons.len() == 2));

        let warnings = analysis.suitability.enforce(true).unwrap();
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn test_label_distribution_and_missing_summary() {
        let df = df!(
            "amount" => &[Some(1.0), None, Some(3.0), None],
            "merchant" => &[Some("a"), None, Some("b"), Some("a")],
            "label" => &["fraud", "ok", "ok", "ok"],
        )
        .unwrap();
        let profile = SchemaProfiler::new().profile(&df, Some("label")).unwrap();
        let analysis = analyze(&df, &profile).unwrap();

        assert_eq!(analysis.missing_values.len(), 2);
        assert_eq!(analysis.missing_values[0].column, "amount");
        assert!((analysis.missing_values[0].percentage - 50.0).abs() < 1e-9);

        let dist = analysis.label_distribution.unwrap();
        assert!(dist.is_binary);
        assert_eq!(dist.counts[0].value, "ok");
        assert_eq!(dist.counts[0].count, 3);
    }

    #[test]
    fn test_numeric_label_distribution_and_nan_missing() {
        let df = df!(
            "amount" => &[1.0, f64::NAN, 3.0, 4.0, 5.0],
            "is_fraud" => &[0i64, 1, 0, 0, 1],
        )
        .unwrap();
        let profile = SchemaProfiler::new().profile(&df, Some("is_fraud")).unwrap();
        let analysis = analyze(&df, &profile).unwrap();

        assert_eq!(analysis.missing_values.len(), 1);
        assert_eq!(analysis.missing_values[0].count, 1);

        let dist = analysis.label_distribution.unwrap();
        assert!(dist.is_binary);
        assert_eq!(dist.counts[0].value, "0");
        assert_eq!(dist.counts[0].count, 3);
        assert!((dist.counts[1].percentage - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_high_cardinality_issue_is_not_blocking() {
        let issue = SuitabilityIssue::TooManyHighCardinality {
            high_cardinality: 2,
            categorical: 2,
        };
        assert!(!issue.is_blocking());
        let report = SuitabilityReport {
            issues: vec![issue],
        };
        assert_eq!(report.enforce(false).unwrap().len(), 1);
    }
}
