//! Ground-truth label normalization

use crate::error::{DafuError, Result};
use crate::utils::columns::{float_chunked, is_numeric_dtype, n_distinct, string_values};
use polars::prelude::*;
use std::collections::BTreeSet;

/// String values read as the positive (fraud) class
const POSITIVE_TOKENS: [&str; 5] = ["1", "true", "yes", "fraud", "anomaly"];

/// Binary ground truth derived from a label column
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryLabels {
    pub values: Vec<bool>,
    /// Distinct raw values in the source column
    pub n_distinct: usize,
}

impl BinaryLabels {
    /// Build labels from a column.
    ///
    /// Numeric values are positive iff non-zero. String values are positive iff
    /// they are a recognised positive token; when no value is, the larger of
    /// exactly two distinct values is positive.
    pub fn from_series(series: &Series) -> Result<Self> {
        if is_numeric_dtype(series.dtype()) {
            let ca = float_chunked(series)?;
            let present = require_present(series, ca.into_iter().collect())?;
            return Ok(Self {
                values: present.into_iter().map(|v| v != 0.0).collect(),
                n_distinct: n_distinct(&ca.into_series())?,
            });
        }

        let values = require_present(series, string_values(series)?)?;
        let distinct: BTreeSet<&str> = values.iter().map(String::as_str).collect();
        let is_token = |v: &str| POSITIVE_TOKENS.contains(&v.trim().to_lowercase().as_str());

        let positive: Box<dyn Fn(&str) -> bool> = if distinct.iter().any(|v| is_token(*v)) {
            Box::new(is_token)
        } else if distinct.len() == 2 {
            let larger = distinct.iter().next_back().map(|v| v.to_string()).unwrap_or_default();
            Box::new(move |v: &str| v == larger)
        } else {
            Box::new(|_: &str| false)
        };

        Ok(Self {
            values: values.iter().map(|v| positive(v.as_str())).collect(),
            n_distinct: distinct.len(),
        })
    }

    /// Labels from booleans (`true` = positive)
    pub fn from_bools(values: Vec<bool>) -> Self {
        let n_distinct = values.iter().collect::<BTreeSet<_>>().len();
        Self { values, n_distinct }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn positives(&self) -> usize {
        self.values.iter().filter(|&&v| v).count()
    }

    /// Keep the labels at the given row indices
    pub fn select(&self, rows: &[usize]) -> Self {
        Self::from_bools(rows.iter().map(|&i| self.values[i]).collect())
    }
}

fn require_present<T>(series: &Series, values: Vec<Option<T>>) -> Result<Vec<T>> {
    let missing = values.iter().filter(|v| v.is_none()).count();
    if missing > 0 {
        return Err(DafuError::DataError(format!(
            "label column '{}' has {} missing value(s)",
            series.name(),
            missing
        )));
    }
    Ok(values.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_labels() {
        let s = Series::new("is_fraud".into(), &[0i64, 1, 0, 2]);
        let labels = BinaryLabels::from_series(&s).unwrap();
        assert_eq!(labels.values, vec![false, true, false, true]);
        assert_eq!(labels.n_distinct, 3);
    }

    #[test]
    fn test_token_labels() {
        let s = Series::new("label".into(), &["legit", "Fraud", "legit"]);
        let labels = BinaryLabels::from_series(&s).unwrap();
        assert_eq!(labels.values, vec![false, true, false]);
    }

    #[test]
    fn test_two_value_labels_use_larger_value() {
        let s = Series::new("label".into(), &["a", "b", "b"]);
        let labels = BinaryLabels::from_series(&s).unwrap();
        assert_eq!(labels.values, vec![false, true, true]);
        assert_eq!(labels.positives(), 2);
    }

    #[test]
    fn test_missing_labels_rejected() {
        let s = Series::new("label".into(), &[Some(1i64), None]);
        assert!(BinaryLabels::from_series(&s).is_err());
    }
}
