//! Missing value imputation for numerical features

use crate::error::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Fill value for missing numerical entries, captured once from training data
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MedianImputer {
    pub median: f64,
}

impl MedianImputer {
    /// Learn the median of the present values; an all-missing column imputes 0.0
    pub fn fit(ca: &Float64Chunked) -> Self {
        Self {
            median: ca.median().unwrap_or(0.0),
        }
    }

    #[inline]
    pub fn fill(&self, value: Option<f64>) -> f64 {
        value.unwrap_or(self.median)
    }

    /// Replace missing entries with the training median
    pub fn transform(&self, ca: &Float64Chunked) -> Result<Float64Chunked> {
        Ok(ca.fill_null_with_values(self.median)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_fill() {
        let ca = Float64Chunked::from_slice_options("x".into(), &[Some(1.0), None, Some(9.0), Some(3.0)]);
        let imputer = MedianImputer::fit(&ca);
        assert_eq!(imputer.median, 3.0);

        let filled = imputer.transform(&ca).unwrap();
        assert_eq!(filled.null_count(), 0);
        assert_eq!(filled.get(1), Some(3.0));
        assert_eq!(imputer.fill(Some(2.0)), 2.0);
    }

    #[test]
    fn test_even_count_median() {
        let ca = Float64Chunked::from_slice("x".into(), &[4.0, 1.0, 2.0, 3.0]);
        assert_eq!(MedianImputer::fit(&ca).median, 2.5);
    }

    #[test]
    fn test_all_missing_imputes_zero() {
        let ca = Float64Chunked::from_slice_options("x".into(), &[None, None]);
        let imputer = MedianImputer::fit(&ca);
        assert_eq!(imputer.fill(None), 0.0);
    }
}
