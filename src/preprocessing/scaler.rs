//! Feature standardization

use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Standardization parameters for one numerical column: `(x - mean) / scale`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: f64,
    /// Population standard deviation, or 1.0 when the column is constant
    pub scale: f64,
}

impl Default for StandardScaler {
    fn default() -> Self {
        Self {
            mean: 0.0,
            scale: 1.0,
        }
    }
}

impl StandardScaler {
    /// Fit on already-imputed values
    pub fn fit(ca: &Float64Chunked) -> Self {
        let (Some(mean), Some(std)) = (ca.mean(), ca.std(0)) else {
            return Self::default();
        };

        Self {
            mean,
            scale: if std == 0.0 || !std.is_finite() { 1.0 } else { std },
        }
    }

    #[inline]
    pub fn transform(&self, value: f64) -> f64 {
        (value - self.mean) / self.scale
    }

    #[inline]
    pub fn inverse_transform(&self, value: f64) -> f64 {
        value * self.scale + self.mean
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_scaler() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        let scaler = StandardScaler::fit(&Float64Chunked::from_slice("x".into(), &values));

        let scaled: Vec<f64> = values.iter().map(|&v| scaler.transform(v)).collect();
        let mean = scaled.iter().sum::<f64>() / scaled.len() as f64;
        let var = scaled.iter().map(|v| v * v).sum::<f64>() / scaled.len() as f64;
        assert!(mean.abs() < 1e-10);
        assert!((var - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_constant_column_scales_by_one() {
        let scaler = StandardScaler::fit(&Float64Chunked::from_slice("x".into(), &[7.0, 7.0, 7.0]));
        assert_eq!(scaler.scale, 1.0);
        assert_eq!(scaler.transform(7.0), 0.0);
    }

    #[test]
    fn test_empty_column_is_identity() {
        let scaler = StandardScaler::fit(&Float64Chunked::from_slice("x".into(), &[]));
        assert_eq!(scaler, StandardScaler::default());
    }

    #[test]
    fn test_inverse_transform() {
        let scaler = StandardScaler::fit(&Float64Chunked::from_slice("x".into(), &[2.0, 4.0, 9.0]));
        for v in [2.0, 4.0, 9.0, -3.5] {
            assert!((scaler.inverse_transform(scaler.transform(v)) - v).abs() < 1e-10);
        }
    }
}
