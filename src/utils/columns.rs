//! Column extraction helpers shared by profiling, preprocessing and evaluation

use crate::error::{DafuError, Result};
use polars::prelude::*;

/// Whether a dtype is stored as a number (integers, floats and booleans)
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
            | DataType::Boolean
    )
}

/// Whether a dtype is an integer type
pub fn is_integer_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
    )
}

/// Look up a column as a materialized series
pub fn series<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series> {
    df.column(name)
        .map(|c| c.as_materialized_series())
        .map_err(|_| DafuError::SchemaMismatch {
            missing: vec![name.to_string()],
        })
}

/// Column cast to `Float64` with NaN folded into null.
///
/// Values that cannot be represented as numbers also come back as null.
pub fn float_chunked(series: &Series) -> Result<Float64Chunked> {
    let casted = series
        .cast(&DataType::Float64)
        .map_err(|e| DafuError::DataError(format!("column '{}': {}", series.name(), e)))?;
    let ca = casted
        .f64()
        .map_err(|e| DafuError::DataError(e.to_string()))?;
    Ok(ca
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect::<Float64Chunked>()
        .with_name(series.name().clone()))
}

/// Column values as `f64`, with nulls and NaN both reported as `None`
pub fn numeric_values(series: &Series) -> Result<Vec<Option<f64>>> {
    Ok(float_chunked(series)?.into_iter().collect())
}

/// Column values rendered as strings; nulls stay `None`
pub fn string_values(series: &Series) -> Result<Vec<Option<String>>> {
    let casted = series
        .cast(&DataType::String)
        .map_err(|e| DafuError::DataError(format!("column '{}': {}", series.name(), e)))?;
    let ca = casted
        .str()
        .map_err(|e| DafuError::DataError(e.to_string()))?;
    Ok(ca.into_iter().map(|v| v.map(|s| s.to_string())).collect())
}

/// Distinct present values of a column
pub fn n_distinct(series: &Series) -> Result<usize> {
    Ok(series.drop_nulls().n_unique()?)
}

/// Sample variance (n - 1 denominator); `None` with fewer than two present values
pub fn sample_variance(ca: &Float64Chunked) -> Option<f64> {
    if ca.len() - ca.null_count() < 2 {
        return None;
    }
    ca.var(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_values_treat_nan_as_missing() {
        let s = Series::new("x".into(), &[Some(1.0), None, Some(f64::NAN), Some(4.0)]);
        let values = numeric_values(&s).unwrap();
        assert_eq!(values, vec![Some(1.0), None, None, Some(4.0)]);
    }

    #[test]
    fn test_string_values_from_integers() {
        let s = Series::new("code".into(), &[1i64, 2, 3]);
        let values = string_values(&s).unwrap();
        assert_eq!(values, vec![Some("1".to_string()), Some("2".to_string()), Some("3".to_string())]);
    }

    #[test]
    fn test_float_chunked_keeps_name_and_length() {
        let s = Series::new("amount".into(), &[Some(2i64), None, Some(5)]);
        let ca = float_chunked(&s).unwrap();
        assert_eq!(ca.name().as_str(), "amount");
        assert_eq!(ca.len(), 3);
        assert_eq!(ca.null_count(), 1);
    }

    #[test]
    fn test_n_distinct_ignores_missing() {
        let s = float_chunked(&Series::new("x".into(), &[Some(1.0), Some(f64::NAN), None, Some(1.0), Some(2.0)]))
            .unwrap()
            .into_series();
        assert_eq!(n_distinct(&s).unwrap(), 2);

        let s = Series::new("c".into(), &[Some("a"), None, Some("b"), Some("a")]);
        assert_eq!(n_distinct(&s).unwrap(), 2);
    }

    #[test]
    fn test_sample_variance() {
        let ca = Float64Chunked::from_slice("x".into(), &[1.0, 2.0, 3.0, 4.0, 5.0]);
        let v = sample_variance(&ca).unwrap();
        assert!((v - 2.5).abs() < 1e-12);

        let single = Float64Chunked::from_slice_options("x".into(), &[Some(1.0), None]);
        assert!(sample_variance(&single).is_none());
    }

    #[test]
    fn test_dtype_classification() {
        assert!(is_numeric_dtype(&DataType::Boolean));
        assert!(is_numeric_dtype(&DataType::Float32));
        assert!(!is_numeric_dtype(&DataType::String));
        assert!(is_integer_dtype(&DataType::UInt16));
        assert!(!is_integer_dtype(&DataType::Float64));
    }
}
