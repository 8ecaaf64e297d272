//! Sliding windows over a transformed feature matrix for sequence models

use crate::error::{DafuError, Result};
use ndarray::{s, Array2, Array3};

/// Fixed-length windows of consecutive rows.
///
/// Window `k` covers rows `[i - length, i)` with `i = k + length`, and its
/// label (when labels are given) is the label of row `i`.
#[derive(Debug, Clone)]
pub struct SequenceWindows {
    /// Shape `(n_windows, length, n_features)`
    pub windows: Array3<f64>,
    pub labels: Option<Vec<bool>>,
    pub length: usize,
}

impl SequenceWindows {
    /// Build windows from an already-transformed matrix
    pub fn from_matrix(
        features: &Array2<f64>,
        labels: Option<&[bool]>,
        length: usize,
    ) -> Result<Self> {
        let n_rows = features.nrows();
        if length == 0 {
            return Err(DafuError::invalid_parameter(
                "sequence_length",
                length,
                "must be at least 1",
            ));
        }
        if length >= n_rows {
            return Err(DafuError::invalid_parameter(
                "sequence_length",
                length,
                format!("must be smaller than the number of rows ({})", n_rows),
            ));
        }
        if let Some(labels) = labels {
            if labels.len() != n_rows {
                return Err(DafuError::ShapeError {
                    expected: format!("{} labels", n_rows),
                    actual: format!("{} labels", labels.len()),
                });
            }
        }

        let n_windows = n_rows - length;
        let mut windows = Array3::<f64>::zeros((n_windows, length, features.ncols()));
        for k in 0..n_windows {
            windows
                .slice_mut(s![k, .., ..])
                .assign(&features.slice(s![k..k + length, ..]));
        }

        Ok(Self {
            windows,
            labels: labels.map(|l| l[length..].to_vec()),
            length,
        })
    }

    pub fn len(&self) -> usize {
        self.windows.shape()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_windows_and_labels() {
        let features = array![[0.0, 10.0], [1.0, 11.0], [2.0, 12.0], [3.0, 13.0], [4.0, 14.0]];
        let labels = [false, false, true, false, true];

        let seq = SequenceWindows::from_matrix(&features, Some(&labels), 2).unwrap();
        assert_eq!(seq.windows.shape(), &[3, 2, 2]);
        assert_eq!(seq.windows[[0, 0, 0]], 0.0);
        assert_eq!(seq.windows[[0, 1, 1]], 11.0);
        assert_eq!(seq.windows[[2, 1, 0]], 3.0);
        assert_eq!(seq.labels.unwrap(), vec![true, false, true]);
    }

    #[test]
    fn test_length_must_fit_rows() {
        let features = Array2::<f64>::zeros((3, 1));
        assert!(SequenceWindows::from_matrix(&features, None, 3).is_err());
        assert!(SequenceWindows::from_matrix(&features, None, 0).is_err());
    }
}
