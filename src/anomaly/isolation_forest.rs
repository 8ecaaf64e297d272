//! Isolation Forest anomaly detection

use crate::anomaly::AnomalyDetector;
use crate::error::{DafuError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand::seq::index;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

const EULER_GAMMA: f64 = 0.5772156649015329;

/// Rows drawn to build each tree
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaxSamples {
    /// `min(256, n_rows)`
    Auto,
    /// Fixed number of rows, capped at `n_rows`
    Count(usize),
    /// Fraction of rows in (0, 1]
    Fraction(f64),
}

impl Default for MaxSamples {
    fn default() -> Self {
        MaxSamples::Auto
    }
}

impl MaxSamples {
    /// Resolve against the number of training rows
    pub fn resolve(&self, n_rows: usize) -> usize {
        let n = match *self {
            MaxSamples::Auto => n_rows.min(256),
            MaxSamples::Count(c) => c.min(n_rows),
            MaxSamples::Fraction(f) => (f * n_rows as f64) as usize,
        };
        n.max(1)
    }
}

/// Hyperparameters of an isolation forest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationForestParams {
    pub n_estimators: usize,
    pub max_samples: MaxSamples,
    /// Fraction of features considered by each tree
    pub max_features: f64,
    /// Draw rows with replacement
    pub bootstrap: bool,
    /// Expected share of anomalies, sets the decision offset
    pub contamination: f64,
    pub seed: u64,
}

impl Default for IsolationForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_samples: MaxSamples::Auto,
            max_features: 1.0,
            bootstrap: false,
            contamination: 0.1,
            seed: 42,
        }
    }
}

/// Isolation Tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IsolationTree {
    /// Internal node with split
    Internal {
        /// Feature index for split
        feature: usize,
        /// Split threshold
        threshold: f64,
        /// Left subtree (values < threshold)
        left: Box<IsolationTree>,
        /// Right subtree (values >= threshold)
        right: Box<IsolationTree>,
    },
    /// External (leaf) node
    External {
        /// Number of samples in this node
        size: usize,
    },
}

impl IsolationTree {
    /// Build an isolation tree over `indices`, splitting only on `features`
    pub fn build(
        x: &Array2<f64>,
        indices: &[usize],
        features: &[usize],
        height: usize,
        max_height: usize,
        rng: &mut impl Rng,
    ) -> Self {
        let n_samples = indices.len();

        if height >= max_height || n_samples <= 1 || features.is_empty() {
            return IsolationTree::External { size: n_samples };
        }

        let feature = features[rng.gen_range(0..features.len())];

        let (min_val, max_val) = indices
            .iter()
            .map(|&i| x[[i, feature]])
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });

        // Constant on this feature within the node
        if !(max_val - min_val > 1e-10) {
            return IsolationTree::External { size: n_samples };
        }

        let threshold = rng.gen_range(min_val..max_val);

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, feature]] < threshold);

        if left_indices.is_empty() || right_indices.is_empty() {
            return IsolationTree::External { size: n_samples };
        }

        let left = Box::new(Self::build(x, &left_indices, features, height + 1, max_height, rng));
        let right = Box::new(Self::build(x, &right_indices, features, height + 1, max_height, rng));

        IsolationTree::Internal {
            feature,
            threshold,
            left,
            right,
        }
    }

    /// Path length of a sample, with the leaf-size correction `c(size)`
    pub fn path_length(&self, sample: ArrayView1<f64>, current_height: usize) -> f64 {
        match self {
            IsolationTree::External { size } => current_height as f64 + average_path_length(*size),
            IsolationTree::Internal {
                feature,
                threshold,
                left,
                right,
            } => {
                if sample[*feature] < *threshold {
                    left.path_length(sample, current_height + 1)
                } else {
                    right.path_length(sample, current_height + 1)
                }
            }
        }
    }
}

/// Average path length of an unsuccessful BST search over `n` items:
/// `c(n) = 2 H(n-1) - 2(n-1)/n` with `H(i) ~ ln(i) + gamma`
pub(crate) fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n_f = n as f64;
            2.0 * ((n_f - 1.0).ln() + EULER_GAMMA) - 2.0 * (n_f - 1.0) / n_f
        }
    }
}

/// Linear-interpolated percentile, `q` in [0, 100]
fn percentile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let rank = (q / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

/// Isolation Forest anomaly detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationForest {
    params: IsolationForestParams,
    trees: Vec<IsolationTree>,
    /// Rows per tree actually used at fit time
    samples_per_tree: usize,
    n_features: usize,
    /// Contamination percentile of training scores
    offset: f64,
    fitted: bool,
}

impl IsolationForest {
    /// Create an unfitted forest
    pub fn new(params: IsolationForestParams) -> Self {
        Self {
            params,
            trees: Vec::new(),
            samples_per_tree: 0,
            n_features: 0,
            offset: 0.0,
            fitted: false,
        }
    }

    pub fn params(&self) -> &IsolationForestParams {
        &self.params
    }

    pub fn contamination(&self) -> f64 {
        self.params.contamination
    }

    /// Threshold subtracted from `score_samples` in `decision_function`
    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn validate(&self) -> Result<()> {
        let p = &self.params;
        if p.n_estimators == 0 {
            return Err(DafuError::invalid_parameter("n_estimators", 0, "must be positive"));
        }
        if !(p.contamination > 0.0 && p.contamination < 1.0) {
            return Err(DafuError::invalid_parameter(
                "contamination",
                p.contamination,
                "must be in (0, 1)",
            ));
        }
        if !(p.max_features > 0.0 && p.max_features <= 1.0) {
            return Err(DafuError::invalid_parameter(
                "max_features",
                p.max_features,
                "must be in (0, 1]",
            ));
        }
        Ok(())
    }

    fn check_input(&self, x: &Array2<f64>) -> Result<()> {
        if !self.fitted {
            return Err(DafuError::DataError("isolation forest is not fitted".to_string()));
        }
        if x.ncols() != self.n_features {
            return Err(DafuError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(())
    }

    fn build_trees(&self, x: &Array2<f64>, samples_per_tree: usize) -> Vec<IsolationTree> {
        let n_rows = x.nrows();
        let n_features = x.ncols();
        let features_per_tree = ((self.params.max_features * n_features as f64) as usize)
            .clamp(1, n_features.max(1));
        let max_height = (samples_per_tree.max(2) as f64).log2().ceil() as usize;
        let bootstrap = self.params.bootstrap;

        // Seeds drawn up front so trees do not depend on thread scheduling
        let mut master = StdRng::seed_from_u64(self.params.seed);
        let seeds: Vec<u64> = (0..self.params.n_estimators).map(|_| master.gen()).collect();

        seeds
            .into_par_iter()
            .map(|seed| {
                let mut rng = StdRng::seed_from_u64(seed);

                let rows: Vec<usize> = if bootstrap {
                    (0..samples_per_tree)
                        .map(|_| rng.gen_range(0..n_rows))
                        .collect()
                } else {
                    index::sample(&mut rng, n_rows, samples_per_tree).into_vec()
                };

                let mut features = if features_per_tree == n_features {
                    (0..n_features).collect::<Vec<_>>()
                } else {
                    index::sample(&mut rng, n_features, features_per_tree).into_vec()
                };
                features.sort_unstable();

                IsolationTree::build(x, &rows, &features, 0, max_height, &mut rng)
            })
            .collect()
    }

    fn raw_scores(&self, x: &Array2<f64>) -> Array1<f64> {
        let c_n = average_path_length(self.samples_per_tree).max(f64::MIN_POSITIVE);
        let n_trees = self.trees.len() as f64;

        let scores: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let row = x.row(i);
                let avg_path: f64 = self
                    .trees
                    .iter()
                    .map(|tree| tree.path_length(row, 0))
                    .sum::<f64>()
                    / n_trees;
                // s(x, n) = 2^(-E[h(x)] / c(n)), negated so lower means more anomalous
                -(2.0_f64.powf(-avg_path / c_n))
            })
            .collect();

        Array1::from_vec(scores)
    }
}

impl AnomalyDetector for IsolationForest {
    fn fit(&mut self, x: &Array2<f64>) -> Result<()> {
        self.validate()?;
        let n_rows = x.nrows();
        if n_rows == 0 || x.ncols() == 0 {
            return Err(DafuError::DataError(format!(
                "cannot fit isolation forest on a {}x{} matrix",
                n_rows,
                x.ncols()
            )));
        }

        let samples_per_tree = self.params.max_samples.resolve(n_rows).min(n_rows);
        self.trees = self.build_trees(x, samples_per_tree);
        self.samples_per_tree = samples_per_tree;
        self.n_features = x.ncols();
        self.fitted = true;

        let scores = self.raw_scores(x);
        self.offset = percentile(&scores.to_vec(), 100.0 * self.params.contamination);

        debug!(
            trees = self.trees.len(),
            samples_per_tree,
            contamination = self.params.contamination,
            offset = self.offset,
            "Isolation forest fitted"
        );
        Ok(())
    }

    fn score_samples(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.check_input(x)?;
        Ok(self.raw_scores(x))
    }

    fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.score_samples(x)? - self.offset)
    }

    fn is_fitted(&self) -> bool {
        self.fitted
    }
}
