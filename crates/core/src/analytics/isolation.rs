//! One-dimensional isolation forest.
//!
//! Points that are separated from the rest by few random splits are scored as
//! outliers. The forest is grown from a seeded RNG so the same input always
//! yields the same labels.

use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};

use crate::errors::AnalyticsError;

const MAX_SUBSAMPLE: usize = 256;
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IsolationForestParams {
    pub trees: usize,
    /// Expected share of outliers; sets the score cut-off.
    pub contamination: f64,
    pub seed: u64,
}

impl Default for IsolationForestParams {
    fn default() -> Self {
        Self { trees: 100, contamination: 0.2, seed: 42 }
    }
}

#[derive(Debug)]
enum Node {
    Leaf { size: usize },
    Split { threshold: f64, left: Box<Node>, right: Box<Node> },
}

impl Node {
    fn grow(values: &[f64], depth: usize, max_depth: usize, rng: &mut StdRng) -> Self {
        if depth >= max_depth || values.len() <= 1 {
            return Node::Leaf { size: values.len() };
        }

        let (min, max) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        if min >= max {
            return Node::Leaf { size: values.len() };
        }

        let threshold = rng.gen_range(min..max);
        let (left, right): (Vec<f64>, Vec<f64>) = values.iter().partition(|&&v| v < threshold);

        Node::Split {
            threshold,
            left: Box::new(Node::grow(&left, depth + 1, max_depth, rng)),
            right: Box::new(Node::grow(&right, depth + 1, max_depth, rng)),
        }
    }

    fn path_length(&self, value: f64) -> f64 {
        let mut node = self;
        let mut depth = 0.0;
        loop {
            match node {
                Node::Leaf { size } => return depth + average_path_length(*size),
                Node::Split { threshold, left, right } => {
                    node = if value < *threshold { left } else { right };
                    depth += 1.0;
                }
            }
        }
    }
}

/// Expected path length of an unsuccessful search in a binary tree of `n`
/// points; the normaliser for isolation depths.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Linear-interpolated percentile of `values` (`q` in `[0, 1]`).
fn percentile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let rank = q * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

#[derive(Debug)]
pub struct IsolationForest {
    trees: Vec<Node>,
    subsample: usize,
}

impl IsolationForest {
    pub fn fit(values: &[f64], params: &IsolationForestParams) -> Result<Self, AnalyticsError> {
        if values.len() < 2 {
            return Err(AnalyticsError::InsufficientData { required: 2, available: values.len() });
        }
        if values.iter().any(|value| !value.is_finite()) {
            return Err(AnalyticsError::ComputationFailure(
                "isolation forest input must be finite".to_string(),
            ));
        }

        let mut rng = StdRng::seed_from_u64(params.seed);
        let subsample = values.len().min(MAX_SUBSAMPLE);
        let max_depth = (subsample as f64).log2().ceil() as usize;

        let trees = (0..params.trees.max(1))
            .map(|_| {
                let drawn: Vec<f64> =
                    sample(&mut rng, values.len(), subsample).into_iter().map(|i| values[i]).collect();
                Node::grow(&drawn, 0, max_depth, &mut rng)
            })
            .collect();

        Ok(Self { trees, subsample })
    }

    /// Anomaly score in `(0, 1]`; larger is more isolated.
    pub fn score(&self, value: f64) -> f64 {
        let mean_path = self.trees.iter().map(|tree| tree.path_length(value)).sum::<f64>()
            / self.trees.len() as f64;
        2f64.powf(-mean_path / average_path_length(self.subsample))
    }

    /// Fits a forest on `values` and labels each one; `true` marks an outlier.
    ///
    /// A point is an outlier when its normality (negated score) is strictly
    /// below the `contamination` percentile of all normalities, so ties at the
    /// cut-off stay inliers.
    pub fn fit_predict(
        values: &[f64],
        params: &IsolationForestParams,
    ) -> Result<Vec<bool>, AnalyticsError> {
        let forest = Self::fit(values, params)?;
        let normality: Vec<f64> = values.iter().map(|&value| -forest.score(value)).collect();
        let offset = percentile(&normality, params.contamination);

        Ok(normality.iter().map(|&value| value < offset).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::{average_path_length, percentile, IsolationForest, IsolationForestParams};
    use crate::errors::AnalyticsError;

    #[test]
    fn average_path_length_matches_known_values() {
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        assert!((average_path_length(256) - 10.244_770_920_119_917).abs() < 1e-9);
    }

    #[test]
    fn percentile_interpolates_between_ranks() {
        let values = [4.0, 1.0, 3.0, 2.0, 5.0];

        assert_eq!(percentile(&values, 0.0), 1.0);
        assert_eq!(percentile(&values, 1.0), 5.0);
        assert!((percentile(&values, 0.2) - 1.8).abs() < 1e-12);
    }

    #[test]
    fn isolated_values_score_higher_than_the_cluster() {
        let mut values: Vec<f64> = (0..40).map(|i| 10.0 + (i % 5) as f64).collect();
        values.push(300.0);

        let forest =
            IsolationForest::fit(&values, &IsolationForestParams::default()).expect("forest");

        assert!(forest.score(300.0) > forest.score(12.0));
    }

    #[test]
    fn identical_values_are_never_flagged() {
        let labels =
            IsolationForest::fit_predict(&[6.0; 8], &IsolationForestParams::default()).expect("fit");

        assert!(labels.iter().all(|outlier| !outlier));
    }

    #[test]
    fn same_seed_gives_same_labels() {
        let values: Vec<f64> = (0..60).map(|i| ((i * 37) % 23) as f64).collect();
        let params = IsolationForestParams { seed: 9, ..IsolationForestParams::default() };

        let first = IsolationForest::fit_predict(&values, &params).expect("fit");
        let second = IsolationForest::fit_predict(&values, &params).expect("fit");

        assert_eq!(first, second);
    }

    #[test]
    fn roughly_contamination_share_is_flagged_on_large_samples() {
        let values: Vec<f64> = (0..100).map(|i| i as f64).collect();

        let labels =
            IsolationForest::fit_predict(&values, &IsolationForestParams::default()).expect("fit");
        let flagged = labels.iter().filter(|outlier| **outlier).count();

        assert!((10..=20).contains(&flagged), "flagged {flagged} of 100");
    }

    #[test]
    fn too_few_values_is_insufficient() {
        let result = IsolationForest::fit_predict(&[1.0], &IsolationForestParams::default());

        assert!(matches!(result, Err(AnalyticsError::InsufficientData { .. })));
    }
}
