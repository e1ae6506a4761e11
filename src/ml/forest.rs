use crate::config::TrainingConfig;
use crate::error::{AppError, Result};
use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::tree::decision_tree_classifier::{
    DecisionTreeClassifier, DecisionTreeClassifierParameters, SplitCriterion,
};
use std::fmt;

type Tree = DecisionTreeClassifier<f64, i32, DenseMatrix<f64>, Vec<i32>>;

/// Random forest hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: u16,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Fraction of features each tree is grown on
    pub max_features: f64,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 10,
            min_samples_split: 5,
            min_samples_leaf: 2,
            max_features: 0.7,
            seed: 42,
        }
    }
}

impl From<&TrainingConfig> for ForestParams {
    fn from(config: &TrainingConfig) -> Self {
        Self {
            n_estimators: config.n_estimators,
            max_depth: config.max_depth,
            min_samples_split: config.min_samples_split,
            min_samples_leaf: config.min_samples_leaf,
            max_features: config.max_features,
            seed: config.random_state,
        }
    }
}

impl ForestParams {
    /// CART parameters for tree `index`, seeded with `seed + index`
    fn tree_parameters(&self, index: usize) -> DecisionTreeClassifierParameters {
        let mut parameters = DecisionTreeClassifierParameters::default()
            .with_criterion(SplitCriterion::Gini)
            .with_max_depth(self.max_depth)
            .with_min_samples_split(self.min_samples_split)
            .with_min_samples_leaf(self.min_samples_leaf);
        parameters.seed = Some(self.member_seed(index));
        parameters
    }

    fn member_seed(&self, index: usize) -> u64 {
        self.seed.wrapping_add(index as u64)
    }

    fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(AppError::Configuration(
                "n_estimators must be at least 1".to_string(),
            ));
        }
        if !(self.max_features > 0.0 && self.max_features <= 1.0) {
            return Err(AppError::Configuration(format!(
                "max_features must be in (0, 1], got {}",
                self.max_features
            )));
        }
        Ok(())
    }
}

/// One tree and the feature columns it was grown on
#[derive(Serialize, Deserialize)]
struct ForestMember {
    feature_indices: Vec<usize>,
    tree: Tree,
}

/// Bagged ensemble of CART trees with per-tree feature subspaces.
///
/// Each tree is fit on a bootstrap sample of the rows and a random subset
/// of the columns. Class probabilities are the fraction of trees voting
/// for each class.
#[derive(Serialize, Deserialize)]
pub struct RandomForest {
    params: ForestParams,
    n_features: usize,
    n_classes: usize,
    members: Vec<ForestMember>,
}

impl fmt::Debug for RandomForest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RandomForest")
            .field("params", &self.params)
            .field("n_features", &self.n_features)
            .field("n_classes", &self.n_classes)
            .field("n_trees", &self.members.len())
            .finish()
    }
}

impl RandomForest {
    /// Fit the forest. `y` holds encoded labels in `0..n_classes`.
    pub fn fit(
        x: &Array2<f64>,
        y: &[usize],
        n_classes: usize,
        params: ForestParams,
    ) -> Result<Self> {
        params.validate()?;

        if x.nrows() == 0 {
            return Err(AppError::Model("cannot fit on an empty matrix".to_string()));
        }
        if x.nrows() != y.len() {
            return Err(AppError::Model(format!(
                "feature matrix has {} rows but {} labels were given",
                x.nrows(),
                y.len()
            )));
        }
        if let Some(bad) = y.iter().find(|&&label| label >= n_classes) {
            return Err(AppError::Model(format!(
                "label {} out of range for {} classes",
                bad, n_classes
            )));
        }

        let members = (0..params.n_estimators)
            .into_par_iter()
            .map(|i| fit_member(x, y, &params, i))
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            n_trees = members.len(),
            n_features = x.ncols(),
            n_classes,
            "Random forest fitted"
        );

        Ok(Self {
            params,
            n_features: x.ncols(),
            n_classes,
            members,
        })
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn n_trees(&self) -> usize {
        self.members.len()
    }

    /// Per-class probabilities, one row per sample; rows sum to 1.
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.n_features {
            return Err(AppError::Model(format!(
                "X has {} features, but RandomForest is expecting {} features as input",
                x.ncols(),
                self.n_features
            )));
        }

        let mut votes = Array2::<f64>::zeros((x.nrows(), self.n_classes));
        for member in &self.members {
            let subset = x.select(Axis(1), &member.feature_indices);
            let predictions = member.tree.predict(&to_dense_matrix(&subset))?;
            for (row, label) in predictions.into_iter().enumerate() {
                let class = label as usize;
                if class < self.n_classes {
                    votes[[row, class]] += 1.0;
                }
            }
        }

        let n_trees = self.members.len().max(1) as f64;
        Ok(votes / n_trees)
    }

    /// Most probable class per sample; ties go to the lower label.
    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>> {
        let proba = self.predict_proba(x)?;
        Ok(proba.outer_iter().map(|row| argmax(row.iter().copied())).collect())
    }
}

fn fit_member(
    x: &Array2<f64>,
    y: &[usize],
    params: &ForestParams,
    index: usize,
) -> Result<ForestMember> {
    let mut rng = StdRng::seed_from_u64(params.member_seed(index));
    let n_rows = x.nrows();
    let n_features = x.ncols();

    let rows: Vec<usize> = (0..n_rows).map(|_| rng.gen_range(0..n_rows)).collect();

    let n_subspace = ((params.max_features * n_features as f64).ceil() as usize).clamp(1, n_features);
    let mut feature_indices = rand::seq::index::sample(&mut rng, n_features, n_subspace).into_vec();
    feature_indices.sort_unstable();

    let sample = x.select(Axis(0), &rows).select(Axis(1), &feature_indices);
    let labels: Vec<i32> = rows.iter().map(|&r| y[r] as i32).collect();

    let tree = Tree::fit(&to_dense_matrix(&sample), &labels, params.tree_parameters(index))
        .map_err(|e| AppError::Model(format!("Failed to train tree {}: {}", index, e)))?;

    Ok(ForestMember {
        feature_indices,
        tree,
    })
}

fn to_dense_matrix(arr: &Array2<f64>) -> DenseMatrix<f64> {
    let data: Vec<f64> = arr.iter().copied().collect();
    DenseMatrix::new(arr.nrows(), arr.ncols(), data, false)
}

/// Index of the largest value, first one wins on ties
pub(crate) fn argmax<I: IntoIterator<Item = f64>>(values: I) -> usize {
    let mut best_idx = 0;
    let mut best = f64::NEG_INFINITY;
    for (idx, value) in values.into_iter().enumerate() {
        if value > best {
            best = value;
            best_idx = idx;
        }
    }
    best_idx
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two well-separated blobs plus a third class on a different axis
    fn blobs(n_per_class: usize) -> (Array2<f64>, Vec<usize>) {
        let mut rng = StdRng::seed_from_u64(3);
        let centers = [[0.0, 0.0, 0.0], [8.0, 8.0, 0.0], [0.0, 8.0, 8.0]];
        let n = n_per_class * centers.len();
        let mut x = Array2::zeros((n, 3));
        let mut y = Vec::with_capacity(n);
        for (class, center) in centers.iter().enumerate() {
            for i in 0..n_per_class {
                let row = class * n_per_class + i;
                for j in 0..3 {
                    x[[row, j]] = center[j] + rng.gen_range(-1.0..1.0);
                }
                y.push(class);
            }
        }
        (x, y)
    }

    fn small_params() -> ForestParams {
        ForestParams {
            n_estimators: 15,
            max_depth: 5,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: 1.0,
            seed: 42,
        }
    }

    #[test]
    fn test_forest_learns_separable_classes() {
        let (x, y) = blobs(30);
        let forest = RandomForest::fit(&x, &y, 3, small_params()).unwrap();

        assert_eq!(forest.n_trees(), 15);
        let predictions = forest.predict(&x).unwrap();
        let correct = predictions.iter().zip(&y).filter(|(p, t)| p == t).count();
        assert!(correct as f64 / y.len() as f64 > 0.95);
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let (x, y) = blobs(20);
        let forest = RandomForest::fit(&x, &y, 3, small_params()).unwrap();
        let proba = forest.predict_proba(&x).unwrap();

        assert_eq!(proba.shape(), &[60, 3]);
        for row in proba.outer_iter() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_fit_is_deterministic_for_seed() {
        let (x, y) = blobs(15);
        let params = ForestParams {
            max_features: 0.67,
            ..small_params()
        };
        let a = RandomForest::fit(&x, &y, 3, params.clone()).unwrap();
        let b = RandomForest::fit(&x, &y, 3, params).unwrap();
        assert_eq!(a.predict_proba(&x).unwrap(), b.predict_proba(&x).unwrap());
    }

    #[test]
    fn test_rejects_width_mismatch_and_bad_labels() {
        let (x, y) = blobs(10);
        let forest = RandomForest::fit(&x, &y, 3, small_params()).unwrap();
        assert!(forest.predict_proba(&Array2::zeros((1, 2))).is_err());

        assert!(RandomForest::fit(&x, &y, 2, small_params()).is_err());
        let bad = ForestParams {
            max_features: 0.0,
            ..small_params()
        };
        assert!(RandomForest::fit(&x, &y, 3, bad).is_err());
    }

    #[test]
    fn test_forest_survives_bincode_round_trip() {
        let (x, y) = blobs(10);
        let forest = RandomForest::fit(&x, &y, 3, small_params()).unwrap();
        let bytes = bincode::serialize(&forest).unwrap();
        let restored: RandomForest = bincode::deserialize(&bytes).unwrap();
        assert_eq!(
            forest.predict_proba(&x).unwrap(),
            restored.predict_proba(&x).unwrap()
        );
    }

    #[test]
    fn test_each_tree_gets_its_own_seed() {
        let params = small_params();
        assert_eq!(params.tree_parameters(0).seed, Some(42));
        assert_eq!(params.tree_parameters(3).seed, Some(45));
        assert_eq!(params.tree_parameters(3).max_depth, Some(5));
    }

    #[test]
    fn test_argmax_prefers_first_on_ties() {
        assert_eq!(argmax(vec![0.2, 0.4, 0.4]), 1);
        assert_eq!(argmax(vec![1.0]), 0);
    }
}
