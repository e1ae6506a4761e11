use crate::error::{AppError, Result};
use crate::ml::forest::RandomForest;
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-class evaluation metrics
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassMetrics {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

/// Averaged precision/recall/F1
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct AveragedMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
}

/// Held-out evaluation of a classifier
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ModelMetrics {
    /// Accuracy
    pub accuracy: f64,

    /// Unweighted mean over classes
    pub macro_avg: AveragedMetrics,

    /// Mean over classes weighted by support
    pub weighted_avg: AveragedMetrics,

    /// Rows are true labels, columns predicted labels
    pub confusion_matrix: Vec<Vec<usize>>,

    /// Per-class metrics in label order
    pub per_class: Vec<ClassMetrics>,

    /// Number of evaluated samples
    pub n_samples: usize,
}

impl ModelMetrics {
    /// Score predictions against ground truth. `labels[i]` names class `i`.
    pub fn calculate(y_true: &[usize], y_pred: &[usize], labels: &[String]) -> Result<Self> {
        if y_true.len() != y_pred.len() {
            return Err(AppError::Model(format!(
                "Found input variables with inconsistent numbers of samples: [{}, {}]",
                y_true.len(),
                y_pred.len()
            )));
        }

        let n_classes = labels.len();
        let n_samples = y_true.len();
        if n_samples == 0 {
            return Ok(Self::default());
        }

        let mut confusion = vec![vec![0usize; n_classes]; n_classes];
        for (&t, &p) in y_true.iter().zip(y_pred) {
            if t >= n_classes || p >= n_classes {
                return Err(AppError::Model(format!(
                    "label out of range for {} classes",
                    n_classes
                )));
            }
            confusion[t][p] += 1;
        }

        let correct: usize = (0..n_classes).map(|c| confusion[c][c]).sum();
        let accuracy = correct as f64 / n_samples as f64;

        let per_class: Vec<ClassMetrics> = labels
            .iter()
            .enumerate()
            .map(|(class_idx, label)| {
                let tp = confusion[class_idx][class_idx];
                let support: usize = confusion[class_idx].iter().sum();
                let predicted: usize = confusion.iter().map(|row| row[class_idx]).sum();

                let precision = if predicted > 0 {
                    tp as f64 / predicted as f64
                } else {
                    0.0
                };

                let recall = if support > 0 {
                    tp as f64 / support as f64
                } else {
                    0.0
                };

                let f1_score = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };

                ClassMetrics {
                    label: label.clone(),
                    precision,
                    recall,
                    f1_score,
                    support,
                }
            })
            .collect();

        let macro_avg = if n_classes > 0 {
            let n = n_classes as f64;
            AveragedMetrics {
                precision: per_class.iter().map(|m| m.precision).sum::<f64>() / n,
                recall: per_class.iter().map(|m| m.recall).sum::<f64>() / n,
                f1_score: per_class.iter().map(|m| m.f1_score).sum::<f64>() / n,
            }
        } else {
            AveragedMetrics::default()
        };

        let total = n_samples as f64;
        let weighted_avg = AveragedMetrics {
            precision: per_class.iter().map(|m| m.precision * m.support as f64).sum::<f64>() / total,
            recall: per_class.iter().map(|m| m.recall * m.support as f64).sum::<f64>() / total,
            f1_score: per_class.iter().map(|m| m.f1_score * m.support as f64).sum::<f64>() / total,
        };

        Ok(Self {
            accuracy,
            macro_avg,
            weighted_avg,
            confusion_matrix: confusion,
            per_class,
            n_samples,
        })
    }
}

/// Renders a classification report in the familiar tabular layout
impl fmt::Display for ModelMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .per_class
            .iter()
            .map(|m| m.label.len())
            .chain(std::iter::once("weighted avg".len()))
            .max()
            .unwrap_or(12);

        writeln!(
            f,
            "{:>width$} {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        writeln!(f)?;
        for m in &self.per_class {
            writeln!(
                f,
                "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                m.label, m.precision, m.recall, m.f1_score, m.support
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>width$} {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.n_samples
        )?;
        for (name, avg) in [("macro avg", &self.macro_avg), ("weighted avg", &self.weighted_avg)] {
            writeln!(
                f,
                "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                name, avg.precision, avg.recall, avg.f1_score, self.n_samples
            )?;
        }
        Ok(())
    }
}

/// Mean accuracy drop when a feature is shuffled
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Permutation importance on a held-out set, most important first.
///
/// Each column is shuffled `n_repeats` times; the importance is the mean
/// drop in accuracy relative to the unshuffled baseline.
pub fn permutation_importance(
    model: &RandomForest,
    x: &Array2<f64>,
    y: &[usize],
    feature_names: &[String],
    n_repeats: usize,
    seed: u64,
) -> Result<Vec<FeatureImportance>> {
    if feature_names.len() != x.ncols() {
        return Err(AppError::Model(format!(
            "{} feature names given for {} columns",
            feature_names.len(),
            x.ncols()
        )));
    }
    if x.nrows() == 0 || n_repeats == 0 {
        return Ok(Vec::new());
    }

    let baseline = accuracy(y, &model.predict(x)?);
    let mut rng = StdRng::seed_from_u64(seed);
    let mut importances = Vec::with_capacity(x.ncols());

    for (col, name) in feature_names.iter().enumerate() {
        let mut drop_sum = 0.0;
        for _ in 0..n_repeats {
            let mut shuffled = x.clone();
            let mut column: Vec<f64> = x.column(col).to_vec();
            column.shuffle(&mut rng);
            shuffled.column_mut(col).assign(&Array1::from(column));
            drop_sum += baseline - accuracy(y, &model.predict(&shuffled)?);
        }

        importances.push(FeatureImportance {
            feature: name.clone(),
            importance: drop_sum / n_repeats as f64,
        });
    }

    importances.sort_by(|a, b| {
        b.importance
            .partial_cmp(&a.importance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    Ok(importances)
}

fn accuracy(y_true: &[usize], y_pred: &[usize]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    correct as f64 / y_true.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::forest::ForestParams;

    fn labels() -> Vec<String> {
        vec!["A".to_string(), "B".to_string(), "C".to_string()]
    }

    #[test]
    fn test_metrics_from_confusion() {
        let y_true = vec![0, 0, 1, 1, 2, 2];
        let y_pred = vec![0, 1, 1, 1, 2, 0];
        let metrics = ModelMetrics::calculate(&y_true, &y_pred, &labels()).unwrap();

        assert!((metrics.accuracy - 4.0 / 6.0).abs() < 1e-9);
        assert_eq!(metrics.confusion_matrix[0], vec![1, 1, 0]);
        assert_eq!(metrics.confusion_matrix[2], vec![1, 0, 1]);

        let b = &metrics.per_class[1];
        assert_eq!(b.label, "B");
        assert!((b.precision - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(b.recall, 1.0);
        assert_eq!(b.support, 2);
    }

    #[test]
    fn test_weighted_average_uses_support() {
        let y_true = vec![0, 0, 0, 1];
        let y_pred = vec![0, 0, 0, 0];
        let names = vec!["A".to_string(), "B".to_string()];
        let metrics = ModelMetrics::calculate(&y_true, &y_pred, &names).unwrap();

        assert!((metrics.macro_avg.recall - 0.5).abs() < 1e-9);
        assert!((metrics.weighted_avg.recall - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_metrics_reject_length_mismatch() {
        assert!(ModelMetrics::calculate(&[0, 1], &[0], &labels()).is_err());
    }

    #[test]
    fn test_report_lists_every_class() {
        let metrics = ModelMetrics::calculate(&[0, 1, 2], &[0, 1, 2], &labels()).unwrap();
        let report = metrics.to_string();
        assert!(report.contains("precision"));
        assert!(report.contains("macro avg"));
        assert!(report.contains("weighted avg"));
        for label in labels() {
            assert!(report.contains(&label));
        }
    }

    #[test]
    fn test_permutation_importance_finds_informative_column() {
        // column 0 decides the class, column 1 is noise
        let n = 40;
        let mut x = Array2::zeros((n, 2));
        let mut y = Vec::with_capacity(n);
        for i in 0..n {
            let class = i % 2;
            x[[i, 0]] = class as f64 * 10.0;
            x[[i, 1]] = ((i * 7) % 5) as f64;
            y.push(class);
        }
        let params = ForestParams {
            n_estimators: 10,
            max_depth: 3,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: 1.0,
            seed: 1,
        };
        let forest = RandomForest::fit(&x, &y, 2, params).unwrap();
        let names = vec!["signal".to_string(), "noise".to_string()];
        let ranked = permutation_importance(&forest, &x, &y, &names, 3, 42).unwrap();

        assert_eq!(ranked[0].feature, "signal");
        assert!(ranked[0].importance > ranked[1].importance);
    }
}
