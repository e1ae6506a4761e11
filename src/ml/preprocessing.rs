use crate::error::{AppError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Maps string categories to contiguous integer codes.
///
/// Classes are kept sorted, so the code of a category is its rank among
/// all categories seen during fitting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LabelEncoder {
    /// Column this encoder was fitted on, used in error messages
    field: String,

    /// Sorted unique classes
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Fit on the observed values of a column
    pub fn fit<I, S>(field: &str, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let classes: BTreeSet<String> = values
            .into_iter()
            .map(|v| v.as_ref().trim().to_string())
            .collect();

        if classes.is_empty() {
            return Err(AppError::Dataset(format!(
                "cannot fit encoder for '{}' on an empty column",
                field
            )));
        }

        Ok(Self {
            field: field.to_string(),
            classes: classes.into_iter().collect(),
        })
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    /// Encode one category
    pub fn transform(&self, value: &str) -> Result<usize> {
        let value = value.trim();
        self.classes
            .binary_search_by(|c| c.as_str().cmp(value))
            .map_err(|_| AppError::UnknownCategory {
                field: self.field.clone(),
                value: value.to_string(),
            })
    }

    /// Encode a whole column
    pub fn transform_all<I, S>(&self, values: I) -> Result<Vec<usize>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        values
            .into_iter()
            .map(|v| self.transform(v.as_ref()))
            .collect()
    }

    /// Decode one code back to its category
    pub fn inverse_transform(&self, code: usize) -> Result<&str> {
        self.classes.get(code).map(String::as_str).ok_or_else(|| {
            AppError::Model(format!(
                "label {} out of range for '{}' encoder with {} classes",
                code,
                self.field,
                self.classes.len()
            ))
        })
    }
}

/// Standardizes features to zero mean and unit variance.
///
/// Uses the population standard deviation; constant columns get a scale
/// of 1 so they pass through centred but unscaled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StandardScaler {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl StandardScaler {
    /// Learn per-column mean and scale from a training matrix
    pub fn fit(x: &Array2<f64>) -> Result<Self> {
        if x.nrows() == 0 {
            return Err(AppError::Dataset(
                "cannot fit scaler on an empty matrix".to_string(),
            ));
        }

        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| AppError::Dataset("cannot compute column means".to_string()))?;
        let scale = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s == 0.0 || !s.is_finite() { 1.0 } else { s });

        Ok(Self { mean, scale })
    }

    /// Number of columns the scaler was fitted on
    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    pub fn scale(&self) -> &Array1<f64> {
        &self.scale
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.n_features() {
            return Err(AppError::Model(format!(
                "X has {} features, but StandardScaler is expecting {} features as input",
                x.ncols(),
                self.n_features()
            )));
        }

        Ok((x - &self.mean) / &self.scale)
    }
}
