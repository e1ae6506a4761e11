use crate::error::{AppError, Result};
use crate::ml::preprocessing::LabelEncoder;
use crate::models::{FeatureDict, GENDER_FIELD, TARGET_FIELD};
use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::debug;

/// One parsed dataset row
#[derive(Debug, Clone, PartialEq)]
pub struct PatientRecord {
    /// Numeric columns by header name
    pub values: HashMap<String, f64>,

    /// Raw gender category
    pub gender: String,

    /// Diagnosis label
    pub diagnosis: String,
}

impl PatientRecord {
    pub fn value(&self, column: &str) -> Option<f64> {
        self.values.get(column).copied()
    }
}

/// Labelled patient records read from a CSV file
#[derive(Debug, Clone)]
pub struct PatientDataset {
    headers: Vec<String>,
    records: Vec<PatientRecord>,
}

impl PatientDataset {
    /// Read a CSV file from disk
    pub fn load_csv(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(AppError::Dataset(format!(
                "'{}' not found! Make sure the CSV file exists at that path.",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        let dataset = Self::parse_csv(&content)?;

        debug!(
            path = %path.display(),
            rows = dataset.records.len(),
            columns = dataset.headers.len(),
            "Loaded dataset"
        );

        Ok(dataset)
    }

    /// Parse CSV text with a header row.
    ///
    /// `gender` and `diagnosis` are kept as strings; every other non-empty
    /// cell must parse as a number. Non-numeric extra columns (ids, notes)
    /// are ignored as long as they are non-numeric in every row.
    pub fn parse_csv(content: &str) -> Result<Self> {
        let mut lines = content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty());

        let (_, header_line) = lines
            .next()
            .ok_or_else(|| AppError::Dataset("dataset is empty".to_string()))?;

        let headers: Vec<String> = split_row(header_line)
            .into_iter()
            .map(|h| h.to_string())
            .collect();

        let gender_idx = column_index(&headers, GENDER_FIELD)?;
        let target_idx = column_index(&headers, TARGET_FIELD)?;

        let mut records = Vec::new();
        let mut text_columns: Vec<bool> = vec![false; headers.len()];

        for (line_no, line) in lines {
            let cells = split_row(line);
            if cells.len() != headers.len() {
                return Err(AppError::Dataset(format!(
                    "line {}: expected {} fields, found {}",
                    line_no + 1,
                    headers.len(),
                    cells.len()
                )));
            }

            let mut values = HashMap::with_capacity(headers.len());
            for (idx, cell) in cells.iter().enumerate() {
                if idx == gender_idx || idx == target_idx || cell.is_empty() {
                    continue;
                }
                match cell.parse::<f64>() {
                    Ok(v) => {
                        values.insert(headers[idx].clone(), v);
                    }
                    Err(_) => text_columns[idx] = true,
                }
            }

            records.push(PatientRecord {
                values,
                gender: cells[gender_idx].to_string(),
                diagnosis: cells[target_idx].to_string(),
            });
        }

        if records.is_empty() {
            return Err(AppError::Dataset("dataset has no data rows".to_string()));
        }

        // A text column is fine; a column mixing text and numbers is not.
        for (idx, is_text) in text_columns.iter().enumerate() {
            if *is_text && records.iter().any(|r| r.values.contains_key(&headers[idx])) {
                return Err(AppError::Dataset(format!(
                    "column '{}' mixes numeric and non-numeric values",
                    headers[idx]
                )));
            }
        }

        Ok(Self { headers, records })
    }

    pub fn records(&self) -> &[PatientRecord] {
        &self.records
    }

    /// (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        (self.records.len(), self.headers.len())
    }

    /// Diagnosis counts, most frequent first
    pub fn class_distribution(&self) -> Vec<(String, usize)> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for record in &self.records {
            *counts.entry(record.diagnosis.as_str()).or_default() += 1;
        }

        let mut distribution: Vec<(String, usize)> = counts
            .into_iter()
            .map(|(label, count)| (label.to_string(), count))
            .collect();
        distribution.sort_by(|a, b| b.1.cmp(&a.1));
        distribution
    }

    /// Build the feature matrix in the dictionary's column order.
    ///
    /// Every feature other than the gender slot must be present in every
    /// row; training does not impute.
    pub fn feature_matrix(
        &self,
        dict: &FeatureDict,
        gender_encoder: &LabelEncoder,
    ) -> Result<Array2<f64>> {
        let mut matrix = Array2::zeros((self.records.len(), dict.len()));

        for (row_idx, record) in self.records.iter().enumerate() {
            let gender_code = gender_encoder.transform(&record.gender)?;
            let row = dict.build_vector(gender_code, |name| {
                record.value(name).ok_or_else(|| {
                    AppError::Dataset(format!(
                        "row {}: missing value for feature '{}'",
                        row_idx + 1,
                        name
                    ))
                })
            })?;

            for (col_idx, value) in row.into_iter().enumerate() {
                matrix[[row_idx, col_idx]] = value;
            }
        }

        Ok(matrix)
    }
}

fn split_row(line: &str) -> Vec<&str> {
    line.split(',')
        .map(|cell| cell.trim().trim_matches('"').trim())
        .collect()
}

fn column_index(headers: &[String], name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| AppError::Dataset(format!("dataset has no '{}' column", name)))
}

/// Feature matrices and encoded labels for both sides of a split
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub x_train: Array2<f64>,
    pub x_test: Array2<f64>,
    pub y_train: Vec<usize>,
    pub y_test: Vec<usize>,
}

/// Split rows so each class keeps its proportion on both sides.
///
/// For every class, `round(count * test_size)` rows go to the test side,
/// clamped so each side keeps at least one row of that class. The result
/// is deterministic for a given seed.
pub fn stratified_split(
    x: &Array2<f64>,
    y: &[usize],
    test_size: f64,
    seed: u64,
) -> Result<TrainTestSplit> {
    if x.nrows() != y.len() {
        return Err(AppError::Dataset(format!(
            "feature matrix has {} rows but {} labels were given",
            x.nrows(),
            y.len()
        )));
    }
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(AppError::Configuration(format!(
            "test_size must be in (0, 1), got {}",
            test_size
        )));
    }

    let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (idx, &label) in y.iter().enumerate() {
        by_class.entry(label).or_default().push(idx);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train_idx = Vec::with_capacity(y.len());
    let mut test_idx = Vec::new();

    for (label, mut indices) in by_class {
        if indices.len() < 2 {
            return Err(AppError::Dataset(format!(
                "The least populated class in y has only 1 member (label {}), which is too few to stratify",
                label
            )));
        }

        indices.shuffle(&mut rng);
        let n_test = ((indices.len() as f64 * test_size).round() as usize)
            .clamp(1, indices.len() - 1);

        test_idx.extend_from_slice(&indices[..n_test]);
        train_idx.extend_from_slice(&indices[n_test..]);
    }

    train_idx.shuffle(&mut rng);
    test_idx.shuffle(&mut rng);

    Ok(TrainTestSplit {
        x_train: x.select(Axis(0), &train_idx),
        x_test: x.select(Axis(0), &test_idx),
        y_train: train_idx.iter().map(|&i| y[i]).collect(),
        y_test: test_idx.iter().map(|&i| y[i]).collect(),
    })
}
