//! Transaction datasets, CSV loading and train/test splitting.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use fraud_structs::{FEATURE_COUNT, FEATURE_NAMES, LABEL_COLUMN};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::error::DatasetError;

/// Labelled transactions held in memory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    /// Feature rows in `FEATURE_NAMES` order.
    pub features: Vec<[f64; FEATURE_COUNT]>,
    /// `1` for fraud, `0` for legitimate.
    pub labels: Vec<u8>,
}

impl Dataset {
    /// Creates a new empty dataset.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            features: Vec::new(),
            labels: Vec::new(),
        }
    }

    /// Adds one labelled row.
    pub fn push(&mut self, features: [f64; FEATURE_COUNT], is_fraud: bool) {
        self.features.push(features);
        self.labels.push(u8::from(is_fraud));
    }

    /// Returns the number of rows.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.labels.len()
    }

    /// Returns true if there are no rows.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Number of fraud rows.
    #[must_use]
    pub fn positives(&self) -> usize {
        self.labels.iter().filter(|&&label| label == 1).count()
    }

    /// Builds a dataset from a subset of row indices.
    #[must_use]
    pub fn subset(&self, indices: &[usize]) -> Self {
        let mut out = Self::new();
        for &i in indices {
            if let (Some(features), Some(&label)) = (self.features.get(i), self.labels.get(i)) {
                out.features.push(*features);
                out.labels.push(label);
            }
        }
        out
    }

    /// Splits into `(train, test)` keeping the fraud rate similar in both.
    ///
    /// Each class is shuffled with `seed` and `test_ratio` of it is held out.
    /// A class with at least two rows always lands on both sides.
    #[must_use]
    pub fn stratified_split(&self, test_ratio: f64, seed: u64) -> (Self, Self) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut train_idx = Vec::new();
        let mut test_idx = Vec::new();

        for mut class in self.class_indices() {
            class.shuffle(&mut rng);
            let mut n_test = (class.len() as f64 * test_ratio).round() as usize;
            if test_ratio > 0.0 && class.len() >= 2 {
                // Both sides keep at least one row of every class present.
                n_test = n_test.clamp(1, class.len() - 1);
            }
            let (test, train) = class.split_at(n_test.min(class.len()));
            test_idx.extend_from_slice(test);
            train_idx.extend_from_slice(train);
        }

        train_idx.sort_unstable();
        test_idx.sort_unstable();
        (self.subset(&train_idx), self.subset(&test_idx))
    }

    /// Assigns every row to one of `k` folds, dealing each class round-robin.
    ///
    /// Returns the row indices of each fold.
    #[must_use]
    pub fn stratified_folds(&self, k: usize, seed: u64) -> Vec<Vec<usize>> {
        let k = k.max(1);
        let mut rng = StdRng::seed_from_u64(seed);
        let mut folds = vec![Vec::new(); k];

        for mut class in self.class_indices() {
            class.shuffle(&mut rng);
            for (position, index) in class.into_iter().enumerate() {
                if let Some(fold) = folds.get_mut(position % k) {
                    fold.push(index);
                }
            }
        }

        folds
    }

    /// `[negatives, positives]` row indices.
    fn class_indices(&self) -> [Vec<usize>; 2] {
        let mut classes = [Vec::new(), Vec::new()];
        for (i, &label) in self.labels.iter().enumerate() {
            classes[usize::from(label == 1)].push(i);
        }
        classes
    }

    /// Loads a CSV file with a header naming the feature columns and `Class`.
    ///
    /// Extra columns are ignored; column order does not matter.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, a required column is
    /// missing, or a value fails to parse.
    pub fn from_csv(path: &Path) -> Result<Self, DatasetError> {
        let mut data = Self::new();
        for (features, label) in read_rows(path, true)? {
            data.push(features, label.is_some_and(|l| l >= 0.5));
        }
        Ok(data)
    }

    /// Appends the rows to a CSV file, writing the header if the file is new.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn append_csv(&self, path: &Path) -> Result<(), DatasetError> {
        let io_err = |source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        };

        let is_new = std::fs::metadata(path).map_or(true, |meta| meta.len() == 0);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(io_err)?;
        let mut writer = BufWriter::new(file);

        if is_new {
            writeln!(writer, "{},{LABEL_COLUMN}", FEATURE_NAMES.join(",")).map_err(io_err)?;
        }
        for (features, label) in self.features.iter().zip(&self.labels) {
            let row: Vec<String> = features.iter().map(ToString::to_string).collect();
            writeln!(writer, "{},{label}", row.join(",")).map_err(io_err)?;
        }

        writer.flush().map_err(io_err)
    }
}

/// Reads feature rows from a CSV file for scoring.
///
/// Same layout as [`Dataset::from_csv`], except the `Class` column is
/// optional and ignored when present.
///
/// # Errors
///
/// Returns an error if the file cannot be read, a feature column is
/// missing, or a value fails to parse.
pub fn read_features(path: &Path) -> Result<Vec<[f64; FEATURE_COUNT]>, DatasetError> {
    Ok(read_rows(path, false)?
        .into_iter()
        .map(|(features, _)| features)
        .collect())
}

type CsvRow = ([f64; FEATURE_COUNT], Option<f64>);

/// Parses every data row, reading the label only when `with_label` is set.
fn read_rows(path: &Path, with_label: bool) -> Result<Vec<CsvRow>, DatasetError> {
    let io_err = |source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(io_err)?;
    let mut lines = BufReader::new(file).lines();

    let header = match lines.next() {
        Some(line) => line.map_err(io_err)?,
        None => return Ok(Vec::new()),
    };
    let columns: Vec<&str> = header.split(',').map(str::trim).collect();
    let position = |name: &str| {
        columns
            .iter()
            .position(|c| *c == name)
            .ok_or_else(|| DatasetError::MissingColumn(name.to_string()))
    };

    let mut feature_idx = [0usize; FEATURE_COUNT];
    for (slot, name) in feature_idx.iter_mut().zip(FEATURE_NAMES) {
        *slot = position(name)?;
    }
    let label_idx = if with_label {
        Some(position(LABEL_COLUMN)?)
    } else {
        None
    };

    let mut rows = Vec::new();
    for (offset, line) in lines.enumerate() {
        let line = line.map_err(io_err)?;
        if line.trim().is_empty() {
            continue;
        }
        let line_no = offset + 2;
        let values: Vec<&str> = line.split(',').map(str::trim).collect();

        let parse = |idx: usize| -> Result<f64, DatasetError> {
            let raw = values.get(idx).ok_or_else(|| DatasetError::Parse {
                line: line_no,
                reason: format!("expected {} columns, found {}", columns.len(), values.len()),
            })?;
            raw.parse().map_err(|_| DatasetError::Parse {
                line: line_no,
                reason: format!("not a number: {raw:?}"),
            })
        };

        let mut features = [0.0; FEATURE_COUNT];
        for (value, &idx) in features.iter_mut().zip(&feature_idx) {
            *value = parse(idx)?;
        }
        let label = label_idx.map(parse).transpose()?;
        rows.push((features, label));
    }

    Ok(rows)
}

/// Counts data rows (excluding the header and blank lines) in a CSV file.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn count_csv_rows(path: &Path) -> Result<u64, DatasetError> {
    let io_err = |source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(io_err)?;
    let mut rows = 0u64;
    for line in BufReader::new(file).lines() {
        if !line.map_err(io_err)?.trim().is_empty() {
            rows += 1;
        }
    }

    Ok(rows.saturating_sub(1))
}
