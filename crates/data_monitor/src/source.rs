//! Where transaction data comes from.

use std::path::PathBuf;

use fraud_model::{Dataset, count_csv_rows};

use crate::error::MonitorError;

/// Append-only store of labelled transactions.
pub trait DataSource: Send + Sync {
    /// Current number of data rows.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::DataUnavailable`] if the source can't be read.
    fn row_count(&self) -> Result<u64, MonitorError>;

    /// Loads every row for training.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::DataUnavailable`] if the source can't be read.
    fn load(&self) -> Result<Dataset, MonitorError>;
}

/// A CSV file with a header row.
#[derive(Debug, Clone)]
pub struct CsvDataSource {
    path: PathBuf,
}

impl CsvDataSource {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DataSource for CsvDataSource {
    fn row_count(&self) -> Result<u64, MonitorError> {
        count_csv_rows(&self.path).map_err(|e| MonitorError::DataUnavailable(e.to_string()))
    }

    fn load(&self) -> Result<Dataset, MonitorError> {
        Dataset::from_csv(&self.path).map_err(|e| MonitorError::DataUnavailable(e.to_string()))
    }
}
