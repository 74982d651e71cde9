//! Tracks growth of the transaction data and decides when to retrain.

mod error;
mod monitor;
mod scheduler;
mod source;

pub use error::MonitorError;
pub use monitor::{DataMonitor, MonitorEvent, MonitorEventKind, MonitorStatus, RetrainCheck};
pub use scheduler::spawn_watcher;
pub use source::{CsvDataSource, DataSource};
