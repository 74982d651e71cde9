use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Row count of the transaction data at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct DataSnapshot {
    pub row_count: u64,
    pub observed_at: DateTime<Utc>,
}
