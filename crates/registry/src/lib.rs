//! Versioned, checksummed storage for trained fraud models.
//!
//! Each committed version lives in its own directory next to an append-only
//! run log and an `ACTIVE` pointer file. Rewriting the pointer through an
//! atomic rename is the single commit point for making a model active.

mod error;
mod fs_utils;
mod store;

pub use error::{RegistryError, Result};
pub use fs_utils::sha256_hex;
pub use store::{Registry, RunLease};
