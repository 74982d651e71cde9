//! Durable write helpers.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::{RegistryError, Result};

/// Lowercase hex sha-256 of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Writes `bytes` to `path` and flushes them to disk before returning.
pub(crate) fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
    let context = || format!("writing {}", path.display());

    let mut file = File::create(path).map_err(|e| RegistryError::storage(context(), e))?;
    file.write_all(bytes)
        .and_then(|()| file.sync_all())
        .map_err(|e| RegistryError::storage(context(), e))
}

/// Replaces `path` with `bytes` via a synced temp file and a rename.
pub(crate) fn replace_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    write_synced(&tmp, bytes)?;
    fs::rename(&tmp, path)
        .map_err(|e| RegistryError::storage(format!("renaming {}", tmp.display()), e))?;

    if let Some(parent) = path.parent() {
        sync_dir(parent)?;
    }
    Ok(())
}

/// Persists directory entries (renames, creations) on platforms that support it.
pub(crate) fn sync_dir(dir: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        File::open(dir)
            .and_then(|d| d.sync_all())
            .map_err(|e| RegistryError::storage(format!("syncing {}", dir.display()), e))?;
    }
    #[cfg(not(unix))]
    let _ = dir;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex_known_value() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_replace_atomically_overwrites() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("ACTIVE");

        replace_atomically(&path, b"1").expect("first write");
        replace_atomically(&path, b"2").expect("second write");

        assert_eq!(fs::read_to_string(&path).expect("read"), "2");
        assert!(!path.with_extension("tmp").exists());
    }
}
