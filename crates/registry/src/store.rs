//! Filesystem-backed model registry.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use fraud_structs::{ModelArtifact, TrainingRun};
use fs2::FileExt;
use tracing::{debug, info, warn};

use crate::error::{RegistryError, Result};
use crate::fs_utils::{replace_atomically, sha256_hex, sync_dir, write_synced};

const ACTIVE_FILE: &str = "ACTIVE";
const VERSION_FILE: &str = "VERSION";
const RUN_LOG_FILE: &str = "runs.jsonl";
const MODEL_FILE: &str = "model.json";
const METADATA_FILE: &str = "metadata.json";
const STAGING_PREFIX: &str = ".staging-v";
const WRITE_LOCK_FILE: &str = "LOCK";
const RUN_LOCK_FILE: &str = "RUN.lock";

/// Versioned model storage rooted at a directory.
///
/// Layout:
///
/// ```text
/// <root>/ACTIVE              currently active version
/// <root>/VERSION             highest version ever issued
/// <root>/runs.jsonl          append-only run log
/// <root>/v{N}/model.json     serialized model
/// <root>/v{N}/metadata.json  ModelArtifact record
/// <root>/LOCK                advisory lock held by every mutation
/// <root>/RUN.lock            advisory lock held by the running retrain
/// ```
///
/// Mutations are serialized across threads by a mutex and across processes
/// by an exclusive lock on `LOCK`. The next version is derived from disk
/// under that lock, so two handles on one root never issue the same number.
#[derive(Debug)]
pub struct Registry {
    root: PathBuf,
    high_water: Mutex<u64>,
}

/// Proof that the caller is the only retrain run on this registry, in any
/// process. Dropping it releases the lock.
#[derive(Debug)]
pub struct RunLease {
    _file: File,
}

/// Exclusive access for one mutation. Closing the file releases the
/// advisory lock.
struct WriteGuard<'a> {
    issued: MutexGuard<'a, u64>,
    _file: File,
}

impl Registry {
    /// Opens (creating if needed) the registry at `root`.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the directory cannot be created or scanned.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .map_err(|e| RegistryError::storage(format!("creating {}", root.display()), e))?;

        let registry = Self {
            root,
            high_water: Mutex::new(0),
        };
        let issued = registry.scan_high_water()?;
        *registry.lock() = issued;

        debug!(root = %registry.root.display(), issued, "Opened model registry");
        Ok(registry)
    }

    /// Takes the single-run lease, or returns `None` if another run (in this
    /// or another process) holds it.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the lock file cannot be opened or locked
    /// for a reason other than contention.
    pub fn try_lease_run(&self) -> Result<Option<RunLease>> {
        let path = self.root.join(RUN_LOCK_FILE);
        let file = open_lock_file(&path)?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(RunLease { _file: file })),
            Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => {
                debug!(path = %path.display(), "Run lease held elsewhere");
                Ok(None)
            }
            Err(e) => Err(RegistryError::storage(format!("locking {}", path.display()), e)),
        }
    }

    /// Persists a new artifact and returns its record.
    ///
    /// The model bytes and metadata are written into a staging directory,
    /// synced, and then renamed into place as `v{N}`. The artifact is not
    /// active until [`Registry::set_active`] is called.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Storage`] if persistence cannot be confirmed;
    /// callers must not proceed to `set_active` in that case.
    pub fn put(&self, model_bytes: &[u8], run: &TrainingRun) -> Result<ModelArtifact> {
        let mut guard = self.write_lock()?;
        // Another handle on this root may have issued versions since.
        let version = self.scan_high_water()?.max(*guard.issued) + 1;

        // Record the new high-water mark first so a crash can't lead to reuse.
        replace_atomically(&self.root.join(VERSION_FILE), version.to_string().as_bytes())?;
        *guard.issued = version;

        let staging = self.root.join(format!("{STAGING_PREFIX}{version}"));
        let final_dir = self.version_dir(version);
        fs::create_dir_all(&staging)
            .map_err(|e| RegistryError::storage(format!("creating {}", staging.display()), e))?;

        let mut metadata = run.clone();
        metadata.version = Some(version);

        let artifact = ModelArtifact {
            version,
            path: final_dir.join(MODEL_FILE),
            metadata,
            checksum: sha256_hex(model_bytes),
        };
        let metadata_json = serde_json::to_vec_pretty(&artifact).map_err(|e| {
            RegistryError::storage("serializing artifact metadata", e.into())
        })?;

        write_synced(&staging.join(MODEL_FILE), model_bytes)?;
        write_synced(&staging.join(METADATA_FILE), &metadata_json)?;
        sync_dir(&staging)?;

        fs::rename(&staging, &final_dir)
            .map_err(|e| RegistryError::storage(format!("committing v{version}"), e))?;
        sync_dir(&self.root)?;

        info!(
            version,
            checksum = %artifact.checksum,
            bytes = model_bytes.len(),
            "Stored model artifact"
        );

        Ok(artifact)
    }

    /// Makes `version` the active model.
    ///
    /// This is the atomic commit point: the pointer file is replaced through
    /// a rename, so readers see either the old or the new version.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::VersionNotFound`] if the version was never
    /// committed, or a storage error if the pointer cannot be written.
    pub fn set_active(&self, version: u64) -> Result<()> {
        let _guard = self.write_lock()?;

        // Refuse to point at anything that isn't a readable artifact.
        self.get(version)?;
        replace_atomically(&self.root.join(ACTIVE_FILE), version.to_string().as_bytes())?;

        info!(version, "Activated model version");
        Ok(())
    }

    /// Returns the active artifact.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NoActiveModel`] if nothing has been activated.
    pub fn get_active(&self) -> Result<ModelArtifact> {
        let version = self.active_version()?.ok_or(RegistryError::NoActiveModel)?;
        self.get(version)
    }

    /// Returns the active version number, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the pointer file exists but is unreadable.
    pub fn active_version(&self) -> Result<Option<u64>> {
        let path = self.root.join(ACTIVE_FILE);
        match fs::read_to_string(&path) {
            Ok(raw) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| RegistryError::Corrupt {
                    version: 0,
                    reason: format!("{ACTIVE_FILE} holds {raw:?}"),
                }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(RegistryError::storage(format!("reading {}", path.display()), e)),
        }
    }

    /// Returns the artifact record for `version`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::VersionNotFound`] if the version does not
    /// exist, or [`RegistryError::Corrupt`] if its metadata is unreadable or
    /// the model no longer matches the recorded checksum.
    pub fn get(&self, version: u64) -> Result<ModelArtifact> {
        let path = self.version_dir(version).join(METADATA_FILE);
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(RegistryError::VersionNotFound(version));
            }
            Err(e) => {
                return Err(RegistryError::storage(format!("reading {}", path.display()), e));
            }
        };

        let artifact: ModelArtifact =
            serde_json::from_slice(&raw).map_err(|e| RegistryError::Corrupt {
                version,
                reason: format!("metadata: {e}"),
            })?;

        if artifact.version != version {
            return Err(RegistryError::Corrupt {
                version,
                reason: format!("metadata claims v{}", artifact.version),
            });
        }
        self.read_model(&artifact)?;

        Ok(artifact)
    }

    /// Reads the serialized model for `artifact`, verifying its checksum.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Corrupt`] on checksum mismatch.
    pub fn read_model(&self, artifact: &ModelArtifact) -> Result<Vec<u8>> {
        let path = self.version_dir(artifact.version).join(MODEL_FILE);
        let bytes = fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => RegistryError::VersionNotFound(artifact.version),
            _ => RegistryError::storage(format!("reading {}", path.display()), e),
        })?;

        let actual = sha256_hex(&bytes);
        if actual != artifact.checksum {
            return Err(RegistryError::Corrupt {
                version: artifact.version,
                reason: format!("checksum {actual} != recorded {}", artifact.checksum),
            });
        }

        Ok(bytes)
    }

    /// Appends a decided run to the run log.
    ///
    /// If an earlier write was torn (no trailing newline), the fragment is
    /// terminated first so the new record starts on its own line.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the record cannot be written and synced.
    pub fn append_run(&self, run: &TrainingRun) -> Result<()> {
        let _guard = self.write_lock()?;

        let mut line = serde_json::to_vec(run)
            .map_err(|e| RegistryError::storage("serializing training run", e.into()))?;
        line.push(b'\n');

        let path = self.root.join(RUN_LOG_FILE);
        let context = || format!("appending to {}", path.display());
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .map_err(|e| RegistryError::storage(context(), e))?;

        if has_torn_tail(&mut file).map_err(|e| RegistryError::storage(context(), e))? {
            warn!(path = %path.display(), "Run log ends mid-record, terminating it");
            line.insert(0, b'\n');
        }

        file.write_all(&line)
            .and_then(|()| file.sync_data())
            .map_err(|e| RegistryError::storage(context(), e))?;

        debug!(run_id = %run.run_id, decision = %run.decision, "Appended training run");
        Ok(())
    }

    /// Lists every recorded run, newest first.
    ///
    /// Unparseable lines (e.g. a torn final write) are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the log exists but cannot be read.
    pub fn list_history(&self) -> Result<Vec<TrainingRun>> {
        let path = self.root.join(RUN_LOG_FILE);
        let file = match fs::File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(RegistryError::storage(format!("reading {}", path.display()), e));
            }
        };

        let mut runs = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line
                .map_err(|e| RegistryError::storage(format!("reading {}", path.display()), e))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<TrainingRun>(&line) {
                Ok(run) => runs.push(run),
                Err(e) => warn!(line = index + 1, error = %e, "Skipping unreadable run record"),
            }
        }

        runs.reverse();
        Ok(runs)
    }

    /// Returns the most recent accepted run.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`Registry::list_history`].
    pub fn last_accepted(&self) -> Result<Option<TrainingRun>> {
        Ok(self
            .list_history()?
            .into_iter()
            .find(TrainingRun::is_accepted))
    }

    /// Lists committed versions in ascending order.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the root cannot be scanned.
    pub fn versions(&self) -> Result<Vec<u64>> {
        let mut versions: Vec<u64> = self
            .dir_entries()?
            .into_iter()
            .filter_map(|name| name.strip_prefix('v').and_then(|n| n.parse().ok()))
            .filter(|&version| self.version_dir(version).join(METADATA_FILE).is_file())
            .collect();
        versions.sort_unstable();
        Ok(versions)
    }

    /// Deletes superseded versions beyond the newest `retention` backups.
    ///
    /// The active version and the newest version older than it are always
    /// kept, so a one-step rollback stays possible. Leftover staging
    /// directories from interrupted writes are removed as well.
    ///
    /// Returns the versions that were deleted.
    ///
    /// # Errors
    ///
    /// Returns a storage error if a directory cannot be removed.
    pub fn prune(&self, retention: usize) -> Result<Vec<u64>> {
        // Staging directories are only ever written under this lock, so any
        // seen here belong to an interrupted write.
        let _guard = self.write_lock()?;

        for name in self.dir_entries()? {
            if name.starts_with(STAGING_PREFIX) {
                let path = self.root.join(&name);
                warn!(path = %path.display(), "Removing orphaned staging directory");
                fs::remove_dir_all(&path).map_err(|e| {
                    RegistryError::storage(format!("removing {}", path.display()), e)
                })?;
            }
        }

        let Some(active) = self.active_version()? else {
            return Ok(Vec::new());
        };
        let previous = self.versions()?.into_iter().filter(|&v| v < active).max();

        let mut superseded: Vec<u64> = self
            .versions()?
            .into_iter()
            .filter(|&v| v != active)
            .collect();
        superseded.sort_unstable_by(|a, b| b.cmp(a));

        let mut removed = Vec::new();
        for version in superseded.into_iter().skip(retention) {
            if Some(version) == previous {
                continue;
            }
            let dir = self.version_dir(version);
            fs::remove_dir_all(&dir)
                .map_err(|e| RegistryError::storage(format!("removing {}", dir.display()), e))?;
            removed.push(version);
        }

        if !removed.is_empty() {
            sync_dir(&self.root)?;
            info!(?removed, retention, "Pruned superseded model versions");
        }

        Ok(removed)
    }

    fn version_dir(&self, version: u64) -> PathBuf {
        self.root.join(format!("v{version}"))
    }

    fn lock(&self) -> MutexGuard<'_, u64> {
        self.high_water.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// In-process mutex first, then the cross-process file lock.
    fn write_lock(&self) -> Result<WriteGuard<'_>> {
        let issued = self.lock();
        let path = self.root.join(WRITE_LOCK_FILE);
        let file = open_lock_file(&path)?;
        file.lock_exclusive()
            .map_err(|e| RegistryError::storage(format!("locking {}", path.display()), e))?;

        Ok(WriteGuard {
            issued,
            _file: file,
        })
    }

    fn dir_entries(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.root)
            .map_err(|e| RegistryError::storage(format!("scanning {}", self.root.display()), e))?;

        Ok(entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect())
    }

    /// Highest version mentioned anywhere on disk.
    fn scan_high_water(&self) -> Result<u64> {
        let recorded = fs::read_to_string(self.root.join(VERSION_FILE))
            .ok()
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .unwrap_or(0);

        let on_disk = self
            .dir_entries()?
            .iter()
            .filter_map(|name| {
                name.strip_prefix(STAGING_PREFIX)
                    .or_else(|| name.strip_prefix('v'))
                    .and_then(|n| n.parse::<u64>().ok())
            })
            .max()
            .unwrap_or(0);

        let logged = self
            .list_history()?
            .iter()
            .filter_map(|run| run.version)
            .max()
            .unwrap_or(0);

        Ok(recorded.max(on_disk).max(logged))
    }
}

fn open_lock_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)
        .map_err(|e| RegistryError::storage(format!("opening {}", path.display()), e))
}

/// True if the file is non-empty and its last byte is not a newline.
fn has_torn_tail(file: &mut File) -> std::io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}
