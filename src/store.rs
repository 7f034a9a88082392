//! Main telemetry store tying the log and index together.

use crate::error::{Result, TelemetryError};
use crate::records::{LogEntry, TelemetryIndex, TelemetryLog};
use crate::types::{ItemId, TelemetryItem};
use fs2::FileExt;
use parking_lot::Mutex;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

/// Store configuration.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Base directory for the store.
    pub path: PathBuf,

    /// Whether to create the store if it doesn't exist.
    pub create_if_missing: bool,

    /// Sync the log to disk every N writes. 1 = every write, which is what
    /// the publish-after-persist contract assumes.
    pub sync_interval: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./telemetry-store"),
            create_if_missing: true,
            sync_interval: 1,
        }
    }
}

/// Criteria for a targeted delete. All supplied criteria are conjoined;
/// time bounds are inclusive on both ends.
#[derive(Clone, Debug, Default)]
pub struct DeleteCriteria {
    pub ids: Option<Vec<ItemId>>,
    pub start: Option<String>,
    pub end: Option<String>,
}

impl DeleteCriteria {
    /// True when no criterion at all was supplied.
    pub fn is_empty(&self) -> bool {
        self.ids.is_none() && self.start.is_none() && self.end.is_none()
    }
}

/// Store statistics.
#[derive(Clone, Debug, Default)]
pub struct StoreStats {
    pub item_count: u64,
    pub type_count: u64,
    pub log_size_bytes: u64,
}

/// Magic bytes for the store manifest.
const STORE_MAGIC: &[u8; 4] = b"BCN\0";

/// Current store format version.
const STORE_VERSION: u8 = 1;

/// The durable telemetry store.
///
/// Append-only: inserts and deletes are frames in the log, and the live set
/// is the index rebuilt by replaying the log on open. Mutations are
/// linearized under a single write lock; reads go straight to the index and
/// log without snapshot isolation.
pub struct TelemetryStore {
    config: StoreConfig,

    /// Lock file for exclusive access.
    _lock_file: File,

    log: TelemetryLog,

    index: TelemetryIndex,

    /// Lock serializing all mutations.
    write_lock: Mutex<()>,
}

impl TelemetryStore {
    /// Open an existing store or create a new one.
    pub fn open_or_create(config: StoreConfig) -> Result<Self> {
        if config.path.exists() {
            Self::open(config)
        } else if config.create_if_missing {
            Self::create(config)
        } else {
            Err(TelemetryError::NotInitialized)
        }
    }

    /// Create a new store.
    pub fn create(config: StoreConfig) -> Result<Self> {
        fs::create_dir_all(&config.path)?;
        Self::write_manifest(&config.path)?;

        let lock_file = Self::acquire_lock(&config.path)?;
        let log = TelemetryLog::open_with_sync_interval(
            config.path.join("telemetry.log"),
            config.sync_interval,
        )?;

        Ok(Self {
            config,
            _lock_file: lock_file,
            log,
            index: TelemetryIndex::new(),
            write_lock: Mutex::new(()),
        })
    }

    /// Open an existing store, rebuilding the index from the log.
    pub fn open(config: StoreConfig) -> Result<Self> {
        Self::verify_manifest(&config.path)?;

        let lock_file = Self::acquire_lock(&config.path)?;
        let log = TelemetryLog::open_with_sync_interval(
            config.path.join("telemetry.log"),
            config.sync_interval,
        )?;

        let index = TelemetryIndex::new();
        for result in log.iter() {
            let (offset, entry) = result?;
            match entry {
                LogEntry::Insert(item) => {
                    index.insert(item.id, item.time, item.item_type, offset);
                }
                LogEntry::Delete(ids) => {
                    for id in &ids {
                        index.remove(id);
                    }
                }
                LogEntry::Purge => {
                    index.clear();
                }
            }
        }

        tracing::debug!(
            items = index.len(),
            types = index.type_count(),
            "store index rebuilt"
        );

        Ok(Self {
            config,
            _lock_file: lock_file,
            log,
            index,
            write_lock: Mutex::new(()),
        })
    }

    /// Insert one fully-formed item.
    ///
    /// On return the item is durable: the frame has been written (and, at
    /// the default sync interval, fsynced) and the item is visible to
    /// queries.
    pub fn insert(&self, item: &TelemetryItem) -> Result<()> {
        let _lock = self.write_lock.lock();

        let offset = self.log.append(&LogEntry::Insert(item.clone()))?;
        self.index.insert(
            item.id.clone(),
            item.time.clone(),
            item.item_type.clone(),
            offset,
        );

        Ok(())
    }

    /// Items ordered by time descending, at most `limit`, skipping `skip`.
    ///
    /// Pagination boundaries may shift under concurrent inserts; no
    /// snapshot is taken.
    pub fn query_recent(&self, limit: usize, skip: usize) -> Result<Vec<TelemetryItem>> {
        self.index
            .recent(limit, skip)
            .into_iter()
            .map(|offset| self.log.read_item_at(offset))
            .collect()
    }

    /// Remove every record. Returns the count removed.
    pub fn delete_all(&self) -> Result<u64> {
        let _lock = self.write_lock.lock();

        self.log.append(&LogEntry::Purge)?;
        Ok(self.index.clear())
    }

    /// Remove every record matching the conjunction of the supplied
    /// criteria. Rejected outright when no criterion is given; a full wipe
    /// must go through `delete_all`.
    pub fn delete_matching(&self, criteria: &DeleteCriteria) -> Result<u64> {
        if criteria.is_empty() {
            return Err(TelemetryError::MissingCriteria);
        }

        let _lock = self.write_lock.lock();

        let matched = self.index.select(
            criteria.ids.as_deref(),
            criteria.start.as_deref(),
            criteria.end.as_deref(),
        );
        if matched.is_empty() {
            return Ok(0);
        }

        self.log.append(&LogEntry::Delete(matched.clone()))?;
        for id in &matched {
            self.index.remove(id);
        }

        Ok(matched.len() as u64)
    }

    /// Whether an item with this id is currently live.
    pub fn contains(&self, id: &ItemId) -> bool {
        self.index.contains(id)
    }

    /// Number of live items.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Store statistics.
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            item_count: self.index.len() as u64,
            type_count: self.index.type_count() as u64,
            log_size_bytes: self.log.size(),
        }
    }

    /// Sync pending log writes to disk.
    pub fn sync(&self) -> Result<()> {
        self.log.sync()
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    // --- Private helpers ---

    fn write_manifest(path: &Path) -> Result<()> {
        use std::io::Write;

        let mut file = File::create(path.join("MANIFEST"))?;
        file.write_all(STORE_MAGIC)?;
        file.write_all(&[STORE_VERSION])?;
        file.sync_all()?;

        Ok(())
    }

    fn verify_manifest(path: &Path) -> Result<()> {
        use std::io::Read;

        let mut file = File::open(path.join("MANIFEST"))?;

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if &magic != STORE_MAGIC {
            return Err(TelemetryError::InvalidFormat("invalid store magic".into()));
        }

        let mut version = [0u8; 1];
        file.read_exact(&mut version)?;
        if version[0] != STORE_VERSION {
            return Err(TelemetryError::InvalidFormat(format!(
                "unsupported store version: {}",
                version[0]
            )));
        }

        Ok(())
    }

    fn acquire_lock(path: &Path) -> Result<File> {
        let lock_file = File::create(path.join("LOCK"))?;

        lock_file
            .try_lock_exclusive()
            .map_err(|_| TelemetryError::Locked)?;

        Ok(lock_file)
    }
}

impl Drop for TelemetryStore {
    fn drop(&mut self) {
        // Best-effort sync on drop
        let _ = self.sync();
    }
}
