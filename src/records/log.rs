//! Append-only telemetry operation log.

use crate::error::{Result, TelemetryError};
use crate::types::{ItemId, TelemetryItem};
use parking_lot::RwLock;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Magic bytes for the telemetry log.
const LOG_MAGIC: &[u8; 4] = b"TLG\0";

/// Current log format version.
const LOG_VERSION: u8 = 1;

/// Frame kind markers.
const KIND_INSERT: u8 = 1;
const KIND_DELETE: u8 = 2;
const KIND_PURGE: u8 = 3;

/// A single durable store operation.
///
/// Inserts carry the full item; deletes carry the matched ids so the live
/// set can be reconstructed by replaying the log in order.
#[derive(Clone, Debug)]
pub enum LogEntry {
    Insert(TelemetryItem),
    Delete(Vec<ItemId>),
    Purge,
}

/// Append-only operation log.
///
/// Every frame is `magic | version | kind | payload_len | payload | crc32`,
/// with the checksum covering the payload.
pub struct TelemetryLog {
    path: PathBuf,

    /// Log file handle.
    file: RwLock<File>,

    /// Current file size (for appending).
    file_size: RwLock<u64>,

    /// Number of writes since last sync.
    writes_since_sync: RwLock<u64>,

    /// Sync every N writes. 1 = sync every write; the store's durability
    /// acknowledgment assumes the default of 1.
    sync_interval: u64,
}

impl TelemetryLog {
    /// Open or create a log, syncing every write.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_sync_interval(path, 1)
    }

    /// Open or create a log with a custom sync interval.
    pub fn open_with_sync_interval(path: impl AsRef<Path>, sync_interval: u64) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        let file_size = file.metadata()?.len();

        Ok(Self {
            path,
            file: RwLock::new(file),
            file_size: RwLock::new(file_size),
            writes_since_sync: RwLock::new(0),
            sync_interval: if sync_interval == 0 { 1 } else { sync_interval },
        })
    }

    /// Append an entry, returning the offset it was written at.
    pub fn append(&self, entry: &LogEntry) -> Result<u64> {
        let payload = match entry {
            LogEntry::Insert(item) => serde_json::to_vec(item)?,
            LogEntry::Delete(ids) => serde_json::to_vec(ids)?,
            LogEntry::Purge => Vec::new(),
        };
        let kind = match entry {
            LogEntry::Insert(_) => KIND_INSERT,
            LogEntry::Delete(_) => KIND_DELETE,
            LogEntry::Purge => KIND_PURGE,
        };

        let mut file = self.file.write();

        let offset = *self.file_size.read();
        file.seek(SeekFrom::Start(offset))?;

        file.write_all(LOG_MAGIC)?;
        file.write_all(&[LOG_VERSION])?;
        file.write_all(&[kind])?;
        file.write_all(&(payload.len() as u32).to_le_bytes())?;
        file.write_all(&payload)?;
        file.write_all(&crc32fast::hash(&payload).to_le_bytes())?;

        let new_size = file.stream_position()?;
        *self.file_size.write() = new_size;

        let mut writes = self.writes_since_sync.write();
        *writes += 1;
        if *writes >= self.sync_interval {
            file.sync_all()?;
            *writes = 0;
        }

        Ok(offset)
    }

    /// Force all pending writes to disk.
    pub fn sync(&self) -> Result<()> {
        let file = self.file.write();
        file.sync_all()?;
        *self.writes_since_sync.write() = 0;
        Ok(())
    }

    /// Read the entry at a given offset.
    pub fn read_at(&self, offset: u64) -> Result<LogEntry> {
        let mut file = self.file.write();
        file.seek(SeekFrom::Start(offset))?;
        Self::read_entry(&mut *file).map(|(entry, _)| entry)
    }

    /// Read the item frame at a given offset.
    ///
    /// Offsets handed out by the index always point at insert frames; any
    /// other kind here means the index and log disagree.
    pub fn read_item_at(&self, offset: u64) -> Result<TelemetryItem> {
        match self.read_at(offset)? {
            LogEntry::Insert(item) => Ok(item),
            other => Err(TelemetryError::InvalidFormat(format!(
                "expected insert frame at offset {}, found {:?}",
                offset, other
            ))),
        }
    }

    /// Iterate all entries from the start of the log.
    pub fn iter(&self) -> LogIterator<'_> {
        LogIterator {
            log: self,
            offset: 0,
            end: *self.file_size.read(),
        }
    }

    /// Current file size.
    pub fn size(&self) -> u64 {
        *self.file_size.read()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read one frame at the current position, returning the entry and the
    /// position just past it.
    fn read_entry(file: &mut File) -> Result<(LogEntry, u64)> {
        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if &magic != LOG_MAGIC {
            return Err(TelemetryError::InvalidFormat("invalid log magic".into()));
        }

        let mut version = [0u8; 1];
        file.read_exact(&mut version)?;
        if version[0] != LOG_VERSION {
            return Err(TelemetryError::InvalidFormat(format!(
                "unsupported log version: {}",
                version[0]
            )));
        }

        let mut kind = [0u8; 1];
        file.read_exact(&mut kind)?;

        let mut len_bytes = [0u8; 4];
        file.read_exact(&mut len_bytes)?;
        let payload_len = u32::from_le_bytes(len_bytes) as usize;
        let mut payload = vec![0u8; payload_len];
        file.read_exact(&mut payload)?;

        let mut checksum_bytes = [0u8; 4];
        file.read_exact(&mut checksum_bytes)?;
        let stored_checksum = u32::from_le_bytes(checksum_bytes);
        let computed_checksum = crc32fast::hash(&payload);
        if stored_checksum != computed_checksum {
            return Err(TelemetryError::ChecksumMismatch {
                expected: stored_checksum,
                got: computed_checksum,
            });
        }

        let entry = match kind[0] {
            KIND_INSERT => {
                let item: TelemetryItem = serde_json::from_slice(&payload)
                    .map_err(|e| TelemetryError::Deserialization(e.to_string()))?;
                LogEntry::Insert(item)
            }
            KIND_DELETE => {
                let ids: Vec<ItemId> = serde_json::from_slice(&payload)
                    .map_err(|e| TelemetryError::Deserialization(e.to_string()))?;
                LogEntry::Delete(ids)
            }
            KIND_PURGE => LogEntry::Purge,
            other => {
                return Err(TelemetryError::InvalidFormat(format!(
                    "unknown frame kind: {}",
                    other
                )))
            }
        };

        Ok((entry, file.stream_position()?))
    }
}

/// Iterator over log entries, yielding `(offset, entry)`.
pub struct LogIterator<'a> {
    log: &'a TelemetryLog,
    offset: u64,
    end: u64,
}

impl<'a> Iterator for LogIterator<'a> {
    type Item = Result<(u64, LogEntry)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.end {
            return None;
        }

        let current = self.offset;
        let mut file = self.log.file.write();
        if let Err(e) = file.seek(SeekFrom::Start(current)) {
            self.offset = self.end;
            return Some(Err(e.into()));
        }

        match TelemetryLog::read_entry(&mut *file) {
            Ok((entry, next_offset)) => {
                self.offset = next_offset;
                Some(Ok((current, entry)))
            }
            Err(e) => {
                self.offset = self.end;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TelemetryEnvelope;
    use serde_json::json;
    use tempfile::TempDir;

    fn make_item(id: &str, name: &str) -> TelemetryItem {
        TelemetryEnvelope::from_value(&json!({
            "time": "2024-01-01T00:00:00Z",
            "iKey": "k1",
            "name": name,
            "data": {"baseType": "EventData", "baseData": {}}
        }))
        .unwrap()
        .into_item(ItemId::from(id))
    }

    #[test]
    fn test_append_and_read() {
        let dir = TempDir::new().unwrap();
        let log = TelemetryLog::open(dir.path().join("telemetry.log")).unwrap();

        let offset = log.append(&LogEntry::Insert(make_item("a", "evt"))).unwrap();
        assert_eq!(offset, 0);

        let item = log.read_item_at(offset).unwrap();
        assert_eq!(item.id.as_str(), "a");
        assert_eq!(item.name, "evt");
    }

    #[test]
    fn test_iterate_mixed_entries() {
        let dir = TempDir::new().unwrap();
        let log = TelemetryLog::open(dir.path().join("telemetry.log")).unwrap();

        log.append(&LogEntry::Insert(make_item("a", "one"))).unwrap();
        log.append(&LogEntry::Insert(make_item("b", "two"))).unwrap();
        log.append(&LogEntry::Delete(vec![ItemId::from("a")])).unwrap();
        log.append(&LogEntry::Purge).unwrap();

        let entries: Vec<_> = log.iter().map(|r| r.unwrap().1).collect();
        assert_eq!(entries.len(), 4);
        assert!(matches!(&entries[2], LogEntry::Delete(ids) if ids.len() == 1));
        assert!(matches!(entries[3], LogEntry::Purge));
    }

    #[test]
    fn test_persistence_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("telemetry.log");

        {
            let log = TelemetryLog::open(&path).unwrap();
            for i in 0..5 {
                log.append(&LogEntry::Insert(make_item(&format!("id-{}", i), "evt")))
                    .unwrap();
            }
        }

        {
            let log = TelemetryLog::open(&path).unwrap();
            let entries: Vec<_> = log.iter().collect();
            assert_eq!(entries.len(), 5);

            // Appending continues past the existing frames.
            let size_before = log.size();
            let offset = log.append(&LogEntry::Purge).unwrap();
            assert_eq!(offset, size_before);
            assert!(log.size() > offset);
        }
    }

    #[test]
    fn test_read_item_at_rejects_other_kinds() {
        let dir = TempDir::new().unwrap();
        let log = TelemetryLog::open(dir.path().join("telemetry.log")).unwrap();

        let offset = log.append(&LogEntry::Purge).unwrap();
        assert!(log.read_item_at(offset).is_err());
    }
}
