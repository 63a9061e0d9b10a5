pub mod cipher;
pub mod kind;
pub mod records;
pub mod vault;

use std::sync::Arc;

use sled::Db;

use crate::error::RupaResult;
use crate::files::records::{FileRecord, FileRecords};
use crate::files::vault::FileVault;

/// Outcome of one directory or record sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub removed: usize,
    pub failed: usize,
}

impl SweepReport {
    pub fn merge(&mut self, other: SweepReport) {
        self.removed += other.removed;
        self.failed += other.failed;
    }
}

/// Record store plus encrypted blob vault. A record's `storage_path` always
/// points at an encrypted blob or at nothing.
#[derive(Clone)]
pub struct FileStore {
    records: FileRecords,
    vault: Arc<FileVault>,
}

impl FileStore {
    pub fn new(db: &Db, vault: FileVault) -> RupaResult<Self> {
        Ok(Self {
            records: FileRecords::new(db)?,
            vault: Arc::new(vault),
        })
    }

    pub fn records(&self) -> &FileRecords {
        &self.records
    }

    pub fn vault(&self) -> &FileVault {
        &self.vault
    }

    /// Encrypts `bytes` to disk and registers the record. The blob is removed
    /// again if the record cannot be written.
    pub fn persist(
        &self,
        user_id: i64,
        file_id: &str,
        original_name: &str,
        bytes: &[u8],
    ) -> RupaResult<FileRecord> {
        let created_at = chrono::Utc::now().timestamp();
        let path = self.vault.store(bytes)?;
        match self
            .records
            .insert(user_id, file_id, original_name, path.clone(), created_at)
        {
            Ok(record) => {
                log::debug!("Stored file {} for user {}", record.id, user_id);
                Ok(record)
            }
            Err(e) => {
                if let Err(cleanup) = self.vault.remove(&path) {
                    log::warn!("Failed to remove blob {}: {}", path.display(), cleanup);
                }
                Err(e)
            }
        }
    }

    /// Loads and decrypts the blob behind a record.
    pub fn open(&self, record_id: u64) -> RupaResult<(FileRecord, Vec<u8>)> {
        let record = self.records.require(record_id)?;
        let bytes = self.vault.load(&record.storage_path)?;
        Ok((record, bytes))
    }

    /// Deletes blob and record. Missing pieces are not an error.
    pub fn discard(&self, record_id: u64) -> RupaResult<()> {
        if let Some(record) = self.records.get(record_id)? {
            self.vault.remove(&record.storage_path)?;
        }
        self.records.delete(record_id)?;
        Ok(())
    }

    /// Logs instead of failing; used on cleanup paths that must not abort.
    pub fn discard_quietly(&self, record_id: u64) {
        if let Err(e) = self.discard(record_id) {
            log::error!("Failed to discard file record {}: {}", record_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RupaError;
    use crate::testing::create_test_store;

    #[test]
    fn test_persist_open_discard() {
        let (store, _temp) = create_test_store();
        let record = store.persist(7, "file-1", "scan.pdf", b"%PDF").unwrap();
        assert!(record.storage_path.exists());

        let (fetched, bytes) = store.open(record.id).unwrap();
        assert_eq!(fetched.original_name, "scan.pdf");
        assert_eq!(bytes, b"%PDF");

        store.discard(record.id).unwrap();
        assert!(!record.storage_path.exists());
        assert!(matches!(
            store.open(record.id),
            Err(RupaError::RecordNotFound(_))
        ));
        store.discard(record.id).unwrap();
    }

    #[test]
    fn test_open_with_missing_blob_is_storage_error() {
        let (store, _temp) = create_test_store();
        let record = store.persist(7, "file-1", "a.png", b"png").unwrap();
        std::fs::remove_file(&record.storage_path).unwrap();
        let err = store.open(record.id).unwrap_err();
        assert!(matches!(err, RupaError::StorageIo(_)));
        store.discard(record.id).unwrap();
        assert!(store.records().is_empty());
    }
}
