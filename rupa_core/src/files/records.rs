use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sled::{Db, IVec, Tree};

use crate::error::{RupaError, RupaResult};

const FILE_RECORDS_TREE: &str = "file_records";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: u64,
    pub user_id: i64,
    /// Gateway-side file id the upload came from.
    pub file_id: String,
    pub original_name: String,
    pub storage_path: PathBuf,
    /// Unix seconds.
    pub created_at: i64,
}

#[derive(Clone)]
pub struct FileRecords {
    db: Db,
    tree: Tree,
}

impl FileRecords {
    pub fn new(db: &Db) -> sled::Result<Self> {
        let tree = db.open_tree(FILE_RECORDS_TREE)?;
        Ok(Self {
            db: db.clone(),
            tree,
        })
    }

    pub fn insert(
        &self,
        user_id: i64,
        file_id: &str,
        original_name: &str,
        storage_path: PathBuf,
        created_at: i64,
    ) -> RupaResult<FileRecord> {
        let record = FileRecord {
            id: self.db.generate_id()?,
            user_id,
            file_id: file_id.to_string(),
            original_name: original_name.to_string(),
            storage_path,
            created_at,
        };
        let bytes = serde_json::to_vec(&record)?;
        self.tree.insert(record.id.to_be_bytes(), bytes)?;
        Ok(record)
    }

    pub fn get(&self, id: u64) -> RupaResult<Option<FileRecord>> {
        match self.tree.get(id.to_be_bytes())? {
            Some(ivec) => Ok(Some(decode(&ivec)?)),
            None => Ok(None),
        }
    }

    pub fn require(&self, id: u64) -> RupaResult<FileRecord> {
        self.get(id)?.ok_or(RupaError::RecordNotFound(id))
    }

    /// Returns whether a record was actually removed.
    pub fn delete(&self, id: u64) -> RupaResult<bool> {
        Ok(self.tree.remove(id.to_be_bytes())?.is_some())
    }

    /// Records created strictly before `cutoff` (unix seconds). Undecodable
    /// entries are skipped with a warning.
    pub fn list_older_than(&self, cutoff: i64) -> RupaResult<Vec<FileRecord>> {
        let mut out = Vec::new();
        for kv in self.tree.iter() {
            let (key, value) = kv?;
            match decode(&value) {
                Ok(record) if record.created_at < cutoff => out.push(record),
                Ok(_) => {}
                Err(e) => log::warn!("Skipping unreadable file record {:?}: {}", key, e),
            }
        }
        Ok(out)
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}

fn decode(ivec: &IVec) -> RupaResult<FileRecord> {
    Ok(serde_json::from_slice(ivec)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_records() -> (FileRecords, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = sled::open(temp_dir.path()).unwrap();
        (FileRecords::new(&db).unwrap(), temp_dir)
    }

    #[test]
    fn test_insert_get_delete() {
        let (records, _temp) = create_test_records();

        let record = records
            .insert(42, "AgAD", "report.pdf", PathBuf::from("files/a.enc"), 1_000)
            .unwrap();
        let fetched = records.get(record.id).unwrap().unwrap();
        assert_eq!(fetched, record);
        assert_eq!(fetched.user_id, 42);

        assert!(records.delete(record.id).unwrap());
        assert!(!records.delete(record.id).unwrap());
        assert!(records.get(record.id).unwrap().is_none());
        assert!(matches!(
            records.require(record.id),
            Err(RupaError::RecordNotFound(_))
        ));
    }

    #[test]
    fn test_ids_are_unique() {
        let (records, _temp) = create_test_records();
        let a = records.insert(1, "f1", "a.pdf", PathBuf::from("a"), 0).unwrap();
        let b = records.insert(1, "f2", "b.pdf", PathBuf::from("b"), 0).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_list_older_than() {
        let (records, _temp) = create_test_records();
        let old = records.insert(1, "f1", "old.png", PathBuf::from("o"), 100).unwrap();
        records.insert(1, "f2", "new.png", PathBuf::from("n"), 500).unwrap();

        let stale = records.list_older_than(300).unwrap();
        assert_eq!(stale, vec![old]);
        assert!(records.list_older_than(100).unwrap().is_empty());
    }
}
