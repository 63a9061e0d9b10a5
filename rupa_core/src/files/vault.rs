use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::error::{RupaError, RupaResult};
use crate::files::cipher::FileCipher;
use crate::files::SweepReport;

/// On-disk blob storage. Everything under `files_dir` is encrypted;
/// `temp_dir` holds short-lived conversion scratch files.
pub struct FileVault {
    files_dir: PathBuf,
    temp_dir: PathBuf,
    cipher: FileCipher,
}

impl FileVault {
    pub fn new(files_dir: PathBuf, temp_dir: PathBuf, cipher: FileCipher) -> io::Result<Self> {
        fs::create_dir_all(&files_dir)?;
        fs::create_dir_all(&temp_dir)?;
        Ok(Self {
            files_dir,
            temp_dir,
            cipher,
        })
    }

    pub fn files_dir(&self) -> &Path {
        &self.files_dir
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Encrypts and writes a blob. The plaintext never touches the disk; the
    /// ciphertext is written next to its final path and renamed into place.
    pub fn store(&self, plaintext: &[u8]) -> RupaResult<PathBuf> {
        let sealed = self.cipher.encrypt(plaintext)?;
        let path = self
            .files_dir
            .join(format!("{}.enc", uuid::Uuid::new_v4().simple()));
        let partial = path.with_extension("enc.part");
        fs::write(&partial, &sealed)?;
        if let Err(e) = fs::rename(&partial, &path) {
            let _ = fs::remove_file(&partial);
            return Err(e.into());
        }
        Ok(path)
    }

    pub fn load(&self, path: &Path) -> RupaResult<Vec<u8>> {
        let sealed = fs::read(path)?;
        self.cipher.decrypt(&sealed)
    }

    /// Returns `Ok(false)` when the blob was already gone.
    pub fn remove(&self, path: &Path) -> RupaResult<bool> {
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(RupaError::StorageIo(e)),
        }
    }

    /// Unique scratch path inside the temp area.
    pub fn scratch_path(&self, name: &str) -> PathBuf {
        let clean: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' { c } else { '_' })
            .collect();
        self.temp_dir
            .join(format!("{}_{}", uuid::Uuid::new_v4().simple(), clean))
    }

    pub fn sweep_temp(&self, max_age: Duration) -> SweepReport {
        sweep_dir(&self.temp_dir, max_age)
    }

    /// Blobs in the files area older than `max_age`, whether or not a record
    /// still points at them.
    pub fn sweep_blobs(&self, max_age: Duration) -> SweepReport {
        sweep_dir(&self.files_dir, max_age)
    }
}

fn sweep_dir(dir: &Path, max_age: Duration) -> SweepReport {
    let mut report = SweepReport::default();
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::error!("Failed to scan {}: {}", dir.display(), e);
            report.failed += 1;
            return report;
        }
    };

    let now = SystemTime::now();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Failed to read entry in {}: {}", dir.display(), e);
                report.failed += 1;
                continue;
            }
        };
        let path = entry.path();
        let age = entry
            .metadata()
            .and_then(|m| m.modified())
            .map(|modified| now.duration_since(modified).unwrap_or_default());
        match age {
            Ok(age) if age > max_age => {
                let result = if path.is_dir() {
                    fs::remove_dir_all(&path)
                } else {
                    fs::remove_file(&path)
                };
                match result {
                    Ok(()) => report.removed += 1,
                    Err(e) => {
                        log::warn!("Failed to remove {}: {}", path.display(), e);
                        report.failed += 1;
                    }
                }
            }
            Ok(_) => {}
            Err(e) => {
                log::warn!("Failed to stat {}: {}", path.display(), e);
                report.failed += 1;
            }
        }
    }
    report
}
