use thiserror::Error;

/// Errors surfaced by the session and file coordination layer.
#[derive(Debug, Error)]
pub enum RupaError {
    #[error("user {0} is rate limited")]
    AdmissionDenied(i64),
    #[error("no active session for user {0}")]
    SessionNotFound(i64),
    #[error("file record {0} not found")]
    RecordNotFound(u64),
    #[error("transform failed: {0}")]
    TransformFailed(String),
    #[error("crypto failure: {0}")]
    CryptoFailed(String),
    #[error("storage I/O failure: {0}")]
    StorageIo(#[from] std::io::Error),
    #[error("record store failure: {0}")]
    Store(#[from] sled::Error),
    #[error("serialization failure: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("gateway failure: {0}")]
    Gateway(String),
    #[error("merge needs at least 2 files, batch has {0}")]
    InsufficientFiles(usize),
    #[error("wrong file type: {0}")]
    WrongFileType(String),
    #[error("batch is full ({0} files)")]
    BatchFull(usize),
    #[error("merge batch for user {0} timed out")]
    BatchTimedOut(i64),
    #[error("file too large: {size} bytes (limit {limit})")]
    FileTooLarge { size: u64, limit: u64 },
    #[error("invalid callback payload: {0}")]
    InvalidCallback(String),
    #[error("configuration error: {0}")]
    Config(String),
}

pub type RupaResult<T> = Result<T, RupaError>;

/// What the user gets told when an operation fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserNotice {
    RateLimited,
    WrongFileType,
    InsufficientFiles,
    BatchFull,
    FileTooLarge,
    /// The stored blob could not be read back; the file was dropped.
    Corrupted,
    MergeExpired,
    FileNotFound,
    /// Generic failure, answered with a restart button.
    Failed,
}

impl RupaError {
    pub fn user_notice(&self) -> UserNotice {
        match self {
            RupaError::AdmissionDenied(_) => UserNotice::RateLimited,
            RupaError::WrongFileType(_) => UserNotice::WrongFileType,
            RupaError::InsufficientFiles(_) => UserNotice::InsufficientFiles,
            RupaError::BatchFull(_) => UserNotice::BatchFull,
            RupaError::FileTooLarge { .. } => UserNotice::FileTooLarge,
            RupaError::CryptoFailed(_) | RupaError::StorageIo(_) => UserNotice::Corrupted,
            RupaError::BatchTimedOut(_) => UserNotice::MergeExpired,
            RupaError::RecordNotFound(_) => UserNotice::FileNotFound,
            _ => UserNotice::Failed,
        }
    }

    /// Corrective notices keep the user in their current flow; everything else
    /// ends with a restart affordance.
    pub fn needs_restart(&self) -> bool {
        matches!(
            self.user_notice(),
            UserNotice::Failed | UserNotice::Corrupted | UserNotice::MergeExpired
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corrective_errors_do_not_restart() {
        assert!(!RupaError::WrongFileType("pdf".into()).needs_restart());
        assert!(!RupaError::InsufficientFiles(1).needs_restart());
        assert!(!RupaError::AdmissionDenied(7).needs_restart());
        assert!(!RupaError::BatchFull(10).needs_restart());
    }

    #[test]
    fn test_failures_restart() {
        assert!(RupaError::TransformFailed("gs exited 1".into()).needs_restart());
        assert!(RupaError::CryptoFailed("tag mismatch".into()).needs_restart());
        assert_eq!(
            RupaError::CryptoFailed("x".into()).user_notice(),
            UserNotice::Corrupted
        );
        assert_eq!(RupaError::BatchTimedOut(1).user_notice(), UserNotice::MergeExpired);
    }
}
