//! Runtime thresholds. Every timeout, window and limit the coordination layer
//! uses lives here so tests can shrink them and deployments can override them
//! from the environment.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{RupaError, RupaResult};

#[derive(Clone, Debug)]
pub struct SessionTimings {
    /// How long an uploaded file waits for an action before it is dropped.
    pub timeout: Duration,
    /// Countdown display resolution.
    pub tick: Duration,
}

#[derive(Clone, Debug)]
pub struct InactivityTimings {
    pub check_interval: Duration,
    pub reminder_after: Duration,
    pub close_after: Duration,
    /// Delay before the follow-up check once a reminder went out.
    pub recheck_after_reminder: Duration,
    /// Extra idle time the background sweep grants beyond `close_after`.
    pub sweep_grace: Duration,
}

#[derive(Clone, Debug)]
pub struct MergeTimings {
    pub initial_debounce: Duration,
    pub arrival_debounce: Duration,
    pub max_age: Duration,
    pub capacity: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockPolicy {
    /// Blocked for the lifetime of the process.
    Permanent,
    /// Blocked until the given time has passed since the block.
    Expiring(Duration),
}

#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max_requests: usize,
    pub block_policy: BlockPolicy,
}

#[derive(Clone, Debug)]
pub struct RetentionConfig {
    pub file_retention: Duration,
    pub temp_retention: Duration,
    pub record_sweep_interval: Duration,
    pub inactive_sweep_interval: Duration,
    pub merge_sweep_interval: Duration,
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub db_path: PathBuf,
    pub files_dir: PathBuf,
    pub temp_dir: PathBuf,
    pub max_file_size: u64,
}

#[derive(Clone, Debug)]
pub struct ToolPaths {
    pub magick: String,
    pub ghostscript: String,
    pub ffmpeg: String,
    pub zip: String,
    pub qpdf: String,
}

#[derive(Clone, Debug)]
pub struct RupaConfig {
    pub session: SessionTimings,
    pub inactivity: InactivityTimings,
    pub merge: MergeTimings,
    pub rate_limit: RateLimitConfig,
    pub retention: RetentionConfig,
    pub storage: StorageConfig,
    pub tools: ToolPaths,
}

impl Default for RupaConfig {
    fn default() -> Self {
        Self {
            session: SessionTimings {
                timeout: Duration::from_secs(120),
                tick: Duration::from_secs(1),
            },
            inactivity: InactivityTimings {
                check_interval: Duration::from_secs(30),
                reminder_after: Duration::from_secs(120),
                close_after: Duration::from_secs(180),
                recheck_after_reminder: Duration::from_secs(60),
                sweep_grace: Duration::from_secs(120),
            },
            merge: MergeTimings {
                initial_debounce: Duration::from_secs(5),
                arrival_debounce: Duration::from_secs(3),
                max_age: Duration::from_secs(300),
                capacity: 10,
            },
            rate_limit: RateLimitConfig {
                window: Duration::from_secs(60),
                max_requests: 30,
                block_policy: BlockPolicy::Permanent,
            },
            retention: RetentionConfig {
                file_retention: Duration::from_secs(10 * 60),
                temp_retention: Duration::from_secs(5 * 60),
                record_sweep_interval: Duration::from_secs(180),
                inactive_sweep_interval: Duration::from_secs(60),
                merge_sweep_interval: Duration::from_secs(60),
            },
            storage: StorageConfig {
                db_path: PathBuf::from("rupa_db"),
                files_dir: PathBuf::from("files"),
                temp_dir: PathBuf::from("temp"),
                max_file_size: 20 * 1024 * 1024,
            },
            tools: ToolPaths {
                magick: "magick".to_string(),
                ghostscript: "gs".to_string(),
                ffmpeg: "ffmpeg".to_string(),
                zip: "zip".to_string(),
                qpdf: "qpdf".to_string(),
            },
        }
    }
}

impl RupaConfig {
    /// Defaults overridden by any `RUPA_*` variables present in the environment.
    pub fn from_env() -> RupaResult<Self> {
        let mut cfg = Self::default();

        cfg.session.timeout = env_secs("RUPA_SESSION_TIMEOUT_SECS", cfg.session.timeout)?;
        cfg.session.tick = env_secs("RUPA_SESSION_TICK_SECS", cfg.session.tick)?;

        let idle = &mut cfg.inactivity;
        idle.check_interval = env_secs("RUPA_INACTIVITY_CHECK_SECS", idle.check_interval)?;
        idle.reminder_after = env_secs("RUPA_INACTIVITY_REMINDER_SECS", idle.reminder_after)?;
        idle.close_after = env_secs("RUPA_INACTIVITY_CLOSE_SECS", idle.close_after)?;
        idle.recheck_after_reminder =
            env_secs("RUPA_INACTIVITY_RECHECK_SECS", idle.recheck_after_reminder)?;
        idle.sweep_grace = env_secs("RUPA_INACTIVITY_SWEEP_GRACE_SECS", idle.sweep_grace)?;

        let merge = &mut cfg.merge;
        merge.initial_debounce = env_secs("RUPA_MERGE_DEBOUNCE_SECS", merge.initial_debounce)?;
        merge.arrival_debounce =
            env_secs("RUPA_MERGE_ARRIVAL_DEBOUNCE_SECS", merge.arrival_debounce)?;
        merge.max_age = env_secs("RUPA_MERGE_MAX_AGE_SECS", merge.max_age)?;
        merge.capacity = env_parse("RUPA_MERGE_CAPACITY", merge.capacity)?;

        let rate = &mut cfg.rate_limit;
        rate.window = env_secs("RUPA_RATE_WINDOW_SECS", rate.window)?;
        rate.max_requests = env_parse("RUPA_RATE_MAX_REQUESTS", rate.max_requests)?;
        // 0 keeps the permanent block, anything else expires the block.
        let block_secs: u64 = env_parse("RUPA_RATE_BLOCK_SECS", 0)?;
        if block_secs > 0 {
            rate.block_policy = BlockPolicy::Expiring(Duration::from_secs(block_secs));
        }

        let retention = &mut cfg.retention;
        retention.file_retention = env_minutes("FILE_RETENTION_MINUTES", retention.file_retention)?;
        retention.temp_retention =
            env_minutes("TEMP_FILE_RETENTION_MINUTES", retention.temp_retention)?;
        retention.record_sweep_interval =
            env_secs("RUPA_RECORD_SWEEP_SECS", retention.record_sweep_interval)?;
        retention.inactive_sweep_interval =
            env_secs("RUPA_INACTIVE_SWEEP_SECS", retention.inactive_sweep_interval)?;
        retention.merge_sweep_interval =
            env_secs("RUPA_MERGE_SWEEP_SECS", retention.merge_sweep_interval)?;

        let storage = &mut cfg.storage;
        if let Ok(path) = env::var("RUPA_DB_PATH") {
            storage.db_path = PathBuf::from(path);
        }
        if let Ok(path) = env::var("RUPA_FILES_DIR") {
            storage.files_dir = PathBuf::from(path);
        }
        if let Ok(path) = env::var("RUPA_TEMP_DIR") {
            storage.temp_dir = PathBuf::from(path);
        }
        storage.max_file_size = env_megabytes("MAX_FILE_SIZE_MB", storage.max_file_size)?;

        let tools = &mut cfg.tools;
        for (name, slot) in [
            ("RUPA_MAGICK_BIN", &mut tools.magick),
            ("RUPA_GS_BIN", &mut tools.ghostscript),
            ("RUPA_FFMPEG_BIN", &mut tools.ffmpeg),
            ("RUPA_ZIP_BIN", &mut tools.zip),
            ("RUPA_QPDF_BIN", &mut tools.qpdf),
        ] {
            if let Ok(value) = env::var(name) {
                *slot = value;
            }
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> RupaResult<()> {
        if self.session.tick.is_zero() || self.inactivity.check_interval.is_zero() {
            return Err(RupaError::Config("timer intervals must be non-zero".into()));
        }
        if self.inactivity.close_after <= self.inactivity.reminder_after {
            return Err(RupaError::Config(
                "inactivity close threshold must exceed the reminder threshold".into(),
            ));
        }
        if self.merge.capacity < 2 {
            return Err(RupaError::Config("merge capacity must be at least 2".into()));
        }
        if self.rate_limit.max_requests == 0 {
            return Err(RupaError::Config("rate limit must allow at least one request".into()));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> RupaResult<T> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| RupaError::Config(format!("{} has an invalid value: {}", name, raw))),
        Err(_) => Ok(default),
    }
}

fn env_secs(name: &str, default: Duration) -> RupaResult<Duration> {
    env_parse(name, default.as_secs()).map(Duration::from_secs)
}

fn env_minutes(name: &str, default: Duration) -> RupaResult<Duration> {
    let minutes = env_parse(name, default.as_secs() / 60)?;
    minutes
        .checked_mul(60)
        .map(Duration::from_secs)
        .ok_or_else(|| RupaError::Config(format!("{} is out of range: {}", name, minutes)))
}

/// Reads a size given in MB and returns it in bytes.
fn env_megabytes(name: &str, default_bytes: u64) -> RupaResult<u64> {
    let mb = env_parse(name, default_bytes / (1024 * 1024))?;
    mb.checked_mul(1024 * 1024)
        .ok_or_else(|| RupaError::Config(format!("{} is out of range: {}", name, mb)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let cfg = RupaConfig::default();
        assert_eq!(cfg.session.timeout, Duration::from_secs(120));
        assert_eq!(cfg.inactivity.reminder_after, Duration::from_secs(120));
        assert_eq!(cfg.inactivity.close_after, Duration::from_secs(180));
        assert_eq!(cfg.merge.initial_debounce, Duration::from_secs(5));
        assert_eq!(cfg.merge.arrival_debounce, Duration::from_secs(3));
        assert_eq!(cfg.merge.max_age, Duration::from_secs(300));
        assert_eq!(cfg.merge.capacity, 10);
        assert_eq!(cfg.rate_limit.block_policy, BlockPolicy::Permanent);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_inverted_inactivity_thresholds() {
        let mut cfg = RupaConfig::default();
        cfg.inactivity.close_after = Duration::from_secs(60);
        assert!(matches!(cfg.validate(), Err(RupaError::Config(_))));
    }

    #[test]
    fn test_env_parse_reports_bad_values() {
        // Unique name so parallel tests never race on it.
        let name = "RUPA_TEST_ONLY_BAD_NUMBER";
        env::set_var(name, "twelve");
        let result: RupaResult<u64> = env_parse(name, 3);
        env::remove_var(name);
        assert!(matches!(result, Err(RupaError::Config(_))));
        assert_eq!(env_parse::<u64>("RUPA_TEST_ONLY_UNSET", 3).unwrap(), 3);
    }

    #[test]
    fn test_oversized_units_are_config_errors() {
        let name = "RUPA_TEST_ONLY_HUGE_SIZE";
        env::set_var(name, u64::MAX.to_string());
        let megabytes = env_megabytes(name, 20 * 1024 * 1024);
        let minutes = env_minutes(name, Duration::from_secs(600));
        env::remove_var(name);
        assert!(matches!(megabytes, Err(RupaError::Config(_))));
        assert!(matches!(minutes, Err(RupaError::Config(_))));

        let name = "RUPA_TEST_ONLY_SMALL_SIZE";
        env::set_var(name, "3");
        let megabytes = env_megabytes(name, 20 * 1024 * 1024);
        env::remove_var(name);
        assert_eq!(megabytes.unwrap(), 3 * 1024 * 1024);
        assert_eq!(
            env_megabytes("RUPA_TEST_ONLY_UNSET_SIZE", 20 * 1024 * 1024).unwrap(),
            20 * 1024 * 1024
        );
    }
}
