//! Retention sweeps. These run on their own schedule and look at persisted
//! state, so they still clean up after timers lost to a restart.

use std::sync::Arc;

use tokio::time::Instant;

use crate::admission::RateLimiter;
use crate::config::RetentionConfig;
use crate::files::{FileStore, SweepReport};
use crate::inactivity::InactivityTracker;
use crate::merge::MergeCoordinator;

#[derive(Clone)]
pub struct Reaper {
    files: FileStore,
    inactivity: Arc<InactivityTracker>,
    merges: Arc<MergeCoordinator>,
    admission: Arc<RateLimiter>,
    retention: RetentionConfig,
}

impl Reaper {
    pub fn new(
        files: FileStore,
        inactivity: Arc<InactivityTracker>,
        merges: Arc<MergeCoordinator>,
        admission: Arc<RateLimiter>,
        retention: RetentionConfig,
    ) -> Self {
        Self {
            files,
            inactivity,
            merges,
            admission,
            retention,
        }
    }

    pub fn retention(&self) -> &RetentionConfig {
        &self.retention
    }

    /// Deletes every record (and blob) older than the file retention, then
    /// any blob on disk past the same age. One failure never stops the rest.
    pub fn sweep_records(&self, now_unix: i64) -> SweepReport {
        let mut report = SweepReport::default();
        let cutoff = now_unix - self.retention.file_retention.as_secs() as i64;

        match self.files.records().list_older_than(cutoff) {
            Ok(stale) => {
                for record in stale {
                    match self.files.discard(record.id) {
                        Ok(()) => report.removed += 1,
                        Err(e) => {
                            log::error!("Failed to reap file record {}: {}", record.id, e);
                            report.failed += 1;
                        }
                    }
                }
            }
            Err(e) => {
                log::error!("Failed to list expired file records: {}", e);
                report.failed += 1;
            }
        }

        report.merge(self.files.vault().sweep_blobs(self.retention.file_retention));
        report
    }

    pub fn sweep_temp(&self) -> SweepReport {
        self.files.vault().sweep_temp(self.retention.temp_retention)
    }

    /// Record/blob sweep plus the temp area.
    pub fn sweep_files(&self) -> SweepReport {
        let mut report = self.sweep_records(chrono::Utc::now().timestamp());
        report.merge(self.sweep_temp());
        if report.removed > 0 || report.failed > 0 {
            log::info!(
                "File sweep removed {} item(s), {} failure(s)",
                report.removed,
                report.failed
            );
        }
        report
    }

    /// Idle inactivity entries plus rate windows with nothing left in them.
    pub fn sweep_inactive(&self, now: Instant) -> usize {
        let idle = self.inactivity.sweep_idle(now);
        let windows = self.admission.prune_idle(now);
        if idle > 0 || windows > 0 {
            log::info!("Swept {} idle user(s) and {} rate window(s)", idle, windows);
        }
        idle
    }

    pub async fn sweep_merges(&self, now: Instant) -> usize {
        let expired = self.merges.expire_stale(now).await;
        if expired > 0 {
            log::info!("Expired {} merge batch(es)", expired);
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RupaConfig;
    use crate::gateway::ChatRef;
    use crate::lang::Lang;
    use crate::testing::{create_test_store, RecordingMessenger};
    use std::path::PathBuf;
    use std::time::Duration;

    fn reaper_with(store: FileStore) -> (Reaper, Arc<InactivityTracker>, Arc<MergeCoordinator>) {
        let config = RupaConfig::default();
        let messenger = RecordingMessenger::new();
        let inactivity = InactivityTracker::new(messenger.clone(), config.inactivity.clone());
        let merges = MergeCoordinator::new(messenger, store.clone(), config.merge.clone());
        let admission = Arc::new(RateLimiter::new(&config.rate_limit));
        let reaper = Reaper::new(
            store,
            inactivity.clone(),
            merges.clone(),
            admission,
            config.retention,
        );
        (reaper, inactivity, merges)
    }

    #[tokio::test]
    async fn test_sweep_records_by_age() {
        let (store, _temp) = create_test_store();
        let (reaper, _, _) = reaper_with(store.clone());

        let fresh = store.persist(1, "f1", "fresh.png", b"fresh").unwrap();
        let now = fresh.created_at;

        let report = reaper.sweep_records(now);
        assert_eq!(report, SweepReport::default());

        // eleven minutes later the record is past the ten-minute retention
        let report = reaper.sweep_records(now + 11 * 60);
        assert_eq!(report.removed, 1);
        assert!(store.records().is_empty());
        assert!(!fresh.storage_path.exists());
    }

    #[tokio::test]
    async fn test_one_bad_record_does_not_stop_the_sweep() {
        let (store, temp) = create_test_store();
        let (reaper, _, _) = reaper_with(store.clone());

        let stuck: PathBuf = temp.path().join("not-a-file");
        std::fs::create_dir(&stuck).unwrap();
        let bad = store.records().insert(1, "bad", "bad.pdf", stuck, 0).unwrap();
        let good = store.records().insert(1, "good", "good.pdf", temp.path().join("gone.enc"), 0).unwrap();

        let report = reaper.sweep_records(10_000);
        assert_eq!(report.removed, 1);
        assert_eq!(report.failed, 1);
        assert!(store.records().get(good.id).unwrap().is_none());
        assert!(store.records().get(bad.id).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_temp_sweep_leaves_young_files() {
        let (store, _temp) = create_test_store();
        let (reaper, _, _) = reaper_with(store.clone());
        let scratch = store.vault().scratch_path("work.png");
        std::fs::write(&scratch, b"tmp").unwrap();

        assert_eq!(reaper.sweep_temp().removed, 0);
        assert!(scratch.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_inactive_and_merge_sweeps() {
        let (store, _temp) = create_test_store();
        let (reaper, inactivity, merges) = reaper_with(store.clone());

        inactivity.touch(1, ChatRef(1), Lang::En);
        merges.create(2, ChatRef(2), Lang::En);
        let doc = store.persist(2, "d", "d.pdf", b"d").unwrap();
        merges.add_document(2, doc.id).unwrap();

        assert_eq!(reaper.sweep_inactive(Instant::now()), 0);
        assert_eq!(reaper.sweep_merges(Instant::now()).await, 0);

        let later = Instant::now() + Duration::from_secs(301);
        assert_eq!(reaper.sweep_inactive(later), 1);
        assert_eq!(reaper.sweep_merges(later).await, 1);
        assert!(store.records().get(doc.id).unwrap().is_none());
    }
}
