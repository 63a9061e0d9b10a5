use anyhow::{Result, anyhow};
use rupa_core::hub::Hub;
use rupa_core::reaper::Reaper;
use tokio::time::Instant;
use tokio_cron_scheduler::Job;

/// Expired file records, orphaned blobs and stale scratch files.
pub fn job_file_sweep(reaper: Reaper) -> Result<Job> {
    let interval = reaper.retention().record_sweep_interval;
    Job::new_repeated_async(interval, move |_uuid, _l| {
        let reaper = reaper.clone();
        Box::pin(async move {
            match tokio::task::spawn_blocking(move || reaper.sweep_files()).await {
                Ok(report) => log::debug!(
                    "File sweep finished: {} removed, {} failed",
                    report.removed,
                    report.failed
                ),
                Err(e) => log::error!("File sweep task failed: {}", e),
            }
        })
    })
    .map_err(|e| anyhow!("Failed to create file sweep job: {}", e))
}

/// Users idle past the close threshold, plus per-user bookkeeping nobody
/// references any more.
pub fn job_inactive_sweep(hub: Hub) -> Result<Job> {
    let reaper = hub.reaper();
    let interval = reaper.retention().inactive_sweep_interval;
    Job::new_repeated_async(interval, move |_uuid, _l| {
        let reaper = reaper.clone();
        let hub = hub.clone();
        Box::pin(async move {
            reaper.sweep_inactive(Instant::now());
            let locks = hub.prune_user_locks();
            if locks > 0 {
                log::debug!("Pruned {} idle user lock(s)", locks);
            }
        })
    })
    .map_err(|e| anyhow!("Failed to create inactive sweep job: {}", e))
}

/// Merge batches past their absolute age.
pub fn job_merge_sweep(reaper: Reaper) -> Result<Job> {
    let interval = reaper.retention().merge_sweep_interval;
    Job::new_repeated_async(interval, move |_uuid, _l| {
        let reaper = reaper.clone();
        Box::pin(async move {
            reaper.sweep_merges(Instant::now()).await;
        })
    })
    .map_err(|e| anyhow!("Failed to create merge sweep job: {}", e))
}
