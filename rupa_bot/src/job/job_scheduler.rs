use anyhow::Result;
use rupa_core::hub::Hub;
use tokio_cron_scheduler::JobScheduler;

use crate::job::handler::{job_file_sweep, job_inactive_sweep, job_merge_sweep};

pub async fn schedule_jobs(hub: &Hub) -> Result<JobScheduler> {
    log::info!("Initializing job scheduler...");

    let scheduler = match JobScheduler::new().await {
        Ok(scheduler) => scheduler,
        Err(e) => {
            log::error!("Failed to create job scheduler: {}", e);
            return Err(anyhow::anyhow!("Failed to create job scheduler: {}", e));
        }
    };

    let job_file_sweep = job_file_sweep(hub.reaper())?;
    let job_inactive_sweep = job_inactive_sweep(hub.clone())?;
    let job_merge_sweep = job_merge_sweep(hub.reaper())?;

    if let Err(e) = scheduler.add(job_file_sweep).await {
        log::error!("Failed to add file sweep job to scheduler: {}", e);
        return Err(anyhow::anyhow!("Failed to add file sweep job: {}", e));
    }

    if let Err(e) = scheduler.add(job_inactive_sweep).await {
        log::error!("Failed to add inactive sweep job to scheduler: {}", e);
        return Err(anyhow::anyhow!("Failed to add inactive sweep job: {}", e));
    }

    if let Err(e) = scheduler.add(job_merge_sweep).await {
        log::error!("Failed to add merge sweep job to scheduler: {}", e);
        return Err(anyhow::anyhow!("Failed to add merge sweep job: {}", e));
    }

    if let Err(e) = scheduler.start().await {
        log::error!("Failed to start job scheduler: {}", e);
        return Err(anyhow::anyhow!("Failed to start scheduler: {}", e));
    }

    log::info!("Job scheduler started successfully");
    Ok(scheduler)
}
