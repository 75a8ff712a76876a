//! Shared application state for all routes.

use crate::config::Settings;
use crate::db::DbPool;
use crate::error::{AppError, JobError};
use crate::handlers::spawn_job;
use crate::jobs::{FileJobQueue, JobQueue};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub settings: Arc<Settings>,
    /// Present when `ASYNC_PATH` is configured.
    pub jobs: Option<Arc<dyn JobQueue>>,
}

impl AppState {
    /// Connect the pool and open the job queue named by `settings`. Jobs left
    /// pending by a previous run are started again.
    pub async fn from_settings(settings: Settings) -> Result<Self, AppError> {
        let pool = DbPool::connect(&settings.database_url, settings.max_connections).await?;
        let jobs: Option<Arc<dyn JobQueue>> = match &settings.async_path {
            Some(dir) => Some(Arc::new(FileJobQueue::open(dir).await?)),
            None => None,
        };
        let state = AppState {
            pool,
            settings: Arc::new(settings),
            jobs,
        };
        state.resume_jobs().await?;
        Ok(state)
    }

    /// Replay every queued request without a recorded outcome.
    pub async fn resume_jobs(&self) -> Result<usize, JobError> {
        let Some(jobs) = &self.jobs else {
            return Ok(0);
        };
        let pending = jobs.pending().await?;
        let count = pending.len();
        for (id, job) in pending {
            tracing::info!(job = %id, method = %job.method, path = %job.path, "resuming queued job");
            spawn_job(self.clone(), id, job);
        }
        Ok(count)
    }
}
