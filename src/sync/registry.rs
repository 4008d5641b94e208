//! Sync job registry and state machine.
//!
//! Jobs move `PENDING -> RUNNING -> COMPLETED`, or to `FAILED`/`CANCELLED`
//! from either active state. Every transition is checked under the registry's
//! write lock, so two concurrent `create` calls for one data source cannot
//! both succeed.

use crate::error::{MetaError, MetaResult};
use crate::models::{MetadataSyncJob, SchemaInfo, SyncStatus, SyncType};
use crate::sync::store::MetadataStore;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

struct JobEntry {
    job: MetadataSyncJob,
    cancelled: Arc<AtomicBool>,
}

#[derive(Clone)]
pub struct SyncJobRegistry {
    jobs: Arc<RwLock<HashMap<String, JobEntry>>>,
    store: Arc<dyn MetadataStore>,
}

impl SyncJobRegistry {
    /// Create a new registry persisting completed snapshots into `store`.
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            store,
        }
    }

    /// Snapshot store shared with the runner.
    pub fn store(&self) -> Arc<dyn MetadataStore> {
        self.store.clone()
    }

    /// Create a PENDING job. Fails with `Conflict` while another job for the
    /// same data source is PENDING or RUNNING.
    pub async fn create(
        &self,
        data_source_id: &str,
        sync_type: SyncType,
        timeout_seconds: u64,
    ) -> MetaResult<MetadataSyncJob> {
        if data_source_id.is_empty() {
            return Err(MetaError::validation("Data source ID cannot be empty"));
        }
        if timeout_seconds == 0 {
            return Err(MetaError::validation(
                "Job timeout must be greater than 0 seconds",
            ));
        }

        let mut jobs = self.jobs.write().await;
        if let Some(active) = jobs
            .values()
            .find(|e| e.job.data_source_id == data_source_id && e.job.status.is_active())
        {
            return Err(MetaError::conflict(
                format!(
                    "Sync job {} is already {}",
                    active.job.id, active.job.status
                ),
                data_source_id,
            ));
        }

        let job = MetadataSyncJob::new(
            generate_job_id(),
            data_source_id,
            sync_type,
            timeout_seconds,
        );
        jobs.insert(
            job.id.clone(),
            JobEntry {
                job: job.clone(),
                cancelled: Arc::new(AtomicBool::new(false)),
            },
        );

        info!(
            job_id = %job.id,
            data_source_id = %data_source_id,
            sync_type = %sync_type,
            "Sync job created"
        );
        Ok(job)
    }

    /// `PENDING -> RUNNING`.
    pub async fn start(&self, job_id: &str) -> MetaResult<MetadataSyncJob> {
        let mut jobs = self.jobs.write().await;
        let entry = entry_mut(&mut jobs, job_id)?;
        if entry.job.status != SyncStatus::Pending {
            return Err(MetaError::invalid_transition(
                job_id,
                entry.job.status,
                "start",
            ));
        }
        entry.job.status = SyncStatus::Running;
        entry.job.started_at = Some(Utc::now());

        info!(job_id = %job_id, data_source_id = %entry.job.data_source_id, "Sync job started");
        Ok(entry.job.clone())
    }

    /// Record progress of a RUNNING job. `progress` must lie in `[0, 100]`.
    pub async fn update_progress(
        &self,
        job_id: &str,
        progress: i32,
        message: impl Into<String>,
    ) -> MetaResult<MetadataSyncJob> {
        let mut jobs = self.jobs.write().await;
        let entry = entry_mut(&mut jobs, job_id)?;
        if entry.job.status != SyncStatus::Running {
            return Err(MetaError::invalid_transition(
                job_id,
                entry.job.status,
                "update progress of",
            ));
        }
        if !(0..=100).contains(&progress) {
            return Err(MetaError::validation(format!(
                "Progress must be between 0 and 100, got {}",
                progress
            )));
        }
        entry.job.progress = progress as u8;
        entry.job.message = Some(message.into());

        debug!(job_id = %job_id, progress = progress, "Sync job progress");
        Ok(entry.job.clone())
    }

    /// `RUNNING -> COMPLETED`, persisting the snapshot and the last-sync time.
    ///
    /// A persistence failure fails the job instead.
    pub async fn complete(
        &self,
        job_id: &str,
        schemas: Vec<SchemaInfo>,
    ) -> MetaResult<MetadataSyncJob> {
        let mut jobs = self.jobs.write().await;
        let entry = entry_mut(&mut jobs, job_id)?;
        if entry.job.status != SyncStatus::Running {
            return Err(MetaError::invalid_transition(
                job_id,
                entry.job.status,
                "complete",
            ));
        }

        let data_source_id = entry.job.data_source_id.clone();
        let synced_at = entry.job.started_at.unwrap_or_else(Utc::now);
        let table_count: usize = schemas.iter().map(|s| s.tables.len()).sum();

        let persisted = match self.store.save_schemas(&data_source_id, schemas).await {
            Ok(()) => self.store.touch_last_sync(&data_source_id, synced_at).await,
            Err(e) => Err(e),
        };

        if let Err(e) = persisted {
            warn!(job_id = %job_id, error = %e, "Failed to persist snapshot");
            entry.job.status = SyncStatus::Failed;
            entry.job.ended_at = Some(Utc::now());
            entry.job.error_message = Some(format!("Failed to persist snapshot: {}", e));
            return Err(e);
        }

        entry.job.status = SyncStatus::Completed;
        entry.job.progress = 100;
        entry.job.ended_at = Some(Utc::now());
        entry.job.message = Some(format!("Extracted {} tables", table_count));

        info!(
            job_id = %job_id,
            data_source_id = %data_source_id,
            tables = table_count,
            "Sync job completed"
        );
        Ok(entry.job.clone())
    }

    /// `PENDING | RUNNING -> FAILED`.
    pub async fn fail(
        &self,
        job_id: &str,
        error_message: impl Into<String>,
    ) -> MetaResult<MetadataSyncJob> {
        let mut jobs = self.jobs.write().await;
        let entry = entry_mut(&mut jobs, job_id)?;
        if entry.job.status.is_terminal() {
            return Err(MetaError::invalid_transition(
                job_id,
                entry.job.status,
                "fail",
            ));
        }
        let error_message = error_message.into();
        entry.job.status = SyncStatus::Failed;
        entry.job.ended_at = Some(Utc::now());
        entry.job.error_message = Some(error_message.clone());

        warn!(job_id = %job_id, error = %error_message, "Sync job failed");
        Ok(entry.job.clone())
    }

    /// `PENDING | RUNNING -> CANCELLED`. A running extraction stops before its next table.
    pub async fn cancel(&self, job_id: &str) -> MetaResult<MetadataSyncJob> {
        let mut jobs = self.jobs.write().await;
        let entry = entry_mut(&mut jobs, job_id)?;
        if entry.job.status.is_terminal() {
            return Err(MetaError::invalid_transition(
                job_id,
                entry.job.status,
                "cancel",
            ));
        }
        entry.cancelled.store(true, Ordering::SeqCst);
        entry.job.status = SyncStatus::Cancelled;
        entry.job.ended_at = Some(Utc::now());

        info!(job_id = %job_id, "Sync job cancelled");
        Ok(entry.job.clone())
    }

    /// Get a job by ID.
    pub async fn get(&self, job_id: &str) -> MetaResult<MetadataSyncJob> {
        let jobs = self.jobs.read().await;
        jobs.get(job_id)
            .map(|e| e.job.clone())
            .ok_or_else(|| MetaError::not_found("Sync job", job_id))
    }

    /// Jobs of one data source (or all), oldest first.
    pub async fn list(&self, data_source_id: Option<&str>) -> Vec<MetadataSyncJob> {
        let jobs = self.jobs.read().await;
        let mut list: Vec<MetadataSyncJob> = jobs
            .values()
            .filter(|e| data_source_id.is_none_or(|ds| e.job.data_source_id == ds))
            .map(|e| e.job.clone())
            .collect();
        list.sort_by_key(|j| j.created_at);
        list
    }

    /// The PENDING or RUNNING job of a data source, if any.
    pub async fn active_job(&self, data_source_id: &str) -> Option<MetadataSyncJob> {
        let jobs = self.jobs.read().await;
        jobs.values()
            .find(|e| e.job.data_source_id == data_source_id && e.job.status.is_active())
            .map(|e| e.job.clone())
    }

    /// Flag set once the job is cancelled; polled by the extraction loop.
    pub async fn cancellation_token(&self, job_id: &str) -> MetaResult<Arc<AtomicBool>> {
        let jobs = self.jobs.read().await;
        jobs.get(job_id)
            .map(|e| e.cancelled.clone())
            .ok_or_else(|| MetaError::not_found("Sync job", job_id))
    }
}

fn entry_mut<'a>(
    jobs: &'a mut HashMap<String, JobEntry>,
    job_id: &str,
) -> MetaResult<&'a mut JobEntry> {
    jobs.get_mut(job_id)
        .ok_or_else(|| MetaError::not_found("Sync job", job_id))
}

/// Generate a unique job ID.
fn generate_job_id() -> String {
    format!("job_{}", uuid::Uuid::new_v4().simple())
}
