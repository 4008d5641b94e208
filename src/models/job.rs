//! Metadata sync job records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default per-job time budget in seconds.
pub const DEFAULT_JOB_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncType {
    Full,
    /// Reuse unchanged tables' structure from the previous snapshot
    Incremental,
}

impl std::fmt::Display for SyncType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Full => write!(f, "FULL"),
            Self::Incremental => write!(f, "INCREMENTAL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl SyncStatus {
    /// Check if the job still blocks new jobs for its data source.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Running)
    }

    /// Check if the job has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Running => write!(f, "RUNNING"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Failed => write!(f, "FAILED"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataSyncJob {
    pub id: String,
    pub data_source_id: String,
    pub sync_type: SyncType,
    pub status: SyncStatus,
    /// In `[0, 100]`
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timeout_seconds: u64,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl MetadataSyncJob {
    /// Create a new PENDING job.
    pub fn new(
        id: impl Into<String>,
        data_source_id: impl Into<String>,
        sync_type: SyncType,
        timeout_seconds: u64,
    ) -> Self {
        Self {
            id: id.into(),
            data_source_id: data_source_id.into(),
            sync_type,
            status: SyncStatus::Pending,
            progress: 0,
            message: None,
            timeout_seconds,
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
            error_message: None,
        }
    }

    /// Wall-clock duration from start to end, when both are known.
    pub fn duration(&self) -> Option<chrono::Duration> {
        match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) => Some(end.signed_duration_since(start)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_job_is_pending() {
        let job = MetadataSyncJob::new("job_1", "ds", SyncType::Full, 60);
        assert_eq!(job.status, SyncStatus::Pending);
        assert_eq!(job.progress, 0);
        assert!(job.started_at.is_none());
        assert!(job.duration().is_none());
    }

    #[test]
    fn test_status_activity() {
        assert!(SyncStatus::Pending.is_active());
        assert!(SyncStatus::Running.is_active());
        assert!(SyncStatus::Completed.is_terminal());
        assert!(SyncStatus::Failed.is_terminal());
        assert!(SyncStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(SyncStatus::Running.to_string(), "RUNNING");
        assert_eq!(
            serde_json::to_string(&SyncType::Incremental).unwrap(),
            "\"INCREMENTAL\""
        );
    }
}
