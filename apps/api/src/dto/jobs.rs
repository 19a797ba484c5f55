use ptw_application::{DigestResult, JobRunSummary};
use serde::Serialize;
use ts_rs::TS;

/// Counts reported by an activation or expiry run.
#[derive(Debug, Serialize, TS)]
#[ts(export, export_to = "job-run-response.ts")]
pub struct JobRunResponse {
    pub transitioned: usize,
    pub skipped: usize,
}

/// Per-workspace digest outcome.
#[derive(Debug, Serialize, TS)]
#[ts(export, export_to = "digest-result-response.ts")]
pub struct DigestResultResponse {
    pub workspace_id: String,
    #[ts(type = "number")]
    pub expiring_count: u64,
    pub claimed: bool,
    pub delivered: bool,
}

/// Digest run report.
#[derive(Debug, Serialize, TS)]
#[ts(export, export_to = "digest-run-response.ts")]
pub struct DigestRunResponse {
    pub results: Vec<DigestResultResponse>,
}

impl From<JobRunSummary> for JobRunResponse {
    fn from(value: JobRunSummary) -> Self {
        Self {
            transitioned: value.transitioned,
            skipped: value.skipped,
        }
    }
}

impl From<DigestResult> for DigestResultResponse {
    fn from(value: DigestResult) -> Self {
        Self {
            workspace_id: value.workspace_id.to_string(),
            expiring_count: value.expiring_count,
            claimed: value.claimed,
            delivered: value.delivered,
        }
    }
}
