use async_trait::async_trait;
use chrono::NaiveDate;
use ptw_core::{AppResult, WorkspaceId};
use ptw_domain::{QualificationRecord, TrainingCompletion};

use super::AuditEvent;

/// Port over contractor credentials.
///
/// A contractor holds at most one record per qualification type and one
/// completion per training module; saving replaces the stored row.
#[async_trait]
pub trait CredentialRepository: Send + Sync {
    /// Lists qualification records held by a contractor.
    async fn list_qualifications(
        &self,
        workspace_id: WorkspaceId,
        contractor_id: &str,
    ) -> AppResult<Vec<QualificationRecord>>;

    /// Lists training modules completed by a contractor.
    async fn list_training_completions(
        &self,
        workspace_id: WorkspaceId,
        contractor_id: &str,
    ) -> AppResult<Vec<TrainingCompletion>>;

    /// Counts qualification records with an expiry on or before `horizon`.
    async fn count_qualifications_expiring(
        &self,
        workspace_id: WorkspaceId,
        horizon: NaiveDate,
    ) -> AppResult<u64>;

    /// Inserts or replaces a qualification record with its audit event.
    async fn save_qualification(
        &self,
        workspace_id: WorkspaceId,
        contractor_id: &str,
        record: QualificationRecord,
        audit_event: AuditEvent,
    ) -> AppResult<()>;

    /// Inserts or replaces a training completion with its audit event.
    async fn save_training_completion(
        &self,
        workspace_id: WorkspaceId,
        contractor_id: &str,
        completion: TrainingCompletion,
        audit_event: AuditEvent,
    ) -> AppResult<()>;
}
