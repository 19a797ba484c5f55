use ptw_core::WorkspaceRole;
use ptw_domain::{
    ApprovalDecision, ApprovalMode, PermitMetadata, PermitSource, TaskStatus, TemplateId,
    TemplateRef,
};

use super::*;

#[derive(Debug, FromRow)]
pub(super) struct PermitRow {
    id: Uuid,
    workspace_id: Uuid,
    title: String,
    status: String,
    metadata: Value,
    start_at: Option<DateTime<Utc>>,
    end_at: Option<DateTime<Utc>>,
    template_id: Option<Uuid>,
    template_version: Option<i32>,
    source: String,
    created_by: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PermitRow> for Permit {
    type Error = AppError;

    fn try_from(row: PermitRow) -> AppResult<Self> {
        let metadata: PermitMetadata = serde_json::from_value(row.metadata).map_err(|error| {
            AppError::Internal(format!("invalid metadata on permit '{}': {error}", row.id))
        })?;
        let template = match (row.template_id, row.template_version) {
            (Some(template_id), Some(version)) => Some(TemplateRef {
                template_id: TemplateId::from_uuid(template_id),
                version,
            }),
            _ => None,
        };

        Ok(Self {
            id: PermitId::from_uuid(row.id),
            workspace_id: WorkspaceId::from_uuid(row.workspace_id),
            title: row.title,
            status: row.status.parse::<PermitStatus>()?,
            metadata,
            start_at: row.start_at,
            end_at: row.end_at,
            template,
            source: row.source.parse::<PermitSource>()?,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub(super) struct ApprovalEventRow {
    permit_id: Uuid,
    actor_id: String,
    actor_role: String,
    decision: String,
    mode: String,
    comment: String,
    decided_at: DateTime<Utc>,
}

impl TryFrom<ApprovalEventRow> for ApprovalEvent {
    type Error = AppError;

    fn try_from(row: ApprovalEventRow) -> AppResult<Self> {
        Ok(Self {
            permit_id: PermitId::from_uuid(row.permit_id),
            actor_id: row.actor_id,
            actor_role: row.actor_role.parse::<WorkspaceRole>()?,
            decision: row.decision.parse::<ApprovalDecision>()?,
            mode: row.mode.parse::<ApprovalMode>()?,
            comment: row.comment,
            decided_at: row.decided_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub(super) struct ChecklistItemRow {
    id: Uuid,
    permit_id: Uuid,
    label: String,
    required: bool,
    checked: bool,
    checked_by: Option<String>,
    checked_at: Option<DateTime<Utc>>,
}

impl From<ChecklistItemRow> for ChecklistItem {
    fn from(row: ChecklistItemRow) -> Self {
        Self {
            id: row.id,
            permit_id: PermitId::from_uuid(row.permit_id),
            label: row.label,
            required: row.required,
            checked: row.checked,
            checked_by: row.checked_by,
            checked_at: row.checked_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub(super) struct PermitTaskRow {
    id: Uuid,
    permit_id: Uuid,
    title: String,
    status: String,
    due_at: Option<DateTime<Utc>>,
    assignee: Option<String>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<PermitTaskRow> for PermitTask {
    type Error = AppError;

    fn try_from(row: PermitTaskRow) -> AppResult<Self> {
        Ok(Self {
            id: row.id,
            permit_id: PermitId::from_uuid(row.permit_id),
            title: row.title,
            status: row.status.parse::<TaskStatus>()?,
            due_at: row.due_at,
            assignee: row.assignee,
            completed_at: row.completed_at,
        })
    }
}

pub(super) fn metadata_json(permit_id: PermitId, metadata: &PermitMetadata) -> AppResult<Value> {
    serde_json::to_value(metadata).map_err(|error| {
        AppError::Internal(format!(
            "failed to encode metadata for permit '{permit_id}': {error}"
        ))
    })
}
