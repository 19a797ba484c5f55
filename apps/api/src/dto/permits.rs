use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use ptw_application::{
    CreatePermitInput, DecisionInput, DecisionOutcome, PermitDetail, TransitionInput,
    TransitionOutcome,
};
use ptw_core::AppError;
use ptw_domain::{
    ApprovalEvent, ApprovalProgress, ChecklistItem, Permit, PermitResolution, PermitSource,
    PermitTask, TemplateId,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;
use uuid::Uuid;

use super::templates::TemplateResponse;

/// Incoming payload for permit creation.
#[derive(Debug, Deserialize, TS)]
#[ts(export, export_to = "create-permit-request.ts")]
pub struct CreatePermitRequest {
    pub title: String,
    pub location: String,
    #[serde(default)]
    pub contractor_id: Option<String>,
    #[serde(default)]
    pub template_id: Option<String>,
    /// RFC 3339 timestamp.
    #[serde(default)]
    pub start_at: Option<String>,
    /// RFC 3339 timestamp.
    #[serde(default)]
    pub end_at: Option<String>,
    /// `online` (default) or `offline_queue`.
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    #[ts(type = "Record<string, unknown>")]
    pub extensions: BTreeMap<String, Value>,
}

/// One mutation against an existing permit.
#[derive(Debug, Deserialize, TS)]
#[serde(tag = "action", content = "input", rename_all = "snake_case")]
#[ts(export, export_to = "permit-action-request.ts")]
pub enum PermitActionRequest {
    Transition(TransitionRequest),
    Decision(DecisionRequest),
    Checklist(ChecklistActionRequest),
    Task(TaskActionRequest),
}

/// Requested status change.
#[derive(Debug, Deserialize, TS)]
#[ts(export, export_to = "transition-request.ts")]
pub struct TransitionRequest {
    pub next_status: String,
    #[serde(default)]
    pub closure_note: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Approver decision.
#[derive(Debug, Deserialize, TS)]
#[ts(export, export_to = "decision-request.ts")]
pub struct DecisionRequest {
    /// `approved`, `rejected` or `changes`.
    pub decision: String,
    pub comment: String,
}

/// Checklist mutation.
#[derive(Debug, Deserialize, TS)]
#[serde(tag = "op", rename_all = "snake_case")]
#[ts(export, export_to = "checklist-action-request.ts")]
pub enum ChecklistActionRequest {
    Add {
        label: String,
        #[serde(default)]
        required: bool,
    },
    Toggle {
        item_id: String,
        checked: bool,
    },
}

/// Task mutation.
#[derive(Debug, Deserialize, TS)]
#[serde(tag = "op", rename_all = "snake_case")]
#[ts(export, export_to = "task-action-request.ts")]
pub enum TaskActionRequest {
    Complete { task_id: String },
}

/// API representation of a permit.
#[derive(Debug, Serialize, TS)]
#[ts(export, export_to = "permit-response.ts")]
pub struct PermitResponse {
    pub id: String,
    pub workspace_id: String,
    pub title: String,
    pub status: String,
    pub location: String,
    pub contractor_id: Option<String>,
    pub resolution: Option<PermitResolutionResponse>,
    #[ts(type = "Record<string, unknown>")]
    pub extensions: BTreeMap<String, Value>,
    pub start_at: Option<String>,
    pub end_at: Option<String>,
    pub template_id: Option<String>,
    pub template_version: Option<i32>,
    pub source: String,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Closure, cancellation or change outcome text.
#[derive(Debug, Serialize, TS)]
#[ts(export, export_to = "permit-resolution-response.ts")]
pub struct PermitResolutionResponse {
    /// `closed`, `cancelled`, `changes_requested` or `rejected`.
    pub kind: String,
    pub text: String,
}

/// Approval chain progress for the current round.
#[derive(Debug, Serialize, TS)]
#[ts(export, export_to = "approval-progress-response.ts")]
pub struct ApprovalProgressResponse {
    pub next_role: Option<String>,
    pub total_steps: usize,
    pub approved_count: usize,
    pub complete: bool,
}

/// Recorded approval decision.
#[derive(Debug, Serialize, TS)]
#[ts(export, export_to = "approval-event-response.ts")]
pub struct ApprovalEventResponse {
    pub actor_id: String,
    pub actor_role: String,
    pub decision: String,
    pub mode: String,
    pub comment: String,
    pub decided_at: String,
}

/// API representation of a checklist item.
#[derive(Debug, Serialize, TS)]
#[ts(export, export_to = "checklist-item-response.ts")]
pub struct ChecklistItemResponse {
    pub id: String,
    pub label: String,
    pub required: bool,
    pub checked: bool,
    pub checked_by: Option<String>,
    pub checked_at: Option<String>,
}

/// API representation of a permit task.
#[derive(Debug, Serialize, TS)]
#[ts(export, export_to = "permit-task-response.ts")]
pub struct PermitTaskResponse {
    pub id: String,
    pub title: String,
    pub status: String,
    pub due_at: Option<String>,
    pub assignee: Option<String>,
    pub completed_at: Option<String>,
}

/// Permit with checklist, tasks, approvals and sequencer state.
#[derive(Debug, Serialize, TS)]
#[ts(export, export_to = "permit-detail-response.ts")]
pub struct PermitDetailResponse {
    pub permit: PermitResponse,
    pub template: Option<TemplateResponse>,
    pub approvals: Vec<ApprovalEventResponse>,
    pub progress: ApprovalProgressResponse,
    pub checklist: Vec<ChecklistItemResponse>,
    pub tasks: Vec<PermitTaskResponse>,
}

/// Result of a permit action, tagged like the request.
#[derive(Debug, Serialize, TS)]
#[serde(tag = "action", content = "result", rename_all = "snake_case")]
#[ts(export, export_to = "permit-action-response.ts")]
pub enum PermitActionResponse {
    Transition {
        permit: PermitResponse,
        warnings: Vec<String>,
    },
    Decision {
        permit: PermitResponse,
        progress: ApprovalProgressResponse,
        task: Option<PermitTaskResponse>,
        warnings: Vec<String>,
    },
    Checklist(ChecklistItemResponse),
    Task(PermitTaskResponse),
}

pub(super) fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>, AppError> {
    DateTime::parse_from_rfc3339(value)
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .map_err(|error| AppError::Validation(format!("invalid {field} '{value}': {error}")))
}

pub fn parse_uuid(field: &str, value: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(value)
        .map_err(|error| AppError::Validation(format!("invalid {field} '{value}': {error}")))
}

pub(super) fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339()
}

impl TryFrom<CreatePermitRequest> for CreatePermitInput {
    type Error = AppError;

    fn try_from(value: CreatePermitRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            title: value.title,
            location: value.location,
            contractor_id: value.contractor_id,
            template_id: value
                .template_id
                .as_deref()
                .map(TemplateId::parse)
                .transpose()?,
            start_at: value
                .start_at
                .as_deref()
                .map(|raw| parse_timestamp("start_at", raw))
                .transpose()?,
            end_at: value
                .end_at
                .as_deref()
                .map(|raw| parse_timestamp("end_at", raw))
                .transpose()?,
            source: value
                .source
                .as_deref()
                .map(str::parse::<PermitSource>)
                .transpose()?
                .unwrap_or(PermitSource::Online),
            extensions: value.extensions,
        })
    }
}

impl TryFrom<TransitionRequest> for TransitionInput {
    type Error = AppError;

    fn try_from(value: TransitionRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            next_status: value.next_status.parse()?,
            closure_note: value.closure_note,
            reason: value.reason,
        })
    }
}

impl TryFrom<DecisionRequest> for DecisionInput {
    type Error = AppError;

    fn try_from(value: DecisionRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            decision: value.decision.parse()?,
            comment: value.comment,
        })
    }
}

impl From<Permit> for PermitResponse {
    fn from(value: Permit) -> Self {
        Self {
            id: value.id.to_string(),
            workspace_id: value.workspace_id.to_string(),
            title: value.title,
            status: value.status.as_str().to_owned(),
            location: value.metadata.location,
            contractor_id: value.metadata.contractor_id,
            resolution: value.metadata.resolution.map(PermitResolutionResponse::from),
            extensions: value.metadata.extensions,
            start_at: value.start_at.map(format_timestamp),
            end_at: value.end_at.map(format_timestamp),
            template_id: value
                .template
                .map(|reference| reference.template_id.to_string()),
            template_version: value.template.map(|reference| reference.version),
            source: value.source.as_str().to_owned(),
            created_by: value.created_by,
            created_at: format_timestamp(value.created_at),
            updated_at: format_timestamp(value.updated_at),
        }
    }
}

impl From<PermitResolution> for PermitResolutionResponse {
    fn from(value: PermitResolution) -> Self {
        let (kind, text) = match value {
            PermitResolution::Closed { closure_note } => ("closed", closure_note),
            PermitResolution::Cancelled { reason } => ("cancelled", reason),
            PermitResolution::ChangesRequested { reason } => ("changes_requested", reason),
            PermitResolution::Rejected { reason } => ("rejected", reason),
        };

        Self {
            kind: kind.to_owned(),
            text,
        }
    }
}

impl From<ApprovalProgress> for ApprovalProgressResponse {
    fn from(value: ApprovalProgress) -> Self {
        Self {
            next_role: value.next_role.map(|role| role.as_str().to_owned()),
            total_steps: value.total_steps,
            approved_count: value.approved_count,
            complete: value.is_complete(),
        }
    }
}

impl From<ApprovalEvent> for ApprovalEventResponse {
    fn from(value: ApprovalEvent) -> Self {
        Self {
            actor_id: value.actor_id,
            actor_role: value.actor_role.as_str().to_owned(),
            decision: value.decision.as_str().to_owned(),
            mode: value.mode.as_str().to_owned(),
            comment: value.comment,
            decided_at: format_timestamp(value.decided_at),
        }
    }
}

impl From<ChecklistItem> for ChecklistItemResponse {
    fn from(value: ChecklistItem) -> Self {
        Self {
            id: value.id.to_string(),
            label: value.label,
            required: value.required,
            checked: value.checked,
            checked_by: value.checked_by,
            checked_at: value.checked_at.map(format_timestamp),
        }
    }
}

impl From<PermitTask> for PermitTaskResponse {
    fn from(value: PermitTask) -> Self {
        Self {
            id: value.id.to_string(),
            title: value.title,
            status: value.status.as_str().to_owned(),
            due_at: value.due_at.map(format_timestamp),
            assignee: value.assignee,
            completed_at: value.completed_at.map(format_timestamp),
        }
    }
}

impl From<PermitDetail> for PermitDetailResponse {
    fn from(value: PermitDetail) -> Self {
        Self {
            permit: value.permit.into(),
            template: value.template.map(TemplateResponse::from),
            approvals: value
                .approvals
                .into_iter()
                .map(ApprovalEventResponse::from)
                .collect(),
            progress: value.progress.into(),
            checklist: value
                .checklist
                .into_iter()
                .map(ChecklistItemResponse::from)
                .collect(),
            tasks: value
                .tasks
                .into_iter()
                .map(PermitTaskResponse::from)
                .collect(),
        }
    }
}

impl From<TransitionOutcome> for PermitActionResponse {
    fn from(value: TransitionOutcome) -> Self {
        Self::Transition {
            permit: value.permit.into(),
            warnings: value.warnings,
        }
    }
}

impl From<DecisionOutcome> for PermitActionResponse {
    fn from(value: DecisionOutcome) -> Self {
        Self::Decision {
            permit: value.permit.into(),
            progress: value.progress.into(),
            task: value.task.map(PermitTaskResponse::from),
            warnings: value.warnings,
        }
    }
}
