//! Domain entities and invariants of the permit workflow.

#![forbid(unsafe_code)]

mod approval;
mod checklist;
mod gate;
mod permit;
mod reminder;
mod security;
mod template;

pub use approval::{
    ApprovalDecision, ApprovalEvent, ApprovalMode, ApprovalProgress, approval_progress,
};
pub use checklist::{
    CHANGES_TASK_DUE_HOURS, ChecklistItem, PermitTask, TaskStatus, unchecked_required_labels,
};
pub use gate::{
    GateEvaluation, QualificationRecord, TrainingCompletion, evaluate_qualification_gate,
    evaluate_training_gate,
};
pub use permit::{
    Permit, PermitId, PermitMetadata, PermitResolution, PermitSource, PermitStatus,
    PermitStatusUpdate, can_transition, ensure_transition,
};
pub use reminder::{
    DEFAULT_DIGEST_WINDOWS, OWNERS_ADMINS_RECIPIENT_CLASS, ReminderSettings, digest_delivery_key,
};
pub use security::{AuditAction, PermitAction};
pub use template::{
    ApprovalPlan, ApprovalStep, GateMode, PermitTemplate, PermitTemplateInput, QualificationGate,
    TemplateId, TemplateRef, TrainingGate,
};
