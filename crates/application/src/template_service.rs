use std::sync::Arc;

use ptw_core::{ActorContext, AppError, AppResult};
use ptw_domain::{
    ApprovalStep, AuditAction, PermitAction, PermitTemplate, PermitTemplateInput,
    QualificationGate, TemplateId, TrainingGate,
};
use serde_json::json;
use tracing::info;

use crate::permit_ports::{AuditEvent, TemplateRepository};

/// Input for publishing a template version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishTemplateInput {
    /// Existing template to version, or `None` to start a new one.
    pub template_id: Option<TemplateId>,
    /// Display name.
    pub name: String,
    /// Approval steps.
    pub approval_steps: Vec<ApprovalStep>,
    /// Qualification gate.
    pub qualification_gate: Option<QualificationGate>,
    /// Training gate.
    pub training_gate: Option<TrainingGate>,
}

/// Publishes and reads immutable template snapshots.
#[derive(Clone)]
pub struct TemplateService {
    repository: Arc<dyn TemplateRepository>,
}

impl TemplateService {
    /// Creates a template service.
    #[must_use]
    pub fn new(repository: Arc<dyn TemplateRepository>) -> Self {
        Self { repository }
    }

    /// Publishes a new version; permits already pinned to older versions are unaffected.
    pub async fn publish_template(
        &self,
        actor: &ActorContext,
        input: PublishTemplateInput,
    ) -> AppResult<PermitTemplate> {
        PermitAction::PublishTemplate.authorize(actor.role())?;
        let workspace_id = actor.workspace_id();

        let (template_id, version) = match input.template_id {
            Some(template_id) => {
                let latest = self
                    .repository
                    .find_latest_template(workspace_id, template_id)
                    .await?
                    .ok_or_else(|| {
                        AppError::NotFound(format!(
                            "template '{template_id}' does not exist in workspace '{workspace_id}'"
                        ))
                    })?;
                (template_id, latest.reference().version + 1)
            }
            None => (TemplateId::new(), 1),
        };

        let template = PermitTemplate::new(PermitTemplateInput {
            template_id,
            version,
            name: input.name,
            approval_steps: input.approval_steps,
            qualification_gate: input.qualification_gate,
            training_gate: input.training_gate,
        })?;

        let audit_event = AuditEvent {
            workspace_id,
            actor: actor.actor_id().to_owned(),
            action: AuditAction::PermitTemplatePublished,
            object_type: "permit_template".to_owned(),
            object_id: template_id.to_string(),
            payload: json!({
                "version": version,
                "name": template.name().as_str(),
                "approval_steps": template.approval_steps(),
            }),
        };
        self.repository
            .insert_template_version(workspace_id, template.clone(), audit_event)
            .await?;

        info!(
            workspace_id = %workspace_id,
            template_id = %template_id,
            version,
            "permit template published"
        );
        Ok(template)
    }

    /// Returns the latest version of a template.
    pub async fn get_latest_template(
        &self,
        actor: &ActorContext,
        template_id: TemplateId,
    ) -> AppResult<PermitTemplate> {
        let workspace_id = actor.workspace_id();
        self.repository
            .find_latest_template(workspace_id, template_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "template '{template_id}' does not exist in workspace '{workspace_id}'"
                ))
            })
    }
}
