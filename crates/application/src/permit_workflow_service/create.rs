use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::*;

/// Input for creating a draft permit.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatePermitInput {
    /// Permit title.
    pub title: String,
    /// Work location.
    pub location: String,
    /// Contractor performing the work.
    pub contractor_id: Option<String>,
    /// Template to pin at its latest version.
    pub template_id: Option<TemplateId>,
    /// Planned start.
    pub start_at: Option<DateTime<Utc>>,
    /// Planned end.
    pub end_at: Option<DateTime<Utc>>,
    /// Creation channel; offline resubmissions are treated like online ones.
    pub source: PermitSource,
    /// Extra metadata keys carried verbatim.
    pub extensions: BTreeMap<String, Value>,
}

impl PermitWorkflowService {
    /// Creates a draft permit.
    pub async fn create_permit(
        &self,
        actor: &ActorContext,
        input: CreatePermitInput,
    ) -> AppResult<Permit> {
        PermitAction::Create.authorize(actor.role())?;
        let workspace_id = actor.workspace_id();

        let title = NonEmptyString::for_field("title", input.title)?;
        let location = NonEmptyString::for_field("location", input.location)?;
        if let (Some(start_at), Some(end_at)) = (input.start_at, input.end_at)
            && end_at < start_at
        {
            return Err(AppError::Validation(
                "end_at must not be before start_at".to_owned(),
            ));
        }

        let template: Option<TemplateRef> = match input.template_id {
            Some(template_id) => Some(
                self.template_repository
                    .find_latest_template(workspace_id, template_id)
                    .await?
                    .ok_or_else(|| {
                        AppError::NotFound(format!(
                            "template '{template_id}' does not exist in workspace '{workspace_id}'"
                        ))
                    })?
                    .reference(),
            ),
            None => None,
        };

        let mut metadata = PermitMetadata::new(location, input.contractor_id);
        metadata.extensions = input.extensions;

        let now = self.clock.now();
        let permit = Permit {
            id: PermitId::new(),
            workspace_id,
            title: title.into(),
            status: PermitStatus::Draft,
            metadata,
            start_at: input.start_at,
            end_at: input.end_at,
            template,
            source: input.source,
            created_by: actor.actor_id().to_owned(),
            created_at: now,
            updated_at: now,
        };

        let audit_event = AuditEvent::for_permit(
            workspace_id,
            actor.actor_id(),
            AuditAction::PermitCreated,
            permit.id,
            json!({
                "title": permit.title,
                "source": permit.source.as_str(),
                "template": permit.template.map(|reference| json!({
                    "template_id": reference.template_id,
                    "version": reference.version,
                })),
            }),
        );
        self.permit_repository
            .insert_permit(permit.clone(), audit_event)
            .await?;

        info!(
            workspace_id = %workspace_id,
            permit_id = %permit.id,
            source = permit.source.as_str(),
            "permit created"
        );
        Ok(permit)
    }
}
