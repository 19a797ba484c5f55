use chrono::NaiveDate;
use ptw_application::{CredentialRepository, TemplateRepository, WorkspaceDirectory};
use ptw_domain::{TemplateId, TemplateRef};

use super::*;

#[async_trait]
impl TemplateRepository for InMemoryWorkspaceStore {
    async fn find_latest_template(
        &self,
        workspace_id: WorkspaceId,
        template_id: TemplateId,
    ) -> AppResult<Option<PermitTemplate>> {
        Ok(self
            .state
            .read()
            .await
            .templates
            .iter()
            .filter(|(stored_workspace, template)| {
                *stored_workspace == workspace_id && template.reference().template_id == template_id
            })
            .map(|(_, template)| template)
            .max_by_key(|template| template.reference().version)
            .cloned())
    }

    async fn find_template_version(
        &self,
        workspace_id: WorkspaceId,
        reference: TemplateRef,
    ) -> AppResult<Option<PermitTemplate>> {
        Ok(self
            .state
            .read()
            .await
            .templates
            .iter()
            .find(|(stored_workspace, template)| {
                *stored_workspace == workspace_id && template.reference() == reference
            })
            .map(|(_, template)| template.clone()))
    }

    async fn insert_template_version(
        &self,
        workspace_id: WorkspaceId,
        template: PermitTemplate,
        audit_event: AuditEvent,
    ) -> AppResult<()> {
        let mut state = self.state.write().await;
        let reference = template.reference();
        if state.templates.iter().any(|(stored_workspace, stored)| {
            *stored_workspace == workspace_id && stored.reference() == reference
        }) {
            return Err(AppError::Conflict(format!(
                "template '{}' version {} already exists",
                reference.template_id, reference.version
            )));
        }

        state.templates.push((workspace_id, template));
        state.audit_events.push(audit_event);
        Ok(())
    }
}

#[async_trait]
impl CredentialRepository for InMemoryWorkspaceStore {
    async fn list_qualifications(
        &self,
        workspace_id: WorkspaceId,
        contractor_id: &str,
    ) -> AppResult<Vec<QualificationRecord>> {
        Ok(self
            .state
            .read()
            .await
            .qualifications
            .iter()
            .filter(|(stored_workspace, contractor, _)| {
                *stored_workspace == workspace_id && contractor == contractor_id
            })
            .map(|(_, _, record)| record.clone())
            .collect())
    }

    async fn list_training_completions(
        &self,
        workspace_id: WorkspaceId,
        contractor_id: &str,
    ) -> AppResult<Vec<TrainingCompletion>> {
        Ok(self
            .state
            .read()
            .await
            .training_completions
            .iter()
            .filter(|(stored_workspace, contractor, _)| {
                *stored_workspace == workspace_id && contractor == contractor_id
            })
            .map(|(_, _, completion)| completion.clone())
            .collect())
    }

    async fn count_qualifications_expiring(
        &self,
        workspace_id: WorkspaceId,
        horizon: NaiveDate,
    ) -> AppResult<u64> {
        let count = self
            .state
            .read()
            .await
            .qualifications
            .iter()
            .filter(|(stored_workspace, _, record)| {
                *stored_workspace == workspace_id
                    && record.expiry_date.is_some_and(|expiry| expiry <= horizon)
            })
            .count();

        Ok(count as u64)
    }

    async fn save_qualification(
        &self,
        workspace_id: WorkspaceId,
        contractor_id: &str,
        record: QualificationRecord,
        audit_event: AuditEvent,
    ) -> AppResult<()> {
        let mut state = self.state.write().await;
        state.qualifications.retain(|(stored_workspace, contractor, stored)| {
            !(*stored_workspace == workspace_id
                && contractor == contractor_id
                && stored.qualification_type_id == record.qualification_type_id)
        });
        state
            .qualifications
            .push((workspace_id, contractor_id.to_owned(), record));
        state.audit_events.push(audit_event);
        Ok(())
    }

    async fn save_training_completion(
        &self,
        workspace_id: WorkspaceId,
        contractor_id: &str,
        completion: TrainingCompletion,
        audit_event: AuditEvent,
    ) -> AppResult<()> {
        let mut state = self.state.write().await;
        state
            .training_completions
            .retain(|(stored_workspace, contractor, stored)| {
                !(*stored_workspace == workspace_id
                    && contractor == contractor_id
                    && stored.module_id == completion.module_id)
            });
        state
            .training_completions
            .push((workspace_id, contractor_id.to_owned(), completion));
        state.audit_events.push(audit_event);
        Ok(())
    }
}

#[async_trait]
impl WorkspaceDirectory for InMemoryWorkspaceStore {
    async fn list_workspaces(&self) -> AppResult<Vec<WorkspaceSummary>> {
        Ok(self.state.read().await.workspaces.clone())
    }

    async fn find_workspace(
        &self,
        workspace_id: WorkspaceId,
    ) -> AppResult<Option<WorkspaceSummary>> {
        Ok(self
            .state
            .read()
            .await
            .workspaces
            .iter()
            .find(|workspace| workspace.workspace_id == workspace_id)
            .cloned())
    }

    async fn list_member_emails(
        &self,
        workspace_id: WorkspaceId,
        roles: &[WorkspaceRole],
    ) -> AppResult<Vec<String>> {
        let mut emails: Vec<String> = self
            .state
            .read()
            .await
            .members
            .iter()
            .filter(|(stored_workspace, role, _)| {
                *stored_workspace == workspace_id && roles.contains(role)
            })
            .map(|(_, _, email)| email.to_lowercase())
            .collect();
        emails.sort();
        emails.dedup();

        Ok(emails)
    }
}
