use uuid::Uuid;

use super::*;

impl PermitWorkflowService {
    /// Adds a checklist item to a permit.
    pub async fn add_checklist_item(
        &self,
        actor: &ActorContext,
        permit_id: PermitId,
        label: &str,
        required: bool,
    ) -> AppResult<ChecklistItem> {
        PermitAction::EditChecklist.authorize(actor.role())?;
        let permit = self.load_permit(actor.workspace_id(), permit_id).await?;
        ensure_mutable(&permit)?;

        let item = ChecklistItem::new(permit.id, label, required)?;
        let audit_event = AuditEvent::for_permit(
            permit.workspace_id,
            actor.actor_id(),
            AuditAction::PermitChecklistItemAdded,
            permit.id,
            json!({ "item_id": item.id, "label": item.label, "required": item.required }),
        );
        self.permit_repository
            .save_checklist_item(permit.workspace_id, item.clone(), audit_event)
            .await?;

        Ok(item)
    }

    /// Ticks or clears a checklist item.
    pub async fn toggle_checklist_item(
        &self,
        actor: &ActorContext,
        permit_id: PermitId,
        item_id: Uuid,
        checked: bool,
    ) -> AppResult<ChecklistItem> {
        PermitAction::EditChecklist.authorize(actor.role())?;
        let permit = self.load_permit(actor.workspace_id(), permit_id).await?;
        ensure_mutable(&permit)?;

        let mut item = self
            .permit_repository
            .list_checklist_items(permit.workspace_id, permit.id)
            .await?
            .into_iter()
            .find(|item| item.id == item_id)
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "checklist item '{item_id}' does not exist on permit '{permit_id}'"
                ))
            })?;
        item.set_checked(checked, actor.actor_id(), self.clock.now());

        let audit_event = AuditEvent::for_permit(
            permit.workspace_id,
            actor.actor_id(),
            AuditAction::PermitChecklistItemToggled,
            permit.id,
            json!({ "item_id": item.id, "label": item.label, "checked": checked }),
        );
        self.permit_repository
            .save_checklist_item(permit.workspace_id, item.clone(), audit_event)
            .await?;

        Ok(item)
    }

    /// Marks a permit task done.
    pub async fn complete_task(
        &self,
        actor: &ActorContext,
        permit_id: PermitId,
        task_id: Uuid,
    ) -> AppResult<PermitTask> {
        PermitAction::CompleteTask.authorize(actor.role())?;
        let permit = self.load_permit(actor.workspace_id(), permit_id).await?;
        ensure_mutable(&permit)?;

        let mut task = self
            .permit_repository
            .list_tasks(permit.workspace_id, permit.id)
            .await?
            .into_iter()
            .find(|task| task.id == task_id)
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "task '{task_id}' does not exist on permit '{permit_id}'"
                ))
            })?;
        task.complete(self.clock.now());

        let audit_event = AuditEvent::for_permit(
            permit.workspace_id,
            actor.actor_id(),
            AuditAction::PermitTaskCompleted,
            permit.id,
            json!({ "task_id": task.id, "title": task.title }),
        );
        self.permit_repository
            .save_task(permit.workspace_id, task.clone(), audit_event)
            .await?;

        Ok(task)
    }
}
