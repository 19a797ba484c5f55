use super::*;

/// Permit with its object graph and sequencer state.
#[derive(Debug, Clone, PartialEq)]
pub struct PermitDetail {
    /// Permit.
    pub permit: Permit,
    /// Pinned template snapshot.
    pub template: Option<PermitTemplate>,
    /// Decisions in chronological order.
    pub approvals: Vec<ApprovalEvent>,
    /// Sequencer state for the current round.
    pub progress: ApprovalProgress,
    /// Checklist items.
    pub checklist: Vec<ChecklistItem>,
    /// Tasks.
    pub tasks: Vec<PermitTask>,
}

impl PermitWorkflowService {
    /// Loads a permit with everything needed to render it. Any member may read.
    pub async fn get_permit_detail(
        &self,
        actor: &ActorContext,
        permit_id: PermitId,
    ) -> AppResult<PermitDetail> {
        let workspace_id = actor.workspace_id();
        let permit = self.load_permit(workspace_id, permit_id).await?;
        let template = self.load_pinned_template(&permit).await?;
        let approvals = self
            .permit_repository
            .list_approval_events(workspace_id, permit.id)
            .await?;
        let checklist = self
            .permit_repository
            .list_checklist_items(workspace_id, permit.id)
            .await?;
        let tasks = self
            .permit_repository
            .list_tasks(workspace_id, permit.id)
            .await?;
        let progress = approval_progress(&ApprovalPlan::for_template(template.as_ref()), &approvals);

        Ok(PermitDetail {
            permit,
            template,
            approvals,
            progress,
            checklist,
            tasks,
        })
    }
}
