use chrono::{DateTime, Utc};

use super::*;

/// Decision recorded by an approver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionInput {
    /// Decision.
    pub decision: ApprovalDecision,
    /// Required comment.
    pub comment: String,
}

/// Result of a committed decision.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionOutcome {
    /// Permit after the decision.
    pub permit: Permit,
    /// Sequencer state after the decision.
    pub progress: ApprovalProgress,
    /// Task created by a change request.
    pub task: Option<PermitTask>,
    /// Gate warnings that did not block an approval.
    pub warnings: Vec<String>,
}

struct DecisionContext {
    permit: Permit,
    template: Option<PermitTemplate>,
    plan: ApprovalPlan,
    events: Vec<ApprovalEvent>,
    progress: ApprovalProgress,
    comment: String,
    now: DateTime<Utc>,
}

impl PermitWorkflowService {
    /// Records an approval decision on a submitted permit.
    pub async fn record_decision(
        &self,
        actor: &ActorContext,
        permit_id: PermitId,
        input: DecisionInput,
    ) -> AppResult<DecisionOutcome> {
        PermitAction::Decide.authorize(actor.role())?;
        let workspace_id = actor.workspace_id();
        let permit = self.load_permit(workspace_id, permit_id).await?;

        let target = decision_target(input.decision);
        if permit.status != PermitStatus::Submitted {
            let error = AppError::InvalidTransition {
                from: permit.status.as_str().to_owned(),
                to: target.as_str().to_owned(),
            };
            self.record_refusal(AuditEvent::for_permit(
                workspace_id,
                actor.actor_id(),
                AuditAction::PermitTransitionRefused,
                permit.id,
                json!({
                    "from": permit.status.as_str(),
                    "to": target.as_str(),
                    "decision": input.decision.as_str(),
                }),
            ))
            .await;
            return Err(error);
        }

        let comment = required_text("comment", Some(input.comment))?;
        let template = self.load_pinned_template(&permit).await?;
        let plan = ApprovalPlan::for_template(template.as_ref());
        let events = self
            .permit_repository
            .list_approval_events(workspace_id, permit.id)
            .await?;
        let progress = approval_progress(&plan, &events);
        let context = DecisionContext {
            permit,
            template,
            plan,
            events,
            progress,
            comment,
            now: self.clock.now(),
        };

        match input.decision {
            ApprovalDecision::Approved => self.approve(actor, context).await,
            ApprovalDecision::Rejected | ApprovalDecision::Changes => {
                self.return_or_reject(actor, input.decision, context).await
            }
        }
    }

    async fn approve(
        &self,
        actor: &ActorContext,
        context: DecisionContext,
    ) -> AppResult<DecisionOutcome> {
        let DecisionContext {
            permit,
            template,
            plan,
            progress,
            comment,
            now,
            ..
        } = context;
        let workspace_id = permit.workspace_id;

        let mode = match progress.authorize(actor.role()) {
            Ok(mode) => mode,
            Err(error) => {
                self.record_refusal(AuditEvent::for_permit(
                    workspace_id,
                    actor.actor_id(),
                    AuditAction::PermitApprovalStepRefused,
                    permit.id,
                    json!({
                        "expected": progress.next_role.map(|role| role.as_str()),
                        "actual": actor.role().as_str(),
                    }),
                ))
                .await;
                return Err(error);
            }
        };

        let report = self.evaluate_gates(&permit, template.as_ref()).await?;
        if let Some(block) = report.block {
            self.record_refusal(AuditEvent::for_permit(
                workspace_id,
                actor.actor_id(),
                AuditAction::PermitApproveBlocked,
                permit.id,
                block.audit_payload(),
            ))
            .await;
            return Err(AppError::GateBlocked(block.reason));
        }

        let committed = self
            .permit_repository
            .commit_approval(
                workspace_id,
                ApprovalCommit {
                    permit_id: permit.id,
                    event: ApprovalEvent {
                        permit_id: permit.id,
                        actor_id: actor.actor_id().to_owned(),
                        actor_role: actor.role(),
                        decision: ApprovalDecision::Approved,
                        mode,
                        comment: comment.clone(),
                        decided_at: now,
                    },
                    plan,
                    warnings: report.warnings.clone(),
                },
            )
            .await?;

        info!(
            workspace_id = %workspace_id,
            permit_id = %permit.id,
            mode = mode.as_str(),
            approved_count = committed.progress.approved_count,
            total_steps = committed.progress.total_steps,
            "approval recorded"
        );

        if committed.progress.is_complete() {
            self.notifications
                .notify_decision(&committed.permit, ApprovalDecision::Approved, &comment)
                .await;
        } else if let Some(next_role) = committed.progress.next_role {
            self.notifications
                .notify_approval_pending(&committed.permit, next_role)
                .await;
        }

        Ok(DecisionOutcome {
            permit: committed.permit,
            progress: committed.progress,
            task: None,
            warnings: report.warnings,
        })
    }

    async fn return_or_reject(
        &self,
        actor: &ActorContext,
        decision: ApprovalDecision,
        context: DecisionContext,
    ) -> AppResult<DecisionOutcome> {
        let DecisionContext {
            permit,
            plan,
            mut events,
            comment,
            now,
            ..
        } = context;
        let workspace_id = permit.workspace_id;
        let next_status = decision_target(decision);

        let event = ApprovalEvent {
            permit_id: permit.id,
            actor_id: actor.actor_id().to_owned(),
            actor_role: actor.role(),
            decision,
            mode: ApprovalMode::InTurn,
            comment: comment.clone(),
            decided_at: now,
        };

        let (resolution, action, task) = if decision == ApprovalDecision::Changes {
            (
                PermitResolution::ChangesRequested {
                    reason: comment.clone(),
                },
                AuditAction::PermitNeedsChanges,
                Some(PermitTask::for_change_request(permit.id, &comment, now)),
            )
        } else {
            (
                PermitResolution::Rejected {
                    reason: comment.clone(),
                },
                AuditAction::PermitRejected,
                None,
            )
        };

        let update = PermitStatusUpdate {
            next_status,
            metadata: permit.metadata.with_resolution(resolution),
            end_at: permit.end_at,
            changed_at: now,
        };
        let audit_event = AuditEvent::for_permit(
            workspace_id,
            actor.actor_id(),
            action,
            permit.id,
            json!({
                "decision": decision.as_str(),
                "comment": comment,
                "actor_role": actor.role().as_str(),
                "from": permit.status.as_str(),
                "to": next_status.as_str(),
                "task_id": task.as_ref().map(|task| task.id),
                "task_due_at": task.as_ref().and_then(|task| task.due_at),
            }),
        );

        let updated = self
            .permit_repository
            .commit_status_change(
                workspace_id,
                StatusChangeCommit {
                    permit_id: permit.id,
                    expected_status: permit.status,
                    update,
                    approval_event: Some(event.clone()),
                    task: task.clone(),
                    audit_event,
                },
            )
            .await?;

        info!(
            workspace_id = %workspace_id,
            permit_id = %updated.id,
            decision = decision.as_str(),
            to = next_status.as_str(),
            "permit decision recorded"
        );

        events.push(event);
        let progress = approval_progress(&plan, &events);
        self.notifications
            .notify_decision(&updated, decision, &comment)
            .await;

        Ok(DecisionOutcome {
            permit: updated,
            progress,
            task,
            warnings: Vec::new(),
        })
    }
}

fn decision_target(decision: ApprovalDecision) -> PermitStatus {
    match decision {
        ApprovalDecision::Approved => PermitStatus::Approved,
        ApprovalDecision::Rejected => PermitStatus::Cancelled,
        ApprovalDecision::Changes => PermitStatus::NeedsChanges,
    }
}
