use super::*;

/// Requested status change with its contextual fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionInput {
    /// Target status.
    pub next_status: PermitStatus,
    /// Closure note, required for `closed`.
    pub closure_note: Option<String>,
    /// Reason, required for `cancelled` and `needs_changes`.
    pub reason: Option<String>,
}

impl TransitionInput {
    /// Creates a transition request without contextual fields.
    #[must_use]
    pub fn to(next_status: PermitStatus) -> Self {
        Self {
            next_status,
            closure_note: None,
            reason: None,
        }
    }
}

/// Result of a committed transition.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionOutcome {
    /// Permit after the transition.
    pub permit: Permit,
    /// Gate warnings that did not block the transition.
    pub warnings: Vec<String>,
}

/// Who asked for a transition.
#[derive(Clone, Copy)]
enum Requester<'a> {
    Member(&'a ActorContext),
    Scheduler,
}

impl<'a> Requester<'a> {
    fn actor_id(self) -> &'a str {
        match self {
            Self::Member(actor) => actor.actor_id(),
            Self::Scheduler => SCHEDULER_ACTOR,
        }
    }
}

impl PermitWorkflowService {
    /// Moves a permit to a new status on behalf of a workspace member.
    pub async fn transition_permit(
        &self,
        actor: &ActorContext,
        permit_id: PermitId,
        input: TransitionInput,
    ) -> AppResult<TransitionOutcome> {
        PermitAction::Transition(input.next_status).authorize(actor.role())?;
        let permit = self.load_permit(actor.workspace_id(), permit_id).await?;
        self.apply_transition(Requester::Member(actor), permit, input)
            .await
    }

    /// Moves a permit on behalf of a periodic trigger.
    ///
    /// Applies the same admission checks as [`Self::transition_permit`] except
    /// role authorization, which the trigger credential replaces.
    pub async fn trigger_transition(
        &self,
        workspace_id: WorkspaceId,
        permit_id: PermitId,
        next_status: PermitStatus,
    ) -> AppResult<TransitionOutcome> {
        let permit = self.load_permit(workspace_id, permit_id).await?;
        self.apply_transition(
            Requester::Scheduler,
            permit,
            TransitionInput::to(next_status),
        )
        .await
    }

    async fn apply_transition(
        &self,
        requester: Requester<'_>,
        permit: Permit,
        input: TransitionInput,
    ) -> AppResult<TransitionOutcome> {
        let actor_id = requester.actor_id();
        let workspace_id = permit.workspace_id;
        let from = permit.status;
        let to = input.next_status;

        if let Err(error) = ensure_transition(from, to) {
            self.record_refusal(AuditEvent::for_permit(
                workspace_id,
                actor_id,
                AuditAction::PermitTransitionRefused,
                permit.id,
                json!({ "from": from.as_str(), "to": to.as_str() }),
            ))
            .await;
            return Err(error);
        }

        let now = self.clock.now();
        let mut update = PermitStatusUpdate::status_only(&permit, to, now);
        let mut approval_event = None;
        let mut task: Option<PermitTask> = None;
        match to {
            PermitStatus::Closed => {
                let closure_note = required_text("closure_note", input.closure_note)?;
                update.metadata = permit
                    .metadata
                    .with_resolution(PermitResolution::Closed { closure_note });
                update.end_at = permit.end_at.or(Some(now));
            }
            PermitStatus::Cancelled => {
                let reason = required_text("reason", input.reason)?;
                update.metadata = permit
                    .metadata
                    .with_resolution(PermitResolution::Cancelled { reason });
            }
            PermitStatus::NeedsChanges => {
                let reason = required_text("reason", input.reason)?;
                let Requester::Member(actor) = requester else {
                    return Err(AppError::Forbidden(
                        "change requests must come from a workspace member".to_owned(),
                    ));
                };
                // A change request closes the current approval round.
                approval_event = Some(ApprovalEvent {
                    permit_id: permit.id,
                    actor_id: actor.actor_id().to_owned(),
                    actor_role: actor.role(),
                    decision: ApprovalDecision::Changes,
                    mode: ApprovalMode::InTurn,
                    comment: reason.clone(),
                    decided_at: now,
                });
                task = Some(PermitTask::for_change_request(permit.id, &reason, now));
                update.metadata = permit
                    .metadata
                    .with_resolution(PermitResolution::ChangesRequested { reason });
            }
            _ => {}
        }

        let template = if to == PermitStatus::Submitted {
            self.load_pinned_template(&permit).await?
        } else {
            None
        };

        let mut warnings = Vec::new();
        if to == PermitStatus::Submitted {
            let report = self.evaluate_gates(&permit, template.as_ref()).await?;
            if let Some(block) = report.block {
                self.record_refusal(AuditEvent::for_permit(
                    workspace_id,
                    actor_id,
                    AuditAction::PermitSubmitBlocked,
                    permit.id,
                    block.audit_payload(),
                ))
                .await;
                return Err(AppError::GateBlocked(block.reason));
            }
            warnings = report.warnings;
        }

        if to == PermitStatus::Active {
            self.ensure_checklist_complete(actor_id, &permit).await?;
        }

        let action = AuditAction::for_status(to).ok_or_else(|| {
            AppError::Internal(format!("no audit action for status '{to}'"))
        })?;
        let audit_event = AuditEvent::for_permit(
            workspace_id,
            actor_id,
            action,
            permit.id,
            json!({
                "from": from.as_str(),
                "to": to.as_str(),
                "resolution": update.metadata.resolution,
                "warnings": warnings,
                "task_id": task.as_ref().map(|task| task.id),
            }),
        );

        let updated = self
            .permit_repository
            .commit_status_change(
                workspace_id,
                StatusChangeCommit {
                    permit_id: permit.id,
                    expected_status: from,
                    update,
                    approval_event,
                    task,
                    audit_event,
                },
            )
            .await?;

        info!(
            workspace_id = %workspace_id,
            permit_id = %updated.id,
            from = from.as_str(),
            to = to.as_str(),
            "permit status changed"
        );

        if to == PermitStatus::Submitted {
            let plan = ApprovalPlan::for_template(template.as_ref());
            let events = match self
                .permit_repository
                .list_approval_events(workspace_id, updated.id)
                .await
            {
                Ok(events) => events,
                Err(error) => {
                    warn!(
                        permit_id = %updated.id,
                        error = %error,
                        "failed to load approvals for submission notice"
                    );
                    Vec::new()
                }
            };
            let progress = approval_progress(&plan, &events);
            self.notifications
                .notify_permit_submitted(&updated, progress.next_role)
                .await;
        }

        Ok(TransitionOutcome {
            permit: updated,
            warnings,
        })
    }

    async fn ensure_checklist_complete(&self, actor_id: &str, permit: &Permit) -> AppResult<()> {
        let items = self
            .permit_repository
            .list_checklist_items(permit.workspace_id, permit.id)
            .await?;
        let unchecked = unchecked_required_labels(&items);
        if unchecked.is_empty() {
            return Ok(());
        }

        let reason = format!(
            "unchecked required checklist items: {}",
            unchecked.join(", ")
        );
        self.record_refusal(AuditEvent::for_permit(
            permit.workspace_id,
            actor_id,
            AuditAction::PermitActivateBlocked,
            permit.id,
            json!({ "reason": reason, "unchecked_items": unchecked }),
        ))
        .await;
        Err(AppError::GateBlocked(reason))
    }
}
