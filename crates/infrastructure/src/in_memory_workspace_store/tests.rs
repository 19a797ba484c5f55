use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use ptw_application::{
    CreatePermitInput, DecisionInput, DispatchMode, NotificationDispatcher, NotificationKind,
    PermitRepository, PermitWorkflowService, PublishTemplateInput, RateLimitRepository,
    RateLimitRule, RateLimitService, ReminderDelivery, ReminderRepository, ScheduledJobService,
    TemplateService, TransitionInput, WorkspaceDirectory,
};
use ptw_core::{ActorContext, AppError, WorkspaceRole};
use ptw_domain::{
    ApprovalDecision, ApprovalStep, AuditAction, PermitSource, PermitStatus, QualificationRecord,
};
use serde_json::json;

use super::InMemoryWorkspaceStore;
use crate::ConsoleEmailService;

struct Harness {
    store: Arc<InMemoryWorkspaceStore>,
    workflow: PermitWorkflowService,
    workspace_id: ptw_core::WorkspaceId,
}

impl Harness {
    async fn new() -> Self {
        let store = Arc::new(InMemoryWorkspaceStore::new());
        let workspace_id = store.add_workspace("North Plant").await;
        for role in WorkspaceRole::all() {
            store
                .add_member(workspace_id, *role, &format!("{role}@north.example.test"))
                .await;
        }

        let dispatcher = NotificationDispatcher::new(
            store.clone(),
            Arc::new(ConsoleEmailService::new()),
            store.clone(),
        )
        .with_mode(DispatchMode::Inline);
        let workflow = PermitWorkflowService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            dispatcher,
        );

        Self {
            store,
            workflow,
            workspace_id,
        }
    }

    fn actor(&self, role: WorkspaceRole) -> ActorContext {
        ActorContext::new(format!("{role}-1"), self.workspace_id, role)
    }

    fn draft_input(&self) -> CreatePermitInput {
        CreatePermitInput {
            title: "Confined space entry".to_owned(),
            location: "Pump house".to_owned(),
            contractor_id: None,
            template_id: None,
            start_at: None,
            end_at: None,
            source: PermitSource::Online,
            extensions: BTreeMap::new(),
        }
    }
}

#[tokio::test]
async fn submitted_permit_is_approved_and_audited_in_order() {
    let harness = Harness::new().await;
    let issuer = harness.actor(WorkspaceRole::Issuer);
    let permit = harness
        .workflow
        .create_permit(&issuer, harness.draft_input())
        .await
        .unwrap_or_else(|_| unreachable!());

    let submitted = harness
        .workflow
        .transition_permit(&issuer, permit.id, TransitionInput::to(PermitStatus::Submitted))
        .await;
    assert!(submitted.is_ok());

    let decided = harness
        .workflow
        .record_decision(
            &harness.actor(WorkspaceRole::Approver),
            permit.id,
            DecisionInput {
                decision: ApprovalDecision::Approved,
                comment: "Gas test done".to_owned(),
            },
        )
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(decided.permit.status, PermitStatus::Approved);

    let actions: Vec<AuditAction> = harness
        .store
        .audit_events()
        .await
        .iter()
        .map(|event| event.action)
        .collect();
    assert_eq!(
        actions,
        vec![
            AuditAction::PermitCreated,
            AuditAction::PermitSubmitted,
            AuditAction::PermitApproved,
        ]
    );

    let kinds: Vec<NotificationKind> = harness
        .store
        .notification_records()
        .await
        .iter()
        .map(|record| record.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![NotificationKind::PermitSubmitted, NotificationKind::PermitDecision]
    );
}

#[tokio::test]
async fn permits_are_invisible_across_workspaces() {
    let harness = Harness::new().await;
    let permit = harness
        .workflow
        .create_permit(&harness.actor(WorkspaceRole::Issuer), harness.draft_input())
        .await
        .unwrap_or_else(|_| unreachable!());

    let other_workspace = harness.store.add_workspace("South Plant").await;
    let outsider = ActorContext::new("owner-9", other_workspace, WorkspaceRole::Owner);
    let result = harness.workflow.get_permit_detail(&outsider, permit.id).await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn cancelled_permit_refuses_checklist_changes() {
    let harness = Harness::new().await;
    let issuer = harness.actor(WorkspaceRole::Issuer);
    let permit = harness
        .workflow
        .create_permit(&issuer, harness.draft_input())
        .await
        .unwrap_or_else(|_| unreachable!());
    let cancelled = harness
        .workflow
        .transition_permit(
            &harness.actor(WorkspaceRole::Admin),
            permit.id,
            TransitionInput {
                next_status: PermitStatus::Cancelled,
                closure_note: None,
                reason: Some("Scope withdrawn".to_owned()),
            },
        )
        .await;
    assert!(cancelled.is_ok());

    let result = harness
        .workflow
        .add_checklist_item(&issuer, permit.id, "Isolate valves", true)
        .await;
    assert!(result.is_err());
    assert!(
        harness
            .store
            .list_checklist_items(harness.workspace_id, permit.id)
            .await
            .unwrap_or_default()
            .is_empty()
    );
}

async fn due_count(harness: &Harness, now: DateTime<Utc>) -> usize {
    harness
        .store
        .list_permits_due_for_activation(harness.workspace_id, now, 10)
        .await
        .unwrap_or_default()
        .len()
}

#[tokio::test]
async fn activation_block_holds_until_a_checklist_item_is_saved() {
    let harness = Harness::new().await;
    let issuer = harness.actor(WorkspaceRole::Issuer);
    let now = Utc::now();
    let mut input = harness.draft_input();
    input.start_at = Some(now - Duration::hours(1));
    let permit = harness
        .workflow
        .create_permit(&issuer, input)
        .await
        .unwrap_or_else(|_| unreachable!());
    let item = harness
        .workflow
        .add_checklist_item(&issuer, permit.id, "Lockout applied", true)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(
        harness
            .workflow
            .transition_permit(&issuer, permit.id, TransitionInput::to(PermitStatus::Submitted))
            .await
            .is_ok()
    );
    assert!(
        harness
            .workflow
            .record_decision(
                &harness.actor(WorkspaceRole::Approver),
                permit.id,
                DecisionInput {
                    decision: ApprovalDecision::Approved,
                    comment: "ok".to_owned(),
                },
            )
            .await
            .is_ok()
    );

    assert_eq!(due_count(&harness, now).await, 1);

    assert!(
        harness
            .store
            .mark_activation_blocked(harness.workspace_id, permit.id, now)
            .await
            .is_ok()
    );
    assert_eq!(due_count(&harness, now).await, 0);

    assert!(
        harness
            .workflow
            .toggle_checklist_item(&issuer, permit.id, item.id, true)
            .await
            .is_ok()
    );
    assert_eq!(due_count(&harness, now).await, 1);
}

#[tokio::test]
async fn template_versions_are_pinned_per_permit() {
    let harness = Harness::new().await;
    let templates = TemplateService::new(harness.store.clone());
    let admin = harness.actor(WorkspaceRole::Admin);
    let steps = vec![ApprovalStep {
        order: 1,
        role: WorkspaceRole::Approver,
        required: true,
    }];

    let first = templates
        .publish_template(
            &admin,
            PublishTemplateInput {
                template_id: None,
                name: "Confined space".to_owned(),
                approval_steps: steps.clone(),
                qualification_gate: None,
                training_gate: None,
            },
        )
        .await
        .unwrap_or_else(|_| unreachable!());

    let mut input = harness.draft_input();
    input.template_id = Some(first.reference().template_id);
    let pinned = harness
        .workflow
        .create_permit(&harness.actor(WorkspaceRole::Issuer), input)
        .await
        .unwrap_or_else(|_| unreachable!());

    let second = templates
        .publish_template(
            &admin,
            PublishTemplateInput {
                template_id: Some(first.reference().template_id),
                name: "Confined space v2".to_owned(),
                approval_steps: steps,
                qualification_gate: None,
                training_gate: None,
            },
        )
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(second.reference().version, 2);
    assert_eq!(pinned.template.map(|reference| reference.version), Some(1));
}

#[tokio::test]
async fn digest_delivery_is_claimed_once() {
    let store = InMemoryWorkspaceStore::new();
    let workspace_id = store.add_workspace("North Plant").await;
    let delivery = || ReminderDelivery {
        delivery_key: format!("digest:{workspace_id}:2026-03-01:owners-admins"),
        recipient: "owners-admins".to_owned(),
        payload: json!({ "expiring_count": 2 }),
    };

    assert!(matches!(store.claim_delivery(workspace_id, delivery()).await, Ok(true)));
    assert!(matches!(store.claim_delivery(workspace_id, delivery()).await, Ok(false)));
    assert!(matches!(store.find_settings(workspace_id).await, Ok(None)));
}

#[tokio::test]
async fn scheduler_expires_lapsed_permits_and_sends_digest() {
    let harness = Harness::new().await;
    let issuer = harness.actor(WorkspaceRole::Issuer);
    let now = Utc::now();
    let mut input = harness.draft_input();
    input.start_at = Some(now - Duration::hours(4));
    input.end_at = Some(now - Duration::hours(1));
    let permit = harness
        .workflow
        .create_permit(&issuer, input)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(
        harness
            .workflow
            .transition_permit(&issuer, permit.id, TransitionInput::to(PermitStatus::Submitted))
            .await
            .is_ok()
    );
    assert!(
        harness
            .workflow
            .record_decision(
                &harness.actor(WorkspaceRole::Approver),
                permit.id,
                DecisionInput {
                    decision: ApprovalDecision::Approved,
                    comment: "ok".to_owned(),
                },
            )
            .await
            .is_ok()
    );
    harness
        .store
        .add_qualification(
            harness.workspace_id,
            "contractor-7",
            QualificationRecord {
                qualification_type_id: "hot-work".to_owned(),
                expiry_date: Some(now.date_naive() + Duration::days(10)),
                waived: false,
                waived_until: None,
            },
        )
        .await;

    let dispatcher = NotificationDispatcher::new(
        harness.store.clone(),
        Arc::new(ConsoleEmailService::new()),
        harness.store.clone(),
    )
    .with_mode(DispatchMode::Inline);
    let jobs = ScheduledJobService::new(
        harness.workflow.clone(),
        harness.store.clone(),
        harness.store.clone(),
        harness.store.clone(),
        harness.store.clone(),
        harness.store.clone(),
        dispatcher,
    );

    let expired = jobs
        .expire_lapsed_permits(now)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(expired.transitioned, 1);
    let stored = harness
        .store
        .find_permit(harness.workspace_id, permit.id)
        .await
        .unwrap_or_default()
        .map(|permit| permit.status);
    assert_eq!(stored, Some(PermitStatus::Expired));

    let first = jobs
        .send_qualification_digests(now.date_naive())
        .await
        .unwrap_or_default();
    let second = jobs
        .send_qualification_digests(now.date_naive())
        .await
        .unwrap_or_default();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].expiring_count, 1);
    assert!(first[0].claimed && first[0].delivered);
    assert!(second.iter().all(|result| !result.claimed));
}

#[tokio::test]
async fn member_emails_are_filtered_by_role_and_deduplicated() {
    let store = InMemoryWorkspaceStore::new();
    let workspace_id = store.add_workspace("North Plant").await;
    store
        .add_member(workspace_id, WorkspaceRole::Owner, "Lead@North.example.test")
        .await;
    store
        .add_member(workspace_id, WorkspaceRole::Admin, "lead@north.example.test")
        .await;
    store
        .add_member(workspace_id, WorkspaceRole::Viewer, "viewer@north.example.test")
        .await;

    let emails = store
        .list_member_emails(workspace_id, &[WorkspaceRole::Owner, WorkspaceRole::Admin])
        .await
        .unwrap_or_default();

    assert_eq!(emails, vec!["lead@north.example.test".to_owned()]);
}

#[tokio::test]
async fn rate_limiter_refuses_attempts_beyond_the_window_budget() {
    let store = Arc::new(InMemoryWorkspaceStore::new());
    let limiter = RateLimitService::new(store.clone());
    let rule = RateLimitRule::new("trigger", 2, 60);

    assert!(limiter.check_rate_limit(&rule, "10.0.0.1").await.is_ok());
    assert!(limiter.check_rate_limit(&rule, "10.0.0.1").await.is_ok());
    let third = limiter.check_rate_limit(&rule, "10.0.0.1").await;
    assert!(matches!(third, Err(AppError::RateLimited(_))));
    assert!(limiter.check_rate_limit(&rule, "10.0.0.2").await.is_ok());

    let removed = store
        .cleanup_expired(Utc::now() + Duration::seconds(1))
        .await
        .unwrap_or_default();
    assert_eq!(removed, 2);
}
