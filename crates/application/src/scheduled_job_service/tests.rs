use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use ptw_core::WorkspaceRole;
use ptw_domain::{
    AuditAction, ChecklistItem, PermitStatus, QualificationRecord, ReminderSettings,
};

use super::{JobRunSummary, ScheduledJobService};
use crate::permit_workflow_service::SCHEDULER_ACTOR;
use crate::test_support::{FakeWorld, fixed_now};

fn job_service(world: &Arc<FakeWorld>) -> ScheduledJobService {
    ScheduledJobService::new(
        world.workflow(),
        world.clone(),
        world.clone(),
        world.clone(),
        world.clone(),
        world.clone(),
        world.dispatcher(),
    )
}

fn today() -> NaiveDate {
    fixed_now().date_naive()
}

async fn seed_expiring(world: &FakeWorld, days_from_today: i64) {
    world
        .seed_qualification(
            "contractor-7",
            QualificationRecord {
                qualification_type_id: "hot-work".to_owned(),
                expiry_date: Some(today() + Duration::days(days_from_today)),
                waived: false,
                waived_until: None,
            },
        )
        .await;
}

#[tokio::test]
async fn activation_moves_due_permits_and_skips_blocked_ones() {
    let world = FakeWorld::new();
    let mut due = world.seed_permit(PermitStatus::Approved, None, None).await;
    due.start_at = Some(fixed_now() - Duration::minutes(5));
    world.update_permit(due.clone()).await;

    let mut blocked = world.seed_permit(PermitStatus::Approved, None, None).await;
    blocked.start_at = Some(fixed_now() - Duration::minutes(5));
    world.update_permit(blocked.clone()).await;
    world
        .seed_checklist_item(
            ChecklistItem::new(blocked.id, "Gas test", true).unwrap_or_else(|_| unreachable!()),
        )
        .await;

    let mut later = world.seed_permit(PermitStatus::Approved, None, None).await;
    later.start_at = Some(fixed_now() + Duration::hours(2));
    world.update_permit(later.clone()).await;

    let summary = job_service(&world)
        .activate_due_permits(fixed_now())
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(
        summary,
        JobRunSummary {
            transitioned: 1,
            skipped: 1,
        }
    );
    assert_eq!(world.stored_permit(due.id).await.status, PermitStatus::Active);
    assert_eq!(world.stored_permit(blocked.id).await.status, PermitStatus::Approved);
    assert_eq!(world.stored_permit(later.id).await.status, PermitStatus::Approved);

    let activated = world
        .audit_events()
        .await
        .into_iter()
        .find(|event| event.action == AuditAction::PermitActive)
        .unwrap_or_else(|| unreachable!());
    assert_eq!(activated.actor, SCHEDULER_ACTOR);
}

#[tokio::test]
async fn blocked_activation_is_audited_once_until_the_checklist_changes() {
    let world = FakeWorld::new();
    let mut blocked = world.seed_permit(PermitStatus::Approved, None, None).await;
    blocked.start_at = Some(fixed_now() - Duration::hours(3));
    world.update_permit(blocked.clone()).await;
    let gas_test =
        ChecklistItem::new(blocked.id, "Gas test", true).unwrap_or_else(|_| unreachable!());
    world.seed_checklist_item(gas_test.clone()).await;
    let service = job_service(&world);

    for _ in 0..5 {
        assert!(service.activate_due_permits(fixed_now()).await.is_ok());
    }
    let blocked_audits = world
        .audit_actions()
        .await
        .into_iter()
        .filter(|action| *action == AuditAction::PermitActivateBlocked)
        .count();
    assert_eq!(blocked_audits, 1);

    let mut later = world.seed_permit(PermitStatus::Approved, None, None).await;
    later.start_at = Some(fixed_now() - Duration::minutes(1));
    world.update_permit(later.clone()).await;
    let summary = service
        .activate_due_permits(fixed_now())
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(
        summary,
        JobRunSummary {
            transitioned: 1,
            skipped: 0,
        }
    );
    assert_eq!(world.stored_permit(later.id).await.status, PermitStatus::Active);

    assert!(
        world
            .workflow()
            .toggle_checklist_item(
                &world.actor(WorkspaceRole::Issuer),
                blocked.id,
                gas_test.id,
                true,
            )
            .await
            .is_ok()
    );
    let resumed = service
        .activate_due_permits(fixed_now())
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(resumed.transitioned, 1);
    assert_eq!(world.stored_permit(blocked.id).await.status, PermitStatus::Active);
}

#[tokio::test]
async fn expiry_moves_lapsed_permits() {
    let world = FakeWorld::new();
    let mut lapsed = world.seed_permit(PermitStatus::Active, None, None).await;
    lapsed.end_at = Some(fixed_now() - Duration::hours(1));
    world.update_permit(lapsed.clone()).await;

    let mut current = world.seed_permit(PermitStatus::Active, None, None).await;
    current.end_at = Some(fixed_now() + Duration::hours(1));
    world.update_permit(current.clone()).await;

    let summary = job_service(&world)
        .expire_lapsed_permits(fixed_now())
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(summary.transitioned, 1);
    assert_eq!(world.stored_permit(lapsed.id).await.status, PermitStatus::Expired);
    assert_eq!(world.stored_permit(current.id).await.status, PermitStatus::Active);
}

#[tokio::test]
async fn digest_is_sent_once_per_workspace_and_day() {
    let world = FakeWorld::new();
    seed_expiring(&world, 10).await;
    seed_expiring(&world, 45).await;
    let service = job_service(&world);

    let first = service
        .send_qualification_digests(today())
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].expiring_count, 1);
    assert!(first[0].claimed);
    assert!(first[0].delivered);

    let second = service
        .send_qualification_digests(today())
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(!second[0].claimed);
    assert_eq!(world.sent_emails().await.len(), 1);

    let digest_audit = world
        .audit_events()
        .await
        .into_iter()
        .filter(|event| event.action == AuditAction::ReminderDigestSent)
        .collect::<Vec<_>>();
    assert_eq!(digest_audit.len(), 1);
    assert_eq!(
        digest_audit[0].object_id,
        format!("digest:{}:2026-02-25:owners-admins", world.workspace_id)
    );
}

#[tokio::test]
async fn digest_respects_disabled_settings() {
    let world = FakeWorld::new();
    seed_expiring(&world, 3).await;
    world
        .set_settings(ReminderSettings::new(false, vec![7]).unwrap_or_else(|_| unreachable!()))
        .await;

    let results = job_service(&world)
        .send_qualification_digests(today())
        .await
        .unwrap_or_else(|_| unreachable!());

    assert!(results.is_empty());
    assert!(world.sent_emails().await.is_empty());
}

#[tokio::test]
async fn digest_uses_the_widest_configured_window() {
    let world = FakeWorld::new();
    seed_expiring(&world, 5).await;
    seed_expiring(&world, 20).await;
    world
        .set_settings(ReminderSettings::new(true, vec![7, 3]).unwrap_or_else(|_| unreachable!()))
        .await;

    let results = job_service(&world)
        .send_qualification_digests(today())
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(results[0].expiring_count, 1);
}

#[tokio::test]
async fn nothing_expiring_sends_nothing() {
    let world = FakeWorld::new();

    let results = job_service(&world)
        .send_qualification_digests(today())
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(results.len(), 1);
    assert!(!results[0].claimed);
    assert!(world.sent_emails().await.is_empty());
}
