use ptw_core::WorkspaceRole;
use ptw_domain::{ApprovalDecision, PermitStatus};

use super::content::escape_html;
use super::{DispatchMode, MAX_RECIPIENTS};
use crate::notification_ports::{NotificationKind, WorkspaceSummary};
use crate::test_support::FakeWorld;

#[tokio::test]
async fn submission_notice_reaches_next_role_admins_and_owners() {
    let world = FakeWorld::new();
    let permit = world.seed_permit(PermitStatus::Submitted, None, None).await;

    world
        .dispatcher()
        .notify_permit_submitted(&permit, Some(WorkspaceRole::Approver))
        .await;

    let sent = world.sent_emails().await;
    assert_eq!(sent.len(), 1);
    let mut recipients = sent[0].recipients.clone();
    recipients.sort();
    assert_eq!(
        recipients,
        vec![
            "admin@example.test".to_owned(),
            "approver@example.test".to_owned(),
            "owner@example.test".to_owned(),
        ]
    );
    assert_eq!(sent[0].subject, "Permit submitted for approval: Hot work on tank 4");
    assert!(sent[0].html_body.contains(&format!(
        "https://ptw.example.test/app/permits/{}",
        permit.id
    )));
    assert!(sent[0].text_body.contains("Acme Site"));
}

#[tokio::test]
async fn decision_notice_escapes_user_text_in_html_only() {
    let world = FakeWorld::new();
    let permit = world.seed_permit(PermitStatus::Submitted, None, None).await;

    world
        .dispatcher()
        .notify_decision(&permit, ApprovalDecision::Changes, "<b>fix</b> the \"gas\" test")
        .await;

    let sent = world.sent_emails().await;
    assert_eq!(sent[0].subject, "Permit decision: changes");
    assert!(
        sent[0]
            .html_body
            .contains("&lt;b&gt;fix&lt;/b&gt; the &quot;gas&quot; test")
    );
    assert!(sent[0].text_body.contains("<b>fix</b> the \"gas\" test"));
}

#[tokio::test]
async fn recipients_are_deduplicated_and_capped() {
    let world = FakeWorld::new();
    world.add_member(WorkspaceRole::Approver, " Approver@Example.test ").await;
    for index in 0..60 {
        world
            .add_member(WorkspaceRole::Approver, &format!("crew{index}@example.test"))
            .await;
    }
    let permit = world.seed_permit(PermitStatus::Submitted, None, None).await;

    world
        .dispatcher()
        .notify_approval_pending(&permit, WorkspaceRole::Approver)
        .await;

    let sent = world.sent_emails().await;
    assert_eq!(sent[0].recipients.len(), MAX_RECIPIENTS);
    assert_eq!(
        sent[0]
            .recipients
            .iter()
            .filter(|email| email.as_str() == "approver@example.test")
            .count(),
        1
    );
    let records = world.notification_records().await;
    assert_eq!(records[0].kind, NotificationKind::ApprovalStepPending);
    assert_eq!(records[0].recipient_count, MAX_RECIPIENTS);
}

#[tokio::test]
async fn missing_recipients_are_recorded_as_undelivered() {
    let world = FakeWorld::new();
    let mut permit = world.seed_permit(PermitStatus::Submitted, None, None).await;
    permit.workspace_id = ptw_core::WorkspaceId::new();

    world
        .dispatcher()
        .notify_approval_pending(&permit, WorkspaceRole::Approver)
        .await;

    assert!(world.sent_emails().await.is_empty());
    let records = world.notification_records().await;
    assert_eq!(records.len(), 1);
    assert!(!records[0].delivered);
    assert_eq!(records[0].attempts, 0);
    assert_eq!(records[0].error.as_deref(), Some("no recipients"));
}

#[tokio::test]
async fn digest_retries_until_the_provider_accepts() {
    let world = FakeWorld::new();
    world.fail_next_emails(2).await;
    let workspace = WorkspaceSummary {
        workspace_id: world.workspace_id,
        name: "Acme Site".to_owned(),
    };

    let report = world
        .dispatcher()
        .send_qualification_digest(&workspace, 4, &[30, 14, 7])
        .await;

    assert!(report.delivered);
    assert_eq!(report.attempts, 3);
    let sent = world.sent_emails().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "Qualification expiry digest");
    assert!(sent[0].text_body.contains("You have 4 expiring qualification records"));
    assert!(sent[0].text_body.contains("(30d, 14d, 7d)"));
    assert!(
        sent[0]
            .text_body
            .contains("https://ptw.example.test/app/reminders")
    );
}

#[tokio::test]
async fn digest_gives_up_after_the_last_attempt() {
    let world = FakeWorld::new();
    world.fail_next_emails(5).await;
    let workspace = WorkspaceSummary {
        workspace_id: world.workspace_id,
        name: "Acme Site".to_owned(),
    };

    let report = world
        .dispatcher()
        .send_qualification_digest(&workspace, 1, &[7])
        .await;

    assert!(!report.delivered);
    assert_eq!(report.attempts, 3);
    assert!(world.sent_emails().await.is_empty());
    let records = world.notification_records().await;
    assert_eq!(records[0].kind, NotificationKind::QualificationDigest);
    assert_eq!(records[0].attempts, 3);
}

#[test]
fn dispatch_mode_parses_known_values() {
    assert_eq!(DispatchMode::parse("inline").ok(), Some(DispatchMode::Inline));
    assert_eq!(DispatchMode::parse("detached").ok(), Some(DispatchMode::Detached));
    assert!(DispatchMode::parse("sync").is_err());
}

#[test]
fn escape_html_covers_attribute_quotes() {
    assert_eq!(escape_html("a&b 'c'"), "a&amp;b &#39;c&#39;");
}
