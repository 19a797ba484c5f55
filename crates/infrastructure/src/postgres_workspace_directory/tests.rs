use ptw_application::WorkspaceDirectory;
use ptw_core::{WorkspaceId, WorkspaceRole};

use super::PostgresWorkspaceDirectory;
use crate::postgres_test_support::{seed_member, seed_workspace, test_pool};

#[tokio::test]
async fn member_emails_follow_requested_roles() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let directory = PostgresWorkspaceDirectory::new(pool.clone());
    let workspace_id = seed_workspace(&pool, "Directory Tests").await;
    seed_member(&pool, workspace_id, "u-1", WorkspaceRole::Owner, "Owner@Example.test").await;
    seed_member(&pool, workspace_id, "u-2", WorkspaceRole::Admin, "admin@example.test").await;
    seed_member(&pool, workspace_id, "u-3", WorkspaceRole::Viewer, "viewer@example.test").await;

    let emails = directory
        .list_member_emails(workspace_id, &[WorkspaceRole::Owner, WorkspaceRole::Admin])
        .await
        .unwrap_or_default();
    assert_eq!(
        emails,
        vec![
            "admin@example.test".to_owned(),
            "owner@example.test".to_owned()
        ]
    );

    let workspace = directory.find_workspace(workspace_id).await;
    assert!(matches!(
        workspace,
        Ok(Some(summary)) if summary.name == "Directory Tests"
    ));
    assert!(matches!(
        directory.find_workspace(WorkspaceId::new()).await,
        Ok(None)
    ));
}
