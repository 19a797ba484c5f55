use ptw_core::{WorkspaceId, WorkspaceRole};
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Connects to `DATABASE_URL` and migrates, or returns `None` when unset.
pub(crate) async fn test_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return None;
    };

    let pool = match PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url.as_str())
        .await
    {
        Ok(pool) => pool,
        Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
    };

    if let Err(error) = MIGRATOR.run(&pool).await {
        panic!("failed to run migrations for postgres tests: {error}");
    }

    Some(pool)
}

pub(crate) async fn seed_workspace(pool: &PgPool, name: &str) -> WorkspaceId {
    let workspace_id = WorkspaceId::new();
    let insert = sqlx::query("INSERT INTO workspaces (id, name) VALUES ($1, $2)")
        .bind(workspace_id.as_uuid())
        .bind(name)
        .execute(pool)
        .await;
    assert!(insert.is_ok());

    workspace_id
}

pub(crate) async fn seed_member(
    pool: &PgPool,
    workspace_id: WorkspaceId,
    user_id: &str,
    role: WorkspaceRole,
    email: &str,
) {
    let insert = sqlx::query(
        r#"
        INSERT INTO workspace_members (workspace_id, user_id, email, role)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(workspace_id.as_uuid())
    .bind(user_id)
    .bind(email)
    .bind(role.as_str())
    .execute(pool)
    .await;
    assert!(insert.is_ok());
}
