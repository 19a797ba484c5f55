use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};

use ptw_application::{AuditEvent, CredentialRepository};
use ptw_core::{AppError, AppResult, WorkspaceId};
use ptw_domain::{QualificationRecord, TrainingCompletion};

use crate::postgres_audit_repository::insert_audit_event;

/// PostgreSQL-backed contractor qualifications and training completions.
///
/// Writes upsert on the contractor's qualification type or module and land
/// in one transaction with their audit row.
#[derive(Clone)]
pub struct PostgresCredentialRepository {
    pool: PgPool,
}

impl PostgresCredentialRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn begin(&self, purpose: &str) -> AppResult<Transaction<'static, Postgres>> {
        self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to start {purpose} transaction: {error}"))
        })
    }
}

async fn commit_with_audit(
    mut transaction: Transaction<'static, Postgres>,
    audit_event: &AuditEvent,
    purpose: &str,
) -> AppResult<()> {
    insert_audit_event(&mut transaction, audit_event).await?;
    transaction.commit().await.map_err(|error| {
        AppError::Internal(format!("failed to commit {purpose} transaction: {error}"))
    })
}

#[derive(Debug, FromRow)]
struct QualificationRow {
    qualification_type_id: String,
    expiry_date: Option<NaiveDate>,
    waived: bool,
    waived_until: Option<NaiveDate>,
}

#[derive(Debug, FromRow)]
struct TrainingCompletionRow {
    module_id: String,
    completed_at: DateTime<Utc>,
}

#[async_trait]
impl CredentialRepository for PostgresCredentialRepository {
    async fn list_qualifications(
        &self,
        workspace_id: WorkspaceId,
        contractor_id: &str,
    ) -> AppResult<Vec<QualificationRecord>> {
        let rows = sqlx::query_as::<_, QualificationRow>(
            r#"
            SELECT qualification_type_id, expiry_date, waived, waived_until
            FROM contractor_qualifications
            WHERE workspace_id = $1 AND contractor_id = $2
            "#,
        )
        .bind(workspace_id.as_uuid())
        .bind(contractor_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list qualifications for contractor '{contractor_id}': {error}"
            ))
        })?;

        Ok(rows
            .into_iter()
            .map(|row| QualificationRecord {
                qualification_type_id: row.qualification_type_id,
                expiry_date: row.expiry_date,
                waived: row.waived,
                waived_until: row.waived_until,
            })
            .collect())
    }

    async fn list_training_completions(
        &self,
        workspace_id: WorkspaceId,
        contractor_id: &str,
    ) -> AppResult<Vec<TrainingCompletion>> {
        let rows = sqlx::query_as::<_, TrainingCompletionRow>(
            r#"
            SELECT module_id, completed_at
            FROM contractor_training_completions
            WHERE workspace_id = $1 AND contractor_id = $2
            "#,
        )
        .bind(workspace_id.as_uuid())
        .bind(contractor_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list training completions for contractor '{contractor_id}': {error}"
            ))
        })?;

        Ok(rows
            .into_iter()
            .map(|row| TrainingCompletion {
                module_id: row.module_id,
                completed_at: row.completed_at,
            })
            .collect())
    }

    async fn count_qualifications_expiring(
        &self,
        workspace_id: WorkspaceId,
        horizon: NaiveDate,
    ) -> AppResult<u64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM contractor_qualifications
            WHERE workspace_id = $1
              AND expiry_date IS NOT NULL
              AND expiry_date <= $2
            "#,
        )
        .bind(workspace_id.as_uuid())
        .bind(horizon)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to count expiring qualifications for workspace '{workspace_id}': {error}"
            ))
        })?;

        u64::try_from(count)
            .map_err(|error| AppError::Internal(format!("invalid qualification count: {error}")))
    }

    async fn save_qualification(
        &self,
        workspace_id: WorkspaceId,
        contractor_id: &str,
        record: QualificationRecord,
        audit_event: AuditEvent,
    ) -> AppResult<()> {
        let mut transaction = self.begin("qualification").await?;
        sqlx::query(
            r#"
            INSERT INTO contractor_qualifications (
                workspace_id,
                contractor_id,
                qualification_type_id,
                expiry_date,
                waived,
                waived_until
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (workspace_id, contractor_id, qualification_type_id) DO UPDATE
            SET
                expiry_date = EXCLUDED.expiry_date,
                waived = EXCLUDED.waived,
                waived_until = EXCLUDED.waived_until,
                recorded_at = now()
            "#,
        )
        .bind(workspace_id.as_uuid())
        .bind(contractor_id)
        .bind(record.qualification_type_id.as_str())
        .bind(record.expiry_date)
        .bind(record.waived)
        .bind(record.waived_until)
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to save qualification '{}' for contractor '{contractor_id}': {error}",
                record.qualification_type_id
            ))
        })?;

        commit_with_audit(transaction, &audit_event, "qualification").await
    }

    async fn save_training_completion(
        &self,
        workspace_id: WorkspaceId,
        contractor_id: &str,
        completion: TrainingCompletion,
        audit_event: AuditEvent,
    ) -> AppResult<()> {
        let mut transaction = self.begin("training completion").await?;
        sqlx::query(
            r#"
            INSERT INTO contractor_training_completions (
                workspace_id,
                contractor_id,
                module_id,
                completed_at
            )
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (workspace_id, contractor_id, module_id) DO UPDATE
            SET completed_at = EXCLUDED.completed_at
            "#,
        )
        .bind(workspace_id.as_uuid())
        .bind(contractor_id)
        .bind(completion.module_id.as_str())
        .bind(completion.completed_at)
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to save training '{}' for contractor '{contractor_id}': {error}",
                completion.module_id
            ))
        })?;

        commit_with_audit(transaction, &audit_event, "training completion").await
    }
}
