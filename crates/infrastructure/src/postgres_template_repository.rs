use async_trait::async_trait;
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use ptw_application::{AuditEvent, TemplateRepository};
use ptw_core::{AppError, AppResult, WorkspaceId};
use ptw_domain::{PermitTemplate, PermitTemplateInput, TemplateId, TemplateRef};

use crate::postgres_audit_repository::insert_audit_event;

/// PostgreSQL-backed repository for immutable template versions.
#[derive(Clone)]
pub struct PostgresTemplateRepository {
    pool: PgPool,
}

impl PostgresTemplateRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct TemplateRow {
    template_id: Uuid,
    version: i32,
    name: String,
    approval_steps: Value,
    qualification_gate: Option<Value>,
    training_gate: Option<Value>,
}

impl TryFrom<TemplateRow> for PermitTemplate {
    type Error = AppError;

    fn try_from(row: TemplateRow) -> AppResult<Self> {
        let decode_error = |column: &str, error: serde_json::Error| {
            AppError::Internal(format!(
                "invalid {column} on template '{}' version {}: {error}",
                row.template_id, row.version
            ))
        };

        let approval_steps = serde_json::from_value(row.approval_steps)
            .map_err(|error| decode_error("approval_steps", error))?;
        let qualification_gate = row
            .qualification_gate
            .map(serde_json::from_value)
            .transpose()
            .map_err(|error| decode_error("qualification_gate", error))?;
        let training_gate = row
            .training_gate
            .map(serde_json::from_value)
            .transpose()
            .map_err(|error| decode_error("training_gate", error))?;

        PermitTemplate::new(PermitTemplateInput {
            template_id: TemplateId::from_uuid(row.template_id),
            version: row.version,
            name: row.name,
            approval_steps,
            qualification_gate,
            training_gate,
        })
    }
}

fn encode<T: serde::Serialize>(column: &str, value: &T) -> AppResult<Value> {
    serde_json::to_value(value)
        .map_err(|error| AppError::Internal(format!("failed to encode template {column}: {error}")))
}

#[async_trait]
impl TemplateRepository for PostgresTemplateRepository {
    async fn find_latest_template(
        &self,
        workspace_id: WorkspaceId,
        template_id: TemplateId,
    ) -> AppResult<Option<PermitTemplate>> {
        sqlx::query_as::<_, TemplateRow>(
            r#"
            SELECT template_id, version, name, approval_steps, qualification_gate, training_gate
            FROM permit_templates
            WHERE workspace_id = $1 AND template_id = $2
            ORDER BY version DESC
            LIMIT 1
            "#,
        )
        .bind(workspace_id.as_uuid())
        .bind(template_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to find template '{template_id}': {error}"))
        })?
        .map(PermitTemplate::try_from)
        .transpose()
    }

    async fn find_template_version(
        &self,
        workspace_id: WorkspaceId,
        reference: TemplateRef,
    ) -> AppResult<Option<PermitTemplate>> {
        sqlx::query_as::<_, TemplateRow>(
            r#"
            SELECT template_id, version, name, approval_steps, qualification_gate, training_gate
            FROM permit_templates
            WHERE workspace_id = $1 AND template_id = $2 AND version = $3
            "#,
        )
        .bind(workspace_id.as_uuid())
        .bind(reference.template_id.as_uuid())
        .bind(reference.version)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to find template '{}' version {}: {error}",
                reference.template_id, reference.version
            ))
        })?
        .map(PermitTemplate::try_from)
        .transpose()
    }

    async fn insert_template_version(
        &self,
        workspace_id: WorkspaceId,
        template: PermitTemplate,
        audit_event: AuditEvent,
    ) -> AppResult<()> {
        let reference = template.reference();
        let approval_steps = encode("approval_steps", &template.approval_steps())?;
        let qualification_gate = template
            .qualification_gate()
            .map(|gate| encode("qualification_gate", gate))
            .transpose()?;
        let training_gate = template
            .training_gate()
            .map(|gate| encode("training_gate", gate))
            .transpose()?;

        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to start template publish transaction: {error}"))
        })?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO permit_templates (
                workspace_id,
                template_id,
                version,
                name,
                approval_steps,
                qualification_gate,
                training_gate,
                published_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (workspace_id, template_id, version) DO NOTHING
            "#,
        )
        .bind(workspace_id.as_uuid())
        .bind(reference.template_id.as_uuid())
        .bind(reference.version)
        .bind(template.name().as_str())
        .bind(approval_steps)
        .bind(qualification_gate)
        .bind(training_gate)
        .bind(audit_event.actor.as_str())
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to insert template '{}' version {}: {error}",
                reference.template_id, reference.version
            ))
        })?;

        if inserted.rows_affected() == 0 {
            return Err(AppError::Conflict(format!(
                "template '{}' version {} already exists",
                reference.template_id, reference.version
            )));
        }

        insert_audit_event(&mut transaction, &audit_event).await?;
        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit template publish transaction: {error}"))
        })
    }
}
