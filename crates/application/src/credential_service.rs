//! Contractor qualification and training records read by the eligibility gates.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use ptw_core::{ActorContext, AppError, AppResult, NonEmptyString};
use ptw_domain::{AuditAction, PermitAction, QualificationRecord, TrainingCompletion};
use serde_json::{Value, json};
use tracing::info;

use crate::permit_ports::{AuditEvent, Clock, CredentialRepository, SystemClock};

/// Input for recording or renewing a qualification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordQualificationInput {
    /// Contractor holding the qualification.
    pub contractor_id: String,
    /// Qualification type identifier.
    pub qualification_type_id: String,
    /// Expiry date; `None` never expires.
    pub expiry_date: Option<NaiveDate>,
}

/// Input for recording a completed training module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordTrainingInput {
    /// Contractor who completed the module.
    pub contractor_id: String,
    /// Training module identifier.
    pub module_id: String,
    /// Completion time; defaults to now.
    pub completed_at: Option<DateTime<Utc>>,
}

/// Everything the gates see for one contractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractorCredentials {
    /// Contractor identifier.
    pub contractor_id: String,
    /// Qualification records.
    pub qualifications: Vec<QualificationRecord>,
    /// Completed training modules.
    pub training_completions: Vec<TrainingCompletion>,
}

/// Records contractor credentials on behalf of workspace members.
#[derive(Clone)]
pub struct CredentialService {
    repository: Arc<dyn CredentialRepository>,
    clock: Arc<dyn Clock>,
}

impl CredentialService {
    /// Creates a credential service using the system clock.
    #[must_use]
    pub fn new(repository: Arc<dyn CredentialRepository>) -> Self {
        Self {
            repository,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Records a qualification, replacing any earlier record of the same type.
    ///
    /// A renewed record starts without a waiver.
    pub async fn record_qualification(
        &self,
        actor: &ActorContext,
        input: RecordQualificationInput,
    ) -> AppResult<QualificationRecord> {
        PermitAction::RecordCredential.authorize(actor.role())?;
        let contractor_id = NonEmptyString::for_field("contractor_id", input.contractor_id)?;
        let qualification_type_id =
            NonEmptyString::for_field("qualification_type_id", input.qualification_type_id)?;

        let record = QualificationRecord {
            qualification_type_id: qualification_type_id.as_str().to_owned(),
            expiry_date: input.expiry_date,
            waived: false,
            waived_until: None,
        };
        self.save_qualification(
            actor,
            contractor_id.as_str(),
            record,
            AuditAction::QualificationRecorded,
        )
        .await
    }

    /// Waives the expiry of an existing qualification until `waived_until`
    /// inclusive, or indefinitely when `None`.
    pub async fn waive_qualification(
        &self,
        actor: &ActorContext,
        contractor_id: &str,
        qualification_type_id: &str,
        waived_until: Option<NaiveDate>,
    ) -> AppResult<QualificationRecord> {
        PermitAction::WaiveQualification.authorize(actor.role())?;
        if let Some(until) = waived_until
            && until < self.clock.today()
        {
            return Err(AppError::Validation(format!(
                "waived_until {until} is already in the past"
            )));
        }

        let mut record = self
            .repository
            .list_qualifications(actor.workspace_id(), contractor_id)
            .await?
            .into_iter()
            .find(|record| record.qualification_type_id == qualification_type_id)
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "contractor '{contractor_id}' has no '{qualification_type_id}' qualification"
                ))
            })?;
        record.waived = true;
        record.waived_until = waived_until;

        self.save_qualification(actor, contractor_id, record, AuditAction::QualificationWaived)
            .await
    }

    /// Records a completed training module.
    pub async fn record_training_completion(
        &self,
        actor: &ActorContext,
        input: RecordTrainingInput,
    ) -> AppResult<TrainingCompletion> {
        PermitAction::RecordCredential.authorize(actor.role())?;
        let contractor_id = NonEmptyString::for_field("contractor_id", input.contractor_id)?;
        let module_id = NonEmptyString::for_field("module_id", input.module_id)?;

        let now = self.clock.now();
        let completed_at = input.completed_at.unwrap_or(now);
        if completed_at > now {
            return Err(AppError::Validation(
                "completed_at must not be in the future".to_owned(),
            ));
        }

        let completion = TrainingCompletion {
            module_id: module_id.as_str().to_owned(),
            completed_at,
        };
        let audit_event = contractor_audit(
            actor,
            contractor_id.as_str(),
            AuditAction::TrainingCompleted,
            json!({
                "module_id": completion.module_id,
                "completed_at": completion.completed_at,
            }),
        );
        self.repository
            .save_training_completion(
                actor.workspace_id(),
                contractor_id.as_str(),
                completion.clone(),
                audit_event,
            )
            .await?;

        info!(
            workspace_id = %actor.workspace_id(),
            contractor_id = contractor_id.as_str(),
            module_id = completion.module_id.as_str(),
            "training completion recorded"
        );
        Ok(completion)
    }

    /// Returns the qualifications and training a contractor holds.
    pub async fn get_credentials(
        &self,
        actor: &ActorContext,
        contractor_id: &str,
    ) -> AppResult<ContractorCredentials> {
        let workspace_id = actor.workspace_id();
        let qualifications = self
            .repository
            .list_qualifications(workspace_id, contractor_id)
            .await?;
        let training_completions = self
            .repository
            .list_training_completions(workspace_id, contractor_id)
            .await?;

        Ok(ContractorCredentials {
            contractor_id: contractor_id.to_owned(),
            qualifications,
            training_completions,
        })
    }

    async fn save_qualification(
        &self,
        actor: &ActorContext,
        contractor_id: &str,
        record: QualificationRecord,
        action: AuditAction,
    ) -> AppResult<QualificationRecord> {
        let audit_event = contractor_audit(
            actor,
            contractor_id,
            action,
            json!({
                "qualification_type_id": record.qualification_type_id,
                "expiry_date": record.expiry_date,
                "waived": record.waived,
                "waived_until": record.waived_until,
            }),
        );
        self.repository
            .save_qualification(
                actor.workspace_id(),
                contractor_id,
                record.clone(),
                audit_event,
            )
            .await?;

        info!(
            workspace_id = %actor.workspace_id(),
            contractor_id,
            qualification_type_id = record.qualification_type_id.as_str(),
            action = action.as_str(),
            "qualification saved"
        );
        Ok(record)
    }
}

fn contractor_audit(
    actor: &ActorContext,
    contractor_id: &str,
    action: AuditAction,
    payload: Value,
) -> AuditEvent {
    AuditEvent {
        workspace_id: actor.workspace_id(),
        actor: actor.actor_id().to_owned(),
        action,
        object_type: "contractor".to_owned(),
        object_id: contractor_id.to_owned(),
        payload,
    }
}
