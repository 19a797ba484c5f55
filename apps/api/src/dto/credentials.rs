use chrono::NaiveDate;
use ptw_application::{ContractorCredentials, RecordQualificationInput, RecordTrainingInput};
use ptw_core::AppError;
use ptw_domain::{QualificationRecord, TrainingCompletion};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::permits::{format_timestamp, parse_timestamp};

/// Incoming payload for recording or renewing a qualification.
#[derive(Debug, Deserialize, TS)]
#[ts(export, export_to = "record-qualification-request.ts")]
pub struct RecordQualificationRequest {
    pub qualification_type_id: String,
    /// `YYYY-MM-DD`; omitted for qualifications that never expire.
    #[serde(default)]
    pub expiry_date: Option<String>,
}

/// Incoming payload for waiving a qualification expiry.
#[derive(Debug, Deserialize, TS)]
#[ts(export, export_to = "waive-qualification-request.ts")]
pub struct WaiveQualificationRequest {
    /// Last waived day, `YYYY-MM-DD`; omitted to waive indefinitely.
    #[serde(default)]
    pub waived_until: Option<String>,
}

/// Incoming payload for recording a completed training module.
#[derive(Debug, Deserialize, TS)]
#[ts(export, export_to = "record-training-request.ts")]
pub struct RecordTrainingRequest {
    pub module_id: String,
    /// RFC 3339 timestamp; defaults to now.
    #[serde(default)]
    pub completed_at: Option<String>,
}

/// API representation of a qualification record.
#[derive(Debug, Serialize, TS)]
#[ts(export, export_to = "qualification-response.ts")]
pub struct QualificationResponse {
    pub qualification_type_id: String,
    pub expiry_date: Option<String>,
    pub waived: bool,
    pub waived_until: Option<String>,
}

/// API representation of a training completion.
#[derive(Debug, Serialize, TS)]
#[ts(export, export_to = "training-completion-response.ts")]
pub struct TrainingCompletionResponse {
    pub module_id: String,
    pub completed_at: String,
}

/// Credentials held by one contractor.
#[derive(Debug, Serialize, TS)]
#[ts(export, export_to = "contractor-credentials-response.ts")]
pub struct ContractorCredentialsResponse {
    pub contractor_id: String,
    pub qualifications: Vec<QualificationResponse>,
    pub training_completions: Vec<TrainingCompletionResponse>,
}

pub fn parse_date(field: &str, value: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|error| AppError::Validation(format!("invalid {field} '{value}': {error}")))
}

impl RecordQualificationRequest {
    pub fn into_input(self, contractor_id: String) -> Result<RecordQualificationInput, AppError> {
        Ok(RecordQualificationInput {
            contractor_id,
            qualification_type_id: self.qualification_type_id,
            expiry_date: self
                .expiry_date
                .as_deref()
                .map(|value| parse_date("expiry_date", value))
                .transpose()?,
        })
    }
}

impl RecordTrainingRequest {
    pub fn into_input(self, contractor_id: String) -> Result<RecordTrainingInput, AppError> {
        Ok(RecordTrainingInput {
            contractor_id,
            module_id: self.module_id,
            completed_at: self
                .completed_at
                .as_deref()
                .map(|value| parse_timestamp("completed_at", value))
                .transpose()?,
        })
    }
}

impl From<QualificationRecord> for QualificationResponse {
    fn from(value: QualificationRecord) -> Self {
        Self {
            qualification_type_id: value.qualification_type_id,
            expiry_date: value.expiry_date.map(|date| date.to_string()),
            waived: value.waived,
            waived_until: value.waived_until.map(|date| date.to_string()),
        }
    }
}

impl From<TrainingCompletion> for TrainingCompletionResponse {
    fn from(value: TrainingCompletion) -> Self {
        Self {
            module_id: value.module_id,
            completed_at: format_timestamp(value.completed_at),
        }
    }
}

impl From<ContractorCredentials> for ContractorCredentialsResponse {
    fn from(value: ContractorCredentials) -> Self {
        Self {
            contractor_id: value.contractor_id,
            qualifications: value.qualifications.into_iter().map(Into::into).collect(),
            training_completions: value
                .training_completions
                .into_iter()
                .map(Into::into)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use ptw_core::AppError;

    use super::{RecordQualificationRequest, parse_date};

    #[test]
    fn dates_use_the_calendar_format() {
        assert_eq!(
            parse_date("expiry_date", "2026-03-31").ok(),
            NaiveDate::from_ymd_opt(2026, 3, 31)
        );
        assert!(matches!(
            parse_date("expiry_date", "31/03/2026"),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn path_contractor_is_used_for_the_record() {
        let input = RecordQualificationRequest {
            qualification_type_id: "hot-work".to_owned(),
            expiry_date: None,
        }
        .into_input("contractor-7".to_owned())
        .unwrap_or_else(|_| unreachable!());

        assert_eq!(input.contractor_id, "contractor-7");
        assert_eq!(input.expiry_date, None);
    }
}
