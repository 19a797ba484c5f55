mod common;
mod credentials;
mod jobs;
mod permits;
mod templates;

pub use common::HealthResponse;
pub use credentials::{
    ContractorCredentialsResponse, QualificationResponse, RecordQualificationRequest,
    RecordTrainingRequest, TrainingCompletionResponse, WaiveQualificationRequest, parse_date,
};
pub use jobs::{DigestResultResponse, DigestRunResponse, JobRunResponse};
pub use permits::{
    ChecklistActionRequest, CreatePermitRequest, PermitActionRequest, PermitActionResponse,
    PermitDetailResponse, PermitResponse, TaskActionRequest, parse_uuid,
};
pub use templates::{PublishTemplateRequest, TemplateResponse};
