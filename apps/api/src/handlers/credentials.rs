use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use ptw_core::ActorContext;

use crate::dto::{
    ContractorCredentialsResponse, QualificationResponse, RecordQualificationRequest,
    RecordTrainingRequest, TrainingCompletionResponse, WaiveQualificationRequest, parse_date,
};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn contractor_credentials_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Path(contractor_id): Path<String>,
) -> ApiResult<Json<ContractorCredentialsResponse>> {
    let credentials = state
        .credential_service
        .get_credentials(&actor, contractor_id.as_str())
        .await?;

    Ok(Json(credentials.into()))
}

pub async fn record_qualification_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Path(contractor_id): Path<String>,
    Json(payload): Json<RecordQualificationRequest>,
) -> ApiResult<(StatusCode, Json<QualificationResponse>)> {
    let record = state
        .credential_service
        .record_qualification(&actor, payload.into_input(contractor_id)?)
        .await?;

    Ok((StatusCode::CREATED, Json(record.into())))
}

pub async fn waive_qualification_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Path((contractor_id, qualification_type_id)): Path<(String, String)>,
    Json(payload): Json<WaiveQualificationRequest>,
) -> ApiResult<Json<QualificationResponse>> {
    let waived_until = payload
        .waived_until
        .as_deref()
        .map(|value| parse_date("waived_until", value))
        .transpose()?;
    let record = state
        .credential_service
        .waive_qualification(
            &actor,
            contractor_id.as_str(),
            qualification_type_id.as_str(),
            waived_until,
        )
        .await?;

    Ok(Json(record.into()))
}

pub async fn record_training_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Path(contractor_id): Path<String>,
    Json(payload): Json<RecordTrainingRequest>,
) -> ApiResult<(StatusCode, Json<TrainingCompletionResponse>)> {
    let completion = state
        .credential_service
        .record_training_completion(&actor, payload.into_input(contractor_id)?)
        .await?;

    Ok((StatusCode::CREATED, Json(completion.into())))
}
