use axum::Json;
use axum::extract::State;
use chrono::Utc;
use tracing::info;

use crate::dto::{DigestResultResponse, DigestRunResponse, JobRunResponse};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn activate_due_permits_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<JobRunResponse>> {
    let summary = state
        .scheduled_job_service
        .activate_due_permits(Utc::now())
        .await?;

    info!(
        transitioned = summary.transitioned,
        skipped = summary.skipped,
        "activation trigger completed"
    );
    Ok(Json(summary.into()))
}

pub async fn expire_lapsed_permits_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<JobRunResponse>> {
    let summary = state
        .scheduled_job_service
        .expire_lapsed_permits(Utc::now())
        .await?;

    info!(
        transitioned = summary.transitioned,
        skipped = summary.skipped,
        "expiry trigger completed"
    );
    Ok(Json(summary.into()))
}

pub async fn send_qualification_digests_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<DigestRunResponse>> {
    let today = Utc::now().date_naive();
    let results: Vec<DigestResultResponse> = state
        .scheduled_job_service
        .send_qualification_digests(today)
        .await?
        .into_iter()
        .map(DigestResultResponse::from)
        .collect();

    info!(
        workspaces = results.len(),
        %today,
        "qualification digest trigger completed"
    );
    Ok(Json(DigestRunResponse { results }))
}
