use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use ptw_core::ActorContext;
use ptw_domain::PermitId;

use crate::dto::{
    ChecklistActionRequest, CreatePermitRequest, PermitActionRequest, PermitActionResponse,
    PermitDetailResponse, PermitResponse, TaskActionRequest, parse_uuid,
};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn create_permit_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Json(payload): Json<CreatePermitRequest>,
) -> ApiResult<(StatusCode, Json<PermitResponse>)> {
    let permit = state
        .workflow_service
        .create_permit(&actor, payload.try_into()?)
        .await?;

    Ok((StatusCode::CREATED, Json(permit.into())))
}

pub async fn permit_detail_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Path(permit_id): Path<String>,
) -> ApiResult<Json<PermitDetailResponse>> {
    let permit_id = PermitId::parse(permit_id.as_str())?;
    let detail = state
        .workflow_service
        .get_permit_detail(&actor, permit_id)
        .await?;

    Ok(Json(detail.into()))
}

pub async fn permit_action_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Path(permit_id): Path<String>,
    Json(payload): Json<PermitActionRequest>,
) -> ApiResult<Json<PermitActionResponse>> {
    let permit_id = PermitId::parse(permit_id.as_str())?;
    let service = &state.workflow_service;

    let response: PermitActionResponse = match payload {
        PermitActionRequest::Transition(request) => service
            .transition_permit(&actor, permit_id, request.try_into()?)
            .await?
            .into(),
        PermitActionRequest::Decision(request) => service
            .record_decision(&actor, permit_id, request.try_into()?)
            .await?
            .into(),
        PermitActionRequest::Checklist(ChecklistActionRequest::Add { label, required }) => {
            let item = service
                .add_checklist_item(&actor, permit_id, label.as_str(), required)
                .await?;
            PermitActionResponse::Checklist(item.into())
        }
        PermitActionRequest::Checklist(ChecklistActionRequest::Toggle { item_id, checked }) => {
            let item_id = parse_uuid("item_id", item_id.as_str())?;
            let item = service
                .toggle_checklist_item(&actor, permit_id, item_id, checked)
                .await?;
            PermitActionResponse::Checklist(item.into())
        }
        PermitActionRequest::Task(TaskActionRequest::Complete { task_id }) => {
            let task_id = parse_uuid("task_id", task_id.as_str())?;
            let task = service.complete_task(&actor, permit_id, task_id).await?;
            PermitActionResponse::Task(task.into())
        }
    };

    Ok(Json(response))
}
