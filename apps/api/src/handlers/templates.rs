use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use ptw_core::ActorContext;
use ptw_domain::TemplateId;

use crate::dto::{PublishTemplateRequest, TemplateResponse};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn publish_template_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Json(payload): Json<PublishTemplateRequest>,
) -> ApiResult<(StatusCode, Json<TemplateResponse>)> {
    let template = state
        .template_service
        .publish_template(&actor, payload.try_into()?)
        .await?;

    Ok((StatusCode::CREATED, Json(template.into())))
}

pub async fn latest_template_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Path(template_id): Path<String>,
) -> ApiResult<Json<TemplateResponse>> {
    let template_id = TemplateId::parse(template_id.as_str())?;
    let template = state
        .template_service
        .get_latest_template(&actor, template_id)
        .await?;

    Ok(Json(template.into()))
}
