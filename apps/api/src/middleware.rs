use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Extension, Request, State};
use axum::http::{HeaderMap, HeaderValue, Method, header};
use axum::middleware::Next;
use axum::response::Response;
use ptw_application::RateLimitRule;
use ptw_core::{ActorContext, AppError};
use subtle::ConstantTimeEq;
use tower_sessions::Session;
use tracing::warn;

use crate::error::ApiResult;
use crate::state::AppState;

/// Session key under which the sign-in flow stores the caller's `ActorContext`.
pub const SESSION_ACTOR_KEY: &str = "ptw.actor";

pub async fn require_auth(
    session: Session,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let actor = session
        .get::<ActorContext>(SESSION_ACTOR_KEY)
        .await
        .map_err(|error| AppError::Internal(format!("failed to read session actor: {error}")))?
        .ok_or_else(|| AppError::Unauthorized("authentication required".to_owned()))?;

    request.extensions_mut().insert(actor);
    Ok(next.run(request).await)
}

pub async fn require_same_origin_for_mutations(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> ApiResult<Response> {
    if is_state_changing_method(request.method()) {
        let headers = request.headers();

        if let Some(fetch_site) = headers.get("sec-fetch-site") {
            if fetch_site == HeaderValue::from_static("cross-site") {
                return Err(AppError::Unauthorized("cross-site request blocked".to_owned()).into());
            }
        }

        let origin = headers
            .get(header::ORIGIN)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        let referer = headers
            .get(header::REFERER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();

        let allowed_origin = state.frontend_url;
        let origin_is_allowed = origin == allowed_origin;
        let referer_is_allowed = referer.starts_with(&allowed_origin);

        if !origin_is_allowed && !referer_is_allowed {
            return Err(AppError::Unauthorized("origin validation failed".to_owned()).into());
        }
    }

    Ok(next.run(request).await)
}

/// Counts mutations per authenticated actor. Runs inside `require_auth`.
pub async fn rate_limit_actor(
    State(state): State<AppState>,
    Extension(rule): Extension<RateLimitRule>,
    request: Request,
    next: Next,
) -> ApiResult<Response> {
    let actor = request
        .extensions()
        .get::<ActorContext>()
        .ok_or_else(|| AppError::Unauthorized("authentication required".to_owned()))?;
    let key = format!("{}:{}", actor.workspace_id(), actor.actor_id());

    state.rate_limit_service.check_rate_limit(&rule, &key).await?;
    Ok(next.run(request).await)
}

/// Counts requests per client address.
pub async fn rate_limit_client_ip(
    State(state): State<AppState>,
    Extension(rule): Extension<RateLimitRule>,
    request: Request,
    next: Next,
) -> ApiResult<Response> {
    let key = client_ip(&request);
    state.rate_limit_service.check_rate_limit(&rule, &key).await?;
    Ok(next.run(request).await)
}

pub async fn require_trigger_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> ApiResult<Response> {
    let provided = bearer_token(request.headers()).ok_or_else(|| {
        AppError::Unauthorized("trigger endpoints require a bearer token".to_owned())
    })?;

    if !constant_time_eq(provided, state.trigger_shared_secret.as_str()) {
        warn!(path = %request.uri().path(), "trigger request rejected: invalid token");
        return Err(AppError::Unauthorized("invalid trigger token".to_owned()).into());
    }

    Ok(next.run(request).await)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn constant_time_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }

    provided.ct_eq(expected).into()
}

fn client_ip(request: &Request) -> String {
    if let Some(ConnectInfo(address)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return address.ip().to_string();
    }

    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map_or_else(|| "unknown".to_owned(), ToOwned::to_owned)
}

fn is_state_changing_method(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderMap, HeaderValue, header};

    use super::{bearer_token, constant_time_eq};

    #[test]
    fn constant_time_eq_matches_only_identical_tokens() {
        assert!(constant_time_eq("shared-secret", "shared-secret"));
        assert!(!constant_time_eq("shared-secreT", "shared-secret"));
        assert!(!constant_time_eq("shared", "shared-secret"));
        assert!(!constant_time_eq("", "shared-secret"));
    }

    #[test]
    fn bearer_token_requires_the_bearer_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer_token(&headers), Some("abc"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer  "));
        assert_eq!(bearer_token(&headers), None);
    }
}
