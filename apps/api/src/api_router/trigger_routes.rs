use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::post;
use ptw_application::RateLimitRule;

use crate::state::AppState;
use crate::{handlers, middleware};

/// Periodic trigger endpoints called by the worker with the shared secret.
pub(super) fn build_trigger_routes(app_state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/api/internal/jobs/permits/activate",
            post(handlers::jobs::activate_due_permits_handler),
        )
        .route(
            "/api/internal/jobs/permits/expire",
            post(handlers::jobs::expire_lapsed_permits_handler),
        )
        .route(
            "/api/internal/jobs/reminders/digest",
            post(handlers::jobs::send_qualification_digests_handler),
        )
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::require_trigger_auth,
        ))
        .route_layer(from_fn_with_state(
            app_state,
            middleware::rate_limit_client_ip,
        ))
        .layer(axum::Extension(RateLimitRule::trigger_endpoints()))
}
