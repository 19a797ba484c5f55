use axum::Router;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use ptw_application::RateLimitRule;
use ptw_core::AppError;
use tower_http::trace::TraceLayer;
use tower_sessions::{SessionManagerLayer, SessionStore};

use crate::state::AppState;
use crate::{handlers, middleware};

mod cors;
mod trigger_routes;

use cors::build_cors_layer;
use trigger_routes::build_trigger_routes;

pub fn build_router<S>(
    app_state: AppState,
    frontend_url: &str,
    session_layer: SessionManagerLayer<S>,
) -> Result<Router, AppError>
where
    S: SessionStore + Clone,
{
    let read_routes = Router::new()
        .route(
            "/api/permits/{permit_id}",
            get(handlers::permits::permit_detail_handler),
        )
        .route(
            "/api/templates/{template_id}",
            get(handlers::templates::latest_template_handler),
        )
        .route(
            "/api/contractors/{contractor_id}/credentials",
            get(handlers::credentials::contractor_credentials_handler),
        )
        .route_layer(from_fn(middleware::require_auth));

    // Rate limiting reads the actor, so it must run inside `require_auth`.
    let mutation_routes = Router::new()
        .route("/api/permits", post(handlers::permits::create_permit_handler))
        .route(
            "/api/permits/{permit_id}/actions",
            post(handlers::permits::permit_action_handler),
        )
        .route(
            "/api/templates",
            post(handlers::templates::publish_template_handler),
        )
        .route(
            "/api/contractors/{contractor_id}/qualifications",
            post(handlers::credentials::record_qualification_handler),
        )
        .route(
            "/api/contractors/{contractor_id}/qualifications/{qualification_type_id}/waiver",
            post(handlers::credentials::waive_qualification_handler),
        )
        .route(
            "/api/contractors/{contractor_id}/training",
            post(handlers::credentials::record_training_handler),
        )
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::rate_limit_actor,
        ))
        .route_layer(from_fn(middleware::require_auth))
        .layer(axum::Extension(RateLimitRule::permit_actions()));

    let session_routes = Router::new()
        .merge(read_routes)
        .merge(mutation_routes)
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::require_same_origin_for_mutations,
        ));

    Ok(Router::new()
        .route("/health", get(handlers::health::health_handler))
        .merge(session_routes)
        .merge(build_trigger_routes(app_state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(frontend_url)?)
        .layer(session_layer)
        .with_state(app_state))
}
