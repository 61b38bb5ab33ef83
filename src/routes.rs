// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{handlers::challenge, state::AppState, utils::jwt::auth_middleware};

/// Assembles the main application router.
///
/// * Public challenge lookups need no identity.
/// * Everything personalised sits behind the bearer-token middleware.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let public_routes = Router::new().route("/{id}", get(challenge::get_challenge));

    let protected_routes = Router::new()
        .route("/", post(challenge::create_challenge))
        .route("/{id}/accept", post(challenge::accept_challenge))
        .route("/{id}/submit", post(challenge::submit_challenge))
        .route("/{id}/results", get(challenge::get_results))
        .route("/{id}/events", get(challenge::challenge_events))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api/challenges", public_routes.merge(protected_routes))
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
