// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    routing::{get, post, put},
};
use tower::{Layer, ServiceBuilder};
use tower_http::{
    cors::CorsLayer,
    normalize_path::{NormalizePath, NormalizePathLayer},
    trace::TraceLayer,
};

use crate::{
    handlers::{admin, exams, index, stats},
    state::AppState,
};

/// The router wrapped so that `/api/exams/` and `/api/exams` reach the same
/// handler. Path normalization has to run before routing, so it wraps the
/// finished router instead of being added with `Router::layer`.
///
/// Serve with `axum::ServiceExt::<Request>::into_make_service`.
pub fn create_app(state: AppState) -> NormalizePath<Router> {
    NormalizePathLayer::trim_trailing_slash().layer(create_router(state))
}

/// Assembles the main application router.
///
/// * Public exam, submission and statistics routes under `/api`.
/// * Authoring routes under `/api/admin`.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true);

    let exam_routes = Router::new()
        .route("/", get(exams::list_exams))
        .route("/{id}", get(exams::get_exam))
        .route("/{id}/submit", post(exams::submit_attempt));

    let stats_routes = Router::new()
        .route("/users", get(stats::user_stats))
        .route("/attempts", get(stats::list_attempts));

    let admin_routes = Router::new()
        .route("/exams", post(admin::create_exam))
        .route(
            "/exams/{id}",
            get(admin::get_exam)
                .put(admin::update_exam)
                .delete(admin::delete_exam),
        )
        .route("/exams/{id}/publish", post(admin::publish_exam))
        .route("/exams/{id}/questions", post(admin::create_question))
        .route(
            "/questions/{id}",
            put(admin::update_question).delete(admin::delete_question),
        )
        .route("/questions/{id}/move", post(admin::move_question))
        .route("/questions/{id}/options", post(admin::create_option))
        .route(
            "/options/{id}",
            put(admin::update_option).delete(admin::delete_option),
        );

    Router::new()
        .route("/", get(index::index))
        .nest("/api/exams", exam_routes)
        .nest("/api/stats", stats_routes)
        .nest("/api/admin", admin_routes)
        // Global Middleware (applied from outside in)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
