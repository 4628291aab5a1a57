// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{auth, evaluations, exams, sessions, sets},
    state::AppState,
    utils::jwt::{auth_middleware, student_middleware, teacher_middleware},
};

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// Assembles the main application router.
///
/// * `/api/auth` is public.
/// * Teacher and student routes sit behind `auth_middleware` plus a role gate.
/// * `/api/sets/{id}` only needs a valid token.
pub fn create_router(state: AppState) -> Router {
    let auth_routes = Router::new().route("/callback", post(auth::callback));

    let teacher_routes = Router::new()
        .route("/exams", post(exams::create_exam).get(exams::list_exams))
        .route("/exams/{id}", get(exams::get_exam).put(exams::update_exam))
        .route("/exams/{id}/sets", post(exams::generate_sets))
        .route("/exams/{id}/sessions", get(exams::list_exam_sessions))
        .route("/exams/{id}/results", get(exams::exam_results))
        .route(
            "/sessions/{id}/evaluation",
            post(evaluations::create_evaluation),
        )
        .route(
            "/evaluations/{id}",
            get(evaluations::get_evaluation).put(evaluations::update_evaluation),
        )
        .layer(middleware::from_fn(teacher_middleware));

    let student_routes = Router::new()
        .route("/exams/available", get(exams::list_available))
        .route("/exams/{id}/assign", post(exams::assign))
        .route("/sessions", get(sessions::list_sessions))
        .route("/sessions/{id}", get(sessions::get_session))
        .route("/sessions/{id}/start", post(sessions::start_session))
        .route("/sessions/{id}/submit", post(sessions::submit_session))
        .layer(middleware::from_fn(student_middleware));

    // Auth runs first, then the role gates above.
    let protected_routes = Router::new()
        .merge(teacher_routes)
        .merge(student_routes)
        .route("/sets/{id}", get(sets::get_set))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let global = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config.cors_origins));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api", protected_routes)
        .layer(global)
        .with_state(state)
}
