// src/routes.rs

use axum::{
    Router, http::Method, middleware,
    routing::{delete, get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{auth, documents, events, groups, questions, subjects},
    state::AppState,
    utils::jwt::auth_middleware,
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, subjects, documents, groups, events).
/// * Everything except register/login sits behind the JWT middleware.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:3000".parse::<axum::http::HeaderValue>().unwrap(),
        "http://127.0.0.1:3000".parse::<axum::http::HeaderValue>().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .merge(
            Router::new().route("/me", get(auth::me)).layer(
                middleware::from_fn_with_state(state.clone(), auth_middleware),
            ),
        );

    let subject_routes = Router::new()
        .route(
            "/",
            get(subjects::list_subjects).post(subjects::create_subject),
        )
        .route(
            "/{id}",
            put(subjects::update_subject).delete(subjects::delete_subject),
        );

    let document_routes = Router::new()
        .route(
            "/",
            get(documents::list_documents).post(documents::create_document),
        )
        .route(
            "/{id}",
            get(documents::get_document).delete(documents::delete_document),
        )
        .route(
            "/{id}/questions",
            get(questions::list_questions).post(questions::create_questions),
        );

    let group_routes = Router::new()
        .route("/", get(groups::list_groups).post(groups::create_group))
        .route("/join", post(groups::join_group))
        .route(
            "/{id}",
            get(groups::view_group).delete(groups::delete_group),
        )
        .route("/{id}/leave", post(groups::leave_group))
        .route("/{id}/subjects", post(groups::add_subject))
        .route(
            "/{id}/subjects/{subject_id}",
            delete(groups::remove_subject),
        )
        .route(
            "/{id}/events",
            get(events::list_events).post(events::create_event),
        );

    let event_routes = Router::new()
        .route(
            "/{id}",
            get(events::event_detail).delete(events::delete_event),
        )
        .route("/{id}/quizzes/{n}", get(events::play_quiz))
        .route("/{id}/quizzes/{n}/submit", post(events::submit_quiz))
        .route("/{id}/participations/{pid}", get(events::quiz_result));

    let protected = Router::new()
        .nest("/api/subjects", subject_routes)
        .nest("/api/documents", document_routes)
        .nest("/api/groups", group_routes)
        .nest("/api/events", event_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .nest("/api/auth", auth_routes)
        .merge(protected)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
