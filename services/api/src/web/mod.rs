pub mod auth;
pub mod extract;
pub mod middleware;
pub mod rest;
pub mod state;

use std::sync::Arc;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};

pub use middleware::{require_auth, security_headers};
use state::AppState;

/// Builds every API route with its middleware. CORS and the Swagger UI are
/// added by the binary.
pub fn build_router(app_state: Arc<AppState>) -> Router {
    let auth_layer = axum_middleware::from_fn_with_state(app_state.clone(), require_auth);

    // Public routes (no auth required). The two paths shared with a write
    // carry the auth layer on their POST only.
    let public_routes = Router::new()
        .route("/courses", get(rest::list_courses_handler))
        .route("/courses/{code}", get(rest::get_course_handler))
        .route("/courses/{code}/emphases", get(rest::list_emphases_handler))
        .route(
            "/courses/{code}/emphases/{emphasis}",
            get(rest::get_emphasis_handler),
        )
        .route(
            "/courses/{code}/disciplines",
            get(rest::list_basic_disciplines_handler),
        )
        .route(
            "/courses/{code}/emphases/{emphasis}/disciplines",
            get(rest::list_emphasis_disciplines_handler),
        )
        .route("/disciplines/{id}", get(rest::get_discipline_handler))
        .route(
            "/disciplines/{id}/professors",
            get(rest::list_discipline_professors_handler)
                .merge(post(rest::link_professor_handler).route_layer(auth_layer.clone())),
        )
        .route(
            "/disciplines/{id}/courses",
            get(rest::list_discipline_courses_handler),
        )
        .route(
            "/professors",
            get(rest::search_professors_handler)
                .merge(post(rest::create_professor_handler).route_layer(auth_layer.clone())),
        )
        .route("/professors/{id}", get(rest::get_professor_handler))
        .route("/search", get(rest::search_handler))
        .route("/stats", get(rest::stats_handler))
        .route("/auth/magic-link", post(auth::magic_link_handler))
        .route("/auth/callback", get(auth::callback_handler))
        .route("/auth/session", post(auth::session_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route("/auth/me", get(auth::me_handler))
        .route(
            "/api/send-verification",
            post(auth::send_verification_handler),
        );

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/ratings", post(rest::create_rating_handler))
        .route("/ratings/check", get(rest::check_rating_handler))
        .route("/feedback", post(rest::create_feedback_handler))
        .route(
            "/admin/associations",
            post(rest::associate_handler).delete(rest::remove_association_handler),
        )
        .route(
            "/admin/courses/{code}/disciplines",
            get(rest::list_course_offerings_handler),
        )
        .route("/admin/basic-disciplines", post(rest::mark_basic_handler))
        .route_layer(auth_layer);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            security_headers,
        ))
        .with_state(app_state)
}
