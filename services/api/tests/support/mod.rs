//! Test harness: the real router over in-memory adapters.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use api_lib::config::Config;
use api_lib::web::{build_router, state::AppState};
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, Response};
use axum::Router;
use course_ratings_core::domain::{Discipline, Professor};
use course_ratings_core::test_support::{FakeAuthProvider, InMemoryDatabase};
use course_ratings_core::{InMemoryRateLimiter, RateLimiter, RatingsService};
use serde_json::Value;
use tower::ServiceExt;

pub const STUDENT_EMAIL: &str = "aluno@graduacao.uerj.br";
pub const STUDENT_TOKEN: &str = "student-token";

pub struct TestApp {
    pub router: Router,
    pub db: Arc<InMemoryDatabase>,
    pub auth: Arc<FakeAuthProvider>,
    pub calculus: Discipline,
    pub ana: Professor,
}

fn config(app_env: &str) -> Config {
    let vars: HashMap<String, String> = [
        ("DATABASE_URL", "postgres://localhost/avaliacoes"),
        ("SUPABASE_URL", "https://project.supabase.co"),
        ("SUPABASE_ANON_KEY", "anon"),
        ("APP_URL", "https://avalia.example.com"),
        ("APP_ENV", app_env),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    Config::from_vars(&vars).expect("test configuration is complete")
}

impl TestApp {
    pub fn new() -> Self {
        Self::build("development", Arc::new(InMemoryRateLimiter::new()))
    }

    pub fn production() -> Self {
        Self::build("production", Arc::new(InMemoryRateLimiter::new()))
    }

    pub fn with_limiter(limiter: Arc<dyn RateLimiter>) -> Self {
        Self::build("development", limiter)
    }

    fn build(app_env: &str, limiter: Arc<dyn RateLimiter>) -> Self {
        let config = Arc::new(config(app_env));
        let db = Arc::new(InMemoryDatabase::new());
        let course = db.add_course("Ciência da Computação", "CC");
        let calculus = db.add_discipline("MAT01", "Cálculo I");
        db.offer_in_course(calculus.id, course.id, Some("1"), true);
        let ana = db.add_professor("Ana Souza");
        db.link(ana.id, calculus.id);

        let auth = Arc::new(FakeAuthProvider::new());
        auth.with_session(STUDENT_TOKEN, STUDENT_EMAIL);

        let service = Arc::new(RatingsService::new(db.clone(), limiter, config.log_mode));
        let state = Arc::new(AppState {
            service,
            auth: auth.clone(),
            config,
        });
        Self {
            router: build_router(state),
            db,
            auth,
            calculus,
            ana,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }
}

pub fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, body: Value, session: Option<&str>) -> Request<Body> {
    let mut builder = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = session {
        builder = builder.header(header::COOKIE, format!("session={token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// The `name=value` part of each `Set-Cookie` header.
pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .map(str::to_string)
        .collect()
}
