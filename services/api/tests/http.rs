//! End-to-end behaviour of the router over in-memory adapters.

mod support;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use course_ratings_core::InMemoryRateLimiter;
use serde_json::json;
use support::{get, json_body, post_json, set_cookies, TestApp, STUDENT_EMAIL, STUDENT_TOKEN};

#[tokio::test]
async fn courses_are_public_and_carry_security_headers() {
    let app = TestApp::new();
    let response = app.send(get("/courses")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-frame-options"], "DENY");
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert!(response.headers().get("strict-transport-security").is_none());
    let body = json_body(response).await;
    assert_eq!(body[0]["code"], "CC");
}

#[tokio::test]
async fn discipline_is_found_by_code_in_any_case() {
    let app = TestApp::new();
    let response = app.send(get("/disciplines/mat01")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["code"], "MAT01");
    assert_eq!(body["course_code"], "CC");
    assert_eq!(body["total_professors"], 1);

    let missing = app.send(get("/disciplines/ZZZ99")).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn writes_require_a_session() {
    let app = TestApp::new();
    let body = json!({
        "professor_id": app.ana.id,
        "discipline_id": app.calculus.id,
        "stars": 5
    });
    let response = app.send(post_json("/ratings", body, None)).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["error"], "Autenticação necessária");
    assert!(app.db.ratings().is_empty());
}

#[tokio::test]
async fn unknown_session_token_is_rejected() {
    let app = TestApp::new();
    let body = json!({ "kind": "bug", "title": "Erro na busca", "description": "A busca não retorna nada" });
    let response = app
        .send(post_json("/feedback", body, Some("forged-token")))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn second_rating_for_the_same_pair_conflicts() {
    let app = TestApp::new();
    let body = json!({
        "professor_id": app.ana.id,
        "discipline_id": app.calculus.id,
        "stars": 4,
        "comment": "Explica muito bem"
    });

    let first = app
        .send(post_json("/ratings", body.clone(), Some(STUDENT_TOKEN)))
        .await;
    assert_eq!(first.status(), StatusCode::CREATED);
    assert_eq!(json_body(first).await["stars"], 4);

    let second = app
        .send(post_json("/ratings", body, Some(STUDENT_TOKEN)))
        .await;
    assert_eq!(second.status(), StatusCode::CONFLICT);
    assert_eq!(
        json_body(second).await["error"],
        "Você já avaliou este professor nesta disciplina"
    );
    assert_eq!(app.db.ratings().len(), 1);

    let uri = format!(
        "/ratings/check?professor_id={}&discipline_id={}",
        app.ana.id, app.calculus.id
    );
    let check = Request::get(uri)
        .header(header::COOKIE, format!("session={STUDENT_TOKEN}"))
        .body(Body::empty())
        .unwrap();
    assert_eq!(json_body(app.send(check).await).await["rated"], true);
}

#[tokio::test]
async fn stars_must_be_a_number() {
    let app = TestApp::new();
    let body = json!({
        "professor_id": app.ana.id,
        "discipline_id": app.calculus.id,
        "stars": "cinco"
    });
    let response = app
        .send(post_json("/ratings", body, Some(STUDENT_TOKEN)))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await["error"],
        "Número de estrelas deve ser entre 1 e 5"
    );
}

#[tokio::test]
async fn exhausted_limit_answers_429_with_retry_after() {
    let app = TestApp::with_limiter(Arc::new(InMemoryRateLimiter::with_limits(
        1,
        Duration::from_secs(60),
    )));
    let body = json!({
        "kind": "sugestao",
        "title": "Modo escuro",
        "description": "Seria ótimo ter um modo escuro no site",
        "page": "/"
    });

    let first = app
        .send(post_json("/feedback", body.clone(), Some(STUDENT_TOKEN)))
        .await;
    assert_eq!(first.status(), StatusCode::CREATED);
    assert_eq!(json_body(first).await["user_email"], STUDENT_EMAIL);

    let second = app
        .send(post_json("/feedback", body, Some(STUDENT_TOKEN)))
        .await;
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(second.headers()[header::RETRY_AFTER], "60");
    assert_eq!(app.db.feedback().len(), 1);
}

#[tokio::test]
async fn new_professor_can_be_linked_on_creation() {
    let app = TestApp::new();
    let body = json!({ "name": "Bruno Lima", "discipline_id": app.calculus.id });
    let response = app
        .send(post_json("/professors", body, Some(STUDENT_TOKEN)))
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let professor = json_body(response).await;
    assert_eq!(professor["name"], "Bruno Lima");
    let id = professor["id"].as_str().unwrap().parse().unwrap();
    assert!(app.db.professor_links().contains(&(id, app.calculus.id)));

    let listed = json_body(app.send(get("/professors?q=Bruno")).await).await;
    assert_eq!(listed.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn magic_link_is_limited_to_institutional_addresses() {
    let app = TestApp::new();

    let rejected = app
        .send(post_json("/auth/magic-link", json!({ "email": "aluno@gmail.com" }), None))
        .await;
    assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(rejected).await["error"],
        "Use seu email institucional @graduacao.uerj.br"
    );
    assert!(app.auth.sent_links().is_empty());

    let accepted = app
        .send(post_json("/auth/magic-link", json!({ "email": STUDENT_EMAIL }), None))
        .await;
    assert_eq!(accepted.status(), StatusCode::OK);
    assert!(set_cookies(&accepted)
        .iter()
        .any(|c| c.starts_with("pkce_verifier=") && c.len() > "pkce_verifier=".len()));
    assert_eq!(
        app.auth.sent_links()[0].redirect_to,
        "https://avalia.example.com/auth/callback"
    );
}

#[tokio::test]
async fn link_callback_opens_a_session() {
    let app = TestApp::new();
    let email = "outro@graduacao.uerj.br";
    let sent = app
        .send(post_json("/auth/magic-link", json!({ "email": email }), None))
        .await;
    let verifier = set_cookies(&sent)
        .into_iter()
        .find(|c| c.starts_with("pkce_verifier="))
        .unwrap();
    app.auth.issue_code(email, "one-time").unwrap();

    let callback = Request::get("/auth/callback?code=one-time&next=/professores")
        .header(header::COOKIE, verifier)
        .body(Body::empty())
        .unwrap();
    let response = app.send(callback).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/professores");

    let cookies = set_cookies(&response);
    assert!(cookies.iter().any(|c| c == "pkce_verifier="));
    let session = cookies
        .iter()
        .find(|c| c.starts_with("session=access-"))
        .unwrap()
        .clone();

    let me = Request::get("/auth/me")
        .header(header::COOKIE, session)
        .body(Body::empty())
        .unwrap();
    let body = json_body(app.send(me).await).await;
    assert_eq!(body["isAuthenticated"], true);
    assert_eq!(body["user"]["email"], email);
}

#[tokio::test]
async fn callback_without_verifier_is_an_invalid_link() {
    let app = TestApp::new();
    let response = app.send(get("/auth/callback?code=one-time")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await["error"],
        "Link de acesso inválido ou expirado"
    );
}

#[tokio::test]
async fn me_without_session_is_anonymous() {
    let app = TestApp::new();
    let body = json_body(app.send(get("/auth/me")).await).await;
    assert_eq!(body["isAuthenticated"], false);
    assert!(body["user"].is_null());
}

#[tokio::test]
async fn logout_ends_the_provider_session_and_clears_the_cookie() {
    let app = TestApp::new();
    let response = app
        .send(post_json("/auth/logout", json!({}), Some(STUDENT_TOKEN)))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_cookies(&response).iter().any(|c| c == "session="));
    assert!(!app.auth.is_active(STUDENT_TOKEN));
}

#[tokio::test]
async fn legacy_verification_endpoint_reports_deprecation() {
    let app = TestApp::new();
    let response = app
        .send(post_json("/api/send-verification", json!({}), None))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["deprecated"], true);
}

#[tokio::test]
async fn production_hides_source_paths_and_adds_hsts() {
    let app = TestApp::production();

    let source_map = app.send(get("/static/app.js.map")).await;
    assert_eq!(source_map.status(), StatusCode::NOT_FOUND);

    let courses = app.send(get("/courses")).await;
    assert_eq!(courses.status(), StatusCode::OK);
    assert!(courses
        .headers()
        .get("strict-transport-security")
        .is_some());
    assert_eq!(
        courses.headers()["cross-origin-opener-policy"],
        "same-origin"
    );
}

#[tokio::test]
async fn writes_are_reserved_to_student_accounts() {
    let app = TestApp::new();
    app.auth.with_session("staff-token", "docente@uerj.br");
    let body = json!({ "name": "Carla Dias" });
    let response = app
        .send(post_json("/professors", body, Some("staff-token")))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(app.db.professors().len(), 1);
}

#[tokio::test]
async fn auth_provider_outage_is_a_server_error() {
    let app = TestApp::new();
    app.auth.set_unreachable(true);
    let body = json!({ "kind": "bug", "title": "Erro na busca", "description": "A busca não retorna nada" });
    let response = app
        .send(post_json("/feedback", body, Some(STUDENT_TOKEN)))
        .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json_body(response).await["error"],
        "Erro interno do servidor. Tente novamente mais tarde."
    );

    let me = Request::get("/auth/me")
        .header(header::COOKIE, format!("session={STUDENT_TOKEN}"))
        .body(Body::empty())
        .unwrap();
    let me = app.send(me).await;
    assert_eq!(me.status(), StatusCode::OK);
    assert_eq!(json_body(me).await["isAuthenticated"], false);
}

#[tokio::test]
async fn non_string_name_is_a_validation_error() {
    let app = TestApp::new();
    let response = app
        .send(post_json("/professors", json!({ "name": 42 }), Some(STUDENT_TOKEN)))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await["error"],
        "Nome do professor deve ter pelo menos 2 caracteres"
    );
    assert_eq!(app.db.professors().len(), 1);
}

#[tokio::test]
async fn malformed_body_is_a_bad_request() {
    let app = TestApp::new();
    let request = Request::post("/ratings")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::COOKIE, format!("session={STUDENT_TOKEN}"))
        .body(Body::from("not json"))
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await["error"],
        "Dados da requisição inválidos"
    );
}

#[tokio::test]
async fn cookies_are_secure_only_in_production() {
    fn verifier_header(response: &axum::http::Response<Body>) -> String {
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with("pkce_verifier="))
            .unwrap()
            .to_string()
    }
    let body = json!({ "email": STUDENT_EMAIL });

    let development = TestApp::new();
    let response = development
        .send(post_json("/auth/magic-link", body.clone(), None))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!verifier_header(&response).contains("Secure"));

    let production = TestApp::production();
    let response = production
        .send(post_json("/auth/magic-link", body, None))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(verifier_header(&response).contains("; Secure"));
}
