use std::sync::Arc;

use course_ratings_core::test_support::FakeAuthProvider;
use course_ratings_core::{CallbackParams, LogMode, ServiceError, SessionContext};

const APP_URL: &str = "https://avalia.example.com";

fn context() -> (Arc<FakeAuthProvider>, SessionContext) {
    let provider = Arc::new(FakeAuthProvider::new());
    let ctx = SessionContext::new(provider.clone(), APP_URL, LogMode::Production);
    (provider, ctx)
}

#[tokio::test]
async fn institutional_sign_in_dispatches_link() {
    let (provider, ctx) = context();
    ctx.sign_in_with_email("aluno@graduacao.uerj.br")
        .await
        .unwrap();

    let sent = provider.sent_links();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].email, "aluno@graduacao.uerj.br");
    assert_eq!(sent[0].redirect_to, "https://avalia.example.com/auth/callback");
}

#[tokio::test]
async fn other_domains_are_rejected_before_the_provider() {
    let (provider, ctx) = context();
    let err = ctx.sign_in_with_email("aluno@gmail.com").await.unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
    assert!(provider.sent_links().is_empty());
}

#[tokio::test]
async fn code_from_link_completes_sign_in_with_matching_verifier() {
    let (provider, ctx) = context();
    let mut updates = ctx.subscribe();
    let pending = ctx
        .sign_in_with_email("aluno@graduacao.uerj.br")
        .await
        .unwrap();
    let user = provider
        .issue_code("aluno@graduacao.uerj.br", "one-time")
        .unwrap();

    let tokens = ctx
        .complete_sign_in(
            CallbackParams::Code {
                code: "one-time".into(),
            },
            Some(&pending.code_verifier),
        )
        .await
        .unwrap();
    assert_eq!(tokens.user, user);
    assert!(provider.is_active(&tokens.access_token));

    updates.changed().await.unwrap();
    assert_eq!(updates.borrow().user.as_ref(), Some(&user));

    ctx.sign_out(Some(&tokens.access_token)).await.unwrap();
    assert!(!provider.is_active(&tokens.access_token));
    assert!(!ctx.is_authenticated());
}

#[tokio::test]
async fn code_with_wrong_verifier_is_rejected() {
    let (provider, ctx) = context();
    ctx.sign_in_with_email("aluno@graduacao.uerj.br")
        .await
        .unwrap();
    provider.issue_code("aluno@graduacao.uerj.br", "one-time");

    let err = ctx
        .complete_sign_in(
            CallbackParams::Code {
                code: "one-time".into(),
            },
            Some("someone-elses-verifier"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
    assert!(!ctx.is_authenticated());
}

#[tokio::test]
async fn token_hash_and_fragment_modes_sign_in() {
    let (provider, ctx) = context();
    let user = provider.issue_token_hash("aluno@graduacao.uerj.br", "hash");
    let tokens = ctx
        .complete_sign_in(
            CallbackParams::TokenHash {
                token_hash: "hash".into(),
                kind: "magiclink".into(),
            },
            None,
        )
        .await
        .unwrap();
    assert_eq!(tokens.user, user);

    let (provider, ctx) = context();
    let user = provider.with_session("implicit-token", "aluno@graduacao.uerj.br");
    let params = CallbackParams::from_fragment(
        "#access_token=implicit-token&refresh_token=r&token_type=bearer",
    )
    .unwrap();
    let tokens = ctx.complete_sign_in(params, None).await.unwrap();
    assert_eq!(tokens.user, user);
    assert_eq!(ctx.current_user(), Some(user));
}

#[tokio::test]
async fn initialize_resolves_existing_session() {
    let (provider, ctx) = context();
    let user = provider.with_session("token", "aluno@graduacao.uerj.br");

    let state = ctx.initialize(Some("token")).await;
    assert_eq!(state.user, Some(user));

    let (_, fresh) = context();
    let state = fresh.initialize(None).await;
    assert!(!state.loading);
    assert!(!state.is_authenticated());
}
