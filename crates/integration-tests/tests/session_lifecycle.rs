//! Session restore, login and logout through the full client.

use popflix_client::ClientError;
use popflix_client::api::mock::{Endpoint, GateKey};
use popflix_integration_tests::{CREDENTIAL, TOKEN, TestContext, free_profile};

// ============================================================================
// Restore
// ============================================================================

#[tokio::test]
async fn test_session_survives_restart_with_file_store() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("popflix").join("credentials.json");
    let ctx = TestContext::with_file_store(&path);
    ctx.sign_in().await;
    assert!(path.exists());

    let restarted = ctx.restart();
    let session = restarted.session().initialize().await;

    assert!(session.is_authenticated());
    assert!(!session.is_loading());
    assert_eq!(session.user().map(|u| u.id.clone()), Some(free_profile().id));
}

#[tokio::test]
async fn test_expired_token_is_cleared_on_restore() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let ctx = TestContext::with_file_store(&dir.path().join("credentials.json"));
    ctx.sign_in().await;
    ctx.mock.expire_token(TOKEN);

    let restarted = ctx.restart();
    let session = restarted.session().initialize().await;

    assert!(!session.is_authenticated());
    assert!(session.token().is_none());
    assert!(ctx.store.load().expect("read store").is_none());
}

#[tokio::test]
async fn test_restore_without_stored_token_makes_no_request() {
    let ctx = TestContext::new();
    let session = ctx.client.session().initialize().await;

    assert!(!session.is_authenticated());
    assert!(!session.is_loading());
    assert_eq!(ctx.mock.calls(Endpoint::FetchProfile), 0);
}

// ============================================================================
// Ordering
// ============================================================================

#[tokio::test]
async fn test_stale_restore_does_not_undo_login() {
    let ctx = TestContext::new();
    ctx.sign_in().await;

    // A restart restores the stored token while the user signs in again.
    let restarted = ctx.restart();
    let gate = ctx.mock.hold(GateKey::Endpoint(Endpoint::FetchProfile));
    let restore = tokio::spawn(restarted.session().initialize());
    assert!(ctx.mock.wait_for_calls(Endpoint::FetchProfile, 1).await);

    restarted
        .session()
        .login(CREDENTIAL)
        .await
        .expect("login while restore is held");
    gate.open();
    restore.await.expect("restore task");

    let session = restarted.session().session();
    assert!(session.is_authenticated());
    assert_eq!(session.token().map(|t| t.expose().to_string()), Some(TOKEN.to_string()));
    assert!(ctx.store.load().expect("read store").is_some());
}

#[tokio::test]
async fn test_logout_during_login_wins() {
    let ctx = TestContext::new();
    let gate = ctx.mock.hold(GateKey::Endpoint(Endpoint::ExchangeCredential));

    let login = tokio::spawn(ctx.client.session().login(CREDENTIAL));
    assert!(ctx.mock.wait_for_calls(Endpoint::ExchangeCredential, 1).await);
    ctx.client.session().logout();
    gate.open();

    let result = login.await.expect("login task");
    assert!(matches!(result, Err(ClientError::Superseded)));
    assert!(!ctx.client.session().session().is_authenticated());
    assert!(ctx.store.load().expect("read store").is_none());
}

// ============================================================================
// Logout
// ============================================================================

#[tokio::test]
async fn test_logout_blocks_authenticated_operations() {
    let ctx = TestContext::new();
    ctx.sign_in().await;
    ctx.client.session().logout();

    let err = ctx
        .client
        .interactions()
        .favorites()
        .await
        .expect_err("favorites require a session");
    assert!(matches!(err, ClientError::AuthenticationRequired));
    assert_eq!(ctx.mock.calls(Endpoint::Favorites), 0);
}

#[tokio::test]
async fn test_session_changes_are_published() {
    let ctx = TestContext::new();
    let mut updates = ctx.client.session().subscribe();

    ctx.sign_in().await;
    assert!(updates.has_changed().expect("sender alive"));
    assert!(updates.borrow_and_update().is_authenticated());

    ctx.client.session().logout();
    assert!(updates.has_changed().expect("sender alive"));
    assert!(!updates.borrow_and_update().is_authenticated());
}
