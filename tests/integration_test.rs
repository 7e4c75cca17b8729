// Integration tests for the authenticated request pipeline
//
// These tests run the pipeline against a mock backend and verify bearer
// injection, the single refresh-and-replay, and credential eviction.

use mockito::Matcher;
use reqwest::StatusCode;
use serde_json::json;
use std::sync::Arc;

use travel_blog_client::{
    auth::{CredentialSet, Session, SessionEvent, SqliteStore, REFRESH_PATH},
    error::ApiError,
    http_client::BlogHttpClient,
    request::{FormField, PendingRequest},
};

// ==================================================================================================
// Test Helpers
// ==================================================================================================

const POSTS: &str = "/api/posts/";
const USER: &str = r#"{"id":1,"username":"ana"}"#;
const INVALID_TOKEN: &str = r#"{"detail":"Given token not valid for any token type"}"#;

/// Session holding A1 / R1 and a cached user record
fn seeded_session() -> Arc<Session> {
    let session = Session::new(SqliteStore::open_in_memory().expect("in-memory store"));
    session
        .establish(&CredentialSet {
            access_token: "A1".to_string(),
            refresh_token: "R1".to_string(),
            user: USER.to_string(),
        })
        .expect("seed credentials");
    Arc::new(session)
}

fn client_for(server: &mockito::ServerGuard, session: Arc<Session>) -> BlogHttpClient {
    BlogHttpClient::new(&server.url(), 10, session).expect("Failed to create HTTP client")
}

async fn mock_refresh(
    server: &mut mockito::ServerGuard,
    status: usize,
    body: &str,
    hits: usize,
) -> mockito::Mock {
    server
        .mock("POST", REFRESH_PATH)
        .match_body(Matcher::Json(json!({"refresh": "R1"})))
        .with_status(status)
        .with_header("content-type", "application/json")
        .with_body(body)
        .expect(hits)
        .create_async()
        .await
}

async fn mock_posts(
    server: &mut mockito::ServerGuard,
    bearer: &str,
    status: usize,
    hits: usize,
) -> mockito::Mock {
    let body = if status == 401 { INVALID_TOKEN } else { "[]" };
    server
        .mock("GET", POSTS)
        .match_header("authorization", format!("Bearer {}", bearer).as_str())
        .with_status(status)
        .with_header("content-type", "application/json")
        .with_body(body)
        .expect(hits)
        .create_async()
        .await
}

// ==================================================================================================
// Header Tests
// ==================================================================================================

#[tokio::test]
async fn test_bearer_header_is_current_access_token() {
    let mut server = mockito::Server::new_async().await;
    let posts = mock_posts(&mut server, "A1", 200, 1).await;
    let client = client_for(&server, seeded_session());

    let response = client.send(PendingRequest::get(POSTS)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    posts.assert_async().await;
}

#[tokio::test]
async fn test_no_authorization_without_access_token() {
    let mut server = mockito::Server::new_async().await;
    let public = server
        .mock("GET", "/api/public/posts/")
        .match_header("authorization", Matcher::Missing)
        .with_status(200)
        .with_body("[]")
        .expect(1)
        .create_async()
        .await;
    let client = client_for(&server, Arc::new(Session::in_memory()));

    let response = client
        .send(PendingRequest::get("/api/public/posts/"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    public.assert_async().await;
}

#[tokio::test]
async fn test_json_body_gets_json_content_type() {
    let mut server = mockito::Server::new_async().await;
    let create = server
        .mock("POST", POSTS)
        .match_header("content-type", "application/json")
        .match_body(Matcher::Json(json!({"title": "Hanoi"})))
        .with_status(201)
        .with_body("{}")
        .expect(1)
        .create_async()
        .await;
    let client = client_for(&server, seeded_session());

    let request = PendingRequest::post(POSTS)
        .json(&json!({"title": "Hanoi"}))
        .unwrap();
    let response = client.send(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    create.assert_async().await;
}

#[tokio::test]
async fn test_multipart_body_gets_transport_content_type() {
    let mut server = mockito::Server::new_async().await;
    let create = server
        .mock("POST", POSTS)
        .match_header(
            "content-type",
            Matcher::Regex("^multipart/form-data; boundary=".to_string()),
        )
        .match_body(Matcher::Regex(r#"filename="beach.jpg""#.to_string()))
        .with_status(201)
        .with_body("{}")
        .expect(1)
        .create_async()
        .await;
    let client = client_for(&server, seeded_session());

    let request = PendingRequest::post(POSTS).multipart(vec![
        FormField::text("title", "Zanzibar"),
        FormField::file("image", "beach.jpg", Some("image/jpeg".into()), b"fakejpeg".to_vec()),
    ]);
    let response = client.send(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    create.assert_async().await;
}

// ==================================================================================================
// Refresh and Replay Tests
// ==================================================================================================

#[tokio::test]
async fn test_expired_token_is_refreshed_and_request_replayed() {
    let mut server = mockito::Server::new_async().await;
    let rejected = mock_posts(&mut server, "A1", 401, 1).await;
    let refresh = mock_refresh(&mut server, 200, r#"{"access":"A2"}"#, 1).await;
    let replay = mock_posts(&mut server, "A2", 200, 1).await;

    let session = seeded_session();
    let client = client_for(&server, session.clone());

    let response = client.send(PendingRequest::get(POSTS)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(session.access_token().unwrap().as_deref(), Some("A2"));
    // Refresh token is never rotated, user record untouched
    assert_eq!(session.refresh_token().unwrap().as_deref(), Some("R1"));
    assert_eq!(session.user_record().unwrap().as_deref(), Some(USER));

    rejected.assert_async().await;
    refresh.assert_async().await;
    replay.assert_async().await;
}

#[tokio::test]
async fn test_replayed_request_is_not_retried_again() {
    let mut server = mockito::Server::new_async().await;
    let rejected = mock_posts(&mut server, "A1", 401, 1).await;
    let refresh = mock_refresh(&mut server, 200, r#"{"access":"A2"}"#, 1).await;
    let replay = mock_posts(&mut server, "A2", 401, 1).await;

    let session = seeded_session();
    let client = client_for(&server, session.clone());

    let err = client.send(PendingRequest::get(POSTS)).await.unwrap_err();

    assert!(matches!(err, ApiError::AuthError(ref body) if body.contains("not valid")));
    assert!(!err.requires_login());
    // Refresh itself succeeded, so nothing is evicted
    assert_eq!(session.access_token().unwrap().as_deref(), Some("A2"));

    rejected.assert_async().await;
    refresh.assert_async().await;
    replay.assert_async().await;
}

#[tokio::test]
async fn test_401_without_refresh_token_is_propagated() {
    let mut server = mockito::Server::new_async().await;
    let rejected = mock_posts(&mut server, "A1", 401, 1).await;
    let refresh = mock_refresh(&mut server, 200, r#"{"access":"A2"}"#, 0).await;

    let session = Arc::new(Session::in_memory());
    session.set_access_token("A1").unwrap();
    let client = client_for(&server, session.clone());

    let err = client.send(PendingRequest::get(POSTS)).await.unwrap_err();

    assert!(matches!(err, ApiError::AuthError(_)));
    assert_eq!(session.access_token().unwrap().as_deref(), Some("A1"));

    rejected.assert_async().await;
    refresh.assert_async().await;
}

#[tokio::test]
async fn test_refresh_failure_evicts_credentials() {
    let mut server = mockito::Server::new_async().await;
    let rejected = mock_posts(&mut server, "A1", 401, 1).await;
    let refresh = mock_refresh(
        &mut server,
        401,
        r#"{"detail":"Token is invalid or expired","code":"token_not_valid"}"#,
        1,
    )
    .await;

    let session = seeded_session();
    let mut events = session.subscribe();
    let client = client_for(&server, session.clone());

    let err = client.send(PendingRequest::get(POSTS)).await.unwrap_err();

    assert!(matches!(err, ApiError::TerminalAuthError(_)));
    assert!(err.requires_login());
    assert_eq!(session.access_token().unwrap(), None);
    assert_eq!(session.refresh_token().unwrap(), None);
    assert_eq!(session.user_record().unwrap(), None);
    assert_eq!(events.recv().await.unwrap(), SessionEvent::Expired);

    rejected.assert_async().await;
    refresh.assert_async().await;
}

#[tokio::test]
async fn test_malformed_refresh_reply_is_terminal() {
    let mut server = mockito::Server::new_async().await;
    mock_posts(&mut server, "A1", 401, 1).await;
    mock_refresh(&mut server, 200, r#"{"unexpected":true}"#, 1).await;

    let session = seeded_session();
    let client = client_for(&server, session.clone());

    let err = client.send(PendingRequest::get(POSTS)).await.unwrap_err();

    assert!(err.requires_login());
    assert!(!session.is_authenticated().unwrap());
}

#[tokio::test]
async fn test_non_401_errors_are_returned_unchanged() {
    let mut server = mockito::Server::new_async().await;
    let forbidden = server
        .mock("DELETE", "/api/posts/5/")
        .with_status(403)
        .with_body(r#"{"detail":"You do not have permission"}"#)
        .expect(1)
        .create_async()
        .await;
    let refresh = mock_refresh(&mut server, 200, r#"{"access":"A2"}"#, 0).await;
    let client = client_for(&server, seeded_session());

    let response = client
        .send(PendingRequest::delete("/api/posts/5/"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    forbidden.assert_async().await;
    refresh.assert_async().await;
}

#[tokio::test]
async fn test_concurrent_401s_share_one_refresh() {
    let mut server = mockito::Server::new_async().await;
    mock_posts(&mut server, "A1", 401, 2).await;
    let refresh = mock_refresh(&mut server, 200, r#"{"access":"A2"}"#, 1).await;
    let replay = mock_posts(&mut server, "A2", 200, 2).await;

    let session = seeded_session();
    let client = client_for(&server, session.clone());

    let (first, second) = tokio::join!(
        client.send(PendingRequest::get(POSTS)),
        client.send(PendingRequest::get(POSTS)),
    );

    assert_eq!(first.unwrap().status(), StatusCode::OK);
    assert_eq!(second.unwrap().status(), StatusCode::OK);
    assert_eq!(session.access_token().unwrap().as_deref(), Some("A2"));

    refresh.assert_async().await;
    replay.assert_async().await;
}

#[tokio::test]
async fn test_multipart_request_is_replayed_after_refresh() {
    let mut server = mockito::Server::new_async().await;
    let multipart = || Matcher::Regex("^multipart/form-data; boundary=".to_string());
    let upload_body = || {
        Matcher::AllOf(vec![
            Matcher::Regex(r#"name="title"\r\n\r\nPetra"#.to_string()),
            Matcher::Regex(r#"name="image"; filename="treasury.jpg""#.to_string()),
            Matcher::Regex("rose-red stone".to_string()),
        ])
    };
    let rejected = server
        .mock("POST", POSTS)
        .match_header("authorization", "Bearer A1")
        .match_header("content-type", multipart())
        .match_body(upload_body())
        .with_status(401)
        .with_body(INVALID_TOKEN)
        .expect(1)
        .create_async()
        .await;
    let refresh = mock_refresh(&mut server, 200, r#"{"access":"A2"}"#, 1).await;
    let replay = server
        .mock("POST", POSTS)
        .match_header("authorization", "Bearer A2")
        .match_header("content-type", multipart())
        .match_body(upload_body())
        .with_status(201)
        .with_body("{}")
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server, seeded_session());
    let request = PendingRequest::post(POSTS).multipart(vec![
        FormField::text("title", "Petra"),
        FormField::file(
            "image",
            "treasury.jpg",
            Some("image/jpeg".to_string()),
            b"rose-red stone".to_vec(),
        ),
    ]);

    let response = client.send(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    rejected.assert_async().await;
    refresh.assert_async().await;
    replay.assert_async().await;
}

#[tokio::test]
async fn test_base_url_path_prefix_applies_to_refresh() {
    let mut server = mockito::Server::new_async().await;
    let rejected = server
        .mock("GET", "/blog/api/posts/")
        .match_header("authorization", "Bearer A1")
        .with_status(401)
        .expect(1)
        .create_async()
        .await;
    let refresh = server
        .mock("POST", "/blog/api/token/refresh/")
        .match_body(Matcher::Json(json!({"refresh": "R1"})))
        .with_status(200)
        .with_body(r#"{"access":"A2"}"#)
        .expect(1)
        .create_async()
        .await;
    let replay = server
        .mock("GET", "/blog/api/posts/")
        .match_header("authorization", "Bearer A2")
        .with_status(200)
        .with_body("[]")
        .expect(1)
        .create_async()
        .await;

    let base = format!("{}/blog", server.url());
    let client = BlogHttpClient::new(&base, 10, seeded_session()).unwrap();

    let response = client.send(PendingRequest::get(POSTS)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    rejected.assert_async().await;
    refresh.assert_async().await;
    replay.assert_async().await;
}

// ==================================================================================================
// Transport Tests
// ==================================================================================================

#[tokio::test]
async fn test_connection_failure_is_transport_error() {
    // Nothing listens on the discard port
    let client =
        BlogHttpClient::new("http://127.0.0.1:9", 10, seeded_session()).expect("client");

    let err = client.send(PendingRequest::get(POSTS)).await.unwrap_err();

    assert!(matches!(err, ApiError::Transport(_)));
}
