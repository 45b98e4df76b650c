//! Integration tests for bastion-http-client

use bastion_http_client::*;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn config(server: &MockServer, mode: CredentialMode) -> HttpClientConfig {
    HttpClientConfig::builder()
        .base_url(format!("{}/api/v1", server.uri()))
        .credential_mode(mode)
        .login_url("http://console.test/login")
        .timeout(Duration::from_secs(5))
        .build()
}

fn recording_navigator() -> (Arc<FnNavigator>, Arc<Mutex<Vec<String>>>) {
    let redirects = Arc::new(Mutex::new(Vec::new()));
    let sink = redirects.clone();
    let navigator = FnNavigator::new(move |url| sink.lock().push(url.to_string()));
    (Arc::new(navigator), redirects)
}

fn bearer_client(
    server: &MockServer,
    credentials: Credentials,
) -> (
    AuthenticatedHttpClient,
    Arc<MemoryCredentialStore>,
    Arc<Mutex<Vec<String>>>,
) {
    let store = Arc::new(MemoryCredentialStore::new(credentials));
    let (navigator, redirects) = recording_navigator();
    let client = AuthenticatedHttpClient::builder(config(server, CredentialMode::BearerToken))
        .credential_store(store.clone())
        .navigator(navigator)
        .build()
        .unwrap();
    (client, store, redirects)
}

#[derive(Debug, Deserialize, PartialEq)]
struct UserPage {
    items: Vec<Value>,
    total: u32,
}

#[tokio::test]
async fn test_users_refresh_and_retry_scenario() {
    init_tracing();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/users"))
        .and(header("authorization", "Bearer a1"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "expired"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/auth/validate/token"))
        .and(header("authorization", "Bearer a1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"detail": "TOKEN_INVALID"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/refresh/token"))
        .and(body_json(json!({"refresh_token": "r1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"access_token": "a2", "refresh_token": "r2"}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/users"))
        .and(header("authorization", "Bearer a2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"id": 1}, {"id": 2}, {"id": 3}],
            "total": 3
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (client, store, redirects) = bearer_client(&server, Credentials::with_tokens("a1", "r1"));

    let envelope = client.get("/users").send::<Value>().await;
    assert_eq!(
        serde_json::to_value(&envelope).unwrap(),
        json!({
            "success": true,
            "data": {"items": [{"id": 1}, {"id": 2}, {"id": 3}], "total": 3}
        })
    );

    let credentials = store.get();
    assert_eq!(credentials.access_token.as_deref(), Some("a2"));
    assert_eq!(credentials.refresh_token.as_deref(), Some("r2"));
    assert!(redirects.lock().is_empty());
}

#[tokio::test]
async fn test_orgs_forbidden_scenario() {
    init_tracing();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/orgs"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({"detail": "Forbidden"})))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _, redirects) = bearer_client(&server, Credentials::with_tokens("a1", "r1"));

    let envelope = client.get("/orgs").send::<Value>().await;
    assert_eq!(
        serde_json::to_value(&envelope).unwrap(),
        json!({
            "success": false,
            "error": "Access denied. You do not have permission to perform this action."
        })
    );

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    assert!(redirects.lock().is_empty());
}

#[tokio::test]
async fn test_typed_payload_and_default_headers() {
    init_tracing();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/users"))
        .and(header("accept", "application/json"))
        .and(header("content-type", "application/json"))
        .and(header("authorization", "Bearer a1"))
        .and(header("actor", "alice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [], "total": 0
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _, _) = bearer_client(
        &server,
        Credentials {
            username: Some("alice".into()),
            ..Credentials::with_tokens("a1", "r1")
        },
    );

    let envelope = client.get("/users").send::<UserPage>().await;
    assert!(envelope.success);
    assert_eq!(
        envelope.data,
        Some(UserPage {
            items: vec![],
            total: 0
        })
    );
}

#[tokio::test]
async fn test_server_envelope_passes_through() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/roles"))
        .and(body_json(json!({"name": "auditor"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "success": true,
            "message": "Role created",
            "data": {"id": 12}
        })))
        .mount(&server)
        .await;

    let client = AuthenticatedHttpClient::new(config(&server, CredentialMode::Cookie)).unwrap();
    let envelope = client
        .post("/roles")
        .json(&json!({"name": "auditor"}))
        .send::<Value>()
        .await;

    assert!(envelope.success);
    assert_eq!(envelope.message.as_deref(), Some("Role created"));
    assert_eq!(envelope.data, Some(json!({"id": 12})));
}

#[tokio::test]
async fn test_server_envelope_keeps_extra_fields() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/ocr/process"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "total_pages": 2,
            "results": [{"page": 1, "text": "Invoice"}, {"page": 2, "text": "Total"}]
        })))
        .mount(&server)
        .await;

    let client = AuthenticatedHttpClient::new(config(&server, CredentialMode::Cookie)).unwrap();
    let envelope = client.post("/ocr/process").send::<Value>().await;

    assert!(envelope.success);
    assert_eq!(envelope.extra.get("total_pages"), Some(&json!(2)));
    assert_eq!(
        serde_json::to_value(&envelope).unwrap(),
        json!({
            "success": true,
            "total_pages": 2,
            "results": [{"page": 1, "text": "Invoice"}, {"page": 2, "text": "Total"}]
        })
    );
}

#[tokio::test]
async fn test_server_error_message() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/api/v1/users/4"))
        .respond_with(
            ResponseTemplate::new(422).set_body_json(json!({"error": "Email already in use"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/users/4"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = AuthenticatedHttpClient::new(config(&server, CredentialMode::Cookie)).unwrap();

    let envelope = client
        .put("/users/4")
        .json(&json!({"email": "taken@example.com"}))
        .send::<Value>()
        .await;
    assert_eq!(envelope.error.as_deref(), Some("Email already in use"));

    let envelope = client.delete("/users/4").send::<Value>().await;
    assert_eq!(
        envelope.error.as_deref(),
        Some("Request failed with status code 500")
    );
}

#[tokio::test]
async fn test_network_error() {
    let config = HttpClientConfig::builder()
        .base_url("http://127.0.0.1:1/api/v1")
        .timeout(Duration::from_millis(500))
        .build();
    let (navigator, redirects) = recording_navigator();
    let client = AuthenticatedHttpClient::builder(config)
        .navigator(navigator)
        .build()
        .unwrap();

    let envelope = client.get("/users").send::<Value>().await;
    assert!(!envelope.success);
    assert_eq!(envelope.error.as_deref(), Some(NETWORK_ERROR_MESSAGE));
    assert!(redirects.lock().is_empty());
}

#[tokio::test]
async fn test_cookie_mode_refresh_rotates_session_cookie() {
    init_tracing();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/users"))
        .and(header("cookie", "access_token=fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": [], "total": 0})))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/users"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/auth/validate/token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "expired"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/refresh/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "access_token=fresh; Path=/")
                .set_body_json(json!({"data": {"rotated": true}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (navigator, redirects) = recording_navigator();
    let client = AuthenticatedHttpClient::builder(config(&server, CredentialMode::Cookie))
        .navigator(navigator)
        .build()
        .unwrap();

    let envelope = client.get("/users").send::<Value>().await;
    assert!(envelope.success, "unexpected failure: {:?}", envelope.error);
    assert!(redirects.lock().is_empty());
}

#[tokio::test]
async fn test_valid_token_retries_without_refresh() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/activity-logs"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/activity-logs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"action": "login"}])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/auth/validate/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"detail": "TOKEN_VALID"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/refresh/token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = AuthenticatedHttpClient::new(config(&server, CredentialMode::Cookie)).unwrap();
    let envelope = client.get("/activity-logs").send::<Value>().await;
    assert_eq!(envelope.data, Some(json!([{"action": "login"}])));
}

#[tokio::test]
async fn test_failed_refresh_redirects_to_login() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/users"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/auth/validate/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"detail": "TOKEN_INVALID"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/refresh/token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "REFRESH_EXPIRED"})))
        .expect(1)
        .mount(&server)
        .await;

    let (client, store, redirects) = bearer_client(
        &server,
        Credentials {
            email: Some("alice@example.com".into()),
            ..Credentials::with_tokens("a1", "r1")
        },
    );

    let outcome = client.get("/users").send_outcome().await;
    assert_eq!(outcome, Outcome::Redirecting);
    assert_eq!(*redirects.lock(), vec!["http://console.test/login".to_string()]);
    assert!(store.get().is_empty());
}

#[tokio::test]
async fn test_retried_request_is_not_recovered_twice() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/users"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "Session revoked"})))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/auth/validate/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"detail": "TOKEN_VALID"})))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _, redirects) = bearer_client(&server, Credentials::with_tokens("a1", "r1"));

    let envelope = client.get("/users").send::<Value>().await;
    assert!(!envelope.success);
    assert_eq!(envelope.error.as_deref(), Some("Session revoked"));
    assert!(redirects.lock().is_empty());
}

#[tokio::test]
async fn test_auth_not_enforced_has_no_side_effects() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/users"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "Unauthorized"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/orgs"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryCredentialStore::new(Credentials::with_tokens("a1", "r1")));
    let (navigator, redirects) = recording_navigator();
    let mut config = config(&server, CredentialMode::BearerToken);
    config.auth_enforced = false;
    let client = AuthenticatedHttpClient::builder(config)
        .credential_store(store.clone())
        .navigator(navigator)
        .build()
        .unwrap();

    let envelope = client.get("/users").send::<Value>().await;
    assert_eq!(envelope.error.as_deref(), Some("Unauthorized"));

    let envelope = client.get("/orgs").send::<Value>().await;
    assert_eq!(
        envelope.error.as_deref(),
        Some("Request failed with status code 403")
    );

    assert_eq!(server.received_requests().await.unwrap().len(), 2);
    assert!(redirects.lock().is_empty());
    assert!(store.get().has_token_pair());
}

#[tokio::test]
async fn test_concurrent_unauthorized_requests_share_one_refresh() {
    init_tracing();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/users"))
        .and(header("authorization", "Bearer a1"))
        .respond_with(ResponseTemplate::new(401).set_delay(Duration::from_millis(50)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/users"))
        .and(header("authorization", "Bearer a2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": [], "total": 0})))
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/auth/validate/token"))
        .and(header("authorization", "Bearer a1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"detail": "TOKEN_INVALID"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/auth/validate/token"))
        .and(header("authorization", "Bearer a2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"detail": "TOKEN_VALID"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/refresh/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"data": {"access_token": "a2", "refresh_token": "r2"}}))
                .set_delay(Duration::from_millis(50)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (client, _, redirects) = bearer_client(&server, Credentials::with_tokens("a1", "r1"));

    let results = futures::future::join_all((0..3).map(|_| client.get("/users").send::<Value>())).await;

    assert!(results.iter().all(|envelope| envelope.success));
    assert!(redirects.lock().is_empty());
}

#[tokio::test]
async fn test_login_then_authenticated_request() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/auth/login"))
        .and(body_json(json!({"username": "alice", "email": null, "password": "s3cret"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {"access_token": "a1", "refresh_token": "r1", "email": "alice@example.com"}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/login"))
        .and(body_json(json!({"username": "mallory", "email": null, "password": "guess"})))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"detail": "Invalid credentials"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/users/me"))
        .and(header("authorization", "Bearer a1"))
        .and(header("actor", "alice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"username": "alice"})))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileCredentialStore::open(dir.path().join("credentials.json")));
    let config = config(&server, CredentialMode::BearerToken);

    let auth = AuthApi::new(&config, store.clone()).unwrap();
    let err = auth
        .login(LoginIdentifier::parse("mallory"), "guess")
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Invalid credentials");
    assert!(store.get().is_empty());

    auth.login(LoginIdentifier::parse("alice"), "s3cret")
        .await
        .unwrap();
    assert_eq!(store.get().email.as_deref(), Some("alice@example.com"));

    let client = AuthenticatedHttpClient::builder(config)
        .credential_store(store.clone())
        .auth(Arc::new(auth))
        .build()
        .unwrap();

    let envelope = client.get("/users/me").send::<Value>().await;
    assert_eq!(envelope.data, Some(json!({"username": "alice"})));

    // A fresh store on the same file sees the persisted session.
    let reopened = FileCredentialStore::open(dir.path().join("credentials.json"));
    assert_eq!(reopened.get().access_token.as_deref(), Some("a1"));
}
