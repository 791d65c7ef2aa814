// ABOUTME: Integration tests for the OAuth 2.1 HTTP surface
// ABOUTME: Discovery, registration, authorize redirects and token grants over warp

//! End-to-end tests of the OAuth routes. The upstream provider is never
//! reached: authorization codes for token-grant tests are minted directly
//! through the token service, which is exactly the state `/callback` leaves
//! behind.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use gatehouse_mcp_server::config::{PolicyConfig, UpstreamConfig};
use gatehouse_mcp_server::middleware::BearerAuthMiddleware;
use gatehouse_mcp_server::oauth2_server::{oauth2_routes, AdminService, AuthorizationServer};
use gatehouse_mcp_server::store::Store;
use gatehouse_mcp_server::upstream::{AllowlistPolicy, GitHubClient};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use warp::http::StatusCode;
use warp::Filter;

const ISSUER: &str = "http://localhost:8080";
const VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";

struct TestHarness {
    _dir: tempfile::TempDir,
    server: Arc<AuthorizationServer>,
    admin: Arc<AdminService>,
    bearer: BearerAuthMiddleware,
}

impl TestHarness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::new(dir.path().to_str().unwrap()).unwrap());
        let upstream = Arc::new(
            GitHubClient::new(
                UpstreamConfig {
                    client_id: "app-id".to_owned(),
                    client_secret: "app-secret".to_owned(),
                    authorize_url: "https://github.example/login/oauth/authorize".to_owned(),
                    token_url: "https://github.example/login/oauth/access_token".to_owned(),
                    api_base_url: "https://api.github.example".to_owned(),
                    timeout_secs: 1,
                },
                format!("{ISSUER}/callback"),
            )
            .unwrap(),
        );
        let server = Arc::new(AuthorizationServer::new(
            ISSUER.to_owned(),
            Arc::clone(&store),
            upstream,
            AllowlistPolicy::new(PolicyConfig::default()),
        ));
        let admin = Arc::new(AdminService::new(Arc::clone(&store)));
        let bearer = BearerAuthMiddleware::new(store);
        Self {
            _dir: dir,
            server,
            admin,
            bearer,
        }
    }

    fn routes(
        &self,
    ) -> impl Filter<Extract = (warp::reply::Response,), Error = warp::Rejection> + Clone {
        oauth2_routes(&self.server, &self.admin, &self.bearer)
    }
}

fn s256(verifier: &str) -> String {
    use base64::Engine as _;
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

#[tokio::test]
async fn discovery_documents_are_served_with_cors() {
    let harness = TestHarness::new();
    let routes = harness.routes();

    let response = warp::test::request()
        .method("GET")
        .path("/.well-known/oauth-authorization-server")
        .reply(&routes)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");

    let metadata: Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(metadata["issuer"], ISSUER);
    assert_eq!(metadata["require_pkce"], true);
    assert_eq!(metadata["code_challenge_methods_supported"][0], "S256");

    let response = warp::test::request()
        .method("GET")
        .path("/.well-known/oauth-protected-resource")
        .reply(&routes)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let metadata: Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(metadata["resource"], format!("{ISSUER}/mcp"));
    assert_eq!(metadata["authorization_servers"][0], ISSUER);
}

#[tokio::test]
async fn registration_returns_credentials_once() {
    let harness = TestHarness::new();
    let routes = harness.routes();

    let response = warp::test::request()
        .method("POST")
        .path("/register")
        .json(&serde_json::json!({
            "redirect_uris": ["https://client.example/cb"],
            "client_name": "Example client"
        }))
        .reply(&routes)
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body: Value = serde_json::from_slice(response.body()).unwrap();
    assert!(body["client_id"].as_str().unwrap().starts_with("mcp_"));
    assert!(!body["client_secret"].as_str().unwrap().is_empty());
    assert_eq!(body["client_secret_expires_at"], 0);

    // No redirect URIs is a validation failure
    let response = warp::test::request()
        .method("POST")
        .path("/register")
        .json(&serde_json::json!({ "redirect_uris": [] }))
        .reply(&routes)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(body["error"], "invalid_request");
}

#[tokio::test]
async fn authorize_redirects_to_upstream_provider() {
    let harness = TestHarness::new();
    let routes = harness.routes();

    let response = warp::test::request()
        .method("POST")
        .path("/register")
        .json(&serde_json::json!({
            "redirect_uris": ["https://client.example/cb"],
            "client_name": "Example client"
        }))
        .reply(&routes)
        .await;
    let body: Value = serde_json::from_slice(response.body()).unwrap();
    let client_id = body["client_id"].as_str().unwrap();

    let challenge = s256(VERIFIER);
    let path = format!(
        "/authorize?response_type=code&client_id={client_id}\
         &redirect_uri=https%3A%2F%2Fclient.example%2Fcb\
         &code_challenge={challenge}&code_challenge_method=S256&state=xyz"
    );
    let response = warp::test::request()
        .method("GET")
        .path(&path)
        .reply(&routes)
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);

    let location = response.headers()["location"].to_str().unwrap();
    assert!(location.starts_with("https://github.example/login/oauth/authorize"));
    assert!(location.contains("client_id=app-id"));
    assert!(location.contains("scope=read%3Auser+read%3Aorg"));
}

#[tokio::test]
async fn authorize_error_redirects_carry_state() {
    let harness = TestHarness::new();
    let routes = harness.routes();

    let challenge = s256(VERIFIER);
    let path = format!(
        "/authorize?response_type=code&client_id=unknown\
         &redirect_uri=https%3A%2F%2Fclient.example%2Fcb\
         &code_challenge={challenge}&code_challenge_method=S256&state=xyz"
    );
    let response = warp::test::request()
        .method("GET")
        .path(&path)
        .reply(&routes)
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    let location = response.headers()["location"].to_str().unwrap();
    assert!(location.starts_with("https://client.example/cb"));
    assert!(location.contains("error=invalid_client"));
    assert!(location.contains("state=xyz"));
}

#[tokio::test]
async fn callback_without_state_is_a_direct_error() {
    let harness = TestHarness::new();
    let routes = harness.routes();

    let response = warp::test::request()
        .method("GET")
        .path("/callback?code=up123")
        .reply(&routes)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(body["error"], "invalid_request");
}

async fn mint_code(harness: &TestHarness, client_id: &str) -> String {
    harness
        .server
        .tokens()
        .mint_auth_code(
            client_id,
            "user-1",
            "https://client.example/cb",
            "mcp:tools",
            &s256(VERIFIER),
            "S256",
            None,
        )
        .await
        .unwrap()
        .code
}

#[tokio::test]
async fn token_endpoint_redeems_code_and_sets_no_store() {
    let harness = TestHarness::new();
    let routes = harness.routes();
    let code = mint_code(&harness, "c1").await;

    let form = format!(
        "grant_type=authorization_code&code={code}&client_id=c1\
         &redirect_uri=https%3A%2F%2Fclient.example%2Fcb&code_verifier={VERIFIER}"
    );
    let response = warp::test::request()
        .method("POST")
        .path("/token")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(form.clone())
        .reply(&routes)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["cache-control"], "no-store");

    let body: Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["scope"], "mcp:tools");
    assert!(body["expires_in"].as_i64().unwrap() > 3500);
    assert!(!body["refresh_token"].as_str().unwrap().is_empty());

    // Second redemption of the same code fails
    let response = warp::test::request()
        .method("POST")
        .path("/token")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(form)
        .reply(&routes)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.headers()["cache-control"], "no-store");
    let body: Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(body["error"], "invalid_grant");
}

#[tokio::test]
async fn refresh_grant_rotates_over_http() {
    let harness = TestHarness::new();
    let routes = harness.routes();
    let code = mint_code(&harness, "c1").await;

    let form = format!(
        "grant_type=authorization_code&code={code}&client_id=c1\
         &redirect_uri=https%3A%2F%2Fclient.example%2Fcb&code_verifier={VERIFIER}"
    );
    let response = warp::test::request()
        .method("POST")
        .path("/token")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(form)
        .reply(&routes)
        .await;
    let body: Value = serde_json::from_slice(response.body()).unwrap();
    let refresh_token = body["refresh_token"].as_str().unwrap().to_owned();

    let refresh_form =
        format!("grant_type=refresh_token&refresh_token={refresh_token}&client_id=c1");
    let response = warp::test::request()
        .method("POST")
        .path("/token")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(refresh_form.clone())
        .reply(&routes)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let rotated: Value = serde_json::from_slice(response.body()).unwrap();
    assert_ne!(rotated["refresh_token"], body["refresh_token"]);

    // The old refresh token died with the rotation
    let response = warp::test::request()
        .method("POST")
        .path("/token")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(refresh_form)
        .reply(&routes)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unsupported_grant_type_is_rejected() {
    let harness = TestHarness::new();
    let routes = harness.routes();

    let response = warp::test::request()
        .method("POST")
        .path("/token")
        .header("content-type", "application/x-www-form-urlencoded")
        .body("grant_type=password&username=u&password=p")
        .reply(&routes)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(body["error"], "unsupported_grant_type");
}
