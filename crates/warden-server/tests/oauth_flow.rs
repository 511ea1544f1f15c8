//! End-to-end OAuth flows against a live listener.
//!
//! Each test binds the full router to an ephemeral port and drives it over
//! HTTP with redirects disabled, so `302` responses can be inspected.

use reqwest::{Client, StatusCode, redirect::Policy};
use serde_json::Value;
use tokio::task::JoinHandle;
use warden_auth::crypto::{PkceChallenge, PkceVerifier};
use warden_server::{AppConfig, build_app, build_auth};

const BACKEND_SECRET: &str = "backend-secret-backend-secret";
const REDIRECT_URI: &str = "https://spa.warden.test/callback";
const USER_HEADER: &str = "x-authenticated-user";

const CONFIG: &str = r#"
[auth]
issuer = "https://auth.warden.test"

[auth.signing]
algorithm = "HS256"
secret = "an-hs256-secret-of-at-least-32-bytes!"

[auth.interaction]
trust_session_header = true

[[bootstrap.scopes]]
name = "openid"

[[bootstrap.scopes]]
name = "reports"
description = "Read reports"

[[bootstrap.clients]]
client_id = "spa"
client_type = "public"
name = "Reports SPA"
redirect_uris = ["https://spa.warden.test/callback"]
grant_types = ["authorization_code", "refresh_token"]
allowed_scopes = ["openid", "reports"]

[[bootstrap.clients]]
client_id = "backend"
client_secret = "backend-secret-backend-secret"
client_type = "confidential"
grant_types = ["client_credentials"]
allowed_scopes = ["reports"]

[[bootstrap.roles]]
id = "analyst"
name = "Analyst"

[[bootstrap.permissions]]
id = "perm-reports-read"
identifier = "reports:read"

[[bootstrap.role_permissions]]
role_id = "analyst"
permission_id = "perm-reports-read"

[[bootstrap.user_roles]]
user_id = "alice"
role_id = "analyst"
"#;

async fn start_server() -> (String, tokio::sync::oneshot::Sender<()>, JoinHandle<()>) {
    let config: AppConfig = toml::from_str(CONFIG).expect("parse config");
    config.validate().expect("valid config");
    let components = build_auth(&config).await.expect("build auth");
    let app = build_app(&config, components.state);

    // Bind to an ephemeral port
    let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let server = tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = rx.await;
            })
            .await;
    });

    (format!("http://{addr}"), tx, server)
}

async fn stop_server(tx: tokio::sync::oneshot::Sender<()>, handle: JoinHandle<()>) {
    let _ = tx.send(());
    let _ = handle.await;
}

fn http() -> Client {
    Client::builder()
        .redirect(Policy::none())
        .build()
        .expect("client")
}

fn query_param(location: &str, name: &str) -> Option<String> {
    url::Url::parse(location)
        .ok()?
        .query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

fn authorize_params(challenge: &PkceChallenge) -> Vec<(&'static str, String)> {
    vec![
        ("response_type", "code".to_string()),
        ("client_id", "spa".to_string()),
        ("redirect_uri", REDIRECT_URI.to_string()),
        ("scope", "openid reports".to_string()),
        ("state", "xyz".to_string()),
        ("code_challenge", challenge.as_str().to_string()),
        ("code_challenge_method", "S256".to_string()),
    ]
}

async fn introspect(base: &str, token: &str) -> Value {
    http()
        .post(format!("{base}/introspect"))
        .basic_auth("backend", Some(BACKEND_SECRET))
        .form(&[("token", token)])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

#[tokio::test]
async fn authorization_code_flow_end_to_end() {
    let (base, tx, handle) = start_server().await;
    let client = http();
    let verifier = PkceVerifier::generate();
    let challenge = PkceChallenge::from_verifier(&verifier);
    let params = authorize_params(&challenge);

    // First visit: no consent on file yet.
    let res = client
        .get(format!("{base}/authorize"))
        .query(&params)
        .header(USER_HEADER, "alice")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["interaction"], "consent_required");
    assert_eq!(body["client_name"], "Reports SPA");

    // User approves.
    let mut form = params.clone();
    form.push(("decision", "approve".to_string()));
    let res = client
        .post(format!("{base}/consent"))
        .header(USER_HEADER, "alice")
        .form(&form)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FOUND);
    let location = res.headers()["location"].to_str().unwrap().to_string();
    assert!(location.starts_with(REDIRECT_URI));
    assert_eq!(query_param(&location, "state").as_deref(), Some("xyz"));
    let code = query_param(&location, "code").expect("code in redirect");

    // Exchange the code.
    let res = client
        .post(format!("{base}/token"))
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("redirect_uri", REDIRECT_URI),
            ("client_id", "spa"),
            ("code_verifier", verifier.as_str()),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["cache-control"], "no-store");
    let tokens: Value = res.json().await.unwrap();
    assert_eq!(tokens["token_type"], "Bearer");
    assert_eq!(tokens["scope"], "openid reports");
    let access_token = tokens["access_token"].as_str().unwrap().to_string();
    let refresh_token = tokens["refresh_token"].as_str().unwrap().to_string();

    // The code is single use.
    let res = client
        .post(format!("{base}/token"))
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("redirect_uri", REDIRECT_URI),
            ("client_id", "spa"),
            ("code_verifier", verifier.as_str()),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_grant");

    // Permissions from the analyst role are carried in the token.
    let info = introspect(&base, &access_token).await;
    assert_eq!(info["active"], true);
    assert_eq!(info["sub"], "alice");
    assert_eq!(info["client_id"], "spa");
    assert!(
        info["permissions"]
            .as_array()
            .unwrap()
            .iter()
            .any(|p| p == "reports:read")
    );

    // Refresh rotates; the old refresh token is dead afterwards.
    let res = client
        .post(format!("{base}/token"))
        .form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
            ("client_id", "spa"),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let rotated: Value = res.json().await.unwrap();
    assert_ne!(rotated["refresh_token"], tokens["refresh_token"]);

    let res = client
        .post(format!("{base}/token"))
        .form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
            ("client_id", "spa"),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // Revocation by the owning client deactivates the access token.
    let res = client
        .post(format!("{base}/revoke"))
        .form(&[("token", access_token.as_str()), ("client_id", "spa")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(introspect(&base, &access_token).await["active"], false);

    // Consent is remembered: the next authorize redirects straight back.
    let res = client
        .get(format!("{base}/authorize"))
        .query(&params)
        .header(USER_HEADER, "alice")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FOUND);
    let location = res.headers()["location"].to_str().unwrap();
    assert!(query_param(location, "code").is_some());

    stop_server(tx, handle).await;
}

#[tokio::test]
async fn authorize_without_session_requires_login() {
    let (base, tx, handle) = start_server().await;
    let challenge = PkceChallenge::from_verifier(&PkceVerifier::generate());

    let res = http()
        .get(format!("{base}/authorize"))
        .query(&authorize_params(&challenge))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["interaction"], "login_required");

    stop_server(tx, handle).await;
}

#[tokio::test]
async fn authorize_with_unregistered_redirect_never_redirects() {
    let (base, tx, handle) = start_server().await;
    let challenge = PkceChallenge::from_verifier(&PkceVerifier::generate());
    let mut params = authorize_params(&challenge);
    params[2].1 = "https://evil.test/callback".to_string();

    let res = http()
        .get(format!("{base}/authorize"))
        .query(&params)
        .header(USER_HEADER, "alice")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(res.headers().get("location").is_none());

    stop_server(tx, handle).await;
}

#[tokio::test]
async fn client_credentials_and_content_type() {
    let (base, tx, handle) = start_server().await;
    let client = http();

    let res = client
        .post(format!("{base}/token"))
        .basic_auth("backend", Some(BACKEND_SECRET))
        .form(&[("grant_type", "client_credentials")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let tokens: Value = res.json().await.unwrap();
    assert_eq!(tokens["scope"], "reports");
    assert!(tokens.get("refresh_token").is_none());

    // JSON bodies are rejected.
    let res = client
        .post(format!("{base}/token"))
        .basic_auth("backend", Some(BACKEND_SECRET))
        .json(&serde_json::json!({"grant_type": "client_credentials"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_request");

    // Wrong secret.
    let res = client
        .post(format!("{base}/token"))
        .basic_auth("backend", Some("wrong"))
        .form(&[("grant_type", "client_credentials")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(res.headers().contains_key("www-authenticate"));

    stop_server(tx, handle).await;
}

#[tokio::test]
async fn discovery_and_health() {
    let (base, tx, handle) = start_server().await;
    let client = http();

    let res = client
        .get(format!("{base}/.well-known/openid-configuration"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().contains_key("x-request-id"));
    let doc: Value = res.json().await.unwrap();
    assert_eq!(doc["issuer"], "https://auth.warden.test");
    assert_eq!(
        doc["authorization_endpoint"],
        "https://auth.warden.test/authorize"
    );
    let scopes = doc["scopes_supported"].as_array().unwrap();
    assert!(scopes.iter().any(|s| s == "reports"));

    let res = client
        .get(format!("{base}/healthz"))
        .header("x-request-id", "probe-1")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["x-request-id"], "probe-1");

    stop_server(tx, handle).await;
}
