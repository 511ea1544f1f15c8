//! Races many redemptions of the same code and refresh token.

use std::sync::Arc;

use time::{Duration, OffsetDateTime};
use uuid::Uuid;
use warden_auth::audit::MemoryAuditSink;
use warden_auth::crypto::{JwtService, SigningKeyPair, hash_client_secret};
use warden_auth::oauth::{ClientCredentials, TokenRequest};
use warden_auth::rbac::RbacResolver;
use warden_auth::storage::{AuthorizationCodeStorage, ClientStorage, TokenStorage};
use warden_auth::token::{TokenConfig, TokenService};
use warden_auth::types::{
    AuthorizationCode, Client, ClientType, GrantType, TokenKind, TokenLifetimes, TokenRecord,
};
use warden_auth_memory::{InMemoryAuthStore, create_auth_store};

const SECRET: &str = "race-secret-race-secret";
const RACERS: usize = 16;

fn token(kind: TokenKind, now: OffsetDateTime) -> TokenRecord {
    let id = Uuid::new_v4().to_string();
    TokenRecord {
        token_hash: format!("hash-{id}"),
        token_id: id,
        kind,
        client_id: "backend".to_string(),
        user_id: Some("alice".to_string()),
        scope: "openid".to_string(),
        issued_at: now,
        expires_at: now + Duration::hours(1),
        revoked_at: None,
        rotated_from: None,
    }
}

fn code(value: &str, now: OffsetDateTime) -> AuthorizationCode {
    AuthorizationCode {
        code: value.to_string(),
        client_id: "backend".to_string(),
        user_id: "alice".to_string(),
        redirect_uri: "https://a.test/cb".to_string(),
        scope: "openid".to_string(),
        code_challenge: None,
        code_challenge_method: None,
        nonce: None,
        created_at: now,
        expires_at: now + Duration::minutes(10),
        used: false,
    }
}

async fn token_service(store: &Arc<InMemoryAuthStore>) -> Arc<TokenService> {
    let client = Client {
        client_id: "backend".to_string(),
        client_secret_hash: Some(hash_client_secret(SECRET).unwrap()),
        client_type: ClientType::Confidential,
        name: "Backend".to_string(),
        redirect_uris: vec!["https://a.test/cb".to_string()],
        grant_types: vec![GrantType::AuthorizationCode, GrantType::RefreshToken],
        allowed_scopes: vec!["openid".to_string()],
        require_pkce: false,
        active: true,
        token_lifetimes: TokenLifetimes::default(),
    };
    ClientStorage::create(store.as_ref(), &client).await.unwrap();

    Arc::new(TokenService::new(
        Arc::new(JwtService::new(
            SigningKeyPair::from_secret("race", &[3u8; 32]),
            "https://auth.test",
        )),
        store.clone(),
        store.clone(),
        store.clone(),
        RbacResolver::new(store.clone()),
        Arc::new(MemoryAuditSink::new()),
        TokenConfig::default(),
    ))
}

fn credentials() -> ClientCredentials {
    ClientCredentials::new(None, Some("backend".to_string()), Some(SECRET.to_string()))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_store_redeems_code_exactly_once() {
    let store = create_auth_store();
    let now = OffsetDateTime::now_utc();
    AuthorizationCodeStorage::create(store.as_ref(), &code("shared", now))
        .await
        .unwrap();

    let handles: Vec<_> = (0..RACERS)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move {
                let issued = [token(TokenKind::AccessToken, now)];
                store.redeem("shared", now, &issued).await.unwrap()
            })
        })
        .collect();

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
    assert_eq!(store.token_count().await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_token_endpoint_exchanges_code_exactly_once() {
    let store = create_auth_store();
    let service = token_service(&store).await;
    AuthorizationCodeStorage::create(store.as_ref(), &code("shared", OffsetDateTime::now_utc()))
        .await
        .unwrap();

    let handles: Vec<_> = (0..RACERS)
        .map(|_| {
            let service = service.clone();
            tokio::spawn(async move {
                let request = TokenRequest {
                    grant_type: Some("authorization_code".to_string()),
                    code: Some("shared".to_string()),
                    redirect_uri: Some("https://a.test/cb".to_string()),
                    ..Default::default()
                };
                service.token(&request, &credentials()).await
            })
        })
        .collect();

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(e) => assert_eq!(e.oauth_error_code(), "invalid_grant"),
        }
    }
    assert_eq!(successes, 1);
    // One access token and one refresh token.
    assert_eq!(store.token_count().await, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_refresh_token_rotates_exactly_once() {
    let store = create_auth_store();
    let service = token_service(&store).await;
    AuthorizationCodeStorage::create(store.as_ref(), &code("c1", OffsetDateTime::now_utc()))
        .await
        .unwrap();

    let issued = service
        .token(
            &TokenRequest {
                grant_type: Some("authorization_code".to_string()),
                code: Some("c1".to_string()),
                redirect_uri: Some("https://a.test/cb".to_string()),
                ..Default::default()
            },
            &credentials(),
        )
        .await
        .unwrap();
    let refresh_token = issued.refresh_token.unwrap();

    let handles: Vec<_> = (0..RACERS)
        .map(|_| {
            let service = service.clone();
            let refresh_token = refresh_token.clone();
            tokio::spawn(async move {
                let request = TokenRequest {
                    grant_type: Some("refresh_token".to_string()),
                    refresh_token: Some(refresh_token),
                    ..Default::default()
                };
                service.token(&request, &credentials()).await
            })
        })
        .collect();

    let mut successes = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            successes += 1;
        }
    }
    assert_eq!(successes, 1);
    assert!(
        store
            .find_by_hash(&warden_auth::crypto::hash_token(&refresh_token))
            .await
            .unwrap()
            .unwrap()
            .is_revoked()
    );
}
