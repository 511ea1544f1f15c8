//! Wires the authorization services to the in-memory store and seeds it
//! from `[bootstrap]` configuration.

use std::sync::Arc;

use tracing::{info, warn};
use warden_auth::audit::{AuditSink, NoopAuditSink, TracingAuditSink};
use warden_auth::crypto::{JwtError, JwtService, SigningKeyPair};
use warden_auth::oauth::{
    AuthorizationConfig, AuthorizationService, HeaderSessionResolver, NoSessionResolver,
    SessionResolver,
};
use warden_auth::storage::ClientStorage;
use warden_auth::token::{TokenConfig, TokenService};
use warden_auth::{AuthConfig, AuthError, AuthState, ConsentManager, RbacResolver};
use warden_auth_memory::{InMemoryAuthStore, create_auth_store};

use crate::config::{AppConfig, BootstrapConfig};

/// Errors raised while assembling the server.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("signing key: {0}")]
    Signing(#[from] JwtError),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Everything the HTTP layer and background tasks need.
pub struct AuthComponents {
    pub store: Arc<InMemoryAuthStore>,
    pub token_service: Arc<TokenService>,
    pub state: AuthState,
}

/// Builds the store, services and handler state from configuration.
pub async fn build_auth(cfg: &AppConfig) -> Result<AuthComponents, BootstrapError> {
    let store = create_auth_store();
    seed_store(&store, &cfg.bootstrap).await?;

    let auth_config = Arc::new(cfg.auth.clone());
    let signing_key = SigningKeyPair::from_config(&auth_config.signing)?;
    let jwt = Arc::new(JwtService::new(signing_key, auth_config.issuer.clone()));
    info!(
        algorithm = jwt.algorithm().as_str(),
        kid = jwt.current_kid(),
        "Token signing key loaded"
    );

    let audit = audit_sink(&auth_config);

    let authorization_service = Arc::new(AuthorizationService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        ConsentManager::new(store.clone()),
        audit.clone(),
        AuthorizationConfig::from_auth_config(&auth_config)?,
    ));

    let token_service = Arc::new(TokenService::new(
        jwt,
        store.clone(),
        store.clone(),
        store.clone(),
        RbacResolver::new(store.clone()),
        audit.clone(),
        TokenConfig::from_auth_config(&auth_config)?,
    ));

    let state = AuthState::new(
        authorization_service,
        token_service.clone(),
        store.clone(),
        session_resolver(&auth_config),
        audit,
        auth_config,
    );

    Ok(AuthComponents {
        store,
        token_service,
        state,
    })
}

fn audit_sink(config: &AuthConfig) -> Arc<dyn AuditSink> {
    if config.audit.enabled {
        Arc::new(TracingAuditSink)
    } else {
        Arc::new(NoopAuditSink)
    }
}

fn session_resolver(config: &AuthConfig) -> Arc<dyn SessionResolver> {
    if config.interaction.trust_session_header {
        warn!(
            header = %config.interaction.session_header,
            "Trusting upstream session header; it must be stripped from client requests"
        );
        Arc::new(HeaderSessionResolver::new(
            config.interaction.session_header.clone(),
        ))
    } else {
        Arc::new(NoSessionResolver)
    }
}

/// Loads the configured records into the store.
///
/// Client secrets are hashed with argon2 on the way in.
pub async fn seed_store(
    store: &InMemoryAuthStore,
    bootstrap: &BootstrapConfig,
) -> Result<(), AuthError> {
    for scope in &bootstrap.scopes {
        store.put_scope(scope.clone()).await;
    }
    for client in &bootstrap.clients {
        let client = client.clone().into_client()?;
        ClientStorage::create(store, &client).await?;
    }
    for role in &bootstrap.roles {
        store.put_role(role.clone()).await;
    }
    for permission in &bootstrap.permissions {
        store.put_permission(permission.clone()).await;
    }
    for link in &bootstrap.role_permissions {
        store.attach_permission(link.clone()).await;
    }
    for assignment in &bootstrap.user_roles {
        store.assign_role(assignment.clone()).await;
    }
    for grant in &bootstrap.user_permissions {
        store.grant_permission(grant.clone()).await;
    }

    info!(
        scopes = bootstrap.scopes.len(),
        clients = bootstrap.clients.len(),
        roles = bootstrap.roles.len(),
        permissions = bootstrap.permissions.len(),
        "Bootstrap records loaded"
    );
    Ok(())
}
