//! Shared mock storage for unit tests.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::AuthResult;
use crate::crypto::hash_client_secret;
use crate::error::AuthError;
use crate::storage::{
    AuthorizationCodeStorage, ClientStorage, ConsentStorage, RbacStorage, ScopeStorage,
    TokenStorage,
};
use crate::types::{
    AuthorizationCode, Client, ClientType, ClientUpdate, ConsentGrant, GrantType, Permission,
    Role, RolePermission, ScopeDefinition, TokenLifetimes, TokenRecord, UserPermission, UserRole,
};

pub const CONFIDENTIAL_SECRET: &str = "s3cret-s3cret";

/// One struct implementing every storage trait, guarded by plain locks.
#[derive(Default)]
pub struct MockStore {
    pub clients: RwLock<HashMap<String, Client>>,
    pub scopes: RwLock<HashMap<String, ScopeDefinition>>,
    pub codes: RwLock<HashMap<String, AuthorizationCode>>,
    pub tokens: RwLock<Vec<TokenRecord>>,
    pub consents: RwLock<HashMap<(String, String), ConsentGrant>>,
    pub roles: RwLock<Vec<Role>>,
    pub permissions: RwLock<Vec<Permission>>,
    pub role_permissions: RwLock<Vec<RolePermission>>,
    pub user_roles: RwLock<Vec<UserRole>>,
    pub user_permissions: RwLock<Vec<UserPermission>>,
    pub fail: AtomicBool,
}

impl MockStore {
    /// Store seeded with `openid`/`profile`/`email` scopes, a public `spa`
    /// client and a confidential `backend` client.
    pub fn seeded() -> Self {
        let store = Self::default();
        for (name, active) in [("openid", true), ("profile", true), ("email", true), ("legacy", false)] {
            let mut scope = ScopeDefinition::new(name, "");
            scope.active = active;
            store.scopes.write().unwrap().insert(name.to_string(), scope);
        }
        store.add_client(public_client());
        store.add_client(confidential_client());
        store
    }

    pub fn add_client(&self, client: Client) {
        self.clients
            .write()
            .unwrap()
            .insert(client.client_id.clone(), client);
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    fn check(&self) -> AuthResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            Err(AuthError::storage("connection refused"))
        } else {
            Ok(())
        }
    }
}

pub fn public_client() -> Client {
    Client {
        client_id: "spa".to_string(),
        client_secret_hash: None,
        client_type: ClientType::Public,
        name: "Single Page App".to_string(),
        redirect_uris: vec!["https://spa.test/cb".to_string()],
        grant_types: vec![GrantType::AuthorizationCode, GrantType::RefreshToken],
        allowed_scopes: vec!["openid".to_string(), "profile".to_string()],
        require_pkce: false,
        active: true,
        token_lifetimes: TokenLifetimes::default(),
    }
}

pub fn confidential_client() -> Client {
    Client {
        client_id: "backend".to_string(),
        client_secret_hash: Some(hash_client_secret(CONFIDENTIAL_SECRET).unwrap()),
        client_type: ClientType::Confidential,
        name: "Backend".to_string(),
        redirect_uris: vec!["https://a.test/cb".to_string()],
        grant_types: vec![
            GrantType::AuthorizationCode,
            GrantType::RefreshToken,
            GrantType::ClientCredentials,
        ],
        allowed_scopes: vec![
            "openid".to_string(),
            "profile".to_string(),
            "email".to_string(),
            "legacy".to_string(),
        ],
        require_pkce: false,
        active: true,
        token_lifetimes: TokenLifetimes::default(),
    }
}

#[async_trait]
impl ClientStorage for MockStore {
    async fn find_by_client_id(&self, client_id: &str) -> AuthResult<Option<Client>> {
        self.check()?;
        Ok(self.clients.read().unwrap().get(client_id).cloned())
    }

    async fn create(&self, client: &Client) -> AuthResult<Client> {
        self.check()?;
        self.add_client(client.clone());
        Ok(client.clone())
    }

    async fn update(&self, client_id: &str, update: &ClientUpdate) -> AuthResult<Client> {
        self.check()?;
        let mut clients = self.clients.write().unwrap();
        let client = clients
            .get_mut(client_id)
            .ok_or_else(|| AuthError::invalid_request("unknown client"))?;
        client
            .apply_update(update)
            .map_err(|e| AuthError::invalid_request(e.to_string()))?;
        Ok(client.clone())
    }

    async fn list(&self) -> AuthResult<Vec<Client>> {
        self.check()?;
        Ok(self.clients.read().unwrap().values().cloned().collect())
    }
}

#[async_trait]
impl ScopeStorage for MockStore {
    async fn find_scopes(&self, names: &[String]) -> AuthResult<Vec<ScopeDefinition>> {
        self.check()?;
        let scopes = self.scopes.read().unwrap();
        Ok(names.iter().filter_map(|n| scopes.get(n).cloned()).collect())
    }

    async fn list_active(&self) -> AuthResult<Vec<ScopeDefinition>> {
        self.check()?;
        let mut active: Vec<_> = self
            .scopes
            .read()
            .unwrap()
            .values()
            .filter(|s| s.active)
            .cloned()
            .collect();
        active.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(active)
    }
}

#[async_trait]
impl AuthorizationCodeStorage for MockStore {
    async fn create(&self, code: &AuthorizationCode) -> AuthResult<()> {
        self.check()?;
        self.codes
            .write()
            .unwrap()
            .insert(code.code.clone(), code.clone());
        Ok(())
    }

    async fn find_by_code(&self, code: &str) -> AuthResult<Option<AuthorizationCode>> {
        self.check()?;
        Ok(self.codes.read().unwrap().get(code).cloned())
    }

    async fn redeem(
        &self,
        code: &str,
        now: OffsetDateTime,
        tokens: &[TokenRecord],
    ) -> AuthResult<bool> {
        self.check()?;
        let mut codes = self.codes.write().unwrap();
        let Some(stored) = codes.get_mut(code) else {
            return Ok(false);
        };
        if !stored.is_redeemable_at(now) {
            return Ok(false);
        }
        stored.used = true;
        self.tokens.write().unwrap().extend_from_slice(tokens);
        Ok(true)
    }

    async fn cleanup_expired(&self, now: OffsetDateTime) -> AuthResult<u64> {
        self.check()?;
        let mut codes = self.codes.write().unwrap();
        let before = codes.len();
        codes.retain(|_, c| !c.is_expired_at(now));
        Ok((before - codes.len()) as u64)
    }
}

#[async_trait]
impl TokenStorage for MockStore {
    async fn create(&self, records: &[TokenRecord]) -> AuthResult<()> {
        self.check()?;
        self.tokens.write().unwrap().extend_from_slice(records);
        Ok(())
    }

    async fn find_by_hash(&self, token_hash: &str) -> AuthResult<Option<TokenRecord>> {
        self.check()?;
        Ok(self
            .tokens
            .read()
            .unwrap()
            .iter()
            .find(|t| t.token_hash == token_hash)
            .cloned())
    }

    async fn find_by_jti(&self, token_id: &str) -> AuthResult<Option<TokenRecord>> {
        self.check()?;
        Ok(self
            .tokens
            .read()
            .unwrap()
            .iter()
            .find(|t| t.token_id == token_id)
            .cloned())
    }

    async fn rotate_refresh_token(
        &self,
        old_hash: &str,
        now: OffsetDateTime,
        new_tokens: &[TokenRecord],
    ) -> AuthResult<bool> {
        self.check()?;
        let mut tokens = self.tokens.write().unwrap();
        let Some(old) = tokens
            .iter_mut()
            .find(|t| t.token_hash == old_hash && t.is_active_at(now))
        else {
            return Ok(false);
        };
        old.revoked_at = Some(now);
        tokens.extend_from_slice(new_tokens);
        Ok(true)
    }

    async fn revoke_by_hash(&self, token_hash: &str, now: OffsetDateTime) -> AuthResult<bool> {
        self.check()?;
        let mut tokens = self.tokens.write().unwrap();
        match tokens.iter_mut().find(|t| t.token_hash == token_hash) {
            Some(t) => {
                t.revoked_at.get_or_insert(now);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn revoke_by_jti(&self, token_id: &str, now: OffsetDateTime) -> AuthResult<bool> {
        self.check()?;
        let mut tokens = self.tokens.write().unwrap();
        match tokens.iter_mut().find(|t| t.token_id == token_id) {
            Some(t) => {
                t.revoked_at.get_or_insert(now);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn cleanup_expired(&self, now: OffsetDateTime) -> AuthResult<u64> {
        self.check()?;
        let mut tokens = self.tokens.write().unwrap();
        let before = tokens.len();
        tokens.retain(|t| !t.is_expired_at(now));
        Ok((before - tokens.len()) as u64)
    }
}

#[async_trait]
impl ConsentStorage for MockStore {
    async fn find(&self, user_id: &str, client_id: &str) -> AuthResult<Option<ConsentGrant>> {
        self.check()?;
        Ok(self
            .consents
            .read()
            .unwrap()
            .get(&(user_id.to_string(), client_id.to_string()))
            .cloned())
    }

    async fn upsert(&self, grant: &ConsentGrant) -> AuthResult<()> {
        self.check()?;
        self.consents.write().unwrap().insert(
            (grant.user_id.clone(), grant.client_id.clone()),
            grant.clone(),
        );
        Ok(())
    }

    async fn revoke(
        &self,
        user_id: &str,
        client_id: &str,
        now: OffsetDateTime,
    ) -> AuthResult<bool> {
        self.check()?;
        let mut consents = self.consents.write().unwrap();
        match consents.get_mut(&(user_id.to_string(), client_id.to_string())) {
            Some(grant) if grant.is_active() => {
                grant.revoked_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl RbacStorage for MockStore {
    async fn user_permissions(&self, user_id: &str) -> AuthResult<Vec<UserPermission>> {
        self.check()?;
        Ok(self
            .user_permissions
            .read()
            .unwrap()
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn user_roles(&self, user_id: &str) -> AuthResult<Vec<UserRole>> {
        self.check()?;
        Ok(self
            .user_roles
            .read()
            .unwrap()
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn roles(&self) -> AuthResult<Vec<Role>> {
        self.check()?;
        Ok(self.roles.read().unwrap().clone())
    }

    async fn role_permissions(&self, role_ids: &[String]) -> AuthResult<Vec<RolePermission>> {
        self.check()?;
        Ok(self
            .role_permissions
            .read()
            .unwrap()
            .iter()
            .filter(|rp| role_ids.contains(&rp.role_id))
            .cloned()
            .collect())
    }

    async fn permissions(&self, permission_ids: &[String]) -> AuthResult<Vec<Permission>> {
        self.check()?;
        Ok(self
            .permissions
            .read()
            .unwrap()
            .iter()
            .filter(|p| permission_ids.contains(&p.id))
            .cloned()
            .collect())
    }
}
