//! In-memory implementation of every `warden-auth` storage trait.
//!
//! All tables sit behind one [`tokio::sync::RwLock`]. Operations that must be
//! atomic across tables (code redemption, refresh rotation) run under a
//! single write guard, which gives them the same all-or-nothing behaviour a
//! database transaction would.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use warden_auth::AuthResult;
use warden_auth::error::AuthError;
use warden_auth::storage::{
    AuthorizationCodeStorage, ClientStorage, ConsentStorage, RbacStorage, ScopeStorage,
    TokenStorage,
};
use warden_auth::types::{
    AuthorizationCode, Client, ClientUpdate, ConsentGrant, Permission, Role, RolePermission,
    ScopeDefinition, TokenRecord, UserPermission, UserRole,
};

#[derive(Debug, Default)]
struct Tables {
    clients: BTreeMap<String, Client>,
    scopes: BTreeMap<String, ScopeDefinition>,
    codes: HashMap<String, AuthorizationCode>,
    /// Keyed by token hash.
    tokens: HashMap<String, TokenRecord>,
    /// jti -> token hash
    token_ids: HashMap<String, String>,
    consents: HashMap<(String, String), ConsentGrant>,
    roles: BTreeMap<String, Role>,
    permissions: HashMap<String, Permission>,
    role_permissions: Vec<RolePermission>,
    user_roles: Vec<UserRole>,
    user_permissions: Vec<UserPermission>,
}

impl Tables {
    /// Checks that none of `records` collide with stored tokens or each other.
    fn check_new_tokens(&self, records: &[TokenRecord]) -> AuthResult<()> {
        for (i, record) in records.iter().enumerate() {
            let duplicate_in_batch = records[..i]
                .iter()
                .any(|r| r.token_hash == record.token_hash || r.token_id == record.token_id);
            if duplicate_in_batch
                || self.tokens.contains_key(&record.token_hash)
                || self.token_ids.contains_key(&record.token_id)
            {
                return Err(AuthError::storage(format!(
                    "token {} already exists",
                    record.token_id
                )));
            }
        }
        Ok(())
    }

    fn insert_tokens(&mut self, records: &[TokenRecord]) {
        for record in records {
            self.token_ids
                .insert(record.token_id.clone(), record.token_hash.clone());
            self.tokens.insert(record.token_hash.clone(), record.clone());
        }
    }
}

/// Transactional in-memory store for the authorization server.
///
/// Suitable for tests, development and single-node deployments. Nothing
/// survives a restart.
#[derive(Debug, Default)]
pub struct InMemoryAuthStore {
    tables: RwLock<Tables>,
}

impl InMemoryAuthStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Seeding
    // =========================================================================

    /// Registers or replaces a scope.
    pub async fn put_scope(&self, scope: ScopeDefinition) {
        self.tables
            .write()
            .await
            .scopes
            .insert(scope.name.clone(), scope);
    }

    /// Registers or replaces a role.
    pub async fn put_role(&self, role: Role) {
        self.tables.write().await.roles.insert(role.id.clone(), role);
    }

    /// Registers or replaces a permission.
    pub async fn put_permission(&self, permission: Permission) {
        self.tables
            .write()
            .await
            .permissions
            .insert(permission.id.clone(), permission);
    }

    /// Attaches a permission to a role. Duplicate attachments are ignored.
    pub async fn attach_permission(&self, attachment: RolePermission) {
        let mut tables = self.tables.write().await;
        if !tables.role_permissions.contains(&attachment) {
            tables.role_permissions.push(attachment);
        }
    }

    /// Assigns a role to a user.
    pub async fn assign_role(&self, assignment: UserRole) {
        self.tables.write().await.user_roles.push(assignment);
    }

    /// Grants a permission directly to a user.
    pub async fn grant_permission(&self, grant: UserPermission) {
        self.tables.write().await.user_permissions.push(grant);
    }

    /// Number of stored token records, revoked ones included.
    pub async fn token_count(&self) -> usize {
        self.tables.read().await.tokens.len()
    }
}

// =============================================================================
// Clients and scopes
// =============================================================================

#[async_trait]
impl ClientStorage for InMemoryAuthStore {
    async fn find_by_client_id(&self, client_id: &str) -> AuthResult<Option<Client>> {
        Ok(self.tables.read().await.clients.get(client_id).cloned())
    }

    async fn create(&self, client: &Client) -> AuthResult<Client> {
        client
            .validate()
            .map_err(|e| AuthError::invalid_request(e.to_string()))?;

        let mut tables = self.tables.write().await;
        if tables.clients.contains_key(&client.client_id) {
            return Err(AuthError::invalid_request(format!(
                "client {} already exists",
                client.client_id
            )));
        }
        tables
            .clients
            .insert(client.client_id.clone(), client.clone());
        tracing::debug!(client_id = %client.client_id, "Registered client");
        Ok(client.clone())
    }

    async fn update(&self, client_id: &str, update: &ClientUpdate) -> AuthResult<Client> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .clients
            .get_mut(client_id)
            .ok_or_else(|| AuthError::invalid_request(format!("unknown client {client_id}")))?;
        stored
            .apply_update(update)
            .map_err(|e| AuthError::invalid_request(e.to_string()))?;
        Ok(stored.clone())
    }

    async fn list(&self) -> AuthResult<Vec<Client>> {
        Ok(self.tables.read().await.clients.values().cloned().collect())
    }
}

#[async_trait]
impl ScopeStorage for InMemoryAuthStore {
    async fn find_scopes(&self, names: &[String]) -> AuthResult<Vec<ScopeDefinition>> {
        let tables = self.tables.read().await;
        Ok(names
            .iter()
            .filter_map(|name| tables.scopes.get(name).cloned())
            .collect())
    }

    async fn list_active(&self) -> AuthResult<Vec<ScopeDefinition>> {
        Ok(self
            .tables
            .read()
            .await
            .scopes
            .values()
            .filter(|s| s.active)
            .cloned()
            .collect())
    }
}

// =============================================================================
// Codes and tokens
// =============================================================================

#[async_trait]
impl AuthorizationCodeStorage for InMemoryAuthStore {
    async fn create(&self, code: &AuthorizationCode) -> AuthResult<()> {
        let mut tables = self.tables.write().await;
        if tables.codes.contains_key(&code.code) {
            return Err(AuthError::storage("authorization code collision"));
        }
        tables.codes.insert(code.code.clone(), code.clone());
        Ok(())
    }

    async fn find_by_code(&self, code: &str) -> AuthResult<Option<AuthorizationCode>> {
        Ok(self.tables.read().await.codes.get(code).cloned())
    }

    async fn redeem(
        &self,
        code: &str,
        now: OffsetDateTime,
        tokens: &[TokenRecord],
    ) -> AuthResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.codes.get(code) {
            Some(stored) if stored.is_redeemable_at(now) => {}
            _ => return Ok(false),
        }
        tables.check_new_tokens(tokens)?;

        if let Some(stored) = tables.codes.get_mut(code) {
            stored.used = true;
        }
        tables.insert_tokens(tokens);
        Ok(true)
    }

    async fn cleanup_expired(&self, now: OffsetDateTime) -> AuthResult<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.codes.len();
        tables.codes.retain(|_, c| !c.is_expired_at(now));
        Ok((before - tables.codes.len()) as u64)
    }
}

#[async_trait]
impl TokenStorage for InMemoryAuthStore {
    async fn create(&self, records: &[TokenRecord]) -> AuthResult<()> {
        let mut tables = self.tables.write().await;
        tables.check_new_tokens(records)?;
        tables.insert_tokens(records);
        Ok(())
    }

    async fn find_by_hash(&self, token_hash: &str) -> AuthResult<Option<TokenRecord>> {
        Ok(self.tables.read().await.tokens.get(token_hash).cloned())
    }

    async fn find_by_jti(&self, token_id: &str) -> AuthResult<Option<TokenRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .token_ids
            .get(token_id)
            .and_then(|hash| tables.tokens.get(hash))
            .cloned())
    }

    async fn rotate_refresh_token(
        &self,
        old_hash: &str,
        now: OffsetDateTime,
        new_tokens: &[TokenRecord],
    ) -> AuthResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.tokens.get(old_hash) {
            Some(old) if old.is_active_at(now) => {}
            _ => return Ok(false),
        }
        tables.check_new_tokens(new_tokens)?;

        if let Some(old) = tables.tokens.get_mut(old_hash) {
            old.revoked_at = Some(now);
        }
        tables.insert_tokens(new_tokens);
        Ok(true)
    }

    async fn revoke_by_hash(&self, token_hash: &str, now: OffsetDateTime) -> AuthResult<bool> {
        let mut tables = self.tables.write().await;
        Ok(match tables.tokens.get_mut(token_hash) {
            Some(record) => {
                record.revoked_at.get_or_insert(now);
                true
            }
            None => false,
        })
    }

    async fn revoke_by_jti(&self, token_id: &str, now: OffsetDateTime) -> AuthResult<bool> {
        let mut tables = self.tables.write().await;
        let Some(hash) = tables.token_ids.get(token_id).cloned() else {
            return Ok(false);
        };
        Ok(match tables.tokens.get_mut(&hash) {
            Some(record) => {
                record.revoked_at.get_or_insert(now);
                true
            }
            None => false,
        })
    }

    async fn cleanup_expired(&self, now: OffsetDateTime) -> AuthResult<u64> {
        let mut tables = self.tables.write().await;
        let expired: Vec<(String, String)> = tables
            .tokens
            .values()
            .filter(|t| t.is_expired_at(now))
            .map(|t| (t.token_hash.clone(), t.token_id.clone()))
            .collect();
        for (hash, id) in &expired {
            tables.tokens.remove(hash);
            tables.token_ids.remove(id);
        }
        Ok(expired.len() as u64)
    }
}

// =============================================================================
// Consent and RBAC
// =============================================================================

#[async_trait]
impl ConsentStorage for InMemoryAuthStore {
    async fn find(&self, user_id: &str, client_id: &str) -> AuthResult<Option<ConsentGrant>> {
        Ok(self
            .tables
            .read()
            .await
            .consents
            .get(&(user_id.to_string(), client_id.to_string()))
            .cloned())
    }

    async fn upsert(&self, grant: &ConsentGrant) -> AuthResult<()> {
        self.tables.write().await.consents.insert(
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
        let mut tables = self.tables.write().await;
        match tables
            .consents
            .get_mut(&(user_id.to_string(), client_id.to_string()))
        {
            Some(grant) if grant.is_active() => {
                grant.revoked_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl RbacStorage for InMemoryAuthStore {
    async fn user_permissions(&self, user_id: &str) -> AuthResult<Vec<UserPermission>> {
        Ok(self
            .tables
            .read()
            .await
            .user_permissions
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn user_roles(&self, user_id: &str) -> AuthResult<Vec<UserRole>> {
        Ok(self
            .tables
            .read()
            .await
            .user_roles
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn roles(&self) -> AuthResult<Vec<Role>> {
        Ok(self.tables.read().await.roles.values().cloned().collect())
    }

    async fn role_permissions(&self, role_ids: &[String]) -> AuthResult<Vec<RolePermission>> {
        Ok(self
            .tables
            .read()
            .await
            .role_permissions
            .iter()
            .filter(|rp| role_ids.contains(&rp.role_id))
            .cloned()
            .collect())
    }

    async fn permissions(&self, permission_ids: &[String]) -> AuthResult<Vec<Permission>> {
        let tables = self.tables.read().await;
        Ok(permission_ids
            .iter()
            .filter_map(|id| tables.permissions.get(id).cloned())
            .collect())
    }
}
