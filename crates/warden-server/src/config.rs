use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use warden_auth::AuthResult;
use warden_auth::config::AuthConfig;
use warden_auth::crypto::hash_client_secret;
use warden_auth::types::{
    Client, ClientType, GrantType, Permission, Role, RolePermission, ScopeDefinition,
    TokenLifetimes, UserPermission, UserRole,
};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Authorization server configuration
    #[serde(default)]
    pub auth: AuthConfig,
    /// Records seeded into the store at startup
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if self.server.body_limit_bytes == 0 {
            return Err("server.body_limit_bytes must be > 0".into());
        }
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        self.auth
            .validate()
            .map_err(|e| format!("auth config error: {e}"))?;
        self.bootstrap.validate()
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum accepted request body size.
    #[serde(default = "default_body_limit_bytes")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_body_limit_bytes() -> usize {
    64 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// =============================================================================
// Bootstrap
// =============================================================================

/// Records loaded into the store on startup.
///
/// Client secrets may be given in plain text here (prefer the
/// `WARDEN__BOOTSTRAP__...` environment overrides); they are hashed before
/// anything is stored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    pub scopes: Vec<ScopeDefinition>,
    pub clients: Vec<BootstrapClient>,
    pub roles: Vec<Role>,
    pub permissions: Vec<Permission>,
    pub role_permissions: Vec<RolePermission>,
    pub user_roles: Vec<UserRole>,
    pub user_permissions: Vec<UserPermission>,
}

impl BootstrapConfig {
    pub fn validate(&self) -> Result<(), String> {
        let mut seen = HashSet::new();
        for client in &self.clients {
            if !seen.insert(client.client_id.as_str()) {
                return Err(format!(
                    "bootstrap.clients: duplicate client_id '{}'",
                    client.client_id
                ));
            }
            if client.client_type == ClientType::Public && client.client_secret.is_some() {
                return Err(format!(
                    "bootstrap.clients: public client '{}' must not have a client_secret",
                    client.client_id
                ));
            }
            // Only the presence of the secret matters here.
            client
                .to_client(client.client_secret.clone())
                .validate()
                .map_err(|e| format!("bootstrap.clients '{}': {e}", client.client_id))?;
        }

        let roles: HashSet<&str> = self.roles.iter().map(|r| r.id.as_str()).collect();
        let permissions: HashSet<&str> = self.permissions.iter().map(|p| p.id.as_str()).collect();

        for role in &self.roles {
            if let Some(parent) = &role.parent_id
                && !roles.contains(parent.as_str())
            {
                return Err(format!(
                    "bootstrap.roles '{}': unknown parent_id '{parent}'",
                    role.id
                ));
            }
        }
        for link in &self.role_permissions {
            if !roles.contains(link.role_id.as_str()) {
                return Err(format!(
                    "bootstrap.role_permissions: unknown role_id '{}'",
                    link.role_id
                ));
            }
            if !permissions.contains(link.permission_id.as_str()) {
                return Err(format!(
                    "bootstrap.role_permissions: unknown permission_id '{}'",
                    link.permission_id
                ));
            }
        }
        for assignment in &self.user_roles {
            if !roles.contains(assignment.role_id.as_str()) {
                return Err(format!(
                    "bootstrap.user_roles: unknown role_id '{}'",
                    assignment.role_id
                ));
            }
        }
        for grant in &self.user_permissions {
            if !permissions.contains(grant.permission_id.as_str()) {
                return Err(format!(
                    "bootstrap.user_permissions: unknown permission_id '{}'",
                    grant.permission_id
                ));
            }
        }
        Ok(())
    }
}

/// A client registration as written in configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapClient {
    pub client_id: String,
    /// Plain-text secret, required for confidential clients.
    #[serde(default, skip_serializing)]
    pub client_secret: Option<String>,
    pub client_type: ClientType,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    pub grant_types: Vec<GrantType>,
    #[serde(default)]
    pub allowed_scopes: Vec<String>,
    #[serde(default)]
    pub require_pkce: bool,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub token_lifetimes: TokenLifetimes,
}

fn default_true() -> bool {
    true
}

impl BootstrapClient {
    /// Builds the stored registration, hashing the secret.
    pub fn into_client(self) -> AuthResult<Client> {
        let hash = self
            .client_secret
            .as_deref()
            .map(hash_client_secret)
            .transpose()?;
        Ok(self.to_client(hash))
    }

    fn to_client(&self, client_secret_hash: Option<String>) -> Client {
        Client {
            client_id: self.client_id.clone(),
            client_secret_hash,
            client_type: self.client_type,
            name: self.name.clone(),
            redirect_uris: self.redirect_uris.clone(),
            grant_types: self.grant_types.clone(),
            allowed_scopes: self.allowed_scopes.clone(),
            require_pkce: self.require_pkce,
            active: self.active,
            token_lifetimes: self.token_lifetimes,
        }
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::{Path, PathBuf};

    pub const DEFAULT_CONFIG_FILE: &str = "warden.toml";

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                let pathbuf = PathBuf::from(p);
                if !pathbuf.exists() {
                    return Err(format!("config file not found: {p}"));
                }
                builder = builder.add_source(File::from(pathbuf));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }
        // Environment variable overrides, e.g., WARDEN__SERVER__PORT=9090
        builder = builder.add_source(
            Environment::with_prefix("WARDEN")
                .prefix_separator("__")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }

    pub fn load_config_with_default_path<P: AsRef<Path>>(
        path: Option<P>,
    ) -> Result<AppConfig, String> {
        let p = path
            .as_ref()
            .map(|p| p.as_ref().to_string_lossy().to_string());
        load_config(p.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> AppConfig {
        toml::from_str(source).unwrap()
    }

    const SEEDED: &str = r#"
[[bootstrap.scopes]]
name = "openid"

[[bootstrap.clients]]
client_id = "backend"
client_secret = "backend-secret-backend-secret"
client_type = "confidential"
redirect_uris = ["https://app.test/cb"]
grant_types = ["authorization_code", "refresh_token"]
allowed_scopes = ["openid"]

[[bootstrap.roles]]
id = "viewer"
name = "Viewer"

[[bootstrap.permissions]]
id = "p1"
identifier = "reports:read"

[[bootstrap.role_permissions]]
role_id = "viewer"
permission_id = "p1"

[[bootstrap.user_roles]]
user_id = "alice"
role_id = "viewer"
"#;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn test_seeded_config_is_valid() {
        let cfg = parse(SEEDED);
        cfg.validate().unwrap();
        assert_eq!(cfg.bootstrap.clients.len(), 1);
        assert!(cfg.bootstrap.clients[0].active);
        assert!(cfg.bootstrap.user_roles[0].active);
    }

    #[test]
    fn test_invalid_log_level() {
        let mut cfg = AppConfig::default();
        cfg.logging.level = "loud".to_string();
        assert!(cfg.validate().unwrap_err().contains("logging.level"));
    }

    #[test]
    fn test_invalid_issuer() {
        let mut cfg = AppConfig::default();
        cfg.auth.issuer = "not a url".to_string();
        assert!(cfg.validate().unwrap_err().contains("auth config error"));
    }

    #[test]
    fn test_confidential_client_needs_secret() {
        let mut cfg = parse(SEEDED);
        cfg.bootstrap.clients[0].client_secret = None;
        assert!(cfg.validate().unwrap_err().contains("backend"));
    }

    #[test]
    fn test_public_client_rejects_secret() {
        let mut cfg = parse(SEEDED);
        cfg.bootstrap.clients[0].client_type = ClientType::Public;
        assert!(cfg.validate().unwrap_err().contains("must not have"));
    }

    #[test]
    fn test_relative_redirect_uri_rejected() {
        let mut cfg = parse(SEEDED);
        cfg.bootstrap.clients[0].redirect_uris = vec!["/cb".to_string()];
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_duplicate_client_rejected() {
        let mut cfg = parse(SEEDED);
        let copy = cfg.bootstrap.clients[0].clone();
        cfg.bootstrap.clients.push(copy);
        assert!(cfg.validate().unwrap_err().contains("duplicate"));
    }

    #[test]
    fn test_dangling_rbac_references_rejected() {
        let mut cfg = parse(SEEDED);
        cfg.bootstrap.user_roles[0].role_id = "ghost".to_string();
        assert!(cfg.validate().unwrap_err().contains("ghost"));

        let mut cfg = parse(SEEDED);
        cfg.bootstrap.role_permissions[0].permission_id = "ghost".to_string();
        assert!(cfg.validate().unwrap_err().contains("ghost"));
    }

    #[test]
    fn test_into_client_hashes_secret() {
        let cfg = parse(SEEDED);
        let client = cfg.bootstrap.clients[0].clone().into_client().unwrap();
        let hash = client.client_secret_hash.unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(warden_auth::crypto::verify_client_secret(
            "backend-secret-backend-secret",
            &hash
        ));
    }

    #[test]
    fn test_secret_not_serialized() {
        let cfg = parse(SEEDED);
        let rendered = serde_json::to_string(&cfg.bootstrap.clients[0]).unwrap();
        assert!(!rendered.contains("backend-secret"));
    }
}
