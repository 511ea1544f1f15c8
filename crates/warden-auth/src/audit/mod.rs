//! Security event audit emission.
//!
//! Every terminal outcome of a protocol operation (success or failure)
//! produces exactly one [`AuditEvent`]. The core only emits; where events go
//! is decided by the [`AuditSink`] the host wires in.
//!
//! - [`TracingAuditSink`] writes structured records to the `warden::audit`
//!   tracing target
//! - [`MemoryAuditSink`] collects events for inspection in tests
//! - [`NoopAuditSink`] drops them

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::error::AuthError;

/// Tracing target for audit records.
pub const AUDIT_TARGET: &str = "warden::audit";

// =============================================================================
// Event Types
// =============================================================================

/// Who performed the audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActorType {
    User,
    Client,
    System,
}

/// Audited protocol actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    AuthorizationCodeIssued,
    AuthorizationFailed,
    LoginRequired,
    ConsentRequired,
    ConsentGranted,
    ConsentDenied,
    ConsentRevoked,
    TokenIssued,
    TokenRefreshed,
    TokenRequestFailed,
    TokenIntrospected,
    TokenRevoked,
    CleanupCompleted,
}

impl AuditAction {
    /// Returns the stable wire name of the action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthorizationCodeIssued => "AUTHORIZATION_CODE_ISSUED",
            Self::AuthorizationFailed => "AUTHORIZATION_FAILED",
            Self::LoginRequired => "LOGIN_REQUIRED",
            Self::ConsentRequired => "CONSENT_REQUIRED",
            Self::ConsentGranted => "CONSENT_GRANTED",
            Self::ConsentDenied => "CONSENT_DENIED",
            Self::ConsentRevoked => "CONSENT_REVOKED",
            Self::TokenIssued => "TOKEN_ISSUED",
            Self::TokenRefreshed => "TOKEN_REFRESHED",
            Self::TokenRequestFailed => "TOKEN_REQUEST_FAILED",
            Self::TokenIntrospected => "TOKEN_INTROSPECTED",
            Self::TokenRevoked => "TOKEN_REVOKED",
            Self::CleanupCompleted => "CLEANUP_COMPLETED",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A write-once audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub actor_type: ActorType,

    /// User id, client id, or a fixed system name.
    pub actor_id: String,

    pub action: AuditAction,

    /// What was acted on, e.g. `client:app` or `token:<jti>`.
    pub resource: String,

    pub success: bool,

    /// OAuth error code for failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,

    #[serde(default)]
    pub metadata: Map<String, Value>,

    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl AuditEvent {
    /// Starts a builder for a successful event.
    #[must_use]
    pub fn builder(action: AuditAction) -> AuditEventBuilder {
        AuditEventBuilder::new(action)
    }
}

/// Builder for [`AuditEvent`].
#[derive(Debug, Clone)]
pub struct AuditEventBuilder {
    action: AuditAction,
    actor_type: ActorType,
    actor_id: String,
    resource: String,
    success: bool,
    error_code: Option<String>,
    metadata: Map<String, Value>,
}

impl AuditEventBuilder {
    fn new(action: AuditAction) -> Self {
        Self {
            action,
            actor_type: ActorType::System,
            actor_id: "warden".to_string(),
            resource: String::new(),
            success: true,
            error_code: None,
            metadata: Map::new(),
        }
    }

    /// Set the actor as a user.
    #[must_use]
    pub fn user(mut self, id: impl Into<String>) -> Self {
        self.actor_type = ActorType::User;
        self.actor_id = id.into();
        self
    }

    /// Set the actor as a client.
    #[must_use]
    pub fn client(mut self, id: impl Into<String>) -> Self {
        self.actor_type = ActorType::Client;
        self.actor_id = id.into();
        self
    }

    #[must_use]
    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = resource.into();
        self
    }

    /// Mark the event failed with the error's OAuth code.
    #[must_use]
    pub fn failure(mut self, error: &AuthError) -> Self {
        self.success = false;
        self.error_code = Some(error.oauth_error_code().to_string());
        self
    }

    /// Mark the event failed with an explicit code.
    #[must_use]
    pub fn failure_code(mut self, code: impl Into<String>) -> Self {
        self.success = false;
        self.error_code = Some(code.into());
        self
    }

    /// Add a metadata entry.
    #[must_use]
    pub fn meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    #[must_use]
    pub fn build(self) -> AuditEvent {
        AuditEvent {
            actor_type: self.actor_type,
            actor_id: self.actor_id,
            action: self.action,
            resource: self.resource,
            success: self.success,
            error_code: self.error_code,
            metadata: self.metadata,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

// =============================================================================
// Sinks
// =============================================================================

/// Destination for audit events.
///
/// Emission never fails the audited operation; sinks handle their own errors.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Records one event.
    async fn emit(&self, event: AuditEvent);
}

/// Writes audit events as structured tracing records.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn emit(&self, event: AuditEvent) {
        let metadata = Value::Object(event.metadata.clone());
        if event.success {
            tracing::info!(
                target: AUDIT_TARGET,
                action = %event.action,
                actor_type = ?event.actor_type,
                actor_id = %event.actor_id,
                resource = %event.resource,
                success = true,
                metadata = %metadata,
                "audit"
            );
        } else {
            tracing::warn!(
                target: AUDIT_TARGET,
                action = %event.action,
                actor_type = ?event.actor_type,
                actor_id = %event.actor_id,
                resource = %event.resource,
                success = false,
                error_code = event.error_code.as_deref().unwrap_or(""),
                metadata = %metadata,
                "audit"
            );
        }
    }
}

/// Discards audit events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAuditSink;

#[async_trait]
impl AuditSink for NoopAuditSink {
    async fn emit(&self, _event: AuditEvent) {}
}

/// Keeps audit events in memory.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the recorded actions in order.
    #[must_use]
    pub fn actions(&self) -> Vec<AuditAction> {
        self.events().into_iter().map(|e| e.action).collect()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn emit(&self, event: AuditEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
