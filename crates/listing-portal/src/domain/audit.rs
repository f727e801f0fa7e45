use chrono::{DateTime, Utc};
use serde::Serialize;

use super::identity::UserId;

/// Verbs recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditVerb {
    Create,
    Update,
    ReplaceImages,
    Delete,
    RequestAccess,
    ApproveRequest,
    RejectRequest,
    /// A decision on a request that was already resolved.
    ResolveRefused,
    ProvisionUser,
}

impl AuditVerb {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditVerb::Create => "create",
            AuditVerb::Update => "update",
            AuditVerb::ReplaceImages => "replace_images",
            AuditVerb::Delete => "delete",
            AuditVerb::RequestAccess => "request_access",
            AuditVerb::ApproveRequest => "approve_request",
            AuditVerb::RejectRequest => "reject_request",
            AuditVerb::ResolveRefused => "resolve_refused",
            AuditVerb::ProvisionUser => "provision_user",
        }
    }
}

/// Entity families that audit entries point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Property,
    AccessRequest,
    User,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Property => "property",
            EntityKind::AccessRequest => "access_request",
            EntityKind::User => "user",
        }
    }
}

/// Append payload handed to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEntry {
    pub actor_id: UserId,
    pub verb: AuditVerb,
    pub entity_kind: EntityKind,
    pub entity_id: Option<i64>,
    pub detail: Option<serde_json::Value>,
}

/// Persisted, immutable audit entry. Verb and entity kind are kept as stored labels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditLogEntry {
    pub id: i64,
    pub actor_id: UserId,
    pub verb: String,
    pub entity_kind: String,
    pub entity_id: Option<i64>,
    pub detail: Option<serde_json::Value>,
    pub recorded_at: DateTime<Utc>,
}
