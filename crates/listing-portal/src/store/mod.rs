//! Storage seams for the portal.
//!
//! Each record family has its own trait so services only depend on what they touch. Two
//! backends implement all of them:
//! - [`postgres::PostgresStore`]: durable, every multi-row write runs in one transaction.
//! - [`memory::InMemoryStore`]: process-local, used by tests, the CLI demo and store-less
//!   development runs. A single write lock serializes mutations so multi-row writes are
//!   equally all-or-nothing.
//!
//! Every read goes to the backend; nothing is cached above it, so a committed approval is
//! visible to the very next permission check.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::{
    AccessRequest, AccessRequestView, ActionKind, AuditLogEntry, ImageSet, NewAccessRequest,
    NewAuditEntry, NewUser, Property, PropertyDetail, PropertyDraft, PropertyFilter, PropertyId,
    PropertySummary, RequestId, RequestStatus, User, UserId, UserSummary,
};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PostgresStore;

/// Error enumeration for storage failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("stored data could not be decoded: {0}")]
    Corrupt(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// How an update treats the listing's agent assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentPolicy {
    /// Write the draft's `agent_id`.
    Replace,
    /// Leave the stored `agent_id` untouched.
    Keep,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with `Conflict` when the email is already taken.
    async fn insert_user(&self, user: NewUser) -> StoreResult<User>;
    async fn find_user(&self, id: UserId) -> StoreResult<Option<User>>;
    /// `email` must already be normalized.
    async fn find_active_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    /// Active agents ordered by name.
    async fn list_active_agents(&self) -> StoreResult<Vec<UserSummary>>;
}

#[async_trait]
pub trait PropertyStore: Send + Sync {
    /// Inserts the row and its ordered images atomically.
    async fn insert_property(&self, draft: PropertyDraft, images: ImageSet)
        -> StoreResult<Property>;
    /// Updates the row and swaps the whole image set atomically.
    async fn update_property(
        &self,
        id: PropertyId,
        draft: PropertyDraft,
        assignment: AssignmentPolicy,
        images: ImageSet,
    ) -> StoreResult<Property>;
    /// Swaps the image set atomically without touching the row.
    async fn replace_images(&self, id: PropertyId, images: ImageSet) -> StoreResult<()>;
    /// Removes the row and its images, returning what was removed.
    async fn delete_property(&self, id: PropertyId) -> StoreResult<PropertyDetail>;
    async fn get_property(&self, id: PropertyId) -> StoreResult<Option<PropertyDetail>>;
    /// Available listings matching `filter`, newest first.
    async fn search_properties(&self, filter: &PropertyFilter)
        -> StoreResult<Vec<PropertySummary>>;
    /// Every listing regardless of status, newest first.
    async fn list_properties(&self) -> StoreResult<Vec<PropertySummary>>;
    /// Listings assigned to `agent_id`, newest first.
    async fn list_properties_for_agent(&self, agent_id: UserId)
        -> StoreResult<Vec<PropertySummary>>;
}

#[async_trait]
pub trait AccessRequestStore: Send + Sync {
    /// Fails with `Conflict` when the same user already has a pending request for the
    /// same action and target.
    async fn insert_access_request(&self, request: NewAccessRequest)
        -> StoreResult<AccessRequest>;
    /// Requests of one user, newest first.
    async fn list_access_requests_for_user(
        &self,
        user_id: UserId,
    ) -> StoreResult<Vec<AccessRequestView>>;
    /// All requests, newest first.
    async fn list_access_requests(&self) -> StoreResult<Vec<AccessRequestView>>;
    /// Moves a pending request to `status`. `NotFound` for unknown ids, `Conflict` when
    /// the request is no longer pending.
    async fn resolve_access_request(
        &self,
        id: RequestId,
        status: RequestStatus,
        responded_at: DateTime<Utc>,
    ) -> StoreResult<AccessRequest>;
    /// Whether an approved request covers `action` on `property_id`, either scoped to it
    /// or global.
    async fn has_approved_grant(
        &self,
        user_id: UserId,
        action: ActionKind,
        property_id: Option<PropertyId>,
    ) -> StoreResult<bool>;
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append_audit_entry(&self, entry: NewAuditEntry) -> StoreResult<AuditLogEntry>;
    /// Most recent entries first.
    async fn list_audit_entries(&self, limit: usize) -> StoreResult<Vec<AuditLogEntry>>;
}

/// Everything the portal needs from one backend.
#[async_trait]
pub trait PortalStore: UserStore + PropertyStore + AccessRequestStore + AuditStore {
    async fn health_check(&self) -> StoreResult<()>;
    fn backend_name(&self) -> &'static str;
}
