//! Core records of the listing portal: users, listings with their images, agent access
//! requests and audit entries.

pub mod access;
pub mod audit;
pub mod identity;
pub mod property;
pub mod validation;

pub use access::{
    AccessRequest, AccessRequestView, ActionKind, NewAccessRequest, RequestId, RequestStatus,
    Resolution,
};
pub use audit::{AuditLogEntry, AuditVerb, EntityKind, NewAuditEntry};
pub use identity::{
    normalize_email, Identity, NewUser, Role, UnknownValue, User, UserId, UserSummary,
};
pub use property::{
    ImageSet, Property, PropertyDetail, PropertyDraft, PropertyFilter, PropertyId, PropertyImage,
    PropertyKind, PropertyStatus, PropertySummary,
};
pub use validation::{FieldError, ValidationErrors};
