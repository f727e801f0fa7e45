//! Agent access requests and the permission checks they feed.
//!
//! Agents ask for `add`, `edit` or `delete` rights, either globally or for one listing.
//! An admin approves or rejects each request once; approved requests are the only source
//! of agent write access. Admins bypass the evaluator entirely.

pub mod lifecycle;
pub mod permission;

#[cfg(test)]
mod tests;

pub use lifecycle::{AccessRequestService, RequestAccessPayload};
pub use permission::PermissionEvaluator;

use crate::domain::{Identity, Role};
use crate::error::ServiceError;

pub fn require_admin(caller: &Identity) -> Result<(), ServiceError> {
    match caller.role {
        Role::Admin => Ok(()),
        Role::Agent => Err(ServiceError::forbidden("admin role required")),
    }
}

pub fn require_agent(caller: &Identity) -> Result<(), ServiceError> {
    match caller.role {
        Role::Agent => Ok(()),
        Role::Admin => Err(ServiceError::forbidden("agent role required")),
    }
}
