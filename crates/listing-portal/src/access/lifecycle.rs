use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use super::{require_admin, require_agent};
use crate::audit::AuditRecorder;
use crate::domain::validation::non_blank;
use crate::domain::{
    AccessRequest, AccessRequestView, ActionKind, AuditVerb, EntityKind, Identity,
    NewAccessRequest, PropertyId, RequestId, RequestStatus, Resolution, ValidationErrors,
};
use crate::error::ServiceError;
use crate::store::{AccessRequestStore, AuditStore, PropertyStore, StoreError};

/// Submission of a new access request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestAccessPayload {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub property_id: Option<i64>,
    #[serde(default)]
    pub justification: Option<String>,
}

/// Creates, lists and resolves access requests.
pub struct AccessRequestService<S> {
    store: Arc<S>,
    audit: AuditRecorder<S>,
}

impl<S> AccessRequestService<S>
where
    S: AccessRequestStore + PropertyStore + AuditStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        let audit = AuditRecorder::new(store.clone());
        Self { store, audit }
    }

    /// Files a pending request for the calling agent.
    pub async fn create(
        &self,
        caller: &Identity,
        payload: RequestAccessPayload,
    ) -> Result<AccessRequest, ServiceError> {
        require_agent(caller)?;

        let mut errors = ValidationErrors::new();
        let action = match payload.action.as_deref().map(str::parse::<ActionKind>) {
            Some(Ok(action)) => Some(action),
            Some(Err(err)) => {
                errors.push("action", err.to_string());
                None
            }
            None => {
                errors.push("action", "action is required");
                None
            }
        };
        let justification = non_blank(payload.justification);
        if justification.is_none() {
            errors.push("justification", "justification is required");
        }
        let (Some(action), Some(justification)) = (action, justification) else {
            return Err(errors.into());
        };

        let property_id = payload.property_id.map(PropertyId);
        if let Some(id) = property_id {
            let exists = self
                .store
                .get_property(id)
                .await
                .map_err(ServiceError::Storage)?
                .is_some();
            if !exists {
                return Err(ServiceError::not_found(format!("property {id}")));
            }
        }

        let request = self
            .store
            .insert_access_request(NewAccessRequest {
                user_id: caller.id,
                action,
                property_id,
                justification,
            })
            .await
            .map_err(|err| match err {
                StoreError::Conflict(_) => ServiceError::DuplicatePending,
                other => ServiceError::from(other),
            })?;

        tracing::info!(
            request_id = %request.id,
            user_id = %caller.id,
            action = action.as_str(),
            property_id = ?property_id,
            "access request filed"
        );
        self.audit
            .record(
                caller.id,
                AuditVerb::RequestAccess,
                EntityKind::AccessRequest,
                Some(request.id.0),
                Some(json!({
                    "action": action.as_str(),
                    "property_id": property_id,
                })),
            )
            .await;

        Ok(request)
    }

    /// The caller's own requests, newest first.
    pub async fn list_for_user(
        &self,
        caller: &Identity,
    ) -> Result<Vec<AccessRequestView>, ServiceError> {
        self.store
            .list_access_requests_for_user(caller.id)
            .await
            .map_err(ServiceError::Storage)
    }

    pub async fn list_all(
        &self,
        caller: &Identity,
    ) -> Result<Vec<AccessRequestView>, ServiceError> {
        require_admin(caller)?;
        self.store
            .list_access_requests()
            .await
            .map_err(ServiceError::Storage)
    }

    /// Applies an admin decision to a pending request. Requests are resolved once; a
    /// second attempt fails with `AlreadyResolved` and is audited as refused.
    pub async fn resolve(
        &self,
        caller: &Identity,
        id: RequestId,
        target: RequestStatus,
    ) -> Result<AccessRequest, ServiceError> {
        require_admin(caller)?;
        let resolution = Resolution::try_from(target).map_err(|_| {
            ValidationErrors::single("status", "status must be 'approved' or 'rejected'")
        })?;

        let request = match self
            .store
            .resolve_access_request(id, resolution.status(), Utc::now())
            .await
        {
            Ok(request) => request,
            Err(StoreError::NotFound(_)) => {
                return Err(ServiceError::not_found(format!("access request {id}")))
            }
            Err(StoreError::Conflict(_)) => {
                tracing::info!(
                    request_id = %id,
                    admin_id = %caller.id,
                    attempted = resolution.status().as_str(),
                    "access request already resolved"
                );
                self.audit
                    .record(
                        caller.id,
                        AuditVerb::ResolveRefused,
                        EntityKind::AccessRequest,
                        Some(id.0),
                        Some(json!({ "attempted": resolution.status().as_str() })),
                    )
                    .await;
                return Err(ServiceError::AlreadyResolved);
            }
            Err(other) => return Err(ServiceError::Storage(other)),
        };

        let verb = match resolution {
            Resolution::Approved => AuditVerb::ApproveRequest,
            Resolution::Rejected => AuditVerb::RejectRequest,
        };
        tracing::info!(
            request_id = %request.id,
            admin_id = %caller.id,
            status = request.status.as_str(),
            "access request resolved"
        );
        self.audit
            .record(
                caller.id,
                verb,
                EntityKind::AccessRequest,
                Some(request.id.0),
                Some(json!({
                    "user_id": request.user_id,
                    "action": request.action.as_str(),
                    "property_id": request.property_id,
                })),
            )
            .await;

        Ok(request)
    }
}
