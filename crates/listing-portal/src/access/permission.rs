use std::sync::Arc;

use crate::domain::{ActionKind, Identity, PropertyId, Role};
use crate::error::ServiceError;
use crate::store::AccessRequestStore;

/// Decides whether an identity may perform an action, optionally scoped to one listing.
///
/// Every call reads the store, so an approval is effective on the very next check.
pub struct PermissionEvaluator<S> {
    store: Arc<S>,
}

impl<S> Clone for PermissionEvaluator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S> PermissionEvaluator<S>
where
    S: AccessRequestStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Admins always pass; agents pass when an approved request for `action` is either
    /// global or scoped to `property_id`. Missing identities and store failures deny.
    pub async fn can_perform(
        &self,
        identity: Option<&Identity>,
        action: ActionKind,
        property_id: Option<PropertyId>,
    ) -> bool {
        let Some(identity) = identity else {
            return false;
        };

        match identity.role {
            Role::Admin => true,
            Role::Agent => match self
                .store
                .has_approved_grant(identity.id, action, property_id)
                .await
            {
                Ok(granted) => {
                    if !granted {
                        tracing::debug!(
                            user_id = %identity.id,
                            action = action.as_str(),
                            property_id = ?property_id,
                            "permission denied: no approved request"
                        );
                    }
                    granted
                }
                Err(err) => {
                    tracing::error!(
                        error = %err,
                        user_id = %identity.id,
                        action = action.as_str(),
                        property_id = ?property_id,
                        "permission check failed; denying"
                    );
                    false
                }
            },
        }
    }

    /// [`Self::can_perform`] as a `Forbidden` error.
    pub async fn ensure(
        &self,
        identity: &Identity,
        action: ActionKind,
        property_id: Option<PropertyId>,
    ) -> Result<(), ServiceError> {
        if self.can_perform(Some(identity), action, property_id).await {
            return Ok(());
        }
        let scope = match property_id {
            Some(id) => format!("property {id}"),
            None => "any property".to_string(),
        };
        Err(ServiceError::Forbidden(format!(
            "no approved '{}' access for {scope}",
            action.as_str()
        )))
    }
}
