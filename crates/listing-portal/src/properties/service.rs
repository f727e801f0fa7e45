use std::sync::Arc;

use crate::access::{require_admin, require_agent, PermissionEvaluator};
use crate::audit::AuditRecorder;
use crate::domain::{
    ActionKind, AuditVerb, EntityKind, Identity, ImageSet, Property, PropertyDetail,
    PropertyDraft, PropertyFilter, PropertyId, PropertySummary, Role, ValidationErrors,
};
use crate::error::ServiceError;
use crate::store::{
    AccessRequestStore, AssignmentPolicy, AuditStore, PropertyStore, StoreError, UserStore,
};

use super::validation::PropertyPayload;

/// Listing reads plus create/update/replace-images/delete gated by the permission
/// evaluator. Each successful write leaves one audit entry.
pub struct PropertyService<S> {
    store: Arc<S>,
    permissions: PermissionEvaluator<S>,
    audit: AuditRecorder<S>,
}

impl<S> PropertyService<S>
where
    S: UserStore + PropertyStore + AccessRequestStore + AuditStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self {
            permissions: PermissionEvaluator::new(store.clone()),
            audit: AuditRecorder::new(store.clone()),
            store,
        }
    }

    pub fn permissions(&self) -> &PermissionEvaluator<S> {
        &self.permissions
    }

    /// Requires a global `add` grant. Listings created by an agent are assigned to them.
    pub async fn create(
        &self,
        caller: &Identity,
        payload: PropertyPayload,
    ) -> Result<Property, ServiceError> {
        self.permissions
            .ensure(caller, ActionKind::Add, None)
            .await?;
        let (mut draft, images) = payload.validate()?;
        match caller.role {
            Role::Agent => draft.agent_id = Some(caller.id),
            Role::Admin => self.check_assignment(&draft).await?,
        }

        let image_count = images.len();
        let property = self
            .store
            .insert_property(draft, images)
            .await
            .map_err(ServiceError::Storage)?;

        self.record(caller, AuditVerb::Create, &property, image_count)
            .await;
        Ok(property)
    }

    /// Requires `edit` on `id`. Replaces the row and the whole image set; agents cannot
    /// change the assignment.
    pub async fn update(
        &self,
        caller: &Identity,
        id: PropertyId,
        payload: PropertyPayload,
    ) -> Result<Property, ServiceError> {
        self.permissions
            .ensure(caller, ActionKind::Edit, Some(id))
            .await?;
        let (draft, images) = payload.validate()?;
        let assignment = match caller.role {
            Role::Agent => AssignmentPolicy::Keep,
            Role::Admin => {
                self.check_assignment(&draft).await?;
                AssignmentPolicy::Replace
            }
        };

        let image_count = images.len();
        let property = self
            .store
            .update_property(id, draft, assignment, images)
            .await
            .map_err(|err| not_found_as(err, id))?;

        self.record(caller, AuditVerb::Update, &property, image_count)
            .await;
        Ok(property)
    }

    /// Requires `edit` on `id`. Blank URLs are dropped; an empty list clears the images.
    pub async fn replace_images(
        &self,
        caller: &Identity,
        id: PropertyId,
        urls: Vec<String>,
    ) -> Result<PropertyDetail, ServiceError> {
        self.permissions
            .ensure(caller, ActionKind::Edit, Some(id))
            .await?;

        self.store
            .replace_images(id, ImageSet::from_urls(urls))
            .await
            .map_err(|err| not_found_as(err, id))?;

        let detail = self
            .store
            .get_property(id)
            .await
            .map_err(ServiceError::Storage)?
            .ok_or_else(|| ServiceError::not_found(format!("property {id}")))?;

        self.record(
            caller,
            AuditVerb::ReplaceImages,
            &detail.property,
            detail.images.len(),
        )
        .await;
        Ok(detail)
    }

    /// Requires `delete` on `id`. Images go with the listing.
    pub async fn delete(&self, caller: &Identity, id: PropertyId) -> Result<(), ServiceError> {
        self.permissions
            .ensure(caller, ActionKind::Delete, Some(id))
            .await?;

        let removed = self
            .store
            .delete_property(id)
            .await
            .map_err(|err| not_found_as(err, id))?;

        self.record(
            caller,
            AuditVerb::Delete,
            &removed.property,
            removed.images.len(),
        )
        .await;
        Ok(())
    }

    /// Public search over available listings.
    pub async fn search(
        &self,
        filter: &PropertyFilter,
    ) -> Result<Vec<PropertySummary>, ServiceError> {
        self.store
            .search_properties(filter)
            .await
            .map_err(ServiceError::Storage)
    }

    pub async fn detail(&self, id: PropertyId) -> Result<PropertyDetail, ServiceError> {
        self.store
            .get_property(id)
            .await
            .map_err(ServiceError::Storage)?
            .ok_or_else(|| ServiceError::not_found(format!("property {id}")))
    }

    pub async fn list_all(&self, caller: &Identity) -> Result<Vec<PropertySummary>, ServiceError> {
        require_admin(caller)?;
        self.store
            .list_properties()
            .await
            .map_err(ServiceError::Storage)
    }

    pub async fn list_assigned(
        &self,
        caller: &Identity,
    ) -> Result<Vec<PropertySummary>, ServiceError> {
        require_agent(caller)?;
        self.store
            .list_properties_for_agent(caller.id)
            .await
            .map_err(ServiceError::Storage)
    }

    /// Admin assignments must point at an active agent.
    async fn check_assignment(&self, draft: &PropertyDraft) -> Result<(), ServiceError> {
        let Some(agent_id) = draft.agent_id else {
            return Ok(());
        };
        let user = self
            .store
            .find_user(agent_id)
            .await
            .map_err(ServiceError::Storage)?;
        match user {
            Some(user) if user.active && user.role == Role::Agent => Ok(()),
            _ => Err(ValidationErrors::single(
                "agent_id",
                format!("user {agent_id} is not an active agent"),
            )
            .into()),
        }
    }

    async fn record(
        &self,
        caller: &Identity,
        verb: AuditVerb,
        property: &Property,
        image_count: usize,
    ) {
        tracing::info!(
            user_id = %caller.id,
            property_id = %property.id,
            verb = verb.as_str(),
            "property mutated"
        );
        self.audit
            .record(
                caller.id,
                verb,
                EntityKind::Property,
                Some(property.id.0),
                Some(property.audit_snapshot(image_count)),
            )
            .await;
    }
}

fn not_found_as(err: StoreError, id: PropertyId) -> ServiceError {
    match err {
        StoreError::NotFound(_) => ServiceError::not_found(format!("property {id}")),
        other => ServiceError::Storage(other),
    }
}
