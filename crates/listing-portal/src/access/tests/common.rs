use std::sync::Arc;

use crate::access::{AccessRequestService, PermissionEvaluator, RequestAccessPayload};
use crate::domain::{
    ActionKind, Identity, ImageSet, NewUser, PropertyDraft, PropertyId, PropertyKind,
    PropertyStatus, RequestId, RequestStatus, Role,
};
use crate::store::{InMemoryStore, PropertyStore, UserStore};

pub(super) struct Fixture {
    pub(super) store: Arc<InMemoryStore>,
    pub(super) requests: AccessRequestService<InMemoryStore>,
    pub(super) evaluator: PermissionEvaluator<InMemoryStore>,
    pub(super) admin: Identity,
    pub(super) agent: Identity,
    pub(super) other_agent: Identity,
}

pub(super) async fn fixture() -> Fixture {
    let store = Arc::new(InMemoryStore::new());
    let admin = provision(&store, "Admin", "admin@agency.test", Role::Admin).await;
    let agent = provision(&store, "Amine", "amine@agency.test", Role::Agent).await;
    let other_agent = provision(&store, "Nour", "nour@agency.test", Role::Agent).await;

    Fixture {
        requests: AccessRequestService::new(store.clone()),
        evaluator: PermissionEvaluator::new(store.clone()),
        store,
        admin,
        agent,
        other_agent,
    }
}

async fn provision(store: &InMemoryStore, name: &str, email: &str, role: Role) -> Identity {
    store
        .insert_user(NewUser {
            name: name.to_string(),
            email: email.to_string(),
            role,
            password_hash: "$2b$04$unused".to_string(),
        })
        .await
        .expect("user inserts")
        .identity()
}

pub(super) async fn listing(store: &InMemoryStore, title: &str) -> PropertyId {
    store
        .insert_property(
            PropertyDraft {
                title: title.to_string(),
                description: None,
                kind: PropertyKind::Rental,
                price: 1_200.0,
                surface: Some(85.0),
                address: None,
                city: Some("Sousse".to_string()),
                status: PropertyStatus::Available,
                agent_id: None,
            },
            ImageSet::default(),
        )
        .await
        .expect("property inserts")
        .id
}

pub(super) fn payload(
    action: &str,
    property_id: Option<PropertyId>,
    justification: &str,
) -> RequestAccessPayload {
    RequestAccessPayload {
        action: Some(action.to_string()),
        property_id: property_id.map(|id| id.0),
        justification: Some(justification.to_string()),
    }
}

impl Fixture {
    /// Files a request as `agent` and resolves it as admin.
    pub(super) async fn grant(
        &self,
        agent: &Identity,
        action: ActionKind,
        property_id: Option<PropertyId>,
        status: RequestStatus,
    ) -> RequestId {
        let request = self
            .requests
            .create(agent, payload(action.as_str(), property_id, "Client mandate"))
            .await
            .expect("request files");
        self.requests
            .resolve(&self.admin, request.id, status)
            .await
            .expect("request resolves");
        request.id
    }
}
