//! In-memory implementation of the portal store.
//!
//! All tables live in one [`MemoryState`] behind a single `tokio::sync::RwLock`. Mutations
//! take the write lock for their whole duration, which gives the same all-or-nothing
//! behaviour the Postgres backend gets from transactions. State is lost on restart.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{
    AccessRequestStore, AssignmentPolicy, AuditStore, PortalStore, PropertyStore, StoreError,
    StoreResult, UserStore,
};
use crate::domain::{
    AccessRequest, AccessRequestView, ActionKind, AuditLogEntry, ImageSet, NewAccessRequest,
    NewAuditEntry, NewUser, Property, PropertyDetail, PropertyDraft, PropertyFilter, PropertyId,
    PropertyImage, PropertyStatus, PropertySummary, RequestId, RequestStatus, Role, User, UserId,
    UserSummary,
};

#[derive(Debug, Default)]
struct MemoryState {
    users: BTreeMap<UserId, User>,
    properties: BTreeMap<PropertyId, Property>,
    images: BTreeMap<PropertyId, Vec<PropertyImage>>,
    requests: BTreeMap<RequestId, AccessRequest>,
    audit: Vec<AuditLogEntry>,
    sequences: Sequences,
}

/// Per-table id counters; ids start at 1 like SQL serial columns.
#[derive(Debug, Default)]
struct Sequences {
    user: i64,
    property: i64,
    image: i64,
    request: i64,
    audit: i64,
}

impl Sequences {
    fn next(counter: &mut i64) -> i64 {
        *counter += 1;
        *counter
    }
}

impl MemoryState {
    fn install_images(&mut self, id: PropertyId, images: &ImageSet) {
        let rows = images
            .entries()
            .map(|(url, is_primary, position)| PropertyImage {
                id: Sequences::next(&mut self.sequences.image),
                url: url.to_string(),
                is_primary,
                position,
            })
            .collect();
        self.images.insert(id, rows);
    }

    fn agent_name(&self, agent_id: Option<UserId>) -> Option<String> {
        agent_id
            .and_then(|id| self.users.get(&id))
            .map(|user| user.name.clone())
    }

    fn primary_image(&self, id: PropertyId) -> Option<String> {
        self.images
            .get(&id)
            .and_then(|images| images.iter().find(|image| image.is_primary))
            .map(|image| image.url.clone())
    }

    fn summary(&self, property: &Property) -> PropertySummary {
        PropertySummary::from_property(
            property,
            self.agent_name(property.agent_id),
            self.primary_image(property.id),
        )
    }

    fn detail(&self, property: &Property) -> PropertyDetail {
        let mut images = self.images.get(&property.id).cloned().unwrap_or_default();
        images.sort_by_key(|image| (!image.is_primary, image.position));
        PropertyDetail {
            property: property.clone(),
            agent_name: self.agent_name(property.agent_id),
            images,
        }
    }

    fn summaries<'a>(&self, properties: impl Iterator<Item = &'a Property>) -> Vec<PropertySummary> {
        let mut rows: Vec<&Property> = properties.collect();
        rows.sort_by_key(|property| (Reverse(property.created_at), Reverse(property.id)));
        rows.into_iter().map(|property| self.summary(property)).collect()
    }

    fn request_view(&self, request: &AccessRequest) -> AccessRequestView {
        let requester = self.users.get(&request.user_id);
        AccessRequestView {
            request: request.clone(),
            requester_name: requester.map(|user| user.name.clone()).unwrap_or_default(),
            requester_email: requester.map(|user| user.email.clone()).unwrap_or_default(),
            property_title: request
                .property_id
                .and_then(|id| self.properties.get(&id))
                .map(|property| property.title.clone()),
        }
    }

    fn request_views<'a>(
        &self,
        requests: impl Iterator<Item = &'a AccessRequest>,
    ) -> Vec<AccessRequestView> {
        let mut rows: Vec<&AccessRequest> = requests.collect();
        rows.sort_by_key(|request| (Reverse(request.created_at), Reverse(request.id)));
        rows.into_iter().map(|request| self.request_view(request)).collect()
    }
}

/// Process-local store.
pub struct InMemoryStore {
    state: RwLock<MemoryState>,
    audit_available: AtomicBool,
    requests_available: AtomicBool,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            audit_available: AtomicBool::new(true),
            requests_available: AtomicBool::new(true),
        }
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates an audit sink outage: while unavailable, audit appends fail with
    /// [`StoreError::Unavailable`] and every other table keeps working.
    pub fn set_audit_available(&self, available: bool) {
        self.audit_available.store(available, Ordering::Release);
    }

    /// Simulates an outage of the access request table: every request read and write
    /// fails with [`StoreError::Unavailable`].
    pub fn set_requests_available(&self, available: bool) {
        self.requests_available.store(available, Ordering::Release);
    }

    fn requests_online(&self) -> StoreResult<()> {
        if self.requests_available.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("access requests offline".to_string()))
        }
    }

    /// Number of image rows across all listings; lets callers check nothing is orphaned.
    pub async fn image_row_count(&self) -> usize {
        let state = self.state.read().await;
        state.images.values().map(Vec::len).sum()
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let mut state = self.state.write().await;
        if state.users.values().any(|existing| existing.email == user.email) {
            return Err(StoreError::Conflict(format!("email {} already registered", user.email)));
        }
        let id = UserId(Sequences::next(&mut state.sequences.user));
        let record = User {
            id,
            name: user.name,
            email: user.email,
            role: user.role,
            active: true,
            password_hash: user.password_hash,
            created_at: Utc::now(),
        };
        state.users.insert(id, record.clone());
        Ok(record)
    }

    async fn find_user(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn find_active_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self
            .find_user_by_email(email)
            .await?
            .filter(|user| user.active))
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|user| user.email == email)
            .cloned())
    }

    async fn list_active_agents(&self) -> StoreResult<Vec<UserSummary>> {
        let state = self.state.read().await;
        let mut agents: Vec<UserSummary> = state
            .users
            .values()
            .filter(|user| user.active && user.role == Role::Agent)
            .map(User::summary)
            .collect();
        agents.sort_by(|left, right| left.name.cmp(&right.name));
        Ok(agents)
    }
}

#[async_trait]
impl PropertyStore for InMemoryStore {
    async fn insert_property(
        &self,
        draft: PropertyDraft,
        images: ImageSet,
    ) -> StoreResult<Property> {
        let mut state = self.state.write().await;
        if let Some(agent_id) = draft.agent_id {
            if !state.users.contains_key(&agent_id) {
                return Err(StoreError::NotFound(format!("agent {agent_id}")));
            }
        }
        let id = PropertyId(Sequences::next(&mut state.sequences.property));
        let property = draft.into_property(id, Utc::now());
        state.properties.insert(id, property.clone());
        state.install_images(id, &images);
        Ok(property)
    }

    async fn update_property(
        &self,
        id: PropertyId,
        mut draft: PropertyDraft,
        assignment: AssignmentPolicy,
        images: ImageSet,
    ) -> StoreResult<Property> {
        let mut state = self.state.write().await;
        let existing = state
            .properties
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("property {id}")))?;
        if assignment == AssignmentPolicy::Keep {
            draft.agent_id = existing.agent_id;
        }
        if let Some(agent_id) = draft.agent_id {
            if !state.users.contains_key(&agent_id) {
                return Err(StoreError::NotFound(format!("agent {agent_id}")));
            }
        }
        let property = draft.into_property(id, existing.created_at);
        state.properties.insert(id, property.clone());
        state.install_images(id, &images);
        Ok(property)
    }

    async fn replace_images(&self, id: PropertyId, images: ImageSet) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if !state.properties.contains_key(&id) {
            return Err(StoreError::NotFound(format!("property {id}")));
        }
        state.install_images(id, &images);
        Ok(())
    }

    async fn delete_property(&self, id: PropertyId) -> StoreResult<PropertyDetail> {
        let mut state = self.state.write().await;
        let property = state
            .properties
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("property {id}")))?;
        let detail = state.detail(&property);
        state.properties.remove(&id);
        state.images.remove(&id);
        Ok(detail)
    }

    async fn get_property(&self, id: PropertyId) -> StoreResult<Option<PropertyDetail>> {
        let state = self.state.read().await;
        Ok(state.properties.get(&id).map(|property| state.detail(property)))
    }

    async fn search_properties(
        &self,
        filter: &PropertyFilter,
    ) -> StoreResult<Vec<PropertySummary>> {
        let state = self.state.read().await;
        Ok(state.summaries(state.properties.values().filter(|property| {
            property.status == PropertyStatus::Available && filter.matches(property)
        })))
    }

    async fn list_properties(&self) -> StoreResult<Vec<PropertySummary>> {
        let state = self.state.read().await;
        Ok(state.summaries(state.properties.values()))
    }

    async fn list_properties_for_agent(
        &self,
        agent_id: UserId,
    ) -> StoreResult<Vec<PropertySummary>> {
        let state = self.state.read().await;
        Ok(state.summaries(
            state
                .properties
                .values()
                .filter(|property| property.agent_id == Some(agent_id)),
        ))
    }
}

#[async_trait]
impl AccessRequestStore for InMemoryStore {
    async fn insert_access_request(
        &self,
        request: NewAccessRequest,
    ) -> StoreResult<AccessRequest> {
        self.requests_online()?;
        let mut state = self.state.write().await;
        let duplicate = state.requests.values().any(|existing| {
            existing.status == RequestStatus::Pending
                && existing.same_key(request.user_id, request.action, request.property_id)
        });
        if duplicate {
            return Err(StoreError::Conflict("pending request exists".to_string()));
        }
        let id = RequestId(Sequences::next(&mut state.sequences.request));
        let record = AccessRequest {
            id,
            user_id: request.user_id,
            action: request.action,
            property_id: request.property_id,
            justification: request.justification,
            status: RequestStatus::Pending,
            created_at: Utc::now(),
            responded_at: None,
        };
        state.requests.insert(id, record.clone());
        Ok(record)
    }

    async fn list_access_requests_for_user(
        &self,
        user_id: UserId,
    ) -> StoreResult<Vec<AccessRequestView>> {
        self.requests_online()?;
        let state = self.state.read().await;
        Ok(state.request_views(
            state
                .requests
                .values()
                .filter(|request| request.user_id == user_id),
        ))
    }

    async fn list_access_requests(&self) -> StoreResult<Vec<AccessRequestView>> {
        self.requests_online()?;
        let state = self.state.read().await;
        Ok(state.request_views(state.requests.values()))
    }

    async fn resolve_access_request(
        &self,
        id: RequestId,
        status: RequestStatus,
        responded_at: DateTime<Utc>,
    ) -> StoreResult<AccessRequest> {
        self.requests_online()?;
        let mut state = self.state.write().await;
        let request = state
            .requests
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("access request {id}")))?;
        if request.status.is_terminal() {
            return Err(StoreError::Conflict(format!(
                "access request {id} already {}",
                request.status.as_str()
            )));
        }
        request.status = status;
        request.responded_at = Some(responded_at);
        Ok(request.clone())
    }

    async fn has_approved_grant(
        &self,
        user_id: UserId,
        action: ActionKind,
        property_id: Option<PropertyId>,
    ) -> StoreResult<bool> {
        self.requests_online()?;
        let state = self.state.read().await;
        Ok(state
            .requests
            .values()
            .any(|request| request.user_id == user_id && request.grants(action, property_id)))
    }
}

#[async_trait]
impl AuditStore for InMemoryStore {
    async fn append_audit_entry(&self, entry: NewAuditEntry) -> StoreResult<AuditLogEntry> {
        if !self.audit_available.load(Ordering::Acquire) {
            return Err(StoreError::Unavailable("audit log offline".to_string()));
        }
        let mut state = self.state.write().await;
        let record = AuditLogEntry {
            id: Sequences::next(&mut state.sequences.audit),
            actor_id: entry.actor_id,
            verb: entry.verb.as_str().to_string(),
            entity_kind: entry.entity_kind.as_str().to_string(),
            entity_id: entry.entity_id,
            detail: entry.detail,
            recorded_at: Utc::now(),
        };
        state.audit.push(record.clone());
        Ok(record)
    }

    async fn list_audit_entries(&self, limit: usize) -> StoreResult<Vec<AuditLogEntry>> {
        let state = self.state.read().await;
        Ok(state.audit.iter().rev().take(limit).cloned().collect())
    }
}

#[async_trait]
impl PortalStore for InMemoryStore {
    async fn health_check(&self) -> StoreResult<()> {
        self.requests_online()
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
