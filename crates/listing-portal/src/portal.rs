//! Wires the services over one store and resolves callers from request headers.

use std::sync::Arc;

use axum::http::HeaderMap;

use crate::access::AccessRequestService;
use crate::auth::{AuthService, CredentialVerifier, PasswordHasher};
use crate::config::AuthConfig;
use crate::domain::Identity;
use crate::error::ServiceError;
use crate::properties::PropertyService;
use crate::store::{PortalStore, StoreResult};

pub struct Portal<S> {
    store: Arc<S>,
    auth: AuthService<S>,
    requests: AccessRequestService<S>,
    properties: PropertyService<S>,
}

impl<S> Portal<S>
where
    S: PortalStore + 'static,
{
    pub fn new(store: Arc<S>, verifier: CredentialVerifier, hasher: PasswordHasher) -> Self {
        Self {
            auth: AuthService::new(store.clone(), verifier, hasher),
            requests: AccessRequestService::new(store.clone()),
            properties: PropertyService::new(store.clone()),
            store,
        }
    }

    pub fn from_config(store: Arc<S>, config: &AuthConfig) -> Self {
        Self::new(
            store,
            CredentialVerifier::from_config(config),
            PasswordHasher::new(config.bcrypt_cost),
        )
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn auth(&self) -> &AuthService<S> {
        &self.auth
    }

    pub fn requests(&self) -> &AccessRequestService<S> {
        &self.requests
    }

    pub fn properties(&self) -> &PropertyService<S> {
        &self.properties
    }

    /// Resolves the bearer credential, failing with `Unauthorized` when it is missing or
    /// does not verify.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Identity, ServiceError> {
        self.auth
            .verifier()
            .authenticate(headers)
            .ok_or(ServiceError::Unauthorized)
    }

    pub async fn health_check(&self) -> StoreResult<()> {
        self.store.health_check().await
    }
}
