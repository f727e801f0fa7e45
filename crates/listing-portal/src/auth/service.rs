use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::password::PasswordHasher;
use super::token::CredentialVerifier;
use crate::access::require_admin;
use crate::audit::AuditRecorder;
use crate::domain::validation::non_blank;
use crate::domain::{
    normalize_email, AuditLogEntry, AuditVerb, EntityKind, Identity, NewUser, Role,
    UserSummary, ValidationErrors,
};
use crate::error::ServiceError;
use crate::store::{AuditStore, UserStore};

/// Shown for every failed login so callers cannot probe which emails exist.
const INVALID_CREDENTIALS: &str = "invalid email or password";

/// Upper bound for a single audit page.
pub const MAX_AUDIT_PAGE: usize = 500;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: Identity,
}

/// Account to create through the CLI or the startup bootstrap.
#[derive(Clone)]
pub struct Provisioning {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

/// Login, provisioning and the admin directory views.
pub struct AuthService<S> {
    store: Arc<S>,
    verifier: CredentialVerifier,
    hasher: PasswordHasher,
    audit: AuditRecorder<S>,
}

impl<S> AuthService<S>
where
    S: UserStore + AuditStore + 'static,
{
    pub fn new(store: Arc<S>, verifier: CredentialVerifier, hasher: PasswordHasher) -> Self {
        let audit = AuditRecorder::new(store.clone());
        Self {
            store,
            verifier,
            hasher,
            audit,
        }
    }

    pub fn verifier(&self) -> &CredentialVerifier {
        &self.verifier
    }

    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse, ServiceError> {
        let email = non_blank(request.email);
        let password = request.password.filter(|value| !value.is_empty());

        let (email, password) = match (email, password) {
            (Some(email), Some(password)) => (email, password),
            (email, password) => {
                let mut errors = ValidationErrors::new();
                if email.is_none() {
                    errors.push("email", "email is required");
                }
                if password.is_none() {
                    errors.push("password", "password is required");
                }
                return Err(errors.into());
            }
        };

        let user = self
            .store
            .find_active_user_by_email(&normalize_email(&email))
            .await
            .map_err(ServiceError::Storage)?;

        let Some(user) = user else {
            tracing::info!("login rejected: unknown or inactive account");
            return Err(ServiceError::Unauthorized);
        };
        if !self.hasher.verify(&password, &user.password_hash) {
            tracing::info!(user_id = %user.id, "login rejected: password mismatch");
            return Err(ServiceError::Unauthorized);
        }

        let identity = user.identity();
        let token = self
            .verifier
            .issue(&identity)
            .map_err(|err| ServiceError::Internal(err.to_string()))?;

        tracing::info!(user_id = %identity.id, role = %identity.role, "login succeeded");
        Ok(LoginResponse {
            token,
            user: identity,
        })
    }

    /// Creates an account. The email must not be registered yet.
    pub async fn provision(&self, request: Provisioning) -> Result<Identity, ServiceError> {
        let mut errors = ValidationErrors::new();
        let name = non_blank(Some(request.name)).unwrap_or_default();
        if name.is_empty() {
            errors.push("name", "name is required");
        }
        let email = normalize_email(&request.email);
        if !email.contains('@') {
            errors.push("email", "a valid email is required");
        }
        if request.password.is_empty() {
            errors.push("password", "password is required");
        }
        errors.into_result(())?;

        if self
            .store
            .find_user_by_email(&email)
            .await
            .map_err(ServiceError::Storage)?
            .is_some()
        {
            return Err(ServiceError::Conflict(format!("email {email} is already registered")));
        }

        let password_hash = self
            .hasher
            .hash(&request.password)
            .map_err(|err| ServiceError::Internal(format!("failed to hash password: {err}")))?;

        let user = self
            .store
            .insert_user(NewUser {
                name,
                email,
                role: request.role,
                password_hash,
            })
            .await?;

        self.audit
            .record(
                user.id,
                AuditVerb::ProvisionUser,
                EntityKind::User,
                Some(user.id.0),
                Some(json!({ "email": user.email, "role": user.role.as_str() })),
            )
            .await;

        Ok(user.identity())
    }

    /// Provisions the account unless its email already exists. Returns the identity and
    /// whether it was created.
    pub async fn ensure_user(
        &self,
        request: Provisioning,
    ) -> Result<(Identity, bool), ServiceError> {
        let email = normalize_email(&request.email);
        if let Some(existing) = self
            .store
            .find_user_by_email(&email)
            .await
            .map_err(ServiceError::Storage)?
        {
            return Ok((existing.identity(), false));
        }
        let identity = self.provision(request).await?;
        Ok((identity, true))
    }

    pub async fn list_agents(&self, caller: &Identity) -> Result<Vec<UserSummary>, ServiceError> {
        require_admin(caller)?;
        self.store
            .list_active_agents()
            .await
            .map_err(ServiceError::Storage)
    }

    /// Newest entries first; `limit` is clamped to `1..=MAX_AUDIT_PAGE`.
    pub async fn list_audit(
        &self,
        caller: &Identity,
        limit: usize,
    ) -> Result<Vec<AuditLogEntry>, ServiceError> {
        require_admin(caller)?;
        self.store
            .list_audit_entries(limit.clamp(1, MAX_AUDIT_PAGE))
            .await
            .map_err(ServiceError::Storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use chrono::Duration;

    fn service() -> (AuthService<InMemoryStore>, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let verifier = CredentialVerifier::new("auth-service-tests", Duration::hours(1));
        let service = AuthService::new(store.clone(), verifier, PasswordHasher::new(4));
        (service, store)
    }

    fn agent_account(email: &str) -> Provisioning {
        Provisioning {
            name: "Leila".to_string(),
            email: email.to_string(),
            password: "s3cret-pass".to_string(),
            role: Role::Agent,
        }
    }

    fn login(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: Some(email.to_string()),
            password: Some(password.to_string()),
        }
    }

    #[tokio::test]
    async fn login_issues_verifiable_token() {
        let (service, _) = service();
        service
            .provision(agent_account("leila@agency.test"))
            .await
            .expect("provision succeeds");

        let response = service
            .login(login("  LEILA@agency.test ", "s3cret-pass"))
            .await
            .expect("login succeeds");

        assert_eq!(response.user.role, Role::Agent);
        let identity = service
            .verifier()
            .verify(&response.token)
            .expect("token verifies");
        assert_eq!(identity, response.user);
    }

    #[tokio::test]
    async fn login_failures_share_one_message() {
        let (service, _) = service();
        service
            .provision(agent_account("leila@agency.test"))
            .await
            .expect("provision succeeds");

        let wrong_password = service
            .login(login("leila@agency.test", "nope"))
            .await
            .expect_err("wrong password fails");
        let unknown = service
            .login(login("ghost@agency.test", "s3cret-pass"))
            .await
            .expect_err("unknown email fails");

        assert!(matches!(wrong_password, ServiceError::Unauthorized));
        assert_eq!(wrong_password.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn login_requires_both_fields() {
        let (service, _) = service();
        match service.login(LoginRequest::default()).await {
            Err(ServiceError::Validation(errors)) => {
                assert!(errors.has_field("email"));
                assert!(errors.has_field("password"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn provision_rejects_duplicate_email_and_audits_success() {
        let (service, store) = service();
        service
            .provision(agent_account("leila@agency.test"))
            .await
            .expect("first provision succeeds");

        let duplicate = service
            .provision(agent_account("Leila@Agency.test"))
            .await
            .expect_err("duplicate email rejected");
        assert!(matches!(duplicate, ServiceError::Conflict(_)));

        let entries = store.list_audit_entries(10).await.expect("audit lists");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].verb, "provision_user");
    }

    #[tokio::test]
    async fn ensure_user_is_idempotent() {
        let (service, _) = service();
        let (first, created) = service
            .ensure_user(agent_account("leila@agency.test"))
            .await
            .expect("ensure succeeds");
        assert!(created);

        let (second, created) = service
            .ensure_user(agent_account("leila@agency.test"))
            .await
            .expect("ensure succeeds");
        assert!(!created);
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn directory_views_are_admin_only() {
        let (service, _) = service();
        let agent = service
            .provision(agent_account("leila@agency.test"))
            .await
            .expect("provision succeeds");

        assert!(matches!(
            service.list_agents(&agent).await,
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(
            service.list_audit(&agent, 10).await,
            Err(ServiceError::Forbidden(_))
        ));

        let admin = Identity {
            role: Role::Admin,
            ..agent.clone()
        };
        let agents = service.list_agents(&admin).await.expect("admin lists agents");
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0].email, "leila@agency.test");
    }
}
