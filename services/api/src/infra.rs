use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use listing_portal::auth::Provisioning;
use listing_portal::config::BootstrapAdmin;
use listing_portal::domain::Role;
use listing_portal::error::ServiceError;
use listing_portal::portal::Portal;
use listing_portal::store::PortalStore;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) backend: &'static str,
}

/// Creates the configured admin account unless its email is already registered.
pub(crate) async fn bootstrap_admin<S>(
    portal: &Portal<S>,
    admin: Option<&BootstrapAdmin>,
) -> Result<(), ServiceError>
where
    S: PortalStore + 'static,
{
    let Some(admin) = admin else {
        return Ok(());
    };

    let (identity, created) = portal
        .auth()
        .ensure_user(Provisioning {
            name: admin.name.clone(),
            email: admin.email.clone(),
            password: admin.password.clone(),
            role: Role::Admin,
        })
        .await?;

    if created {
        info!(user_id = %identity.id, email = %identity.email, "bootstrap admin provisioned");
    } else if identity.role != Role::Admin {
        tracing::warn!(
            email = %identity.email,
            "bootstrap admin email belongs to a non-admin account"
        );
    }
    Ok(())
}
