use crate::cli::{ServeArgs, UserAddArgs};
use crate::infra::{bootstrap_admin, AppState};
use crate::routes::with_service_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use listing_portal::auth::Provisioning;
use listing_portal::config::{AppConfig, ConfigError};
use listing_portal::error::AppError;
use listing_portal::portal::Portal;
use listing_portal::store::{InMemoryStore, PortalStore, PostgresStore};
use listing_portal::telemetry;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    match config.database.clone() {
        Some(database) => {
            let store = PostgresStore::connect(&database).await?;
            serve(Arc::new(store), config).await
        }
        None => {
            warn!("DATABASE_URL is not set; listings and accounts live in memory only");
            serve(Arc::new(InMemoryStore::new()), config).await
        }
    }
}

async fn serve<S>(store: Arc<S>, config: AppConfig) -> Result<(), AppError>
where
    S: PortalStore + 'static,
{
    let backend = store.backend_name();
    let portal = Arc::new(Portal::from_config(store, &config.auth));
    bootstrap_admin(&portal, config.bootstrap_admin.as_ref()).await?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        backend,
    };

    let app = with_service_routes(portal)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, store = backend, "listing portal ready");

    axum::serve(listener, app).await?;
    Ok(())
}

/// `user add`: provisions an account in the configured database.
pub(crate) async fn add_user(args: UserAddArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let database = config
        .database
        .as_ref()
        .ok_or(ConfigError::Missing("DATABASE_URL"))?;
    let store = Arc::new(PostgresStore::connect(database).await?);
    let portal = Portal::from_config(store, &config.auth);

    let identity = portal
        .auth()
        .provision(Provisioning {
            name: args.name,
            email: args.email,
            password: args.password,
            role: args.role,
        })
        .await?;

    println!(
        "Provisioned {} #{} <{}>",
        identity.role, identity.id, identity.email
    );
    Ok(())
}
