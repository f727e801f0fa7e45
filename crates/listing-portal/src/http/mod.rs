//! JSON API over the portal services.
//!
//! Handlers resolve the caller from the `Authorization` header, apply the route's role
//! gate and delegate to the services; [`ServiceError`](crate::error::ServiceError) turns
//! failures into status codes.

mod admin;
mod agent;
mod public;

use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;

use crate::portal::Portal;
use crate::store::PortalStore;

/// Default page size of the audit endpoint.
pub const DEFAULT_AUDIT_LIMIT: usize = 100;

pub fn portal_router<S>(portal: Arc<Portal<S>>) -> Router
where
    S: PortalStore + 'static,
{
    Router::new()
        .route("/api/auth/login", post(public::login::<S>))
        .route("/api/properties", get(public::search::<S>))
        .route("/api/properties/:id", get(public::detail::<S>))
        .route(
            "/api/admin/properties",
            get(admin::list_properties::<S>).post(admin::create_property::<S>),
        )
        .route(
            "/api/admin/properties/:id",
            put(admin::update_property::<S>).delete(admin::delete_property::<S>),
        )
        .route(
            "/api/admin/properties/:id/images",
            put(admin::replace_images::<S>),
        )
        .route("/api/admin/agents", get(admin::list_agents::<S>))
        .route("/api/admin/requests", get(admin::list_requests::<S>))
        .route("/api/admin/requests/:id", put(admin::resolve_request::<S>))
        .route("/api/admin/audit", get(admin::list_audit::<S>))
        .route("/api/agent/my-properties", get(agent::my_properties::<S>))
        .route(
            "/api/agent/requests",
            get(agent::my_requests::<S>).post(agent::create_request::<S>),
        )
        .route("/api/agent/properties", post(agent::create_property::<S>))
        .route(
            "/api/agent/properties/:id",
            put(agent::update_property::<S>).delete(agent::delete_property::<S>),
        )
        .route(
            "/api/agent/properties/:id/images",
            put(agent::replace_images::<S>),
        )
        .with_state(portal)
}
