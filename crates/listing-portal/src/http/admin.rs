use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;

use super::DEFAULT_AUDIT_LIMIT;
use crate::access::require_admin;
use crate::domain::{
    AccessRequest, AccessRequestView, AuditLogEntry, Identity, Property, PropertyDetail,
    PropertyId, PropertySummary, RequestId, RequestStatus, UserSummary, ValidationErrors,
};
use crate::error::ServiceError;
use crate::portal::Portal;
use crate::properties::{ImagesPayload, PropertyPayload};
use crate::store::PortalStore;

#[derive(Debug, Default, Deserialize)]
pub(super) struct ResolveBody {
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct AuditQuery {
    #[serde(default)]
    limit: Option<usize>,
}

fn admin<S>(portal: &Portal<S>, headers: &HeaderMap) -> Result<Identity, ServiceError>
where
    S: PortalStore + 'static,
{
    let caller = portal.authenticate(headers)?;
    require_admin(&caller)?;
    Ok(caller)
}

pub(super) async fn list_properties<S>(
    State(portal): State<Arc<Portal<S>>>,
    headers: HeaderMap,
) -> Result<Json<Vec<PropertySummary>>, ServiceError>
where
    S: PortalStore + 'static,
{
    let caller = admin(&portal, &headers)?;
    portal.properties().list_all(&caller).await.map(Json)
}

pub(super) async fn create_property<S>(
    State(portal): State<Arc<Portal<S>>>,
    headers: HeaderMap,
    Json(payload): Json<PropertyPayload>,
) -> Result<(StatusCode, Json<Property>), ServiceError>
where
    S: PortalStore + 'static,
{
    let caller = admin(&portal, &headers)?;
    let property = portal.properties().create(&caller, payload).await?;
    Ok((StatusCode::CREATED, Json(property)))
}

pub(super) async fn update_property<S>(
    State(portal): State<Arc<Portal<S>>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(payload): Json<PropertyPayload>,
) -> Result<Json<Property>, ServiceError>
where
    S: PortalStore + 'static,
{
    let caller = admin(&portal, &headers)?;
    portal
        .properties()
        .update(&caller, PropertyId(id), payload)
        .await
        .map(Json)
}

pub(super) async fn delete_property<S>(
    State(portal): State<Arc<Portal<S>>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<StatusCode, ServiceError>
where
    S: PortalStore + 'static,
{
    let caller = admin(&portal, &headers)?;
    portal.properties().delete(&caller, PropertyId(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn replace_images<S>(
    State(portal): State<Arc<Portal<S>>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(payload): Json<ImagesPayload>,
) -> Result<Json<PropertyDetail>, ServiceError>
where
    S: PortalStore + 'static,
{
    let caller = admin(&portal, &headers)?;
    portal
        .properties()
        .replace_images(&caller, PropertyId(id), payload.images)
        .await
        .map(Json)
}

pub(super) async fn list_agents<S>(
    State(portal): State<Arc<Portal<S>>>,
    headers: HeaderMap,
) -> Result<Json<Vec<UserSummary>>, ServiceError>
where
    S: PortalStore + 'static,
{
    let caller = admin(&portal, &headers)?;
    portal.auth().list_agents(&caller).await.map(Json)
}

pub(super) async fn list_requests<S>(
    State(portal): State<Arc<Portal<S>>>,
    headers: HeaderMap,
) -> Result<Json<Vec<AccessRequestView>>, ServiceError>
where
    S: PortalStore + 'static,
{
    let caller = admin(&portal, &headers)?;
    portal.requests().list_all(&caller).await.map(Json)
}

pub(super) async fn resolve_request<S>(
    State(portal): State<Arc<Portal<S>>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<ResolveBody>,
) -> Result<Json<AccessRequest>, ServiceError>
where
    S: PortalStore + 'static,
{
    let caller = admin(&portal, &headers)?;
    let status = body
        .status
        .as_deref()
        .ok_or_else(|| ValidationErrors::single("status", "status is required"))?
        .parse::<RequestStatus>()
        .map_err(|err| ValidationErrors::single("status", err.to_string()))?;

    portal
        .requests()
        .resolve(&caller, RequestId(id), status)
        .await
        .map(Json)
}

pub(super) async fn list_audit<S>(
    State(portal): State<Arc<Portal<S>>>,
    Query(query): Query<AuditQuery>,
    headers: HeaderMap,
) -> Result<Json<Vec<AuditLogEntry>>, ServiceError>
where
    S: PortalStore + 'static,
{
    let caller = admin(&portal, &headers)?;
    let limit = query.limit.unwrap_or(DEFAULT_AUDIT_LIMIT);
    portal.auth().list_audit(&caller, limit).await.map(Json)
}
