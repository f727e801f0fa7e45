use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;

use crate::access::{require_agent, RequestAccessPayload};
use crate::domain::{
    AccessRequest, AccessRequestView, Identity, Property, PropertyDetail, PropertyId,
    PropertySummary,
};
use crate::error::ServiceError;
use crate::portal::Portal;
use crate::properties::{ImagesPayload, PropertyPayload};
use crate::store::PortalStore;

fn agent<S>(portal: &Portal<S>, headers: &HeaderMap) -> Result<Identity, ServiceError>
where
    S: PortalStore + 'static,
{
    let caller = portal.authenticate(headers)?;
    require_agent(&caller)?;
    Ok(caller)
}

pub(super) async fn my_properties<S>(
    State(portal): State<Arc<Portal<S>>>,
    headers: HeaderMap,
) -> Result<Json<Vec<PropertySummary>>, ServiceError>
where
    S: PortalStore + 'static,
{
    let caller = agent(&portal, &headers)?;
    portal.properties().list_assigned(&caller).await.map(Json)
}

pub(super) async fn my_requests<S>(
    State(portal): State<Arc<Portal<S>>>,
    headers: HeaderMap,
) -> Result<Json<Vec<AccessRequestView>>, ServiceError>
where
    S: PortalStore + 'static,
{
    let caller = agent(&portal, &headers)?;
    portal.requests().list_for_user(&caller).await.map(Json)
}

pub(super) async fn create_request<S>(
    State(portal): State<Arc<Portal<S>>>,
    headers: HeaderMap,
    Json(payload): Json<RequestAccessPayload>,
) -> Result<(StatusCode, Json<AccessRequest>), ServiceError>
where
    S: PortalStore + 'static,
{
    let caller = agent(&portal, &headers)?;
    let request = portal.requests().create(&caller, payload).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

pub(super) async fn create_property<S>(
    State(portal): State<Arc<Portal<S>>>,
    headers: HeaderMap,
    Json(payload): Json<PropertyPayload>,
) -> Result<(StatusCode, Json<Property>), ServiceError>
where
    S: PortalStore + 'static,
{
    let caller = agent(&portal, &headers)?;
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
    let caller = agent(&portal, &headers)?;
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
    let caller = agent(&portal, &headers)?;
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
    let caller = agent(&portal, &headers)?;
    portal
        .properties()
        .replace_images(&caller, PropertyId(id), payload.images)
        .await
        .map(Json)
}
