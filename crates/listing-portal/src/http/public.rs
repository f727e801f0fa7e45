use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;

use crate::auth::{LoginRequest, LoginResponse};
use crate::domain::{PropertyDetail, PropertyId, PropertySummary};
use crate::error::ServiceError;
use crate::portal::Portal;
use crate::properties::SearchParams;
use crate::store::PortalStore;

pub(super) async fn login<S>(
    State(portal): State<Arc<Portal<S>>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ServiceError>
where
    S: PortalStore + 'static,
{
    portal.auth().login(request).await.map(Json)
}

pub(super) async fn search<S>(
    State(portal): State<Arc<Portal<S>>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<PropertySummary>>, ServiceError>
where
    S: PortalStore + 'static,
{
    let filter = params.into_filter()?;
    portal.properties().search(&filter).await.map(Json)
}

pub(super) async fn detail<S>(
    State(portal): State<Arc<Portal<S>>>,
    Path(id): Path<i64>,
) -> Result<Json<PropertyDetail>, ServiceError>
where
    S: PortalStore + 'static,
{
    portal.properties().detail(PropertyId(id)).await.map(Json)
}
