//! PostgreSQL implementation of the portal store.
//!
//! Every mutation that touches more than one row (listing + images, delete + cascade)
//! runs inside a single transaction; an early return drops the transaction, which rolls
//! it back. Two invariants are also enforced by the schema so that concurrent writers
//! cannot slip past the application checks:
//! - `property_images_one_primary`: at most one primary image per listing.
//! - `access_requests_one_pending`: one pending request per (user, action, target).
//!
//! Database URLs may carry credentials and are never logged.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, Transaction};

use super::{
    AccessRequestStore, AssignmentPolicy, AuditStore, PortalStore, PropertyStore, StoreError,
    StoreResult, UserStore,
};
use crate::config::DatabaseConfig;
use crate::domain::{
    AccessRequest, AccessRequestView, ActionKind, AuditLogEntry, ImageSet, NewAccessRequest,
    NewAuditEntry, NewUser, Property, PropertyDetail, PropertyDraft, PropertyFilter, PropertyId,
    PropertyImage, PropertySummary, RequestId, RequestStatus, User, UserId, UserSummary,
};

const SUMMARY_SELECT: &str = "SELECT p.id, p.title, p.description, p.kind, p.price, p.surface, \
     p.address, p.city, p.status, p.agent_id, p.created_at, \
     u.name AS agent_name, \
     (SELECT i.url FROM property_images i WHERE i.property_id = p.id AND i.is_primary LIMIT 1) \
     AS primary_image \
     FROM properties p LEFT JOIN users u ON u.id = p.agent_id";

const REQUEST_VIEW_SELECT: &str = "SELECT r.id, r.user_id, r.action, r.property_id, \
     r.justification, r.status, r.created_at, r.responded_at, \
     u.name AS requester_name, u.email AS requester_email, p.title AS property_title \
     FROM access_requests r \
     JOIN users u ON u.id = r.user_id \
     LEFT JOIN properties p ON p.id = r.property_id";

const REQUEST_RETURNING: &str =
    "RETURNING id, user_id, action, property_id, justification, status, created_at, responded_at";

/// Durable portal store backed by a `sqlx` connection pool.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Open the pool and apply the embedded migrations before any request is served.
    pub async fn connect(config: &DatabaseConfig) -> StoreResult<Self> {
        let options = PgConnectOptions::from_str(&config.url)?;
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_millis(config.acquire_timeout_ms))
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|err| StoreError::Unavailable(format!("migration failed: {err}")))?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => StoreError::NotFound("row".to_string()),
            sqlx::Error::Database(db) => match db.code().as_deref() {
                // unique_violation
                Some("23505") => StoreError::Conflict(db.message().to_string()),
                // foreign_key_violation
                Some("23503") => StoreError::NotFound(db.message().to_string()),
                _ => StoreError::Unavailable(err.to_string()),
            },
            _ => StoreError::Unavailable(err.to_string()),
        }
    }
}

#[derive(Debug, FromRow)]
struct DbUser {
    id: i64,
    name: String,
    email: String,
    role: String,
    active: bool,
    password_hash: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<DbUser> for User {
    type Error = StoreError;

    fn try_from(row: DbUser) -> Result<Self, Self::Error> {
        Ok(User {
            id: UserId(row.id),
            name: row.name,
            email: row.email,
            role: decode(&row.role)?,
            active: row.active,
            password_hash: row.password_hash,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct DbProperty {
    id: i64,
    title: String,
    description: Option<String>,
    kind: String,
    price: f64,
    surface: Option<f64>,
    address: Option<String>,
    city: Option<String>,
    status: String,
    agent_id: Option<i64>,
    created_at: DateTime<Utc>,
}

impl TryFrom<DbProperty> for Property {
    type Error = StoreError;

    fn try_from(row: DbProperty) -> Result<Self, Self::Error> {
        Ok(Property {
            id: PropertyId(row.id),
            title: row.title,
            description: row.description,
            kind: decode(&row.kind)?,
            price: row.price,
            surface: row.surface,
            address: row.address,
            city: row.city,
            status: decode(&row.status)?,
            agent_id: row.agent_id.map(UserId),
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct DbPropertySummary {
    #[sqlx(flatten)]
    property: DbProperty,
    agent_name: Option<String>,
    primary_image: Option<String>,
}

impl TryFrom<DbPropertySummary> for PropertySummary {
    type Error = StoreError;

    fn try_from(row: DbPropertySummary) -> Result<Self, Self::Error> {
        let property = Property::try_from(row.property)?;
        Ok(PropertySummary::from_property(
            &property,
            row.agent_name,
            row.primary_image,
        ))
    }
}

#[derive(Debug, FromRow)]
struct DbImage {
    id: i64,
    url: String,
    is_primary: bool,
    position: i32,
}

impl From<DbImage> for PropertyImage {
    fn from(row: DbImage) -> Self {
        PropertyImage {
            id: row.id,
            url: row.url,
            is_primary: row.is_primary,
            position: row.position,
        }
    }
}

#[derive(Debug, FromRow)]
struct DbRequest {
    id: i64,
    user_id: i64,
    action: String,
    property_id: Option<i64>,
    justification: String,
    status: String,
    created_at: DateTime<Utc>,
    responded_at: Option<DateTime<Utc>>,
}

impl TryFrom<DbRequest> for AccessRequest {
    type Error = StoreError;

    fn try_from(row: DbRequest) -> Result<Self, Self::Error> {
        Ok(AccessRequest {
            id: RequestId(row.id),
            user_id: UserId(row.user_id),
            action: decode(&row.action)?,
            property_id: row.property_id.map(PropertyId),
            justification: row.justification,
            status: decode(&row.status)?,
            created_at: row.created_at,
            responded_at: row.responded_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct DbRequestView {
    #[sqlx(flatten)]
    request: DbRequest,
    requester_name: String,
    requester_email: String,
    property_title: Option<String>,
}

impl TryFrom<DbRequestView> for AccessRequestView {
    type Error = StoreError;

    fn try_from(row: DbRequestView) -> Result<Self, Self::Error> {
        Ok(AccessRequestView {
            request: AccessRequest::try_from(row.request)?,
            requester_name: row.requester_name,
            requester_email: row.requester_email,
            property_title: row.property_title,
        })
    }
}

#[derive(Debug, FromRow)]
struct DbAuditEntry {
    id: i64,
    actor_id: i64,
    verb: String,
    entity_kind: String,
    entity_id: Option<i64>,
    detail: Option<serde_json::Value>,
    recorded_at: DateTime<Utc>,
}

impl From<DbAuditEntry> for AuditLogEntry {
    fn from(row: DbAuditEntry) -> Self {
        AuditLogEntry {
            id: row.id,
            actor_id: UserId(row.actor_id),
            verb: row.verb,
            entity_kind: row.entity_kind,
            entity_id: row.entity_id,
            detail: row.detail,
            recorded_at: row.recorded_at,
        }
    }
}

fn decode<T>(label: &str) -> StoreResult<T>
where
    T: FromStr<Err = crate::domain::UnknownValue>,
{
    label
        .parse()
        .map_err(|err: crate::domain::UnknownValue| StoreError::Corrupt(err.to_string()))
}

fn collect<R, T>(rows: Vec<R>) -> StoreResult<Vec<T>>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}

/// `%needle%` for `LIKE`, lowercased, with wildcard characters in the needle escaped.
fn like_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for ch in needle.to_lowercase().chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

async fn install_images(
    tx: &mut Transaction<'_, Postgres>,
    id: PropertyId,
    images: &ImageSet,
) -> StoreResult<()> {
    sqlx::query("DELETE FROM property_images WHERE property_id = $1")
        .bind(id.0)
        .execute(&mut **tx)
        .await?;
    for (url, is_primary, position) in images.entries() {
        sqlx::query(
            "INSERT INTO property_images (property_id, url, is_primary, position) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(id.0)
        .bind(url)
        .bind(is_primary)
        .bind(position)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

async fn load_images(
    tx: &mut Transaction<'_, Postgres>,
    id: PropertyId,
) -> StoreResult<Vec<PropertyImage>> {
    let rows = sqlx::query_as::<_, DbImage>(
        "SELECT id, url, is_primary, position FROM property_images \
         WHERE property_id = $1 ORDER BY is_primary DESC, position ASC",
    )
    .bind(id.0)
    .fetch_all(&mut **tx)
    .await?;
    Ok(rows.into_iter().map(PropertyImage::from).collect())
}

async fn load_detail(
    tx: &mut Transaction<'_, Postgres>,
    id: PropertyId,
    lock: bool,
) -> StoreResult<Option<PropertyDetail>> {
    let mut sql = format!("{SUMMARY_SELECT} WHERE p.id = $1");
    if lock {
        sql.push_str(" FOR UPDATE OF p");
    }
    let row = sqlx::query_as::<_, DbPropertySummary>(&sql)
        .bind(id.0)
        .fetch_optional(&mut **tx)
        .await?;
    let Some(row) = row else {
        return Ok(None);
    };
    let agent_name = row.agent_name;
    let property = Property::try_from(row.property)?;
    let images = load_images(tx, id).await?;
    Ok(Some(PropertyDetail {
        property,
        agent_name,
        images,
    }))
}

#[async_trait]
impl UserStore for PostgresStore {
    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let row = sqlx::query_as::<_, DbUser>(
            "INSERT INTO users (name, email, role, password_hash) VALUES ($1, $2, $3, $4) \
             RETURNING id, name, email, role, active, password_hash, created_at",
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.role.as_str())
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await?;
        User::try_from(row)
    }

    async fn find_user(&self, id: UserId) -> StoreResult<Option<User>> {
        sqlx::query_as::<_, DbUser>(
            "SELECT id, name, email, role, active, password_hash, created_at \
             FROM users WHERE id = $1",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?
        .map(User::try_from)
        .transpose()
    }

    async fn find_active_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        sqlx::query_as::<_, DbUser>(
            "SELECT id, name, email, role, active, password_hash, created_at \
             FROM users WHERE email = $1 AND active = TRUE",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?
        .map(User::try_from)
        .transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        sqlx::query_as::<_, DbUser>(
            "SELECT id, name, email, role, active, password_hash, created_at \
             FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?
        .map(User::try_from)
        .transpose()
    }

    async fn list_active_agents(&self) -> StoreResult<Vec<UserSummary>> {
        let rows = sqlx::query_as::<_, DbUser>(
            "SELECT id, name, email, role, active, password_hash, created_at \
             FROM users WHERE role = 'agent' AND active = TRUE ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        let users: Vec<User> = collect(rows)?;
        Ok(users.iter().map(User::summary).collect())
    }
}

#[async_trait]
impl PropertyStore for PostgresStore {
    async fn insert_property(
        &self,
        draft: PropertyDraft,
        images: ImageSet,
    ) -> StoreResult<Property> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, DbProperty>(
            "INSERT INTO properties \
             (title, description, kind, price, surface, address, city, status, agent_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING id, title, description, kind, price, surface, address, city, status, \
             agent_id, created_at",
        )
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(draft.kind.as_str())
        .bind(draft.price)
        .bind(draft.surface)
        .bind(&draft.address)
        .bind(&draft.city)
        .bind(draft.status.as_str())
        .bind(draft.agent_id.map(|id| id.0))
        .fetch_one(&mut *tx)
        .await?;
        let property = Property::try_from(row)?;
        install_images(&mut tx, property.id, &images).await?;
        tx.commit().await?;
        Ok(property)
    }

    async fn update_property(
        &self,
        id: PropertyId,
        draft: PropertyDraft,
        assignment: AssignmentPolicy,
        images: ImageSet,
    ) -> StoreResult<Property> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, DbProperty>(
            "UPDATE properties SET title = $1, description = $2, kind = $3, price = $4, \
             surface = $5, address = $6, city = $7, status = $8, \
             agent_id = CASE WHEN $9 THEN agent_id ELSE $10 END \
             WHERE id = $11 \
             RETURNING id, title, description, kind, price, surface, address, city, status, \
             agent_id, created_at",
        )
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(draft.kind.as_str())
        .bind(draft.price)
        .bind(draft.surface)
        .bind(&draft.address)
        .bind(&draft.city)
        .bind(draft.status.as_str())
        .bind(assignment == AssignmentPolicy::Keep)
        .bind(draft.agent_id.map(|agent| agent.0))
        .bind(id.0)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("property {id}")))?;
        let property = Property::try_from(row)?;
        install_images(&mut tx, id, &images).await?;
        tx.commit().await?;
        Ok(property)
    }

    async fn replace_images(&self, id: PropertyId, images: ImageSet) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        let exists =
            sqlx::query_scalar::<_, i64>("SELECT id FROM properties WHERE id = $1 FOR UPDATE")
                .bind(id.0)
                .fetch_optional(&mut *tx)
                .await?;
        if exists.is_none() {
            return Err(StoreError::NotFound(format!("property {id}")));
        }
        install_images(&mut tx, id, &images).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete_property(&self, id: PropertyId) -> StoreResult<PropertyDetail> {
        let mut tx = self.pool.begin().await?;
        let detail = load_detail(&mut tx, id, true)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("property {id}")))?;
        sqlx::query("DELETE FROM properties WHERE id = $1")
            .bind(id.0)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(detail)
    }

    async fn get_property(&self, id: PropertyId) -> StoreResult<Option<PropertyDetail>> {
        let mut tx = self.pool.begin().await?;
        let detail = load_detail(&mut tx, id, false).await?;
        tx.commit().await?;
        Ok(detail)
    }

    async fn search_properties(
        &self,
        filter: &PropertyFilter,
    ) -> StoreResult<Vec<PropertySummary>> {
        let mut query = QueryBuilder::<Postgres>::new(SUMMARY_SELECT);
        query.push(" WHERE p.status = 'available'");
        if let Some(kind) = filter.kind {
            query.push(" AND p.kind = ").push_bind(kind.as_str());
        }
        if let Some(city) = &filter.city {
            query
                .push(" AND LOWER(p.city) LIKE ")
                .push_bind(like_pattern(city));
        }
        if let Some(min) = filter.price_min {
            query.push(" AND p.price >= ").push_bind(min);
        }
        if let Some(max) = filter.price_max {
            query.push(" AND p.price <= ").push_bind(max);
        }
        if let Some(min) = filter.surface_min {
            query.push(" AND p.surface >= ").push_bind(min);
        }
        if let Some(max) = filter.surface_max {
            query.push(" AND p.surface <= ").push_bind(max);
        }
        if let Some(search) = &filter.search {
            let pattern = like_pattern(search);
            query
                .push(" AND (LOWER(p.title) LIKE ")
                .push_bind(pattern.clone())
                .push(" OR LOWER(p.address) LIKE ")
                .push_bind(pattern.clone())
                .push(" OR LOWER(p.city) LIKE ")
                .push_bind(pattern)
                .push(")");
        }
        query.push(" ORDER BY p.created_at DESC, p.id DESC");

        let rows = query
            .build_query_as::<DbPropertySummary>()
            .fetch_all(&self.pool)
            .await?;
        collect(rows)
    }

    async fn list_properties(&self) -> StoreResult<Vec<PropertySummary>> {
        let sql = format!("{SUMMARY_SELECT} ORDER BY p.created_at DESC, p.id DESC");
        let rows = sqlx::query_as::<_, DbPropertySummary>(&sql)
            .fetch_all(&self.pool)
            .await?;
        collect(rows)
    }

    async fn list_properties_for_agent(
        &self,
        agent_id: UserId,
    ) -> StoreResult<Vec<PropertySummary>> {
        let sql =
            format!("{SUMMARY_SELECT} WHERE p.agent_id = $1 ORDER BY p.created_at DESC, p.id DESC");
        let rows = sqlx::query_as::<_, DbPropertySummary>(&sql)
            .bind(agent_id.0)
            .fetch_all(&self.pool)
            .await?;
        collect(rows)
    }
}

#[async_trait]
impl AccessRequestStore for PostgresStore {
    async fn insert_access_request(
        &self,
        request: NewAccessRequest,
    ) -> StoreResult<AccessRequest> {
        let sql = format!(
            "INSERT INTO access_requests (user_id, action, property_id, justification) \
             VALUES ($1, $2, $3, $4) {REQUEST_RETURNING}"
        );
        let row = sqlx::query_as::<_, DbRequest>(&sql)
            .bind(request.user_id.0)
            .bind(request.action.as_str())
            .bind(request.property_id.map(|id| id.0))
            .bind(&request.justification)
            .fetch_one(&self.pool)
            .await?;
        AccessRequest::try_from(row)
    }

    async fn list_access_requests_for_user(
        &self,
        user_id: UserId,
    ) -> StoreResult<Vec<AccessRequestView>> {
        let sql = format!(
            "{REQUEST_VIEW_SELECT} WHERE r.user_id = $1 ORDER BY r.created_at DESC, r.id DESC"
        );
        let rows = sqlx::query_as::<_, DbRequestView>(&sql)
            .bind(user_id.0)
            .fetch_all(&self.pool)
            .await?;
        collect(rows)
    }

    async fn list_access_requests(&self) -> StoreResult<Vec<AccessRequestView>> {
        let sql = format!("{REQUEST_VIEW_SELECT} ORDER BY r.created_at DESC, r.id DESC");
        let rows = sqlx::query_as::<_, DbRequestView>(&sql)
            .fetch_all(&self.pool)
            .await?;
        collect(rows)
    }

    async fn resolve_access_request(
        &self,
        id: RequestId,
        status: RequestStatus,
        responded_at: DateTime<Utc>,
    ) -> StoreResult<AccessRequest> {
        let sql = format!(
            "UPDATE access_requests SET status = $1, responded_at = $2 \
             WHERE id = $3 AND status = 'pending' {REQUEST_RETURNING}"
        );
        let updated = sqlx::query_as::<_, DbRequest>(&sql)
            .bind(status.as_str())
            .bind(responded_at)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        if let Some(row) = updated {
            return AccessRequest::try_from(row);
        }

        let current =
            sqlx::query_scalar::<_, String>("SELECT status FROM access_requests WHERE id = $1")
                .bind(id.0)
                .fetch_optional(&self.pool)
                .await?;
        match current {
            Some(current) => Err(StoreError::Conflict(format!(
                "access request {id} already {current}"
            ))),
            None => Err(StoreError::NotFound(format!("access request {id}"))),
        }
    }

    async fn has_approved_grant(
        &self,
        user_id: UserId,
        action: ActionKind,
        property_id: Option<PropertyId>,
    ) -> StoreResult<bool> {
        let granted = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM access_requests \
             WHERE user_id = $1 AND action = $2 AND status = 'approved' \
             AND (property_id IS NULL OR property_id = $3))",
        )
        .bind(user_id.0)
        .bind(action.as_str())
        .bind(property_id.map(|id| id.0))
        .fetch_one(&self.pool)
        .await?;
        Ok(granted)
    }
}

#[async_trait]
impl AuditStore for PostgresStore {
    async fn append_audit_entry(&self, entry: NewAuditEntry) -> StoreResult<AuditLogEntry> {
        let row = sqlx::query_as::<_, DbAuditEntry>(
            "INSERT INTO audit_log (actor_id, verb, entity_kind, entity_id, detail) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, actor_id, verb, entity_kind, entity_id, detail, recorded_at",
        )
        .bind(entry.actor_id.0)
        .bind(entry.verb.as_str())
        .bind(entry.entity_kind.as_str())
        .bind(entry.entity_id)
        .bind(entry.detail)
        .fetch_one(&self.pool)
        .await?;
        Ok(AuditLogEntry::from(row))
    }

    async fn list_audit_entries(&self, limit: usize) -> StoreResult<Vec<AuditLogEntry>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query_as::<_, DbAuditEntry>(
            "SELECT id, actor_id, verb, entity_kind, entity_id, detail, recorded_at \
             FROM audit_log ORDER BY recorded_at DESC, id DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(AuditLogEntry::from).collect())
    }
}

#[async_trait]
impl PortalStore for PostgresStore {
    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
