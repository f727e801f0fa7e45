use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::identity::{UnknownValue, UserId};
use super::property::PropertyId;

/// Identifier wrapper for access requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub i64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Granularity at which agent permissions are requested and granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Add,
    Edit,
    Delete,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Add => "add",
            ActionKind::Edit => "edit",
            ActionKind::Delete => "delete",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = UnknownValue;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "add" => Ok(ActionKind::Add),
            "edit" => Ok(ActionKind::Edit),
            "delete" => Ok(ActionKind::Delete),
            other => Err(UnknownValue::new("action kind", other)),
        }
    }
}

/// Lifecycle state of an access request. `Approved` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

impl FromStr for RequestStatus {
    type Err = UnknownValue;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" | "en_attente" => Ok(RequestStatus::Pending),
            "approved" | "approuve" => Ok(RequestStatus::Approved),
            "rejected" | "rejete" => Ok(RequestStatus::Rejected),
            other => Err(UnknownValue::new("request status", other)),
        }
    }
}

/// Admin decision applied to a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Approved,
    Rejected,
}

impl Resolution {
    pub fn status(&self) -> RequestStatus {
        match self {
            Resolution::Approved => RequestStatus::Approved,
            Resolution::Rejected => RequestStatus::Rejected,
        }
    }
}

impl TryFrom<RequestStatus> for Resolution {
    type Error = RequestStatus;

    fn try_from(status: RequestStatus) -> Result<Self, Self::Error> {
        match status {
            RequestStatus::Approved => Ok(Resolution::Approved),
            RequestStatus::Rejected => Ok(Resolution::Rejected),
            RequestStatus::Pending => Err(status),
        }
    }
}

/// Stored access request. A missing `property_id` is a global request for the action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessRequest {
    pub id: RequestId,
    pub user_id: UserId,
    pub action: ActionKind,
    pub property_id: Option<PropertyId>,
    pub justification: String,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

impl AccessRequest {
    /// Whether this request, if approved, covers `action` on `property_id`.
    pub fn grants(&self, action: ActionKind, property_id: Option<PropertyId>) -> bool {
        self.status == RequestStatus::Approved
            && self.action == action
            && (self.property_id.is_none() || self.property_id == property_id)
    }

    /// Two pending requests collide when they share user, action and target,
    /// with a missing target only colliding with another missing target.
    pub fn same_key(
        &self,
        user_id: UserId,
        action: ActionKind,
        property_id: Option<PropertyId>,
    ) -> bool {
        self.user_id == user_id && self.action == action && self.property_id == property_id
    }
}

/// Insert payload produced by the lifecycle manager after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccessRequest {
    pub user_id: UserId,
    pub action: ActionKind,
    pub property_id: Option<PropertyId>,
    pub justification: String,
}

/// Request joined with requester identity and target title for review screens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessRequestView {
    #[serde(flatten)]
    pub request: AccessRequest,
    pub requester_name: String,
    pub requester_email: String,
    pub property_title: Option<String>,
}
