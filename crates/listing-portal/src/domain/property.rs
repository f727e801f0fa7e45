use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::identity::{UnknownValue, UserId};

/// Identifier wrapper for listed properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyId(pub i64);

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether a listing is offered for sale or for rent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyKind {
    Sale,
    Rental,
}

impl PropertyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyKind::Sale => "sale",
            PropertyKind::Rental => "rental",
        }
    }
}

impl FromStr for PropertyKind {
    type Err = UnknownValue;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "sale" | "vente" => Ok(PropertyKind::Sale),
            "rental" | "location" => Ok(PropertyKind::Rental),
            other => Err(UnknownValue::new("property kind", other)),
        }
    }
}

/// Commercial status of a listing. Only `Available` listings show up in public search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyStatus {
    #[default]
    Available,
    Sold,
    Rented,
    Reserved,
}

impl PropertyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyStatus::Available => "available",
            PropertyStatus::Sold => "sold",
            PropertyStatus::Rented => "rented",
            PropertyStatus::Reserved => "reserved",
        }
    }
}

impl FromStr for PropertyStatus {
    type Err = UnknownValue;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "available" | "disponible" => Ok(PropertyStatus::Available),
            "sold" | "vendu" => Ok(PropertyStatus::Sold),
            "rented" | "loue" | "loué" => Ok(PropertyStatus::Rented),
            "reserved" | "reserve" | "réservé" => Ok(PropertyStatus::Reserved),
            other => Err(UnknownValue::new("property status", other)),
        }
    }
}

/// Stored listing row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Property {
    pub id: PropertyId,
    pub title: String,
    pub description: Option<String>,
    pub kind: PropertyKind,
    pub price: f64,
    pub surface: Option<f64>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub status: PropertyStatus,
    pub agent_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

impl Property {
    /// Key fields captured in audit entries.
    pub fn audit_snapshot(&self, image_count: usize) -> serde_json::Value {
        serde_json::json!({
            "title": self.title,
            "kind": self.kind.as_str(),
            "price": self.price,
            "city": self.city,
            "status": self.status.as_str(),
            "agent_id": self.agent_id,
            "image_count": image_count,
        })
    }
}

/// Validated field set used for both insert and update.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDraft {
    pub title: String,
    pub description: Option<String>,
    pub kind: PropertyKind,
    pub price: f64,
    pub surface: Option<f64>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub status: PropertyStatus,
    pub agent_id: Option<UserId>,
}

impl PropertyDraft {
    pub fn into_property(self, id: PropertyId, created_at: DateTime<Utc>) -> Property {
        Property {
            id,
            title: self.title,
            description: self.description,
            kind: self.kind,
            price: self.price,
            surface: self.surface,
            address: self.address,
            city: self.city,
            status: self.status,
            agent_id: self.agent_id,
            created_at,
        }
    }
}

/// One stored image of a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyImage {
    pub id: i64,
    pub url: String,
    pub is_primary: bool,
    pub position: i32,
}

/// Ordered image submission. Blank URLs are dropped and the first remaining entry is the
/// primary image, so a non-empty set always has exactly one primary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageSet {
    urls: Vec<String>,
}

impl ImageSet {
    pub fn from_urls<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let urls = urls
            .into_iter()
            .map(|url| url.as_ref().trim().to_string())
            .filter(|url| !url.is_empty())
            .collect();
        Self { urls }
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    /// `(url, is_primary, position)` rows in insertion order; positions start at 1.
    pub fn entries(&self) -> impl Iterator<Item = (&str, bool, i32)> + '_ {
        self.urls
            .iter()
            .enumerate()
            .map(|(index, url)| (url.as_str(), index == 0, index as i32 + 1))
    }
}

/// Row used by list endpoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertySummary {
    pub id: PropertyId,
    pub title: String,
    pub description: Option<String>,
    pub kind: PropertyKind,
    pub price: f64,
    pub surface: Option<f64>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub status: PropertyStatus,
    pub agent_id: Option<UserId>,
    pub agent_name: Option<String>,
    pub primary_image: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PropertySummary {
    pub fn from_property(
        property: &Property,
        agent_name: Option<String>,
        primary_image: Option<String>,
    ) -> Self {
        Self {
            id: property.id,
            title: property.title.clone(),
            description: property.description.clone(),
            kind: property.kind,
            price: property.price,
            surface: property.surface,
            address: property.address.clone(),
            city: property.city.clone(),
            status: property.status,
            agent_id: property.agent_id,
            agent_name,
            primary_image,
            created_at: property.created_at,
        }
    }
}

/// Full listing with its images, primary first and then by position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyDetail {
    #[serde(flatten)]
    pub property: Property,
    pub agent_name: Option<String>,
    pub images: Vec<PropertyImage>,
}

/// Public search criteria. Text criteria are matched as case-insensitive substrings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyFilter {
    pub kind: Option<PropertyKind>,
    pub city: Option<String>,
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
    pub surface_min: Option<f64>,
    pub surface_max: Option<f64>,
    pub search: Option<String>,
}

impl PropertyFilter {
    /// In-process evaluation of the filter; SQL backends translate the same rules.
    /// Range bounds on surface never match listings without a surface.
    pub fn matches(&self, property: &Property) -> bool {
        if let Some(kind) = self.kind {
            if property.kind != kind {
                return false;
            }
        }
        if let Some(city) = &self.city {
            if !contains_ignore_case(property.city.as_deref(), city) {
                return false;
            }
        }
        if self.price_min.is_some_and(|min| property.price < min)
            || self.price_max.is_some_and(|max| property.price > max)
        {
            return false;
        }
        if self.surface_min.is_some() || self.surface_max.is_some() {
            let Some(surface) = property.surface else {
                return false;
            };
            if self.surface_min.is_some_and(|min| surface < min)
                || self.surface_max.is_some_and(|max| surface > max)
            {
                return false;
            }
        }
        if let Some(search) = &self.search {
            let hit = contains_ignore_case(Some(&property.title), search)
                || contains_ignore_case(property.address.as_deref(), search)
                || contains_ignore_case(property.city.as_deref(), search);
            if !hit {
                return false;
            }
        }
        true
    }
}

fn contains_ignore_case(haystack: Option<&str>, needle: &str) -> bool {
    haystack
        .map(|value| value.to_lowercase().contains(&needle.to_lowercase()))
        .unwrap_or(false)
}
