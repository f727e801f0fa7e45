use serde::Deserialize;

use crate::domain::validation::non_blank;
use crate::domain::{
    ImageSet, PropertyDraft, PropertyFilter, PropertyKind, PropertyStatus, UserId,
    ValidationErrors,
};

/// Listing submission as received from clients. Every field is optional so that all
/// problems can be reported together.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PropertyPayload {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, alias = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub surface: Option<f64>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub agent_id: Option<i64>,
    #[serde(default)]
    pub images: Vec<String>,
}

impl PropertyPayload {
    pub fn validate(self) -> Result<(PropertyDraft, ImageSet), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let title = non_blank(self.title);
        if title.is_none() {
            errors.push("title", "title is required");
        }

        let kind = match non_blank(self.kind) {
            Some(raw) => match raw.parse::<PropertyKind>() {
                Ok(kind) => Some(kind),
                Err(err) => {
                    errors.push("kind", err.to_string());
                    None
                }
            },
            None => {
                errors.push("kind", "kind is required");
                None
            }
        };

        match self.price {
            Some(price) if price.is_finite() && price > 0.0 => {}
            Some(_) => errors.push("price", "price must be a positive number"),
            None => errors.push("price", "price is required"),
        }

        if let Some(surface) = self.surface {
            if !(surface.is_finite() && surface > 0.0) {
                errors.push("surface", "surface must be a positive number");
            }
        }

        let status = match non_blank(self.status) {
            Some(raw) => match raw.parse::<PropertyStatus>() {
                Ok(status) => status,
                Err(err) => {
                    errors.push("status", err.to_string());
                    PropertyStatus::default()
                }
            },
            None => PropertyStatus::default(),
        };

        let (Some(title), Some(kind), Some(price)) = (title, kind, self.price) else {
            return Err(errors);
        };
        let draft = PropertyDraft {
            title,
            description: non_blank(self.description),
            kind,
            price,
            surface: self.surface,
            address: non_blank(self.address),
            city: non_blank(self.city),
            status,
            agent_id: self.agent_id.map(UserId),
        };
        errors.into_result((draft, ImageSet::from_urls(self.images)))
    }
}

/// Body of the image replacement endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImagesPayload {
    #[serde(default)]
    pub images: Vec<String>,
}

/// Public search query string. Numbers arrive as text so blank inputs can be ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default, alias = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub price_min: Option<String>,
    #[serde(default)]
    pub price_max: Option<String>,
    #[serde(default)]
    pub surface_min: Option<String>,
    #[serde(default)]
    pub surface_max: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
}

impl SearchParams {
    pub fn into_filter(self) -> Result<PropertyFilter, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let kind = match non_blank(self.kind) {
            Some(raw) if raw.eq_ignore_ascii_case("all") => None,
            Some(raw) => match raw.parse::<PropertyKind>() {
                Ok(kind) => Some(kind),
                Err(err) => {
                    errors.push("kind", err.to_string());
                    None
                }
            },
            None => None,
        };

        let filter = PropertyFilter {
            kind,
            city: non_blank(self.city),
            price_min: bound(&mut errors, "price_min", self.price_min),
            price_max: bound(&mut errors, "price_max", self.price_max),
            surface_min: bound(&mut errors, "surface_min", self.surface_min),
            surface_max: bound(&mut errors, "surface_max", self.surface_max),
            search: non_blank(self.search),
        };
        errors.into_result(filter)
    }
}

fn bound(errors: &mut ValidationErrors, field: &'static str, raw: Option<String>) -> Option<f64> {
    let raw = non_blank(raw)?;
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Some(value),
        _ => {
            errors.push(field, "must be a number");
            None
        }
    }
}
