//! Listing reads and permission-gated listing writes.

pub mod service;
pub mod validation;

pub use service::PropertyService;
pub use validation::{ImagesPayload, PropertyPayload, SearchParams};
