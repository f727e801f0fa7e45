//! Real-estate listing portal: public browsing, an admin back-office and an agent portal
//! whose write access is granted through admin-approved access requests.

pub mod access;
pub mod audit;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod http;
pub mod portal;
pub mod properties;
pub mod store;
pub mod telemetry;
