//! Credentials and accounts: signed bearer tokens, bcrypt password hashes and the
//! login/provisioning service built on them.

pub mod password;
pub mod service;
pub mod token;

pub use password::PasswordHasher;
pub use service::{AuthService, LoginRequest, LoginResponse, Provisioning};
pub use token::{bearer_token, Claims, CredentialVerifier, TokenError};
