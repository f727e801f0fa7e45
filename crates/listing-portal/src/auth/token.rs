use axum::http::{header, HeaderMap};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::{AuthConfig, MAX_TOKEN_TTL_HOURS};
use crate::domain::{Identity, Role, UserId};

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("credential expiry is out of range")]
    ExpiryOutOfRange,
    #[error("failed to sign credential: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// JWT claims carried by portal credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id, as a decimal string.
    pub sub: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and validates HS256 bearer credentials.
#[derive(Clone)]
pub struct CredentialVerifier {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl CredentialVerifier {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }

    /// The configured lifetime is clamped to `1..=MAX_TOKEN_TTL_HOURS` hours.
    pub fn from_config(config: &AuthConfig) -> Self {
        let hours = config.token_ttl_hours.clamp(1, MAX_TOKEN_TTL_HOURS);
        Self::new(&config.jwt_secret, Duration::hours(hours))
    }

    pub fn issue(&self, identity: &Identity) -> Result<String, TokenError> {
        self.issue_at(identity, Utc::now())
    }

    pub fn issue_at(
        &self,
        identity: &Identity,
        issued_at: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let expires_at = issued_at
            .checked_add_signed(self.ttl)
            .ok_or(TokenError::ExpiryOutOfRange)?;
        let claims = Claims {
            sub: identity.id.to_string(),
            email: identity.email.clone(),
            name: identity.name.clone(),
            role: identity.role,
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };
        Ok(encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.encoding_key,
        )?)
    }

    /// Resolves a credential to an identity. Malformed, expired, tampered or foreign
    /// tokens all yield `None`.
    pub fn verify(&self, token: &str) -> Option<Identity> {
        let data = match decode::<Claims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => data,
            Err(err) => {
                tracing::debug!(error = %err, "rejected bearer credential");
                return None;
            }
        };

        let claims = data.claims;
        let id = claims.sub.parse::<i64>().ok()?;
        Some(Identity {
            id: UserId(id),
            email: claims.email,
            name: claims.name,
            role: claims.role,
        })
    }

    /// Reads `Authorization: Bearer <token>` and verifies it.
    pub fn authenticate(&self, headers: &HeaderMap) -> Option<Identity> {
        bearer_token(headers).and_then(|token| self.verify(token))
    }
}

/// Extracts the token of an `Authorization: Bearer` header. Any other shape counts as no
/// credential.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
