use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use eco_types::UserId;

/// Claims issued by the identity provider. `sub` carries the user's UUID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityClaims {
    pub sub: String,
    pub exp: u64,
    pub aud: Option<String>,
    pub email: Option<String>,
}

/// Who the identity provider says is calling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub email: Option<String>,
}

pub struct AuthService {
    decoding_key: DecodingKey,
    audience: String,
    dev_mode: bool,
}

impl AuthService {
    /// Validate HS256 tokens signed with the identity provider's shared secret
    pub fn new(secret: &str, audience: String) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            audience,
            dev_mode: false,
        }
    }

    /// Accept the bare user UUID as a token
    pub fn new_dev_mode() -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(&[]),
            audience: "dev".to_string(),
            dev_mode: true,
        }
    }

    pub fn validate_token(&self, token: &str) -> Result<Identity, AuthError> {
        if self.dev_mode {
            let user_id = uuid::Uuid::parse_str(token.trim()).map_err(|_| {
                tracing::warn!("Dev token is not a user id");
                AuthError::InvalidToken
            })?;
            return Ok(Identity {
                user_id,
                email: None,
            });
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[&self.audience]);

        let token_data = decode::<IdentityClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| {
                tracing::warn!("JWT validation failed: {:?}", e);
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                    jsonwebtoken::errors::ErrorKind::InvalidAudience => {
                        AuthError::AudienceMismatch
                    }
                    _ => AuthError::InvalidToken,
                }
            })?;

        let user_id = uuid::Uuid::parse_str(&token_data.claims.sub).map_err(|_| {
            tracing::warn!("JWT subject {} is not a user id", token_data.claims.sub);
            AuthError::InvalidToken
        })?;

        Ok(Identity {
            user_id,
            email: token_data.claims.email,
        })
    }

    /// Extract and validate a `Bearer` token from an Authorization header
    pub fn authenticate(&self, auth_header: Option<&str>) -> Result<Identity, AuthError> {
        let header = auth_header.ok_or(AuthError::MissingToken)?;
        let token = header.strip_prefix("Bearer ").unwrap_or(header);
        self.validate_token(token)
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Authentication required")]
    MissingToken,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
    #[error("Audience mismatch")]
    AudienceMismatch,
}
