//! Bearer token identity.
//!
//! Every authenticated request carries `Authorization: Bearer <token>`, where the token is an HS256 JWT with the
//! claims `{id, rol, exp}`. Tokens are issued by the login service that shares `COMANDA_JWT_SECRET` with this server;
//! [`TokenIssuer`] exists so that tooling and tests can mint them.
use std::future::{ready, Ready};

use actix_web::{dev::Payload, FromRequest, HttpMessage, HttpRequest};
use chrono::{Duration, Utc};
use comanda_engine::db_types::Role;
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    config::AuthConfig,
    errors::{AuthError, ServerError},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// The user id
    pub id: i64,
    pub rol: Role,
    /// Expiry, as a unix timestamp
    pub exp: i64,
}

impl JwtClaims {
    pub fn new(id: i64, rol: Role, valid_for: Duration) -> Self {
        Self { id, rol, exp: (Utc::now() + valid_for).timestamp() }
    }

    pub fn is_admin(&self) -> bool {
        self.rol == Role::Admin
    }

    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        roles.contains(&self.rol)
    }
}

/// The claims are placed in the request extensions by [`crate::middleware::JwtMiddlewareFactory`].
impl FromRequest for JwtClaims {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let claims = req.extensions().get::<JwtClaims>().cloned();
        ready(claims.ok_or(ServerError::AuthenticationError(AuthError::MissingToken)))
    }
}

pub struct TokenIssuer {
    key: EncodingKey,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        Self { key: EncodingKey::from_secret(config.jwt_secret.reveal().as_bytes()) }
    }

    pub fn issue_token(&self, claims: &JwtClaims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.key).map_err(|e| AuthError::CouldNotIssueToken(e.to_string()))
    }
}

#[derive(Clone)]
pub struct TokenValidator {
    key: DecodingKey,
    validation: Validation,
}

impl TokenValidator {
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp"]);
        validation.leeway = 0;
        Self { key: DecodingKey::from_secret(config.jwt_secret.reveal().as_bytes()), validation }
    }

    pub fn validate(&self, token: &str) -> Result<JwtClaims, AuthError> {
        let data = decode::<JwtClaims>(token, &self.key, &self.validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
            _ => AuthError::ValidationError(e.to_string()),
        })?;
        trace!("🔐️ Access token validated for user #{}", data.claims.id);
        Ok(data.claims)
    }

    /// Strips the `Bearer ` prefix from an `Authorization` header value.
    pub fn extract_from_header(header: &str) -> Option<&str> {
        header.strip_prefix("Bearer ").map(str::trim).filter(|t| !t.is_empty())
    }
}
