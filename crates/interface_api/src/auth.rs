//! Authentication and authorization
//!
//! Tokens carry the school the caller acts for. Every `/api/v1` handler is
//! scoped to that school; a token for one school cannot read another's data.

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use core_kernel::SchoolId;

use crate::error::ApiError;

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Tenant the user belongs to
    pub school_id: Uuid,
    /// User's roles
    pub roles: Vec<String>,
    /// Expiration timestamp
    pub exp: i64,
    /// Issued at timestamp
    pub iat: i64,
}

impl Claims {
    pub fn school(&self) -> SchoolId {
        SchoolId::from_uuid(self.school_id)
    }

    /// Fails with `Forbidden` unless the user holds `permission` or is an admin
    pub fn require(&self, permission: &str) -> Result<(), ApiError> {
        if has_role(self, permission) {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!("missing permission {}", permission)))
        }
    }
}

/// Auth errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
}

/// Creates a new JWT token
///
/// # Arguments
///
/// * `user_id` - User identifier
/// * `school_id` - Tenant the token is scoped to
/// * `roles` - User's roles
/// * `secret` - JWT secret key
/// * `expiration_secs` - Token validity in seconds
pub fn create_token(
    user_id: &str,
    school_id: SchoolId,
    roles: Vec<String>,
    secret: &str,
    expiration_secs: u64,
) -> Result<String, AuthError> {
    let now = Utc::now();
    let exp = now + Duration::seconds(expiration_secs as i64);

    let claims = Claims {
        sub: user_id.to_string(),
        school_id: *school_id.as_uuid(),
        roles,
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AuthError::InvalidToken)
}

/// Validates a JWT token
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::InvalidToken,
    })?;

    Ok(token_data.claims)
}

/// Checks if user has required role
pub fn has_role(claims: &Claims, required_role: &str) -> bool {
    claims.roles.iter().any(|r| r == required_role || r == "admin")
}

/// Permission definitions
pub mod permissions {
    /// Read vote heads, schedules, payments and balances
    pub const FEES_READ: &str = "fees:read";
    /// Record payments and re-initialize balances
    pub const FEES_WRITE: &str = "fees:write";
    /// Manage vote heads and fee schedules
    pub const FEES_ADMIN: &str = "fees:admin";
    /// Review and match M-PESA transactions
    pub const MPESA_RECONCILE: &str = "mpesa:reconcile";
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn test_token_round_trip_keeps_school() {
        let school = SchoolId::new();
        let token = create_token("bursar", school, vec![permissions::FEES_READ.to_string()], SECRET, 60).unwrap();
        let claims = validate_token(&token, SECRET).unwrap();

        assert_eq!(claims.school(), school);
        assert!(claims.require(permissions::FEES_READ).is_ok());
        assert!(claims.require(permissions::FEES_ADMIN).is_err());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = create_token("bursar", SchoolId::new(), vec![], SECRET, 60).unwrap();
        assert!(matches!(validate_token(&token, "other"), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_admin_holds_every_permission() {
        let claims = Claims {
            sub: "head".to_string(),
            school_id: Uuid::new_v4(),
            roles: vec!["admin".to_string()],
            exp: 0,
            iat: 0,
        };
        assert!(has_role(&claims, permissions::MPESA_RECONCILE));
    }
}
