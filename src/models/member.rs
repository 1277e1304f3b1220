//! Member model, token claims and caller identity

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::{AppError, AppResult};

/// Member model from database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Member {
    pub id: i64,
    pub name: String,
    pub email: String,
}

/// Caller roles carried in access tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Member,
    Admin,
}

/// JWT claims issued by the authentication service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberClaims {
    /// Member id
    pub sub: String,
    pub role: Role,
    pub exp: usize,
}

impl MemberClaims {
    pub fn new(member_id: i64, role: Role, ttl: Duration) -> Self {
        Self {
            sub: member_id.to_string(),
            role,
            exp: (Utc::now() + ttl).timestamp().max(0) as usize,
        }
    }

    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    /// Identity the lending core authorizes against
    pub fn caller(&self) -> AppResult<CallerIdentity> {
        let principal_id = self
            .sub
            .parse::<i64>()
            .map_err(|_| AppError::Authentication("Token subject is not a member id".to_string()))?;

        Ok(CallerIdentity {
            principal_id,
            privileged: self.role == Role::Admin,
        })
    }
}

/// Who is asking, passed explicitly into every lending operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerIdentity {
    principal_id: i64,
    privileged: bool,
}

impl CallerIdentity {
    pub fn member(member_id: i64) -> Self {
        Self {
            principal_id: member_id,
            privileged: false,
        }
    }

    pub fn admin(member_id: i64) -> Self {
        Self {
            principal_id: member_id,
            privileged: true,
        }
    }

    pub fn principal_id(&self) -> i64 {
        self.principal_id
    }

    pub fn is_privileged(&self) -> bool {
        self.privileged
    }

    /// Privileged callers act on anyone's loans, members only on their own
    pub fn may_act_for(&self, member_id: i64) -> bool {
        self.privileged || self.principal_id == member_id
    }
}
