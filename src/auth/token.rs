//! Signed bearer tokens (HS256).
//!
//! Login tokens carry only the user id. The self-check endpoint re-issues a
//! token that also carries a snapshot of the profile, so clients can render
//! the current user without another round trip.

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::db::models::{User, UserType};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_type: Option<UserType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    /// Issued-at, seconds since the epoch.
    pub iat: i64,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,

    #[error("invalid token: {0}")]
    Invalid(String),

    #[error("failed to sign token: {0}")]
    Sign(String),
}

pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime: Duration,
}

impl TokenKeys {
    pub fn new(secret: &[u8], lifetime_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            lifetime: Duration::hours(lifetime_hours),
        }
    }

    fn claims_for(&self, id: i64) -> Claims {
        let now = Utc::now();
        Claims {
            id,
            email: None,
            username: None,
            user_type: None,
            avatar: None,
            iat: now.timestamp(),
            exp: (now + self.lifetime).timestamp(),
        }
    }

    /// Token carrying just the user id.
    pub fn issue(&self, user_id: i64) -> Result<String, TokenError> {
        self.sign(&self.claims_for(user_id))
    }

    /// Token carrying the id plus a profile snapshot.
    pub fn issue_with_profile(&self, user: &User) -> Result<String, TokenError> {
        let claims = Claims {
            email: Some(user.email.clone()),
            username: Some(user.username.clone()),
            user_type: Some(user.user_type),
            avatar: user.avatar.clone(),
            ..self.claims_for(user.id)
        };
        self.sign(&claims)
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| TokenError::Sign(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> TokenKeys {
        TokenKeys::new(b"test-secret", 24)
    }

    #[test]
    fn issued_token_verifies_with_id() {
        let keys = keys();
        let token = keys.issue(7).unwrap();
        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.id, 7);
        assert!(claims.email.is_none());
        assert_eq!(claims.exp - claims.iat, 24 * 3600);
    }

    #[test]
    fn profile_token_carries_snapshot() {
        let keys = keys();
        let user = User {
            id: 3,
            username: "Max".into(),
            email: "max@example.com".into(),
            password_hash: "hash".into(),
            user_type: UserType::Pro,
            avatar: Some("/static/max.png".into()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let claims = keys.verify(&keys.issue_with_profile(&user).unwrap()).unwrap();
        assert_eq!(claims.id, 3);
        assert_eq!(claims.email.as_deref(), Some("max@example.com"));
        assert_eq!(claims.user_type, Some(UserType::Pro));
        assert_eq!(claims.avatar.as_deref(), Some("/static/max.png"));
    }

    #[test]
    fn expired_token_is_rejected() {
        let keys = keys();
        let mut claims = keys.claims_for(1);
        claims.iat -= 48 * 3600;
        claims.exp = Utc::now().timestamp() - 10;
        let token = keys.sign(&claims).unwrap();
        assert!(matches!(keys.verify(&token), Err(TokenError::Expired)));
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let other = TokenKeys::new(b"another-secret", 24);
        let token = other.issue(1).unwrap();
        assert!(matches!(keys().verify(&token), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(keys().verify("not.a.token").is_err());
        assert!(keys().verify("").is_err());
    }
}
