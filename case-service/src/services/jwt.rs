use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::models::{Role, User};

/// Signed bearer tokens for request authentication. Short-lived and
/// stateless: expiry lives in the claims and is enforced by the verifier,
/// never tracked server-side. Long-lived authority is the refresh
/// session's job, which is why there is no refresh JWT here - refresh
/// secrets are opaque random values stored hashed.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_expiry_minutes: i64,
}

/// Claims carried by an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Account role at issuance time
    pub role: Role,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Token ID
    pub jti: String,
}

impl AccessTokenClaims {
    pub fn user_id(&self) -> Result<Uuid, anyhow::Error> {
        Uuid::parse_str(&self.sub).map_err(|e| anyhow::anyhow!("malformed subject claim: {e}"))
    }
}

impl JwtService {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            access_token_expiry_minutes: config.access_token_expiry_minutes,
        }
    }

    pub fn generate_access_token(&self, user: &User) -> Result<String, anyhow::Error> {
        let now = Utc::now();
        let exp = now + Duration::minutes(self.access_token_expiry_minutes);

        let claims = AccessTokenClaims {
            sub: user.id.to_string(),
            role: user.role,
            exp: exp.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode access token: {}", e))?;

        Ok(token)
    }

    /// Validate signature and expiry; an invalid token is an
    /// unauthenticated result, never a panic.
    pub fn validate_access_token(
        &self,
        token: &str,
    ) -> Result<AccessTokenClaims, jsonwebtoken::errors::Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        let token_data = decode::<AccessTokenClaims>(token, &self.decoding_key, &validation)?;
        Ok(token_data.claims)
    }

    /// Access token expiry in seconds (for client info).
    pub fn access_token_expiry_seconds(&self) -> i64 {
        self.access_token_expiry_minutes * 60
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> JwtConfig {
        JwtConfig {
            secret: "a-test-secret-that-is-long-enough-000000".to_string(),
            access_token_expiry_minutes: 15,
        }
    }

    fn test_user(role: Role) -> User {
        User::new("t@example.com".to_string(), "hash".to_string(), role)
    }

    #[test]
    fn generated_token_validates() {
        let service = JwtService::new(&test_config());
        let user = test_user(Role::Admin);

        let token = service.generate_access_token(&user).unwrap();
        let claims = service.validate_access_token(&token).unwrap();

        assert_eq!(claims.user_id().unwrap(), user.id);
        assert_eq!(claims.role, Role::Admin);
    }

    #[test]
    fn wrong_secret_fails_validation() {
        let service = JwtService::new(&test_config());
        let other = JwtService::new(&JwtConfig {
            secret: "another-secret-that-is-long-enough-1111".to_string(),
            access_token_expiry_minutes: 15,
        });

        let token = service.generate_access_token(&test_user(Role::Admin)).unwrap();
        assert!(other.validate_access_token(&token).is_err());
    }

    #[test]
    fn garbage_token_is_rejected() {
        let service = JwtService::new(&test_config());
        assert!(service.validate_access_token("not.a.token").is_err());
    }

    #[test]
    fn expiry_seconds_reflects_config() {
        let service = JwtService::new(&test_config());
        assert_eq!(service.access_token_expiry_seconds(), 15 * 60);
    }
}
