//! Token Service
//!
//! Signs and verifies the access/refresh JWT pair. Access and refresh tokens
//! use independent HS256 secrets and carry a `type` discriminator, so one
//! can never stand in for the other even if the secrets coincide.

use chrono::Utc;
use derive_more::Display;
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::config::AuthConfig;
use crate::domain::entity::identity::Identity;
use crate::domain::value_object::user_id::{SessionId, UserId};
use crate::error::{AuthError, AuthResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    #[display("access")]
    Access,
    #[display("refresh")]
    Refresh,
}

/// JWT payload shared by both token types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "userId")]
    pub user_id: UserId,
    pub email: String,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    /// Session this pair belongs to
    pub sid: SessionId,
    pub jti: String,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SigningKeys {
    fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

pub struct TokenService {
    access: SigningKeys,
    refresh: SigningKeys,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
    issuer: String,
    audience: String,
}

impl TokenService {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            access: SigningKeys::new(&config.jwt_secret),
            refresh: SigningKeys::new(&config.jwt_refresh_secret),
            access_ttl_secs: config.access_token_ttl_secs(),
            refresh_ttl_secs: config.refresh_token_ttl_secs(),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
        }
    }

    fn keys(&self, token_type: TokenType) -> &SigningKeys {
        match token_type {
            TokenType::Access => &self.access,
            TokenType::Refresh => &self.refresh,
        }
    }

    fn claims_for(&self, identity: &Identity, sid: SessionId, token_type: TokenType) -> Claims {
        let iat = Utc::now().timestamp();
        let ttl = match token_type {
            TokenType::Access => self.access_ttl_secs,
            TokenType::Refresh => self.refresh_ttl_secs,
        };

        Claims {
            user_id: identity.id,
            email: identity.email.as_str().to_string(),
            token_type,
            sid,
            jti: Uuid::new_v4().to_string(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat,
            exp: iat + ttl,
        }
    }

    fn sign(&self, claims: &Claims) -> AuthResult<String> {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &self.keys(claims.token_type).encoding,
        )
        .map_err(|e| AuthError::Internal(format!("Token signing failed: {}", e)))
    }

    pub fn issue_access(&self, identity: &Identity, sid: SessionId) -> AuthResult<String> {
        self.sign(&self.claims_for(identity, sid, TokenType::Access))
    }

    pub fn issue_refresh(&self, identity: &Identity, sid: SessionId) -> AuthResult<String> {
        self.sign(&self.claims_for(identity, sid, TokenType::Refresh))
    }

    pub fn issue_pair(&self, identity: &Identity, sid: SessionId) -> AuthResult<TokenPair> {
        Ok(TokenPair {
            access_token: self.issue_access(identity, sid)?,
            refresh_token: self.issue_refresh(identity, sid)?,
            token_type: "Bearer",
            expires_in: self.access_ttl_secs,
        })
    }

    fn validation(&self, validate_exp: bool) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = validate_exp;
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation
    }

    /// Verify signature, issuer, audience, expiry and type.
    pub fn verify(&self, token: &str, expected: TokenType) -> AuthResult<Claims> {
        let data = decode::<Claims>(token, &self.keys(expected).decoding, &self.validation(true))
            .map_err(|e| match e.kind() {
                JwtErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::TokenInvalid,
            })?;

        if data.claims.token_type != expected {
            return Err(AuthError::TokenInvalid);
        }
        Ok(data.claims)
    }

    /// Like [`verify`](Self::verify) but accepts an expired token. Used only
    /// to find the session to end on logout.
    pub fn decode_allow_expired(&self, token: &str, expected: TokenType) -> AuthResult<Claims> {
        let data = decode::<Claims>(token, &self.keys(expected).decoding, &self.validation(false))
            .map_err(|_| AuthError::TokenInvalid)?;

        if data.claims.token_type != expected {
            return Err(AuthError::TokenInvalid);
        }
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::identity::tests::identity;

    fn service() -> TokenService {
        TokenService::new(&AuthConfig::development())
    }

    #[tokio::test]
    async fn test_verify_returns_issued_payload() {
        let tokens = service();
        let ada = identity("ada@example.com", "Str0ng!1").await;
        let sid = SessionId::new();

        let pair = tokens.issue_pair(&ada, sid).unwrap();
        assert_eq!(pair.token_type, "Bearer");
        assert_eq!(pair.expires_in, 900);

        let claims = tokens.verify(&pair.access_token, TokenType::Access).unwrap();
        assert_eq!(claims.user_id, ada.id);
        assert_eq!(claims.email, "ada@example.com");
        assert_eq!(claims.sid, sid);
        assert_eq!(claims.token_type, TokenType::Access);
        assert_eq!(claims.iss, "course-platform-api");
        assert_eq!(claims.aud, "course-platform-client");

        let refresh = tokens.verify(&pair.refresh_token, TokenType::Refresh).unwrap();
        assert_eq!(refresh.sid, sid);
    }

    #[tokio::test]
    async fn test_type_mismatch_rejected_even_with_shared_secret() {
        let mut config = AuthConfig::development();
        config.jwt_refresh_secret = config.jwt_secret.clone();
        let tokens = TokenService::new(&config);
        let ada = identity("ada@example.com", "Str0ng!1").await;

        let pair = tokens.issue_pair(&ada, SessionId::new()).unwrap();
        assert!(matches!(
            tokens.verify(&pair.access_token, TokenType::Refresh),
            Err(AuthError::TokenInvalid)
        ));
        assert!(matches!(
            tokens.verify(&pair.refresh_token, TokenType::Access),
            Err(AuthError::TokenInvalid)
        ));
    }

    #[tokio::test]
    async fn test_expired_is_distinct_from_invalid() {
        let tokens = service();
        let ada = identity("ada@example.com", "Str0ng!1").await;

        let mut claims = tokens.claims_for(&ada, SessionId::new(), TokenType::Access);
        claims.iat -= 3600;
        claims.exp = Utc::now().timestamp() - 10;
        let expired = tokens.sign(&claims).unwrap();

        assert!(matches!(
            tokens.verify(&expired, TokenType::Access),
            Err(AuthError::TokenExpired)
        ));
        assert_eq!(
            tokens
                .decode_allow_expired(&expired, TokenType::Access)
                .unwrap()
                .sid,
            claims.sid
        );
    }

    #[tokio::test]
    async fn test_foreign_secret_and_garbage_are_invalid() {
        let ada = identity("ada@example.com", "Str0ng!1").await;
        let other = service().issue_access(&ada, SessionId::new()).unwrap();

        assert!(matches!(
            service().verify(&other, TokenType::Access),
            Err(AuthError::TokenInvalid)
        ));
        assert!(matches!(
            service().verify("not.a.jwt", TokenType::Access),
            Err(AuthError::TokenInvalid)
        ));
    }

    #[tokio::test]
    async fn test_wrong_audience_is_invalid() {
        let ada = identity("ada@example.com", "Str0ng!1").await;
        let mut config = AuthConfig::development();
        let issuer = TokenService::new(&config);
        let token = issuer.issue_access(&ada, SessionId::new()).unwrap();

        config.audience = "someone-else".into();
        let verifier = TokenService::new(&config);

        assert!(matches!(
            verifier.verify(&token, TokenType::Access),
            Err(AuthError::TokenInvalid)
        ));
    }

    #[tokio::test]
    async fn test_pairs_issued_together_differ() {
        let tokens = service();
        let ada = identity("ada@example.com", "Str0ng!1").await;
        let sid = SessionId::new();

        let a = tokens.issue_access(&ada, sid).unwrap();
        let b = tokens.issue_access(&ada, sid).unwrap();
        assert_ne!(a, b);
    }
}
