use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{Identity, Realm, RoleSet};
use crate::errors::ServiceError;

/// Claim structure for session tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub username: String,
    /// Normalised role text at the time of login
    pub roles: String,
    pub realm: Realm,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

/// A freshly issued session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedSession {
    pub token: String,
    pub token_type: String,
    pub expires_at: i64,
    pub realm: Realm,
}

/// Issues, validates and revokes signed session tokens.
///
/// Revoked token ids are held in memory until their natural expiry.
pub struct SessionService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: i64,
    secure_cookies: bool,
    revoked: RwLock<HashMap<String, i64>>,
}

impl SessionService {
    pub fn new(secret: &str, ttl_secs: u64, secure_cookies: bool) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_secs: i64::try_from(ttl_secs).unwrap_or(i64::MAX),
            secure_cookies,
            revoked: RwLock::new(HashMap::new()),
        }
    }

    pub fn issue(
        &self,
        user_id: Uuid,
        username: &str,
        roles: &RoleSet,
        realm: Realm,
    ) -> Result<IssuedSession, ServiceError> {
        let now = Utc::now();
        let exp = now + ChronoDuration::seconds(self.ttl_secs);
        let claims = Claims {
            sub: user_id.to_string(),
            username: username.to_string(),
            roles: roles.to_storage(),
            realm,
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        Ok(IssuedSession {
            token,
            token_type: "Bearer".to_string(),
            expires_at: claims.exp,
            realm,
        })
    }

    /// Decodes a token and checks signature, expiry, revocation and realm.
    pub async fn validate(&self, token: &str, realm: Realm) -> Result<Identity, ServiceError> {
        let claims = decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map_err(|e| {
                debug!(error = %e, "rejected session token");
                ServiceError::SessionRequired { realm }
            })?
            .claims;

        if claims.realm != realm {
            return Err(ServiceError::SessionRequired { realm });
        }

        if self.revoked.read().await.contains_key(&claims.jti) {
            return Err(ServiceError::SessionRequired { realm });
        }

        let user_id =
            Uuid::parse_str(&claims.sub).map_err(|_| ServiceError::SessionRequired { realm })?;

        Ok(Identity {
            user_id,
            username: claims.username,
            roles: RoleSet::parse(&claims.roles),
            realm: claims.realm,
            session_id: claims.jti,
            expires_at: claims.exp,
        })
    }

    /// Adds the session's token id to the denylist.
    pub async fn revoke(&self, identity: &Identity) {
        let now = Utc::now().timestamp();
        let mut revoked = self.revoked.write().await;
        revoked.retain(|_, exp| *exp > now);
        revoked.insert(identity.session_id.clone(), identity.expires_at);
    }

    /// `Set-Cookie` value carrying the token.
    pub fn session_cookie(&self, realm: Realm, token: &str) -> String {
        let mut cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            realm.cookie_name(),
            token,
            self.ttl_secs
        );
        if self.secure_cookies {
            cookie.push_str("; Secure");
        }
        cookie
    }

    /// `Set-Cookie` value that removes the session cookie.
    pub fn clear_cookie(&self, realm: Realm) -> String {
        format!(
            "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
            realm.cookie_name()
        )
    }
}
