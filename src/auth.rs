//! Static user list with argon2 password checks and HS256 bearer tokens.

use std::path::Path;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::error::AuthError;
use crate::models::{Claims, UserRecord};

// Password hashing (Argon2)
use argon2::{Argon2, PasswordHasher};
use argon2::password_hash::{PasswordHash, PasswordVerifier, SaltString};
use rand_core::OsRng;

type HmacSha256 = Hmac<Sha256>;

const TOKEN_HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

#[derive(Deserialize)]
struct TokenHeader {
    alg: String,
}

pub struct AuthStore {
    users: Vec<UserRecord>,
    secret: Vec<u8>,
    ttl: Duration,
}

impl AuthStore {
    pub fn new(users: Vec<UserRecord>, secret: &str, ttl_days: i64) -> Result<Self, AuthError> {
        if secret.is_empty() {
            return Err(AuthError::Config("token key is empty".to_string()));
        }
        let ttl = Duration::try_days(ttl_days)
            .ok_or_else(|| AuthError::Config(format!("token lifetime {ttl_days}d out of range")))?;
        Ok(Self {
            users,
            secret: secret.as_bytes().to_vec(),
            ttl,
        })
    }

    /// Read the users JSON array from `path`.
    pub async fn load(path: &Path, secret: &str, ttl_days: i64) -> Result<Self, AuthError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| AuthError::Config(format!("reading {}: {}", path.display(), e)))?;
        let users: Vec<UserRecord> = serde_json::from_str(&content)
            .map_err(|e| AuthError::Config(format!("parsing {}: {}", path.display(), e)))?;
        log::info!("loaded {} users from {}", users.len(), path.display());
        Self::new(users, secret, ttl_days)
    }

    pub fn users(&self) -> Vec<UserRecord> {
        self.users.clone()
    }

    fn find_user(&self, username: &str) -> Result<&UserRecord, AuthError> {
        self.users
            .iter()
            .find(|u| u.user_name == username)
            .ok_or_else(|| AuthError::UnknownUser(username.to_string()))
    }

    /// Check `password` against the stored hash. A mismatch is `Ok(false)`.
    pub async fn verify_password(&self, username: &str, password: &str) -> Result<bool, AuthError> {
        let stored = self.find_user(username)?.password_hash.clone();
        let password = password.to_string();

        tokio::task::spawn_blocking(move || -> Result<bool, AuthError> {
            let parsed = PasswordHash::new(&stored).map_err(|e| AuthError::Hash(e.to_string()))?;
            let argon2 = Argon2::default();
            Ok(argon2.verify_password(password.as_bytes(), &parsed).is_ok())
        })
        .await
        .map_err(|e| AuthError::Hash(e.to_string()))?
    }

    /// Produce a PHC hash string suitable for the users file.
    pub fn hash_password(password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        let hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::Hash(e.to_string()))?
            .to_string();
        Ok(hash)
    }

    pub fn issue_token(&self, username: &str) -> Result<String, AuthError> {
        self.issue_token_at(username, Utc::now().timestamp())
    }

    pub(crate) fn issue_token_at(&self, username: &str, now: i64) -> Result<String, AuthError> {
        let user = self.find_user(username)?;
        let claims = Claims {
            sub: user.id,
            name: user.user_name.clone(),
            iat: now,
            exp: now + self.ttl.num_seconds(),
        };

        let payload = serde_json::to_vec(&claims).map_err(|e| AuthError::Config(e.to_string()))?;
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(TOKEN_HEADER),
            URL_SAFE_NO_PAD.encode(payload)
        );
        let sig = self.mac(&signing_input)?.finalize().into_bytes();
        Ok(format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(sig)))
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims, AuthError> {
        self.verify_token_at(token, Utc::now().timestamp())
    }

    pub(crate) fn verify_token_at(&self, token: &str, now: i64) -> Result<Claims, AuthError> {
        let mut parts = token.split('.');
        let (Some(header_part), Some(payload_part), Some(sig_part), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(AuthError::invalid_token("malformed token"));
        };

        let header: TokenHeader = decode_part(header_part)?;
        if header.alg != "HS256" {
            return Err(AuthError::invalid_token(format!(
                "unsupported algorithm {}",
                header.alg
            )));
        }

        let expected = URL_SAFE_NO_PAD
            .decode(sig_part)
            .map_err(|e| AuthError::invalid_token(e.to_string()))?;
        let signing_input = &token[..header_part.len() + 1 + payload_part.len()];
        self.mac(signing_input)?
            .verify_slice(&expected)
            .map_err(|_| AuthError::invalid_token("signature mismatch"))?;

        let claims: Claims = decode_part(payload_part)?;
        if claims.exp <= now {
            return Err(AuthError::invalid_token("token expired"));
        }
        Ok(claims)
    }

    /// Verify the token in an `Authorization: Bearer <token>` header value.
    pub fn authorize(&self, header: Option<&str>) -> Result<Claims, AuthError> {
        let header = header.ok_or_else(|| AuthError::invalid_token("Unauthorized"))?;
        let token = bearer_token(header).ok_or_else(|| AuthError::invalid_token("Unauthorized"))?;
        self.verify_token(token)
    }

    fn mac(&self, signing_input: &str) -> Result<HmacSha256, AuthError> {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).map_err(|e| AuthError::Config(e.to_string()))?;
        mac.update(signing_input.as_bytes());
        Ok(mac)
    }
}

/// Token part of a `Bearer` authorization value.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}

fn decode_part<T: serde::de::DeserializeOwned>(part: &str) -> Result<T, AuthError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(part)
        .map_err(|e| AuthError::invalid_token(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| AuthError::invalid_token(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const SECRET: &str = "test-token-key";

    fn store() -> AuthStore {
        let users = vec![
            UserRecord {
                id: 1,
                user_name: "alice".to_string(),
                password_hash: AuthStore::hash_password("wonderland").unwrap(),
            },
            UserRecord {
                id: 2,
                user_name: "bob".to_string(),
                password_hash: AuthStore::hash_password("builder").unwrap(),
            },
        ];
        AuthStore::new(users, SECRET, 7).unwrap()
    }

    #[tokio::test]
    async fn verify_password_accepts_match_and_rejects_mismatch() {
        let auth = store();
        assert!(auth.verify_password("alice", "wonderland").await.unwrap());
        assert!(!auth.verify_password("bob", "wrong").await.unwrap());
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let err = store().verify_password("carol", "x").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFoundError);
        assert_eq!(err.to_string(), "Username carol not in database!");
    }

    #[test]
    fn empty_secret_is_rejected() {
        assert!(matches!(
            AuthStore::new(Vec::new(), "", 7),
            Err(AuthError::Config(_))
        ));
    }

    #[test]
    fn token_round_trips_claims_with_seven_day_expiry() {
        let auth = store();
        let now = 1_700_000_000;
        let token = auth.issue_token_at("bob", now).unwrap();
        assert_eq!(token.split('.').count(), 3);

        let claims = auth.verify_token_at(&token, now + 60).unwrap();
        assert_eq!(claims.sub, 2);
        assert_eq!(claims.name, "bob");
        assert_eq!(claims.iat, now);
        assert_eq!(claims.exp, now + 7 * 24 * 60 * 60);
    }

    #[test]
    fn expired_token_is_invalid() {
        let auth = store();
        let now = 1_700_000_000;
        let token = auth.issue_token_at("alice", now).unwrap();
        let err = auth
            .verify_token_at(&token, now + 7 * 24 * 60 * 60)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTokenError);
    }

    #[test]
    fn tampered_or_foreign_tokens_are_invalid() {
        let auth = store();
        let token = auth.issue_token("alice").unwrap();

        let (head, _sig) = token.rsplit_once('.').unwrap();
        let forged = format!("{head}.{}", URL_SAFE_NO_PAD.encode([0u8; 32]));
        assert!(auth.verify_token(&forged).is_err());

        let other = AuthStore::new(auth.users(), "another-key", 7).unwrap();
        assert!(other.verify_token(&token).is_err());

        assert!(auth.verify_token("not-a-token").is_err());
    }

    #[test]
    fn unsigned_algorithm_is_rejected() {
        let auth = store();
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(r#"{"sub":1,"name":"alice","iat":0,"exp":9999999999}"#);
        let err = auth.verify_token(&format!("{header}.{payload}.")).unwrap_err();
        assert!(err.to_string().contains("unsupported algorithm"));
    }

    #[test]
    fn issue_token_for_unknown_user_fails() {
        let err = store().issue_token("mallory").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFoundError);
    }

    #[test]
    fn authorize_reads_bearer_header() {
        let auth = store();
        let token = auth.issue_token("alice").unwrap();

        let claims = auth.authorize(Some(&format!("Bearer {token}"))).unwrap();
        assert_eq!(claims.name, "alice");

        assert!(auth.authorize(None).is_err());
        assert!(auth.authorize(Some(&token)).is_err());
        assert_eq!(bearer_token("bearer abc"), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
    }
}
