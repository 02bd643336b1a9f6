use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::auth::claims::Claims;
use crate::config::JwtConfig;
use crate::state::AppState;

/// Identity asserted by a verified token.
#[derive(Debug, Clone)]
pub struct TokenIdentity {
    pub user_id: Uuid,
    pub email: String,
}

/// Holds JWT signing and verification keys with config data.
#[derive(Clone)]
pub struct TokenKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub ttl: Duration,
}

impl FromRef<AppState> for TokenKeys {
    fn from_ref(state: &AppState) -> Self {
        let JwtConfig { secret, ttl_hours } = state.config.jwt.clone();
        Self::new(&secret, ttl_hours)
    }
}

impl TokenKeys {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::from_secs((ttl_hours.max(0) as u64) * 3600),
        }
    }

    /// Sign a token binding the user id and email for the configured window.
    pub fn issue(&self, user_id: Uuid, email: &str) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(self.ttl.as_secs() as i64);
        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user_id, "jwt signed");
        Ok(token)
    }

    /// Verify a bearer token.
    ///
    /// Malformed input, a bad signature and an expired token all degrade to
    /// `None` so the authorization gate can answer uniformly.
    pub fn verify(&self, token: &str) -> Option<TokenIdentity> {
        let data = match decode::<Claims>(token, &self.decoding, &Validation::default()) {
            Ok(d) => d,
            Err(e) => {
                debug!(error = %e, "jwt rejected");
                return None;
            }
        };
        Some(TokenIdentity {
            user_id: data.claims.sub,
            email: data.claims.email,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_keys() -> TokenKeys {
        TokenKeys::new("test-secret", 24)
    }

    #[test]
    fn issue_and_verify_roundtrip() {
        let keys = make_keys();
        let user_id = Uuid::new_v4();
        let token = keys.issue(user_id, "alice@x.com").expect("sign");
        let identity = keys.verify(&token).expect("verify");
        assert_eq!(identity.user_id, user_id);
        assert_eq!(identity.email, "alice@x.com");
    }

    #[test]
    fn verify_rejects_garbage() {
        let keys = make_keys();
        assert!(keys.verify("not-a-token").is_none());
        assert!(keys.verify("").is_none());
    }

    #[test]
    fn verify_rejects_tampered_token() {
        let keys = make_keys();
        let token = keys.issue(Uuid::new_v4(), "alice@x.com").expect("sign");

        // Flip one byte of the signature segment.
        let mut bytes = token.into_bytes();
        let last = bytes.len() - 1;
        bytes[last] = if bytes[last] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(bytes).unwrap();

        assert!(keys.verify(&tampered).is_none());
    }

    #[test]
    fn verify_rejects_wrong_secret() {
        let token = make_keys().issue(Uuid::new_v4(), "a@x.com").expect("sign");
        let other = TokenKeys::new("different-secret", 24);
        assert!(other.verify(&token).is_none());
    }

    #[test]
    fn verify_rejects_expired_token() {
        // Default validation allows 60s of leeway, so backdate the claims
        // well past expiry by hand.
        let keys = make_keys();
        let now = OffsetDateTime::now_utc();
        let claims = Claims {
            sub: Uuid::new_v4(),
            email: "a@x.com".into(),
            iat: (now - TimeDuration::hours(3)).unix_timestamp() as usize,
            exp: (now - TimeDuration::hours(2)).unix_timestamp() as usize,
        };
        let token = encode(&Header::default(), &claims, &keys.encoding).unwrap();
        assert!(keys.verify(&token).is_none());
    }
}
