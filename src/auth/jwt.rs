use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use super::claims::{Claims, TokenKind};
use crate::{config::JwtConfig, state::AppState};

#[derive(Clone)]
struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl KeyPair {
    fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

/// Signing and verification keys plus issuance policy.
///
/// Access and refresh tokens are signed with different secrets, so a refresh
/// token can never pass as an access token even if its `kind` claim were forged.
#[derive(Clone)]
pub struct JwtKeys {
    access: KeyPair,
    refresh: KeyPair,
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

/// A freshly signed token and the instant it stops being valid.
#[derive(Debug, Clone)]
pub struct SignedToken {
    pub token: String,
    pub expires_at: OffsetDateTime,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        Self::from_config(&state.config.jwt)
    }
}

impl JwtKeys {
    pub fn from_config(cfg: &JwtConfig) -> Self {
        Self {
            access: KeyPair::from_secret(&cfg.access_secret),
            refresh: KeyPair::from_secret(&cfg.refresh_secret),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            access_ttl: Duration::from_secs(cfg.access_ttl_seconds),
            refresh_ttl: Duration::from_secs(cfg.refresh_ttl_seconds),
        }
    }

    fn keys(&self, kind: TokenKind) -> &KeyPair {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    fn sign_with_kind(&self, user_id: Uuid, kind: TokenKind) -> anyhow::Result<SignedToken> {
        let now = OffsetDateTime::now_utc();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let exp = now + TimeDuration::seconds(ttl.as_secs() as i64);
        let claims = Claims {
            sub: user_id,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            jti: Uuid::new_v4(),
            kind,
        };
        let token = encode(&Header::default(), &claims, &self.keys(kind).encoding)?;
        debug!(user_id = %user_id, kind = ?kind, "jwt signed");
        Ok(SignedToken {
            token,
            expires_at: exp,
        })
    }

    pub fn sign_access(&self, user_id: Uuid) -> anyhow::Result<SignedToken> {
        self.sign_with_kind(user_id, TokenKind::Access)
    }

    pub fn sign_refresh(&self, user_id: Uuid) -> anyhow::Result<SignedToken> {
        self.sign_with_kind(user_id, TokenKind::Refresh)
    }

    fn verify_with_kind(&self, token: &str, kind: TokenKind) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.leeway = 0;
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.keys(kind).decoding, &validation)?;
        if data.claims.kind != kind {
            anyhow::bail!("expected {} token", kind.as_str());
        }
        debug!(user_id = %data.claims.sub, kind = ?data.claims.kind, "jwt verified");
        Ok(data.claims)
    }

    pub fn verify_access(&self, token: &str) -> anyhow::Result<Claims> {
        self.verify_with_kind(token, TokenKind::Access)
    }

    pub fn verify_refresh(&self, token: &str) -> anyhow::Result<Claims> {
        self.verify_with_kind(token, TokenKind::Refresh)
    }
}

/// Converts a validated `exp` claim back into a timestamp.
pub fn expiry_of(claims: &Claims) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(claims.exp as i64)
        .unwrap_or_else(|_| OffsetDateTime::now_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_keys(issuer: &str, audience: &str, access_ttl_seconds: u64) -> JwtKeys {
        JwtKeys::from_config(&JwtConfig {
            access_secret: "access-secret".into(),
            refresh_secret: "refresh-secret".into(),
            issuer: issuer.into(),
            audience: audience.into(),
            access_ttl_seconds,
            refresh_ttl_seconds: 3600,
        })
    }

    #[test]
    fn sign_and_verify_access_token() {
        let keys = make_keys("test-issuer", "test-aud", 60);
        let user_id = Uuid::new_v4();
        let signed = keys.sign_access(user_id).expect("sign access");
        let claims = keys.verify_access(&signed.token).expect("verify token");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
        assert_eq!(claims.kind, TokenKind::Access);
        assert_eq!(expiry_of(&claims).unix_timestamp(), signed.expires_at.unix_timestamp());
    }

    #[test]
    fn sign_and_verify_refresh_token() {
        let keys = make_keys("iss", "aud", 60);
        let user_id = Uuid::new_v4();
        let signed = keys.sign_refresh(user_id).expect("sign refresh");
        let claims = keys.verify_refresh(&signed.token).expect("verify refresh");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.kind, TokenKind::Refresh);
    }

    #[test]
    fn tokens_do_not_cross_kinds() {
        let keys = make_keys("iss", "aud", 60);
        let access = keys.sign_access(Uuid::new_v4()).unwrap();
        let refresh = keys.sign_refresh(Uuid::new_v4()).unwrap();
        assert!(keys.verify_refresh(&access.token).is_err());
        assert!(keys.verify_access(&refresh.token).is_err());
    }

    #[test]
    fn tokens_for_same_user_are_distinct() {
        let keys = make_keys("iss", "aud", 60);
        let user_id = Uuid::new_v4();
        let a = keys.sign_access(user_id).unwrap();
        let b = keys.sign_access(user_id).unwrap();
        assert_ne!(a.token, b.token);
    }

    #[test]
    fn verify_rejects_wrong_issuer_or_audience() {
        let good_keys = make_keys("good-iss", "good-aud", 60);
        let bad_keys = make_keys("bad-iss", "bad-aud", 60);
        let signed = good_keys.sign_access(Uuid::new_v4()).expect("sign access");
        assert!(bad_keys.verify_access(&signed.token).is_err());
    }

    #[test]
    fn verify_rejects_tampered_token() {
        let keys = make_keys("iss", "aud", 60);
        let signed = keys.sign_access(Uuid::new_v4()).unwrap();
        let mut tampered = signed.token.clone();
        tampered.push('x');
        assert!(keys.verify_access(&tampered).is_err());
        assert!(keys.verify_access("not-a-jwt").is_err());
    }

    #[tokio::test]
    async fn token_expires_after_ttl() {
        let keys = make_keys("iss", "aud", 1);
        let signed = keys.sign_access(Uuid::new_v4()).unwrap();
        assert!(keys.verify_access(&signed.token).is_ok());

        tokio::time::sleep(std::time::Duration::from_millis(2100)).await;
        let err = keys.verify_access(&signed.token).unwrap_err();
        let kind = err
            .downcast_ref::<jsonwebtoken::errors::Error>()
            .map(|e| e.kind().clone());
        assert!(matches!(
            kind,
            Some(jsonwebtoken::errors::ErrorKind::ExpiredSignature)
        ));
    }
}
