use crate::error::AppError;
use crate::session::Session;
use chrono::{TimeZone, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// Turns a bearer token from the external identity provider into a session.
pub trait IdentityProvider: Send + Sync {
    fn verify(&self, token: &str) -> Result<Session, AppError>;
}

/// Access-token claims the console relies on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    pub exp: i64,
    #[serde(default)]
    pub aud: Option<String>,
}

/// HS256 verification with a shared secret.
pub struct JwtIdentity {
    key: DecodingKey,
    validation: Validation,
}

impl JwtIdentity {
    /// Tokens must carry `aud` equal to `audience` when one is given.
    pub fn hs256(secret: &[u8], audience: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        if let Some(aud) = audience {
            validation.set_audience(&[aud]);
        }
        JwtIdentity {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }
}

impl IdentityProvider for JwtIdentity {
    fn verify(&self, token: &str) -> Result<Session, AppError> {
        let claims = decode::<Claims>(token, &self.key, &self.validation)
            .map_err(|e| {
                let reason = match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => "token expired",
                    jsonwebtoken::errors::ErrorKind::InvalidAudience => "invalid audience",
                    _ => "invalid token",
                };
                tracing::warn!(error = %e, "token rejected");
                AppError::Unauthorized(reason.into())
            })?
            .claims;
        let expires_at = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .ok_or_else(|| AppError::Unauthorized("invalid token".into()))?;
        Ok(Session::new(claims.sub, claims.email, expires_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(secret: &[u8], aud: &str, exp: i64) -> String {
        let claims = Claims {
            sub: "6a1f0a52-5f8e-4a55-9d35-8f4b8d1e2c3a".into(),
            email: Some("ana@panaderia.test".into()),
            exp,
            aud: Some(aud.into()),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(secret)).unwrap()
    }

    #[test]
    fn verifies_valid_token() {
        let identity = JwtIdentity::hs256(b"secret", Some("authenticated"));
        let exp = Utc::now().timestamp() + 3600;
        let session = identity.verify(&token(b"secret", "authenticated", exp)).unwrap();
        assert_eq!(session.user_id, "6a1f0a52-5f8e-4a55-9d35-8f4b8d1e2c3a");
        assert_eq!(session.email.as_deref(), Some("ana@panaderia.test"));
        assert_eq!(session.expires_at.timestamp(), exp);
    }

    #[test]
    fn rejects_wrong_secret_audience_and_expiry() {
        let identity = JwtIdentity::hs256(b"secret", Some("authenticated"));
        let exp = Utc::now().timestamp() + 3600;
        assert!(matches!(
            identity.verify(&token(b"other", "authenticated", exp)),
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            identity.verify(&token(b"secret", "anon", exp)),
            Err(AppError::Unauthorized(_))
        ));
        let past = Utc::now().timestamp() - 3600;
        assert!(matches!(
            identity.verify(&token(b"secret", "authenticated", past)),
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(identity.verify("not-a-jwt"), Err(AppError::Unauthorized(_))));
    }
}
