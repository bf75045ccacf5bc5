use std::env;

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use thiserror::Error;

use crate::routes::auth::claims::Claims;

/// Minimum acceptable size for the JWT secret in bytes.
pub const MIN_JWT_SECRET_LENGTH: usize = 32;

#[derive(Debug, Error)]
pub enum JwtSecretError {
    #[error("JWT_SECRET must be set")]
    Missing,
    #[error("JWT_SECRET must be at least {required} bytes, but {actual} bytes were provided")]
    TooShort { actual: usize, required: usize },
}

#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl std::fmt::Debug for JwtKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtKeys").finish_non_exhaustive()
    }
}

impl JwtKeys {
    pub fn from_env() -> Result<Self, JwtSecretError> {
        let value = env::var("JWT_SECRET").map_err(|_| JwtSecretError::Missing)?;
        Self::from_secret(value)
    }

    pub fn from_secret(secret: impl AsRef<[u8]>) -> Result<Self, JwtSecretError> {
        let bytes = secret.as_ref();
        if bytes.len() < MIN_JWT_SECRET_LENGTH {
            return Err(JwtSecretError::TooShort {
                actual: bytes.len(),
                required: MIN_JWT_SECRET_LENGTH,
            });
        }

        Ok(Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
        })
    }
}

pub fn create_jwt(claims: &Claims, keys: &JwtKeys) -> Result<String, jsonwebtoken::errors::Error> {
    encode(&Header::default(), claims, &keys.encoding)
}

pub fn decode_jwt(
    token: &str,
    keys: &JwtKeys,
) -> Result<TokenData<Claims>, jsonwebtoken::errors::Error> {
    decode::<Claims>(token, &keys.decoding, &Validation::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;
    use std::time::{SystemTime, UNIX_EPOCH};

    static KEYS: Lazy<JwtKeys> = Lazy::new(|| {
        JwtKeys::from_secret("0123456789abcdef0123456789abcdef")
            .expect("secret should be accepted")
    });

    fn claims_expiring_in(secs: i64) -> Claims {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64;
        Claims {
            id: "user_id_123".into(),
            email: "test@example.com".into(),
            exp: (now + secs).max(0) as usize,
        }
    }

    #[test]
    fn short_secrets_are_rejected() {
        let err = JwtKeys::from_secret("too-short").unwrap_err();
        assert!(matches!(err, JwtSecretError::TooShort { .. }));
    }

    #[test]
    fn tokens_round_trip() {
        let claims = claims_expiring_in(3600);

        let token = create_jwt(&claims, &KEYS).unwrap();
        let decoded = decode_jwt(&token, &KEYS).unwrap();
        assert_eq!(decoded.claims, claims);
    }

    #[test]
    fn expired_tokens_fail_to_decode() {
        let claims = claims_expiring_in(-3600);

        let token = create_jwt(&claims, &KEYS).unwrap();
        assert!(decode_jwt(&token, &KEYS).is_err());
    }
}
