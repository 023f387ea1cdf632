//! Stateless signing and verification of bearer tokens.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};

use crate::{AuthError, TokenClaims, TokenType, TokenValidationError, validate_claims};

/// Signs claims into a compact token and verifies tokens back into claims.
///
/// Verification checks signature, structure, the expected token type and the
/// validity window at `now`. It never looks at persisted state.
pub trait TokenCodec: Send + Sync {
    fn sign(&self, claims: &TokenClaims) -> Result<String, AuthError>;

    fn verify(
        &self,
        token: &str,
        expected: TokenType,
        now: DateTime<Utc>,
    ) -> Result<TokenClaims, AuthError>;
}

/// HS256 codec keyed by a single process-wide secret.
pub struct Hs256TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl Hs256TokenCodec {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let secret = secret.as_ref();
        let mut validation = Validation::new(Algorithm::HS256);
        // Time windows are checked by `validate_claims` against the caller's clock.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }
}

impl core::fmt::Debug for Hs256TokenCodec {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Hs256TokenCodec").finish_non_exhaustive()
    }
}

impl TokenCodec for Hs256TokenCodec {
    fn sign(&self, claims: &TokenClaims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }

    fn verify(
        &self,
        token: &str,
        expected: TokenType,
        now: DateTime<Utc>,
    ) -> Result<TokenClaims, AuthError> {
        let data = decode::<TokenClaims>(token, &self.decoding, &self.validation).map_err(|e| {
            tracing::debug!(error = %e, expected = %expected, "token rejected by codec");
            AuthError::MalformedToken
        })?;

        let claims = data.claims;
        match validate_claims(&claims, expected, now) {
            Ok(()) => Ok(claims),
            Err(TokenValidationError::Expired) => Err(AuthError::ExpiredToken),
            Err(TokenValidationError::TypeMismatch { expected, found }) => {
                tracing::warn!(sub = %claims.sub, %expected, %found, "token type confusion attempt");
                Err(AuthError::InvalidToken)
            }
            Err(TokenValidationError::NotYetValid | TokenValidationError::InvalidTimeWindow) => {
                Err(AuthError::MalformedToken)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BindingMeta;
    use chrono::{Duration, TimeZone};
    use clinic_core::UserId;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
    }

    fn mint(codec: &Hs256TokenCodec, token_type: TokenType, ttl: Duration) -> (TokenClaims, String) {
        let claims = TokenClaims::new(
            UserId::new(),
            token_type,
            t0(),
            t0() + ttl,
            &BindingMeta::from_ip("203.0.113.9"),
        );
        let token = codec.sign(&claims).unwrap();
        (claims, token)
    }

    #[test]
    fn verify_returns_signed_claims() {
        let codec = Hs256TokenCodec::new("secret");
        let (claims, token) = mint(&codec, TokenType::Access, Duration::minutes(30));
        let verified = codec.verify(&token, TokenType::Access, t0() + Duration::minutes(1)).unwrap();
        assert_eq!(verified, claims);
        assert_eq!(verified.ip.as_deref(), Some("203.0.113.9"));
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        let codec = Hs256TokenCodec::new("secret");
        let (_, token) = mint(&codec, TokenType::Access, Duration::minutes(30));
        let err = codec.verify(&token, TokenType::Access, t0() + Duration::minutes(31)).unwrap_err();
        assert_eq!(err, AuthError::ExpiredToken);
    }

    #[test]
    fn refresh_token_cannot_stand_in_for_access() {
        let codec = Hs256TokenCodec::new("secret");
        let (_, token) = mint(&codec, TokenType::Refresh, Duration::days(30));
        let err = codec.verify(&token, TokenType::Access, t0()).unwrap_err();
        assert_eq!(err, AuthError::InvalidToken);
    }

    #[test]
    fn foreign_secret_is_malformed() {
        let codec = Hs256TokenCodec::new("secret");
        let other = Hs256TokenCodec::new("other-secret");
        let (_, token) = mint(&other, TokenType::Access, Duration::minutes(30));
        let err = codec.verify(&token, TokenType::Access, t0()).unwrap_err();
        assert_eq!(err, AuthError::MalformedToken);
    }

    #[test]
    fn tampered_payload_is_malformed() {
        let codec = Hs256TokenCodec::new("secret");
        let (_, token) = mint(&codec, TokenType::Access, Duration::minutes(30));
        let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
        parts[1] = parts[1].chars().rev().collect();
        let tampered = parts.join(".");
        let err = codec.verify(&tampered, TokenType::Access, t0()).unwrap_err();
        assert_eq!(err, AuthError::MalformedToken);
    }

    #[test]
    fn garbage_is_malformed() {
        let codec = Hs256TokenCodec::new("secret");
        for junk in ["", "abc", "a.b.c"] {
            assert_eq!(
                codec.verify(junk, TokenType::Access, t0()).unwrap_err(),
                AuthError::MalformedToken
            );
        }
    }
}
