//! Manage json web tokens.

use std::sync::Arc;

use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
};
use rand::distributions::{Alphanumeric, DistString};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::config::Token as TokenConfig;
use crate::error::{AuthError, Result, TokenError, ToInternal};
use crate::ports::Clock;

const JTI_LENGTH: usize = 16;
pub const TOKEN_TYPE: &str = "bearer";

/// Functional purpose of a token, fixed at issuance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    #[serde(rename = "access_token")]
    Access,
    #[serde(rename = "refresh_token")]
    Refresh,
    #[serde(rename = "email_token")]
    EmailAction,
}

/// Pieces of information asserted on a JWT.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Email of the identity.
    pub sub: String,
    pub scope: Scope,
    /// Identifies the time at which the JWT was issued.
    pub iat: u64,
    /// Identifies the expiration time on or after which the JWT must not be
    /// accepted for processing.
    pub exp: u64,
    /// Identifies the organization that issued the JWT.
    pub iss: String,
    /// Recipients that the JWT is intended for.
    pub aud: String,
    /// Unique token identifier.
    pub jti: String,
}

/// Access and refresh tokens handed out together.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
}

/// Sign and verify scoped tokens with one shared secret.
#[derive(Clone)]
pub struct TokenCodec {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    audience: String,
    clock: Arc<dyn Clock>,
}

impl TokenCodec {
    /// Create a new [`TokenCodec`].
    ///
    /// Only HMAC algorithms are accepted since tokens are signed with a
    /// shared secret.
    pub fn new(
        config: &TokenConfig,
        secret: impl AsRef<[u8]>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        if !matches!(
            config.algorithm,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            return Err(AuthError::Configuration(format!(
                "{:?} is not an HMAC algorithm",
                config.algorithm
            )));
        }

        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(AuthError::Configuration(
                "token secret must not be empty".into(),
            ));
        }

        Ok(Self {
            algorithm: config.algorithm,
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            clock,
        })
    }

    /// Sign a token for `subject` valid `ttl` seconds from now.
    pub fn issue(&self, subject: &str, scope: Scope, ttl: u64) -> Result<String> {
        let now = self.clock.now();
        let claims = Claims {
            sub: subject.to_owned(),
            scope,
            iat: now,
            exp: now.saturating_add(ttl),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            jti: Alphanumeric.sample_string(&mut OsRng, JTI_LENGTH),
        };

        encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .catch()
    }

    /// Decode and check a token.
    ///
    /// The signature is verified first, then expiry against the injected
    /// clock, then the scope.
    pub fn decode(
        &self,
        token: &str,
        expected: Scope,
    ) -> std::result::Result<Claims, TokenError> {
        let mut validation = Validation::new(self.algorithm);
        // Expiry is checked below with our clock.
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|err| match err.kind() {
                JwtErrorKind::InvalidSignature => TokenError::InvalidSignature,
                _ => TokenError::Malformed,
            })?
            .claims;

        if claims.exp <= self.clock.now() {
            return Err(TokenError::Expired);
        }

        if claims.scope != expected {
            return Err(TokenError::ScopeMismatch {
                expected,
                found: claims.scope,
            });
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::clock::ManualClock;

    const SECRET: &str = "secret_key";

    fn codec(clock: Arc<ManualClock>) -> TokenCodec {
        TokenCodec::new(&TokenConfig::default(), SECRET, clock).unwrap()
    }

    #[test]
    fn test_issue_and_decode() {
        let clock = Arc::new(ManualClock::new(1_000));
        let codec = codec(Arc::clone(&clock));

        let token = codec.issue("a@x.com", Scope::Access, 86_400).unwrap();
        let claims = codec.decode(&token, Scope::Access).unwrap();

        assert_eq!(claims.sub, "a@x.com");
        assert_eq!(claims.scope, Scope::Access);
        assert_eq!(claims.iat, 1_000);
        assert_eq!(claims.exp, 87_400);
    }

    #[test]
    fn test_scope_partition() {
        let codec = codec(Arc::new(ManualClock::new(1_000)));
        let scopes = [Scope::Access, Scope::Refresh, Scope::EmailAction];

        for issued in scopes {
            let token = codec.issue("a@x.com", issued, 300).unwrap();
            for expected in scopes.into_iter().filter(|s| *s != issued) {
                assert_eq!(
                    codec.decode(&token, expected),
                    Err(TokenError::ScopeMismatch {
                        expected,
                        found: issued
                    })
                );
            }
        }
    }

    #[test]
    fn test_expired() {
        let clock = Arc::new(ManualClock::new(1_000));
        let codec = codec(Arc::clone(&clock));
        let token = codec.issue("a@x.com", Scope::EmailAction, 300).unwrap();

        clock.advance(299);
        assert!(codec.decode(&token, Scope::EmailAction).is_ok());

        clock.advance(1);
        assert_eq!(
            codec.decode(&token, Scope::EmailAction),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn test_invalid_signature() {
        let clock = Arc::new(ManualClock::new(1_000));
        let other = TokenCodec::new(
            &TokenConfig::default(),
            "another_secret",
            Arc::clone(&clock) as Arc<dyn Clock>,
        )
        .unwrap();
        let token = other.issue("a@x.com", Scope::Access, 300).unwrap();

        assert_eq!(
            codec(clock).decode(&token, Scope::Access),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn test_malformed() {
        let codec = codec(Arc::new(ManualClock::new(1_000)));
        assert_eq!(
            codec.decode("not.a.token", Scope::Access),
            Err(TokenError::Malformed)
        );
        assert_eq!(codec.decode("", Scope::Access), Err(TokenError::Malformed));
    }

    #[test]
    fn test_huge_ttl_saturates() {
        let codec = codec(Arc::new(ManualClock::new(1_000)));
        let token = codec.issue("a@x.com", Scope::Access, u64::MAX).unwrap();

        let claims = codec.decode(&token, Scope::Access).unwrap();
        assert_eq!(claims.exp, u64::MAX);
    }

    #[test]
    fn test_same_second_tokens_differ() {
        let codec = codec(Arc::new(ManualClock::new(1_000)));
        let first = codec.issue("a@x.com", Scope::Refresh, 300).unwrap();
        let second = codec.issue("a@x.com", Scope::Refresh, 300).unwrap();

        assert_ne!(first, second);
    }

    #[test]
    fn test_rejects_asymmetric_algorithm() {
        let config = TokenConfig {
            algorithm: Algorithm::ES256,
            ..Default::default()
        };
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(0));

        assert!(matches!(
            TokenCodec::new(&config, SECRET, Arc::clone(&clock)),
            Err(AuthError::Configuration(_))
        ));
        assert!(matches!(
            TokenCodec::new(&TokenConfig::default(), "", clock),
            Err(AuthError::Configuration(_))
        ));
    }
}
